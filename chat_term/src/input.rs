use chat_core::{AppCommand, PeerAddress, address::MAX_BASE_PORT};
use std::path::PathBuf;

pub const HELP: &str = "\
Commands:
  /connect <host> <base port>   bind UDP <port> and TCP <port + 1> for this peer
  /connect                      reconnect to the last peer
  /file <path>                  send a file
  /disconnect                   close the current session
  /help                         show this help
  /quit                         exit
Anything else is sent as a chat message (start with // to send a leading /).";

/// What one line typed by the user asks for.
#[derive(Debug, Clone)]
pub enum Input {
    Command(AppCommand),
    ConnectLast,
    Help,
    Quit,
    /// Rejected before reaching the core; the text is shown as-is.
    Invalid(String),
    Empty,
}

pub fn parse_line(line: &str) -> Input {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Input::Empty;
    }

    if let Some(escaped) = line.strip_prefix("//") {
        return Input::Command(AppCommand::SendText(format!("/{}", escaped).into_bytes()));
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Command(AppCommand::SendText(line.as_bytes().to_vec()));
    };

    let mut parts = command.trim().splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let rest = parts.next().map(str::trim).unwrap_or_default();

    match name {
        "connect" => parse_connect(rest),
        "file" if rest.is_empty() => Input::Invalid("Usage: /file <path>".to_string()),
        "file" => Input::Command(AppCommand::SendFile(PathBuf::from(rest))),
        "disconnect" => Input::Command(AppCommand::Disconnect),
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => Input::Invalid(format!("Unknown command /{}. Type /help.", other)),
    }
}

fn parse_connect(args: &str) -> Input {
    if args.is_empty() {
        return Input::ConnectLast;
    }
    let mut parts = args.split_whitespace();
    let (Some(host), Some(port), None) = (parts.next(), parts.next(), parts.next()) else {
        return Input::Invalid("Please specify host and port.".to_string());
    };

    let Ok(base_port) = port.parse::<u32>() else {
        return Input::Invalid("Base port should be a non-negative whole number.".to_string());
    };
    if base_port > MAX_BASE_PORT as u32 {
        return Input::Invalid("Base port should be less than or equal to 65,534.".to_string());
    }

    match PeerAddress::new(host, base_port) {
        Ok(peer) => Input::Command(AppCommand::Connect(peer)),
        Err(e) => Input::Invalid(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(input: Input) -> Vec<u8> {
        match input {
            Input::Command(AppCommand::SendText(bytes)) => bytes,
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_text_is_sent_verbatim() {
        assert_eq!(text_of(parse_line("hello there\n")), b"hello there");
        assert_eq!(text_of(parse_line("  padded  ")), b"  padded  ");
        assert_eq!(text_of(parse_line("//not a command")), b"/not a command");
    }

    #[test]
    fn test_empty_lines_are_ignored() {
        assert!(matches!(parse_line(""), Input::Empty));
        assert!(matches!(parse_line("   \r\n"), Input::Empty));
    }

    #[test]
    fn test_connect_parsing() {
        match parse_line("/connect 192.168.1.5 5000") {
            Input::Command(AppCommand::Connect(peer)) => {
                assert_eq!(peer.host(), "192.168.1.5");
                assert_eq!(peer.base_port(), 5000);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(parse_line("/connect"), Input::ConnectLast));
    }

    #[test]
    fn test_connect_validation_messages() {
        let message = |line: &str| match parse_line(line) {
            Input::Invalid(msg) => msg,
            other => panic!("expected rejection, got {:?}", other),
        };
        assert_eq!(message("/connect host"), "Please specify host and port.");
        assert_eq!(
            message("/connect host -1"),
            "Base port should be a non-negative whole number."
        );
        assert_eq!(
            message("/connect host abc"),
            "Base port should be a non-negative whole number."
        );
        assert_eq!(
            message("/connect host 65535"),
            "Base port should be less than or equal to 65,534."
        );
    }

    #[test]
    fn test_other_commands() {
        match parse_line("/file ./my notes.txt") {
            Input::Command(AppCommand::SendFile(path)) => {
                assert_eq!(path, PathBuf::from("./my notes.txt"))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(parse_line("/file"), Input::Invalid(_)));
        assert!(matches!(
            parse_line("/disconnect"),
            Input::Command(AppCommand::Disconnect)
        ));
        assert!(matches!(parse_line("/help"), Input::Help));
        assert!(matches!(parse_line("/quit"), Input::Quit));
        assert!(matches!(parse_line("/dance"), Input::Invalid(_)));
    }
}
