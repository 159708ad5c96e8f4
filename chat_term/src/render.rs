use chat_core::AppEvent;

/// Transcript text for one event.
pub fn render(event: &AppEvent) -> String {
    match event {
        AppEvent::Status(text) => text.clone(),
        AppEvent::Connected {
            peer,
            message_port,
            file_port,
        } => format!(
            "Connected to {} at UDP {} and TCP {}\n",
            peer.host(),
            message_port,
            file_port
        ),
        AppEvent::Disconnected => "Disconnected.\n".to_string(),
        AppEvent::ConnectionError(reason) => format!("[error] {}\n", reason),
        AppEvent::MessageReceived { from, payload } => {
            format!("{}: \n{}\n", from.ip(), String::from_utf8_lossy(payload))
        }
        AppEvent::MessageSent { payload } => {
            format!("Me: \n{}\n", String::from_utf8_lossy(payload))
        }
        AppEvent::MessageSendError(reason) => format!("[error] {}\n", reason),
        AppEvent::FileSendStarted { name, byte_count } => {
            format!("Sending file: {} ({} bytes)\n", name, byte_count)
        }
        AppEvent::FileSent { name, byte_count } => {
            format!("File has been sent: {} ({} bytes)\n", name, byte_count)
        }
        AppEvent::FileSendError(reason) => format!("[error] {}\n", reason),
        AppEvent::FileReceived {
            name, byte_count, ..
        } => format!("Received file: {} ({} bytes)\n", name, byte_count),
        AppEvent::FileReceiveError(reason) => format!("[error] {}\n", reason),
        AppEvent::TransferProgress {
            file_name,
            bytes_done,
            total_bytes,
            speed,
            is_sending,
        } => {
            let percent = if *total_bytes == 0 {
                100.0
            } else {
                *bytes_done as f64 / *total_bytes as f64 * 100.0
            };
            let direction = if *is_sending { "->" } else { "<-" };
            format!(
                "  {} {} {:.0}% ({}/{} bytes, {})",
                direction, file_name, percent, bytes_done, total_bytes, speed
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_lines() {
        let event = AppEvent::MessageReceived {
            from: "10.0.0.7:5000".parse().unwrap(),
            payload: b"hi".to_vec().into(),
        };
        assert_eq!(render(&event), "10.0.0.7: \nhi\n");

        let event = AppEvent::MessageSent {
            payload: b"hi".to_vec().into(),
        };
        assert_eq!(render(&event), "Me: \nhi\n");
    }

    #[test]
    fn test_file_lines() {
        let event = AppEvent::FileReceived {
            name: "a.txt".to_string(),
            byte_count: 3,
            path: "a.txt".into(),
        };
        assert_eq!(render(&event), "Received file: a.txt (3 bytes)\n");

        let event = AppEvent::FileSent {
            name: "a.txt".to_string(),
            byte_count: 3,
        };
        assert_eq!(render(&event), "File has been sent: a.txt (3 bytes)\n");
    }

    #[test]
    fn test_progress_line() {
        let event = AppEvent::TransferProgress {
            file_name: "big.iso".to_string(),
            bytes_done: 50,
            total_bytes: 200,
            speed: "1.0 KB/s".to_string(),
            is_sending: true,
        };
        assert_eq!(render(&event), "  -> big.iso 25% (50/200 bytes, 1.0 KB/s)");
    }
}
