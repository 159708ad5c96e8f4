use chat_core::{AppCommand, AppEvent, EventSink, run_backend};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod input;
mod render;
mod settings;

use input::Input;
use settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 0. Initialize logging (stderr, so the transcript on stdout stays clean)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut settings = Settings::load();

    // 1. Create channels
    let (cmd_tx, cmd_rx) = mpsc::channel::<AppCommand>(1000);
    let (events, mut event_rx) = EventSink::channel();

    // 2. Spawn backend
    let backend = tokio::spawn(run_backend(settings.session.clone(), cmd_rx, events));

    println!("{}\n", input::HELP);

    // 3. Pump user input and core events until EOF or /quit
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                if let AppEvent::Connected { peer, .. } = &event {
                    settings.last_peer = Some(peer.clone());
                    settings.save();
                }
                println!("{}", render::render(&event));
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let cmd = match input::parse_line(&line) {
                    Input::Command(cmd) => cmd,
                    Input::ConnectLast => match settings.last_peer.clone() {
                        Some(peer) => AppCommand::Connect(peer),
                        None => {
                            println!("Please specify host and port.");
                            continue;
                        }
                    },
                    Input::Help => {
                        println!("{}", input::HELP);
                        continue;
                    }
                    Input::Quit => break,
                    Input::Invalid(msg) => {
                        println!("{}", msg);
                        continue;
                    }
                    Input::Empty => continue,
                };
                if cmd_tx.send(cmd).await.is_err() {
                    break;
                }
            }
        }
    }

    // 4. Let the backend close the session and finish outgoing transfers
    drop(cmd_tx);
    backend.await?;
    while let Ok(event) = event_rx.try_recv() {
        println!("{}", render::render(&event));
    }
    Ok(())
}
