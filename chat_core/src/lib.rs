use bytes::Bytes;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::sync::mpsc;

pub mod address;
pub mod config;
pub mod error;
pub mod message;
pub mod session;
pub mod transfer;

pub use address::PeerAddress;
pub use config::SessionConfig;
pub use error::{ChatError, Result};
pub use message::{MessageChannel, TEXT_MAX};
pub use session::{ChatClient, PeerSession, SessionState};

//Command from the presentation layer to Core
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Replace the current session with one bound to this peer's ports
    Connect(PeerAddress),
    /// Send one datagram to the connected peer
    SendText(Vec<u8>),
    /// Stream a local file to the connected peer
    SendFile(PathBuf),
    /// Close the current session
    Disconnect,
}

//Report from Core to the presentation layer
#[derive(Debug, Clone)]
pub enum AppEvent {
    Status(String),

    /// Local sockets are bound and both receive loops are running
    Connected {
        peer: PeerAddress,
        message_port: u16,
        file_port: u16,
    },
    /// The previous session's sockets have been released
    Disconnected,
    /// Loop-level failure (receive errors, bind failures on connect)
    ConnectionError(String),

    MessageReceived {
        from: SocketAddr,
        payload: Bytes,
    },
    /// Local echo of a datagram that left the socket
    MessageSent {
        payload: Bytes,
    },
    MessageSendError(String),

    FileSendStarted {
        name: String,
        byte_count: u64,
    },
    FileSent {
        name: String,
        byte_count: u64,
    },
    FileSendError(String),

    FileReceived {
        name: String,
        byte_count: u64,
        path: PathBuf,
    },
    FileReceiveError(String),

    TransferProgress {
        file_name: String,
        bytes_done: u64,
        total_bytes: u64,
        speed: String,
        is_sending: bool,
    },
}

/// Non-blocking handoff of events to the presentation layer.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: AppEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::debug!("Event consumer is gone, dropping {:?}", e.0);
        }
    }
}

/// Execute commands until the command channel closes, then shut down the
/// session and wait for outstanding file sends.
pub async fn run_backend(
    config: SessionConfig,
    mut cmd_rx: mpsc::Receiver<AppCommand>,
    events: EventSink,
) {
    let mut client = ChatClient::new(config, events.clone());

    // Main loop: Wait for commands from UI
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            AppCommand::Connect(peer) => {
                tracing::info!("Connecting to {}", peer);
                if let Err(e) = client.connect(peer).await {
                    events.emit(AppEvent::ConnectionError(format!(
                        "Cannot connect to the specified host: {}",
                        e
                    )));
                }
            }
            AppCommand::SendText(payload) => match client.send_text(&payload).await {
                Ok(()) => events.emit(AppEvent::MessageSent {
                    payload: Bytes::from(payload),
                }),
                Err(e) => {
                    tracing::warn!("Error sending text message: {}", e);
                    events.emit(AppEvent::MessageSendError(format!(
                        "Error sending text message: {}",
                        e
                    )));
                }
            },
            AppCommand::SendFile(path) => {
                tracing::info!("Initiating transfer of {}", path.display());
                if let Err(e) = client.send_file(&path) {
                    events.emit(AppEvent::FileSendError(format!(
                        "Error sending file {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
            AppCommand::Disconnect => {
                if client.state() == SessionState::Connected {
                    client.disconnect().await;
                } else {
                    events.emit(AppEvent::Status("Not connected".to_string()));
                }
            }
        }
    }

    tracing::info!("Command channel closed, shutting down");
    client.shutdown().await;
}
