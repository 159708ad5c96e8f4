//! Session lifecycle.
//!
//! A [`PeerSession`] owns the sockets bound for one peer and the two
//! background loops reading from them. [`ChatClient`] holds at most one
//! session and replaces it on reconnect: the old loops are cancelled and
//! joined, releasing both ports, before the new session binds.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::address::{PeerAddress, ResolvedPeer, local_endpoints};
use crate::config::SessionConfig;
use crate::error::{ChatError, Result};
use crate::message::{MessageChannel, MessageListener};
use crate::transfer::{receive_file, send_file_to};
use crate::{AppEvent, EventSink};

/// Pause after a failed `accept` so a persistent error cannot spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// How long [`ChatClient::shutdown`] waits for outgoing files.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Sockets and background loops for one connected peer.
pub struct PeerSession {
    peer: PeerAddress,
    resolved: ResolvedPeer,
    channel: MessageChannel,
    local_message_addr: SocketAddr,
    local_file_addr: SocketAddr,
    cancel: CancellationToken,
    message_loop: Option<JoinHandle<()>>,
    file_loop: Option<JoinHandle<Option<JoinHandle<()>>>>,
}

impl PeerSession {
    /// Resolve `peer`, bind both local ports and start the receive loops.
    pub async fn establish(
        peer: PeerAddress,
        config: &SessionConfig,
        events: EventSink,
    ) -> Result<Self> {
        let resolved = peer.resolve(Some(config.bind_ip)).await?;
        let (message_bind, file_bind) = local_endpoints(config.bind_ip, peer.base_port());

        let channel = MessageChannel::bind(message_bind).await?;
        let listener = TcpListener::bind(file_bind)
            .await
            .map_err(|source| ChatError::BindFailed {
                target: format!("tcp {}", file_bind),
                source,
            })?;
        let local_message_addr = channel.local_addr()?;
        let local_file_addr = listener.local_addr()?;

        let cancel = CancellationToken::new();
        let message_loop = tokio::spawn(run_message_loop(
            channel.listen(cancel.clone()),
            events.clone(),
        ));
        let file_loop = tokio::spawn(run_file_loop(
            listener,
            config.download_dir.clone(),
            cancel.clone(),
            events,
        ));

        info!(
            "Connected to {} at UDP {} and TCP {}",
            peer.host(),
            peer.message_port(),
            peer.file_port()
        );

        Ok(Self {
            peer,
            resolved,
            channel,
            local_message_addr,
            local_file_addr,
            cancel,
            message_loop: Some(message_loop),
            file_loop: Some(file_loop),
        })
    }

    pub fn peer(&self) -> &PeerAddress {
        &self.peer
    }

    pub fn resolved(&self) -> ResolvedPeer {
        self.resolved
    }

    pub fn local_message_addr(&self) -> SocketAddr {
        self.local_message_addr
    }

    pub fn local_file_addr(&self) -> SocketAddr {
        self.local_file_addr
    }

    pub async fn send_text(&self, payload: &[u8]) -> Result<()> {
        self.channel
            .send_to(self.resolved.message_addr, payload)
            .await
    }

    /// Stream `path` to the peer on its own task and report the outcome as
    /// `FileSent` / `FileSendError`.
    pub fn spawn_file_send(&self, path: PathBuf, events: EventSink) -> JoinHandle<()> {
        let target = self.resolved.file_addr;
        tokio::spawn(async move {
            match send_file_to(target, &path, Some(&events)).await {
                Ok(sent) => {
                    info!("File has been sent: {} ({} bytes)", sent.name, sent.byte_count);
                    events.emit(AppEvent::FileSent {
                        name: sent.name,
                        byte_count: sent.byte_count,
                    });
                }
                Err(e) => {
                    warn!("Error sending file {}: {}", path.display(), e);
                    events.emit(AppEvent::FileSendError(format!(
                        "Error sending file {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        })
    }

    /// Cancel and join both loops. Returns a file receive that was still in
    /// flight, if any; it keeps running on its own connection.
    pub async fn shutdown(mut self) -> Vec<JoinHandle<()>> {
        self.cancel.cancel();
        let mut lingering = Vec::new();

        if let Some(handle) = self.message_loop.take() {
            if let Err(e) = handle.await {
                error!("Message loop task failed: {}", e);
            }
        }
        if let Some(handle) = self.file_loop.take() {
            match handle.await {
                Ok(Some(in_flight)) => lingering.push(in_flight),
                Ok(None) => {}
                Err(e) => error!("File loop task failed: {}", e),
            }
        }

        info!("Session with {} closed", self.peer);
        lingering
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_message_loop(mut listener: MessageListener, events: EventSink) {
    debug!("Message loop started");
    loop {
        match listener.next().await {
            Ok(message) => events.emit(AppEvent::MessageReceived {
                from: message.from,
                payload: message.payload,
            }),
            Err(e) if e.is_closed() => break,
            Err(e) => {
                warn!("Error receiving text message: {}", e);
                events.emit(AppEvent::ConnectionError(format!(
                    "Error receiving text message: {}",
                    e
                )));
                if !e.is_recoverable() {
                    break;
                }
            }
        }
    }
    debug!("Message loop stopped");
}

/// Accept and receive files one connection at a time until cancelled.
async fn run_file_loop(
    listener: TcpListener,
    download_dir: PathBuf,
    cancel: CancellationToken,
    events: EventSink,
) -> Option<JoinHandle<()>> {
    debug!("File loop started");
    loop {
        let accepted = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            res = listener.accept() => res,
        };

        let (stream, remote_addr) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Failed to accept file connection: {}", e);
                events.emit(AppEvent::FileReceiveError(format!(
                    "Error accepting file connection: {}",
                    e
                )));
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        let mut transfer = tokio::spawn(receive_and_report(
            stream,
            remote_addr,
            download_dir.clone(),
            events.clone(),
        ));

        // Cancelling releases the listener; the transfer keeps its stream.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("File loop stopped with a transfer in flight");
                return Some(transfer);
            }
            res = &mut transfer => {
                if let Err(e) = res {
                    error!("Receive task failed: {}", e);
                }
            }
        }
    }
    debug!("File loop stopped");
    None
}

async fn receive_and_report(
    mut stream: TcpStream,
    remote_addr: SocketAddr,
    download_dir: PathBuf,
    events: EventSink,
) {
    info!("Incoming file connection from {}", remote_addr);
    match receive_file(&mut stream, &download_dir, Some(&events)).await {
        Ok(received) => {
            info!(
                "Received file: {} ({} bytes)",
                received.name, received.byte_count
            );
            events.emit(AppEvent::FileReceived {
                name: received.name,
                byte_count: received.byte_count,
                path: received.path,
            });
        }
        Err(e) => {
            warn!("Error receiving file from {}: {}", remote_addr, e);
            events.emit(AppEvent::FileReceiveError(format!(
                "Error receiving file: {}",
                e
            )));
        }
    }
}

/// Holds the single active session of a presentation context.
pub struct ChatClient {
    config: SessionConfig,
    events: EventSink,
    state: SessionState,
    session: Option<PeerSession>,
    /// Outgoing file sends.
    transfers: Vec<JoinHandle<()>>,
    /// Receives that outlived the session they were accepted on.
    receives: Vec<JoinHandle<()>>,
}

impl ChatClient {
    pub fn new(config: SessionConfig, events: EventSink) -> Self {
        Self {
            config,
            events,
            state: SessionState::Disconnected,
            session: None,
            transfers: Vec::new(),
            receives: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> Option<&PeerSession> {
        self.session.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Tear down the current session (if any) and establish a new one.
    ///
    /// On failure the client stays `Disconnected`.
    pub async fn connect(&mut self, peer: PeerAddress) -> Result<()> {
        self.retire_session().await;
        self.state = SessionState::Connecting;

        match PeerSession::establish(peer, &self.config, self.events.clone()).await {
            Ok(session) => {
                self.events.emit(AppEvent::Connected {
                    peer: session.peer().clone(),
                    message_port: session.local_message_addr().port(),
                    file_port: session.local_file_addr().port(),
                });
                self.session = Some(session);
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(e) => {
                warn!("Connect failed: {}", e);
                self.state = SessionState::Disconnected;
                Err(e)
            }
        }
    }

    pub async fn send_text(&self, payload: &[u8]) -> Result<()> {
        let session = self.session.as_ref().ok_or(ChatError::NotConnected)?;
        session.send_text(payload).await
    }

    /// Start sending `path` in the background. Only `NotConnected` is
    /// reported here; everything else arrives as an event.
    pub fn send_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let session = self.session.as_ref().ok_or(ChatError::NotConnected)?;
        let handle = session.spawn_file_send(path.as_ref().to_path_buf(), self.events.clone());
        self.prune_finished();
        self.transfers.push(handle);
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        self.retire_session().await;
        self.state = SessionState::Disconnected;
    }

    /// Number of file transfers still running, sends and receives alike.
    pub fn active_transfers(&mut self) -> usize {
        self.prune_finished();
        self.transfers.len() + self.receives.len()
    }

    /// Disconnect and join every transfer task.
    ///
    /// Receives still in flight are aborted, their partial files stay on
    /// disk. Outgoing files get [`SHUTDOWN_GRACE`] to finish before they
    /// are aborted too.
    pub async fn shutdown(mut self) {
        self.disconnect().await;

        for handle in self.receives.drain(..) {
            if !handle.is_finished() {
                info!("Aborting file receive still in flight");
                handle.abort();
            }
            log_join_failure(handle.await);
        }

        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        for mut handle in self.transfers.drain(..) {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(res) => log_join_failure(res),
                Err(_) => {
                    warn!("File send still running at shutdown, aborting");
                    handle.abort();
                    log_join_failure(handle.await);
                }
            }
        }
    }

    async fn retire_session(&mut self) {
        self.prune_finished();
        if let Some(previous) = self.session.take() {
            let lingering = previous.shutdown().await;
            self.receives.extend(lingering);
            self.events.emit(AppEvent::Disconnected);
        }
    }

    fn prune_finished(&mut self) {
        self.transfers.retain(|h| !h.is_finished());
        self.receives.retain(|h| !h.is_finished());
    }
}

fn log_join_failure(res: std::result::Result<(), JoinError>) {
    if let Err(e) = res {
        if !e.is_cancelled() {
            error!("Transfer task failed: {}", e);
        }
    }
}
