//! Best-effort datagram channel for chat text.

use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::address::PeerAddress;
use crate::error::{ChatError, Result};

/// Largest UDP payload that never fragments:
/// 576 (minimum reassembly buffer) - 60 (max IPv4 header) - 8 (UDP header).
pub const TEXT_MAX: usize = 508;

/// One datagram as it came off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub from: SocketAddr,
    pub payload: Bytes,
}

/// A UDP socket bound on the message port, used both to send and to receive.
#[derive(Debug, Clone)]
pub struct MessageChannel {
    socket: Arc<UdpSocket>,
}

impl MessageChannel {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ChatError::BindFailed {
                target: format!("udp {}", addr),
                source,
            })?;
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Resolve `peer` and send one datagram to its message port.
    pub async fn send(&self, peer: &PeerAddress, payload: &[u8]) -> Result<()> {
        check_payload(payload)?;
        let local_ip = self.local_addr().ok().map(|addr| addr.ip());
        let resolved = peer.resolve(local_ip).await.map_err(|e| match e {
            ChatError::BindFailed { source, .. } => ChatError::SendFailed(source),
            other => other,
        })?;
        self.send_to(resolved.message_addr, payload).await
    }

    /// Send one datagram to an already resolved address.
    pub async fn send_to(&self, target: SocketAddr, payload: &[u8]) -> Result<()> {
        check_payload(payload)?;
        let sent = self
            .socket
            .send_to(payload, target)
            .await
            .map_err(ChatError::SendFailed)?;
        if sent != payload.len() {
            return Err(ChatError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("datagram truncated to {} of {} bytes", sent, payload.len()),
            )));
        }
        debug!("Sent {} byte datagram to {}", sent, target);
        Ok(())
    }

    /// Start receiving on this socket until `cancel` fires.
    pub fn listen(&self, cancel: CancellationToken) -> MessageListener {
        MessageListener {
            socket: Some(self.socket.clone()),
            cancel,
            buf: vec![0u8; TEXT_MAX].into_boxed_slice(),
        }
    }
}

fn check_payload(payload: &[u8]) -> Result<()> {
    if payload.len() > TEXT_MAX {
        return Err(ChatError::PayloadTooLarge {
            len: payload.len(),
            max: TEXT_MAX,
        });
    }
    Ok(())
}

/// Lazy sequence of received datagrams.
///
/// Once it has yielded `ChannelClosed` or an unrecoverable error it releases
/// its socket handle and keeps returning `ChannelClosed`.
#[derive(Debug)]
pub struct MessageListener {
    socket: Option<Arc<UdpSocket>>,
    cancel: CancellationToken,
    buf: Box<[u8]>,
}

impl MessageListener {
    pub async fn next(&mut self) -> Result<InboundMessage> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(ChatError::ChannelClosed);
        };

        // Anything past TEXT_MAX is cut off by the kernel.
        let received = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            res = socket.recv_from(&mut self.buf) => Some(res),
        };

        match received {
            None => {
                self.socket = None;
                Err(ChatError::ChannelClosed)
            }
            Some(Ok((len, from))) => {
                debug!("Received {} byte datagram from {}", len, from);
                Ok(InboundMessage {
                    from,
                    payload: Bytes::copy_from_slice(&self.buf[..len]),
                })
            }
            Some(Err(e)) => {
                let err = ChatError::IoFailure(e);
                if !err.is_recoverable() {
                    self.socket = None;
                }
                Err(err)
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }
}
