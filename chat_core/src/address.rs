//! Peer addressing: one host, two consecutive ports.
//!
//! The base port carries chat datagrams; `base_port + 1` carries file
//! transfers. The same numbers are used locally for listening and remotely
//! as the destination.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use tokio::net::lookup_host;

use crate::error::{ChatError, Result};

/// Highest base port that still leaves room for the file port.
pub const MAX_BASE_PORT: u16 = u16::MAX - 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPeerAddress")]
pub struct PeerAddress {
    host: String,
    base_port: u16,
}

#[derive(Deserialize)]
struct RawPeerAddress {
    host: String,
    base_port: u32,
}

impl TryFrom<RawPeerAddress> for PeerAddress {
    type Error = ChatError;

    fn try_from(raw: RawPeerAddress) -> Result<Self> {
        PeerAddress::new(raw.host, raw.base_port)
    }
}

impl PeerAddress {
    /// Build a peer address, rejecting base ports above [`MAX_BASE_PORT`].
    pub fn new(host: impl Into<String>, base_port: u32) -> Result<Self> {
        if base_port > MAX_BASE_PORT as u32 {
            return Err(ChatError::InvalidPort(base_port));
        }
        Ok(Self {
            host: host.into(),
            base_port: base_port as u16,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn base_port(&self) -> u16 {
        self.base_port
    }

    pub fn message_port(&self) -> u16 {
        self.base_port
    }

    pub fn file_port(&self) -> u16 {
        self.base_port + 1
    }

    /// Resolve the host into concrete message and file endpoints.
    ///
    /// When the host resolves to several addresses, one in the same family as
    /// `prefer` wins so that a socket bound on that family can reach it.
    pub async fn resolve(&self, prefer: Option<IpAddr>) -> Result<ResolvedPeer> {
        let target = format!("{}:{}", self.host, self.message_port());
        let candidates: Vec<SocketAddr> = lookup_host((self.host.as_str(), self.message_port()))
            .await
            .map_err(|source| ChatError::BindFailed {
                target: target.clone(),
                source,
            })?
            .collect();

        let chosen = prefer
            .and_then(|local| {
                candidates
                    .iter()
                    .find(|addr| addr.is_ipv4() == local.is_ipv4())
                    .copied()
            })
            .or_else(|| candidates.first().copied())
            .ok_or_else(|| ChatError::BindFailed {
                target,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "host did not resolve to any address",
                ),
            })?;

        Ok(ResolvedPeer {
            message_addr: chosen,
            file_addr: SocketAddr::new(chosen.ip(), self.file_port()),
        })
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.base_port)
    }
}

/// The two network endpoints of a peer after name resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPeer {
    pub message_addr: SocketAddr,
    pub file_addr: SocketAddr,
}

/// Local socket addresses a session binds for a given base port.
pub fn local_endpoints(bind_ip: IpAddr, base_port: u16) -> (SocketAddr, SocketAddr) {
    (
        SocketAddr::new(bind_ip, base_port),
        SocketAddr::new(bind_ip, base_port + 1),
    )
}
