use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChatError>;

/// Every failure the transport core can surface.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Base port leaves no room for the file port (`base_port + 1`).
    #[error("base port {0} is out of range (must be at most {max})", max = crate::address::MAX_BASE_PORT)]
    InvalidPort(u32),

    /// A local socket could not be bound, or the peer host did not resolve.
    #[error("cannot bind {target}: {source}")]
    BindFailed {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("not connected to a peer")]
    NotConnected,

    #[error("payload of {len} bytes exceeds the {max}-byte datagram limit")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("failed to send datagram: {0}")]
    SendFailed(#[source] io::Error),

    #[error("cannot connect to {addr}: {source}")]
    ConnectionFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("header is corrupted: {0}")]
    HeaderCorrupted(String),

    /// Stream ended before the declared content length was reached.
    #[error("file ended prematurely: received {received} of {expected} bytes")]
    TransferIncomplete { expected: u64, received: u64 },

    #[error("i/o failure: {0}")]
    IoFailure(#[from] io::Error),

    /// The channel was shut down on purpose.
    #[error("channel closed")]
    ChannelClosed,
}

impl ChatError {
    /// Whether a receive loop may keep going after this error.
    ///
    /// ICMP feedback from an earlier send (reset/refused) shows up on the next
    /// `recv_from` on some platforms; it says nothing about our own socket.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ChatError::IoFailure(e) | ChatError::SendFailed(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
                    | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Intentional shutdown rather than a failure.
    pub fn is_closed(&self) -> bool {
        matches!(self, ChatError::ChannelClosed)
    }
}
