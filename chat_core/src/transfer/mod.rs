//! Length-prefixed file transfer over TCP.
//!
//! Stream layout, all integers big-endian:
//!
//! ```text
//! +-----------+---------------+----------...-+------------...-+
//! | name len  | content len   | name (UTF-8) | content (raw)  |
//! | u32       | u64           | name len     | content len    |
//! +-----------+---------------+----------...-+------------...-+
//! ```
//!
//! There is no version field, checksum or end marker: the two declared
//! lengths are the only framing.

pub mod constants;
pub mod progress;
pub mod protocol;
pub mod receiver;
pub mod sender;

// Re-export public API
pub use constants::{BUFFER_SIZE, MAX_NAME_LENGTH};
pub use protocol::{FileHeader, copy_content, read_header, write_header};
pub use receiver::{ReceivedFile, accept_once, receive_file};
pub use sender::{SentFile, send_file, send_file_to};
