/// Buffer size for streaming file content (64KB)
pub const BUFFER_SIZE: usize = 64 * 1024;

/// Name length (u32) + content length (u64), both big-endian
pub const FIXED_HEADER_LEN: usize = 4 + 8;

/// Longest file name accepted on either side of a transfer
pub const MAX_NAME_LENGTH: usize = 4096;

/// File written for a transfer whose name is empty. Later empty-name
/// transfers get a numeric suffix (`unnamed.1`, `unnamed.2`, ...).
pub const UNNAMED_FILE: &str = "unnamed";

/// Minimum number of bytes between two progress events
pub const PROGRESS_INTERVAL: u64 = 1024 * 1024;
