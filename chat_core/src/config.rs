use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Local knobs of a session. Loading and saving is left to the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Interface both the datagram socket and the file listener bind on.
    pub bind_ip: IpAddr,
    /// Directory received file names are joined onto.
    pub download_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            download_dir: PathBuf::from("."),
        }
    }
}

impl SessionConfig {
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert!(config.bind_ip.is_unspecified());
        assert_eq!(config.download_dir, PathBuf::from("."));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"download_dir":"/tmp/inbox"}"#).unwrap();
        assert_eq!(config.download_dir, PathBuf::from("/tmp/inbox"));
        assert!(config.bind_ip.is_unspecified());
    }
}
