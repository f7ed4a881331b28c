//! Run configuration shared by every strategy

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File the reference run writes into the working directory
pub const DEFAULT_PATH: &str = "file121.bin";

/// Payload size of the reference run (1 GiB)
pub const DEFAULT_PAYLOAD_SIZE: usize = 1024 * 1024 * 1024;

/// Filler byte of the reference run
pub const DEFAULT_FILLER: u8 = b'!';

/// Where a run writes and how large its payload is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// File every strategy writes to and reads back from
    pub path: PathBuf,
    /// Number of payload bytes
    pub payload_size: usize,
    /// Value every payload byte is set to
    pub filler: u8,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PATH),
            payload_size: DEFAULT_PAYLOAD_SIZE,
            filler: DEFAULT_FILLER,
        }
    }
}

impl BenchConfig {
    /// Create a configuration for the given path and payload size with the default filler
    pub fn new(path: impl Into<PathBuf>, payload_size: usize) -> Self {
        Self {
            path: path.into(),
            payload_size,
            ..Default::default()
        }
    }

    /// Replace the filler byte
    pub fn with_filler(mut self, filler: u8) -> Self {
        self.filler = filler;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_reference_run() {
        let config = BenchConfig::default();
        assert_eq!(config.path, PathBuf::from("file121.bin"));
        assert_eq!(config.payload_size, 1 << 30);
        assert_eq!(config.filler, b'!');
    }

    #[test]
    fn test_builder_keeps_path_and_size() {
        let config = BenchConfig::new("/tmp/x.bin", 4096).with_filler(0x7f);
        assert_eq!(config.path, PathBuf::from("/tmp/x.bin"));
        assert_eq!(config.payload_size, 4096);
        assert_eq!(config.filler, 0x7f);
    }
}
