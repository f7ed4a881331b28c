//! Persistence strategies under benchmark

pub mod mapped;
pub mod stdio;
pub mod stream;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::BenchConfig;
use crate::error::Result;

pub use self::mapped::MappedStrategy;
pub use self::stdio::StdioStrategy;
pub use self::stream::StreamStrategy;

/// The strategies a run can dispatch to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// C standard library `FILE*` I/O
    C,
    /// Buffered stream objects
    Cpp,
    /// Managed memory-mapped segment
    Mmf,
}

impl StrategyKind {
    /// Every strategy, in command-line order
    pub const ALL: [StrategyKind; 3] = [StrategyKind::C, StrategyKind::Cpp, StrategyKind::Mmf];

    /// Exact, case-sensitive match of a command-line token
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "c" => Some(StrategyKind::C),
            "cpp" => Some(StrategyKind::Cpp),
            "mmf" => Some(StrategyKind::Mmf),
            _ => None,
        }
    }

    /// Command-line token selecting this strategy
    pub fn token(self) -> &'static str {
        match self {
            StrategyKind::C => "c",
            StrategyKind::Cpp => "cpp",
            StrategyKind::Mmf => "mmf",
        }
    }

    /// Implementation of this strategy
    pub fn strategy(self) -> Box<dyn Strategy> {
        match self {
            StrategyKind::C => Box::new(StdioStrategy),
            StrategyKind::Cpp => Box::new(StreamStrategy),
            StrategyKind::Mmf => Box::new(MappedStrategy),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// What a strategy saw when reading its file back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readback {
    /// Size of the sequence handed back to the caller
    pub len: usize,
    /// Bytes actually read from the file; below `len` on a short read
    pub bytes_read: usize,
    /// Last element of the sequence, `None` when it is empty
    pub last_byte: Option<u8>,
}

impl Readback {
    /// Summarise a sequence that was read in full
    pub fn of(bytes: &[u8]) -> Self {
        Self {
            len: bytes.len(),
            bytes_read: bytes.len(),
            last_byte: bytes.last().copied(),
        }
    }

    /// Whether fewer bytes came back than were asked for
    pub fn is_short(&self) -> bool {
        self.bytes_read < self.len
    }
}

/// A freshly sized buffer filled by a one-shot read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBuffer {
    /// The buffer; bytes past `bytes_read` are zero
    pub data: Vec<u8>,
    /// Bytes actually read from the file
    pub bytes_read: usize,
}

impl ReadBuffer {
    /// Summary of the buffer as the dispatcher reports it
    pub fn readback(&self) -> Readback {
        Readback {
            len: self.data.len(),
            bytes_read: self.bytes_read,
            last_byte: self.data.last().copied(),
        }
    }
}

/// A way of persisting a payload and getting it back
pub trait Strategy {
    /// Which strategy this is
    fn kind(&self) -> StrategyKind;

    /// Write `payload` to `config.path`, then read it back through a fresh handle
    fn round_trip(&self, config: &BenchConfig, payload: &[u8]) -> Result<Readback>;
}
