//! Memory-mapped segment strategy
//!
//! The writer creates a managed segment and constructs one named container
//! holding a copy of the payload. The reader maps the same path again,
//! read-only, and inspects the container in place.

use log::debug;
use std::path::Path;

use super::{Readback, Strategy, StrategyKind};
use crate::config::BenchConfig;
use crate::error::Result;
use crate::segment::{ManagedMappedFile, MappedSegment, MIN_SEGMENT_SIZE};

/// Name of the container the payload is stored under
pub const PAYLOAD_CONTAINER: &str = "payload";

/// Segment size for a payload: twice its length, leaving room for bookkeeping
pub fn segment_capacity(payload_len: usize) -> u64 {
    (payload_len as u64).saturating_mul(2).max(MIN_SEGMENT_SIZE)
}

/// Create a new segment at `path` holding `bytes` under `PAYLOAD_CONTAINER`
///
/// Fails if `path` already exists.
pub fn write_segment(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut segment = ManagedMappedFile::create(path, segment_capacity(bytes.len()))?;
    let container = segment.construct(PAYLOAD_CONTAINER, bytes)?;
    debug!(
        "Payload container at offset {} in {} byte segment",
        container.offset,
        segment.capacity()
    );
    segment.close()?;
    Ok(())
}

/// Open the segment at `path` read-only and summarise its payload container
pub fn read_segment(path: &Path) -> Result<Readback> {
    let segment = MappedSegment::open_read_only(path)?;
    let container = segment.find(PAYLOAD_CONTAINER)?;
    Ok(Readback::of(container))
}

/// Memory-mapped segment strategy (`mmf`)
#[derive(Debug, Clone, Copy, Default)]
pub struct MappedStrategy;

impl Strategy for MappedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Mmf
    }

    fn round_trip(&self, config: &BenchConfig, payload: &[u8]) -> Result<Readback> {
        write_segment(&config.path, payload)?;
        read_segment(&config.path)
    }
}
