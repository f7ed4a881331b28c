//! iobench Core - persistence strategy benchmarks
//!
//! This crate provides the pieces of a single-shot benchmark that persists a
//! large in-memory payload to disk and reads it back, using one of three
//! strategies:
//!
//! - `c`: the C standard library `FILE*` API
//! - `cpp`: buffered stream objects
//! - `mmf`: a managed memory-mapped segment holding the payload as a named
//!   container
//!
//! The dispatcher times exactly one strategy per run.

#![warn(rust_2018_idioms)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod payload;
pub mod segment;
pub mod strategy;

// Re-export the most commonly used types
pub use config::BenchConfig;
pub use dispatch::{run, Bench, RunReport};
pub use error::{Error, Result};
pub use segment::SegmentError;
pub use strategy::{Readback, Strategy, StrategyKind};

/// Re-export common types and traits
pub mod prelude {
    pub use crate::error::Result;
    pub use crate::strategy::Strategy;
}
