//! Timed dispatch of a single benchmark run

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::config::BenchConfig;
use crate::error::Result;
use crate::payload;
use crate::strategy::{Readback, StrategyKind};

/// A prepared run: configuration plus the payload built from it
#[derive(Debug)]
pub struct Bench {
    config: BenchConfig,
    payload: Vec<u8>,
}

/// Outcome of one dispatch
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Token the run was dispatched on
    pub token: String,
    /// Strategy the token selected, if any
    pub strategy: Option<StrategyKind>,
    /// Configuration of the run
    pub config: BenchConfig,
    /// Payload size in bytes
    pub input_size: usize,
    /// What the strategy read back; `None` when nothing ran
    pub readback: Option<Readback>,
    /// Wall-clock time from just before dispatch to just after
    pub elapsed_ns: u64,
    /// When the timed section started
    pub started_at: DateTime<Utc>,
}

impl Bench {
    /// Build the payload described by `config`
    pub fn new(config: BenchConfig) -> Self {
        let payload = payload::build(config.payload_size, config.filler);
        Self { config, payload }
    }

    /// Configuration of this run
    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// The payload every strategy persists
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload size in bytes
    pub fn input_size(&self) -> usize {
        self.payload.len()
    }

    /// Run the strategy named by `token`, timing the whole dispatch
    ///
    /// An unrecognised token runs nothing; the report still carries the
    /// (near zero) elapsed time.
    pub fn dispatch(&self, token: &str) -> Result<RunReport> {
        let kind = StrategyKind::from_token(token);
        let strategy = kind.map(StrategyKind::strategy);

        match kind {
            Some(kind) => info!(
                "Dispatching '{}' for {} bytes at {}",
                kind,
                self.payload.len(),
                self.config.path.display()
            ),
            None => info!("No strategy matches token '{}', nothing to run", token),
        }

        let started_at = Utc::now();
        let begin = Instant::now();

        let readback = match &strategy {
            Some(strategy) => Some(strategy.round_trip(&self.config, &self.payload)?),
            None => None,
        };

        let elapsed = begin.elapsed();

        Ok(RunReport {
            token: token.to_string(),
            strategy: kind,
            config: self.config.clone(),
            input_size: self.payload.len(),
            readback,
            elapsed_ns: duration_nanos(elapsed),
            started_at,
        })
    }
}

/// Build the payload for `config` and dispatch on `token`
pub fn run(config: BenchConfig, token: &str) -> Result<RunReport> {
    Bench::new(config).dispatch(token)
}

fn duration_nanos(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
}

impl RunReport {
    /// Elapsed time as a `Duration`
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns)
    }

    /// Whether a strategy ran
    pub fn is_idle(&self) -> bool {
        self.strategy.is_none()
    }

    /// Write the verification and timing lines
    ///
    /// ```text
    /// Output datasize = 1073741824 (!)
    /// 956962363ns
    /// ```
    pub fn write_summary<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if let Some(readback) = &self.readback {
            writeln!(
                out,
                "Output datasize = {} ({})",
                readback.len,
                display_byte(readback.last_byte)
            )?;
        }
        writeln!(out, "{}ns", self.elapsed_ns)
    }
}

fn display_byte(byte: Option<u8>) -> String {
    match byte {
        Some(b) if b.is_ascii_graphic() => char::from(b).to_string(),
        Some(b) => format!("\\x{:02x}", b),
        None => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_idle_token_touches_nothing() {
        let temp_dir = tempdir().unwrap();
        let config = BenchConfig::new(temp_dir.path().join("file.bin"), 1024);

        let report = run(config.clone(), "xyz").unwrap();
        assert!(report.is_idle());
        assert!(report.readback.is_none());
        assert_eq!(report.input_size, 1024);
        assert!(!config.path.exists());
    }

    #[test]
    fn test_summary_lines() {
        let report = RunReport {
            token: "c".to_string(),
            strategy: Some(StrategyKind::C),
            config: BenchConfig::new("file.bin", 3),
            input_size: 3,
            readback: Some(Readback::of(b"!!!")),
            elapsed_ns: 42,
            started_at: Utc::now(),
        };

        let mut out = Vec::new();
        report.write_summary(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Output datasize = 3 (!)\n42ns\n"
        );
    }

    #[test]
    fn test_idle_summary_prints_only_timer() {
        let report = RunReport {
            token: "xyz".to_string(),
            strategy: None,
            config: BenchConfig::new("file.bin", 0),
            input_size: 0,
            readback: None,
            elapsed_ns: 7,
            started_at: Utc::now(),
        };

        let mut out = Vec::new();
        report.write_summary(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "7ns\n");
    }

    #[test]
    fn test_display_byte() {
        assert_eq!(display_byte(Some(b'!')), "!");
        assert_eq!(display_byte(Some(0)), "\\x00");
        assert_eq!(display_byte(None), "none");
    }

    #[test]
    fn test_report_serializes() {
        let temp_dir = tempdir().unwrap();
        let config = BenchConfig::new(temp_dir.path().join("file.bin"), 128);

        let report = run(config, "cpp").unwrap();
        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["strategy"], "cpp");
        assert_eq!(json["readback"]["len"], 128);
        assert_eq!(json["readback"]["last_byte"], 33);
        assert_eq!(json["config"]["payload_size"], 128);
    }
}
