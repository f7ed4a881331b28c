//! Buffered stream I/O

use log::{debug, warn};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::{ReadBuffer, Readback, Strategy, StrategyKind};
use crate::config::BenchConfig;
use crate::error::{Error, Result};

fn open_error(path: &Path) -> impl FnOnce(io::Error) -> Error + '_ {
    move |source| Error::Open {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `bytes` through a `BufWriter`, truncating any existing file
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let file = File::create(path).map_err(open_error(path))?;
    let mut writer = BufWriter::new(file);

    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read up to `expected_size` bytes through a `BufReader`
///
/// Reads until the buffer is full or the file ends; a short file leaves the
/// tail of the buffer zeroed.
pub fn read_file(path: &Path, expected_size: usize) -> Result<ReadBuffer> {
    let file = File::open(path).map_err(open_error(path))?;
    let mut reader = BufReader::new(file);

    let mut data = vec![0u8; expected_size];
    let bytes_read = fill(&mut reader, &mut data)?;
    if bytes_read != expected_size {
        warn!(
            "Short read from {}: {} of {} bytes",
            path.display(),
            bytes_read,
            expected_size
        );
    }

    Ok(ReadBuffer { data, bytes_read })
}

fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Buffered stream strategy (`cpp`)
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamStrategy;

impl Strategy for StreamStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Cpp
    }

    fn round_trip(&self, config: &BenchConfig, payload: &[u8]) -> Result<Readback> {
        write_file(&config.path, payload)?;
        debug!("Stream write of {} bytes to {} done", payload.len(), config.path.display());

        let buffer = read_file(&config.path, config.payload_size)?;
        Ok(buffer.readback())
    }
}
