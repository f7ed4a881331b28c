//! C standard library `FILE*` I/O
//!
//! The payload goes through `fopen`/`fwrite`/`fread`/`fclose` in a single call
//! each, the same way a C program would persist a buffer.

use log::{debug, warn};
use std::ffi::CString;
use std::io;
use std::path::Path;
use std::ptr;

use super::{ReadBuffer, Readback, Strategy, StrategyKind};
use crate::config::BenchConfig;
use crate::error::{Error, Result};

const MODE_WRITE_BINARY: &[u8] = b"wb\0";
const MODE_READ_BINARY: &[u8] = b"rb\0";

/// Owned `FILE*`, closed on drop if not closed explicitly
struct CFile {
    handle: *mut libc::FILE,
}

impl CFile {
    fn open(path: &Path, mode: &'static [u8]) -> Result<Self> {
        let c_path = c_path(path)?;
        let handle = unsafe { libc::fopen(c_path.as_ptr(), mode.as_ptr().cast::<libc::c_char>()) };

        if handle.is_null() {
            return Err(Error::Open {
                path: path.to_path_buf(),
                source: io::Error::last_os_error(),
            });
        }

        Ok(Self { handle })
    }

    fn write(&mut self, bytes: &[u8]) -> usize {
        unsafe { libc::fwrite(bytes.as_ptr().cast::<libc::c_void>(), 1, bytes.len(), self.handle) }
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        unsafe { libc::fread(buf.as_mut_ptr().cast::<libc::c_void>(), 1, buf.len(), self.handle) }
    }

    fn close(mut self) -> Result<()> {
        let handle = std::mem::replace(&mut self.handle, ptr::null_mut());
        if unsafe { libc::fclose(handle) } != 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl Drop for CFile {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe {
                libc::fclose(self.handle);
            }
        }
    }
}

#[cfg(unix)]
fn c_path(path: &Path) -> Result<CString> {
    use std::os::unix::ffi::OsStrExt;

    CString::new(path.as_os_str().as_bytes()).map_err(|_| Error::InvalidPath(path.to_path_buf()))
}

#[cfg(not(unix))]
fn c_path(path: &Path) -> Result<CString> {
    let path_str = path
        .to_str()
        .ok_or_else(|| Error::InvalidPath(path.to_path_buf()))?;
    CString::new(path_str).map_err(|_| Error::InvalidPath(path.to_path_buf()))
}

/// Write `bytes` to `path` with one `fwrite`, truncating any existing file
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = CFile::open(path, MODE_WRITE_BINARY)?;

    let written = file.write(bytes);
    if written != bytes.len() {
        warn!(
            "Short write to {}: {} of {} bytes",
            path.display(),
            written,
            bytes.len()
        );
    }

    file.close()
}

/// Read up to `expected_size` bytes from `path` with one `fread`
///
/// A short read is not an error: the buffer keeps `expected_size` bytes, the
/// tail stays zero and `bytes_read` tells how much arrived.
pub fn read_file(path: &Path, expected_size: usize) -> Result<ReadBuffer> {
    let mut file = CFile::open(path, MODE_READ_BINARY)?;

    let mut data = vec![0u8; expected_size];
    let bytes_read = file.read(&mut data);
    if bytes_read != expected_size {
        warn!(
            "Short read from {}: {} of {} bytes",
            path.display(),
            bytes_read,
            expected_size
        );
    }

    file.close()?;
    Ok(ReadBuffer { data, bytes_read })
}

/// C stdio strategy (`c`)
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioStrategy;

impl Strategy for StdioStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::C
    }

    fn round_trip(&self, config: &BenchConfig, payload: &[u8]) -> Result<Readback> {
        write_file(&config.path, payload)?;
        debug!("fwrite of {} bytes to {} done", payload.len(), config.path.display());

        let buffer = read_file(&config.path, config.payload_size)?;
        Ok(buffer.readback())
    }
}
