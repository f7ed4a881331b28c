use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::segment::SegmentError;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Open { path: PathBuf, source: io::Error },
    InvalidPath(PathBuf),
    Segment(SegmentError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Open { path, source } => {
                write!(f, "File opening failed for {}: {}", path.display(), source)
            }
            Error::InvalidPath(path) => write!(f, "Invalid path: {:?}", path),
            Error::Segment(e) => write!(f, "Segment error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Open { source, .. } => Some(source),
            Error::Segment(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<SegmentError> for Error {
    fn from(err: SegmentError) -> Self {
        Error::Segment(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
