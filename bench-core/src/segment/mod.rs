//! Managed memory-mapped segments
//!
//! A segment is a single file mapped into memory whose contents describe
//! themselves: a header, a small directory of named containers and a data
//! region that containers are carved out of by a bump allocator. A writer
//! creates the segment and constructs containers in it; any later reader maps
//! the same path read-only and locates containers by name, without copying
//! their bytes out of the mapping.

mod allocator;
mod layout;

use log::debug;
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use self::allocator::{align_up, BumpAllocator};
pub use self::layout::{
    metadata_checksum, DirEntry, SegmentHeader, ALIGNMENT, DATA_OFFSET, ENTRY_SIZE, HEADER_SIZE,
    MAX_ENTRIES, MAX_NAME_LEN, MIN_SEGMENT_SIZE, SEGMENT_MAGIC, SEGMENT_VERSION,
};

/// Error type for segment operations
#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Segment already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
    #[error("Segment not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Invalid magic number")]
    InvalidMagic,
    #[error("Unsupported segment version: {0}")]
    UnsupportedVersion(u32),
    #[error("Header checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
    #[error("Segment capacity {0} is too small (minimum {MIN_SEGMENT_SIZE})")]
    CapacityTooSmall(u64),
    #[error("Corrupt segment: {0}")]
    Corrupt(String),
    #[error("Container name is empty")]
    EmptyName,
    #[error("Container name too long: {0} bytes (maximum {MAX_NAME_LEN})")]
    NameTooLong(usize),
    #[error("Container already exists: {0}")]
    DuplicateName(String),
    #[error("Container directory is full ({MAX_ENTRIES} entries)")]
    DirectoryFull,
    #[error("Out of space: requested {requested} bytes, {available} available")]
    OutOfSpace { requested: usize, available: usize },
    #[error("Container not found: {0}")]
    ContainerNotFound(String),
}

/// Where a constructed container landed in its segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRef {
    /// Container name
    pub name: String,
    /// Offset of the first byte within the segment
    pub offset: usize,
    /// Number of bytes in the container
    pub len: usize,
}

/// A segment mapped read-write by the process that created it
#[derive(Debug)]
pub struct ManagedMappedFile {
    path: PathBuf,
    file: File,
    map: MmapMut,
    header: SegmentHeader,
    entries: Vec<DirEntry>,
    allocator: BumpAllocator,
}

impl ManagedMappedFile {
    /// Create a new segment of `capacity` bytes. Never overwrites an existing file.
    pub fn create(path: impl AsRef<Path>, capacity: u64) -> Result<Self, SegmentError> {
        let path = path.as_ref().to_path_buf();
        if capacity < MIN_SEGMENT_SIZE {
            return Err(SegmentError::CapacityTooSmall(capacity));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => SegmentError::AlreadyExists(path.clone()),
                _ => SegmentError::Io(e),
            })?;

        file.set_len(capacity)?;

        // The file was created by this call and is not shared with other writers
        let map = unsafe { MmapOptions::new().map_mut(&file)? };
        let allocator = BumpAllocator::new(DATA_OFFSET, map.len());

        let mut segment = Self {
            path,
            file,
            map,
            header: SegmentHeader::new(capacity),
            entries: Vec::new(),
            allocator,
        };
        segment.write_metadata()?;

        debug!(
            "Created segment {} with capacity {} bytes",
            segment.path.display(),
            capacity
        );

        Ok(segment)
    }

    /// Construct a named container holding a copy of `bytes`
    pub fn construct(&mut self, name: &str, bytes: &[u8]) -> Result<ContainerRef, SegmentError> {
        layout::validate_name(name)?;

        if self.entries.iter().any(|entry| entry.name == name) {
            return Err(SegmentError::DuplicateName(name.to_string()));
        }
        if self.entries.len() >= MAX_ENTRIES {
            return Err(SegmentError::DirectoryFull);
        }

        let range = self.allocator.allocate(bytes.len())?;
        self.map[range.clone()].copy_from_slice(bytes);

        self.entries
            .push(DirEntry::new(name, range.start as u64, bytes.len() as u64)?);
        self.write_metadata()?;

        debug!(
            "Constructed container '{}' at offset {} ({} bytes, {} of {} used)",
            name,
            range.start,
            bytes.len(),
            self.allocator.used(),
            self.map.len() - DATA_OFFSET
        );

        Ok(ContainerRef {
            name: name.to_string(),
            offset: range.start,
            len: bytes.len(),
        })
    }

    /// Bytes of a container constructed in this mapping
    pub fn find(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &self.map[entry.offset as usize..(entry.offset + entry.len) as usize])
    }

    /// Flush dirty pages of the mapping to the file
    pub fn flush(&self) -> Result<(), SegmentError> {
        self.map.flush()?;
        Ok(())
    }

    /// Flush, unmap and close the segment
    pub fn close(self) -> Result<(), SegmentError> {
        self.map.flush()?;
        drop(self.map);
        self.file.sync_all()?;
        debug!("Closed segment {}", self.path.display());
        Ok(())
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total size of the segment in bytes
    pub fn capacity(&self) -> u64 {
        self.header.capacity
    }

    /// Largest container that can still be constructed
    pub fn remaining(&self) -> usize {
        self.allocator.remaining()
    }

    fn write_metadata(&mut self) -> Result<(), SegmentError> {
        self.header.cursor = self.allocator.cursor() as u64;
        self.header.entry_count = self.entries.len() as u32;
        self.header.crc = 0;

        let mut metadata = vec![0u8; DATA_OFFSET];
        {
            let mut cursor = Cursor::new(&mut metadata[..]);
            self.header.write_to(&mut cursor)?;
            for entry in &self.entries {
                entry.write_to(&mut cursor)?;
            }
        }

        let crc = metadata_checksum(&metadata);
        layout::store_checksum(&mut metadata, crc);
        self.header.crc = crc;

        self.map[..DATA_OFFSET].copy_from_slice(&metadata);
        Ok(())
    }
}

/// A segment mapped read-only, typically by a later, independent open
#[derive(Debug)]
pub struct MappedSegment {
    path: PathBuf,
    map: Mmap,
    header: SegmentHeader,
    entries: Vec<DirEntry>,
}

impl MappedSegment {
    /// Map an existing segment read-only and validate its metadata
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, SegmentError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SegmentError::NotFound(path.clone()),
            _ => SegmentError::Io(e),
        })?;

        let file_len = file.metadata()?.len();
        if file_len < DATA_OFFSET as u64 {
            return Err(SegmentError::Corrupt(format!(
                "file is {} bytes, smaller than the {} bytes of segment metadata",
                file_len, DATA_OFFSET
            )));
        }

        // Read-only mapping; the segment is not modified while it is open
        let map = unsafe { Mmap::map(&file)? };

        let header = SegmentHeader::read_from(&mut &map[..HEADER_SIZE])?;

        let computed = metadata_checksum(&map[..DATA_OFFSET]);
        if computed != header.crc {
            return Err(SegmentError::ChecksumMismatch {
                stored: header.crc,
                computed,
            });
        }

        if header.capacity != map.len() as u64 {
            return Err(SegmentError::Corrupt(format!(
                "header capacity {} does not match file length {}",
                header.capacity,
                map.len()
            )));
        }
        if header.max_entries as usize != MAX_ENTRIES || header.entry_count > header.max_entries {
            return Err(SegmentError::Corrupt(format!(
                "directory holds {} of {} entries",
                header.entry_count, header.max_entries
            )));
        }

        let allocator = BumpAllocator::resume(DATA_OFFSET, header.cursor as usize, map.len())?;

        let mut entries = Vec::with_capacity(header.entry_count as usize);
        let mut directory = &map[HEADER_SIZE..DATA_OFFSET];
        for slot in 0..header.entry_count {
            let entry = DirEntry::read_from(&mut directory)?
                .ok_or_else(|| SegmentError::Corrupt(format!("directory slot {} is empty", slot)))?;

            let in_bounds = entry.offset >= DATA_OFFSET as u64
                && entry.end().map_or(false, |end| end <= allocator.cursor() as u64);
            if !in_bounds {
                return Err(SegmentError::Corrupt(format!(
                    "container '{}' spans {}+{} outside the allocated region",
                    entry.name, entry.offset, entry.len
                )));
            }
            entries.push(entry);
        }

        debug!(
            "Opened segment {} read-only: {} containers, {} bytes allocated",
            path.display(),
            entries.len(),
            allocator.used()
        );

        Ok(Self {
            path,
            map,
            header,
            entries,
        })
    }

    /// Locate a container by name
    pub fn find(&self, name: &str) -> Result<&[u8], SegmentError> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| SegmentError::ContainerNotFound(name.to_string()))?;

        Ok(&self.map[entry.offset as usize..(entry.offset + entry.len) as usize])
    }

    /// Names of every container in the segment
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total size of the segment in bytes
    pub fn capacity(&self) -> u64 {
        self.header.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom, Write};
    use tempfile::tempdir;

    #[test]
    fn test_construct_then_reopen() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("segment.bin");

        let mut segment = ManagedMappedFile::create(&path, 64 * 1024).unwrap();
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let container = segment.construct("payload", &data).unwrap();
        assert_eq!(container.len, data.len());
        assert_eq!(container.offset % ALIGNMENT, 0);
        assert_eq!(segment.find("payload"), Some(&data[..]));
        segment.close().unwrap();

        let reopened = MappedSegment::open_read_only(&path).unwrap();
        assert_eq!(reopened.capacity(), 64 * 1024);
        assert_eq!(reopened.names().collect::<Vec<_>>(), vec!["payload"]);
        assert_eq!(reopened.find("payload").unwrap(), &data[..]);
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("segment.bin");
        std::fs::write(&path, b"already here").unwrap();

        let result = ManagedMappedFile::create(&path, MIN_SEGMENT_SIZE);
        assert!(matches!(result, Err(SegmentError::AlreadyExists(_))));
        assert_eq!(std::fs::read(&path).unwrap(), b"already here");
    }

    #[test]
    fn test_create_rejects_tiny_capacity() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("segment.bin");

        let result = ManagedMappedFile::create(&path, 100);
        assert!(matches!(result, Err(SegmentError::CapacityTooSmall(100))));
        assert!(!path.exists());
    }

    #[test]
    fn test_multiple_containers() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("segment.bin");

        let mut segment = ManagedMappedFile::create(&path, 16 * 1024).unwrap();
        segment.construct("first", b"abc").unwrap();
        segment.construct("second", &[9u8; 100]).unwrap();
        assert!(matches!(
            segment.construct("first", b"again"),
            Err(SegmentError::DuplicateName(_))
        ));
        segment.close().unwrap();

        let reopened = MappedSegment::open_read_only(&path).unwrap();
        assert_eq!(reopened.find("first").unwrap(), b"abc");
        assert_eq!(reopened.find("second").unwrap(), &[9u8; 100][..]);
        assert!(matches!(
            reopened.find("third"),
            Err(SegmentError::ContainerNotFound(name)) if name == "third"
        ));
    }

    #[test]
    fn test_out_of_space() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("segment.bin");

        let mut segment = ManagedMappedFile::create(&path, MIN_SEGMENT_SIZE).unwrap();
        let available = segment.remaining();
        let result = segment.construct("big", &vec![0u8; available + 1]);
        assert!(matches!(result, Err(SegmentError::OutOfSpace { .. })));
        assert!(segment.construct("fits", &vec![1u8; available]).is_ok());
    }

    #[test]
    fn test_directory_full() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("segment.bin");

        let mut segment = ManagedMappedFile::create(&path, MIN_SEGMENT_SIZE).unwrap();
        for i in 0..MAX_ENTRIES {
            segment.construct(&format!("c{}", i), &[i as u8]).unwrap();
        }
        assert!(matches!(
            segment.construct("overflow", b"x"),
            Err(SegmentError::DirectoryFull)
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let temp_dir = tempdir().unwrap();
        let result = MappedSegment::open_read_only(temp_dir.path().join("missing.bin"));
        assert!(matches!(result, Err(SegmentError::NotFound(_))));
    }

    #[test]
    fn test_open_rejects_corrupted_directory() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("segment.bin");

        let mut segment = ManagedMappedFile::create(&path, MIN_SEGMENT_SIZE).unwrap();
        segment.construct("payload", b"hello").unwrap();
        segment.close().unwrap();

        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(HEADER_SIZE as u64 + 1)).unwrap();
        file.write_all(b"P").unwrap();
        drop(file);

        let result = MappedSegment::open_read_only(&path);
        assert!(matches!(result, Err(SegmentError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_open_rejects_raw_payload_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("raw.bin");
        std::fs::write(&path, vec![b'!'; 8192]).unwrap();

        let result = MappedSegment::open_read_only(&path);
        assert!(matches!(result, Err(SegmentError::InvalidMagic)));
    }

    #[test]
    fn test_open_rejects_truncated_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("short.bin");
        std::fs::write(&path, b"IOBSEG").unwrap();

        let result = MappedSegment::open_read_only(&path);
        assert!(matches!(result, Err(SegmentError::Corrupt(_))));
    }
}
