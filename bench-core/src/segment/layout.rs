//! On-disk layout of a managed mapped segment
//!
//! ```text
//! 0            64                      DATA_OFFSET                 capacity
//! +------------+-----------------------+---------------------------+
//! | header     | directory (16 x 64 B) | data region (bump alloc)  |
//! +------------+-----------------------+---------------------------+
//! ```
//!
//! All integers are little-endian. The header CRC covers the header and the
//! directory with the CRC field itself read as zero.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use super::SegmentError;

/// Magic number at offset 0 of every segment
pub const SEGMENT_MAGIC: &[u8; 8] = b"IOBSEG\x00\x00";
/// Current segment layout version
pub const SEGMENT_VERSION: u32 = 1;

/// Size of the segment header in bytes
pub const HEADER_SIZE: usize = 64;
/// Number of directory slots
pub const MAX_ENTRIES: usize = 16;
/// Size of one directory slot in bytes
pub const ENTRY_SIZE: usize = 64;
/// Longest container name a slot can hold
pub const MAX_NAME_LEN: usize = ENTRY_SIZE - 1 - 8 - 8;
/// First byte of the data region
pub const DATA_OFFSET: usize = HEADER_SIZE + MAX_ENTRIES * ENTRY_SIZE;
/// Alignment of every container allocation
pub const ALIGNMENT: usize = 16;
/// Smallest capacity a segment may be created with
pub const MIN_SEGMENT_SIZE: u64 = 4096;

// magic(8) + version(4) + capacity(8) + cursor(8) + entry_count(4) + max_entries(4)
const CRC_OFFSET: usize = 36;
const HEADER_USED: usize = CRC_OFFSET + 4;

/// Segment header stored at offset 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Magic number (IOBSEG\0\0)
    pub magic: [u8; 8],
    /// Layout version
    pub version: u32,
    /// Total size of the segment in bytes, equal to the file length
    pub capacity: u64,
    /// Next free offset in the data region
    pub cursor: u64,
    /// Number of occupied directory slots
    pub entry_count: u32,
    /// Number of directory slots
    pub max_entries: u32,
    /// CRC32 of header and directory
    pub crc: u32,
}

impl SegmentHeader {
    /// Create an empty header for a segment of the given capacity
    pub fn new(capacity: u64) -> Self {
        Self {
            magic: *SEGMENT_MAGIC,
            version: SEGMENT_VERSION,
            capacity,
            cursor: DATA_OFFSET as u64,
            entry_count: 0,
            max_entries: MAX_ENTRIES as u32,
            crc: 0,
        }
    }

    /// Write the header, padded to `HEADER_SIZE` bytes
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.magic)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_u64::<LittleEndian>(self.capacity)?;
        writer.write_u64::<LittleEndian>(self.cursor)?;
        writer.write_u32::<LittleEndian>(self.entry_count)?;
        writer.write_u32::<LittleEndian>(self.max_entries)?;
        writer.write_u32::<LittleEndian>(self.crc)?;
        writer.write_all(&[0u8; HEADER_SIZE - HEADER_USED])?;
        Ok(())
    }

    /// Read a header, rejecting foreign magic numbers and versions
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, SegmentError> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;

        if &magic != SEGMENT_MAGIC {
            return Err(SegmentError::InvalidMagic);
        }

        let version = reader.read_u32::<LittleEndian>()?;
        if version != SEGMENT_VERSION {
            return Err(SegmentError::UnsupportedVersion(version));
        }

        let capacity = reader.read_u64::<LittleEndian>()?;
        let cursor = reader.read_u64::<LittleEndian>()?;
        let entry_count = reader.read_u32::<LittleEndian>()?;
        let max_entries = reader.read_u32::<LittleEndian>()?;
        let crc = reader.read_u32::<LittleEndian>()?;

        Ok(Self {
            magic,
            version,
            capacity,
            cursor,
            entry_count,
            max_entries,
            crc,
        })
    }
}

/// One directory slot: a named container and where its bytes live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Container name
    pub name: String,
    /// Offset of the first byte within the segment
    pub offset: u64,
    /// Number of bytes in the container
    pub len: u64,
}

impl DirEntry {
    /// Create a directory entry, validating the name
    pub fn new(name: &str, offset: u64, len: u64) -> Result<Self, SegmentError> {
        validate_name(name)?;
        Ok(Self {
            name: name.to_string(),
            offset,
            len,
        })
    }

    /// Write the entry as exactly `ENTRY_SIZE` bytes
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let name_bytes = self.name.as_bytes();
        let mut name = [0u8; MAX_NAME_LEN];
        name[..name_bytes.len()].copy_from_slice(name_bytes);

        writer.write_u8(name_bytes.len() as u8)?;
        writer.write_all(&name)?;
        writer.write_u64::<LittleEndian>(self.offset)?;
        writer.write_u64::<LittleEndian>(self.len)?;
        Ok(())
    }

    /// Read one slot. An empty slot (zero-length name) yields `None`.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Option<Self>, SegmentError> {
        let name_len = reader.read_u8()? as usize;
        let mut name = [0u8; MAX_NAME_LEN];
        reader.read_exact(&mut name)?;
        let offset = reader.read_u64::<LittleEndian>()?;
        let len = reader.read_u64::<LittleEndian>()?;

        if name_len == 0 {
            return Ok(None);
        }
        if name_len > MAX_NAME_LEN {
            return Err(SegmentError::Corrupt(format!(
                "directory entry name length {} exceeds {}",
                name_len, MAX_NAME_LEN
            )));
        }

        let name = std::str::from_utf8(&name[..name_len])
            .map_err(|_| SegmentError::Corrupt("directory entry name is not UTF-8".to_string()))?
            .to_string();

        Ok(Some(Self { name, offset, len }))
    }

    /// End offset (exclusive) of the container
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.len)
    }
}

/// Check that a container name fits a directory slot
pub fn validate_name(name: &str) -> Result<(), SegmentError> {
    if name.is_empty() {
        return Err(SegmentError::EmptyName);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(SegmentError::NameTooLong(name.len()));
    }
    Ok(())
}

/// CRC32 over the metadata area (`..DATA_OFFSET`) with the CRC field zeroed
pub fn metadata_checksum(metadata: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&metadata[..CRC_OFFSET]);
    hasher.update(&[0u8; 4]);
    hasher.update(&metadata[CRC_OFFSET + 4..DATA_OFFSET]);
    hasher.finalize()
}

/// Store `crc` into the CRC field of a metadata buffer
pub fn store_checksum(metadata: &mut [u8], crc: u32) {
    metadata[CRC_OFFSET..CRC_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());
}
