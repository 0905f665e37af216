use crate::error::{PackageError, Result};
use std::io::{self, Read, Write};

/// Current package format version (major 1, minor 3)
pub const PACKAGE_VERSION: u32 = 0x0001_0003;

/// Size of the description field in the header
pub const DESCRIPTION_SIZE: usize = 256;

/// Serialized header size in bytes
pub const HEADER_SIZE: usize = 4 + 4 + DESCRIPTION_SIZE;

/// Trailer size: header + entry count + duplicated version
pub const TRAILER_SIZE: usize = HEADER_SIZE + 4 + 4;

/// Name buffer size on disk, including the NUL terminator
pub const NAME_BUFFER_SIZE: usize = 260;

/// Maximum stored name length in bytes
pub const MAX_NAME_LENGTH: usize = NAME_BUFFER_SIZE - 1;

/// Banner written into the description of new packages
pub const PACKAGE_BANNER: &str = "filepack-rs asset package. All payloads little-endian, entry table at tail.";

/// Package header, stored near the end of the container file
///
/// Layout (264 bytes):
/// - Version: uint32
/// - Entry table offset: uint32 (end of live payload data)
/// - Description: 256 bytes, NUL padded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageHeader {
    pub version: u32,
    pub entry_table_offset: u32,
    pub description: [u8; DESCRIPTION_SIZE],
}

impl PackageHeader {
    /// Header for a freshly created package
    pub fn new() -> Self {
        let mut description = [0u8; DESCRIPTION_SIZE];
        let banner = PACKAGE_BANNER.as_bytes();
        let len = banner.len().min(DESCRIPTION_SIZE - 1);
        description[..len].copy_from_slice(&banner[..len]);

        Self {
            version: PACKAGE_VERSION,
            entry_table_offset: 0,
            description,
        }
    }

    /// Description text up to the first NUL
    pub fn description(&self) -> String {
        let end = self
            .description
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(DESCRIPTION_SIZE);
        String::from_utf8_lossy(&self.description[..end]).into_owned()
    }

    /// Write header to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&self.entry_table_offset.to_le_bytes())?;
        writer.write_all(&self.description)?;
        Ok(())
    }

    /// Read header from a reader
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let version = read_u32(&mut reader, "header version")?;
        let entry_table_offset = read_u32(&mut reader, "header entry offset")?;
        let mut description = [0u8; DESCRIPTION_SIZE];
        read_exact(&mut reader, &mut description, "header description")?;

        Ok(Self {
            version,
            entry_table_offset,
            description,
        })
    }

    /// Validate version compatibility (no migration path exists)
    pub fn validate_version(&self) -> Result<()> {
        if self.version != PACKAGE_VERSION {
            return Err(PackageError::VersionMismatch {
                expected: PACKAGE_VERSION,
                found: self.version,
            });
        }
        Ok(())
    }
}

impl Default for PackageHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry table record describing one stored payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub offset: u32,
    pub raw_length: u32,
    pub stored_length: u32,
}

impl FileEntry {
    /// Payload is stored compressed
    pub fn is_compressed(&self) -> bool {
        self.stored_length < self.raw_length
    }

    /// Bytes this record occupies on disk
    pub fn record_size(&self) -> usize {
        4 + self.name.len() + 1 + 12
    }

    /// Write entry record
    ///
    /// `[i32 name length incl. NUL][name][NUL][u32 offset][u32 raw][u32 stored]`
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let name_bytes = self.name.as_bytes();
        if name_bytes.len() > MAX_NAME_LENGTH {
            return Err(PackageError::SizeOverflow(format!(
                "Entry name too long: {} bytes (max {})",
                name_bytes.len(),
                MAX_NAME_LENGTH
            )));
        }

        let name_len = (name_bytes.len() + 1) as i32;
        writer.write_all(&name_len.to_le_bytes())?;
        writer.write_all(name_bytes)?;
        writer.write_all(&[0u8])?;
        writer.write_all(&self.offset.to_le_bytes())?;
        writer.write_all(&self.raw_length.to_le_bytes())?;
        writer.write_all(&self.stored_length.to_le_bytes())?;
        Ok(())
    }

    /// Read entry record, validating the name length
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let name_len = read_i32(&mut reader, "entry name length")?;
        if name_len <= 0 || name_len as usize > NAME_BUFFER_SIZE {
            return Err(PackageError::CorruptEntryTable(format!(
                "Invalid file name length: {}",
                name_len
            )));
        }

        let mut name_buf = vec![0u8; name_len as usize];
        read_exact(&mut reader, &mut name_buf, "entry name")?;
        let end = name_buf
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(name_buf.len())
            .min(MAX_NAME_LENGTH);
        // Names are written back byte for byte, so they must decode exactly
        name_buf.truncate(end);
        let name = String::from_utf8(name_buf).map_err(|e| {
            PackageError::CorruptEntryTable(format!(
                "Entry name is not valid UTF-8: {:02x?}",
                e.as_bytes()
            ))
        })?;

        let offset = read_u32(&mut reader, "entry offset")?;
        let raw_length = read_u32(&mut reader, "entry length")?;
        let stored_length = read_u32(&mut reader, "entry stored length")?;

        if stored_length > raw_length {
            return Err(PackageError::CorruptEntryTable(format!(
                "Stored length {} exceeds raw length {} for {}",
                stored_length, raw_length, name
            )));
        }

        Ok(Self {
            name,
            offset,
            raw_length,
            stored_length,
        })
    }
}

// Helper functions for reading primitive types; short reads mean a damaged table
fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            PackageError::CorruptEntryTable(format!("Short read of {}", what))
        }
        _ => PackageError::Io(e),
    })
}

pub(crate) fn read_u32<R: Read>(reader: &mut R, what: &str) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf, what)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_i32<R: Read>(reader: &mut R, what: &str) -> Result<i32> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf, what)?;
    Ok(i32::from_le_bytes(buf))
}
