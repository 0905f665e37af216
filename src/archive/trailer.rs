use crate::archive::format::{read_i32, read_u32, PackageHeader, PACKAGE_VERSION, TRAILER_SIZE};
use crate::error::{PackageError, Result};
use std::io::{Read, Write};

/// Trailer block at the very end of the container
///
/// Located in the last 272 bytes, directly after the entry records, so a
/// reader can validate the package and find the table from the end of the
/// file without scanning.
///
/// Structure (272 bytes fixed):
/// - Header: 264 bytes
/// - Entry count: int32
/// - Version: uint32 (duplicate of the header version)
#[derive(Debug, Clone)]
pub struct Trailer {
    pub header: PackageHeader,
    pub entry_count: i32,
    pub version: u32,
}

impl Trailer {
    pub fn new(header: PackageHeader, entry_count: usize) -> Result<Self> {
        let entry_count = i32::try_from(entry_count).map_err(|_| {
            PackageError::SizeOverflow(format!("Too many entries: {}", entry_count))
        })?;
        let version = header.version;
        Ok(Self {
            header,
            entry_count,
            version,
        })
    }

    /// Write trailer to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        self.header.write_to(&mut writer)?;
        writer.write_all(&self.entry_count.to_le_bytes())?;
        writer.write_all(&self.version.to_le_bytes())?;
        Ok(TRAILER_SIZE)
    }

    /// Read trailer from a reader positioned `TRAILER_SIZE` bytes before the end
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let header = PackageHeader::read_from(&mut reader)?;
        let entry_count = read_i32(&mut reader, "entry count")?;
        let version = read_u32(&mut reader, "trailer version")?;

        Ok(Self {
            header,
            entry_count,
            version,
        })
    }

    /// Check the trailing version and entry count
    pub fn validate(&self) -> Result<()> {
        if self.version != PACKAGE_VERSION {
            return Err(PackageError::VersionMismatch {
                expected: PACKAGE_VERSION,
                found: self.version,
            });
        }

        if self.entry_count < 0 {
            return Err(PackageError::CorruptEntryTable(format!(
                "Invalid file count: {}",
                self.entry_count
            )));
        }

        Ok(())
    }
}
