use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for package operations
pub type Result<T> = std::result::Result<T, PackageError>;

/// Unified error type for package and virtual file operations
#[derive(Debug, Error)]
pub enum PackageError {
    // Lookup errors
    #[error("File not found in package: {0}")]
    NotFound(String),

    #[error("Package is read-only: {0}")]
    ReadOnly(String),

    #[error("Package is not open")]
    NotOpen,

    // Structural errors
    #[error("Unsupported package version: expected {expected:#010x}, found {found:#010x}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Corrupt entry table: {0}")]
    CorruptEntryTable(String),

    // Read contract errors
    #[error("Offset {offset} beyond file length {length}")]
    OffsetOutOfRange { offset: u32, length: u32 },

    #[error("Buffer too small: {available} < {needed}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("Partial reads are not supported on compressed entry: {0}")]
    PartialReadUnsupportedOnCompressed(String),

    // Codec errors
    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    // Loose file errors
    #[error("File is zero length: {0}")]
    EmptyFile(PathBuf),

    #[error("Size exceeds package limits: {0}")]
    SizeOverflow(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PackageError {
    /// True for errors caused by a damaged or foreign container file
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PackageError::VersionMismatch { .. } | PackageError::CorruptEntryTable(_)
        )
    }
}

impl From<toml::de::Error> for PackageError {
    fn from(err: toml::de::Error) -> Self {
        PackageError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for PackageError {
    fn from(err: toml::ser::Error) -> Self {
        PackageError::Config(err.to_string())
    }
}
