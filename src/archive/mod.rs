mod compression;
mod entry_table;
mod format;
mod package;
mod trailer;

pub use compression::{compress, Codec, Compressed, MAX_EXPANSION_SLACK, SCRATCH_BUFFER_SIZE};
pub use entry_table::EntryTable;
pub use format::{
    FileEntry, PackageHeader, DESCRIPTION_SIZE, HEADER_SIZE, MAX_NAME_LENGTH, NAME_BUFFER_SIZE,
    PACKAGE_BANNER, PACKAGE_VERSION, TRAILER_SIZE,
};
pub use package::{OpenMode, Package, PackageOptions, SharedPackage};
pub use trailer::Trailer;
