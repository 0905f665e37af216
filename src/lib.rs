//! filepack-rs: Mutable asset packages with a virtual file layer
//!
//! This library provides:
//! - A single-file package format holding many named, optionally compressed
//!   payloads (zlib by default, zstd or LZ4 on request)
//! - In-place append, replace and remove without rewriting the container
//! - Case-insensitive lookup, binary search once the entry table is sorted
//! - A virtual file layer that reads packaged entries first and falls back to
//!   loose files under a base directory
//!
//! # Example
//!
//! ```no_run
//! use filepack_rs::{Package, PackageOptions, Vfs};
//!
//! // Create a package
//! let mut package = Package::create("assets.pck", PackageOptions::default())?;
//! package.append_file("config/game.ini", b"[video]\nwidth=1280\n")?;
//! package.close()?;
//!
//! // Read through the virtual file layer
//! let mut vfs = Vfs::new("/srv/game");
//! vfs.open_package("assets.pck")?;
//! let mut file = vfs.open("config\\game.ini")?;
//! let first = file.read_line(filepack_rs::vfs::DEFAULT_MAX_LINE_LENGTH);
//! # Ok::<(), filepack_rs::error::PackageError>(())
//! ```

// Core modules
pub mod archive;
pub mod config;
pub mod error;
pub mod path;
pub mod vfs;

// Re-export commonly used types
pub use archive::{
    Codec, EntryTable, FileEntry, OpenMode, Package, PackageHeader, PackageOptions,
    SharedPackage, HEADER_SIZE, MAX_NAME_LENGTH, PACKAGE_VERSION, TRAILER_SIZE,
};
pub use config::FilepackConfig;
pub use error::{PackageError, Result};
pub use vfs::{FileKind, FileSource, VirtualFile, Vfs};
