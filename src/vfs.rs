//! Virtual file layer over packaged and loose resources
//!
//! A [`Vfs`] resolves resource names against a base directory. When a package
//! is attached, names are looked up in it first; otherwise (or on a miss) the
//! loose file is read from disk. Either way the caller gets a [`VirtualFile`]
//! holding the whole resource in memory with a private read cursor.

use crate::archive::{FileEntry, OpenMode, Package, PackageOptions, SharedPackage};
use crate::config::FilepackConfig;
use crate::error::{PackageError, Result};
use crate::path;
use std::fmt;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Leading tag of binary resources ("MOXB")
pub const FOURCC_BINARY: [u8; 4] = *b"MOXB";

/// Leading tag of text resources ("MOXT")
pub const FOURCC_TEXT: [u8; 4] = *b"MOXT";

/// Default line limit for [`VirtualFile::read_line`]
pub const DEFAULT_MAX_LINE_LENGTH: usize = 2048;

/// Content kind declared by the leading tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Binary,
    Text,
}

/// Where a virtual file's bytes came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Entry of the attached package, resolved once at open time
    Packaged(FileEntry),
    /// Loose file on disk
    Loose(PathBuf),
}

/// Resolves resources against a base directory and an optional package
pub struct Vfs {
    base_dir: PathBuf,
    package: Option<SharedPackage>,
    options: PackageOptions,
}

impl Vfs {
    /// A VFS over loose files under `base_dir`
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            package: None,
            options: PackageOptions::default(),
        }
    }

    /// Build from configuration (base directory and package options)
    pub fn from_config(config: &FilepackConfig) -> Result<Self> {
        Ok(Self {
            base_dir: config.base_dir()?,
            package: None,
            options: config.package_options()?,
        })
    }

    /// Attach an already open package
    pub fn with_package(mut self, package: SharedPackage) -> Self {
        self.package = Some(package);
        self
    }

    pub fn set_package(&mut self, package: Option<SharedPackage>) {
        self.package = package;
    }

    pub fn package(&self) -> Option<&SharedPackage> {
        self.package.as_ref()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Open the package consulted before loose files
    ///
    /// Relative paths are resolved against the base directory. Any package
    /// opened earlier through this VFS is closed first.
    pub fn open_package<P: AsRef<Path>>(&mut self, package_path: P) -> Result<SharedPackage> {
        self.close_package()?;

        let package_path = package_path.as_ref();
        let full = if package_path.is_absolute() {
            package_path.to_path_buf()
        } else {
            self.base_dir.join(package_path)
        };

        let mut package = Package::new(self.options);
        package.open(&full, OpenMode::OpenExisting)?;

        let shared = package.into_shared();
        self.package = Some(shared.clone());
        Ok(shared)
    }

    /// Close and detach the package, if any
    ///
    /// Other holders of the handle observe a closed package afterwards.
    pub fn close_package(&mut self) -> Result<()> {
        match self.package.take() {
            Some(package) => package.lock().close(),
            None => Ok(()),
        }
    }

    /// Full on-disk path of `name`, optionally inside `folder`
    pub fn full_path(&self, folder: Option<&str>, name: &str) -> PathBuf {
        path::full_path(&self.base_dir, folder, name)
    }

    /// Name of `full` relative to the base directory
    pub fn relative_path(&self, full: &Path) -> String {
        path::relative_path(&self.base_dir, full)
    }

    /// Open a resource by name or full path
    pub fn open(&self, name: &str) -> Result<VirtualFile> {
        self.open_path(self.full_path(None, name))
    }

    /// Open `name` inside `folder`
    pub fn open_in(&self, folder: &str, name: &str) -> Result<VirtualFile> {
        self.open_path(self.full_path(Some(folder), name))
    }

    fn open_path(&self, full_path: PathBuf) -> Result<VirtualFile> {
        let relative_name = self.relative_path(&full_path);

        if let Some(package) = &self.package {
            let mut package = package.lock();
            if let Some((entry, _)) = package.get_file_entry(&relative_name) {
                let data = read_packaged(&mut package, &entry).map_err(|e| {
                    warn!("Error reading file [{}] from package: {}", relative_name, e);
                    e
                })?;

                debug!("Opened {} from package ({} bytes)", relative_name, data.len());
                return Ok(VirtualFile::new(
                    full_path,
                    relative_name,
                    FileSource::Packaged(entry),
                    data,
                ));
            }
        }

        let data = std::fs::read(&full_path).map_err(|e| {
            warn!("Can't open file [{}]: {}", full_path.display(), e);
            PackageError::Io(e)
        })?;
        if data.is_empty() {
            warn!("The file [{}] is zero length", full_path.display());
            return Err(PackageError::EmptyFile(full_path));
        }

        debug!("Opened loose file {} ({} bytes)", full_path.display(), data.len());
        let source = FileSource::Loose(full_path.clone());
        Ok(VirtualFile::new(full_path, relative_name, source, data))
    }
}

fn read_packaged(package: &mut Package, entry: &FileEntry) -> Result<Vec<u8>> {
    let mut data = package.entry_buffer(entry)?;
    let read = package.read_entry(entry, &mut data, 0)?;
    data.truncate(read);
    Ok(data)
}

/// In-memory snapshot of one resource with a read cursor
pub struct VirtualFile {
    full_path: PathBuf,
    relative_name: String,
    source: FileSource,
    kind: FileKind,
    data: Vec<u8>,
    pos: usize,
}

impl VirtualFile {
    fn new(full_path: PathBuf, relative_name: String, source: FileSource, data: Vec<u8>) -> Self {
        // The tag only sets the kind; the cursor stays at the start either way
        let kind = match data.get(..4) {
            Some(tag) if tag == &FOURCC_BINARY[..] => FileKind::Binary,
            _ => FileKind::Text,
        };

        Self {
            full_path,
            relative_name,
            source,
            kind,
            data,
            pos: 0,
        }
    }

    /// Copy up to `buf.len()` bytes from the cursor; 0 at end of data
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let available = &self.data[self.pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        n
    }

    /// Read up to the next `\n`, `\r` or `\r\n`, keeping at most `max_len` bytes
    ///
    /// The cursor moves past the terminator even when the line is truncated,
    /// so the remainder of an overlong line is discarded rather than returned
    /// by the next call. Returns `None` only when nothing was left to consume.
    pub fn read_line(&mut self, max_len: usize) -> Option<String> {
        let rest = &self.data[self.pos..];
        let line_end = rest
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')
            .unwrap_or(rest.len());

        let line = String::from_utf8_lossy(&rest[..line_end.min(max_len)]).into_owned();

        let mut consumed = line_end;
        if let Some(&terminator) = rest.get(line_end) {
            consumed += 1;
            if terminator == b'\r' && rest.get(line_end + 1) == Some(&b'\n') {
                consumed += 1;
            }
        }

        self.pos += consumed;
        (consumed > 0).then_some(line)
    }

    /// Read a NUL-terminated string; the NUL is consumed
    pub fn read_string(&mut self) -> String {
        let rest = &self.data[self.pos..];
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let s = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.pos += (end + 1).min(rest.len());
        s
    }

    /// Move the cursor, clamping the target into `[0, len]`
    pub fn seek(&mut self, pos: SeekFrom) -> u64 {
        let (base, offset) = match pos {
            SeekFrom::Start(offset) => (0i128, offset as i128),
            SeekFrom::Current(offset) => (self.pos as i128, offset as i128),
            SeekFrom::End(offset) => (self.data.len() as i128, offset as i128),
        };
        self.pos = (base + offset).clamp(0, self.data.len() as i128) as usize;
        self.pos as u64
    }

    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    pub fn reset_pointer(&mut self) {
        self.pos = 0;
    }

    /// Packaged data cannot be written through the virtual file layer
    pub fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(PackageError::ReadOnly(self.relative_name.clone()))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    pub fn is_packaged(&self) -> bool {
        matches!(self.source, FileSource::Packaged(_))
    }

    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    pub fn relative_name(&self) -> &str {
        &self.relative_name
    }

    /// File name without its directory
    pub fn name(&self) -> &str {
        path::file_title(&self.relative_name)
    }

    /// Directory part of the relative name, empty at the base directory
    pub fn folder(&self) -> &str {
        path::file_dir(&self.relative_name)
    }
}

impl fmt::Debug for VirtualFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualFile")
            .field("relative_name", &self.relative_name)
            .field("source", &self.source)
            .field("kind", &self.kind)
            .field("len", &self.data.len())
            .field("pos", &self.pos)
            .finish()
    }
}

impl io::Read for VirtualFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(VirtualFile::read(self, buf))
    }
}

impl io::Seek for VirtualFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(VirtualFile::seek(self, pos))
    }
}
