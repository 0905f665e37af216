//! Package engine: the open container file, its entry table and write cursor
//!
//! Payloads are appended at `header.entry_table_offset`, which always marks
//! the end of live payload data. The entry table and trailer are rewritten
//! from that offset on close. Replaced and removed payloads are never
//! reclaimed, so existing offsets stay stable for readers holding entries.

use crate::archive::compression::{
    compress, Codec, Compressed, MAX_EXPANSION_SLACK, SCRATCH_BUFFER_SIZE,
};
use crate::archive::entry_table::EntryTable;
use crate::archive::format::{
    read_u32, FileEntry, PackageHeader, MAX_NAME_LENGTH, PACKAGE_VERSION, TRAILER_SIZE,
};
use crate::archive::trailer::Trailer;
use crate::error::{PackageError, Result};
use crate::path::{normalize_name, truncate_name};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Shared handle to the package consulted by the virtual file layer
pub type SharedPackage = Arc<Mutex<Package>>;

/// How [`Package::open`] treats the target path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Load an existing package, read-write if possible, else read-only
    OpenExisting,
    /// Create (or truncate) a package
    CreateNew,
}

/// Compression policy for a package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageOptions {
    /// Compress appended payloads when it makes them strictly smaller
    pub compression_enabled: bool,
    /// Codec used to write and read compressed payloads
    pub codec: Codec,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            compression_enabled: true,
            codec: Codec::default(),
        }
    }
}

/// An asset package container
///
/// A `Package` starts closed ([`Package::new`]) or is opened directly with
/// [`Package::create`] / [`Package::open_existing`]. Dropping an open package
/// closes it, persisting pending changes.
pub struct Package {
    file: Option<File>,
    path: Option<PathBuf>,
    header: PackageHeader,
    entries: EntryTable,
    options: PackageOptions,
    read_only: bool,
    dirty: bool,
    scratch: Vec<u8>,
}

impl Package {
    /// A closed package with the given options
    pub fn new(options: PackageOptions) -> Self {
        Self {
            file: None,
            path: None,
            header: PackageHeader::new(),
            entries: EntryTable::new(),
            options,
            read_only: false,
            dirty: false,
            scratch: Vec::new(),
        }
    }

    /// Create a new, empty package at `path`
    pub fn create<P: AsRef<Path>>(path: P, options: PackageOptions) -> Result<Self> {
        let mut package = Self::new(options);
        package.open(path, OpenMode::CreateNew)?;
        Ok(package)
    }

    /// Open an existing package at `path`
    pub fn open_existing<P: AsRef<Path>>(path: P, options: PackageOptions) -> Result<Self> {
        let mut package = Self::new(options);
        package.open(path, OpenMode::OpenExisting)?;
        Ok(package)
    }

    /// Wrap this package in a shared handle
    pub fn into_shared(self) -> SharedPackage {
        Arc::new(Mutex::new(self))
    }

    /// Open a container, closing any package already open on this instance
    ///
    /// On failure the package is left closed with all buffers released.
    pub fn open<P: AsRef<Path>>(&mut self, path: P, mode: OpenMode) -> Result<()> {
        if self.is_open() {
            if let Err(e) = self.close() {
                warn!("Discarding failed close before reopen: {}", e);
            }
        }

        let path = path.as_ref();
        let result = match mode {
            OpenMode::CreateNew => self.create_container(path),
            OpenMode::OpenExisting => self.load_container(path),
        };

        if let Err(e) = result {
            error!("Failed to open package {}: {}", path.display(), e);
            self.release();
            return Err(e);
        }

        self.path = Some(path.to_path_buf());
        if self.options.compression_enabled {
            self.scratch.reserve(SCRATCH_BUFFER_SIZE);
        }

        debug!(
            "Opened package {} ({} entries, read_only={})",
            path.display(),
            self.entries.len(),
            self.read_only
        );
        Ok(())
    }

    fn create_container(&mut self, path: &Path) -> Result<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        self.file = Some(file);
        self.header = PackageHeader::new();
        self.entries.clear();
        self.read_only = false;
        // A new package is written on close even if nothing is appended
        self.dirty = true;
        Ok(())
    }

    fn load_container(&mut self, path: &Path) -> Result<()> {
        let (mut file, read_only) = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => (file, false),
            Err(rw_err) => {
                debug!(
                    "Read-write open of {} failed ({}), retrying read-only",
                    path.display(),
                    rw_err
                );
                (File::open(path)?, true)
            }
        };

        let file_len = file.metadata()?.len();
        if file_len < 4 {
            return Err(PackageError::CorruptEntryTable(format!(
                "File too small to be a package: {} bytes",
                file_len
            )));
        }

        // Fast rejection of foreign files via the trailing version
        file.seek(SeekFrom::End(-4))?;
        let version = read_u32(&mut file, "trailing version")?;
        if version != PACKAGE_VERSION {
            return Err(PackageError::VersionMismatch {
                expected: PACKAGE_VERSION,
                found: version,
            });
        }

        if file_len < TRAILER_SIZE as u64 {
            return Err(PackageError::CorruptEntryTable(format!(
                "File too small for trailer: {} bytes",
                file_len
            )));
        }

        file.seek(SeekFrom::End(-(TRAILER_SIZE as i64)))?;
        let trailer = Trailer::read_from(&mut file)?;
        trailer.validate()?;
        trailer.header.validate_version()?;

        let table_offset = trailer.header.entry_table_offset as u64;
        let trailer_start = file_len - TRAILER_SIZE as u64;
        if table_offset > trailer_start {
            return Err(PackageError::CorruptEntryTable(format!(
                "Entry table offset {} beyond trailer at {}",
                table_offset, trailer_start
            )));
        }

        file.seek(SeekFrom::Start(table_offset))?;
        let mut table_bytes = Vec::with_capacity((file_len - table_offset) as usize);
        file.read_to_end(&mut table_bytes)?;

        let (mut entries, header) = EntryTable::deserialize(&table_bytes)?;
        if let Some(bad) = entries
            .iter()
            .find(|e| e.offset as u64 + e.stored_length as u64 > table_offset)
        {
            return Err(PackageError::CorruptEntryTable(format!(
                "Payload of {} extends past end of data ({} + {} > {})",
                bad.name, bad.offset, bad.stored_length, table_offset
            )));
        }
        entries.resort();

        self.file = Some(file);
        self.header = header;
        self.entries = entries;
        self.read_only = read_only;
        self.dirty = false;
        Ok(())
    }

    /// Persist pending changes and release the container
    ///
    /// In-memory state is cleared even when persisting fails.
    pub fn close(&mut self) -> Result<()> {
        if self.file.is_none() {
            return Ok(());
        }

        let result = if self.dirty && !self.read_only {
            self.save_entries()
        } else {
            Ok(())
        };

        match &result {
            Ok(()) => debug!("Closed package {:?}", self.path),
            Err(e) => error!("Failed to save entries of {:?}: {}", self.path, e),
        }

        self.release();
        result
    }

    fn save_entries(&mut self) -> Result<()> {
        let file = self.file.as_mut().ok_or(PackageError::NotOpen)?;
        let table_offset = self.header.entry_table_offset as u64;
        let bytes = self.entries.serialize(&self.header)?;

        file.seek(SeekFrom::Start(table_offset))?;
        file.write_all(&bytes)?;
        // A shorter table must not leave a stale trailer behind
        file.set_len(table_offset + bytes.len() as u64)?;
        file.flush()?;

        self.dirty = false;
        Ok(())
    }

    fn release(&mut self) {
        self.file = None;
        self.path = None;
        self.header = PackageHeader::new();
        self.entries.clear();
        self.scratch = Vec::new();
        self.read_only = false;
        self.dirty = false;
    }

    fn ensure_writable(&self, operation: &str) -> Result<()> {
        if self.file.is_none() {
            warn!("{}: package is not open", operation);
            return Err(PackageError::NotOpen);
        }
        if self.read_only {
            warn!("{}: read-only package {:?}", operation, self.path);
            return Err(PackageError::ReadOnly(
                self.path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            ));
        }
        Ok(())
    }

    /// Write a payload at the end-of-data cursor and advance it
    ///
    /// Returns the payload offset and the number of bytes stored.
    fn write_payload(&mut self, name: &str, data: &[u8]) -> Result<(u32, u32)> {
        let file = self.file.as_mut().ok_or(PackageError::NotOpen)?;

        let payload = if self.options.compression_enabled {
            compress(&self.options.codec, data, &mut self.scratch)
        } else {
            Compressed {
                bytes: data,
                was_compressed: false,
            }
        };

        let stored_length = to_u32(payload.bytes.len(), name)?;
        let offset = self.header.entry_table_offset;
        let end = offset.checked_add(stored_length).ok_or_else(|| {
            PackageError::SizeOverflow(format!(
                "Appending {} ({} bytes) at {} exceeds 4 GiB",
                name, stored_length, offset
            ))
        })?;

        file.seek(SeekFrom::Start(offset as u64))?;
        file.write_all(payload.bytes)?;
        self.header.entry_table_offset = end;

        Ok((offset, stored_length))
    }

    /// Add a payload under `name`
    ///
    /// Existing entries with the same name are not checked; use
    /// [`Package::replace_file`] to overwrite.
    pub fn append_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.ensure_writable("append_file")?;

        let mut name = normalize_name(name);
        truncate_name(&mut name, MAX_NAME_LENGTH);
        let raw_length = to_u32(data.len(), &name)?;

        let (offset, stored_length) = self.write_payload(&name, data)?;
        debug!(
            "Appended {} at {} ({} -> {} bytes)",
            name, offset, raw_length, stored_length
        );

        self.entries.insert(FileEntry {
            name,
            offset,
            raw_length,
            stored_length,
        });
        self.dirty = true;
        Ok(())
    }

    /// Store new data for an existing entry; the old payload becomes dead space
    pub fn replace_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.ensure_writable("replace_file")?;

        let (index, entry_name) = match self.find_entry(name) {
            Some((index, entry)) => (index, entry.name.clone()),
            None => {
                warn!("replace_file: file not found: {}", name);
                return Err(PackageError::NotFound(name.to_string()));
            }
        };
        let raw_length = to_u32(data.len(), &entry_name)?;

        let (offset, stored_length) = self.write_payload(&entry_name, data)?;
        self.entries.update_at(index, offset, raw_length, stored_length);
        self.dirty = true;

        debug!(
            "Replaced {} at {} ({} -> {} bytes)",
            entry_name, offset, raw_length, stored_length
        );
        Ok(())
    }

    /// Drop an entry; its payload stays in the container as dead space
    pub fn remove_file(&mut self, name: &str) -> Result<()> {
        self.ensure_writable("remove_file")?;

        let Some((index, _)) = self.find_entry(name) else {
            warn!("remove_file: file not found: {}", name);
            return Err(PackageError::NotFound(name.to_string()));
        };

        if let Some(removed) = self.entries.remove_at(index) {
            debug!("Removed {}", removed.name);
        }
        self.dirty = true;
        Ok(())
    }

    /// Read the entry named `name` into `buffer`, starting `offset` bytes in
    pub fn read_file(&mut self, name: &str, buffer: &mut [u8], offset: u32) -> Result<usize> {
        let Some((entry, _)) = self.get_file_entry(name) else {
            warn!("read_file: can not find file entry [{}]", name);
            return Err(PackageError::NotFound(name.to_string()));
        };
        self.read_entry(&entry, buffer, offset)
    }

    /// Read `entry` into `buffer`, starting `offset` bytes into its raw data
    ///
    /// `buffer` must hold at least `raw_length - offset` bytes. Compressed
    /// entries can only be read whole.
    pub fn read_entry(&mut self, entry: &FileEntry, buffer: &mut [u8], offset: u32) -> Result<usize> {
        let file = self.file.as_mut().ok_or(PackageError::NotOpen)?;

        if offset > entry.raw_length {
            warn!(
                "read_entry: offset [{}] beyond file length [{}] of {}",
                offset, entry.raw_length, entry.name
            );
            return Err(PackageError::OffsetOutOfRange {
                offset,
                length: entry.raw_length,
            });
        }

        let to_read = (entry.raw_length - offset) as usize;
        if buffer.len() < to_read {
            warn!("read_entry: buffer too small: {} < {}", buffer.len(), to_read);
            return Err(PackageError::BufferTooSmall {
                needed: to_read,
                available: buffer.len(),
            });
        }

        if to_read == 0 {
            return Ok(0);
        }

        if entry.is_compressed() {
            if offset != 0 {
                warn!("read_entry: offset not allowed for compressed file {}", entry.name);
                return Err(PackageError::PartialReadUnsupportedOnCompressed(
                    entry.name.clone(),
                ));
            }

            self.scratch.resize(entry.stored_length as usize, 0);
            file.seek(SeekFrom::Start(entry.offset as u64))?;
            file.read_exact(&mut self.scratch)?;

            let data = self
                .options
                .codec
                .decompress(&self.scratch, to_read)
                .map_err(|e| {
                    error!("read_entry: decompression of {} failed: {}", entry.name, e);
                    e
                })?;
            buffer[..to_read].copy_from_slice(&data);
        } else {
            file.seek(SeekFrom::Start(entry.offset as u64 + offset as u64))?;
            file.read_exact(&mut buffer[..to_read])?;
        }

        Ok(to_read)
    }

    /// Read a whole entry into a new buffer
    pub fn read_to_vec(&mut self, name: &str) -> Result<Vec<u8>> {
        let Some((entry, _)) = self.get_file_entry(name) else {
            warn!("read_to_vec: can not find file entry [{}]", name);
            return Err(PackageError::NotFound(name.to_string()));
        };

        let mut data = self.entry_buffer(&entry)?;
        let read = self.read_entry(&entry, &mut data, 0)?;
        data.truncate(read);
        Ok(data)
    }

    /// Zeroed buffer large enough for the whole of `entry`
    ///
    /// Compressed entries claiming more than the codec could ever expand
    /// their stored bytes to are rejected before anything is allocated.
    pub fn entry_buffer(&self, entry: &FileEntry) -> Result<Vec<u8>> {
        if entry.is_compressed() {
            let limit = entry.stored_length as u64 * self.options.codec.max_expansion()
                + MAX_EXPANSION_SLACK;
            if entry.raw_length as u64 > limit {
                error!(
                    "entry_buffer: {} claims {} bytes from {} stored",
                    entry.name, entry.raw_length, entry.stored_length
                );
                return Err(PackageError::CorruptEntryTable(format!(
                    "Implausible size for {}: {} bytes from {} stored",
                    entry.name, entry.raw_length, entry.stored_length
                )));
            }
        }

        let len = entry.raw_length as usize;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| {
            PackageError::SizeOverflow(format!(
                "Can not allocate {} bytes for {}: {}",
                len, entry.name, e
            ))
        })?;
        data.resize(len, 0);
        Ok(data)
    }

    fn find_entry(&self, name: &str) -> Option<(usize, &FileEntry)> {
        self.entries.find(&normalize_name(name))
    }

    /// Look up an entry and its current table index
    pub fn get_file_entry(&self, name: &str) -> Option<(FileEntry, usize)> {
        self.find_entry(name)
            .map(|(index, entry)| (entry.clone(), index))
    }

    /// Entry at a table index
    pub fn entry_at(&self, index: usize) -> Option<&FileEntry> {
        self.entries.get(index)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find_entry(name).is_some()
    }

    /// Sort the table so lookups binary-search
    pub fn resort_entries(&mut self) {
        self.entries.resort();
    }

    pub fn file_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &EntryTable {
        &self.entries
    }

    pub fn header(&self) -> &PackageHeader {
        &self.header
    }

    pub fn options(&self) -> &PackageOptions {
        &self.options
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl Drop for Package {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("Package dropped with unsaved changes: {}", e);
        }
    }
}

fn to_u32(len: usize, name: &str) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| PackageError::SizeOverflow(format!("{} is too large: {} bytes", name, len)))
}
