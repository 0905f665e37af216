//! In-memory entry table with sorted/unsorted lookup
//!
//! The table keeps insertion order until [`EntryTable::resort`] is called.
//! Lookups binary-search only while the `sorted` flag is set; every mutation
//! clears it.

use crate::archive::format::{FileEntry, PackageHeader, TRAILER_SIZE};
use crate::archive::trailer::Trailer;
use crate::error::{PackageError, Result};
use crate::path::{cmp_ignore_case, eq_ignore_case};
use std::cmp::Ordering;

/// Smallest possible record: length prefix, one-byte name, three u32 fields
const MIN_RECORD_SIZE: usize = 4 + 1 + 12;

#[derive(Debug, Clone, Default)]
pub struct EntryTable {
    entries: Vec<FileEntry>,
    sorted: bool,
}

impl EntryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether lookups currently use binary search
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn get(&self, index: usize) -> Option<&FileEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileEntry> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Find the first entry whose name matches `name` case-insensitively
    ///
    /// `name` must already be normalized.
    pub fn find(&self, name: &str) -> Option<(usize, &FileEntry)> {
        if self.sorted {
            let idx = self
                .entries
                .partition_point(|e| cmp_ignore_case(&e.name, name) == Ordering::Less);
            self.entries
                .get(idx)
                .filter(|e| eq_ignore_case(&e.name, name))
                .map(|e| (idx, e))
        } else {
            self.entries
                .iter()
                .enumerate()
                .find(|(_, e)| eq_ignore_case(&e.name, name))
        }
    }

    /// Append an entry
    pub fn insert(&mut self, entry: FileEntry) {
        self.entries.push(entry);
        self.sorted = false;
    }

    /// Erase the entry at `index`
    pub fn remove_at(&mut self, index: usize) -> Option<FileEntry> {
        if index >= self.entries.len() {
            return None;
        }
        self.sorted = false;
        Some(self.entries.remove(index))
    }

    /// Point the entry at `index` to a new payload
    pub fn update_at(
        &mut self,
        index: usize,
        offset: u32,
        raw_length: u32,
        stored_length: u32,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(index) else {
            return false;
        };
        entry.offset = offset;
        entry.raw_length = raw_length;
        entry.stored_length = stored_length;
        self.sorted = false;
        true
    }

    /// Sort by case-insensitive name so lookups can binary-search
    pub fn resort(&mut self) {
        self.entries.sort_by(|a, b| cmp_ignore_case(&a.name, &b.name));
        self.sorted = true;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.sorted = false;
    }

    /// Serialize records followed by the trailer (header, count, version)
    pub fn serialize(&self, header: &PackageHeader) -> Result<Vec<u8>> {
        let records: usize = self.entries.iter().map(FileEntry::record_size).sum();
        let mut buf = Vec::with_capacity(records + TRAILER_SIZE);

        for entry in &self.entries {
            entry.write_to(&mut buf)?;
        }

        Trailer::new(header.clone(), self.entries.len())?.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Parse the bytes from the entry table offset to the end of the container
    pub fn deserialize(bytes: &[u8]) -> Result<(Self, PackageHeader)> {
        if bytes.len() < TRAILER_SIZE {
            return Err(PackageError::CorruptEntryTable(format!(
                "Entry table region too small: {} bytes",
                bytes.len()
            )));
        }

        let records_end = bytes.len() - TRAILER_SIZE;
        let trailer = Trailer::read_from(&bytes[records_end..])?;
        trailer.validate()?;

        let count = trailer.entry_count as usize;
        let mut records = &bytes[..records_end];
        let mut entries = Vec::with_capacity(count.min(records.len() / MIN_RECORD_SIZE));

        for i in 0..count {
            let entry = FileEntry::read_from(&mut records).map_err(|e| match e {
                PackageError::CorruptEntryTable(msg) => {
                    PackageError::CorruptEntryTable(format!("Entry {}: {}", i, msg))
                }
                other => other,
            })?;
            entries.push(entry);
        }

        Ok((
            Self {
                entries,
                sorted: false,
            },
            trailer.header,
        ))
    }
}

impl<'a> IntoIterator for &'a EntryTable {
    type Item = &'a FileEntry;
    type IntoIter = std::slice::Iter<'a, FileEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
