//! Corruption detection suite
//!
//! Damaged containers must be rejected at open time with a structural error,
//! and damaged payloads must fail on read without affecting other entries.

use filepack_rs::{
    OpenMode, Package, PackageError, PackageHeader, PackageOptions, PACKAGE_VERSION, TRAILER_SIZE,
};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Helper: Create a valid test package, returning it with its entry table offset
fn create_test_package() -> (NamedTempFile, u32) {
    let temp_file = NamedTempFile::new().unwrap();
    let mut package = Package::create(temp_file.path(), PackageOptions::default()).unwrap();
    package.append_file("test.txt", b"Hello, World!").unwrap();
    package.append_file("data.bin", &vec![0xAB; 1024]).unwrap();
    let table_offset = package.header().entry_table_offset;
    package.close().unwrap();
    (temp_file, table_offset)
}

/// Helper: Overwrite bytes at a specific offset
fn write_bytes_at(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
}

/// Helper: Truncate file at specific offset
fn truncate_at(path: &Path, new_length: u64) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(new_length).unwrap();
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

fn open(path: &Path) -> Result<Package, PackageError> {
    Package::open_existing(path, PackageOptions::default())
}

#[test]
fn test_valid_package_opens() {
    let (temp_file, _) = create_test_package();
    let package = open(temp_file.path()).unwrap();
    assert_eq!(package.file_count(), 2);
}

#[test]
fn test_corrupted_trailing_version() {
    let (temp_file, _) = create_test_package();
    let path = temp_file.path();
    let len = file_len(path);

    write_bytes_at(path, len - 4, &0x0002_0000u32.to_le_bytes());

    match open(path) {
        Err(PackageError::VersionMismatch { expected, found }) => {
            assert_eq!(expected, PACKAGE_VERSION);
            assert_eq!(found, 0x0002_0000);
        }
        Err(e) => panic!("Expected VersionMismatch, got {:?}", e),
        Ok(_) => panic!("Corrupted version should be rejected"),
    }
}

#[test]
fn test_corrupted_header_version() {
    let (temp_file, _) = create_test_package();
    let path = temp_file.path();
    let len = file_len(path);

    // First field of the trailing header
    write_bytes_at(path, len - TRAILER_SIZE as u64, &0u32.to_le_bytes());

    let result = open(path);
    assert!(
        matches!(result, Err(PackageError::VersionMismatch { found: 0, .. })),
        "Expected VersionMismatch for header version"
    );
}

#[test]
fn test_negative_entry_count() {
    let (temp_file, _) = create_test_package();
    let path = temp_file.path();
    let len = file_len(path);

    write_bytes_at(path, len - 8, &(-1i32).to_le_bytes());

    match open(path) {
        Err(e) => assert!(e.is_structural(), "Unexpected error: {:?}", e),
        Ok(_) => panic!("Negative entry count should be rejected"),
    }
}

#[test]
fn test_inflated_entry_count() {
    let (temp_file, _) = create_test_package();
    let path = temp_file.path();
    let len = file_len(path);

    write_bytes_at(path, len - 8, &1000i32.to_le_bytes());

    let result = open(path);
    assert!(matches!(result, Err(PackageError::CorruptEntryTable(_))));
}

#[test]
fn test_entry_table_offset_beyond_trailer() {
    let (temp_file, _) = create_test_package();
    let path = temp_file.path();
    let len = file_len(path);

    write_bytes_at(path, len - TRAILER_SIZE as u64 + 4, &(len as u32).to_le_bytes());

    let result = open(path);
    assert!(matches!(result, Err(PackageError::CorruptEntryTable(_))));
}

#[test]
fn test_entry_table_offset_pointing_into_payloads() {
    let (temp_file, _) = create_test_package();
    let path = temp_file.path();
    let len = file_len(path);

    // Table parsing now starts at "Hello, World!", an absurd name length
    write_bytes_at(path, len - TRAILER_SIZE as u64 + 4, &0u32.to_le_bytes());

    let result = open(path);
    assert!(matches!(result, Err(PackageError::CorruptEntryTable(_))));
}

#[test]
fn test_corrupted_name_length() {
    for bad_len in [0i32, -5, 261, i32::MAX] {
        let (temp_file, table_offset) = create_test_package();
        let path = temp_file.path();

        write_bytes_at(path, table_offset as u64, &bad_len.to_le_bytes());

        match open(path) {
            Err(PackageError::CorruptEntryTable(msg)) => assert!(msg.starts_with("Entry 0")),
            Err(e) => panic!("Expected CorruptEntryTable for {}, got {:?}", bad_len, e),
            Ok(_) => panic!("Name length {} should be rejected", bad_len),
        }
    }
}

#[test]
fn test_truncated_package() {
    let (temp_file, _) = create_test_package();
    let path = temp_file.path();
    let len = file_len(path);

    truncate_at(path, len - 100);

    match open(path) {
        Err(e) => assert!(e.is_structural(), "Unexpected error: {:?}", e),
        Ok(_) => panic!("Truncated package should be rejected"),
    }
}

#[test]
fn test_too_small_files() {
    for size in [0usize, 2, 100] {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), vec![0u8; size]).unwrap();

        match open(temp_file.path()) {
            Err(e) => assert!(e.is_structural(), "Unexpected error for {} bytes: {:?}", size, e),
            Ok(_) => panic!("{} byte file should be rejected", size),
        }
    }
}

#[test]
fn test_short_file_with_valid_version() {
    let temp_file = NamedTempFile::new().unwrap();
    let mut bytes = vec![0u8; 16];
    bytes.extend_from_slice(&PACKAGE_VERSION.to_le_bytes());
    std::fs::write(temp_file.path(), &bytes).unwrap();

    let result = open(temp_file.path());
    assert!(matches!(result, Err(PackageError::CorruptEntryTable(_))));
}

#[test]
fn test_foreign_file_rejected() {
    let temp_file = NamedTempFile::new().unwrap();
    std::fs::write(temp_file.path(), "[section]\nkey = value\n".repeat(50)).unwrap();

    let result = open(temp_file.path());
    assert!(matches!(result, Err(PackageError::VersionMismatch { .. })));
}

#[test]
fn test_corrupted_compressed_payload() {
    let (temp_file, _) = create_test_package();
    let path = temp_file.path();

    let (entry, _) = {
        let package = open(path).unwrap();
        package.get_file_entry("data.bin").unwrap()
    };
    assert!(entry.is_compressed());

    write_bytes_at(path, entry.offset as u64, &vec![0xFF; entry.stored_length as usize]);

    // The container is still structurally valid
    let mut package = open(path).unwrap();
    assert!(matches!(
        package.read_to_vec("data.bin"),
        Err(PackageError::DecompressionFailed(_))
    ));
    assert_eq!(package.read_to_vec("test.txt").unwrap(), b"Hello, World!");
}

/// Helper: Build a one-entry package by hand with arbitrary name bytes
fn hand_built_package(name: &[u8], payload: &[u8]) -> NamedTempFile {
    let mut bytes = payload.to_vec();

    bytes.extend_from_slice(&(name.len() as i32 + 1).to_le_bytes());
    bytes.extend_from_slice(name);
    bytes.push(0);
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());

    let mut header = PackageHeader::new();
    header.entry_table_offset = payload.len() as u32;
    header.write_to(&mut bytes).unwrap();
    bytes.extend_from_slice(&1i32.to_le_bytes());
    bytes.extend_from_slice(&PACKAGE_VERSION.to_le_bytes());

    let temp_file = NamedTempFile::new().unwrap();
    std::fs::write(temp_file.path(), &bytes).unwrap();
    temp_file
}

#[test]
fn test_hand_built_package_opens() {
    let temp_file = hand_built_package(b"legacy\\name.txt", b"hello");

    let mut package = open(temp_file.path()).unwrap();
    assert_eq!(package.read_to_vec("LEGACY\\NAME.TXT").unwrap(), b"hello");
    package.append_file("new.txt", b"world").unwrap();
    package.close().unwrap();

    let mut package = open(temp_file.path()).unwrap();
    assert_eq!(package.file_count(), 2);
    assert_eq!(package.read_to_vec("legacy\\name.txt").unwrap(), b"hello");
    assert_eq!(package.read_to_vec("new.txt").unwrap(), b"world");
}

#[test]
fn test_latin1_name_rejected_without_touching_file() {
    let temp_file = hand_built_package(&[0xE9; 100], b"hello");
    let path = temp_file.path();
    let before = std::fs::read(path).unwrap();

    let mut package = Package::new(PackageOptions::default());
    match package.open(path, OpenMode::OpenExisting) {
        Err(PackageError::CorruptEntryTable(msg)) => assert!(msg.contains("UTF-8")),
        Err(e) => panic!("Expected CorruptEntryTable, got {:?}", e),
        Ok(()) => panic!("Non UTF-8 name should be rejected"),
    }

    // Nothing can be appended over the existing table
    assert!(matches!(
        package.append_file("new.txt", b"hello"),
        Err(PackageError::NotOpen)
    ));
    assert!(package.close().is_ok());
    assert_eq!(std::fs::read(path).unwrap(), before);
}

#[test]
fn test_inflated_raw_length_is_not_allocated() {
    let (temp_file, table_offset) = create_test_package();
    let path = temp_file.path();

    // Second record: "test.txt" record is 25 bytes, then len + "data.bin\0" + offset
    let raw_length_at = table_offset as u64 + 25 + 4 + 9 + 4;
    write_bytes_at(path, raw_length_at, &u32::MAX.to_le_bytes());

    let mut package = open(path).unwrap();
    let (entry, _) = package.get_file_entry("data.bin").unwrap();
    assert_eq!(entry.raw_length, u32::MAX);
    assert!(entry.is_compressed());

    assert!(matches!(
        package.entry_buffer(&entry),
        Err(PackageError::CorruptEntryTable(_))
    ));
    assert!(matches!(
        package.read_to_vec("data.bin"),
        Err(PackageError::CorruptEntryTable(_))
    ));
    assert_eq!(package.read_to_vec("test.txt").unwrap(), b"Hello, World!");
}
