#![no_main]

use filepack_rs::{Package, PackageOptions, Vfs};
use libfuzzer_sys::fuzz_target;
use std::io::Write;
use tempfile::NamedTempFile;

fuzz_target!(|data: &[u8]| {
    // Write fuzz data to temporary file
    let mut temp_file = match NamedTempFile::new() {
        Ok(f) => f,
        Err(_) => return,
    };

    if temp_file.write_all(data).is_err() {
        return;
    }

    if temp_file.flush().is_err() {
        return;
    }

    // Try to open package - should never panic
    let mut package = match Package::open_existing(temp_file.path(), PackageOptions::default()) {
        Ok(p) => p,
        Err(_) => return, // Expected for invalid data
    };

    // Try to read each entry - should never panic
    let names: Vec<String> = package.entries().iter().map(|e| e.name.clone()).collect();
    for name in &names {
        let _ = package.read_to_vec(name);
        let mut small = [0u8; 8];
        let _ = package.read_file(name, &mut small, 1);
    }

    // Lookups with odd names - should never panic
    let _ = package.contains("");
    let _ = package.contains("\\");
    let _ = package.contains("..\\..\\etc\\passwd");

    // Same data through the virtual file layer
    let shared = package.into_shared();
    let vfs = match temp_file.path().parent() {
        Some(dir) => Vfs::new(dir).with_package(shared),
        None => return,
    };
    for name in names.iter().take(16) {
        if let Ok(mut file) = vfs.open(name) {
            while file.read_line(64).is_some() {}
        }
    }
});
