//! Compression validation across codecs
//!
//! Every codec must round-trip through a package, incompressible data must be
//! stored raw, and reading with the wrong codec must fail cleanly.

use filepack_rs::{Codec, Package, PackageError, PackageOptions};
use rand::{Rng, SeedableRng};
use tempfile::NamedTempFile;

fn options(codec: Codec) -> PackageOptions {
    PackageOptions {
        compression_enabled: true,
        codec,
    }
}

fn codecs() -> Vec<Codec> {
    vec![
        Codec::Zlib { level: 1 },
        Codec::Zlib { level: 9 },
        Codec::Zstd { level: 3 },
        Codec::Lz4,
    ]
}

#[test]
fn test_all_codecs_roundtrip() {
    let text = b"The quick brown fox jumps over the lazy dog. ".repeat(200);
    let zeros = vec![0u8; 64 * 1024];

    for codec in codecs() {
        let temp_file = NamedTempFile::new().unwrap();

        {
            let mut package = Package::create(temp_file.path(), options(codec)).unwrap();
            package.append_file("text.txt", &text).unwrap();
            package.append_file("zeros.bin", &zeros).unwrap();
            package.close().unwrap();
        }

        let mut package = Package::open_existing(temp_file.path(), options(codec)).unwrap();
        for (name, expected) in [("text.txt", &text), ("zeros.bin", &zeros)] {
            let (entry, _) = package.get_file_entry(name).unwrap();
            assert!(
                entry.is_compressed(),
                "{} should compress with {}",
                name,
                codec.name()
            );
            assert_eq!(&package.read_to_vec(name).unwrap(), expected, "{}", codec.name());
        }
    }
}

#[test]
fn test_incompressible_data_stored_raw() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let noise: Vec<u8> = (0..16 * 1024).map(|_| rng.gen()).collect();

    for codec in codecs() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut package = Package::create(temp_file.path(), options(codec)).unwrap();
        package.append_file("noise.bin", &noise).unwrap();

        let (entry, _) = package.get_file_entry("noise.bin").unwrap();
        assert!(!entry.is_compressed(), "{}", codec.name());
        assert_eq!(entry.stored_length, entry.raw_length);
        assert_eq!(package.read_to_vec("noise.bin").unwrap(), noise);
    }
}

#[test]
fn test_compression_disabled() {
    let temp_file = NamedTempFile::new().unwrap();
    let data = vec![b'a'; 10_000];

    let mut package = Package::create(
        temp_file.path(),
        PackageOptions {
            compression_enabled: false,
            ..PackageOptions::default()
        },
    )
    .unwrap();
    package.append_file("a.txt", &data).unwrap();

    let (entry, _) = package.get_file_entry("a.txt").unwrap();
    assert!(!entry.is_compressed());
    assert_eq!(entry.stored_length, 10_000);
    assert_eq!(package.header().entry_table_offset, 10_000);
    assert_eq!(package.read_to_vec("a.txt").unwrap(), data);
}

#[test]
fn test_stored_entries_readable_without_compression() {
    let temp_file = NamedTempFile::new().unwrap();
    let text = b"compress me ".repeat(500);

    {
        let mut package = Package::create(temp_file.path(), PackageOptions::default()).unwrap();
        package.append_file("tiny.txt", b"abc").unwrap();
        package.append_file("big.txt", &text).unwrap();
        package.close().unwrap();
    }

    // A package reopened with compression off still decompresses
    let disabled = PackageOptions {
        compression_enabled: false,
        ..PackageOptions::default()
    };
    let mut package = Package::open_existing(temp_file.path(), disabled).unwrap();
    assert_eq!(package.read_to_vec("tiny.txt").unwrap(), b"abc");
    assert_eq!(package.read_to_vec("big.txt").unwrap(), text);
}

#[test]
fn test_codec_mismatch_fails_cleanly() {
    let temp_file = NamedTempFile::new().unwrap();
    let text = b"written with zstd ".repeat(300);

    {
        let mut package =
            Package::create(temp_file.path(), options(Codec::Zstd { level: 3 })).unwrap();
        package.append_file("z.txt", &text).unwrap();
        package.close().unwrap();
    }

    let mut package = Package::open_existing(temp_file.path(), options(Codec::default())).unwrap();
    assert!(matches!(
        package.read_to_vec("z.txt"),
        Err(PackageError::DecompressionFailed(_))
    ));
}

#[test]
fn test_codec_from_name() {
    assert_eq!(Codec::from_name("zlib", None).unwrap(), Codec::Zlib { level: 1 });
    assert_eq!(Codec::from_name("ZSTD", Some(50)).unwrap(), Codec::Zstd { level: 22 });
    assert_eq!(Codec::from_name("lz4", None).unwrap(), Codec::Lz4);
    assert!(matches!(
        Codec::from_name("brotli", None),
        Err(PackageError::Config(_))
    ));
}
