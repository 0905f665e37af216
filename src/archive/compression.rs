use crate::error::{PackageError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use tracing::debug;

/// Initial size of the per-package scratch buffer (1 MiB)
pub const SCRATCH_BUFFER_SIZE: usize = 1024 * 1024;

/// Bytes any codec may add on top of its ratio bound (frame and block headers)
pub const MAX_EXPANSION_SLACK: u64 = 64 * 1024;

/// Payload codec
///
/// The container does not record which codec wrote an entry, so a package must
/// be reopened with the codec it was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// zlib stream (deflate), level 0-9
    Zlib { level: u32 },
    /// Zstandard frame, level 1-22
    Zstd { level: i32 },
    /// Raw LZ4 block, size known from the entry
    Lz4,
}

impl Default for Codec {
    fn default() -> Self {
        Codec::Zlib { level: 1 }
    }
}

impl Codec {
    /// Build a codec from its config name and level
    pub fn from_name(name: &str, level: Option<i32>) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "zlib" | "deflate" => Ok(Codec::Zlib {
                level: level.unwrap_or(1).clamp(0, 9) as u32,
            }),
            "zstd" => Ok(Codec::Zstd {
                level: level.unwrap_or(3).clamp(1, 22),
            }),
            "lz4" => Ok(Codec::Lz4),
            other => Err(PackageError::Config(format!("Unknown codec: {}", other))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Codec::Zlib { .. } => "zlib",
            Codec::Zstd { .. } => "zstd",
            Codec::Lz4 => "lz4",
        }
    }

    /// Upper bound on raw bytes produced per stored byte
    ///
    /// Deflate tops out near 1032:1, an LZ4 block near 255:1, and a zstd RLE
    /// block expands 4 bytes to at most 128 KiB.
    pub fn max_expansion(&self) -> u64 {
        match self {
            Codec::Zlib { .. } => 1032,
            Codec::Zstd { .. } => 32 * 1024,
            Codec::Lz4 => 255,
        }
    }

    /// Append the compressed form of `data` to `out`
    pub fn compress_into(&self, data: &[u8], out: &mut Vec<u8>) -> Result<()> {
        match *self {
            Codec::Zlib { level } => {
                let zlib_err = |e: std::io::Error| {
                    PackageError::CompressionFailed(format!("Zlib compression failed: {}", e))
                };
                let mut encoder = ZlibEncoder::new(&mut *out, Compression::new(level));
                encoder.write_all(data).map_err(zlib_err)?;
                encoder.finish().map_err(zlib_err)?;
                Ok(())
            }
            Codec::Zstd { level } => zstd::stream::copy_encode(data, &mut *out, level)
                .map_err(|e| {
                    PackageError::CompressionFailed(format!("Zstd compression failed: {}", e))
                }),
            Codec::Lz4 => {
                let start = out.len();
                out.resize(start + lz4_flex::block::get_maximum_output_size(data.len()), 0);
                let written = lz4_flex::block::compress_into(data, &mut out[start..])
                    .map_err(|e| {
                        PackageError::CompressionFailed(format!("LZ4 compression failed: {}", e))
                    })?;
                out.truncate(start + written);
                Ok(())
            }
        }
    }

    /// Decompress a whole entry; the output must be exactly `raw_length` bytes
    pub fn decompress(&self, stored: &[u8], raw_length: usize) -> Result<Vec<u8>> {
        let data = match *self {
            Codec::Zlib { .. } => {
                let mut decoder = ZlibDecoder::new(stored).take(raw_length as u64 + 1);
                let mut data = Vec::with_capacity(raw_length);
                decoder.read_to_end(&mut data).map_err(|e| {
                    PackageError::DecompressionFailed(format!("Zlib decompression failed: {}", e))
                })?;
                data
            }
            Codec::Zstd { .. } => zstd::bulk::decompress(stored, raw_length).map_err(|e| {
                PackageError::DecompressionFailed(format!("Zstd decompression failed: {}", e))
            })?,
            Codec::Lz4 => lz4_flex::block::decompress(stored, raw_length).map_err(|e| {
                PackageError::DecompressionFailed(format!("LZ4 decompression failed: {}", e))
            })?,
        };

        if data.len() != raw_length {
            return Err(PackageError::DecompressionFailed(format!(
                "Size mismatch: expected {} bytes, got {}",
                raw_length,
                data.len()
            )));
        }

        Ok(data)
    }
}

/// Outcome of a best-effort compression
#[derive(Debug)]
pub struct Compressed<'a> {
    pub bytes: &'a [u8],
    pub was_compressed: bool,
}

/// Compress `data` into `scratch`, falling back to the input when the codec
/// fails or the result is not strictly smaller
pub fn compress<'a>(codec: &Codec, data: &'a [u8], scratch: &'a mut Vec<u8>) -> Compressed<'a> {
    scratch.clear();
    match codec.compress_into(data, scratch) {
        Ok(()) if scratch.len() < data.len() => Compressed {
            bytes: scratch.as_slice(),
            was_compressed: true,
        },
        Ok(()) => Compressed {
            bytes: data,
            was_compressed: false,
        },
        Err(e) => {
            debug!("Storing {} bytes verbatim: {}", data.len(), e);
            Compressed {
                bytes: data,
                was_compressed: false,
            }
        }
    }
}
