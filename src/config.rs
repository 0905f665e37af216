//! Configuration for the file module
//!
//! Loaded from TOML:
//!
//! ```toml
//! base_dir = "assets"
//!
//! [compression]
//! enabled = true
//! codec = "zlib"   # zlib | zstd | lz4
//! level = 1
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use crate::archive::{Codec, PackageOptions};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File module configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilepackConfig {
    /// Directory loose files and package names are resolved against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,

    /// Payload compression policy
    pub compression: CompressionConfig,
}

/// Compression section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub codec: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<i32>,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            codec: "zlib".to_string(),
            level: None,
        }
    }
}

impl FilepackConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Package options described by the compression section
    pub fn package_options(&self) -> Result<PackageOptions> {
        Ok(PackageOptions {
            compression_enabled: self.compression.enabled,
            codec: Codec::from_name(&self.compression.codec, self.compression.level)?,
        })
    }

    /// Configured base directory, or the current directory when unset
    pub fn base_dir(&self) -> Result<PathBuf> {
        match &self.base_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }
}
