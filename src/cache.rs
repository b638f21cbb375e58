//! Download and encoding cache for localized images.
//!
//! Downloading an image and encoding several responsive variants is the
//! slowest part of a run, and site exports are typically re-processed many
//! times while a site is being built. This module lets the image stage skip
//! both the network and the encoder when a URL was already handled with the
//! same encoding parameters.
//!
//! # Design
//!
//! ## Cache keys
//!
//! Entries are keyed by **image URL**. Each entry records:
//!
//! - **`source_hash`**: SHA-256 of the downloaded bytes. Its first 12 hex
//!   characters (`hash12`) prefix every file name derived from the image, so
//!   two URLs with the same basename never collide.
//! - **`params_hash`**: SHA-256 of the encoding parameters (output format,
//!   quality, breakpoints). If any of these change, the params hash changes
//!   and the image is downloaded and encoded again.
//!
//! A cache hit requires:
//! 1. An entry for the URL with a matching `params_hash` exists
//! 2. The original and every variant file recorded in it still exist on disk
//!
//! ## Storage
//!
//! The cache lives in its own directory (`images.cache_dir`), outside the
//! output bundle, because the bundle is deleted and recreated on every build:
//!
//! ```text
//! <cache_dir>/
//! ├── image-cache.json          # this manifest
//! ├── originals/                # {hash12}-{basename}
//! └── variants/                 # {hash12}-{stem}-{width}w.{ext}
//! ```
//!
//! ## Bypassing the cache
//!
//! Pass `--no-cache` to `build` or `images` to start from an empty manifest.
//! Every image is downloaded again and the manifest is rewritten.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache manifest file within the cache directory.
pub const MANIFEST_FILENAME: &str = "image-cache.json";

/// Version of the cache manifest format. Bump this to invalidate all
/// existing caches when the format or key computation changes.
const MANIFEST_VERSION: u32 = 1;

/// Subdirectory of the cache holding downloaded originals.
pub const ORIGINALS_DIR: &str = "originals";

/// Subdirectory of the cache holding encoded variants.
pub const VARIANTS_DIR: &str = "variants";

/// One encoded variant, stored relative to the cache directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedVariant {
    pub width: u32,
    pub file: String,
}

/// Everything recorded about one localized image URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub params_hash: String,
    /// Downloaded original, relative to the cache directory.
    pub original: String,
    /// Variants sorted by width. Empty for images served as-is (SVG).
    pub variants: Vec<CachedVariant>,
}

impl CacheEntry {
    /// All files this entry depends on, relative to the cache directory.
    fn files(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.original.as_str()).chain(self.variants.iter().map(|v| v.file.as_str()))
    }
}

/// On-disk cache manifest mapping image URLs to their cache entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: BTreeMap<String, CacheEntry>,
}

impl CacheManifest {
    /// Create an empty manifest (used for `--no-cache` or first run).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
        }
    }

    /// Load from the cache directory. Returns an empty manifest if the
    /// file doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(cache_dir: &Path) -> Self {
        let content = match std::fs::read_to_string(manifest_path(cache_dir)) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(_) => return Self::empty(),
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest
    }

    /// Save to the cache directory, creating it if needed.
    pub fn save(&self, cache_dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(cache_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(manifest_path(cache_dir), json)
    }

    /// Look up a usable cache entry for `url`.
    ///
    /// Returns the entry only if it was encoded with `params_hash` **and**
    /// every file it references is still present under `cache_dir`.
    pub fn find_cached(&self, url: &str, params_hash: &str, cache_dir: &Path) -> Option<&CacheEntry> {
        let entry = self.entries.get(url)?;
        if entry.params_hash != params_hash {
            return None;
        }
        entry
            .files()
            .all(|f| cache_dir.join(f).is_file())
            .then_some(entry)
    }

    /// Record (or replace) the entry for `url`.
    pub fn insert(&mut self, url: String, entry: CacheEntry) {
        self.entries.insert(url, entry);
    }
}

/// Resolve the cache manifest path for a cache directory.
pub fn manifest_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(MANIFEST_FILENAME)
}

/// SHA-256 of a byte slice, returned as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// First 12 hex characters of the content hash, used as a file name prefix.
pub fn hash12(bytes: &[u8]) -> String {
    let mut hash = hash_bytes(bytes);
    hash.truncate(12);
    hash
}

/// SHA-256 hash of the variant encoding parameters.
///
/// Inputs: output format, quality and breakpoints. If any of these change,
/// previously cached variants are invalid.
pub fn hash_variant_params(format: &str, quality: u32, breakpoints: &[u32]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"variants\0");
    hasher.update(format.as_bytes());
    hasher.update(b"\0");
    hasher.update(quality.to_le_bytes());
    for width in breakpoints {
        hasher.update(width.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Summary of cache performance for an image run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} downloaded ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} downloaded", self.misses)
        }
    }
}
