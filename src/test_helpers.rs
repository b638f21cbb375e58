//! Shared test utilities for the postexport test suite.
//!
//! Provides bundle fixtures, file readers and synthetic image encoders that
//! the per-stage unit tests share.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = write_bundle(&[
//!     ("index.html", "<a href=\"about\">About</a>"),
//!     ("about", "<!DOCTYPE html><html></html>"),
//! ]);
//! fix_extensionless(tmp.path()).unwrap();
//! assert_eq!(file_list(tmp.path()), vec!["about.html", "index.html"]);
//! ```

use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

// =========================================================================
// Bundle fixtures
// =========================================================================

/// Write `(relative path, contents)` pairs into a fresh temp directory.
pub fn write_bundle(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (rel, contents) in files {
        write_file(tmp.path(), rel, contents.as_bytes());
    }
    tmp
}

/// Write one file below `root`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

/// Read a bundle file as a string. Panics with the path on failure.
pub fn read(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel))
        .unwrap_or_else(|e| panic!("failed to read {rel}: {e}"))
}

/// All regular files below `root` as sorted `/`-separated relative paths.
pub fn file_list(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

// =========================================================================
// Synthetic images
// =========================================================================

fn gradient(width: u32, height: u32) -> image::DynamicImage {
    image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

/// Encode a small gradient JPEG in memory.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    gradient(width, height)
        .write_to(&mut buf, image::ImageFormat::Jpeg)
        .unwrap();
    buf.into_inner()
}

/// Encode a small gradient PNG in memory.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    gradient(width, height)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}
