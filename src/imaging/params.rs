//! Parameter types for image operations.
//!
//! These structs describe *what* to encode, not *how*. The
//! [`operations`](super::operations) module decides which variants a
//! downloaded image needs; the [`backend`](super::backend) does the pixel
//! work. A mock backend can stand in during tests without touching the
//! planning logic.
//!
//! - [`Quality`]: lossy encoding quality (1–100, default 82), clamped on construction.
//! - [`ResizeParams`]: source, output path, target dimensions and quality for one variant.

use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(82)
    }
}

/// Parameters for a single resize-and-encode operation.
///
/// The output encoding is chosen by the backend from `output`'s extension.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_82() {
        assert_eq!(Quality::default().value(), 82);
    }
}
