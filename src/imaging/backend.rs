//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait covers the two pixel operations the image
//! pipeline needs: reading dimensions and resizing into an encoded variant.
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::ResizeParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Must be `Sync`: variants for different images are encoded in parallel on
/// a rayon pool sharing one backend.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Resize `params.source` and encode it to `params.output`.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::Quality;
    use std::sync::Mutex;

    /// Answers `identify` with fixed dimensions and records every resize.
    /// Resized outputs are small marker files, not real images.
    #[derive(Default)]
    pub struct MockBackend {
        dims: Option<Dimensions>,
        resizes: Mutex<Vec<ResizeParams>>,
    }

    impl MockBackend {
        /// A backend whose `identify` always fails.
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sized(width: u32, height: u32) -> Self {
            Self {
                dims: Some(Dimensions { width, height }),
                ..Self::default()
            }
        }

        pub fn resizes(&self) -> Vec<ResizeParams> {
            self.resizes.lock().unwrap().clone()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.dims.ok_or_else(|| {
                BackendError::ProcessingFailed(format!("no dimensions for {}", path.display()))
            })
        }

        fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
            self.resizes.lock().unwrap().push(params.clone());
            if let Some(parent) = params.output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&params.output, format!("{}x{}", params.width, params.height))?;
            Ok(())
        }
    }

    #[test]
    fn mock_identify() {
        let dims = MockBackend::sized(800, 600).identify(Path::new("a.jpg")).unwrap();
        assert_eq!(dims, Dimensions { width: 800, height: 600 });
        assert!(MockBackend::new().identify(Path::new("a.jpg")).is_err());
    }

    #[test]
    fn mock_resize_writes_marker() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("nested/out.webp");
        let backend = MockBackend::new();
        let params = ResizeParams {
            source: "source.jpg".into(),
            output: output.clone(),
            width: 800,
            height: 600,
            quality: Quality::new(90),
        };

        backend.resize(&params).unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "800x600");
        assert_eq!(backend.resizes(), vec![params]);
    }
}
