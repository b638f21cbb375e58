//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{VariantSize, calculate_variant_sizes};
use super::params::{Quality, ResizeParams};
use crate::config::OutputFormat;
use std::path::{Path, PathBuf};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

/// One encoded variant on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedVariant {
    pub width: u32,
    pub height: u32,
    /// File name within the output directory, e.g. `abc123-hero-800w.webp`.
    pub file_name: String,
    pub path: PathBuf,
}

/// Configuration for responsive variant generation.
#[derive(Debug, Clone)]
pub struct ResponsiveConfig {
    pub breakpoints: Vec<u32>,
    pub format: OutputFormat,
    pub quality: Quality,
}

/// Plan the variants for a source image without encoding anything.
pub fn plan_variants(
    source: &Path,
    original_dims: (u32, u32),
    config: &ResponsiveConfig,
) -> Vec<(VariantSize, String)> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let source_ext = source
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = config.format.extension(&source_ext);

    calculate_variant_sizes(original_dims, &config.breakpoints)
        .into_iter()
        .map(|size| {
            let name = if ext.is_empty() {
                format!("{stem}-{}w", size.width)
            } else {
                format!("{stem}-{}w.{ext}", size.width)
            };
            (size, name)
        })
        .collect()
}

/// Create responsive variants of `source` in `output_dir`.
///
/// Widths at or above the original are skipped and one variant at the
/// original width is always written. With [`OutputFormat::Keep`] the
/// full-width variant is a byte copy of the source instead of a re-encode.
/// Variants are returned sorted by width.
pub fn create_responsive_variants(
    backend: &impl ImageBackend,
    source: &Path,
    output_dir: &Path,
    original_dims: (u32, u32),
    config: &ResponsiveConfig,
) -> Result<Vec<GeneratedVariant>> {
    std::fs::create_dir_all(output_dir)?;
    let (orig_w, _) = original_dims;
    let mut variants = Vec::new();

    for (size, file_name) in plan_variants(source, original_dims, config) {
        let path = output_dir.join(&file_name);
        if config.format == OutputFormat::Keep && size.width == orig_w {
            std::fs::copy(source, &path)?;
        } else {
            backend.resize(&ResizeParams {
                source: source.to_path_buf(),
                output: path.clone(),
                width: size.width,
                height: size.height,
                quality: config.quality,
            })?;
        }
        variants.push(GeneratedVariant {
            width: size.width,
            height: size.height,
            file_name,
            path,
        });
    }

    Ok(variants)
}
