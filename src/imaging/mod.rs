//! Image processing for localized images, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Resize → WebP/AVIF/JPEG/PNG** | Lanczos3 + `image` encoders |
//! | **Sniff** | `image::guess_format`, SVG prefix check |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for variant width math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{VariantSize, calculate_variant_sizes};
pub use operations::{
    GeneratedVariant, ResponsiveConfig, create_responsive_variants, get_dimensions,
};
pub use params::{Quality, ResizeParams};
pub use rust_backend::{RustBackend, is_svg, sniff_extension};
