//! Run configuration.
//!
//! A single config file (TOML, or JSON when the file name ends in `.json`)
//! controls which optional stages run and how. Every key is optional: values
//! not present in the file keep their stock defaults. Unknown keys are
//! rejected to catch typos early.
//!
//! ## Configuration Options
//!
//! ```toml
//! site_url = "https://example.com"   # Base URL used in sitemap.xml
//! output_dir = "dist"                # Overridden by --output
//!
//! [index]
//! mode = "redirect"                  # "redirect" or "rename"
//! preferred = ""                     # File name to prefer as the entry page
//!
//! [images]
//! enabled = true                     # Download external images
//! dir = "images"                     # Bundle directory for localized images
//! breakpoints = [480, 800, 1200, 1600, 2000]
//! format = "webp"                    # webp | avif | jpeg | png | keep
//! quality = 82
//! sizes = "(max-width: 1200px) 100vw, 1200px"
//! timeout_secs = 30
//! keep_originals = false
//! cache_dir = ".postexport-cache"
//! # max_downloads = 4               # Defaults to the number of CPU cores
//!
//! [format]
//! html = true
//! css_js = true
//! indent = 2
//!
//! [sitemap]
//! enabled = true
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration for a post-export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Public base URL of the deployed site, used for sitemap `<loc>` entries.
    pub site_url: String,
    /// Output directory, relative to the working directory.
    pub output_dir: String,
    /// Entry page handling.
    pub index: IndexConfig,
    /// External image localization.
    pub images: ImagesConfig,
    /// HTML/CSS/JS pretty-printing.
    pub format: FormatConfig,
    /// Sitemap generation.
    pub sitemap: SitemapConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_url: "https://example.com".to_string(),
            output_dir: "dist".to_string(),
            index: IndexConfig::default(),
            images: ImagesConfig::default(),
            format: FormatConfig::default(),
            sitemap: SitemapConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.site_url).map_err(|e| {
            ConfigError::Validation(format!("site_url '{}' is not a URL: {e}", self.site_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(
                "site_url must use http or https".into(),
            ));
        }
        if self.output_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "output_dir must not be empty".into(),
            ));
        }
        if !(1..=100).contains(&self.images.quality) {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.images.breakpoints.is_empty() {
            return Err(ConfigError::Validation(
                "images.breakpoints must not be empty".into(),
            ));
        }
        if self.images.breakpoints.contains(&0) {
            return Err(ConfigError::Validation(
                "images.breakpoints values must be non-zero".into(),
            ));
        }
        if self.images.max_downloads == Some(0) {
            return Err(ConfigError::Validation(
                "images.max_downloads must be at least 1".into(),
            ));
        }
        if !is_plain_relative(&self.images.dir) {
            return Err(ConfigError::Validation(format!(
                "images.dir '{}' must be a relative path inside the bundle",
                self.images.dir
            )));
        }
        if self.format.indent > 8 {
            return Err(ConfigError::Validation(
                "format.indent must be 0-8".into(),
            ));
        }
        Ok(())
    }
}

/// True for a relative path with at least one normal component and no
/// root, prefix or `..`.
fn is_plain_relative(path: &str) -> bool {
    let path = Path::new(path);
    path.components().any(|c| matches!(c, Component::Normal(_)))
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// How a missing `index.html` is provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    /// Write a small page that redirects to the chosen entry page.
    Redirect,
    /// Rename the chosen root-level page to `index.html` and fix links to it.
    Rename,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    pub mode: IndexMode,
    /// File name (not path) of the page to prefer, e.g. `"home.html"`.
    /// Empty means "first page in sorted order".
    pub preferred: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            mode: IndexMode::Redirect,
            preferred: String::new(),
        }
    }
}

/// Encoding used for responsive image variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webp,
    Avif,
    Jpeg,
    Png,
    /// Re-encode in the source image's own format.
    Keep,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Keep => "keep",
        }
    }

    /// File extension for variants, given the source file's extension.
    pub fn extension(self, source_ext: &str) -> String {
        match self {
            Self::Webp => "webp".to_string(),
            Self::Avif => "avif".to_string(),
            Self::Jpeg => "jpg".to_string(),
            Self::Png => "png".to_string(),
            Self::Keep => source_ext.to_ascii_lowercase(),
        }
    }
}

/// External image download and responsive variant settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Download externally hosted `<img>` sources and localize them.
    pub enabled: bool,
    /// Bundle-relative directory receiving localized images.
    pub dir: String,
    /// Target widths for responsive variants.
    pub breakpoints: Vec<u32>,
    pub format: OutputFormat,
    /// Lossy encoding quality (1-100).
    pub quality: u32,
    /// Value for the `sizes` attribute when the tag has none.
    pub sizes: String,
    /// Per-request network timeout.
    pub timeout_secs: u64,
    /// Also copy each downloaded original into `<dir>/original/`.
    pub keep_originals: bool,
    /// Directory (outside the bundle) holding downloads, encoded variants
    /// and the cache manifest between runs.
    pub cache_dir: String,
    /// Maximum parallel downloads. When absent, defaults to the number of
    /// CPU cores. Encoding never uses more threads than there are cores.
    pub max_downloads: Option<usize>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: "images".to_string(),
            breakpoints: vec![480, 800, 1200, 1600, 2000],
            format: OutputFormat::Webp,
            quality: 82,
            sizes: "(max-width: 1200px) 100vw, 1200px".to_string(),
            timeout_secs: 30,
            keep_originals: false,
            cache_dir: ".postexport-cache".to_string(),
            max_downloads: None,
        }
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Resolve the number of concurrent downloads from config.
///
/// Downloads wait on the network, so an explicit value is used as is.
/// Without one, defaults to the number of cores.
pub fn effective_downloads(config: &ImagesConfig) -> usize {
    config.max_downloads.unwrap_or_else(available_cores).max(1)
}

/// Resolve the encoding parallelism: the download count, capped at the
/// number of cores.
pub fn effective_encoders(config: &ImagesConfig) -> usize {
    effective_downloads(config).min(available_cores())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatConfig {
    /// Pretty-print `.html`/`.htm` files.
    pub html: bool,
    /// Pretty-print `.css` and `.js`/`.mjs` files.
    pub css_js: bool,
    /// Spaces per indentation level.
    pub indent: usize,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            html: true,
            css_js: true,
            indent: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SitemapConfig {
    pub enabled: bool,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Parse config text. `json` selects the JSON parser instead of TOML.
pub fn parse_config(content: &str, json: bool) -> Result<SiteConfig, ConfigError> {
    let config: SiteConfig = if json {
        serde_json::from_str(content)?
    } else {
        toml::from_str(content)?
    };
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`, or the stock defaults when no path is
/// given. A path that was given but cannot be read is an error.
pub fn load_config(path: Option<&Path>) -> Result<SiteConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(SiteConfig::default());
    };
    let content = fs::read_to_string(path)?;
    let json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    parse_config(&content, json)
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# postexport configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Public base URL of the deployed site (used in sitemap.xml).
site_url = "https://example.com"

# Output directory. The --output flag takes precedence.
output_dir = "dist"

# ---------------------------------------------------------------------------
# Entry page
# ---------------------------------------------------------------------------
[index]
# What to do when the export has no root index.html:
#   "redirect" - write a small index.html redirecting to the chosen page
#   "rename"   - rename the chosen root-level page to index.html
mode = "redirect"

# File name of the page to prefer, e.g. "home.html". Empty = first page
# in sorted path order.
preferred = ""

# ---------------------------------------------------------------------------
# External images
# ---------------------------------------------------------------------------
[images]
# Download externally hosted <img> sources and serve them from the bundle.
enabled = true

# Bundle directory receiving localized images.
dir = "images"

# Widths to generate. Widths at or above the original are skipped; the
# original width is always included.
breakpoints = [480, 800, 1200, 1600, 2000]

# Variant encoding: webp | avif | jpeg | png | keep (source format).
format = "webp"

# Lossy encoding quality (1-100).
quality = 82

# sizes attribute added to <img> tags that don't declare one.
sizes = "(max-width: 1200px) 100vw, 1200px"

# Per-request network timeout in seconds.
timeout_secs = 30

# Also copy downloaded originals into <dir>/original/.
keep_originals = false

# Cache directory (outside the bundle) reused between runs.
cache_dir = ".postexport-cache"

# Maximum parallel downloads. Omit to use the number of CPU cores.
# Encoding is always capped at the number of cores.
# max_downloads = 4

# ---------------------------------------------------------------------------
# Formatting
# ---------------------------------------------------------------------------
[format]
html = true
css_js = true
indent = 2

# ---------------------------------------------------------------------------
# Sitemap
# ---------------------------------------------------------------------------
[sitemap]
enabled = true
"##
}
