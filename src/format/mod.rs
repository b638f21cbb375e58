//! Canonical pretty-printing of HTML, CSS and JavaScript.
//!
//! Exported sites usually ship minified markup. This stage rewrites every
//! page, stylesheet and script in a stable, readable layout so the bundle
//! can be reviewed and diffed. Each formatter is idempotent: formatting an
//! already formatted file changes nothing, so repeated runs leave the bundle
//! untouched.
//!
//! | Extension          | Formatter        | Gate             |
//! |--------------------|------------------|------------------|
//! | `.html`, `.htm`    | [`html::format_html`] | `format.html`    |
//! | `.css`             | [`css::format_css`]   | `format.css_js`  |
//! | `.js`, `.mjs`      | [`js::format_js`]     | `format.css_js`  |

pub mod css;
pub mod html;
pub mod js;

use crate::bundle::{relative_path, walk_files};
use crate::config::FormatConfig;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("{0} is not valid UTF-8")]
    Encoding(String),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FormatStats {
    pub html: usize,
    pub css: usize,
    pub js: usize,
    /// Files that were already formatted.
    pub unchanged: usize,
    pub failed: usize,
}

impl FormatStats {
    pub fn changed(&self) -> usize {
        self.html + self.css + self.js
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Html,
    Css,
    Js,
}

fn kind_of(path: &Path, config: &FormatConfig) -> Option<Kind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "html" | "htm" if config.html => Some(Kind::Html),
        "css" if config.css_js => Some(Kind::Css),
        "js" | "mjs" if config.css_js => Some(Kind::Js),
        _ => None,
    }
}

/// Format `source` as the given kind.
fn format_source(kind: Kind, source: &str, indent: usize) -> String {
    match kind {
        Kind::Html => html::format_html(source, indent),
        Kind::Css => css::format_css(source, indent),
        Kind::Js => js::format_js(source, indent),
    }
}

/// Format one file in place. Returns whether it was rewritten.
fn format_file(path: &Path, rel: &str, kind: Kind, indent: usize) -> Result<bool, FormatError> {
    let bytes = fs::read(path)?;
    let original =
        String::from_utf8(bytes).map_err(|_| FormatError::Encoding(rel.to_string()))?;
    let source = original.strip_prefix('\u{feff}').unwrap_or(&original);
    let formatted = format_source(kind, source, indent);
    if formatted == original {
        return Ok(false);
    }
    fs::write(path, formatted)?;
    Ok(true)
}

/// Pretty-print every HTML, CSS and JS file in the bundle.
///
/// Files are only written when their formatted text differs. A file that
/// cannot be read or is not UTF-8 is logged and skipped.
pub fn format_bundle(root: &Path, config: &FormatConfig) -> Result<FormatStats, FormatError> {
    let mut stats = FormatStats::default();
    for path in walk_files(root)? {
        let Some(kind) = kind_of(&path, config) else {
            continue;
        };
        let rel = relative_path(root, &path);
        match format_file(&path, &rel, kind, config.indent) {
            Ok(true) => {
                debug!(file = %rel, "formatted");
                match kind {
                    Kind::Html => stats.html += 1,
                    Kind::Css => stats.css += 1,
                    Kind::Js => stats.js += 1,
                }
            }
            Ok(false) => stats.unchanged += 1,
            Err(e) => {
                warn!(file = %rel, error = %e, "skipping format");
                stats.failed += 1;
            }
        }
    }
    info!(
        html = stats.html,
        css = stats.css,
        js = stats.js,
        unchanged = stats.unchanged,
        "formatting done"
    );
    Ok(stats)
}
