//! `sitemap.xml` generation.
//!
//! Written last among the stages that change files, so it lists the final
//! page set: one `<url><loc>` per page, sorted by path, using the
//! sitemaps.org 0.9 schema.

use crate::bundle::{self, encode_path};
use maud::{Markup, PreEscaped, html};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub const SITEMAP_FILENAME: &str = "sitemap.xml";

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

#[derive(Error, Debug)]
pub enum SitemapError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Relative paths of every page, sorted and without duplicates.
pub fn collect_pages(root: &Path) -> io::Result<Vec<String>> {
    let mut pages = bundle::pages(root)?;
    pages.sort();
    pages.dedup();
    Ok(pages)
}

/// Public URL of a page: `site_url` joined with the percent-encoded path.
pub fn page_url(site_url: &str, page: &str) -> String {
    format!("{}/{}", site_url.trim_end_matches('/'), encode_path(page))
}

pub fn render_sitemap(site_url: &str, pages: &[String]) -> Markup {
    html! {
        (PreEscaped(r#"<?xml version="1.0" encoding="UTF-8"?>"#))
        urlset xmlns=(SITEMAP_NS) {
            @for page in pages {
                url { loc { (page_url(site_url, page)) } }
            }
        }
    }
}

/// Write `sitemap.xml` at the bundle root. Returns the number of entries.
pub fn write_sitemap(root: &Path, site_url: &str) -> Result<usize, SitemapError> {
    let pages = collect_pages(root)?;
    let mut xml = render_sitemap(site_url, &pages).into_string();
    xml.push('\n');
    fs::write(root.join(SITEMAP_FILENAME), xml)?;
    info!(entries = pages.len(), "wrote sitemap.xml");
    Ok(pages.len())
}
