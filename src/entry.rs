//! Entry page handling.
//!
//! Static hosts serve `index.html` for the bundle root. Exports don't always
//! contain one (a builder may export the home page as `home.html`, or only
//! as an extensionless file that was just renamed). This stage guarantees a
//! root `index.html` exists after the run.
//!
//! The choice of entry page is deterministic: pages are considered in sorted
//! path order, and the configured `index.preferred` file name wins when
//! present anywhere in the bundle.

use crate::bundle::{self, encode_path};
use crate::config::{IndexConfig, IndexMode};
use crate::links::{self, LinksError, RenameMap};
use maud::{DOCTYPE, Markup, html};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

const INDEX: &str = "index.html";

#[derive(Error, Debug)]
pub enum EntryError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Link rewrite failed: {0}")]
    Links(#[from] LinksError),
}

/// What [`ensure_index`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexAction {
    /// The bundle already had a root `index.html`.
    Present,
    /// A redirect page pointing at this page was written.
    Redirected(String),
    /// This root-level page was renamed to `index.html`.
    Renamed(String),
    /// The bundle has no pages; a placeholder was written.
    Placeholder,
}

impl fmt::Display for IndexAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => write!(f, "index.html present"),
            Self::Redirected(page) => write!(f, "index.html redirects to {page}"),
            Self::Renamed(page) => write!(f, "{page} renamed to index.html"),
            Self::Placeholder => write!(f, "placeholder index.html written"),
        }
    }
}

/// Pick the entry page among `pages` (sorted relative paths).
///
/// The first page whose file name equals `preferred` wins; otherwise the
/// first page in order.
pub fn choose_entry_page<'a>(pages: &'a [String], preferred: &str) -> Option<&'a str> {
    let preferred = preferred.trim();
    if !preferred.is_empty()
        && let Some(hit) = pages
            .iter()
            .find(|p| p.rsplit('/').next() == Some(preferred))
    {
        return Some(hit);
    }
    pages.first().map(String::as_str)
}

fn redirect_page(target: &str) -> Markup {
    let href = encode_path(target);
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta http-equiv="refresh" content={ "0; url=" (href) };
                link rel="canonical" href=(href);
                title { "Redirecting" }
            }
            body {
                p {
                    "Redirecting to "
                    a href=(href) { (target) }
                    "."
                }
            }
        }
    }
}

fn placeholder_page() -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                title { "Index" }
            }
            body {
                p { "This site has no pages yet." }
            }
        }
    }
}

/// Make sure the bundle root has an `index.html`.
pub fn ensure_index(root: &Path, config: &IndexConfig) -> Result<IndexAction, EntryError> {
    let index_path = root.join(INDEX);
    if index_path.is_file() {
        return Ok(IndexAction::Present);
    }

    let candidates: Vec<String> = bundle::pages(root)?
        .into_iter()
        .filter(|p| p != INDEX)
        .collect();

    let Some(choice) = choose_entry_page(&candidates, &config.preferred) else {
        fs::write(&index_path, placeholder_page().into_string())?;
        warn!("bundle has no pages, wrote placeholder index.html");
        return Ok(IndexAction::Placeholder);
    };

    if config.mode == IndexMode::Rename {
        if !choice.contains('/') {
            fs::rename(root.join(choice), &index_path)?;
            let renames = RenameMap::from([(choice.to_string(), INDEX.to_string())]);
            let rewritten = links::rewrite_links(root, &renames)?;
            info!(page = choice, rewritten, "renamed entry page to index.html");
            return Ok(IndexAction::Renamed(choice.to_string()));
        }
        warn!(
            page = choice,
            "entry page is not at the bundle root, writing a redirect instead of renaming"
        );
    }

    fs::write(&index_path, redirect_page(choice).into_string())?;
    info!(page = choice, "wrote redirecting index.html");
    Ok(IndexAction::Redirected(choice.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{file_list, read, write_bundle};

    fn config(mode: IndexMode, preferred: &str) -> IndexConfig {
        IndexConfig {
            mode,
            preferred: preferred.to_string(),
        }
    }

    #[test]
    fn choose_prefers_named_page() {
        let pages = vec!["a.html".to_string(), "blog/home.html".to_string()];
        assert_eq!(choose_entry_page(&pages, "home.html"), Some("blog/home.html"));
        assert_eq!(choose_entry_page(&pages, ""), Some("a.html"));
        assert_eq!(choose_entry_page(&pages, "missing.html"), Some("a.html"));
        assert_eq!(choose_entry_page(&[], "home.html"), None);
    }

    #[test]
    fn existing_index_is_left_alone() {
        let tmp = write_bundle(&[("index.html", "original"), ("about.html", "")]);
        let action = ensure_index(tmp.path(), &IndexConfig::default()).unwrap();
        assert_eq!(action, IndexAction::Present);
        assert_eq!(read(tmp.path(), "index.html"), "original");
    }

    #[test]
    fn redirect_to_first_page_in_order() {
        let tmp = write_bundle(&[("zeta.html", ""), ("about us.html", ""), ("blog/a.html", "")]);

        let action = ensure_index(tmp.path(), &IndexConfig::default()).unwrap();

        assert_eq!(action, IndexAction::Redirected("about us.html".into()));
        let index = read(tmp.path(), "index.html");
        assert!(index.starts_with("<!DOCTYPE html>"));
        assert!(index.contains(r#"content="0; url=about%20us.html""#));
        assert!(index.contains(r#"href="about%20us.html""#));
    }

    #[test]
    fn redirect_honours_preferred_nested_page() {
        let tmp = write_bundle(&[("a.html", ""), ("en/home.html", "")]);

        let action = ensure_index(tmp.path(), &config(IndexMode::Redirect, "home.html")).unwrap();

        assert_eq!(action, IndexAction::Redirected("en/home.html".into()));
        assert!(read(tmp.path(), "index.html").contains("url=en/home.html"));
    }

    #[test]
    fn rename_root_page_and_rewrite_links() {
        let tmp = write_bundle(&[
            ("home.html", "<a href=\"about.html\">About</a>"),
            ("about.html", "<a href=\"/home.html#top\">Home</a>"),
        ]);

        let action = ensure_index(tmp.path(), &config(IndexMode::Rename, "home.html")).unwrap();

        assert_eq!(action, IndexAction::Renamed("home.html".into()));
        assert_eq!(file_list(tmp.path()), vec!["about.html", "index.html"]);
        assert!(read(tmp.path(), "about.html").contains(r#"href="/index.html#top""#));
    }

    #[test]
    fn rename_keeps_links_to_nested_namesake() {
        let tmp = write_bundle(&[
            ("about.html", "<a href=\"blog/about.html\">Blog</a>"),
            (
                "blog/about.html",
                "<a href=\"about.html\">Blog about</a><a href=\"../about.html\">Home</a>",
            ),
        ]);

        let action = ensure_index(tmp.path(), &config(IndexMode::Rename, "")).unwrap();

        assert_eq!(action, IndexAction::Renamed("about.html".into()));
        let blog = read(tmp.path(), "blog/about.html");
        assert!(blog.contains(r#"href="about.html""#));
        assert!(blog.contains(r#"href="../index.html""#));
        assert!(crate::links::find_broken_links(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn rename_falls_back_to_redirect_for_nested_page() {
        let tmp = write_bundle(&[("en/home.html", "")]);

        let action = ensure_index(tmp.path(), &config(IndexMode::Rename, "")).unwrap();

        assert_eq!(action, IndexAction::Redirected("en/home.html".into()));
        assert!(tmp.path().join("en/home.html").exists());
    }

    #[test]
    fn placeholder_when_no_pages() {
        let tmp = write_bundle(&[("style.css", "")]);

        let action = ensure_index(tmp.path(), &IndexConfig::default()).unwrap();

        assert_eq!(action, IndexAction::Placeholder);
        assert!(read(tmp.path(), "index.html").contains("no pages"));
    }

    #[test]
    fn same_bundle_same_choice() {
        let files = [("c.html", ""), ("b.html", ""), ("d/a.html", "")];
        let first = ensure_index(write_bundle(&files).path(), &IndexConfig::default()).unwrap();
        let second = ensure_index(write_bundle(&files).path(), &IndexConfig::default()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, IndexAction::Redirected("b.html".into()));
    }
}
