//! Filename normalization and internal link rewriting.
//!
//! Site builders export "pretty URL" pages as files without an extension
//! (`about`, `blog/post`), which plain static hosts then serve as
//! `application/octet-stream`. This stage renames every extensionless file
//! that looks like HTML to `<name>.html` and rewrites every internal
//! reference to it, in HTML attributes and in stylesheets.
//!
//! ## Reference resolution
//!
//! A reference is internal when it has no URI scheme (`https:`, `mailto:`,
//! `data:`…), is not protocol-relative (`//host/x`) and is not a bare
//! `#fragment`. Its path part (before `?` or `#`) is percent-decoded and
//! resolved against the referencing file's directory, or against the bundle
//! root when it starts with `/`. Paths climbing above the root are left
//! alone.
//!
//! Exports frequently write root-relative links without the leading slash
//! (`href="about"` from `blog/post.html`). When the directory-relative
//! resolution finds neither a renamed file nor an existing target, the value
//! is tried once more as a root-relative path.
//!
//! Only the last path segment of a matching reference is changed, so
//! prefixes (`../`, `/`), query strings and fragments survive verbatim.

use crate::bundle::{is_page, relative_path, walk_files};
use lol_html::{HtmlRewriter, Settings, element};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum LinksError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("HTML rewrite error: {0}")]
    Rewrite(String),
}

/// Old bundle-relative path → new bundle-relative path.
///
/// Renames never move a file to another directory; only its file name
/// changes.
pub type RenameMap = BTreeMap<String, String>;

/// HTML attributes holding a single URL.
const URL_ATTRIBUTES: &[&str] = &["href", "src", "action", "poster", "data"];

/// How many leading bytes [`looks_like_html`] inspects.
const SNIFF_LEN: u64 = 4096;

static SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*:").expect("valid regex"));
static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(['"]?)([^'")\s]+)(['"]?)\s*\)"#).expect("valid regex")
});
static CSS_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@import\s+(['"])([^'"]+)(['"])"#).expect("valid regex"));

/// Summary of a [`fix_links`] run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LinkFixReport {
    pub renames: RenameMap,
    /// Pages and stylesheets whose content changed.
    pub files_rewritten: usize,
}

/// An internal reference that does not resolve to a file in the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenLink {
    /// Page containing the reference.
    pub page: String,
    pub attribute: String,
    pub value: String,
}

// ============================================================================
// Filename fixing
// ============================================================================

/// True if the file's first 4 KiB look like an HTML document.
pub fn looks_like_html(path: &Path) -> io::Result<bool> {
    let mut head = Vec::new();
    fs::File::open(path)?.take(SNIFF_LEN).read_to_end(&mut head)?;
    let text = String::from_utf8_lossy(&head).to_lowercase();
    Ok(text.contains("<!doctype html") || (text.contains("<html") && text.contains("</html>")))
}

/// Rename extensionless HTML files to `<name>.html`.
///
/// A file qualifies when its name contains no `.` at all and its content
/// [looks like HTML](looks_like_html). When `<name>.html` already exists the
/// file is left alone. Returns the renames performed.
pub fn fix_extensionless(root: &Path) -> Result<RenameMap, LinksError> {
    let mut renames = RenameMap::new();
    for path in walk_files(root)? {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.contains('.') {
            continue;
        }
        match looks_like_html(&path) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "could not inspect file");
                continue;
            }
        }

        let target = path.with_file_name(format!("{name}.html"));
        let old_rel = relative_path(root, &path);
        if target.exists() {
            warn!(file = %old_rel, "not renaming: {}.html already exists", name);
            continue;
        }
        if let Err(e) = fs::rename(&path, &target) {
            warn!(file = %old_rel, error = %e, "rename failed");
            continue;
        }
        let new_rel = relative_path(root, &target);
        debug!(from = %old_rel, to = %new_rel, "renamed");
        renames.insert(old_rel, new_rel);
    }
    Ok(renames)
}

/// Rename extensionless pages and rewrite every reference to them.
pub fn fix_links(root: &Path) -> Result<LinkFixReport, LinksError> {
    let renames = fix_extensionless(root)?;
    let files_rewritten = rewrite_links(root, &renames)?;
    info!(
        renamed = renames.len(),
        rewritten = files_rewritten,
        "fixed extensionless pages"
    );
    Ok(LinkFixReport {
        renames,
        files_rewritten,
    })
}

// ============================================================================
// Reference resolution
// ============================================================================

/// True for references that point outside the bundle or nowhere at all.
pub fn is_external(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("//") || value.starts_with('#') || SCHEME.is_match(value)
}

/// Split a reference into its path and its `?query#fragment` suffix.
fn split_reference(value: &str) -> (&str, &str) {
    match value.find(['?', '#']) {
        Some(i) => value.split_at(i),
        None => (value, ""),
    }
}

/// Join `path` onto `base_dir`, normalizing `.` and `..`.
///
/// Returns `None` when the result would climb above the bundle root.
fn join_normalized(base_dir: &str, path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    let base = if path.starts_with('/') { "" } else { base_dir };
    for segment in base.split('/').chain(path.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

/// Directory part of a bundle-relative path (`""` for root-level files).
pub fn parent_dir(rel: &str) -> &str {
    rel.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Resolve an internal reference to the bundle-relative path it names.
///
/// `base_dir` is the directory of the referencing file. Returns `None` for
/// external references, self-references (`?q`, empty) and paths escaping
/// the root. A trailing `/` is kept so callers can tell directories apart.
pub fn resolve_reference(value: &str, base_dir: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || is_external(value) {
        return None;
    }
    let (path, _) = split_reference(value);
    if path.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(path).ok()?;
    let mut resolved = join_normalized(base_dir, &decoded)?;
    if decoded.ends_with('/') && !resolved.is_empty() {
        resolved.push('/');
    }
    Some(resolved)
}

fn last_segment(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, last)| last).unwrap_or(path)
}

/// Existence test for bundle-relative targets, see [`target_exists`].
pub type Exists<'a> = &'a dyn Fn(&str) -> bool;

/// Rewrite one reference according to `renames`.
///
/// Returns the new attribute value, or `None` when the reference is not
/// internal or does not point at a renamed file. The root-relative fallback
/// only applies when `exists` rejects the directory-relative target.
pub fn rewrite_reference(
    value: &str,
    base_dir: &str,
    renames: &RenameMap,
    exists: Exists<'_>,
) -> Option<String> {
    let trimmed = value.trim();
    let resolved = resolve_reference(trimmed, base_dir)?;
    if resolved.ends_with('/') || resolved.is_empty() {
        return None;
    }

    let (old, new) = match renames.get_key_value(&resolved) {
        Some(hit) => hit,
        None if exists(&resolved) => return None,
        None => {
            let (path, _) = split_reference(trimmed);
            let decoded = urlencoding::decode(path).ok()?;
            let mut stripped: &str = &decoded;
            loop {
                let next = stripped.trim_start_matches("./").trim_start_matches('/');
                if next.len() == stripped.len() {
                    break;
                }
                stripped = next;
            }
            let fallback = join_normalized("", stripped)?;
            renames.get_key_value(&fallback)?
        }
    };

    let (path, suffix) = split_reference(trimmed);
    let (prefix, raw_last) = match path.rsplit_once('/') {
        Some((prefix, last)) => (Some(prefix), last),
        None => (None, path),
    };
    let old_name = last_segment(old);
    let new_name = last_segment(new);
    let new_last = match new_name.strip_prefix(old_name) {
        Some(extra) => format!("{raw_last}{}", urlencoding::encode(extra)),
        None => urlencoding::encode(new_name).into_owned(),
    };
    Some(match prefix {
        Some(prefix) => format!("{prefix}/{new_last}{suffix}"),
        None => format!("{new_last}{suffix}"),
    })
}

/// Split a `srcset` value into `(url, descriptor)` candidates.
fn srcset_candidates(value: &str) -> Vec<(&str, &str)> {
    value
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|candidate| match candidate.split_once(char::is_whitespace) {
            Some((url, descriptor)) => (url, descriptor.trim()),
            None => (candidate, ""),
        })
        .collect()
}

fn rewrite_srcset(
    value: &str,
    base_dir: &str,
    renames: &RenameMap,
    exists: Exists<'_>,
) -> Option<String> {
    let mut changed = false;
    let parts: Vec<String> = srcset_candidates(value)
        .into_iter()
        .map(|(url, descriptor)| {
            let url = match rewrite_reference(url, base_dir, renames, exists) {
                Some(new) => {
                    changed = true;
                    new
                }
                None => url.to_string(),
            };
            if descriptor.is_empty() {
                url
            } else {
                format!("{url} {descriptor}")
            }
        })
        .collect();
    changed.then(|| parts.join(", "))
}

// ============================================================================
// Rewriting
// ============================================================================

/// Replace capture group `group` of every match of `re` through `f`.
fn replace_group(
    re: &Regex,
    text: &str,
    group: usize,
    mut f: impl FnMut(&str) -> Option<String>,
) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut changed = false;
    for caps in re.captures_iter(text) {
        let Some(m) = caps.get(group) else { continue };
        if let Some(new) = f(m.as_str()) {
            out.push_str(&text[last..m.start()]);
            out.push_str(&new);
            last = m.end();
            changed = true;
        }
    }
    if !changed {
        return None;
    }
    out.push_str(&text[last..]);
    Some(out)
}

/// Rewrite `url(...)` and `@import "..."` references in CSS text.
pub fn rewrite_css(
    css: &str,
    base_dir: &str,
    renames: &RenameMap,
    exists: Exists<'_>,
) -> Option<String> {
    let rewrite = |v: &str| rewrite_reference(v, base_dir, renames, exists);
    let after_urls = replace_group(&CSS_URL, css, 2, rewrite);
    let current = after_urls.as_deref().unwrap_or(css);
    match replace_group(&CSS_IMPORT, current, 2, rewrite) {
        Some(done) => Some(done),
        None => after_urls,
    }
}

/// Rewrite references in one HTML document. Returns `None` if unchanged.
pub fn rewrite_html(
    html: &[u8],
    base_dir: &str,
    renames: &RenameMap,
    exists: Exists<'_>,
) -> Result<Option<Vec<u8>>, LinksError> {
    let mut output = Vec::with_capacity(html.len());
    let mut changed = false;

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("*", |el| {
                for attr in URL_ATTRIBUTES {
                    if let Some(value) = el.get_attribute(attr)
                        && let Some(new) = rewrite_reference(&value, base_dir, renames, exists)
                    {
                        el.set_attribute(attr, &new)?;
                        changed = true;
                    }
                }
                if let Some(value) = el.get_attribute("srcset")
                    && let Some(new) = rewrite_srcset(&value, base_dir, renames, exists)
                {
                    el.set_attribute("srcset", &new)?;
                    changed = true;
                }
                if let Some(value) = el.get_attribute("style")
                    && let Some(new) = rewrite_css(&value, base_dir, renames, exists)
                {
                    el.set_attribute("style", &new)?;
                    changed = true;
                }
                Ok(())
            })],
            ..Settings::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    rewriter
        .write(html)
        .map_err(|e| LinksError::Rewrite(e.to_string()))?;
    rewriter
        .end()
        .map_err(|e| LinksError::Rewrite(e.to_string()))?;

    Ok(changed.then_some(output))
}

fn is_stylesheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("css"))
}

/// Rewrite references to renamed files in every page and stylesheet.
///
/// Returns the number of files whose content changed. Files that cannot be
/// read or rewritten are logged and skipped.
pub fn rewrite_links(root: &Path, renames: &RenameMap) -> Result<usize, LinksError> {
    if renames.is_empty() {
        return Ok(0);
    }
    let exists = |target: &str| target_exists(root, target);
    let mut rewritten = 0;
    for path in walk_files(root)? {
        let rel = relative_path(root, &path);
        let base_dir = parent_dir(&rel);

        let result = if is_page(&path) {
            fs::read(&path)
                .map_err(LinksError::from)
                .and_then(|bytes| rewrite_html(&bytes, base_dir, renames, &exists))
        } else if is_stylesheet(&path) {
            fs::read_to_string(&path)
                .map_err(LinksError::from)
                .map(|css| {
                    rewrite_css(&css, base_dir, renames, &exists).map(String::into_bytes)
                })
        } else {
            continue;
        };

        match result {
            Ok(Some(new)) => {
                fs::write(&path, new)?;
                debug!(file = %rel, "rewrote links");
                rewritten += 1;
            }
            Ok(None) => {}
            Err(e) => warn!(file = %rel, error = %e, "skipping link rewrite"),
        }
    }
    Ok(rewritten)
}

// ============================================================================
// Verification
// ============================================================================

/// Collect `(attribute, value)` pairs of every internal reference in a page.
fn collect_references(html: &[u8]) -> Result<Vec<(String, String)>, LinksError> {
    let mut refs = Vec::new();
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("*", |el| {
                for attr in URL_ATTRIBUTES {
                    if let Some(value) = el.get_attribute(attr) {
                        refs.push((attr.to_string(), value));
                    }
                }
                if let Some(value) = el.get_attribute("srcset") {
                    for (url, _) in srcset_candidates(&value) {
                        refs.push(("srcset".to_string(), url.to_string()));
                    }
                }
                Ok(())
            })],
            ..Settings::default()
        },
        |_: &[u8]| {},
    );
    rewriter
        .write(html)
        .map_err(|e| LinksError::Rewrite(e.to_string()))?;
    rewriter
        .end()
        .map_err(|e| LinksError::Rewrite(e.to_string()))?;
    Ok(refs)
}

/// True when `target` (from [`resolve_reference`]) exists in the bundle.
pub fn target_exists(root: &Path, target: &str) -> bool {
    let path = root.join(target.trim_end_matches('/'));
    if target.ends_with('/') || target.is_empty() || path.is_dir() {
        return path.join("index.html").is_file();
    }
    path.is_file()
}

/// List internal references in pages that don't resolve to a bundle file.
///
/// A reference to a directory resolves when the directory holds an
/// `index.html`. Never modifies the bundle.
pub fn find_broken_links(root: &Path) -> Result<Vec<BrokenLink>, LinksError> {
    let mut broken = Vec::new();
    for path in walk_files(root)? {
        if !is_page(&path) {
            continue;
        }
        let page = relative_path(root, &path);
        let refs = match fs::read(&path)
            .map_err(LinksError::from)
            .and_then(|bytes| collect_references(&bytes))
        {
            Ok(refs) => refs,
            Err(e) => {
                warn!(file = %page, error = %e, "could not scan page for links");
                continue;
            }
        };
        for (attribute, value) in refs {
            let Some(target) = resolve_reference(&value, parent_dir(&page)) else {
                continue;
            };
            if !target_exists(root, &target) {
                broken.push(BrokenLink {
                    page: page.clone(),
                    attribute,
                    value,
                });
            }
        }
    }
    Ok(broken)
}
