//! Bundle preparation and traversal.
//!
//! A bundle is the output directory holding the exported site while it is
//! being transformed. [`prepare`] fills it from the user's input (a `.zip`
//! export or a directory), and the helpers below give every later stage the
//! same deterministic view of its files: sorted, `/`-separated paths
//! relative to the bundle root.
//!
//! ## Zip layout
//!
//! Site builders usually wrap the export in a single top-level folder
//! (`my-site.webflow/index.html`). When every entry shares one top-level
//! directory, that directory is stripped so `index.html` lands at the bundle
//! root. macOS resource forks (`__MACOSX/`) are ignored, and entries whose
//! names would escape the output directory are skipped.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error("Unsupported input {}: expected a .zip file or a directory", .0.display())]
    UnsupportedInput(PathBuf),
    #[error("Output {} overlaps input {}", output.display(), input.display())]
    OverlappingPaths { input: PathBuf, output: PathBuf },
}

/// Fill `output` with the contents of `input` and return the bundle root.
///
/// Any existing `output` directory is removed first, so a build always
/// starts from the pristine export.
pub fn prepare(input: &Path, output: &Path) -> Result<PathBuf, BundleError> {
    let input_abs =
        fs::canonicalize(input).map_err(|_| BundleError::InputNotFound(input.to_path_buf()))?;
    let output_abs = resolve_output(output)?;

    let input_is_dir = input_abs.is_dir();
    if output_abs == input_abs
        || input_abs.starts_with(&output_abs)
        || (input_is_dir && output_abs.starts_with(&input_abs))
    {
        return Err(BundleError::OverlappingPaths {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        });
    }

    let is_zip = !input_is_dir && is_zip_path(&input_abs);
    if !input_is_dir && !is_zip {
        return Err(BundleError::UnsupportedInput(input.to_path_buf()));
    }

    if output_abs.exists() {
        debug!(output = %output_abs.display(), "removing previous output");
        fs::remove_dir_all(&output_abs)?;
    }
    fs::create_dir_all(&output_abs)?;

    if is_zip {
        let count = extract_zip(&input_abs, &output_abs)?;
        info!(files = count, input = %input.display(), "extracted export archive");
    } else {
        let count = copy_tree(&input_abs, &output_abs)?;
        info!(files = count, input = %input.display(), "copied export directory");
    }
    Ok(output_abs)
}

fn is_zip_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}

/// Absolute form of a path that may not exist yet: the deepest existing
/// ancestor is canonicalized and the missing tail re-attached.
fn resolve_output(output: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(output)?;
    let mut existing = absolute.as_path();
    let mut tail = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }
    let mut resolved = fs::canonicalize(existing).unwrap_or_else(|_| existing.to_path_buf());
    for name in tail.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

fn is_resource_fork(name: &Path) -> bool {
    name.components()
        .next()
        .is_some_and(|c| c.as_os_str() == "__MACOSX")
}

/// The single top-level directory shared by every entry, if there is one.
fn common_root(names: &[(PathBuf, bool)]) -> Option<PathBuf> {
    let mut roots = BTreeSet::new();
    for (name, is_dir) in names {
        let mut components = name.components();
        let first = components.next()?;
        if !is_dir && components.next().is_none() {
            // A file at the archive root: nothing to strip.
            return None;
        }
        roots.insert(PathBuf::from(first.as_os_str()));
    }
    if roots.len() == 1 {
        roots.into_iter().next()
    } else {
        None
    }
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<usize, BundleError> {
    let mut archive = zip::ZipArchive::new(File::open(archive_path)?)?;

    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        match entry.enclosed_name() {
            Some(name) if is_resource_fork(&name) => {}
            Some(name) => names.push((i, name, entry.is_dir())),
            None => warn!(entry = entry.name(), "skipping zip entry outside the archive root"),
        }
    }

    let listing: Vec<(PathBuf, bool)> = names.iter().map(|(_, n, d)| (n.clone(), *d)).collect();
    let strip = common_root(&listing);
    if let Some(root) = &strip {
        debug!(root = %root.display(), "stripping common top-level folder");
    }

    let mut count = 0;
    for (index, name, is_dir) in names {
        let rel = match &strip {
            Some(root) => name.strip_prefix(root).unwrap_or(&name).to_path_buf(),
            None => name,
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(&rel);
        if is_dir {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut entry = archive.by_index(index)?;
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        debug!(file = %rel.display(), "extracted");
        count += 1;
    }
    Ok(count)
}

fn copy_tree(src: &Path, dest: &Path) -> Result<usize, BundleError> {
    let mut count = 0;
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            count += 1;
        }
    }
    Ok(count)
}

// ============================================================================
// Traversal helpers
// ============================================================================

/// `/`-separated path of `path` relative to `root`.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Every regular file below `root`, sorted by relative path (byte order).
pub fn walk_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort_by_cached_key(|p| relative_path(root, p));
    Ok(files)
}

/// True for `.html` / `.htm` files, case-insensitively.
pub fn is_page(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
}

/// Relative paths of every page in the bundle, sorted.
pub fn pages(root: &Path) -> io::Result<Vec<String>> {
    Ok(walk_files(root)?
        .iter()
        .filter(|p| is_page(p))
        .map(|p| relative_path(root, p))
        .collect())
}

/// Percent-encode each segment of a relative path for use in a URL.
pub fn encode_path(rel: &str) -> String {
    rel.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
