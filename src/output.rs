//! CLI output formatting.
//!
//! Each kind of output has a `format_*` function returning lines, for
//! testability, and a `print_*` wrapper that writes them to stdout. Format
//! functions are pure: no I/O, no side effects.
//!
//! # Output Format
//!
//! ## Progress
//!
//! ```text
//! ==> Localizing images
//!     ↓ https://cdn.example.com/hero.jpg (5 variants)
//!     ✓ https://cdn.example.com/logo.svg (cached)
//!     ✗ https://cdn.example.com/gone.png: 404 Not Found
//! ```
//!
//! ## Summary
//!
//! ```text
//! Renamed 2 files
//!     about → about.html
//!     blog/post → blog/post.html
//! Rewrote links in 3 files
//! Index: index.html redirects to about.html
//! Images: 1 cached, 1 downloaded (2 total), 1 failed, 2 pages rewritten
//! Formatted 3 HTML, 1 CSS, 1 JS (2 unchanged)
//! Sitemap: 4 pages
//! No broken links
//! ==> Done: dist
//! ```

use crate::format::FormatStats;
use crate::images::{ImageEvent, ImageStats};
use crate::links::{BrokenLink, RenameMap};
use crate::pipeline::{Progress, RunReport};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Format a progress event as display lines.
pub fn format_progress(progress: &Progress) -> Vec<String> {
    match progress {
        Progress::Stage(stage) => vec![format!("==> {stage}")],
        Progress::Image(event) => vec![format!("{}{}", indent(1), image_event_line(event))],
    }
}

fn image_event_line(event: &ImageEvent) -> String {
    match event {
        ImageEvent::Localized { url, variants } => {
            format!("↓ {url} ({})", plural(*variants, "variant", "variants"))
        }
        ImageEvent::Cached { url, .. } => format!("✓ {url} (cached)"),
        ImageEvent::Failed { url, reason } => format!("✗ {url}: {reason}"),
    }
}

pub fn print_progress(progress: &Progress) {
    for line in format_progress(progress) {
        println!("{line}");
    }
}

// ============================================================================
// Stage summaries
// ============================================================================

/// Renamed files, one indented `old → new` line each.
pub fn format_renames(renames: &RenameMap, files_rewritten: usize) -> Vec<String> {
    let mut lines = Vec::new();
    if renames.is_empty() {
        lines.push("No extensionless pages".to_string());
    } else {
        lines.push(format!("Renamed {}", plural(renames.len(), "file", "files")));
        for (from, to) in renames {
            lines.push(format!("{}{from} → {to}", indent(1)));
        }
    }
    lines.push(format!(
        "Rewrote links in {}",
        plural(files_rewritten, "file", "files")
    ));
    lines
}

pub fn format_image_stats(stats: &ImageStats) -> Vec<String> {
    if stats.discovered == 0 {
        return vec!["Images: no external images".to_string()];
    }
    let mut line = format!("Images: {}", stats.cache);
    if stats.failed > 0 {
        line.push_str(&format!(", {} failed", stats.failed));
    }
    line.push_str(&format!(
        ", {} rewritten",
        plural(stats.pages_rewritten, "page", "pages")
    ));
    vec![line]
}

pub fn format_format_stats(stats: &FormatStats) -> Vec<String> {
    let mut line = format!(
        "Formatted {} HTML, {} CSS, {} JS ({} unchanged)",
        stats.html, stats.css, stats.js, stats.unchanged
    );
    if stats.failed > 0 {
        line.push_str(&format!(", {} skipped", stats.failed));
    }
    vec![line]
}

/// Broken internal links grouped under their page.
pub fn format_broken_links(broken: &[BrokenLink]) -> Vec<String> {
    if broken.is_empty() {
        return vec!["No broken links".to_string()];
    }
    let mut lines = vec![format!(
        "{}:",
        plural(broken.len(), "broken link", "broken links")
    )];
    let mut current_page: Option<&str> = None;
    for link in broken {
        if current_page != Some(link.page.as_str()) {
            lines.push(format!("{}{}", indent(1), link.page));
            current_page = Some(&link.page);
        }
        lines.push(format!("{}{}=\"{}\"", indent(2), link.attribute, link.value));
    }
    lines
}

pub fn print_broken_links(broken: &[BrokenLink]) {
    for line in format_broken_links(broken) {
        println!("{line}");
    }
}

// ============================================================================
// Run report
// ============================================================================

/// Final summary of a full run.
pub fn format_run_report(report: &RunReport) -> Vec<String> {
    let mut lines = format_renames(&report.renames, report.links_rewritten);
    if let Some(action) = &report.index {
        lines.push(format!("Index: {action}"));
    }
    if let Some(images) = &report.images {
        lines.extend(format_image_stats(images));
    }
    if let Some(format) = &report.format {
        lines.extend(format_format_stats(format));
    }
    if let Some(entries) = report.sitemap_entries {
        lines.push(format!("Sitemap: {}", plural(entries, "page", "pages")));
    }
    lines.extend(format_broken_links(&report.broken_links));
    lines.push(format!("==> Done: {}", report.output.display()));
    lines
}

pub fn print_run_report(report: &RunReport) {
    for line in format_run_report(report) {
        println!("{line}");
    }
}

/// Print any `format_*` output.
pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStats;
    use crate::entry::IndexAction;
    use crate::pipeline::Stage;
    use std::path::PathBuf;

    fn broken(page: &str, attribute: &str, value: &str) -> BrokenLink {
        BrokenLink {
            page: page.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn stage_progress_line() {
        assert_eq!(
            format_progress(&Progress::Stage(Stage::Images)),
            vec!["==> Localizing images"]
        );
    }

    #[test]
    fn image_progress_lines() {
        let lines: Vec<String> = [
            ImageEvent::Localized {
                url: "https://x.com/a.jpg".into(),
                variants: 1,
            },
            ImageEvent::Cached {
                url: "https://x.com/b.jpg".into(),
                variants: 3,
            },
            ImageEvent::Failed {
                url: "https://x.com/c.jpg".into(),
                reason: "timed out".into(),
            },
        ]
        .into_iter()
        .flat_map(|e| format_progress(&Progress::Image(e)))
        .collect();

        assert_eq!(
            lines,
            vec![
                "    ↓ https://x.com/a.jpg (1 variant)",
                "    ✓ https://x.com/b.jpg (cached)",
                "    ✗ https://x.com/c.jpg: timed out",
            ]
        );
    }

    #[test]
    fn renames_listed_in_order() {
        let renames = RenameMap::from([
            ("blog/post".to_string(), "blog/post.html".to_string()),
            ("about".to_string(), "about.html".to_string()),
        ]);
        assert_eq!(
            format_renames(&renames, 1),
            vec![
                "Renamed 2 files",
                "    about → about.html",
                "    blog/post → blog/post.html",
                "Rewrote links in 1 file",
            ]
        );
        assert_eq!(format_renames(&RenameMap::new(), 0)[0], "No extensionless pages");
    }

    #[test]
    fn image_stats_line() {
        let stats = ImageStats {
            discovered: 3,
            cache: CacheStats { hits: 1, misses: 1 },
            failed: 1,
            pages_rewritten: 2,
        };
        assert_eq!(
            format_image_stats(&stats),
            vec!["Images: 1 cached, 1 downloaded (2 total), 1 failed, 2 pages rewritten"]
        );
        assert_eq!(
            format_image_stats(&ImageStats::default()),
            vec!["Images: no external images"]
        );
    }

    #[test]
    fn broken_links_grouped_by_page() {
        let lines = format_broken_links(&[
            broken("a.html", "href", "x.html"),
            broken("a.html", "src", "y.png"),
            broken("b/c.html", "href", "../z"),
        ]);
        assert_eq!(
            lines,
            vec![
                "3 broken links:",
                "    a.html",
                "        href=\"x.html\"",
                "        src=\"y.png\"",
                "    b/c.html",
                "        href=\"../z\"",
            ]
        );
        assert_eq!(format_broken_links(&[]), vec!["No broken links"]);
    }

    #[test]
    fn run_report_summary() {
        let report = RunReport {
            output: PathBuf::from("dist"),
            renames: RenameMap::from([("about".to_string(), "about.html".to_string())]),
            links_rewritten: 2,
            index: Some(IndexAction::Redirected("about.html".into())),
            images: None,
            format: Some(FormatStats {
                html: 2,
                css: 1,
                js: 0,
                unchanged: 1,
                failed: 0,
            }),
            sitemap_entries: Some(2),
            broken_links: Vec::new(),
        };

        assert_eq!(
            format_run_report(&report),
            vec![
                "Renamed 1 file",
                "    about → about.html",
                "Rewrote links in 2 files",
                "Index: index.html redirects to about.html",
                "Formatted 2 HTML, 1 CSS, 0 JS (1 unchanged)",
                "Sitemap: 2 pages",
                "No broken links",
                "==> Done: dist",
            ]
        );
    }
}
