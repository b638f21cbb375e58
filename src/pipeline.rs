//! Stage orchestration.
//!
//! [`run`] takes an export bundle from input to finished site:
//!
//! ```text
//! prepare → fix links → ensure index → images → format → sitemap → check
//! ```
//!
//! Stages run one after another; each consumes the directory left by the
//! previous one. Optional stages are skipped according to the config, and
//! their report fields stay `None`. Progress is reported over an optional
//! channel so the CLI can print while the run is still going.

use crate::bundle::{self, BundleError};
use crate::config::{ImagesConfig, SiteConfig};
use crate::entry::{self, EntryError, IndexAction};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::format::{self, FormatError, FormatStats};
use crate::images::{self, ImageEvent, ImageStats, ImagesError};
use crate::imaging::{ImageBackend, RustBackend};
use crate::links::{self, BrokenLink, LinksError, RenameMap};
use crate::sitemap::{self, SitemapError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error(transparent)]
    Links(#[from] LinksError),
    #[error(transparent)]
    Entry(#[from] EntryError),
    #[error(transparent)]
    Images(#[from] ImagesError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Sitemap(#[from] SitemapError),
    #[error("Output directory {0} does not exist; run `build` first")]
    OutputMissing(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prepare,
    FixLinks,
    Index,
    Images,
    Format,
    Sitemap,
    Check,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Prepare => "Preparing bundle",
            Self::FixLinks => "Fixing filenames and links",
            Self::Index => "Ensuring index page",
            Self::Images => "Localizing images",
            Self::Format => "Formatting HTML/CSS/JS",
            Self::Sitemap => "Writing sitemap",
            Self::Check => "Checking links",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Stage(Stage),
    Image(ImageEvent),
}

/// Everything a run did, for the final summary.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub output: PathBuf,
    pub renames: RenameMap,
    pub links_rewritten: usize,
    pub index: Option<IndexAction>,
    pub images: Option<ImageStats>,
    pub format: Option<FormatStats>,
    pub sitemap_entries: Option<usize>,
    pub broken_links: Vec<BrokenLink>,
}

fn notify(progress: Option<&Sender<Progress>>, stage: Stage) {
    info!(stage = %stage, "stage started");
    if let Some(tx) = progress {
        let _ = tx.send(Progress::Stage(stage));
    }
}

/// Fail unless `output` is an existing bundle directory.
pub fn existing_bundle(output: &Path) -> Result<&Path, PipelineError> {
    if output.is_dir() {
        Ok(output)
    } else {
        Err(PipelineError::OutputMissing(output.to_path_buf()))
    }
}

/// Run the image stage, forwarding per-image events to `progress`.
pub fn localize_images(
    backend: &impl ImageBackend,
    fetcher: &impl Fetcher,
    root: &Path,
    config: &ImagesConfig,
    use_cache: bool,
    progress: Option<&Sender<Progress>>,
) -> Result<ImageStats, ImagesError> {
    let forward = |event: ImageEvent| {
        if let Some(tx) = progress {
            let _ = tx.send(Progress::Image(event));
        }
    };
    images::process_bundle_with(backend, fetcher, root, config, use_cache, &forward)
}

/// Report internal links that do not resolve, logging each one.
pub fn check_links(root: &Path) -> Result<Vec<BrokenLink>, LinksError> {
    let broken = links::find_broken_links(root)?;
    for link in &broken {
        warn!(page = %link.page, attribute = %link.attribute, value = %link.value, "broken link");
    }
    Ok(broken)
}

/// Run every stage with the network fetcher and the pure Rust encoder.
pub fn run(
    input: &Path,
    output: &Path,
    config: &SiteConfig,
    use_cache: bool,
    progress: Option<Sender<Progress>>,
) -> Result<RunReport, PipelineError> {
    let fetcher = HttpFetcher::new(Duration::from_secs(config.images.timeout_secs))
        .map_err(ImagesError::from)?;
    run_with(
        &RustBackend::new(),
        &fetcher,
        input,
        output,
        config,
        use_cache,
        progress,
    )
}

/// Run every stage with a specific image backend and fetcher.
pub fn run_with(
    backend: &impl ImageBackend,
    fetcher: &impl Fetcher,
    input: &Path,
    output: &Path,
    config: &SiteConfig,
    use_cache: bool,
    progress: Option<Sender<Progress>>,
) -> Result<RunReport, PipelineError> {
    let progress = progress.as_ref();

    notify(progress, Stage::Prepare);
    let root = bundle::prepare(input, output)?;
    let mut report = RunReport {
        output: root.clone(),
        ..RunReport::default()
    };

    notify(progress, Stage::FixLinks);
    let fixed = links::fix_links(&root)?;
    report.renames = fixed.renames;
    report.links_rewritten = fixed.files_rewritten;

    notify(progress, Stage::Index);
    report.index = Some(entry::ensure_index(&root, &config.index)?);

    if config.images.enabled {
        notify(progress, Stage::Images);
        report.images = Some(localize_images(
            backend,
            fetcher,
            &root,
            &config.images,
            use_cache,
            progress,
        )?);
    }

    if config.format.html || config.format.css_js {
        notify(progress, Stage::Format);
        report.format = Some(format::format_bundle(&root, &config.format)?);
    }

    if config.sitemap.enabled {
        notify(progress, Stage::Sitemap);
        report.sitemap_entries = Some(sitemap::write_sitemap(&root, &config.site_url)?);
    }

    notify(progress, Stage::Check);
    report.broken_links = check_links(&root)?;

    info!(output = %root.display(), "run complete");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::MockFetcher;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::{file_list, read, write_bundle};
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn offline_config() -> SiteConfig {
        SiteConfig {
            images: ImagesConfig {
                enabled: false,
                ..ImagesConfig::default()
            },
            ..SiteConfig::default()
        }
    }

    #[test]
    fn stages_run_in_order() {
        let input = write_bundle(&[("home", "<!DOCTYPE html><a href=\"about\">About</a>"), ("about", "<html><body>Hi</body></html>")]);
        let out = TempDir::new().unwrap();
        let (tx, rx) = mpsc::channel();

        run_with(
            &MockBackend::new(),
            &MockFetcher::default(),
            input.path(),
            &out.path().join("site"),
            &SiteConfig::default(),
            true,
            Some(tx),
        )
        .unwrap();

        let stages: Vec<Stage> = rx
            .into_iter()
            .filter_map(|p| match p {
                Progress::Stage(s) => Some(s),
                Progress::Image(_) => None,
            })
            .collect();
        assert_eq!(
            stages,
            vec![
                Stage::Prepare,
                Stage::FixLinks,
                Stage::Index,
                Stage::Images,
                Stage::Format,
                Stage::Sitemap,
                Stage::Check,
            ]
        );
    }

    #[test]
    fn report_covers_every_stage() {
        let input = write_bundle(&[
            ("home", "<!DOCTYPE html><a href=\"about\">About</a><a href=\"gone.html\">x</a>"),
            ("about", "<!DOCTYPE html><p>About</p>"),
            ("style.css", "a{color:red}"),
        ]);
        let out = TempDir::new().unwrap();
        let site = out.path().join("site");

        let report = run_with(
            &MockBackend::new(),
            &MockFetcher::default(),
            input.path(),
            &site,
            &offline_config(),
            true,
            None,
        )
        .unwrap();

        assert_eq!(report.renames.len(), 2);
        assert_eq!(report.index, Some(IndexAction::Redirected("about.html".into())));
        assert_eq!(report.images, None);
        assert_eq!(report.format.map(|f| f.changed()), Some(4));
        assert_eq!(report.sitemap_entries, Some(3));
        assert_eq!(report.broken_links.len(), 1);
        assert_eq!(report.broken_links[0].value, "gone.html");
        assert_eq!(
            file_list(&site),
            vec!["about.html", "home.html", "index.html", "sitemap.xml", "style.css"]
        );
        assert!(read(&site, "home.html").contains("href=\"about.html\""));
    }

    #[test]
    fn optional_stages_can_be_disabled() {
        let input = write_bundle(&[("index.html", "<p>x</p>")]);
        let out = TempDir::new().unwrap();
        let site = out.path().join("site");
        let mut config = offline_config();
        config.format.html = false;
        config.format.css_js = false;
        config.sitemap.enabled = false;

        let report = run_with(
            &MockBackend::new(),
            &MockFetcher::default(),
            input.path(),
            &site,
            &config,
            true,
            None,
        )
        .unwrap();

        assert_eq!(report.index, Some(IndexAction::Present));
        assert_eq!(report.format, None);
        assert_eq!(report.sitemap_entries, None);
        assert_eq!(read(&site, "index.html"), "<p>x</p>");
    }

    #[test]
    fn missing_input_is_fatal() {
        let out = TempDir::new().unwrap();
        let result = run_with(
            &MockBackend::new(),
            &MockFetcher::default(),
            &out.path().join("nope.zip"),
            &out.path().join("site"),
            &offline_config(),
            true,
            None,
        );
        assert!(matches!(
            result,
            Err(PipelineError::Bundle(BundleError::InputNotFound(_)))
        ));
    }

    #[test]
    fn existing_bundle_requires_directory() {
        let tmp = TempDir::new().unwrap();
        assert!(existing_bundle(tmp.path()).is_ok());
        assert!(matches!(
            existing_bundle(&tmp.path().join("missing")),
            Err(PipelineError::OutputMissing(_))
        ));
    }
}
