//! External image localization.
//!
//! Site builders host every image on their own CDN, so an exported site
//! keeps loading its pictures from the builder after it has been moved
//! elsewhere. This stage downloads every externally hosted `<img src>`,
//! encodes a set of responsive variants, stores them in the bundle, and
//! rewrites the tags to serve them locally with a `srcset`.
//!
//! ## Pipeline
//!
//! ```text
//! pages ──► discover <img src> URLs (sorted, unique)
//!       ──► per URL, on a network pool (images.max_downloads):
//!             cache hit?  nothing to fetch
//!             otherwise   download → sniff → write original to the cache
//!       ──► per URL, on a CPU pool (capped at the core count):
//!             encode variants of fresh downloads, copy into the bundle
//!       ──► main thread: update + save cache manifest
//!       ──► rewrite <img> tags in every page
//! ```
//!
//! ## Output layout
//!
//! ```text
//! <bundle>/<images.dir>/
//! ├── responsive/     # {hash12}-{stem}-{width}w.{ext}, referenced by srcset
//! ├── original/       # downloaded originals (images.keep_originals only)
//! └── {hash12}-logo.svg   # vector images, served as downloaded
//! ```
//!
//! A rewritten tag points `src` at the middle variant and lists every
//! variant in `srcset`; a `sizes` attribute is added when the tag has none.
//!
//! ## Failures
//!
//! Every per-image failure (network error, non-2xx status, undecodable
//! content, encoder error) is logged, reported as [`ImageEvent::Failed`] and
//! skipped. The tag keeps its original URL and the run continues.

use crate::bundle::{encode_path, is_page, relative_path, walk_files};
use crate::cache::{
    self, CacheEntry, CacheManifest, CacheStats, CachedVariant, ORIGINALS_DIR, VARIANTS_DIR,
};
use crate::config::{ImagesConfig, effective_downloads, effective_encoders};
use crate::fetch::{FetchError, Fetcher, HttpFetcher, basename_from_url, normalize_image_url};
use crate::imaging::{
    BackendError, ImageBackend, Quality, ResponsiveConfig, RustBackend,
    create_responsive_variants, get_dimensions, is_svg, sniff_extension,
};
use lol_html::{HtmlRewriter, Settings, element};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ImagesError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Download failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("Image processing failed: {0}")]
    Backend(#[from] BackendError),
    #[error("Unrecognized image format")]
    UnknownFormat,
    #[error("HTML rewrite error: {0}")]
    Rewrite(String),
    #[error("Could not start worker pool: {0}")]
    Pool(String),
}

/// Progress of a single image, emitted as soon as it is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageEvent {
    /// Downloaded and encoded in this run.
    Localized { url: String, variants: usize },
    /// Served from the cache without touching the network.
    Cached { url: String, variants: usize },
    /// Skipped; the tag keeps its external URL.
    Failed { url: String, reason: String },
}

/// Summary of an image run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImageStats {
    /// Unique external image URLs found in pages.
    pub discovered: usize,
    /// `hits` were served from the cache, `misses` were downloaded.
    pub cache: CacheStats,
    pub failed: usize,
    pub pages_rewritten: usize,
}

/// Where a localized image ended up, as root-relative URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizedImage {
    pub src: String,
    /// `None` for images served as-is (SVG).
    pub srcset: Option<String>,
}

// ============================================================================
// Discovery
// ============================================================================

/// Collect `src` values of every `<img>` in an HTML document.
fn img_sources(html: &[u8]) -> Result<Vec<String>, ImagesError> {
    let mut sources = Vec::new();
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("img[src]", |el| {
                if let Some(src) = el.get_attribute("src") {
                    sources.push(src);
                }
                Ok(())
            })],
            ..Settings::default()
        },
        |_: &[u8]| {},
    );
    rewriter
        .write(html)
        .map_err(|e| ImagesError::Rewrite(e.to_string()))?;
    rewriter
        .end()
        .map_err(|e| ImagesError::Rewrite(e.to_string()))?;
    Ok(sources)
}

/// Every external image URL referenced by an `<img src>` in the bundle.
pub fn discover_image_urls(root: &Path) -> Result<BTreeSet<String>, ImagesError> {
    let mut urls = BTreeSet::new();
    for path in walk_files(root)? {
        if !is_page(&path) {
            continue;
        }
        let sources = match fs::read(&path).map_err(ImagesError::from).and_then(|b| img_sources(&b)) {
            Ok(sources) => sources,
            Err(e) => {
                warn!(file = %relative_path(root, &path), error = %e, "could not scan page for images");
                continue;
            }
        };
        urls.extend(sources.iter().filter_map(|src| normalize_image_url(src)));
    }
    Ok(urls)
}

// ============================================================================
// Localization
// ============================================================================

/// Result of the network phase for one URL.
enum Fetched<'m> {
    Cached(&'m CacheEntry),
    /// Original written to the cache, variants not yet encoded.
    Downloaded {
        original: String,
        source_hash: String,
        svg: bool,
    },
}

enum Outcome {
    Fresh(CacheEntry, LocalizedImage),
    Cached(CacheEntry, LocalizedImage),
}

/// Shared, read-only state of one image run.
struct Localizer<'a, B, F> {
    backend: &'a B,
    fetcher: &'a F,
    manifest: &'a CacheManifest,
    root: &'a Path,
    config: &'a ImagesConfig,
    /// `images.dir` as clean `/`-separated segments.
    dir: String,
    cache_dir: PathBuf,
    params_hash: String,
    responsive: ResponsiveConfig,
    /// One lock per cache file name.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

fn file_name_of(rel: &str) -> &str {
    rel.rsplit('/').next().unwrap_or(rel)
}

/// Cache-relative path of a downloaded original: `originals/{hash12}-{name}`.
///
/// Names without an extension get the sniffed one. Content that is neither
/// SVG nor a recognized raster format is rejected.
fn original_name(url: &str, bytes: &[u8], source_hash: &str) -> Result<String, ImagesError> {
    let svg = is_svg(bytes);
    let sniffed = sniff_extension(bytes);
    if !svg && sniffed.is_none() {
        return Err(ImagesError::UnknownFormat);
    }
    let mut basename = basename_from_url(url);
    if Path::new(&basename).extension().is_none() {
        let ext = if svg { "svg" } else { sniffed.unwrap_or_default() };
        basename = format!("{basename}.{ext}");
    }
    Ok(format!("{ORIGINALS_DIR}/{}-{basename}", &source_hash[..12]))
}

fn clean_dir(dir: &str) -> String {
    Path::new(dir)
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

impl<'a, B: ImageBackend, F: Fetcher> Localizer<'a, B, F> {
    /// Network phase: cache lookup, or download the original into the cache.
    fn fetch(&self, url: &str) -> Result<Fetched<'a>, ImagesError> {
        if let Some(entry) = self.manifest.find_cached(url, &self.params_hash, &self.cache_dir) {
            debug!(url, "cache hit");
            return Ok(Fetched::Cached(entry));
        }
        let bytes = self.fetcher.fetch(url)?;
        let source_hash = cache::hash_bytes(&bytes);
        let original = original_name(url, &bytes, &source_hash)?;

        let originals_dir = self.cache_dir.join(ORIGINALS_DIR);
        fs::create_dir_all(&originals_dir)?;
        let mut temp = NamedTempFile::new_in(&originals_dir)?;
        temp.write_all(&bytes)?;
        {
            // Identical downloads share the file name.
            let lock = self.lock_for(&original);
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            temp.persist(self.cache_dir.join(&original))
                .map_err(|e| e.error)?;
        }
        Ok(Fetched::Downloaded {
            original,
            source_hash,
            svg: is_svg(&bytes),
        })
    }

    /// CPU phase: encode variants if needed and install them into the bundle.
    fn localize(&self, fetched: Fetched<'_>) -> Result<Outcome, ImagesError> {
        match fetched {
            Fetched::Cached(entry) => {
                let lock = self.lock_for(&entry.original);
                let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
                let image = self.install(entry)?;
                Ok(Outcome::Cached(entry.clone(), image))
            }
            Fetched::Downloaded {
                original,
                source_hash,
                svg,
            } => {
                let lock = self.lock_for(&original);
                let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
                let entry = self.encode(original, source_hash, svg)?;
                let image = self.install(&entry)?;
                Ok(Outcome::Fresh(entry, image))
            }
        }
    }

    fn lock_for(&self, original: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(original.to_string()).or_default().clone()
    }

    /// Encode the variants of a cached original.
    fn encode(
        &self,
        original: String,
        source_hash: String,
        svg: bool,
    ) -> Result<CacheEntry, ImagesError> {
        let variants = if svg {
            Vec::new()
        } else {
            let original_path = self.cache_dir.join(&original);
            let dims = get_dimensions(self.backend, &original_path)?;
            create_responsive_variants(
                self.backend,
                &original_path,
                &self.cache_dir.join(VARIANTS_DIR),
                dims,
                &self.responsive,
            )?
            .into_iter()
            .map(|v| CachedVariant {
                width: v.width,
                file: format!("{VARIANTS_DIR}/{}", v.file_name),
            })
            .collect()
        };

        Ok(CacheEntry {
            source_hash,
            params_hash: self.params_hash.clone(),
            original,
            variants,
        })
    }

    /// Root-relative URL of a file below `images.dir`.
    fn public_url(&self, rel: &str) -> String {
        format!("/{}", encode_path(&format!("{}/{rel}", self.dir)))
    }

    /// Copy a cache entry's files into the bundle.
    fn install(&self, entry: &CacheEntry) -> Result<LocalizedImage, ImagesError> {
        let images_dir = self.root.join(&self.dir);
        let original_name = file_name_of(&entry.original);
        let original_path = self.cache_dir.join(&entry.original);

        if entry.variants.is_empty() {
            fs::create_dir_all(&images_dir)?;
            fs::copy(&original_path, images_dir.join(original_name))?;
            return Ok(LocalizedImage {
                src: self.public_url(original_name),
                srcset: None,
            });
        }

        let responsive_dir = images_dir.join("responsive");
        fs::create_dir_all(&responsive_dir)?;
        let mut candidates = Vec::with_capacity(entry.variants.len());
        for variant in &entry.variants {
            let name = file_name_of(&variant.file);
            fs::copy(self.cache_dir.join(&variant.file), responsive_dir.join(name))?;
            candidates.push((self.public_url(&format!("responsive/{name}")), variant.width));
        }
        if self.config.keep_originals {
            let original_dir = images_dir.join("original");
            fs::create_dir_all(&original_dir)?;
            fs::copy(&original_path, original_dir.join(original_name))?;
        }

        let src = candidates[candidates.len() / 2].0.clone();
        let srcset = candidates
            .iter()
            .map(|(url, width)| format!("{url} {width}w"))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(LocalizedImage {
            src,
            srcset: Some(srcset),
        })
    }
}

// ============================================================================
// Rewriting
// ============================================================================

/// Point localized `<img>` tags at their local files. `None` if unchanged.
pub fn rewrite_img_tags(
    html: &[u8],
    localized: &BTreeMap<String, LocalizedImage>,
    sizes: &str,
) -> Result<Option<Vec<u8>>, ImagesError> {
    let mut output = Vec::with_capacity(html.len());
    let mut changed = false;
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("img[src]", |el| {
                let Some(image) = el
                    .get_attribute("src")
                    .and_then(|src| normalize_image_url(&src))
                    .and_then(|url| localized.get(&url))
                else {
                    return Ok(());
                };
                el.set_attribute("src", &image.src)?;
                if let Some(srcset) = &image.srcset {
                    el.set_attribute("srcset", srcset)?;
                    if !el.has_attribute("sizes") {
                        el.set_attribute("sizes", sizes)?;
                    }
                }
                changed = true;
                Ok(())
            })],
            ..Settings::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );
    rewriter
        .write(html)
        .map_err(|e| ImagesError::Rewrite(e.to_string()))?;
    rewriter
        .end()
        .map_err(|e| ImagesError::Rewrite(e.to_string()))?;
    Ok(changed.then_some(output))
}

fn rewrite_pages(
    root: &Path,
    localized: &BTreeMap<String, LocalizedImage>,
    sizes: &str,
) -> Result<usize, ImagesError> {
    let mut rewritten = 0;
    for path in walk_files(root)? {
        if !is_page(&path) {
            continue;
        }
        let rel = relative_path(root, &path);
        match fs::read(&path)
            .map_err(ImagesError::from)
            .and_then(|b| rewrite_img_tags(&b, localized, sizes))
        {
            Ok(Some(new)) => {
                fs::write(&path, new)?;
                debug!(file = %rel, "rewrote image tags");
                rewritten += 1;
            }
            Ok(None) => {}
            Err(e) => warn!(file = %rel, error = %e, "skipping image rewrite"),
        }
    }
    Ok(rewritten)
}

// ============================================================================
// Entry points
// ============================================================================

/// Localize external images using the network and the pure Rust encoder.
pub fn process_bundle(
    root: &Path,
    config: &ImagesConfig,
    use_cache: bool,
    progress: &(dyn Fn(ImageEvent) + Sync),
) -> Result<ImageStats, ImagesError> {
    let fetcher = HttpFetcher::new(Duration::from_secs(config.timeout_secs))?;
    process_bundle_with(&RustBackend::new(), &fetcher, root, config, use_cache, progress)
}

fn pool(threads: usize) -> Result<rayon::ThreadPool, ImagesError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| ImagesError::Pool(e.to_string()))
}

/// Localize external images with a specific backend and fetcher (allows
/// testing with mocks).
pub fn process_bundle_with(
    backend: &impl ImageBackend,
    fetcher: &impl Fetcher,
    root: &Path,
    config: &ImagesConfig,
    use_cache: bool,
    progress: &(dyn Fn(ImageEvent) + Sync),
) -> Result<ImageStats, ImagesError> {
    let urls: Vec<String> = discover_image_urls(root)?.into_iter().collect();
    let mut stats = ImageStats {
        discovered: urls.len(),
        ..ImageStats::default()
    };
    if urls.is_empty() {
        info!("no external images found");
        return Ok(stats);
    }

    let cache_dir = PathBuf::from(&config.cache_dir);
    let mut manifest = if use_cache {
        CacheManifest::load(&cache_dir)
    } else {
        CacheManifest::empty()
    };
    let localizer = Localizer {
        backend,
        fetcher,
        manifest: &manifest,
        root,
        config,
        dir: clean_dir(&config.dir),
        cache_dir: cache_dir.clone(),
        params_hash: cache::hash_variant_params(
            config.format.as_str(),
            config.quality,
            &config.breakpoints,
        ),
        responsive: ResponsiveConfig {
            breakpoints: config.breakpoints.clone(),
            format: config.format,
            quality: Quality::new(config.quality),
        },
        locks: Mutex::default(),
    };

    let downloads = effective_downloads(config);
    let encoders = effective_encoders(config);
    info!(images = urls.len(), downloads, encoders, "localizing external images");
    let network = pool(downloads)?;
    let cpu = pool(encoders)?;

    let fetched: Vec<(&String, Result<Fetched<'_>, ImagesError>)> = network.install(|| {
        urls.par_iter()
            .map(|url| (url, localizer.fetch(url)))
            .collect()
    });

    let outcomes: Vec<(String, Result<Outcome, ImagesError>)> = cpu.install(|| {
        fetched
            .into_par_iter()
            .map(|(url, fetched)| {
                let outcome = fetched.and_then(|f| localizer.localize(f));
                progress(match &outcome {
                    Ok(Outcome::Fresh(entry, _)) => ImageEvent::Localized {
                        url: url.clone(),
                        variants: entry.variants.len(),
                    },
                    Ok(Outcome::Cached(entry, _)) => ImageEvent::Cached {
                        url: url.clone(),
                        variants: entry.variants.len(),
                    },
                    Err(e) => ImageEvent::Failed {
                        url: url.clone(),
                        reason: e.to_string(),
                    },
                });
                (url.clone(), outcome)
            })
            .collect()
    });

    drop(localizer);

    let mut updates = Vec::new();
    let mut localized = BTreeMap::new();
    for (url, outcome) in outcomes {
        match outcome {
            Ok(Outcome::Fresh(entry, image)) => {
                stats.cache.miss();
                updates.push((url.clone(), entry));
                localized.insert(url, image);
            }
            Ok(Outcome::Cached(entry, image)) => {
                stats.cache.hit();
                updates.push((url.clone(), entry));
                localized.insert(url, image);
            }
            Err(e) => {
                warn!(url = %url, error = %e, "skipping image");
                stats.failed += 1;
            }
        }
    }

    for (url, entry) in updates {
        manifest.insert(url, entry);
    }
    if let Err(e) = manifest.save(&cache_dir) {
        warn!(cache = %cache_dir.display(), error = %e, "could not save image cache");
    }

    stats.pages_rewritten = rewrite_pages(root, &localized, &config.sizes)?;
    info!(
        localized = stats.cache.total(),
        failed = stats.failed,
        pages = stats.pages_rewritten,
        "image localization done"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::fetch::tests::MockFetcher;
    use crate::imaging::Dimensions;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::{file_list, png_bytes, read, write_bundle};
    use std::sync::Mutex;
    use tempfile::TempDir;

    const SVG: &[u8] = b"<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 1 1\"></svg>";

    fn config(cache: &TempDir) -> ImagesConfig {
        ImagesConfig {
            breakpoints: vec![480, 800],
            format: OutputFormat::Png,
            cache_dir: cache.path().to_string_lossy().into_owned(),
            max_downloads: Some(2),
            ..ImagesConfig::default()
        }
    }

    fn no_progress(_: ImageEvent) {}

    #[test]
    fn discover_collects_external_sources_only() {
        let tmp = write_bundle(&[
            (
                "index.html",
                r#"<img src="https://cdn.x.com/b.png"><img src="local.png"><img src="//cdn.x.com/a.png"><img src="data:image/png;base64,AA">"#,
            ),
            ("blog/post.html", r#"<img src="https://cdn.x.com/b.png"><img alt="no src">"#),
            ("notes.txt", r#"<img src="https://cdn.x.com/c.png">"#),
        ]);

        let urls = discover_image_urls(tmp.path()).unwrap();

        assert_eq!(
            urls.into_iter().collect::<Vec<_>>(),
            vec!["https://cdn.x.com/a.png", "https://cdn.x.com/b.png"]
        );
    }

    #[test]
    fn rewrite_img_tags_sets_srcset_and_sizes() {
        let localized = BTreeMap::from([(
            "https://cdn.x.com/a.png".to_string(),
            LocalizedImage {
                src: "/images/responsive/a-800w.webp".into(),
                srcset: Some("/images/responsive/a-480w.webp 480w, /images/responsive/a-800w.webp 800w".into()),
            },
        )]);
        let html = br#"<img src="//cdn.x.com/a.png" alt="A"><img src="https://cdn.x.com/a.png" sizes="50vw"><img src="https://cdn.x.com/other.png">"#;

        let out = rewrite_img_tags(html, &localized, "100vw").unwrap().unwrap();
        let out = String::from_utf8(out).unwrap();

        assert_eq!(
            out,
            r#"<img src="/images/responsive/a-800w.webp" alt="A" srcset="/images/responsive/a-480w.webp 480w, /images/responsive/a-800w.webp 800w" sizes="100vw"><img src="/images/responsive/a-800w.webp" sizes="50vw" srcset="/images/responsive/a-480w.webp 480w, /images/responsive/a-800w.webp 800w"><img src="https://cdn.x.com/other.png">"#
        );
    }

    #[test]
    fn localizes_raster_image_with_variants() {
        let cache = TempDir::new().unwrap();
        let site = write_bundle(&[("index.html", r#"<img src="https://cdn.x.com/photos/hero.png">"#)]);
        let fetcher = MockFetcher::new(&[("https://cdn.x.com/photos/hero.png", png_bytes(1000, 500))]);
        let events = Mutex::new(Vec::new());

        let stats = process_bundle_with(
            &RustBackend::new(),
            &fetcher,
            site.path(),
            &config(&cache),
            true,
            &|e| events.lock().unwrap().push(e),
        )
        .unwrap();

        assert_eq!(stats.discovered, 1);
        assert_eq!(stats.cache, CacheStats { hits: 0, misses: 1 });
        assert_eq!(stats.pages_rewritten, 1);

        let hash = &cache::hash12(&png_bytes(1000, 500));
        let files = file_list(site.path());
        for w in [480, 800, 1000] {
            let name = format!("images/responsive/{hash}-hero-{w}w.png");
            assert!(files.contains(&name), "missing {name} in {files:?}");
        }

        let html = read(site.path(), "index.html");
        assert!(html.contains(&format!(r#"src="/images/responsive/{hash}-hero-800w.png""#)));
        assert!(html.contains(&format!(
            "/images/responsive/{hash}-hero-480w.png 480w, /images/responsive/{hash}-hero-800w.png 800w, /images/responsive/{hash}-hero-1000w.png 1000w"
        )));
        assert!(html.contains(r#"sizes="(max-width: 1200px) 100vw, 1200px""#));

        assert_eq!(
            events.into_inner().unwrap(),
            vec![ImageEvent::Localized {
                url: "https://cdn.x.com/photos/hero.png".into(),
                variants: 3
            }]
        );
    }

    #[test]
    fn identical_downloads_share_files() {
        let cache = TempDir::new().unwrap();
        let site = write_bundle(&[(
            "index.html",
            r#"<img src="https://a.x.com/logo.png"><img src="https://b.x.com/img/logo.png"><img src="https://c.x.com/logo.png?v=2">"#,
        )]);
        let bytes = png_bytes(900, 300);
        let fetcher = MockFetcher::new(&[
            ("https://a.x.com/logo.png", bytes.clone()),
            ("https://b.x.com/img/logo.png", bytes.clone()),
            ("https://c.x.com/logo.png?v=2", bytes.clone()),
        ]);
        let cfg = ImagesConfig {
            max_downloads: Some(3),
            ..config(&cache)
        };

        let stats =
            process_bundle_with(&RustBackend::new(), &fetcher, site.path(), &cfg, true, &no_progress)
                .unwrap();

        assert_eq!(stats.cache.misses, 3);
        assert_eq!(stats.failed, 0);
        let hash = cache::hash12(&bytes);
        assert_eq!(
            fs::read(cache.path().join(format!("originals/{hash}-logo.png"))).unwrap(),
            bytes
        );
        let variant = site.path().join(format!("images/responsive/{hash}-logo-480w.png"));
        assert_eq!(
            RustBackend::new().identify(&variant).unwrap(),
            Dimensions { width: 480, height: 160 }
        );
        let html = read(site.path(), "index.html");
        assert_eq!(html.matches(&format!("{hash}-logo-900w.png 900w")).count(), 3);
    }

    #[test]
    fn second_run_uses_cache() {
        let cache = TempDir::new().unwrap();
        let page = ("index.html", r#"<img src="https://cdn.x.com/a.png">"#);
        let fetcher = MockFetcher::new(&[("https://cdn.x.com/a.png", png_bytes(300, 200))]);
        let cfg = config(&cache);

        let first = write_bundle(&[page]);
        process_bundle_with(&RustBackend::new(), &fetcher, first.path(), &cfg, true, &no_progress)
            .unwrap();

        let second = write_bundle(&[page]);
        let stats = process_bundle_with(
            &RustBackend::new(),
            &fetcher,
            second.path(),
            &cfg,
            true,
            &no_progress,
        )
        .unwrap();

        assert_eq!(stats.cache, CacheStats { hits: 1, misses: 0 });
        assert_eq!(fetcher.request_count(), 1);
        assert_eq!(read(first.path(), "index.html"), read(second.path(), "index.html"));
        assert_eq!(file_list(first.path()), file_list(second.path()));
    }

    #[test]
    fn no_cache_downloads_again() {
        let cache = TempDir::new().unwrap();
        let page = ("index.html", r#"<img src="https://cdn.x.com/a.png">"#);
        let fetcher = MockFetcher::new(&[("https://cdn.x.com/a.png", png_bytes(300, 200))]);
        let cfg = config(&cache);

        for _ in 0..2 {
            let site = write_bundle(&[page]);
            process_bundle_with(&RustBackend::new(), &fetcher, site.path(), &cfg, false, &no_progress)
                .unwrap();
        }
        assert_eq!(fetcher.request_count(), 2);
        assert!(cache::manifest_path(cache.path()).exists());
    }

    #[test]
    fn changed_params_invalidate_cache() {
        let cache = TempDir::new().unwrap();
        let page = ("index.html", r#"<img src="https://cdn.x.com/a.png">"#);
        let fetcher = MockFetcher::new(&[("https://cdn.x.com/a.png", png_bytes(300, 200))]);
        let mut cfg = config(&cache);

        let site = write_bundle(&[page]);
        process_bundle_with(&RustBackend::new(), &fetcher, site.path(), &cfg, true, &no_progress)
            .unwrap();
        cfg.quality = 50;
        let site = write_bundle(&[page]);
        let stats =
            process_bundle_with(&RustBackend::new(), &fetcher, site.path(), &cfg, true, &no_progress)
                .unwrap();

        assert_eq!(stats.cache.misses, 1);
        assert_eq!(fetcher.request_count(), 2);
    }

    #[test]
    fn svg_is_served_as_is() {
        let cache = TempDir::new().unwrap();
        let site = write_bundle(&[("index.html", r#"<img src="https://cdn.x.com/logo">"#)]);
        let fetcher = MockFetcher::new(&[("https://cdn.x.com/logo", SVG.to_vec())]);
        let backend = MockBackend::new();

        let stats =
            process_bundle_with(&backend, &fetcher, site.path(), &config(&cache), true, &no_progress)
                .unwrap();

        assert_eq!(stats.cache.misses, 1);
        assert!(backend.resizes().is_empty());
        let name = format!("{}-logo.svg", cache::hash12(SVG));
        assert_eq!(fs::read(site.path().join("images").join(&name)).unwrap(), SVG);
        let html = read(site.path(), "index.html");
        assert!(html.contains(&format!(r#"src="/images/{name}""#)));
        assert!(!html.contains("srcset"));
    }

    #[test]
    fn failures_are_skipped_and_reported() {
        let cache = TempDir::new().unwrap();
        let site = write_bundle(&[(
            "index.html",
            r#"<img src="https://cdn.x.com/missing.png"><img src="https://cdn.x.com/page.png"><img src="https://cdn.x.com/ok.png">"#,
        )]);
        let fetcher = MockFetcher::new(&[
            ("https://cdn.x.com/page.png", b"<html>not an image</html>".to_vec()),
            ("https://cdn.x.com/ok.png", png_bytes(100, 100)),
        ]);
        let events = Mutex::new(Vec::new());

        let stats = process_bundle_with(
            &RustBackend::new(),
            &fetcher,
            site.path(),
            &config(&cache),
            true,
            &|e| events.lock().unwrap().push(e),
        )
        .unwrap();

        assert_eq!(stats.failed, 2);
        assert_eq!(stats.cache.misses, 1);
        let html = read(site.path(), "index.html");
        assert!(html.contains(r#"src="https://cdn.x.com/missing.png""#));
        assert!(html.contains(r#"src="https://cdn.x.com/page.png""#));
        assert!(!html.contains("cdn.x.com/ok.png"));

        let failed: Vec<_> = events
            .into_inner()
            .unwrap()
            .into_iter()
            .filter(|e| matches!(e, ImageEvent::Failed { .. }))
            .collect();
        assert_eq!(failed.len(), 2);
    }

    #[test]
    fn keep_originals_and_custom_dir() {
        let cache = TempDir::new().unwrap();
        let site = write_bundle(&[("index.html", r#"<img src="https://cdn.x.com/p.png">"#)]);
        let fetcher = MockFetcher::new(&[("https://cdn.x.com/p.png", png_bytes(64, 64))]);
        let backend = MockBackend::sized(64, 64);
        let cfg = ImagesConfig {
            dir: "./assets/img/".into(),
            keep_originals: true,
            ..config(&cache)
        };

        process_bundle_with(&backend, &fetcher, site.path(), &cfg, true, &no_progress).unwrap();

        let hash = cache::hash12(&png_bytes(64, 64));
        let files = file_list(site.path());
        assert!(files.contains(&format!("assets/img/original/{hash}-p.png")));
        assert!(files.contains(&format!("assets/img/responsive/{hash}-p-64w.png")));
        assert!(read(site.path(), "index.html")
            .contains(&format!(r#"src="/assets/img/responsive/{hash}-p-64w.png""#)));
    }

    #[test]
    fn nothing_to_do_without_external_images() {
        let cache = TempDir::new().unwrap();
        let site = write_bundle(&[("index.html", r#"<img src="/local.png">"#)]);
        let fetcher = MockFetcher::default();

        let stats = process_bundle_with(
            &MockBackend::new(),
            &fetcher,
            site.path(),
            &config(&cache),
            true,
            &no_progress,
        )
        .unwrap();

        assert_eq!(stats, ImageStats::default());
        assert_eq!(fetcher.request_count(), 0);
    }
}
