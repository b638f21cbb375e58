//! # postexport
//!
//! A post-processor for static website exports. Site builders can export a
//! site as a zip of HTML, CSS, JS and assets, but the result rarely runs
//! well on a plain static host: pages are exported without an `.html`
//! extension, there may be no `index.html`, every image still loads from the
//! builder's CDN, and the markup is minified beyond reading.
//!
//! postexport copies the export into an output directory and fixes all of
//! that in place.
//!
//! # Architecture: Sequential Stages
//!
//! ```text
//! 1. Prepare    zip | dir  →  output/          (extract or copy)
//! 2. Fix links  about      →  about.html       (rename + rewrite references)
//! 3. Index      output/    →  index.html       (redirect or rename)
//! 4. Images     <img src=https://cdn/...>  →  images/responsive/* + srcset
//! 5. Format     minified   →  indented         (HTML, CSS, JS)
//! 6. Sitemap    pages      →  sitemap.xml
//! 7. Check      report internal links that still don't resolve
//! ```
//!
//! Each stage works on the directory left by the previous one, so every
//! stage is also available on its own from the CLI against an existing
//! output directory. Stages 4–6 are optional and controlled by the config.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Runs the stages in order, reports progress and collects the run report |
//! | [`bundle`] | Zip extraction / directory copy into the output, bundle-relative paths |
//! | [`links`] | Extensionless page renaming, link rewriting, broken link detection |
//! | [`entry`] | Guarantees a root `index.html` |
//! | [`images`] | External image discovery, localization and `<img>` rewriting |
//! | [`fetch`] | Image downloads behind the [`fetch::Fetcher`] trait |
//! | [`cache`] | Persistent image cache manifest keyed by URL and encoding parameters |
//! | [`imaging`] | Pure-Rust image operations: identify, resize, encode |
//! | [`format`] | Idempotent HTML, CSS and JS pretty-printers |
//! | [`sitemap`] | `sitemap.xml` generation |
//! | [`config`] | TOML/JSON config loading and validation |
//! | [`output`] | CLI output formatting for progress and the run report |
//!
//! # Design Decisions
//!
//! ## Streaming Rewrites With lol_html
//!
//! Attribute rewrites (links, image tags) go through `lol_html`, which edits
//! attributes in a byte stream and leaves everything else exactly as it was.
//! Pages that only need a link fixed are not re-serialized, so the link
//! stage never changes markup it doesn't own. Only the formatter builds a
//! full DOM (`html5ever`), because pretty-printing needs the tree.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate for decoding, Lanczos3
//! resampling and encoding. There are no system dependencies: the binary
//! works the same on every machine.
//!
//! ## Cache Outside the Bundle
//!
//! Downloaded originals and encoded variants live in `images.cache_dir`,
//! outside the output directory, because `build` wipes the output on every
//! run. A variant is reused only if the URL and the encoding parameters
//! (format, quality, breakpoints) match and every cached file is present.
//!
//! ## Deterministic Output
//!
//! Traversals are sorted, the entry page choice depends only on the page
//! set, and image file names are derived from content hashes. The same
//! export and config produce the same output tree.

pub mod bundle;
pub mod cache;
pub mod config;
pub mod entry;
pub mod fetch;
pub mod format;
pub mod images;
pub mod imaging;
pub mod links;
pub mod output;
pub mod pipeline;
pub mod sitemap;

#[cfg(test)]
pub(crate) mod test_helpers;
