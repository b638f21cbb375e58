use clap::{Parser, Subcommand};
use postexport::{config, entry, format, links, output, pipeline, sitemap};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that download images.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Disable the image cache: download and re-encode every image
    #[arg(long)]
    no_cache: bool,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once, called exactly once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "postexport")]
#[command(about = "Post-processor for static website exports")]
#[command(long_about = "\
Post-processor for static website exports

Takes a site builder's code export (zip or directory), copies it into the
output directory and makes it ready for any static host:

  1. Extensionless pages get an .html suffix; links follow the rename
  2. A root index.html is guaranteed (redirect or rename)
  3. External <img> sources are downloaded and served as responsive
     variants with a srcset
  4. HTML, CSS and JS are pretty-printed
  5. sitemap.xml is written
  6. Internal links that still don't resolve are reported

Stage subcommands (fix-links, index, images, format, sitemap, check) run a
single stage on an existing output directory.

Run 'postexport gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (TOML, or JSON with a .json extension)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output directory (overrides output_dir from the config)
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// More log output (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline on an export zip or directory
    Build {
        /// Export zip archive or directory
        #[arg(long)]
        input: PathBuf,
        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Rename extensionless pages to .html and rewrite links to them
    FixLinks,
    /// Make sure the output has a root index.html
    Index,
    /// Download external images and generate responsive variants
    Images(CacheArgs),
    /// Pretty-print HTML, CSS and JS
    Format,
    /// Write sitemap.xml
    Sitemap,
    /// Report internal links that do not resolve
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let site_config = config::load_config(cli.config.as_deref())?;
    let output_dir = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&site_config.output_dir));

    match cli.command {
        Command::Build { input, cache } => {
            let (tx, rx) = mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_progress(&event);
                }
            });
            let result = pipeline::run(&input, &output_dir, &site_config, !cache.no_cache, Some(tx));
            printer.join().map_err(|_| "progress printer panicked")?;
            output::print_run_report(&result?);
        }
        Command::FixLinks => {
            let root = pipeline::existing_bundle(&output_dir)?;
            let report = links::fix_links(root)?;
            output::print_lines(&output::format_renames(
                &report.renames,
                report.files_rewritten,
            ));
        }
        Command::Index => {
            let root = pipeline::existing_bundle(&output_dir)?;
            let action = entry::ensure_index(root, &site_config.index)?;
            println!("Index: {action}");
        }
        Command::Images(cache) => {
            let root = pipeline::existing_bundle(&output_dir)?.to_path_buf();
            let stats = run_images(&root, &site_config.images, !cache.no_cache)?;
            output::print_lines(&output::format_image_stats(&stats));
        }
        Command::Format => {
            let root = pipeline::existing_bundle(&output_dir)?;
            let stats = format::format_bundle(root, &site_config.format)?;
            output::print_lines(&output::format_format_stats(&stats));
        }
        Command::Sitemap => {
            let root = pipeline::existing_bundle(&output_dir)?;
            let entries = sitemap::write_sitemap(root, &site_config.site_url)?;
            println!("Sitemap: {entries} pages");
        }
        Command::Check => {
            let root = pipeline::existing_bundle(&output_dir)?;
            let broken = pipeline::check_links(root)?;
            output::print_broken_links(&broken);
            if !broken.is_empty() {
                return Err(format!("{} broken links", broken.len()).into());
            }
        }
        Command::GenConfig => {}
    }

    Ok(())
}

/// Image stage with live progress output.
fn run_images(
    root: &Path,
    images: &config::ImagesConfig,
    use_cache: bool,
) -> Result<postexport::images::ImageStats, Box<dyn std::error::Error>> {
    let (tx, rx) = mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_progress(&event);
        }
    });
    let fetcher = postexport::fetch::HttpFetcher::new(std::time::Duration::from_secs(
        images.timeout_secs,
    ))?;
    let result = pipeline::localize_images(
        &postexport::imaging::RustBackend::new(),
        &fetcher,
        root,
        images,
        use_cache,
        Some(&tx),
    );
    drop(tx);
    printer.join().map_err(|_| "progress printer panicked")?;
    Ok(result?)
}
