//! CLI binary for mgproxy.
//!
//! A thin shim over the library crate that parses a deck list, maps CLI
//! flags to `PipelineConfig` and prints a summary.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mgproxy::{
    create_from_local_async, create_from_web_async, read_deck_file, CardError, PageError,
    PipelineConfig, PipelineProgressCallback, ProgressCallback, ReportSnapshot, DEFAULT_BASE_URL,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Progress bar over deck entries plus one log line per saved page.
///
/// Cards finish out of order (several fetch workers), so the bar counts
/// resolved entries, not positions in the deck.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_items: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} cards  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_items as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Fetching");
    }

    fn on_card_fetched(&self, name: &str, copies: u32) {
        self.bar.set_message(format!("{copies} × {name}"));
        self.bar.inc(1);
    }

    fn on_card_error(&self, error: &CardError) {
        self.bar
            .println(format!("  {} {}", red("✗"), red(&error.to_string())));
        self.bar.inc(1);
    }

    fn on_page_saved(&self, page_number: usize, path: &Path, cards: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}  {}  {}",
            green("✓"),
            page_number,
            dim(&format!("{cards} cards")),
            dim(&path.display().to_string()),
        ));
    }

    fn on_page_error(&self, error: &PageError) {
        self.bar
            .println(format!("  {} {}", red("✗"), red(&error.to_string())));
    }

    fn on_run_complete(&self, _snapshot: &ReportSnapshot) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"DECK FORMAT:
  One entry per line:  [SB:] <copies> [[SET]] <card name>

    4 Swamp
    2 [M10] Forest
    SB: 3 Duress
    // comments and blank lines are ignored

EXAMPLES:
  # Download images, write deck0.jpg, deck1.jpg, … next to deck.txt
  mgproxy deck.txt

  # Use pre-downloaded scans named "<card name>.jpg"
  mgproxy --local --image-dir ~/scans deck.txt

  # 3×3 grid at 600 DPI into another directory
  mgproxy -n 3 3 --dpi 600 -o ~/print --name sheet deck.txt

ENVIRONMENT VARIABLES:
  MGPROXY_BASE_URL       Card image service root
  MGPROXY_IMAGE_DIR      Directory of local card images
  MGPROXY_OUTPUT_DIR     Where pages are written
  RUST_LOG               Log filter (overrides --verbose / --quiet)
"#;

/// Create printer-friendly proxy sheets from a deck list.
#[derive(Parser, Debug)]
#[command(
    name = "mgproxy",
    version,
    about = "Create printer-friendly proxy sheets from a trading card deck list",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Deck list file: `[SB:] <copies> [[SET]] <card name>` per line.
    deck: PathBuf,

    /// Download card images from the image service (default).
    #[arg(short, long, conflicts_with = "local")]
    web: bool,

    /// Read card images from a local directory.
    #[arg(short, long, env = "MGPROXY_LOCAL")]
    local: bool,

    /// Directory of local card images. Defaults to the deck file's directory.
    #[arg(long, env = "MGPROXY_IMAGE_DIR")]
    image_dir: Option<PathBuf>,

    /// Print resolution in pixels per inch.
    #[arg(long, env = "MGPROXY_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(1..=1200))]
    dpi: u32,

    /// Card width and height in inches.
    #[arg(short = 'x', long, num_args = 2, value_names = ["WIDTH", "HEIGHT"],
          default_values_t = [2.49, 3.48])]
    card_dimensions: Vec<f64>,

    /// Cards across and down a page.
    #[arg(short = 'n', long, num_args = 2, value_names = ["X", "Y"],
          default_values_t = [4, 2])]
    grid: Vec<u32>,

    /// Concurrent image downloads / reads.
    #[arg(long, env = "MGPROXY_FETCH_WORKERS", default_value_t = 8)]
    fetch_workers: usize,

    /// Concurrent page writers.
    #[arg(long, env = "MGPROXY_SAVE_WORKERS", default_value_t = 2)]
    save_workers: usize,

    /// Directory for the page files. Defaults to the deck file's directory.
    #[arg(short, long, env = "MGPROXY_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Base name for page files. Defaults to the deck file's stem.
    #[arg(long)]
    name: Option<String>,

    /// Card image service root.
    #[arg(long, env = "MGPROXY_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Per-image download timeout in seconds.
    #[arg(long, env = "MGPROXY_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// JPEG quality of the written pages (1–100).
    #[arg(long, env = "MGPROXY_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Skip sideboard (`SB:`) entries.
    #[arg(long)]
    no_sideboard: bool,

    /// Print the final counts as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MGPROXY_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MGPROXY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MGPROXY_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO output unless --verbose is given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Parse deck ───────────────────────────────────────────────────────
    let deck = read_deck_file(&cli.deck).context("Failed to read deck list")?;
    let deck = if cli.no_sideboard {
        deck.without_sideboard()
    } else {
        deck
    };
    if deck.invalid_lines > 0 && !cli.quiet && !cli.json {
        eprintln!(
            "{} {} line(s) in {} could not be parsed",
            cyan("⚠"),
            deck.invalid_lines,
            cli.deck.display()
        );
    }

    let (deck_dir, deck_stem) = deck_location(&cli.deck)?;
    let output_dir = cli.output_dir.clone().unwrap_or_else(|| deck_dir.clone());
    let base_name = cli.name.clone().unwrap_or(deck_stem);

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new();
        Some(cb as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    if !cli.quiet && !cli.json {
        eprintln!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "{} cards in {} entries → {}",
                deck.total_copies(),
                deck.items.len(),
                output_dir.join(format!("{base_name}N.jpg")).display()
            ))
        );
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let invalid_lines = deck.invalid_lines;
    let report = if cli.local && !cli.web {
        let image_dir = cli.image_dir.clone().unwrap_or(deck_dir);
        create_from_local_async(deck.items, image_dir, output_dir, base_name, config).await
    } else {
        create_from_web_async(deck.items, output_dir, base_name, config).await
    }
    .context("Proxy creation failed")?;

    // Deck lines that never became work items count as errors too.
    let summary = ReportSnapshot {
        errors: report.errors + invalid_lines,
        ..report
    };

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{} {}",
            if summary.errors == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            summary
        );
    }

    Ok(())
}

/// Directory and file stem of the deck list, used as output defaults.
fn deck_location(deck: &Path) -> Result<(PathBuf, String)> {
    let absolute = std::path::absolute(deck)
        .with_context(|| format!("Failed to resolve {}", deck.display()))?;
    let dir = absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let stem = absolute
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((dir, stem))
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let [width, height] = cli.card_dimensions[..] else {
        bail!("--card-dimensions takes exactly two values");
    };
    let [grid_x, grid_y] = cli.grid[..] else {
        bail!("--grid takes exactly two values");
    };

    let mut builder = PipelineConfig::builder()
        .dpi(cli.dpi)
        .card_dimensions(width, height)
        .grid(grid_x, grid_y)
        .fetch_workers(cli.fetch_workers)
        .save_workers(cli.save_workers)
        .fetch_timeout_secs(cli.timeout)
        .base_url(cli.base_url.clone())
        .jpeg_quality(cli.quality);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
