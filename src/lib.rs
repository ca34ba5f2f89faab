//! # mgproxy
//!
//! Turn a deck list of trading cards into printable proxy sheets.
//!
//! Each card image is fetched (from an image service or a local directory),
//! resized to a physical card size at the configured DPI and pasted into a
//! grid on a page-sized canvas. Full pages are written as JPEG files.
//!
//! ## Pipeline Overview
//!
//! ```text
//! deck list
//!  │
//!  ├─ 1. Parse    lines → WorkItems (copies, set, name)
//!  ├─ 2. Fetch    N threads: download or read, then decode   (bounded queue)
//!  ├─ 3. Compose  1 thread: resize + paste row-major, flush full pages
//!  └─ 4. Save     M threads: encode JPEG, write <dir>/<name><n>.jpg
//! ```
//!
//! Stages are linked by bounded queues, so a slow disk eventually stalls the
//! downloads instead of piling decoded images up in memory.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mgproxy::{create_from_web, parse_deck_str, PipelineConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let deck = parse_deck_str("4 Swamp\n4 [M10] Forest\n");
//!     let config = PipelineConfig::default();
//!     let report = create_from_web(deck.items, "out", "deck", &config)?;
//!     eprintln!("{report}");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mgproxy` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! mgproxy = { version = "0.5", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod create;
pub mod deck;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PageLayout, PipelineConfig, PipelineConfigBuilder, DEFAULT_BASE_URL};
pub use create::{
    create_from_local, create_from_local_async, create_from_web, create_from_web_async,
    run_pipeline,
};
pub use deck::{parse_deck, parse_deck_str, parse_line, read_deck_file, ParsedDeck};
pub use error::{CardError, MgProxyError, PageError};
pub use model::{Envelope, WorkItem};
pub use pipeline::compose::Canvas;
pub use pipeline::save::{JpegPageWriter, PageSink};
pub use pipeline::source::{card_url, ImageSource, LocalSource, WebSource};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use report::{Report, ReportSnapshot};
