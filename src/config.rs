//! Configuration types for proxy-page creation.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Page geometry, worker counts and queue
//! capacities live together so one value fully describes a run and can be
//! shared across every worker thread.

use crate::error::MgProxyError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default image service. Cards are addressed below `card/` or `set/<SET>/`.
pub const DEFAULT_BASE_URL: &str = "http://mtgimage.com/";

/// Largest page side the JPEG encoder accepts.
pub const MAX_PAGE_PX: u32 = 65_535;

/// Configuration for a proxy-page run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use mgproxy::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .dpi(150)
///     .grid(3, 3)
///     .fetch_workers(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.layout().cells(), 9);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Print resolution in pixels per inch. Range: 1–1200. Default: 300.
    pub dpi: u32,

    /// Card width in inches. Default: 2.49.
    pub card_width_in: f64,

    /// Card height in inches. Default: 3.48.
    pub card_height_in: f64,

    /// Cards across a page. Default: 4.
    pub grid_x: u32,

    /// Cards down a page. Default: 2.
    pub grid_y: u32,

    /// Parallel fetch workers. Default: 8.
    ///
    /// Fetching is network-bound, so this is the knob that sets how many card
    /// downloads are in flight at once.
    pub fetch_workers: usize,

    /// Parallel save workers. Default: 2.
    pub save_workers: usize,

    /// Capacity of the queue between fetch and compose. Default: 20.
    ///
    /// Decoded card images are large; the bound caps how many wait in memory
    /// while the single compose worker catches up.
    pub image_queue_capacity: usize,

    /// Capacity of the queue between compose and save. Default: 5.
    ///
    /// Each entry is a full page raster. When the queue is full, compose
    /// blocks and the stall propagates back to the fetch workers.
    pub canvas_queue_capacity: usize,

    /// Per-request timeout for web fetches in seconds. Default: 30.
    pub fetch_timeout_secs: u64,

    /// Base URL of the card image service. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// JPEG quality for saved pages, 1–100. Default: 90.
    pub jpeg_quality: u8,

    /// Optional progress callback, invoked from worker threads.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            card_width_in: 2.49,
            card_height_in: 3.48,
            grid_x: 4,
            grid_y: 2,
            fetch_workers: 8,
            save_workers: 2,
            image_queue_capacity: 20,
            canvas_queue_capacity: 5,
            fetch_timeout_secs: 30,
            base_url: DEFAULT_BASE_URL.to_string(),
            jpeg_quality: 90,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("dpi", &self.dpi)
            .field("card_width_in", &self.card_width_in)
            .field("card_height_in", &self.card_height_in)
            .field("grid_x", &self.grid_x)
            .field("grid_y", &self.grid_y)
            .field("fetch_workers", &self.fetch_workers)
            .field("save_workers", &self.save_workers)
            .field("image_queue_capacity", &self.image_queue_capacity)
            .field("canvas_queue_capacity", &self.canvas_queue_capacity)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("base_url", &self.base_url)
            .field("jpeg_quality", &self.jpeg_quality)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Pixel geometry derived from the physical card size and DPI.
    pub fn layout(&self) -> PageLayout {
        PageLayout {
            cell_width: inches_to_px(self.dpi, self.card_width_in),
            cell_height: inches_to_px(self.dpi, self.card_height_in),
            grid_x: self.grid_x,
            grid_y: self.grid_y,
        }
    }

    /// Check every invariant the pipeline relies on.
    pub fn validate(&self) -> Result<(), MgProxyError> {
        if self.dpi == 0 || self.dpi > 1200 {
            return Err(MgProxyError::InvalidConfig(format!(
                "DPI must be 1–1200, got {}",
                self.dpi
            )));
        }
        for (label, inches) in [
            ("card width", self.card_width_in),
            ("card height", self.card_height_in),
        ] {
            if !inches.is_finite() || inches <= 0.0 {
                return Err(MgProxyError::InvalidConfig(format!(
                    "{label} must be a positive number of inches, got {inches}"
                )));
            }
        }
        let layout = self.layout();
        if layout.cell_width == 0 || layout.cell_height == 0 {
            return Err(MgProxyError::InvalidConfig(format!(
                "card cell is smaller than one pixel at {} DPI",
                self.dpi
            )));
        }
        if self.grid_x == 0 || self.grid_y == 0 {
            return Err(MgProxyError::InvalidConfig(format!(
                "grid must be at least 1×1, got {}×{}",
                self.grid_x, self.grid_y
            )));
        }
        match (
            layout.cell_width.checked_mul(self.grid_x),
            layout.cell_height.checked_mul(self.grid_y),
        ) {
            (Some(w), Some(h)) if w <= MAX_PAGE_PX && h <= MAX_PAGE_PX => {}
            _ => {
                return Err(MgProxyError::InvalidConfig(format!(
                    "page would exceed {MAX_PAGE_PX} px per side ({}×{} cells of {}×{} px)",
                    self.grid_x, self.grid_y, layout.cell_width, layout.cell_height
                )));
            }
        }
        if self.fetch_workers == 0 || self.save_workers == 0 {
            return Err(MgProxyError::InvalidConfig(
                "fetch and save worker counts must be ≥ 1".into(),
            ));
        }
        if self.image_queue_capacity == 0 || self.canvas_queue_capacity == 0 {
            return Err(MgProxyError::InvalidConfig(
                "queue capacities must be ≥ 1".into(),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(MgProxyError::InvalidConfig(
                "fetch timeout must be ≥ 1 second".into(),
            ));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(MgProxyError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

/// Truncating conversion, so a 2.49" card at 300 DPI is 747 px wide.
fn inches_to_px(dpi: u32, inches: f64) -> u32 {
    if !inches.is_finite() || inches <= 0.0 {
        return 0;
    }
    // Nudge past float error so 300 × 2.49 does not land on 746.999…
    (f64::from(dpi) * inches + 1e-6).floor().min(f64::from(u32::MAX)) as u32
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn card_dimensions(mut self, width_in: f64, height_in: f64) -> Self {
        self.config.card_width_in = width_in;
        self.config.card_height_in = height_in;
        self
    }

    pub fn grid(mut self, x: u32, y: u32) -> Self {
        self.config.grid_x = x;
        self.config.grid_y = y;
        self
    }

    pub fn fetch_workers(mut self, n: usize) -> Self {
        self.config.fetch_workers = n;
        self
    }

    pub fn save_workers(mut self, n: usize) -> Self {
        self.config.save_workers = n;
        self
    }

    pub fn image_queue_capacity(mut self, n: usize) -> Self {
        self.config.image_queue_capacity = n;
        self
    }

    pub fn canvas_queue_capacity(mut self, n: usize) -> Self {
        self.config.canvas_queue_capacity = n;
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, MgProxyError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Pixel geometry of a page: an X×Y grid of equal cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLayout {
    /// Width of one card cell in pixels.
    pub cell_width: u32,
    /// Height of one card cell in pixels.
    pub cell_height: u32,
    /// Cells across.
    pub grid_x: u32,
    /// Cells down.
    pub grid_y: u32,
}

impl PageLayout {
    /// Number of cards a full page holds.
    pub fn cells(&self) -> usize {
        self.grid_x as usize * self.grid_y as usize
    }

    /// Page width in pixels.
    pub fn page_width(&self) -> u32 {
        self.cell_width.saturating_mul(self.grid_x)
    }

    /// Page height in pixels.
    pub fn page_height(&self) -> u32 {
        self.cell_height.saturating_mul(self.grid_y)
    }

    /// Grid position of the `index`-th card on a page, row-major.
    pub fn cell_position(&self, index: usize) -> (u32, u32) {
        let x = index % self.grid_x as usize;
        let y = index / self.grid_x as usize;
        (x as u32, y as u32)
    }

    /// Top-left pixel of the `index`-th card on a page.
    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        let (x, y) = self.cell_position(index);
        (x * self.cell_width, y * self.cell_height)
    }
}
