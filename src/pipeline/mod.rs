//! Pipeline stages for proxy-page creation.
//!
//! Each submodule implements one piece of the fetch → compose → save chain.
//! Stages are connected by crossbeam channels and run on fixed pools of OS
//! threads; see [`crate::create`] for the wiring and shutdown order.
//!
//! ## Data Flow
//!
//! ```text
//!            input (unbounded)      images (bounded)       canvases (bounded)
//! WorkItems ──────────────▶ fetch ×N ─────────▶ compose ×1 ─────────▶ save ×M ──▶ <dir>/<name><n>.jpg
//!                          (web/disk)           (paste grid)           (JPEG)
//! ```
//!
//! 1. [`source`]: resolve a card's raw image bytes from the web or a local
//!    directory
//! 2. [`decode`]: turn bytes into a raster, rejecting corrupt data
//! 3. [`fetch`]: fetch worker loop (source + decode), drops failed cards
//! 4. [`compose`]: the single compose worker; pastes cards row-major onto a
//!    page-sized [`compose::Canvas`] and flushes full pages
//! 5. [`save`]: save worker loop and the [`save::PageSink`] seam
//! 6. [`pool`]: fixed-size worker pools and end-of-stream fan-out

pub mod compose;
pub mod decode;
pub mod fetch;
pub mod pool;
pub mod save;
pub mod source;
