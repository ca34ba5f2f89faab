//! Error types for the mgproxy library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`MgProxyError`] (**Fatal**): the run cannot start at all (bad config,
//!   missing source directory, unusable output directory). Returned as
//!   `Err(MgProxyError)` from the top-level `create_*` functions before any
//!   worker thread is spawned.
//!
//! * [`CardError`] (**Non-fatal**): one card could not be fetched or decoded.
//!   The fetch stage logs it, bumps the error counter and drops the card; every
//!   other card in the run is unaffected.
//!
//! * [`PageError`] (**Non-fatal**): one filled page could not be written. The
//!   save stage logs it, bumps the error counter and discards the page.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the mgproxy library.
#[derive(Debug, Error)]
pub enum MgProxyError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The image service base URL cannot be used to build card addresses.
    #[error("Invalid image base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// The deck list could not be read.
    #[error("Card file '{path}' could not be read: {source}")]
    DeckUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Local image directory does not exist or is not a directory.
    #[error("Image directory not found: '{path}'\nCheck the path exists and is a directory.")]
    SourceDirNotFound { path: PathBuf },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The output directory could not be created.
    #[error("Failed to prepare output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Runtime errors ────────────────────────────────────────────────────
    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// The OS refused to start a worker thread.
    #[error("Failed to spawn {stage} worker {index}: {source}")]
    WorkerSpawn {
        stage: &'static str,
        index: usize,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single card.
///
/// Every variant has the same pipeline effect (card dropped, one error
/// counted); they differ only so the log line says what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardError {
    /// The image service could not be reached.
    #[error("{card}: network error fetching {url}: {detail}")]
    Network {
        card: String,
        url: String,
        detail: String,
    },

    /// The image service did not answer within the configured timeout.
    #[error("{card}: request to {url} timed out after {secs}s")]
    Timeout { card: String, url: String, secs: u64 },

    /// The image service answered with a non-success status code.
    #[error("{card}: card URL does not exist (HTTP {status}): {url}")]
    HttpStatus {
        card: String,
        url: String,
        status: u16,
    },

    /// The image service answered with something that is not an image.
    #[error("{card}: expected an image, received '{content_type}': {url}")]
    ContentType {
        card: String,
        url: String,
        content_type: String,
    },

    /// The bytes could not be decoded as an image.
    #[error("{card}: image is corrupt: {detail}")]
    ImageCorrupt { card: String, detail: String },

    /// No image for this card exists at the lookup location.
    #[error("{card}: no image found in {location}")]
    NotFound { card: String, location: String },

    /// The local image exists but could not be read.
    #[error("{card}: failed to read '{path}': {detail}")]
    Unreadable {
        card: String,
        path: PathBuf,
        detail: String,
    },
}

impl CardError {
    /// Short stable label for the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            CardError::Network { .. } => "network",
            CardError::Timeout { .. } => "timeout",
            CardError::HttpStatus { .. } => "http-status",
            CardError::ContentType { .. } => "content-type",
            CardError::ImageCorrupt { .. } => "image-corrupt",
            CardError::NotFound { .. } => "not-found",
            CardError::Unreadable { .. } => "unreadable",
        }
    }

    /// Name of the card that failed.
    pub fn card(&self) -> &str {
        match self {
            CardError::Network { card, .. }
            | CardError::Timeout { card, .. }
            | CardError::HttpStatus { card, .. }
            | CardError::ContentType { card, .. }
            | CardError::ImageCorrupt { card, .. }
            | CardError::NotFound { card, .. }
            | CardError::Unreadable { card, .. } => card,
        }
    }
}

/// A non-fatal error for a single filled page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    /// Encoding or writing the page file failed.
    #[error("Page {page}: failed to write '{path}': {detail}")]
    WriteFailed {
        page: usize,
        path: PathBuf,
        detail: String,
    },
}
