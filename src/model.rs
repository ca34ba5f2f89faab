//! Data that flows through the pipeline queues.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// One parsed request for `copies` prints of a named card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Number of copies to paste.
    pub copies: u32,
    /// Listed in the sideboard (`SB:` prefix).
    pub sideboard: bool,
    /// Optional set code, e.g. `M10`.
    pub set_code: Option<String>,
    /// Card name as written in the deck list.
    pub name: String,
}

impl WorkItem {
    pub fn new(copies: u32, name: impl Into<String>) -> Self {
        Self {
            copies,
            sideboard: false,
            set_code: None,
            name: name.into(),
        }
    }

    pub fn with_set(mut self, set_code: impl Into<String>) -> Self {
        self.set_code = Some(set_code.into());
        self
    }

    pub fn in_sideboard(mut self) -> Self {
        self.sideboard = true;
        self
    }
}

/// Queue element: either a unit of work or the end-of-stream sentinel.
///
/// Every stage matches on this explicitly; a worker stops only after it has
/// received its own `EndOfStream`.
#[derive(Debug)]
pub enum Envelope<T> {
    Work(T),
    EndOfStream,
}

impl<T> Envelope<T> {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Envelope::EndOfStream)
    }
}

/// A work item whose image has been resolved and decoded.
#[derive(Debug)]
pub struct FetchedCard {
    pub item: WorkItem,
    pub image: DynamicImage,
}
