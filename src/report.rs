//! Thread-safe run counters shared by every stage.
//!
//! A single [`Report`] is created per run and handed to workers behind an
//! `Arc`. All counters live behind one mutex so a reader never sees, say, the
//! cards of a page without the page itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Counters {
    pages: usize,
    cards: usize,
    errors: usize,
    next_page: usize,
}

/// Shared counters for one pipeline run.
#[derive(Debug, Default)]
pub struct Report {
    counters: Mutex<Counters>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    // Counters are plain integers, so a panic while the lock was held cannot
    // leave them half-updated.
    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a saved page; returns the page count before the increment.
    pub fn add_page(&self) -> usize {
        let mut c = self.lock();
        let previous = c.pages;
        c.pages += 1;
        previous
    }

    /// Record one saved page holding `cards` cards, under a single lock.
    ///
    /// Returns the page count before the increment.
    pub fn record_page(&self, cards: usize) -> usize {
        let mut c = self.lock();
        c.cards += cards;
        let previous = c.pages;
        c.pages += 1;
        previous
    }

    /// Record `n` cards written to disk.
    pub fn add_cards(&self, n: usize) {
        self.lock().cards += n;
    }

    /// Record one failed card or page.
    pub fn add_error(&self) {
        self.lock().errors += 1;
    }

    /// Allocate the next output page number. Each number is handed out once.
    pub fn next_page_number(&self) -> usize {
        let mut c = self.lock();
        let n = c.next_page;
        c.next_page += 1;
        n
    }

    pub fn pages(&self) -> usize {
        self.lock().pages
    }

    pub fn cards(&self) -> usize {
        self.lock().cards
    }

    pub fn errors(&self) -> usize {
        self.lock().errors
    }

    /// Consistent copy of all counters.
    pub fn snapshot(&self) -> ReportSnapshot {
        let c = self.lock();
        ReportSnapshot {
            pages: c.pages,
            cards: c.cards,
            errors: c.errors,
        }
    }
}

/// Final (or in-flight) totals of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSnapshot {
    /// Pages saved.
    pub pages: usize,
    /// Cards pasted onto saved pages.
    pub cards: usize,
    /// Cards that failed to fetch plus pages that failed to save.
    pub errors: usize,
}

impl fmt::Display for ReportSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cards pasted, {} pages saved, {} errors",
            self.cards, self.pages, self.errors
        )
    }
}
