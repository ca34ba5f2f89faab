//! Deck-list parsing: turn text lines into [`WorkItem`]s.
//!
//! Each line has the form `[SB:] <copies> [[SET]] <card name>`, e.g.
//!
//! ```text
//! // Main deck
//! 4 Lightning Bolt
//! 2 [M10] Forest
//! SB: 1 [] Pithing Needle
//! ```
//!
//! Blank lines and `//` comments are skipped. Any other line that does not
//! match is counted as invalid and logged; it never aborts the parse.

use crate::error::MgProxyError;
use crate::model::WorkItem;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::BufRead;
use std::path::Path;
use tracing::{debug, warn};

static LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(SB:)\s+)?(\d+)\s+(?:\[(\w*)\]\s+)?(\S.*?)\s*$").unwrap()
});

static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*//").unwrap());

/// Result of parsing a whole deck list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDeck {
    /// Successfully parsed lines, in file order.
    pub items: Vec<WorkItem>,
    /// Non-blank, non-comment lines that did not match the format.
    pub invalid_lines: usize,
}

impl ParsedDeck {
    /// Total copies requested across all items.
    pub fn total_copies(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.copies)).sum()
    }

    /// Drop every sideboard entry.
    pub fn without_sideboard(mut self) -> Self {
        self.items.retain(|i| !i.sideboard);
        self
    }
}

/// Parse one deck line. Returns `None` if it does not match the format.
pub fn parse_line(line: &str) -> Option<WorkItem> {
    let caps = LINE_RE.captures(line)?;
    let copies = caps.get(2)?.as_str().parse::<u32>().ok()?;
    let set_code = caps
        .get(3)
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Some(WorkItem {
        copies,
        sideboard: caps.get(1).is_some(),
        set_code,
        name: caps.get(4)?.as_str().to_string(),
    })
}

fn is_skippable(line: &str) -> bool {
    line.trim().is_empty() || COMMENT_RE.is_match(line)
}

/// Parse a deck list from any buffered reader.
pub fn parse_deck<R: BufRead>(reader: R) -> std::io::Result<ParsedDeck> {
    let mut deck = ParsedDeck::default();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if is_skippable(&line) {
            continue;
        }
        match parse_line(&line) {
            Some(item) => deck.items.push(item),
            None => {
                warn!("Line {}: could not parse '{}'", lineno + 1, line.trim());
                deck.invalid_lines += 1;
            }
        }
    }

    debug!(
        "Parsed {} deck entries ({} invalid lines)",
        deck.items.len(),
        deck.invalid_lines
    );
    Ok(deck)
}

/// Parse a deck list from an in-memory string.
pub fn parse_deck_str(text: &str) -> ParsedDeck {
    // Reading from a `&str` cannot hit an I/O or UTF-8 error.
    parse_deck(text.as_bytes()).unwrap_or_default()
}

/// Read and parse a deck file. An unreadable file is the one fatal input error.
pub fn read_deck_file(path: &Path) -> Result<ParsedDeck, MgProxyError> {
    let file = std::fs::File::open(path).map_err(|source| MgProxyError::DeckUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_deck(std::io::BufReader::new(file)).map_err(|source| MgProxyError::DeckUnreadable {
        path: path.to_path_buf(),
        source,
    })
}
