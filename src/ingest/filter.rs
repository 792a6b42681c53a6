// src/ingest/filter.rs
//! Bot/spam gate applied before enrichment.
//!
//! Two independent predicates, OR-combined:
//! - `is_bot(author)`: missing author, or a name matching the bot patterns
//!   (suffix "bot", or containing "auto", "moderator", "helper", "notifier").
//! - `is_spam(text)`: missing text, fewer than 5 characters, or any of the spam
//!   patterns (links, "free", "giveaway", "win", "prize").
//!
//! All pattern matching is case-insensitive. A dropped item gets no labels and
//! is never persisted.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Texts shorter than this (in characters) are always spam.
pub const MIN_TEXT_CHARS: usize = 5;

const BOT_PATTERN: &str = r"(?i)(bot$|auto|moderator|helper|notifier)";
const SPAM_PATTERN: &str = r"(?i)(https?://|free|giveaway|win|prize)";

fn bot_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(BOT_PATTERN).unwrap())
}

fn spam_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(SPAM_PATTERN).unwrap())
}

/// Why an item was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Bot,
    Spam,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Bot => "bot",
            DropReason::Spam => "spam",
        }
    }
}

pub fn is_bot(author: Option<&str>) -> bool {
    match author {
        None => true,
        Some(a) if a.trim().is_empty() => true,
        Some(a) => bot_re().is_match(a),
    }
}

pub fn is_spam(text: Option<&str>) -> bool {
    match text {
        None => true,
        Some(t) if t.chars().count() < MIN_TEXT_CHARS => true,
        Some(t) => spam_re().is_match(t),
    }
}

/// Stateless gate. Kept as a type so the orchestrator holds it like any other stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentFilter;

impl ContentFilter {
    pub fn new() -> Self {
        Self
    }

    /// `None` means keep. `text` is the item's combined text.
    pub fn check(&self, author: Option<&str>, text: &str) -> Option<DropReason> {
        if is_bot(author) {
            return Some(DropReason::Bot);
        }
        if is_spam(Some(text)) {
            return Some(DropReason::Spam);
        }
        None
    }
}
