// src/ingest/mod.rs
pub mod fetcher;
pub mod filter;
pub mod reddit;
pub mod types;

pub use fetcher::{FetchLimits, SourceFetcher};
pub use filter::{ContentFilter, DropReason};
pub use reddit::{RedditClient, RedditCredentials};
pub use types::{Comment, ContentItem, ContentSource, EnrichedItem, ItemKey, ItemKind, Post};
