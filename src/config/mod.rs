// src/config/mod.rs
//! Startup configuration: `.env` + environment variables, and the sources list.

pub mod app;
pub mod sources;

pub use app::{AppConfig, CapabilityConfig};
pub use sources::{load_sources_default, load_sources_from, TOP_SUBREDDITS};
