// src/config/sources.rs
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

const ENV_PATH: &str = "SOURCES_PATH";

/// Built-in source list used when no sources file is present.
pub const TOP_SUBREDDITS: &[&str] = &[
    "AskReddit", "worldnews", "funny", "gaming", "aww", "pics", "science", "movies",
    "todayilearned", "news", "gifs", "askscience", "EarthPorn", "books", "television", "Music",
    "explainlikeimfive", "sports", "space", "food", "Jokes", "lifeprotips", "IAmA",
    "Showerthoughts", "Futurology", "nottheonion", "Documentaries", "dataisbeautiful",
    "GetMotivated", "Art", "DIY", "gadgets", "history", "personalfinance", "philosophy",
    "WritingPrompts", "UpliftingNews", "nosleep", "OldSchoolCool", "InternetIsBeautiful",
    "creepy", "tifu",
];

/// Load sources from an explicit path. Supports TOML (`sources = [...]`) or a JSON array.
pub fn load_sources_from(path: &Path) -> Result<Vec<String>, ConfigError> {
    let err = |reason: String| ConfigError::Sources {
        path: path.display().to_string(),
        reason,
    };
    let content = fs::read_to_string(path).map_err(|e| err(e.to_string()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let list = parse_sources(&content, ext.as_str()).ok_or_else(|| err("unsupported format".into()))?;
    if list.is_empty() {
        return Err(err("no sources listed".into()));
    }
    Ok(list)
}

/// Load sources using env var + fallbacks:
/// 1) $SOURCES_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
/// 4) `TOP_SUBREDDITS`
pub fn load_sources_default() -> Result<Vec<String>, ConfigError> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(&p);
        if !pb.exists() {
            return Err(ConfigError::Sources {
                path: p,
                reason: "SOURCES_PATH points to a non-existent path".into(),
            });
        }
        return load_sources_from(&pb);
    }
    for candidate in ["config/sources.toml", "config/sources.json"] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return load_sources_from(&pb);
        }
    }
    tracing::debug!(target: "config", count = TOP_SUBREDDITS.len(), "no sources file, using built-in list");
    Ok(TOP_SUBREDDITS.iter().map(|s| s.to_string()).collect())
}

fn parse_sources(s: &str, hint_ext: &str) -> Option<Vec<String>> {
    let try_toml_first = hint_ext == "toml" || s.contains("sources");
    if try_toml_first {
        if let Some(v) = parse_toml(s) {
            return Some(v);
        }
    }
    if let Some(v) = parse_json(s) {
        return Some(v);
    }
    if !try_toml_first {
        return parse_toml(s);
    }
    None
}

fn parse_toml(s: &str) -> Option<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct SourcesFile {
        sources: Vec<String>,
    }
    let v: SourcesFile = toml::from_str(s).ok()?;
    Some(clean_list(v.sources))
}

fn parse_json(s: &str) -> Option<Vec<String>> {
    let v: Vec<String> = serde_json::from_str(s).ok()?;
    Some(clean_list(v))
}

/// Trims, drops blanks and an optional `r/` prefix, dedups case-insensitively.
/// First occurrence wins and file order is kept, since it is the fetch order.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        let t = t.strip_prefix("r/").unwrap_or(t).trim();
        if !t.is_empty() && seen.insert(t.to_ascii_lowercase()) {
            out.push(t.to_string());
        }
    }
    out
}
