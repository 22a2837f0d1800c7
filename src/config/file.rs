// src/config/file.rs
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// The persisted configuration document. Every key is optional on disk;
/// missing ones are prompted for or defaulted before the pipeline starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Excluded regions, normalized (`the_west_pacific`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blacklist: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_to_ping: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_delay_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_timeout_secs: Option<u64>,
    /// Longest silence tolerated on an open feed connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_addr: Option<String>,
    /// Button label -> telegram template id, in display order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates: Option<IndexMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
}

impl Format {
    pub fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if ext == "toml" {
            Format::Toml
        } else {
            Format::Json
        }
    }
}

/// Read the document at `path`; a missing file is an empty document.
pub fn load_from(path: &Path) -> Result<StoredConfig> {
    if !path.exists() {
        return Ok(StoredConfig::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    parse(&content, Format::for_path(path))
        .with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_to(path: &Path, doc: &StoredConfig) -> Result<()> {
    let content = render(doc, Format::for_path(path))?;
    fs::write(path, content).with_context(|| format!("writing config to {}", path.display()))
}

pub fn parse(s: &str, format: Format) -> Result<StoredConfig> {
    if s.trim().is_empty() {
        return Ok(StoredConfig::default());
    }
    let doc = match format {
        Format::Json => serde_json::from_str(s)?,
        Format::Toml => toml::from_str(s)?,
    };
    Ok(doc)
}

pub fn render(doc: &StoredConfig, format: Format) -> Result<String> {
    let out = match format {
        Format::Json => serde_json::to_string_pretty(doc)?,
        Format::Toml => toml::to_string_pretty(doc)?,
    };
    Ok(out)
}
