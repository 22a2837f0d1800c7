// src/config/mod.rs
//! Runtime settings: read once at startup, immutable afterwards.
//!
//! Sources, lowest to highest precedence:
//! 1) the config document (`$VIGIL_CONFIG_PATH`, default `config.json`)
//! 2) interactive answers for keys still missing (persisted back to the document)
//! 3) `VIGIL_*` environment overrides (never persisted)

pub mod file;
pub mod prompt;

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use reqwest::Url;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

use crate::config::file::StoredConfig;
use crate::ingest::validate::normalize_region;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_FEED_URL: &str = "https://www.nationstates.net/api/founding";
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 120;

pub const ENV_CONFIG_PATH: &str = "VIGIL_CONFIG_PATH";
pub const ENV_NO_PROMPT: &str = "VIGIL_NO_PROMPT";
pub const ENV_WEBHOOK_URL: &str = "VIGIL_WEBHOOK_URL";
pub const ENV_USER_AGENT: &str = "VIGIL_USER_AGENT";
pub const ENV_FEED_URL: &str = "VIGIL_FEED_URL";
pub const ENV_ROLE_TO_PING: &str = "VIGIL_ROLE_TO_PING";
pub const ENV_METRICS_ADDR: &str = "VIGIL_METRICS_ADDR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub webhook: String,
    pub user_agent: String,
    /// Normalized region ids; never contains empty entries.
    pub exclusions: Vec<String>,
    /// Button label -> template id; one generated link per entry, in order.
    pub templates: IndexMap<String, String>,
    pub role_to_ping: Option<String>,
    pub feed_url: String,
    pub reconnect_delay_secs: u64,
    pub connect_timeout_secs: u64,
    pub delivery_timeout_secs: u64,
    /// No bytes for this long on an open stream counts as a disconnect.
    pub idle_timeout_secs: u64,
    pub metrics_addr: Option<SocketAddr>,
}

impl Settings {
    /// Validate a filled-in document. Fails on anything the pipeline cannot run with.
    pub fn from_stored(doc: StoredConfig) -> Result<Self> {
        let webhook = non_blank(doc.webhook).ok_or_else(|| anyhow!("webhook URL is not set"))?;
        let url = Url::parse(&webhook).with_context(|| format!("invalid webhook URL {webhook:?}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("webhook URL must be http(s), got {}", url.scheme());
        }

        let user_agent =
            non_blank(doc.user_agent).ok_or_else(|| anyhow!("user agent is not set"))?;

        let feed_url = non_blank(doc.feed_url).unwrap_or_else(|| DEFAULT_FEED_URL.to_string());
        Url::parse(&feed_url).with_context(|| format!("invalid feed URL {feed_url:?}"))?;

        let metrics_addr = match non_blank(doc.metrics_addr) {
            Some(raw) => Some(
                raw.parse::<SocketAddr>()
                    .with_context(|| format!("invalid metrics address {raw:?}"))?,
            ),
            None => None,
        };

        let exclusions = doc
            .blacklist
            .unwrap_or_default()
            .iter()
            .map(|r| normalize_region(r))
            .filter(|r| !r.is_empty())
            .collect();

        Ok(Self {
            webhook,
            user_agent,
            exclusions,
            templates: doc.templates.unwrap_or_default(),
            role_to_ping: non_blank(doc.role_to_ping),
            feed_url,
            reconnect_delay_secs: doc
                .reconnect_delay_secs
                .unwrap_or(DEFAULT_RECONNECT_DELAY_SECS)
                .max(1),
            connect_timeout_secs: doc
                .connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS)
                .max(1),
            delivery_timeout_secs: doc
                .delivery_timeout_secs
                .unwrap_or(DEFAULT_DELIVERY_TIMEOUT_SECS)
                .max(1),
            idle_timeout_secs: doc
                .idle_timeout_secs
                .unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS)
                .max(1),
            metrics_addr,
        })
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// `VIGIL_*` overrides present in the environment.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub webhook: Option<String>,
    pub user_agent: Option<String>,
    pub feed_url: Option<String>,
    pub role_to_ping: Option<String>,
    pub metrics_addr: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let var = |k: &str| std::env::var(k).ok();
        Self {
            webhook: var(ENV_WEBHOOK_URL).and_then(|v| non_blank(Some(v))),
            user_agent: var(ENV_USER_AGENT).and_then(|v| non_blank(Some(v))),
            feed_url: var(ENV_FEED_URL).and_then(|v| non_blank(Some(v))),
            // An empty role override is meaningful: it disables the ping.
            role_to_ping: var(ENV_ROLE_TO_PING),
            metrics_addr: var(ENV_METRICS_ADDR).and_then(|v| non_blank(Some(v))),
        }
    }

    pub fn provided(&self) -> prompt::Provided {
        prompt::Provided {
            webhook: self.webhook.is_some(),
            user_agent: self.user_agent.is_some(),
            role_to_ping: self.role_to_ping.is_some(),
        }
    }

    pub fn apply(self, doc: &mut StoredConfig) {
        if let Some(v) = self.webhook {
            doc.webhook = Some(v);
        }
        if let Some(v) = self.user_agent {
            doc.user_agent = Some(v);
        }
        if let Some(v) = self.feed_url {
            doc.feed_url = Some(v);
        }
        if let Some(v) = self.role_to_ping {
            doc.role_to_ping = Some(v);
        }
        if let Some(v) = self.metrics_addr {
            doc.metrics_addr = Some(v);
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub path: PathBuf,
    pub interactive: bool,
}

impl LoadOptions {
    /// Path from `$VIGIL_CONFIG_PATH`; prompting unless `VIGIL_NO_PROMPT=1`.
    pub fn from_env() -> Self {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let interactive = std::env::var(ENV_NO_PROMPT).ok().as_deref() != Some("1");
        Self { path, interactive }
    }
}

/// Load, complete, persist and validate the settings from stdin/stdout.
pub fn load(opts: &LoadOptions) -> Result<Settings> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut out = std::io::stdout();
    load_with(opts, EnvOverrides::from_env(), &mut input, &mut out)
}

pub fn load_with<R: std::io::BufRead, W: std::io::Write>(
    opts: &LoadOptions,
    env: EnvOverrides,
    input: &mut R,
    out: &mut W,
) -> Result<Settings> {
    let mut doc = file::load_from(&opts.path)?;

    if opts.interactive && prompt::fill_missing(&mut doc, env.provided(), input, out)? {
        file::save_to(&opts.path, &doc)?;
        info!(target: "vigil", path = %opts.path.display(), "saved config");
    }

    env.apply(&mut doc);
    Settings::from_stored(doc)
}
