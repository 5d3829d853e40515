// src/config/news.rs
use std::str::FromStr;
use std::time::Duration;
use std::{env, fs, path::Path, path::PathBuf};

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::ingest::providers::DEFAULT_NEWSWIRE_URL;
use crate::pipeline::PublishPolicy;

pub const DEFAULT_NEWS_CONFIG_PATH: &str = "config/news.toml";
pub const ENV_NEWS_CONFIG_PATH: &str = "NEWS_CONFIG_PATH";

fn default_provider_url() -> String {
    DEFAULT_NEWSWIRE_URL.to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_provider_timeout() -> u64 {
    10
}
fn default_window_secs() -> u64 {
    3600
}
fn default_store_root() -> PathBuf {
    PathBuf::from("data/objects")
}
fn default_bucket() -> String {
    "news-galore".to_string()
}
fn default_publish_timeout() -> u64 {
    5
}
fn default_filter_timeout() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_session_lifetime() -> u64 {
    7 * 24 * 3600
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSection {
    #[serde(default = "default_provider_url")]
    pub url: String,
    /// "ENV" means: read from NYT_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            url: default_provider_url(),
            api_key: default_api_key(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Fs,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "fs" => Ok(Self::Fs),
            other => Err(format!("unknown store kind `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    #[serde(default)]
    pub kind: StoreKind,
    #[serde(default = "default_store_root")]
    pub root: PathBuf,
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            root: default_store_root(),
            bucket: default_bucket(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishSection {
    #[serde(default)]
    pub policy: PublishPolicy,
    #[serde(default = "default_publish_timeout")]
    pub timeout_secs: u64,
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            policy: PublishPolicy::default(),
            timeout_secs: default_publish_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Local,
    Remote,
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(format!("unknown filter mode `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterSection {
    #[serde(default)]
    pub mode: FilterMode,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default = "default_filter_timeout")]
    pub timeout_secs: u64,
    /// The filtering service keeps a `processed/` copy of each answer.
    #[serde(default = "default_true")]
    pub write_processed: bool,
    /// Shared secret for `/internal/filter`; unset keeps the endpoint closed.
    /// Usually supplied through NEWS_FILTER_TOKEN rather than the file.
    #[serde(default)]
    pub service_token: Option<String>,
}

impl Default for FilterSection {
    fn default() -> Self {
        Self {
            mode: FilterMode::default(),
            remote_url: None,
            timeout_secs: default_filter_timeout(),
            write_processed: true,
            service_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountsSection {
    #[serde(default = "default_session_lifetime")]
    pub session_lifetime_secs: u64,
}

impl Default for AccountsSection {
    fn default() -> Self {
        Self {
            session_lifetime_secs: default_session_lifetime(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsConfig {
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub publish: PublishSection,
    #[serde(default)]
    pub filter: FilterSection,
    #[serde(default)]
    pub accounts: AccountsSection,
}

impl NewsConfig {
    /// Load from `$NEWS_CONFIG_PATH` or `config/news.toml`; a missing file means defaults.
    /// Environment overrides are applied last.
    pub fn load_default() -> anyhow::Result<Self> {
        let explicit = env::var(ENV_NEWS_CONFIG_PATH).ok().map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_NEWS_CONFIG_PATH));

        let mut cfg = if path.exists() {
            Self::from_toml_str(
                &fs::read_to_string(&path)
                    .with_context(|| format!("reading news config from {}", path.display()))?,
            )
            .with_context(|| format!("parsing news config at {}", path.display()))?
        } else if explicit.is_some() {
            bail!("{ENV_NEWS_CONFIG_PATH} points to non-existent path {}", path.display());
        } else {
            Self::default()
        };

        cfg.apply_env_overrides();
        cfg.finalize()?;
        Ok(cfg)
    }

    /// Load an explicit file, then apply env overrides.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading news config from {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&data)?;
        cfg.apply_env_overrides();
        cfg.finalize()?;
        Ok(cfg)
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Env wins over file. Unparseable values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse::<u64>("NEWS_CACHE_WINDOW_SECS") {
            self.cache.window_secs = v;
        }
        if let Some(v) = env_parse::<PublishPolicy>("NEWS_PUBLISH_POLICY") {
            self.publish.policy = v;
        }
        if let Some(v) = env_parse::<FilterMode>("NEWS_FILTER_MODE") {
            self.filter.mode = v;
        }
        if let Some(v) = env_nonempty("NEWS_REMOTE_FILTER_URL") {
            self.filter.remote_url = Some(v);
        }
        if let Some(v) = env_parse::<StoreKind>("NEWS_STORE_KIND") {
            self.store.kind = v;
        }
        if let Some(v) = env_nonempty("NEWS_FILTER_TOKEN") {
            self.filter.service_token = Some(v);
        }
        if let Some(v) = env_parse::<u64>("NEWS_SESSION_LIFETIME_SECS") {
            self.accounts.session_lifetime_secs = v;
        }
        if let Some(v) = env_nonempty("NEWS_STORE_ROOT") {
            self.store.root = PathBuf::from(v);
        }
        if let Some(v) = env_nonempty("NEWS_BUCKET") {
            self.store.bucket = v;
        }
        if let Some(v) = env_nonempty("NEWS_PROVIDER_URL") {
            self.provider.url = v;
        }
    }

    /// Resolve the "ENV" api key and check cross-field constraints.
    fn finalize(&mut self) -> anyhow::Result<()> {
        if self.provider.api_key.trim().eq_ignore_ascii_case("env") {
            // a missing key is not fatal here: the provider will answer 401 and the
            // pipeline reports an upstream error, which keeps local runs bootable
            self.provider.api_key = env::var("NYT_API_KEY").unwrap_or_default();
            if self.provider.api_key.is_empty() {
                tracing::warn!("NYT_API_KEY is not set; upstream fetches will be rejected");
            }
        }

        if self.cache.window_secs == 0 {
            tracing::warn!("cache.window_secs = 0 disables caching entirely");
        }
        if self.provider.timeout_secs == 0 {
            self.provider.timeout_secs = default_provider_timeout();
        }
        if self.publish.timeout_secs == 0 {
            self.publish.timeout_secs = default_publish_timeout();
        }
        if self.filter.timeout_secs == 0 {
            self.filter.timeout_secs = default_filter_timeout();
        }
        if self.accounts.session_lifetime_secs == 0 {
            self.accounts.session_lifetime_secs = default_session_lifetime();
        }
        if self
            .filter
            .service_token
            .as_deref()
            .is_some_and(|t| t.trim().is_empty())
        {
            self.filter.service_token = None;
        }

        if self.filter.mode == FilterMode::Remote
            && self.filter.remote_url.as_deref().map_or(true, |u| u.trim().is_empty())
        {
            bail!("filter.mode = \"remote\" requires filter.remote_url (or NEWS_REMOTE_FILTER_URL)");
        }
        if self.filter.mode == FilterMode::Remote && self.filter.service_token.is_none() {
            tracing::warn!(
                "filter.mode = \"remote\" without NEWS_FILTER_TOKEN; /internal/filter peers will reject calls"
            );
        }
        Ok(())
    }

    pub fn cache_window(&self) -> Duration {
        Duration::from_secs(self.cache.window_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish.timeout_secs)
    }

    pub fn filter_timeout(&self) -> Duration {
        Duration::from_secs(self.filter.timeout_secs)
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.accounts.session_lifetime_secs)
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env_nonempty(name)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(var = name, value = %raw, error = %e, "ignoring invalid env override");
            None
        }
    }
}
