use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::duration::{deserialize_duration, serialize_duration};
use crate::rates::RateBounds;

/// Default local currency code.
fn default_local_currency() -> String {
    "VES".to_string()
}

fn default_staleness() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Rate refresh, validation and display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    /// Age after which the active rate is considered stale.
    #[serde(
        default = "default_staleness",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub staleness: Duration,

    /// How often the daemon asks whether the active rate is stale.
    #[serde(
        default = "default_refresh_interval",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub refresh_interval: Duration,

    /// Per-request timeout applied by every HTTP source.
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub request_timeout: Duration,

    /// Smallest rate accepted for activation.
    pub min_rate: f64,

    /// Largest rate accepted for activation.
    pub max_rate: f64,

    /// Decimal places used when recomputing local-currency amounts.
    pub display_decimals: u32,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            staleness: default_staleness(),
            refresh_interval: default_refresh_interval(),
            request_timeout: default_request_timeout(),
            min_rate: 0.0001,
            max_rate: 1_000_000_000.0,
            display_decimals: 2,
        }
    }
}

impl RateConfig {
    pub fn bounds(&self) -> RateBounds {
        RateBounds::new(self.min_rate, self.max_rate)
    }
}

/// Known rate source implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// DolarApi (`promedio` field)
    DolarApi,
    /// PyDolarVe (`price` field)
    Pydolar,
    /// Any JSON endpoint with a configurable field list
    Json,
}

fn default_enabled() -> bool {
    true
}

fn default_priority() -> u32 {
    100
}

/// One configured rate source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Identifier stored in `RateRecord::source`.
    pub id: String,

    #[serde(rename = "type")]
    pub source_type: SourceType,

    /// Lower values are tried first.
    #[serde(default = "default_priority")]
    pub priority: u32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Base URL override (full URL for `json` sources).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Field names to look for, in order. Only used by `json` sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,

    /// Endpoint variant: DolarApi kind (`oficial`, `paralelo`) or PyDolar page (`bcv`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl SourceConfig {
    pub fn new(id: impl Into<String>, source_type: SourceType, priority: u32) -> Self {
        Self {
            id: id.into(),
            source_type,
            priority,
            enabled: true,
            url: None,
            fields: None,
            kind: None,
        }
    }
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new("dolar_api", SourceType::DolarApi, 10),
        SourceConfig::new("pydolar", SourceType::Pydolar, 20),
    ]
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to data directory. If relative, resolved from the config file location.
    pub data_dir: Option<PathBuf>,

    /// ISO code of the local currency rates are quoted in.
    #[serde(default = "default_local_currency")]
    pub local_currency: String,

    #[serde(default)]
    pub rates: RateConfig,

    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            local_currency: default_local_currency(),
            rates: RateConfig::default(),
            sources: default_sources(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Parse and validate config from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let rates = &self.rates;
        if !(rates.min_rate.is_finite() && rates.min_rate > 0.0) {
            bail!("rates.min_rate must be a positive number");
        }
        if !(rates.max_rate.is_finite() && rates.max_rate > rates.min_rate) {
            bail!("rates.max_rate must be greater than rates.min_rate");
        }
        if rates.display_decimals > 10 {
            bail!("rates.display_decimals must be at most 10");
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                bail!("source id must not be empty");
            }
            if !seen.insert(source.id.as_str()) {
                bail!("duplicate source id: {}", source.id);
            }
            if source.source_type == SourceType::Json && source.url.is_none() {
                bail!("json source {} requires a url", source.id);
            }
        }
        Ok(())
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the data directory relative to `config_dir`.
    pub fn resolve_data_dir(&self, config_dir: &Path) -> PathBuf {
        match &self.data_dir {
            Some(data_dir) if data_dir.is_absolute() => data_dir.clone(),
            Some(data_dir) => config_dir.join(data_dir),
            None => config_dir.to_path_buf(),
        }
    }

    /// Enabled sources sorted by priority (lower first).
    pub fn enabled_sources(&self) -> Vec<SourceConfig> {
        let mut sources: Vec<SourceConfig> =
            self.sources.iter().filter(|s| s.enabled).cloned().collect();
        sources.sort_by_key(|s| s.priority);
        sources
    }
}

/// Loaded configuration with resolved paths.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub data_dir: PathBuf,
    pub local_currency: String,
    pub rates: RateConfig,
    pub sources: Vec<SourceConfig>,
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./ratebook.toml` if it exists in current directory
/// 2. `~/.local/share/ratebook/ratebook.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("ratebook.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("ratebook").join("ratebook.toml");
    }

    local_config
}

impl ResolvedConfig {
    /// Load and resolve config from a file path.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;

        let config_dir = config_path
            .parent()
            .context("Config file has no parent directory")?;

        let config = Config::load(&config_path)?;
        Ok(Self::from_config(config, config_dir))
    }

    /// Load config if present; otherwise defaults with the data dir next to `config_path`.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load(config_path);
        }

        let config_dir = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::env::current_dir().context("Failed to determine current directory")?,
        };
        Ok(Self::from_config(Config::default(), &config_dir))
    }

    pub fn from_config(config: Config, config_dir: &Path) -> Self {
        let data_dir = config.resolve_data_dir(config_dir);
        let sources = config.enabled_sources();
        Self {
            data_dir,
            local_currency: config.local_currency,
            rates: config.rates,
            sources,
        }
    }

    pub fn rates_dir(&self) -> PathBuf {
        self.data_dir.join("rates")
    }

    pub fn receivables_file(&self) -> PathBuf {
        self.data_dir.join("receivables.json")
    }
}
