//! TOML configuration parsing and validation.
//!
//! ```toml
//! [store]
//! backend = "sqlite"
//! path = "./data/issn.sqlite"
//!
//! [ingest]
//! input = "./issn_master.csv"
//! batch_size = 100
//! inter_chunk_delay_secs = 2
//! fault_policy = "skip"
//!
//! [http]
//! timeout_secs = 20
//! user_agent = "ISSN-Metadata-Bot/1.0"
//!
//! [providers.crossref]
//! base_url = "https://api.crossref.org"
//!
//! [providers.openalex]
//! base_url = "https://api.openalex.org"
//! ```
//!
//! For the `postgres` backend the connection fields may come from the
//! environment instead: `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER` and
//! `DB_PASSWORD` override whatever the file says.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: default_db_path(),
            host: None,
            port: None,
            name: None,
            user: None,
            password: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/issn.sqlite")
}
fn default_max_connections() -> u32 {
    5
}

/// What the loop does with an ISSN when a provider lookup faulted.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Write nothing; the next run tries again.
    #[default]
    Skip,
    /// Fingerprint the ISSN as if the faulted provider had no data.
    TreatAsMissing,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_input")]
    pub input: PathBuf,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_inter_chunk_delay_secs")]
    pub inter_chunk_delay_secs: u64,
    #[serde(default)]
    pub fault_policy: FaultPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            batch_size: default_batch_size(),
            inter_chunk_delay_secs: default_inter_chunk_delay_secs(),
            fault_policy: FaultPolicy::Skip,
        }
    }
}

impl IngestConfig {
    pub fn inter_chunk_delay(&self) -> Duration {
        Duration::from_secs(self.inter_chunk_delay_secs)
    }
}

fn default_input() -> PathBuf {
    PathBuf::from("./issn_master.csv")
}
fn default_batch_size() -> usize {
    100
}
fn default_inter_chunk_delay_secs() -> u64 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    20
}
fn default_user_agent() -> String {
    "ISSN-Metadata-Bot/1.0".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProvidersConfig {
    #[serde(default = "default_crossref")]
    pub crossref: ProviderConfig,
    #[serde(default = "default_openalex")]
    pub openalex: ProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            crossref: default_crossref(),
            openalex: default_openalex(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Minimum spacing between two calls to this provider; 0 disables it.
    #[serde(default)]
    pub min_request_interval_ms: u64,
}

fn default_crossref() -> ProviderConfig {
    ProviderConfig {
        base_url: "https://api.crossref.org".to_string(),
        min_request_interval_ms: 0,
    }
}
fn default_openalex() -> ProviderConfig {
    ProviderConfig {
        base_url: "https://api.openalex.org".to_string(),
        min_request_interval_ms: 0,
    }
}

/// Resolved PostgreSQL connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgConnectParams {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: Option<String>,
}

impl StoreConfig {
    /// Merge file values with `DB_*` environment overrides.
    pub fn pg_params(&self) -> Result<PgConnectParams> {
        self.pg_params_with(|key| std::env::var(key).ok())
    }

    fn pg_params_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<PgConnectParams> {
        let host = env("DB_HOST")
            .or_else(|| self.host.clone())
            .unwrap_or_else(|| "localhost".to_string());
        let port = match env("DB_PORT") {
            Some(p) => p
                .parse::<u16>()
                .with_context(|| format!("DB_PORT is not a valid port: '{}'", p))?,
            None => self.port.unwrap_or(5432),
        };
        let name = env("DB_NAME")
            .or_else(|| self.name.clone())
            .context("store.name (or DB_NAME) must be set for the postgres backend")?;
        let user = env("DB_USER")
            .or_else(|| self.user.clone())
            .context("store.user (or DB_USER) must be set for the postgres backend")?;
        let password = env("DB_PASSWORD").or_else(|| self.password.clone());

        Ok(PgConnectParams {
            host,
            port,
            name,
            user,
            password,
        })
    }
}

impl Config {
    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.ingest.batch_size == 0 {
            bail!("ingest.batch_size must be > 0");
        }
        if self.http.timeout_secs == 0 {
            bail!("http.timeout_secs must be > 0");
        }
        if self.http.user_agent.trim().is_empty() {
            bail!("http.user_agent must not be empty");
        }
        for (name, provider) in [
            ("crossref", &self.providers.crossref),
            ("openalex", &self.providers.openalex),
        ] {
            if !provider.base_url.starts_with("http://") && !provider.base_url.starts_with("https://")
            {
                bail!(
                    "providers.{}.base_url must be an http(s) URL, got '{}'",
                    name,
                    provider.base_url
                );
            }
        }
        if self.store.max_connections == 0 {
            bail!("store.max_connections must be > 0");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}
