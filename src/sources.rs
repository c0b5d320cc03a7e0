//! Metadata source abstraction.
//!
//! A [`MetadataSource`] answers "what do you know about this ISSN?" with a
//! [`LookupOutcome`]. It never returns an error: transport faults, timeouts,
//! unexpected statuses and unparseable bodies all become
//! [`LookupOutcome::TransientFault`] at this boundary, and the ingestion loop
//! decides what to do with them.
//!
//! Built-in sources:
//!
//! | Source | Module | Contributes |
//! |--------|--------|-------------|
//! | Crossref | [`connector_crossref`](crate::connector_crossref) | title, publisher, DOI prefix |
//! | OpenAlex | [`connector_openalex`](crate::connector_openalex) | country, open-access flag |

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::{Config, HttpConfig};
use crate::connector_crossref::CrossrefSource;
use crate::connector_openalex::OpenAlexSource;
use crate::models::LookupOutcome;

/// A provider of per-ISSN metadata.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Short provider name used in logs (e.g. `"crossref"`).
    fn name(&self) -> &str;

    /// Look up one ISSN. One outbound request, no retry.
    async fn lookup(&self, issn: &str) -> LookupOutcome;
}

/// The two providers every ISSN is looked up in.
pub struct SourcePair {
    pub bibliographic: Box<dyn MetadataSource>,
    pub classification: Box<dyn MetadataSource>,
}

impl SourcePair {
    pub fn new(
        bibliographic: Box<dyn MetadataSource>,
        classification: Box<dyn MetadataSource>,
    ) -> Self {
        Self {
            bibliographic,
            classification,
        }
    }

    /// Crossref + OpenAlex built from configuration, sharing one HTTP client.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_client(&config.http)?;
        Ok(Self::new(
            Box::new(CrossrefSource::new(
                client.clone(),
                &config.providers.crossref,
            )),
            Box::new(OpenAlexSource::new(client, &config.providers.openalex)),
        ))
    }

    /// Query both providers for one ISSN. Both complete before this returns.
    pub async fn lookup(&self, issn: &str) -> (LookupOutcome, LookupOutcome) {
        tokio::join!(
            self.bibliographic.lookup(issn),
            self.classification.lookup(issn)
        )
    }
}

/// HTTP client with the identifying user agent and per-request timeout.
pub fn build_client(http: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(http.user_agent.clone())
        .timeout(Duration::from_secs(http.timeout_secs))
        .build()?;
    Ok(client)
}

/// Spaces successive requests to one provider by at least `min_interval`.
pub struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Wait if the previous request was too recent.
    pub async fn wait(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let mut last = self.last_request.lock().await;
        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Append path segments to a base URL, percent-encoding each one.
pub(crate) fn endpoint(base_url: &str, segments: &[&str]) -> Result<reqwest::Url, String> {
    let mut url = reqwest::Url::parse(base_url).map_err(|e| format!("bad base url: {}", e))?;
    url.path_segments_mut()
        .map_err(|_| format!("base url cannot take a path: {}", base_url))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Classify a `reqwest` failure for logging.
pub(crate) fn describe_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "timeout".to_string()
    } else if err.is_connect() {
        format!("connect error: {}", err)
    } else if err.is_decode() {
        format!("malformed body: {}", err)
    } else {
        err.to_string()
    }
}

/// String value of `obj[key]`, taken verbatim. Non-strings count as absent.
pub(crate) fn string_field(obj: &serde_json::Value, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}
