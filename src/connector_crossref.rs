//! Crossref journals connector.
//!
//! Looks up `GET {base_url}/journals/{issn}`. A successful response has the
//! shape
//!
//! ```json
//! { "status": "ok", "message": { "title": "...", "publisher": "...", "prefix": "10.1234" } }
//! ```
//!
//! | Response | Outcome |
//! |----------|---------|
//! | `200` with a `message` object | `Found` (title, publisher, DOI prefix) |
//! | `404` | `NotFound` |
//! | any other status, transport error, timeout, bad JSON | `TransientFault` |

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::models::{AttributeSet, LookupOutcome};
use crate::sources::{describe_error, endpoint, string_field, MetadataSource, RateLimiter};

pub struct CrossrefSource {
    client: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
}

impl CrossrefSource {
    pub fn new(client: reqwest::Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            limiter: RateLimiter::from_millis(config.min_request_interval_ms),
        }
    }

    fn fault(&self, issn: &str, reason: String) -> LookupOutcome {
        tracing::warn!(provider = self.name(), issn, %reason, "lookup failed");
        LookupOutcome::TransientFault(reason)
    }
}

#[async_trait]
impl MetadataSource for CrossrefSource {
    fn name(&self) -> &str {
        "crossref"
    }

    async fn lookup(&self, issn: &str) -> LookupOutcome {
        let url = match endpoint(&self.base_url, &["journals", issn]) {
            Ok(url) => url,
            Err(reason) => return self.fault(issn, reason),
        };

        self.limiter.wait().await;
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return self.fault(issn, describe_error(&e)),
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(provider = "crossref", issn, "not found");
            return LookupOutcome::NotFound;
        }
        if !status.is_success() {
            return self.fault(issn, format!("HTTP {}", status));
        }

        match response.json::<Value>().await {
            Ok(body) => parse_journal(&body).unwrap_or_else(|reason| self.fault(issn, reason)),
            Err(e) => self.fault(issn, describe_error(&e)),
        }
    }
}

/// Map a Crossref journal response body to an outcome.
pub fn parse_journal(body: &Value) -> Result<LookupOutcome, String> {
    let message = body
        .get("message")
        .filter(|m| m.is_object())
        .ok_or_else(|| "malformed body: no message object".to_string())?;

    Ok(LookupOutcome::Found(AttributeSet {
        title: string_field(message, "title"),
        publisher: string_field(message, "publisher"),
        doi_prefix: string_field(message, "prefix"),
        ..Default::default()
    }))
}
