//! OpenAlex sources connector.
//!
//! Looks up `GET {base_url}/sources?filter=issn:{issn}` and uses the first
//! entry of `results`, reading `country_code` and `is_oa` from it. An empty
//! `results` list means OpenAlex has no such source (`NotFound`); any
//! non-success status, transport error, timeout or unparseable body is a
//! `TransientFault`.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::models::{AttributeSet, LookupOutcome};
use crate::sources::{describe_error, endpoint, string_field, MetadataSource, RateLimiter};

pub struct OpenAlexSource {
    client: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
}

impl OpenAlexSource {
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
impl MetadataSource for OpenAlexSource {
    fn name(&self) -> &str {
        "openalex"
    }

    async fn lookup(&self, issn: &str) -> LookupOutcome {
        let url = match endpoint(&self.base_url, &["sources"]) {
            Ok(url) => url,
            Err(reason) => return self.fault(issn, reason),
        };

        self.limiter.wait().await;
        let response = match self
            .client
            .get(url)
            .query(&[("filter", format!("issn:{}", issn))])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return self.fault(issn, describe_error(&e)),
        };

        let status = response.status();
        if !status.is_success() {
            return self.fault(issn, format!("HTTP {}", status));
        }

        match response.json::<Value>().await {
            Ok(body) => parse_sources(&body).unwrap_or_else(|reason| self.fault(issn, reason)),
            Err(e) => self.fault(issn, describe_error(&e)),
        }
    }
}

/// Map an OpenAlex `/sources` response body to an outcome.
pub fn parse_sources(body: &Value) -> Result<LookupOutcome, String> {
    let results = body
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| "malformed body: no results array".to_string())?;

    let Some(first) = results.first() else {
        return Ok(LookupOutcome::NotFound);
    };

    Ok(LookupOutcome::Found(AttributeSet {
        country_code: string_field(first, "country_code"),
        is_open_access: first.get("is_oa").and_then(Value::as_bool),
        ..Default::default()
    }))
}
