use crate::config::Settings;
use crate::domain::property::PropertyId;
use crate::sources::ResearchCompsSource;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

const DEFAULT_PATH: &str = "/v1/research_comps";
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_MS: u64 = 100;
const MIN_ATTEMPT_TIMEOUT_MS: u64 = 100;

// Rows stay untyped here; the normalizer parses and rejects them one by one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchCompsResponse {
    pub property_id: PropertyId,
    #[serde(default)]
    pub comps: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct HttpResearchSource {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
    backoff: Duration,
    attempt_timeout: Duration,
    budget: Duration,
}

impl HttpResearchSource {
    pub fn from_settings(settings: &Settings, budget: Duration) -> Result<Self> {
        let base_url = settings.require_research_source_base_url()?.to_string();
        let api_key = settings.research_source_api_key.clone();

        let retries = std::env::var("RESEARCH_SOURCE_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_RETRIES);

        let backoff_ms = std::env::var("RESEARCH_SOURCE_BACKOFF_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_BACKOFF_MS);

        let attempt_timeout = std::env::var("RESEARCH_SOURCE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|n| *n > 0)
            .map(Duration::from_millis)
            .unwrap_or_else(|| default_attempt_timeout(budget, retries))
            .min(budget);

        let path = std::env::var("RESEARCH_SOURCE_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        let http = reqwest::Client::builder()
            .timeout(attempt_timeout)
            .build()
            .context("failed to build research source http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            path,
            retries,
            backoff: Duration::from_millis(backoff_ms),
            attempt_timeout,
            budget,
        })
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    // Backoff before the next attempt, or `None` when retries are spent or another attempt
    // could not finish inside the budget.
    fn next_backoff(&self, attempt: u32, elapsed: Duration) -> Option<Duration> {
        if attempt >= self.retries {
            return None;
        }
        let backoff = self.backoff.saturating_mul(1 << (attempt - 1).min(16));
        let needed = elapsed + backoff + self.attempt_timeout;
        (needed <= self.budget).then_some(backoff)
    }

    async fn fetch_once(&self, property_id: PropertyId) -> Result<Option<ResearchCompsResponse>> {
        let res = self
            .http
            .get(self.url())
            .headers(self.headers()?)
            .query(&[("property_id", property_id.to_string())])
            .send()
            .await
            .context("research source request failed")?;

        let status = res.status();
        // No research run exists for this property yet.
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let text = res
            .text()
            .await
            .context("failed to read research source response")?;
        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("research source response is not valid JSON: {text}"))?;

        if !status.is_success() {
            anyhow::bail!("research source HTTP {status}: {raw_json}");
        }

        let parsed = serde_json::from_value::<ResearchCompsResponse>(raw_json)
            .context("failed to parse research source response into ResearchCompsResponse")?;
        Ok(Some(parsed))
    }
}

// Splits the budget evenly across attempts, leaving the backoff to eat into the last share.
fn default_attempt_timeout(budget: Duration, retries: u32) -> Duration {
    let share = budget / retries.max(1);
    share.max(Duration::from_millis(MIN_ATTEMPT_TIMEOUT_MS))
}

#[async_trait::async_trait]
impl ResearchCompsSource for HttpResearchSource {
    async fn load_research_comps(&self, property_id: PropertyId) -> Result<Vec<Value>> {
        let t0 = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(property_id).await {
                Ok(None) => return Ok(Vec::new()),
                Ok(Some(resp)) => {
                    anyhow::ensure!(
                        resp.property_id == property_id,
                        "research source property_id mismatch: expected {property_id}, got {}",
                        resp.property_id
                    );
                    return Ok(resp.comps);
                }
                Err(err) => {
                    let Some(backoff) = self.next_backoff(attempt, t0.elapsed()) else {
                        return Err(err.context(format!("research source gave up after {attempt} attempt(s)")));
                    };
                    tracing::warn!(attempt, ?backoff, error = %err, "research source fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
