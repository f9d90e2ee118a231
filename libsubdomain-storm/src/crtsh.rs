use crate::{
    domain::Domain,
    gate::AdmissionGate,
    scheduler::Probe,
    types::{DiscoveryResult, Source, SourceStatus, DEFAULT_CRTSH_URL},
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

const BODY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum CtError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Request timed out")]
    Timeout,
    #[error("Received status code {0}")]
    Status(StatusCode),
    #[error("Error decoding response: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct CertEntry {
    #[serde(default)]
    name_value: Option<String>,
    #[serde(default)]
    common_name: Option<String>,
}

pub struct CtProbe {
    client: Client,
    endpoint: String,
    timeout: Duration,
    retries: u32,
    backoff: Duration,
}

impl CtProbe {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: DEFAULT_CRTSH_URL.to_string(),
            timeout,
            retries: 3,
            backoff: Duration::from_secs(2),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Total number of attempts, including the first one.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Base delay between attempts; doubles after every failure.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub async fn collect(&self, domain: &Domain, gate: &AdmissionGate) -> DiscoveryResult {
        let start = Instant::now();
        let mut result = DiscoveryResult::new(Source::Crtsh);
        let attempts = self.retries.max(1);

        // One slot covers every attempt.
        let _permit = gate.acquire().await;
        info!("[crt.sh] Querying {} for %.{}", self.endpoint, domain);

        let mut last_error = None;
        for attempt in 0..attempts {
            match self.fetch_once(domain).await {
                Ok(names) => {
                    info!("[crt.sh] Parsed response, {} candidate names", names.len());
                    result.candidates = names;
                    result.duration = start.elapsed();
                    return result;
                }
                Err(e) => {
                    warn!("[crt.sh] {} (attempt {}/{})", e, attempt + 1, attempts);
                    last_error = Some(e);
                }
            }

            if attempt + 1 < attempts {
                let delay = self.backoff.saturating_mul(2u32.saturating_pow(attempt));
                if !delay.is_zero() {
                    debug!("[crt.sh] Retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        let reason = match last_error {
            Some(e) => format!("failed after {} attempts: {}", attempts, e),
            None => format!("failed after {} attempts", attempts),
        };
        result.status = SourceStatus::Failed(reason);
        result.duration = start.elapsed();
        result
    }

    async fn fetch_once(&self, domain: &Domain) -> Result<Vec<String>, CtError> {
        let query = format!("%.{}", domain);
        let request = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query.as_str()), ("output", "json")]);

        let body = tokio::time::timeout(self.timeout, async {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(CtError::Status(status));
            }
            Ok::<_, CtError>(response.text().await?)
        })
        .await
        .map_err(|_| CtError::Timeout)??;

        parse_body(&body)
    }
}

#[async_trait]
impl Probe for CtProbe {
    fn source(&self) -> Source {
        Source::Crtsh
    }

    async fn discover(&self, domain: &Domain, gate: &AdmissionGate) -> DiscoveryResult {
        self.collect(domain, gate).await
    }
}

/// Decodes a crt.sh JSON body into raw host names. An empty body is an
/// empty result, not an error.
pub fn parse_body(body: &str) -> Result<Vec<String>, CtError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let entries: Vec<CertEntry> = serde_json::from_str(trimmed).map_err(|e| {
        let lower = trimmed.to_lowercase();
        if lower.starts_with("<!doctype html") || lower.contains("<html") {
            CtError::Parse("received HTML instead of JSON".to_string())
        } else {
            let preview: String = trimmed.chars().take(BODY_PREVIEW_CHARS).collect();
            CtError::Parse(format!("{} (body: {})", e, preview))
        }
    })?;

    Ok(extract_names(&entries))
}

fn extract_names(entries: &[CertEntry]) -> Vec<String> {
    entries
        .iter()
        .flat_map(|entry| {
            let names = entry.name_value.as_deref().unwrap_or_default().lines();
            names.chain(entry.common_name.as_deref().unwrap_or_default().lines())
        })
        .map(str::trim)
        .map(|name| name.strip_prefix("*.").unwrap_or(name))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
