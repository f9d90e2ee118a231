use serde::Serialize;
use std::{
    collections::BTreeMap,
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

pub const DEFAULT_CRTSH_URL: &str = "https://crt.sh/";
pub const DEFAULT_DNS_PORT: u16 = 53;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Dns,
    Crtsh,
}

impl Source {
    pub fn tag(&self) -> &'static str {
        match self {
            Source::Dns => "dns",
            Source::Crtsh => "crtsh",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Dns => f.write_str("DNS"),
            Source::Crtsh => f.write_str("crt.sh"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum SourceStatus {
    Ok,
    Warning(Vec<String>),
    Failed(String),
    Cancelled,
}

impl SourceStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, SourceStatus::Ok)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SourceStatus::Failed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SourceStatus::Cancelled)
    }
}

/// Raw output of one probe. Candidates are untrusted and only become
/// subdomains once the aggregator has normalized them.
#[derive(Debug, Clone)]
pub struct DiscoveryResult {
    pub source: Source,
    pub candidates: Vec<String>,
    pub status: SourceStatus,
    pub wildcard_detected: bool,
    pub duration: Duration,
}

impl DiscoveryResult {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            candidates: Vec::new(),
            status: SourceStatus::Ok,
            wildcard_detected: false,
            duration: Duration::ZERO,
        }
    }

    pub fn failed(source: Source, reason: impl Into<String>) -> Self {
        Self {
            status: SourceStatus::Failed(reason.into()),
            ..Self::new(source)
        }
    }

    pub fn cancelled(source: Source) -> Self {
        Self {
            status: SourceStatus::Cancelled,
            ..Self::new(source)
        }
    }

    /// Records a soft failure without dropping any candidates collected so far.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        match &mut self.status {
            SourceStatus::Ok => self.status = SourceStatus::Warning(vec![message]),
            SourceStatus::Warning(warnings) => warnings.push(message),
            SourceStatus::Failed(_) | SourceStatus::Cancelled => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub candidates: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub status: SourceStatus,
    pub stats: SourceStats,
    pub wildcard_detected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateResult {
    pub domain: String,
    pub subdomains: Vec<String>,
    pub sources: BTreeMap<Source, SourceSummary>,
    pub overlap: usize,
    pub wildcard_detected: bool,
}

impl AggregateResult {
    pub fn total(&self) -> usize {
        self.subdomains.len()
    }

    pub fn found_by(&self, source: Source) -> usize {
        self.sources
            .get(&source)
            .map(|s| s.stats.accepted)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub resolvers: Vec<SocketAddr>,
    pub dns_timeout: Duration,
    pub http_timeout: Duration,
    pub retries: u32,
    pub retry_backoff: Duration,
    pub user_agent: String,
    pub concurrency: usize,
    pub crtsh_url: String,
    pub wildcard_check: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            resolvers: vec![SocketAddr::new(
                IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
                DEFAULT_DNS_PORT,
            )],
            dns_timeout: Duration::from_secs(5),
            http_timeout: Duration::from_secs(10),
            retries: 3,
            retry_backoff: Duration::from_secs(2),
            user_agent: format!("subd/{}", env!("CARGO_PKG_VERSION")),
            concurrency: 100,
            crtsh_url: DEFAULT_CRTSH_URL.to_string(),
            wildcard_check: true,
        }
    }
}
