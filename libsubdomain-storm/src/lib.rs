mod aggregate;
mod crtsh;
mod dns;
mod domain;
mod gate;
mod http;
mod resolver;
mod scheduler;
mod transport;
mod types;

pub use aggregate::merge;
pub use crtsh::{parse_body as parse_crtsh_body, CtError, CtProbe};
pub use dns::DnsProbe;
pub use domain::{normalize_candidate, Domain, DomainError};
pub use gate::{AdmissionGate, GatePermit};
pub use http::create_http_client;
pub use resolver::{DnsError, DnsRecord, DnsTransport, RecordKind, ResolverPool};
pub use scheduler::{Probe, Scheduler};
pub use transport::HickoryTransport;
pub use types::{
    AggregateResult, DiscoveryResult, ScanConfig, Source, SourceStats, SourceStatus, SourceSummary,
    DEFAULT_CRTSH_URL, DEFAULT_DNS_PORT,
};

use std::{future::Future, sync::Arc};

/// Scans `domain` with the default configuration.
pub async fn discover(domain: &str) -> Result<AggregateResult, DiscoveryError> {
    let domain = Domain::parse(domain)?;
    Ok(Discovery::with_config(ScanConfig::default())?.run(&domain).await)
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Wires the resolver pool, both probes and the admission gate together
/// for one configuration.
pub struct Discovery {
    scheduler: Scheduler,
}

impl Discovery {
    pub fn with_config(config: ScanConfig) -> Result<Self, DiscoveryError> {
        Self::with_transport(config, Arc::new(HickoryTransport::new()))
    }

    pub fn with_transport(config: ScanConfig, transport: Arc<dyn DnsTransport>) -> Result<Self, DiscoveryError> {
        let client = create_http_client(config.http_timeout, &config.user_agent)?;

        let pool = ResolverPool::new(config.resolvers.clone(), config.dns_timeout, transport);
        let dns = DnsProbe::new(Arc::new(pool), config.wildcard_check);
        let ct = CtProbe::new(client, config.http_timeout)
            .with_endpoint(config.crtsh_url.clone())
            .with_retries(config.retries)
            .with_backoff(config.retry_backoff);

        let scheduler = Scheduler::new(AdmissionGate::new(config.concurrency))
            .with_probe(Arc::new(dns))
            .with_probe(Arc::new(ct));

        Ok(Self { scheduler })
    }

    pub fn gate(&self) -> &AdmissionGate {
        self.scheduler.gate()
    }

    pub async fn run(&self, domain: &Domain) -> AggregateResult {
        let results = self.scheduler.run(domain).await;
        merge(domain, &results)
    }

    pub async fn run_until<F>(&self, domain: &Domain, cancel: F) -> AggregateResult
    where
        F: Future<Output = ()>,
    {
        let results = self.scheduler.run_until(domain, cancel).await;
        merge(domain, &results)
    }
}
