#![allow(dead_code)]

use async_trait::async_trait;
use libsubdomain_storm::{DnsError, DnsRecord, DnsTransport, RecordKind, ScanConfig};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

/// In-memory DNS: a fixed answer table, AXFR always refused.
#[derive(Default)]
pub struct StaticTransport {
    answers: HashMap<(String, RecordKind), Vec<DnsRecord>>,
    pub delay: Duration,
    pub queries: AtomicUsize,
}

impl StaticTransport {
    pub fn answer(mut self, name: &str, kind: RecordKind, data: &[&str]) -> Self {
        let records = data.iter().map(|d| DnsRecord::new(name, kind, *d)).collect();
        self.answers.insert((name.to_string(), kind), records);
        self
    }

    /// A zone with an SOA and the given mail exchangers.
    pub fn zone(domain: &str, mx: &[&str]) -> Self {
        Self::default()
            .answer(domain, RecordKind::Soa, &["ns1. hostmaster. 1 7200 3600 1209600 3600"])
            .answer(domain, RecordKind::Mx, mx)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsTransport for StaticTransport {
    async fn query(
        &self,
        _server: SocketAddr,
        name: &str,
        kind: RecordKind,
        _timeout: Duration,
    ) -> Result<Vec<DnsRecord>, DnsError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.answers
            .get(&(name.to_string(), kind))
            .cloned()
            .ok_or(DnsError::NxDomain)
    }

    async fn zone_transfer(
        &self,
        _server: SocketAddr,
        _zone: &str,
        _timeout: Duration,
    ) -> Result<Vec<DnsRecord>, DnsError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Err(DnsError::Refused)
    }
}

pub fn test_config(crtsh_url: &str) -> ScanConfig {
    ScanConfig {
        crtsh_url: crtsh_url.to_string(),
        retries: 3,
        retry_backoff: Duration::ZERO,
        http_timeout: Duration::from_secs(5),
        dns_timeout: Duration::from_secs(1),
        ..ScanConfig::default()
    }
}

/// One certificate per entry. Entries may list several SAN names separated
/// by newlines; the first one doubles as the certificate's common name.
pub fn crtsh_body(names: &[&str]) -> String {
    let entries: Vec<serde_json::Value> = names
        .iter()
        .map(|n| {
            let common_name = n.lines().next().unwrap_or_default();
            serde_json::json!({ "name_value": n, "common_name": common_name })
        })
        .collect();
    serde_json::Value::Array(entries).to_string()
}
