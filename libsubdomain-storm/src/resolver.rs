use async_trait::async_trait;
use std::{
    fmt,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DnsError {
    #[error("DNS query timed out")]
    Timeout,
    #[error("DNS query refused by server")]
    Refused,
    #[error("Name does not exist")]
    NxDomain,
    #[error("No records in answer")]
    NoRecords,
    #[error("DNS transport error: {0}")]
    Transport(String),
    #[error("No resolvers configured")]
    NoResolvers,
}

impl DnsError {
    /// Outcomes that mean "nothing here" rather than "something broke".
    pub fn is_not_found(&self) -> bool {
        matches!(self, DnsError::Refused | DnsError::NxDomain | DnsError::NoRecords)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    A,
    Ns,
    Mx,
    Txt,
    Soa,
    Other,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordKind::A => "A",
            RecordKind::Ns => "NS",
            RecordKind::Mx => "MX",
            RecordKind::Txt => "TXT",
            RecordKind::Soa => "SOA",
            RecordKind::Other => "OTHER",
        };
        f.write_str(s)
    }
}

/// One answer record. `data` carries the payload that matters to discovery:
/// the exchange host for MX, the target host for NS, the address for A.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub name: String,
    pub kind: RecordKind,
    pub data: String,
}

impl DnsRecord {
    pub fn new(name: impl Into<String>, kind: RecordKind, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            data: data.into(),
        }
    }
}

#[async_trait]
pub trait DnsTransport: Send + Sync {
    async fn query(
        &self,
        server: SocketAddr,
        name: &str,
        kind: RecordKind,
        timeout: Duration,
    ) -> Result<Vec<DnsRecord>, DnsError>;

    async fn zone_transfer(
        &self,
        server: SocketAddr,
        zone: &str,
        timeout: Duration,
    ) -> Result<Vec<DnsRecord>, DnsError>;
}

/// Read-only set of resolvers shared by every DNS query of a run. Queries
/// rotate through the resolvers and are never retried here.
pub struct ResolverPool {
    resolvers: Vec<SocketAddr>,
    timeout: Duration,
    transport: Arc<dyn DnsTransport>,
    next: AtomicUsize,
}

impl ResolverPool {
    pub fn new(resolvers: Vec<SocketAddr>, timeout: Duration, transport: Arc<dyn DnsTransport>) -> Self {
        Self {
            resolvers,
            timeout,
            transport,
            next: AtomicUsize::new(0),
        }
    }

    pub fn resolvers(&self) -> &[SocketAddr] {
        &self.resolvers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn pick(&self) -> Result<SocketAddr, DnsError> {
        if self.resolvers.is_empty() {
            return Err(DnsError::NoResolvers);
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.resolvers.len();
        Ok(self.resolvers[i])
    }

    pub async fn query(&self, name: &str, kind: RecordKind) -> Result<Vec<DnsRecord>, DnsError> {
        let server = self.pick()?;
        let records = self.transport.query(server, name, kind, self.timeout).await?;
        if records.is_empty() {
            return Err(DnsError::NoRecords);
        }
        Ok(records)
    }

    pub async fn query_mx(&self, domain: &str) -> Result<Vec<DnsRecord>, DnsError> {
        self.query(domain, RecordKind::Mx).await
    }

    pub async fn query_axfr(&self, domain: &str) -> Result<Vec<DnsRecord>, DnsError> {
        let server = self.pick()?;
        self.query_axfr_at(server, domain, self.timeout).await
    }

    /// Zone transfer against a specific server, usually one of the domain's
    /// authoritative name servers rather than a recursive resolver.
    pub async fn query_axfr_at(
        &self,
        server: SocketAddr,
        domain: &str,
        timeout: Duration,
    ) -> Result<Vec<DnsRecord>, DnsError> {
        let records = self.transport.zone_transfer(server, domain, timeout).await?;
        if records.is_empty() {
            return Err(DnsError::NoRecords);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        servers: Mutex<Vec<SocketAddr>>,
    }

    #[async_trait]
    impl DnsTransport for RecordingTransport {
        async fn query(
            &self,
            server: SocketAddr,
            name: &str,
            kind: RecordKind,
            _timeout: Duration,
        ) -> Result<Vec<DnsRecord>, DnsError> {
            self.servers.lock().unwrap().push(server);
            match kind {
                RecordKind::Mx => Ok(vec![DnsRecord::new(name, kind, "mail.example.com.")]),
                _ => Ok(Vec::new()),
            }
        }

        async fn zone_transfer(
            &self,
            _server: SocketAddr,
            _zone: &str,
            _timeout: Duration,
        ) -> Result<Vec<DnsRecord>, DnsError> {
            Err(DnsError::Refused)
        }
    }

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn rotates_through_resolvers() {
        let transport = Arc::new(RecordingTransport::default());
        let pool = ResolverPool::new(
            vec![addr("1.1.1.1:53"), addr("8.8.8.8:53")],
            Duration::from_secs(1),
            transport.clone(),
        );

        for _ in 0..4 {
            pool.query_mx("example.com").await.unwrap();
        }

        let servers = transport.servers.lock().unwrap().clone();
        assert_eq!(
            servers,
            vec![addr("1.1.1.1:53"), addr("8.8.8.8:53"), addr("1.1.1.1:53"), addr("8.8.8.8:53")]
        );
    }

    #[tokio::test]
    async fn empty_answers_become_no_records() {
        let pool = ResolverPool::new(
            vec![addr("1.1.1.1:53")],
            Duration::from_secs(1),
            Arc::new(RecordingTransport::default()),
        );
        assert_eq!(pool.query("example.com", RecordKind::Txt).await, Err(DnsError::NoRecords));
        assert_eq!(pool.query_axfr("example.com").await, Err(DnsError::Refused));
    }

    #[tokio::test]
    async fn empty_pool_fails_without_querying() {
        let transport = Arc::new(RecordingTransport::default());
        let pool = ResolverPool::new(Vec::new(), Duration::from_secs(1), transport.clone());
        assert_eq!(pool.query_mx("example.com").await, Err(DnsError::NoResolvers));
        assert!(transport.servers.lock().unwrap().is_empty());
    }

    #[test]
    fn refusals_are_not_found() {
        assert!(DnsError::Refused.is_not_found());
        assert!(DnsError::NoRecords.is_not_found());
        assert!(!DnsError::Timeout.is_not_found());
    }
}
