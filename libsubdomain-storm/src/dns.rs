use crate::{
    domain::Domain,
    gate::AdmissionGate,
    resolver::{DnsError, RecordKind, ResolverPool},
    scheduler::Probe,
    types::{DiscoveryResult, Source, SourceStatus, DEFAULT_DNS_PORT},
};
use async_trait::async_trait;
use futures::future::join_all;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Instant,
};
use tracing::{debug, info, warn};

/// Zone transfers move a whole zone over TCP, so they get twice the
/// per-query budget.
const AXFR_TIMEOUT_FACTOR: u32 = 2;

#[derive(Debug, Default)]
struct Findings {
    candidates: Vec<String>,
    warnings: Vec<String>,
    wildcard: bool,
    answered: bool,
}

impl Findings {
    fn absorb(&mut self, other: Findings) {
        self.candidates.extend(other.candidates);
        self.warnings.extend(other.warnings);
        self.wildcard |= other.wildcard;
        self.answered |= other.answered;
    }
}

/// A server replied, even if the reply was "no such name".
fn responded<T>(outcome: &Result<T, DnsError>) -> bool {
    match outcome {
        Ok(_) => true,
        Err(e) => e.is_not_found(),
    }
}

pub struct DnsProbe {
    pool: Arc<ResolverPool>,
    wildcard_check: bool,
}

impl DnsProbe {
    pub fn new(pool: Arc<ResolverPool>, wildcard_check: bool) -> Self {
        Self { pool, wildcard_check }
    }

    pub async fn collect(&self, domain: &Domain, gate: &AdmissionGate) -> DiscoveryResult {
        let start = Instant::now();
        let mut result = DiscoveryResult::new(Source::Dns);
        info!("[DNS] Using resolvers: {:?}", self.pool.resolvers());

        let soa = {
            let _permit = gate.acquire().await;
            self.pool.query(domain.as_str(), RecordKind::Soa).await
        };
        let soa_answered = soa.is_ok();
        match soa {
            Ok(_) => {}
            Err(DnsError::NxDomain | DnsError::NoRecords) => {
                result.status = SourceStatus::Failed(format!("no SOA record for {}", domain));
                result.duration = start.elapsed();
                return result;
            }
            Err(e @ (DnsError::Refused | DnsError::NoResolvers)) => {
                result.status = SourceStatus::Failed(format!("cannot resolve {}: {}", domain, e));
                result.duration = start.elapsed();
                return result;
            }
            Err(e) => {
                warn!("[DNS] SOA lookup for {} failed: {}", domain, e);
                result.warn(format!("SOA lookup failed: {}", e));
            }
        }

        let (axfr, mx, wildcard) = tokio::join!(
            self.zone_transfers(domain, gate),
            self.mail_exchangers(domain, gate),
            self.wildcard_probe(domain, gate),
        );

        let mut findings = Findings::default();
        findings.absorb(axfr);
        findings.absorb(mx);
        findings.absorb(wildcard);

        result.duration = start.elapsed();
        if !soa_answered && !findings.answered {
            let mut reasons = match &result.status {
                SourceStatus::Warning(w) => w.clone(),
                _ => Vec::new(),
            };
            reasons.extend(findings.warnings);
            result.status = SourceStatus::Failed(format!(
                "DNS resolution failed: no server answered ({})",
                reasons.join("; ")
            ));
            return result;
        }

        result.candidates = findings.candidates;
        result.wildcard_detected = findings.wildcard;
        for warning in findings.warnings {
            result.warn(warning);
        }

        info!("[DNS] Collected {} candidate names", result.candidates.len());
        result
    }

    async fn zone_transfers(&self, domain: &Domain, gate: &AdmissionGate) -> Findings {
        let mut findings = Findings::default();
        let (mut targets, ns_answered) = self.nameserver_addresses(domain, gate).await;
        findings.answered = ns_answered;
        if targets.is_empty() {
            debug!("[DNS] No name server addresses, trying AXFR against resolvers");
            targets = self.pool.resolvers().to_vec();
        }

        let timeout = self.pool.timeout().saturating_mul(AXFR_TIMEOUT_FACTOR);
        let transfers = targets.iter().map(|&server| async move {
            let _permit = gate.acquire().await;
            debug!("[DNS] Attempting AXFR from {}", server);
            (server, self.pool.query_axfr_at(server, domain.as_str(), timeout).await)
        });

        for (server, outcome) in join_all(transfers).await {
            findings.answered |= responded(&outcome);
            match outcome {
                Ok(records) => {
                    info!("[DNS] AXFR successful from {}, {} records", server, records.len());
                    findings.candidates.extend(records.into_iter().map(|r| r.name));
                }
                Err(DnsError::Timeout) => {
                    warn!("[DNS] AXFR from {} timed out", server);
                    findings.warnings.push(format!("AXFR from {} timed out", server));
                }
                Err(e) if e.is_not_found() => {
                    info!("[DNS] AXFR from {}: not found ({})", server, e);
                }
                Err(e) => {
                    debug!("[DNS] AXFR from {} failed: {}", server, e);
                }
            }
        }

        findings
    }

    /// Resolves the domain's name servers. The flag reports whether the NS
    /// or any A lookup got a reply at all.
    async fn nameserver_addresses(&self, domain: &Domain, gate: &AdmissionGate) -> (Vec<SocketAddr>, bool) {
        let ns = {
            let _permit = gate.acquire().await;
            self.pool.query(domain.as_str(), RecordKind::Ns).await
        };
        let ns_answered = responded(&ns);
        let hosts: Vec<String> = match ns {
            Ok(records) => records
                .into_iter()
                .filter(|r| r.kind == RecordKind::Ns)
                .map(|r| r.data.trim_end_matches('.').to_string())
                .collect(),
            Err(DnsError::Timeout) => {
                warn!("[DNS] Timeout while getting NS records for {}", domain);
                return (Vec::new(), false);
            }
            Err(e) => {
                debug!("[DNS] No NS records for {}: {}", domain, e);
                return (Vec::new(), ns_answered);
            }
        };
        debug!("[DNS] Found NS servers: {:?}", hosts);

        let lookups = hosts.iter().map(|host| async move {
            let _permit = gate.acquire().await;
            self.pool.query(host, RecordKind::A).await
        });

        let replies = join_all(lookups).await;
        let a_answered = replies.iter().any(responded);
        let mut addrs: Vec<SocketAddr> = replies
            .into_iter()
            .filter_map(Result::ok)
            .flatten()
            .filter(|r| r.kind == RecordKind::A)
            .filter_map(|r| r.data.parse::<IpAddr>().ok())
            .map(|ip| SocketAddr::new(ip, DEFAULT_DNS_PORT))
            .collect();
        addrs.sort();
        addrs.dedup();
        (addrs, ns_answered || a_answered)
    }

    async fn mail_exchangers(&self, domain: &Domain, gate: &AdmissionGate) -> Findings {
        let mut findings = Findings::default();
        let mx = {
            let _permit = gate.acquire().await;
            self.pool.query_mx(domain.as_str()).await
        };

        findings.answered = responded(&mx);
        match mx {
            Ok(records) => {
                let hosts: Vec<String> = records
                    .into_iter()
                    .filter(|r| r.kind == RecordKind::Mx)
                    .map(|r| r.data)
                    .collect();
                debug!("[DNS] MX hosts: {:?}", hosts);
                findings.candidates.extend(hosts);
            }
            Err(DnsError::Timeout) => {
                warn!("[DNS] Timeout getting MX records");
                findings.warnings.push("MX lookup timed out".to_string());
            }
            Err(e) if e.is_not_found() => debug!("[DNS] No MX records found"),
            Err(e) => {
                debug!("[DNS] Could not get MX records: {}", e);
                findings.warnings.push(format!("MX lookup failed: {}", e));
            }
        }

        findings
    }

    /// Asks for TXT at a label that should not exist. Any answer means the
    /// zone answers for everything.
    async fn wildcard_probe(&self, domain: &Domain, gate: &AdmissionGate) -> Findings {
        let mut findings = Findings::default();
        if !self.wildcard_check {
            return findings;
        }

        let probe_name = format!("{:016x}.{}", rand::random::<u64>(), domain);
        let txt = {
            let _permit = gate.acquire().await;
            self.pool.query(&probe_name, RecordKind::Txt).await
        };

        findings.answered = responded(&txt);
        match txt {
            Ok(_) => {
                warn!("[DNS] Wildcard DNS detected for {}", domain);
                findings.wildcard = true;
                findings.warnings.push("wildcard DNS detected via TXT".to_string());
            }
            Err(DnsError::Timeout) => warn!("[DNS] Timeout checking wildcard TXT"),
            Err(e) if e.is_not_found() => info!("[DNS] Wildcard TXT: not found ({})", e),
            Err(e) => debug!("[DNS] Could not determine wildcard TXT status: {}", e),
        }

        findings
    }
}

#[async_trait]
impl Probe for DnsProbe {
    fn source(&self) -> Source {
        Source::Dns
    }

    async fn discover(&self, domain: &Domain, gate: &AdmissionGate) -> DiscoveryResult {
        self.collect(domain, gate).await
    }
}
