use crate::{
    domain::Domain,
    gate::AdmissionGate,
    types::{DiscoveryResult, Source},
};
use async_trait::async_trait;
use std::{future::Future, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A discovery channel. Implementations turn every failure into a tagged
/// `DiscoveryResult` instead of returning errors.
#[async_trait]
pub trait Probe: Send + Sync {
    fn source(&self) -> Source;

    async fn discover(&self, domain: &Domain, gate: &AdmissionGate) -> DiscoveryResult;
}

pub struct Scheduler {
    gate: AdmissionGate,
    probes: Vec<Arc<dyn Probe>>,
}

impl Scheduler {
    pub fn new(gate: AdmissionGate) -> Self {
        Self {
            gate,
            probes: Vec::new(),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub async fn run(&self, domain: &Domain) -> Vec<DiscoveryResult> {
        self.run_until(domain, std::future::pending::<()>()).await
    }

    /// Runs every probe on its own task and waits for all of them, or for
    /// `cancel` to resolve. On cancellation in-flight probes are aborted and
    /// reported as cancelled; results that already arrived are kept.
    pub async fn run_until<F>(&self, domain: &Domain, cancel: F) -> Vec<DiscoveryResult>
    where
        F: Future<Output = ()>,
    {
        let (tx, mut rx) = mpsc::channel(self.probes.len().max(1));
        let mut handles = Vec::with_capacity(self.probes.len());

        for probe in &self.probes {
            let probe = Arc::clone(probe);
            let gate = self.gate.clone();
            let domain = domain.clone();
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let result = probe.discover(&domain, &gate).await;
                let _ = tx.send(result).await;
            }));
        }
        drop(tx);

        tokio::pin!(cancel);
        let mut results = Vec::with_capacity(self.probes.len());
        let mut cancelled = false;

        loop {
            tokio::select! {
                biased;
                received = rx.recv() => match received {
                    Some(result) => {
                        debug!("{} probe finished in {:?}", result.source, result.duration);
                        results.push(result);
                    }
                    None => break,
                },
                _ = &mut cancel => {
                    warn!("Run cancelled, abandoning in-flight queries");
                    cancelled = true;
                    break;
                }
            }
        }

        for handle in &handles {
            handle.abort();
        }
        while let Ok(result) = rx.try_recv() {
            results.push(result);
        }

        for probe in &self.probes {
            let source = probe.source();
            if results.iter().any(|r| r.source == source) {
                continue;
            }
            results.push(if cancelled {
                DiscoveryResult::cancelled(source)
            } else {
                DiscoveryResult::failed(source, "probe task ended without a result")
            });
        }

        results
    }
}
