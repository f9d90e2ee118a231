use crate::{
    domain::{normalize_candidate, Domain},
    types::{AggregateResult, DiscoveryResult, SourceStats, SourceSummary},
};
use std::collections::{BTreeMap, BTreeSet};

/// Merges per-source results into one sorted, unique set of subdomains.
///
/// Pure and order-independent: results can arrive in any order and the
/// output is identical.
pub fn merge(domain: &Domain, results: &[DiscoveryResult]) -> AggregateResult {
    let mut all = BTreeSet::new();
    let mut sources = BTreeMap::new();
    let mut accepted_total = 0;

    for result in results {
        let mut seen = BTreeSet::new();
        let mut stats = SourceStats {
            candidates: result.candidates.len(),
            ..SourceStats::default()
        };

        for raw in &result.candidates {
            match normalize_candidate(raw, domain) {
                Some(name) => {
                    if !seen.insert(name) {
                        stats.duplicates += 1;
                    }
                }
                None => stats.rejected += 1,
            }
        }

        stats.accepted = seen.len();
        accepted_total += seen.len();
        all.extend(seen);

        sources.insert(
            result.source,
            SourceSummary {
                status: result.status.clone(),
                stats,
                wildcard_detected: result.wildcard_detected,
            },
        );
    }

    let wildcard_detected = sources.values().any(|s| s.wildcard_detected);

    AggregateResult {
        domain: domain.to_string(),
        overlap: accepted_total - all.len(),
        subdomains: all.into_iter().collect(),
        sources,
        wildcard_detected,
    }
}
