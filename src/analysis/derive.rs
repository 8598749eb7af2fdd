//! Derived metrics and baseline comparison.
//!
//! Ratios that would divide by zero are reported as `None` (undefined), except
//! where a zero-valued sentinel is part of the output contract
//! (`origin_load_reduction` with a zero baseline).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::stats::mean;
use super::types::*;

/// Request counts after reconciliation.
///
/// `network == peer + origin` always holds unless `network_only` is set, in
/// which case only the network total is known and peer/origin are placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestCounts {
    pub peer: u64,
    pub origin: u64,
    pub network: u64,
    pub network_only: bool,
    /// The reported network total disagreed with peer + origin and was replaced
    pub conflicting: bool,
}

/// Reconcile peer/origin/network request counts.
///
/// `network = peer + origin`, so any two determine the third. A network total
/// that contradicts its parts is replaced by their sum. When only the network
/// count is present it cannot be split and the result is `network_only`.
pub fn reconcile_request_counts(
    peer: Option<u64>,
    origin: Option<u64>,
    network: Option<u64>,
) -> RequestCounts {
    let split = |peer: u64, origin: u64, reported: Option<u64>| {
        let network = peer.saturating_add(origin);
        RequestCounts {
            peer,
            origin,
            network,
            network_only: false,
            conflicting: reported.is_some_and(|n| n != network),
        }
    };

    match (peer, origin, network) {
        (None, None, Some(n)) => RequestCounts {
            peer: 0,
            origin: 0,
            network: n,
            network_only: true,
            conflicting: false,
        },
        (Some(p), None, Some(n)) if p <= n => split(p, n - p, Some(n)),
        (None, Some(o), Some(n)) if o <= n => split(n - o, o, Some(n)),
        (p, o, n) => split(p.unwrap_or(0), o.unwrap_or(0), n),
    }
}

/// Percentage of network requests served by peers, undefined without network traffic
pub fn network_cache_hit_ratio(peer_requests: u64, network_requests: u64) -> Option<f64> {
    if network_requests == 0 {
        None
    } else {
        Some(peer_requests as f64 / network_requests as f64 * 100.0)
    }
}

/// A reported percentage outside [0, 100] is treated as not measured
fn valid_ratio(value: Option<f64>, name: &str, source_file: &str) -> Option<f64> {
    match value {
        Some(v) if !(0.0..=100.0).contains(&v) => {
            log::warn!("{}: {} of {} is out of range, ignored", source_file, name, v);
            None
        }
        other => other,
    }
}

/// Fill in the derivable fields of a normalized record.
///
/// Counts are reconciled again so hand-built records obey the same rules as
/// loaded ones. A reported network cache hit ratio is kept when it is a valid
/// percentage; otherwise it is computed from the counts, and stays undefined
/// when peer and origin requests could not be split. Network latency falls
/// back to the overall average latency.
pub fn derive_metrics(mut record: CanonicalMetricRecord) -> CanonicalMetricRecord {
    let counts = if record.network_only {
        reconcile_request_counts(None, None, record.network_requests)
    } else {
        reconcile_request_counts(
            Some(record.peer_requests),
            Some(record.origin_requests),
            record.network_requests,
        )
    };
    if counts.conflicting {
        log::warn!(
            "{}: networkRequests disagrees with peer + origin requests, using {}",
            record.source_file,
            counts.network
        );
    }
    record.peer_requests = counts.peer;
    record.origin_requests = counts.origin;
    record.network_requests = Some(counts.network);
    record.network_only = counts.network_only;

    record.cache_hit_ratio = valid_ratio(record.cache_hit_ratio, "cacheHitRatio", &record.source_file);
    record.network_cache_hit_ratio = valid_ratio(
        record.network_cache_hit_ratio,
        "networkCacheHitRatio",
        &record.source_file,
    );

    if record.network_cache_hit_ratio.is_none() && !counts.network_only {
        record.network_cache_hit_ratio = network_cache_hit_ratio(counts.peer, counts.network);
    }

    if record.network_avg_latency_ms.is_none() {
        record.network_avg_latency_ms = record.avg_latency_ms;
    }

    record
}

/// Reduction in origin requests achieved by P2P delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginLoadReduction {
    pub baseline_origin_requests: f64,
    pub p2p_origin_requests: f64,
    /// Absolute reduction; negative when P2P hit the origin more often
    pub reduction: f64,
    /// Percentage of the baseline; 0 when the baseline is 0
    pub reduction_pct: f64,
}

pub fn origin_load_reduction(baseline_origin: f64, p2p_origin: f64) -> OriginLoadReduction {
    let reduction = baseline_origin - p2p_origin;
    let reduction_pct = if baseline_origin > 0.0 {
        reduction / baseline_origin * 100.0
    } else {
        0.0
    };

    OriginLoadReduction {
        baseline_origin_requests: baseline_origin,
        p2p_origin_requests: p2p_origin,
        reduction,
        reduction_pct,
    }
}

/// Where the baseline side of a pairing came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSource {
    /// Counters embedded in the same result file
    Embedded,
    /// Mean of standalone baseline-mode runs with the same peer count
    Standalone { runs: usize, same_scenario: bool },
}

/// A P2P run compared with its origin-only baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselinePairing {
    pub scenario: String,
    pub num_peers: u64,
    pub source_file: String,
    pub baseline_source: BaselineSource,
    pub origin: OriginLoadReduction,
    /// Baseline network latency minus P2P network latency
    pub latency_reduction_ms: Option<f64>,
    pub p2p_network_cache_hit_ratio: Option<f64>,
    pub baseline_network_cache_hit_ratio: Option<f64>,
}

/// Pair every P2P record with a baseline.
///
/// Embedded baseline counters win. Otherwise standalone baseline-mode records
/// with the same peer count are used, preferring those of the same scenario.
/// Records with no baseline available, or whose origin requests are unknown,
/// are left out.
pub fn pair_with_baseline(records: &[CanonicalMetricRecord]) -> Vec<BaselinePairing> {
    let mut baselines_by_peers: BTreeMap<u64, Vec<&CanonicalMetricRecord>> = BTreeMap::new();
    for record in records.iter().filter(|r| r.baseline_mode && !r.network_only) {
        baselines_by_peers
            .entry(record.num_peers)
            .or_default()
            .push(record);
    }

    let mut pairings = Vec::new();

    for record in records.iter().filter(|r| !r.baseline_mode) {
        let Some(p2p_origin) = record.measured_origin_requests() else {
            log::debug!("{}: origin requests unknown, not paired", record.source_file);
            continue;
        };
        let p2p_latency = record.network_avg_latency_ms.or(record.avg_latency_ms);

        if let Some(baseline) = record.paired_baseline.as_ref().filter(|b| !b.network_only) {
            let baseline_latency = baseline.network_avg_latency_ms.or(baseline.avg_latency_ms);
            pairings.push(BaselinePairing {
                scenario: record.scenario.clone(),
                num_peers: record.num_peers,
                source_file: record.source_file.clone(),
                baseline_source: BaselineSource::Embedded,
                origin: origin_load_reduction(baseline.origin_requests as f64, p2p_origin as f64),
                latency_reduction_ms: difference(baseline_latency, p2p_latency),
                p2p_network_cache_hit_ratio: record.network_cache_hit_ratio,
                baseline_network_cache_hit_ratio: baseline.network_cache_hit_ratio,
            });
            continue;
        }

        let Some(candidates) = baselines_by_peers.get(&record.num_peers) else {
            continue;
        };

        let same_scenario: Vec<&CanonicalMetricRecord> = candidates
            .iter()
            .copied()
            .filter(|b| b.scenario == record.scenario)
            .collect();
        let (chosen, is_same) = if same_scenario.is_empty() {
            (candidates.clone(), false)
        } else {
            (same_scenario, true)
        };

        let origins: Vec<f64> = chosen.iter().map(|b| b.origin_requests as f64).collect();
        let latencies: Vec<f64> = chosen
            .iter()
            .filter_map(|b| b.network_avg_latency_ms.or(b.avg_latency_ms))
            .collect();
        let ratios: Vec<f64> = chosen
            .iter()
            .filter_map(|b| b.network_cache_hit_ratio)
            .collect();

        pairings.push(BaselinePairing {
            scenario: record.scenario.clone(),
            num_peers: record.num_peers,
            source_file: record.source_file.clone(),
            baseline_source: BaselineSource::Standalone {
                runs: chosen.len(),
                same_scenario: is_same,
            },
            origin: origin_load_reduction(mean(&origins).unwrap_or(0.0), p2p_origin as f64),
            latency_reduction_ms: difference(mean(&latencies), p2p_latency),
            p2p_network_cache_hit_ratio: record.network_cache_hit_ratio,
            baseline_network_cache_hit_ratio: mean(&ratios),
        });
    }

    log::debug!(
        "Paired {} of {} P2P records with a baseline",
        pairings.len(),
        records.iter().filter(|r| !r.baseline_mode).count()
    );

    pairings
}

fn difference(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? - b?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::record;

    #[test]
    fn test_origin_load_reduction() {
        let r = origin_load_reduction(1000.0, 200.0);
        assert_eq!(r.reduction, 800.0);
        assert!((r.reduction_pct - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_origin_load_reduction_zero_baseline_sentinel() {
        let r = origin_load_reduction(0.0, 15.0);
        assert_eq!(r.reduction, -15.0);
        assert_eq!(r.reduction_pct, 0.0);
    }

    fn counts(peer: u64, origin: u64, network: u64) -> (u64, u64, u64, bool) {
        (peer, origin, network, false)
    }

    fn summary(c: RequestCounts) -> (u64, u64, u64, bool) {
        (c.peer, c.origin, c.network, c.network_only)
    }

    #[test]
    fn test_reconcile_request_counts() {
        let r = |p, o, n| summary(reconcile_request_counts(p, o, n));
        assert_eq!(r(Some(650), None, Some(1000)), counts(650, 350, 1000));
        assert_eq!(r(None, Some(300), Some(1000)), counts(700, 300, 1000));
        assert_eq!(r(Some(5), Some(3), None), counts(5, 3, 8));
        assert_eq!(r(None, None, None), counts(0, 0, 0));
    }

    #[test]
    fn test_network_total_alone_stays_unsplit() {
        let c = reconcile_request_counts(None, None, Some(1000));
        assert!(c.network_only);
        assert_eq!(c.network, 1000);

        let mut r = record("scalability", 20);
        r.network_requests = Some(1000);
        r.network_only = true;
        r.network_cache_hit_ratio = None;

        let d = derive_metrics(r);
        assert_eq!(d.network_requests, Some(1000));
        assert_eq!(d.network_cache_hit_ratio, None);
        assert_eq!(d.measured_peer_requests(), None);
        assert_eq!(d.measured_origin_requests(), None);
    }

    #[test]
    fn test_conflicting_network_total_is_replaced_by_sum() {
        let c = reconcile_request_counts(Some(1200), None, Some(1000));
        assert!(c.conflicting);
        assert_eq!(summary(c), counts(1200, 0, 1200));

        let c = reconcile_request_counts(Some(600), Some(600), Some(1000));
        assert!(c.conflicting);
        assert_eq!(c.network, 1200);

        let mut r = record("scalability", 20);
        r.peer_requests = 1200;
        r.network_requests = Some(1000);
        r.network_cache_hit_ratio = None;

        let d = derive_metrics(r);
        assert_eq!(d.network_requests, Some(d.peer_requests + d.origin_requests));
        assert_eq!(d.network_cache_hit_ratio, Some(100.0));
    }

    #[test]
    fn test_huge_counts_saturate() {
        let c = reconcile_request_counts(Some(u64::MAX), Some(1), None);
        assert_eq!(c.network, u64::MAX);

        let mut r = record("scalability", 20);
        r.peer_requests = u64::MAX;
        r.origin_requests = 1;
        assert_eq!(r.network_requests(), u64::MAX);
        let ratio = derive_metrics(r).network_cache_hit_ratio.unwrap();
        assert!((0.0..=100.0).contains(&ratio));
    }

    #[test]
    fn test_out_of_range_reported_ratio_is_dropped() {
        let mut r = record("scalability", 20);
        r.network_cache_hit_ratio = Some(120.0);
        r.cache_hit_ratio = Some(-3.0);
        r.peer_requests = 30;
        r.origin_requests = 10;

        let d = derive_metrics(r);
        assert_eq!(d.cache_hit_ratio, None);
        assert_eq!(d.network_cache_hit_ratio, Some(75.0));
    }

    #[test]
    fn test_unsplit_records_are_not_paired() {
        let mut p2p = record("flash_crowd", 50);
        p2p.network_requests = Some(400);
        p2p.network_only = true;
        p2p.paired_baseline = Some(BaselineCounters {
            origin_requests: 500,
            ..Default::default()
        });
        assert!(pair_with_baseline(&[derive_metrics(p2p)]).is_empty());
    }

    #[test]
    fn test_network_cache_hit_ratio_undefined_without_traffic() {
        assert_eq!(network_cache_hit_ratio(0, 0), None);
        assert_eq!(network_cache_hit_ratio(0, 10), Some(0.0));
        assert_eq!(network_cache_hit_ratio(3, 4), Some(75.0));
    }

    #[test]
    fn test_derive_metrics() {
        let mut r = record("scalability", 20);
        r.peer_requests = 600;
        r.origin_requests = 400;
        r.network_requests = None;
        r.network_cache_hit_ratio = None;
        r.avg_latency_ms = Some(55.0);
        r.network_avg_latency_ms = None;

        let d = derive_metrics(r);
        assert_eq!(d.network_requests, Some(1000));
        assert_eq!(d.network_cache_hit_ratio, Some(60.0));
        assert_eq!(d.network_avg_latency_ms, Some(55.0));
    }

    #[test]
    fn test_pairing_prefers_embedded_then_same_scenario() {
        let mut embedded = record("flash_crowd", 50);
        embedded.origin_requests = 100;
        embedded.paired_baseline = Some(BaselineCounters {
            origin_requests: 500,
            ..Default::default()
        });

        let mut p2p = record("scalability", 20);
        p2p.origin_requests = 200;

        let mut same = record("scalability", 20);
        same.baseline_mode = true;
        same.origin_requests = 1000;

        let mut other = record("high_churn", 20);
        other.baseline_mode = true;
        other.origin_requests = 4000;

        let pairings = pair_with_baseline(&[embedded, p2p, same, other]);
        assert_eq!(pairings.len(), 2);

        assert_eq!(pairings[0].baseline_source, BaselineSource::Embedded);
        assert_eq!(pairings[0].origin.reduction, 400.0);

        assert_eq!(
            pairings[1].baseline_source,
            BaselineSource::Standalone {
                runs: 1,
                same_scenario: true
            }
        );
        assert_eq!(pairings[1].origin.reduction, 800.0);
    }
}
