//! Transfer reliability and request efficiency.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::stats::{mean, median};
use super::types::*;

/// Outcome breakdown of one record's transfer events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferStats {
    pub total_transfers: usize,
    pub successful_transfers: usize,
    pub failed_transfers: usize,
    /// Successful share of all transfers (%)
    pub success_rate_pct: f64,
    /// Source node -> successful transfers it served
    pub source_distribution: BTreeMap<String, usize>,
    pub avg_transfer_latency_ms: Option<f64>,
    pub median_transfer_latency_ms: Option<f64>,
    /// Transfers that carried a chunk index
    pub chunk_transfers: usize,
}

pub fn analyze_transfers(record: &CanonicalMetricRecord) -> Measured<TransferStats> {
    let events = &record.transfer_events;
    if events.is_empty() {
        return Measured::insufficient("no transfer events");
    }

    let successful: Vec<&TransferEvent> = events.iter().filter(|e| e.success).collect();

    let mut source_distribution: BTreeMap<String, usize> = BTreeMap::new();
    for event in &successful {
        let source = if event.source.is_empty() {
            "unknown"
        } else {
            event.source.as_str()
        };
        *source_distribution.entry(source.to_string()).or_insert(0) += 1;
    }

    let latencies: Vec<f64> = successful.iter().filter_map(|e| e.latency_ms).collect();

    Measured::Value(TransferStats {
        total_transfers: events.len(),
        successful_transfers: successful.len(),
        failed_transfers: events.len() - successful.len(),
        success_rate_pct: successful.len() as f64 / events.len() as f64 * 100.0,
        source_distribution,
        avg_transfer_latency_ms: mean(&latencies),
        median_transfer_latency_ms: median(&latencies),
        chunk_transfers: events.iter().filter(|e| e.chunk_index.is_some()).count(),
    })
}

/// How much of the network traffic peers absorbed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEfficiency {
    pub network_requests: u64,
    /// 100 * peer / network
    pub p2p_efficiency_pct: Option<f64>,
    /// peer / network, as a fraction
    pub p2p_ratio: Option<f64>,
    /// Successful transfers per network request
    pub transfer_to_request_ratio: Option<f64>,
    pub network_cache_hit_ratio: Option<f64>,
}

/// Request efficiency of one record; ratios are undefined without network traffic
pub fn analyze_requests(record: &CanonicalMetricRecord) -> RequestEfficiency {
    let network = record.network_requests();
    let ratio = |n: f64| {
        if network == 0 {
            None
        } else {
            Some(n / network as f64)
        }
    };

    let successful = record.transfer_events.iter().filter(|e| e.success).count();
    let p2p_ratio = record.measured_peer_requests().and_then(|p| ratio(p as f64));

    RequestEfficiency {
        network_requests: network,
        p2p_efficiency_pct: p2p_ratio.map(|r| r * 100.0),
        p2p_ratio,
        transfer_to_request_ratio: ratio(successful as f64),
        network_cache_hit_ratio: record.network_cache_hit_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::{record, transfer};

    #[test]
    fn test_transfer_stats() {
        let mut r = record("scalability", 20);
        let mut first = transfer(1.0, "origin", "a", true);
        first.latency_ms = Some(40.0);
        first.chunk_index = Some(0);
        let mut second = transfer(2.0, "a", "b", true);
        second.latency_ms = Some(20.0);
        r.transfer_events = vec![first, second, transfer(3.0, "b", "c", false), transfer(4.0, "", "d", true)];

        let stats = analyze_transfers(&r).value().cloned().unwrap();
        assert_eq!(stats.total_transfers, 4);
        assert_eq!(stats.failed_transfers, 1);
        assert_eq!(stats.success_rate_pct, 75.0);
        assert_eq!(stats.avg_transfer_latency_ms, Some(30.0));
        assert_eq!(stats.chunk_transfers, 1);
        assert_eq!(stats.source_distribution["unknown"], 1);
        assert_eq!(stats.source_distribution["origin"], 1);
    }

    #[test]
    fn test_transfer_stats_need_events() {
        assert!(!analyze_transfers(&record("s", 20)).is_available());
    }

    #[test]
    fn test_request_efficiency() {
        let mut r = record("scalability", 20);
        r.peer_requests = 300;
        r.origin_requests = 100;
        r.network_requests = Some(400);
        r.transfer_events = vec![transfer(1.0, "a", "b", true), transfer(2.0, "a", "c", true)];

        let eff = analyze_requests(&r);
        assert_eq!(eff.p2p_efficiency_pct, Some(75.0));
        assert_eq!(eff.p2p_ratio, Some(0.75));
        assert_eq!(eff.transfer_to_request_ratio, Some(0.005));
    }

    #[test]
    fn test_request_efficiency_undefined_without_traffic() {
        let eff = analyze_requests(&record("s", 20));
        assert_eq!(eff.network_requests, 0);
        assert_eq!(eff.p2p_efficiency_pct, None);
        assert_eq!(eff.transfer_to_request_ratio, None);
    }

    #[test]
    fn test_p2p_efficiency_undefined_for_network_total_only() {
        let mut r = record("s", 20);
        r.network_requests = Some(1000);
        r.network_only = true;

        let eff = analyze_requests(&r);
        assert_eq!(eff.network_requests, 1000);
        assert_eq!(eff.p2p_efficiency_pct, None);
        assert_eq!(eff.p2p_ratio, None);
    }
}
