//! Record and event builders shared by unit tests.

use super::types::*;

/// A P2P record with all counters at zero and nothing measured
pub fn record(scenario: &str, num_peers: u64) -> CanonicalMetricRecord {
    CanonicalMetricRecord {
        scenario: scenario.to_string(),
        variant: "default".to_string(),
        source_file: format!("{}-{}-peers.json", scenario, num_peers),
        num_peers,
        duration_sec: 60.0,
        join_rate: 0.0,
        churn_rate: 0.0,
        baseline_mode: false,
        total_requests: 0,
        peer_requests: 0,
        origin_requests: 0,
        local_cache_hits: 0,
        network_requests: None,
        network_only: false,
        cache_hit_ratio: None,
        network_cache_hit_ratio: None,
        bandwidth_saved_pct: None,
        latency_improvement_pct: None,
        avg_latency_ms: None,
        network_avg_latency_ms: None,
        jain_fairness_index: None,
        latency_percentiles: None,
        time_series: Vec::new(),
        join_events: Vec::new(),
        transfer_events: Vec::new(),
        anchor_loads: None,
        paired_baseline: None,
    }
}

pub fn join(timestamp: f64, peer_id: &str) -> JoinEvent {
    JoinEvent {
        timestamp,
        peer_id: peer_id.to_string(),
    }
}

pub fn transfer(timestamp: f64, source: &str, target: &str, success: bool) -> TransferEvent {
    TransferEvent {
        timestamp,
        source: source.to_string(),
        target: target.to_string(),
        success,
        latency_ms: None,
        chunk_index: None,
    }
}
