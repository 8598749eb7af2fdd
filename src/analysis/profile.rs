//! Per-record analysis profiles and configuration families.
//!
//! A configuration family is a set of runs sharing scenario, churn rate and
//! baseline mode, differing only in peer count. Insights compare the
//! configurations of one family against its reference peer count.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::aggregation::{GroupKey, KeyField, KeyValue};
use super::propagation::{analyze_join_pattern, analyze_propagation, JoinPattern, PropagationTimeline};
use super::stats::mean;
use super::topology::{analyze_anchor_load, analyze_topology, AnchorLoad, TopologySnapshot};
use super::transfers::{analyze_requests, analyze_transfers, RequestEfficiency, TransferStats};
use super::types::*;

/// Every per-record sub-analysis of one result file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordProfile {
    pub source_file: String,
    pub scenario: String,
    pub num_peers: u64,
    pub churn_rate: f64,
    pub baseline_mode: bool,
    pub network_cache_hit_ratio: Option<f64>,
    pub network_avg_latency_ms: Option<f64>,
    pub latency_percentiles: Option<LatencyPercentiles>,
    pub requests: RequestEfficiency,
    pub transfers: Measured<TransferStats>,
    pub topology: Measured<TopologySnapshot>,
    pub anchor_load: Measured<AnchorLoad>,
    pub propagation: Measured<PropagationTimeline>,
    pub join_pattern: Measured<JoinPattern>,
}

pub fn profile_record(record: &CanonicalMetricRecord) -> RecordProfile {
    RecordProfile {
        source_file: record.source_file.clone(),
        scenario: record.scenario.clone(),
        num_peers: record.num_peers,
        churn_rate: record.churn_rate,
        baseline_mode: record.baseline_mode,
        network_cache_hit_ratio: record.network_cache_hit_ratio,
        network_avg_latency_ms: record.network_avg_latency_ms,
        latency_percentiles: record.latency_percentiles.clone(),
        requests: analyze_requests(record),
        transfers: analyze_transfers(record),
        topology: analyze_topology(record),
        anchor_load: analyze_anchor_load(record),
        propagation: analyze_propagation(record),
        join_pattern: analyze_join_pattern(record),
    }
}

/// Metrics of one peer count within a family, averaged over its runs.
///
/// A metric is `None` when no run of the configuration could measure it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationProfile {
    pub num_peers: u64,
    pub label: String,
    pub runs: usize,
    pub network_cache_hit_ratio: Option<f64>,
    pub max_anchor_load: Option<f64>,
    pub network_avg_latency_ms: Option<f64>,
    pub p2p_efficiency_pct: Option<f64>,
    pub transfer_success_rate_pct: Option<f64>,
    pub connection_density: Option<f64>,
    pub propagation_rate_peers_per_sec: Option<f64>,
    pub p2p_ratio: Option<f64>,
}

impl ConfigurationProfile {
    pub fn from_runs(num_peers: u64, runs: &[&RecordProfile]) -> Self {
        let avg = |f: &dyn Fn(&RecordProfile) -> Option<f64>| {
            let values: Vec<f64> = runs.iter().filter_map(|p| f(*p)).collect();
            mean(&values)
        };

        ConfigurationProfile {
            num_peers,
            label: format!("{} peers", num_peers),
            runs: runs.len(),
            network_cache_hit_ratio: avg(&|p| p.network_cache_hit_ratio),
            max_anchor_load: avg(&|p| p.anchor_load.value().map(|a| a.max_load as f64)),
            network_avg_latency_ms: avg(&|p| p.network_avg_latency_ms),
            p2p_efficiency_pct: avg(&|p| p.requests.p2p_efficiency_pct),
            transfer_success_rate_pct: avg(&|p| p.transfers.value().map(|t| t.success_rate_pct)),
            connection_density: avg(&|p| p.topology.value().map(|t| t.connection_density)),
            propagation_rate_peers_per_sec: avg(&|p| {
                p.propagation.value().map(|t| t.propagation_rate_peers_per_sec)
            }),
            p2p_ratio: avg(&|p| p.requests.p2p_ratio),
        }
    }
}

/// Configurations sharing every key except the peer count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationFamily {
    pub key: GroupKey,
    pub label: String,
    /// Sorted by peer count
    pub configurations: Vec<ConfigurationProfile>,
}

impl ConfigurationFamily {
    pub fn configuration(&self, num_peers: u64) -> Option<&ConfigurationProfile> {
        self.configurations.iter().find(|c| c.num_peers == num_peers)
    }
}

fn family_key(profile: &RecordProfile) -> GroupKey {
    GroupKey(vec![
        (KeyField::Scenario, KeyValue::Text(profile.scenario.clone())),
        (KeyField::ChurnRate, KeyValue::Rate(profile.churn_rate)),
        (KeyField::BaselineMode, KeyValue::Flag(profile.baseline_mode)),
    ])
}

/// Group profiles into families and average runs per peer count
pub fn build_families(profiles: &[RecordProfile]) -> Vec<ConfigurationFamily> {
    let mut grouped: BTreeMap<GroupKey, BTreeMap<u64, Vec<&RecordProfile>>> = BTreeMap::new();
    for profile in profiles {
        grouped
            .entry(family_key(profile))
            .or_default()
            .entry(profile.num_peers)
            .or_default()
            .push(profile);
    }

    grouped
        .into_iter()
        .map(|(key, by_peers)| {
            let label = format!(
                "{} (churn {}{})",
                key.get(KeyField::Scenario).map(|v| v.to_string()).unwrap_or_default(),
                key.get(KeyField::ChurnRate).map(|v| v.to_string()).unwrap_or_default(),
                if matches!(key.get(KeyField::BaselineMode), Some(KeyValue::Flag(true))) {
                    ", baseline"
                } else {
                    ""
                }
            );
            let configurations = by_peers
                .iter()
                .map(|(peers, runs)| ConfigurationProfile::from_runs(*peers, runs))
                .collect();
            ConfigurationFamily {
                key,
                label,
                configurations,
            }
        })
        .collect()
}
