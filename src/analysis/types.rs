//! Core data types for result normalization and comparative analysis.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::aggregation::GroupStats;
use super::derive::BaselinePairing;
use super::insights::InsightSet;
use super::profile::{ConfigurationFamily, RecordProfile};
use super::tables::Table;

/// Event timestamp in milliseconds since epoch, as written by the simulator
pub type EpochMs = f64;

/// A peer joining the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinEvent {
    pub timestamp: EpochMs,
    pub peer_id: String,
}

/// A content transfer between two nodes (or from the origin)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub timestamp: EpochMs,
    pub source: String,
    pub target: String,
    pub success: bool,
    pub latency_ms: Option<f64>,
    pub chunk_index: Option<u64>,
}

impl TransferEvent {
    /// An empty source or any source naming the origin counts as an origin fetch
    pub fn is_from_origin(&self) -> bool {
        self.source.is_empty() || self.source.to_lowercase().contains("origin")
    }
}

/// One sample of the latency time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub time_sec: f64,
    pub avg_latency_ms: f64,
}

/// Latency percentiles as reported by the simulator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyPercentiles {
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Origin-only counters recorded next to a P2P run (dashboard shape only)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineCounters {
    pub total_requests: u64,
    pub peer_requests: u64,
    pub origin_requests: u64,
    pub local_cache_hits: u64,
    pub network_requests: u64,
    /// Only the network total was reported; peer/origin are unknown
    pub network_only: bool,
    pub join_events: Vec<JoinEvent>,
    pub network_cache_hit_ratio: Option<f64>,
    pub avg_latency_ms: Option<f64>,
    pub network_avg_latency_ms: Option<f64>,
}

/// The normalized unit of analysis.
///
/// Ratios and latencies are `None` when the source did not measure them.
/// `network_requests` is `None` only on records built by hand before
/// [`derive_metrics`] has run. When `network_only` is set the peer/origin
/// split was never reported and `peer_requests`/`origin_requests` are 0
/// placeholders; read them through the `measured_*` accessors.
///
/// [`derive_metrics`]: super::derive::derive_metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMetricRecord {
    pub scenario: String,
    pub variant: String,
    pub source_file: String,

    pub num_peers: u64,
    pub duration_sec: f64,
    pub join_rate: f64,
    pub churn_rate: f64,
    pub baseline_mode: bool,

    pub total_requests: u64,
    pub peer_requests: u64,
    pub origin_requests: u64,
    pub local_cache_hits: u64,
    pub network_requests: Option<u64>,
    pub network_only: bool,

    pub cache_hit_ratio: Option<f64>,
    pub network_cache_hit_ratio: Option<f64>,
    pub bandwidth_saved_pct: Option<f64>,
    pub latency_improvement_pct: Option<f64>,

    pub avg_latency_ms: Option<f64>,
    pub network_avg_latency_ms: Option<f64>,
    pub jain_fairness_index: Option<f64>,
    pub latency_percentiles: Option<LatencyPercentiles>,

    pub time_series: Vec<TimeSeriesPoint>,
    pub join_events: Vec<JoinEvent>,
    pub transfer_events: Vec<TransferEvent>,
    /// Anchor node -> connection count
    pub anchor_loads: Option<BTreeMap<String, u64>>,
    pub paired_baseline: Option<BaselineCounters>,
}

impl CanonicalMetricRecord {
    /// Network requests, derived from peer + origin when the source omitted them
    pub fn network_requests(&self) -> u64 {
        self.network_requests
            .unwrap_or(self.peer_requests.saturating_add(self.origin_requests))
    }

    /// Peer requests, `None` when only the network total is known
    pub fn measured_peer_requests(&self) -> Option<u64> {
        (!self.network_only).then_some(self.peer_requests)
    }

    /// Origin requests, `None` when only the network total is known
    pub fn measured_origin_requests(&self) -> Option<u64> {
        (!self.network_only).then_some(self.origin_requests)
    }

    /// Human-readable configuration label used in insights and tables
    pub fn config_label(&self) -> String {
        format!("{} peers", self.num_peers)
    }
}

/// Outcome of a sub-analysis that may lack the input it needs.
///
/// Consumers must branch on `InsufficientData` instead of treating it as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measured<T> {
    Value(T),
    InsufficientData { reason: String },
}

impl<T> Measured<T> {
    pub fn insufficient(reason: impl Into<String>) -> Self {
        Measured::InsufficientData {
            reason: reason.into(),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Measured::Value(v) => Some(v),
            Measured::InsufficientData { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Measured::Value(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Measured<U> {
        match self {
            Measured::Value(v) => Measured::Value(f(v)),
            Measured::InsufficientData { reason } => Measured::InsufficientData { reason },
        }
    }

    pub fn as_ref(&self) -> Measured<&T> {
        match self {
            Measured::Value(v) => Measured::Value(v),
            Measured::InsufficientData { reason } => Measured::InsufficientData {
                reason: reason.clone(),
            },
        }
    }
}

/// Conditions surfaced to the caller instead of producing empty output
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("no usable result records found in {source_desc}")]
    NoRecords { source_desc: String },
    #[error("group '{group}' has no records")]
    EmptyGroup { group: String },
}

/// File loading statistics carried into the report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadSummary {
    pub files_discovered: usize,
    pub files_loaded: usize,
    pub files_skipped: usize,
    /// First few skip reasons
    pub skip_reasons: Vec<String>,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub analysis_timestamp: String,
    pub results_source: String,
    pub total_records: usize,
    pub scenarios: Vec<String>,
    pub reference_peers: u64,
    pub load: LoadSummary,
}

/// Insight evaluation for one configuration family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyAnalysis {
    pub family: ConfigurationFamily,
    pub insights: Measured<InsightSet>,
}

/// Complete analysis report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: AnalysisMetadata,
    /// Stats keyed by (scenario, numPeers, churnRate, baselineMode)
    pub groups: Vec<GroupStats>,
    pub pairings: Vec<BaselinePairing>,
    pub record_profiles: Vec<RecordProfile>,
    pub families: Vec<FamilyAnalysis>,
    pub tables: Vec<Table>,
    /// Named groups that were required by a table but had no records
    pub empty_groups: Vec<String>,
}
