//! Grouping of canonical records and per-group statistics.
//!
//! Groups live in a `BTreeMap` keyed by the key tuple, so both the grouping
//! and the iteration order are independent of the order records arrive in.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::stats::{mean, sample_std_dev};
use super::types::CanonicalMetricRecord;

/// A component of an aggregation key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyField {
    Scenario,
    Variant,
    NumPeers,
    JoinRate,
    ChurnRate,
    BaselineMode,
}

impl KeyField {
    pub fn name(&self) -> &'static str {
        match self {
            KeyField::Scenario => "scenario",
            KeyField::Variant => "variant",
            KeyField::NumPeers => "numPeers",
            KeyField::JoinRate => "joinRate",
            KeyField::ChurnRate => "churnRate",
            KeyField::BaselineMode => "baselineMode",
        }
    }

    pub fn value(&self, record: &CanonicalMetricRecord) -> KeyValue {
        match self {
            KeyField::Scenario => KeyValue::Text(record.scenario.clone()),
            KeyField::Variant => KeyValue::Text(record.variant.clone()),
            KeyField::NumPeers => KeyValue::Count(record.num_peers),
            KeyField::JoinRate => KeyValue::Rate(record.join_rate),
            KeyField::ChurnRate => KeyValue::Rate(record.churn_rate),
            KeyField::BaselineMode => KeyValue::Flag(record.baseline_mode),
        }
    }
}

/// Grouping key used by the default report: (scenario, numPeers, churnRate, baselineMode)
pub const DEFAULT_GROUP_KEY: [KeyField; 4] = [
    KeyField::Scenario,
    KeyField::NumPeers,
    KeyField::ChurnRate,
    KeyField::BaselineMode,
];

/// Value of one key component.
///
/// Rates are compared with `f64::total_cmp` so they can take part in a total order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Text(String),
    Count(u64),
    Rate(f64),
    Flag(bool),
}

impl KeyValue {
    fn rank(&self) -> u8 {
        match self {
            KeyValue::Text(_) => 0,
            KeyValue::Count(_) => 1,
            KeyValue::Rate(_) => 2,
            KeyValue::Flag(_) => 3,
        }
    }
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyValue {}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyValue::Text(a), KeyValue::Text(b)) => a.cmp(b),
            (KeyValue::Count(a), KeyValue::Count(b)) => a.cmp(b),
            (KeyValue::Rate(a), KeyValue::Rate(b)) => a.total_cmp(b),
            (KeyValue::Flag(a), KeyValue::Flag(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Text(s) => write!(f, "{}", s),
            KeyValue::Count(n) => write!(f, "{}", n),
            KeyValue::Rate(r) => write!(f, "{}", r),
            KeyValue::Flag(b) => write!(f, "{}", b),
        }
    }
}

/// Ordered key tuple identifying a group
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey(pub Vec<(KeyField, KeyValue)>);

impl GroupKey {
    pub fn of(record: &CanonicalMetricRecord, fields: &[KeyField]) -> Self {
        GroupKey(fields.iter().map(|f| (*f, f.value(record))).collect())
    }

    pub fn get(&self, field: KeyField) -> Option<&KeyValue> {
        self.0.iter().find(|(f, _)| *f == field).map(|(_, v)| v)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, value)| format!("{}={}", field.name(), value))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Numeric metrics that can be aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalRequests,
    PeerRequests,
    OriginRequests,
    LocalCacheHits,
    NetworkRequests,
    CacheHitRatio,
    NetworkCacheHitRatio,
    BandwidthSavedPct,
    LatencyImprovementPct,
    AvgLatencyMs,
    NetworkAvgLatencyMs,
    JainFairnessIndex,
    /// Share of network requests served by the origin (%)
    OriginRequestRatio,
    /// Share of network requests served by peers (%), always from counts
    P2pEfficiency,
}

impl Metric {
    pub const ALL: [Metric; 14] = [
        Metric::TotalRequests,
        Metric::PeerRequests,
        Metric::OriginRequests,
        Metric::LocalCacheHits,
        Metric::NetworkRequests,
        Metric::CacheHitRatio,
        Metric::NetworkCacheHitRatio,
        Metric::BandwidthSavedPct,
        Metric::LatencyImprovementPct,
        Metric::AvgLatencyMs,
        Metric::NetworkAvgLatencyMs,
        Metric::JainFairnessIndex,
        Metric::OriginRequestRatio,
        Metric::P2pEfficiency,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::TotalRequests => "totalRequests",
            Metric::PeerRequests => "peerRequests",
            Metric::OriginRequests => "originRequests",
            Metric::LocalCacheHits => "localCacheHits",
            Metric::NetworkRequests => "networkRequests",
            Metric::CacheHitRatio => "cacheHitRatio",
            Metric::NetworkCacheHitRatio => "networkCacheHitRatio",
            Metric::BandwidthSavedPct => "bandwidthSaved",
            Metric::LatencyImprovementPct => "latencyImprovement",
            Metric::AvgLatencyMs => "avgLatency",
            Metric::NetworkAvgLatencyMs => "networkAvgLatency",
            Metric::JainFairnessIndex => "jainFairnessIndex",
            Metric::OriginRequestRatio => "originRequestRatio",
            Metric::P2pEfficiency => "p2pEfficiency",
        }
    }

    /// Value of this metric for one record, `None` when undefined
    pub fn value(&self, r: &CanonicalMetricRecord) -> Option<f64> {
        let network = r.network_requests();
        let share = |part: Option<u64>| {
            if network == 0 {
                None
            } else {
                part.map(|p| p as f64 / network as f64 * 100.0)
            }
        };

        match self {
            Metric::TotalRequests => Some(r.total_requests as f64),
            Metric::PeerRequests => r.measured_peer_requests().map(|n| n as f64),
            Metric::OriginRequests => r.measured_origin_requests().map(|n| n as f64),
            Metric::LocalCacheHits => Some(r.local_cache_hits as f64),
            Metric::NetworkRequests => Some(network as f64),
            Metric::CacheHitRatio => r.cache_hit_ratio,
            Metric::NetworkCacheHitRatio => r.network_cache_hit_ratio,
            Metric::BandwidthSavedPct => r.bandwidth_saved_pct,
            Metric::LatencyImprovementPct => r.latency_improvement_pct,
            Metric::AvgLatencyMs => r.avg_latency_ms,
            Metric::NetworkAvgLatencyMs => r.network_avg_latency_ms,
            Metric::JainFairnessIndex => r.jain_fairness_index,
            Metric::OriginRequestRatio => share(r.measured_origin_requests()),
            Metric::P2pEfficiency => share(r.measured_peer_requests()),
        }
    }
}

/// Sample statistics of one metric within one group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    /// Records that had a defined value for the metric
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; 0 when `count <= 1`
    pub stddev: f64,
}

impl AggregateStats {
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        Some(AggregateStats {
            count: samples.len(),
            mean: mean(samples)?,
            stddev: sample_std_dev(samples),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub key: GroupKey,
    /// Records in the group, including those with undefined metrics
    pub records: usize,
    /// Metrics with no defined value in the group are absent
    pub metrics: BTreeMap<Metric, AggregateStats>,
}

impl GroupStats {
    pub fn mean(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(&metric).map(|s| s.mean)
    }
}

/// Group records by `fields` and compute statistics for every metric
pub fn aggregate<'a, I>(records: I, fields: &[KeyField]) -> BTreeMap<GroupKey, GroupStats>
where
    I: IntoIterator<Item = &'a CanonicalMetricRecord>,
{
    let mut grouped: BTreeMap<GroupKey, Vec<&CanonicalMetricRecord>> = BTreeMap::new();
    for record in records {
        grouped
            .entry(GroupKey::of(record, fields))
            .or_default()
            .push(record);
    }

    grouped
        .into_iter()
        .map(|(key, members)| {
            let metrics = Metric::ALL
                .iter()
                .filter_map(|metric| {
                    let samples: Vec<f64> =
                        members.iter().filter_map(|r| metric.value(r)).collect();
                    AggregateStats::from_samples(&samples).map(|s| (*metric, s))
                })
                .collect();

            let stats = GroupStats {
                key: key.clone(),
                records: members.len(),
                metrics,
            };
            (key, stats)
        })
        .collect()
}

/// Rows = one key component, columns = another, cell = mean of a metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotTable {
    pub metric: Metric,
    pub row_field: KeyField,
    pub column_field: KeyField,
    pub rows: Vec<KeyValue>,
    pub columns: Vec<KeyValue>,
    /// `cells[row][column]`, `None` where no record defines the metric
    pub cells: Vec<Vec<Option<f64>>>,
}

impl PivotTable {
    pub fn cell(&self, row: &KeyValue, column: &KeyValue) -> Option<f64> {
        let r = self.rows.iter().position(|v| v == row)?;
        let c = self.columns.iter().position(|v| v == column)?;
        self.cells[r][c]
    }
}

pub fn pivot<'a, I>(records: I, row_field: KeyField, column_field: KeyField, metric: Metric) -> PivotTable
where
    I: IntoIterator<Item = &'a CanonicalMetricRecord>,
{
    let records: Vec<&CanonicalMetricRecord> = records.into_iter().collect();
    let rows: BTreeSet<KeyValue> = records.iter().map(|r| row_field.value(r)).collect();
    let columns: BTreeSet<KeyValue> = records.iter().map(|r| column_field.value(r)).collect();
    let groups = aggregate(records.iter().copied(), &[row_field, column_field]);

    let cells = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| {
                    let key = GroupKey(vec![(row_field, row.clone()), (column_field, column.clone())]);
                    groups.get(&key).and_then(|g| g.mean(metric))
                })
                .collect()
        })
        .collect();

    PivotTable {
        metric,
        row_field,
        column_field,
        rows: rows.into_iter().collect(),
        columns: columns.into_iter().collect(),
        cells,
    }
}

/// Jain fairness by scenario and peer count.
///
/// Baseline-mode records are excluded: without peer sharing there is no
/// fairness to measure and their index is a 0 sentinel.
pub fn fairness_pivot(records: &[CanonicalMetricRecord]) -> PivotTable {
    pivot(
        records.iter().filter(|r| !r.baseline_mode),
        KeyField::Scenario,
        KeyField::NumPeers,
        Metric::JainFairnessIndex,
    )
}
