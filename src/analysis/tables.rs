//! Canonical tabular outputs.
//!
//! Each table is an ordered list of rows over named columns. Rendering
//! (CSV here, typesetting elsewhere) only formats cells; every number in a
//! table is computed by this module from canonical records.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ScenarioNames;

use super::aggregation::{aggregate, fairness_pivot, KeyField, KeyValue, Metric};
use super::derive::BaselinePairing;
use super::profile::{ConfigurationFamily, ConfigurationProfile};
use super::propagation::is_flash_crowd_run;
use super::types::{AnalysisError, CanonicalMetricRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Integer(i64),
    Number { value: f64, precision: usize },
    /// Undefined value, rendered empty
    Missing,
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    pub fn number(value: Option<f64>, precision: usize) -> Self {
        match value {
            Some(value) if value.is_finite() => Cell::Number { value, precision },
            _ => Cell::Missing,
        }
    }

    pub fn integer(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Cell::Integer(v.round() as i64),
            _ => Cell::Missing,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Integer(i) => Some(*i as f64),
            Cell::Number { value, .. } => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Number { value, precision } => write!(f, "{:.*}", precision, value),
            Cell::Missing => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// File-name friendly identifier
    pub name: String,
    pub caption: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    fn new(name: impl Into<String>, caption: impl Into<String>, columns: &[&str]) -> Self {
        Table {
            name: name.into(),
            caption: caption.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Cell at `row` in the named column
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx)
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        let header: Vec<String> = self.columns.iter().map(|c| csv_escape(c)).collect();
        out.push_str(&header.join(","));
        out.push('\n');
        for row in &self.rows {
            let fields: Vec<String> = row.iter().map(|c| csv_escape(&c.to_string())).collect();
            out.push_str(&fields.join(","));
            out.push('\n');
        }
        out
    }
}

/// Quote a CSV field if it contains a delimiter, quote or newline
fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// "high_churn" -> "High Churn"
fn title_case(s: &str) -> String {
    s.split(['_', '-'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn by_source(a: &&CanonicalMetricRecord, b: &&CanonicalMetricRecord) -> std::cmp::Ordering {
    a.num_peers
        .cmp(&b.num_peers)
        .then_with(|| a.source_file.cmp(&b.source_file))
}

/// Means per (scenario, numPeers, joinRate, churnRate, baselineMode).
///
/// Baseline rows report a Jain index of 0, as in the baseline comparison.
pub fn summary_table(records: &[CanonicalMetricRecord]) -> Table {
    let mut table = Table::new(
        "summary_table",
        "Summary of All Experiment Scenarios",
        &[
            "Scenario",
            "Num Peers",
            "Join Rate",
            "Churn Rate",
            "Baseline",
            "Network Avg Latency (ms)",
            "Network Cache Hit Ratio (%)",
            "Network Requests",
            "Origin Requests",
            "Jain's Index",
            "Total Requests",
        ],
    );

    let groups = aggregate(
        records,
        &[
            KeyField::Scenario,
            KeyField::NumPeers,
            KeyField::JoinRate,
            KeyField::ChurnRate,
            KeyField::BaselineMode,
        ],
    );

    for (key, stats) in &groups {
        let join_rate = match key.get(KeyField::JoinRate) {
            Some(KeyValue::Rate(r)) if *r > 0.0 => format!("{:.1}", r),
            _ => "N/A".to_string(),
        };
        let churn_rate = match key.get(KeyField::ChurnRate) {
            Some(KeyValue::Rate(r)) if *r > 0.0 => format!("{:.3}", r),
            _ => "0".to_string(),
        };
        let baseline = matches!(key.get(KeyField::BaselineMode), Some(KeyValue::Flag(true)));

        table.rows.push(vec![
            Cell::text(title_case(
                &key.get(KeyField::Scenario).map(|v| v.to_string()).unwrap_or_default(),
            )),
            Cell::text(key.get(KeyField::NumPeers).map(|v| v.to_string()).unwrap_or_default()),
            Cell::Text(join_rate),
            Cell::Text(churn_rate),
            Cell::text(if baseline { "Yes" } else { "No" }),
            Cell::number(stats.mean(Metric::NetworkAvgLatencyMs), 1),
            Cell::number(stats.mean(Metric::NetworkCacheHitRatio), 2),
            Cell::integer(stats.mean(Metric::NetworkRequests)),
            Cell::integer(stats.mean(Metric::OriginRequests)),
            if baseline {
                Cell::Number { value: 0.0, precision: 3 }
            } else {
                Cell::number(stats.mean(Metric::JainFairnessIndex), 3)
            },
            Cell::integer(stats.mean(Metric::TotalRequests)),
        ]);
    }

    table
}

/// Jain fairness pivot, scenario by peer count, baseline runs excluded
pub fn fairness_table(records: &[CanonicalMetricRecord]) -> Table {
    let pivot = fairness_pivot(records);

    let mut columns = vec!["Scenario".to_string()];
    columns.extend(pivot.columns.iter().map(|c| c.to_string()));

    let rows = pivot
        .rows
        .iter()
        .zip(&pivot.cells)
        .map(|(scenario, cells)| {
            let mut row = vec![Cell::Text(scenario.to_string())];
            row.extend(cells.iter().map(|c| Cell::number(*c, 3)));
            row
        })
        .collect();

    Table {
        name: "jains_fairness_table".to_string(),
        caption: "Jain's Fairness Index by Scenario and Network Size".to_string(),
        columns,
        rows,
    }
}

fn high_churn_records<'a>(
    records: &'a [CanonicalMetricRecord],
    scenarios: &ScenarioNames,
) -> Result<Vec<&'a CanonicalMetricRecord>, AnalysisError> {
    let high_churn: Vec<&CanonicalMetricRecord> = records
        .iter()
        .filter(|r| r.scenario == scenarios.high_churn && !r.baseline_mode)
        .collect();
    if high_churn.is_empty() {
        return Err(AnalysisError::EmptyGroup {
            group: scenarios.high_churn.clone(),
        });
    }
    Ok(high_churn)
}

/// Every baseline run next to every high-churn run.
///
/// Baseline rows report a Jain index of 0: without peer sharing there is no
/// fairness to measure.
pub fn baseline_vs_high_churn_table(
    records: &[CanonicalMetricRecord],
    scenarios: &ScenarioNames,
) -> Result<Table, AnalysisError> {
    let mut high_churn = high_churn_records(records, scenarios)?;
    high_churn.sort_by(|a, b| {
        a.churn_rate
            .total_cmp(&b.churn_rate)
            .then_with(|| by_source(a, b))
    });

    let mut baseline: Vec<&CanonicalMetricRecord> =
        records.iter().filter(|r| r.baseline_mode).collect();
    baseline.sort_by(by_source);

    let mut table = Table::new(
        "baseline_vs_high_churn",
        "Baseline vs High Churn",
        &[
            "Scenario",
            "Churn Rate",
            "Num Peers",
            "Network Requests",
            "Network Avg Latency (ms)",
            "Network Cache Hit Ratio (%)",
            "Origin Requests",
            "Jain's Index",
        ],
    );

    for r in baseline {
        table.rows.push(vec![
            Cell::text("Baseline"),
            Cell::Number { value: 0.0, precision: 3 },
            Cell::Integer(r.num_peers as i64),
            Cell::Integer(r.network_requests() as i64),
            Cell::number(r.network_avg_latency_ms, 1),
            Cell::number(r.network_cache_hit_ratio, 2),
            Cell::integer(r.measured_origin_requests().map(|n| n as f64)),
            Cell::Number { value: 0.0, precision: 3 },
        ]);
    }

    for r in high_churn {
        table.rows.push(vec![
            Cell::text("High Churn"),
            Cell::Number { value: r.churn_rate, precision: 3 },
            Cell::Integer(r.num_peers as i64),
            Cell::Integer(r.network_requests() as i64),
            Cell::number(r.network_avg_latency_ms, 1),
            Cell::number(r.network_cache_hit_ratio.or(r.bandwidth_saved_pct), 2),
            Cell::integer(r.measured_origin_requests().map(|n| n as f64)),
            Cell::number(r.jain_fairness_index, 3),
        ]);
    }

    Ok(table)
}

/// Origin request ratio and latency per churn rate, against the averaged baseline.
///
/// Churn does not affect origin-only delivery, so all baseline runs are
/// pooled into a single row.
pub fn churn_rate_table(
    records: &[CanonicalMetricRecord],
    scenarios: &ScenarioNames,
) -> Result<Table, AnalysisError> {
    let high_churn = high_churn_records(records, scenarios)?;

    let mut table = Table::new(
        "churn_rate_comparison",
        "Origin Request Ratio and Latency: Baseline vs High Churn",
        &[
            "Configuration",
            "Churn Rate",
            "Origin Request Ratio (%)",
            "Network Avg Latency (ms)",
        ],
    );

    let baseline = aggregate(records.iter().filter(|r| r.baseline_mode), &[]);
    let baseline_stats = baseline.values().next();
    table.rows.push(vec![
        Cell::text("Baseline"),
        Cell::Missing,
        Cell::number(baseline_stats.and_then(|s| s.mean(Metric::OriginRequestRatio)), 2),
        Cell::number(baseline_stats.and_then(|s| s.mean(Metric::NetworkAvgLatencyMs)), 1),
    ]);

    for (key, stats) in aggregate(high_churn, &[KeyField::ChurnRate]) {
        let rate = match key.get(KeyField::ChurnRate) {
            Some(KeyValue::Rate(r)) => Some(*r),
            _ => None,
        };
        table.rows.push(vec![
            Cell::text("High Churn"),
            Cell::number(rate, 3),
            Cell::number(stats.mean(Metric::OriginRequestRatio), 2),
            Cell::number(stats.mean(Metric::NetworkAvgLatencyMs), 1),
        ]);
    }

    Ok(table)
}

fn scalability_records<'a>(
    records: &'a [CanonicalMetricRecord],
    scenarios: &ScenarioNames,
) -> Result<Vec<&'a CanonicalMetricRecord>, AnalysisError> {
    let selected: Vec<&CanonicalMetricRecord> = records
        .iter()
        .filter(|r| r.scenario == scenarios.scalability && !r.baseline_mode)
        .collect();
    if selected.is_empty() {
        return Err(AnalysisError::EmptyGroup {
            group: scenarios.scalability.clone(),
        });
    }
    Ok(selected)
}

/// Scalability metrics by network size, sorted by peer count
pub fn scalability_table(
    records: &[CanonicalMetricRecord],
    scenarios: &ScenarioNames,
) -> Result<Table, AnalysisError> {
    let selected = scalability_records(records, scenarios)?;

    let mut table = Table::new(
        "scalability_metrics_table",
        "Scalability Metrics by Network Size",
        &[
            "Number of Peers",
            "Cache Hit Ratio (%)",
            "Jain's Index",
            "Avg Latency (ms)",
        ],
    );

    for (key, stats) in aggregate(selected, &[KeyField::NumPeers]) {
        table.rows.push(vec![
            Cell::text(key.get(KeyField::NumPeers).map(|v| v.to_string()).unwrap_or_default()),
            Cell::number(stats.mean(Metric::NetworkCacheHitRatio), 1),
            Cell::number(stats.mean(Metric::JainFairnessIndex), 3),
            Cell::number(stats.mean(Metric::AvgLatencyMs), 1),
        ]);
    }

    Ok(table)
}

/// Latency time series of the first scalability run per peer count, in long form
pub fn latency_over_time_table(
    records: &[CanonicalMetricRecord],
    scenarios: &ScenarioNames,
) -> Result<Table, AnalysisError> {
    let mut selected = scalability_records(records, scenarios)?;
    selected.sort_by(by_source);

    let mut first_per_size: BTreeMap<u64, &CanonicalMetricRecord> = BTreeMap::new();
    for r in selected {
        first_per_size.entry(r.num_peers).or_insert(r);
    }

    let mut table = Table::new(
        "scalability_latency_over_time",
        "Latency Over Time by Network Size",
        &["Num Peers", "Time (s)", "Avg Latency (ms)"],
    );

    for (peers, r) in first_per_size {
        if r.time_series.is_empty() {
            log::debug!("{}: no time series data", r.source_file);
        }
        for point in &r.time_series {
            table.rows.push(vec![
                Cell::Integer(peers as i64),
                Cell::Number { value: point.time_sec, precision: 1 },
                Cell::Number { value: point.avg_latency_ms, precision: 2 },
            ]);
        }
    }

    Ok(table)
}

/// P2P against baseline for every flash-crowd run, sorted by peer count
pub fn flash_crowd_summary_table(
    records: &[CanonicalMetricRecord],
    pairings: &[BaselinePairing],
    scenarios: &ScenarioNames,
) -> Result<Table, AnalysisError> {
    let mut flash: Vec<&CanonicalMetricRecord> = records
        .iter()
        .filter(|r| r.scenario == scenarios.flash_crowd && !r.baseline_mode)
        .collect();
    if flash.is_empty() {
        return Err(AnalysisError::EmptyGroup {
            group: scenarios.flash_crowd.clone(),
        });
    }
    flash.sort_by(by_source);

    let mut table = Table::new(
        "flash_crowd_summary_table",
        "Flash Crowd Performance: P2P vs Baseline",
        &[
            "Num Peers",
            "Join Rate (peers/s)",
            "Duration (s)",
            "P2P Network Avg Latency (ms)",
            "P2P Cache Hit Ratio (%)",
            "P2P Bandwidth Saved (%)",
            "P2P Latency Improvement (%)",
            "P2P Jain's Index",
            "P2P Origin Requests",
            "Baseline Network Avg Latency (ms)",
            "Baseline Cache Hit Ratio (%)",
            "Baseline Origin Requests",
            "Latency Reduction (ms)",
            "Origin Load Reduction",
            "Origin Load Reduction (%)",
        ],
    );

    for r in flash {
        let pairing = pairings.iter().find(|p| p.source_file == r.source_file);
        let baseline_latency = r
            .paired_baseline
            .as_ref()
            .and_then(|b| b.network_avg_latency_ms.or(b.avg_latency_ms));

        table.rows.push(vec![
            Cell::Integer(r.num_peers as i64),
            Cell::Number { value: r.join_rate, precision: 1 },
            Cell::Number { value: r.duration_sec, precision: 0 },
            Cell::number(r.network_avg_latency_ms, 1),
            Cell::number(r.network_cache_hit_ratio, 2),
            Cell::number(r.bandwidth_saved_pct, 2),
            Cell::number(r.latency_improvement_pct, 2),
            Cell::number(r.jain_fairness_index, 3),
            Cell::integer(r.measured_origin_requests().map(|n| n as f64)),
            Cell::number(baseline_latency, 1),
            Cell::number(pairing.and_then(|p| p.baseline_network_cache_hit_ratio), 2),
            Cell::integer(pairing.map(|p| p.origin.baseline_origin_requests)),
            Cell::number(pairing.and_then(|p| p.latency_reduction_ms), 1),
            Cell::integer(pairing.map(|p| p.origin.reduction)),
            Cell::number(pairing.map(|p| p.origin.reduction_pct), 2),
        ]);
    }

    Ok(table)
}

/// Origin load reduction for every P2P run that could be paired with a baseline
pub fn origin_load_reduction_table(
    records: &[CanonicalMetricRecord],
    pairings: &[BaselinePairing],
) -> Table {
    let mut table = Table::new(
        "origin_load_reduction",
        "Origin Server Load Reduction",
        &[
            "Scenario",
            "Num Peers",
            "Baseline Origin Requests",
            "P2P Origin Requests",
            "Load Reduction",
            "Load Reduction (%)",
            "Bandwidth Saved (%)",
        ],
    );

    let mut sorted: Vec<&BaselinePairing> = pairings.iter().collect();
    sorted.sort_by(|a, b| {
        a.scenario
            .cmp(&b.scenario)
            .then(a.num_peers.cmp(&b.num_peers))
            .then_with(|| a.source_file.cmp(&b.source_file))
    });

    for p in sorted {
        let bandwidth_saved = records
            .iter()
            .find(|r| r.source_file == p.source_file)
            .and_then(|r| r.bandwidth_saved_pct);

        table.rows.push(vec![
            Cell::text(p.scenario.clone()),
            Cell::Integer(p.num_peers as i64),
            Cell::integer(Some(p.origin.baseline_origin_requests)),
            Cell::integer(Some(p.origin.p2p_origin_requests)),
            Cell::integer(Some(p.origin.reduction)),
            Cell::Number { value: p.origin.reduction_pct, precision: 2 },
            Cell::number(bandwidth_saved, 2),
        ]);
    }

    table
}

/// Multi-run statistics per peer count (P2P runs only)
pub fn peer_count_stats_table(records: &[CanonicalMetricRecord]) -> Table {
    let mut table = Table::new(
        "peer_count_statistics",
        "Multi-Run Statistics by Peer Count",
        &[
            "Num Peers",
            "Runs",
            "Avg Cache Hit Ratio (%)",
            "Std Cache Hit Ratio",
            "Avg Latency (ms)",
            "Std Latency",
            "Avg Bandwidth Saved (%)",
            "Avg Jain's Index",
            "Avg Latency Improvement (%)",
        ],
    );

    let groups = aggregate(records.iter().filter(|r| !r.baseline_mode), &[KeyField::NumPeers]);
    for (key, stats) in groups {
        let hit = stats.metrics.get(&Metric::CacheHitRatio);
        let latency = stats.metrics.get(&Metric::AvgLatencyMs);

        table.rows.push(vec![
            Cell::text(key.get(KeyField::NumPeers).map(|v| v.to_string()).unwrap_or_default()),
            Cell::Integer(stats.records as i64),
            Cell::number(hit.map(|s| s.mean), 2),
            Cell::number(hit.map(|s| s.stddev), 2),
            Cell::number(latency.map(|s| s.mean), 1),
            Cell::number(latency.map(|s| s.stddev), 1),
            Cell::number(stats.mean(Metric::BandwidthSavedPct), 2),
            Cell::number(stats.mean(Metric::JainFairnessIndex), 3),
            Cell::number(stats.mean(Metric::LatencyImprovementPct), 2),
        ]);
    }

    table
}

/// Runs whose peers joined over time against runs where they joined at once
/// (P2P runs only). An empty group keeps its row with zero runs.
pub fn flash_crowd_vs_normal_table(records: &[CanonicalMetricRecord]) -> Table {
    let mut table = Table::new(
        "flash_crowd_vs_normal",
        "Flash Crowd vs Normal Join Behaviour",
        &[
            "Group",
            "Runs",
            "Avg Cache Hit Ratio (%)",
            "Avg Latency (ms)",
            "Avg Bandwidth Saved (%)",
            "Avg Jain's Index",
        ],
    );

    let p2p: Vec<&CanonicalMetricRecord> = records.iter().filter(|r| !r.baseline_mode).collect();
    for (label, flash) in [("Flash Crowd", true), ("Normal", false)] {
        let groups = aggregate(
            p2p.iter().copied().filter(|r| is_flash_crowd_run(r) == flash),
            &[],
        );
        let stats = groups.values().next();
        let mean = |metric: Metric| stats.and_then(|s| s.mean(metric));

        table.rows.push(vec![
            Cell::text(label),
            Cell::Integer(stats.map_or(0, |s| s.records as i64)),
            Cell::number(mean(Metric::CacheHitRatio), 2),
            Cell::number(mean(Metric::AvgLatencyMs), 1),
            Cell::number(mean(Metric::BandwidthSavedPct), 2),
            Cell::number(mean(Metric::JainFairnessIndex), 3),
        ]);
    }

    table
}

/// Metric by peer count for one configuration family
pub fn peer_comparison_table(family: &ConfigurationFamily) -> Table {
    let mut columns = vec!["Metric".to_string()];
    columns.extend(family.configurations.iter().map(|c| c.label.clone()));

    type Extract = fn(&ConfigurationProfile) -> Option<f64>;
    let metrics: [(&str, usize, Extract); 8] = [
        ("Network Avg Latency (ms)", 1, |c| c.network_avg_latency_ms),
        ("Network Cache Hit Ratio (%)", 2, |c| c.network_cache_hit_ratio),
        ("P2P Efficiency (%)", 2, |c| c.p2p_efficiency_pct),
        ("Max Anchor Load", 0, |c| c.max_anchor_load),
        ("Transfer Success Rate (%)", 2, |c| c.transfer_success_rate_pct),
        ("Connection Density (%)", 2, |c| c.connection_density.map(|d| d * 100.0)),
        ("Propagation Rate (peers/s)", 2, |c| c.propagation_rate_peers_per_sec),
        ("P2P Request Ratio (%)", 2, |c| c.p2p_ratio.map(|r| r * 100.0)),
    ];

    let rows = metrics
        .iter()
        .map(|(name, precision, extract)| {
            let mut row = vec![Cell::text(*name)];
            row.extend(
                family
                    .configurations
                    .iter()
                    .map(|c| Cell::number(extract(c), *precision)),
            );
            row
        })
        .collect();

    let slug: String = family
        .label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    Table {
        name: format!("peer_comparison_{}", slug),
        caption: format!("Peer Behaviour Comparison: {}", family.label),
        columns,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::derive::pair_with_baseline;
    use crate::analysis::test_support::{join, record};

    #[test]
    fn test_csv_escaping_and_missing_cells() {
        let table = Table {
            name: "t".into(),
            caption: "t".into(),
            columns: vec!["Name".into(), "Jain's Index".into()],
            rows: vec![
                vec![Cell::text("a, b"), Cell::number(Some(0.91234), 3)],
                vec![Cell::text("c"), Cell::Missing],
            ],
        };
        assert_eq!(table.to_csv(), "Name,Jain's Index\n\"a, b\",0.912\nc,\n");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("high_churn"), "High Churn");
        assert_eq!(title_case("flash-crowd"), "Flash Crowd");
    }

    #[test]
    fn test_summary_groups_runs() {
        let mut a = record("scalability", 20);
        a.origin_requests = 100;
        a.join_rate = 2.0;
        let mut b = a.clone();
        b.origin_requests = 300;
        let mut c = record("high_churn", 50);
        c.churn_rate = 0.05;

        let table = summary_table(&[a, b, c]);
        assert_eq!(table.rows.len(), 2);
        // BTreeMap order: "high_churn" < "scalability"
        assert_eq!(table.get(0, "Scenario"), Some(&Cell::text("High Churn")));
        assert_eq!(table.get(0, "Churn Rate"), Some(&Cell::text("0.050")));
        assert_eq!(table.get(0, "Join Rate"), Some(&Cell::text("N/A")));
        assert_eq!(table.get(1, "Origin Requests"), Some(&Cell::Integer(200)));
        assert_eq!(table.get(1, "Network Avg Latency (ms)"), Some(&Cell::Missing));
    }

    #[test]
    fn test_baseline_vs_high_churn_requires_high_churn_group() {
        let mut baseline = record("baseline", 20);
        baseline.baseline_mode = true;
        let records = vec![baseline];
        let scenarios = ScenarioNames::default();

        assert_eq!(
            baseline_vs_high_churn_table(&records, &scenarios),
            Err(AnalysisError::EmptyGroup {
                group: "high_churn".to_string()
            })
        );
        assert!(churn_rate_table(&records, &scenarios).is_err());
    }

    #[test]
    fn test_baseline_vs_high_churn_rows() {
        let mut baseline = record("baseline", 20);
        baseline.baseline_mode = true;
        baseline.origin_requests = 1000;
        baseline.jain_fairness_index = Some(0.7);
        let mut churn = record("high_churn", 20);
        churn.churn_rate = 0.1;
        churn.jain_fairness_index = Some(0.8);

        let table =
            baseline_vs_high_churn_table(&[churn, baseline], &ScenarioNames::default()).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.get(0, "Scenario"), Some(&Cell::text("Baseline")));
        assert_eq!(table.get(0, "Jain's Index").and_then(Cell::as_f64), Some(0.0));
        assert_eq!(table.get(1, "Jain's Index").and_then(Cell::as_f64), Some(0.8));
    }

    #[test]
    fn test_churn_rate_table_pools_baseline() {
        let mut b1 = record("baseline", 20);
        b1.baseline_mode = true;
        b1.origin_requests = 100;
        let mut b2 = record("baseline", 50);
        b2.baseline_mode = true;
        b2.origin_requests = 100;
        let mut churn = record("high_churn", 20);
        churn.churn_rate = 0.1;
        churn.peer_requests = 75;
        churn.origin_requests = 25;

        let table = churn_rate_table(&[b1, b2, churn], &ScenarioNames::default()).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.get(0, "Origin Request Ratio (%)").and_then(Cell::as_f64), Some(100.0));
        assert_eq!(table.get(1, "Origin Request Ratio (%)").and_then(Cell::as_f64), Some(25.0));
    }

    #[test]
    fn test_origin_load_reduction_rows() {
        let mut baseline = record("scalability", 20);
        baseline.baseline_mode = true;
        baseline.origin_requests = 1000;
        let mut p2p = record("scalability", 20);
        p2p.origin_requests = 200;
        p2p.peer_requests = 800;

        let records = vec![baseline, p2p];
        let pairings = pair_with_baseline(&records);
        let table = origin_load_reduction_table(&records, &pairings);
        assert_eq!(table.get(0, "Load Reduction"), Some(&Cell::Integer(800)));
        assert_eq!(table.get(0, "Load Reduction (%)").and_then(Cell::as_f64), Some(80.0));
    }

    #[test]
    fn test_scalability_table_sorted_by_peers() {
        let mut records = Vec::new();
        for peers in [500u64, 20, 100] {
            let mut r = record("scalability", peers);
            r.network_cache_hit_ratio = Some(peers as f64 / 10.0);
            records.push(r);
        }
        let table = scalability_table(&records, &ScenarioNames::default()).unwrap();
        let peers: Vec<String> = (0..3)
            .map(|i| table.get(i, "Number of Peers").unwrap().to_string())
            .collect();
        assert_eq!(peers, vec!["20", "100", "500"]);
    }

    #[test]
    fn test_summary_reports_zero_fairness_for_baseline() {
        let mut baseline = record("baseline", 20);
        baseline.baseline_mode = true;
        baseline.jain_fairness_index = Some(0.42);
        let mut p2p = record("scalability", 20);
        p2p.jain_fairness_index = Some(0.9);

        let table = summary_table(&[baseline, p2p]);
        assert_eq!(table.get(0, "Baseline"), Some(&Cell::text("Yes")));
        assert_eq!(
            table.get(0, "Jain's Index"),
            Some(&Cell::Number { value: 0.0, precision: 3 })
        );
        assert_eq!(table.get(1, "Jain's Index"), Some(&Cell::number(Some(0.9), 3)));
    }

    #[test]
    fn test_flash_crowd_vs_normal_split_by_join_span() {
        let mut gradual = record("flash_crowd", 10);
        gradual.join_events = vec![join(0.0, "a"), join(5000.0, "b")];
        gradual.cache_hit_ratio = Some(80.0);
        gradual.avg_latency_ms = Some(40.0);
        let mut burst = record("scalability", 10);
        burst.join_events = vec![join(0.0, "a"), join(500.0, "b")];
        burst.cache_hit_ratio = Some(50.0);
        let mut single = record("scalability", 10);
        single.join_events = vec![join(0.0, "a")];
        single.cache_hit_ratio = Some(70.0);
        let mut baseline = record("baseline", 10);
        baseline.baseline_mode = true;
        baseline.join_events = gradual.join_events.clone();

        let table = flash_crowd_vs_normal_table(&[gradual, burst, single, baseline]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.get(0, "Group"), Some(&Cell::text("Flash Crowd")));
        assert_eq!(table.get(0, "Runs"), Some(&Cell::Integer(1)));
        assert_eq!(table.get(0, "Avg Cache Hit Ratio (%)"), Some(&Cell::number(Some(80.0), 2)));
        assert_eq!(table.get(0, "Avg Latency (ms)"), Some(&Cell::number(Some(40.0), 1)));
        assert_eq!(table.get(1, "Runs"), Some(&Cell::Integer(2)));
        assert_eq!(table.get(1, "Avg Cache Hit Ratio (%)"), Some(&Cell::number(Some(60.0), 2)));
        assert_eq!(table.get(1, "Avg Latency (ms)"), Some(&Cell::Missing));
    }

    #[test]
    fn test_flash_crowd_vs_normal_keeps_empty_group() {
        let table = flash_crowd_vs_normal_table(&[record("scalability", 10)]);
        assert_eq!(table.get(0, "Runs"), Some(&Cell::Integer(0)));
        assert_eq!(table.get(0, "Avg Jain's Index"), Some(&Cell::Missing));
        assert_eq!(table.get(1, "Runs"), Some(&Cell::Integer(1)));
    }
}
