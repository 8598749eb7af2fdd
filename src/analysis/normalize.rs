//! Dual-schema normalization of raw result records.
//!
//! Result files come in two shapes:
//!
//! - **legacy**: `config`, top-level `scenario`/`variant`, flat `results`
//! - **dashboard**: `configuration`, `metadata`, `results.microcloud` and an
//!   optional `results.baseline`
//!
//! A structural probe picks the shape once, both shapes are reduced to the
//! same [`RecordView`], and a single builder produces the canonical record.

use std::collections::BTreeMap;

use serde_json::Value;

use super::derive::{reconcile_request_counts, RequestCounts};
use super::types::*;

/// Which of the two input layouts a record uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaShape {
    Legacy,
    Dashboard,
}

impl std::fmt::Display for SchemaShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaShape::Legacy => write!(f, "legacy"),
            SchemaShape::Dashboard => write!(f, "dashboard"),
        }
    }
}

/// Reasons a parsed document cannot be treated as a result record
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("document is not a JSON object")]
    NotAnObject,
    #[error("document has no 'results' object")]
    MissingResults,
}

/// Shape-independent view of the sections a record is built from
struct RecordView<'a> {
    config: Option<&'a Value>,
    scenario: Option<&'a str>,
    variant: Option<&'a str>,
    results: &'a Value,
    baseline: Option<&'a Value>,
}

/// Probe the document structure: a nested `results.microcloud` object marks the dashboard shape
pub fn detect_shape(value: &Value) -> SchemaShape {
    let is_dashboard = value
        .get("results")
        .and_then(|r| r.get("microcloud"))
        .map_or(false, Value::is_object);

    if is_dashboard {
        SchemaShape::Dashboard
    } else {
        SchemaShape::Legacy
    }
}

/// Normalize one parsed document into a canonical record.
///
/// Missing counts become 0, missing ratios and latencies stay undefined.
pub fn normalize_record(
    value: &Value,
    source_file: &str,
) -> Result<CanonicalMetricRecord, NormalizeError> {
    if !value.is_object() {
        return Err(NormalizeError::NotAnObject);
    }

    let view = match detect_shape(value) {
        SchemaShape::Dashboard => dashboard_view(value)?,
        SchemaShape::Legacy => legacy_view(value)?,
    };

    Ok(build_record(&view, source_file))
}

fn dashboard_view(value: &Value) -> Result<RecordView<'_>, NormalizeError> {
    let results = value.get("results").ok_or(NormalizeError::MissingResults)?;
    let microcloud = results
        .get("microcloud")
        .filter(|v| v.is_object())
        .ok_or(NormalizeError::MissingResults)?;

    let metadata = field(value, "metadata");
    let experiment = field(value, "experimentMetadata");
    let meta_str = |key: &str| {
        metadata
            .and_then(|m| get_str(m, key))
            .or_else(|| experiment.and_then(|m| get_str(m, key)))
    };

    Ok(RecordView {
        config: field(value, "configuration"),
        scenario: meta_str("scenario"),
        variant: meta_str("variant"),
        results: microcloud,
        baseline: field(results, "baseline").filter(|v| v.is_object()),
    })
}

fn legacy_view(value: &Value) -> Result<RecordView<'_>, NormalizeError> {
    let results = field(value, "results")
        .filter(|v| v.is_object())
        .ok_or(NormalizeError::MissingResults)?;

    Ok(RecordView {
        config: field(value, "config"),
        scenario: get_str(value, "scenario"),
        variant: get_str(value, "variant"),
        results,
        baseline: None,
    })
}

fn build_record(view: &RecordView<'_>, source_file: &str) -> CanonicalMetricRecord {
    let res = view.results;
    let cfg = |key: &str| view.config.and_then(|c| field(c, key));

    let counts = request_counts(res, source_file);

    CanonicalMetricRecord {
        scenario: view.scenario.unwrap_or("unknown").to_string(),
        variant: view.variant.unwrap_or("unknown").to_string(),
        source_file: source_file.to_string(),

        num_peers: cfg("numPeers").and_then(as_u64).unwrap_or(0),
        duration_sec: cfg("duration").and_then(Value::as_f64).unwrap_or(0.0),
        join_rate: cfg("joinRate").and_then(Value::as_f64).unwrap_or(0.0),
        churn_rate: cfg("churnRate").and_then(Value::as_f64).unwrap_or(0.0),
        baseline_mode: cfg("baselineMode").and_then(Value::as_bool).unwrap_or(false),

        total_requests: get_u64(res, "totalRequests").unwrap_or(0),
        peer_requests: counts.peer,
        origin_requests: counts.origin,
        local_cache_hits: get_u64(res, "localCacheHits").unwrap_or(0),
        network_requests: Some(counts.network),
        network_only: counts.network_only,

        cache_hit_ratio: get_f64(res, "cacheHitRatio"),
        network_cache_hit_ratio: get_f64(res, "networkCacheHitRatio"),
        bandwidth_saved_pct: get_f64(res, "bandwidthSaved"),
        latency_improvement_pct: get_f64(res, "latencyImprovement"),

        avg_latency_ms: get_f64(res, "avgLatency"),
        network_avg_latency_ms: get_f64(res, "networkAvgLatency"),
        jain_fairness_index: get_f64(res, "jainFairnessIndex"),
        latency_percentiles: field(res, "latencyPercentiles").map(parse_percentiles),

        time_series: parse_time_series(res),
        join_events: parse_join_events(res),
        transfer_events: parse_transfer_events(res),
        anchor_loads: field(res, "anchorNodes").and_then(normalize_anchor_loads),
        paired_baseline: view.baseline.map(|b| parse_baseline(b, source_file)),
    }
}

fn request_counts(value: &Value, source_file: &str) -> RequestCounts {
    let counts = reconcile_request_counts(
        get_u64(value, "peerRequests"),
        get_u64(value, "originRequests"),
        get_u64(value, "networkRequests"),
    );
    if counts.conflicting {
        log::warn!(
            "{}: networkRequests disagrees with peer + origin requests, using {}",
            source_file,
            counts.network
        );
    }
    counts
}

fn parse_baseline(value: &Value, source_file: &str) -> BaselineCounters {
    let counts = request_counts(value, source_file);

    BaselineCounters {
        total_requests: get_u64(value, "totalRequests").unwrap_or(0),
        peer_requests: counts.peer,
        origin_requests: counts.origin,
        local_cache_hits: get_u64(value, "localCacheHits").unwrap_or(0),
        network_requests: counts.network,
        network_only: counts.network_only,
        join_events: parse_join_events(value),
        network_cache_hit_ratio: get_f64(value, "networkCacheHitRatio"),
        avg_latency_ms: get_f64(value, "avgLatency"),
        network_avg_latency_ms: get_f64(value, "networkAvgLatency"),
    }
}

fn parse_percentiles(value: &Value) -> LatencyPercentiles {
    LatencyPercentiles {
        p50: get_f64(value, "p50"),
        p75: get_f64(value, "p75"),
        p90: get_f64(value, "p90"),
        p95: get_f64(value, "p95"),
        p99: get_f64(value, "p99"),
        min: get_f64(value, "min"),
        max: get_f64(value, "max"),
    }
}

fn parse_time_series(res: &Value) -> Vec<TimeSeriesPoint> {
    array(res, &["timeSeriesData", "timeSeries"])
        .iter()
        .filter_map(|point| {
            Some(TimeSeriesPoint {
                time_sec: get_f64(point, "time")?,
                avg_latency_ms: get_f64(point, "avgLatency")?,
            })
        })
        .collect()
}

fn parse_join_events(res: &Value) -> Vec<JoinEvent> {
    let events: Vec<JoinEvent> = array(res, &["peerJoinEvents", "joinEvents"])
        .iter()
        .filter_map(|event| {
            Some(JoinEvent {
                timestamp: get_f64(event, "timestamp")?,
                peer_id: get_str(event, "peerId")
                    .or_else(|| get_str(event, "nodeId"))
                    .unwrap_or("")
                    .to_string(),
            })
        })
        .collect();

    log::trace!("Parsed {} join events", events.len());
    events
}

fn parse_transfer_events(res: &Value) -> Vec<TransferEvent> {
    array(res, &["fileTransferEvents", "transferEvents"])
        .iter()
        .filter_map(|event| {
            Some(TransferEvent {
                timestamp: get_f64(event, "timestamp")?,
                source: get_str(event, "source").unwrap_or("").to_string(),
                target: get_str(event, "target")
                    .or_else(|| get_str(event, "peerId"))
                    .unwrap_or("")
                    .to_string(),
                success: get_bool(event, "success").unwrap_or(false),
                latency_ms: get_f64(event, "latency").or_else(|| get_f64(event, "latencyMs")),
                chunk_index: get_u64(event, "chunkIndex"),
            })
        })
        .collect()
}

/// Reduce either anchor-node representation to `node id -> connection count`.
///
/// Accepts a map whose values are counts or `{connections}` objects, or a list
/// of `{peerId|nodeId, connections|connectionCount}` records (bare list items
/// count as anchors with zero connections). Returns `None` for an empty or
/// unrecognised value.
pub fn normalize_anchor_loads(value: &Value) -> Option<BTreeMap<String, u64>> {
    let loads: BTreeMap<String, u64> = match value {
        Value::Object(map) => map
            .iter()
            .map(|(node, entry)| {
                let load = if entry.is_object() {
                    connection_count(entry)
                } else {
                    as_u64(entry).unwrap_or(0)
                };
                (node.clone(), load)
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                if item.is_object() {
                    let node = get_str(item, "peerId")
                        .or_else(|| get_str(item, "nodeId"))
                        .map(str::to_string)
                        .unwrap_or_else(|| item.to_string());
                    (node, connection_count(item))
                } else {
                    let node = item
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| item.to_string());
                    (node, 0)
                }
            })
            .collect(),
        _ => return None,
    };

    if loads.is_empty() {
        None
    } else {
        Some(loads)
    }
}

fn connection_count(entry: &Value) -> u64 {
    get_u64(entry, "connections")
        .or_else(|| get_u64(entry, "connectionCount"))
        .unwrap_or(0)
}

// Field accessors treating JSON null the same as an absent key

fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|v| !v.is_null())
}

fn get_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    field(value, key).and_then(Value::as_str)
}

fn get_f64(value: &Value, key: &str) -> Option<f64> {
    field(value, key).and_then(Value::as_f64).filter(|v| v.is_finite())
}

fn get_bool(value: &Value, key: &str) -> Option<bool> {
    field(value, key).and_then(Value::as_bool)
}

fn get_u64(value: &Value, key: &str) -> Option<u64> {
    field(value, key).and_then(as_u64)
}

/// Integer counts are sometimes serialized as floats (`20.0`)
fn as_u64(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f.round() as u64)
    })
}

fn array<'a>(value: &'a Value, keys: &[&str]) -> &'a [Value] {
    keys.iter()
        .find_map(|key| field(value, key).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
