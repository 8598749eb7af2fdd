//! Topology reconstruction from transfer events.
//!
//! Provides:
//! - Peer-to-peer connection set (unordered, deduplicated pairs)
//! - Connection density against a fully connected graph
//! - Per-peer degree distribution
//! - Anchor node load statistics

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::stats::mean;
use super::types::*;

/// Connection graph reconstructed from one record's transfer events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    /// Population the density is measured against
    pub num_peers: u64,
    /// Unordered peer pairs, stored as (smaller id, larger id)
    pub connections: BTreeSet<(String, String)>,
    pub connection_count: usize,
    pub max_possible_connections: u64,
    /// `connection_count / C(num_peers, 2)`, 0 when `num_peers <= 1`
    pub connection_density: f64,
    pub per_peer_degree: BTreeMap<String, u64>,
    /// Mean degree over peers with at least one connection
    pub avg_degree: f64,
    pub max_degree: u64,
}

/// Statistics over the anchor node connection counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorLoad {
    pub anchor_count: usize,
    pub max_load: u64,
    pub avg_load: f64,
    pub loads: BTreeMap<String, u64>,
}

/// Build the deduplicated set of peer-to-peer connections.
///
/// Only successful transfers between two named peers count; origin fetches
/// and self-transfers add no edge.
pub fn reconstruct_connections(events: &[TransferEvent]) -> BTreeSet<(String, String)> {
    events
        .iter()
        .filter(|e| e.success && !e.is_from_origin() && !e.target.is_empty())
        .filter(|e| e.source != e.target)
        .map(|e| {
            if e.source <= e.target {
                (e.source.clone(), e.target.clone())
            } else {
                (e.target.clone(), e.source.clone())
            }
        })
        .collect()
}

/// Number of edges in a complete graph on `num_peers` nodes
pub fn max_possible_connections(num_peers: u64) -> u64 {
    if num_peers <= 1 {
        0
    } else {
        num_peers.saturating_mul(num_peers - 1) / 2
    }
}

pub fn connection_density(connection_count: usize, num_peers: u64) -> f64 {
    let max = max_possible_connections(num_peers);
    if max == 0 {
        0.0
    } else {
        connection_count as f64 / max as f64
    }
}

/// Peers the graph is measured against: the configured count, raised to the
/// number of distinct joiners or connection endpoints if either is larger.
/// A configured count of one or fewer is kept, so density stays 0.
fn population(record: &CanonicalMetricRecord, connections: &BTreeSet<(String, String)>) -> u64 {
    if record.num_peers <= 1 {
        return record.num_peers;
    }

    let joined: BTreeSet<&str> = record
        .join_events
        .iter()
        .map(|e| e.peer_id.as_str())
        .filter(|id| !id.is_empty())
        .collect();
    let joiners = if joined.is_empty() {
        record.join_events.len()
    } else {
        joined.len()
    };

    let endpoints: BTreeSet<&str> = connections
        .iter()
        .flat_map(|(a, b)| [a.as_str(), b.as_str()])
        .collect();

    record
        .num_peers
        .max(joiners as u64)
        .max(endpoints.len() as u64)
}

/// Reconstruct the topology of one record
pub fn analyze_topology(record: &CanonicalMetricRecord) -> Measured<TopologySnapshot> {
    if record.transfer_events.is_empty() {
        return Measured::insufficient("no transfer events to reconstruct connections from");
    }

    let connections = reconstruct_connections(&record.transfer_events);
    let num_peers = population(record, &connections);

    let mut per_peer_degree: BTreeMap<String, u64> = BTreeMap::new();
    for (a, b) in &connections {
        *per_peer_degree.entry(a.clone()).or_insert(0) += 1;
        *per_peer_degree.entry(b.clone()).or_insert(0) += 1;
    }

    let degrees: Vec<f64> = per_peer_degree.values().map(|d| *d as f64).collect();

    log::debug!(
        "{}: {} connections among {} peers",
        record.source_file,
        connections.len(),
        num_peers
    );

    Measured::Value(TopologySnapshot {
        num_peers,
        connection_count: connections.len(),
        max_possible_connections: max_possible_connections(num_peers),
        connection_density: connection_density(connections.len(), num_peers),
        avg_degree: mean(&degrees).unwrap_or(0.0),
        max_degree: per_peer_degree.values().copied().max().unwrap_or(0),
        per_peer_degree,
        connections,
    })
}

/// Max and mean over an already-normalized anchor load map
pub fn anchor_load_stats(loads: &BTreeMap<String, u64>) -> Measured<AnchorLoad> {
    if loads.is_empty() {
        return Measured::insufficient("no anchor nodes reported");
    }

    let values: Vec<f64> = loads.values().map(|l| *l as f64).collect();
    Measured::Value(AnchorLoad {
        anchor_count: loads.len(),
        max_load: loads.values().copied().max().unwrap_or(0),
        avg_load: mean(&values).unwrap_or(0.0),
        loads: loads.clone(),
    })
}

pub fn analyze_anchor_load(record: &CanonicalMetricRecord) -> Measured<AnchorLoad> {
    match &record.anchor_loads {
        Some(loads) => anchor_load_stats(loads),
        None => Measured::insufficient("record has no anchor node data"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::{record, transfer};

    #[test]
    fn test_connections_are_unordered_and_deduplicated() {
        let events = vec![
            transfer(1000.0, "a", "b", true),
            transfer(2000.0, "b", "a", true),
            transfer(3000.0, "a", "b", true),
            transfer(4000.0, "origin-server", "c", true),
            transfer(5000.0, "", "d", true),
            transfer(6000.0, "c", "d", false),
            transfer(7000.0, "c", "c", true),
        ];
        let connections = reconstruct_connections(&events);
        assert_eq!(connections.len(), 1);
        assert!(connections.contains(&("a".to_string(), "b".to_string())));
    }

    #[test]
    fn test_density_bounds() {
        assert_eq!(connection_density(0, 0), 0.0);
        assert_eq!(connection_density(0, 1), 0.0);
        assert_eq!(connection_density(1, 2), 1.0);
        assert_eq!(connection_density(3, 4), 0.5);
    }

    #[test]
    fn test_density_stays_in_range_when_config_understates_peers() {
        let mut r = record("scalability", 2);
        r.transfer_events = vec![
            transfer(1.0, "a", "b", true),
            transfer(2.0, "b", "c", true),
            transfer(3.0, "a", "c", true),
        ];
        let snapshot = analyze_topology(&r).value().cloned().unwrap();
        assert_eq!(snapshot.num_peers, 3);
        assert_eq!(snapshot.connection_density, 1.0);
        assert_eq!(snapshot.max_degree, 2);
        assert_eq!(snapshot.avg_degree, 2.0);
    }

    #[test]
    fn test_density_zero_for_single_peer_config() {
        for peers in [0, 1] {
            let mut r = record("scalability", peers);
            r.transfer_events = vec![
                transfer(1.0, "a", "b", true),
                transfer(2.0, "b", "c", true),
            ];
            let snapshot = analyze_topology(&r).value().cloned().unwrap();
            assert_eq!(snapshot.num_peers, peers);
            assert_eq!(snapshot.connection_count, 2);
            assert_eq!(snapshot.max_possible_connections, 0);
            assert_eq!(snapshot.connection_density, 0.0);
        }
    }

    #[test]
    fn test_topology_needs_transfer_events() {
        let r = record("scalability", 20);
        assert!(!analyze_topology(&r).is_available());
    }

    #[test]
    fn test_anchor_load() {
        let mut r = record("scalability", 20);
        assert!(!analyze_anchor_load(&r).is_available());

        r.anchor_loads = Some(BTreeMap::from([
            ("a1".to_string(), 4),
            ("a2".to_string(), 8),
        ]));
        let load = analyze_anchor_load(&r).value().cloned().unwrap();
        assert_eq!(load.max_load, 8);
        assert_eq!(load.avg_load, 6.0);
        assert_eq!(load.anchor_count, 2);
    }
}
