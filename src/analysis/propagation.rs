//! Content propagation timing analysis.
//!
//! Reconstructs when each peer first received content, relative to the
//! first peer join, and how quickly content spread through the network.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::stats::median;
use super::types::*;

/// When content reached each peer during one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationTimeline {
    /// Earliest join timestamp, defines t = 0
    pub start_timestamp_ms: EpochMs,
    /// Peer -> seconds until its first successful transfer
    pub peer_content_times: BTreeMap<String, f64>,
    /// Seconds of every successful fetch from the origin
    pub origin_fetch_times: Vec<f64>,
    pub num_origin_fetches: usize,
    pub first_content_time_sec: f64,
    pub median_content_time_sec: f64,
    pub last_content_time_sec: f64,
    /// last - first; 0 when only one peer received content
    pub propagation_duration_sec: f64,
    pub peers_with_content: usize,
    /// 0 when the duration is 0
    pub propagation_rate_peers_per_sec: f64,
}

/// Join timing compared with what the configured join rate implies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinPattern {
    pub join_rate: f64,
    /// `num_peers / join_rate`, undefined for a zero join rate
    pub expected_join_duration_sec: Option<f64>,
    pub actual_join_duration_sec: f64,
    pub num_join_events: usize,
    /// Join offsets in seconds from the first join, in event order
    pub join_times_sec: Vec<f64>,
    /// Joins of the embedded baseline run, when it recorded any
    pub baseline: Option<JoinTimes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinTimes {
    pub actual_join_duration_sec: f64,
    pub num_join_events: usize,
    pub join_times_sec: Vec<f64>,
}

/// Runs whose joins spread over more than this are treated as flash crowds
pub const FLASH_CROWD_JOIN_SPAN_MS: f64 = 1000.0;

fn earliest_join(join_events: &[JoinEvent]) -> Option<EpochMs> {
    join_events
        .iter()
        .map(|e| e.timestamp)
        .min_by(|a, b| a.total_cmp(b))
}

/// Build the first-arrival timeline.
///
/// Transfer events are visited in timestamp order and a target keeps the
/// first time it received content; later transfers to it change nothing.
pub fn build_timeline(
    join_events: &[JoinEvent],
    transfer_events: &[TransferEvent],
) -> Measured<PropagationTimeline> {
    let Some(start) = earliest_join(join_events) else {
        return Measured::insufficient("no join events to anchor the timeline");
    };
    if transfer_events.is_empty() {
        return Measured::insufficient("no transfer events");
    }

    let mut successful: Vec<&TransferEvent> = transfer_events.iter().filter(|e| e.success).collect();
    successful.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    let mut peer_content_times: BTreeMap<String, f64> = BTreeMap::new();
    let mut origin_fetch_times = Vec::new();

    for event in successful {
        let offset_sec = (event.timestamp - start) / 1000.0;

        if event.is_from_origin() {
            origin_fetch_times.push(offset_sec);
        }

        if !event.target.is_empty() {
            peer_content_times
                .entry(event.target.clone())
                .or_insert(offset_sec);
        }
    }

    let times: Vec<f64> = peer_content_times.values().copied().collect();
    let (Some(first), Some(last), Some(median_time)) = (
        times.iter().copied().min_by(|a, b| a.total_cmp(b)),
        times.iter().copied().max_by(|a, b| a.total_cmp(b)),
        median(&times),
    ) else {
        return Measured::insufficient("no successful transfer reached a peer");
    };

    let propagation_duration_sec = if times.len() > 1 { last - first } else { 0.0 };
    let propagation_rate_peers_per_sec = if propagation_duration_sec > 0.0 {
        times.len() as f64 / propagation_duration_sec
    } else {
        0.0
    };

    Measured::Value(PropagationTimeline {
        start_timestamp_ms: start,
        num_origin_fetches: origin_fetch_times.len(),
        origin_fetch_times,
        first_content_time_sec: first,
        median_content_time_sec: median_time,
        last_content_time_sec: last,
        propagation_duration_sec,
        peers_with_content: peer_content_times.len(),
        propagation_rate_peers_per_sec,
        peer_content_times,
    })
}

/// Propagation timeline of one record
pub fn analyze_propagation(record: &CanonicalMetricRecord) -> Measured<PropagationTimeline> {
    let timeline = build_timeline(&record.join_events, &record.transfer_events);
    if let Measured::InsufficientData { reason } = &timeline {
        log::debug!("{}: no propagation timeline ({})", record.source_file, reason);
    }
    timeline
}

fn join_times(join_events: &[JoinEvent]) -> Option<JoinTimes> {
    let start = earliest_join(join_events)?;
    let join_times_sec: Vec<f64> = join_events
        .iter()
        .map(|e| (e.timestamp - start) / 1000.0)
        .collect();

    Some(JoinTimes {
        actual_join_duration_sec: join_times_sec.iter().copied().fold(0.0, f64::max),
        num_join_events: join_times_sec.len(),
        join_times_sec,
    })
}

/// Milliseconds between the first and last join, `None` with fewer than two joins
pub fn join_span_ms(join_events: &[JoinEvent]) -> Option<f64> {
    if join_events.len() < 2 {
        return None;
    }
    let first = earliest_join(join_events)?;
    let last = join_events
        .iter()
        .map(|e| e.timestamp)
        .max_by(|a, b| a.total_cmp(b))?;
    Some(last - first)
}

/// Whether peers joined gradually rather than all at once
pub fn is_flash_crowd_run(record: &CanonicalMetricRecord) -> bool {
    join_span_ms(&record.join_events).is_some_and(|span| span > FLASH_CROWD_JOIN_SPAN_MS)
}

pub fn analyze_join_pattern(record: &CanonicalMetricRecord) -> Measured<JoinPattern> {
    let Some(times) = join_times(&record.join_events) else {
        return Measured::insufficient("no join events");
    };

    let expected_join_duration_sec = if record.join_rate > 0.0 {
        Some(record.num_peers as f64 / record.join_rate)
    } else {
        None
    };

    Measured::Value(JoinPattern {
        join_rate: record.join_rate,
        expected_join_duration_sec,
        actual_join_duration_sec: times.actual_join_duration_sec,
        num_join_events: times.num_join_events,
        join_times_sec: times.join_times_sec,
        baseline: record
            .paired_baseline
            .as_ref()
            .and_then(|b| join_times(&b.join_events)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::{join, record, transfer};

    #[test]
    fn test_first_arrival_wins() {
        let joins = vec![join(0.0, "A"), join(1000.0, "B")];
        let transfers = vec![
            transfer(9000.0, "B", "A", true),
            transfer(5000.0, "origin", "A", true),
            transfer(7000.0, "A", "B", true),
        ];

        let timeline = build_timeline(&joins, &transfers).value().cloned().unwrap();
        assert_eq!(timeline.peer_content_times["A"], 5.0);
        assert_eq!(timeline.peer_content_times["B"], 7.0);
        assert_eq!(timeline.origin_fetch_times, vec![5.0]);
        assert_eq!(timeline.propagation_duration_sec, 2.0);
        assert_eq!(timeline.propagation_rate_peers_per_sec, 1.0);
    }

    #[test]
    fn test_later_transfers_do_not_move_arrival() {
        let joins = vec![join(0.0, "A")];
        let mut transfers = vec![transfer(5000.0, "origin", "A", true)];
        let before = build_timeline(&joins, &transfers).value().cloned().unwrap();

        transfers.push(transfer(9000.0, "B", "A", true));
        transfers.push(transfer(12000.0, "C", "A", true));
        let after = build_timeline(&joins, &transfers).value().cloned().unwrap();

        assert_eq!(
            before.peer_content_times["A"],
            after.peer_content_times["A"]
        );
    }

    #[test]
    fn test_zero_duration_rate_is_zero() {
        let joins = vec![join(0.0, "A")];
        let transfers = vec![transfer(3000.0, "origin", "A", true)];
        let timeline = build_timeline(&joins, &transfers).value().cloned().unwrap();
        assert_eq!(timeline.peers_with_content, 1);
        assert_eq!(timeline.propagation_duration_sec, 0.0);
        assert_eq!(timeline.propagation_rate_peers_per_sec, 0.0);
    }

    #[test]
    fn test_insufficient_inputs() {
        let joins = vec![join(0.0, "A")];
        let failed = vec![transfer(3000.0, "origin", "A", false)];

        assert!(!build_timeline(&[], &failed).is_available());
        assert!(!build_timeline(&joins, &[]).is_available());
        assert!(!build_timeline(&joins, &failed).is_available());
    }

    #[test]
    fn test_join_pattern() {
        let mut r = record("flash_crowd", 10);
        r.join_rate = 5.0;
        r.join_events = vec![join(2000.0, "a"), join(1000.0, "b"), join(3500.0, "c")];

        let pattern = analyze_join_pattern(&r).value().cloned().unwrap();
        assert_eq!(pattern.expected_join_duration_sec, Some(2.0));
        assert_eq!(pattern.actual_join_duration_sec, 2.5);
        assert_eq!(pattern.join_times_sec, vec![1.0, 0.0, 2.5]);

        r.join_rate = 0.0;
        let pattern = analyze_join_pattern(&r).value().cloned().unwrap();
        assert_eq!(pattern.expected_join_duration_sec, None);
    }

    #[test]
    fn test_join_pattern_includes_baseline_joins() {
        let mut r = record("flash_crowd", 3);
        r.join_events = vec![join(0.0, "a")];
        r.paired_baseline = Some(BaselineCounters {
            join_events: vec![join(10_000.0, "x"), join(14_000.0, "y"), join(11_000.0, "z")],
            ..Default::default()
        });

        let pattern = analyze_join_pattern(&r).value().cloned().unwrap();
        assert_eq!(pattern.actual_join_duration_sec, 0.0);
        let baseline = pattern.baseline.unwrap();
        assert_eq!(baseline.num_join_events, 3);
        assert_eq!(baseline.actual_join_duration_sec, 4.0);
        assert_eq!(baseline.join_times_sec, vec![0.0, 4.0, 1.0]);

        r.paired_baseline = None;
        assert!(analyze_join_pattern(&r).value().unwrap().baseline.is_none());
    }

    #[test]
    fn test_flash_crowd_classification_by_join_span() {
        let mut r = record("any", 3);
        assert!(!is_flash_crowd_run(&r));

        r.join_events = vec![join(5000.0, "a")];
        assert_eq!(join_span_ms(&r.join_events), None);
        assert!(!is_flash_crowd_run(&r));

        r.join_events = vec![join(5000.0, "a"), join(6000.0, "b")];
        assert_eq!(join_span_ms(&r.join_events), Some(1000.0));
        assert!(!is_flash_crowd_run(&r));

        r.join_events.push(join(4500.0, "c"));
        assert!(is_flash_crowd_run(&r));
    }
}
