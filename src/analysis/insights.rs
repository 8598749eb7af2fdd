//! Threshold-driven comparison of configurations against a reference.
//!
//! For every metric and every non-reference configuration of a family, the
//! signed and percentage difference versus the reference is computed and a
//! flag is raised when it crosses the metric's threshold. Messages follow a
//! fixed template per metric; no causal inference happens here.

use serde::{Deserialize, Serialize};

use crate::config::InsightThresholds;

use super::profile::ConfigurationProfile;
use super::types::Measured;

/// Metrics the generator compares, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightMetric {
    NetworkCacheHitRatio,
    AnchorLoad,
    NetworkLatency,
    P2pEfficiency,
    TransferSuccessRate,
    ConnectionDensity,
    PropagationRate,
    P2pRequestRatio,
}

impl InsightMetric {
    pub const ALL: [InsightMetric; 8] = [
        InsightMetric::NetworkCacheHitRatio,
        InsightMetric::AnchorLoad,
        InsightMetric::NetworkLatency,
        InsightMetric::P2pEfficiency,
        InsightMetric::TransferSuccessRate,
        InsightMetric::ConnectionDensity,
        InsightMetric::PropagationRate,
        InsightMetric::P2pRequestRatio,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            InsightMetric::NetworkCacheHitRatio => "network cache hit ratio",
            InsightMetric::AnchorLoad => "anchor load",
            InsightMetric::NetworkLatency => "network latency",
            InsightMetric::P2pEfficiency => "p2p efficiency",
            InsightMetric::TransferSuccessRate => "transfer success rate",
            InsightMetric::ConnectionDensity => "connection density",
            InsightMetric::PropagationRate => "propagation rate",
            InsightMetric::P2pRequestRatio => "p2p request ratio",
        }
    }

    fn value(&self, config: &ConfigurationProfile) -> Option<f64> {
        match self {
            InsightMetric::NetworkCacheHitRatio => config.network_cache_hit_ratio,
            InsightMetric::AnchorLoad => config.max_anchor_load,
            InsightMetric::NetworkLatency => config.network_avg_latency_ms,
            InsightMetric::P2pEfficiency => config.p2p_efficiency_pct,
            InsightMetric::TransferSuccessRate => config.transfer_success_rate_pct,
            InsightMetric::ConnectionDensity => config.connection_density,
            InsightMetric::PropagationRate => config.propagation_rate_peers_per_sec,
            InsightMetric::P2pRequestRatio => config.p2p_ratio,
        }
    }

    /// Whether `other` crosses the threshold relative to `reference`
    fn is_flagged(&self, reference: f64, other: f64, t: &InsightThresholds) -> bool {
        match self {
            InsightMetric::NetworkCacheHitRatio => reference - other > t.cache_hit_drop_pts,
            InsightMetric::AnchorLoad => other > reference * t.anchor_load_factor,
            InsightMetric::NetworkLatency => {
                reference > 0.0 && (other - reference) / reference > t.latency_growth_ratio
            }
            InsightMetric::P2pEfficiency => reference - other > t.p2p_efficiency_drop_pts,
            InsightMetric::TransferSuccessRate => reference - other > t.transfer_success_drop_pts,
            InsightMetric::ConnectionDensity => other < reference * t.density_factor,
            InsightMetric::PropagationRate => other < reference * t.propagation_rate_factor,
            InsightMetric::P2pRequestRatio => other < reference * t.p2p_ratio_factor,
        }
    }

    fn message(&self, reference: &ConfigurationProfile, other: &ConfigurationProfile, r: f64, o: f64) -> String {
        let (rl, ol) = (&reference.label, &other.label);
        match self {
            InsightMetric::NetworkCacheHitRatio => format!(
                "{} has a {:.1} pt higher network cache hit ratio than {} ({:.1}% vs {:.1}%), \
                 indicating markedly worse cache effectiveness at that scale",
                rl, r - o, ol, r, o
            ),
            InsightMetric::AnchorLoad => format!(
                "At {}, anchor nodes become bottlenecks (max load {:.0} vs {:.0} at {}), \
                 indicating anchor saturation",
                ol, o, r, rl
            ),
            InsightMetric::NetworkLatency => format!(
                "Network latency increases by {:.1}% at {} compared to {} ({:.1} ms vs {:.1} ms), \
                 suggesting congestion",
                (o - r) / r * 100.0, ol, rl, o, r
            ),
            InsightMetric::P2pEfficiency => format!(
                "P2P efficiency drops by {:.1} pts at {} ({:.1}% vs {:.1}% at {}), \
                 indicating peer discovery and connection degradation at scale",
                r - o, ol, o, r, rl
            ),
            InsightMetric::TransferSuccessRate => format!(
                "Transfer reliability decreases by {:.1} pts at {} ({:.1}% vs {:.1}% at {}), \
                 suggesting connection stability issues",
                r - o, ol, o, r, rl
            ),
            InsightMetric::ConnectionDensity => format!(
                "At {}, connection density drops to {:.1}% (vs {:.1}% at {}), \
                 indicating a sparse topology that limits content discovery",
                ol, o * 100.0, r * 100.0, rl
            ),
            InsightMetric::PropagationRate => format!(
                "Content propagation slows at {} ({:.1} vs {:.1} peers/s at {}), \
                 so requests arrive before content is available in the network",
                ol, o, r, rl
            ),
            InsightMetric::P2pRequestRatio => format!(
                "P2P request ratio drops to {:.1}% at {} (vs {:.1}% at {}), \
                 suggesting requests happen before content propagates to enough peers",
                o * 100.0, ol, r * 100.0, rl
            ),
        }
    }
}

/// One flagged observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub metric: InsightMetric,
    pub reference: String,
    pub other: String,
    pub reference_value: f64,
    pub other_value: f64,
    /// other - reference
    pub difference: f64,
    /// `difference / reference * 100`, undefined for a zero reference
    pub percent_difference: Option<f64>,
    pub message: String,
}

impl Insight {
    /// (metric, configurationA, configurationB, message)
    pub fn as_tuple(&self) -> (&'static str, &str, &str, &str) {
        (self.metric.name(), &self.reference, &self.other, &self.message)
    }
}

/// Insights for one family, plus metrics that could not be compared
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSet {
    pub reference: String,
    pub insights: Vec<Insight>,
    /// Metrics skipped because the reference could not measure them
    pub unavailable: Vec<String>,
}

/// Compare every configuration against the one with `reference_peers` peers.
///
/// The output depends only on the set of configurations, never on their order.
pub fn generate_insights(
    configurations: &[ConfigurationProfile],
    reference_peers: u64,
    thresholds: &InsightThresholds,
) -> Measured<InsightSet> {
    let Some(reference) = configurations.iter().find(|c| c.num_peers == reference_peers) else {
        return Measured::insufficient(format!(
            "no {}-peer reference configuration",
            reference_peers
        ));
    };

    let mut others: Vec<&ConfigurationProfile> = configurations
        .iter()
        .filter(|c| c.num_peers != reference_peers)
        .collect();
    others.sort_by_key(|c| c.num_peers);

    let mut insights = Vec::new();
    let mut unavailable = Vec::new();

    for metric in InsightMetric::ALL {
        let Some(r) = metric.value(reference) else {
            unavailable.push(format!("{}: not measured at {}", metric.name(), reference.label));
            continue;
        };

        for other in &others {
            let Some(o) = metric.value(other) else {
                continue;
            };
            if !metric.is_flagged(r, o, thresholds) {
                continue;
            }

            let difference = o - r;
            insights.push(Insight {
                metric,
                reference: reference.label.clone(),
                other: other.label.clone(),
                reference_value: r,
                other_value: o,
                difference,
                percent_difference: if r != 0.0 { Some(difference / r * 100.0) } else { None },
                message: metric.message(reference, other, r, o),
            });
        }
    }

    log::debug!(
        "{} insights against {} ({} metrics unavailable)",
        insights.len(),
        reference.label,
        unavailable.len()
    );

    Measured::Value(InsightSet {
        reference: reference.label.clone(),
        insights,
        unavailable,
    })
}
