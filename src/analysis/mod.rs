//! Result analysis for MicroCloud P2P simulations.
//!
//! This module provides tools for normalizing result records, aggregating
//! metrics across experiment configurations, reconstructing topology and
//! propagation timelines, and flagging scaling anomalies.

pub mod types;
pub mod normalize;
pub mod derive;
pub mod stats;
pub mod aggregation;
pub mod topology;
pub mod propagation;
pub mod transfers;
pub mod profile;
pub mod insights;
pub mod tables;
pub mod loader;
pub mod pipeline;
pub mod report;

#[cfg(test)]
pub(crate) mod test_support;

pub use types::*;
pub use normalize::{detect_shape, normalize_record, SchemaShape};
pub use derive::{derive_metrics, origin_load_reduction, pair_with_baseline};
pub use aggregation::{aggregate, fairness_pivot, pivot, KeyField, Metric};
pub use topology::analyze_topology;
pub use propagation::analyze_propagation;
pub use insights::generate_insights;
pub use loader::{discover_result_files, load_results, load_results_from};
pub use pipeline::run_analysis;
pub use report::{generate_json_report, generate_text_report, print_summary, write_tables};
