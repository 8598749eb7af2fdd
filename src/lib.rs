//! # MicroCloud Analysis - Result normalization for P2P simulation experiments
//!
//! This library turns the JSON result files written by MicroCloud content
//! distribution experiments into canonical metric records, aggregates them
//! across configurations and compares configurations against a reference
//! peer count.
//!
//! ## Overview
//!
//! Experiments have been written in two layouts over time: a flat legacy
//! layout and a nested dashboard layout with embedded baseline counters.
//! Both are normalized into one [`analysis::CanonicalMetricRecord`], so every
//! downstream stage sees a single schema.
//!
//! ## Key Features
//!
//! - **Dual-schema loading**: Legacy and dashboard files, detected per file
//! - **Undefined is not zero**: Ratios with a zero denominator stay undefined
//! - **Order-independent aggregation**: Mean and sample standard deviation per group
//! - **Topology and propagation**: Connection density, anchor load, first-arrival timelines
//! - **Comparative insights**: Threshold flags relative to a reference configuration
//!
//! ## Architecture
//!
//! - `config`: Analysis configuration (thresholds, scenario names, file filters)
//! - `config_loader`: YAML loading and command-line overrides
//! - `analysis::normalize`: Schema detection and record normalization
//! - `analysis::derive`: Count reconciliation and baseline pairing
//! - `analysis::aggregation`: Grouping, summary statistics and pivots
//! - `analysis::topology` / `analysis::propagation`: Per-record event analysis
//! - `analysis::insights`: Comparative insight generation
//! - `analysis::tables` / `analysis::report`: CSV tables, JSON and text reports
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use microcloud_analysis::{analysis, config_loader};
//!
//! let config = config_loader::load_config_or_default(None)?;
//! let outcome = analysis::load_results_from(Path::new("results"), &config)?;
//!
//! let load = outcome.summary(config.warning_sample_size);
//! let report = analysis::run_analysis(outcome.records, &config, load, "results")?;
//!
//! analysis::generate_json_report(&report, Path::new("analysis/full_report.json"))?;
//! analysis::write_tables(&report.tables, Path::new("analysis"))?;
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! File-level I/O uses `color_eyre` with context. Conditions a caller may
//! want to match on (no records, an empty scenario group, a malformed file)
//! are `thiserror` enums. A malformed result file is skipped with a warning
//! and never aborts a batch.

pub mod config;
pub mod config_loader;
pub mod analysis;
