//! Report generation for result analysis.
//!
//! Generates a JSON report, a human-readable text report and one CSV file
//! per canonical table.

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};

use super::aggregation::Metric;
use super::derive::BaselineSource;
use super::tables::Table;
use super::types::*;

/// Generate JSON report
pub fn generate_json_report(report: &AnalysisReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

fn fmt_opt(value: Option<f64>, precision: usize, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.*}{}", precision, v, unit),
        None => "n/a".to_string(),
    }
}

fn section(lines: &mut Vec<String>, title: &str) {
    lines.push("=".repeat(80));
    lines.push(format!("{:^80}", title));
    lines.push("=".repeat(80));
    lines.push(String::new());
}

/// Render the human-readable report
pub fn render_text_report(report: &AnalysisReport) -> String {
    let mut lines: Vec<String> = Vec::new();

    section(&mut lines, "MICROCLOUD RESULT ANALYSIS");

    // Metadata
    let meta = &report.metadata;
    lines.push(format!("Analysis Date: {}", meta.analysis_timestamp));
    lines.push(format!("Results Source: {}", meta.results_source));
    lines.push(format!("Records Analyzed: {}", meta.total_records));
    lines.push(format!("Scenarios: {}", meta.scenarios.join(", ")));
    lines.push(format!(
        "Files: {} discovered, {} loaded, {} skipped",
        meta.load.files_discovered, meta.load.files_loaded, meta.load.files_skipped
    ));
    for reason in &meta.load.skip_reasons {
        lines.push(format!("  skipped: {}", reason));
    }
    lines.push(String::new());

    // Aggregates
    section(&mut lines, "AGGREGATE STATISTICS");
    for group in &report.groups {
        lines.push(format!("{} ({} runs)", group.key, group.records));
        for metric in [
            Metric::NetworkCacheHitRatio,
            Metric::NetworkAvgLatencyMs,
            Metric::JainFairnessIndex,
            Metric::OriginRequests,
        ] {
            match group.metrics.get(&metric) {
                Some(stats) => lines.push(format!(
                    "  {:<24} mean {:>10.3}  std {:>9.3}  n={}",
                    metric.name(),
                    stats.mean,
                    stats.stddev,
                    stats.count
                )),
                None => lines.push(format!("  {:<24} undefined", metric.name())),
            }
        }
    }
    lines.push(String::new());

    // Baseline comparison
    if !report.pairings.is_empty() {
        section(&mut lines, "ORIGIN LOAD REDUCTION");
        for p in &report.pairings {
            let source = match &p.baseline_source {
                BaselineSource::Embedded => "embedded baseline".to_string(),
                BaselineSource::Standalone { runs, .. } => format!("{} baseline run(s)", runs),
            };
            lines.push(format!(
                "{} / {} peers: {:.0} -> {:.0} origin requests ({:.1}%), latency reduction {} [{}]",
                p.scenario,
                p.num_peers,
                p.origin.baseline_origin_requests,
                p.origin.p2p_origin_requests,
                p.origin.reduction_pct,
                fmt_opt(p.latency_reduction_ms, 1, " ms"),
                source
            ));
        }
        lines.push(String::new());
    }

    // Insights
    section(&mut lines, "COMPARATIVE INSIGHTS");
    for family in &report.families {
        lines.push(format!("{}:", family.family.label));
        match &family.insights {
            Measured::Value(set) => {
                if set.insights.is_empty() {
                    lines.push(format!("  No metric crossed its threshold versus {}", set.reference));
                }
                for (i, insight) in set.insights.iter().enumerate() {
                    lines.push(format!("  {}. {}", i + 1, insight.message));
                }
                for note in &set.unavailable {
                    lines.push(format!("  (unavailable) {}", note));
                }
            }
            Measured::InsufficientData { reason } => {
                lines.push(format!("  Insufficient data: {}", reason));
            }
        }
        lines.push(String::new());
    }

    if !report.empty_groups.is_empty() {
        lines.push(format!(
            "Tables skipped for empty groups: {}",
            report.empty_groups.join(", ")
        ));
        lines.push(String::new());
    }

    // Footer
    lines.push("=".repeat(80));

    lines.join("\n")
}

/// Generate human-readable text report
pub fn generate_text_report(report: &AnalysisReport, output_path: &Path) -> Result<()> {
    let content = render_text_report(report);
    fs::write(output_path, content)
        .with_context(|| format!("Failed to write text report to {}", output_path.display()))?;

    log::info!("Text report written to {}", output_path.display());
    Ok(())
}

/// Write one table as `<name>.csv` in `output_dir`
pub fn write_table_csv(table: &Table, output_dir: &Path) -> Result<PathBuf> {
    let path = output_dir.join(format!("{}.csv", table.name));
    fs::write(&path, table.to_csv())
        .with_context(|| format!("Failed to write table to {}", path.display()))?;

    log::debug!("Saved table {} ({} rows)", path.display(), table.rows.len());
    Ok(path)
}

pub fn write_tables(tables: &[Table], output_dir: &Path) -> Result<Vec<PathBuf>> {
    let paths = tables
        .iter()
        .map(|t| write_table_csv(t, output_dir))
        .collect::<Result<Vec<_>>>()?;

    log::info!("{} tables written to {}", paths.len(), output_dir.display());
    Ok(paths)
}

/// Print a summary to stdout
pub fn print_summary(report: &AnalysisReport) {
    println!("\n=== RESULT ANALYSIS SUMMARY ===\n");
    println!("Records: {}", report.metadata.total_records);
    println!("Scenarios: {}", report.metadata.scenarios.join(", "));
    if report.metadata.load.files_skipped > 0 {
        println!("Skipped files: {}", report.metadata.load.files_skipped);
    }

    if !report.pairings.is_empty() {
        println!("\nOrigin Load Reduction:");
        for p in &report.pairings {
            println!(
                "  {} / {} peers: {:.1}%",
                p.scenario, p.num_peers, p.origin.reduction_pct
            );
        }
    }

    let flagged: usize = report
        .families
        .iter()
        .filter_map(|f| f.insights.value())
        .map(|s| s.insights.len())
        .sum();
    println!("\nInsights: {} flagged across {} families", flagged, report.families.len());
    for family in &report.families {
        if let Some(set) = family.insights.value() {
            for insight in &set.insights {
                let (metric, a, b, _) = insight.as_tuple();
                println!("  [{}] {} vs {}", metric, a, b);
            }
        }
    }

    println!("Tables: {}", report.tables.len());
    println!();
}
