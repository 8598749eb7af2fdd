//! End-to-end analysis over a loaded record set.
//!
//! Runs only after every file has been loaded: aggregation and insight
//! generation need the complete record set.

use std::collections::BTreeSet;

use rayon::prelude::*;

use crate::config::{AnalysisConfig, ScenarioNames};

use super::aggregation::{aggregate, DEFAULT_GROUP_KEY};
use super::derive::{pair_with_baseline, BaselinePairing};
use super::insights::generate_insights;
use super::profile::{build_families, profile_record, ConfigurationFamily, RecordProfile};
use super::tables::{self, Table};
use super::types::*;

/// Build every canonical table.
///
/// Tables that need a named scenario group are left out when that group is
/// empty; the group names are returned alongside.
pub fn build_tables(
    records: &[CanonicalMetricRecord],
    pairings: &[BaselinePairing],
    families: &[ConfigurationFamily],
    scenarios: &ScenarioNames,
) -> (Vec<Table>, Vec<String>) {
    let mut built = vec![tables::summary_table(records), tables::fairness_table(records)];
    let mut empty_groups: BTreeSet<String> = BTreeSet::new();

    let grouped = [
        tables::baseline_vs_high_churn_table(records, scenarios),
        tables::churn_rate_table(records, scenarios),
        tables::scalability_table(records, scenarios),
        tables::latency_over_time_table(records, scenarios),
        tables::flash_crowd_summary_table(records, pairings, scenarios),
    ];
    for result in grouped {
        match result {
            Ok(table) => built.push(table),
            Err(AnalysisError::EmptyGroup { group }) => {
                empty_groups.insert(group);
            }
            Err(e) => log::warn!("Table skipped: {}", e),
        }
    }

    if !pairings.is_empty() {
        built.push(tables::origin_load_reduction_table(records, pairings));
    }
    built.push(tables::peer_count_stats_table(records));
    built.push(tables::flash_crowd_vs_normal_table(records));

    built.extend(
        families
            .iter()
            .filter(|f| f.configurations.len() > 1)
            .map(tables::peer_comparison_table),
    );

    for group in &empty_groups {
        log::info!("No '{}' records, related tables skipped", group);
    }

    (built, empty_groups.into_iter().collect())
}

/// Run every analysis stage over `records`
pub fn run_analysis(
    records: Vec<CanonicalMetricRecord>,
    config: &AnalysisConfig,
    load: LoadSummary,
    results_source: &str,
) -> Result<AnalysisReport, AnalysisError> {
    if records.is_empty() {
        return Err(AnalysisError::NoRecords {
            source_desc: results_source.to_string(),
        });
    }

    log::info!("Analyzing {} records", records.len());

    let groups = aggregate(&records, &DEFAULT_GROUP_KEY).into_values().collect();
    let pairings = pair_with_baseline(&records);

    let record_profiles: Vec<RecordProfile> = records.par_iter().map(profile_record).collect();
    let families = build_families(&record_profiles);

    let family_analyses: Vec<FamilyAnalysis> = families
        .iter()
        .map(|family| FamilyAnalysis {
            family: family.clone(),
            insights: generate_insights(
                &family.configurations,
                config.reference_peers,
                &config.thresholds,
            ),
        })
        .collect();

    let flagged: usize = family_analyses
        .iter()
        .filter_map(|f| f.insights.value())
        .map(|s| s.insights.len())
        .sum();
    log::info!(
        "{} configuration families, {} insights flagged",
        family_analyses.len(),
        flagged
    );

    let (tables, empty_groups) = build_tables(&records, &pairings, &families, &config.scenarios);

    let scenarios: BTreeSet<String> = records.iter().map(|r| r.scenario.clone()).collect();

    Ok(AnalysisReport {
        metadata: AnalysisMetadata {
            analysis_timestamp: chrono::Utc::now().to_rfc3339(),
            results_source: results_source.to_string(),
            total_records: records.len(),
            scenarios: scenarios.into_iter().collect(),
            reference_peers: config.reference_peers,
            load,
        },
        groups,
        pairings,
        record_profiles,
        families: family_analyses,
        tables,
        empty_groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::record;

    #[test]
    fn test_no_records_is_named_condition() {
        let result = run_analysis(vec![], &AnalysisConfig::default(), LoadSummary::default(), "results");
        assert_eq!(
            result.unwrap_err(),
            AnalysisError::NoRecords {
                source_desc: "results".to_string()
            }
        );
    }

    #[test]
    fn test_empty_groups_reported() {
        let records = vec![record("scalability", 20), record("scalability", 100)];
        let report =
            run_analysis(records, &AnalysisConfig::default(), LoadSummary::default(), "mem").unwrap();

        assert_eq!(report.empty_groups, vec!["flash_crowd", "high_churn"]);
        assert!(report.tables.iter().any(|t| t.name == "scalability_metrics_table"));
        assert!(report.tables.iter().any(|t| t.name == "peer_comparison_scalability_churn_0"));
        assert!(!report.tables.iter().any(|t| t.name == "baseline_vs_high_churn"));
        assert_eq!(report.metadata.scenarios, vec!["scalability"]);
    }
}
