//! Analysis configuration.
//!
//! Every field has a default so that an empty (or absent) configuration file
//! reproduces the thresholds the experiment family was originally tuned with.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Thresholds used by the comparative insight generator.
///
/// Point thresholds are absolute percentage points; factors are multiples of
/// the reference value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightThresholds {
    /// Flag when reference minus other network cache hit ratio exceeds this.
    pub cache_hit_drop_pts: f64,
    /// Flag when other max anchor load exceeds reference times this.
    pub anchor_load_factor: f64,
    /// Flag when relative latency growth over the reference exceeds this.
    pub latency_growth_ratio: f64,
    /// Flag when reference minus other p2p efficiency exceeds this.
    pub p2p_efficiency_drop_pts: f64,
    /// Flag when reference minus other transfer success rate exceeds this.
    pub transfer_success_drop_pts: f64,
    /// Flag when other connection density falls below reference times this.
    pub density_factor: f64,
    /// Flag when other propagation rate falls below reference times this.
    pub propagation_rate_factor: f64,
    /// Flag when other p2p request ratio falls below reference times this.
    pub p2p_ratio_factor: f64,
}

impl Default for InsightThresholds {
    fn default() -> Self {
        Self {
            cache_hit_drop_pts: 10.0,
            anchor_load_factor: 1.5,
            latency_growth_ratio: 0.5,
            p2p_efficiency_drop_pts: 15.0,
            transfer_success_drop_pts: 5.0,
            density_factor: 0.8,
            propagation_rate_factor: 0.7,
            p2p_ratio_factor: 0.7,
        }
    }
}

/// Scenario names the report tables look for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioNames {
    pub high_churn: String,
    pub scalability: String,
    pub flash_crowd: String,
}

impl Default for ScenarioNames {
    fn default() -> Self {
        Self {
            high_churn: "high_churn".to_string(),
            scalability: "scalability".to_string(),
            flash_crowd: "flash_crowd".to_string(),
        }
    }
}

/// Top-level analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Peer count of the reference configuration for insights
    pub reference_peers: u64,
    pub thresholds: InsightThresholds,
    pub scenarios: ScenarioNames,
    /// File names ignored during discovery
    pub skip_files: Vec<String>,
    /// Optional regex a file name must match to be loaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_pattern: Option<String>,
    /// Number of skip reasons quoted in the load warning summary
    pub warning_sample_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            reference_peers: 20,
            thresholds: InsightThresholds::default(),
            scenarios: ScenarioNames::default(),
            skip_files: vec!["experiments_summary.json".to_string()],
            file_pattern: None,
            warning_sample_size: 5,
        }
    }
}

impl AnalysisConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let t = &self.thresholds;

        for (name, value) in [
            ("cache_hit_drop_pts", t.cache_hit_drop_pts),
            ("p2p_efficiency_drop_pts", t.p2p_efficiency_drop_pts),
            ("transfer_success_drop_pts", t.transfer_success_drop_pts),
            ("latency_growth_ratio", t.latency_growth_ratio),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::InvalidThreshold(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }

        for (name, value) in [
            ("anchor_load_factor", t.anchor_load_factor),
            ("density_factor", t.density_factor),
            ("propagation_rate_factor", t.propagation_rate_factor),
            ("p2p_ratio_factor", t.p2p_ratio_factor),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ValidationError::InvalidThreshold(format!(
                    "{} must be a finite positive factor, got {}",
                    name, value
                )));
            }
        }

        let scenarios = &self.scenarios;
        if scenarios.high_churn.is_empty()
            || scenarios.scalability.is_empty()
            || scenarios.flash_crowd.is_empty()
        {
            return Err(ValidationError::InvalidScenario(
                "scenario names cannot be empty".to_string(),
            ));
        }

        if let Some(pattern) = &self.file_pattern {
            Regex::new(pattern).map_err(|e| {
                ValidationError::InvalidPattern(format!("'{}': {}", pattern, e))
            })?;
        }

        Ok(())
    }

    /// Compiled file-name filter, if one is configured
    pub fn file_regex(&self) -> Result<Option<Regex>, ValidationError> {
        self.file_pattern
            .as_deref()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| ValidationError::InvalidPattern(format!("'{}': {}", p, e)))
            })
            .transpose()
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid insight threshold: {0}")]
    InvalidThreshold(String),
    #[error("Invalid scenario configuration: {0}")]
    InvalidScenario(String),
    #[error("Invalid file pattern: {0}")]
    InvalidPattern(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reference_peers, 20);
        assert_eq!(config.thresholds.anchor_load_factor, 1.5);
    }

    #[test]
    fn test_rejects_zero_factor() {
        let mut config = AnalysisConfig::default();
        config.thresholds.density_factor = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_rejects_bad_pattern() {
        let config = AnalysisConfig {
            file_pattern: Some("([".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: AnalysisConfig =
            serde_yaml::from_str("thresholds:\n  cache_hit_drop_pts: 12.5\n").unwrap();
        assert_eq!(config.thresholds.cache_hit_drop_pts, 12.5);
        assert_eq!(config.thresholds.p2p_efficiency_drop_pts, 15.0);
        assert_eq!(config.skip_files, vec!["experiments_summary.json".to_string()]);
    }
}
