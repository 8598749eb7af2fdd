use crate::config::AnalysisConfig;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::Path;

/// Load and parse analysis configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<AnalysisConfig> {
    info!("Loading analysis configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open config file '{}'", config_path.display()))?;

    let config: AnalysisConfig = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse config file '{}'", config_path.display()))?;

    config.validate()?;

    Ok(config)
}

/// Load the configuration if a path was given, otherwise use defaults
pub fn load_config_or_default(config_path: Option<&Path>) -> Result<AnalysisConfig> {
    match config_path {
        Some(path) => load_config(path),
        None => {
            info!("No configuration file given, using default thresholds");
            Ok(AnalysisConfig::default())
        }
    }
}

/// CLI arguments that can override YAML settings
#[derive(Debug, Clone, Default)]
pub struct AnalysisCliOverrides {
    pub reference_peers: Option<u64>,
    pub file_pattern: Option<String>,
}

/// Apply CLI overrides to an analysis configuration
pub fn apply_overrides(config: &mut AnalysisConfig, overrides: &AnalysisCliOverrides) -> Result<()> {
    if let Some(peers) = overrides.reference_peers {
        info!("Overriding reference peer count: {} -> {}", config.reference_peers, peers);
        config.reference_peers = peers;
    }

    if let Some(pattern) = &overrides.file_pattern {
        info!("Restricting result files to pattern: {}", pattern);
        config.file_pattern = Some(pattern.clone());
    }

    // Re-validate after applying overrides
    config.validate()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let yaml = r#"
reference_peers: 50
thresholds:
  anchor_load_factor: 2.0
scenarios:
  high_churn: "churn_heavy"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.reference_peers, 50);
        assert_eq!(config.thresholds.anchor_load_factor, 2.0);
        assert_eq!(config.thresholds.density_factor, 0.8);
        assert_eq!(config.scenarios.high_churn, "churn_heavy");
        assert_eq!(config.scenarios.scalability, "scalability");
    }

    #[test]
    fn test_load_config_rejects_invalid_thresholds() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "thresholds:\n  propagation_rate_factor: -1.0\n").unwrap();

        assert!(load_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = AnalysisConfig::default();
        let overrides = AnalysisCliOverrides {
            reference_peers: Some(100),
            file_pattern: Some("^scalability_".to_string()),
        };

        apply_overrides(&mut config, &overrides).unwrap();
        assert_eq!(config.reference_peers, 100);
        assert_eq!(config.file_pattern.as_deref(), Some("^scalability_"));
    }

    #[test]
    fn test_apply_overrides_rejects_bad_pattern() {
        let mut config = AnalysisConfig::default();
        let overrides = AnalysisCliOverrides {
            reference_peers: None,
            file_pattern: Some("[unclosed".to_string()),
        };

        assert!(apply_overrides(&mut config, &overrides).is_err());
    }
}
