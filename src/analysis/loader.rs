//! Result file discovery and loading.
//!
//! Files are parsed in parallel; each file either yields one canonical record
//! or is skipped with a warning. A bad file never aborts the batch.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use color_eyre::eyre::{bail, Context, Result};
use rayon::prelude::*;
use regex::Regex;

use crate::config::AnalysisConfig;

use super::derive::derive_metrics;
use super::normalize::{normalize_record, NormalizeError};
use super::types::*;

/// Match: "flash-crowd-100-peers.json"
static PEER_COUNT_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)-peers").expect("Invalid peer count hint regex"));

/// Why a single file could not be turned into a record
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} is not a result record: {source}")]
    Malformed {
        path: String,
        #[source]
        source: NormalizeError,
    },
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Records loaded from a batch of files, plus what was skipped
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub records: Vec<CanonicalMetricRecord>,
    pub skipped: Vec<SkippedFile>,
    pub discovered: usize,
}

impl LoadOutcome {
    /// Skip count with the first `sample` reasons, `None` when nothing was skipped
    pub fn warning_summary(&self, sample: usize) -> Option<String> {
        if self.skipped.is_empty() {
            return None;
        }
        let reasons: Vec<&str> = self
            .skipped
            .iter()
            .take(sample)
            .map(|s| s.reason.as_str())
            .collect();
        let more = self.skipped.len().saturating_sub(sample);
        let mut summary = format!(
            "{} of {} files skipped: {}",
            self.skipped.len(),
            self.discovered,
            reasons.join("; ")
        );
        if more > 0 {
            summary.push_str(&format!(" (and {} more)", more));
        }
        Some(summary)
    }

    pub fn summary(&self, sample: usize) -> LoadSummary {
        LoadSummary {
            files_discovered: self.discovered,
            files_loaded: self.records.len(),
            files_skipped: self.skipped.len(),
            skip_reasons: self
                .skipped
                .iter()
                .take(sample)
                .map(|s| s.reason.clone())
                .collect(),
        }
    }
}

/// Peer count encoded in a file name like `flash-crowd-100-peers.json`
pub fn peer_count_hint(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    PEER_COUNT_HINT.captures(name)?.get(1)?.as_str().parse().ok()
}

/// Find result files under `root`, recursively, sorted by path.
///
/// A file path is accepted as is. Names listed in `skip_files` and names not
/// matching the configured pattern are left out.
pub fn discover_result_files(root: &Path, config: &AnalysisConfig) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        bail!("Results path does not exist: {}", root.display());
    }
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let pattern = config.file_regex()?;
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir)
            .with_context(|| format!("Failed to read directory {}", dir.display()))?;

        for entry in entries {
            let path = entry
                .with_context(|| format!("Failed to read entry in {}", dir.display()))?
                .path();

            if path.is_dir() {
                pending.push(path);
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(".json") {
                continue;
            }
            if config.skip_files.iter().any(|s| s == name) {
                log::debug!("Skipping {}", path.display());
                continue;
            }
            if let Some(re) = &pattern {
                if !re.is_match(name) {
                    continue;
                }
            }
            files.push(path);
        }
    }

    files.sort();
    log::info!("Found {} result files under {}", files.len(), root.display());
    Ok(files)
}

/// Load, normalize and derive one result file
pub fn load_result_file(path: &Path) -> Result<CanonicalMetricRecord, LoadError> {
    let display = path.display().to_string();

    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: display.clone(),
        source,
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|source| LoadError::Parse {
            path: display.clone(),
            source,
        })?;

    let mut record = normalize_record(&value, &display).map_err(|source| LoadError::Malformed {
        path: display.clone(),
        source,
    })?;

    if record.num_peers == 0 {
        if let Some(hint) = peer_count_hint(path) {
            log::debug!("{}: numPeers taken from file name ({})", display, hint);
            record.num_peers = hint;
        }
    }

    Ok(derive_metrics(record))
}

/// Load all files in parallel; results keep the order of `paths`
pub fn load_results(paths: &[PathBuf]) -> LoadOutcome {
    log::info!("Loading {} result files in parallel...", paths.len());

    let loaded: Vec<(PathBuf, Result<CanonicalMetricRecord, LoadError>)> = paths
        .par_iter()
        .map(|path| (path.clone(), load_result_file(path)))
        .collect();

    let mut outcome = LoadOutcome {
        discovered: paths.len(),
        ..Default::default()
    };

    for (path, result) in loaded {
        match result {
            Ok(record) => {
                log::debug!(
                    "Loaded {}: scenario={}, numPeers={}",
                    path.display(),
                    record.scenario,
                    record.num_peers
                );
                outcome.records.push(record);
            }
            Err(e) => {
                log::warn!("Skipping {}", e);
                outcome.skipped.push(SkippedFile {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    log::info!(
        "Loaded {} records ({} skipped)",
        outcome.records.len(),
        outcome.skipped.len()
    );
    outcome
}

/// Discover and load every result file under `root`
pub fn load_results_from(root: &Path, config: &AnalysisConfig) -> Result<LoadOutcome> {
    let files = discover_result_files(root, config)?;
    Ok(load_results(&files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LEGACY: &str = r#"{
        "scenario": "scalability",
        "config": {"numPeers": 20, "baselineMode": false},
        "results": {"peerRequests": 80, "originRequests": 20}
    }"#;

    const DASHBOARD_NO_PEERS: &str = r#"{
        "metadata": {"scenario": "flash_crowd"},
        "configuration": {"joinRate": 10},
        "results": {"microcloud": {"peerRequests": 5}, "baseline": {"originRequests": 50}}
    }"#;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_peer_count_hint() {
        assert_eq!(peer_count_hint(Path::new("a/flash-crowd-100-peers.json")), Some(100));
        assert_eq!(peer_count_hint(Path::new("scalability_run.json")), None);
    }

    #[test]
    fn test_malformed_file_does_not_abort_batch() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();

        write(dir.path(), "good.json", LEGACY);
        write(dir.path(), "broken.json", "{ not json");
        write(&nested, "list.json", "[1, 2]");
        write(&nested, "flash-crowd-100-peers.json", DASHBOARD_NO_PEERS);
        write(dir.path(), "experiments_summary.json", "{}");
        write(dir.path(), "notes.txt", "ignored");

        let outcome = load_results_from(dir.path(), &AnalysisConfig::default()).unwrap();
        assert_eq!(outcome.discovered, 4);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.skipped.len(), 2);

        let flash = outcome
            .records
            .iter()
            .find(|r| r.scenario == "flash_crowd")
            .unwrap();
        assert_eq!(flash.num_peers, 100);
        assert_eq!(flash.paired_baseline.as_ref().unwrap().origin_requests, 50);

        let good = outcome.records.iter().find(|r| r.scenario == "scalability").unwrap();
        assert_eq!(good.network_requests, Some(100));
        assert_eq!(good.network_cache_hit_ratio, Some(80.0));

        let summary = outcome.warning_summary(1).unwrap();
        assert!(summary.starts_with("2 of 4 files skipped"));
        assert!(summary.ends_with("(and 1 more)"));
    }

    #[test]
    fn test_file_pattern_and_single_file() {
        let dir = TempDir::new().unwrap();
        let keep = write(dir.path(), "scalability_20.json", LEGACY);
        write(dir.path(), "high_churn_20.json", LEGACY);

        let config = AnalysisConfig {
            file_pattern: Some("^scalability_".to_string()),
            ..Default::default()
        };
        let files = discover_result_files(dir.path(), &config).unwrap();
        assert_eq!(files, vec![keep.clone()]);

        let single = discover_result_files(&keep, &AnalysisConfig::default()).unwrap();
        assert_eq!(single, vec![keep]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(discover_result_files(&missing, &AnalysisConfig::default()).is_err());
        assert!(load_result_file(&missing).is_err());
    }
}
