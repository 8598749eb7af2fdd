//! Result analysis CLI for MicroCloud P2P simulations.
//!
//! Normalizes result files, aggregates metrics across configurations and
//! flags scaling anomalies relative to a reference peer count.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, Context, Result};

use microcloud_analysis::analysis::aggregation::{KeyField, KeyValue};
use microcloud_analysis::analysis::{self, profile::profile_record, types::AnalysisReport};
use microcloud_analysis::config::AnalysisConfig;
use microcloud_analysis::config_loader::{apply_overrides, load_config_or_default, AnalysisCliOverrides};

#[derive(Parser)]
#[command(name = "result-analyzer")]
#[command(about = "Result normalization and comparative analysis for MicroCloud simulations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory (searched recursively) or single result file
    #[arg(short, long, default_value = "results")]
    results_dir: PathBuf,

    /// Output directory for reports and tables
    #[arg(short, long, default_value = "analysis")]
    output: PathBuf,

    /// Analysis configuration (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of parallel workers (0 = auto-detect)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,

    /// Only load result files whose name matches this regex
    #[arg(long)]
    pattern: Option<String>,

    /// Peer count of the reference configuration for insights
    #[arg(long)]
    reference_peers: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run full analysis (JSON + text report, all tables)
    Full,

    /// Write the canonical tables as CSV only
    Tables,

    /// Comparative insights only
    Insights {
        /// Restrict to one scenario
        #[arg(long)]
        scenario: Option<String>,
    },

    /// Print the normalized record and per-record analysis of one file
    Inspect {
        /// Result file to inspect
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    // Set thread pool size
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let mut config = load_config_or_default(cli.config.as_deref())?;
    apply_overrides(
        &mut config,
        &AnalysisCliOverrides {
            reference_peers: cli.reference_peers,
            file_pattern: cli.pattern.clone(),
        },
    )?;

    match cli.command {
        Commands::Inspect { file } => inspect(&file)?,
        Commands::Full => {
            let Some(report) = analyze(&cli.results_dir, &cli.output, &config)? else {
                return Ok(());
            };
            analysis::generate_json_report(&report, &cli.output.join("full_report.json"))?;
            analysis::generate_text_report(&report, &cli.output.join("report.txt"))?;
            analysis::write_tables(&report.tables, &cli.output)?;
            analysis::print_summary(&report);
        }
        Commands::Tables => {
            let Some(report) = analyze(&cli.results_dir, &cli.output, &config)? else {
                return Ok(());
            };
            for path in analysis::write_tables(&report.tables, &cli.output)? {
                println!("{}", path.display());
            }
        }
        Commands::Insights { scenario } => {
            let Some(mut report) = analyze(&cli.results_dir, &cli.output, &config)? else {
                return Ok(());
            };
            if let Some(scenario) = scenario {
                let wanted = KeyValue::Text(scenario);
                report
                    .families
                    .retain(|f| f.family.key.get(KeyField::Scenario) == Some(&wanted));
            }
            write_insights(&report, &cli.output)?;
        }
    }

    Ok(())
}

/// Load every result file and run the analysis.
///
/// Returns `None` when nothing usable was found; the output directory is
/// only created once there is something to write.
fn analyze(
    results_dir: &Path,
    output: &Path,
    config: &AnalysisConfig,
) -> Result<Option<AnalysisReport>> {
    if !results_dir.exists() {
        bail!("Results directory not found: {}", results_dir.display());
    }

    // Load records in parallel
    let outcome = analysis::load_results_from(results_dir, config)?;
    if let Some(warning) = outcome.warning_summary(config.warning_sample_size) {
        log::warn!("{}", warning);
    }

    if outcome.records.is_empty() {
        log::warn!(
            "No usable result records in {}; no output written",
            results_dir.display()
        );
        return Ok(None);
    }

    let load = outcome.summary(config.warning_sample_size);
    let source = results_dir.display().to_string();
    let report = analysis::run_analysis(outcome.records, config, load, &source)?;

    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;

    log::info!("Analysis complete. Output in {}", output.display());
    Ok(Some(report))
}

fn write_insights(report: &AnalysisReport, output: &Path) -> Result<()> {
    let path = output.join("insights.json");
    let json = serde_json::to_string_pretty(&report.families)
        .context("Failed to serialize insights to JSON")?;
    fs::write(&path, json)
        .with_context(|| format!("Failed to write insights to {}", path.display()))?;

    for family in &report.families {
        println!("\n{}:", family.family.label);
        match family.insights.value() {
            Some(set) if set.insights.is_empty() => println!("  no flags"),
            Some(set) => {
                for insight in &set.insights {
                    println!("  - {}", insight.message);
                }
            }
            None => println!("  insufficient data"),
        }
    }

    log::info!("Insights written to {}", path.display());
    Ok(())
}

fn inspect(file: &Path) -> Result<()> {
    let record = analysis::loader::load_result_file(file)?;
    let profile = profile_record(&record);

    let value = serde_json::json!({
        "record": record,
        "profile": profile,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&value).context("Failed to serialize record")?
    );
    Ok(())
}
