/// HSR assessment tool: runs every species against every land-use scenario
/// and writes the result records (and any per-species failures) as JSON.
///
/// Inputs are JSON files on one shared grid:
///   --baseline   BaselineInputs (baseline land cover, reference land cover,
///                baseline urban probability, elevation, countries, cities)
///   --scenario   Scenario (name, horizon land cover, horizon urban probability)
///   --species    array of SpeciesRecord
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use hsr_core::habitat::SpeciesRecord;
use hsr_core::pipeline::BaselineInputs;
use hsr_core::{Analysis, AnalysisConfig, Scenario};
use serde::de::DeserializeOwned;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "assess", about = "Estimate urban and non-urban habitat-suitable-range change per species")]
struct Args {
    /// Baseline layers (JSON)
    #[arg(long)]
    baseline: PathBuf,

    /// Scenario file (JSON); repeat for several scenarios
    #[arg(long = "scenario", required = true)]
    scenarios: Vec<PathBuf>,

    /// Species file holding a JSON array of records; repeatable
    #[arg(long = "species", required = true)]
    species: Vec<PathBuf>,

    /// Analysis config (JSON); omitted fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the per-reduction cell ceiling
    #[arg(long)]
    max_cells: Option<u64>,

    /// Sample oversized area sums on a coarse lattice instead of failing
    #[arg(long)]
    best_effort_sums: bool,

    /// Output file
    #[arg(short, long, default_value = "hsr_results.json")]
    output: PathBuf,

    /// Increase log detail (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Exit non-zero if any species failed
    #[arg(long)]
    strict: bool,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "hsr_core=info,assess=info,warn",
        1 => "hsr_core=debug,assess=debug,warn",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(args: &Args) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
            AnalysisConfig::from_json_str(&text).with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => AnalysisConfig::default(),
    };
    if let Some(max_cells) = args.max_cells {
        config.reduction.max_cells = max_cells;
    }
    if args.best_effort_sums {
        config.reduction.best_effort_sums = true;
    }
    config.validate().context("Invalid config overrides")?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = load_config(&args)?;
    let baseline: BaselineInputs = read_json(&args.baseline)?;
    let scenarios = args
        .scenarios
        .iter()
        .map(|p| read_json::<Scenario>(p))
        .collect::<Result<Vec<_>>>()?;
    let mut species: Vec<SpeciesRecord> = Vec::new();
    for path in &args.species {
        species.extend(read_json::<Vec<SpeciesRecord>>(path)?);
    }
    info!(scenarios = scenarios.len(), species = species.len(), "loaded inputs");

    let analysis = Analysis::new(config, baseline).context("Baseline layers rejected")?;
    let report = analysis.run(&scenarios, &species).context("Assessment aborted")?;

    let json = serde_json::to_string_pretty(&report).context("Failed to serialise results")?;
    fs::write(&args.output, json).with_context(|| format!("Cannot write {}", args.output.display()))?;
    info!(
        records = report.records.len(),
        failures = report.failures.len(),
        output = %args.output.display(),
        "wrote results"
    );

    if args.strict && !report.failures.is_empty() {
        bail!("{} species assessment(s) failed", report.failures.len());
    }
    Ok(())
}
