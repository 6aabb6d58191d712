use anyhow::Context;
use clap::Parser;
use generator::scenario::{build_scenario, ScenarioConfig};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Seismic array beamforming workflow driver")]
struct Args {
    /// Run one synthetic scenario offline and emit a summary
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Load a scenario config from YAML
    #[arg(long)]
    scenario: Option<PathBuf>,
    /// Analysis method (FK, CAPON, DLS, PWS, SWP)
    #[arg(long, default_value = "FK")]
    method: String,
    /// Sliding window length in seconds
    #[arg(long, default_value_t = 4.0)]
    win_len: f64,
    /// Slowness grid half width in s/km
    #[arg(long, default_value_t = 0.2)]
    slowness_max: f64,
    /// Slowness grid step in s/km
    #[arg(long, default_value_t = 0.02)]
    slowness_step: f64,
    /// Where to append the JSON run reports
    #[arg(long, default_value = "tools/data/offline_runs.jsonl")]
    report: PathBuf,
}

fn load_scenario(path: Option<PathBuf>) -> anyhow::Result<ScenarioConfig> {
    match path {
        Some(path) => {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("reading scenario config {}", path.display()))?;
            serde_yaml::from_str(&contents)
                .with_context(|| format!("parsing scenario config {}", path.display()))
        }
        None => Ok(ScenarioConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = if let Some(path) = args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(
            &args.method,
            args.win_len,
            args.slowness_max,
            args.slowness_step,
        )
    };

    if args.offline {
        let scenario = load_scenario(args.scenario)?;
        let traces = build_scenario(&scenario)?;
        let runner = Runner::new(workflow_config);
        let summary = runner.execute(&traces)?;

        println!(
            "Offline run -> method {}, {} records over {:.1}..{:.1} s, aperture {:.2} km",
            summary.method,
            summary.records.len(),
            summary.stime,
            summary.etime,
            summary.aperture_km
        );

        let line = serde_json::to_string(&summary).context("serializing the run summary")?;
        if let Some(parent) = args.report.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&args.report)
            .with_context(|| format!("opening report {}", args.report.display()))?;
        writeln!(file, "{line}")?;
    }

    Ok(())
}
