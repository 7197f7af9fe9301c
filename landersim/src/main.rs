use landersim::{ScenarioConfig, Scenario, MissionPhase};
use landersim::{bench_index_build, bench_queries};

use clap::Parser;
use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser, Debug)]
struct Args {
    /// Scenario file under `scenarios/`
    #[arg(short, default_value = "default.yaml")]
    file_name: String,

    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run the octree benchmarks instead of a scenario
    #[arg(long)]
    bench: bool,
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name);
    let file = File::open(&config_path)?;
    let reader = BufReader::new(file);
    let scenario_cfg: ScenarioConfig = serde_yaml::from_reader(reader)?;

    Ok(scenario_cfg)
}

fn init_logging(level: &str) -> Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    if args.bench {
        bench_index_build();
        bench_queries();
        return Ok(());
    }

    let scenario_cfg = load_scenario_from_yaml(&args.file_name)?;
    let mut scenario = Scenario::build_scenario(scenario_cfg)?;

    let h = scenario.parameters.h0;
    let t_end = scenario.parameters.t_end;
    scenario.launch();

    // once a second of simulated time
    let report_every = (1.0 / h).round().max(1.0) as usize;
    let mut tick = 0usize;

    while scenario.time() < t_end {
        let report = scenario.step(h);
        tick += 1;

        if tick % report_every == 0 {
            info!(
                t = %format!("{:.2}", report.t),
                altitude = ?report.altitude,
                speed = %format!("{:.3}", report.velocity.norm()),
                fuel = %format!("{:.1}", report.fuel),
                "flight"
            );
        }

        if report.phase.is_over() {
            break;
        }
    }

    match scenario.phase() {
        MissionPhase::Landed { inside: true } => info!(t = scenario.time(), "landed on target"),
        MissionPhase::Landed { inside: false } => info!(t = scenario.time(), "landed outside the target zone"),
        MissionPhase::Crashed => info!(t = scenario.time(), "crashed"),
        MissionPhase::Flying | MissionPhase::Standby => info!(t = scenario.time(), "time limit reached"),
    }

    Ok(())
}
