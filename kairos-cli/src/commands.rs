use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use kairos_config::SchedulerKind;
use kairos_simulator::scenario::RandomWorkload;
use kairos_simulator::{compare_schedulers, verify_replay, RunReport, ScenarioSpec, Simulation};

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Configuration file; defaults to `config/kairos.yaml` plus `KAIROS_*` overrides
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one scenario and print its report
    Run(RunArgs),
    /// Run one scenario under both schedulers and compare digests
    Compare(CompareArgs),
    /// Cross-check schedulers on random workloads with increasing seeds
    Fuzz(FuzzArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Scenario file (YAML, tagged by `kind`)
    #[arg(short, long)]
    pub scenario: PathBuf,
    /// Fail unless the run reproduces this digest
    #[arg(long)]
    pub validate_hash: Option<String>,
    /// Override the configured scheduler
    #[arg(long, value_parser = parse_scheduler)]
    pub scheduler: Option<SchedulerKind>,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    #[arg(short, long)]
    pub scenario: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct FuzzArgs {
    /// First seed; every iteration uses the next one
    #[arg(long, default_value_t = 1)]
    pub seed: u64,
    #[arg(long, default_value_t = 10)]
    pub iterations: u64,
    #[arg(long, default_value_t = 64)]
    pub entities: u32,
    #[arg(long, default_value_t = 10_000)]
    pub events: u64,
}

fn parse_scheduler(value: &str) -> Result<SchedulerKind, String> {
    match value {
        "heap" => Ok(SchedulerKind::Heap),
        "calendar" => Ok(SchedulerKind::Calendar),
        other => Err(format!("unknown scheduler '{other}', expected heap or calendar")),
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut simulation = match &cli.config {
        Some(path) => Simulation::from_path(path)?,
        None => Simulation::load()?,
    };
    simulation.init_logging();

    match cli.command {
        Commands::Run(args) => {
            if let Some(kind) = args.scheduler {
                simulation.config_mut().controller.scheduler.kind = kind;
            }
            let spec = load_scenario(&args.scenario)?;
            let bootstrap = spec.bootstrap();
            let report = match args.validate_hash.as_deref() {
                Some(expected) => verify_replay(&simulation, bootstrap.as_ref(), expected)?,
                None => simulation.run(bootstrap.as_ref())?,
            };
            print_report(&report)
        }
        Commands::Compare(args) => {
            let spec = load_scenario(&args.scenario)?;
            let comparison = compare_schedulers(simulation.config(), spec.bootstrap().as_ref())?;
            println!("heap:     {}", comparison.heap.digest);
            println!("calendar: {}", comparison.calendar.digest);
            if !comparison.matches() {
                bail!("schedulers produced different traces");
            }
            Ok(())
        }
        Commands::Fuzz(args) => {
            for seed in args.seed..args.seed.saturating_add(args.iterations) {
                let workload = RandomWorkload::new(seed, args.entities, args.events);
                let comparison = compare_schedulers(simulation.config(), &workload)?;
                if !comparison.matches() {
                    bail!("seed {seed}: heap and calendar traces differ");
                }
                info!(seed, digest = %comparison.heap.digest, "seed agrees");
            }
            println!("{} seeds agree", args.iterations);
            Ok(())
        }
    }
}

fn load_scenario(path: &Path) -> anyhow::Result<ScenarioSpec> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    ScenarioSpec::from_yaml(&text).with_context(|| format!("parsing scenario {}", path.display()))
}

fn print_report(report: &RunReport) -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(report)?);
    Ok(())
}
