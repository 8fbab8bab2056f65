//! ParamTune CLI
//!
//! Searches a solver's discrete parameter space for a configuration with a
//! lower PAR10 score on a benchmark set.
//!
//! Usage:
//!     paramtune tune --solver ./kissat --pcs kissat.pcs --instances cnfs/ --cpus 8
//!     paramtune diff kissat.pcs kissat_upd.pcs

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pt_data::{
    diff_defaults, generated_points_path, read_seed_points, updated_pcs_path, write_generated_points,
    write_pcs, BenchmarkSet, PcsLoader, SolverCopy,
};
use pt_optimizer::{
    AuxiliarySeed, ConstraintTable, ConstraintValidator, Evaluator, ProcessRunner, SearchConfig,
    SearchMode, SearchOutcome, SearchScheduler, SolverProtocol,
};

#[derive(Parser)]
#[command(name = "paramtune")]
#[command(version)]
#[command(about = "Discrete parameter search for SAT solvers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for a better solver configuration
    Tune(TuneArgs),

    /// List parameters whose defaults differ between two PCS files
    Diff {
        before: PathBuf,
        after: PathBuf,
    },
}

#[derive(clap::Args)]
struct TuneArgs {
    /// Solver binary
    #[arg(long)]
    solver: PathBuf,

    /// Parameter file (`name {v1, v2, ...}[default]` per line)
    #[arg(long)]
    pcs: PathBuf,

    /// Directory of benchmark instances
    #[arg(long)]
    instances: PathBuf,

    /// Extension of benchmark instance files
    #[arg(long, default_value = "cnf")]
    extension: String,

    /// JSON run file with `search`, `protocol` and `constraints` sections
    #[arg(long)]
    config: Option<PathBuf>,

    /// File of extra starting points, one `--name=value ...` line each
    #[arg(long)]
    seed_points: Option<PathBuf>,

    /// Number of parallel evaluations
    #[arg(long)]
    cpus: Option<usize>,

    /// Maximum number of points to process
    #[arg(long)]
    max_points: Option<usize>,

    /// Wall-clock budget in seconds
    #[arg(long)]
    max_seconds: Option<u64>,

    /// Known score of the default point, skips its evaluation
    #[arg(long, requires = "time_limit")]
    default_score: Option<f64>,

    /// Solver time limit in seconds used until a record exists
    #[arg(long)]
    time_limit: Option<f64>,

    /// Stop at the first configuration that solves every instance
    #[arg(long)]
    solving: bool,

    /// Random seed of the candidate generator
    #[arg(long)]
    seed: Option<u64>,

    /// Do not evaluate the built-in kissat presets
    #[arg(long)]
    no_presets: bool,

    /// Directory for the generated-points file and solving-mode logs
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

/// Contents of a `--config` file; every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunFile {
    search: SearchConfig,
    protocol: SolverProtocol,
    constraints: Option<ConstraintTable>,
}

impl RunFile {
    fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }
}

fn enable_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn search_config(base: SearchConfig, args: &TuneArgs) -> SearchConfig {
    let mut config = base;
    if let Some(cpus) = args.cpus {
        config = config.with_concurrency(cpus);
    }
    if let Some(n) = args.max_points {
        config = config.with_max_points(n);
    }
    if let Some(secs) = args.max_seconds {
        config = config.with_max_duration(Duration::from_secs(secs));
    }
    match (args.default_score, args.time_limit) {
        (Some(score), Some(limit)) => config = config.with_default_score(score, limit),
        (None, Some(limit)) => config.solver_time_limit = Some(limit),
        _ => {}
    }
    if args.solving {
        config = config.with_mode(SearchMode::Solving);
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if config.is_solving() && config.solve_log_dir.is_none() {
        config = config.with_solve_log_dir(&args.output_dir);
    }
    config
}

async fn cmd_tune(args: TuneArgs) -> anyhow::Result<()> {
    let run_file = RunFile::load(args.config.as_deref())?;
    let config = search_config(run_file.search, &args);

    let space = PcsLoader::new().load(&args.pcs)?;
    let instances = BenchmarkSet::from_dir(&args.instances, &args.extension)?;
    let label = instances.label();
    info!("{} parameters, {} instances", space.len(), instances.len());

    let table = run_file.constraints.unwrap_or_else(ConstraintTable::kissat);
    let validator = ConstraintValidator::new(&space, &table);

    let seed_points = match &args.seed_points {
        Some(path) => read_seed_points(path, &space, &space.default_point())?,
        None => Vec::new(),
    };
    let seeds = if args.no_presets {
        Vec::new()
    } else {
        AuxiliarySeed::kissat_presets()
    };

    let solver = SolverCopy::create(&args.solver)?;
    let runner = Arc::new(ProcessRunner::new(solver.path(), run_file.protocol));
    let evaluator = Evaluator::new(space.clone(), instances, runner);

    let outcome = SearchScheduler::new(config, space.clone(), validator, evaluator)?
        .with_seeds(seeds)
        .with_seed_points(seed_points)
        .run()
        .await?;
    drop(solver);

    write_results(&outcome, &space, &args, &label)
}

fn write_results(
    outcome: &SearchOutcome,
    space: &pt_types::ParameterSpace,
    args: &TuneArgs,
    label: &str,
) -> anyhow::Result<()> {
    let generated = generated_points_path(&args.output_dir, label);
    write_generated_points(&generated, &outcome.generated)?;

    info!(
        "{} points processed, {} generated, {} impossible and {} repeated points skipped",
        outcome.processed,
        outcome.generated.len(),
        outcome.stats.skipped_inadmissible,
        outcome.stats.skipped_duplicate
    );

    match outcome.record.best_score {
        Some(score) => {
            let updated = updated_pcs_path(&args.pcs);
            write_pcs(&updated, space, &outcome.record.best_point)?;
            println!("Best score: {score}");
            println!("Command: {}", outcome.record.best_command);
            if let Some(time) = outcome.record.max_instance_time {
                println!("Slowest instance: {time}");
            }
            println!("Configuration written to {}", updated.display());
        }
        None => println!("No configuration verified every instance"),
    }
    Ok(())
}

fn cmd_diff(before: &Path, after: &Path) -> anyhow::Result<()> {
    let loader = PcsLoader::new();
    let before_space = loader.load(before)?;
    let after_space = loader.load(after)?;

    let changes = diff_defaults(&before_space, &after_space);
    if changes.is_empty() {
        println!("No default differs");
    }
    for (name, old, new) in changes {
        println!("{name} : {old} -> {new}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    enable_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Tune(args) => cmd_tune(args).await,
        Commands::Diff { before, after } => cmd_diff(&before, &after),
    };
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
