use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use camp_core::CampaignError;
use camp_design::generate;
use camp_exp::layout::{campaign_root, campaign_timestamp};
use camp_exp::{
    plan, run_campaign, write_design_csv, CampaignOpts, DryRunEngine, Engine, ProcessEngine,
};
use camp_spec::{load_spec, RunSetting, RunSpec};
use chrono::Local;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Name of the specification copy stored in every campaign root.
const SPEC_COPY: &str = "campaign_spec.txt";
/// Exit code when the campaign ran but at least one job failed.
const JOBS_FAILED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "camp", about = "Simulation campaign orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Materialize and execute every job of a campaign.
    Run(RunArgs),
    /// List the planned experiments without touching the filesystem.
    Plan(SpecArgs),
    /// Print the sensitivity design as CSV.
    Design(SpecArgs),
    /// Parse the specification and resolve its design.
    Validate(SpecArgs),
}

#[derive(ClapArgs, Debug)]
struct SpecArgs {
    /// Campaign specification (`key: value` lines).
    #[arg(long, default_value = "campaign.txt")]
    spec: PathBuf,
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    #[command(flatten)]
    spec: SpecArgs,
    /// Result root; the campaign directory is created beneath it.
    #[arg(long, default_value = "results")]
    out: PathBuf,
    /// Engine program followed by its arguments.
    #[arg(long, num_args = 1.., allow_hyphen_values = true, value_name = "PROGRAM")]
    engine: Vec<String>,
    /// Validate job artifacts instead of running an engine.
    #[arg(long, conflicts_with = "engine")]
    dry_run: bool,
    /// Campaign directory name instead of the current local time.
    #[arg(long)]
    timestamp: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            let code = err
                .downcast_ref::<CampaignError>()
                .map(CampaignError::exit_code)
                .unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn execute(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    match cli.command {
        Command::Run(args) => run(args),
        Command::Plan(args) => print_plan(&args),
        Command::Design(args) => print_design(&args),
        Command::Validate(args) => validate(&args),
    }
}

fn init_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load(args: &SpecArgs) -> Result<RunSpec, Box<dyn Error>> {
    let spec = load_spec(&args.spec)?;
    init_logging(spec.setting(RunSetting::Debug));
    for key in &spec.ignored_keys {
        warn!(key = %key, "ignored unrecognised specification key");
    }
    Ok(spec)
}

fn run(args: RunArgs) -> Result<ExitCode, Box<dyn Error>> {
    let spec = load(&args.spec)?;
    let engine: Box<dyn Engine> = match args.engine.split_first() {
        _ if args.dry_run => Box::new(DryRunEngine),
        Some((program, rest)) => Box::new(ProcessEngine::new(program, rest)),
        None => return Err("either --engine <PROGRAM> [ARGS]... or --dry-run is required".into()),
    };
    let opts = CampaignOpts {
        output_root: args.out,
        timestamp: args.timestamp,
        engine: engine.as_ref(),
    };
    let report = run_campaign(&spec, &opts)?;

    // Keep the exact input next to the results.
    fs::copy(&args.spec.spec, report.campaign_root.join(SPEC_COPY))?;

    println!(
        "{}: {} complete, {} failed, {} not dispatched",
        report.campaign_root.display(),
        report.totals.complete,
        report.totals.failed,
        report.totals.not_dispatched
    );
    if report.is_success() {
        return Ok(ExitCode::SUCCESS);
    }
    for job in report.failed_jobs() {
        eprintln!(
            "Sensitivity_{}/Run_{}: {}",
            job.sensitivity_index,
            job.replicate_index,
            job.status.error.as_deref().unwrap_or("not dispatched")
        );
    }
    Ok(ExitCode::from(JOBS_FAILED))
}

fn print_plan(args: &SpecArgs) -> Result<ExitCode, Box<dyn Error>> {
    let spec = load(args)?;
    let design = generate(&spec)?;
    let root = campaign_root(Path::new("results"), &campaign_timestamp(&Local::now()));
    let experiments = plan(&spec, &design, &root)?;
    println!("{:>11}  {:>5}  {:<24}  path", "sensitivity", "run", "label");
    for experiment in &experiments {
        println!(
            "{:>11}  {:>5}  {:<24}  {}",
            experiment.sensitivity_index,
            experiment.replicate_index,
            experiment.label,
            experiment.output_path.display()
        );
    }
    info!(
        experiments = experiments.len(),
        workers = spec.concurrency.min(experiments.len()),
        "campaign planned"
    );
    Ok(ExitCode::SUCCESS)
}

fn print_design(args: &SpecArgs) -> Result<ExitCode, Box<dyn Error>> {
    let spec = load(args)?;
    let design = generate(&spec)?;
    write_design_csv(io::stdout().lock(), &design)?;
    Ok(ExitCode::SUCCESS)
}

fn validate(args: &SpecArgs) -> Result<ExitCode, Box<dyn Error>> {
    let spec = load(args)?;
    let design = generate(&spec)?;
    println!(
        "{}: {} design rows x {} runs = {} jobs on {} cores ({} ignored keys)",
        args.spec.display(),
        design.len(),
        spec.replicate_count,
        design.len() * spec.replicate_count as usize,
        spec.concurrency,
        spec.ignored_keys.len()
    );
    Ok(ExitCode::SUCCESS)
}
