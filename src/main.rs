use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use hpc_workload::config::{BackendConfig, ExperimentDescriptor};
use hpc_workload::context::Backend;
use hpc_workload::db::job::load::latest_uncleaned;
use hpc_workload::db::open::open_db;
use hpc_workload::format::OutputFormat;
use hpc_workload::job::controller::{DEFAULT_MAX_WAIT, DEFAULT_STATUS_RETRIES};
use hpc_workload::job::record::checked_job_id;
use hpc_workload::job::WaitPolicy;
use hpc_workload::remote::ssh::SshExecutor;
use hpc_workload::runner::{ExperimentRunner, RunOptions};
use hpc_workload::scheduler::QstatParser;
use hpc_workload::WorkingDirectory;

#[derive(Parser, Debug)]
#[command(name = "hpc-workload", version, about = "Run CI experiments as PBS/Torque jobs on a remote HPC system")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stage, submit and wait for an experiment, then print its logs
    Run(RunArgs),
    /// Remove the remote vTorque log directory of a job
    Clean(CleanArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Experiment description (JSON)
    #[arg(short, long)]
    experiment: PathBuf,
    /// Backend configuration, overrides the experiment's hpc_config
    #[arg(short, long)]
    backend: Option<PathBuf>,
    /// Directory holding the job ledger
    #[arg(short, long, default_value = ".")]
    work_dir: PathBuf,
    /// Fail if the job is still active after this many seconds, 0 waits forever
    #[arg(long, default_value_t = DEFAULT_MAX_WAIT.as_secs())]
    max_wait_secs: u64,
    /// Retries for a failing status query
    #[arg(long, default_value_t = DEFAULT_STATUS_RETRIES)]
    status_retries: u32,
    /// Remove the remote vTorque log directory after collecting logs
    #[arg(long)]
    clean_up: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Backend configuration
    #[arg(short, long)]
    backend: PathBuf,
    /// Job to clean, defaults to the latest uncleaned job in the ledger
    #[arg(short, long)]
    job_id: Option<String>,
    /// Directory holding the job ledger
    #[arg(short, long, default_value = ".")]
    work_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("terve! starting up :)");

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Clean(args) => clean(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let cwd = env::current_dir().context("Can't read current directory")?;
    let descriptor = ExperimentDescriptor::load(&args.experiment, &cwd)
        .with_context(|| format!("Invalid experiment {}", args.experiment.display()))?;
    let backend_path = descriptor.resolve_backend_config(args.backend.as_deref(), &cwd);
    let config = BackendConfig::load(&backend_path)
        .with_context(|| format!("Invalid backend configuration {}", backend_path.display()))?;

    let ssh = SshExecutor::new(&config);
    let backend = Backend { config: &config, executor: &ssh, transfer: &ssh, parser: &QstatParser };

    let mut policy = WaitPolicy::new(config.poll_interval());
    policy.max_wait = (args.max_wait_secs > 0).then(|| Duration::from_secs(args.max_wait_secs));
    policy.status_retries = args.status_retries;

    let wd = WorkingDirectory { path: args.work_dir };
    let conn = open_db(&wd).context("Can't open job ledger")?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, no longer waiting for the job");
            interrupt.cancel();
        }
    });

    let options = RunOptions { clean_up: args.clean_up };
    let report = ExperimentRunner::new(backend, policy)
        .with_ledger(&conn)
        .run(&descriptor, &options, &cancel)
        .await
        .with_context(|| format!("Experiment '{}' failed", descriptor.name()))?;

    println!("{}", args.format.render(&report)?);
    Ok(())
}

async fn clean(args: CleanArgs) -> Result<()> {
    let config = BackendConfig::load(&args.backend)
        .with_context(|| format!("Invalid backend configuration {}", args.backend.display()))?;
    let wd = WorkingDirectory { path: args.work_dir };
    let conn = open_db(&wd).context("Can't open job ledger")?;

    let job_id = match args.job_id {
        Some(job_id) => job_id,
        None => match latest_uncleaned(&conn)? {
            Some(entry) => entry.job_id,
            None => bail!("No --job-id given and no uncleaned job in the ledger"),
        },
    };
    let job_id = checked_job_id(&job_id).context("Refusing to clean")?;

    let ssh = SshExecutor::new(&config);
    let backend = Backend { config: &config, executor: &ssh, transfer: &ssh, parser: &QstatParser };
    ExperimentRunner::new(backend, WaitPolicy::new(config.poll_interval()))
        .with_ledger(&conn)
        .clean(job_id)
        .await;
    Ok(())
}
