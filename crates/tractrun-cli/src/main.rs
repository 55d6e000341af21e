//! tractrun CLI
//!
//! Batch dispatcher for the tractography pipeline: submits one cluster
//! job per subject specification, either given directly as KEY=VALUE
//! arguments or read from a batch file.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use tractrun_cli::dispatch::dispatch;
use tractrun_cli::submit::{DryRunScheduler, SbatchScheduler, Scheduler};
use tractrun_core::{config, tracing_init};

#[derive(Parser, Debug)]
#[command(name = "tractrun")]
#[command(version, about = "Submit tractography pipeline jobs to the cluster", long_about = None)]
struct Cli {
    /// KEY=VALUE tokens for one subject, or exactly one path to a batch
    /// file with one specification per line
    #[arg(required = true)]
    args: Vec<String>,

    /// Root directory for per-subject data; logs go to <DIR>/_logs
    #[arg(long, env = "SUBJECTS_DIR")]
    subjects_dir: Option<PathBuf>,

    /// Print sbatch command lines instead of submitting
    #[arg(long)]
    dry_run: bool,

    /// Emit structured JSON log lines
    #[arg(long)]
    log_json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_init::init_tracing("tractrun=info", cli.log_json);

    let mut config = config::load_config()?;
    if let Some(dir) = cli.subjects_dir {
        config.subjects_dir = dir;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        subjects_dir = %config.subjects_dir.display(),
        "Starting tractrun dispatcher"
    );

    let scheduler: Box<dyn Scheduler> = if cli.dry_run {
        Box::new(DryRunScheduler::new(config.slurm.clone()))
    } else {
        Box::new(SbatchScheduler::new(config.slurm.clone()))
    };

    let summary = dispatch(&config, scheduler.as_ref(), &cli.args)?;
    if !summary.is_success() {
        error!(
            submitted = summary.submitted,
            failed = summary.failed,
            "some submissions failed"
        );
        std::process::exit(1);
    }
    Ok(())
}
