use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use at_engine::{spawn_interrupt_listener, Autotuner, CompileRunExecutor, TunerSettings};
use at_optimizer::shutdown_channel;

#[derive(Parser, Debug)]
#[command(name = "autotune", about = "Search compiler and runtime parameters for the fastest build")]
struct Cli {
    /// Tuning input (`key=value` lines)
    #[arg(short, long, default_value = "config.txt")]
    input: PathBuf,

    /// Concurrent trials in static mode
    #[arg(short, long)]
    workers: Option<usize>,

    /// Experiment directory name
    #[arg(long)]
    exp_name: Option<String>,

    /// JSON settings file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Seed every algorithm RNG
    #[arg(long)]
    seed: Option<u64>,

    /// Kill a trial's program after this many seconds
    #[arg(long)]
    trial_timeout: Option<f64>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut settings = TunerSettings::load(cli.settings.as_deref())?.apply_env()?;
    if let Some(workers) = cli.workers {
        settings = settings.with_max_workers(workers);
    }
    if let Some(name) = cli.exp_name {
        settings = settings.with_experiment_name(name);
    }
    if let Some(seed) = cli.seed {
        settings = settings.with_seed(seed);
    }
    if let Some(secs) = cli.trial_timeout {
        let timeout = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("invalid --trial-timeout {secs}"))?;
        settings = settings.with_trial_timeout(timeout);
    }

    let executor = Arc::new(CompileRunExecutor::new(settings.executor.clone()));
    let tuner = Autotuner::from_input_file(&cli.input, settings, executor)
        .with_context(|| format!("cannot start tuning from {}", cli.input.display()))?;

    let (trigger, shutdown) = shutdown_channel();
    let listener = spawn_interrupt_listener(trigger);
    let report = tuner.run(shutdown).await?;
    listener.abort();

    println!("{report}");
    println!("Results: {}", report.experiment_dir.display());
    Ok(())
}
