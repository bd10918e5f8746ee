//! gpuq command-line interface
//!
//! Dispatches a backlog of compute jobs across the idle GPUs of a
//! single multi-device host.

mod jobs;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use gpuq_core::{clear_own_device_visibility, DispatchConfig, LaunchDiscipline};
use gpuq_dispatch::Supervisor;
use gpuq_monitor::{select_free, DeviceMonitor, NvmlMonitor};
use gpuq_runtime::{ProcessLauncher, ProcessLauncherConfig};

/// gpuq - device-aware job dispatcher for multi-GPU hosts
#[derive(Parser, Debug)]
#[command(name = "gpuq")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dispatch a backlog of jobs across the host's idle devices
    Run {
        /// File with one job argument string per line
        #[arg(long)]
        jobs: PathBuf,

        /// TOML config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of dispatch workers (default: one per job)
        #[arg(long)]
        workers: Option<usize>,

        /// Interpreter every job is launched with
        #[arg(long)]
        interpreter: Option<PathBuf>,

        /// Training entrypoint passed as the first argument
        #[arg(long)]
        entrypoint: Option<PathBuf>,

        /// Launch discipline (detached or attached)
        #[arg(long)]
        discipline: Option<String>,

        /// Seconds to sleep when no device is free
        #[arg(long)]
        poll_backoff_secs: Option<u64>,

        /// Seconds between worker activations
        #[arg(long)]
        stagger_secs: Option<u64>,

        /// Append-only run log path
        #[arg(long)]
        run_log: Option<PathBuf>,

        /// Where to write the JSON completion report
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show the current device snapshot
    Devices,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
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
    let _ = tracing::subscriber::set_global_default(subscriber);

    match cli.command {
        Commands::Run {
            jobs,
            config,
            workers,
            interpreter,
            entrypoint,
            discipline,
            poll_backoff_secs,
            stagger_secs,
            run_log,
            report,
        } => {
            let mut cfg = match config {
                Some(path) => DispatchConfig::from_file(&path)?,
                None => DispatchConfig::default(),
            };
            if workers.is_some() {
                cfg.workers = workers;
            }
            if let Some(interpreter) = interpreter {
                cfg.interpreter = interpreter;
            }
            if let Some(entrypoint) = entrypoint {
                cfg.entrypoint = Some(entrypoint);
            }
            if let Some(discipline) = discipline {
                cfg.discipline = discipline.parse::<LaunchDiscipline>()?;
            }
            if let Some(backoff) = poll_backoff_secs {
                cfg.poll_backoff_secs = backoff;
            }
            if let Some(stagger) = stagger_secs {
                cfg.stagger_secs = stagger;
            }
            if let Some(run_log) = run_log {
                cfg.run_log = Some(run_log);
            }
            if let Some(report) = report {
                cfg.report = Some(report);
            }

            run(&jobs, cfg).await
        }
        Commands::Devices => devices().await,
    }
}

async fn run(jobs_path: &std::path::Path, config: DispatchConfig) -> anyhow::Result<()> {
    // The dispatcher's own process must never look like a device
    // consumer; its visibility variable is cleared exactly once, here.
    clear_own_device_visibility();

    let jobs = jobs::load_jobs(jobs_path, &config)?;
    anyhow::ensure!(
        !jobs.is_empty(),
        "no jobs found in {}",
        jobs_path.display()
    );

    info!("Starting gpuq v{}", env!("CARGO_PKG_VERSION"));

    // Monitor-initialization failure is fatal: abort before any worker
    // starts.
    let monitor: Arc<dyn DeviceMonitor> = Arc::new(NvmlMonitor::init()?);
    let launcher = Arc::new(ProcessLauncher::new(ProcessLauncherConfig {
        discipline: config.discipline,
        run_log: config.run_log.clone(),
    }));

    let report_path = config.report.clone();
    let supervisor = Arc::new(Supervisor::new(config, monitor, launcher));

    let cancel = supervisor.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, shutting down");
            cancel.cancel();
        }
    });

    let report = supervisor.run(jobs).await?;

    if let Some(path) = &report_path {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        info!(path = %path.display(), "Completion report written");
    }

    info!(
        total = report.total_jobs,
        launched = report.launched,
        completed = report.completed,
        launch_failures = report.launch_failures,
        nonzero_exits = report.nonzero_exits,
        interrupted = report.interrupted,
        "Run complete"
    );
    Ok(())
}

async fn devices() -> anyhow::Result<()> {
    let monitor = NvmlMonitor::init()?;
    let snapshot = monitor.snapshot().await?;

    println!(
        "Devices: {} total, {} idle",
        snapshot.device_count(),
        snapshot.idle_count()
    );
    println!();
    println!(
        "{:<8} {:<10} {:<10} {:<11} {:<6}",
        "DEVICE", "COMPUTE%", "MEMORY%", "PROCESSES", "STATE"
    );
    for device in &snapshot.devices {
        println!(
            "{:<8} {:<10} {:<10} {:<11} {:<6}",
            device.index,
            device.utilization_compute,
            device.utilization_memory,
            device.running_process_count,
            if device.is_idle() { "idle" } else { "busy" }
        );
    }
    if let Some(index) = select_free(&snapshot) {
        println!();
        println!("Next dispatch binds device {}", index);
    }
    Ok(())
}
