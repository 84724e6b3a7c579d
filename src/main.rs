//! Service runtime demo.
//!
//! ```text
//! service-runtime [--config runtime.toml] [--shutdown-deadline-ms N] basic   [--work-ms N] [--shutdown-ms N]
//! service-runtime [--config runtime.toml] [--shutdown-deadline-ms N] workers [--messages N]
//! ```
//!
//! `basic` runs one task that registers a shutdown handler while it works.
//! `workers` runs a publisher and a subscriber connected by a channel.
//! Send SIGINT/SIGTERM/SIGQUIT at any time to stop early; a second signal
//! during shutdown exits immediately.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use service_runtime::config::{load_config, RuntimeConfig};
use service_runtime::observability::{logging, metrics};
use service_runtime::{task, BoxError, Context, ServiceRuntime, Task};

#[derive(Parser)]
#[command(name = "service-runtime")]
#[command(about = "Run tasks concurrently with graceful shutdown", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured shutdown deadline.
    #[arg(long)]
    shutdown_deadline_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// One task with a shutdown handler
    Basic {
        /// How long the task works before returning.
        #[arg(long, default_value_t = 1000)]
        work_ms: u64,

        /// How long the shutdown handler takes to disconnect.
        #[arg(long, default_value_t = 0)]
        shutdown_ms: u64,
    },
    /// A publisher and a subscriber running in parallel
    Workers {
        /// Number of messages to pass through the channel.
        #[arg(long, default_value_t = 10)]
        messages: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => RuntimeConfig::default(),
    };
    if let Some(deadline_ms) = cli.shutdown_deadline_ms {
        config.shutdown.deadline_ms = deadline_ms;
    }

    logging::init_logging(&config.observability);
    metrics::describe_metrics();

    tracing::info!(
        shutdown_deadline_ms = config.shutdown.deadline_ms,
        handle_signals = config.shutdown.handle_signals,
        "Configuration loaded"
    );

    let runtime = ServiceRuntime::from_config(&config);
    let tasks = match cli.command {
        Commands::Basic {
            work_ms,
            shutdown_ms,
        } => vec![basic(
            runtime.clone(),
            Duration::from_millis(work_ms),
            Duration::from_millis(shutdown_ms),
        )],
        Commands::Workers { messages } => workers(messages),
    };

    match runtime.run(tasks).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error running service: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn basic(runtime: ServiceRuntime, work: Duration, disconnect: Duration) -> Task {
    task(move |ctx: Context| async move {
        // Connections opened here would be closed by the handler.
        runtime.register_shutdown_handler([task(move |_| async move {
            tracing::info!(took = ?disconnect, "Disconnecting");
            tokio::time::sleep(disconnect).await;
            Ok(())
        })]);

        tracing::info!(work = ?work, "Working");
        tokio::select! {
            _ = tokio::time::sleep(work) => tracing::info!("Work finished"),
            _ = ctx.cancelled() => tracing::info!("Work interrupted"),
        }
        Ok(())
    })
}

fn workers(messages: u32) -> Vec<Task> {
    let (tx, mut rx) = mpsc::channel::<String>(messages.max(1) as usize);

    let publisher = task(move |ctx: Context| async move {
        tracing::info!("[publisher] starting");
        for id in 0..messages {
            let message = format!("message id {} with a string value", id);
            tokio::select! {
                sent = tx.send(message) => sent.map_err(BoxError::from)?,
                _ = ctx.cancelled() => break,
            }
            tracing::info!(id, "[publisher] pushed message");
        }
        tracing::info!("[publisher] stopping");
        Ok(())
    });

    let subscriber = task(move |ctx: Context| async move {
        tracing::info!("[subscriber] starting");
        for _ in 0..messages {
            let message = tokio::select! {
                received = rx.recv() => received,
                _ = ctx.cancelled() => break,
            };
            match message {
                Some(message) => tracing::info!(%message, "[subscriber] processed message"),
                None => return Err("publisher closed the channel early".into()),
            }
        }
        tracing::info!("[subscriber] stopping");
        Ok(())
    });

    vec![publisher, subscriber]
}
