use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pingwatch::*;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

/// pingwatch - ping monitor with worker supervision
#[derive(Parser, Debug)]
#[command(name = "pingwatch", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "CONFIG_FILE", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Control surface: supervises the metrics backend and the collector
    Serve,
    /// Collector worker: probes destinations and serves /metrics
    Collect,
    /// Probe one destination once and print the report
    Probe {
        destination: String,
        /// Number of ping requests
        #[arg(short = 'n', long, default_value_t = 4)]
        count: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve => serve(cli.config).await,
        Command::Collect => collect(cli.config).await,
        Command::Probe { destination, count } => probe_once(destination, count).await,
    }
}

async fn serve(config_path: PathBuf) -> Result<()> {
    let app_config = config::AppConfig::load_from_path(&config_path)?;
    let commands = app_config.supervisor.commands(&config_path)?;

    let supervisor = Arc::new(
        supervisor::Supervisor::new(Arc::new(supervisor::OsProcessControl::new()), commands)
            .with_stop_timeout(Duration::from_secs(app_config.supervisor.stop_timeout_secs)),
    );
    let book = config::DestinationBook::from_config(app_config.clone(), &config_path);
    let plane = Arc::new(control::ControlPlane::new(supervisor, book));

    let app = routes::control_app(plane.clone());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Control surface listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Workers must not outlive the controller.
    let report = plane.stop_all().await;
    if !report.ok() {
        tracing::warn!(?report, "some workers could not be stopped");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn collect(config_path: PathBuf) -> Result<()> {
    let app_config = config::AppConfig::load_from_path(&config_path)?;
    let monitor = &app_config.monitor;

    let scrape_sink = Arc::new(sink::ScrapeSink::new()?);
    let mut fanout = sink::FanoutSink::new().with(scrape_sink.clone());
    if monitor.console_report {
        fanout = fanout.with(Arc::new(sink::ConsoleSink::stdout()));
    }

    let transport = transport::IcmpTransport::new(
        Duration::from_millis(monitor.probe_timeout_ms),
        Duration::from_millis(monitor.probe_gap_ms),
    );
    let scheduler = Arc::new(scheduler::Scheduler::new(
        Arc::new(transport),
        Arc::new(transport::SystemResolver),
        Arc::new(fanout),
        monitor.scheduler_config(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut worker_handle = worker::spawn(
        worker::WorkerDeps {
            scheduler,
            targets: app_config.destinations.clone(),
            shutdown_rx,
        },
        worker::WorkerConfig {
            interval_secs: monitor.interval_secs,
        },
    );

    let app = routes::scrape_app(scrape_sink);
    let addr = format!("{}:{}", app_config.scrape.host, app_config.scrape.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Scrape endpoint on http://{}/metrics", addr);

    let (server_stop_tx, server_stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = server_stop_rx.await;
            })
            .await
    });

    tokio::select! {
        result = &mut worker_handle => {
            let summary = result?;
            tracing::info!(?summary, "collector finished");
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
            let summary = worker_handle.await?;
            tracing::info!(?summary, "collector stopped");
        }
    }

    let _ = server_stop_tx.send(());
    server.await??;
    Ok(())
}

async fn probe_once(destination: String, count: u32) -> Result<()> {
    let scheduler = scheduler::Scheduler::new(
        Arc::new(transport::IcmpTransport::default()),
        Arc::new(transport::SystemResolver),
        Arc::new(sink::ConsoleSink::stdout()),
        scheduler::SchedulerConfig::default(),
    );
    let target = models::DestinationTarget::new(destination.trim(), count);
    if let Err(e) = scheduler.validate(&target).await {
        anyhow::bail!("{e}");
    }

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let summary = scheduler.run(&[target], Duration::ZERO, shutdown_rx).await;
    anyhow::ensure!(summary.published == 1, "probe failed; see log for details");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
