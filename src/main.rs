//! Kalshi Market-Making Bot - Entry Point
//!
//! Wiring sequence:
//! 1. Parse CLI, load `.env`, load + validate config.toml
//! 2. Init tracing (JSON structured logging, optional rolling file)
//! 3. Build the Exchange: paper simulator, or Kalshi client (API key or login)
//! 4. Spawn metrics (/metrics) and health (/live + /ready) servers
//! 5. Build every strategy engine, then spawn them
//! 6. Wait for SIGINT/SIGTERM → stop engines (each cancels its orders) → logout

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use kalshi_mm_bot::adapters::kalshi::{KalshiClient, KalshiClientConfig, KalshiCredentials, KalshiExchange};
use kalshi_mm_bot::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use kalshi_mm_bot::adapters::paper::PaperExchange;
use kalshi_mm_bot::config::{AppConfig, BotConfig, BotMode, loader::load_config};
use kalshi_mm_bot::ports::Exchange;
use kalshi_mm_bot::shutdown::{ProcessSignals, ShutdownController};
use kalshi_mm_bot::usecases::StrategyRunner;

/// Engines get this long to cancel their orders after a stop signal.
const ENGINE_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Kalshi market-making bot
#[derive(Debug, Parser)]
#[command(name = "kalshi-mm-bot")]
#[command(version, about = "Avellaneda-Stoikov market making on Kalshi binary contracts")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Force paper trading regardless of `bot.mode`
    #[arg(long)]
    paper: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── 1. Environment and configuration ────────────────────
    // A missing .env is fine; credentials may come from the shell.
    dotenvy::dotenv().ok();

    let mut config = load_config(&cli.config).context("Failed to load configuration")?;
    if cli.paper {
        config.bot.mode = BotMode::Paper;
    }

    // ── 2. Structured JSON logging ──────────────────────────
    init_tracing(&config.bot)?;

    info!(
        name = %config.bot.name,
        version = env!("CARGO_PKG_VERSION"),
        mode = ?config.bot.mode,
        strategies = config.active_strategies().count(),
        "Starting Kalshi market maker"
    );

    let mut signals = ProcessSignals::install().context("Failed to install signal handlers")?;
    let shutdown = ShutdownController::new();
    let health = Arc::new(HealthState::new());

    // ── 3. Exchange ─────────────────────────────────────────
    let (exchange, kalshi) = build_exchange(&config).await?;

    // ── 4. Observability servers ────────────────────────────
    let mut servers = Vec::new();
    let metrics = if config.metrics.enabled {
        let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);
        servers.push(spawn_logged(
            "metrics",
            Arc::clone(&metrics).serve(config.metrics.bind_address.clone(), shutdown.subscribe()),
        ));
        servers.push(spawn_logged(
            "health",
            HealthServer::new(Arc::clone(&health), config.metrics.health_port).run(shutdown.subscribe()),
        ));
        Some(metrics)
    } else {
        None
    };

    // ── 5. Strategy engines ─────────────────────────────────
    let runner = StrategyRunner::build(
        exchange,
        &config.strategies,
        &shutdown.subscribe(),
        metrics,
        Arc::clone(&health),
    )?;
    let running = runner.spawn();

    info!("All tasks spawned, bot is running");

    // ── 6. Wait for SIGINT / SIGTERM ────────────────────────
    let received = signals.recv().await.context("Failed to listen for stop signals")?;
    info!(signal = received, "Stop signal received, initiating graceful shutdown");

    health.mark_shutting_down();
    shutdown.trigger();

    match tokio::time::timeout(ENGINE_SHUTDOWN_TIMEOUT, running.wait()).await {
        Ok(0) => info!("All strategy engines stopped"),
        Ok(failed) => warn!(failed, "Some strategy engines ended abnormally"),
        Err(_) => warn!("Timed out waiting for strategy engines to stop"),
    }

    if let Some(client) = kalshi {
        if let Err(e) = client.logout().await {
            warn!(error = %e, "Logout failed");
        }
    }

    for server in servers {
        let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Paper simulator or logged-in Kalshi client, depending on mode.
async fn build_exchange(config: &AppConfig) -> Result<(Arc<dyn Exchange>, Option<Arc<KalshiClient>>)> {
    match config.bot.mode {
        BotMode::Paper => {
            warn!("Paper mode: orders are simulated, nothing reaches Kalshi");
            let paper: Arc<dyn Exchange> = Arc::new(PaperExchange::new(&config.paper));
            Ok((paper, None))
        }
        BotMode::Live => {
            let credentials = KalshiCredentials::from_env().context("Failed to load Kalshi credentials from env")?;
            let mut client_config = KalshiClientConfig::from(&config.api);
            if let Ok(url) = std::env::var("KALSHI_BASE_URL") {
                client_config.base_url = url.trim_end_matches('/').to_string();
            }
            info!(base_url = %client_config.base_url, auth = credentials.scheme(), "Connecting to Kalshi");

            let client = Arc::new(KalshiClient::new(credentials, client_config).context("Failed to create Kalshi client")?);
            client.login().await.context("Kalshi login failed")?;
            let live: Arc<dyn Exchange> = Arc::new(KalshiExchange::new(Arc::clone(&client)));
            Ok((live, Some(client)))
        }
    }
}

fn spawn_logged<F>(name: &'static str, task: F) -> JoinHandle<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = task.await {
            error!(server = name, error = %e, "Server task failed");
        }
    })
}

/// JSON logs to stdout, plus a daily-rolling file when `log_dir` is set.
/// `RUST_LOG` overrides `bot.log_level`.
fn init_tracing(bot: &BotConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&bot.log_level));

    match &bot.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log dir {dir}"))?;
            let file_appender = tracing_appender::rolling::daily(dir, format!("{}.log", bot.name));
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            // The guard flushes on drop; keep it for the whole process.
            Box::leak(Box::new(guard));

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stdout.and(file_writer))
                .json()
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).json().init();
        }
    }
    Ok(())
}
