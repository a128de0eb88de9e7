use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tabled::{Table, Tabled};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use yieldwars::adapters::{start_api_server_background, HttpSimulationStep};
use yieldwars::api::AppState;
use yieldwars::bridge::{AlloyWalletSession, OnChainBridge, WalletSession};
use yieldwars::config::AppConfig;
use yieldwars::engine::{LocalSimulator, SimulationStep, StepRequest};
use yieldwars::error::Result;
use yieldwars::season::{LeaderboardEntry, SeasonLedger, SeasonRuntime};

/// Yield Wars simulation engine
#[derive(Parser, Debug)]
#[command(name = "yieldwars")]
#[command(author, version, about = "Three yield agents competing across fluctuating pools")]
struct Cli {
    /// Configuration directory
    #[arg(long, global = true, default_value = "config")]
    config_dir: String,

    /// Emit JSON logs
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the API server with the season runtime
    Serve {
        #[arg(short, long, env = "YIELDWARS_SERVER__PORT")]
        port: Option<u16>,
        /// Start a season as soon as the server is up
        #[arg(long)]
        autostart: bool,
    },

    /// Run one simulation step for the baseline roster and print it as JSON
    Step,

    /// Run a headless season and print the final standings
    Run {
        #[arg(short, long, default_value = "30")]
        ticks: u64,
        /// Print the share text after the table
        #[arg(long)]
        share: bool,
    },
}

#[derive(Tabled)]
struct StandingRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Agent")]
    name: String,
    #[tabled(rename = "Strategy")]
    strategy: String,
    #[tabled(rename = "Pool")]
    pool: String,
    #[tabled(rename = "Yield (%)")]
    yield_pct: String,
    #[tabled(rename = "Last Action")]
    last_action: String,
}

impl From<LeaderboardEntry> for StandingRow {
    fn from(entry: LeaderboardEntry) -> Self {
        Self {
            rank: entry.rank,
            name: entry.name,
            strategy: entry.strategy,
            pool: entry.current_pool.to_string(),
            yield_pct: format!("{:.4}", entry.cumulative_yield_pct),
            last_action: entry
                .last_action
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from(&cli.config_dir)
        .with_context(|| format!("failed to load configuration from {}", cli.config_dir))?;
    config.logging.json |= cli.json;
    if let Err(problems) = config.validate() {
        anyhow::bail!("invalid configuration: {}", problems.join("; "));
    }

    match &cli.command {
        Commands::Serve { port, autostart } => {
            init_logging(&config);
            run_server(config.clone(), port.unwrap_or(config.server.port), *autostart)
                .await
                .context("server exited with an error")?;
        }
        Commands::Step => {
            init_logging_simple();
            run_single_step(&config).await?;
        }
        Commands::Run { ticks, share } => {
            init_logging_simple();
            run_headless(&config, *ticks, *share)?;
        }
    }

    Ok(())
}

async fn run_server(config: AppConfig, port: u16, autostart: bool) -> Result<()> {
    let wallet: Option<Arc<dyn WalletSession>> =
        match AlloyWalletSession::from_config(&config.bridge)? {
            Some(session) => {
                info!(address = %session.address(), "wallet session ready");
                Some(Arc::new(session))
            }
            None => {
                warn!("no signer key configured; on-chain approvals unavailable");
                None
            }
        };
    let bridge = Arc::new(OnChainBridge::new(config.bridge.clone(), wallet));

    let simulator = Arc::new(LocalSimulator::from_config(&config));
    let step: Arc<dyn SimulationStep> = match &config.server.remote_step_url {
        Some(url) => {
            info!(url = %url, "using remote simulation step");
            Arc::new(HttpSimulationStep::new(url.clone())?)
        }
        None => simulator.clone(),
    };

    let runtime = SeasonRuntime::new(config.season.clone(), step, bridge);
    let server = start_api_server_background(AppState::new(runtime.clone(), simulator), port);

    if autostart {
        runtime.start().await?;
    }

    tokio::select! {
        result = server => {
            match result {
                Ok(Err(e)) => error!("API server exited: {}", e),
                Err(e) => error!("API server task failed: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = shutdown_signal() => {
            info!("shutdown requested");
        }
    }

    if let Some(summary) = runtime.stop().await {
        info!(winner = %summary.winner.name, ticks = summary.ticks, "season stopped on shutdown");
    }

    Ok(())
}

async fn run_single_step(config: &AppConfig) -> Result<()> {
    let simulator = LocalSimulator::from_config(config);
    let request = StepRequest {
        agents: simulator.roster().await?,
    };
    let response = simulator.step(&request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn run_headless(config: &AppConfig, ticks: u64, share: bool) -> Result<()> {
    let simulator = LocalSimulator::from_config(config);
    let mut rng = rand::thread_rng();

    // Virtual clock so the sine drift moves as it would in a live season
    let start = Utc::now();
    let interval = ChronoDuration::milliseconds(config.season.tick_interval_ms as i64);
    let mut ledger = SeasonLedger::new(config.season.roster.clone(), &config.season, start);

    for i in 1..=ticks {
        let now = start + interval * i as i32;
        let request = StepRequest {
            agents: ledger.roster_wire(),
        };
        let response = simulator.simulate_with(&request, now, &mut rng);
        let outcome = ledger.apply(&response, now)?;
        if let Some(change) = outcome.leader_change {
            println!("[tick {}] {}", outcome.tick, change.message());
        }
    }

    let rows: Vec<StandingRow> = ledger.leaderboard().into_iter().map(Into::into).collect();
    println!("{}", Table::new(rows));

    let elapsed = (interval * ticks as i32).num_seconds().max(0) as u64;
    if let Some(summary) = ledger.summary(elapsed) {
        println!(
            "Winner: {} ({}%) after {} ticks",
            summary.winner.name, summary.winner.final_yield, summary.ticks
        );
        if share {
            print!("{}", summary.share_text());
        }
    }

    Ok(())
}

fn init_logging(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},yieldwars=debug", config.logging.level))
    });

    let log_dir = std::env::var("YIELDWARS_LOG_DIR").ok();

    // `rolling::daily` panics if it cannot create the first file, so check writability first
    let file_layer = log_dir.as_deref().and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Warning: Could not create log directory {} ({}), file logging disabled", dir, e);
            return None;
        }
        let test_path = std::path::Path::new(dir).join(".yieldwars_write_test");
        match std::fs::OpenOptions::new().create(true).append(true).open(&test_path) {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);
                let file_appender = tracing_appender::rolling::daily(dir, "yieldwars.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                // Lives for the whole process
                Box::leak(Box::new(guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!("Warning: Could not write to log directory {} ({}), file logging disabled", dir, e);
                None
            }
        }
    });

    let file_logging_enabled = file_layer.is_some();
    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if config.logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .init();
    }

    if let (true, Some(dir)) = (file_logging_enabled, log_dir) {
        eprintln!("Logging to: {}/yieldwars.log", dir);
    }
}

fn init_logging_simple() {
    // Minimal logging for one-shot commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
