use anyhow::{bail, Context, Result};
use clap::Parser;
use clmm_range_bot::broadcast::{StatusBroadcaster, WSEvent};
use clmm_range_bot::config::broadcast::load_broadcast_config;
use clmm_range_bot::config::simulation::load_paper_config;
use clmm_range_bot::config::strategy::{print_params_help, RangePairConfig};
use clmm_range_bot::config::{exchange::load_exchange_config, load_config};
use clmm_range_bot::engine::context::PoolContext;
use clmm_range_bot::engine::oracle::PriceOracle;
use clmm_range_bot::engine::simulation::PaperExchange;
use clmm_range_bot::engine::traits::{CompositeSink, PersistenceSink, WalletReader};
use clmm_range_bot::engine::{MonitorSettings, RebalanceMonitor};
use clmm_range_bot::logging::init_tracing;
use clmm_range_bot::logging::position_audit::PositionAuditLogger;
use clmm_range_bot::strategy::orchestrator::{Collaborators, PositionOrchestrator, RebalanceParams};
use clmm_range_bot::ui::console::{ConsoleRenderer, DryRunReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Concentrated-liquidity range bot", long_about = None)]
struct Args {
    #[arg(short, long)]
    config: Option<String>,

    /// Paper pool settings (JSON)
    #[arg(long)]
    paper_config: Option<String>,

    #[arg(short, long)]
    list_params: bool,

    #[arg(long)]
    ws_port: Option<u16>,

    /// Print the planned ranges and swap for the current price, then exit
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_tracing("logs")?;
    let args = Args::parse();

    if args.list_params {
        print_params_help();
        return Ok(());
    }

    let config_path = args
        .config
        .ok_or_else(|| anyhow::anyhow!("Config file is required unless --list-params is used"))?;

    info!("Loading config from: {}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config '{}'", config_path))?;
    let pair = config.range_pair().clone();

    let exchange_config = load_exchange_config().context("Failed to load exchange config")?;
    info!(
        "Exchange config loaded for network: {}",
        exchange_config.network
    );
    if exchange_config.network != "paper" {
        bail!(
            "No backend for network '{}'; set RANGE_BOT_NETWORK=paper",
            exchange_config.network
        );
    }
    let owner = exchange_config.owner_address()?;

    let paper_config = load_paper_config(args.paper_config.as_deref());
    let paper = Arc::new(PaperExchange::new(
        paper_config,
        pair.token0,
        pair.token1,
        owner,
    )?);

    let mut oracle = PriceOracle::new(paper.clone(), Duration::from_secs(pair.tx_timeout_secs));
    let pool = oracle
        .initialize(pair.token0, pair.token1, &pair.pair)
        .await
        .context("Failed to initialize price oracle")?
        .clone();

    // --- DRY RUN MODE ---
    if args.dry_run {
        info!("[DRY RUN] Planning against the current pool price...");
        return run_dry(&pair, &pool, &oracle, paper.as_ref()).await;
    }

    // --- PAPER TRADING MODE ---
    let broadcast_config = load_broadcast_config(args.ws_port);
    let ws_config = broadcast_config.websocket;
    info!(
        "WebSocket Status Server enabled on {}:{}",
        ws_config.host, ws_config.port
    );
    let broadcaster = StatusBroadcaster::new(Some(ws_config));
    broadcaster.send(WSEvent::Config(serde_json::to_value(&config)?));

    let mut sinks = CompositeSink::new().with(Arc::new(broadcaster.clone()));
    match PositionAuditLogger::new("logs", &pair.pair) {
        Ok(audit) => sinks = sinks.with(Arc::new(audit)),
        Err(e) => error!("Failed to initialize position audit logger: {:#}", e),
    }
    let sink: Arc<dyn PersistenceSink> = Arc::new(sinks);

    info!("Starting {} strategy for {}", config.type_name(), config.symbol());
    let collaborators = Collaborators {
        liquidity: paper.clone(),
        swapper: paper.clone(),
        wallet: paper.clone(),
        sink: sink.clone(),
    };
    let orchestrator =
        PositionOrchestrator::new(RebalanceParams::from_config(&pair), pool, collaborators);
    let monitor = RebalanceMonitor::new(
        oracle,
        orchestrator,
        sink,
        Some(broadcaster.clone()),
        owner,
        MonitorSettings::from_config(&pair),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested; finishing the current cycle...");
            let _ = shutdown_tx.send(true);
        }
    });

    if let Err(e) = monitor.run(shutdown_rx).await {
        error!("{:#}", e);
        broadcaster.send(WSEvent::Error(format!("{:#}", e)));
        // Give connected dashboards a moment to receive the error
        tokio::time::sleep(Duration::from_secs(2)).await;
        return Err(e);
    }

    Ok(())
}

async fn run_dry(
    pair: &RangePairConfig,
    pool: &PoolContext,
    oracle: &PriceOracle,
    wallet: &dyn WalletReader,
) -> Result<()> {
    let sample = oracle.get_current_price().await?;
    let balances = wallet.token_balances().await?;
    let report = DryRunReport::build(pair, pool, sample, balances)?;
    ConsoleRenderer::render(&report);
    Ok(())
}
