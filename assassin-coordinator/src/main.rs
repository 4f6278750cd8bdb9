//! Coordinator CLI.
//!
//! Entry point for the coordinator binary. Provides subcommands for:
//! - `run` - Start the coordinator (chain adapter + API server)
//! - `migrate` - Bootstrap the database schema and exit
//! - `version` - Show version information

use std::str::FromStr;
use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use clap::{Parser, Subcommand};
use eyre::WrapErr;
use tokio_util::sync::CancellationToken;
use tracing::info;

use assassin_coordinator::api::{self, AppState};
use assassin_coordinator::chain::ChainAdapter;
use assassin_coordinator::config::Settings;
use assassin_coordinator::game::Coordinator;
use assassin_coordinator::ports::clock::SystemClock;
use assassin_coordinator::realtime::Rooms;
use assassin_coordinator::store::SqliteStore;
use assassin_coordinator::types::primitives::WalletAddress;
use settlement_client::SettlementClient;

/// Chain Assassin game coordinator
#[derive(Parser, Debug)]
#[command(name = "assassin-coordinator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Environment name (selects config/{environment}.toml)
    #[arg(short, long, default_value = "development")]
    environment: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the coordinator
    Run,

    /// Bootstrap the database schema and exit
    Migrate,

    /// Show version information
    Version,
}

fn init_tracing(settings: &Settings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(settings.logging.level.clone()));

    if settings.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // .env is optional; real deployments use environment variables.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let settings = Settings::load(&cli.environment).wrap_err("failed to load configuration")?;
    if let Err(errors) = settings.validate() {
        eyre::bail!("invalid configuration: {}", errors.join("; "));
    }

    init_tracing(&settings);

    match cli.command {
        Commands::Run => run(settings).await,
        Commands::Migrate => {
            SqliteStore::open(&settings.database.path)
                .await
                .wrap_err("schema bootstrap failed")?;
            println!("schema up to date: {}", settings.database.path);
            Ok(())
        }
        Commands::Version => {
            println!("assassin-coordinator {}", assassin_coordinator::VERSION);
            Ok(())
        }
    }
}

async fn run(settings: Settings) -> eyre::Result<()> {
    info!(
        version = assassin_coordinator::VERSION,
        "Starting coordinator"
    );

    let store = Arc::new(
        SqliteStore::open(&settings.database.path)
            .await
            .wrap_err("failed to open store")?,
    );

    let settlement = Arc::new(
        SettlementClient::connect(
            &settings.rpc.url,
            &settings.contract.address,
            &settings.contract.operator_private_key,
        )
        .await
        .wrap_err("failed to connect to the settlement contract")?,
    );

    let operator_address: Option<WalletAddress> =
        PrivateKeySigner::from_str(&settings.contract.operator_private_key)
            .ok()
            .map(|signer| signer.address().into());

    let rooms = Arc::new(Rooms::new());
    let clock = Arc::new(SystemClock::new());
    let coordinator = Coordinator::new(
        store.clone(),
        rooms.clone(),
        settlement.clone(),
        settlement.clone(),
        clock.clone(),
        settings.game.clone(),
    );

    // Rebuild timers, trackers, and chain maps for games that were live
    // when the previous process died.
    coordinator.recover().await.wrap_err("recovery failed")?;

    let shutdown = CancellationToken::new();
    let adapter = ChainAdapter::new(
        store,
        settlement,
        coordinator.clone(),
        settings.rpc.poll_interval(),
    );
    let adapter_handle = tokio::spawn(adapter.run(shutdown.clone()));

    let state = AppState {
        coordinator: coordinator.clone(),
        rooms,
        clock,
        operator_address,
    };
    let router = api::router(state);

    let addr = settings.api.socket_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("failed to bind {addr}"))?;
    info!(%addr, "API listening");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await
        .wrap_err("server error")?;

    coordinator.shutdown();
    let _ = adapter_handle.await;
    info!("Coordinator stopped");
    Ok(())
}
