use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use withdrawal_ledger::api::{create_router, AppState};
use withdrawal_ledger::config::load_config;
use withdrawal_ledger::db::DBClient;
use withdrawal_ledger::store::{MemoryWithdrawalStore, PgWithdrawalStore, WithdrawalStore};
use withdrawal_ledger::withdrawal::WithdrawalService;

#[derive(Parser, Debug)]
#[command(name = "withdrawal-ledger", about = "Multi-signature withdrawal ledger service")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep state in memory instead of PostgreSQL
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting withdrawal ledger");

    let store: Arc<dyn WithdrawalStore> = if cli.in_memory {
        info!("Using in-memory storage; state is lost on exit");
        Arc::new(MemoryWithdrawalStore::new())
    } else {
        let db = DBClient::new(&config).await?;
        db.run_migrations().await?;
        Arc::new(PgWithdrawalStore::new(db.pool.as_ref().clone()))
    };

    let service = WithdrawalService::new(store, config.ledger.clone());
    let state = Arc::new(AppState {
        service,
        config: config.clone(),
    });
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.host)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.host))?;
    info!("Listening on {}", config.server.host);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    info!("Shutting down withdrawal ledger");
    Ok(())
}
