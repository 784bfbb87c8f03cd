//! ledger-server: a concurrent account ledger over TCP
//!
//! The server owns a ledger of accounts and speaks one of two line-based
//! text protocols:
//! - Bank protocol: deposit, withdraw, balance, transfer, open, close
//! - Increment protocol: reply to every integer with integer + 1
//!
//! Features:
//! - Per-account locking with bounded waits for funds
//! - Deadlock-free transfers via ordered lock acquisition
//! - Configuration via CLI arguments or TOML file

mod config;
mod ledger;
mod protocols;
mod server;

use config::Config;
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        protocol = ?config.protocol,
        workers = ?config.workers,
        max_connections = config.max_connections,
        withdraw_timeout_ms = config.withdraw_timeout.as_millis() as u64,
        "Starting ledger-server"
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(workers) = config.workers {
        builder.worker_threads(workers);
    }
    let runtime = builder.build()?;

    let server = Server::new(config)?;
    runtime.block_on(server.run())?;

    let stats = server.ledger().stats();
    info!(
        accounts = stats.account_count,
        open_accounts = stats.open_account_count,
        total_balance = stats.total_balance,
        "Server stopped"
    );
    Ok(())
}
