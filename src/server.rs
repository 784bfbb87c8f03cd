//! TCP server for the ledger.
//!
//! Accepts incoming connections up to the connection limit and hands each
//! one to the configured protocol handler. Every connection addresses the
//! same shared ledger.

use crate::config::{Config, ProtocolType};
use crate::ledger::{AccountId, Ledger, LedgerResult};
use crate::protocols::{bank, increment};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// Listen backlog
const BACKLOG: i32 = 1024;

/// Server instance
pub struct Server {
    config: Config,
    ledger: Arc<Ledger>,
    /// Account addressed by commands that name none
    house: AccountId,
    connection_limit: Arc<Semaphore>,
}

impl Server {
    /// Create a new server and open its house account
    pub fn new(config: Config) -> LedgerResult<Self> {
        let ledger = Ledger::new(config.withdraw_timeout);

        let house = ledger.open_account_for(
            &config.house.last_name,
            &config.house.first_name,
            config.house.credit_rating,
        );
        if config.house.opening_balance > 0.0 {
            house.deposit(config.house.opening_balance)?;
        }
        info!(
            account = %house.id(),
            balance = config.house.opening_balance,
            "Opened house account"
        );

        Ok(Server {
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            house: house.id(),
            ledger,
            config,
        })
    }

    /// Bind the configured address and serve until SIGINT/SIGTERM
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr: SocketAddr = self.config.listen.parse()?;
        let listener = TcpListener::from_std(create_listener(addr)?)?;
        info!(address = %addr, protocol = ?self.config.protocol, "Server listening");

        self.serve(listener, shutdown_signal()).await
    }

    /// Accept connections on `listener` until `shutdown` completes
    pub async fn serve<F>(
        &self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            // Wait for a connection slot
            let permit = tokio::select! {
                permit = self.connection_limit.clone().acquire_owned() => permit?,
                _ = &mut shutdown => break,
            };

            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = &mut shutdown => break,
            };

            match accepted {
                Ok((stream, addr)) => {
                    debug!(peer = %addr, "New connection");

                    let ledger = Arc::clone(&self.ledger);
                    let protocol = self.config.protocol;
                    let house = self.house;

                    tokio::spawn(async move {
                        let result = match protocol {
                            ProtocolType::Bank => {
                                bank::handle_connection(stream, ledger, house).await
                            }
                            ProtocolType::Increment => increment::handle_connection(stream).await,
                        };
                        if let Err(e) = result {
                            debug!(peer = %addr, error = %e, "Connection error");
                        }
                        debug!(peer = %addr, "Connection closed");
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }

        info!("Server shutting down");
        Ok(())
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn house(&self) -> AccountId {
        self.house
    }
}

/// Create a non-blocking TCP listener with SO_REUSEADDR.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    Ok(socket.into())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
