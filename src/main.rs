use std::env;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use bank_windows::report::write_ledger;
use bank_windows::{AccountRegistry, Acceptor, Roster, ServerConfig, WorkerPool, server};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(io::stderr)
        .init();

    let config = match ServerConfig::from_env(env::args().nth(1)) {
        Ok(config) => config,
        Err(e) => {
            error!(reason = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let listener = match server::bind(&config.addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(reason = %e, "cannot start server");
            return ExitCode::FAILURE;
        }
    };

    let roster = Arc::new(Roster::new(config.roster.clone()));
    let registry = Arc::new(AccountRegistry::new(
        roster.identities().to_vec(),
        config.account_capacity,
    ));
    let pool: Arc<WorkerPool<TcpStream>> = WorkerPool::start(
        config.windows,
        config.queue_capacity,
        Arc::clone(&registry),
        config.idle_timeout,
    );
    let acceptor = Acceptor::new(roster, pool);

    info!(
        addr = %config.addr,
        windows = config.windows,
        queue_capacity = config.queue_capacity,
        account_capacity = config.account_capacity,
        "bank open"
    );

    tokio::select! {
        _ = acceptor.run(listener) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(reason = %e, "failed to listen for shutdown signal");
            }
            info!("shutting down");
        }
    }

    if let Err(e) = write_ledger(io::stdout().lock(), &registry.snapshot()) {
        error!(reason = %e, "failed to write ledger report");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
