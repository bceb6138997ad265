//! TCP front door: authenticate each peer, then hand it to the worker pool.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::auth::Roster;
use crate::dispatch::{DispatchError, PendingConnection, Placement, Refused, WorkerPool};
use crate::session::messages;

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },
}

pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// What happened to an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Placed(Placement),
    Unregistered,
    LineFull,
    /// The peer went away before it could be queued.
    Dropped,
}

pub struct Acceptor<S> {
    roster: Arc<Roster>,
    pool: Arc<WorkerPool<S>>,
    arrivals: AtomicU64,
}

impl<S> Acceptor<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(roster: Arc<Roster>, pool: Arc<WorkerPool<S>>) -> Self {
        Self {
            roster,
            pool,
            arrivals: AtomicU64::new(0),
        }
    }

    /// Authenticate a freshly accepted connection and place it. Connections
    /// that cannot be placed are told why and closed here.
    pub async fn admit(&self, mut stream: S, peer: SocketAddr) -> Admission {
        let identity = match self.roster.authenticate(peer.ip()) {
            Ok(identity) => identity.clone(),
            Err(e) => {
                warn!(peer = %peer, reason = %e, "connection rejected");
                close_with(&mut stream, messages::REJECTED).await;
                return Admission::Unregistered;
            }
        };

        let arrival = self.arrivals.fetch_add(1, Ordering::Relaxed) + 1;
        info!(peer = %peer, identity = %identity, arrival, "customer arrived");

        let pending = PendingConnection {
            stream,
            identity,
            peer,
            arrival,
        };
        match self.pool.assign_or_queue(pending).await {
            Ok(placement) => Admission::Placed(placement),
            Err(Refused {
                mut pending,
                error: DispatchError::QueueFull(capacity),
            }) => {
                warn!(
                    identity = %pending.identity,
                    arrival = pending.arrival,
                    capacity,
                    "waiting line full, turning customer away"
                );
                close_with(&mut pending.stream, messages::LINE_FULL).await;
                Admission::LineFull
            }
            Err(Refused { pending, error }) => {
                warn!(
                    identity = %pending.identity,
                    arrival = pending.arrival,
                    reason = %error,
                    "dropping connection"
                );
                Admission::Dropped
            }
        }
    }
}

impl Acceptor<TcpStream> {
    /// Accept connections until the task is cancelled. Accept errors are
    /// logged and never stop the loop.
    pub async fn run(&self, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, "accepting connections");
        }
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    self.admit(stream, peer).await;
                }
                Err(e) => {
                    warn!(reason = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

async fn close_with<S: AsyncWrite + Unpin>(stream: &mut S, notice: &str) {
    let result = async {
        stream.write_all(notice.as_bytes()).await?;
        stream.flush().await?;
        stream.shutdown().await
    }
    .await;
    if let Err(e) = result {
        debug!(reason = %e, "closing notice not delivered");
    }
}
