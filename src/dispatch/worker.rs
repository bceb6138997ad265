use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::{PendingConnection, WorkerPool};
use crate::model::WindowId;
use crate::registry::AccountRegistry;
use crate::session::{Session, SessionError};

/// Long-lived task behind one window.
pub(crate) struct Worker<S> {
    window: WindowId,
    pool: Arc<WorkerPool<S>>,
    registry: Arc<AccountRegistry>,
    idle_timeout: Option<Duration>,
}

impl<S> Worker<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub(crate) fn new(
        window: WindowId,
        pool: Arc<WorkerPool<S>>,
        registry: Arc<AccountRegistry>,
        idle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            window,
            pool,
            registry,
            idle_timeout,
        }
    }

    /// Serve every connection handed to this window, draining the waiting
    /// line after each one before parking again.
    pub(crate) async fn run(self, mut handoffs: impl Stream<Item = PendingConnection<S>> + Unpin) {
        while let Some(mut pending) = handoffs.next().await {
            loop {
                self.serve(pending).await;
                match self.pool.release_or_next(self.window) {
                    Some(next) => pending = next,
                    None => break,
                }
            }
        }
        debug!(window = %self.window, "window closed");
    }

    async fn serve(&self, mut pending: PendingConnection<S>) {
        info!(
            window = %self.window,
            identity = %pending.identity,
            peer = %pending.peer,
            arrival = pending.arrival,
            "serving customer"
        );

        let result = Session::new(&mut pending.stream, &pending.identity, self.window, &self.registry)
            .with_idle_timeout(self.idle_timeout)
            .run()
            .await;

        match result {
            Ok(()) => {}
            Err(SessionError::PeerDisconnected) => {
                info!(window = %self.window, identity = %pending.identity, "customer left")
            }
            Err(e) => {
                warn!(window = %self.window, identity = %pending.identity, reason = %e, "session aborted")
            }
        }

        if let Err(e) = pending.stream.shutdown().await {
            debug!(window = %self.window, reason = %e, "shutdown after session failed");
        }
        info!(window = %self.window, identity = %pending.identity, "window released");
    }
}
