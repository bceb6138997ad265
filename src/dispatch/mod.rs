//! Connection dispatch: a fixed set of windows plus a bounded waiting line.
//!
//! Each window owns a one-slot handoff channel. Assigning a connection to an
//! idle window marks the slot busy and pushes the connection into that
//! channel while the slot table lock is held, so the targeted worker is woken
//! exactly once and a wakeup can never be missed. A worker that finishes a
//! session drains the waiting line itself, under the same lock, before it is
//! allowed to go idle.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

use crate::model::WindowId;
use crate::registry::AccountRegistry;
use crate::session::messages;

mod queue;
pub use queue::{PendingConnection, WaitingQueue};

mod worker;
use worker::Worker;

/// Why a connection could be neither assigned nor queued.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("waiting line is full ({0} connections)")]
    QueueFull(usize),
    #[error("failed to send queued notice: {0}")]
    Notify(#[from] io::Error),
}

/// A connection handed back to the acceptor, which decides how to close it.
#[derive(Debug)]
pub struct Refused<S> {
    pub pending: PendingConnection<S>,
    pub error: DispatchError,
}

/// Where `assign_or_queue` put a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Assigned(WindowId),
    Queued { position: usize },
}

/// Who is being served at a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub identity: String,
    pub arrival: u64,
}

impl Attachment {
    fn of<S>(pending: &PendingConnection<S>) -> Self {
        Self {
            identity: pending.identity.id().to_string(),
            arrival: pending.arrival,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub window: WindowId,
    pub busy: bool,
    pub attached: Option<Attachment>,
}

/// Consistent view of all windows and the waiting line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub slots: Vec<SlotSnapshot>,
    /// Arrival numbers of queued connections, front first.
    pub waiting: Vec<u64>,
}

struct WorkerSlot<S> {
    window: WindowId,
    /// `Some` exactly while the window is busy.
    attached: Option<Attachment>,
    handoff: mpsc::Sender<PendingConnection<S>>,
}

/// The fixed pool of windows.
pub struct WorkerPool<S> {
    /// Lock order: `slots` before the queue's own lock.
    slots: Mutex<Vec<WorkerSlot<S>>>,
    queue: WaitingQueue<S>,
}

impl<S> WorkerPool<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Create the windows and spawn one long-lived worker task per window.
    pub fn start(
        windows: usize,
        queue_capacity: usize,
        registry: Arc<AccountRegistry>,
        idle_timeout: Option<Duration>,
    ) -> Arc<Self> {
        let mut slots = Vec::with_capacity(windows);
        let mut receivers = Vec::with_capacity(windows);
        for index in 0..windows {
            let (handoff, receiver) = mpsc::channel(1);
            slots.push(WorkerSlot {
                window: WindowId::from_index(index),
                attached: None,
                handoff,
            });
            receivers.push(receiver);
        }

        let pool = Arc::new(Self {
            slots: Mutex::new(slots),
            queue: WaitingQueue::new(queue_capacity),
        });

        for (index, receiver) in receivers.into_iter().enumerate() {
            let window = WindowId::from_index(index);
            let worker = Worker::new(window, Arc::clone(&pool), Arc::clone(&registry), idle_timeout);
            tokio::spawn(worker.run(ReceiverStream::new(receiver)));
            debug!(window = %window, "window ready");
        }
        info!(windows, queue_capacity, "worker pool started");

        pool
    }
}

impl<S> WorkerPool<S>
where
    S: AsyncWrite + Unpin,
{
    /// Hand the connection to an idle window, or put it in the waiting line
    /// after telling the peer it has to wait.
    pub async fn assign_or_queue(
        &self,
        pending: PendingConnection<S>,
    ) -> Result<Placement, Refused<S>> {
        let mut pending = {
            let mut slots = self.slots.lock();
            match Self::attach_idle(&mut slots, pending) {
                Ok(window) => return Ok(Placement::Assigned(window)),
                Err(pending) => pending,
            }
        };

        // only the acceptor enqueues, so the line cannot fill up behind our back
        if self.queue.is_full() {
            let error = DispatchError::QueueFull(self.queue.capacity());
            return Err(Refused { pending, error });
        }

        let notice = messages::queued(self.queue.len() + 1);
        if let Err(e) = send_notice(&mut pending.stream, &notice).await {
            return Err(Refused {
                pending,
                error: DispatchError::Notify(e),
            });
        }

        // a window may have freed up while we were writing
        let mut slots = self.slots.lock();
        let pending = match Self::attach_idle(&mut slots, pending) {
            Ok(window) => return Ok(Placement::Assigned(window)),
            Err(pending) => pending,
        };

        let identity = pending.identity.id().to_string();
        let arrival = pending.arrival;
        match self.queue.enqueue(pending) {
            Ok(position) => {
                info!(identity = %identity, arrival, position, "all windows busy, customer queued");
                Ok(Placement::Queued { position })
            }
            Err(pending) => Err(Refused {
                pending,
                error: DispatchError::QueueFull(self.queue.capacity()),
            }),
        }
    }
}

impl<S> WorkerPool<S> {
    pub fn windows(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let slots = self.slots.lock();
        PoolSnapshot {
            slots: slots
                .iter()
                .map(|slot| SlotSnapshot {
                    window: slot.window,
                    busy: slot.attached.is_some(),
                    attached: slot.attached.clone(),
                })
                .collect(),
            waiting: self.queue.arrivals(),
        }
    }

    /// Called by a worker after closing its connection: take the next waiting
    /// connection for the same window, or mark the window idle.
    fn release_or_next(&self, window: WindowId) -> Option<PendingConnection<S>> {
        let mut slots = self.slots.lock();
        let slot = &mut slots[window.index()];

        match self.queue.dequeue_next() {
            Some(next) => {
                slot.attached = Some(Attachment::of(&next));
                info!(
                    window = %window,
                    identity = %next.identity,
                    arrival = next.arrival,
                    remaining = self.queue.len(),
                    "calling next waiting customer"
                );
                Some(next)
            }
            None => {
                slot.attached = None;
                debug!(window = %window, "window idle");
                None
            }
        }
    }

    /// Attach to the first idle window; the connection comes back if every
    /// window is busy.
    fn attach_idle(
        slots: &mut [WorkerSlot<S>],
        mut pending: PendingConnection<S>,
    ) -> Result<WindowId, PendingConnection<S>> {
        for slot in slots.iter_mut().filter(|slot| slot.attached.is_none()) {
            let attachment = Attachment::of(&pending);
            match slot.handoff.try_send(pending) {
                Ok(()) => {
                    info!(
                        window = %slot.window,
                        identity = %attachment.identity,
                        arrival = attachment.arrival,
                        "assigned to window"
                    );
                    slot.attached = Some(attachment);
                    return Ok(slot.window);
                }
                Err(e) => {
                    error!(window = %slot.window, "window did not take the handoff");
                    pending = e.into_inner();
                }
            }
        }
        Err(pending)
    }
}

async fn send_notice<S: AsyncWrite + Unpin>(stream: &mut S, text: &str) -> io::Result<()> {
    stream.write_all(text.as_bytes()).await?;
    stream.flush().await
}
