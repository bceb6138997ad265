use std::collections::VecDeque;
use std::net::SocketAddr;

use parking_lot::Mutex;

use crate::model::Identity;

/// An authenticated connection that has not been attached to a window yet.
#[derive(Debug)]
pub struct PendingConnection<S> {
    pub stream: S,
    pub identity: Identity,
    pub peer: SocketAddr,
    /// Arrival order assigned by the acceptor.
    pub arrival: u64,
}

/// Bounded FIFO of connections waiting for a free window.
pub struct WaitingQueue<S> {
    capacity: usize,
    entries: Mutex<VecDeque<PendingConnection<S>>>,
}

impl<S> WaitingQueue<S> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Append to the back of the line and return the new line length.
    /// A full queue hands the connection back untouched.
    pub fn enqueue(&self, pending: PendingConnection<S>) -> Result<usize, PendingConnection<S>> {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            return Err(pending);
        }
        entries.push_back(pending);
        Ok(entries.len())
    }

    /// Pop the longest-waiting connection.
    pub fn dequeue_next(&self) -> Option<PendingConnection<S>> {
        self.entries.lock().pop_front()
    }

    /// Arrival numbers currently in line, front first.
    pub fn arrivals(&self) -> Vec<u64> {
        self.entries.lock().iter().map(|p| p.arrival).collect()
    }
}
