//! Route handles - best-effort fan-out with drop accounting
//!
//! A `RouteHandle` wraps a destination worker's input queue. Sends are
//! non-blocking: a full queue drops the message for that destination
//! only and increments the edge's drop counter. Queue-full events are
//! never logged per message - the metrics reporter surfaces the
//! aggregate counts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dnsflow_protocol::DnsMessage;
use tokio::sync::mpsc;

/// Producer-side handle to one destination worker
#[derive(Clone)]
pub struct RouteHandle {
    /// Destination worker name
    name: Arc<str>,

    /// Destination input queue
    sender: mpsc::Sender<DnsMessage>,

    /// Messages dropped on this edge because the queue was full or closed
    drops: Arc<AtomicU64>,
}

impl RouteHandle {
    pub fn new(name: impl Into<Arc<str>>, sender: mpsc::Sender<DnsMessage>) -> Self {
        Self {
            name: name.into(),
            sender,
            drops: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Destination worker name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Messages dropped on this edge so far
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }

    /// Whether the destination's input queue has been closed
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Non-blocking send; a full or closed queue counts a drop
    #[inline]
    pub fn try_send(&self, dm: DnsMessage) -> bool {
        match self.sender.try_send(dm) {
            Ok(()) => true,
            Err(_) => {
                self.drops.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

impl std::fmt::Debug for RouteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteHandle")
            .field("name", &self.name)
            .field("dropped", &self.dropped())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub delivered: u64,
    pub dropped: u64,
}

/// An unordered set of routes followed together
#[derive(Debug, Default)]
pub struct RouteSet {
    routes: Vec<RouteHandle>,
}

impl RouteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, route: RouteHandle) {
        self.routes.push(route);
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Destination names, for introspection and logging
    pub fn names(&self) -> Vec<&str> {
        self.routes.iter().map(RouteHandle::name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteHandle> {
        self.routes.iter()
    }

    /// Send a copy of the message to every destination
    ///
    /// Destinations whose queue is full miss this message; the others
    /// still receive it.
    pub fn broadcast(&self, dm: &DnsMessage) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();
        for route in &self.routes {
            if route.try_send(dm.clone()) {
                outcome.delivered += 1;
            } else {
                outcome.dropped += 1;
            }
        }
        outcome
    }
}

#[cfg(test)]
#[path = "route_test.rs"]
mod route_test;
