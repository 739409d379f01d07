//! Shared health state for the /health endpoint.
//! Updated by FeedConnection, read by the API.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Default)]
pub struct HealthState {
    /// True while the feed socket is open and in its read loop.
    pub feed_connected: AtomicBool,
    /// Nanosecond timestamp of the last ingested envelope (0 = none).
    pub last_envelope_at_ns: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_feed_connected(&self, v: bool) {
        self.feed_connected.store(v, Ordering::Relaxed);
    }

    pub fn set_last_envelope_at_ns(&self, ns: u64) {
        self.last_envelope_at_ns.store(ns, Ordering::Relaxed);
    }

    pub fn feed_connected(&self) -> bool {
        self.feed_connected.load(Ordering::Relaxed)
    }

    pub fn last_envelope_at_ns(&self) -> u64 {
        self.last_envelope_at_ns.load(Ordering::Relaxed)
    }
}
