//! Statistics tracking for the portal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Atomic counters shared by the DNS and HTTP loops.
pub struct Stats {
    pub hijacked: AtomicU64,
    pub forwarded: AtomicU64,
    pub forward_failed: AtomicU64,
    pub redirected: AtomicU64,
    pub errors: AtomicU64,
    /// Cumulative upstream time in microseconds for averaging.
    total_upstream_time_us: AtomicU64,
    started: Instant,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            hijacked: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            forward_failed: AtomicU64::new(0),
            redirected: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            total_upstream_time_us: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_hijacked(&self) {
        self.hijacked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self, upstream_ms: f64) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        self.total_upstream_time_us
            .fetch_add((upstream_ms * 1000.0) as u64, Ordering::Relaxed);
    }

    pub fn record_forward_failed(&self) {
        self.forward_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_redirected(&self) {
        self.redirected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot_and_reset(&self) -> StatsSnapshot {
        let hijacked = self.hijacked.swap(0, Ordering::Relaxed);
        let forwarded = self.forwarded.swap(0, Ordering::Relaxed);
        let forward_failed = self.forward_failed.swap(0, Ordering::Relaxed);
        let redirected = self.redirected.swap(0, Ordering::Relaxed);
        let errors = self.errors.swap(0, Ordering::Relaxed);
        let total_us = self.total_upstream_time_us.swap(0, Ordering::Relaxed);

        let avg_upstream_ms = if forwarded > 0 {
            (total_us as f64 / forwarded as f64) / 1000.0
        } else {
            0.0
        };

        StatsSnapshot {
            uptime_secs: self.started.elapsed().as_secs(),
            hijacked,
            forwarded,
            forward_failed,
            redirected,
            errors,
            avg_upstream_ms,
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub hijacked: u64,
    pub forwarded: u64,
    pub forward_failed: u64,
    pub redirected: u64,
    pub errors: u64,
    pub avg_upstream_ms: f64,
}
