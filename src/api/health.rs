//! Shared run state for the /health and /stats endpoints.
//! Updated by the scheduler and notifier, read by the API.

use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;

use crate::scheduler::SchedulerState;

#[derive(Default)]
pub struct HealthState {
    state: AtomicU8,
    /// Unix millis of the last finished market scan (0 = none).
    pub last_scan_at_ms: AtomicI64,
    pub markets: AtomicU64,
    pub scans_completed: AtomicU64,
    pub matches_found: AtomicU64,
    pub alerts_sent: AtomicU64,
    pub notify_failures: AtomicU64,
    last_progress: Mutex<Option<String>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, s: SchedulerState) {
        self.state.store(s as u8, Ordering::Relaxed);
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub fn set_markets(&self, n: usize) {
        self.markets.store(n as u64, Ordering::Relaxed);
    }

    pub fn record_scan(&self, at_ms: i64, matches: usize) {
        self.scans_completed.fetch_add(1, Ordering::Relaxed);
        self.matches_found.fetch_add(matches as u64, Ordering::Relaxed);
        self.last_scan_at_ms.store(at_ms, Ordering::Relaxed);
    }

    pub fn add_alerts_sent(&self, n: usize) {
        self.alerts_sent.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn inc_notify_failures(&self) {
        self.notify_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_progress(&self, line: String) {
        if let Ok(mut p) = self.last_progress.lock() {
            *p = Some(line);
        }
    }

    pub fn last_progress(&self) -> Option<String> {
        self.last_progress.lock().ok().and_then(|p| p.clone())
    }

    pub fn last_scan_at_ms(&self) -> Option<i64> {
        Some(self.last_scan_at_ms.load(Ordering::Relaxed)).filter(|&ms| ms > 0)
    }

    pub fn load(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
