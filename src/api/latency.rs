//! In-memory histogram of per-market fetch latency.
//! Scan workers record, the API reads.

use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::Histogram;

use crate::error::{AppError, Result};

/// Values stored in milliseconds.
pub struct LatencyStats {
    inner: Mutex<Histogram<u64>>,
}

impl LatencyStats {
    /// Tracks 1ms to 10min, 3 significant figures.
    pub fn new() -> Result<Self> {
        let histogram = Histogram::new_with_bounds(1, 600_000, 3)
            .map_err(|e| AppError::Config(format!("latency histogram: {e}")))?;
        Ok(Self { inner: Mutex::new(histogram) })
    }

    pub fn record(&self, d: Duration) {
        let ms = d.as_millis().clamp(1, 600_000) as u64;
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(ms);
        }
    }

    /// (p50, p95, p99, max) in milliseconds. None if no samples.
    pub fn percentiles(&self) -> Option<(u64, u64, u64, u64)> {
        let h = self.inner.lock().ok()?;
        if h.len() == 0 {
            return None;
        }
        Some((
            h.value_at_quantile(0.5),
            h.value_at_quantile(0.95),
            h.value_at_quantile(0.99),
            h.max(),
        ))
    }

    pub fn len(&self) -> u64 {
        self.inner.lock().map(|h| h.len()).unwrap_or(0)
    }
}
