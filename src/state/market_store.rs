use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::types::Market;

/// Last publish time seen for a market's feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    /// Minute of the hour (0..=59) of `timestamp`.
    pub minute: u32,
    pub timestamp: DateTime<Utc>,
}

impl Freshness {
    pub fn from_timestamp(timestamp: DateTime<Utc>) -> Self {
        Self { minute: timestamp.minute(), timestamp }
    }
}

/// A market is due when `last + scan_min <= minute <= last + scan_max`.
/// No wraparound: a window reaching past minute 59 only covers the minutes it
/// actually names.
#[inline]
pub fn is_due(last_minute: u32, minute: u32, scan_min: i64, scan_max: i64) -> bool {
    let last = i64::from(last_minute);
    let now = i64::from(minute);
    last + scan_min <= now && now <= last + scan_max
}

/// Per-market freshness shared by every scan worker.
#[derive(Default)]
pub struct MarketStore {
    /// market_id → last publish seen
    freshness: DashMap<i64, Freshness>,
}

impl MarketStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stores `timestamp` for the market unless an equal or newer one is already held.
    /// Returns true when the stored value changed.
    pub fn record(&self, market_id: i64, timestamp: DateTime<Utc>) -> bool {
        match self.freshness.entry(market_id) {
            Entry::Occupied(mut held) => {
                if held.get().timestamp < timestamp {
                    held.insert(Freshness::from_timestamp(timestamp));
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(Freshness::from_timestamp(timestamp));
                true
            }
        }
    }

    pub fn freshness(&self, market_id: i64) -> Option<Freshness> {
        self.freshness.get(&market_id).map(|f| *f)
    }

    /// Markets whose scan window contains `minute`. Markets never seen fresh are not due.
    pub fn due_markets<'a>(
        &self,
        markets: &'a [Market],
        minute: u32,
        scan_min: i64,
        scan_max: i64,
    ) -> Vec<&'a Market> {
        markets
            .iter()
            .filter(|m| {
                self.freshness(m.id)
                    .is_some_and(|f| is_due(f.minute, minute, scan_min, scan_max))
            })
            .collect()
    }

    pub fn tracked_count(&self) -> usize {
        self.freshness.len()
    }
}
