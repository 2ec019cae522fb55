use std::sync::Arc;

use dashmap::DashSet;

use crate::types::MatchResult;

/// Identity of a sent alert: the market plus the full match record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub market_id: i64,
    pub result: MatchResult,
}

/// Run-scoped record of alerts already sent.
#[derive(Default)]
pub struct AlertLog {
    seen: DashSet<AlertKey>,
}

impl AlertLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Atomic check-and-insert. True only for the first caller with this key.
    pub fn try_record(&self, market_id: i64, result: &MatchResult) -> bool {
        self.seen.insert(AlertKey { market_id, result: result.clone() })
    }

    #[cfg(test)]
    pub fn contains(&self, market_id: i64, result: &MatchResult) -> bool {
        self.seen.contains(&AlertKey { market_id, result: result.clone() })
    }

    pub fn clear(&self) {
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
