//! Client-side daily message quota.
//!
//! A per-day counter persisted through the storage port, keyed by the
//! viewer's local calendar date. It gates whether a chat turn may be
//! dispatched at all and resets at local midnight. This is a UX
//! throttle shared by the dashboard chat and the embeddable widget;
//! it is not a security boundary and is enforced independently of any
//! server-side limit.

use std::sync::Arc;

use chrono::Local;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ChatResult;
use crate::store::KvStore;

/// Free-tier message allowance per local day.
pub const FREE_DAILY_LIMIT: u32 = 20;

const STORAGE_KEY: &str = "af-msg-count";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DayCount {
    date: String,
    count: u32,
}

/// Daily quota counter over a shared storage port.
#[derive(Clone)]
pub struct DailyQuota {
    store: Arc<dyn KvStore>,
    limit: u32,
}

impl DailyQuota {
    pub fn new(store: Arc<dyn KvStore>, limit: u32) -> Self {
        Self { store, limit }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Messages used today. A stored entry for another date reads as
    /// zero; corrupt or missing state reads as a fresh day.
    pub fn used(&self) -> u32 {
        self.load().count
    }

    /// Remaining allowance, recomputing "today" on every read.
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used())
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Record one sent message. Resets to 1 when the stored date is
    /// not today, otherwise increments; persists before returning.
    pub fn increment(&self) -> ChatResult<u32> {
        let today = today_key();
        let current = self.load();
        let next = if current.date == today {
            DayCount {
                date: today,
                count: current.count + 1,
            }
        } else {
            DayCount {
                date: today,
                count: 1,
            }
        };
        self.store
            .set(STORAGE_KEY, &serde_json::to_string(&next)?)?;
        Ok(next.count)
    }

    fn load(&self) -> DayCount {
        let today = today_key();
        let fresh = DayCount {
            date: today.clone(),
            count: 0,
        };
        let Some(raw) = self.store.get(STORAGE_KEY) else {
            return fresh;
        };
        match serde_json::from_str::<DayCount>(&raw) {
            Ok(stored) if stored.date == today => stored,
            Ok(_) => fresh,
            Err(err) => {
                warn!("discarding unreadable quota state: {err}");
                fresh
            }
        }
    }
}

fn today_key() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn quota() -> (Arc<MemoryStore>, DailyQuota) {
        let store = Arc::new(MemoryStore::new());
        let quota = DailyQuota::new(store.clone(), FREE_DAILY_LIMIT);
        (store, quota)
    }

    #[test]
    fn test_fresh_counter_has_full_allowance() {
        let (_, quota) = quota();
        assert_eq!(quota.remaining(), FREE_DAILY_LIMIT);
        assert!(!quota.is_exhausted());
    }

    #[test]
    fn test_increments_are_monotonic_within_a_day() {
        // n increments on the same day leave max(0, 20 - n).
        let (_, quota) = quota();
        for n in 1..=5 {
            assert_eq!(quota.increment().unwrap(), n);
        }
        assert_eq!(quota.remaining(), FREE_DAILY_LIMIT - 5);
    }

    #[test]
    fn test_stale_date_resets_to_one() {
        // Incrementing over yesterday's entry yields 1, not count + 1.
        let (store, quota) = quota();
        store
            .set(STORAGE_KEY, r#"{"date":"2000-01-01","count":17}"#)
            .unwrap();
        assert_eq!(quota.used(), 0);
        assert_eq!(quota.increment().unwrap(), 1);

        let stored: DayCount =
            serde_json::from_str(&store.get(STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(stored.count, 1);
        assert_eq!(stored.date, today_key());
    }

    #[test]
    fn test_exhaustion_clamps_at_zero() {
        let (_, quota) = quota();
        for _ in 0..FREE_DAILY_LIMIT + 3 {
            quota.increment().unwrap();
        }
        assert_eq!(quota.remaining(), 0);
        assert!(quota.is_exhausted());
    }

    #[test]
    fn test_corrupt_state_reads_as_fresh_day() {
        let (store, quota) = quota();
        store.set(STORAGE_KEY, "{ nonsense").unwrap();
        assert_eq!(quota.remaining(), FREE_DAILY_LIMIT);
        assert_eq!(quota.increment().unwrap(), 1);
    }

    #[test]
    fn test_counter_is_shared_across_instances() {
        // The dashboard chat and the embedded widget read the same key.
        let (store, quota) = quota();
        quota.increment().unwrap();
        let widget_view = DailyQuota::new(store, FREE_DAILY_LIMIT);
        assert_eq!(widget_view.used(), 1);
    }
}
