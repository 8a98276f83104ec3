//! Per-user daily request quota.
//!
//! The check and the increment happen under one lock, so two concurrent
//! requests near the boundary cannot both pass. Counters are in-memory
//! and reset at the UTC day rollover; persistence is the host's concern.

use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

pub struct DailyQuota {
    /// Requests per user per day. 0 means unlimited.
    limit: u32,
    counts: Mutex<HashMap<(String, NaiveDate), u32>>,
}

impl DailyQuota {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically consumes one request slot for `user` today. Returns
    /// false when the quota is exhausted.
    pub fn try_acquire(&self, user: &str) -> bool {
        if self.limit == 0 {
            return true;
        }

        let today = Utc::now().date_naive();
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.retain(|(_, day), _| *day == today);

        let used = counts.entry((user.to_string(), today)).or_insert(0);
        if *used >= self.limit {
            return false;
        }
        *used += 1;
        true
    }

    /// Slots left for `user` today; `None` when unlimited.
    pub fn remaining(&self, user: &str) -> Option<u32> {
        if self.limit == 0 {
            return None;
        }

        let today = Utc::now().date_naive();
        let counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        let used = counts
            .get(&(user.to_string(), today))
            .copied()
            .unwrap_or(0);
        Some(self.limit.saturating_sub(used))
    }
}
