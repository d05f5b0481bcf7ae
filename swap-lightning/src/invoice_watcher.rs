//! Hold-invoice expiry tracking.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use swap_core::WatcherEvent;
use tokio::sync::RwLock;
use tracing::debug;

/// Tracks reverse swaps' hold-invoice expiry timestamps and reports the ones
/// that passed without settlement.
#[derive(Default)]
pub struct InvoiceWatcher {
    expiries: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl InvoiceWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn track(&self, swap_id: String, expires_at: DateTime<Utc>) {
        debug!(%swap_id, %expires_at, "tracking hold invoice expiry");
        self.expiries.write().await.insert(swap_id, expires_at);
    }

    pub async fn untrack(&self, swap_id: &str) {
        self.expiries.write().await.remove(swap_id);
    }

    /// Emits `invoice.expired` for every tracked swap whose expiry has
    /// passed, except ones already present in `settled_or_removed` (the
    /// caller's record of what no longer needs watching). Expired entries
    /// are dropped from tracking so a re-poll does not re-fire them.
    pub async fn poll(
        &self,
        now: DateTime<Utc>,
        settled_or_removed: &HashSet<String>,
    ) -> Vec<WatcherEvent> {
        let mut expiries = self.expiries.write().await;
        let expired: Vec<String> = expiries
            .iter()
            .filter(|(id, expiry)| **expiry <= now && !settled_or_removed.contains(*id))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            expiries.remove(id);
        }

        expired
            .into_iter()
            .map(|swap_id| WatcherEvent::InvoiceExpired { swap_id })
            .collect()
    }
}
