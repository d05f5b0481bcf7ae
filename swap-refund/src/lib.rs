//! Refund confirmation watcher.

use async_trait::async_trait;
use swap_core::traits::{RefundTransactionRepository, RefundTransactionRow};
use swap_core::{NurseryResult, WatcherEvent};
use tracing::debug;

/// Reports how many confirmations a broadcast transaction has on its chain.
/// Each UTXO/EVM symbol's `ChainClient`/`EthereumManager` already tracks
/// this; this trait is the narrow slice `RefundWatcher` needs from it.
#[async_trait]
pub trait ConfirmationSource: Send + Sync {
    async fn confirmations(&self, symbol: &str, txid: &str) -> NurseryResult<u32>;
}

/// Periodically scans the refund-transaction table for entries that have
/// reached `required_confirmations` and reports them so the orchestrator can
/// cancel the reverse swap's hold invoices (the HTLC can no longer be
/// claimed cooperatively once a refund confirms).
pub struct RefundWatcher {
    required_confirmations: u32,
}

impl RefundWatcher {
    pub fn new(required_confirmations: u32) -> Self {
        Self {
            required_confirmations,
        }
    }

    pub async fn scan<R, C>(
        &self,
        repo: &R,
        symbol_of: impl Fn(&RefundTransactionRow) -> &str,
        confirmations: &C,
    ) -> NurseryResult<Vec<WatcherEvent>>
    where
        R: RefundTransactionRepository,
        C: ConfirmationSource,
    {
        let mut events = Vec::new();
        for row in repo.unconfirmed().await? {
            let symbol = symbol_of(&row);
            let depth = confirmations.confirmations(symbol, &row.id).await?;
            if depth >= self.required_confirmations {
                debug!(swap_id = %row.swap_id, txid = %row.id, depth, "refund transaction confirmed");
                events.push(WatcherEvent::RefundConfirmed {
                    swap_id: row.swap_id,
                    kind: row.kind,
                });
            }
        }
        Ok(events)
    }
}
