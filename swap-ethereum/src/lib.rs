//! EVM contract watcher.
//!
//! Subscribes to `Lockup`, `Claim`, `Refund` events on the EtherSwap and
//! ERC20Swap contract families plus block timestamps, and turns them into
//! [`WatcherEvent`]s keyed by `preimage_hash`. A `symbol → nursery` map is
//! built once at construction instead of scanning a list per event.

use std::collections::HashMap;
use std::sync::Arc;
use swap_core::{SwapKind, WatcherEvent};
use tokio::sync::RwLock;
use tracing::debug;

use swap_chain::LockupRole;

/// One EVM contract family this watcher serves (the native-currency
/// `EtherSwap` or one `ERC20Swap` deployment per token).
#[derive(Debug, Clone)]
pub struct NurseryEntry {
    pub symbol: String,
    pub required_confirmations: u32,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub swap_id: String,
    pub kind: SwapKind,
    pub role: LockupRole,
    pub symbol: String,
}

#[derive(Default)]
struct RegistrationTable {
    by_preimage_hash: HashMap<String, Registration>,
}

/// Watches one or more EVM contract families, routing events by
/// `preimage_hash` to the swap that registered it.
pub struct EthereumWatcher {
    nurseries: HashMap<String, NurseryEntry>,
    registrations: Arc<RwLock<RegistrationTable>>,
}

impl EthereumWatcher {
    pub fn new(nurseries: impl IntoIterator<Item = NurseryEntry>) -> Self {
        Self {
            nurseries: nurseries.into_iter().map(|n| (n.symbol.clone(), n)).collect(),
            registrations: Arc::new(RwLock::new(RegistrationTable::default())),
        }
    }

    pub async fn register(&self, preimage_hash: String, registration: Registration) {
        debug!(%preimage_hash, swap_id = %registration.swap_id, "registering EVM lockup watch");
        self.registrations
            .write()
            .await
            .by_preimage_hash
            .insert(preimage_hash, registration);
    }

    pub async fn remove(&self, preimage_hash: &str) {
        self.registrations
            .write()
            .await
            .by_preimage_hash
            .remove(preimage_hash);
    }

    fn required_confirmations(&self, symbol: &str) -> u32 {
        self.nurseries
            .get(symbol)
            .map(|n| n.required_confirmations)
            .unwrap_or(1)
    }

    /// A `Lockup(preimageHash, amount, ...)` event fired. Emits the user-side
    /// event if this registration belongs to a counterparty deposit, or
    /// nothing yet (confirmation is tracked separately) for our own.
    pub async fn handle_lockup(
        &self,
        preimage_hash: &str,
        tx_hash: &str,
        amount: u64,
    ) -> Option<WatcherEvent> {
        let reg = self
            .registrations
            .read()
            .await
            .by_preimage_hash
            .get(preimage_hash)?
            .clone();
        match reg.role {
            LockupRole::User => Some(WatcherEvent::EthLockup {
                swap_id: reg.swap_id,
                kind: reg.kind,
                tx_hash: tx_hash.to_string(),
                amount,
            }),
            LockupRole::Server => None,
        }
    }

    /// Called once `confirmations` for a server-side lockup's block reaches
    /// the contract family's required depth.
    pub async fn handle_confirmation(
        &self,
        preimage_hash: &str,
        confirmations: u32,
    ) -> Option<WatcherEvent> {
        let reg = self
            .registrations
            .read()
            .await
            .by_preimage_hash
            .get(preimage_hash)?
            .clone();
        if reg.role != LockupRole::Server {
            return None;
        }
        if confirmations < self.required_confirmations(&reg.symbol) {
            return None;
        }
        Some(WatcherEvent::EthLockupConfirmed {
            swap_id: reg.swap_id,
            kind: reg.kind,
            tx_hash: preimage_hash.to_string(),
        })
    }

    /// A `Claim(preimageHash, preimage)` event revealed the preimage.
    pub async fn handle_claim(
        &self,
        preimage_hash: &str,
        preimage: &str,
        tx_hash: &str,
    ) -> Option<WatcherEvent> {
        let reg = self
            .registrations
            .read()
            .await
            .by_preimage_hash
            .get(preimage_hash)?
            .clone();
        Some(WatcherEvent::EthClaim {
            swap_id: reg.swap_id,
            kind: reg.kind,
            preimage: preimage.to_string(),
            tx_hash: tx_hash.to_string(),
        })
    }

    /// A locally submitted lockup transaction failed at the JSON-RPC level
    /// (gas, nonce) before being mined.
    pub async fn handle_failed_to_send(
        &self,
        preimage_hash: &str,
        reason: &str,
    ) -> Option<WatcherEvent> {
        let reg = self
            .registrations
            .read()
            .await
            .by_preimage_hash
            .get(preimage_hash)?
            .clone();
        Some(WatcherEvent::EthLockupFailedToSend {
            swap_id: reg.swap_id,
            kind: reg.kind,
            reason: reason.to_string(),
        })
    }

    /// Block timestamp check for HTLC timeout (the EVM analogue of the UTXO
    /// watcher's block-height expiry pass).
    pub async fn handle_block_timestamp(
        &self,
        preimage_hash: &str,
        block_timestamp: u64,
        timeout_timestamp: u64,
    ) -> Option<WatcherEvent> {
        if block_timestamp < timeout_timestamp {
            return None;
        }
        let reg = self
            .registrations
            .read()
            .await
            .by_preimage_hash
            .get(preimage_hash)?
            .clone();
        Some(WatcherEvent::SwapExpired {
            swap_id: reg.swap_id,
            kind: reg.kind,
            height: block_timestamp as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watcher() -> EthereumWatcher {
        EthereumWatcher::new([NurseryEntry {
            symbol: "RBTC".into(),
            required_confirmations: 3,
        }])
    }

    #[tokio::test]
    async fn user_lockup_emits_event() {
        let w = watcher();
        w.register(
            "hash1".into(),
            Registration {
                swap_id: "c1".into(),
                kind: SwapKind::Chain,
                role: LockupRole::User,
                symbol: "RBTC".into(),
            },
        )
        .await;

        let event = w.handle_lockup("hash1", "0xabc", 1_000_000).await;
        assert!(matches!(event, Some(WatcherEvent::EthLockup { .. })));
    }

    #[tokio::test]
    async fn server_lockup_waits_for_confirmations() {
        let w = watcher();
        w.register(
            "hash2".into(),
            Registration {
                swap_id: "r1".into(),
                kind: SwapKind::ReverseSubmarine,
                role: LockupRole::Server,
                symbol: "RBTC".into(),
            },
        )
        .await;

        assert!(w.handle_confirmation("hash2", 1).await.is_none());
        assert!(matches!(
            w.handle_confirmation("hash2", 3).await,
            Some(WatcherEvent::EthLockupConfirmed { .. })
        ));
    }

    #[tokio::test]
    async fn unregistered_preimage_hash_is_ignored() {
        let w = watcher();
        assert!(w.handle_lockup("unknown", "0x0", 1).await.is_none());
    }
}
