//! UTXO chain watcher.
//!
//! Maintains two per-symbol filters — `output_filter` for addresses we
//! expect to receive into (user lockups, our own server lockups) and
//! `input_filter` for outpoints we expect to see spent (our lockup being
//! claimed) — and turns incoming transactions and blocks into
//! [`WatcherEvent`]s for the orchestrator's category locks.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use swap_core::{SwapKind, WatcherEvent};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Whether a watched output belongs to the counterparty's deposit or to our
/// own server-side lockup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockupRole {
    User,
    Server,
}

#[derive(Debug, Clone)]
pub struct OutputFilterEntry {
    pub swap_id: String,
    pub kind: SwapKind,
    pub role: LockupRole,
    pub expected_amount: u64,
    /// True while the swap is still in a status that accepts a fresh lockup
    /// (`SwapCreated` / `TransactionMempool`); the watcher keeps the filter
    /// installed past that point only to observe the pending confirmation.
    pub accepts_lockup: bool,
}

#[derive(Debug, Clone)]
pub struct InputFilterEntry {
    pub swap_id: String,
    pub kind: SwapKind,
}

pub struct TxOutput {
    pub key: String,
    pub amount: u64,
    pub vout: u32,
}

pub struct TxInput {
    pub prevout_key: String,
    pub witness: Vec<Vec<u8>>,
    pub script_sig: Vec<u8>,
}

pub struct IncomingTransaction {
    pub tx_id: String,
    pub confirmed: bool,
    pub outputs: Vec<TxOutput>,
    pub inputs: Vec<TxInput>,
}

/// Outcome of `TransactionHook` / `OverpaymentProtector` consultation for an
/// observed lockup output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockupDecision {
    Accept,
    RejectZeroConf(String),
    Reject(String),
}

/// Consults whatever policy (amount floor, overpayment guard, sanctions list)
/// governs whether an observed lockup output may proceed. Left external
/// because policy internals are out of scope here.
pub trait LockupPolicy: Send + Sync {
    fn evaluate(&self, amount: u64, expected_amount: u64, confirmed: bool) -> LockupDecision;
}

/// Amount-floor-only policy used when no richer policy is wired up: accepts
/// anything meeting `expected_amount`, rejects short lockups outright.
pub struct MinimumAmountPolicy;

impl LockupPolicy for MinimumAmountPolicy {
    fn evaluate(&self, amount: u64, expected_amount: u64, _confirmed: bool) -> LockupDecision {
        if amount >= expected_amount {
            LockupDecision::Accept
        } else {
            LockupDecision::Reject(format!(
                "amount {} below expected {}",
                amount, expected_amount
            ))
        }
    }
}

/// Pulls the revealed preimage out of a claim transaction's witness or
/// scriptSig; the concrete script layout (legacy redeem script vs Taproot
/// MuSig2 key-path/script-path) is delegated to the `Core` constructors.
#[async_trait]
pub trait PreimageExtractor: Send + Sync {
    async fn extract(&self, witness: &[Vec<u8>], script_sig: &[u8]) -> Option<String>;
}

/// Default extractor: the preimage is the sole 32-byte witness item, which
/// holds for both the legacy P2SH-P2WSH HTLC redeem and the Taproot
/// script-path spend this nursery constructs.
pub struct WitnessPreimageExtractor;

#[async_trait]
impl PreimageExtractor for WitnessPreimageExtractor {
    async fn extract(&self, witness: &[Vec<u8>], _script_sig: &[u8]) -> Option<String> {
        witness
            .iter()
            .find(|item| item.len() == 32)
            .map(hex::encode)
    }
}

#[derive(Default)]
struct FilterTables {
    output_filter: HashMap<String, OutputFilterEntry>,
    input_filter: HashMap<String, InputFilterEntry>,
}

/// The UTXO `ChainWatcher` for a single symbol (e.g. one instance per
/// `BitcoinLike` or `Liquid` currency).
pub struct ChainWatcher<P: LockupPolicy, E: PreimageExtractor> {
    symbol: String,
    filters: Arc<RwLock<FilterTables>>,
    policy: P,
    extractor: E,
}

impl<P: LockupPolicy, E: PreimageExtractor> ChainWatcher<P, E> {
    pub fn new(symbol: impl Into<String>, policy: P, extractor: E) -> Self {
        Self {
            symbol: symbol.into(),
            filters: Arc::new(RwLock::new(FilterTables::default())),
            policy,
            extractor,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub async fn install_output_filter(&self, key: String, entry: OutputFilterEntry) {
        debug!(symbol = %self.symbol, %key, swap_id = %entry.swap_id, "installing output filter");
        self.filters.write().await.output_filter.insert(key, entry);
    }

    pub async fn install_input_filter(&self, key: String, entry: InputFilterEntry) {
        debug!(symbol = %self.symbol, %key, swap_id = %entry.swap_id, "installing input filter");
        self.filters.write().await.input_filter.insert(key, entry);
    }

    /// Removes every filter belonging to `swap_id`; called once the swap
    /// reaches a terminal status for that swap.
    pub async fn remove_filters_for_swap(&self, swap_id: &str) {
        let mut tables = self.filters.write().await;
        tables.output_filter.retain(|_, v| v.swap_id != swap_id);
        tables.input_filter.retain(|_, v| v.swap_id != swap_id);
    }

    /// Applies the event emission rules to one incoming transaction,
    /// confirmed or still in the mempool.
    pub async fn process_transaction(&self, tx: &IncomingTransaction) -> Vec<WatcherEvent> {
        let mut events = Vec::new();
        let tables = self.filters.read().await;

        for output in &tx.outputs {
            let Some(entry) = tables.output_filter.get(&output.key) else {
                continue;
            };
            match entry.role {
                LockupRole::User if entry.accepts_lockup => {
                    match self
                        .policy
                        .evaluate(output.amount, entry.expected_amount, tx.confirmed)
                    {
                        LockupDecision::Accept => events.push(WatcherEvent::Lockup {
                            swap_id: entry.swap_id.clone(),
                            kind: entry.kind,
                            tx_id: tx.tx_id.clone(),
                            vout: output.vout,
                            amount: output.amount,
                            confirmed: tx.confirmed,
                        }),
                        LockupDecision::RejectZeroConf(reason) if !tx.confirmed => {
                            events.push(WatcherEvent::LockupZeroConfRejected {
                                swap_id: entry.swap_id.clone(),
                                kind: entry.kind,
                                reason,
                            });
                        }
                        LockupDecision::RejectZeroConf(_) => events.push(WatcherEvent::Lockup {
                            swap_id: entry.swap_id.clone(),
                            kind: entry.kind,
                            tx_id: tx.tx_id.clone(),
                            vout: output.vout,
                            amount: output.amount,
                            confirmed: tx.confirmed,
                        }),
                        LockupDecision::Reject(reason) => {
                            events.push(WatcherEvent::LockupFailed {
                                swap_id: entry.swap_id.clone(),
                                kind: entry.kind,
                                reason,
                            });
                        }
                    }
                }
                LockupRole::User => {
                    debug!(swap_id = %entry.swap_id, "ignoring lockup output, swap no longer accepts one");
                }
                LockupRole::Server if tx.confirmed => {
                    events.push(WatcherEvent::ServerLockupConfirmed {
                        swap_id: entry.swap_id.clone(),
                        kind: entry.kind,
                    });
                }
                LockupRole::Server => {}
            }
        }

        for input in &tx.inputs {
            let Some(entry) = tables.input_filter.get(&input.prevout_key) else {
                continue;
            };
            match self.extractor.extract(&input.witness, &input.script_sig).await {
                Some(preimage) => events.push(WatcherEvent::CounterpartyClaimed {
                    swap_id: entry.swap_id.clone(),
                    kind: entry.kind,
                    preimage,
                }),
                None => warn!(
                    swap_id = %entry.swap_id,
                    tx_id = %tx.tx_id,
                    "spend of watched lockup carried no extractable preimage"
                ),
            }
        }

        events
    }

    /// Emits `*.expired` for every swap in `pending` whose timeout height has
    /// been reached by the new block.
    pub fn process_block(
        &self,
        height: u32,
        pending: &[(String, SwapKind, u32)],
    ) -> Vec<WatcherEvent> {
        pending
            .iter()
            .filter(|(_, _, timeout)| *timeout <= height)
            .map(|(swap_id, kind, _)| WatcherEvent::SwapExpired {
                swap_id: swap_id.clone(),
                kind: *kind,
                height,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watcher() -> ChainWatcher<MinimumAmountPolicy, WitnessPreimageExtractor> {
        ChainWatcher::new("BTC", MinimumAmountPolicy, WitnessPreimageExtractor)
    }

    #[tokio::test]
    async fn confirmed_user_lockup_meeting_amount_emits_lockup() {
        let w = watcher();
        w.install_output_filter(
            "addr1".into(),
            OutputFilterEntry {
                swap_id: "s1".into(),
                kind: SwapKind::Submarine,
                role: LockupRole::User,
                expected_amount: 100_000,
                accepts_lockup: true,
            },
        )
        .await;

        let tx = IncomingTransaction {
            tx_id: "tx1".into(),
            confirmed: true,
            outputs: vec![TxOutput {
                key: "addr1".into(),
                amount: 100_000,
                vout: 0,
            }],
            inputs: vec![],
        };

        let events = w.process_transaction(&tx).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], WatcherEvent::Lockup { confirmed: true, .. }));
    }

    #[tokio::test]
    async fn underpaid_lockup_emits_failure() {
        let w = watcher();
        w.install_output_filter(
            "addr1".into(),
            OutputFilterEntry {
                swap_id: "s1".into(),
                kind: SwapKind::Submarine,
                role: LockupRole::User,
                expected_amount: 100_000,
                accepts_lockup: true,
            },
        )
        .await;

        let tx = IncomingTransaction {
            tx_id: "tx1".into(),
            confirmed: true,
            outputs: vec![TxOutput {
                key: "addr1".into(),
                amount: 50_000,
                vout: 0,
            }],
            inputs: vec![],
        };

        let events = w.process_transaction(&tx).await;
        assert!(matches!(events[0], WatcherEvent::LockupFailed { .. }));
    }

    #[tokio::test]
    async fn claim_input_extracts_preimage() {
        let w = watcher();
        w.install_input_filter(
            "tx0:0".into(),
            InputFilterEntry {
                swap_id: "r1".into(),
                kind: SwapKind::ReverseSubmarine,
            },
        )
        .await;

        let preimage = vec![7u8; 32];
        let tx = IncomingTransaction {
            tx_id: "tx2".into(),
            confirmed: true,
            outputs: vec![],
            inputs: vec![TxInput {
                prevout_key: "tx0:0".into(),
                witness: vec![preimage.clone(), vec![1, 2, 3]],
                script_sig: vec![],
            }],
        };

        let events = w.process_transaction(&tx).await;
        match &events[0] {
            WatcherEvent::CounterpartyClaimed { preimage: p, .. } => {
                assert_eq!(p, &hex::encode(&preimage));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn filters_removed_on_terminal_status() {
        let w = watcher();
        w.install_output_filter(
            "addr1".into(),
            OutputFilterEntry {
                swap_id: "s1".into(),
                kind: SwapKind::Submarine,
                role: LockupRole::User,
                expected_amount: 1,
                accepts_lockup: true,
            },
        )
        .await;
        w.remove_filters_for_swap("s1").await;
        assert!(w.filters.read().await.output_filter.is_empty());
    }

    #[test]
    fn block_past_timeout_emits_expiry() {
        let w = watcher();
        let pending = vec![("s1".to_string(), SwapKind::Submarine, 100u32)];
        let events = w.process_block(101, &pending);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], WatcherEvent::SwapExpired { .. }));
    }
}
