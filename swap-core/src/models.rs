//! Core data model for the swap nursery
//!
//! The three swap shapes, their status DAGs, and the invariants the
//! orchestrator must uphold across them.

use crate::error::{NurseryError, NurseryResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Which of the three swap shapes a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapKind {
    Submarine,
    ReverseSubmarine,
    Chain,
}

/// Script construction style. Taproot enables MuSig2 cooperative paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapVersion {
    Legacy,
    Taproot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrencyType {
    BitcoinLike,
    Liquid,
    Ether,
    ERC20,
}

impl CurrencyType {
    /// UTXO-style chains are handled by `ChainWatcher`; EVM chains by `EthereumWatcher`.
    pub fn is_utxo(&self) -> bool {
        matches!(self, Self::BitcoinLike | Self::Liquid)
    }

    pub fn is_evm(&self) -> bool {
        matches!(self, Self::Ether | Self::ERC20)
    }
}

/// A currency the nursery can lock up or claim funds on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Currency {
    pub symbol: String,
    pub currency_type: CurrencyType,
    /// Lightning node identifiers that can service swaps denominated in this currency.
    pub lightning_nodes: Vec<String>,
}

/// Order side, kept opaque to the nursery (pricing concern, not ours to interpret).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Status progression for a Submarine swap (on-chain -> Lightning).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmarineStatus {
    SwapCreated,
    TransactionMempool,
    TransactionConfirmed,
    InvoicePending,
    InvoicePaid,
    TransactionClaimPending,
    /// Terminal: success.
    TransactionClaimed,
    /// Not actually terminal: the lockup is still being watched for
    /// confirmation, even though this status reads like a failure branch.
    TransactionZeroConfRejected,
    /// Terminal: policy rejected the lockup outright.
    TransactionLockupFailed,
    /// Terminal: the HTLC timed out before claim.
    SwapExpired,
}

impl SubmarineStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::TransactionClaimed | Self::TransactionLockupFailed | Self::SwapExpired
        )
    }

    /// Validate a transition against the Submarine status DAG.
    pub fn validate_transition(&self, to: Self) -> NurseryResult<()> {
        use SubmarineStatus::*;
        let valid = match (*self, to) {
            (SwapCreated, TransactionMempool) => true,
            (SwapCreated, TransactionConfirmed) => true,
            (SwapCreated, TransactionLockupFailed) => true,
            (SwapCreated, SwapExpired) => true,
            (TransactionMempool, TransactionZeroConfRejected) => true,
            (TransactionMempool, TransactionConfirmed) => true,
            (TransactionMempool, SwapExpired) => true,
            (TransactionZeroConfRejected, TransactionConfirmed) => true,
            (TransactionZeroConfRejected, SwapExpired) => true,
            (TransactionConfirmed, InvoicePending) => true,
            (TransactionConfirmed, InvoicePaid) => true,
            (TransactionConfirmed, TransactionClaimPending) => true,
            (TransactionConfirmed, SwapExpired) => true,
            (InvoicePending, InvoicePaid) => true,
            (InvoicePending, SwapExpired) => true,
            (InvoicePaid, TransactionClaimPending) => true,
            (InvoicePaid, TransactionClaimed) => true,
            (TransactionClaimPending, TransactionClaimed) => true,
            // Re-firing a terminal event into the same status is a no-op.
            (a, b) if a == b && a.is_terminal() => true,
            _ => false,
        };

        if valid {
            Ok(())
        } else {
            Err(NurseryError::state_transition(
                format!("{self:?}"),
                format!("{to:?}"),
                "not reachable in the submarine status DAG".to_string(),
            ))
        }
    }
}

/// Status progression for a Reverse Submarine swap (Lightning -> on-chain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReverseStatus {
    SwapCreated,
    MinerFeePaid,
    TransactionMempool,
    /// Terminal: success (funds visible on chain for the user to claim).
    TransactionConfirmed,
    InvoiceSettled,
    /// Terminal.
    InvoiceExpired,
    /// Terminal.
    SwapExpired,
    /// Terminal.
    TransactionRefunded,
    /// Terminal.
    TransactionFailed,
}

impl ReverseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::InvoiceExpired
                | Self::SwapExpired
                | Self::TransactionRefunded
                | Self::TransactionFailed
        )
    }

    pub fn validate_transition(&self, to: Self) -> NurseryResult<()> {
        use ReverseStatus::*;
        let valid = match (*self, to) {
            (SwapCreated, MinerFeePaid) => true,
            (SwapCreated, TransactionMempool) => true,
            (SwapCreated, TransactionFailed) => true,
            (SwapCreated, InvoiceExpired) => true,
            (SwapCreated, SwapExpired) => true,
            (MinerFeePaid, TransactionMempool) => true,
            (MinerFeePaid, SwapExpired) => true,
            (MinerFeePaid, TransactionFailed) => true,
            (TransactionMempool, TransactionConfirmed) => true,
            (TransactionMempool, TransactionFailed) => true,
            (TransactionConfirmed, InvoiceSettled) => true,
            (TransactionConfirmed, SwapExpired) => true,
            (SwapExpired, TransactionRefunded) => true,
            (a, b) if a == b && a.is_terminal() => true,
            _ => false,
        };

        if valid {
            Ok(())
        } else {
            Err(NurseryError::state_transition(
                format!("{self:?}"),
                format!("{to:?}"),
                "not reachable in the reverse-swap status DAG".to_string(),
            ))
        }
    }
}

/// Status progression for a Chain swap (on-chain <-> on-chain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainStatus {
    Created,
    TransactionMempool,
    TransactionConfirmed,
    TransactionServerMempool,
    /// Terminal: success (server side confirmed, user can claim).
    TransactionServerConfirmed,
    TransactionClaimPending,
    /// Terminal: success.
    TransactionClaimed,
    TransactionZeroConfRejected,
    /// Terminal.
    TransactionLockupFailed,
    /// Terminal.
    SwapExpired,
    /// Terminal.
    TransactionRefunded,
    /// Terminal.
    TransactionFailed,
}

impl ChainStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::TransactionClaimed
                | Self::TransactionLockupFailed
                | Self::SwapExpired
                | Self::TransactionRefunded
                | Self::TransactionFailed
        )
    }

    pub fn validate_transition(&self, to: Self) -> NurseryResult<()> {
        use ChainStatus::*;
        let valid = match (*self, to) {
            (Created, TransactionMempool) => true,
            (Created, TransactionLockupFailed) => true,
            (Created, SwapExpired) => true,
            (TransactionMempool, TransactionZeroConfRejected) => true,
            (TransactionMempool, TransactionConfirmed) => true,
            (TransactionMempool, SwapExpired) => true,
            (TransactionZeroConfRejected, TransactionConfirmed) => true,
            (TransactionZeroConfRejected, SwapExpired) => true,
            (TransactionConfirmed, TransactionServerMempool) => true,
            (TransactionConfirmed, TransactionFailed) => true,
            (TransactionConfirmed, SwapExpired) => true,
            (TransactionServerMempool, TransactionServerConfirmed) => true,
            (TransactionServerMempool, TransactionFailed) => true,
            (TransactionServerConfirmed, TransactionClaimPending) => true,
            (TransactionServerConfirmed, TransactionClaimed) => true,
            (TransactionServerConfirmed, SwapExpired) => true,
            (TransactionClaimPending, TransactionClaimed) => true,
            (SwapExpired, TransactionRefunded) => true,
            (a, b) if a == b && a.is_terminal() => true,
            _ => false,
        };

        if valid {
            Ok(())
        } else {
            Err(NurseryError::state_transition(
                format!("{self:?}"),
                format!("{to:?}"),
                "not reachable in the chain-swap status DAG".to_string(),
            ))
        }
    }
}

/// A Submarine swap: user pays on-chain, we pay their Lightning invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swap {
    pub id: String,
    pub pair: String,
    pub order_side: OrderSide,
    pub version: SwapVersion,
    pub invoice: Option<String>,
    /// Immutable after creation.
    pub preimage_hash: String,
    pub lockup_address: String,
    pub timeout_block_height: u32,
    pub expected_amount: u64,
    pub onchain_amount: Option<u64>,
    pub lockup_transaction_id: Option<String>,
    pub lockup_transaction_vout: Option<u32>,
    pub key_index: u32,
    pub redeem_script: Option<String>,
    pub rate: Option<rust_decimal::Decimal>,
    pub status: SubmarineStatus,
    pub miner_fee: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A Reverse Submarine swap: user pays Lightning, we pay on-chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseSwap {
    pub id: String,
    pub pair: String,
    pub order_side: OrderSide,
    pub version: SwapVersion,
    pub preimage_hash: String,
    pub lockup_address: String,
    pub timeout_block_height: u32,
    pub onchain_amount: u64,
    pub claim_address: Option<String>,
    pub key_index: u32,
    pub redeem_script: Option<String>,
    /// Prepay minerfee invoice, paid before we commit our own on-chain lockup.
    pub miner_fee_invoice: Option<String>,
    pub miner_fee_invoice_preimage: Option<String>,
    pub server_lockup_transaction_id: Option<String>,
    pub server_lockup_transaction_vout: Option<u32>,
    pub minerfee_onchain_amount: Option<u64>,
    pub lightning_currency: String,
    pub node: String,
    pub status: ReverseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One leg (sending or receiving) of a Chain swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSwapData {
    pub symbol: String,
    pub lockup_address: String,
    pub claim_address: Option<String>,
    pub expected_amount: u64,
    pub transaction_id: Option<String>,
    pub transaction_vout: Option<u32>,
    pub key_index: u32,
    pub redeem_script: Option<String>,
    pub timeout_block_height: u32,
    pub their_public_key: Option<String>,
}

/// A Chain swap: atomic swap between two on-chain networks sharing one preimage hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSwap {
    pub id: String,
    pub version: SwapVersion,
    pub preimage_hash: String,
    pub sending: ChainSwapData,
    pub receiving: ChainSwapData,
    pub status: ChainStatus,
    pub claim_miner_fee: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Swap {
    /// Attempt a status transition, enforcing the status DAG above and
    /// allowing idempotent re-fires of an already-terminal status.
    pub fn transition_to(&mut self, to: SubmarineStatus) -> NurseryResult<()> {
        self.status.validate_transition(to)?;
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl ReverseSwap {
    pub fn transition_to(&mut self, to: ReverseStatus) -> NurseryResult<()> {
        self.status.validate_transition(to)?;
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// A refund may only be attempted once our own lockup is broadcast.
    pub fn has_server_lockup(&self) -> bool {
        self.server_lockup_transaction_id.is_some()
    }
}

impl ChainSwap {
    pub fn transition_to(&mut self, to: ChainStatus) -> NurseryResult<()> {
        self.status.validate_transition(to)?;
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Refuses a second server-side lockup once one is recorded.
    pub fn sending_lockup_already_sent(&self) -> bool {
        self.sending.transaction_id.is_some()
    }

    /// A refund may only be attempted once the sending leg's lockup is broadcast.
    pub fn has_server_lockup(&self) -> bool {
        self.sending.transaction_id.is_some()
    }
}

/// Verifies a candidate preimage hashes to the swap's recorded preimage hash.
pub fn preimage_matches_hash(preimage_hex: &str, preimage_hash_hex: &str) -> NurseryResult<bool> {
    use sha2::{Digest, Sha256};

    let preimage = hex::decode(preimage_hex)?;
    let expected = hex::decode(preimage_hash_hex)?;
    let actual = Sha256::digest(&preimage);
    Ok(actual.as_slice() == expected.as_slice())
}

/// Tracks which symbols currently have an active input/output filter installed,
/// used by watchers to avoid re-registering filters on duplicate events.
#[derive(Debug, Default)]
pub struct FilterRegistry {
    pub installed: HashSet<String>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_installed(&mut self, key: String) -> bool {
        self.installed.insert(key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.installed.remove(key)
    }
}

/// Opaque handle identifying a swap regardless of kind, for event routing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwapId(pub String);

impl From<&str> for SwapId {
    fn from(value: &str) -> Self {
        SwapId(value.to_string())
    }
}

impl std::fmt::Display for SwapId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Helper for constructing fresh test/demo ids without pulling `uuid` into call sites.
pub fn new_swap_id() -> String {
    Uuid::new_v4().to_string()
}
