//! The nursery's event model: what watchers report in, and what the
//! orchestrator reports out as data flows upward to operators and
//! downstream subscribers.

use crate::models::SwapKind;
use serde::{Deserialize, Serialize};

/// Events produced by `ChainWatcher`, `EthereumWatcher`, `InvoiceWatcher`,
/// `LightningWatcher` and `RefundWatcher`, consumed by the orchestrator
/// under the category lock matching `kind()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WatcherEvent {
    /// A user or server lockup output was observed (UTXO/Liquid).
    Lockup {
        swap_id: String,
        kind: SwapKind,
        tx_id: String,
        vout: u32,
        amount: u64,
        confirmed: bool,
    },
    /// A lockup was seen but rejected for zero-conf policy only; the swap
    /// keeps waiting for confirmation.
    LockupZeroConfRejected {
        swap_id: String,
        kind: SwapKind,
        reason: String,
    },
    /// A lockup was rejected outright (amount, script, or policy mismatch).
    LockupFailed {
        swap_id: String,
        kind: SwapKind,
        reason: String,
    },
    /// Our own (server-side) lockup reached the configured confirmation depth.
    ServerLockupConfirmed { swap_id: String, kind: SwapKind },
    /// An input spending our server lockup was observed; the witness/scriptSig
    /// revealed the preimage.
    CounterpartyClaimed {
        swap_id: String,
        kind: SwapKind,
        preimage: String,
    },
    /// The HTLC timeout height has been reached for this swap.
    SwapExpired {
        swap_id: String,
        kind: SwapKind,
        height: u32,
    },

    /// A user-side EVM lockup event fired.
    EthLockup {
        swap_id: String,
        kind: SwapKind,
        tx_hash: String,
        amount: u64,
    },
    /// Our EVM lockup reached its confirmation threshold.
    EthLockupConfirmed {
        swap_id: String,
        kind: SwapKind,
        tx_hash: String,
    },
    /// An EVM claim event revealed the preimage.
    EthClaim {
        swap_id: String,
        kind: SwapKind,
        preimage: String,
        tx_hash: String,
    },
    /// A locally submitted EVM lockup transaction failed at the JSON-RPC level
    /// (gas, nonce) before it was ever mined.
    EthLockupFailedToSend {
        swap_id: String,
        kind: SwapKind,
        reason: String,
    },

    /// A hold invoice's expiry timestamp passed without settlement.
    InvoiceExpired { swap_id: String },

    /// The main hold invoice transitioned to `Accepted`.
    InvoicePaid { swap_id: String },
    /// The prepay minerfee invoice transitioned to `Accepted`.
    MinerFeeInvoicePaid { swap_id: String },

    /// A refund transaction reached the configured confirmation threshold.
    RefundConfirmed { swap_id: String, kind: SwapKind },
}

impl WatcherEvent {
    /// Which category lock this event must be processed under.
    pub fn kind(&self) -> SwapKind {
        match self {
            Self::Lockup { kind, .. }
            | Self::LockupZeroConfRejected { kind, .. }
            | Self::LockupFailed { kind, .. }
            | Self::ServerLockupConfirmed { kind, .. }
            | Self::CounterpartyClaimed { kind, .. }
            | Self::SwapExpired { kind, .. }
            | Self::EthLockup { kind, .. }
            | Self::EthLockupConfirmed { kind, .. }
            | Self::EthClaim { kind, .. }
            | Self::EthLockupFailedToSend { kind, .. }
            | Self::RefundConfirmed { kind, .. } => *kind,
            // Lightning-only events only ever concern submarine or reverse swaps;
            // the concrete kind is resolved by the repository lookup, so route
            // these conservatively under ReverseSubmarine — both InvoicePending/
            // InvoicePaid handling paths (submarine payment, reverse settlement)
            // take their own category lock internally once the swap is loaded.
            Self::InvoiceExpired { .. }
            | Self::InvoicePaid { .. }
            | Self::MinerFeeInvoicePaid { .. } => SwapKind::ReverseSubmarine,
        }
    }

    pub fn swap_id(&self) -> &str {
        match self {
            Self::Lockup { swap_id, .. }
            | Self::LockupZeroConfRejected { swap_id, .. }
            | Self::LockupFailed { swap_id, .. }
            | Self::ServerLockupConfirmed { swap_id, .. }
            | Self::CounterpartyClaimed { swap_id, .. }
            | Self::SwapExpired { swap_id, .. }
            | Self::EthLockup { swap_id, .. }
            | Self::EthLockupConfirmed { swap_id, .. }
            | Self::EthClaim { swap_id, .. }
            | Self::EthLockupFailedToSend { swap_id, .. }
            | Self::RefundConfirmed { swap_id, .. }
            | Self::InvoiceExpired { swap_id }
            | Self::InvoicePaid { swap_id }
            | Self::MinerFeeInvoicePaid { swap_id } => swap_id,
        }
    }
}

/// Events the nursery emits outward, for whatever outer server/notifier
/// subscribes. Kept separate from
/// `WatcherEvent` because the direction and consumer differ: this is a
/// fire-and-forget broadcast, not something fed back into a category lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutboundEvent {
    Transaction {
        swap_id: String,
        tx_id: String,
        confirmed: bool,
    },
    ZeroConfRejected {
        swap_id: String,
        reason: String,
    },
    Claim {
        swap_id: String,
        tx_id: String,
    },
    ClaimPending {
        swap_id: String,
    },
    Expiration {
        swap_id: String,
    },
    InvoiceExpired {
        swap_id: String,
    },
    InvoiceSettled {
        swap_id: String,
        preimage: String,
    },
    CoinsSent {
        swap_id: String,
        tx_id: String,
        amount: u64,
        fee: u64,
    },
    CoinsFailedToSend {
        swap_id: String,
        reason: String,
    },
    LockupFailed {
        swap_id: String,
        reason: String,
    },
    Refund {
        swap_id: String,
        tx_id: String,
    },
    MinerFeePaid {
        swap_id: String,
    },
}

impl OutboundEvent {
    pub fn swap_id(&self) -> &str {
        match self {
            Self::Transaction { swap_id, .. }
            | Self::ZeroConfRejected { swap_id, .. }
            | Self::Claim { swap_id, .. }
            | Self::ClaimPending { swap_id }
            | Self::Expiration { swap_id }
            | Self::InvoiceExpired { swap_id }
            | Self::InvoiceSettled { swap_id, .. }
            | Self::CoinsSent { swap_id, .. }
            | Self::CoinsFailedToSend { swap_id, .. }
            | Self::LockupFailed { swap_id, .. }
            | Self::Refund { swap_id, .. }
            | Self::MinerFeePaid { swap_id } => swap_id,
        }
    }
}
