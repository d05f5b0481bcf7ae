//! Collaborator contracts consumed by the core.
//!
//! These traits are the full deliverable for chain clients, wallets, the
//! Lightning client, EVM contract handlers and the persistence repositories:
//! their production implementations are explicitly out of scope and live
//! outside this repository. Only in-memory fakes implementing them exist
//! here, for tests.

use crate::error::NurseryResult;
use crate::models::{ChainSwap, CurrencyType, ReverseSwap, Swap};
use async_trait::async_trait;
use std::time::Duration;

/// Invoice state as reported by `lookup_hold_invoice`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceState {
    Open,
    Accepted,
    Settled,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct HoldInvoiceLookup {
    pub state: InvoiceState,
    pub htlc_states: Vec<InvoiceState>,
}

/// A raw transaction handle returned by wallet/contract sends, carrying
/// whatever the caller needs to persist.
#[derive(Debug, Clone)]
pub struct SentTransaction {
    pub transaction_id: String,
    pub transaction_hex: Option<String>,
    pub vout: u32,
    pub fee: u64,
}

/// Per-UTXO-symbol chain RPC surface.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn currency_type(&self) -> CurrencyType;

    /// Estimated fee rate in sat/vbyte for confirmation within `target_blocks`.
    async fn estimate_fee(&self, target_blocks: Option<u32>) -> NurseryResult<f64>;

    async fn get_raw_transaction(&self, txid: &str) -> NurseryResult<String>;

    /// `relaxed_fee_policy` allows broadcasting below the node's default min-relay fee,
    /// used for cooperative/urgent refunds where the estimate may be stale.
    async fn send_raw_transaction(
        &self,
        hex: &str,
        relaxed_fee_policy: bool,
    ) -> NurseryResult<String>;

    async fn add_input_filter(&self, tx_hash: &str) -> NurseryResult<()>;

    async fn add_output_filter(&self, script: &[u8]) -> NurseryResult<()>;
}

/// Wallet operations needed to fund claims/refunds and derive swap keys.
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn send_to_address(
        &self,
        address: &str,
        amount_sat: u64,
        fee_per_vbyte: f64,
        label: &str,
    ) -> NurseryResult<SentTransaction>;

    async fn get_address(&self, label: &str) -> NurseryResult<String>;

    /// Returns the (public, private) keypair hex for the given derivation index.
    async fn get_keys_by_index(&self, index: u32) -> NurseryResult<(String, String)>;

    async fn decode_address(&self, address: &str) -> NurseryResult<Vec<u8>>;
}

/// Lightning node adapter.
#[async_trait]
pub trait LightningClient: Send + Sync {
    async fn pay(&self, invoice: &str, timeout: Duration) -> NurseryResult<String>;

    async fn add_hold_invoice(
        &self,
        preimage_hash: &str,
        amount_sat: u64,
        expiry: Duration,
        memo: &str,
    ) -> NurseryResult<String>;

    async fn settle_hold_invoice(&self, preimage: &str) -> NurseryResult<()>;

    async fn cancel_hold_invoice(&self, preimage_hash: &str) -> NurseryResult<()>;

    async fn lookup_hold_invoice(&self, preimage_hash: &str) -> NurseryResult<HoldInvoiceLookup>;
}

/// On-chain lockup values read back from a contract event/storage slot
/// before a claim or refund call is submitted.
#[derive(Debug, Clone)]
pub struct EvmLockupDetails {
    pub amount_wei: u128,
    pub refund_address: String,
    pub timelock: u64,
}

/// EVM contract call surface for EtherSwap/ERC20Swap.
#[async_trait]
pub trait ContractHandler: Send + Sync {
    async fn lockup_details(&self, preimage_hash: &str) -> NurseryResult<EvmLockupDetails>;

    async fn lockup_ether(
        &self,
        preimage_hash: &str,
        amount_wei: u128,
        claim_address: &str,
        timelock: u64,
    ) -> NurseryResult<SentTransaction>;

    async fn lockup_token(
        &self,
        token: &str,
        preimage_hash: &str,
        amount_wei: u128,
        claim_address: &str,
        timelock: u64,
    ) -> NurseryResult<SentTransaction>;

    async fn claim_ether(&self, preimage_hash: &str, preimage: &str) -> NurseryResult<SentTransaction>;

    async fn claim_token(
        &self,
        token: &str,
        preimage_hash: &str,
        preimage: &str,
    ) -> NurseryResult<SentTransaction>;

    async fn refund_ether(
        &self,
        preimage_hash: &str,
        amount_wei: u128,
        claim_address: &str,
        timelock: u64,
    ) -> NurseryResult<SentTransaction>;

    async fn refund_token(
        &self,
        token: &str,
        preimage_hash: &str,
        amount_wei: u128,
        claim_address: &str,
        timelock: u64,
    ) -> NurseryResult<SentTransaction>;
}

/// Persistence for Submarine swaps.
#[async_trait]
pub trait SwapRepository: Send + Sync {
    async fn get(&self, id: &str) -> NurseryResult<Swap>;
    async fn save(&self, swap: &Swap) -> NurseryResult<()>;
    async fn set_status(&self, id: &str, status: crate::models::SubmarineStatus) -> NurseryResult<()>;
    async fn set_rate(&self, id: &str, rate: rust_decimal::Decimal) -> NurseryResult<()>;
    async fn set_miner_fee(&self, id: &str, fee: u64) -> NurseryResult<()>;
    async fn get_by_status(
        &self,
        statuses: &[crate::models::SubmarineStatus],
    ) -> NurseryResult<Vec<Swap>>;
    /// Locates a submarine swap paying the same invoice as a reverse swap,
    /// the self-payment guard consulted from `settle_reverse_invoice`.
    async fn find_by_preimage_hash(&self, preimage_hash: &str) -> NurseryResult<Option<Swap>>;
}

/// Persistence for Reverse Submarine swaps.
#[async_trait]
pub trait ReverseSwapRepository: Send + Sync {
    async fn get(&self, id: &str) -> NurseryResult<ReverseSwap>;
    async fn save(&self, swap: &ReverseSwap) -> NurseryResult<()>;
    async fn set_status(&self, id: &str, status: crate::models::ReverseStatus) -> NurseryResult<()>;
    async fn set_invoice_settled(&self, id: &str, preimage: &str) -> NurseryResult<()>;
}

/// Persistence for Chain swaps.
#[async_trait]
pub trait ChainSwapRepository: Send + Sync {
    async fn get(&self, id: &str) -> NurseryResult<ChainSwap>;
    async fn save(&self, swap: &ChainSwap) -> NurseryResult<()>;
    async fn set_status(&self, id: &str, status: crate::models::ChainStatus) -> NurseryResult<()>;
    async fn set_claim_miner_fee(&self, id: &str, fee: u64) -> NurseryResult<()>;
}

/// Cross-kind status/server-lockup mutators shared by reverse and chain
/// swaps.
#[async_trait]
pub trait WrappedSwapRepository: Send + Sync {
    async fn set_server_lockup_transaction(
        &self,
        id: &str,
        tx_id: &str,
        amount: u64,
        fee: u64,
        vout: u32,
    ) -> NurseryResult<()>;

    async fn set_transaction_refunded(&self, id: &str, tx_id: &str) -> NurseryResult<()>;
}

#[derive(Debug, Clone)]
pub struct RefundTransactionRow {
    pub swap_id: String,
    pub kind: crate::models::SwapKind,
    pub id: String,
    pub vin: Option<u32>,
}

/// Persistence for broadcast refund transactions, scanned by `RefundWatcher`.
#[async_trait]
pub trait RefundTransactionRepository: Send + Sync {
    async fn add_transaction(&self, row: RefundTransactionRow) -> NurseryResult<()>;
    async fn unconfirmed(&self) -> NurseryResult<Vec<RefundTransactionRow>>;
}

/// Offered a cooperative claim before the nursery builds its own.
/// Returning `true` means the claim has been accepted into a future batch
/// and the nursery should stop and emit `claim.pending`.
#[async_trait]
pub trait DeferredClaimer: Send + Sync {
    async fn offer_claim(&self, swap_id: &str, preimage: &str) -> NurseryResult<bool>;
}

/// Selects a Lightning node appropriate for a given swap.
pub trait NodeSwitch: Send + Sync {
    fn select_node<'a>(&'a self, currency: &str, preferred: &str) -> &'a str;
}

/// A pending channel-open request attached to a submarine swap, delegated to
/// an external channel nursery. Fields mirror what the contract handler
/// would need to size the channel.
#[derive(Debug, Clone)]
pub struct ChannelCreationRequest {
    pub swap_id: String,
    pub amount_sat: u64,
    pub private: bool,
}

/// Looks up whether a submarine swap asked for a channel to be opened before
/// its invoice can be paid.
#[async_trait]
pub trait ChannelCreationRepository: Send + Sync {
    async fn get_channel_creation(&self, swap_id: &str) -> NurseryResult<Option<ChannelCreationRequest>>;
}

/// Supplies the human-readable labels attached to wallet-facing lockup/claim/
/// refund transactions, keyed by swap. Kept separate from the swap
/// repositories since labelling is a presentation concern the repositories
/// themselves don't need to know about.
#[async_trait]
pub trait TransactionLabelRepository: Send + Sync {
    async fn lockup_label(&self, swap_id: &str) -> String;
    async fn claim_label(&self, swap_id: &str) -> String;
    async fn refund_label(&self, swap_id: &str) -> String;
}

/// Surfaces an operator-facing alert, out of scope beyond this interface;
/// failures are surfaced to the notification channel for operator action.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: String);
}
