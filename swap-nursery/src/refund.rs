//! Refund construction for both chain families: UTXO, EVM, and the
//! failed-refund recovery path.

use async_trait::async_trait;
use swap_core::models::SwapVersion;
use swap_core::traits::{
    ChainClient, ContractHandler, Notifier, RefundTransactionRepository, RefundTransactionRow, Wallet,
};
use swap_core::{NurseryResult, SwapKind};
use tracing::error;

/// What the refund needs to know about the lockup it is unwinding.
pub struct RefundRequest {
    pub version: SwapVersion,
    pub vout: u32,
    pub key_index: u32,
    pub redeem_script: Option<String>,
    pub timeout_block_height: u32,
    pub amount: u64,
}

pub struct BuiltRefund {
    pub hex: String,
    pub txid: String,
    pub fee: u64,
}

/// Builds the raw refund transaction. For Taproot swaps this deserializes
/// the swap tree and derives the aggregated MuSig2 internal key
/// (`cooperative = false`, a unilateral timeout spend); for Legacy swaps it
/// attaches `redeem_script`. Left external: script construction is delegated
/// to the `Core` constructors.
#[async_trait]
pub trait RefundScriptBuilder: Send + Sync {
    async fn build_refund_transaction(
        &self,
        lockup_tx_hex: &str,
        request: &RefundRequest,
        refund_address: &str,
        fee_per_vbyte: f64,
    ) -> NurseryResult<BuiltRefund>;
}

pub struct RefundOutcome {
    pub tx_id: String,
    pub fee: u64,
}

/// Builds, persists, and broadcasts a UTXO refund transaction with
/// `locktime = timeout_block_height`. `label` (sourced from
/// `TransactionLabelRepository::refund_label`) tags the refund address
/// request.
#[allow(clippy::too_many_arguments)]
pub async fn refund_utxo(
    wallet: &impl Wallet,
    chain_client: &impl ChainClient,
    builder: &impl RefundScriptBuilder,
    refund_repo: &impl RefundTransactionRepository,
    swap_id: &str,
    kind: SwapKind,
    lockup_tx_id: &str,
    request: &RefundRequest,
    label: &str,
) -> NurseryResult<RefundOutcome> {
    let refund_address = wallet.get_address(label).await?;
    let fee_per_vbyte = chain_client.estimate_fee(None).await?;
    let lockup_tx_hex = chain_client.get_raw_transaction(lockup_tx_id).await?;

    let built = builder
        .build_refund_transaction(&lockup_tx_hex, request, &refund_address, fee_per_vbyte)
        .await?;

    refund_repo
        .add_transaction(RefundTransactionRow {
            swap_id: swap_id.to_string(),
            kind,
            id: built.txid.clone(),
            vin: Some(0),
        })
        .await?;

    chain_client.send_raw_transaction(&built.hex, false).await?;

    Ok(RefundOutcome {
        tx_id: built.txid,
        fee: built.fee,
    })
}

/// Queries the on-chain lockup values and calls `refund_ether` / `refund_token`.
/// `token` is `None` for the native-currency contract family.
pub async fn refund_evm(
    contract_handler: &impl ContractHandler,
    refund_repo: &impl RefundTransactionRepository,
    swap_id: &str,
    kind: SwapKind,
    token: Option<&str>,
    preimage_hash: &str,
    amount_wei: u128,
    claim_address: &str,
    timelock: u64,
) -> NurseryResult<RefundOutcome> {
    let sent = match token {
        Some(token) => {
            contract_handler
                .refund_token(token, preimage_hash, amount_wei, claim_address, timelock)
                .await?
        }
        None => {
            contract_handler
                .refund_ether(preimage_hash, amount_wei, claim_address, timelock)
                .await?
        }
    };

    refund_repo
        .add_transaction(RefundTransactionRow {
            swap_id: swap_id.to_string(),
            kind,
            id: sent.transaction_id.clone(),
            vin: None,
        })
        .await?;

    Ok(RefundOutcome {
        tx_id: sent.transaction_id,
        fee: sent.fee,
    })
}

/// Logs and notifies on a refund failure. The swap row is left exactly as it
/// was before the attempt; there is no automatic retry, so recovery is a
/// manual operator action.
pub async fn handle_failed_refund(notifier: &impl Notifier, swap_id: &str, reason: &str) {
    error!(%swap_id, %reason, "refund failed, no automatic retry");
    notifier
        .notify(format!("refund failed for swap {swap_id}: {reason}"))
        .await;
}
