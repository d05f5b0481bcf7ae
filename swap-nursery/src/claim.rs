//! Claim construction shared by `attempt_settle`'s Submarine and Chain paths,
//! building a claim on the receiving chain.

use async_trait::async_trait;
use swap_core::traits::{ChainClient, ContractHandler, Wallet};
use swap_core::NurseryResult;

pub struct BuiltClaim {
    pub hex: String,
    pub txid: String,
    pub fee: u64,
}

/// Builds a claim transaction spending a UTXO/Liquid lockup with the
/// revealed preimage. Script construction (legacy redeem script vs Taproot
/// key/script path) is delegated to the `Core` constructors.
#[async_trait]
pub trait ClaimScriptBuilder: Send + Sync {
    async fn build_claim_transaction(
        &self,
        lockup_tx_hex: &str,
        preimage: &str,
        claim_address: &str,
        fee_per_vbyte: f64,
    ) -> NurseryResult<BuiltClaim>;
}

pub struct ClaimOutcome {
    pub tx_id: String,
    pub fee: u64,
}

/// UTXO/Liquid claim: fetch the raw lockup transaction, build a claim
/// spending it to a fresh wallet address, pay the estimated fee, broadcast.
/// `label` (sourced from `TransactionLabelRepository::claim_label`) tags the
/// claim address request.
pub async fn claim_utxo(
    chain_client: &impl ChainClient,
    wallet: &impl Wallet,
    builder: &impl ClaimScriptBuilder,
    lockup_tx_id: &str,
    preimage: &str,
    label: &str,
) -> NurseryResult<ClaimOutcome> {
    let lockup_tx_hex = chain_client.get_raw_transaction(lockup_tx_id).await?;
    let fee_per_vbyte = chain_client.estimate_fee(None).await?;
    let claim_address = wallet.get_address(label).await?;

    let built = builder
        .build_claim_transaction(&lockup_tx_hex, preimage, &claim_address, fee_per_vbyte)
        .await?;

    chain_client.send_raw_transaction(&built.hex, false).await?;

    Ok(ClaimOutcome {
        tx_id: built.txid,
        fee: built.fee,
    })
}

/// Ether/ERC-20 claim: read the lockup's on-chain values, submit the
/// contract claim call with `preimage`.
pub async fn claim_evm(
    contract_handler: &impl ContractHandler,
    preimage_hash: &str,
    preimage: &str,
    token: Option<&str>,
) -> NurseryResult<ClaimOutcome> {
    // Touches the lockup values mainly to confirm the event is visible
    // before we submit; the contract itself validates amount/timelock.
    let _details = contract_handler.lockup_details(preimage_hash).await?;

    let sent = match token {
        Some(token) => contract_handler.claim_token(token, preimage_hash, preimage).await?,
        None => contract_handler.claim_ether(preimage_hash, preimage).await?,
    };

    Ok(ClaimOutcome {
        tx_id: sent.transaction_id,
        fee: sent.fee,
    })
}
