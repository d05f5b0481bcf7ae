//! The orchestrator itself (`SwapNursery`): owns the swap-level
//! state machine, serializes actions per swap category, and drives
//! lockup/claim/refund through the wallets, contract handlers and Lightning
//! client.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use swap_core::models::{Currency, ReverseStatus, SubmarineStatus};
use swap_core::traits::{
    ChainClient, ChainSwapRepository, ChannelCreationRepository, ContractHandler, DeferredClaimer,
    LightningClient, Notifier, RefundTransactionRepository, ReverseSwapRepository, SwapRepository,
    TransactionLabelRepository, Wallet, WrappedSwapRepository,
};
use swap_core::{preimage_matches_hash, NurseryError, NurseryResult, OutboundEvent, SwapKind};
use swap_lightning::InvoicePayer;

use crate::claim::{claim_evm, claim_utxo, ClaimScriptBuilder};
use crate::config::NurseryConfig;
use crate::lockup::{fee_from_prepay_minerfee, send_server_lockup};
use crate::refund::{handle_failed_refund, refund_evm, refund_utxo, RefundRequest, RefundScriptBuilder};

/// Everything the orchestrator needs to act on one currency. The
/// `currencies` map is populated at init and is immutable thereafter.
pub struct CurrencyHandles {
    pub currency: Currency,
    pub chain_client: Option<Arc<dyn ChainClient>>,
    pub wallet: Option<Arc<dyn Wallet>>,
    pub contract_handler: Option<Arc<dyn ContractHandler>>,
    /// `Some(token_address)` for an ERC-20, `None` for the native currency.
    pub token_address: Option<String>,
}

pub struct SwapNursery {
    pub config: NurseryConfig,
    currencies: HashMap<String, CurrencyHandles>,
    swap_repo: Arc<dyn SwapRepository>,
    reverse_repo: Arc<dyn ReverseSwapRepository>,
    chain_repo: Arc<dyn ChainSwapRepository>,
    wrapped_repo: Arc<dyn WrappedSwapRepository>,
    refund_repo: Arc<dyn RefundTransactionRepository>,
    lightning_client: Arc<dyn LightningClient>,
    deferred_claimer: Option<Arc<dyn DeferredClaimer>>,
    notifier: Arc<dyn Notifier>,
    claim_builder: Arc<dyn ClaimScriptBuilder>,
    refund_builder: Arc<dyn RefundScriptBuilder>,
    /// `None` when no Lightning client is configured for this deployment;
    /// submarine lockups then just sit in `InvoicePending` until an operator
    /// wires one up.
    payment_handler: Option<Arc<dyn InvoicePayer>>,
    channel_creation_repo: Arc<dyn ChannelCreationRepository>,
    label_repo: Arc<dyn TransactionLabelRepository>,
    outbound_tx: mpsc::UnboundedSender<OutboundEvent>,
}

#[allow(clippy::too_many_arguments)]
impl SwapNursery {
    pub fn new(
        config: NurseryConfig,
        currencies: HashMap<String, CurrencyHandles>,
        swap_repo: Arc<dyn SwapRepository>,
        reverse_repo: Arc<dyn ReverseSwapRepository>,
        chain_repo: Arc<dyn ChainSwapRepository>,
        wrapped_repo: Arc<dyn WrappedSwapRepository>,
        refund_repo: Arc<dyn RefundTransactionRepository>,
        lightning_client: Arc<dyn LightningClient>,
        deferred_claimer: Option<Arc<dyn DeferredClaimer>>,
        notifier: Arc<dyn Notifier>,
        claim_builder: Arc<dyn ClaimScriptBuilder>,
        refund_builder: Arc<dyn RefundScriptBuilder>,
        payment_handler: Option<Arc<dyn InvoicePayer>>,
        channel_creation_repo: Arc<dyn ChannelCreationRepository>,
        label_repo: Arc<dyn TransactionLabelRepository>,
    ) -> (Self, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        (
            Self {
                config,
                currencies,
                swap_repo,
                reverse_repo,
                chain_repo,
                wrapped_repo,
                refund_repo,
                lightning_client,
                deferred_claimer,
                notifier,
                claim_builder,
                refund_builder,
                payment_handler,
                channel_creation_repo,
                label_repo,
                outbound_tx,
            },
            outbound_rx,
        )
    }

    fn emit(&self, event: OutboundEvent) {
        if self.outbound_tx.send(event).is_err() {
            warn!("outbound event receiver dropped, event discarded");
        }
    }

    fn handles(&self, symbol: &str) -> NurseryResult<&CurrencyHandles> {
        self.currencies
            .get(symbol)
            .ok_or_else(|| NurseryError::internal(format!("unknown currency {symbol}")))
    }

    /// Touches the swap repository to confirm it is reachable, for
    /// `NurseryNode::health_check`.
    pub async fn health_probe(&self) -> NurseryResult<()> {
        self.swap_repo.get_by_status(&[]).await?;
        Ok(())
    }

    // ---- attempt_settle (public contract) ------------------------------

    /// Submarine claim path: the preimage has already been obtained by
    /// `PaymentHandler::pay_invoice`; this builds and broadcasts the claim
    /// spending the user's lockup.
    #[instrument(skip(self, preimage))]
    pub async fn attempt_settle_submarine(
        &self,
        symbol: &str,
        swap_id: &str,
        preimage: String,
    ) -> NurseryResult<()> {
        let mut swap = self.swap_repo.get(swap_id).await?;

        if !preimage_matches_hash(&preimage, &swap.preimage_hash)? {
            return Err(NurseryError::internal(
                "preimage does not match swap's preimage_hash",
            ));
        }

        if let Some(claimer) = &self.deferred_claimer {
            if claimer.offer_claim(swap_id, &preimage).await? {
                swap.transition_to(SubmarineStatus::TransactionClaimPending)?;
                self.swap_repo.save(&swap).await?;
                self.emit(OutboundEvent::ClaimPending {
                    swap_id: swap_id.to_string(),
                });
                return Ok(());
            }
        }

        let handles = self.handles(symbol)?;
        let lockup_tx_id = swap
            .lockup_transaction_id
            .clone()
            .ok_or_else(|| NurseryError::internal("swap has no recorded lockup transaction"))?;

        let outcome = if handles.currency.currency_type.is_utxo() {
            let chain_client = handles
                .chain_client
                .as_ref()
                .ok_or_else(|| NurseryError::internal("no chain client for symbol"))?;
            let wallet = handles
                .wallet
                .as_ref()
                .ok_or_else(|| NurseryError::internal("no wallet for symbol"))?;
            let label = self.label_repo.claim_label(swap_id).await;
            claim_utxo(
                chain_client.as_ref(),
                wallet.as_ref(),
                self.claim_builder.as_ref(),
                &lockup_tx_id,
                &preimage,
                &label,
            )
            .await?
        } else {
            let contract_handler = handles
                .contract_handler
                .as_ref()
                .ok_or_else(|| NurseryError::internal("no contract handler for symbol"))?;
            claim_evm(
                contract_handler.as_ref(),
                &swap.preimage_hash,
                &preimage,
                handles.token_address.as_deref(),
            )
            .await?
        };

        self.swap_repo.set_miner_fee(swap_id, outcome.fee).await?;
        swap.transition_to(SubmarineStatus::TransactionClaimed)?;
        self.swap_repo.save(&swap).await?;
        self.emit(OutboundEvent::Claim {
            swap_id: swap_id.to_string(),
            tx_id: outcome.tx_id,
        });
        Ok(())
    }

    /// Chain-swap claim path: the caller has already extracted the preimage
    /// from the counterparty's claim of our server-side lockup.
    #[instrument(skip(self, preimage))]
    pub async fn attempt_settle_chain(&self, swap_id: &str, preimage: String) -> NurseryResult<()> {
        let mut swap = self.chain_repo.get(swap_id).await?;

        if !preimage_matches_hash(&preimage, &swap.preimage_hash)? {
            return Err(NurseryError::internal(
                "preimage does not match swap's preimage_hash",
            ));
        }

        if let Some(claimer) = &self.deferred_claimer {
            if claimer.offer_claim(swap_id, &preimage).await? {
                swap.transition_to(swap_core::models::ChainStatus::TransactionClaimPending)?;
                self.chain_repo.save(&swap).await?;
                self.emit(OutboundEvent::ClaimPending {
                    swap_id: swap_id.to_string(),
                });
                return Ok(());
            }
        }

        let handles = self.handles(&swap.receiving.symbol)?;
        let lockup_tx_id = swap
            .receiving
            .transaction_id
            .clone()
            .ok_or_else(|| NurseryError::internal("receiving leg has no recorded lockup"))?;

        let outcome = if handles.currency.currency_type.is_utxo() {
            let chain_client = handles
                .chain_client
                .as_ref()
                .ok_or_else(|| NurseryError::internal("no chain client for symbol"))?;
            let wallet = handles
                .wallet
                .as_ref()
                .ok_or_else(|| NurseryError::internal("no wallet for symbol"))?;
            let label = self.label_repo.claim_label(swap_id).await;
            claim_utxo(
                chain_client.as_ref(),
                wallet.as_ref(),
                self.claim_builder.as_ref(),
                &lockup_tx_id,
                &preimage,
                &label,
            )
            .await?
        } else {
            let contract_handler = handles
                .contract_handler
                .as_ref()
                .ok_or_else(|| NurseryError::internal("no contract handler for symbol"))?;
            claim_evm(
                contract_handler.as_ref(),
                &swap.preimage_hash,
                &preimage,
                handles.token_address.as_deref(),
            )
            .await?
        };

        self.chain_repo.set_claim_miner_fee(swap_id, outcome.fee).await?;
        swap.transition_to(swap_core::models::ChainStatus::TransactionClaimed)?;
        self.chain_repo.save(&swap).await?;
        self.emit(OutboundEvent::Claim {
            swap_id: swap_id.to_string(),
            tx_id: outcome.tx_id,
        });
        Ok(())
    }

    /// Settles a reverse swap's hold invoice, unless a submarine swap shares
    /// the same invoice (a cyclic self-payment): in that case the invoice
    /// is cancelled instead, since settling would deadlock routing.
    #[instrument(skip(self, preimage))]
    pub async fn settle_reverse_invoice(&self, swap_id: &str, preimage: String) -> NurseryResult<()> {
        let mut swap = self.reverse_repo.get(swap_id).await?;

        if !preimage_matches_hash(&preimage, &swap.preimage_hash)? {
            return Err(NurseryError::internal(
                "preimage does not match swap's preimage_hash",
            ));
        }

        if let Some(_cyclic) = self
            .swap_repo
            .find_by_preimage_hash(&swap.preimage_hash)
            .await?
        {
            warn!(%swap_id, "cyclic self-payment detected, cancelling instead of settling");
            match tokio::time::timeout(
                self.config.lightning_call_timeout(),
                self.lightning_client.cancel_hold_invoice(&swap.preimage_hash),
            )
            .await
            {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.is_benign_not_found() => {}
                Ok(Err(err)) => return Err(err),
                Err(_) => return Err(NurseryError::lightning_timeout("cancel_hold_invoice")),
            }
            return Ok(());
        }

        match tokio::time::timeout(
            self.config.lightning_call_timeout(),
            self.lightning_client.settle_hold_invoice(&preimage),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(_) => return Err(NurseryError::lightning_timeout("settle_hold_invoice")),
        }

        self.reverse_repo.set_invoice_settled(swap_id, &preimage).await?;
        swap.transition_to(ReverseStatus::InvoiceSettled)?;
        self.reverse_repo.save(&swap).await?;
        self.emit(OutboundEvent::InvoiceSettled {
            swap_id: swap_id.to_string(),
            preimage,
        });
        Ok(())
    }

    // ---- Server-side lockup (reverse / chain) -------------------------

    /// Chooses `fee_per_vbyte` from the prepay minerfee invoice if present,
    /// otherwise from `estimate_fee`, then broadcasts the server lockup.
    #[instrument(skip(self))]
    pub async fn perform_reverse_lockup(&self, swap_id: &str) -> NurseryResult<()> {
        let mut swap = self.reverse_repo.get(swap_id).await?;
        if swap.has_server_lockup() {
            warn!(%swap_id, "prevented second server-side lockup");
            return Ok(());
        }

        let handles = self.handles(&swap.lightning_currency)?;
        let chain_client = handles
            .chain_client
            .as_ref()
            .ok_or_else(|| NurseryError::internal("no chain client for symbol"))?;

        let fee_per_vbyte = if let Some(onchain_equivalent) = swap.minerfee_onchain_amount {
            // `minerfee_onchain_amount` is the satoshi equivalent of the prepay
            // minerfee invoice, already resolved at quote time (decode_invoice
            // itself stays out of scope here).
            fee_from_prepay_minerfee(onchain_equivalent * 1_000)
        } else {
            chain_client
                .estimate_fee(Some(self.config.confirmations.reverse_lockup_mempool_eta))
                .await? as u64
        };

        let wallet = handles
            .wallet
            .as_ref()
            .ok_or_else(|| NurseryError::internal("no wallet for symbol"))?;
        let label = self.label_repo.lockup_label(swap_id).await;

        match send_server_lockup(
            wallet.as_ref(),
            &swap.lockup_address,
            swap.onchain_amount,
            fee_per_vbyte as f64,
            &label,
        )
        .await
        {
            Ok(outcome) => {
                // Watch for the user spending our lockup, which reveals the
                // preimage, and for the lockup itself reaching confirmation.
                chain_client.add_input_filter(&outcome.tx_id).await?;
                let lockup_script = wallet.decode_address(&swap.lockup_address).await?;
                chain_client.add_output_filter(&lockup_script).await?;

                self.wrapped_repo
                    .set_server_lockup_transaction(
                        swap_id,
                        &outcome.tx_id,
                        outcome.amount,
                        outcome.fee,
                        outcome.vout,
                    )
                    .await?;
                swap.server_lockup_transaction_id = Some(outcome.tx_id.clone());
                swap.server_lockup_transaction_vout = Some(outcome.vout);
                swap.transition_to(ReverseStatus::TransactionMempool)?;
                self.reverse_repo.save(&swap).await?;
                self.emit(OutboundEvent::CoinsSent {
                    swap_id: swap_id.to_string(),
                    tx_id: outcome.tx_id,
                    amount: outcome.amount,
                    fee: outcome.fee,
                });
                Ok(())
            }
            Err(err) => {
                warn!(%swap_id, error = %err, "server lockup send failed");
                swap.transition_to(ReverseStatus::TransactionFailed)?;
                self.reverse_repo.save(&swap).await?;
                self.emit(OutboundEvent::CoinsFailedToSend {
                    swap_id: swap_id.to_string(),
                    reason: err.to_string(),
                });
                match tokio::time::timeout(
                    self.config.lightning_call_timeout(),
                    self.lightning_client.cancel_hold_invoice(&swap.preimage_hash),
                )
                .await
                {
                    Ok(Ok(())) | Ok(Err(_)) => {}
                    Err(_) => warn!(%swap_id, "timed out cancelling invoice after send failure"),
                }
                Err(err)
            }
        }
    }

    /// Sending-leg server lockup for a Chain swap: the counterpart to
    /// `perform_reverse_lockup`, guarded against a second broadcast by
    /// `ChainSwap::sending_lockup_already_sent`.
    #[instrument(skip(self))]
    pub async fn perform_chain_lockup(&self, swap_id: &str) -> NurseryResult<()> {
        let mut swap = self.chain_repo.get(swap_id).await?;
        if swap.sending_lockup_already_sent() {
            warn!(%swap_id, "prevented second server-side lockup");
            return Ok(());
        }

        let handles = self.handles(&swap.sending.symbol)?;
        let chain_client = handles
            .chain_client
            .as_ref()
            .ok_or_else(|| NurseryError::internal("no chain client for symbol"))?;
        let wallet = handles
            .wallet
            .as_ref()
            .ok_or_else(|| NurseryError::internal("no wallet for symbol"))?;

        let fee_per_vbyte = chain_client
            .estimate_fee(Some(self.config.confirmations.reverse_lockup_mempool_eta))
            .await?;
        let label = self.label_repo.lockup_label(swap_id).await;

        match send_server_lockup(
            wallet.as_ref(),
            &swap.sending.lockup_address,
            swap.sending.expected_amount,
            fee_per_vbyte,
            &label,
        )
        .await
        {
            Ok(outcome) => {
                // Watch for the counterparty spending our lockup, which
                // reveals the preimage.
                chain_client.add_input_filter(&outcome.tx_id).await?;

                swap.sending.transaction_id = Some(outcome.tx_id.clone());
                swap.sending.transaction_vout = Some(outcome.vout);
                swap.transition_to(swap_core::models::ChainStatus::TransactionServerMempool)?;
                self.chain_repo.save(&swap).await?;
                self.emit(OutboundEvent::CoinsSent {
                    swap_id: swap_id.to_string(),
                    tx_id: outcome.tx_id,
                    amount: outcome.amount,
                    fee: outcome.fee,
                });
                Ok(())
            }
            Err(err) => {
                warn!(%swap_id, error = %err, "chain swap server lockup send failed");
                swap.transition_to(swap_core::models::ChainStatus::TransactionFailed)?;
                self.chain_repo.save(&swap).await?;
                self.emit(OutboundEvent::CoinsFailedToSend {
                    swap_id: swap_id.to_string(),
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    // ---- Observed user lockup (submarine) ------------------------------

    /// Handles an observed user lockup on a submarine swap: emits the
    /// transaction event, then either pays the invoice immediately (if one
    /// is already attached) or waits for the rate to be frozen in the
    /// set-invoice-after-lockup flow.
    #[instrument(skip(self))]
    pub async fn handle_submarine_lockup(
        &self,
        symbol: &str,
        swap_id: &str,
        tx_id: &str,
        confirmed: bool,
    ) -> NurseryResult<Option<SubmarineStatus>> {
        let swap = self.swap_repo.get(swap_id).await?;
        self.emit(OutboundEvent::Transaction {
            swap_id: swap_id.to_string(),
            tx_id: tx_id.to_string(),
            confirmed,
        });

        if let Some(invoice) = swap.invoice.clone() {
            self.swap_repo
                .set_status(swap_id, SubmarineStatus::InvoicePending)
                .await?;
            self.try_pay_and_claim(symbol, swap_id, &invoice).await?;
            Ok(Some(SubmarineStatus::InvoicePending))
        } else if let Some(rate) = swap.rate {
            // No invoice yet (set-invoice-after-lockup flow): freeze the rate
            // quoted for this lockup so a later invoice can't be set against a
            // stale price.
            self.swap_repo.set_rate(swap_id, rate).await?;
            Ok(None)
        } else {
            Ok(None)
        }
    }

    /// Pays a submarine swap's invoice via the configured `PaymentHandler`
    /// and, on success, immediately claims the user's lockup. Returns
    /// `Ok(true)` only when a claim was driven to completion this call;
    /// `Ok(false)` covers "no payment handler configured" and "payment still
    /// in flight, retry later" alike.
    async fn try_pay_and_claim(&self, symbol: &str, swap_id: &str, invoice: &str) -> NurseryResult<bool> {
        let Some(payment_handler) = &self.payment_handler else {
            return Ok(false);
        };
        let channel_creation = self.channel_creation_repo.get_channel_creation(swap_id).await?;

        match payment_handler
            .pay_invoice(symbol, None, invoice, channel_creation.as_ref())
            .await?
        {
            Some(preimage) => {
                self.swap_repo
                    .set_status(swap_id, SubmarineStatus::InvoicePaid)
                    .await?;
                self.attempt_settle_submarine(symbol, swap_id, preimage).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// A zero-conf rejection does not cancel the swap; the eventual
    /// confirmation still triggers the normal path.
    pub async fn handle_zero_conf_rejected(&self, swap_id: &str, reason: &str) -> NurseryResult<()> {
        self.swap_repo
            .set_status(swap_id, SubmarineStatus::TransactionZeroConfRejected)
            .await?;
        self.emit(OutboundEvent::ZeroConfRejected {
            swap_id: swap_id.to_string(),
            reason: reason.to_string(),
        });
        Ok(())
    }

    pub async fn handle_lockup_failed(&self, swap_id: &str, reason: &str) -> NurseryResult<()> {
        self.swap_repo
            .set_status(swap_id, SubmarineStatus::TransactionLockupFailed)
            .await?;
        self.emit(OutboundEvent::LockupFailed {
            swap_id: swap_id.to_string(),
            reason: reason.to_string(),
        });
        Ok(())
    }

    // ---- Expiration -----------------------------------------------------

    #[instrument(skip(self))]
    pub async fn handle_submarine_expired(&self, swap_id: &str) -> NurseryResult<()> {
        let mut swap = self.swap_repo.get(swap_id).await?;
        if swap.status == SubmarineStatus::SwapExpired {
            return Ok(()); // already expired, nothing to do
        }
        swap.transition_to(SubmarineStatus::SwapExpired)?;
        self.swap_repo.save(&swap).await?;
        self.emit(OutboundEvent::Expiration {
            swap_id: swap_id.to_string(),
        });
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn handle_reverse_expired(&self, swap_id: &str) -> NurseryResult<()> {
        let mut swap = self.reverse_repo.get(swap_id).await?;
        if swap.status == ReverseStatus::SwapExpired || swap.status == ReverseStatus::TransactionRefunded {
            return Ok(());
        }

        if swap.has_server_lockup() {
            self.refund_reverse(swap_id).await
        } else {
            swap.transition_to(ReverseStatus::SwapExpired)?;
            self.reverse_repo.save(&swap).await?;
            self.emit(OutboundEvent::Expiration {
                swap_id: swap_id.to_string(),
            });
            Ok(())
        }
    }

    // ---- Refund ---------------------------------------------------------

    #[instrument(skip(self))]
    async fn refund_reverse(&self, swap_id: &str) -> NurseryResult<()> {
        let mut swap = self.reverse_repo.get(swap_id).await?;
        let handles = self.handles(&swap.lightning_currency)?;
        let lockup_tx_id = swap
            .server_lockup_transaction_id
            .clone()
            .ok_or_else(|| NurseryError::internal("no server lockup recorded, cannot refund"))?;

        let result = if handles.currency.currency_type.is_utxo() {
            let chain_client = handles
                .chain_client
                .as_ref()
                .ok_or_else(|| NurseryError::internal("no chain client for symbol"))?;
            let wallet = handles
                .wallet
                .as_ref()
                .ok_or_else(|| NurseryError::internal("no wallet for symbol"))?;
            let label = self.label_repo.refund_label(swap_id).await;
            refund_utxo(
                wallet.as_ref(),
                chain_client.as_ref(),
                self.refund_builder.as_ref(),
                self.refund_repo.as_ref(),
                swap_id,
                SwapKind::ReverseSubmarine,
                &lockup_tx_id,
                &RefundRequest {
                    version: swap.version,
                    vout: swap.server_lockup_transaction_vout.unwrap_or(0),
                    key_index: swap.key_index,
                    redeem_script: swap.redeem_script.clone(),
                    timeout_block_height: swap.timeout_block_height,
                    amount: swap.onchain_amount,
                },
                &label,
            )
            .await
        } else {
            let contract_handler = handles
                .contract_handler
                .as_ref()
                .ok_or_else(|| NurseryError::internal("no contract handler for symbol"))?;
            let details = contract_handler.lockup_details(&swap.preimage_hash).await?;
            refund_evm(
                contract_handler.as_ref(),
                self.refund_repo.as_ref(),
                swap_id,
                SwapKind::ReverseSubmarine,
                handles.token_address.as_deref(),
                &swap.preimage_hash,
                details.amount_wei,
                &details.refund_address,
                details.timelock,
            )
            .await
        };

        match result {
            Ok(outcome) => {
                self.wrapped_repo
                    .set_transaction_refunded(swap_id, &outcome.tx_id)
                    .await?;
                swap.transition_to(ReverseStatus::TransactionRefunded)?;
                self.reverse_repo.save(&swap).await?;
                self.emit(OutboundEvent::Refund {
                    swap_id: swap_id.to_string(),
                    tx_id: outcome.tx_id,
                });
                Ok(())
            }
            Err(err) => {
                handle_failed_refund(self.notifier.as_ref(), swap_id, &err.to_string()).await;
                Err(err)
            }
        }
    }

    // ---- Ethereum lockup.failedToSend -----------------------------------

    /// Whether a double-spend is actually impossible once `sending.transaction_id`
    /// is already recorded is unresolved upstream; this path is taken
    /// unconditionally regardless of that, and an operator is notified so a
    /// human can confirm no funds were sent twice.
    #[instrument(skip(self))]
    pub async fn handle_eth_lockup_failed_to_send(
        &self,
        kind: SwapKind,
        swap_id: &str,
        reason: &str,
    ) -> NurseryResult<()> {
        self.notifier
            .notify(format!(
                "lockup.failedToSend for swap {swap_id}: {reason} (verify no double-spend occurred)"
            ))
            .await;

        match kind {
            SwapKind::ReverseSubmarine => {
                let mut swap = self.reverse_repo.get(swap_id).await?;
                swap.transition_to(ReverseStatus::TransactionFailed)?;
                self.reverse_repo.save(&swap).await?;
                match tokio::time::timeout(
                    self.config.lightning_call_timeout(),
                    self.lightning_client.cancel_hold_invoice(&swap.preimage_hash),
                )
                .await
                {
                    Ok(Ok(())) | Ok(Err(_)) => {}
                    Err(_) => warn!(%swap_id, "timed out cancelling invoice after EVM send failure"),
                }
            }
            SwapKind::Chain => {
                let mut swap = self.chain_repo.get(swap_id).await?;
                swap.transition_to(swap_core::models::ChainStatus::TransactionFailed)?;
                self.chain_repo.save(&swap).await?;
            }
            SwapKind::Submarine => {
                return Err(NurseryError::internal(
                    "submarine swaps have no server-side EVM lockup",
                ));
            }
        }

        self.emit(OutboundEvent::CoinsFailedToSend {
            swap_id: swap_id.to_string(),
            reason: reason.to_string(),
        });
        Ok(())
    }

    // ---- Retry timer -----------------------------------------------------

    /// Re-invokes payment for every submarine swap still awaiting
    /// settlement, recovering from restarts or transient Lightning routing
    /// failures. Swaps with no invoice attached yet, or whose payment is
    /// still in flight, are left untouched for the next sweep.
    pub async fn re_drive_pending_settlements(&self, symbol: &str) -> NurseryResult<usize> {
        let pending = self
            .swap_repo
            .get_by_status(&[SubmarineStatus::InvoicePending, SubmarineStatus::InvoicePaid])
            .await?;

        let mut retried = 0;
        for swap in pending {
            let Some(invoice) = &swap.invoice else {
                continue;
            };
            match self.try_pay_and_claim(symbol, &swap.id, invoice).await {
                Ok(true) => retried += 1,
                Ok(false) => {}
                Err(err) => warn!(swap_id = %swap.id, error = %err, "retry sweep failed for swap"),
            }
        }
        info!(count = retried, "retry sweep complete");
        Ok(retried)
    }
}
