//! Assembles the orchestrator with the invoice and refund watchers into one
//! runnable unit, and exposes health/shutdown for the embedding service.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use swap_core::traits::RefundTransactionRepository;
#[cfg(test)]
use swap_core::traits::{ChannelCreationRepository, ChannelCreationRequest, TransactionLabelRepository};
use swap_core::{NurseryResult, OutboundEvent};
use swap_lightning::InvoiceWatcher;
use swap_refund::{ConfirmationSource, RefundWatcher};

use crate::config::NurseryConfig;
use crate::orchestrator::SwapNursery;

/// Result of `NurseryNode::health_check`.
#[derive(Debug, Clone)]
pub struct NodeHealth {
    pub healthy: bool,
    pub issues: Vec<String>,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Top-level handle combining the orchestrator with its polling watchers
/// (the chain-specific `ChainWatcher`/`EthereumWatcher`/`LightningWatcher`
/// instances are driven by the embedding service per currency, since each is
/// generic over that currency's concrete collaborators).
pub struct NurseryNode {
    nursery: Arc<SwapNursery>,
    invoice_watcher: Arc<InvoiceWatcher>,
    refund_watcher: RefundWatcher,
    refund_repo: Arc<dyn RefundTransactionRepository>,
    confirmation_source: Arc<dyn ConfirmationSource>,
    outbound_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<OutboundEvent>>>,
}

impl NurseryNode {
    pub fn new(
        config: &NurseryConfig,
        nursery: SwapNursery,
        outbound_rx: mpsc::UnboundedReceiver<OutboundEvent>,
        refund_repo: Arc<dyn RefundTransactionRepository>,
        confirmation_source: Arc<dyn ConfirmationSource>,
    ) -> Self {
        info!("initializing swap nursery node");
        Self {
            nursery: Arc::new(nursery),
            invoice_watcher: Arc::new(InvoiceWatcher::new()),
            refund_watcher: RefundWatcher::new(config.refund_watcher.required_confirmations),
            refund_repo,
            confirmation_source,
            outbound_rx: std::sync::Mutex::new(Some(outbound_rx)),
        }
    }

    pub fn nursery(&self) -> &Arc<SwapNursery> {
        &self.nursery
    }

    pub fn invoice_watcher(&self) -> &Arc<InvoiceWatcher> {
        &self.invoice_watcher
    }

    /// Takes ownership of the outbound event stream. Callers forward these to
    /// whatever outer server/notification channel subscribes. Can
    /// only be taken once; a second call returns `None`.
    pub fn take_outbound_events(&self) -> Option<mpsc::UnboundedReceiver<OutboundEvent>> {
        self.outbound_rx.lock().expect("outbound_rx mutex poisoned").take()
    }

    /// One pass of the refund-confirmation scan; intended to be
    /// called on `refund_watcher.scan_interval_seconds`.
    pub async fn scan_refunds(
        &self,
        symbol_of: impl Fn(&swap_core::traits::RefundTransactionRow) -> &str,
    ) -> NurseryResult<Vec<swap_core::WatcherEvent>> {
        self.refund_watcher
            .scan(self.refund_repo.as_ref(), symbol_of, self.confirmation_source.as_ref())
            .await
    }

    /// Health check across the components this node owns directly. The
    /// chain-specific watchers report their own health through whatever
    /// drives them.
    pub async fn health_check(&self) -> NodeHealth {
        let mut issues = Vec::new();

        if let Err(err) = self.nursery.health_probe().await {
            issues.push(format!("swap repository unreachable: {err}"));
        }

        NodeHealth {
            healthy: issues.is_empty(),
            issues,
            timestamp: Utc::now(),
        }
    }

    /// Graceful shutdown: lets any in-flight category-lock handler drain.
    /// Stateless beyond that; all durable state lives in the repositories.
    pub async fn shutdown(&self) {
        info!("shutting down swap nursery node");
        tokio::time::sleep(Duration::from_millis(50)).await;
        if self.outbound_rx.lock().expect("outbound_rx mutex poisoned").is_some() {
            warn!("outbound event channel was never drained before shutdown");
        }
        info!("swap nursery node shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::{BuiltClaim, ClaimScriptBuilder};
    use crate::refund::{BuiltRefund, RefundRequest, RefundScriptBuilder};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use swap_core::models::{ChainStatus, ChainSwap, ReverseStatus, ReverseSwap, Swap, SubmarineStatus};
    use swap_core::traits::{
        ChainSwapRepository, HoldInvoiceLookup, InvoiceState, LightningClient, Notifier,
        RefundTransactionRepository, RefundTransactionRow, ReverseSwapRepository, SwapRepository,
        WrappedSwapRepository,
    };
    use swap_core::NurseryError;

    struct FakeSwapRepo {
        unreachable: bool,
    }

    #[async_trait]
    impl SwapRepository for FakeSwapRepo {
        async fn get(&self, id: &str) -> NurseryResult<Swap> {
            Err(NurseryError::not_found(id))
        }
        async fn save(&self, _swap: &Swap) -> NurseryResult<()> {
            Ok(())
        }
        async fn set_status(&self, _id: &str, _status: SubmarineStatus) -> NurseryResult<()> {
            Ok(())
        }
        async fn set_rate(&self, _id: &str, _rate: rust_decimal::Decimal) -> NurseryResult<()> {
            Ok(())
        }
        async fn set_miner_fee(&self, _id: &str, _fee: u64) -> NurseryResult<()> {
            Ok(())
        }
        async fn get_by_status(&self, _statuses: &[SubmarineStatus]) -> NurseryResult<Vec<Swap>> {
            if self.unreachable {
                Err(NurseryError::internal("repository unreachable"))
            } else {
                Ok(vec![])
            }
        }
        async fn find_by_preimage_hash(&self, _preimage_hash: &str) -> NurseryResult<Option<Swap>> {
            Ok(None)
        }
    }

    struct FakeReverseRepo;

    #[async_trait]
    impl ReverseSwapRepository for FakeReverseRepo {
        async fn get(&self, id: &str) -> NurseryResult<ReverseSwap> {
            Err(NurseryError::not_found(id))
        }
        async fn save(&self, _swap: &ReverseSwap) -> NurseryResult<()> {
            Ok(())
        }
        async fn set_status(&self, _id: &str, _status: ReverseStatus) -> NurseryResult<()> {
            Ok(())
        }
        async fn set_invoice_settled(&self, _id: &str, _preimage: &str) -> NurseryResult<()> {
            Ok(())
        }
    }

    struct FakeChainRepo;

    #[async_trait]
    impl ChainSwapRepository for FakeChainRepo {
        async fn get(&self, id: &str) -> NurseryResult<ChainSwap> {
            Err(NurseryError::not_found(id))
        }
        async fn save(&self, _swap: &ChainSwap) -> NurseryResult<()> {
            Ok(())
        }
        async fn set_status(&self, _id: &str, _status: ChainStatus) -> NurseryResult<()> {
            Ok(())
        }
        async fn set_claim_miner_fee(&self, _id: &str, _fee: u64) -> NurseryResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeWrappedRepo;

    #[async_trait]
    impl WrappedSwapRepository for FakeWrappedRepo {
        async fn set_server_lockup_transaction(
            &self,
            _id: &str,
            _tx_id: &str,
            _amount: u64,
            _fee: u64,
            _vout: u32,
        ) -> NurseryResult<()> {
            Ok(())
        }
        async fn set_transaction_refunded(&self, _id: &str, _tx_id: &str) -> NurseryResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeRefundRepo {
        rows: StdMutex<Vec<RefundTransactionRow>>,
    }

    #[async_trait]
    impl RefundTransactionRepository for FakeRefundRepo {
        async fn add_transaction(&self, row: RefundTransactionRow) -> NurseryResult<()> {
            self.rows.lock().unwrap().push(row);
            Ok(())
        }
        async fn unconfirmed(&self) -> NurseryResult<Vec<RefundTransactionRow>> {
            Ok(self.rows.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct FakeLightningClient;

    #[async_trait]
    impl LightningClient for FakeLightningClient {
        async fn pay(&self, _invoice: &str, _timeout: std::time::Duration) -> NurseryResult<String> {
            Ok("preimage".into())
        }
        async fn add_hold_invoice(
            &self,
            _preimage_hash: &str,
            _amount_sat: u64,
            _expiry: std::time::Duration,
            _memo: &str,
        ) -> NurseryResult<String> {
            Ok("lnbc1...".into())
        }
        async fn settle_hold_invoice(&self, _preimage: &str) -> NurseryResult<()> {
            Ok(())
        }
        async fn cancel_hold_invoice(&self, _preimage_hash: &str) -> NurseryResult<()> {
            Ok(())
        }
        async fn lookup_hold_invoice(&self, _preimage_hash: &str) -> NurseryResult<HoldInvoiceLookup> {
            Ok(HoldInvoiceLookup {
                state: InvoiceState::Open,
                htlc_states: vec![],
            })
        }
    }

    #[derive(Default)]
    struct FakeNotifier;

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn notify(&self, _message: String) {}
    }

    struct FakeClaimBuilder;

    #[async_trait]
    impl ClaimScriptBuilder for FakeClaimBuilder {
        async fn build_claim_transaction(
            &self,
            _lockup_tx_hex: &str,
            _preimage: &str,
            _claim_address: &str,
            _fee_per_vbyte: f64,
        ) -> NurseryResult<BuiltClaim> {
            Ok(BuiltClaim {
                hex: "claimhex".into(),
                txid: "claimtx".into(),
                fee: 300,
            })
        }
    }

    struct FakeRefundBuilder;

    #[async_trait]
    impl RefundScriptBuilder for FakeRefundBuilder {
        async fn build_refund_transaction(
            &self,
            _lockup_tx_hex: &str,
            _request: &RefundRequest,
            _refund_address: &str,
            _fee_per_vbyte: f64,
        ) -> NurseryResult<BuiltRefund> {
            Ok(BuiltRefund {
                hex: "refundhex".into(),
                txid: "refundtx".into(),
                fee: 400,
            })
        }
    }

    #[derive(Default)]
    struct FakeChannelCreationRepo;

    #[async_trait]
    impl ChannelCreationRepository for FakeChannelCreationRepo {
        async fn get_channel_creation(&self, _swap_id: &str) -> NurseryResult<Option<ChannelCreationRequest>> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct FakeLabelRepo;

    #[async_trait]
    impl TransactionLabelRepository for FakeLabelRepo {
        async fn lockup_label(&self, swap_id: &str) -> String {
            format!("lockup {swap_id}")
        }
        async fn claim_label(&self, swap_id: &str) -> String {
            format!("claim {swap_id}")
        }
        async fn refund_label(&self, swap_id: &str) -> String {
            format!("refund {swap_id}")
        }
    }

    fn build_node(swap_repo_unreachable: bool) -> NurseryNode {
        let config = NurseryConfig::default();
        let (nursery, outbound_rx) = SwapNursery::new(
            NurseryConfig::default(),
            HashMap::new(),
            Arc::new(FakeSwapRepo {
                unreachable: swap_repo_unreachable,
            }),
            Arc::new(FakeReverseRepo),
            Arc::new(FakeChainRepo),
            Arc::new(FakeWrappedRepo::default()),
            Arc::new(FakeRefundRepo::default()),
            Arc::new(FakeLightningClient::default()),
            None,
            Arc::new(FakeNotifier::default()),
            Arc::new(FakeClaimBuilder),
            Arc::new(FakeRefundBuilder),
            None,
            Arc::new(FakeChannelCreationRepo),
            Arc::new(FakeLabelRepo),
        );
        let refund_repo: Arc<dyn RefundTransactionRepository> = Arc::new(FakeRefundRepo::default());
        let confirmation_source: Arc<dyn ConfirmationSource> = Arc::new(FixedConfirmations(3));
        NurseryNode::new(&config, nursery, outbound_rx, refund_repo, confirmation_source)
    }

    struct FixedConfirmations(u32);

    #[async_trait]
    impl ConfirmationSource for FixedConfirmations {
        async fn confirmations(&self, _symbol: &str, _txid: &str) -> NurseryResult<u32> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn health_check_reports_healthy_when_repository_reachable() {
        let node = build_node(false);
        let health = node.health_check().await;
        assert!(health.healthy);
        assert!(health.issues.is_empty());
    }

    #[tokio::test]
    async fn health_check_reports_unhealthy_when_repository_unreachable() {
        let node = build_node(true);
        let health = node.health_check().await;
        assert!(!health.healthy);
        assert_eq!(health.issues.len(), 1);
    }

    #[tokio::test]
    async fn take_outbound_events_only_succeeds_once() {
        let node = build_node(false);
        assert!(node.take_outbound_events().is_some());
        assert!(node.take_outbound_events().is_none());
    }

    #[tokio::test]
    async fn scan_refunds_reports_confirmed_entries() {
        let node = build_node(false);
        node.refund_repo
            .add_transaction(RefundTransactionRow {
                swap_id: "rev1".into(),
                kind: swap_core::SwapKind::ReverseSubmarine,
                id: "refundtx1".into(),
                vin: Some(0),
            })
            .await
            .unwrap();

        let events = node.scan_refunds(|_row| "BTC").await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], swap_core::WatcherEvent::RefundConfirmed { .. }));
    }
}
