//! Hold-invoice state transition watcher.

use std::sync::Arc;
use swap_core::traits::LightningClient;
use swap_core::{NurseryResult, WatcherEvent};
use tracing::{debug, warn};

/// Which of a reverse swap's two invoices accepted an HTLC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptedInvoice {
    Main,
    PrepayMinerFee,
}

/// Turns `Open -> Accepted` hold-invoice transitions into the events the
/// orchestrator reacts to, and exposes the shared cancellation helper used
/// by expiry, refund and send-failure paths alike.
pub struct LightningWatcher<L: LightningClient> {
    client: Arc<L>,
}

impl<L: LightningClient> LightningWatcher<L> {
    pub fn new(client: Arc<L>) -> Self {
        Self { client }
    }

    /// `swap_id` owns the invoice; `which` distinguishes the main hold
    /// invoice from the prepay minerfee invoice, since only the former means
    /// the user fully paid for the swap.
    pub fn handle_accepted(&self, swap_id: &str, which: AcceptedInvoice) -> WatcherEvent {
        match which {
            AcceptedInvoice::Main => {
                debug!(%swap_id, "main hold invoice accepted");
                WatcherEvent::InvoicePaid {
                    swap_id: swap_id.to_string(),
                }
            }
            AcceptedInvoice::PrepayMinerFee => {
                debug!(%swap_id, "prepay minerfee invoice accepted");
                WatcherEvent::MinerFeeInvoicePaid {
                    swap_id: swap_id.to_string(),
                }
            }
        }
    }

    /// Cancels the main invoice and, if present, the prepay minerfee
    /// invoice. When `is_send_failure` is set the prepay amount is returned
    /// to the payer as a side effect of cancellation — the Lightning
    /// protocol refunds a cancelled HTLC automatically, so no separate call
    /// is needed here. "Invoice not found" is downgraded to a debug log: the
    /// invoice may already have been cancelled by a previous attempt.
    pub async fn cancel_reverse_invoices(
        &self,
        main_preimage_hash: &str,
        minerfee_preimage_hash: Option<&str>,
        is_send_failure: bool,
    ) -> NurseryResult<()> {
        if is_send_failure {
            debug!(%main_preimage_hash, "cancelling due to send failure, prepay will be refunded");
        }

        self.cancel_one(main_preimage_hash).await?;
        if let Some(hash) = minerfee_preimage_hash {
            self.cancel_one(hash).await?;
        }
        Ok(())
    }

    async fn cancel_one(&self, preimage_hash: &str) -> NurseryResult<()> {
        match self.client.cancel_hold_invoice(preimage_hash).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_benign_not_found() => {
                warn!(%preimage_hash, "invoice already gone, treating cancel as a no-op");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use swap_core::traits::HoldInvoiceLookup;
    use swap_core::NurseryError;

    #[derive(Default)]
    struct FakeLightningClient {
        cancelled: Mutex<Vec<String>>,
        not_found: Vec<String>,
    }

    #[async_trait]
    impl LightningClient for FakeLightningClient {
        async fn pay(&self, _invoice: &str, _timeout: Duration) -> NurseryResult<String> {
            unimplemented!("not exercised by these tests")
        }
        async fn add_hold_invoice(
            &self,
            _preimage_hash: &str,
            _amount_sat: u64,
            _expiry: Duration,
            _memo: &str,
        ) -> NurseryResult<String> {
            unimplemented!("not exercised by these tests")
        }
        async fn settle_hold_invoice(&self, _preimage: &str) -> NurseryResult<()> {
            unimplemented!("not exercised by these tests")
        }
        async fn cancel_hold_invoice(&self, preimage_hash: &str) -> NurseryResult<()> {
            if self.not_found.iter().any(|h| h == preimage_hash) {
                return Err(NurseryError::invoice_not_found(preimage_hash));
            }
            self.cancelled.lock().unwrap().push(preimage_hash.to_string());
            Ok(())
        }
        async fn lookup_hold_invoice(&self, _preimage_hash: &str) -> NurseryResult<HoldInvoiceLookup> {
            unimplemented!("not exercised by these tests")
        }
    }

    #[test]
    fn handle_accepted_distinguishes_main_from_prepay() {
        let client = Arc::new(FakeLightningClient::default());
        let watcher = LightningWatcher::new(client);

        let main_event = watcher.handle_accepted("rev1", AcceptedInvoice::Main);
        assert!(matches!(main_event, WatcherEvent::InvoicePaid { swap_id } if swap_id == "rev1"));

        let prepay_event = watcher.handle_accepted("rev1", AcceptedInvoice::PrepayMinerFee);
        assert!(matches!(prepay_event, WatcherEvent::MinerFeeInvoicePaid { swap_id } if swap_id == "rev1"));
    }

    #[tokio::test]
    async fn cancel_reverse_invoices_cancels_both_when_prepay_present() {
        let client = Arc::new(FakeLightningClient::default());
        let watcher = LightningWatcher::new(client.clone());

        watcher
            .cancel_reverse_invoices("mainhash", Some("prepayhash"), false)
            .await
            .unwrap();

        let cancelled = client.cancelled.lock().unwrap();
        assert_eq!(*cancelled, vec!["mainhash".to_string(), "prepayhash".to_string()]);
    }

    #[tokio::test]
    async fn cancel_reverse_invoices_skips_absent_prepay() {
        let client = Arc::new(FakeLightningClient::default());
        let watcher = LightningWatcher::new(client.clone());

        watcher.cancel_reverse_invoices("mainhash", None, false).await.unwrap();

        let cancelled = client.cancelled.lock().unwrap();
        assert_eq!(*cancelled, vec!["mainhash".to_string()]);
    }

    #[tokio::test]
    async fn cancel_reverse_invoices_downgrades_already_gone_invoice() {
        let client = Arc::new(FakeLightningClient {
            cancelled: Mutex::new(vec![]),
            not_found: vec!["mainhash".to_string()],
        });
        let watcher = LightningWatcher::new(client.clone());

        let result = watcher.cancel_reverse_invoices("mainhash", None, false).await;

        assert!(result.is_ok());
        assert!(client.cancelled.lock().unwrap().is_empty());
    }
}
