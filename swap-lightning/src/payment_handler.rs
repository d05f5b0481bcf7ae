//! Submarine payment path.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use swap_core::traits::LightningClient;
pub use swap_core::traits::ChannelCreationRequest;
use swap_core::{NurseryError, NurseryResult};
use tracing::{info, warn};

/// Opens the channel a `channel_creation` request asked for before the
/// invoice can be paid. The implementation is out of scope here; only the
/// interface is specified.
#[async_trait]
pub trait ChannelNursery: Send + Sync {
    /// Returns once the channel is open and ready to route, looping
    /// internally on transient failures. A `false` result means the request
    /// is still pending and the caller should retry later rather than fail.
    async fn ensure_channel(&self, request: &ChannelCreationRequest) -> NurseryResult<bool>;
}

/// Picks which configured Lightning node/client should service a payment.
pub trait NodeSelector: Send + Sync {
    fn select<'a>(&'a self, currency: &str, preferred_node: Option<&str>) -> &'a str;
}

/// Falls back to the first candidate unless the preferred node name is
/// present among them.
pub struct PreferredOrFirst;

impl NodeSelector for PreferredOrFirst {
    fn select<'a>(&'a self, _currency: &str, preferred_node: Option<&str>) -> &'a str {
        preferred_node.unwrap_or("default")
    }
}

/// Pays submarine invoices against a pool of Lightning clients keyed by node
/// name, enforcing `payment_timeout_minutes` and delegating channel opens.
pub struct PaymentHandler<L: LightningClient, S: NodeSelector, C: ChannelNursery> {
    clients: HashMap<String, Arc<L>>,
    selector: S,
    channel_nursery: Option<C>,
    payment_timeout_minutes: u64,
}

impl<L: LightningClient, S: NodeSelector, C: ChannelNursery> PaymentHandler<L, S, C> {
    pub fn new(
        clients: HashMap<String, Arc<L>>,
        selector: S,
        channel_nursery: Option<C>,
        payment_timeout_minutes: u64,
    ) -> Self {
        Self {
            clients,
            selector,
            channel_nursery,
            payment_timeout_minutes,
        }
    }

    /// Returns `Ok(None)` when the payment is still in flight and should be
    /// retried later (timeout, transient RPC failure, or a pending channel
    /// open), `Ok(Some(preimage))` on success, and `Err` only for a
    /// permanent failure.
    pub async fn pay_invoice(
        &self,
        currency: &str,
        preferred_node: Option<&str>,
        invoice: &str,
        channel_creation: Option<&ChannelCreationRequest>,
    ) -> NurseryResult<Option<String>> {
        if let (Some(request), Some(nursery)) = (channel_creation, &self.channel_nursery) {
            match nursery.ensure_channel(request).await {
                Ok(true) => {}
                Ok(false) => {
                    info!(swap_id = %request.swap_id, "channel open still pending, retry later");
                    return Ok(None);
                }
                Err(err) => {
                    warn!(swap_id = %request.swap_id, error = %err, "channel open failed, retry later");
                    return Ok(None);
                }
            }
        }

        let node_name = self.selector.select(currency, preferred_node);
        let client = self
            .clients
            .get(node_name)
            .ok_or_else(|| NurseryError::internal(format!("no lightning client for node {node_name}")))?;

        let timeout = Duration::from_secs(self.payment_timeout_minutes * 60);
        match tokio::time::timeout(timeout, client.pay(invoice, timeout)).await {
            Ok(Ok(preimage)) => Ok(Some(preimage)),
            Ok(Err(NurseryError::PaymentPermanent(reason))) => {
                Err(NurseryError::payment_permanent(reason))
            }
            Ok(Err(err)) => {
                warn!(error = %err, "submarine payment failed transiently, retry later");
                Ok(None)
            }
            Err(_elapsed) => {
                warn!(%invoice, minutes = self.payment_timeout_minutes, "payment timed out, retry later");
                Ok(None)
            }
        }
    }
}

/// Type-erased view of `PaymentHandler::pay_invoice`, letting callers hold
/// one without being generic over the node-selection/channel-opening
/// strategy.
#[async_trait]
pub trait InvoicePayer: Send + Sync {
    async fn pay_invoice(
        &self,
        currency: &str,
        preferred_node: Option<&str>,
        invoice: &str,
        channel_creation: Option<&ChannelCreationRequest>,
    ) -> NurseryResult<Option<String>>;
}

#[async_trait]
impl<L, S, C> InvoicePayer for PaymentHandler<L, S, C>
where
    L: LightningClient,
    S: NodeSelector,
    C: ChannelNursery,
{
    async fn pay_invoice(
        &self,
        currency: &str,
        preferred_node: Option<&str>,
        invoice: &str,
        channel_creation: Option<&ChannelCreationRequest>,
    ) -> NurseryResult<Option<String>> {
        PaymentHandler::pay_invoice(self, currency, preferred_node, invoice, channel_creation).await
    }
}
