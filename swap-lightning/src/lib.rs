//! Lightning-facing watchers and the submarine payment path.

pub mod invoice_watcher;
pub mod lightning_watcher;
pub mod payment_handler;

pub use invoice_watcher::InvoiceWatcher;
pub use lightning_watcher::{AcceptedInvoice, LightningWatcher};
pub use payment_handler::{
    ChannelCreationRequest, ChannelNursery, InvoicePayer, NodeSelector, PaymentHandler, PreferredOrFirst,
};
