//! Error types for the swap nursery
//!
//! One variant per error kind the nursery distinguishes, plus the handful
//! of infrastructure errors (serialization, uuid parsing)
//! that surface at the same boundary.

use thiserror::Error;

/// Main error type returned by nursery operations.
#[derive(Error, Debug)]
pub enum NurseryError {
    /// A lockup was rejected by policy (`TransactionHook`, `OverpaymentProtector`,
    /// chain-level rules). Moves the swap to `TransactionLockupFailed`.
    #[error("lockup rejected: {0}")]
    LockupRejected(String),

    /// A lockup was rejected for zero-conf policy only; the swap keeps waiting
    /// for confirmation rather than failing outright.
    #[error("zero-conf rejected: {0}")]
    ZeroConfRejected(String),

    /// A Lightning RPC exceeded `lightning_client_call_timeout`.
    #[error("lightning rpc timed out: {0}")]
    LightningRpcTimeout(String),

    /// A hold invoice or prepay invoice was already gone when we tried to act on it.
    #[error("invoice not found: {0}")]
    InvoiceNotFound(String),

    /// A wallet send or contract call failed to broadcast/submit.
    #[error("send failure: {0}")]
    SendFailure(String),

    /// A Lightning payment failed for a reason that will not resolve on retry.
    #[error("payment permanently failed: {0}")]
    PaymentPermanent(String),

    /// A refund transaction failed to build or broadcast. No automatic retry.
    #[error("refund failure: {0}")]
    RefundFailure(String),

    /// Lock queue overflow or a closed channel under an in-flight sender.
    #[error("internal error: {0}")]
    Internal(String),

    /// Swap, reverse swap or chain swap not known to the repository.
    #[error("swap not found: {0}")]
    NotFound(String),

    /// Attempted state transition falls outside the per-kind status DAG.
    #[error("invalid state transition {from} -> {to}: {reason}")]
    StateTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("uuid error: {0}")]
    Uuid(#[from] uuid::Error),

    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl NurseryError {
    pub fn lockup_rejected<S: Into<String>>(msg: S) -> Self {
        Self::LockupRejected(msg.into())
    }

    pub fn zero_conf_rejected<S: Into<String>>(msg: S) -> Self {
        Self::ZeroConfRejected(msg.into())
    }

    pub fn lightning_timeout<S: Into<String>>(msg: S) -> Self {
        Self::LightningRpcTimeout(msg.into())
    }

    pub fn invoice_not_found<S: Into<String>>(msg: S) -> Self {
        Self::InvoiceNotFound(msg.into())
    }

    pub fn send_failure<S: Into<String>>(msg: S) -> Self {
        Self::SendFailure(msg.into())
    }

    pub fn payment_permanent<S: Into<String>>(msg: S) -> Self {
        Self::PaymentPermanent(msg.into())
    }

    pub fn refund_failure<S: Into<String>>(msg: S) -> Self {
        Self::RefundFailure(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn state_transition<S: Into<String>>(from: S, to: S, reason: S) -> Self {
        Self::StateTransition {
            from: from.into(),
            to: to.into(),
            reason: reason.into(),
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// True for the handful of Lightning "already gone" errors that should be
    /// downgraded to a debug log instead of failing the handler.
    pub fn is_benign_not_found(&self) -> bool {
        matches!(self, Self::InvoiceNotFound(_))
    }
}

pub type NurseryResult<T> = Result<T, NurseryError>;
