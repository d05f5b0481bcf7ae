//! Typed configuration for the swap nursery, layered from a config file plus
//! environment overrides via the `config` crate.

use serde::Deserialize;
use std::time::Duration;
use swap_core::NurseryError;

/// Configuration for the three category locks.
#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    /// Bound on in-flight events per category before `try_dispatch` fails
    /// fast with an internal error, in place of an unbounded pending-
    /// acquisition counter.
    pub max_pending_events: usize,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_pending_events: 10_000,
        }
    }
}

/// How many confirmations a lockup/refund must reach before being treated as
/// final, per currency family.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationConfig {
    pub utxo_confirmations: u32,
    pub evm_confirmations: u32,
    pub reverse_lockup_mempool_eta: u32,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            utxo_confirmations: 1,
            evm_confirmations: 12,
            reverse_lockup_mempool_eta: 2,
        }
    }
}

/// Lightning RPC and payment timing knobs, racing each call against a timeout.
#[derive(Debug, Clone, Deserialize)]
pub struct LightningConfig {
    pub payment_timeout_minutes: u64,
    pub lightning_client_call_timeout_ms: u64,
}

impl Default for LightningConfig {
    fn default() -> Self {
        Self {
            payment_timeout_minutes: 30,
            lightning_client_call_timeout_ms: 10_000,
        }
    }
}

/// Retry timer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Seconds between retry sweeps; `0` disables the timer.
    pub retry_interval_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_interval_seconds: 60,
        }
    }
}

/// Refund watcher polling interval.
#[derive(Debug, Clone, Deserialize)]
pub struct RefundWatcherConfig {
    pub scan_interval_seconds: u64,
    pub required_confirmations: u32,
}

impl Default for RefundWatcherConfig {
    fn default() -> Self {
        Self {
            scan_interval_seconds: 30,
            required_confirmations: 1,
        }
    }
}

/// Top-level nursery configuration, assembled from a config file (if present)
/// and `NURSERY_`-prefixed environment variables, in that order.
#[derive(Debug, Clone, Deserialize)]
pub struct NurseryConfig {
    #[serde(default)]
    pub locks: LockConfig,
    #[serde(default)]
    pub confirmations: ConfirmationConfig,
    #[serde(default)]
    pub lightning: LightningConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub refund_watcher: RefundWatcherConfig,
}

impl Default for NurseryConfig {
    fn default() -> Self {
        Self {
            locks: LockConfig::default(),
            confirmations: ConfirmationConfig::default(),
            lightning: LightningConfig::default(),
            retry: RetryConfig::default(),
            refund_watcher: RefundWatcherConfig::default(),
        }
    }
}

impl NurseryConfig {
    /// Loads configuration from `path` (if it exists) layered under defaults,
    /// then applies any `NURSERY_*` environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self, NurseryError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(config::Environment::with_prefix("NURSERY").separator("__"));

        let built = builder
            .build()
            .map_err(|e| NurseryError::config(format!("failed to build configuration: {e}")))?;

        match built.try_deserialize::<NurseryConfig>() {
            Ok(config) => Ok(config),
            // No file and no matching env vars: fall back to pure defaults
            // rather than failing startup.
            Err(_) if path.is_none() => Ok(NurseryConfig::default()),
            Err(e) => Err(NurseryError::config(format!(
                "failed to parse configuration: {e}"
            ))),
        }
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_secs(self.lightning.payment_timeout_minutes * 60)
    }

    pub fn lightning_call_timeout(&self) -> Duration {
        Duration::from_millis(self.lightning.lightning_client_call_timeout_ms)
    }
}
