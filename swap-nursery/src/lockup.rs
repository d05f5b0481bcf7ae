//! Server-side lockup algorithm for reverse and chain swaps.

use swap_core::traits::Wallet;
use swap_core::NurseryResult;

/// Transaction-size table entry the prepay minerfee formula divides by.
/// Only the one size this nursery needs (`BitcoinLike`/`Legacy` reverse
/// lockup) is modeled; the others live with the `Core` script constructors.
pub const REVERSE_LOCKUP_LEGACY_VBYTES: f64 = 153.0;

/// Decodes a prepay minerfee invoice's amount (millisatoshi) and derives the
/// fee rate the user has already paid for, so the server never fronts a fee
/// the user didn't fund: the server must not commit funds before the user
/// has paid for the miner fee.
pub fn fee_from_prepay_minerfee(amount_msat: u64) -> u64 {
    let sat = amount_msat / 1_000;
    (sat as f64 / REVERSE_LOCKUP_LEGACY_VBYTES).round() as u64
}

/// Result of a server-side lockup attempt.
pub struct LockupOutcome {
    pub tx_id: String,
    pub vout: u32,
    pub amount: u64,
    pub fee: u64,
}

/// Sends `amount` to `lockup_address` at `fee_per_vbyte`, tagging the send
/// with `label` (sourced from `TransactionLabelRepository::lockup_label`).
/// Callers install the input/output filters and persist
/// `server_lockup_transaction` themselves, since only they know which
/// category lock and repository the outcome belongs to.
pub async fn send_server_lockup(
    wallet: &impl Wallet,
    lockup_address: &str,
    amount: u64,
    fee_per_vbyte: f64,
    label: &str,
) -> NurseryResult<LockupOutcome> {
    let sent = wallet
        .send_to_address(lockup_address, amount, fee_per_vbyte, label)
        .await?;
    Ok(LockupOutcome {
        tx_id: sent.transaction_id,
        vout: sent.vout,
        amount,
        fee: sent.fee,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepay_minerfee_formula_rounds_to_nearest_sat_per_vbyte() {
        // 1530 sat / 153 vbyte = 10 sat/vbyte exactly.
        assert_eq!(fee_from_prepay_minerfee(1_530_000), 10);
        // 1560 sat / 153 vbyte = 10.196... rounds to 10.
        assert_eq!(fee_from_prepay_minerfee(1_560_000), 10);
        // 1620 sat / 153 vbyte = 10.588... rounds to 11.
        assert_eq!(fee_from_prepay_minerfee(1_620_000), 11);
    }
}
