use std::sync::Arc;

use anyhow::Result;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ReceivableLedger;

/// Outcome counts of one recalculation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalcReport {
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl RecalcReport {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// `base_amount_usd x rate`, rounded half away from zero to `decimals`.
/// `None` if the rate is not representable or the product overflows.
pub fn local_amount(base_amount_usd: Decimal, rate: f64, decimals: u32) -> Option<Decimal> {
    let rate = Decimal::from_f64(rate)?;
    let amount = base_amount_usd.checked_mul(rate)?;
    Some(amount.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero))
}

/// Recomputes local-currency amounts of USD receivables after a rate change.
///
/// Recomputing from the USD principal makes every pass idempotent, so a later
/// pass heals whatever an earlier one failed to write.
pub struct RecalculationService {
    ledger: Arc<dyn ReceivableLedger>,
    decimals: u32,
}

impl RecalculationService {
    pub fn new(ledger: Arc<dyn ReceivableLedger>) -> Self {
        Self {
            ledger,
            decimals: 2,
        }
    }

    pub fn with_decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    /// Errors only when the ledger cannot be queried at all; per-record
    /// failures are counted.
    pub async fn recalculate_on_rate_change(&self, new_rate: f64) -> Result<RecalcReport> {
        let receivables = self.ledger.find_open_usd_receivables().await?;
        let mut report = RecalcReport::default();

        for receivable in receivables.iter().filter(|r| r.tracks_rate()) {
            let Some(base) = receivable.base_amount_usd else {
                warn!(receivable = %receivable.id, "USD receivable has no USD principal, skipping");
                report.failed += 1;
                continue;
            };

            let Some(amount) = local_amount(base, new_rate, self.decimals) else {
                warn!(receivable = %receivable.id, rate = new_rate, "cannot compute local amount");
                report.failed += 1;
                continue;
            };

            if amount == receivable.amount {
                report.unchanged += 1;
                continue;
            }

            match self
                .ledger
                .update_receivable_amount(&receivable.id, amount)
                .await
            {
                Ok(()) => report.updated += 1,
                Err(err) => {
                    warn!(receivable = %receivable.id, error = %err, "failed to update receivable");
                    report.failed += 1;
                }
            }
        }

        info!(
            rate = new_rate,
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failed,
            "receivables recalculated"
        );
        Ok(report)
    }
}
