use anyhow::{bail, Result};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::Receivable;

/// The narrow slice of the accounts module recalculation depends on.
#[async_trait::async_trait]
pub trait ReceivableLedger: Send + Sync {
    /// Open receivables whose base currency is USD.
    async fn find_open_usd_receivables(&self) -> Result<Vec<Receivable>>;

    /// Overwrite only the local-currency amount of one receivable.
    async fn update_receivable_amount(&self, id: &str, new_amount: Decimal) -> Result<()>;
}

/// In-memory ledger for tests and embedding.
#[derive(Default)]
pub struct MemoryReceivableLedger {
    receivables: Mutex<Vec<Receivable>>,
}

impl MemoryReceivableLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, receivable: Receivable) {
        let mut receivables = self.receivables.lock().await;
        receivables.retain(|r| r.id != receivable.id);
        receivables.push(receivable);
    }

    pub async fn get(&self, id: &str) -> Option<Receivable> {
        let receivables = self.receivables.lock().await;
        receivables.iter().find(|r| r.id == id).cloned()
    }

    pub async fn all(&self) -> Vec<Receivable> {
        self.receivables.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl ReceivableLedger for MemoryReceivableLedger {
    async fn find_open_usd_receivables(&self) -> Result<Vec<Receivable>> {
        let receivables = self.receivables.lock().await;
        Ok(receivables.iter().filter(|r| r.tracks_rate()).cloned().collect())
    }

    async fn update_receivable_amount(&self, id: &str, new_amount: Decimal) -> Result<()> {
        let mut receivables = self.receivables.lock().await;
        match receivables.iter_mut().find(|r| r.id == id) {
            Some(receivable) => {
                receivable.amount = new_amount;
                Ok(())
            }
            None => bail!("Receivable not found: {id}"),
        }
    }
}
