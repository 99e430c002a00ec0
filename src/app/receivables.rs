use anyhow::Result;

use super::types::ReceivableOutput;
use crate::config::ResolvedConfig;
use crate::receivables::JsonFileReceivableLedger;

pub async fn list_receivables(config: &ResolvedConfig) -> Result<Vec<ReceivableOutput>> {
    let ledger = JsonFileReceivableLedger::new(config.receivables_file());
    let receivables = ledger.list_all().await?;
    Ok(receivables
        .iter()
        .map(|r| ReceivableOutput::from_receivable(r, config.rates.display_decimals))
        .collect())
}
