//! Receivables consumed from the accounts module and their recalculation
//! when the active rate changes.

mod json_file;
mod ledger;
mod models;
mod recalc;

pub use json_file::JsonFileReceivableLedger;
pub use ledger::{MemoryReceivableLedger, ReceivableLedger};
pub use models::{BaseCurrency, Receivable, ReceivableStatus};
pub use recalc::{local_amount, RecalcReport, RecalculationService};
