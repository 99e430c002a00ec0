use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use tokio::fs;
use tokio::sync::Mutex;

use super::{Receivable, ReceivableLedger};

/// Receivables stored as a JSON array in a single file.
///
/// Stands in for the host application's accounts table when running the CLI
/// and daemon on their own.
pub struct JsonFileReceivableLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileReceivableLedger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn list_all(&self) -> Result<Vec<Receivable>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context("Failed to read receivables"),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse receivables: {}", self.path.display()))
    }

    pub async fn save_all(&self, receivables: &[Receivable]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_unlocked(receivables).await
    }

    async fn write_unlocked(&self, receivables: &[Receivable]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create receivables directory")?;
        }
        let content =
            serde_json::to_string_pretty(receivables).context("Failed to serialize receivables")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .context("Failed to write receivables")?;
        fs::rename(&tmp, &self.path)
            .await
            .context("Failed to replace receivables")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReceivableLedger for JsonFileReceivableLedger {
    async fn find_open_usd_receivables(&self) -> Result<Vec<Receivable>> {
        let all = self.list_all().await?;
        Ok(all.into_iter().filter(|r| r.tracks_rate()).collect())
    }

    async fn update_receivable_amount(&self, id: &str, new_amount: Decimal) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.list_all().await?;
        match all.iter_mut().find(|r| r.id == id) {
            Some(receivable) => receivable.amount = new_amount,
            None => bail!("Receivable not found: {id}"),
        }
        self.write_unlocked(&all).await
    }
}
