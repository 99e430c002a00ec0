use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::debug;

use super::store::{
    activate_in, select_active, select_history, select_latest_by_source, select_range,
};
use super::{RateBounds, RateRecord, RateStore};
use crate::clock::{Clock, SystemClock};

/// Rate history persisted as one JSON record per line in
/// `{base_path}/history.jsonl`.
pub struct JsonlRateStore {
    base_path: PathBuf,
    bounds: RateBounds,
    to_currency: String,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl JsonlRateStore {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            bounds: RateBounds::default(),
            to_currency: "VES".to_string(),
            clock: Arc::new(SystemClock),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_bounds(mut self, bounds: RateBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_local_currency(mut self, code: impl Into<String>) -> Self {
        self.to_currency = code.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn history_file(&self) -> PathBuf {
        self.base_path.join("history.jsonl")
    }

    async fn read_all(&self) -> Result<Vec<RateRecord>> {
        let path = self.history_file();
        let file = match fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context("Failed to open rate history"),
        };

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut records = Vec::new();

        while let Some(line) = lines.next_line().await.context("Failed to read line")? {
            if line.trim().is_empty() {
                continue;
            }
            let record: RateRecord = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse rate history line: {line}"))?;
            records.push(record);
        }

        Ok(records)
    }

    /// Replace the history file in one rename so readers never see a
    /// half-written file.
    async fn write_all(&self, records: &[RateRecord]) -> Result<()> {
        fs::create_dir_all(&self.base_path)
            .await
            .context("Failed to create rate directory")?;

        let mut content = String::new();
        for record in records {
            let line = serde_json::to_string(record).context("Failed to serialize rate")?;
            content.push_str(&line);
            content.push('\n');
        }

        let path = self.history_file();
        let tmp = path.with_extension("jsonl.tmp");
        fs::write(&tmp, content)
            .await
            .context("Failed to write rate history")?;
        fs::rename(&tmp, &path)
            .await
            .context("Failed to replace rate history")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RateStore for JsonlRateStore {
    async fn get_active(&self) -> Result<Option<RateRecord>> {
        let records = self.read_all().await?;
        Ok(select_active(&records))
    }

    async fn insert_and_activate(&self, source: &str, rate: f64) -> Result<RateRecord> {
        let rate = self.bounds.check(rate)?;
        let _guard = self.write_lock.lock().await;

        let mut records = self.read_all().await?;
        let record = activate_in(&mut records, source, rate, &self.to_currency, self.clock.now());
        self.write_all(&records).await?;

        debug!(id = record.id, source = %record.source, rate = record.rate, "rate persisted");
        Ok(record)
    }

    async fn get_history(&self, limit: usize) -> Result<Vec<RateRecord>> {
        let records = self.read_all().await?;
        Ok(select_history(&records, limit))
    }

    async fn get_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RateRecord>> {
        let records = self.read_all().await?;
        Ok(select_range(&records, start, end))
    }

    async fn get_latest_by_source(&self, source: &str) -> Result<Option<RateRecord>> {
        let records = self.read_all().await?;
        Ok(select_latest_by_source(&records, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_is_empty_history() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JsonlRateStore::new(dir.path().join("rates"));
        assert!(store.get_active().await?.is_none());
        assert!(store.get_history(10).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn file_keeps_one_active_line() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JsonlRateStore::new(dir.path());

        store.insert_and_activate("a", 36.0).await?;
        store.insert_and_activate("b", 36.5).await?;
        store.insert_and_activate("MANUAL", 37.0).await?;

        let content = fs::read_to_string(store.history_file()).await?;
        let parsed: Vec<RateRecord> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed.iter().filter(|r| r.is_active).count(), 1);
        assert!(parsed[2].is_active);
        assert_eq!(parsed[2].source, "MANUAL");

        // A fresh handle over the same directory sees the same state.
        let reopened = JsonlRateStore::new(dir.path());
        let active = reopened.get_active().await?.expect("active record");
        assert_eq!(active.id, 3);
        let next = reopened.insert_and_activate("a", 37.5).await?;
        assert_eq!(next.id, 4);
        Ok(())
    }

    #[tokio::test]
    async fn blank_lines_are_ignored_and_garbage_is_reported() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JsonlRateStore::new(dir.path());
        store.insert_and_activate("a", 36.0).await?;

        let path = store.history_file();
        let mut content = fs::read_to_string(&path).await?;
        content.push_str("\n\n");
        fs::write(&path, &content).await?;
        assert_eq!(store.get_history(10).await?.len(), 1);

        content.push_str("not json\n");
        fs::write(&path, &content).await?;
        let err = store.get_history(10).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse rate history line"));
        Ok(())
    }
}
