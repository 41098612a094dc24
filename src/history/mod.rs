//! Request history
//!
//! Every successful pipeline run is written once to a [`HistoryRecorder`].
//! The pipeline never fails because of it, recorder errors are only logged.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::models::{HistoryRecord, StoredRecord};

pub mod disk;

pub use disk::DiskHistory;

/// Durable log of completed requests
#[async_trait]
pub trait HistoryRecorder: Send + Sync {
    /// Store a record, returning the id assigned to it
    async fn record(&self, record: HistoryRecord) -> Result<u64>;

    /// All records, oldest first
    async fn all(&self) -> Result<Vec<StoredRecord>>;

    async fn get(&self, id: u64) -> Result<Option<StoredRecord>>;
}

/// Process-local history, lost on restart
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    records: Mutex<Vec<HistoryRecord>>,
}

impl InMemoryHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryRecorder for InMemoryHistory {
    async fn record(&self, record: HistoryRecord) -> Result<u64> {
        let mut records = self.records.lock().await;
        records.push(record);
        Ok(records.len() as u64)
    }

    async fn all(&self) -> Result<Vec<StoredRecord>> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .enumerate()
            .map(|(idx, record)| StoredRecord {
                id: idx as u64 + 1,
                record: record.clone(),
            })
            .collect())
    }

    async fn get(&self, id: u64) -> Result<Option<StoredRecord>> {
        let records = self.records.lock().await;
        let record = usize::try_from(id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(|idx| records.get(idx));
        Ok(record.map(|record| StoredRecord {
            id,
            record: record.clone(),
        }))
    }
}

/// Open the backend selected in the configuration
pub fn open(config: &AppConfig) -> Result<Arc<dyn HistoryRecorder>> {
    match config.history.backend.as_str() {
        "disk" => Ok(Arc::new(DiskHistory::open(config.history_path())?)),
        _ => Ok(Arc::new(InMemoryHistory::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlaylistResult;

    fn record(location: &str) -> HistoryRecord {
        HistoryRecord::new(
            location.to_string(),
            18.0,
            ["A", "B"].into_iter().collect::<PlaylistResult>(),
        )
    }

    #[tokio::test]
    async fn test_in_memory_ids_are_sequential() {
        let history = InMemoryHistory::new();
        assert_eq!(history.record(record("London")).await.unwrap(), 1);
        assert_eq!(history.record(record("Paris")).await.unwrap(), 2);

        let all = history.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].id, 2);
        assert_eq!(all[1].record.location, "Paris");
    }

    #[tokio::test]
    async fn test_in_memory_get() {
        let history = InMemoryHistory::new();
        history.record(record("London")).await.unwrap();

        let found = history.get(1).await.unwrap().unwrap();
        assert_eq!(found.record.location, "London");
        assert!(history.get(0).await.unwrap().is_none());
        assert!(history.get(2).await.unwrap().is_none());
    }

    #[test]
    fn test_open_memory_backend_by_default() {
        let config = AppConfig::default();
        assert!(open(&config).is_ok());
    }
}
