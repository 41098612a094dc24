use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use fjall::{Database, Keyspace};
use tokio::task;

use super::HistoryRecorder;
use crate::models::{HistoryRecord, StoredRecord};

const NEXT_ID_KEY: &[u8] = b"next_id";

/// History persisted in fjall.
///
/// Records are postcard encoded under their big-endian id, so keys sort in
/// insertion order. The next free id lives in a separate keyspace and is
/// committed in the same batch as the record it was handed to.
pub struct DiskHistory {
    shared: Arc<Shared>,
}

struct Shared {
    db: Database,
    records: Keyspace,
    meta: Keyspace,
    // held by the blocking writer, so a cancelled caller cannot release it early
    write_lock: Mutex<()>,
}

fn get_from_store(store: &Keyspace, key: &[u8]) -> Result<Option<Vec<u8>>> {
    Ok(store.get(key)?.map(|v| v.to_vec()))
}

fn decode_id(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| anyhow!("Corrupt history key of {} bytes", key.len()))?;
    Ok(u64::from_be_bytes(bytes))
}

fn decode_record(id: u64, bytes: &[u8]) -> Result<StoredRecord> {
    let record: HistoryRecord = postcard::from_bytes(bytes)
        .with_context(|| format!("Failed to decode history record {id}"))?;
    Ok(StoredRecord { id, record })
}

impl Shared {
    fn next_id(&self) -> Result<u64> {
        match get_from_store(&self.meta, NEXT_ID_KEY)? {
            Some(bytes) => decode_id(&bytes).context("Corrupt history sequence"),
            None => Ok(1),
        }
    }

    fn append(&self, bytes: Vec<u8>) -> Result<u64> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let id = self.next_id()?;
        let mut batch = self.db.batch();
        batch.insert(&self.records, id.to_be_bytes().to_vec(), bytes);
        batch.insert(&self.meta, NEXT_ID_KEY.to_vec(), (id + 1).to_be_bytes().to_vec());
        batch.commit()?;
        Ok(id)
    }

    fn scan(&self) -> Result<Vec<StoredRecord>> {
        self.records
            .iter()
            .map(|entry| {
                let (key, value) = entry.into_inner()?;
                decode_record(decode_id(&key)?, &value)
            })
            .collect()
    }

    fn load(&self, id: u64) -> Result<Option<StoredRecord>> {
        get_from_store(&self.records, &id.to_be_bytes())?
            .map(|bytes| decode_record(id, &bytes))
            .transpose()
    }
}

impl DiskHistory {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = Database::builder(path)
            .open()
            .with_context(|| format!("Failed to open history database at {}", path.display()))?;
        let records = db.keyspace("history", fjall::KeyspaceCreateOptions::default)?;
        let meta = db.keyspace("history_meta", fjall::KeyspaceCreateOptions::default)?;
        Ok(Self {
            shared: Arc::new(Shared {
                db,
                records,
                meta,
                write_lock: Mutex::new(()),
            }),
        })
    }
}

#[async_trait]
impl HistoryRecorder for DiskHistory {
    #[tracing::instrument(name = "record_history", level = "debug", skip(self, record))]
    async fn record(&self, record: HistoryRecord) -> Result<u64> {
        let bytes = postcard::to_stdvec(&record)?;
        let shared = Arc::clone(&self.shared);
        task::spawn_blocking(move || shared.append(bytes)).await?
    }

    async fn all(&self) -> Result<Vec<StoredRecord>> {
        let shared = Arc::clone(&self.shared);
        task::spawn_blocking(move || shared.scan()).await?
    }

    #[tracing::instrument(name = "query_history", level = "debug", skip(self))]
    async fn get(&self, id: u64) -> Result<Option<StoredRecord>> {
        let shared = Arc::clone(&self.shared);
        task::spawn_blocking(move || shared.load(id)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::models::PlaylistResult;

    fn record(location: &str, temperature: f64) -> HistoryRecord {
        HistoryRecord::new(
            location.to_string(),
            temperature,
            ["Track 1", "Track 2"].into_iter().collect::<PlaylistResult>(),
        )
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let history = DiskHistory::open(dir.path()).unwrap();
            assert_eq!(history.record(record("London", 15.0)).await.unwrap(), 1);
            let id = history.record(record("Lat: 1, Lon: 2", 31.5)).await.unwrap();
            assert_eq!(id, 2);
        }

        let history = DiskHistory::open(dir.path()).unwrap();
        let all = history.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].record.location, "London");
        assert_eq!(all[1].record.temperature, 31.5);
        assert_eq!(all[1].record.playlist.tracks(), &["Track 1", "Track 2"]);

        assert_eq!(history.record(record("Paris", 20.0)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_get_unknown_id() {
        let dir = tempfile::tempdir().unwrap();
        let history = DiskHistory::open(dir.path()).unwrap();
        assert!(history.get(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_timestamp_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let history = DiskHistory::open(dir.path()).unwrap();
        let original = record("London", 15.0);
        let id = history.record(original.clone()).await.unwrap();

        let stored = history.get(id).await.unwrap().unwrap();
        assert_eq!(stored.record, original);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_writes_never_reuse_ids() {
        let dir = tempfile::tempdir().unwrap();
        let history = DiskHistory::open(dir.path()).unwrap();
        let long_playlist: PlaylistResult = (0..20_000).map(|i| format!("Track {i}")).collect();

        let mut kept = Vec::new();
        for i in 0..40 {
            let abandoned =
                HistoryRecord::new(format!("Abandoned {i}"), 0.0, long_playlist.clone());
            let _ = tokio::time::timeout(Duration::ZERO, history.record(abandoned)).await;

            let id = history.record(record(&format!("Kept {i}"), 20.0)).await.unwrap();
            kept.push((id, format!("Kept {i}")));
        }

        let mut ids: Vec<u64> = kept.iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), kept.len());

        for (id, location) in &kept {
            let stored = history.get(*id).await.unwrap().unwrap();
            assert_eq!(&stored.record.location, location);
        }

        let next = history.record(record("Last", 1.0)).await.unwrap();
        let all = history.all().await.unwrap();
        assert!(all.iter().any(|stored| stored.id == next));
        let kept_ids: Vec<u64> = all
            .iter()
            .filter(|stored| stored.record.location.starts_with("Kept"))
            .map(|stored| stored.id)
            .collect();
        assert_eq!(kept_ids.len(), kept.len());
    }

    #[tokio::test]
    async fn test_all_is_ordered_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let history = DiskHistory::open(dir.path()).unwrap();
        for i in 0..300 {
            history.record(record(&format!("City {i}"), 10.0)).await.unwrap();
        }

        let all = history.all().await.unwrap();
        assert_eq!(all.len(), 300);
        assert!(all.windows(2).all(|pair| pair[0].id + 1 == pair[1].id));
        assert_eq!(all[255].record.location, "City 255");
    }
}
