//! API catalogue sync - fetch upstream entries and upsert them

use anyhow::Result;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use vigil_core::{ApiEntry, Backoff, SyncConfig};
use vigil_db::ApisRepository;
use vigil_fetch::ResilientFetcher;

/// Pull the first `limit` records of the `entries` array out of an upstream
/// payload. The limit applies to raw records, malformed ones included.
pub fn extract_entries(payload: &Value, limit: usize) -> Vec<ApiEntry> {
    let Some(records) = payload.get("entries").and_then(Value::as_array) else {
        debug!("Payload has no entries array");
        return Vec::new();
    };

    if records.len() > limit {
        debug!("Keeping {} of {} upstream records", limit, records.len());
    }

    records
        .iter()
        .take(limit)
        .filter(|record| record.is_object())
        .filter_map(|record| match serde_json::from_value(record.clone()) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping malformed entry: {}", e);
                None
            }
        })
        .collect()
}

/// Writes a batch of entries into the `apis` table
pub struct DataSync {
    apis: ApisRepository,
    max_entries: usize,
}

impl DataSync {
    pub fn new(apis: ApisRepository, max_entries: usize) -> Self {
        Self { apis, max_entries }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Upsert the first `max_entries` entries in one transaction
    pub async fn apply(&self, mut entries: Vec<ApiEntry>) -> vigil_core::Result<usize> {
        if entries.len() > self.max_entries {
            debug!(
                "Keeping {} of {} entries",
                self.max_entries,
                entries.len()
            );
            entries.truncate(self.max_entries);
        }
        self.apis.upsert_batch(&entries).await
    }
}

/// Periodic fetch-and-store loop
pub struct SyncService {
    fetcher: ResilientFetcher,
    sync: DataSync,
    interval: Duration,
    backoff: Backoff,
}

impl SyncService {
    pub fn new(config: &SyncConfig, fetcher: ResilientFetcher, sync: DataSync) -> Self {
        Self {
            fetcher,
            sync,
            interval: config.interval(),
            backoff: config.backoff(),
        }
    }

    /// One fetch-and-store cycle
    pub async fn sync_once(&self) -> Result<usize> {
        let payload = self.fetcher.fetch().await?;
        let entries = extract_entries(&payload, self.sync.max_entries());
        let applied = self.sync.apply(entries).await?;
        Ok(applied)
    }

    /// Delay before the next cycle after `failures` consecutive failures
    fn next_delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            self.interval
        } else {
            self.backoff.delay(failures)
        }
    }

    /// Sync until shutdown
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "Catalogue sync started ({} every {:?})",
            self.fetcher.primary_url(),
            self.interval
        );

        let mut failures = 0;
        loop {
            match self.sync_once().await {
                Ok(applied) => {
                    failures = 0;
                    info!("Synced {} catalogue entries", applied);
                }
                Err(e) => {
                    failures += 1;
                    error!("Catalogue sync failed: {:#}", e);
                }
            }

            let delay = self.next_delay(failures);
            if failures > 0 {
                warn!("Next sync attempt in {:?}", delay);
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => break,
            }
        }

        info!("Catalogue sync stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use vigil_core::FetchConfig;
    use vigil_db::Database;

    async fn setup_db() -> (Database, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("vigil.db")).await.unwrap();
        (db, dir)
    }

    fn entries(n: usize) -> Vec<ApiEntry> {
        (0..n)
            .map(|i| ApiEntry::new(format!("api-{i}"), format!("desc {i}"), "Test"))
            .collect()
    }

    #[test]
    fn test_extract_entries() {
        let payload = json!({
            "count": 3,
            "entries": [
                {"API": "Cat Facts", "Description": "Cats", "Category": "Animals", "Auth": ""},
                "not an object",
                {"Description": "nameless"},
                {"API": 42}
            ]
        });

        let entries = extract_entries(&payload, 10);
        assert_eq!(
            entries,
            vec![
                ApiEntry::new("Cat Facts", "Cats", "Animals"),
                ApiEntry::new("Unknown", "nameless", "General"),
            ]
        );
    }

    #[test]
    fn test_extract_entries_missing_or_wrong_shape() {
        assert!(extract_entries(&json!({}), 10).is_empty());
        assert!(extract_entries(&json!({"entries": null}), 10).is_empty());
        assert!(extract_entries(&json!({"entries": {"API": "x"}}), 10).is_empty());
        assert!(extract_entries(&json!([1, 2, 3]), 10).is_empty());
    }

    #[tokio::test]
    async fn test_limit_counts_malformed_records() {
        let (db, _dir) = setup_db().await;
        let sync = DataSync::new(db.apis(), 10);

        let mut records = vec![json!("junk"), json!(7), json!(null)];
        records.extend((0..12).map(|i| json!({"API": format!("api-{i}"), "Description": "d"})));
        let payload = json!({ "entries": records });

        let entries = extract_entries(&payload, sync.max_entries());
        assert_eq!(entries.len(), 7);

        let applied = sync.apply(entries).await.unwrap();
        assert_eq!(applied, 7);
        assert_eq!(db.apis().count().await.unwrap(), 7);
        assert!(db.apis().get_by_name("api-6").await.unwrap().is_some());
        assert!(db.apis().get_by_name("api-7").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_apply_truncates() {
        let (db, _dir) = setup_db().await;
        let sync = DataSync::new(db.apis(), 10);

        let applied = sync.apply(entries(15)).await.unwrap();

        assert_eq!(applied, 10);
        assert_eq!(db.apis().count().await.unwrap(), 10);
        assert!(db.apis().get_by_name("api-9").await.unwrap().is_some());
        assert!(db.apis().get_by_name("api-10").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let (db, _dir) = setup_db().await;
        let sync = DataSync::new(db.apis(), 10);

        sync.apply(entries(5)).await.unwrap();
        let first = db.apis().get_all().await.unwrap();

        sync.apply(entries(5)).await.unwrap();
        let second = db.apis().get_all().await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_apply_empty_batch() {
        let (db, _dir) = setup_db().await;
        let sync = DataSync::new(db.apis(), 10);

        assert_eq!(sync.apply(Vec::new()).await.unwrap(), 0);
        assert_eq!(db.apis().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_next_delay_stretches_and_caps() {
        let (db, _dir) = setup_db().await;
        let config = SyncConfig {
            interval_secs: 300,
            max_entries: 10,
            backoff_max_secs: 3600,
        };
        let fetcher = ResilientFetcher::new(&FetchConfig::default()).unwrap();
        let service = SyncService::new(&config, fetcher, DataSync::new(db.apis(), 10));

        assert_eq!(service.next_delay(0), Duration::from_secs(300));
        assert_eq!(service.next_delay(1), Duration::from_secs(600));
        assert_eq!(service.next_delay(2), Duration::from_secs(1200));
        assert_eq!(service.next_delay(10), Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_sync_once_fails_without_upstream() {
        let (db, _dir) = setup_db().await;
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetch = FetchConfig {
            primary_url: format!("http://{}/entries", addr),
            max_retries: 0,
            ..FetchConfig::default()
        };
        let service = SyncService::new(
            &SyncConfig::default(),
            ResilientFetcher::new(&fetch).unwrap(),
            DataSync::new(db.apis(), 10),
        );

        assert!(service.sync_once().await.is_err());
        assert_eq!(db.apis().count().await.unwrap(), 0);
    }
}
