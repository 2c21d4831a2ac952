//! The sled-backed retry store.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use btc_relayer_primitives::{chain::Chain, items::abbrev_hex};
use parking_lot::RwLock;
use sled::{Batch, Db, Tree};
use tokio::task;
use tracing::{debug, error, trace, warn};

use super::{
    config::RetryDbConfig,
    constants::{ALLIANCE_HEIGHT_KEY, BTC_HEIGHT_KEY, RETRY_TREE, WATERMARK_TREE},
};
use crate::{
    errors::{DbError, DbResult},
    tracker::{RetryQueueDb, WatermarkDb},
};

/// Embedded store holding the observers' watermarks and the pending rebroadcasts.
///
/// Watermarks are stored as 4-byte little-endian integers and retry records map the raw
/// transaction bytes to a 2-byte little-endian count of remaining attempts.
///
/// All operations go through one process-wide lock. sled provides the crash atomicity: every
/// mutation is a single insert/remove or a single [`Batch`]. Writes are flushed to disk before
/// returning, so the async operations run on the blocking thread pool.
///
/// Clones share the same underlying store.
#[derive(Debug, Clone)]
pub struct RetryDb {
    lock: Arc<RwLock<()>>,
    // kept so the trees are backed by a live handle for the lifetime of the store
    _db: Db,
    watermarks: Tree,
    retry: Tree,
    config: RetryDbConfig,
}

impl RetryDb {
    /// Opens (or creates) the store located at `path`.
    pub fn open(path: impl AsRef<Path>, config: RetryDbConfig) -> DbResult<Self> {
        let db = sled::Config::new().path(path.as_ref()).open()?;
        debug!(path = %path.as_ref().display(), "opened retry db");

        Self::from_db(db, config)
    }

    /// Creates a store that is removed once dropped.
    pub fn temporary(config: RetryDbConfig) -> DbResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;

        Self::from_db(db, config)
    }

    fn from_db(db: Db, config: RetryDbConfig) -> DbResult<Self> {
        if config.max_read_size() == 0 {
            return Err(DbError::InvalidConfig(
                "max read size must be greater than 0".to_string(),
            ));
        }

        let watermarks = db.open_tree(WATERMARK_TREE)?;
        let retry = db.open_tree(RETRY_TREE)?;

        Ok(Self {
            lock: Arc::new(RwLock::new(())),
            _db: db,
            watermarks,
            retry,
            config,
        })
    }

    /// Runs `f` against a handle to this store on the blocking thread pool.
    async fn blocking<T, F>(&self, f: F) -> DbResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Self) -> DbResult<T> + Send + 'static,
    {
        let db = self.clone();
        task::spawn_blocking(move || f(db)).await?
    }

    fn read_height(&self, chain: Chain) -> u32 {
        let _guard = self.lock.read();

        match self.watermarks.get(height_key(chain)) {
            Ok(Some(raw)) => match <[u8; 4]>::try_from(raw.as_ref()) {
                Ok(bytes) => u32::from_le_bytes(bytes),
                Err(_) => {
                    error!(%chain, len = raw.len(), "malformed watermark, treating as 0");
                    0
                }
            },
            Ok(None) => 0,
            Err(err) => {
                error!(%chain, %err, "failed to read watermark, treating as 0");
                0
            }
        }
    }

    fn write_height(&self, chain: Chain, height: u32) -> DbResult<()> {
        let _guard = self.lock.write();

        self.watermarks
            .insert(height_key(chain), &height.to_le_bytes()[..])?;
        self.watermarks.flush()?;
        trace!(%chain, %height, "persisted watermark");

        Ok(())
    }

    fn insert_retry(&self, tx_hex: &str) -> DbResult<()> {
        let key = hex::decode(tx_hex)?;
        let attempts = self.config.max_attempts().to_le_bytes();

        let _guard = self.lock.write();
        self.retry.insert(key, &attempts[..])?;
        self.retry.flush()?;

        Ok(())
    }

    /// Reads every retry record and, unless expiry is disabled, consumes one attempt of each.
    ///
    /// The decrements and deletions are accumulated while reading and applied as one batch at the
    /// end, so a scan aborted by the size guard leaves the store untouched.
    fn scan_retries(&self) -> DbResult<Vec<String>> {
        let max_read = self.config.max_read_size();
        let expires = self.config.max_attempts() > 0;

        let _guard = self.lock.write();

        let mut txs = Vec::new();
        let mut batch = Batch::default();
        let mut dirty = false;
        let mut total_read = 0u64;

        for entry in self.retry.iter() {
            let (key, value) = entry?;

            total_read += key.len() as u64;
            if total_read > max_read {
                return Err(DbError::OverReadSize {
                    read: total_read,
                    max: max_read,
                });
            }

            let tx_hex = hex::encode(&key);

            let Some(remaining) = decode_attempts(&value) else {
                warn!(tx = %abbrev_hex(&tx_hex), "dropping retry record with malformed counter");
                batch.remove(key);
                dirty = true;
                continue;
            };

            if expires {
                let remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    batch.remove(key);
                } else {
                    batch.insert(key, &remaining.to_le_bytes()[..]);
                }
                dirty = true;
            }

            txs.push(tx_hex);
        }

        if dirty {
            self.retry.apply_batch(batch)?;
            self.retry.flush()?;
        }

        if txs.is_empty() {
            return Err(DbError::NoRecords);
        }

        Ok(txs)
    }

    fn remove_retry(&self, tx_hex: &str) -> DbResult<()> {
        let key = hex::decode(tx_hex)?;

        let _guard = self.lock.write();
        self.retry.remove(key)?;
        self.retry.flush()?;

        Ok(())
    }

    fn count_retries(&self) -> usize {
        let _guard = self.lock.read();
        self.retry.len()
    }
}

const fn height_key(chain: Chain) -> &'static [u8] {
    match chain {
        Chain::Bitcoin => BTC_HEIGHT_KEY,
        Chain::Alliance => ALLIANCE_HEIGHT_KEY,
    }
}

fn decode_attempts(raw: &[u8]) -> Option<u16> {
    <[u8; 2]>::try_from(raw).ok().map(u16::from_le_bytes)
}

#[async_trait]
impl WatermarkDb for RetryDb {
    async fn get_height(&self, chain: Chain) -> u32 {
        self.blocking(move |db| Ok(db.read_height(chain)))
            .await
            .unwrap_or_else(|err| {
                error!(%chain, %err, "failed to read watermark, treating as 0");
                0
            })
    }

    async fn set_height(&self, chain: Chain, height: u32) -> DbResult<()> {
        self.blocking(move |db| db.write_height(chain, height)).await
    }
}

#[async_trait]
impl RetryQueueDb for RetryDb {
    async fn put(&self, tx_hex: &str) -> DbResult<()> {
        let tx_hex = tx_hex.to_string();
        self.blocking(move |db| db.insert_retry(&tx_hex)).await
    }

    async fn get_all(&self) -> DbResult<Vec<String>> {
        self.blocking(|db| db.scan_retries()).await
    }

    async fn delete(&self, tx_hex: &str) -> DbResult<()> {
        let tx_hex = tx_hex.to_string();
        self.blocking(move |db| db.remove_retry(&tx_hex)).await
    }

    async fn pending(&self) -> DbResult<usize> {
        self.blocking(|db| Ok(db.count_retries())).await
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn store(max_attempts: u16) -> RetryDb {
        RetryDb::temporary(RetryDbConfig::default().with_max_attempts(max_attempts))
            .expect("must be able to create temporary store")
    }

    fn attempts_of(db: &RetryDb, tx_hex: &str) -> Option<u16> {
        db.retry
            .get(hex::decode(tx_hex).unwrap())
            .unwrap()
            .and_then(|raw| decode_attempts(&raw))
    }

    #[tokio::test]
    async fn heights_default_to_zero_and_are_per_chain() {
        let db = store(3);

        assert_eq!(db.get_height(Chain::Bitcoin).await, 0);
        assert_eq!(db.get_height(Chain::Alliance).await, 0);

        db.set_height(Chain::Bitcoin, 110).await.unwrap();
        db.set_height(Chain::Alliance, 50).await.unwrap();
        db.set_height(Chain::Bitcoin, 120).await.unwrap();

        assert_eq!(db.get_height(Chain::Bitcoin).await, 120);
        assert_eq!(db.get_height(Chain::Alliance).await, 50);
    }

    #[tokio::test]
    async fn heights_are_stored_little_endian() {
        let db = store(3);
        db.set_height(Chain::Bitcoin, 0x0102_0304).await.unwrap();

        let raw = db.watermarks.get(BTC_HEIGHT_KEY).unwrap().unwrap();
        assert_eq!(raw.as_ref(), &[0x04, 0x03, 0x02, 0x01]);
    }

    #[tokio::test]
    async fn malformed_height_reads_as_zero() {
        let db = store(3);
        db.watermarks.insert(ALLIANCE_HEIGHT_KEY, &[1u8][..]).unwrap();

        assert_eq!(db.get_height(Chain::Alliance).await, 0);
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = RetryDbConfig::default();

        {
            let db = RetryDb::open(dir.path(), config).unwrap();
            db.set_height(Chain::Bitcoin, 1_607_400).await.unwrap();
            db.put("aabb").await.unwrap();
        }

        let db = RetryDb::open(dir.path(), config).unwrap();
        assert_eq!(db.get_height(Chain::Bitcoin).await, 1_607_400);
        assert_eq!(db.pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn records_expire_after_max_attempts() {
        let db = store(3);
        db.put("aabb").await.unwrap();

        for pass in 1..=3 {
            let txs = db.get_all().await.unwrap();
            assert_eq!(txs, vec!["aabb".to_string()], "pass {pass}");
        }

        assert!(matches!(db.get_all().await, Err(DbError::NoRecords)));
        assert_eq!(db.pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn put_resets_the_counter() {
        let db = store(3);
        db.put("aabb").await.unwrap();
        db.get_all().await.unwrap();
        assert_eq!(attempts_of(&db, "aabb"), Some(2));

        db.put("aabb").await.unwrap();
        assert_eq!(attempts_of(&db, "aabb"), Some(3));
        assert_eq!(db.pending().await.unwrap(), 1, "duplicates collapse");
    }

    #[tokio::test]
    async fn zero_attempts_never_expire() {
        let db = store(0);
        db.put("aabb").await.unwrap();

        for _ in 0..5 {
            assert_eq!(db.get_all().await.unwrap(), vec!["aabb".to_string()]);
        }
        assert_eq!(attempts_of(&db, "aabb"), Some(0));
    }

    #[tokio::test]
    async fn oversized_scan_leaves_store_unchanged() {
        let config = RetryDbConfig::default()
            .with_max_attempts(3)
            .with_max_read_size(3);
        let db = RetryDb::temporary(config).unwrap();
        db.put("aabb").await.unwrap();
        db.put("ccdd").await.unwrap();

        let res = db.get_all().await;
        assert!(
            matches!(res, Err(DbError::OverReadSize { read: 4, max: 3 })),
            "got {res:?}"
        );
        assert_eq!(attempts_of(&db, "aabb"), Some(3));
        assert_eq!(attempts_of(&db, "ccdd"), Some(3));
    }

    #[tokio::test]
    async fn malformed_counter_is_dropped() {
        let db = store(3);
        db.retry.insert(&[0xaa][..], &[1u8, 2, 3][..]).unwrap();
        db.put("bbcc").await.unwrap();

        assert_eq!(db.get_all().await.unwrap(), vec!["bbcc".to_string()]);
        assert_eq!(db.pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn put_rejects_invalid_hex() {
        let db = store(3);
        assert!(matches!(db.put("not-hex").await, Err(DbError::Decode(_))));
        assert!(matches!(db.put("abc").await, Err(DbError::Decode(_))));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let db = store(3);
        db.put("aabb").await.unwrap();

        db.delete("aabb").await.unwrap();
        db.delete("aabb").await.unwrap();
        db.delete("ccdd").await.unwrap();

        assert!(matches!(db.get_all().await, Err(DbError::NoRecords)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_writers_share_one_store() {
        let db = store(3);

        let mut handles = Vec::new();
        for byte in 0u8..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.put(&hex::encode([byte])).await.unwrap();
                db.set_height(Chain::Bitcoin, u32::from(byte)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(db.pending().await.unwrap(), 8);
        assert_eq!(db.get_all().await.unwrap().len(), 8);
        assert!(db.get_height(Chain::Bitcoin).await < 8);
    }

    #[test]
    fn zero_read_size_is_rejected() {
        let config = RetryDbConfig::default().with_max_read_size(0);
        assert!(matches!(
            RetryDb::temporary(config),
            Err(DbError::InvalidConfig(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn counters_decrease_by_one_per_scan(
            max_attempts in 1u16..6,
            keys in prop::collection::btree_set(prop::collection::vec(any::<u8>(), 1..8), 1..6),
        ) {
            let db = store(max_attempts);
            let keys: Vec<String> = keys.into_iter().map(hex::encode).collect();
            for key in &keys {
                db.insert_retry(key).unwrap();
            }

            // at-least-once: the first scan after a put returns every key
            let first = db.scan_retries().unwrap();
            prop_assert_eq!(first.len(), keys.len());

            for pass in 1..=max_attempts {
                if pass > 1 {
                    let _ = db.scan_retries();
                }
                let expected = max_attempts - pass;
                for key in &keys {
                    match attempts_of(&db, key) {
                        Some(left) => prop_assert_eq!(left, expected),
                        None => prop_assert_eq!(expected, 0),
                    }
                }
            }
            prop_assert_eq!(db.count_retries(), 0);
        }
    }
}
