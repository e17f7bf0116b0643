//! SQLite-backed store
//!
//! Each trait operation is a single SQL statement, so SQLite's statement
//! atomicity gives the per-key guarantees the engine relies on. Expiry
//! timestamps are unix milliseconds taken from the injected clock; expired
//! rows read as absent and are removed by [`SqliteStore::purge_expired`].

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::Store;
use crate::clock::{expiry_after, Clock};
use crate::config::StoreConfig;
use crate::error::Result;

/// [`Store`] implementation on top of an sqlx SQLite pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteStore {
    /// Connect using the store section of the configuration
    ///
    /// Pool acquisition is bounded by `timeout_secs`; a timeout surfaces as
    /// a storage error.
    pub async fn connect(config: &StoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        info!("Opening OTP store at {}", config.database_url);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.timeout())
            .connect(&config.database_url)
            .await?;

        Self::from_pool(pool, clock).await
    }

    /// Private in-memory database, mainly for tests
    ///
    /// A single long-lived connection keeps the database alive.
    pub async fn in_memory(clock: Arc<dyn Clock>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(pool, clock).await
    }

    /// Wrap an existing pool and create the tables if needed
    pub async fn from_pool(pool: SqlitePool, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = Self { pool, clock };
        store.init_db().await?;
        Ok(store)
    }

    async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS otp_entries (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS otp_counters (
                key TEXT PRIMARY KEY,
                count INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete expired values and counters, returning the number of rows removed
    pub async fn purge_expired(&self) -> Result<u64> {
        let now = self.now_millis();

        let values = sqlx::query("DELETE FROM otp_entries WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        let counters = sqlx::query("DELETE FROM otp_counters WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        debug!("Purged {} expired values and {} counters", values, counters);
        Ok(values + counters)
    }

    /// Close the pool, waiting for checked-out connections to be returned
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn now_millis(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    fn expiry_millis(&self, ttl: Duration) -> i64 {
        expiry_after(self.clock.now(), ttl).timestamp_millis()
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO otp_entries (key, value, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(self.expiry_millis(ttl))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query_as::<_, (Vec<u8>,)>(
            "SELECT value FROM otp_entries WHERE key = ? AND expires_at > ?",
        )
        .bind(key)
        .bind(self.now_millis())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM otp_entries WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM otp_counters WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_and_delete(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query_as::<_, (Vec<u8>,)>(
            "DELETE FROM otp_entries WHERE key = ? AND expires_at > ? RETURNING value",
        )
        .bind(key)
        .bind(self.now_millis())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM otp_entries WHERE key = ? AND value = ? AND expires_at > ?",
        )
        .bind(key)
        .bind(expected)
        .bind(self.now_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64> {
        // SET expressions see the pre-update row, so both CASEs test the old expiry
        let (count,) = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO otp_counters (key, count, expires_at)
            VALUES (?1, 1, ?2)
            ON CONFLICT(key) DO UPDATE SET
                count = CASE WHEN otp_counters.expires_at <= ?3
                    THEN 1 ELSE otp_counters.count + 1 END,
                expires_at = CASE WHEN otp_counters.expires_at <= ?3
                    THEN excluded.expires_at ELSE otp_counters.expires_at END
            RETURNING count
            "#,
        )
        .bind(key)
        .bind(self.expiry_millis(ttl))
        .bind(self.now_millis())
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn count(&self, key: &str) -> Result<u64> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT count FROM otp_counters WHERE key = ? AND expires_at > ?",
        )
        .bind(key)
        .bind(self.now_millis())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map_or(0, |(count,)| count.max(0) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::OtpError;

    async fn setup() -> (SqliteStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = SqliteStore::in_memory(clock.clone()).await.unwrap();
        (store, clock)
    }

    #[tokio::test]
    async fn test_put_overwrites_and_expires() {
        let (store, clock) = setup().await;

        store.put("k", b"one", Duration::from_secs(10)).await.unwrap();
        store.put("k", b"two", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"two".to_vec()));

        clock.advance(Duration::from_secs(10));
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_and_delete() {
        let (store, _clock) = setup().await;

        store.put("k", b"v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get_and_delete("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.get_and_delete("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_compare_and_delete_requires_exact_value() {
        let (store, _clock) = setup().await;

        store.put("k", b"v", Duration::from_secs(10)).await.unwrap();
        assert!(!store.compare_and_delete("k", b"w").await.unwrap());
        assert!(store.compare_and_delete("k", b"v").await.unwrap());
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_increment_resets_after_window() {
        let (store, clock) = setup().await;
        let window = Duration::from_secs(60);

        for expected in 1..=3 {
            assert_eq!(store.increment("c", window).await.unwrap(), expected);
        }
        assert_eq!(store.count("c").await.unwrap(), 3);

        clock.advance(Duration::from_secs(61));
        assert_eq!(store.count("c").await.unwrap(), 0);
        assert_eq!(store.increment("c", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_and_purge() {
        let (store, clock) = setup().await;

        store.put("a", b"x", Duration::from_secs(5)).await.unwrap();
        store.put("b", b"x", Duration::from_secs(500)).await.unwrap();
        store.increment("c", Duration::from_secs(5)).await.unwrap();

        store.delete("b").await.unwrap();
        assert!(store.get("b").await.unwrap().is_none());

        clock.advance(Duration::from_secs(6));
        assert_eq!(store.purge_expired().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_closed_store_reports_storage_error() {
        let (store, _clock) = setup().await;

        store.close().await;
        let result = store.get("k").await;
        assert!(matches!(result, Err(OtpError::Storage(_))));
    }
}
