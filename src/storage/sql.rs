// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQLite storage backend for the durable outbox.
//!
//! One table keyed by record id — the only persisted artifact this crate owns:
//!
//! ```sql
//! CREATE TABLE outbox_records (
//!   id           TEXT PRIMARY KEY,
//!   mutation_key TEXT NOT NULL,     -- JSON array of key segments
//!   variables    BLOB NOT NULL,     -- opaque serialized payload
//!   status       TEXT NOT NULL,     -- pending | syncing | synced | failed
//!   retry_count  INTEGER NOT NULL,
//!   timestamp    INTEGER NOT NULL   -- epoch ms; creation time and not-before gate
//! )
//! ```
//!
//! WAL journal mode is enabled so reads during a drain don't block queued
//! writes from the UI thread.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use tracing::info;

use super::traits::{OutboxStore, OutboxUpdate, StorageError};
use crate::backoff::retry_connect;
use crate::record::{now_ms, MutationId, MutationKey, MutationRecord, SyncStatus};

pub struct SqliteOutbox {
    pool: SqlitePool,
}

impl SqliteOutbox {
    /// Open (or create) the outbox at the given connection string, e.g.
    /// `sqlite://./outbox.db?mode=rwc`. Retries the connect a few times with
    /// backoff, then fails fast on a bad configuration.
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        let pool = retry_connect("outbox_connect", 5, || async {
            SqlitePoolOptions::new()
                .max_connections(4)
                .acquire_timeout(Duration::from_secs(10))
                .connect(connection_string)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        let store = Self { pool };
        store.enable_wal_mode().await?;
        store.init_schema().await?;

        info!(url = %connection_string, "Outbox store opened");
        Ok(store)
    }

    /// Open an outbox at a filesystem path, creating the file if missing.
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        Self::new(&format!("sqlite://{}?mode=rwc", path)).await
    }

    async fn enable_wal_mode(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to enable WAL mode: {}", e)))?;

        // WAL mode is safe with NORMAL and avoids a second fsync per commit
        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to set synchronous mode: {}", e)))?;

        Ok(())
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outbox_records (
                id           TEXT PRIMARY KEY,
                mutation_key TEXT NOT NULL,
                variables    BLOB NOT NULL,
                status       TEXT NOT NULL DEFAULT 'pending',
                retry_count  INTEGER NOT NULL DEFAULT 0,
                timestamp    INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_outbox_status_ts ON outbox_records (status, timestamp)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<MutationRecord, StorageError> {
        let key_json: String = row.get("mutation_key");
        let mutation_key: MutationKey = serde_json::from_str(&key_json)
            .map_err(|e| StorageError::Backend(format!("Corrupt mutation_key column: {}", e)))?;

        let status_str: String = row.get("status");
        let status = SyncStatus::parse(&status_str)
            .ok_or_else(|| StorageError::Backend(format!("Unknown status '{}'", status_str)))?;

        Ok(MutationRecord {
            id: MutationId::new(row.get::<String, _>("id")),
            mutation_key,
            variables: row.get("variables"),
            status,
            retry_count: row.get::<i64, _>("retry_count") as u32,
            timestamp: row.get("timestamp"),
        })
    }
}

#[async_trait]
impl OutboxStore for SqliteOutbox {
    async fn enqueue(&self, record: &MutationRecord) -> Result<(), StorageError> {
        let key_json = serde_json::to_string(&record.mutation_key)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO outbox_records (id, mutation_key, variables, status, retry_count, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.as_str())
        .bind(&key_json)
        .bind(&record.variables)
        .bind(record.status.as_str())
        .bind(i64::from(record.retry_count))
        .bind(record.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StorageError::Duplicate(record.id.to_string())
            }
            _ => StorageError::Backend(e.to_string()),
        })?;

        Ok(())
    }

    async fn get_next_pending(&self) -> Result<Option<MutationRecord>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, mutation_key, variables, status, retry_count, timestamp
            FROM outbox_records
            WHERE status = 'pending' AND timestamp <= ?
            ORDER BY timestamp ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(now_ms())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn update(&self, id: &MutationId, update: OutboxUpdate) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_records SET
                status      = COALESCE(?, status),
                retry_count = COALESCE(?, retry_count),
                timestamp   = COALESCE(?, timestamp)
            WHERE id = ?
            "#,
        )
        .bind(update.status.map(SyncStatus::as_str))
        .bind(update.retry_count.map(i64::from))
        .bind(update.timestamp)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn scan_all(&self) -> Result<Vec<MutationRecord>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, mutation_key, variables, status, retry_count, timestamp
            FROM outbox_records
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn count_pending(&self) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM outbox_records WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(row.get::<i64, _>("n") as u64)
    }
}
