//! PostgreSQL storage implementation.
//!
//! Uniqueness of `transaction_id` is enforced by the table's `UNIQUE` constraint;
//! guarded inserts use `ON CONFLICT DO NOTHING` and confirmations merge metadata
//! with JSONB `||`.

use async_trait::async_trait;
use certledger_core::{
    Confirmation, LogId, LogMetadata, NewTransactionLog, TransactionId, TransactionLogRecord,
    TransactionStatus, TransactionType, UserId,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::TransactionLogStore;

const RETURNING_COLUMNS: &str = "id, transaction_id, user_id, transaction_type, status, \
                                 transaction_hash, metadata, created_at";

/// PostgreSQL-backed transaction log.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be established.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(db_error)?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::info!("Transaction log migrations applied");
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// A `transaction_logs` row as stored.
#[derive(Debug, FromRow)]
struct TransactionLogRow {
    id: Uuid,
    transaction_id: String,
    user_id: Uuid,
    transaction_type: String,
    status: String,
    transaction_hash: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionLogRow> for TransactionLogRecord {
    type Error = StoreError;

    fn try_from(row: TransactionLogRow) -> Result<Self> {
        let transaction_id = row
            .transaction_id
            .parse::<TransactionId>()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let status = row
            .status
            .parse::<TransactionStatus>()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let metadata: LogMetadata = serde_json::from_value(row.metadata)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(Self {
            id: LogId::from_uuid(row.id),
            transaction_id,
            user_id: UserId::from_uuid(row.user_id),
            transaction_type: TransactionType::from(row.transaction_type),
            status,
            transaction_hash: row.transaction_hash,
            metadata,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl TransactionLogStore for PgStore {
    async fn insert(&self, log: NewTransactionLog) -> Result<TransactionLogRecord> {
        let sql = format!(
            "INSERT INTO transaction_logs \
                (id, transaction_id, user_id, transaction_type, status, transaction_hash, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {RETURNING_COLUMNS}"
        );

        let row = sqlx::query_as::<_, TransactionLogRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(log.transaction_id.to_string())
            .bind(log.user_id.as_uuid())
            .bind(log.transaction_type.as_str())
            .bind(log.status.as_str())
            .bind(log.transaction_hash.as_deref())
            .bind(log.metadata.to_json())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Duplicate {
                        transaction_id: log.transaction_id.to_string(),
                    }
                } else {
                    db_error(e)
                }
            })?;

        row.try_into()
    }

    async fn insert_if_absent(&self, log: NewTransactionLog) -> Result<bool> {
        let rows_affected = sqlx::query(
            "INSERT INTO transaction_logs \
                (id, transaction_id, user_id, transaction_type, status, transaction_hash, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (transaction_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(log.transaction_id.to_string())
        .bind(log.user_id.as_uuid())
        .bind(log.transaction_type.as_str())
        .bind(log.status.as_str())
        .bind(log.transaction_hash.as_deref())
        .bind(log.metadata.to_json())
        .execute(&self.pool)
        .await
        .map_err(db_error)?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn get(&self, transaction_id: &TransactionId) -> Result<Option<TransactionLogRecord>> {
        let sql = format!("SELECT {RETURNING_COLUMNS} FROM transaction_logs WHERE transaction_id = $1");

        sqlx::query_as::<_, TransactionLogRow>(&sql)
            .bind(transaction_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn exists(&self, transaction_id: &TransactionId) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM transaction_logs WHERE transaction_id = $1)",
        )
        .bind(transaction_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn confirm(
        &self,
        transaction_id: &TransactionId,
        confirmation: &Confirmation,
    ) -> Result<bool> {
        if !confirmation.status.is_terminal() {
            return Ok(false);
        }

        let rows_affected = sqlx::query(
            "UPDATE transaction_logs \
             SET status = $2, \
                 transaction_hash = COALESCE($3, transaction_hash), \
                 metadata = metadata || $4 \
             WHERE transaction_id = $1 AND status = 'pending'",
        )
        .bind(transaction_id.to_string())
        .bind(confirmation.status.as_str())
        .bind(confirmation.transaction_hash.as_deref())
        .bind(confirmation.metadata.to_json())
        .execute(&self.pool)
        .await
        .map_err(db_error)?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn list_stale(
        &self,
        statuses: &[TransactionStatus],
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TransactionLogRecord>> {
        let sql = format!(
            "SELECT {RETURNING_COLUMNS} FROM transaction_logs \
             WHERE status = ANY($1) AND created_at < $2 \
               AND NOT (status <> 'pending' AND ( \
                   COALESCE((metadata->>'confirmed_from_mirror')::boolean, false) \
                   OR COALESCE((metadata->>'synced_from_mirror')::boolean, false))) \
             ORDER BY (status = 'pending') DESC, created_at ASC \
             LIMIT $3"
        );
        let statuses: Vec<String> = statuses.iter().map(ToString::to_string).collect();

        sqlx::query_as::<_, TransactionLogRow>(&sql)
            .bind(statuses)
            .bind(created_before)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(TryInto::try_into)
            .collect()
    }

    async fn list_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionLogRecord>> {
        let sql = format!(
            "SELECT {RETURNING_COLUMNS} FROM transaction_logs \
             WHERE user_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2 OFFSET $3"
        );

        sqlx::query_as::<_, TransactionLogRow>(&sql)
            .bind(user_id.as_uuid())
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(TryInto::try_into)
            .collect()
    }
}
