//! Access to the `email_queue` table.
//!
//! A [`QueueStore`] hands out one [`QueueSession`] per drain cycle. The
//! session owns a pooled connection, so dropping it at the end of the cycle
//! returns the connection to the pool on every exit path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};

use shopkeep_common::error::AppError;
use shopkeep_common::types::PendingNotification;

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Open a session for one drain cycle.
    async fn session(&self) -> Result<Box<dyn QueueSession>, AppError>;
}

#[async_trait]
pub trait QueueSession: Send {
    /// All unprocessed entries joined with their supplier, oldest first.
    async fn fetch_pending(&mut self) -> Result<Vec<PendingNotification>, AppError>;

    /// Flip one entry to processed.
    ///
    /// Returns `false` when the entry was already processed, in which case
    /// nothing is written.
    async fn mark_processed(
        &mut self,
        entry_id: i64,
        processed_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;
}

/// PostgreSQL-backed queue store.
#[derive(Clone)]
pub struct PgQueueStore {
    pool: PgPool,
}

impl PgQueueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueueStore for PgQueueStore {
    async fn session(&self) -> Result<Box<dyn QueueSession>, AppError> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PgQueueSession { conn }))
    }
}

pub struct PgQueueSession {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl QueueSession for PgQueueSession {
    async fn fetch_pending(&mut self) -> Result<Vec<PendingNotification>, AppError> {
        let rows = sqlx::query_as::<_, PendingNotification>(
            r#"
            SELECT q.id AS entry_id,
                   q.supplier_id,
                   q.item_name,
                   q.quantity,
                   q.created_at,
                   s.name AS supplier_name,
                   s.email AS supplier_email
            FROM email_queue q
            JOIN suppliers s ON s.id = q.supplier_id
            WHERE q.processed = false
            ORDER BY q.created_at ASC, q.id ASC
            "#,
        )
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows)
    }

    async fn mark_processed(
        &mut self,
        entry_id: i64,
        processed_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE email_queue SET processed = true, processed_at = $2 WHERE id = $1 AND processed = false",
        )
        .bind(entry_id)
        .bind(processed_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
