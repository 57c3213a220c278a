use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row of the `email_queue` table: one low-inventory notification.
///
/// Rows are inserted by the inventory side of the application when stock
/// drops below its threshold. The notifier only ever flips `processed` from
/// `false` to `true` and stamps `processed_at`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueueEntry {
    pub id: i64,
    pub supplier_id: i64,
    pub item_name: String,
    pub quantity: i32,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A supplier's contact details, owned by the inventory side.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SupplierContact {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// An unprocessed queue entry joined with its supplier contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PendingNotification {
    pub entry_id: i64,
    pub supplier_id: i64,
    pub item_name: String,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub supplier_name: String,
    pub supplier_email: String,
}
