//! Integration tests for the PostgreSQL queue store.
//!
//! These tests require a running PostgreSQL database and the `DATABASE_URL`
//! environment variable to be set. Run with:
//!
//! ```bash
//! DATABASE_URL="postgresql://..." cargo test -p shopkeep-notifier --test integration -- --ignored --nocapture
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;

use shopkeep_common::types::{QueueEntry, SupplierContact};
use shopkeep_notifier::email::{EmailMessage, MailError, Mailer};
use shopkeep_notifier::store::{PgQueueStore, QueueSession, QueueStore};
use shopkeep_notifier::template::Sender;
use shopkeep_notifier::worker::QueueDrainWorker;

/// Mailer that records messages and rejects one recipient.
#[derive(Clone, Default)]
struct RecordingMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    reject: Option<String>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if self.reject.as_deref() == Some(message.to.as_str()) {
            return Err(MailError::Smtp("550 rejected".to_string()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

async fn setup(pool: &PgPool) -> PgQueueStore {
    sqlx::migrate!("../../migrations").run(pool).await.unwrap();

    sqlx::query("DELETE FROM email_queue")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("DELETE FROM suppliers")
        .execute(pool)
        .await
        .unwrap();

    PgQueueStore::new(pool.clone())
}

async fn create_supplier(pool: &PgPool, name: &str, email: &str) -> SupplierContact {
    sqlx::query_as::<_, SupplierContact>(
        "INSERT INTO suppliers (name, email) VALUES ($1, $2) RETURNING id, name, email",
    )
    .bind(name)
    .bind(email)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Queue an entry created `age_secs` seconds ago and return its id.
async fn enqueue(
    pool: &PgPool,
    supplier_id: i64,
    item_name: &str,
    quantity: i32,
    age_secs: i64,
) -> i64 {
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO email_queue (supplier_id, item_name, quantity, created_at) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(supplier_id)
    .bind(item_name)
    .bind(quantity)
    .bind(Utc::now() - Duration::seconds(age_secs))
    .fetch_one(pool)
    .await
    .unwrap();
    row.0
}

async fn load_entry(pool: &PgPool, id: i64) -> QueueEntry {
    sqlx::query_as::<_, QueueEntry>(
        "SELECT id, supplier_id, item_name, quantity, processed, processed_at, created_at FROM email_queue WHERE id = $1",
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[sqlx::test]
#[ignore] // Requires DATABASE_URL — run explicitly with --ignored
async fn test_fetch_pending_joins_supplier_oldest_first(pool: PgPool) {
    let store = setup(&pool).await;
    let acme = create_supplier(&pool, "Acme", "s@x.com").await;
    let clay = create_supplier(&pool, "Clay Co", "clay@x.com").await;

    let newer = enqueue(&pool, acme.id, "Mug", 2, 10).await;
    let older = enqueue(&pool, clay.id, "Vase", 1, 60).await;

    let mut session = store.session().await.unwrap();
    let pending = session.fetch_pending().await.unwrap();

    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].entry_id, older);
    assert_eq!(pending[0].supplier_name, "Clay Co");
    assert_eq!(pending[0].supplier_email, "clay@x.com");
    assert_eq!(pending[1].entry_id, newer);
    assert_eq!(pending[1].item_name, "Mug");
    assert_eq!(pending[1].quantity, 2);
}

#[sqlx::test]
#[ignore]
async fn test_mark_processed_excludes_entry_from_fetch(pool: PgPool) {
    let store = setup(&pool).await;
    let acme = create_supplier(&pool, "Acme", "s@x.com").await;
    let id = enqueue(&pool, acme.id, "Mug", 2, 0).await;

    let stamp = Utc::now();
    let mut session = store.session().await.unwrap();
    assert!(session.mark_processed(id, stamp).await.unwrap());

    let entry = load_entry(&pool, id).await;
    assert!(entry.processed);
    let processed_at = entry.processed_at.expect("processed_at should be set");
    // Postgres keeps microseconds
    assert!((processed_at - stamp).num_milliseconds().abs() < 1);

    assert!(session.fetch_pending().await.unwrap().is_empty());
}

#[sqlx::test]
#[ignore]
async fn test_mark_processed_only_once(pool: PgPool) {
    let store = setup(&pool).await;
    let acme = create_supplier(&pool, "Acme", "s@x.com").await;
    let id = enqueue(&pool, acme.id, "Mug", 2, 0).await;

    let first = Utc::now();
    let mut session = store.session().await.unwrap();
    assert!(session.mark_processed(id, first).await.unwrap());
    assert!(
        !session
            .mark_processed(id, first + Duration::minutes(5))
            .await
            .unwrap()
    );

    let entry = load_entry(&pool, id).await;
    let processed_at = entry.processed_at.unwrap();
    assert!((processed_at - first).num_milliseconds().abs() < 1);
}

#[sqlx::test]
#[ignore]
async fn test_empty_queue_returns_nothing(pool: PgPool) {
    let store = setup(&pool).await;
    let acme = create_supplier(&pool, "Acme", "s@x.com").await;
    let id = enqueue(&pool, acme.id, "Mug", 2, 0).await;
    sqlx::query("UPDATE email_queue SET processed = true, processed_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let mut session = store.session().await.unwrap();
    assert!(session.fetch_pending().await.unwrap().is_empty());
}

#[sqlx::test]
#[ignore]
async fn test_drain_cycle_end_to_end(pool: PgPool) {
    let store = setup(&pool).await;
    let acme = create_supplier(&pool, "Acme", "s@x.com").await;
    let broken = create_supplier(&pool, "Broken Ltd", "broken@x.com").await;

    let failing = enqueue(&pool, broken.id, "Plate", 1, 30).await;
    let mug = enqueue(&pool, acme.id, "Mug", 2, 10).await;

    let mailer = RecordingMailer {
        reject: Some("broken@x.com".to_string()),
        ..RecordingMailer::default()
    };
    let worker = QueueDrainWorker::new(
        store,
        mailer.clone(),
        Sender {
            name: "Gift Shop Inventory".to_string(),
            address: "inventory@shop.example".to_string(),
        },
        1_000,
    );

    let before = Utc::now();
    let report = worker.drain_cycle().await.unwrap();
    let after = Utc::now();

    assert_eq!(report.fetched, 2);
    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 1);

    let sent = mailer.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "s@x.com");
    assert_eq!(sent[0].subject, "Low Inventory Alert - Mug");
    assert!(sent[0].html_body.contains("Acme"));

    let mug_entry = load_entry(&pool, mug).await;
    assert!(mug_entry.processed);
    let processed_at = mug_entry.processed_at.unwrap();
    assert!(processed_at >= before - Duration::milliseconds(1));
    assert!(processed_at <= after + Duration::milliseconds(1));

    let failing_entry = load_entry(&pool, failing).await;
    assert!(!failing_entry.processed);
    assert!(failing_entry.processed_at.is_none());

    // The next cycle only sees the entry that failed.
    let report = worker.drain_cycle().await.unwrap();
    assert_eq!(report.fetched, 1);
    assert_eq!(report.failed, 1);
}

/// Create the two tables the way the inventory side does, without sqlx
/// migration bookkeeping.
async fn create_inventory_schema(pool: &PgPool) {
    sqlx::query(
        "CREATE TABLE suppliers (id BIGSERIAL PRIMARY KEY, name TEXT NOT NULL, email TEXT NOT NULL)",
    )
    .execute(pool)
    .await
    .unwrap();
    sqlx::query(
        r#"
        CREATE TABLE email_queue (
            id BIGSERIAL PRIMARY KEY,
            supplier_id BIGINT NOT NULL REFERENCES suppliers(id),
            item_name TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            processed BOOLEAN NOT NULL DEFAULT FALSE,
            processed_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .unwrap();
}

#[sqlx::test]
#[ignore]
async fn test_drain_leaves_inventory_schema_untouched(pool: PgPool) {
    create_inventory_schema(&pool).await;
    let acme = create_supplier(&pool, "Acme", "s@x.com").await;
    let id = enqueue(&pool, acme.id, "Mug", 2, 0).await;

    let mailer = RecordingMailer::default();
    let worker = QueueDrainWorker::new(
        PgQueueStore::new(pool.clone()),
        mailer.clone(),
        Sender {
            name: "Gift Shop Inventory".to_string(),
            address: "inventory@shop.example".to_string(),
        },
        1_000,
    );

    let report = worker.drain_cycle().await.unwrap();
    assert_eq!(report.sent, 1);
    assert!(load_entry(&pool, id).await.processed);

    // No bookkeeping table appears and the supplier rows are only read.
    let (migrations_table,): (Option<String>,) =
        sqlx::query_as("SELECT to_regclass('_sqlx_migrations')::text")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(migrations_table.is_none());

    let suppliers: Vec<SupplierContact> =
        sqlx::query_as("SELECT id, name, email FROM suppliers")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(suppliers.len(), 1);
    assert_eq!(suppliers[0].name, "Acme");
    assert_eq!(suppliers[0].email, "s@x.com");
}
