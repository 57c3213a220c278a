use std::future::Future;
use std::time::Duration;

use chrono::Utc;

use shopkeep_common::error::AppError;

use crate::email::Mailer;
use crate::store::{QueueSession, QueueStore};
use crate::template::{Sender, render_low_inventory};

/// Outcome of a single drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Pending entries returned by the fetch
    pub fetched: usize,
    /// Entries sent and marked processed
    pub sent: usize,
    /// Entries left pending because the send or the update failed
    pub failed: usize,
}

/// Polling worker that drains the email queue.
///
/// Each cycle fetches every unprocessed entry, sends one email per entry in
/// creation order and marks the entry processed once the transport accepts
/// it. Entries are committed one by one; a failure on one entry leaves it
/// pending for the next cycle and does not stop the rest of the batch.
pub struct QueueDrainWorker<S, M> {
    store: S,
    mailer: M,
    sender: Sender,
    poll_interval: Duration,
}

impl<S: QueueStore, M: Mailer> QueueDrainWorker<S, M> {
    pub fn new(store: S, mailer: M, sender: Sender, poll_interval_ms: u64) -> Self {
        Self {
            store,
            mailer,
            sender,
            poll_interval: Duration::from_millis(poll_interval_ms),
        }
    }

    /// Run drain cycles forever, sleeping `poll_interval` after each one.
    ///
    /// Cycle errors are logged and never end the loop.
    pub async fn run(&self) {
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Queue drain worker started"
        );

        loop {
            match self.drain_cycle().await {
                Ok(report) if report.fetched > 0 => {
                    tracing::info!(
                        fetched = report.fetched,
                        sent = report.sent,
                        failed = report.failed,
                        "Drain cycle complete"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Drain cycle failed");
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Run until `shutdown` resolves.
    ///
    /// Whatever the worker is awaiting when the signal arrives is dropped.
    /// Entries already marked stay marked; an entry whose send was in flight
    /// stays pending and is picked up by the next process.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = self.run() => {}
            _ = shutdown => {
                tracing::info!("Shutdown requested, queue drain worker stopping");
            }
        }
    }

    /// One pass over the queue: fetch, send, mark.
    ///
    /// Only failures to open the session or fetch the batch are returned;
    /// per-entry failures are logged and counted in the report.
    pub async fn drain_cycle(&self) -> Result<DrainReport, AppError> {
        let mut session = self.store.session().await?;
        let pending = session.fetch_pending().await?;

        let mut report = DrainReport {
            fetched: pending.len(),
            ..DrainReport::default()
        };

        if pending.is_empty() {
            tracing::debug!("No pending notifications");
            return Ok(report);
        }

        for entry in &pending {
            let message = render_low_inventory(entry, &self.sender);

            if let Err(e) = self.mailer.send(&message).await {
                tracing::error!(
                    entry_id = entry.entry_id,
                    supplier_email = %entry.supplier_email,
                    error = %e,
                    "Failed to send low inventory email"
                );
                report.failed += 1;
                continue;
            }

            match session.mark_processed(entry.entry_id, Utc::now()).await {
                Ok(true) => {
                    tracing::info!(
                        entry_id = entry.entry_id,
                        supplier_email = %entry.supplier_email,
                        item_name = %entry.item_name,
                        "Low inventory email sent"
                    );
                    report.sent += 1;
                }
                Ok(false) => {
                    tracing::warn!(
                        entry_id = entry.entry_id,
                        "Email sent but entry was already marked processed"
                    );
                    report.sent += 1;
                }
                Err(e) => {
                    // The email is out; the entry stays pending and will be sent again.
                    tracing::error!(
                        entry_id = entry.entry_id,
                        error = %e,
                        "Email sent but failed to mark entry processed"
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
