use shopkeep_common::config::AppConfig;
use shopkeep_common::db;
use shopkeep_notifier::email::SmtpMailer;
use shopkeep_notifier::store::PgQueueStore;
use shopkeep_notifier::template::Sender;
use shopkeep_notifier::worker::QueueDrainWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shopkeep_notifier=info,shopkeep_common=info".into()),
        )
        .json()
        .init();

    tracing::info!("Shopkeep notifier starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Connect to database. The schema belongs to the inventory side; the
    // notifier never creates or alters tables.
    let pool = db::create_pool(&config).await?;

    let mailer = SmtpMailer::new(&config.smtp)?;
    let sender = Sender {
        name: config.email_from_name.clone(),
        address: config.email_from.clone(),
    };

    let worker = QueueDrainWorker::new(
        PgQueueStore::new(pool),
        mailer,
        sender,
        config.worker_poll_interval_ms,
    );

    worker.run_until(shutdown_signal()).await;

    tracing::info!("Shopkeep notifier stopped.");
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Received shutdown signal, stopping gracefully...");
}
