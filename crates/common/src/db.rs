use std::str::FromStr;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::config::AppConfig;
use crate::error::AppError;

/// Name the notifier's sessions report in `pg_stat_activity`.
pub const APPLICATION_NAME: &str = "shopkeep-notifier";

/// Parse `DATABASE_URL` into connect options tagged with [`APPLICATION_NAME`].
pub fn connect_options(database_url: &str) -> Result<PgConnectOptions, AppError> {
    let options = PgConnectOptions::from_str(database_url)
        .map_err(|e| AppError::Config(format!("DATABASE_URL is not a valid Postgres URL: {e}")))?;

    Ok(options.application_name(APPLICATION_NAME))
}

/// Create the PostgreSQL pool the queue store draws its per-cycle
/// connection from.
pub async fn create_pool(config: &AppConfig) -> anyhow::Result<PgPool> {
    let options = connect_options(&config.database_url)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    tracing::info!(
        max_connections = config.db_max_connections,
        application_name = APPLICATION_NAME,
        "Connected to PostgreSQL"
    );
    Ok(pool)
}
