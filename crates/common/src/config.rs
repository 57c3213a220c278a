use std::collections::HashMap;

use serde::Deserialize;

use crate::error::AppError;

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    /// Plain connection upgraded with STARTTLS (port 587).
    StartTls,
    /// Implicit TLS from the first byte (port 465).
    Tls,
    /// No encryption. Only for local relays and test sinks.
    Plain,
}

impl SmtpTls {
    pub fn default_port(self) -> u16 {
        match self {
            SmtpTls::StartTls => 587,
            SmtpTls::Tls => 465,
            SmtpTls::Plain => 25,
        }
    }
}

impl std::str::FromStr for SmtpTls {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starttls" => Ok(SmtpTls::StartTls),
            "tls" | "ssl" => Ok(SmtpTls::Tls),
            "none" | "plain" => Ok(SmtpTls::Plain),
            other => Err(AppError::Config(format!(
                "SMTP_TLS must be one of starttls, tls, none (got {other:?})"
            ))),
        }
    }
}

/// SMTP relay settings for the mail transport.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: SmtpTls,
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 5)
    pub db_max_connections: u32,

    /// Delay between drain cycles in milliseconds (default: 60000)
    pub worker_poll_interval_ms: u64,

    /// Outgoing mail relay
    pub smtp: SmtpConfig,

    /// Sender address for notification emails
    pub email_from: String,

    /// Sender display name for notification emails
    pub email_from_name: String,
}

const DEFAULT_DB_MAX_CONNECTIONS: &str = "5";
const DEFAULT_POLL_INTERVAL_MS: &str = "60000";
const DEFAULT_FROM_NAME: &str = "Gift Shop Inventory";

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let vars: HashMap<String, String> = std::env::vars().collect();
        Ok(Self::from_lookup(|key| vars.get(key).cloned())?)
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::Config(format!("{key} environment variable is required")))
        };

        let tls: SmtpTls = lookup("SMTP_TLS")
            .unwrap_or_else(|| "starttls".to_string())
            .parse()?;

        let port = match lookup("SMTP_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| AppError::Config("SMTP_PORT must be a valid u16".to_string()))?,
            None => tls.default_port(),
        };

        let worker_poll_interval_ms: u64 = lookup("WORKER_POLL_INTERVAL_MS")
            .unwrap_or_else(|| DEFAULT_POLL_INTERVAL_MS.to_string())
            .parse()
            .map_err(|_| {
                AppError::Config("WORKER_POLL_INTERVAL_MS must be a valid u64".to_string())
            })?;
        if worker_poll_interval_ms == 0 {
            return Err(AppError::Config(
                "WORKER_POLL_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        let username = lookup("SMTP_USERNAME").filter(|v| !v.is_empty());
        let password = lookup("SMTP_PASSWORD").filter(|v| !v.is_empty());
        if username.is_some() != password.is_some() {
            return Err(AppError::Config(
                "SMTP_USERNAME and SMTP_PASSWORD must be set together".to_string(),
            ));
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            db_max_connections: lookup("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| DEFAULT_DB_MAX_CONNECTIONS.to_string())
                .parse()
                .map_err(|_| {
                    AppError::Config("DB_MAX_CONNECTIONS must be a valid u32".to_string())
                })?,
            worker_poll_interval_ms,
            smtp: SmtpConfig {
                host: required("SMTP_HOST")?,
                port,
                username,
                password,
                tls,
            },
            email_from: required("EMAIL_FROM")?,
            email_from_name: lookup("EMAIL_FROM_NAME")
                .unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
        })
    }
}
