use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::statistics::StatisticsLimits;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub statistics: StatisticsLimits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

impl DatabaseConfig {
    const fn default_max_connections() -> u32 {
        5
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "sqlite" => DatabaseBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: sqlite, postgres"
                );
                DatabaseBackend::Sqlite
            }
        };

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./socialhub.db".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or_else(DatabaseConfig::default_max_connections);

        let max_daily_span_days = span_from_env(
            "STATS_MAX_DAILY_SPAN_DAYS",
            StatisticsLimits::DEFAULT_MAX_DAILY_SPAN_DAYS,
        )?;
        let max_hourly_span_days = span_from_env(
            "STATS_MAX_HOURLY_SPAN_DAYS",
            StatisticsLimits::DEFAULT_MAX_HOURLY_SPAN_DAYS,
        )?;

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            statistics: StatisticsLimits {
                max_daily_span_days,
                max_hourly_span_days,
            },
        })
    }
}

fn span_from_env(key: &str, default: i64) -> anyhow::Result<i64> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(default);
    };

    let days = raw
        .trim()
        .parse::<i64>()
        .with_context(|| format!("{key} must be a whole number of days, got '{raw}'"))?;
    anyhow::ensure!(days >= 0, "{key} must not be negative, got {days}");

    Ok(days)
}
