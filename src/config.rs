use anyhow::{Context, Result};
use compute::feed::{FeedSettings, HttpTransactionFeed};
use config::{Config, Environment};
use moka::future::Cache;
use sea_orm::Database;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::schemas::AppState;

/// Runtime settings, layered from defaults and `HEARTH__*` environment variables.
///
/// Nested keys use a double underscore, e.g. `HEARTH__FEED__CLIENT_ID`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub bind_address: String,
    pub cache_ttl_secs: u64,
    pub feed: FeedSettings,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let feed = FeedSettings::default();

        let settings = Config::builder()
            .set_default("database_url", "sqlite://hearthledger.db?mode=rwc")?
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("cache_ttl_secs", 300)?
            .set_default("feed.base_url", feed.base_url)?
            .set_default("feed.client_id", feed.client_id)?
            .set_default("feed.secret", feed.secret)?
            .set_default("feed.timeout_secs", feed.timeout_secs)?
            .set_default("feed.max_retries", feed.max_retries)?
            .set_default("feed.page_size", feed.page_size)?
            .add_source(
                Environment::with_prefix("HEARTH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize::<Settings>()
            .context("Invalid configuration")?;

        debug!(bind_address = %settings.bind_address, feed_url = %settings.feed.base_url, "Configuration loaded");
        Ok(settings)
    }
}

/// Initialize application state against `database_url`, with the remaining settings
/// taken from the environment.
pub async fn initialize_app_state_with_url(database_url: &str) -> Result<AppState> {
    let settings = Settings::load()?;
    build_app_state(database_url, &settings).await
}

async fn build_app_state(database_url: &str, settings: &Settings) -> Result<AppState> {
    info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;

    let cache = Cache::builder()
        .max_capacity(1000)
        .time_to_live(Duration::from_secs(settings.cache_ttl_secs))
        .build();

    let feed = HttpTransactionFeed::new(settings.feed.clone())?;

    Ok(AppState {
        db,
        cache,
        feed: Arc::new(feed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_every_setting() {
        let settings = Settings::load().unwrap();
        assert!(!settings.database_url.is_empty());
        assert!(!settings.bind_address.is_empty());
        assert!(settings.cache_ttl_secs > 0);
        assert!(settings.feed.base_url.starts_with("http"));
    }
}
