//! Service settings.
//!
//! Sources, later ones winning:
//! - built-in defaults
//! - `config/default.{toml,yaml,json}` (optional)
//! - `config/local.{toml,yaml,json}` (optional)
//! - environment variables prefixed with `SOAPLAB__`, e.g. `SOAPLAB__SERVER__PORT=8081`

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::models::DEFAULT_PAGE_SIZE;
use crate::news::MAX_PAGE_SIZE;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub rate_limit: RateLimitSettings,
    pub news: NewsSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Supabase project URL, e.g. `https://abcd.supabase.co`
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewsSettings {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Settings {
    /// Loads `.env`, then the layered sources above.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let builder = Self::defaults(Config::builder())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("SOAPLAB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.request_timeout_secs", 15)?
            .set_default("database.url", "soaplab.db")?
            .set_default("auth.supabase_url", "")?
            .set_default("auth.supabase_anon_key", "")?
            .set_default("rate_limit.max_requests", 30)?
            .set_default("rate_limit.window_secs", 60)?
            .set_default("news.default_page_size", DEFAULT_PAGE_SIZE)?
            .set_default("news.max_page_size", MAX_PAGE_SIZE)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.supabase_url.trim().is_empty() {
            return Err(ConfigError::Message(
                "auth.supabase_url must be set (SOAPLAB__AUTH__SUPABASE_URL)".to_string(),
            ));
        }
        if url::Url::parse(&self.auth.supabase_url).is_err() {
            return Err(ConfigError::Message(format!(
                "auth.supabase_url is not a valid URL: {}",
                self.auth.supabase_url
            )));
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            return Err(ConfigError::Message(
                "rate_limit.max_requests and rate_limit.window_secs must be positive".to_string(),
            ));
        }
        if self.news.default_page_size == 0 || self.news.max_page_size == 0 {
            return Err(ConfigError::Message(
                "news page sizes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit.window_secs)
    }
}
