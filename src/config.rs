//! Environment-driven configuration.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Bot configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram Bot API token.
    pub bot_token: SecretString,
    /// Broadcast channel for game announcements, e.g. `-1001234567890`.
    pub channel_id: String,
    /// Path of the local database file.
    pub database_path: PathBuf,
    /// Public HTTPS base URL for webhook delivery. When absent the bot
    /// falls back to long-polling.
    pub public_base_url: Option<String>,
    /// Port for the health/webhook HTTP server.
    pub port: u16,
    /// Whether we run in a production-like environment.
    pub production: bool,
    /// Sessions idle longer than this are evicted by the background sweep.
    pub session_idle_timeout: Duration,
}

impl Config {
    /// Read configuration from the environment.
    ///
    /// Fails fast with a clear diagnostic if a required variable is absent.
    /// `PUBLIC_BASE_URL` is only required in production; locally the bot
    /// long-polls instead.
    pub fn from_env() -> Result<Self, ConfigError> {
        let production = std::env::var("ENVIRONMENT")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let bot_token = required("BOT_TOKEN", "Set the Telegram bot token before starting.")?;

        let channel_id = required(
            "CHANNEL_ID",
            "Set the announcement channel id, e.g. -1001234567890.",
        )?;

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .ok()
            .map(|s| s.trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());
        if production && public_base_url.is_none() {
            return Err(ConfigError::MissingRequired {
                key: "PUBLIC_BASE_URL".into(),
                hint: "Required in production for webhook delivery.".into(),
            });
        }

        let database_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/matchbot.db"));

        let port: u16 = match std::env::var("PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".into(),
                message: format!("'{raw}' is not a valid port number"),
            })?,
            Err(_) => 8080,
        };

        let session_idle_secs: u64 = std::env::var("SESSION_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3600);

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            channel_id,
            database_path,
            public_base_url,
            port,
            production,
            session_idle_timeout: Duration::from_secs(session_idle_secs),
        })
    }

    /// Full webhook URL, when a public base URL is configured.
    pub fn webhook_url(&self) -> Option<String> {
        self.public_base_url
            .as_ref()
            .map(|base| format!("{base}/webhook"))
    }
}

fn required(key: &str, hint: &str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingRequired {
            key: key.into(),
            hint: hint.into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_url_appends_path() {
        let config = Config {
            bot_token: SecretString::from("t".to_string()),
            channel_id: "-100".into(),
            database_path: PathBuf::from(":memory:"),
            public_base_url: Some("https://bot.example.com".into()),
            port: 8080,
            production: false,
            session_idle_timeout: Duration::from_secs(3600),
        };
        assert_eq!(
            config.webhook_url().as_deref(),
            Some("https://bot.example.com/webhook")
        );
    }

    #[test]
    fn webhook_url_none_without_base() {
        let config = Config {
            bot_token: SecretString::from("t".to_string()),
            channel_id: "-100".into(),
            database_path: PathBuf::from(":memory:"),
            public_base_url: None,
            port: 8080,
            production: false,
            session_idle_timeout: Duration::from_secs(3600),
        };
        assert!(config.webhook_url().is_none());
    }
}
