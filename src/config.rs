use anyhow::{bail, Result};
use tracing::warn;

/// Runtime configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    /// Public base URL of this deployment, e.g. "https://my-bot.onrender.com".
    pub app_url: String,
    pub session_secret: String,
    pub port: u16,
    pub poll_interval_secs: u64,
}

const DEFAULT_SESSION_SECRET: &str = "change_this";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from a key lookup function. Extracted so tests don't
    /// have to mutate the process environment.
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let client_id = get("GOOGLE_CLIENT_ID");
        let client_secret = get("GOOGLE_CLIENT_SECRET");
        let app_url = get("APP_URL");

        let mut missing = Vec::new();
        if client_id.is_none() {
            missing.push("GOOGLE_CLIENT_ID");
        }
        if client_secret.is_none() {
            missing.push("GOOGLE_CLIENT_SECRET");
        }
        if app_url.is_none() {
            missing.push("APP_URL");
        }
        if !missing.is_empty() {
            bail!("Missing required env vars: {}", missing.join(", "));
        }

        let session_secret = match get("SESSION_SECRET") {
            Some(s) if !s.is_empty() => s,
            _ => {
                warn!("SESSION_SECRET not set, using built-in default");
                DEFAULT_SESSION_SECRET.to_string()
            }
        };

        let port = match get("PORT") {
            Some(p) => p
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a number, got: {}", p))?,
            None => DEFAULT_PORT,
        };

        let poll_interval_secs = match get("POLL_INTERVAL_SECS") {
            Some(p) => p
                .parse()
                .map_err(|_| anyhow::anyhow!("POLL_INTERVAL_SECS must be a number, got: {}", p))?,
            None => DEFAULT_POLL_INTERVAL_SECS,
        };

        Ok(Self {
            client_id: client_id.unwrap(),
            client_secret: client_secret.unwrap(),
            app_url: app_url.unwrap(),
            session_secret,
            port,
            poll_interval_secs,
        })
    }

    /// The OAuth redirect URI registered with the provider.
    pub fn redirect_uri(&self) -> String {
        format!("{}/oauth2callback", self.app_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let map = env(pairs);
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_minimal_config_loads_with_defaults() {
        let config = load(&[
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("APP_URL", "https://bot.example.com"),
        ])
        .unwrap();

        assert_eq!(config.client_id, "id");
        assert_eq!(config.session_secret, DEFAULT_SESSION_SECRET);
        assert_eq!(config.port, 3000);
        assert_eq!(config.poll_interval_secs, 3);
    }

    #[test]
    fn test_missing_vars_all_named() {
        let err = load(&[("GOOGLE_CLIENT_ID", "id")]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("GOOGLE_CLIENT_SECRET"));
        assert!(msg.contains("APP_URL"));
        assert!(!msg.contains("GOOGLE_CLIENT_ID,"));
    }

    #[test]
    fn test_port_and_interval_overrides() {
        let config = load(&[
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("APP_URL", "https://bot.example.com"),
            ("PORT", "8080"),
            ("POLL_INTERVAL_SECS", "5"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.poll_interval_secs, 5);
    }

    #[test]
    fn test_bad_port_rejected() {
        let err = load(&[
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("APP_URL", "https://bot.example.com"),
            ("PORT", "not-a-port"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_redirect_uri_strips_trailing_slash() {
        let config = load(&[
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("APP_URL", "https://bot.example.com/"),
        ])
        .unwrap();
        assert_eq!(
            config.redirect_uri(),
            "https://bot.example.com/oauth2callback"
        );
    }
}
