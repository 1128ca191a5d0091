use std::path::PathBuf;
use std::time::Duration;

use crate::rate_limit::RateLimitConfig;

pub const MIN_SECRET_LEN: usize = 32;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("{0} must be at least {MIN_SECRET_LEN} characters long")]
    WeakSecret(&'static str),
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Process configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub jwt_secret: String,
    pub nonce_secret: String,
    pub nonce_ttl: Duration,
    pub storage_timeout: Duration,
    pub rate_limit: RateLimitConfig,
    pub database_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub frontend_url: Option<String>,
    pub enable_hsts: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let opt = |name: &str| get(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        fn parsed<T: std::str::FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
            match raw {
                None => Ok(default),
                Some(v) => v.parse().map_err(|_| ConfigError::Invalid { name, value: v }),
            }
        }

        let jwt_secret = opt("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret("JWT_SECRET"));
        }
        let nonce_secret = opt("NONCE_SECRET").unwrap_or_else(|| jwt_secret.clone());
        if nonce_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret("NONCE_SECRET"));
        }

        let enabled = parsed("RL_FEEDBACK_ENABLED", opt("RL_FEEDBACK_ENABLED"), true)?;
        let window = parsed("RL_FEEDBACK_WINDOW", opt("RL_FEEDBACK_WINDOW"), 30u64)?;

        Ok(Self {
            bind_addr: opt("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed("PORT", opt("PORT"), 8080u16)?,
            jwt_secret,
            nonce_secret,
            nonce_ttl: Duration::from_secs(parsed("NONCE_TTL_SECS", opt("NONCE_TTL_SECS"), 86_400u64)?),
            storage_timeout: Duration::from_secs(parsed("STORAGE_TIMEOUT_SECS", opt("STORAGE_TIMEOUT_SECS"), 5u64)?),
            rate_limit: RateLimitConfig { enabled, window: Duration::from_secs(window) },
            database_url: opt("DATABASE_URL"),
            data_dir: opt("FEEDBACK_DATA_DIR").map(PathBuf::from),
            frontend_url: opt("FRONTEND_URL"),
            enable_hsts: opt("ENABLE_HSTS").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = load(&[("JWT_SECRET", SECRET)]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.nonce_secret, SECRET);
        assert_eq!(cfg.rate_limit.window, Duration::from_secs(30));
        assert_eq!(cfg.storage_timeout, Duration::from_secs(5));
        assert!(cfg.database_url.is_none());
        assert!(!cfg.enable_hsts);
    }

    #[test]
    fn secret_required_and_long_enough() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing("JWT_SECRET"));
        assert_eq!(load(&[("JWT_SECRET", "short")]).unwrap_err(), ConfigError::WeakSecret("JWT_SECRET"));
        assert_eq!(
            load(&[("JWT_SECRET", SECRET), ("NONCE_SECRET", "short")]).unwrap_err(),
            ConfigError::WeakSecret("NONCE_SECRET")
        );
    }

    #[test]
    fn bad_numbers_rejected() {
        let err = load(&[("JWT_SECRET", SECRET), ("PORT", "eighty")]).unwrap_err();
        assert_eq!(err, ConfigError::Invalid { name: "PORT", value: "eighty".into() });
    }

    #[test]
    fn overrides_apply() {
        let cfg = load(&[
            ("JWT_SECRET", SECRET),
            ("RL_FEEDBACK_WINDOW", "60"),
            ("STORAGE_TIMEOUT_SECS", "2"),
            ("DATABASE_URL", "postgres://localhost/feedback"),
            ("ENABLE_HSTS", "true"),
        ])
        .unwrap();
        assert_eq!(cfg.rate_limit.window, Duration::from_secs(60));
        assert_eq!(cfg.storage_timeout, Duration::from_secs(2));
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/feedback"));
        assert!(cfg.enable_hsts);
    }
}
