//! Process configuration, read once from the environment at startup.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use thiserror::Error;

use haven_auth::{CodecError, KeyPair, SecureCookieCodec, codec::MIN_HASH_KEY_LEN};
use haven_infra::db::PoolSettings;
use haven_observability::LogFormat;

use crate::session_store::{CookieOptions, DEFAULT_MAX_AGE_SECS};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.into(),
    }
}

#[derive(Clone)]
pub struct SessionKeys {
    pub hash_key: Vec<u8>,
    pub block_key: Option<[u8; 32]>,
}

impl core::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("encrypting", &self.block_key.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub current: SessionKeys,
    pub previous: Option<SessionKeys>,
    pub max_age_secs: i64,
    pub secure_cookie: bool,
}

impl SessionSettings {
    /// Codec with the current pair first and the rotated-out pair (if any) after it.
    pub fn codec(&self) -> Result<SecureCookieCodec, CodecError> {
        let mut pairs = vec![KeyPair::new(self.current.hash_key.clone(), self.current.block_key)?];
        if let Some(previous) = &self.previous {
            pairs.push(KeyPair::new(previous.hash_key.clone(), previous.block_key)?);
        }
        SecureCookieCodec::new(pairs, self.max_age_secs)
    }

    pub fn cookie_options(&self) -> CookieOptions {
        CookieOptions {
            max_age_secs: self.max_age_secs,
            secure: self.secure_cookie,
            ..CookieOptions::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database: PoolSettings,
    pub session: SessionSettings,
    pub request_timeout: Duration,
    /// Raw value; the cleaner raises anything under a minute to its default.
    pub token_cleanup_interval: Duration,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = parse_or(&get, "PORT", 8080u16)?;

        let database = PoolSettings {
            url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10u32)?,
            acquire_timeout: Duration::from_secs(parse_or(&get, "DATABASE_ACQUIRE_TIMEOUT_SECS", 5u64)?),
        };
        if database.max_connections == 0 {
            return Err(invalid("DATABASE_MAX_CONNECTIONS", "must be at least 1"));
        }

        let hash_key = get("SESSION_KEY").ok_or(ConfigError::Missing("SESSION_KEY"))?;
        let current = SessionKeys {
            hash_key: hash_key_bytes("SESSION_KEY", hash_key)?,
            block_key: get("SESSION_BLOCK_KEY")
                .map(|v| block_key_bytes("SESSION_BLOCK_KEY", &v))
                .transpose()?,
        };

        let previous = match get("SESSION_PREVIOUS_KEY") {
            Some(hash_key) => Some(SessionKeys {
                hash_key: hash_key_bytes("SESSION_PREVIOUS_KEY", hash_key)?,
                block_key: get("SESSION_PREVIOUS_BLOCK_KEY")
                    .map(|v| block_key_bytes("SESSION_PREVIOUS_BLOCK_KEY", &v))
                    .transpose()?,
            }),
            None if get("SESSION_PREVIOUS_BLOCK_KEY").is_some() => {
                return Err(invalid(
                    "SESSION_PREVIOUS_BLOCK_KEY",
                    "set without SESSION_PREVIOUS_KEY",
                ));
            }
            None => None,
        };

        let max_age_secs = parse_or(&get, "SESSION_MAX_AGE_SECS", DEFAULT_MAX_AGE_SECS)?;
        if max_age_secs <= 0 {
            return Err(invalid("SESSION_MAX_AGE_SECS", "must be positive"));
        }

        let request_timeout_secs = parse_or(&get, "REQUEST_TIMEOUT_SECS", 5u64)?;
        if request_timeout_secs == 0 {
            return Err(invalid("REQUEST_TIMEOUT_SECS", "must be at least 1"));
        }

        let log_format = match get("LOG_FORMAT") {
            Some(raw) => raw.parse::<LogFormat>().map_err(|e| invalid("LOG_FORMAT", e))?,
            None => LogFormat::default(),
        };

        Ok(Self {
            port,
            database,
            session: SessionSettings {
                current,
                previous,
                max_age_secs,
                secure_cookie: parse_or(&get, "SESSION_COOKIE_SECURE", true)?,
            },
            request_timeout: Duration::from_secs(request_timeout_secs),
            token_cleanup_interval: Duration::from_secs(parse_or(&get, "TOKEN_CLEANUP_INTERVAL_SECS", 900u64)?),
            log_format,
        })
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw.parse::<T>().map_err(|e| invalid(name, e.to_string())),
        None => Ok(default),
    }
}

fn hash_key_bytes(name: &'static str, key: String) -> Result<Vec<u8>, ConfigError> {
    if key.chars().count() < MIN_HASH_KEY_LEN {
        return Err(invalid(name, format!("must be at least {MIN_HASH_KEY_LEN} characters")));
    }
    Ok(key.into_bytes())
}

fn block_key_bytes(name: &'static str, raw: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = STANDARD
        .decode(raw)
        .map_err(|e| invalid(name, format!("not base64: {e}")))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| invalid(name, format!("must decode to 32 bytes, got {}", bytes.len())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let mut env: HashMap<String, String> = HashMap::from([
            ("DATABASE_URL".to_string(), "postgres://localhost/haven".to_string()),
            ("SESSION_KEY".to_string(), KEY.to_string()),
        ]);
        for (k, v) in pairs {
            env.insert(k.to_string(), v.to_string());
        }
        AppConfig::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.database.max_connections, 10);
        assert_eq!(cfg.database.acquire_timeout, Duration::from_secs(5));
        assert_eq!(cfg.session.max_age_secs, 604_800);
        assert!(cfg.session.secure_cookie);
        assert!(cfg.session.previous.is_none());
        assert!(cfg.session.current.block_key.is_none());
        assert_eq!(cfg.request_timeout, Duration::from_secs(5));
        assert_eq!(cfg.token_cleanup_interval, Duration::from_secs(900));
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn required_values_are_enforced() {
        let err = AppConfig::from_lookup(|_| None).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));

        assert!(matches!(
            config(&[("SESSION_KEY", "too-short")]),
            Err(ConfigError::Invalid { name: "SESSION_KEY", .. })
        ));
        assert!(matches!(
            config(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { name: "PORT", .. })
        ));
        assert!(matches!(
            config(&[("SESSION_MAX_AGE_SECS", "0")]),
            Err(ConfigError::Invalid { name: "SESSION_MAX_AGE_SECS", .. })
        ));
    }

    #[test]
    fn block_keys_must_be_32_bytes_of_base64() {
        let good = STANDARD.encode([7u8; 32]);
        let cfg = config(&[("SESSION_BLOCK_KEY", good.as_str())]).unwrap();
        assert_eq!(cfg.session.current.block_key, Some([7u8; 32]));

        let short = STANDARD.encode([7u8; 16]);
        assert!(matches!(
            config(&[("SESSION_BLOCK_KEY", short.as_str())]),
            Err(ConfigError::Invalid { name: "SESSION_BLOCK_KEY", .. })
        ));
    }

    #[test]
    fn rotation_pair_builds_two_key_codec() {
        let previous = "fedcba9876543210fedcba9876543210";
        let cfg = config(&[("SESSION_PREVIOUS_KEY", previous)]).unwrap();
        let current_only = config(&[]).unwrap().session.codec().unwrap();

        let old_keys = config(&[("SESSION_KEY", previous)]).unwrap().session.codec().unwrap();
        let token = old_keys.encode("session", &"abc".to_string()).unwrap();

        let rotated = cfg.session.codec().unwrap();
        assert_eq!(rotated.decode::<String>("session", &token).unwrap(), "abc");
        assert!(current_only.decode::<String>("session", &token).is_err());

        assert!(matches!(
            config(&[("SESSION_PREVIOUS_BLOCK_KEY", STANDARD.encode([1u8; 32]).as_str())]),
            Err(ConfigError::Invalid { name: "SESSION_PREVIOUS_BLOCK_KEY", .. })
        ));
    }

    #[test]
    fn log_format_and_overrides_parse() {
        let cfg = config(&[
            ("LOG_FORMAT", "pretty"),
            ("PORT", "9090"),
            ("TOKEN_CLEANUP_INTERVAL_SECS", "30"),
            ("SESSION_COOKIE_SECURE", "false"),
        ])
        .unwrap();
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.token_cleanup_interval, Duration::from_secs(30));
        assert!(!cfg.session.cookie_options().secure);
        assert!(matches!(
            config(&[("LOG_FORMAT", "xml")]),
            Err(ConfigError::Invalid { name: "LOG_FORMAT", .. })
        ));
    }
}
