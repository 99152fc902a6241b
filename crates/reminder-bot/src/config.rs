//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Reminder bot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Event feed bind address.
    pub addr: SocketAddr,
    /// SQLite file path, or a full `sqlite:` URL.
    pub sqlite_path: String,
    /// Base URL of the outbound relay. Messages are only logged when unset.
    pub gateway_url: Option<String>,
    /// Bearer token for the outbound relay.
    pub gateway_token: Option<String>,
    /// Operator account for follow/unfollow/startup notices.
    pub admin_user_id: Option<String>,
    /// How long a fired reminder stays snoozable.
    pub grace_period: Duration,
    /// Scheduler polling granularity.
    pub scheduler_tick: Duration,
    /// Date picker horizon in calendar years.
    pub picker_horizon_years: i32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `BIND_ADDR` | Event feed bind address | `127.0.0.1:8787` |
    /// | `SQLITE_PATH` | SQLite path or URL | `./data/reminders.db` |
    /// | `GATEWAY_URL` | Outbound relay base URL | (logging only) |
    /// | `GATEWAY_TOKEN` | Outbound relay bearer token | (none) |
    /// | `ADMIN_USER_ID` | Operator account | (none) |
    /// | `REMINDER_GRACE_SECS` | Snooze window after firing | `86400` |
    /// | `SCHEDULER_TICK_SECS` | Scheduler polling interval | `1` |
    /// | `PICKER_HORIZON_YEARS` | Picker max is the end of `year + N` | `1` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let addr = var("BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8787".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let sqlite_path = var("SQLITE_PATH").unwrap_or_else(|| "./data/reminders.db".to_string());

        let grace_secs: u64 = parse_or(&var, "REMINDER_GRACE_SECS", 86_400)?;
        let tick_secs: u64 = parse_or(&var, "SCHEDULER_TICK_SECS", 1)?;
        if tick_secs == 0 {
            return Err(ConfigError::ZeroTick);
        }
        let picker_horizon_years: i32 = parse_or(&var, "PICKER_HORIZON_YEARS", 1)?;
        if picker_horizon_years < 0 {
            return Err(ConfigError::NegativeHorizon(picker_horizon_years));
        }

        Ok(Self {
            addr,
            sqlite_path,
            gateway_url: var("GATEWAY_URL"),
            gateway_token: var("GATEWAY_TOKEN"),
            admin_user_id: var("ADMIN_USER_ID"),
            grace_period: Duration::from_secs(grace_secs),
            scheduler_tick: Duration::from_secs(tick_secs),
            picker_horizon_years,
        })
    }

    /// SQLx connection URL for `sqlite_path`.
    pub fn database_url(&self) -> String {
        if self.sqlite_path.starts_with("sqlite:") {
            self.sqlite_path.clone()
        } else {
            format!("sqlite:{}?mode=rwc", self.sqlite_path)
        }
    }

    /// Directory that must exist before connecting, for plain file paths.
    pub fn database_dir(&self) -> Option<&Path> {
        if self.sqlite_path.starts_with("sqlite:") {
            return None;
        }
        Path::new(&self.sqlite_path)
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
    }
}

fn parse_or<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
            var: key,
            value,
        }),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid BIND_ADDR format")]
    InvalidAddr,

    #[error("{var} must be a number, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("SCHEDULER_TICK_SECS must be at least 1")]
    ZeroTick,

    #[error("PICKER_HORIZON_YEARS must not be negative, got {0}")]
    NegativeHorizon(i32),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.addr.to_string(), "127.0.0.1:8787");
        assert_eq!(config.database_url(), "sqlite:./data/reminders.db?mode=rwc");
        assert_eq!(config.database_dir(), Some(Path::new("./data")));
        assert!(config.gateway_url.is_none());
        assert!(config.admin_user_id.is_none());
        assert_eq!(config.grace_period, Duration::from_secs(86_400));
        assert_eq!(config.scheduler_tick, Duration::from_secs(1));
        assert_eq!(config.picker_horizon_years, 1);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("BIND_ADDR", "0.0.0.0:9000"),
            ("SQLITE_PATH", "sqlite::memory:"),
            ("GATEWAY_URL", "http://relay:9000"),
            ("GATEWAY_TOKEN", "secret"),
            ("ADMIN_USER_ID", "Uadmin"),
            ("REMINDER_GRACE_SECS", "60"),
            ("SCHEDULER_TICK_SECS", "5"),
            ("PICKER_HORIZON_YEARS", "2"),
        ])
        .unwrap();

        assert_eq!(config.addr.port(), 9000);
        assert_eq!(config.database_url(), "sqlite::memory:");
        assert_eq!(config.database_dir(), None);
        assert_eq!(config.gateway_url.as_deref(), Some("http://relay:9000"));
        assert_eq!(config.gateway_token.as_deref(), Some("secret"));
        assert_eq!(config.admin_user_id.as_deref(), Some("Uadmin"));
        assert_eq!(config.grace_period, Duration::from_secs(60));
        assert_eq!(config.scheduler_tick, Duration::from_secs(5));
        assert_eq!(config.picker_horizon_years, 2);
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = load(&[("GATEWAY_URL", "  "), ("REMINDER_GRACE_SECS", "")]).unwrap();
        assert!(config.gateway_url.is_none());
        assert_eq!(config.grace_period, Duration::from_secs(86_400));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("BIND_ADDR", "nowhere")]),
            Err(ConfigError::InvalidAddr)
        ));
        assert!(matches!(
            load(&[("REMINDER_GRACE_SECS", "a day")]),
            Err(ConfigError::InvalidNumber { var: "REMINDER_GRACE_SECS", .. })
        ));
        assert!(matches!(
            load(&[("SCHEDULER_TICK_SECS", "0")]),
            Err(ConfigError::ZeroTick)
        ));
    }

    #[test]
    fn test_picker_horizon_must_not_be_negative() {
        assert!(matches!(
            load(&[("PICKER_HORIZON_YEARS", "-1")]),
            Err(ConfigError::NegativeHorizon(-1))
        ));

        // Zero keeps the picker within the current year
        let config = load(&[("PICKER_HORIZON_YEARS", "0")]).unwrap();
        assert_eq!(config.picker_horizon_years, 0);
    }

    #[test]
    fn test_bare_filename_has_no_dir() {
        let config = load(&[("SQLITE_PATH", "reminders.db")]).unwrap();
        assert_eq!(config.database_dir(), None);
        assert_eq!(config.database_url(), "sqlite:reminders.db?mode=rwc");
    }
}
