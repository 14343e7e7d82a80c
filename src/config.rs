// src/config.rs

use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::relay::server::{
    RelaySettings, DEFAULT_CLIENT_POLL, DEFAULT_CLIENT_WAIT, DEFAULT_PORT, DEFAULT_PORT_ATTEMPTS,
    DEFAULT_REQUEST_TIMEOUT,
};

// A struct to hold all configuration, loaded once at startup from the environment / .env file.
#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub host: IpAddr,
    /// Preferred relay port; the next free one is used when it is taken
    pub port: u16,
    pub max_port_attempts: u16,

    // Request lifecycle
    pub client_wait: Duration,
    pub client_poll_interval: Duration,
    pub request_timeout: Duration,

    /// Open the wallet page in the system browser on every dispatch
    pub open_browser: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            max_port_attempts: DEFAULT_PORT_ATTEMPTS,
            client_wait: DEFAULT_CLIENT_WAIT,
            client_poll_interval: DEFAULT_CLIENT_POLL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            open_browser: true,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key → value source; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let max_port_attempts: u16 = parse_or(&lookup, "RELAY_PORT_ATTEMPTS", defaults.max_port_attempts)
            .context("RELAY_PORT_ATTEMPTS must be a valid number")?;
        if max_port_attempts == 0 {
            anyhow::bail!("RELAY_PORT_ATTEMPTS must be at least 1");
        }

        let client_poll_interval = parse_or(
            &lookup,
            "RELAY_CLIENT_POLL_MS",
            defaults.client_poll_interval.as_millis() as u64,
        )
        .map(Duration::from_millis)
        .context("RELAY_CLIENT_POLL_MS must be a valid number")?;
        if client_poll_interval.is_zero() {
            anyhow::bail!("RELAY_CLIENT_POLL_MS must be at least 1");
        }

        let open_browser = match lookup("RELAY_OPEN_BROWSER") {
            Some(v) => parse_bool(&v).context("RELAY_OPEN_BROWSER must be true or false")?,
            None => defaults.open_browser,
        };

        Ok(Config {
            host: parse_or(&lookup, "RELAY_HOST", defaults.host)
                .context("RELAY_HOST must be a valid IP address")?,
            port: parse_or(&lookup, "RELAY_PORT", defaults.port)
                .context("RELAY_PORT must be a valid number")?,
            max_port_attempts,
            client_wait: parse_or(&lookup, "RELAY_CLIENT_WAIT_SECS", defaults.client_wait.as_secs())
                .map(Duration::from_secs)
                .context("RELAY_CLIENT_WAIT_SECS must be a valid number")?,
            client_poll_interval,
            request_timeout: parse_or(
                &lookup,
                "RELAY_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )
            .map(Duration::from_secs)
            .context("RELAY_REQUEST_TIMEOUT_SECS must be a valid number")?,
            open_browser,
        })
    }

    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            host: self.host,
            port: self.port,
            max_port_attempts: self.max_port_attempts,
            client_wait: self.client_wait,
            client_poll_interval: self.client_poll_interval,
            request_timeout: self.request_timeout,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value '{}' for {}", raw, key)),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("invalid boolean '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.client_wait, Duration::from_secs(30));
        assert_eq!(config.client_poll_interval, Duration::from_millis(500));
        assert_eq!(config.request_timeout, Duration::from_secs(300));
        assert!(config.open_browser);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("RELAY_HOST", "0.0.0.0"),
            ("RELAY_PORT", "4100"),
            ("RELAY_PORT_ATTEMPTS", "3"),
            ("RELAY_CLIENT_WAIT_SECS", "5"),
            ("RELAY_CLIENT_POLL_MS", "100"),
            ("RELAY_REQUEST_TIMEOUT_SECS", "60"),
            ("RELAY_OPEN_BROWSER", "off"),
        ]))
        .unwrap();
        let settings = config.relay_settings();
        assert_eq!(settings.host.to_string(), "0.0.0.0");
        assert_eq!(settings.port, 4100);
        assert_eq!(settings.max_port_attempts, 3);
        assert_eq!(settings.client_wait, Duration::from_secs(5));
        assert_eq!(settings.client_poll_interval, Duration::from_millis(100));
        assert_eq!(settings.request_timeout, Duration::from_secs(60));
        assert!(!config.open_browser);
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = Config::from_lookup(lookup(&[("RELAY_PORT", "http")])).unwrap_err();
        assert!(format!("{:#}", err).contains("RELAY_PORT"));

        let err = Config::from_lookup(lookup(&[("RELAY_PORT_ATTEMPTS", "0")])).unwrap_err();
        assert!(err.to_string().contains("at least 1"));

        let err = Config::from_lookup(lookup(&[("RELAY_CLIENT_POLL_MS", "0")])).unwrap_err();
        assert!(err.to_string().contains("RELAY_CLIENT_POLL_MS"));

        assert!(Config::from_lookup(lookup(&[("RELAY_OPEN_BROWSER", "maybe")])).is_err());
    }
}
