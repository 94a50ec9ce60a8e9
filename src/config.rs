/*
 * Responsibility
 * - Load environment variables and settings (PORT, whitelist options file, verify options)
 * - Validate values (startup fails when something is missing or broken)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::services::whitelist::AuthenticateOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    /// Options handed to the strategy on every request (`{"whitelist": {...}}`).
    pub auth_options: AuthenticateOptions,
    pub pass_req_to_callback: bool,
    pub verify_timeout: Duration,

    pub body_limit_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            app_env: AppEnv::Development,
            auth_options: AuthenticateOptions::default(),
            pass_req_to_callback: false,
            verify_timeout: Duration::from_secs(5),
            body_limit_bytes: 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let auth_options = match std::env::var("WHITELIST_CONFIG") {
            Ok(path) => load_auth_options(&path)?,
            Err(_) => AuthenticateOptions::default(),
        };

        let pass_req_to_callback = std::env::var("PASS_REQ_TO_CALLBACK")
            .ok()
            .map(|v| parse_bool(&v).ok_or(ConfigError::Invalid("PASS_REQ_TO_CALLBACK")))
            .transpose()?
            .unwrap_or(false);

        let verify_timeout = std::env::var("VERIFY_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(5));

        let body_limit_bytes = std::env::var("BODY_LIMIT_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(1024 * 1024);

        Ok(Self {
            addr,
            app_env,
            auth_options,
            pass_req_to_callback,
            verify_timeout,
            body_limit_bytes,
        })
    }
}

fn load_auth_options(path: &str) -> Result<AuthenticateOptions, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        tracing::error!(path, error = %err, "cannot read whitelist configuration");
        ConfigError::Missing("WHITELIST_CONFIG")
    })?;

    parse_auth_options(&raw)
}

/// Parse the JSON document held by `WHITELIST_CONFIG`.
pub fn parse_auth_options(raw: &str) -> Result<AuthenticateOptions, ConfigError> {
    serde_json::from_str(raw).map_err(|err| {
        tracing::error!(error = %err, "whitelist configuration is not valid JSON");
        ConfigError::Invalid("WHITELIST_CONFIG")
    })
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
