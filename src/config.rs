use std::collections::HashMap;
use std::net::IpAddr;
use thiserror::Error;

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind_addr: IpAddr,
    pub api_base_url: String,
    pub session_cookie: Option<String>,
    pub page_size: u32,
    pub condition_id: i64,
    pub retry_max_elapsed_ms: u64,
    /// Sessions untouched for this long are dropped.
    pub session_idle_secs: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let bind_addr = env_map
            .get("BIND_ADDR")
            .map(|s| s.as_str())
            .unwrap_or("127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "BIND_ADDR".to_string(),
                    "must be an IP address".to_string(),
                )
            })?;

        let api_base_url = env_map
            .get("CARTSMART_API_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnv("CARTSMART_API_URL".to_string()))?;
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(
                "CARTSMART_API_URL".to_string(),
                format!("must start with http:// or https://, got {}", api_base_url),
            ));
        }

        let session_cookie = env_map
            .get("CARTSMART_SESSION_COOKIE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let page_size = env_map
            .get("PAGE_SIZE")
            .map(|s| s.as_str())
            .unwrap_or("20")
            .parse::<u32>()
            .ok()
            .filter(|n| (1..=MAX_PAGE_SIZE).contains(n))
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "PAGE_SIZE".to_string(),
                    format!("must be between 1 and {}", MAX_PAGE_SIZE),
                )
            })?;

        let condition_id = env_map
            .get("STACK_CONDITION_ID")
            .map(|s| s.as_str())
            .unwrap_or("1")
            .parse::<i64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "STACK_CONDITION_ID".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let retry_max_elapsed_ms = env_map
            .get("RETRY_MAX_ELAPSED_MS")
            .map(|s| s.as_str())
            .unwrap_or("10000")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "RETRY_MAX_ELAPSED_MS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        let session_idle_secs = env_map
            .get("SESSION_IDLE_SECS")
            .map(|s| s.as_str())
            .unwrap_or("1800")
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "SESSION_IDLE_SECS".to_string(),
                    "must be a positive number of seconds".to_string(),
                )
            })?;

        Ok(Config {
            port,
            bind_addr,
            api_base_url,
            session_cookie,
            page_size,
            condition_id,
            retry_max_elapsed_ms,
            session_idle_secs,
        })
    }
}
