use crate::error::{Error, Result};
use std::env;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    /// Primary (direct) generation endpoint, e.g. `https://api.example.com/generate-questions`.
    pub upstream_url: String,
    /// Fallback endpoints tried after the primary, comma separated.
    pub fallback_urls: Vec<String>,
    /// Targets the proxy hop forwards to, comma separated.
    pub proxy_targets: Vec<String>,
    pub direct_timeout_secs: u64,
    pub fallback_timeout_secs: u64,
    pub proxy_attempt_timeout_secs: u64,
    pub proxy_attempts: u32,
    pub proxy_cache_ttl_secs: u64,
    pub proxy_cache_capacity: usize,
    pub max_batch_size: usize,
    pub batch_attempts: u32,
    pub max_merged_bytes: usize,
    pub source_cache_capacity: usize,
    pub generate_rps: u32,
    pub proxy_rps: u32,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            upstream_url: get_env("UPSTREAM_URL")?,
            fallback_urls: get_env_list("FALLBACK_URLS"),
            proxy_targets: get_env_list("PROXY_TARGETS"),
            direct_timeout_secs: get_env_parse_or("DIRECT_TIMEOUT_SECS", 25)?,
            fallback_timeout_secs: get_env_parse_or("FALLBACK_TIMEOUT_SECS", 55)?,
            proxy_attempt_timeout_secs: get_env_parse_or("PROXY_ATTEMPT_TIMEOUT_SECS", 5)?,
            proxy_attempts: get_env_parse_or("PROXY_ATTEMPTS", 3)?,
            proxy_cache_ttl_secs: get_env_parse_or("PROXY_CACHE_TTL_SECS", 6 * 3600)?,
            proxy_cache_capacity: get_env_parse_or("PROXY_CACHE_CAPACITY", 128)?,
            max_batch_size: get_env_parse_or("MAX_BATCH_SIZE", 30)?,
            batch_attempts: get_env_parse_or("BATCH_ATTEMPTS", 3)?,
            max_merged_bytes: get_env_parse_or("MAX_MERGED_BYTES", 15 * 1024 * 1024)?,
            source_cache_capacity: get_env_parse_or("SOURCE_CACHE_CAPACITY", 32)?,
            generate_rps: get_env_parse_or("GENERATE_RPS", 10)?,
            proxy_rps: get_env_parse_or("PROXY_RPS", 30)?,
        })
    }

    pub fn direct_timeout(&self) -> Duration {
        Duration::from_secs(self.direct_timeout_secs)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_secs)
    }

    pub fn proxy_attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_attempt_timeout_secs)
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_list(name: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
