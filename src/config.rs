//! Env-driven configuration for the proxy service.
//!
//! Values are read from the process environment; `dotenv` is loaded on demand
//! by the binaries. Defaults are provided for convenience during development.
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::cache::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
use crate::error::{AppError, AppResult};

pub const DEFAULT_HF_MODEL: &str = "stabilityai/sdxl-turbo";
pub const DEFAULT_HF_API_BASE: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_POLLINATIONS_BASE: &str = "https://image.pollinations.ai";

#[derive(Clone)]
pub struct Config {
    pub api_host: String,
    pub api_port: String,
    /// Credential for the keyed backend; `None` forces every keyed call to fail.
    pub hf_api_key: Option<String>,
    pub hf_model: String,
    pub hf_api_base: String,
    pub pollinations_base: String,
    pub cache_max_entries: usize,
    pub cache_ttl: Duration,
    pub upstream_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_host: "0.0.0.0".to_string(),
            api_port: "8787".to_string(),
            hf_api_key: None,
            hf_model: DEFAULT_HF_MODEL.to_string(),
            hf_api_base: DEFAULT_HF_API_BASE.to_string(),
            pollinations_base: DEFAULT_POLLINATIONS_BASE.to_string(),
            cache_max_entries: DEFAULT_MAX_ENTRIES,
            cache_ttl: DEFAULT_TTL,
            upstream_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn dotenv_load() {
        dotenv::dotenv().ok();
    }

    pub fn new() -> AppResult<Self> {
        let defaults = Config::default();
        Ok(Config {
            api_host: env::var("API_HOST").unwrap_or(defaults.api_host),
            api_port: env::var("PORT").unwrap_or(defaults.api_port),
            hf_api_key: non_blank(env::var("HUGGINGFACE_API_KEY").ok()),
            hf_model: env::var("HF_MODEL").ok().filter(|m| !m.is_empty()).unwrap_or(defaults.hf_model),
            hf_api_base: env::var("HF_API_BASE").unwrap_or(defaults.hf_api_base),
            pollinations_base: env::var("POLLINATIONS_BASE").unwrap_or(defaults.pollinations_base),
            cache_max_entries: parse_var("CACHE_MAX_ENTRIES")?.unwrap_or(defaults.cache_max_entries),
            cache_ttl: parse_var("CACHE_TTL_SECS")?.map(Duration::from_secs).unwrap_or(defaults.cache_ttl),
            upstream_timeout: parse_var("UPSTREAM_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.upstream_timeout),
        })
    }

    /// Resolve the listening address, falling back to `0.0.0.0:8787` on bad input.
    pub fn socket_address(&self) -> SocketAddr {
        let ip: IpAddr = self.api_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid API_HOST '{}', falling back to 0.0.0.0", self.api_host);
            IpAddr::from([0, 0, 0, 0])
        });
        let port: u16 = self.api_port.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid PORT '{}', falling back to 8787", self.api_port);
            8787
        });
        SocketAddr::new(ip, port)
    }

    /// Printable stand-in for the credential; the key itself is never shown.
    pub fn credential_status(&self) -> &'static str {
        if self.hf_api_key.is_some() {
            "<set>"
        } else {
            "<unset>"
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("API_HOST: {}", self.api_host);
        tracing::info!("PORT: {}", self.api_port);
        tracing::info!("HUGGINGFACE_API_KEY: {}", self.credential_status());
        tracing::info!("HF_MODEL: {}", self.hf_model);
        tracing::info!("HF_API_BASE: {}", self.hf_api_base);
        tracing::info!("POLLINATIONS_BASE: {}", self.pollinations_base);
        tracing::info!("CACHE: max {} entries, ttl {:?}", self.cache_max_entries, self.cache_ttl);
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_host", &self.api_host)
            .field("api_port", &self.api_port)
            .field("hf_api_key", &self.credential_status())
            .field("hf_model", &self.hf_model)
            .field("hf_api_base", &self.hf_api_base)
            .field("pollinations_base", &self.pollinations_base)
            .field("cache_max_entries", &self.cache_max_entries)
            .field("cache_ttl", &self.cache_ttl)
            .field("upstream_timeout", &self.upstream_timeout)
            .finish()
    }
}

// an empty or whitespace-only key is the same as no key
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str) -> AppResult<Option<T>> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{} must be a number, got '{}'", name, raw))),
        _ => Ok(None),
    }
}
