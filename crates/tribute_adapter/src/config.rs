#![forbid(unsafe_code)]

use std::env;
use std::net::SocketAddr;

use tribute_engines::remote_store::REMOTE_TIMEOUT_MS_DEFAULT;
use url::Url;

pub const PROXY_BIND_DEFAULT: &str = "127.0.0.1:8888";
pub const PROXY_ROUTE_DEFAULT: &str = "/tributes";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("TRIBUTE_PROXY_TARGET_URL must be set")]
    MissingTargetUrl,
    #[error("invalid target url '{0}': expected an absolute http(s) url")]
    InvalidTargetUrl(String),
    #[error("invalid bind address '{0}'")]
    InvalidBind(String),
    #[error("invalid route '{0}': must start with '/'")]
    InvalidRoute(String),
}

/// Where the forwarder listens and what it forwards to. The target is configuration,
/// one proxy process per remote sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub target_url: String,
    pub bind: SocketAddr,
    pub route: String,
    pub timeout_ms: u64,
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let target_url = lookup("TRIBUTE_PROXY_TARGET_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingTargetUrl)?;
        validate_target_url(&target_url)?;

        let bind_raw = lookup("TRIBUTE_PROXY_BIND")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| PROXY_BIND_DEFAULT.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBind(bind_raw.clone()))?;

        let route = lookup("TRIBUTE_PROXY_ROUTE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| PROXY_ROUTE_DEFAULT.to_string());
        if !route.starts_with('/') {
            return Err(ConfigError::InvalidRoute(route));
        }

        let timeout_ms = lookup("TRIBUTE_HTTP_TIMEOUT_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| (100..=120_000).contains(v))
            .unwrap_or(REMOTE_TIMEOUT_MS_DEFAULT);

        Ok(Self {
            target_url,
            bind,
            route,
            timeout_ms,
        })
    }
}

fn validate_target_url(raw: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(raw).map_err(|_| ConfigError::InvalidTargetUrl(raw.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ConfigError::InvalidTargetUrl(raw.to_string()));
    }
    Ok(())
}
