use std::net::SocketAddr;
use std::path::PathBuf;

use resume_guard::RateLimitSettings;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub access_log: AccessLogConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessLogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Path prefixes that never produce an access log line.
    #[serde(default = "default_exclude_paths")]
    pub exclude_paths: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

impl TlsConfig {
    pub fn is_enabled(&self) -> bool {
        self.cert_path.is_some() && self.key_path.is_some()
    }
}

fn default_true() -> bool { true }
fn default_max_body_bytes() -> usize { 1024 * 1024 }

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_exclude_paths() -> Vec<String> {
    ["/static/", "/media/", "/favicon.ico", "/robots.txt"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exclude_paths: default_exclude_paths(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            rate_limit: RateLimitSettings::default(),
            access_log: AccessLogConfig::default(),
            tls: TlsConfig::default(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Reads `WEB_RESUME_CONFIG` (TOML) if set, applies `WEB_RESUME_*`
    /// environment overrides and validates the result.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("WEB_RESUME_CONFIG")
            .map(PathBuf::from)
            .ok();

        let mut config = if let Some(path) = config_path {
            let contents = std::fs::read_to_string(&path)?;
            toml::from_str(&contents)?
        } else {
            ServerConfig::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.rate_limit.validate()?;
        Ok(config)
    }

    /// Applies environment-style overrides looked up through `var`.
    ///
    /// Unparseable numeric and boolean values are ignored with a warning;
    /// an unparseable bind address is an error.
    pub fn apply_overrides<F>(&mut self, var: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = var("WEB_RESUME_BIND_ADDR") {
            self.bind_addr = addr.parse()?;
        }

        if let Some(val) = var("WEB_RESUME_RATE_LIMIT_ENABLED") {
            match parse_flag(&val) {
                Some(enabled) => self.rate_limit.enabled = enabled,
                None => tracing::warn!("Ignoring WEB_RESUME_RATE_LIMIT_ENABLED={val}"),
            }
        }
        if let Some(val) = var("WEB_RESUME_GENERAL_LIMIT") {
            match val.parse::<u64>() {
                Ok(limit) => self.rate_limit.general_limit = limit,
                Err(_) => tracing::warn!("Ignoring WEB_RESUME_GENERAL_LIMIT={val}"),
            }
        }
        if let Some(val) = var("WEB_RESUME_LOGIN_LIMIT") {
            match val.parse::<u64>() {
                Ok(limit) => self.rate_limit.login_limit = limit,
                Err(_) => tracing::warn!("Ignoring WEB_RESUME_LOGIN_LIMIT={val}"),
            }
        }
        if let Some(val) = var("WEB_RESUME_WHITELIST") {
            self.rate_limit.whitelist = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(cert) = var("WEB_RESUME_TLS_CERT") {
            self.tls.cert_path = Some(cert);
        }
        if let Some(key) = var("WEB_RESUME_TLS_KEY") {
            self.tls.key_path = Some(key);
        }

        Ok(())
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
