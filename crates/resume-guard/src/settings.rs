//! Rate limiter settings.
//!
//! Every field has a default, so an empty `[rate_limit]` table (or no table
//! at all) yields the stock limits: 100 requests per minute and 5 login
//! attempts per five minutes, with only `127.0.0.1` whitelisted.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GuardError, GuardResult};

/// How a counter's TTL behaves when it is written again inside its window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Every counted request resets the TTL to the full window length.
    #[default]
    Renewing,
    /// The TTL is set once when the counter is created and never extended.
    Fixed,
}

impl WindowMode {
    pub fn renews(self) -> bool {
        matches!(self, WindowMode::Renewing)
    }
}

/// Language used for rejection messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Zh,
}

/// Immutable limiter configuration, built once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_general_limit")]
    pub general_limit: u64,
    #[serde(default = "default_general_window")]
    pub general_window_seconds: u64,
    #[serde(default = "default_login_limit")]
    pub login_limit: u64,
    #[serde(default = "default_login_window")]
    pub login_window_seconds: u64,
    #[serde(default = "default_whitelist")]
    pub whitelist: HashSet<String>,
    #[serde(default = "default_login_path_prefix")]
    pub login_path_prefix: String,
    #[serde(default)]
    pub window_mode: WindowMode,
    #[serde(default = "default_true")]
    pub fail_open: bool,
    #[serde(default)]
    pub locale: Locale,
}

fn default_true() -> bool { true }
fn default_general_limit() -> u64 { 100 }
fn default_general_window() -> u64 { 60 }
fn default_login_limit() -> u64 { 5 }
fn default_login_window() -> u64 { 300 }
fn default_login_path_prefix() -> String { "/login/".to_string() }

fn default_whitelist() -> HashSet<String> {
    HashSet::from(["127.0.0.1".to_string()])
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            general_limit: default_general_limit(),
            general_window_seconds: default_general_window(),
            login_limit: default_login_limit(),
            login_window_seconds: default_login_window(),
            whitelist: default_whitelist(),
            login_path_prefix: default_login_path_prefix(),
            window_mode: WindowMode::default(),
            fail_open: true,
            locale: Locale::default(),
        }
    }
}

impl RateLimitSettings {
    /// Loads settings from a standalone TOML file at `path`.
    ///
    /// # Errors
    ///
    /// - [`GuardError::NotFound`] if the file does not exist.
    /// - [`GuardError::ConfigParse`] if the TOML is malformed.
    /// - [`GuardError::Config`] if the values fail [`validate`](Self::validate).
    pub fn load(path: &Path) -> GuardResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => GuardError::NotFound(path.to_path_buf()),
            _ => GuardError::Io(e),
        })?;
        let settings: Self =
            toml::from_str(&content).map_err(|e| GuardError::ConfigParse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects settings the limiter cannot honour.
    ///
    /// A limit of zero is allowed and blocks the scope entirely; a zero-length
    /// window is not, since it would make every counter expire on creation.
    pub fn validate(&self) -> GuardResult<()> {
        if self.general_window_seconds == 0 {
            return Err(GuardError::Config(
                "general_window_seconds must be greater than zero".to_string(),
            ));
        }
        if self.login_window_seconds == 0 {
            return Err(GuardError::Config(
                "login_window_seconds must be greater than zero".to_string(),
            ));
        }
        if self.login_path_prefix.is_empty() {
            return Err(GuardError::Config(
                "login_path_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn general_window(&self) -> Duration {
        Duration::from_secs(self.general_window_seconds)
    }

    pub fn login_window(&self) -> Duration {
        Duration::from_secs(self.login_window_seconds)
    }

    /// Login window in whole minutes, rounded down, for user-facing messages.
    pub fn login_window_minutes(&self) -> u64 {
        self.login_window_seconds / 60
    }
}
