//! Access log records and user-agent classification.

use std::fmt;
use std::time::Duration;

/// Authentication status of a request, as seen by the access log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Visitor {
    User(String),
    #[default]
    Guest,
}

impl Visitor {
    pub fn kind(&self) -> &'static str {
        match self {
            Visitor::User(_) => "User",
            Visitor::Guest => "Guest",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Visitor::User(name) => name,
            Visitor::Guest => "Anonymous",
        }
    }
}

/// Coarse device, OS and browser guessed from a `User-Agent` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device: &'static str,
    pub os: &'static str,
    pub browser: &'static str,
}

impl DeviceInfo {
    /// First matching rule wins in each category, so e.g. Android phones
    /// report `Linux` and Edge (which also says "chrome") reports `Edge`.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_lowercase();
        let has = |needle: &str| ua.contains(needle);

        let device = if has("mobile") || has("android") {
            "Mobile"
        } else if has("tablet") || has("ipad") {
            "Tablet"
        } else {
            "Desktop"
        };

        let os = if has("windows") {
            "Windows"
        } else if has("mac") {
            "macOS"
        } else if has("linux") {
            "Linux"
        } else if has("android") {
            "Android"
        } else if has("iphone") || has("ipad") {
            "iOS"
        } else {
            "Unknown"
        };

        let browser = if has("chrome") && !has("edg") {
            "Chrome"
        } else if has("edg") {
            "Edge"
        } else if has("firefox") {
            "Firefox"
        } else if has("safari") && !has("chrome") {
            "Safari"
        } else {
            "Unknown"
        };

        Self { device, os, browser }
    }
}

/// Whether `path` should produce an access log line.
pub fn should_log(path: &str, exclude_prefixes: &[String]) -> bool {
    !exclude_prefixes
        .iter()
        .any(|prefix| path.starts_with(prefix.as_str()))
}

/// One access log line.
#[derive(Debug, Clone)]
pub struct AccessRecord {
    pub ip: String,
    pub visitor: Visitor,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub duration: Duration,
    pub device: DeviceInfo,
    pub referer: String,
    pub user_agent: String,
}

impl AccessRecord {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

impl fmt::Display for AccessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {}: {} | {} {} | Status: {} | Time: {:.3}s | {}/{}/{} | Referer: {}",
            self.ip,
            self.visitor.kind(),
            self.visitor.name(),
            self.method,
            self.path,
            self.status,
            self.duration.as_secs_f64(),
            self.device.device,
            self.device.os,
            self.device.browser,
            self.referer,
        )
    }
}
