//! Environment-driven configuration
//!
//! Every setting has a `PORTAL_*` name; a few still accept their pre-rename
//! names. [`PortalConfig::from_env`] resolves everything the server needs.

use std::path::PathBuf;

/// Default data directory name (under the home directory)
const DATA_DIR: &str = ".fritz-portal";

/// Look up `name`, then the legacy `legacy` name.
///
/// Blank values count as unset. A hit on the legacy name logs a deprecation
/// warning.
///
/// ```
/// use fritz_portal::config::get_env_with_fallback;
///
/// let port = get_env_with_fallback("PORTAL_PORT", "PORT");
/// ```
pub fn get_env_with_fallback(name: &str, legacy: &str) -> Option<String> {
    get_env(name).or_else(|| {
        let value = get_env(legacy)?;
        tracing::warn!("{} is deprecated, set {} instead", legacy, name);
        Some(value)
    })
}

/// [`get_env_with_fallback`] with a default
pub fn get_env_with_fallback_or(name: &str, legacy: &str, default: &str) -> String {
    get_env_with_fallback(name, legacy).unwrap_or_else(|| default.to_owned())
}

/// [`get_env_with_fallback`] parsed into `T`; unparsable values yield `default`
pub fn get_env_with_fallback_parse<T: std::str::FromStr>(name: &str, legacy: &str, default: T) -> T {
    match get_env_with_fallback(name, legacy).map(|raw| raw.trim().parse::<T>()) {
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            tracing::warn!("Ignoring unparsable value for {}", name);
            default
        }
        None => default,
    }
}

/// Non-blank environment variable
fn get_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a boolean flag (`1`, `true`, `yes`, `on`)
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Resolve the data directory
///
/// `PORTAL_DATA_DIR` if set, otherwise `~/.fritz-portal`.
pub fn data_dir() -> Option<PathBuf> {
    if let Some(dir) = get_env("PORTAL_DATA_DIR") {
        return Some(PathBuf::from(dir));
    }
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok()
        .map(|home| PathBuf::from(home).join(DATA_DIR))
}

/// Server configuration resolved from the environment
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// sqlx database URL
    pub database_url: String,
    /// Session token lifetime in hours
    pub session_ttl_hours: i64,
    /// Whether to mark the session cookie `Secure`
    pub secure_cookies: bool,
    /// Resend API key (notifications are only logged when unset)
    pub resend_api_key: Option<String>,
    /// Sender address for notifications
    pub notify_from: String,
    /// Staff address used when no staff profile has an email
    pub notify_fallback_email: String,
    /// Public base URL used in notification links
    pub site_url: String,
}

impl PortalConfig {
    /// Default sender address
    pub const DEFAULT_NOTIFY_FROM: &'static str = "Fritz Automation <notifications@fritzautomation.dev>";
    /// Default staff fallback address
    pub const DEFAULT_FALLBACK_EMAIL: &'static str = "forward@fritzautomation.dev";
    /// Default public site URL
    pub const DEFAULT_SITE_URL: &'static str = "https://fritzautomation.dev";
    /// Default session lifetime in hours
    pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
    /// Longest accepted session lifetime (one year)
    pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let host = get_env_with_fallback_or("PORTAL_HOST", "HOST", "0.0.0.0");
        let port = get_env_with_fallback_parse("PORTAL_PORT", "PORT", 8080u16);
        let database_url = get_env_with_fallback("PORTAL_DATABASE_URL", "DATABASE_URL")
            .unwrap_or_else(default_database_url);
        let session_ttl_hours = get_env("PORTAL_SESSION_TTL_HOURS")
            .map(|v| parse_session_ttl_hours(&v))
            .unwrap_or(Self::DEFAULT_SESSION_TTL_HOURS);
        let secure_cookies = get_env("PORTAL_SECURE_COOKIES")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        let resend_api_key = get_env_with_fallback("PORTAL_RESEND_API_KEY", "RESEND_API_KEY")
            .filter(|key| !key.trim().is_empty());
        let notify_from =
            get_env("PORTAL_NOTIFY_FROM").unwrap_or_else(|| Self::DEFAULT_NOTIFY_FROM.to_string());
        let notify_fallback_email = get_env("PORTAL_NOTIFY_FALLBACK_EMAIL")
            .unwrap_or_else(|| Self::DEFAULT_FALLBACK_EMAIL.to_string());
        let site_url = get_env("PORTAL_SITE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| Self::DEFAULT_SITE_URL.to_string());

        Self {
            host,
            port,
            database_url,
            session_ttl_hours,
            secure_cookies,
            resend_api_key,
            notify_from,
            notify_fallback_email,
            site_url,
        }
    }

    /// Address to bind the listener to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse `PORTAL_SESSION_TTL_HOURS`, capping it at one year.
///
/// Non-numeric or non-positive values fall back to the default.
fn parse_session_ttl_hours(value: &str) -> i64 {
    match value.trim().parse::<i64>() {
        Ok(hours) if hours > PortalConfig::MAX_SESSION_TTL_HOURS => {
            tracing::warn!(
                "PORTAL_SESSION_TTL_HOURS={} exceeds the maximum, using {}",
                hours,
                PortalConfig::MAX_SESSION_TTL_HOURS
            );
            PortalConfig::MAX_SESSION_TTL_HOURS
        }
        Ok(hours) if hours > 0 => hours,
        _ => {
            tracing::warn!(
                "Invalid PORTAL_SESSION_TTL_HOURS '{}', using {}",
                value,
                PortalConfig::DEFAULT_SESSION_TTL_HOURS
            );
            PortalConfig::DEFAULT_SESSION_TTL_HOURS
        }
    }
}

fn default_database_url() -> String {
    match data_dir() {
        Some(dir) => format!("sqlite:{}", dir.join("portal.db").display()),
        None => "sqlite:portal.db".to_string(),
    }
}
