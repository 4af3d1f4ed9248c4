//! Server configuration.
//!
//! Loaded from a TOML file (`signet.toml` by default) with environment
//! variable overrides for the values that differ between deployments:
//! `SIGNET_ISSUER`, `SIGNET_CLIENT_ID`, `SIGNET_CLIENT_SECRET` and
//! `SIGNET_REDIRECT_URI`.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {path}: {message}")]
    Read {
        /// Path that was attempted.
        path: String,
        /// Underlying I/O error.
        message: String,
    },

    /// The configuration file is not valid TOML.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// A value failed validation.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// HTTP listener settings.
    pub server: ListenConfig,

    /// Identity Provider settings.
    pub provider: ProviderSection,

    /// Flow and session settings.
    pub auth: AuthSection,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListenConfig {
    /// Bind address.
    pub host: String,

    /// Bind port.
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ListenConfig {
    /// The socket address string to bind.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Identity Provider settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSection {
    /// Stable provider identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// OIDC issuer URL.
    pub issuer: String,

    /// OAuth client identifier.
    pub client_id: String,

    /// OAuth client secret (absent for public clients).
    pub client_secret: Option<String>,

    /// Requested scopes.
    pub scopes: Vec<String>,

    /// Ask the provider to always show the account chooser.
    pub prompt_select_account: bool,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            id: "google".to_string(),
            name: "Google".to_string(),
            issuer: "https://accounts.google.com".to_string(),
            client_id: String::new(),
            client_secret: None,
            scopes: vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
            prompt_select_account: true,
        }
    }
}

/// Flow and session settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthSection {
    /// Redirect target registered with the provider.
    pub redirect_uri: String,

    /// How long a started flow waits for its callback.
    #[serde(with = "humantime_serde")]
    pub request_ttl: Duration,

    /// Upper bound on session lifetime.
    #[serde(with = "humantime_serde")]
    pub session_ttl: Duration,

    /// Clock-skew tolerance for token validation.
    #[serde(with = "humantime_serde")]
    pub clock_skew: Duration,

    /// Allow plain-HTTP provider endpoints. Local development only.
    pub allow_http: bool,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            redirect_uri: "http://localhost:8080/auth/callback".to_string(),
            request_ttl: Duration::from_secs(600),
            session_ttl: Duration::from_secs(8 * 3600),
            clock_skew: Duration::from_secs(60),
            allow_http: false,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level or filter directive (overridden by `RUST_LOG`).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Validates cross-field constraints and URL shapes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the issuer or redirect URI is
    /// not a valid URL, or the client id is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.provider.issuer)
            .map_err(|e| ConfigError::Invalid(format!("provider.issuer: {e}")))?;
        Url::parse(&self.auth.redirect_uri)
            .map_err(|e| ConfigError::Invalid(format!("auth.redirect_uri: {e}")))?;

        if self.provider.client_id.is_empty() {
            return Err(ConfigError::Invalid(
                "provider.client_id must be set (SIGNET_CLIENT_ID)".to_string(),
            ));
        }

        if !self.provider.scopes.iter().any(|s| s == "openid") {
            return Err(ConfigError::Invalid(
                "provider.scopes must include \"openid\"".to_string(),
            ));
        }

        Ok(())
    }

    /// The issuer as a URL. Call [`validate`](Self::validate) first.
    #[must_use]
    pub fn issuer_url(&self) -> Option<Url> {
        Url::parse(&self.provider.issuer).ok()
    }

    /// The redirect target as a URL. Call [`validate`](Self::validate) first.
    #[must_use]
    pub fn redirect_url(&self) -> Option<Url> {
        Url::parse(&self.auth.redirect_uri).ok()
    }
}

/// Loads configuration from a file and applies environment overrides.
///
/// A missing file at the default path falls back to defaults; an explicitly
/// requested path must exist.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed, or the resulting
/// configuration fails validation.
pub fn load_config(path: &Path, explicit: bool) -> Result<ServerConfig, ConfigError> {
    let mut config = match std::fs::read_to_string(path) {
        Ok(raw) => toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            ServerConfig::default()
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            });
        }
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Applies environment overrides via a lookup function.
///
/// Separated from process environment access so override behavior is
/// testable.
pub fn apply_env_overrides(
    config: &mut ServerConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(issuer) = lookup("SIGNET_ISSUER") {
        config.provider.issuer = issuer;
    }
    if let Some(client_id) = lookup("SIGNET_CLIENT_ID") {
        config.provider.client_id = client_id;
    }
    if let Some(secret) = lookup("SIGNET_CLIENT_SECRET") {
        config.provider.client_secret = Some(secret);
    }
    if let Some(redirect) = lookup("SIGNET_REDIRECT_URI") {
        config.auth.redirect_uri = redirect;
    }
}
