//! Configuration management for dashgate
//!
//! Process settings come from `DASHGATE_*` environment variables (a `.env`
//! file is loaded first by the binary). The tenant table comes from a YAML
//! file named by `DASHGATE_CONFIG_FILE`.

use crate::constants::*;
use crate::model::{DashboardEntry, TenantDashboard};
use crate::{GatewayError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Complete gateway configuration
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Address to bind to
    pub listen: String,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Emit JSON log lines
    pub log_json: bool,

    /// Shared parent domain of every tenant, may include a port
    pub base_domain: String,

    /// YAML tenant table
    pub config_file: String,

    /// Bucket used by tenants that don't name one
    pub default_bucket: String,

    /// Object store settings
    pub storage: StorageConfig,

    /// Outbound HTTP settings
    pub http_client: HttpClientConfig,

    /// OAuth and session settings
    pub oauth: OAuthConfig,
}

/// Object store configuration
#[derive(Debug, Clone, Serialize)]
pub struct StorageConfig {
    /// Virtual-host style host, objects live at `https://<bucket>.<host>/<key>`
    pub host: String,

    /// Path-style endpoint override, objects live at `<endpoint>/<bucket>/<key>`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Bearer token attached to every object-store request
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Serialize)]
pub struct HttpClientConfig {
    /// Deadline for one upstream object fetch, body included
    pub proxy_timeout: Duration,

    /// Deadline for OAuth token and profile calls
    pub client_timeout: Duration,

    /// How long pooled connections may sit idle
    pub idle_conn_timeout: Duration,

    /// Idle pooled connections kept per host
    pub max_idle_conns: usize,
}

/// OAuth provider and session cookie configuration
#[derive(Debug, Clone, Serialize)]
pub struct OAuthConfig {
    /// Enable the auth gate and `/auth/*` routes
    pub enabled: bool,

    pub client_id: String,

    /// Confidential client secret; empty selects the public PKCE provider
    #[serde(skip_serializing)]
    pub client_secret: String,

    pub redirect_uri: String,

    /// Provider domain, endpoints are derived from it
    pub domain: String,

    pub scopes: Vec<String>,

    /// Secret the cookie encryption key is derived from
    #[serde(skip_serializing)]
    pub session_secret: String,

    /// Set the `Secure` flag on the session cookie
    pub secure_cookies: bool,

    /// Session cookie lifetime
    pub session_max_age: Duration,

    /// Redirect anonymous users to login instead of answering 401
    pub redirect_to_login: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
            base_domain: DEFAULT_BASE_DOMAIN.to_string(),
            config_file: DEFAULT_CONFIG_FILE.to_string(),
            default_bucket: String::new(),
            storage: StorageConfig {
                host: DEFAULT_STORAGE_HOST.to_string(),
                endpoint: None,
                token: None,
            },
            http_client: HttpClientConfig {
                proxy_timeout: Duration::from_secs(10),
                client_timeout: Duration::from_secs(10),
                idle_conn_timeout: Duration::from_secs(120),
                max_idle_conns: 10,
            },
            oauth: OAuthConfig {
                enabled: false,
                client_id: String::new(),
                client_secret: String::new(),
                redirect_uri: String::new(),
                domain: String::new(),
                scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
                session_secret: String::new(),
                secure_cookies: false,
                session_max_age: Duration::from_secs(30 * 24 * 60 * 60),
                redirect_to_login: false,
            },
        }
    }
}

impl Config {
    /// Load configuration from the process environment and validate it
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Keys are passed with the `DASHGATE_` prefix applied. Unset or empty
    /// variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
        };

        let mut config = Config::default();

        if let Some(v) = get("LISTEN") {
            config.listen = v;
        }
        if let Some(v) = get("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = get("LOG_JSON") {
            config.log_json = parse_bool("LOG_JSON", &v)?;
        }
        if let Some(v) = get("BASE_DOMAIN") {
            config.base_domain = v.to_ascii_lowercase();
        }
        if let Some(v) = get("CONFIG_FILE") {
            config.config_file = v;
        }
        if let Some(v) = get("DEFAULT_BUCKET") {
            config.default_bucket = v;
        }

        if let Some(v) = get("STORAGE_HOST") {
            config.storage.host = v;
        }
        config.storage.endpoint = get("STORAGE_ENDPOINT").map(|v| v.trim_end_matches('/').to_string());
        config.storage.token = get("STORAGE_TOKEN");

        if let Some(v) = get("PROXY_TIMEOUT") {
            config.http_client.proxy_timeout = parse_duration(&v)?;
        }
        if let Some(v) = get("CLIENT_TIMEOUT") {
            config.http_client.client_timeout = parse_duration(&v)?;
        }
        if let Some(v) = get("IDLE_CONN_TIMEOUT") {
            config.http_client.idle_conn_timeout = parse_duration(&v)?;
        }
        if let Some(v) = get("MAX_IDLE_CONNS") {
            config.http_client.max_idle_conns = v.parse().map_err(|e| {
                GatewayError::config(format!("Invalid MAX_IDLE_CONNS '{}': {}", v, e))
            })?;
        }

        if let Some(v) = get("OAUTH_ENABLED") {
            config.oauth.enabled = parse_bool("OAUTH_ENABLED", &v)?;
        }
        if let Some(v) = get("OAUTH_CLIENT_ID") {
            config.oauth.client_id = v;
        }
        if let Some(v) = get("OAUTH_CLIENT_SECRET") {
            config.oauth.client_secret = v;
        }
        if let Some(v) = get("OAUTH_REDIRECT_URI") {
            config.oauth.redirect_uri = v;
        }
        if let Some(v) = get("OAUTH_DOMAIN") {
            config.oauth.domain = v;
        }
        if let Some(v) = get("OAUTH_SCOPES") {
            config.oauth.scopes = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = get("SESSION_SECRET") {
            config.oauth.session_secret = v;
        }
        if let Some(v) = get("SECURE_COOKIES") {
            config.oauth.secure_cookies = parse_bool("SECURE_COOKIES", &v)?;
        }
        if let Some(v) = get("SESSION_MAX_AGE") {
            config.oauth.session_max_age = parse_duration(&v)?;
        }
        if let Some(v) = get("REDIRECT_TO_LOGIN") {
            config.oauth.redirect_to_login = parse_bool("REDIRECT_TO_LOGIN", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_domain.is_empty() {
            return Err(GatewayError::config("base domain is required"));
        }

        if self.listen.is_empty() {
            return Err(GatewayError::config("listen address cannot be empty"));
        }

        if self.storage.host.is_empty() && self.storage.endpoint.is_none() {
            return Err(GatewayError::config(
                "either a storage host or a storage endpoint is required",
            ));
        }

        if let Some(ref endpoint) = self.storage.endpoint
            && !endpoint.starts_with("http://")
            && !endpoint.starts_with("https://")
        {
            return Err(GatewayError::config(format!(
                "Invalid storage endpoint '{}': must start with http:// or https://",
                endpoint
            )));
        }

        if self.http_client.proxy_timeout.is_zero() || self.http_client.client_timeout.is_zero() {
            return Err(GatewayError::config("timeouts must be greater than 0"));
        }

        if self.oauth.enabled {
            if self.oauth.client_id.is_empty() {
                return Err(GatewayError::config("OAuth client id is required"));
            }
            if self.oauth.redirect_uri.is_empty() {
                return Err(GatewayError::config("OAuth redirect URI is required"));
            }
            if self.oauth.domain.is_empty() {
                return Err(GatewayError::config("OAuth domain is required"));
            }
            if self.oauth.session_secret.len() < MIN_SESSION_SECRET_LEN {
                return Err(GatewayError::config(format!(
                    "session secret must be at least {} bytes",
                    MIN_SESSION_SECRET_LEN
                )));
            }
        }

        Ok(())
    }

    /// Base domain without any port, used as the cookie domain
    pub fn cookie_domain(&self) -> &str {
        self.base_domain
            .split(':')
            .next()
            .unwrap_or(&self.base_domain)
    }
}

/// Load the tenant table from a YAML file
///
/// The file is a map of slug to dashboard entry. The result is sorted by
/// slug so the landing page and mount logs have a stable order.
pub fn load_dashboards<P: AsRef<Path>>(path: P, config: &Config) -> Result<Vec<TenantDashboard>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        GatewayError::config(format!(
            "Failed to read tenant table {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_dashboards(&content, config)
}

/// Parse a YAML tenant table
pub fn parse_dashboards(content: &str, config: &Config) -> Result<Vec<TenantDashboard>> {
    let entries: BTreeMap<String, DashboardEntry> = serde_yaml::from_str(content)
        .map_err(|e| GatewayError::config(format!("Failed to parse tenant table: {}", e)))?;

    let mut dashboards = Vec::with_capacity(entries.len());
    for (slug, entry) in entries {
        if !is_valid_slug(&slug) {
            return Err(GatewayError::config(format!(
                "Invalid dashboard slug '{}': must be a single DNS label",
                slug
            )));
        }

        let dashboard = TenantDashboard::from_entry(&slug, entry, &config.default_bucket);
        if dashboard.bucket.is_empty() {
            return Err(GatewayError::config(format!(
                "Dashboard '{}' has no bucket and no default bucket is configured",
                slug
            )));
        }
        dashboards.push(dashboard);
    }

    Ok(dashboards)
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 63
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(GatewayError::config(format!(
            "Invalid boolean for {}: '{}'",
            name, value
        ))),
    }
}

/// Parse durations like `10s`, `500ms`, `2m`, `1h`, `30d`
///
/// A bare number is read as seconds.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);

    let amount: u64 = number
        .parse()
        .map_err(|_| GatewayError::config(format!("Invalid duration '{}'", value)))?;

    let (amount, millis) = match unit {
        "ms" => (Some(amount), true),
        "" | "s" => (Some(amount), false),
        "m" => (amount.checked_mul(60), false),
        "h" => (amount.checked_mul(60 * 60), false),
        "d" => (amount.checked_mul(24 * 60 * 60), false),
        _ => {
            return Err(GatewayError::config(format!(
                "Invalid duration unit in '{}'",
                value
            )));
        }
    };
    let amount = amount
        .ok_or_else(|| GatewayError::config(format!("Duration '{}' is out of range", value)))?;
    let duration = if millis {
        Duration::from_millis(amount)
    } else {
        Duration::from_secs(amount)
    };

    Ok(duration)
}
