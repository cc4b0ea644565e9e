//! Constants used throughout dashgate
//!
//! Cookie names, auth endpoint paths, environment keys and defaults.

// ============================================================================
// SESSION
// ============================================================================

/// Name of the encrypted session cookie
pub const SESSION_COOKIE_NAME: &str = "_dashgate_session";

/// Minimum length of the session secret used to derive the cookie key
pub const MIN_SESSION_SECRET_LEN: usize = 32;

// ============================================================================
// AUTH ROUTES
// ============================================================================

/// Login entry point
pub const AUTH_LOGIN_PATH: &str = "/auth/login";

/// Provider redirect target
pub const AUTH_CALLBACK_PATH: &str = "/auth/callback";

/// Logout endpoint
pub const AUTH_LOGOUT_PATH: &str = "/auth/logout";

/// Prefix shared by all auth routes
pub const AUTH_PREFIX: &str = "/auth/";

/// Query parameter carrying the post-login destination
pub const REDIRECT_TO_PARAM: &str = "redirect_to";

// ============================================================================
// OAUTH PROVIDER
// ============================================================================

/// Authorization endpoint path on the provider domain
pub const PROVIDER_AUTH_PATH: &str = "/authorize";

/// Token endpoint path on the provider domain
pub const PROVIDER_TOKEN_PATH: &str = "/oauth/token";

/// Profile endpoint path on the provider domain
pub const PROVIDER_PROFILE_PATH: &str = "/userinfo";

/// Scopes requested when none are configured
pub const DEFAULT_SCOPES: [&str; 3] = ["openid", "profile", "email"];

/// PKCE challenge method
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// Number of random bytes behind a code verifier
pub const CODE_VERIFIER_BYTES: usize = 32;

// ============================================================================
// OBJECT STORE
// ============================================================================

/// Default virtual-host object store
pub const DEFAULT_STORAGE_HOST: &str = "storage.googleapis.com";

/// Document served for directory paths and SPA fallback
pub const INDEX_DOCUMENT: &str = "index.html";

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Prefix of all environment variables read by [`crate::config::Config`]
pub const ENV_PREFIX: &str = "DASHGATE_";

/// Default bind address
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";

/// Default base domain
pub const DEFAULT_BASE_DOMAIN: &str = "localhost:8080";

/// Default tenant table file
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "debug";
