//! OAuth 2.0 login and access control for dashgate
//!
//! - **pkce**: provider client implementing Authorization Code + PKCE
//! - **session**: typed session record stored in an encrypted cookie
//! - **gate**: allow/redirect/reject decisions and the `/auth/*` handlers

pub mod gate;
pub mod pkce;
pub mod session;

pub use gate::{Decision, build_login_url, decide, validate_redirect_target};
pub use pkce::{
    ConfidentialProvider, Identity, PkceProvider, Provider, ProviderEndpoints, TokenSet,
    code_challenge, code_verifier,
};
pub use session::{AuthSession, CookieSettings, GatewaySession, SessionCodec};

use crate::Result;
use crate::config::Config;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Key, PrivateCookieJar};
use sha2::{Digest, Sha512};

/// Everything the auth handlers and the gate need, built once at startup
#[derive(Clone)]
pub struct AuthContext {
    pub provider: Provider,
    pub cookie_key: Key,
    pub cookie: CookieSettings,
    pub base_domain: String,
    /// Send anonymous users to login instead of answering 401
    pub redirect_to_login: bool,
}

impl AuthContext {
    pub fn new(
        provider: Provider,
        session_secret: &str,
        cookie: CookieSettings,
        base_domain: &str,
        redirect_to_login: bool,
    ) -> Self {
        // Key wants 64 bytes of material
        let cookie_key = Key::from(Sha512::digest(session_secret.as_bytes()).as_slice());
        Self {
            provider,
            cookie_key,
            cookie,
            base_domain: base_domain.to_string(),
            redirect_to_login,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = Provider::from_config(&config.oauth, config.http_client.client_timeout)?;
        tracing::info!(
            provider = provider.name(),
            domain = %config.oauth.domain,
            "OAuth login enabled"
        );

        let cookie = CookieSettings {
            domain: config.cookie_domain().to_string(),
            secure: config.oauth.secure_cookies,
            max_age: config.oauth.session_max_age,
        };

        Ok(Self::new(
            provider,
            &config.oauth.session_secret,
            cookie,
            &config.base_domain,
            config.oauth.redirect_to_login,
        ))
    }

    /// Cookie jar for one request
    pub fn jar(&self, headers: &HeaderMap) -> PrivateCookieJar {
        PrivateCookieJar::from_headers(headers, self.cookie_key.clone())
    }

    /// Scheme-relative site root on the base domain
    pub fn site_root(&self) -> String {
        format!("//{}/", self.base_domain)
    }
}
