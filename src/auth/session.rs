//! Login state carried in the browser's session cookie
//!
//! The cookie is encrypted and authenticated by [`PrivateCookieJar`]; this
//! module only decides which typed fields go in it and when they change.

use crate::auth::pkce::Identity;
use crate::constants::SESSION_COOKIE_NAME;
use crate::{GatewayError, Result};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// State of one login attempt, from BeginAuth through the callback
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub authorization_url: String,
    pub code_verifier: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    pub fn new(authorization_url: String, code_verifier: String) -> Self {
        Self {
            authorization_url,
            code_verifier,
            ..Default::default()
        }
    }

    /// Authorization URL issued for this attempt
    pub fn auth_url(&self) -> Result<&str> {
        if self.authorization_url.is_empty() {
            return Err(GatewayError::session("authorization URL not set"));
        }
        Ok(&self.authorization_url)
    }

    /// `state` parameter embedded in the authorization URL
    pub fn state(&self) -> Option<String> {
        let url = url::Url::parse(&self.authorization_url).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
    }

    /// Store tokens returned by the exchange
    pub fn authorize(&mut self, tokens: crate::auth::pkce::TokenSet) {
        self.access_token = tokens.access_token;
        self.refresh_token = tokens.refresh_token;
        self.expires_at = tokens.expires_at;
    }
}

/// Marshals an [`AuthSession`] to and from an opaque string
pub struct SessionCodec;

impl SessionCodec {
    pub fn marshal(session: &AuthSession) -> Result<String> {
        Ok(serde_json::to_string(session)?)
    }

    pub fn unmarshal(data: &str) -> Result<AuthSession> {
        serde_json::from_str(data)
            .map_err(|e| GatewayError::session(format!("malformed auth session: {}", e)))
    }
}

/// Everything the gateway keeps in the session cookie
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySession {
    /// Marshalled in-flight login, present only between login and callback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user_email: Option<String>,

    /// Where to send the browser once login completes, consumed once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_redirect: Option<String>,
}

impl GatewaySession {
    /// Read the session from the jar
    ///
    /// A missing or undecodable cookie yields an empty session.
    pub fn load(jar: &PrivateCookieJar) -> Self {
        let Some(cookie) = jar.get(SESSION_COOKIE_NAME) else {
            return Self::default();
        };

        match serde_json::from_str(cookie.value()) {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!("discarding unreadable session cookie: {}", e);
                Self::default()
            }
        }
    }

    /// Write the session into the jar
    pub fn store(&self, jar: PrivateCookieJar, settings: &CookieSettings) -> Result<PrivateCookieJar> {
        let value = serde_json::to_string(self)?;
        Ok(jar.add(settings.cookie(value)))
    }

    /// Expire the session cookie immediately
    pub fn clear(jar: PrivateCookieJar, settings: &CookieSettings) -> PrivateCookieJar {
        let mut cookie = settings.cookie(String::new());
        cookie.make_removal();
        jar.add(cookie)
    }

    /// Login attempt in progress, if any
    pub fn auth_session(&self) -> Result<AuthSession> {
        match self.auth.as_deref() {
            Some(data) => SessionCodec::unmarshal(data),
            None => Err(GatewayError::NoAuthInProgress),
        }
    }

    pub fn set_auth_session(&mut self, session: &AuthSession) -> Result<()> {
        self.auth = Some(SessionCodec::marshal(session)?);
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_user_id
            .as_deref()
            .is_some_and(|id| !id.is_empty())
    }

    /// Read and delete the pending redirect
    pub fn take_pending_redirect(&mut self) -> Option<String> {
        self.pending_redirect.take()
    }

    /// Record the signed-in user and drop the finished login attempt
    pub fn sign_in(&mut self, identity: &Identity) {
        self.current_user_id = Some(identity.user_id.clone());
        self.current_user_email = Some(identity.email.clone());
        self.auth = None;
    }
}

/// Attributes of the session cookie
#[derive(Debug, Clone)]
pub struct CookieSettings {
    /// Base domain without port, so the cookie is shared with tenant subdomains
    pub domain: String,
    pub secure: bool,
    pub max_age: Duration,
}

impl CookieSettings {
    fn cookie(&self, value: String) -> Cookie<'static> {
        let max_age = i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX);
        Cookie::build((SESSION_COOKIE_NAME, value))
            .domain(self.domain.clone())
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(time::Duration::seconds(max_age))
            .build()
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
