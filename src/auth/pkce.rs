//! OAuth 2.0 Authorization Code + PKCE client
//!
//! Begins and completes logins against a single identity provider and reads
//! the signed-in user's profile. Two provider kinds exist: a public client
//! that relies on PKCE alone, and a confidential client that additionally
//! authenticates with a client secret. Which one runs is decided once from
//! configuration.

use crate::auth::session::AuthSession;
use crate::config::OAuthConfig;
use crate::constants::{
    CODE_VERIFIER_BYTES, DEFAULT_SCOPES, PROVIDER_AUTH_PATH, PROVIDER_PROFILE_PATH,
    PROVIDER_TOKEN_PATH,
};
use crate::{GatewayError, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeDelta, Utc};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse,
    TokenUrl, basic::BasicClient,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// oauth2 client with authorization and token endpoints configured
type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Generate a PKCE code verifier from 32 cryptographically random bytes
pub fn code_verifier() -> String {
    let mut bytes = [0u8; CODE_VERIFIER_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    encode_verifier(&bytes)
}

/// Encode raw verifier bytes as URL-safe base64 without padding
pub fn encode_verifier(bytes: &[u8; CODE_VERIFIER_BYTES]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// S256 challenge: `BASE64URL-ENCODE(SHA256(ASCII(code_verifier)))`
pub fn code_challenge(verifier: &str) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Provider endpoint set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub profile_url: String,
}

impl ProviderEndpoints {
    /// Standard endpoints hosted on a provider domain
    pub fn from_domain(domain: &str) -> Self {
        let base = format!("https://{}", domain.trim_end_matches('/'));
        Self {
            auth_url: format!("{}{}", base, PROVIDER_AUTH_PATH),
            token_url: format!("{}{}", base, PROVIDER_TOKEN_PATH),
            profile_url: format!("{}{}", base, PROVIDER_PROFILE_PATH),
        }
    }
}

/// Tokens issued by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Signed-in user as reported by the provider's profile endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub nickname: String,
    /// Full profile payload, provider-specific fields included
    pub raw: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserInfo {
    email: String,
    name: String,
    nickname: String,
    sub: String,
}

impl Identity {
    /// Parse a profile response body returned by `provider`
    pub fn from_profile(provider: &str, body: &[u8]) -> Result<Self> {
        let invalid = |reason: String| GatewayError::ProfileFetchFailed {
            provider: provider.to_string(),
            reason,
        };

        let raw: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(body).map_err(|e| invalid(e.to_string()))?;
        let info: UserInfo = serde_json::from_value(serde_json::Value::Object(raw.clone()))
            .map_err(|e| invalid(e.to_string()))?;

        if info.sub.is_empty() {
            return Err(invalid("profile response has no subject".to_string()));
        }

        Ok(Self {
            user_id: info.sub,
            email: info.email,
            name: info.name,
            nickname: info.nickname,
            raw,
        })
    }
}

/// Public OAuth client protected by PKCE
#[derive(Clone)]
pub struct PkceProvider {
    client: ConfiguredClient,
    client_id: String,
    scopes: Vec<String>,
    profile_url: String,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for PkceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceProvider")
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("profile_url", &self.profile_url)
            .finish()
    }
}

impl PkceProvider {
    /// Create a provider, validating every endpoint up front
    pub fn new(
        client_id: &str,
        redirect_uri: &str,
        endpoints: ProviderEndpoints,
        scopes: &[String],
        timeout: Duration,
    ) -> Result<Self> {
        if client_id.is_empty() {
            return Err(GatewayError::config("OAuth client id is required"));
        }
        if redirect_uri.is_empty() {
            return Err(GatewayError::config("OAuth redirect URI is required"));
        }
        url::Url::parse(&endpoints.profile_url)
            .map_err(|e| GatewayError::config(format!("Invalid profile URL: {}", e)))?;

        let client = BasicClient::new(ClientId::new(client_id.to_string()))
            .set_auth_uri(
                AuthUrl::new(endpoints.auth_url)
                    .map_err(|e| GatewayError::config(format!("Invalid auth URL: {}", e)))?,
            )
            .set_token_uri(
                TokenUrl::new(endpoints.token_url)
                    .map_err(|e| GatewayError::config(format!("Invalid token URL: {}", e)))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(redirect_uri.to_string())
                    .map_err(|e| GatewayError::config(format!("Invalid redirect URI: {}", e)))?,
            );

        // Redirects stay disabled so an authorization code can't be bounced elsewhere
        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::config(format!("Failed to build OAuth HTTP client: {}", e)))?;

        let scopes = if scopes.is_empty() {
            DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
        } else {
            scopes.to_vec()
        };

        Ok(Self {
            client,
            client_id: client_id.to_string(),
            scopes,
            profile_url: endpoints.profile_url,
            http_client,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn profile_url(&self) -> &str {
        &self.profile_url
    }

    /// Start a login attempt
    ///
    /// Generates a fresh verifier and returns the session holding it along
    /// with the provider authorization URL carrying `state` and the S256
    /// challenge.
    pub fn begin_auth(&self, state: &str) -> AuthSession {
        let verifier = code_verifier();
        let challenge =
            PkceCodeChallenge::from_code_verifier_sha256(&PkceCodeVerifier::new(verifier.clone()));

        let state = state.to_string();
        let (auth_url, _csrf) = self
            .client
            .authorize_url(move || CsrfToken::new(state))
            .add_scopes(self.scopes.iter().map(|s| Scope::new(s.clone())))
            .set_pkce_challenge(challenge)
            .url();

        AuthSession::new(auth_url.to_string(), verifier)
    }

    /// Exchange an authorization code plus the session's verifier for tokens
    pub async fn complete_auth(&self, session: &AuthSession, code: &str) -> Result<TokenSet> {
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(session.code_verifier.clone()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| GatewayError::exchange(e.to_string()))?;

        let tokens = token_set(&token);
        check_valid(&tokens)?;

        tracing::debug!(client_id = %self.client_id, "exchanged authorization code");
        Ok(tokens)
    }

    /// Read the signed-in user's profile
    pub async fn fetch_user(&self, access_token: &str) -> Result<Identity> {
        self.fetch_user_as(access_token, "pkce").await
    }

    async fn fetch_user_as(&self, access_token: &str, provider: &str) -> Result<Identity> {
        if access_token.is_empty() {
            return Err(GatewayError::MissingToken {
                provider: provider.to_string(),
            });
        }

        let response = self
            .http_client
            .get(&self.profile_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| GatewayError::ProfileFetchFailed {
                provider: provider.to_string(),
                reason: format!("request failed: {}", e),
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(GatewayError::ProfileFetch {
                provider: provider.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::ProfileFetchFailed {
                provider: provider.to_string(),
                reason: format!("read failed: {}", e),
            })?;

        Identity::from_profile(provider, &body)
    }

    /// Exchange a refresh token for a fresh access token
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet> {
        let token = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| GatewayError::exchange(format!("Token refresh failed: {}", e)))?;

        let mut tokens = token_set(&token);
        // Providers may omit the refresh token when it is unchanged
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }
        check_valid(&tokens)?;
        Ok(tokens)
    }
}

/// Confidential OAuth client: PKCE plus a client secret on token requests
#[derive(Debug, Clone)]
pub struct ConfidentialProvider {
    inner: PkceProvider,
}

impl ConfidentialProvider {
    pub fn new(
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
        endpoints: ProviderEndpoints,
        scopes: &[String],
        timeout: Duration,
    ) -> Result<Self> {
        if client_secret.is_empty() {
            return Err(GatewayError::config("OAuth client secret is required"));
        }
        let mut inner = PkceProvider::new(client_id, redirect_uri, endpoints, scopes, timeout)?;
        inner.client = inner
            .client
            .set_client_secret(ClientSecret::new(client_secret.to_string()));
        Ok(Self { inner })
    }
}

/// The identity provider active for this deployment
#[derive(Debug, Clone)]
pub enum Provider {
    Pkce(PkceProvider),
    Confidential(ConfidentialProvider),
}

impl Provider {
    /// Select and construct the provider described by configuration
    ///
    /// A configured client secret selects the confidential client.
    pub fn from_config(config: &OAuthConfig, timeout: Duration) -> Result<Self> {
        if config.domain.is_empty() {
            return Err(GatewayError::config("OAuth domain is required"));
        }
        let endpoints = ProviderEndpoints::from_domain(&config.domain);

        if config.client_secret.is_empty() {
            Ok(Provider::Pkce(PkceProvider::new(
                &config.client_id,
                &config.redirect_uri,
                endpoints,
                &config.scopes,
                timeout,
            )?))
        } else {
            Ok(Provider::Confidential(ConfidentialProvider::new(
                &config.client_id,
                &config.client_secret,
                &config.redirect_uri,
                endpoints,
                &config.scopes,
                timeout,
            )?))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Pkce(_) => "pkce",
            Provider::Confidential(_) => "confidential",
        }
    }

    fn client(&self) -> &PkceProvider {
        match self {
            Provider::Pkce(p) => p,
            Provider::Confidential(c) => &c.inner,
        }
    }

    pub fn begin_auth(&self, state: &str) -> AuthSession {
        self.client().begin_auth(state)
    }

    pub async fn complete_auth(&self, session: &AuthSession, code: &str) -> Result<TokenSet> {
        self.client().complete_auth(session, code).await
    }

    pub async fn fetch_user(&self, access_token: &str) -> Result<Identity> {
        self.client().fetch_user_as(access_token, self.name()).await
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet> {
        self.client().refresh_token(refresh_token).await
    }
}

fn token_set<T: TokenResponse>(token: &T) -> TokenSet {
    // An expiry too far out to represent is treated as none
    let expires_at = token
        .expires_in()
        .and_then(|duration| i64::try_from(duration.as_secs()).ok())
        .and_then(TimeDelta::try_seconds)
        .and_then(|delta| Utc::now().checked_add_signed(delta));

    TokenSet {
        access_token: token.access_token().secret().clone(),
        refresh_token: token.refresh_token().map(|t| t.secret().clone()),
        expires_at,
    }
}

/// A token is usable when it is non-empty and not already expired
fn check_valid(tokens: &TokenSet) -> Result<()> {
    if tokens.access_token.is_empty() {
        return Err(GatewayError::InvalidToken("empty access token".to_string()));
    }
    if let Some(expires_at) = tokens.expires_at
        && expires_at <= Utc::now()
    {
        return Err(GatewayError::InvalidToken("token already expired".to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "pkce_test.rs"]
mod pkce_test;
