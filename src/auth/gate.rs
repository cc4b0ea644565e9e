//! Access gate and login endpoints
//!
//! The gate runs in front of every private dashboard. Anonymous visitors are
//! either sent to `/auth/login` with their requested URL remembered in the
//! session, or refused with 401, depending on configuration.

use crate::auth::AuthContext;
use crate::auth::session::GatewaySession;
use crate::constants::{AUTH_LOGIN_PATH, REDIRECT_TO_PARAM};
use crate::http::response::{found, plain_error};
use crate::{GatewayError, Result};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use subtle::ConstantTimeEq;
use url::{Position, Url, form_urlencoded};

/// Outcome of the gate for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Send the browser to `login_url`, remembering `pending` as the return target
    RedirectToLogin { login_url: String, pending: String },
    Reject,
}

/// Decide whether a request for `target` on `host` may proceed
pub fn decide(
    session: &GatewaySession,
    redirect_to_login: bool,
    host: &str,
    target: &str,
    base_domain: &str,
) -> Decision {
    if session.is_authenticated() {
        return Decision::Allow;
    }
    if !redirect_to_login {
        return Decision::Reject;
    }

    let (login_url, pending) = build_login_url(host, target, base_domain);
    Decision::RedirectToLogin { login_url, pending }
}

/// Login URL for a request, plus the return target it carries
///
/// Requests on the base domain return to a plain path. Requests on a tenant
/// subdomain log in on the base domain and return to a scheme-relative URL.
pub fn build_login_url(host: &str, target: &str, base_domain: &str) -> (String, String) {
    let on_base = host.eq_ignore_ascii_case(base_domain);
    let pending = if on_base {
        target.to_string()
    } else {
        format!("//{}{}", host.to_ascii_lowercase(), target)
    };

    let encoded: String = form_urlencoded::byte_serialize(pending.as_bytes()).collect();
    let login_url = if on_base {
        format!("{}?{}={}", AUTH_LOGIN_PATH, REDIRECT_TO_PARAM, encoded)
    } else {
        format!(
            "//{}{}?{}={}",
            base_domain, AUTH_LOGIN_PATH, REDIRECT_TO_PARAM, encoded
        )
    };

    (login_url, pending)
}

/// Accept a post-login destination only if it stays on the base domain or one of its subdomains
///
/// Relative targets resolve against the base domain and are always accepted.
/// The returned target is rebuilt from the parsed URL, never echoed back:
/// a path for the base host, otherwise scheme-relative `//host/path`.
pub fn validate_redirect_target(target: &str, base_domain: &str) -> Result<String> {
    let base_host = base_domain
        .split(':')
        .next()
        .unwrap_or(base_domain)
        .to_ascii_lowercase();

    let base = Url::parse(&format!("http://{}/", base_host))
        .map_err(|_| GatewayError::OpenRedirectRejected(target.to_string()))?;
    let resolved = Url::options()
        .base_url(Some(&base))
        .parse(target)
        .map_err(|_| GatewayError::OpenRedirectRejected(target.to_string()))?;

    if !matches!(resolved.scheme(), "http" | "https") {
        return Err(GatewayError::OpenRedirectRejected(target.to_string()));
    }

    if !resolved.username().is_empty() || resolved.password().is_some() {
        return Err(GatewayError::OpenRedirectRejected(target.to_string()));
    }

    let host = resolved.host_str().unwrap_or_default().to_ascii_lowercase();
    if host == base_host && resolved.port().is_none() {
        Ok(resolved[Position::BeforePath..].to_string())
    } else if host == base_host || host.ends_with(&format!(".{}", base_host)) {
        Ok(format!("//{}", &resolved[Position::BeforeHost..]))
    } else {
        Err(GatewayError::OpenRedirectRejected(target.to_string()))
    }
}

/// Run the gate for a private dashboard request
///
/// Returns the response to send instead when the request may not proceed.
pub fn guard(
    ctx: &AuthContext,
    headers: &HeaderMap,
    host: &str,
    target: &str,
) -> std::result::Result<(), Response> {
    let jar = ctx.jar(headers);
    let mut session = GatewaySession::load(&jar);

    match decide(
        &session,
        ctx.redirect_to_login,
        host,
        target,
        &ctx.base_domain,
    ) {
        Decision::Allow => Ok(()),
        Decision::Reject => {
            tracing::debug!(host, target, "rejecting anonymous request");
            Err(plain_error(StatusCode::UNAUTHORIZED, "401 Unauthorized"))
        }
        Decision::RedirectToLogin { login_url, pending } => {
            tracing::debug!(host, target, "redirecting anonymous request to login");
            session.pending_redirect = Some(pending);
            match session.store(jar, &ctx.cookie) {
                Ok(jar) => Err((jar, found(&login_url)).into_response()),
                Err(e) => Err(e.into_response()),
            }
        }
    }
}

/// `GET /auth/login`: begin the PKCE flow and send the browser to the provider
pub async fn login(ctx: &AuthContext, headers: &HeaderMap, uri: &Uri) -> Result<Response> {
    let jar = ctx.jar(headers);
    let mut session = GatewaySession::load(&jar);

    if let Some(target) = query_param(uri, REDIRECT_TO_PARAM).filter(|t| !t.is_empty()) {
        session.pending_redirect = Some(validate_redirect_target(&target, &ctx.base_domain)?);
    }

    let auth = ctx.provider.begin_auth(&new_state());
    session.set_auth_session(&auth)?;
    let auth_url = auth.auth_url()?.to_string();

    let jar = session.store(jar, &ctx.cookie)?;
    tracing::debug!(provider = ctx.provider.name(), "starting login");
    Ok((jar, found(&auth_url)).into_response())
}

/// `GET /auth/callback`: finish the login and return to the pending destination
///
/// Nothing is written to the cookie unless the whole login succeeds.
pub async fn callback(ctx: &AuthContext, headers: &HeaderMap, uri: &Uri) -> Result<Response> {
    if let Some(error) = query_param(uri, "error") {
        let description = query_param(uri, "error_description").unwrap_or_default();
        return Err(GatewayError::exchange(format!(
            "provider returned {}: {}",
            error, description
        )));
    }

    let jar = ctx.jar(headers);
    let mut session = GatewaySession::load(&jar);
    let mut auth = session.auth_session()?;

    let expected = auth.state().ok_or(GatewayError::StateMismatch)?;
    let received = query_param(uri, "state").unwrap_or_default();
    if !bool::from(expected.as_bytes().ct_eq(received.as_bytes())) {
        return Err(GatewayError::StateMismatch);
    }

    let code = query_param(uri, "code")
        .filter(|c| !c.is_empty())
        .ok_or_else(|| GatewayError::exchange("missing authorization code"))?;

    let tokens = ctx.provider.complete_auth(&auth, &code).await?;
    auth.authorize(tokens);
    let identity = ctx.provider.fetch_user(&auth.access_token).await?;

    session.sign_in(&identity);
    let destination = session
        .take_pending_redirect()
        .unwrap_or_else(|| ctx.site_root());

    let jar = session.store(jar, &ctx.cookie)?;
    tracing::info!(user_id = %identity.user_id, email = %identity.email, "user logged in");
    Ok((jar, found(&destination)).into_response())
}

/// `GET /auth/logout`: expire the session and return to the site root
pub async fn logout(ctx: &AuthContext, headers: &HeaderMap) -> Result<Response> {
    let jar = GatewaySession::clear(ctx.jar(headers), &ctx.cookie);
    Ok((jar, found(&ctx.site_root())).into_response())
}

fn query_param(uri: &Uri, name: &str) -> Option<String> {
    form_urlencoded::parse(uri.query().unwrap_or_default().as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

fn new_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod gate_test;
