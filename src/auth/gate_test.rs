use super::*;
use crate::auth::pkce::{PkceProvider, Provider, ProviderEndpoints};
use crate::auth::session::{AuthSession, CookieSettings};
use axum::http::{HeaderValue, header};
use std::time::Duration;

const BASE: &str = "example.com";

fn create_context(redirect_to_login: bool) -> AuthContext {
    let provider = PkceProvider::new(
        "client-123",
        "https://example.com/auth/callback",
        ProviderEndpoints::from_domain("login.example.net"),
        &[],
        Duration::from_secs(5),
    )
    .expect("Failed to create provider");

    AuthContext::new(
        Provider::Pkce(provider),
        "0123456789abcdef0123456789abcdef",
        CookieSettings {
            domain: BASE.to_string(),
            secure: false,
            max_age: Duration::from_secs(3600),
        },
        BASE,
        redirect_to_login,
    )
}

/// Request headers carrying every cookie set by `response`
fn cookies_from(response: &Response) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for value in response.headers().get_all(header::SET_COOKIE) {
        let pair = value.to_str().unwrap().split(';').next().unwrap().to_string();
        headers.append(header::COOKIE, HeaderValue::from_str(&pair).unwrap());
    }
    headers
}

fn signed_in() -> GatewaySession {
    GatewaySession {
        current_user_id: Some("auth0|42".to_string()),
        current_user_email: Some("ada@example.com".to_string()),
        ..Default::default()
    }
}

#[test]
fn test_decide_allows_authenticated() {
    let decision = decide(&signed_in(), false, BASE, "/docs/", BASE);
    assert_eq!(decision, Decision::Allow);
}

#[test]
fn test_decide_strict_mode_rejects() {
    let decision = decide(&GatewaySession::default(), false, BASE, "/docs/", BASE);
    assert_eq!(decision, Decision::Reject);
}

#[test]
fn test_decide_redirect_mode() {
    let decision = decide(&GatewaySession::default(), true, BASE, "/docs/", BASE);
    assert_eq!(
        decision,
        Decision::RedirectToLogin {
            login_url: "/auth/login?redirect_to=%2Fdocs%2F".to_string(),
            pending: "/docs/".to_string(),
        }
    );
}

#[test]
fn test_login_url_keeps_query() {
    let (login_url, pending) = build_login_url(BASE, "/docs/report?id=7&tab=a", BASE);
    assert_eq!(pending, "/docs/report?id=7&tab=a");
    assert_eq!(
        login_url,
        "/auth/login?redirect_to=%2Fdocs%2Freport%3Fid%3D7%26tab%3Da"
    );
}

#[test]
fn test_login_url_from_subdomain() {
    let (login_url, pending) = build_login_url("Docs.Example.com", "/x", BASE);
    assert_eq!(pending, "//docs.example.com/x");
    assert_eq!(
        login_url,
        "//example.com/auth/login?redirect_to=%2F%2Fdocs.example.com%2Fx"
    );
}

#[test]
fn test_validate_redirect_target() {
    assert!(validate_redirect_target("/dash/", BASE).is_ok());
    assert!(validate_redirect_target("https://tenant.example.com/x", BASE).is_ok());
    assert!(validate_redirect_target("//example.com/docs/", BASE).is_ok());
    assert!(validate_redirect_target("http://EXAMPLE.com/", BASE).is_ok());
    assert!(validate_redirect_target("reports/?q=1", BASE).is_ok());

    for target in [
        "http://evil.example/",
        "//evil.example/",
        "https://example.com.evil.example/",
        "https://notexample.com/",
        "/\\evil.example/",
        "javascript:alert(1)",
        "https:evil.example/x",
        "https://example.com@evil.example/",
    ] {
        let err = validate_redirect_target(target, BASE).unwrap_err();
        assert!(
            matches!(err, GatewayError::OpenRedirectRejected(_)),
            "{} should be rejected",
            target
        );
    }
}

#[test]
fn test_validate_redirect_target_normalizes_result() {
    assert_eq!(validate_redirect_target("/dash/", BASE).unwrap(), "/dash/");
    assert_eq!(
        validate_redirect_target("reports/?q=1", BASE).unwrap(),
        "/reports/?q=1"
    );
    assert_eq!(
        validate_redirect_target("https://tenant.example.com/x?y=1", BASE).unwrap(),
        "//tenant.example.com/x?y=1"
    );
    assert_eq!(
        validate_redirect_target("http://EXAMPLE.com/docs/", BASE).unwrap(),
        "/docs/"
    );

    // Same scheme as the resolution base parses as a path, but a browser on
    // https would follow it off-site if it were echoed verbatim
    let target = validate_redirect_target("http:evil.example/x", BASE).unwrap();
    assert_eq!(target, "/evil.example/x");
    assert!(!target.contains("http:"));
}

#[test]
fn test_validate_redirect_target_ignores_base_port() {
    assert_eq!(
        validate_redirect_target("//docs.localhost:8080/", "localhost:8080").unwrap(),
        "//docs.localhost:8080/"
    );
    assert!(validate_redirect_target("http://evil.test:8080/", "localhost:8080").is_err());
}

#[test]
fn test_guard_strict_mode() {
    let ctx = create_context(false);
    let response = guard(&ctx, &HeaderMap::new(), BASE, "/docs/").unwrap_err();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[test]
fn test_guard_redirect_stores_pending() {
    let ctx = create_context(true);
    let response = guard(&ctx, &HeaderMap::new(), BASE, "/docs/").unwrap_err();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/auth/login?redirect_to=%2Fdocs%2F"
    );

    let session = GatewaySession::load(&ctx.jar(&cookies_from(&response)));
    assert_eq!(session.pending_redirect.as_deref(), Some("/docs/"));
}

#[test]
fn test_guard_allows_signed_in_session() {
    let ctx = create_context(false);
    let jar = signed_in().store(ctx.jar(&HeaderMap::new()), &ctx.cookie).unwrap();
    let headers = cookies_from(&jar.into_response());

    assert!(guard(&ctx, &headers, BASE, "/docs/").is_ok());
}

#[tokio::test]
async fn test_login_redirects_to_provider() {
    let ctx = create_context(true);
    let uri: Uri = "/auth/login?redirect_to=%2Fdocs%2F".parse().unwrap();

    let response = login(&ctx, &HeaderMap::new(), &uri).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with("https://login.example.net/authorize?"));
    assert!(location.contains("code_challenge_method=S256"));

    let session = GatewaySession::load(&ctx.jar(&cookies_from(&response)));
    assert_eq!(session.pending_redirect.as_deref(), Some("/docs/"));
    let auth: AuthSession = session.auth_session().unwrap();
    assert_eq!(auth.authorization_url, location);
    assert_eq!(auth.code_verifier.len(), 43);
}

#[tokio::test]
async fn test_login_rejects_open_redirect() {
    let ctx = create_context(true);
    let uri: Uri = "/auth/login?redirect_to=http%3A%2F%2Fevil.example%2F"
        .parse()
        .unwrap();

    let err = login(&ctx, &HeaderMap::new(), &uri).await.unwrap_err();
    assert!(matches!(err, GatewayError::OpenRedirectRejected(_)));
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_without_login_in_progress() {
    let ctx = create_context(true);
    let uri: Uri = "/auth/callback?code=abc&state=xyz".parse().unwrap();

    let err = callback(&ctx, &HeaderMap::new(), &uri).await.unwrap_err();
    assert!(matches!(err, GatewayError::NoAuthInProgress));
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_callback_state_mismatch() {
    let ctx = create_context(true);
    let login_response = login(&ctx, &HeaderMap::new(), &"/auth/login".parse().unwrap())
        .await
        .unwrap();
    let headers = cookies_from(&login_response);

    let uri: Uri = "/auth/callback?code=abc&state=forged".parse().unwrap();
    let err = callback(&ctx, &headers, &uri).await.unwrap_err();
    assert!(matches!(err, GatewayError::StateMismatch));
}

#[tokio::test]
async fn test_callback_provider_error() {
    let ctx = create_context(true);
    let uri: Uri = "/auth/callback?error=access_denied&error_description=nope"
        .parse()
        .unwrap();

    let err = callback(&ctx, &HeaderMap::new(), &uri).await.unwrap_err();
    assert!(matches!(err, GatewayError::Exchange(_)));
    assert!(err.to_string().contains("access_denied"));
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let ctx = create_context(true);
    let jar = signed_in().store(ctx.jar(&HeaderMap::new()), &ctx.cookie).unwrap();
    let headers = cookies_from(&jar.into_response());

    let response = logout(&ctx, &headers).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "//example.com/");

    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.contains("Max-Age=0"));
}
