//! Tests for request dispatch

use super::*;
use crate::auth::{CookieSettings, PkceProvider, Provider, ProviderEndpoints};
use crate::model::DashboardEntry;
use crate::proxy::UpstreamResponse;
use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::Request;
use std::sync::Mutex;
use std::time::Duration;
use tower::ServiceExt;

const BASE: &str = "example.com";

/// Store that records requested keys and answers with the key as body
#[derive(Default)]
struct RecordingStore {
    keys: Mutex<Vec<String>>,
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn get_object(
        &self,
        _method: &Method,
        bucket: &str,
        key: &str,
        _headers: &HeaderMap,
    ) -> Result<UpstreamResponse> {
        self.keys.lock().unwrap().push(format!("{}/{}", bucket, key));
        Ok(UpstreamResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Body::from(key.to_string()),
        })
    }
}

fn dashboards() -> Vec<TenantDashboard> {
    let entry = |bucket: &str, public: bool, subdomain: bool| DashboardEntry {
        bucket: bucket.to_string(),
        public,
        subdomain,
        ..Default::default()
    };
    vec![
        TenantDashboard::from_entry("docs", entry("docs-bucket", false, false), ""),
        TenantDashboard::from_entry("status", entry("status-bucket", true, false), ""),
        TenantDashboard::from_entry("app", entry("app-bucket", false, true), ""),
    ]
}

fn auth_context(redirect_to_login: bool) -> AuthContext {
    let provider = PkceProvider::new(
        "client-123",
        "https://example.com/auth/callback",
        ProviderEndpoints::from_domain("login.example.net"),
        &[],
        Duration::from_secs(5),
    )
    .unwrap();

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

fn create_app(auth: Option<AuthContext>) -> (Router, Arc<RecordingStore>) {
    let store = Arc::new(RecordingStore::default());
    let router = DashboardRouter::new(dashboards(), BASE, auth.is_some());
    let state = AppState::new(router, store.clone(), auth);
    (build_router(state), store)
}

fn request(method: Method, host: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, host)
        .body(Body::empty())
        .unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_index_lists_dashboards() {
    let (app, _) = create_app(None);
    let response = app.oneshot(request(Method::GET, BASE, "/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains(">Docs</a>"));
    assert!(html.contains(">App</a>"));
    assert!(!html.contains("/auth/login"));
}

#[tokio::test]
async fn test_unknown_path_and_host() {
    let (app, store) = create_app(None);

    let response = app
        .clone()
        .oneshot(request(Method::GET, BASE, "/nope/"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(request(Method::GET, "evil.test", "/docs/"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(store.keys.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_non_read_methods_rejected() {
    let (app, store) = create_app(None);

    for method in [Method::POST, Method::PUT, Method::DELETE, Method::PATCH] {
        let response = app
            .clone()
            .oneshot(request(method, BASE, "/status/"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
    assert!(store.keys.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_public_dashboard_without_cookie() {
    let (app, store) = create_app(Some(auth_context(false)));
    let response = app
        .oneshot(request(Method::GET, BASE, "/status/checks/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "checks/index.html");
    assert_eq!(
        *store.keys.lock().unwrap(),
        vec!["status-bucket/checks/index.html".to_string()]
    );
}

#[tokio::test]
async fn test_private_dashboard_strict_mode() {
    let (app, store) = create_app(Some(auth_context(false)));
    let response = app
        .oneshot(request(Method::GET, BASE, "/docs/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_string(response).await, "401 Unauthorized");
    assert!(store.keys.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_private_dashboard_redirect_mode() {
    let (app, store) = create_app(Some(auth_context(true)));
    let response = app
        .oneshot(request(Method::GET, BASE, "/docs/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/auth/login?redirect_to=%2Fdocs%2F"
    );
    assert!(response.headers().get(header::SET_COOKIE).is_some());
    assert!(store.keys.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_private_dashboard_open_without_auth() {
    let (app, store) = create_app(None);
    let response = app
        .oneshot(request(Method::GET, BASE, "/docs/guide.html"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        *store.keys.lock().unwrap(),
        vec!["docs-bucket/guide.html".to_string()]
    );
}

#[tokio::test]
async fn test_mount_redirects() {
    let (app, _) = create_app(None);

    let response = app
        .clone()
        .oneshot(request(Method::GET, BASE, "/docs"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()[header::LOCATION], "/docs/");

    let response = app
        .clone()
        .oneshot(request(Method::GET, BASE, "/app/settings?tab=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(
        response.headers()[header::LOCATION],
        "//app.example.com/settings?tab=1"
    );

    let response = app
        .oneshot(request(Method::HEAD, "docs.example.com", "/guide.html"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(
        response.headers()[header::LOCATION],
        "//example.com/docs/guide.html"
    );
}

#[tokio::test]
async fn test_subdomain_mount_serves_from_root() {
    let (app, store) = create_app(None);
    let response = app
        .oneshot(request(Method::GET, "app.example.com", "/assets/app.js"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        *store.keys.lock().unwrap(),
        vec!["app-bucket/assets/app.js".to_string()]
    );
}

#[tokio::test]
async fn test_auth_routes_disabled() {
    let (app, _) = create_app(None);
    let response = app
        .oneshot(request(Method::GET, BASE, "/auth/login"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
