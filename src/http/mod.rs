//! HTTP server for dashgate
//!
//! All requests go through one fallback handler that resolves the
//! host and path, runs the auth gate for private dashboards, and proxies
//! to the object store.

pub mod response;
pub mod template;

use self::response::{method_not_allowed, not_found, plain_error, redirect};
use self::template::{INDEX_TEMPLATE, TemplateRenderer};
use crate::auth::{self, AuthContext, GatewaySession};
use crate::config::{Config, load_dashboards};
use crate::model::TenantDashboard;
use crate::proxy::{HttpObjectStore, ObjectStore, ProxyDash};
use crate::router::{DashboardRouter, Route};
use crate::{GatewayError, Result};
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    LatencyUnit,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Application state shared across requests
#[derive(Clone)]
pub struct AppState {
    router: Arc<DashboardRouter>,
    proxy: ProxyDash,
    auth: Option<Arc<AuthContext>>,
    templates: Arc<TemplateRenderer>,
}

impl AppState {
    pub fn new(
        router: DashboardRouter,
        store: Arc<dyn ObjectStore>,
        auth: Option<AuthContext>,
    ) -> Self {
        Self {
            router: Arc::new(router),
            proxy: ProxyDash::new(store),
            auth: auth.map(Arc::new),
            templates: Arc::new(TemplateRenderer::new()),
        }
    }

    /// Build state from configuration and a loaded tenant table
    pub fn from_config(
        config: &Config,
        dashboards: Vec<TenantDashboard>,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self> {
        let auth = if config.oauth.enabled {
            Some(AuthContext::from_config(config)?)
        } else {
            tracing::warn!("OAuth disabled, every dashboard is public");
            None
        };
        let router = DashboardRouter::new(dashboards, &config.base_domain, auth.is_some());
        Ok(Self::new(router, store, auth))
    }
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let dashboards = load_dashboards(&config.config_file, &config)?;
    let store = Arc::new(HttpObjectStore::new(&config.storage, &config.http_client)?);
    let state = AppState::from_config(&config, dashboards, store)?;
    state.router.log_mounts();

    let socket_addr: SocketAddr = config
        .listen
        .parse()
        .map_err(|e| GatewayError::config(format!("Invalid address {}: {}", config.listen, e)))?;

    tracing::info!(
        base_domain = %config.base_domain,
        "Starting HTTP server on {}",
        socket_addr
    );

    let listener = tokio::net::TcpListener::bind(socket_addr).await?;
    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| GatewayError::config(format!("Server error: {}", e)))?;

    Ok(())
}

/// Build the axum router with the request logging stack
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(
            ServiceBuilder::new().layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().include_headers(false))
                    .on_response(
                        DefaultOnResponse::new()
                            .level(tracing::Level::INFO)
                            .latency_unit(LatencyUnit::Micros),
                    ),
            ),
        )
}

async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let host = request_host(&headers, &uri);
    let route = state.router.resolve(&host, &uri);

    if route != Route::NotFound && method != Method::GET && method != Method::HEAD {
        return method_not_allowed();
    }

    let result = match route {
        Route::NotFound => Ok(not_found()),
        Route::Redirect { status, location } => Ok(redirect(status, &location)),
        Route::Index => index(&state, &headers),
        Route::Login => match state.auth.as_deref() {
            Some(ctx) => auth::gate::login(ctx, &headers, &uri).await,
            None => Ok(not_found()),
        },
        Route::Callback => match state.auth.as_deref() {
            Some(ctx) => auth::gate::callback(ctx, &headers, &uri).await,
            None => Ok(not_found()),
        },
        Route::Logout => match state.auth.as_deref() {
            Some(ctx) => auth::gate::logout(ctx, &headers).await,
            None => Ok(not_found()),
        },
        Route::Dashboard { index, mount } => {
            serve_dashboard(&state, index, &mount, &host, &method, &uri, &headers).await
        }
    };

    result.unwrap_or_else(IntoResponse::into_response)
}

async fn serve_dashboard(
    state: &AppState,
    index: usize,
    mount: &str,
    host: &str,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
) -> Result<Response> {
    let Some(dash) = state.router.dashboard(index) else {
        return Ok(not_found());
    };

    if !dash.public
        && let Some(ctx) = state.auth.as_deref()
    {
        let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        if let Err(response) = auth::gate::guard(ctx, headers, host, target) {
            return Ok(response);
        }
    }

    let remainder = uri.path().strip_prefix(mount).unwrap_or_default();
    state.proxy.serve(dash, method, remainder, headers).await
}

fn index(state: &AppState, headers: &HeaderMap) -> Result<Response> {
    let base_domain = state.router.base_domain();
    let user_email = state.auth.as_deref().and_then(|ctx| {
        GatewaySession::load(&ctx.jar(headers))
            .current_user_email
            .filter(|email| !email.is_empty())
    });

    let dashboards: Vec<_> = state
        .router
        .dashboards()
        .iter()
        .map(|dash| {
            json!({
                "name": dash.name,
                "slug": dash.slug,
                "url": dash.canonical_url(base_domain),
                "public": dash.public,
            })
        })
        .collect();

    let html = state.templates.render_json(
        INDEX_TEMPLATE,
        &json!({
            "dashboards": dashboards,
            "user_email": user_email,
            "auth_enabled": state.auth.is_some(),
            "base_domain": base_domain,
        }),
    );

    match html {
        Ok(html) => Ok(Html(html).into_response()),
        Err(e) => {
            tracing::error!("Failed to render index: {}", e);
            Ok(plain_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "500 Internal Server Error",
            ))
        }
    }
}

/// Host the request was addressed to, from `Host` or the URI authority
fn request_host(headers: &HeaderMap, uri: &Uri) -> String {
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod http_test;
