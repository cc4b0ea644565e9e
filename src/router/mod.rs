//! Host and path resolution
//!
//! Every dashboard has a path mount on the base domain (`/<slug>/`) and a
//! subdomain mount (`<slug>.<base-domain>`). Exactly one of them is
//! canonical; the other answers with a permanent redirect that keeps the
//! rest of the path and the query string.

use crate::constants::{AUTH_CALLBACK_PATH, AUTH_LOGIN_PATH, AUTH_LOGOUT_PATH, AUTH_PREFIX};
use crate::model::TenantDashboard;
use axum::http::{StatusCode, Uri};
use std::collections::HashMap;
use std::sync::Arc;

/// Where a request goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Callback,
    Logout,
    /// Landing page
    Index,
    /// Serve dashboard `index`, stripping `mount` from the path
    Dashboard { index: usize, mount: String },
    Redirect { status: StatusCode, location: String },
    NotFound,
}

/// Immutable mount table built from the tenant list
#[derive(Debug, Clone)]
pub struct DashboardRouter {
    dashboards: Arc<Vec<TenantDashboard>>,
    by_slug: HashMap<String, usize>,
    base_domain: String,
    auth_enabled: bool,
}

impl DashboardRouter {
    pub fn new(dashboards: Vec<TenantDashboard>, base_domain: &str, auth_enabled: bool) -> Self {
        let by_slug = dashboards
            .iter()
            .enumerate()
            .map(|(i, d)| (d.slug.clone(), i))
            .collect();

        Self {
            dashboards: Arc::new(dashboards),
            by_slug,
            base_domain: base_domain.to_ascii_lowercase(),
            auth_enabled,
        }
    }

    pub fn dashboards(&self) -> &[TenantDashboard] {
        &self.dashboards
    }

    pub fn dashboard(&self, index: usize) -> Option<&TenantDashboard> {
        self.dashboards.get(index)
    }

    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    /// Log every mount at startup
    pub fn log_mounts(&self) {
        for dash in self.dashboards.iter() {
            tracing::info!(
                dashboard = %dash.name,
                bucket = %dash.bucket,
                public = dash.public,
                spa = dash.single_page_app,
                "mounted at {}",
                dash.canonical_url(&self.base_domain)
            );
        }
    }

    /// Resolve a request by its `Host` header and URI
    pub fn resolve(&self, host: &str, uri: &Uri) -> Route {
        let host = host.to_ascii_lowercase();
        let path = uri.path();
        let query = uri.query();

        if host == self.base_domain {
            return self.resolve_base(path, query);
        }

        let Some(label) = host
            .strip_suffix(self.base_domain.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
        else {
            return Route::NotFound;
        };
        if label.is_empty() || label.contains('.') {
            return Route::NotFound;
        }

        match self.by_slug.get(label) {
            Some(&index) => self.resolve_subdomain(index, path, query),
            None => Route::NotFound,
        }
    }

    fn resolve_base(&self, path: &str, query: Option<&str>) -> Route {
        if path.starts_with(AUTH_PREFIX) {
            if !self.auth_enabled {
                return Route::NotFound;
            }
            return match path {
                AUTH_LOGIN_PATH => Route::Login,
                AUTH_CALLBACK_PATH => Route::Callback,
                AUTH_LOGOUT_PATH => Route::Logout,
                _ => Route::NotFound,
            };
        }

        if path == "/" {
            return Route::Index;
        }

        let Some(trimmed) = path.strip_prefix('/') else {
            return Route::NotFound;
        };
        let (slug, rest) = match trimmed.split_once('/') {
            Some((slug, rest)) => (slug, Some(rest)),
            None => (trimmed, None),
        };

        let Some(&index) = self.by_slug.get(slug) else {
            return Route::NotFound;
        };
        let dash = &self.dashboards[index];

        if dash.subdomain {
            let location = format!(
                "//{}/{}",
                dash.subdomain_host(&self.base_domain),
                rest.unwrap_or_default()
            );
            return redirect(StatusCode::PERMANENT_REDIRECT, location, query);
        }

        match rest {
            Some(_) => Route::Dashboard {
                index,
                mount: dash.path_mount(),
            },
            // `/docs` -> `/docs/`
            None => redirect(StatusCode::MOVED_PERMANENTLY, dash.path_mount(), query),
        }
    }

    fn resolve_subdomain(&self, index: usize, path: &str, query: Option<&str>) -> Route {
        let dash = &self.dashboards[index];

        if dash.subdomain {
            return Route::Dashboard {
                index,
                mount: "/".to_string(),
            };
        }

        let location = format!("//{}/{}{}", self.base_domain, dash.slug, path);
        redirect(StatusCode::PERMANENT_REDIRECT, location, query)
    }
}

fn redirect(status: StatusCode, mut location: String, query: Option<&str>) -> Route {
    if let Some(query) = query {
        location.push('?');
        location.push_str(query);
    }
    Route::Redirect { status, location }
}
