//! Reverse proxy from dashboards to their object-store buckets
//!
//! Object keys are derived from the request path, fetched from the store
//! and streamed back with the upstream status and headers. Single-page apps
//! get one retry against their root document when a key is missing.

use crate::config::{HttpClientConfig, StorageConfig};
use crate::http::response::not_found;
use crate::model::TenantDashboard;
use crate::{GatewayError, Result};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Duration;

/// Headers that only describe a single hop and are never forwarded
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Response from the object store, body not yet read
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Object store backend
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object with GET or HEAD, forwarding the inbound headers
    ///
    /// Any HTTP status is a successful fetch. Errors are transport failures.
    async fn get_object(
        &self,
        method: &Method,
        bucket: &str,
        key: &str,
        headers: &HeaderMap,
    ) -> Result<UpstreamResponse>;
}

/// Object store reached over HTTPS
pub struct HttpObjectStore {
    client: reqwest::Client,
    host: String,
    endpoint: Option<String>,
    token: Option<String>,
    timeout: Duration,
}

impl HttpObjectStore {
    pub fn new(storage: &StorageConfig, http: &HttpClientConfig) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .pool_idle_timeout(http.idle_conn_timeout)
            .pool_max_idle_per_host(http.max_idle_conns)
            .build()
            .map_err(|e| GatewayError::config(format!("Failed to build storage HTTP client: {}", e)))?;

        Ok(Self {
            client,
            host: storage.host.clone(),
            endpoint: storage.endpoint.clone(),
            token: storage.token.clone(),
            timeout: http.proxy_timeout,
        })
    }

    /// `https://<bucket>.<host>/<key>`, or `<endpoint>/<bucket>/<key>` when an endpoint is set
    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        match self.endpoint {
            Some(ref endpoint) => format!("{}/{}/{}", endpoint, bucket, key),
            None => format!("https://{}.{}/{}", bucket, self.host, key),
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get_object(
        &self,
        method: &Method,
        bucket: &str,
        key: &str,
        headers: &HeaderMap,
    ) -> Result<UpstreamResponse> {
        let mut forwarded = strip_hop_by_hop(headers);
        forwarded.remove(header::HOST);

        let mut request = self
            .client
            .request(method.clone(), self.object_url(bucket, key))
            .timeout(self.timeout);
        if let Some(ref token) = self.token {
            forwarded.remove(header::AUTHORIZATION);
            request = request.bearer_auth(token);
        }

        let response = request
            .headers(forwarded)
            .send()
            .await
            .map_err(|e| GatewayError::upstream(e.to_string()))?;

        Ok(UpstreamResponse {
            status: response.status(),
            headers: strip_hop_by_hop(response.headers()),
            body: Body::from_stream(response.bytes_stream()),
        })
    }
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut headers = headers.clone();
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers
}

/// Serves dashboard content from the object store
#[derive(Clone)]
pub struct ProxyDash {
    store: Arc<dyn ObjectStore>,
}

impl ProxyDash {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Serve `remainder` (the request path with the mount stripped) from `dash`
    pub async fn serve(
        &self,
        dash: &TenantDashboard,
        method: &Method,
        remainder: &str,
        headers: &HeaderMap,
    ) -> Result<Response> {
        if *method != Method::GET && *method != Method::HEAD {
            return Err(GatewayError::MethodNotAllowed);
        }

        let Some(mut key) = dash.object_key(remainder) else {
            tracing::debug!(dashboard = %dash.name, path = remainder, "rejected object path");
            return Ok(not_found());
        };

        let index_key = dash.index_key();
        let mut fallback_used = false;

        loop {
            tracing::debug!(
                dashboard = %dash.name,
                bucket = %dash.bucket,
                object = %key,
                "fetching object"
            );

            let upstream = self
                .store
                .get_object(method, &dash.bucket, &key, headers)
                .await?;

            if upstream.status == StatusCode::NOT_FOUND
                && dash.single_page_app
                && !fallback_used
                && key != index_key
            {
                tracing::debug!(dashboard = %dash.name, object = %key, "falling back to index");
                fallback_used = true;
                key = index_key.clone();
                continue;
            }

            return Ok(upstream.into_response());
        }
    }
}
