//! HTTP response helpers
//!
//! Errors are answered as plain text so browsers show the message as-is.
//! Redirects are built by hand so scheme-relative locations pass through
//! untouched.

use axum::{
    body::Body,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

/// Write a plain-text error response
///
/// # Example
/// ```ignore
/// return plain_error(StatusCode::NOT_FOUND, "404 page not found");
/// ```
pub fn plain_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        message.into(),
    )
        .into_response()
}

/// Redirect with an arbitrary status
///
/// Falls back to a 500 if `location` is not a valid header value.
pub fn redirect(status: StatusCode, location: &str) -> Response {
    match Response::builder()
        .status(status)
        .header(header::LOCATION, location)
        .body(Body::empty())
    {
        Ok(response) => response,
        Err(err) => plain_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Invalid redirect location: {}", err),
        ),
    }
}

/// 302 Found
pub fn found(location: &str) -> Response {
    redirect(StatusCode::FOUND, location)
}

/// Standard 404 body
pub fn not_found() -> Response {
    plain_error(StatusCode::NOT_FOUND, "404 page not found")
}

/// Standard 405 body
pub fn method_not_allowed() -> Response {
    let mut response = plain_error(StatusCode::METHOD_NOT_ALLOWED, "405 method not allowed");
    response
        .headers_mut()
        .insert(header::ALLOW, header::HeaderValue::from_static("GET, HEAD"));
    response
}
