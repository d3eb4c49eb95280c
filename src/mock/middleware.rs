//! Mock server middleware: API key check and access logging.

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Instant;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::client::API_KEY_HEADER;

/// Key value the mock treats as a revoked credential.
pub const INVALID_API_KEY: &str = "invalid-api-key";

/// Paths reachable without an API key.
const PUBLIC_PATHS: &[&str] = &["/healthz"];

/// How the mock decides whether a key is acceptable.
#[derive(Clone, Debug)]
pub struct MockAuthConfig {
    /// Always answered with 403.
    pub rejected_key: String,
    /// When set, any other key is answered with 403. When unset, any
    /// present key other than `rejected_key` is accepted.
    pub required_key: Option<String>,
}

impl Default for MockAuthConfig {
    fn default() -> Self {
        Self {
            rejected_key: INVALID_API_KEY.to_string(),
            required_key: None,
        }
    }
}

impl MockAuthConfig {
    /// Accept only `key`.
    pub fn requiring(key: impl Into<String>) -> Self {
        Self {
            required_key: Some(key.into()),
            ..Self::default()
        }
    }
}

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// Require the API key header on every non-public path.
///
/// - header absent: 401
/// - header equal to the rejected key, or not the required key: 403
pub async fn mock_auth_middleware(
    State(config): State<MockAuthConfig>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if PUBLIC_PATHS.contains(&path) {
        return next.run(request).await;
    }

    let presented = match request.headers().get(API_KEY_HEADER) {
        Some(value) => value.as_bytes(),
        None => {
            warn!(path = %path, "Request without API key");
            return reject(StatusCode::UNAUTHORIZED, "'X-N8N-API-KEY' header required");
        }
    };

    let rejected: bool = presented.ct_eq(config.rejected_key.as_bytes()).into();
    let mismatched = match &config.required_key {
        Some(required) => !bool::from(presented.ct_eq(required.as_bytes())),
        None => false,
    };

    if rejected || mismatched {
        warn!(path = %path, "Request with invalid API key");
        return reject(StatusCode::FORBIDDEN, "Invalid API key");
    }

    next.run(request).await
}

/// Log method, path, status and duration of every request.
pub async fn access_log_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    info!(
        target: "flowctl::access",
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use tower::ServiceExt;

    async fn ok_handler() -> &'static str {
        "ok"
    }

    fn app(config: MockAuthConfig) -> Router {
        Router::new()
            .route("/healthz", get(ok_handler))
            .route("/api/v1/workflows", get(ok_handler))
            .layer(axum::middleware::from_fn_with_state(
                config,
                mock_auth_middleware,
            ))
    }

    async fn status_for(config: MockAuthConfig, uri: &str, key: Option<&str>) -> StatusCode {
        let mut builder = Request::builder().uri(uri);
        if let Some(key) = key {
            builder = builder.header("X-N8N-API-KEY", key);
        }
        app(config)
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_missing_key_is_unauthorized() {
        let status = status_for(MockAuthConfig::default(), "/api/v1/workflows", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_sentinel_key_is_forbidden() {
        let status = status_for(
            MockAuthConfig::default(),
            "/api/v1/workflows",
            Some(INVALID_API_KEY),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_any_other_key_is_accepted() {
        let status = status_for(
            MockAuthConfig::default(),
            "/api/v1/workflows",
            Some("whatever"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_required_key() {
        let config = MockAuthConfig::requiring("s3cret");
        assert_eq!(
            status_for(config.clone(), "/api/v1/workflows", Some("s3cret")).await,
            StatusCode::OK
        );
        assert_eq!(
            status_for(config, "/api/v1/workflows", Some("other")).await,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_healthz_bypasses_auth() {
        let status = status_for(MockAuthConfig::default(), "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_access_log_passes_response_through() {
        let app = Router::new()
            .route("/healthz", get(ok_handler))
            .layer(axum::middleware::from_fn(access_log_middleware));

        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
