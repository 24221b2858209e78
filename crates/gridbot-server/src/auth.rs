use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

/// Controls bearer-token authentication.
///
/// When `token` is `None` the middleware is a transparent no-op: all
/// requests pass through.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl AuthConfig {
    /// No token configured, so the middleware passes all requests through.
    pub fn none() -> Self {
        Self { token: None }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }
}

/// Axum middleware that requires `Authorization: Bearer <token>` on every
/// request when a token is configured.
///
/// Auth flow (evaluated in order):
/// 1. `token` is `None` → passthrough
/// 2. Header missing or not a `Bearer` credential → 401
/// 3. Bearer value differs from `token` → 401
/// 4. Otherwise → passthrough
pub async fn bearer_auth(
    State(config): State<Arc<AuthConfig>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(ref token) = config.token else {
        return next.run(req).await;
    };

    let presented = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        None => unauthorized("authorization header missing or invalid"),
        Some(value) if value.trim() != token => unauthorized("invalid token"),
        Some(_) => next.run(req).await,
    }
}

fn unauthorized(reason: &str) -> Response {
    tracing::warn!(reason, "rejected unauthenticated request");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": reason })),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn ok_handler() -> &'static str {
        "ok"
    }

    fn test_app(config: AuthConfig) -> Router {
        Router::new()
            .route("/status", get(ok_handler))
            .layer(middleware::from_fn_with_state(
                Arc::new(config),
                bearer_auth,
            ))
    }

    fn request(auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/status");
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn no_token_passes_through() {
        let resp = test_app(AuthConfig::none())
            .oneshot(request(None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let resp = test_app(AuthConfig::with_token("secret"))
            .oneshot(request(None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_rejected() {
        let resp = test_app(AuthConfig::with_token("secret"))
            .oneshot(request(Some("Basic secret")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_token_is_rejected() {
        let resp = test_app(AuthConfig::with_token("secret"))
            .oneshot(request(Some("Bearer nope")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn matching_token_passes() {
        let resp = test_app(AuthConfig::with_token("secret"))
            .oneshot(request(Some("Bearer secret")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
