use std::any::Any;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use super::GatewayError;
use crate::shared::api_response::ApiResponse;

const VALIDATION_MESSAGE: &str = "Validation error";
const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";
const FORBIDDEN_MESSAGE: &str = "Forbidden";
const NOT_FOUND_MESSAGE: &str = "Not found";
const UNAVAILABLE_MESSAGE: &str = "Service unavailable";
const UNEXPECTED_MESSAGE: &str = "Unexpected error";

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden { .. } => StatusCode::FORBIDDEN,
            GatewayError::NoRouteMatched { .. } => StatusCode::NOT_FOUND,
            GatewayError::BackendUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The only text a client ever sees for this failure.
    pub fn client_message(&self) -> &str {
        match self {
            GatewayError::Validation(messages) => messages
                .iter()
                .map(String::as_str)
                .find(|message| !message.is_empty())
                .unwrap_or(VALIDATION_MESSAGE),
            GatewayError::Unauthorized(_) => UNAUTHORIZED_MESSAGE,
            GatewayError::Forbidden { .. } => FORBIDDEN_MESSAGE,
            GatewayError::NoRouteMatched { .. } => NOT_FOUND_MESSAGE,
            GatewayError::BackendUnavailable { .. } => UNAVAILABLE_MESSAGE,
            GatewayError::Unexpected(_) => UNEXPECTED_MESSAGE,
        }
    }

    fn log(&self) {
        match self {
            GatewayError::Validation(_) => {
                tracing::warn!(error = %self, "request rejected by validation");
            }
            GatewayError::Unauthorized(reason) => {
                tracing::error!(reason = %reason, "request not authenticated");
            }
            GatewayError::Forbidden { required } => {
                tracing::error!(required = %required, "request lacks required authority");
            }
            GatewayError::NoRouteMatched { path } => {
                tracing::error!(path = %path, "no route matched request");
            }
            GatewayError::BackendUnavailable { route_id, reason } => {
                tracing::error!(route = %route_id, reason = %reason, "backend unavailable");
            }
            GatewayError::Unexpected(err) => {
                tracing::error!(error = ?err, "unexpected gateway error");
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status();
        let mut response = (status, Json(ApiResponse::failure(self.client_message()))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Renders a panic caught anywhere below the panic layer as an unexpected error.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    GatewayError::Unexpected(anyhow::anyhow!("handler panicked: {detail}")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::TokenError;

    async fn envelope(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[test]
    fn every_failure_kind_maps_to_its_status() {
        let cases = vec![
            (GatewayError::validation("bad"), StatusCode::BAD_REQUEST),
            (
                GatewayError::Unauthorized(TokenError::MissingToken),
                StatusCode::UNAUTHORIZED,
            ),
            (
                GatewayError::Forbidden {
                    required: "ROLE_ADMIN".to_string(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                GatewayError::NoRouteMatched {
                    path: "/nowhere".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                GatewayError::BackendUnavailable {
                    route_id: "products".to_string(),
                    reason: "connection refused".to_string(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                GatewayError::Unexpected(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{err}");
        }
    }

    #[test]
    fn validation_uses_first_message_or_generic_fallback() {
        let err = GatewayError::Validation(vec!["first".to_string(), "second".to_string()]);
        assert_eq!(err.client_message(), "first");

        let err = GatewayError::Validation(Vec::new());
        assert_eq!(err.client_message(), "Validation error");
    }

    #[tokio::test]
    async fn backend_details_never_reach_the_client() {
        let err = GatewayError::BackendUnavailable {
            route_id: "purchases".to_string(),
            reason: "tcp connect error: 10.0.0.7:8080 refused".to_string(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = envelope(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Service unavailable");
        assert!(body.get("data").is_none());
        assert!(!body.to_string().contains("10.0.0.7"));
    }

    #[tokio::test]
    async fn unauthorized_carries_bearer_challenge_without_reason() {
        let response = GatewayError::Unauthorized(TokenError::KeySource(
            "jwks fetch failed".to_string(),
        ))
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );

        let body = envelope(response).await;
        assert_eq!(body["message"], "Unauthorized");
    }

    #[tokio::test]
    async fn panic_payload_is_rendered_as_unexpected_error() {
        let response = panic_response(Box::new("index out of bounds"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = envelope(response).await;
        assert_eq!(body["message"], "Unexpected error");
    }
}
