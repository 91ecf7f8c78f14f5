use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Span;
use uuid::Uuid;

use crate::{
    app_module::AppState, core::error::panic_response, health::health_controller::health,
    proxy_handler::GatewayProxyHandler, shared::auth_middleware::authorize,
};

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

pub fn gateway_router(state: AppState) -> Router {
    let cors = state.cors_policy.layer();

    Router::new()
        .route("/actuator/health", get(health))
        .fallback(GatewayProxyHandler::handle)
        .layer(middleware::from_fn_with_state(state.clone(), authorize))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
                .layer(cors)
                .layer(CatchPanicLayer::custom(panic_response)),
        )
}

fn make_request_span(request: &Request) -> Span {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id,
        rule = tracing::field::Empty,
    )
}

#[derive(Clone, Copy, Default)]
struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}
