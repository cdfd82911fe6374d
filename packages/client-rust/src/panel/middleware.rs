//! Request handling around the panel routes.
//!
//! The panel answers a handful of small JSON and text documents, so there
//! is no response compression. Every request gets an `x-request-id` that is
//! recorded on its tracing span and echoed back. Requests that outlive
//! [`PanelConfig::request_timeout`] answer `504 Gateway Timeout`, since the
//! slow part is always a remote tier behind the panel.

use axum::body::Body;
use axum::http::header::{HeaderName, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::config::PanelConfig;

const REQUEST_ID: &str = "x-request-id";

/// Wraps `router` with the panel's middleware.
///
/// Outermost first: request id, tracing span, request id echo, CORS (only
/// when origins are configured), timeout.
pub fn apply_http_layers<S>(router: Router<S>, config: &PanelConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let request_id = HeaderName::from_static(REQUEST_ID);

    let mut router = router.layer(TimeoutLayer::with_status_code(
        StatusCode::GATEWAY_TIMEOUT,
        config.request_timeout,
    ));
    if let Some(cors) = build_cors_layer(&config.cors_origins) {
        router = router.layer(cors);
    }
    router
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(panel_span))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

fn panel_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "panel_request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id,
    )
}

/// CORS for browser dashboards reading the panel. `None` when no origin is
/// configured, which keeps the panel same-origin only. `"*"` allows any
/// origin; unparsable origins are dropped.
fn build_cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse().ok()))
    };
    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([CONTENT_TYPE]),
    )
}
