mod convert;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Request, StatusCode, header},
    middleware::{self as axum_middleware, Next},
    response::Response,
    routing::get,
};
use tracing::{error, warn};

use crate::application::convert::ConvertService;

/// Shared per-process state handed to the handlers.
#[derive(Clone)]
pub struct HttpState {
    pub convert: Arc<ConvertService>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route(
            "/convert",
            get(convert::convert_get)
                .post(convert::convert_post)
                .options(convert::preflight)
                .fallback(convert::method_not_allowed),
        )
        .fallback(convert::not_found)
        .with_state(state)
        .layer(axum_middleware::from_fn(allow_any_origin))
        .layer(axum_middleware::from_fn(log_responses))
}

/// Structured diagnostics attached to error responses so the shared logging
/// middleware can emit detail the client never sees.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub detail: String,
}

impl ErrorReport {
    pub fn new(source: &'static str, status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            source,
            status,
            detail: detail.into(),
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// The gateway is meant to be embedded from arbitrary origins.
async fn allow_any_origin(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, detail) = match &report {
            Some(report) => (report.source, report.detail.as_str()),
            None => ("unknown", "no diagnostic available"),
        };

        if status.is_server_error() {
            error!(
                target: "teorema::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = detail,
                "request failed",
            );
        } else {
            warn!(
                target: "teorema::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = detail,
                "client request error",
            );
        }
    }

    response
}
