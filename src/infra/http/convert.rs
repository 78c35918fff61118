use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::application::convert::{BodyParams, Conversion, QueryParams};
use crate::domain::error::ConversionError;
use crate::domain::request::ConversionRequest;

use super::{ErrorReport, HttpState};

const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

pub(super) async fn convert_get(
    State(state): State<HttpState>,
    Query(params): Query<QueryParams>,
    headers: HeaderMap,
) -> Response {
    let request = params.into_request(accept_header(&headers));
    respond(&state, request).await
}

pub(super) async fn convert_post(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = parse_body(&headers, &body);
    respond(&state, request).await
}

fn parse_body(headers: &HeaderMap, body: &[u8]) -> Result<ConversionRequest, ConversionError> {
    if let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    {
        if !content_type.starts_with("application/json") {
            return Err(ConversionError::validation(
                "Invalid request content type (must be \"application/json\")",
            ));
        }
    }
    BodyParams::parse(body)?.into_request(accept_header(headers))
}

async fn respond(state: &HttpState, request: Result<ConversionRequest, ConversionError>) -> Response {
    let request = match request {
        Ok(request) => request,
        Err(error) => return error_response(error),
    };
    match state.convert.convert(&request).await {
        Ok(conversion) => success_response(conversion),
        Err(error) => error_response(error),
    }
}

fn accept_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
}

fn success_response(conversion: Conversion) -> Response {
    let mut response = (StatusCode::OK, conversion.body.into_bytes()).into_response();
    match HeaderValue::from_str(&conversion.content_type) {
        Ok(value) => {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
            response
        }
        Err(_) => error_response(ConversionError::engine(format!(
            "engine produced an unusable content type: {}",
            conversion.content_type
        ))),
    }
}

fn error_response(error: ConversionError) -> Response {
    let status =
        StatusCode::from_u16(error.status_hint()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = Json(ErrorBody {
        message: error.message().to_string(),
    });
    let mut response = (status, body).into_response();
    ErrorReport::new("infra::http::convert", status, error.log_detail()).attach(&mut response);
    response
}

/// CORS preflight: advertise the supported methods and headers, no body.
pub(super) async fn preflight() -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type, Accept"),
            ),
        ],
    )
        .into_response()
}

pub(super) async fn method_not_allowed() -> Response {
    let mut response = (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody {
            message: "Method not allowed".to_string(),
        }),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    ErrorReport::new(
        "infra::http::convert",
        StatusCode::METHOD_NOT_ALLOWED,
        "method not allowed on /convert",
    )
    .attach(&mut response);
    response
}

pub(super) async fn not_found() -> Response {
    let mut response = (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            message: "Not found".to_string(),
        }),
    )
        .into_response();
    ErrorReport::new(
        "infra::http::convert",
        StatusCode::NOT_FOUND,
        "no route matched",
    )
    .attach(&mut response);
    response
}
