use crate::{entities::OrderStatus, errors::ServiceError, ApiResponse};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::str::FromStr;

/// 200 with the standard envelope
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// 200 with the standard envelope and a human-readable message
pub fn message_response<T: Serialize>(data: T, message: &str) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse::success(data).with_message(message)),
    )
        .into_response()
}

/// 201 with the standard envelope and a human-readable message
pub fn created_response<T: Serialize>(data: T, message: &str) -> Response {
    (
        StatusCode::CREATED,
        Json(ApiResponse::success(data).with_message(message)),
    )
        .into_response()
}

pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Parses a lowercase status path segment
pub fn parse_order_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    OrderStatus::from_str(&raw.to_ascii_lowercase())
        .map_err(|_| ServiceError::BadRequest(format!("Unknown order status: {}", raw)))
}

/// Parses a numeric path segment
pub fn parse_id(raw: &str) -> Result<i32, ServiceError> {
    raw.parse::<i32>()
        .map_err(|_| ServiceError::BadRequest(format!("Invalid id: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_segments_parse_case_insensitively() {
        assert_eq!(parse_order_status("Complete").unwrap(), OrderStatus::Complete);
        assert!(matches!(
            parse_order_status("shipped"),
            Err(ServiceError::BadRequest(_))
        ));
    }

    #[test]
    fn ids_must_be_numeric() {
        assert_eq!(parse_id("12").unwrap(), 12);
        assert!(parse_id("abc").is_err());
    }
}
