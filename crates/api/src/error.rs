//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use basket::BasketError;
use catalog::CatalogError;
use orders::OrderError;
use payment::PaymentError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Basket-level error.
    Basket(BasketError),
    /// Order-level error.
    Order(OrderError),
    /// Payment-level error.
    Payment(PaymentError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Basket(err) => basket_error_to_response(err),
            ApiError::Order(err) => order_error_to_response(err),
            ApiError::Payment(err) => payment_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn basket_error_to_response(err: BasketError) -> (StatusCode, String) {
    match &err {
        BasketError::VoucherNotFound | BasketError::LineNotFound => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        BasketError::BasketFrozen => (StatusCode::CONFLICT, err.to_string()),
        BasketError::Catalog(inner) => catalog_error_to_response(inner),
        _ => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
    }
}

fn catalog_error_to_response(err: &CatalogError) -> (StatusCode, String) {
    match err {
        CatalogError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        CatalogError::VersionConflict { .. } => (StatusCode::CONFLICT, err.to_string()),
        CatalogError::DuplicateSlug { .. }
        | CatalogError::CategoryCycle
        | CatalogError::DuplicateSkuCombination
        | CatalogError::SkuVarietyMismatch => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        CatalogError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn order_error_to_response(err: OrderError) -> (StatusCode, String) {
    match &err {
        OrderError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        OrderError::IllegalStateTransition { .. }
        | OrderError::ApprovalNotWaiting { .. }
        | OrderError::AlreadyFulfilled
        | OrderError::NotEditable { .. }
        | OrderError::Conflict { .. }
        | OrderError::DuplicateIdentifier { .. } => (StatusCode::CONFLICT, err.to_string()),
        OrderError::UnknownTrackingProvider { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        OrderError::Serialization(_) | OrderError::Storage(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn payment_error_to_response(err: PaymentError) -> (StatusCode, String) {
    match &err {
        PaymentError::AlreadyRegistered | PaymentError::InconsistentCallback => {
            (StatusCode::CONFLICT, err.to_string())
        }
        PaymentError::GatewayDeclined { .. } | PaymentError::GatewayRegistrationFailed { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        PaymentError::NotCancellable | PaymentError::UnsupportedCapability { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        PaymentError::GatewayTransportError { .. } => {
            (StatusCode::BAD_GATEWAY, err.to_string())
        }
        PaymentError::Order(inner) => match inner {
            OrderError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
            OrderError::IllegalStateTransition { .. }
            | OrderError::ApprovalNotWaiting { .. }
            | OrderError::AlreadyFulfilled
            | OrderError::Conflict { .. } => (StatusCode::CONFLICT, err.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        },
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<BasketError> for ApiError {
    fn from(err: BasketError) -> Self {
        ApiError::Basket(err)
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Payment(err)
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        ApiError::Basket(BasketError::Catalog(err))
    }
}
