use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use model::{OrderId, ProductId, StatusTransitionError};
use serde::Serialize;
use service::{FieldError, ServiceError};
use tracing::{error, warn};

/// Envelope for write results and every error.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_product_ids: Vec<ProductId>,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    /// Malformed path, query or body.
    BadRequest(String),
    /// Missing or malformed caller identity.
    Unauthorized(&'static str),
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self::Service(e)
    }
}

impl From<StatusTransitionError> for ApiError {
    fn from(e: StatusTransitionError) -> Self {
        Self::Service(e.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

fn service_status(e: &ServiceError) -> StatusCode {
    match e {
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::ProductNotFound(_) | ServiceError::NotFound => StatusCode::NOT_FOUND,
        ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ServiceError::StatusTransition(StatusTransitionError::Unknown(_)) => StatusCode::BAD_REQUEST,
        ServiceError::StatusTransition(StatusTransitionError::Illegal { .. }) => StatusCode::CONFLICT,
        ServiceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => {
                warn!(%message, "malformed request");
                (StatusCode::BAD_REQUEST, ApiResponse::failure(message))
            }
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, ApiResponse::failure(message))
            }
            ApiError::Service(e) => {
                let status = service_status(&e);
                let body = match e {
                    ServiceError::Persistence(source) => {
                        // Details stay in the log.
                        error!(error = %source, "persistence failure");
                        ApiResponse::failure("internal server error")
                    }
                    ServiceError::Validation(errors) => ApiResponse {
                        errors,
                        ..ApiResponse::failure("validation failed")
                    },
                    ServiceError::ProductNotFound(ids) => ApiResponse {
                        message: Some(format!("products not found: {ids:?}")),
                        missing_product_ids: ids,
                        ..Default::default()
                    },
                    other => ApiResponse::failure(other.to_string()),
                };
                (status, body)
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::OrderStatus;
    use repository::RepositoryError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ServiceError::invalid("email", "is required"), StatusCode::BAD_REQUEST),
            (ServiceError::ProductNotFound(vec![3]), StatusCode::NOT_FOUND),
            (ServiceError::NotFound, StatusCode::NOT_FOUND),
            (ServiceError::Forbidden(1), StatusCode::FORBIDDEN),
            (
                StatusTransitionError::Unknown("lost".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                StatusTransitionError::Illegal {
                    from: OrderStatus::Delivered,
                    to: OrderStatus::Pending,
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::Persistence(RepositoryError::Storage("disk".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(service_status(&error), expected, "{error}");
        }
    }
}
