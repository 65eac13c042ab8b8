use model::{ProductId, StatusTransitionError, UserId};
use repository::RepositoryError;
use serde::Serialize;
use thiserror::Error;

/// One rejected request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// The main error type for all operations of the services in this crate.
///
/// Transactional operations have already rolled back by the time one of
/// these is returned.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing or malformed request fields.
    #[error("invalid request: {}", describe(.0))]
    Validation(Vec<FieldError>),
    /// Referenced products do not exist.
    #[error("products not found: {0:?}")]
    ProductNotFound(Vec<ProductId>),
    #[error("not found")]
    NotFound,
    /// The caller may not act on this resource.
    #[error("forbidden for user {0}")]
    Forbidden(UserId),
    #[error(transparent)]
    StatusTransition(#[from] StatusTransitionError),
    /// Storage or transaction failure.
    #[error("persistence error: {0}")]
    Persistence(#[source] RepositoryError),
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ServiceError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::ProductNotFound(_) => "product_not_found",
            Self::NotFound => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::StatusTransition(_) => "status_transition",
            Self::Persistence(_) => "persistence",
        }
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Persistence(other),
        }
    }
}
