//! Custom error types for the geocache service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::{models::ModelError, repositories::RepoError, response};

/// Custom error type for the geocache service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid input
    #[error("{0}")]
    Validation(String),

    /// Entity lookup failed
    #[error("{0} not found!")]
    NotFound(&'static str),

    /// Username or email already taken
    #[error("{0}")]
    Conflict(String),

    /// The store rejected a write on a unique constraint
    #[error("{0}")]
    Duplicate(String),

    /// No route matches the request path
    #[error("Route not found!")]
    RouteNotFound,

    /// The route exists but not for this method
    #[error("Method not allowed!")]
    MethodNotAllowed,

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Duplicate(_) => StatusCode::CONFLICT,
            ApiError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::PasswordHash(_) => {
                error!("{}", err);
                ApiError::InternalServerError
            }
            _ => ApiError::Validation(err.to_string()),
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { constraint } => {
                warn!("Unique constraint rejected write: {}", constraint);
                let message = if constraint.contains("username") {
                    "Username already taken!"
                } else if constraint.contains("email") {
                    "Email already taken!"
                } else {
                    "Record already exists!"
                };
                ApiError::Duplicate(message.to_string())
            }
            RepoError::NotFound(entity) => ApiError::NotFound(entity),
            RepoError::Persistence(message) => {
                error!("Persistence error: {}", message);
                ApiError::InternalServerError
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        response::failure(self.to_string(), self.status())
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_the_entity() {
        let err = ApiError::NotFound("Cache");

        assert_eq!(err.to_string(), "Cache not found!");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn model_errors_are_bad_requests() {
        let err = ApiError::from(ModelError::MissingField("location"));

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Enter valid location!");
        assert_eq!(
            ApiError::from(ModelError::CreatorMismatch).to_string(),
            "Incorrect username!"
        );
    }

    #[test]
    fn duplicates_name_the_taken_field() {
        let err = ApiError::from(RepoError::Duplicate {
            constraint: "users_email_key".to_string(),
        });

        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Email already taken!");
    }

    #[test]
    fn missing_references_name_the_entity() {
        let err = ApiError::from(RepoError::NotFound("Cache"));

        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Cache not found!");
        assert_eq!(
            ApiError::from(RepoError::NotFound("User")).to_string(),
            "User not found!"
        );
    }

    #[test]
    fn method_mismatch_is_reported() {
        let err = ApiError::MethodNotAllowed;

        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.to_string(), "Method not allowed!");
    }

    #[test]
    fn persistence_details_are_not_exposed() {
        let err = ApiError::from(RepoError::Persistence("connection reset".to_string()));

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Internal server error");
    }
}
