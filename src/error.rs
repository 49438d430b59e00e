use actix_web::{error::BlockingError, http::StatusCode, HttpResponse, ResponseError};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde_json::json;
use thiserror::Error;

use crate::models::{IngredientId, RecipeId, TagId, UserId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("A recipe needs at least one ingredient")]
    EmptyIngredients,

    #[error(
        "Ingredient {ingredient_id} has amount {amount}, expected a whole number from 1 to 32767"
    )]
    InvalidQuantity {
        ingredient_id: IngredientId,
        amount: i64,
    },

    #[error("Ingredient {0} is listed more than once")]
    DuplicateIngredient(IngredientId),

    #[error("Tag {0} is listed more than once")]
    DuplicateTag(TagId),

    #[error("Recipe name must be between 1 and 200 characters")]
    InvalidName,

    #[error("Recipe text must not be empty")]
    EmptyText,

    #[error("Cooking time {0} is out of range, expected 1 to 32767 minutes")]
    InvalidCookingTime(i64),

    #[error("You cannot subscribe to yourself")]
    SelfSubscription,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("Recipe {0} does not exist")]
    UnknownRecipe(RecipeId),

    #[error("Ingredient {0} does not exist")]
    UnknownIngredient(IngredientId),

    #[error("Tag {0} does not exist")]
    UnknownTag(TagId),

    #[error("User {0} does not exist")]
    UnknownUser(UserId),

    #[error("Nothing to remove")]
    EntryNotFound,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictError {
    #[error("Already added")]
    AlreadyExists,
}

/// Failures reported by a [`crate::repository::Repository`] backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Unique constraint violated")]
    UniqueViolation,

    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("Stored data is inconsistent: {0}")]
    Inconsistent(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<DieselError> for StorageError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                StorageError::UniqueViolation
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                StorageError::ForeignKeyViolation(info.message().to_string())
            }
            other => StorageError::Backend(other.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error("Authentication credentials were not provided")]
    Unauthorized,

    #[error("Only the author or an administrator may do this")]
    Forbidden,

    #[error("Malformed request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    /// Whether the error should count against the storage circuit breaker.
    /// Domain rejections do not; backend faults do.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            ServiceError::Storage(StorageError::Backend(_)) | ServiceError::Unavailable(_)
        )
    }
}

impl From<diesel::r2d2::PoolError> for ServiceError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        ServiceError::Unavailable(err.to_string())
    }
}

impl From<BlockingError> for ServiceError {
    fn from(err: BlockingError) -> Self {
        ServiceError::Unavailable(err.to_string())
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            // a duplicate add is answered like any other rejected payload
            ServiceError::Validation(_)
            | ServiceError::Conflict(_)
            | ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden => StatusCode::FORBIDDEN,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("request failed: {}", self);
        }
        HttpResponse::build(status).json(json!({ "errors": self.to_string() }))
    }
}
