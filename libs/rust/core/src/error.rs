//! Error taxonomy for the serving core.
//!
//! Missing models and malformed requests are expected, user-facing outcomes
//! and map to 404/422 at the HTTP edge. `NotFitted`/`NotFittable` and
//! `Internal` indicate misuse or a broken code path and fail loudly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServingError {
    #[error("model with id '{model_id}' not found")]
    ModelNotFound { model_id: String },

    #[error("failed to deserialize model artifact: {0}")]
    Deserialization(String),

    #[error("artifact type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("model has not been fitted; call fit() before predict()")]
    NotFitted,

    #[error("model cannot be fitted: {0}")]
    NotFittable(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("feature columns do not match the training schema: {0}")]
    SchemaMismatch(String),

    #[error("internal invariant violated: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ServingError {
    pub fn model_not_found(model_id: impl Into<String>) -> Self {
        Self::ModelNotFound { model_id: model_id.into() }
    }
}

pub type Result<T> = std::result::Result<T, ServingError>;
