//! API handlers module

pub mod context;
pub mod health;
pub mod search;

use rankforge_common::errors::AppError;
use validator::ValidationErrors;

/// Map request DTO validation failures onto the API error type
pub(crate) fn validation_error(errors: ValidationErrors) -> AppError {
    let field = errors.field_errors().keys().next().map(|k| k.to_string());
    AppError::Validation {
        message: errors.to_string(),
        field,
    }
}
