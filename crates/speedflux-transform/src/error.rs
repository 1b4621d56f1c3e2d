//! Transformation error types.

use thiserror::Error;

pub type TransformResult<T> = Result<T, TransformError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    /// A field the record layout requires was absent from the payload.
    #[error("required field missing from probe payload: {0}")]
    MissingField(&'static str),
}
