//! Write error types.

use thiserror::Error;

pub type WriteResult<T> = Result<T, WriteError>;

#[derive(Debug, Error)]
pub enum WriteError {
    /// Transport-level failure: refused, reset, timed out, DNS.
    #[error("connection error: {0}")]
    Connection(String),

    /// The store answered but refused the batch.
    #[error("store rejected write with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Every attempt failed with a connection error.
    #[error("max retries exceeded after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    /// The client could not be built from its settings.
    #[error("store client error: {0}")]
    Client(String),
}

impl WriteError {
    /// Whether the same batch may be sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WriteError::Connection(_))
    }
}
