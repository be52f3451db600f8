//! Service error type
//!
//! One error enum shared by all service modules; the API layer maps each
//! variant to an HTTP status.

use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("run {0} not found")]
    RunNotFound(String),

    #[error("run {0} already exists")]
    RunAlreadyExists(String),

    #[error("transfer job {0} not found")]
    TransferNotFound(Uuid),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("server is shutting down")]
    ShuttingDown,

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}
