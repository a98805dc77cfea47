use thiserror::Error;

use crate::response::{ErrorCategory, QueryFailure};

/// Failure of one query call, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// The body could not be encoded or decoded.
    #[error(transparent)]
    Wire(#[from] fauna_wire::Error),
    /// The service answered with an error envelope.
    #[error("query failed ({}): {}", .0.error.code, .0.error.message)]
    Failed(Box<QueryFailure>),
}

impl QueryError {
    /// The service error category, if the service reported one.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            QueryError::Failed(failure) => Some(failure.error.category()),
            QueryError::Wire(_) => None,
        }
    }
}

impl From<QueryFailure> for QueryError {
    fn from(failure: QueryFailure) -> Self {
        QueryError::Failed(Box::new(failure))
    }
}
