//! Query fragments and the request/response envelopes around them.
//!
//! Everything here is encoded and decoded through `fauna-wire`, so argument
//! values inside a [`Query`] and the `data` of a response use the same tagged
//! format and the same [`CodecRegistry`] overrides as any other value.

use fauna_wire::{CodecRegistry, Wire};

pub mod error;
pub mod query;
pub mod request;
pub mod response;

pub use error::QueryError;
pub use query::{Fragment, Query, QueryCodec};
pub use request::QueryRequest;
pub use response::{
    format_query_tags, parse_query_tags, ConstraintFailure, ErrorCategory, ErrorInfo, QueryFailure,
    QueryInfo, QueryOutcome, QueryStats, QuerySuccess, ResponseCodec,
};

pub type Result<T, E = QueryError> = std::result::Result<T, E>;

/// Encodes a request body with the global registry.
pub fn encode_request(request: &QueryRequest) -> Result<Vec<u8>> {
    Ok(fauna_wire::encode(request)?)
}

/// Decodes a response body whose `data` is a `T`. An error envelope becomes
/// [`QueryError::Failed`].
pub fn decode_response<T: Wire>(body: impl Into<Vec<u8>>) -> Result<QuerySuccess<T>> {
    decode_response_with(CodecRegistry::global(), body)
}

pub fn decode_response_with<T: Wire>(
    registry: &CodecRegistry,
    body: impl Into<Vec<u8>>,
) -> Result<QuerySuccess<T>> {
    let outcome: QueryOutcome<T> = registry.decode(body)?;
    Ok(outcome.into_result()?)
}
