//! Response envelopes.
//!
//! A successful response carries `data` next to the call's metadata; a failed
//! one carries `error` instead. Both arrive as a single JSON object:
//!
//! ```text
//! {"data": ..., "static_type": "Int", "summary": "", "txn_ts": 1702346199930000,
//!  "stats": {...}, "schema_version": 0, "query_tags": "team=a,env=test"}
//! {"error": {"code": "abort", "message": "..."}, "summary": "...", ...}
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use fauna_wire::codec::{expect_kind, next_field, read_string, ScalarCodec};
use fauna_wire::{
    wire_record, Codec, CodecRegistry, DecodeError, DecodeErrorKind, Field, FieldValues,
    PathSegment, Record, RecordShape, Result, TaggedWriter, TokenKind, TokenReader, TypeDescriptor,
    Value, Wire,
};

/// Cost counters reported for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub compute_ops: i64,
    pub read_ops: i64,
    pub write_ops: i64,
    pub query_time_ms: i64,
    pub contention_retries: i64,
    pub storage_bytes_read: i64,
    pub storage_bytes_write: i64,
    /// Which limits throttled the call, e.g. `"read"`.
    pub rate_limits_hit: Vec<String>,
}

macro_rules! counter {
    ($name:ident) => {
        Field::maybe(stringify!($name), |s: &QueryStats| Some(&s.$name))
    };
}

impl Record for QueryStats {
    const NAME: &'static str = "QueryStats";

    fn shape() -> RecordShape<Self> {
        RecordShape::new()
            .field(counter!(compute_ops))
            .field(counter!(read_ops))
            .field(counter!(write_ops))
            .field(counter!(query_time_ms))
            .field(counter!(contention_retries))
            .field(counter!(storage_bytes_read))
            .field(counter!(storage_bytes_write))
            .field(Field::maybe("rate_limits_hit", |s: &QueryStats| {
                Some(&s.rate_limits_hit).filter(|hit| !hit.is_empty())
            }))
    }

    fn assemble(fields: &mut FieldValues) -> Result<Self> {
        Ok(QueryStats {
            compute_ops: fields.take_optional("compute_ops")?.unwrap_or_default(),
            read_ops: fields.take_optional("read_ops")?.unwrap_or_default(),
            write_ops: fields.take_optional("write_ops")?.unwrap_or_default(),
            query_time_ms: fields.take_optional("query_time_ms")?.unwrap_or_default(),
            contention_retries: fields.take_optional("contention_retries")?.unwrap_or_default(),
            storage_bytes_read: fields.take_optional("storage_bytes_read")?.unwrap_or_default(),
            storage_bytes_write: fields.take_optional("storage_bytes_write")?.unwrap_or_default(),
            rate_limits_hit: fields.take_optional("rate_limits_hit")?.unwrap_or_default(),
        })
    }
}

/// A failed schema constraint, reported with `constraint_failure` errors.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintFailure {
    pub message: String,
    pub name: Option<String>,
    /// Field paths; each segment is a string key or an integer index.
    pub paths: Vec<Vec<Value>>,
}

impl Record for ConstraintFailure {
    const NAME: &'static str = "ConstraintFailure";

    fn shape() -> RecordShape<Self> {
        RecordShape::new()
            .field(Field::required("message", |c: &ConstraintFailure| &c.message))
            .field(Field::optional("name", |c: &ConstraintFailure| &c.name))
            .field(Field::maybe("paths", |c: &ConstraintFailure| {
                Some(&c.paths).filter(|paths| !paths.is_empty())
            }))
    }

    fn assemble(fields: &mut FieldValues) -> Result<Self> {
        Ok(ConstraintFailure {
            message: fields.take("message")?,
            name: fields.take_optional("name")?,
            paths: fields.take_optional("paths")?.unwrap_or_default(),
        })
    }
}

/// Broad classes of service error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The query called `abort()`.
    Abort,
    /// The query failed static checks before running.
    QueryCheck,
    QueryRuntime,
    ConstraintFailure,
    Authentication,
    Authorization,
    Contention,
    Throttling,
    Timeout,
    ServiceInternal,
    Other,
}

impl ErrorCategory {
    pub fn from_code(code: &str) -> Self {
        match code {
            "abort" => ErrorCategory::Abort,
            "invalid_query"
            | "invalid_function_definition"
            | "invalid_identifier"
            | "invalid_syntax"
            | "invalid_type" => ErrorCategory::QueryCheck,
            "invalid_argument"
            | "invalid_computed_field_access"
            | "disabled_feature"
            | "document_not_found"
            | "null_value"
            | "type_mismatch" => ErrorCategory::QueryRuntime,
            "constraint_failure" => ErrorCategory::ConstraintFailure,
            "unauthorized" => ErrorCategory::Authentication,
            "forbidden" | "permission_denied" => ErrorCategory::Authorization,
            "contended_transaction" => ErrorCategory::Contention,
            "limit_exceeded" => ErrorCategory::Throttling,
            "time_out" => ErrorCategory::Timeout,
            "internal_error" => ErrorCategory::ServiceInternal,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether resending the same request may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCategory::Contention | ErrorCategory::Throttling)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub constraint_failures: Vec<ConstraintFailure>,
    /// The value passed to `abort()`, for `abort` errors.
    pub abort: Option<Value>,
}

impl ErrorInfo {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(&self.code)
    }
}

impl Record for ErrorInfo {
    const NAME: &'static str = "ErrorInfo";

    fn shape() -> RecordShape<Self> {
        RecordShape::new()
            .field(Field::required("code", |e: &ErrorInfo| &e.code))
            .field(Field::required("message", |e: &ErrorInfo| &e.message))
            .field(Field::maybe("constraint_failures", |e: &ErrorInfo| {
                Some(&e.constraint_failures).filter(|failures| !failures.is_empty())
            }))
            .field(Field::optional("abort", |e: &ErrorInfo| &e.abort))
    }

    fn assemble(fields: &mut FieldValues) -> Result<Self> {
        Ok(ErrorInfo {
            code: fields.take("code")?,
            message: fields.take("message")?,
            constraint_failures: fields.take_optional("constraint_failures")?.unwrap_or_default(),
            abort: fields.take_optional("abort")?,
        })
    }
}

wire_record!(QueryStats, ConstraintFailure, ErrorInfo);

/// Metadata present on every response, successful or not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryInfo {
    pub summary: Option<String>,
    /// Transaction timestamp in microseconds since the epoch.
    pub txn_ts: Option<i64>,
    pub schema_version: Option<i64>,
    pub stats: Option<QueryStats>,
    pub query_tags: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuerySuccess<T> {
    pub data: T,
    pub static_type: Option<String>,
    pub info: QueryInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryFailure {
    pub error: ErrorInfo,
    pub info: QueryInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome<T> {
    Success(QuerySuccess<T>),
    Failure(QueryFailure),
}

impl<T> QueryOutcome<T> {
    pub fn info(&self) -> &QueryInfo {
        match self {
            QueryOutcome::Success(s) => &s.info,
            QueryOutcome::Failure(f) => &f.info,
        }
    }

    pub fn into_result(self) -> std::result::Result<QuerySuccess<T>, QueryFailure> {
        match self {
            QueryOutcome::Success(s) => Ok(s),
            QueryOutcome::Failure(f) => Err(f),
        }
    }
}

/// Parses the `k1=v1,k2=v2` form of `query_tags`.
pub fn parse_query_tags(raw: &str) -> IndexMap<String, String> {
    raw.split(',')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

pub fn format_query_tags(tags: &IndexMap<String, String>) -> String {
    tags.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Codec for the response object around a `data` value of type `T`.
pub struct ResponseCodec<T> {
    data: Arc<dyn Codec<T>>,
    stats: Arc<dyn Codec<QueryStats>>,
    error: Arc<dyn Codec<ErrorInfo>>,
}

impl<T: Wire> ResponseCodec<T> {
    pub fn new(registry: &CodecRegistry) -> Result<Self> {
        Ok(Self {
            data: registry.get::<T>()?,
            stats: registry.get::<QueryStats>()?,
            error: registry.get::<ErrorInfo>()?,
        })
    }
}

fn optional_string(reader: &TokenReader) -> Result<Option<String>> {
    match reader.current().kind() {
        TokenKind::Null => Ok(None),
        _ => read_string(reader).map(Some),
    }
}

fn optional_long(reader: &mut TokenReader) -> Result<Option<i64>> {
    match reader.current().kind() {
        TokenKind::Null => Ok(None),
        _ => Codec::<i64>::decode(&ScalarCodec, reader).map(Some),
    }
}

impl<T> ResponseCodec<T> {
    fn read_field(
        &self,
        reader: &mut TokenReader,
        name: &str,
        data: &mut Option<T>,
        static_type: &mut Option<String>,
        error: &mut Option<ErrorInfo>,
        info: &mut QueryInfo,
    ) -> Result<()> {
        match name {
            "data" => *data = Some(self.data.decode(reader)?),
            "static_type" => *static_type = optional_string(reader)?,
            "error" => *error = Some(self.error.decode(reader)?),
            "summary" => info.summary = optional_string(reader)?,
            "txn_ts" => info.txn_ts = optional_long(reader)?,
            "schema_version" => info.schema_version = optional_long(reader)?,
            "stats" => {
                if reader.current().kind() != TokenKind::Null {
                    info.stats = Some(self.stats.decode(reader)?);
                }
            }
            "query_tags" => {
                if let Some(raw) = optional_string(reader)? {
                    info.query_tags = parse_query_tags(&raw);
                }
            }
            other => {
                trace!(field = other, "skipping unknown response field");
                reader.skip_value()?;
            }
        }
        Ok(())
    }

    fn write_info(&self, writer: &mut TaggedWriter, info: &QueryInfo) -> Result<()> {
        if let Some(summary) = &info.summary {
            writer.field_name("summary")?;
            writer.write_string(summary)?;
        }
        // Plain JSON numbers, the way the service sends them.
        if let Some(ts) = info.txn_ts {
            writer.field_name("txn_ts")?;
            writer.write_plain_number(ts)?;
        }
        if let Some(stats) = &info.stats {
            writer.field_name("stats")?;
            self.stats.encode(writer, stats)?;
        }
        if let Some(version) = info.schema_version {
            writer.field_name("schema_version")?;
            writer.write_plain_number(version)?;
        }
        if !info.query_tags.is_empty() {
            writer.field_name("query_tags")?;
            writer.write_string(&format_query_tags(&info.query_tags))?;
        }
        Ok(())
    }
}

impl<T> Codec<QueryOutcome<T>> for ResponseCodec<T> {
    fn decode(&self, reader: &mut TokenReader) -> Result<QueryOutcome<T>> {
        expect_kind(reader, TokenKind::StartObject)?;
        let mut data = None;
        let mut static_type = None;
        let mut error = None;
        let mut info = QueryInfo::default();
        while let Some(name) = next_field(reader, TokenKind::EndObject)? {
            reader.advance()?;
            self.read_field(reader, &name, &mut data, &mut static_type, &mut error, &mut info)
                .map_err(|e| e.within(PathSegment::Field(name)))?;
        }
        if let Some(error) = error {
            debug!(code = %error.code, "query failed");
            return Ok(QueryOutcome::Failure(QueryFailure { error, info }));
        }
        match data {
            Some(data) => Ok(QueryOutcome::Success(QuerySuccess {
                data,
                static_type,
                info,
            })),
            None => Err(DecodeError::new(DecodeErrorKind::MissingField("data".into())).into()),
        }
    }

    fn encode(&self, writer: &mut TaggedWriter, value: &QueryOutcome<T>) -> Result<()> {
        writer.start_object()?;
        match value {
            QueryOutcome::Success(success) => {
                writer.field_name("data")?;
                self.data.encode(writer, &success.data)?;
                if let Some(static_type) = &success.static_type {
                    writer.field_name("static_type")?;
                    writer.write_string(static_type)?;
                }
                self.write_info(writer, &success.info)?;
            }
            QueryOutcome::Failure(failure) => {
                writer.field_name("error")?;
                self.error.encode(writer, &failure.error)?;
                self.write_info(writer, &failure.info)?;
            }
        }
        Ok(writer.end_object()?)
    }
}

impl<T: Wire> Wire for QueryOutcome<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Custom("QueryOutcome")
    }

    fn resolve(registry: &CodecRegistry) -> Result<Arc<dyn Codec<Self>>> {
        Ok(Arc::new(ResponseCodec::<T>::new(registry)?))
    }
}
