//! Error types for tagged wire decoding, encoding and codec resolution.

use std::fmt;

use thiserror::Error;

use crate::token::TokenKind;

/// One step of the location of a value inside the wire document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => write!(f, ".{name}"),
            PathSegment::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// Renders ` at $.a[0].b`, or nothing for the root.
struct PathSuffix<'a>(&'a [PathSegment]);

impl fmt::Display for PathSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        f.write_str(" at $")?;
        for segment in self.0 {
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

fn path_suffix(path: &[PathSegment]) -> PathSuffix<'_> {
    PathSuffix(path)
}

// ----------------------------------------------------------------
// Decoding

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeErrorKind {
    #[error("invalid JSON at byte {0}")]
    InvalidJson(usize),
    #[error("invalid UTF-8 in string at byte {0}")]
    InvalidUtf8(usize),
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("trailing data at byte {0}")]
    TrailingData(usize),
    #[error("invalid {tag} payload: {payload}")]
    InvalidTagPayload { tag: &'static str, payload: String },
    #[error("expected {expected}, found {actual}")]
    UnexpectedToken { expected: String, actual: TokenKind },
    #[error("missing required field `{0}`")]
    MissingField(String),
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("document {id} in {coll} is null: {cause}")]
    NullDocument {
        id: String,
        coll: String,
        cause: String,
    },
    #[error("nesting exceeds {0} levels")]
    DepthLimit(usize),
    #[error("field `{field}` was not decoded as {expected}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("failed to read input: {0}")]
    Io(String),
}

/// A decode failure together with the field path at which it happened.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}{}", path_suffix(.path))]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub path: Vec<PathSegment>,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind) -> Self {
        Self {
            kind,
            path: Vec::new(),
        }
    }

    pub fn unexpected(expected: impl Into<String>, actual: TokenKind) -> Self {
        Self::new(DecodeErrorKind::UnexpectedToken {
            expected: expected.into(),
            actual,
        })
    }

    /// Prepends `segment`; called while the error bubbles out of a container.
    pub fn within(mut self, segment: PathSegment) -> Self {
        self.path.insert(0, segment);
        self
    }
}

impl From<DecodeErrorKind> for DecodeError {
    fn from(kind: DecodeErrorKind) -> Self {
        Self::new(kind)
    }
}

// ----------------------------------------------------------------
// Encoding

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeErrorKind {
    #[error("expected a value of type {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: &'static str },
    #[error("null for non-nullable field `{0}`")]
    NullForRequired(String),
    #[error("malformed writer call sequence: {0}")]
    Structure(&'static str),
    #[error("failed to write output: {0}")]
    Io(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}{}", path_suffix(.path))]
pub struct EncodeError {
    pub kind: EncodeErrorKind,
    pub path: Vec<PathSegment>,
}

impl EncodeError {
    pub fn new(kind: EncodeErrorKind) -> Self {
        Self {
            kind,
            path: Vec::new(),
        }
    }

    pub fn within(mut self, segment: PathSegment) -> Self {
        self.path.insert(0, segment);
        self
    }
}

impl From<EncodeErrorKind> for EncodeError {
    fn from(kind: EncodeErrorKind) -> Self {
        Self::new(kind)
    }
}

// ----------------------------------------------------------------
// Resolution

/// Raised by the registry when a codec cannot be produced for a type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("no codec registered for type {0}")]
    UnresolvableType(String),
    #[error("record {record} declares both `{first}` and `{second}` as identity field")]
    DuplicateIdentity {
        record: &'static str,
        first: &'static str,
        second: &'static str,
    },
    #[error("record {record} declares wire name `{wire_name}` twice")]
    DuplicateWireName {
        record: &'static str,
        wire_name: &'static str,
    },
    #[error("codec registry dropped while resolving {0}")]
    RegistryDropped(String),
}

/// Any failure surfaced by a codec.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl Error {
    /// Attaches a path segment to decode and encode failures.
    pub fn within(self, segment: PathSegment) -> Self {
        match self {
            Error::Decode(e) => Error::Decode(e.within(segment)),
            Error::Encode(e) => Error::Encode(e.within(segment)),
            other => other,
        }
    }

    pub fn as_decode(&self) -> Option<&DecodeError> {
        match self {
            Error::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DecodeErrorKind> for Error {
    fn from(kind: DecodeErrorKind) -> Self {
        Error::Decode(DecodeError::new(kind))
    }
}

impl From<EncodeErrorKind> for Error {
    fn from(kind: EncodeErrorKind) -> Self {
        Error::Encode(EncodeError::new(kind))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_renders_path() {
        let err = DecodeError::new(DecodeErrorKind::MissingField("name".into()))
            .within(PathSegment::Field("owner".into()))
            .within(PathSegment::Index(2))
            .within(PathSegment::Field("items".into()));
        assert_eq!(
            err.to_string(),
            "missing required field `name` at $.items[2].owner"
        );
    }

    #[test]
    fn root_error_has_no_path_suffix() {
        let err = DecodeError::new(DecodeErrorKind::UnexpectedEof);
        assert_eq!(err.to_string(), "unexpected end of input");
    }
}
