//! Codec traits and type descriptors.
//!
//! A [`Codec<T>`] converts between the token/writer view of the wire and one
//! native type. Codecs are resolved through a
//! [`CodecRegistry`](crate::CodecRegistry): typed lookups go through the
//! [`Wire`] trait, dynamic lookups through a [`TypeDescriptor`].
//!
//! Every codec follows the same cursor convention. On entry to `decode` the
//! reader's current token is the first token of the value; on return it is the
//! value's last token (the scalar itself, or the matching `End*`).

use std::fmt;
use std::sync::Arc;

use crate::error::{DecodeError, Result};
use crate::reader::TokenReader;
use crate::registry::CodecRegistry;
use crate::token::{Token, TokenKind};
use crate::writer::TaggedWriter;

pub mod builtin;
pub mod record;

pub use builtin::{
    DocumentCodec, DynamicCodec, Lift, ListCodec, MapCodec, NullableDocumentCodec, OptionalCodec,
    PageCodec, ReferenceCodec, ScalarCodec,
};
pub use record::{
    Field, FieldDescriptor, FieldValues, Record, RecordCodec, RecordSchema, RecordShape,
};

/// Paired decode and encode logic for one native type.
pub trait Codec<T>: Send + Sync {
    fn decode(&self, reader: &mut TokenReader) -> Result<T>;

    fn encode(&self, writer: &mut TaggedWriter, value: &T) -> Result<()>;
}

/// A native type the registry knows how to build a codec for.
///
/// Implemented for the primitives and containers in this crate; records get
/// an implementation from [`wire_record!`](crate::wire_record).
pub trait Wire: Sized + Send + Sync + 'static {
    fn descriptor() -> TypeDescriptor;

    /// Builds a fresh codec. Element codecs are looked up through `registry`
    /// so overrides registered there are honoured.
    fn resolve(registry: &CodecRegistry) -> Result<Arc<dyn Codec<Self>>>;
}

/// Runtime description of a codec's native shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Int,
    Long,
    Double,
    Bool,
    String,
    Date,
    Time,
    Module,
    Ref,
    Document,
    /// Any wire value, decoded into [`Value`](crate::Value).
    Dynamic,
    Optional(Box<TypeDescriptor>),
    List(Box<TypeDescriptor>),
    Map(Box<TypeDescriptor>),
    Page(Box<TypeDescriptor>),
    /// A record, by its [`Record::NAME`].
    Record(&'static str),
    /// A type with a hand-written codec. Descriptor lookups only find it
    /// once a dynamic codec has been registered under this name.
    Custom(&'static str),
}

impl TypeDescriptor {
    pub fn optional(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Optional(Box::new(inner))
    }

    pub fn list(inner: TypeDescriptor) -> Self {
        TypeDescriptor::List(Box::new(inner))
    }

    pub fn map(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Map(Box::new(inner))
    }

    pub fn page(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Page(Box::new(inner))
    }

    /// The record names this descriptor mentions, looking through containers.
    pub fn record_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        self.collect_record_names(&mut names);
        names
    }

    fn collect_record_names(&self, names: &mut Vec<&'static str>) {
        match self {
            TypeDescriptor::Record(name) => names.push(*name),
            TypeDescriptor::Optional(inner)
            | TypeDescriptor::List(inner)
            | TypeDescriptor::Map(inner)
            | TypeDescriptor::Page(inner) => inner.collect_record_names(names),
            _ => {}
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Int => f.write_str("Int"),
            TypeDescriptor::Long => f.write_str("Long"),
            TypeDescriptor::Double => f.write_str("Double"),
            TypeDescriptor::Bool => f.write_str("Bool"),
            TypeDescriptor::String => f.write_str("String"),
            TypeDescriptor::Date => f.write_str("Date"),
            TypeDescriptor::Time => f.write_str("Time"),
            TypeDescriptor::Module => f.write_str("Module"),
            TypeDescriptor::Ref => f.write_str("Ref"),
            TypeDescriptor::Document => f.write_str("Document"),
            TypeDescriptor::Dynamic => f.write_str("Dynamic"),
            TypeDescriptor::Optional(inner) => write!(f, "Optional<{inner}>"),
            TypeDescriptor::List(inner) => write!(f, "List<{inner}>"),
            TypeDescriptor::Map(inner) => write!(f, "Map<String, {inner}>"),
            TypeDescriptor::Page(inner) => write!(f, "Page<{inner}>"),
            TypeDescriptor::Record(name) | TypeDescriptor::Custom(name) => f.write_str(name),
        }
    }
}

/// Fails unless the current token has kind `expected`.
pub fn expect_kind(reader: &TokenReader, expected: TokenKind) -> Result<()> {
    let actual = reader.current().kind();
    if actual == expected {
        Ok(())
    } else {
        Err(DecodeError::unexpected(expected.name(), actual).into())
    }
}

/// Mismatch error against the current token.
pub fn unexpected(reader: &TokenReader, expected: &str) -> crate::Error {
    DecodeError::unexpected(expected, reader.current().kind()).into()
}

/// Advances to the next field of the object being read.
///
/// Returns the field name with the reader on it, or `None` once `close` has
/// been reached.
pub fn next_field(reader: &mut TokenReader, close: TokenKind) -> Result<Option<String>> {
    match reader.advance()? {
        Token::FieldName(name) => Ok(Some(name.clone())),
        token if token.kind() == close => Ok(None),
        token => Err(DecodeError::unexpected(
            format!("FieldName or {close}"),
            token.kind(),
        )
        .into()),
    }
}

/// Reads the current token as a string.
pub fn read_string(reader: &TokenReader) -> Result<String> {
    match reader.current() {
        Token::String(s) => Ok(s.clone()),
        other => Err(DecodeError::unexpected("String", other.kind()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_render_nested_shapes() {
        let d = TypeDescriptor::map(TypeDescriptor::list(TypeDescriptor::optional(
            TypeDescriptor::Record("User"),
        )));
        assert_eq!(d.to_string(), "Map<String, List<Optional<User>>>");
    }

    #[test]
    fn next_field_stops_at_close() {
        let mut reader = TokenReader::new(r#"{"a":1}"#);
        reader.advance().unwrap();
        assert_eq!(
            next_field(&mut reader, TokenKind::EndObject).unwrap(),
            Some("a".to_string())
        );
        reader.advance().unwrap();
        assert_eq!(next_field(&mut reader, TokenKind::EndObject).unwrap(), None);
    }
}
