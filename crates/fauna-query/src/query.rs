//! Composed queries and their `{"fql":[...]}` wire form.

use std::sync::Arc;

use fauna_wire::codec::{expect_kind, next_field, read_string, unexpected, DynamicCodec};
use fauna_wire::{
    Codec, CodecRegistry, DecodeError, DecodeErrorKind, PathSegment, Result, TaggedWriter,
    TokenKind, TokenReader, TypeDescriptor, Value, Wire,
};

const FQL: &str = "fql";
const VALUE: &str = "value";

/// One piece of a [`Query`].
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Query text, sent verbatim.
    Literal(String),
    /// An argument, sent as a tagged value.
    Value(Value),
    Query(Query),
}

/// An ordered list of fragments.
///
/// ```
/// use fauna_query::Query;
///
/// let query = Query::new()
///     .literal("Users.byId(")
///     .value(&42i64)
///     .unwrap()
///     .literal(")");
/// let wire = fauna_wire::encode(&query).unwrap();
/// assert_eq!(
///     String::from_utf8(wire).unwrap(),
///     r#"{"fql":["Users.byId(",{"value":{"@long":"42"}},")"]}"#
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    fragments: Vec<Fragment>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn literal(mut self, text: impl Into<String>) -> Self {
        self.fragments.push(Fragment::Literal(text.into()));
        self
    }

    /// Appends `value` as an argument, converted with the global registry.
    pub fn value<T: Wire>(self, value: &T) -> Result<Self> {
        self.value_with(CodecRegistry::global(), value)
    }

    pub fn value_with<T: Wire>(self, registry: &CodecRegistry, value: &T) -> Result<Self> {
        Ok(self.arg(registry.to_value(value)?))
    }

    pub fn arg(mut self, value: Value) -> Self {
        self.fragments.push(Fragment::Value(value));
        self
    }

    pub fn query(mut self, query: Query) -> Self {
        self.fragments.push(Fragment::Query(query));
        self
    }

    pub fn push(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Query::new().literal(text)
    }
}

impl FromIterator<Fragment> for Query {
    fn from_iter<I: IntoIterator<Item = Fragment>>(iter: I) -> Self {
        Self {
            fragments: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryCodec;

impl QueryCodec {
    /// Reads `{"fql":[...]}` with the reader on its opening brace.
    fn read_query(reader: &mut TokenReader) -> Result<Query> {
        expect_kind(reader, TokenKind::StartObject)?;
        match next_field(reader, TokenKind::EndObject)? {
            Some(name) if name == FQL => {}
            Some(name) => return Err(DecodeError::new(DecodeErrorKind::UnknownField(name)).into()),
            None => return Err(DecodeError::new(DecodeErrorKind::MissingField(FQL.into())).into()),
        }
        reader.advance()?;
        let fragments = Self::read_fragments(reader)
            .map_err(|e| e.within(PathSegment::Field(FQL.into())))?;
        if let Some(extra) = next_field(reader, TokenKind::EndObject)? {
            return Err(DecodeError::new(DecodeErrorKind::UnknownField(extra)).into());
        }
        Ok(Query { fragments })
    }

    fn read_fragments(reader: &mut TokenReader) -> Result<Vec<Fragment>> {
        expect_kind(reader, TokenKind::StartArray)?;
        let mut fragments = Vec::new();
        loop {
            let fragment = match reader.advance()?.kind() {
                TokenKind::EndArray => return Ok(fragments),
                TokenKind::String => read_string(reader).map(Fragment::Literal),
                TokenKind::StartObject => Self::read_wrapped(reader),
                _ => Err(unexpected(reader, "String or StartObject")),
            }
            .map_err(|e| e.within(PathSegment::Index(fragments.len())))?;
            fragments.push(fragment);
        }
    }

    /// `{"value": ...}` or a nested `{"fql": [...]}`, reader on the `{`.
    fn read_wrapped(reader: &mut TokenReader) -> Result<Fragment> {
        let fragment = match next_field(reader, TokenKind::EndObject)? {
            Some(name) if name == VALUE => {
                reader.advance()?;
                Fragment::Value(
                    DynamicCodec
                        .decode(reader)
                        .map_err(|e| e.within(PathSegment::Field(name)))?,
                )
            }
            Some(name) if name == FQL => {
                reader.advance()?;
                let fragments = Self::read_fragments(reader)
                    .map_err(|e| e.within(PathSegment::Field(name)))?;
                Fragment::Query(Query { fragments })
            }
            Some(name) => return Err(DecodeError::new(DecodeErrorKind::UnknownField(name)).into()),
            None => {
                return Err(DecodeError::new(DecodeErrorKind::MissingField(VALUE.into())).into())
            }
        };
        if let Some(extra) = next_field(reader, TokenKind::EndObject)? {
            return Err(DecodeError::new(DecodeErrorKind::UnknownField(extra)).into());
        }
        Ok(fragment)
    }

    fn write_query(writer: &mut TaggedWriter, query: &Query) -> Result<()> {
        writer.start_object()?;
        writer.field_name(FQL)?;
        writer.start_array()?;
        for (i, fragment) in query.fragments.iter().enumerate() {
            Self::write_fragment(writer, fragment).map_err(|e| e.within(PathSegment::Index(i)))?;
        }
        writer.end_array()?;
        Ok(writer.end_object()?)
    }

    fn write_fragment(writer: &mut TaggedWriter, fragment: &Fragment) -> Result<()> {
        match fragment {
            Fragment::Literal(text) => Ok(writer.write_string(text)?),
            Fragment::Value(value) => {
                writer.start_object()?;
                writer.field_name(VALUE)?;
                DynamicCodec.encode(writer, value)?;
                Ok(writer.end_object()?)
            }
            Fragment::Query(query) => Self::write_query(writer, query),
        }
    }
}

impl Codec<Query> for QueryCodec {
    fn decode(&self, reader: &mut TokenReader) -> Result<Query> {
        Self::read_query(reader)
    }

    fn encode(&self, writer: &mut TaggedWriter, value: &Query) -> Result<()> {
        Self::write_query(writer, value)
    }
}

impl Wire for Query {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Custom("Query")
    }

    fn resolve(_: &CodecRegistry) -> Result<Arc<dyn Codec<Self>>> {
        Ok(Arc::new(QueryCodec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_queries_are_wrapped_in_fql() {
        let inner = Query::from("Users.all()");
        let query = Query::new().literal("let u = ").query(inner).literal("; u");
        let wire = fauna_wire::encode(&query).unwrap();
        assert_eq!(
            String::from_utf8(wire).unwrap(),
            r#"{"fql":["let u = ",{"fql":["Users.all()"]},"; u"]}"#
        );
    }

    #[test]
    fn decode_rejects_other_top_level_keys() {
        let err = fauna_wire::decode::<Query>(r#"{"fql":["a"],"x":1}"#).unwrap_err();
        assert_eq!(
            err.as_decode().map(|e| &e.kind),
            Some(&DecodeErrorKind::UnknownField("x".into()))
        );
    }
}
