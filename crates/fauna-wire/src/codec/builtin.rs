//! Codecs for primitives, containers, references, documents and [`Value`].

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;

use crate::codec::{expect_kind, next_field, read_string, unexpected, Codec, TypeDescriptor, Wire};
use crate::document::{
    Document, DocumentReference, Module, NamedDocument, NamedDocumentReference,
    NullDocumentReference, NullableDocument, Reference,
};
use crate::error::{DecodeError, DecodeErrorKind, EncodeErrorKind, Error, PathSegment, Result};
use crate::page::Page;
use crate::reader::TokenReader;
use crate::registry::CodecRegistry;
use crate::tags;
use crate::token::{Token, TokenKind};
use crate::value::{FromValue, Value};
use crate::writer::TaggedWriter;

/// Cause reported for `"exists": false` references that carry none.
const DEFAULT_NULL_CAUSE: &str = "document does not exist";

// ----------------------------------------------------------------
// Scalars

/// Stateless codec for every primitive type.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarCodec;

macro_rules! scalar {
    (
        $ty:ty, $descriptor:ident, $expected:literal,
        |$w:ident, $v:ident| $encode:expr,
        $($pat:pat => $out:expr),+ $(,)?
    ) => {
        impl Codec<$ty> for ScalarCodec {
            fn decode(&self, reader: &mut TokenReader) -> Result<$ty> {
                match reader.current() {
                    $($pat => Ok($out),)+
                    other => Err(DecodeError::unexpected($expected, other.kind()).into()),
                }
            }

            fn encode(&self, $w: &mut TaggedWriter, $v: &$ty) -> Result<()> {
                Ok($encode?)
            }
        }

        impl Wire for $ty {
            fn descriptor() -> TypeDescriptor {
                TypeDescriptor::$descriptor
            }

            fn resolve(_: &CodecRegistry) -> Result<Arc<dyn Codec<Self>>> {
                Ok(Arc::new(ScalarCodec))
            }
        }
    };
}

scalar!(i32, Int, "Int", |w, v| w.write_int(*v), Token::Int(i) => *i);
scalar!(
    i64, Long, "Long", |w, v| w.write_long(*v),
    Token::Int(i) => i64::from(*i),
    Token::Long(i) => *i,
);
scalar!(
    f64, Double, "Double", |w, v| w.write_double(*v),
    Token::Int(i) => f64::from(*i),
    Token::Long(i) => *i as f64,
    Token::Double(d) => *d,
);
scalar!(
    bool, Bool, "True or False", |w, v| w.write_bool(*v),
    Token::True => true,
    Token::False => false,
);
scalar!(String, String, "String", |w, v| w.write_string(v), Token::String(s) => s.clone());
scalar!(NaiveDate, Date, "Date", |w, v| w.write_date(*v), Token::Date(d) => *d);
scalar!(DateTime<Utc>, Time, "Time", |w, v| w.write_time(*v), Token::Time(t) => *t);
scalar!(
    Module,
    Module,
    "Module",
    |w, v| w.write_module(v.name()),
    Token::Module(m) => Module::new(m.as_str())
);

// ----------------------------------------------------------------
// Containers

pub struct OptionalCodec<E> {
    inner: Arc<dyn Codec<E>>,
}

impl<E> OptionalCodec<E> {
    pub fn new(inner: Arc<dyn Codec<E>>) -> Self {
        Self { inner }
    }
}

impl<E> Codec<Option<E>> for OptionalCodec<E> {
    fn decode(&self, reader: &mut TokenReader) -> Result<Option<E>> {
        if reader.current().kind() == TokenKind::Null {
            return Ok(None);
        }
        self.inner.decode(reader).map(Some)
    }

    fn encode(&self, writer: &mut TaggedWriter, value: &Option<E>) -> Result<()> {
        match value {
            Some(v) => self.inner.encode(writer, v),
            None => Ok(writer.write_null()?),
        }
    }
}

impl<E: Wire> Wire for Option<E> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::optional(E::descriptor())
    }

    fn resolve(registry: &CodecRegistry) -> Result<Arc<dyn Codec<Self>>> {
        Ok(Arc::new(OptionalCodec::new(registry.get::<E>()?)))
    }
}

/// Lists from a plain array or an inline `@set` array.
pub struct ListCodec<E> {
    inner: Arc<dyn Codec<E>>,
}

impl<E> ListCodec<E> {
    pub fn new(inner: Arc<dyn Codec<E>>) -> Self {
        Self { inner }
    }
}

impl<E> Codec<Vec<E>> for ListCodec<E> {
    fn decode(&self, reader: &mut TokenReader) -> Result<Vec<E>> {
        decode_items(reader, self.inner.as_ref())
    }

    fn encode(&self, writer: &mut TaggedWriter, value: &Vec<E>) -> Result<()> {
        encode_items(writer, self.inner.as_ref(), value)
    }
}

impl<E: Wire> Wire for Vec<E> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::list(E::descriptor())
    }

    fn resolve(registry: &CodecRegistry) -> Result<Arc<dyn Codec<Self>>> {
        Ok(Arc::new(ListCodec::new(registry.get::<E>()?)))
    }
}

pub(crate) fn decode_items<E>(reader: &mut TokenReader, inner: &dyn Codec<E>) -> Result<Vec<E>> {
    let close = match reader.current().kind() {
        TokenKind::StartArray => TokenKind::EndArray,
        TokenKind::StartSet => TokenKind::EndSet,
        _ => return Err(unexpected(reader, "StartArray or StartSet")),
    };
    let mut items = Vec::new();
    loop {
        if reader.advance()?.kind() == close {
            return Ok(items);
        }
        let index = items.len();
        let item = inner
            .decode(reader)
            .map_err(|e| e.within(PathSegment::Index(index)))?;
        items.push(item);
    }
}

pub(crate) fn encode_items<E>(
    writer: &mut TaggedWriter,
    inner: &dyn Codec<E>,
    items: &[E],
) -> Result<()> {
    writer.start_array()?;
    for (i, item) in items.iter().enumerate() {
        inner
            .encode(writer, item)
            .map_err(|e| e.within(PathSegment::Index(i)))?;
    }
    Ok(writer.end_array()?)
}

/// String-keyed maps. Objects whose keys include a reserved tag are written
/// inside `@object`.
pub struct MapCodec<M, E> {
    inner: Arc<dyn Codec<E>>,
    _map: PhantomData<fn() -> M>,
}

impl<M, E> MapCodec<M, E> {
    pub fn new(inner: Arc<dyn Codec<E>>) -> Self {
        Self {
            inner,
            _map: PhantomData,
        }
    }
}

impl<M, E> Codec<M> for MapCodec<M, E>
where
    M: Default + Extend<(String, E)>,
    for<'a> &'a M: IntoIterator<Item = (&'a String, &'a E)>,
{
    fn decode(&self, reader: &mut TokenReader) -> Result<M> {
        expect_kind(reader, TokenKind::StartObject)?;
        let mut map = M::default();
        while let Some(key) = next_field(reader, TokenKind::EndObject)? {
            reader.advance()?;
            let value = self
                .inner
                .decode(reader)
                .map_err(|e| e.within(PathSegment::Field(key.clone())))?;
            map.extend(std::iter::once((key, value)));
        }
        Ok(map)
    }

    fn encode(&self, writer: &mut TaggedWriter, value: &M) -> Result<()> {
        encode_entries(writer, self.inner.as_ref(), value)
    }
}

fn encode_entries<'a, E: 'a, I>(
    writer: &mut TaggedWriter,
    inner: &dyn Codec<E>,
    entries: I,
) -> Result<()>
where
    I: IntoIterator<Item = (&'a String, &'a E)> + Copy,
{
    if tags::needs_escape(entries.into_iter().map(|(k, _)| k.as_str())) {
        writer.start_escaped_object()?;
    } else {
        writer.start_object()?;
    }
    for (key, item) in entries {
        writer.field_name(key)?;
        inner
            .encode(writer, item)
            .map_err(|e| e.within(PathSegment::Field(key.clone())))?;
    }
    Ok(writer.end_object()?)
}

impl<E: Wire> Wire for IndexMap<String, E> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map(E::descriptor())
    }

    fn resolve(registry: &CodecRegistry) -> Result<Arc<dyn Codec<Self>>> {
        Ok(Arc::new(MapCodec::<Self, E>::new(registry.get::<E>()?)))
    }
}

impl<E: Wire> Wire for HashMap<String, E> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map(E::descriptor())
    }

    fn resolve(registry: &CodecRegistry) -> Result<Arc<dyn Codec<Self>>> {
        Ok(Arc::new(MapCodec::<Self, E>::new(registry.get::<E>()?)))
    }
}

/// `@set` pages. A plain array or inline set decodes as a page without a
/// cursor.
pub struct PageCodec<T> {
    inner: Arc<dyn Codec<T>>,
}

impl<T> PageCodec<T> {
    pub fn new(inner: Arc<dyn Codec<T>>) -> Self {
        Self { inner }
    }
}

impl<T> Codec<Page<T>> for PageCodec<T> {
    fn decode(&self, reader: &mut TokenReader) -> Result<Page<T>> {
        decode_page(reader, self.inner.as_ref())
    }

    fn encode(&self, writer: &mut TaggedWriter, value: &Page<T>) -> Result<()> {
        encode_page(writer, self.inner.as_ref(), value)
    }
}

impl<T: Wire> Wire for Page<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::page(T::descriptor())
    }

    fn resolve(registry: &CodecRegistry) -> Result<Arc<dyn Codec<Self>>> {
        Ok(Arc::new(PageCodec::new(registry.get::<T>()?)))
    }
}

fn decode_page<T>(reader: &mut TokenReader, inner: &dyn Codec<T>) -> Result<Page<T>> {
    match reader.current().kind() {
        TokenKind::StartArray | TokenKind::StartSet => {
            return decode_items(reader, inner).map(Page::single);
        }
        TokenKind::StartPage => {}
        _ => return Err(unexpected(reader, "StartPage")),
    }
    let mut page = Page::default();
    while let Some(field) = next_field(reader, TokenKind::EndPage)? {
        reader.advance()?;
        match field.as_str() {
            "data" => {
                page.data = decode_items(reader, inner)
                    .map_err(|e| e.within(PathSegment::Field(field.clone())))?;
            }
            "after" => {
                page.after = match reader.current() {
                    Token::String(cursor) => Some(cursor.clone()),
                    Token::Null => None,
                    other => {
                        return Err(Error::from(DecodeError::unexpected("String", other.kind()))
                            .within(PathSegment::Field(field.clone())));
                    }
                };
            }
            _ => reader.skip_value()?,
        }
    }
    Ok(page)
}

fn encode_page<T>(writer: &mut TaggedWriter, inner: &dyn Codec<T>, page: &Page<T>) -> Result<()> {
    writer.start_page()?;
    writer.field_name("data")?;
    encode_items(writer, inner, &page.data)
        .map_err(|e| e.within(PathSegment::Field("data".into())))?;
    if let Some(after) = &page.after {
        writer.field_name("after")?;
        writer.write_string(after)?;
    }
    Ok(writer.end_page()?)
}

// ----------------------------------------------------------------
// References

/// Decodes `@ref` payloads into any of the reference types.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceCodec;

/// Reads the `@ref` at the current token.
pub fn read_reference(reader: &mut TokenReader) -> Result<Reference> {
    expect_kind(reader, TokenKind::StartRef)?;
    let mut id = None;
    let mut name = None;
    let mut coll = None;
    let mut exists = None;
    let mut cause = None;
    while let Some(field) = next_field(reader, TokenKind::EndRef)? {
        reader.advance()?;
        let at = |e: Error| e.within(PathSegment::Field(field.clone()));
        match field.as_str() {
            "id" => id = Some(read_string(reader).map_err(at)?),
            "name" => name = Some(read_string(reader).map_err(at)?),
            "coll" => coll = Some(Codec::<Module>::decode(&ScalarCodec, reader).map_err(at)?),
            "exists" => exists = Some(Codec::<bool>::decode(&ScalarCodec, reader).map_err(at)?),
            "cause" => cause = Some(read_string(reader).map_err(at)?),
            _ => reader.skip_value()?,
        }
    }
    let coll = coll.ok_or_else(|| DecodeError::new(DecodeErrorKind::MissingField("coll".into())))?;
    if cause.is_some() || exists == Some(false) {
        let id = id
            .or(name)
            .ok_or_else(|| DecodeError::new(DecodeErrorKind::MissingField("id".into())))?;
        let cause = cause.unwrap_or_else(|| DEFAULT_NULL_CAUSE.to_string());
        return Ok(Reference::Null(NullDocumentReference { id, coll, cause }));
    }
    match (id, name) {
        (Some(id), _) => Ok(Reference::Document(DocumentReference { id, coll })),
        (None, Some(name)) => Ok(Reference::Named(NamedDocumentReference { name, coll })),
        (None, None) => Err(DecodeError::new(DecodeErrorKind::MissingField("id".into())).into()),
    }
}

pub fn write_reference(writer: &mut TaggedWriter, reference: &Reference) -> Result<()> {
    writer.start_ref()?;
    match reference {
        Reference::Document(r) => {
            writer.field_name("id")?;
            writer.write_string(&r.id)?;
            writer.field_name("coll")?;
            writer.write_module(r.coll.name())?;
        }
        Reference::Named(r) => {
            writer.field_name("name")?;
            writer.write_string(&r.name)?;
            writer.field_name("coll")?;
            writer.write_module(r.coll.name())?;
        }
        Reference::Null(r) => write_null_fields(writer, r)?,
    }
    Ok(writer.end_ref()?)
}

fn write_null_fields(writer: &mut TaggedWriter, r: &NullDocumentReference) -> Result<()> {
    writer.field_name("id")?;
    writer.write_string(&r.id)?;
    writer.field_name("coll")?;
    writer.write_module(r.coll.name())?;
    writer.field_name("exists")?;
    writer.write_bool(false)?;
    writer.field_name("cause")?;
    Ok(writer.write_string(&r.cause)?)
}

fn null_document_error(r: NullDocumentReference) -> Error {
    DecodeError::new(DecodeErrorKind::NullDocument {
        id: r.id,
        coll: r.coll.to_string(),
        cause: r.cause,
    })
    .into()
}

impl Codec<Reference> for ReferenceCodec {
    fn decode(&self, reader: &mut TokenReader) -> Result<Reference> {
        read_reference(reader)
    }

    fn encode(&self, writer: &mut TaggedWriter, value: &Reference) -> Result<()> {
        write_reference(writer, value)
    }
}

impl Codec<DocumentReference> for ReferenceCodec {
    fn decode(&self, reader: &mut TokenReader) -> Result<DocumentReference> {
        match read_reference(reader)? {
            Reference::Document(r) => Ok(r),
            Reference::Null(r) => Err(null_document_error(r)),
            Reference::Named(_) => {
                Err(DecodeError::new(DecodeErrorKind::MissingField("id".into())).into())
            }
        }
    }

    fn encode(&self, writer: &mut TaggedWriter, value: &DocumentReference) -> Result<()> {
        write_reference(writer, &Reference::Document(value.clone()))
    }
}

impl Codec<NullDocumentReference> for ReferenceCodec {
    fn decode(&self, reader: &mut TokenReader) -> Result<NullDocumentReference> {
        match read_reference(reader)? {
            Reference::Null(r) => Ok(r),
            _ => {
                Err(DecodeError::unexpected("null document reference", TokenKind::StartRef).into())
            }
        }
    }

    fn encode(&self, writer: &mut TaggedWriter, value: &NullDocumentReference) -> Result<()> {
        writer.start_ref()?;
        write_null_fields(writer, value)?;
        Ok(writer.end_ref()?)
    }
}

macro_rules! reference_wire {
    ($($ty:ty),+) => {$(
        impl Wire for $ty {
            fn descriptor() -> TypeDescriptor {
                TypeDescriptor::Ref
            }

            fn resolve(_: &CodecRegistry) -> Result<Arc<dyn Codec<Self>>> {
                Ok(Arc::new(ReferenceCodec))
            }
        }
    )+};
}

reference_wire!(Reference, DocumentReference, NullDocumentReference);

// ----------------------------------------------------------------
// Documents

/// Materialised `@doc` payloads, addressed by id or by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentCodec;

/// Reads the `@doc` at the current token into its dynamic form.
fn read_document(reader: &mut TokenReader) -> Result<Value> {
    match reader.current().kind() {
        TokenKind::StartDocument => {}
        TokenKind::StartRef => {
            return match read_reference(reader)? {
                Reference::Null(r) => Err(null_document_error(r)),
                _ => Err(DecodeError::unexpected("StartDocument", TokenKind::StartRef).into()),
            };
        }
        _ => return Err(unexpected(reader, "StartDocument")),
    }
    let mut fields = IndexMap::new();
    while let Some(field) = next_field(reader, TokenKind::EndDocument)? {
        reader.advance()?;
        let value = DynamicCodec
            .decode(reader)
            .map_err(|e| e.within(PathSegment::Field(field.clone())))?;
        fields.insert(field, value);
    }
    document_from_fields(fields)
}

fn document_from_fields(mut data: IndexMap<String, Value>) -> Result<Value> {
    let type_error = |field: &'static str, expected: &'static str| -> Error {
        DecodeError::new(DecodeErrorKind::FieldType { field, expected }).into()
    };
    let coll = match data.shift_remove("coll") {
        Some(Value::Module(m)) => m,
        Some(_) => return Err(type_error("coll", "Module")),
        None => return Err(DecodeError::new(DecodeErrorKind::MissingField("coll".into())).into()),
    };
    let ts = match data.shift_remove("ts") {
        Some(Value::Time(t)) => Some(t),
        Some(_) => return Err(type_error("ts", "Time")),
        None => None,
    };
    match data.shift_remove("id") {
        Some(Value::String(id)) => return Ok(Value::Document(Document { id, coll, ts, data })),
        Some(_) => return Err(type_error("id", "String")),
        None => {}
    }
    match data.shift_remove("name") {
        Some(Value::String(name)) => Ok(Value::NamedDocument(NamedDocument {
            name,
            coll,
            ts,
            data,
        })),
        Some(_) => Err(type_error("name", "String")),
        None => Err(DecodeError::new(DecodeErrorKind::MissingField("id".into())).into()),
    }
}

fn write_document_body(
    writer: &mut TaggedWriter,
    key_field: &str,
    key: &str,
    coll: &Module,
    ts: Option<DateTime<Utc>>,
    data: &IndexMap<String, Value>,
) -> Result<()> {
    writer.start_document()?;
    writer.field_name(key_field)?;
    writer.write_string(key)?;
    writer.field_name("coll")?;
    writer.write_module(coll.name())?;
    if let Some(ts) = ts {
        writer.field_name("ts")?;
        writer.write_time(ts)?;
    }
    for (field, value) in data {
        writer.field_name(field)?;
        DynamicCodec
            .encode(writer, value)
            .map_err(|e| e.within(PathSegment::Field(field.clone())))?;
    }
    Ok(writer.end_document()?)
}

impl Codec<Document> for DocumentCodec {
    fn decode(&self, reader: &mut TokenReader) -> Result<Document> {
        match read_document(reader)? {
            Value::Document(doc) => Ok(doc),
            _ => Err(DecodeError::new(DecodeErrorKind::MissingField("id".into())).into()),
        }
    }

    fn encode(&self, writer: &mut TaggedWriter, doc: &Document) -> Result<()> {
        write_document_body(writer, "id", &doc.id, &doc.coll, doc.ts, &doc.data)
    }
}

impl Codec<NamedDocument> for DocumentCodec {
    fn decode(&self, reader: &mut TokenReader) -> Result<NamedDocument> {
        match read_document(reader)? {
            Value::NamedDocument(doc) => Ok(doc),
            _ => Err(DecodeError::new(DecodeErrorKind::MissingField("name".into())).into()),
        }
    }

    fn encode(&self, writer: &mut TaggedWriter, doc: &NamedDocument) -> Result<()> {
        write_document_body(writer, "name", &doc.name, &doc.coll, doc.ts, &doc.data)
    }
}

impl Wire for Document {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Document
    }

    fn resolve(_: &CodecRegistry) -> Result<Arc<dyn Codec<Self>>> {
        Ok(Arc::new(DocumentCodec))
    }
}

impl Wire for NamedDocument {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Document
    }

    fn resolve(_: &CodecRegistry) -> Result<Arc<dyn Codec<Self>>> {
        Ok(Arc::new(DocumentCodec))
    }
}

/// Wraps a document codec so an unresolvable `@ref` decodes to
/// [`NullableDocument::Null`] instead of failing.
pub struct NullableDocumentCodec<T> {
    inner: Arc<dyn Codec<T>>,
}

impl<T> NullableDocumentCodec<T> {
    pub fn new(inner: Arc<dyn Codec<T>>) -> Self {
        Self { inner }
    }
}

impl<T> Codec<NullableDocument<T>> for NullableDocumentCodec<T> {
    fn decode(&self, reader: &mut TokenReader) -> Result<NullableDocument<T>> {
        if reader.current().kind() != TokenKind::StartRef {
            return self.inner.decode(reader).map(NullableDocument::Present);
        }
        match read_reference(reader)? {
            Reference::Null(r) => Ok(NullableDocument::Null(r)),
            _ => Err(DecodeError::unexpected(
                "StartDocument or null reference",
                TokenKind::StartRef,
            )
            .into()),
        }
    }

    fn encode(&self, writer: &mut TaggedWriter, value: &NullableDocument<T>) -> Result<()> {
        match value {
            NullableDocument::Present(doc) => self.inner.encode(writer, doc),
            NullableDocument::Null(r) => {
                Codec::<NullDocumentReference>::encode(&ReferenceCodec, writer, r)
            }
        }
    }
}

impl<T: Wire> Wire for NullableDocument<T> {
    fn descriptor() -> TypeDescriptor {
        T::descriptor()
    }

    fn resolve(registry: &CodecRegistry) -> Result<Arc<dyn Codec<Self>>> {
        Ok(Arc::new(NullableDocumentCodec::new(registry.get::<T>()?)))
    }
}

// ----------------------------------------------------------------
// Dynamic values

/// Decodes any token sequence into a [`Value`] and writes any `Value` back.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicCodec;

impl Codec<Value> for DynamicCodec {
    fn decode(&self, reader: &mut TokenReader) -> Result<Value> {
        let value = match reader.current() {
            Token::Null => Value::Null,
            Token::True => Value::Bool(true),
            Token::False => Value::Bool(false),
            Token::Int(i) => Value::Int(*i),
            Token::Long(i) => Value::Long(*i),
            Token::Double(d) => Value::Double(*d),
            Token::String(s) => Value::String(s.clone()),
            Token::Date(d) => Value::Date(*d),
            Token::Time(t) => Value::Time(*t),
            Token::Module(m) => Value::Module(Module::new(m.as_str())),
            Token::StartArray | Token::StartSet => {
                Value::Array(decode_items::<Value>(reader, self)?)
            }
            Token::StartPage => Value::Page(decode_page::<Value>(reader, self)?),
            Token::StartRef => Value::Ref(read_reference(reader)?),
            Token::StartDocument => read_document(reader)?,
            Token::StartObject => {
                let mut map = IndexMap::new();
                while let Some(key) = next_field(reader, TokenKind::EndObject)? {
                    reader.advance()?;
                    let value = self
                        .decode(reader)
                        .map_err(|e| e.within(PathSegment::Field(key.clone())))?;
                    map.insert(key, value);
                }
                Value::Object(map)
            }
            other => return Err(DecodeError::unexpected("a value", other.kind()).into()),
        };
        Ok(value)
    }

    fn encode(&self, writer: &mut TaggedWriter, value: &Value) -> Result<()> {
        match value {
            Value::Null => writer.write_null()?,
            Value::Bool(b) => writer.write_bool(*b)?,
            Value::Int(i) => writer.write_int(*i)?,
            Value::Long(i) => writer.write_long(*i)?,
            Value::Double(d) => writer.write_double(*d)?,
            Value::String(s) => writer.write_string(s)?,
            Value::Date(d) => writer.write_date(*d)?,
            Value::Time(t) => writer.write_time(*t)?,
            Value::Module(m) => writer.write_module(m.name())?,
            Value::Array(items) => encode_items::<Value>(writer, self, items)?,
            Value::Object(map) => encode_entries::<Value, _>(writer, self, map)?,
            Value::Ref(r) => write_reference(writer, r)?,
            Value::Document(doc) => Codec::<Document>::encode(&DocumentCodec, writer, doc)?,
            Value::NamedDocument(doc) => {
                Codec::<NamedDocument>::encode(&DocumentCodec, writer, doc)?
            }
            Value::Page(page) => encode_page::<Value>(writer, self, page)?,
        }
        Ok(())
    }
}

impl Wire for Value {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Dynamic
    }

    fn resolve(_: &CodecRegistry) -> Result<Arc<dyn Codec<Self>>> {
        Ok(Arc::new(DynamicCodec))
    }
}

/// Restricts [`DynamicCodec`] to `@doc` values.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DocumentValueCodec;

impl Codec<Value> for DocumentValueCodec {
    fn decode(&self, reader: &mut TokenReader) -> Result<Value> {
        read_document(reader)
    }

    fn encode(&self, writer: &mut TaggedWriter, value: &Value) -> Result<()> {
        match value {
            Value::Document(_) | Value::NamedDocument(_) => DynamicCodec.encode(writer, value),
            other => Err(EncodeErrorKind::TypeMismatch {
                expected: TypeDescriptor::Document.to_string(),
                actual: other.kind_name(),
            }
            .into()),
        }
    }
}

/// Exposes a typed codec as a `Codec<Value>` for descriptor-driven callers.
pub struct Lift<T> {
    inner: Arc<dyn Codec<T>>,
    descriptor: TypeDescriptor,
}

impl<T> Lift<T> {
    pub fn new(inner: Arc<dyn Codec<T>>, descriptor: TypeDescriptor) -> Self {
        Self { inner, descriptor }
    }
}

impl<T> Codec<Value> for Lift<T>
where
    T: Into<Value> + FromValue,
{
    fn decode(&self, reader: &mut TokenReader) -> Result<Value> {
        self.inner.decode(reader).map(Into::into)
    }

    fn encode(&self, writer: &mut TaggedWriter, value: &Value) -> Result<()> {
        let native = T::from_value(value).ok_or_else(|| EncodeErrorKind::TypeMismatch {
            expected: self.descriptor.to_string(),
            actual: value.kind_name(),
        })?;
        self.inner.encode(writer, &native)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_first(input: &str) -> TokenReader {
        let mut reader = TokenReader::new(input);
        reader.advance().unwrap();
        reader
    }

    #[test]
    fn long_widens_int_but_int_rejects_long() {
        let mut reader = at_first(r#"{"@int":"7"}"#);
        assert_eq!(Codec::<i64>::decode(&ScalarCodec, &mut reader).unwrap(), 7);

        let mut reader = at_first(r#"{"@long":"7"}"#);
        let err = Codec::<i32>::decode(&ScalarCodec, &mut reader).unwrap_err();
        assert_eq!(
            err.as_decode().map(|e| &e.kind),
            Some(&DecodeErrorKind::UnexpectedToken {
                expected: "Int".into(),
                actual: TokenKind::Long,
            })
        );
    }

    #[test]
    fn exists_false_without_cause_gets_default_cause() {
        let mut reader = at_first(r#"{"@ref":{"id":"1","coll":{"@mod":"C"},"exists":false}}"#);
        let r = Codec::<NullDocumentReference>::decode(&ReferenceCodec, &mut reader).unwrap();
        assert_eq!(r.cause, DEFAULT_NULL_CAUSE);
    }

    #[test]
    fn document_requires_coll() {
        let mut reader = at_first(r#"{"@doc":{"id":"1"}}"#);
        let err = Codec::<Document>::decode(&DocumentCodec, &mut reader).unwrap_err();
        assert_eq!(
            err.as_decode().map(|e| &e.kind),
            Some(&DecodeErrorKind::MissingField("coll".into()))
        );
    }

    #[test]
    fn lift_reports_mismatched_value() {
        let lift = Lift::<i32>::new(Arc::new(ScalarCodec), TypeDescriptor::Int);
        let mut writer = TaggedWriter::new();
        let err = lift.encode(&mut writer, &Value::from("x")).unwrap_err();
        assert!(matches!(
            err,
            Error::Encode(e) if e.kind == EncodeErrorKind::TypeMismatch {
                expected: "Int".into(),
                actual: "String",
            }
        ));
    }
}
