//! Record codecs derived from a static field table.
//!
//! A record type implements [`Record`]: a name, a [`RecordShape`] listing its
//! fields with their getters, and an `assemble` function that builds the value
//! back from decoded [`FieldValues`]. [`wire_record!`](crate::wire_record)
//! connects the type to the registry.
//!
//! ```
//! use fauna_wire::{wire_record, Field, FieldValues, Record, RecordShape, Result};
//!
//! #[derive(Debug, PartialEq)]
//! struct User {
//!     id: String,
//!     name: String,
//!     email: Option<String>,
//! }
//!
//! impl Record for User {
//!     const NAME: &'static str = "User";
//!
//!     fn shape() -> RecordShape<Self> {
//!         RecordShape::new()
//!             .field(Field::required("id", |u: &User| &u.id).identity())
//!             .field(Field::required("name", |u: &User| &u.name))
//!             .field(Field::optional("email", |u: &User| &u.email))
//!     }
//!
//!     fn assemble(fields: &mut FieldValues) -> Result<Self> {
//!         Ok(User {
//!             id: fields.take("id")?,
//!             name: fields.take("name")?,
//!             email: fields.take_optional("email")?,
//!         })
//!     }
//! }
//!
//! wire_record!(User);
//!
//! let user: User = fauna_wire::decode(r#"{"id":"1","name":"Ada"}"#).unwrap();
//! assert_eq!(user.email, None);
//! ```

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use tracing::trace;

use crate::codec::builtin::read_reference;
use crate::codec::{next_field, Codec, TypeDescriptor, Wire};
use crate::document::Reference;
use crate::error::{
    ConfigurationError, DecodeError, DecodeErrorKind, EncodeErrorKind, Error, PathSegment, Result,
};
use crate::reader::TokenReader;
use crate::registry::{CodecRegistry, RegistryHandle};
use crate::tags;
use crate::token::TokenKind;
use crate::value::Value;
use crate::writer::TaggedWriter;

/// Wire name given to the identity field unless renamed.
pub const IDENTITY_WIRE_NAME: &str = "id";

/// A native type encoded as a wire object with a fixed set of fields.
pub trait Record: Sized + Send + Sync + 'static {
    /// Registry-wide name, used by [`TypeDescriptor::Record`].
    const NAME: &'static str;

    fn shape() -> RecordShape<Self>;

    fn assemble(fields: &mut FieldValues) -> Result<Self>;
}

/// Ordered field table of a record.
pub struct RecordShape<R> {
    fields: Vec<Field<R>>,
}

impl<R> Default for RecordShape<R> {
    fn default() -> Self {
        Self { fields: Vec::new() }
    }
}

impl<R> RecordShape<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: Field<R>) -> Self {
        self.fields.push(field);
        self
    }
}

enum Getter<R, T> {
    Plain(fn(&R) -> &T),
    Optional(fn(&R) -> &Option<T>),
    Maybe(fn(&R) -> Option<&T>),
}

impl<R, T> Getter<R, T> {
    fn get<'a>(&self, record: &'a R) -> Option<&'a T> {
        match self {
            Getter::Plain(f) => Some(f(record)),
            Getter::Optional(f) => f(record).as_ref(),
            Getter::Maybe(f) => f(record),
        }
    }
}

/// Type-erased access to one field of `R`.
trait Slot<R>: Send + Sync {
    fn is_absent(&self, record: &R) -> bool;

    fn encode(
        &self,
        record: &R,
        writer: &mut TaggedWriter,
        registry: &RegistryHandle,
    ) -> Result<()>;

    fn decode(
        &self,
        reader: &mut TokenReader,
        registry: &RegistryHandle,
    ) -> Result<Box<dyn Any + Send>>;

    /// Resolves the field codec now if it mentions a record whose schema the
    /// registry has not seen yet.
    fn resolve_nested(&self, registry: &CodecRegistry) -> Result<()>;
}

struct TypedSlot<R, T> {
    getter: Getter<R, T>,
    nullable: bool,
    /// Resolved on first use so a record can contain itself.
    codec: OnceLock<Arc<dyn Codec<T>>>,
}

impl<R, T: Wire> TypedSlot<R, T> {
    fn codec(&self, registry: &RegistryHandle) -> Result<Arc<dyn Codec<T>>> {
        if let Some(codec) = self.codec.get() {
            return Ok(Arc::clone(codec));
        }
        let codec = registry.upgrade(&T::descriptor())?.get::<T>()?;
        Ok(Arc::clone(self.codec.get_or_init(|| codec)))
    }
}

impl<R, T: Wire> Slot<R> for TypedSlot<R, T> {
    fn is_absent(&self, record: &R) -> bool {
        self.nullable && self.getter.get(record).is_none()
    }

    fn encode(
        &self,
        record: &R,
        writer: &mut TaggedWriter,
        registry: &RegistryHandle,
    ) -> Result<()> {
        match self.getter.get(record) {
            Some(value) => self.codec(registry)?.encode(writer, value),
            None => Ok(writer.write_null()?),
        }
    }

    fn decode(
        &self,
        reader: &mut TokenReader,
        registry: &RegistryHandle,
    ) -> Result<Box<dyn Any + Send>> {
        if !self.nullable {
            return Ok(Box::new(self.codec(registry)?.decode(reader)?));
        }
        if reader.current().kind() == TokenKind::Null {
            return Ok(Box::new(None::<T>));
        }
        Ok(Box::new(Some(self.codec(registry)?.decode(reader)?)))
    }

    fn resolve_nested(&self, registry: &CodecRegistry) -> Result<()> {
        let unseen = T::descriptor()
            .record_names()
            .into_iter()
            .any(|name| registry.record_schema(name).is_none());
        if unseen && self.codec.get().is_none() {
            let _ = self.codec.set(registry.get::<T>()?);
        }
        Ok(())
    }
}

/// One entry of a [`RecordShape`].
pub struct Field<R> {
    native_name: &'static str,
    wire_name: Option<&'static str>,
    descriptor: TypeDescriptor,
    nullable: bool,
    identity: bool,
    slot: Box<dyn Slot<R>>,
}

impl<R: 'static> Field<R> {
    fn with_getter<T: Wire>(
        native_name: &'static str,
        getter: Getter<R, T>,
        nullable: bool,
    ) -> Self {
        Self {
            native_name,
            wire_name: None,
            descriptor: T::descriptor(),
            nullable,
            identity: false,
            slot: Box::new(TypedSlot {
                getter,
                nullable,
                codec: OnceLock::new(),
            }),
        }
    }

    /// A field that must be present on the wire.
    pub fn required<T: Wire>(native_name: &'static str, get: fn(&R) -> &T) -> Self {
        Self::with_getter(native_name, Getter::Plain(get), false)
    }

    /// An `Option` field. `None` is omitted when encoding, and a missing or
    /// `null` wire field decodes as `None`.
    pub fn optional<T: Wire>(native_name: &'static str, get: fn(&R) -> &Option<T>) -> Self {
        Self::with_getter(native_name, Getter::Optional(get), true)
    }

    /// Like [`optional`](Self::optional) for fields whose presence is
    /// computed rather than stored as an `Option`.
    pub fn maybe<T: Wire>(native_name: &'static str, get: fn(&R) -> Option<&T>) -> Self {
        Self::with_getter(native_name, Getter::Maybe(get), true)
    }

    /// Renames the field on the wire.
    pub fn wire(mut self, wire_name: &'static str) -> Self {
        self.wire_name = Some(wire_name);
        self
    }

    /// Marks the field as the record's identity. Its wire name becomes `id`
    /// unless renamed with [`wire`](Self::wire).
    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    fn describe(&self) -> FieldDescriptor {
        let default_wire = if self.identity {
            IDENTITY_WIRE_NAME
        } else {
            self.native_name
        };
        FieldDescriptor {
            native_name: self.native_name,
            wire_name: self.wire_name.unwrap_or(default_wire),
            descriptor: self.descriptor.clone(),
            nullable: self.nullable,
            identity: self.identity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub native_name: &'static str,
    pub wire_name: &'static str,
    pub descriptor: TypeDescriptor,
    pub nullable: bool,
    pub identity: bool,
}

/// The field table of a record, detached from its native type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    pub name: &'static str,
    pub fields: Vec<FieldDescriptor>,
}

impl RecordSchema {
    pub fn identity(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.identity)
    }

    pub fn field(&self, wire_name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.wire_name == wire_name)
    }
}

/// Decoded field values handed to [`Record::assemble`], keyed by native name.
#[derive(Default)]
pub struct FieldValues {
    values: HashMap<&'static str, Box<dyn Any + Send>>,
}

impl FieldValues {
    pub fn contains(&self, native_name: &str) -> bool {
        self.values.contains_key(native_name)
    }

    /// Removes a required field's value.
    pub fn take<T: 'static>(&mut self, native_name: &'static str) -> Result<T> {
        let boxed = self
            .values
            .remove(native_name)
            .ok_or_else(|| {
                DecodeError::new(DecodeErrorKind::MissingField(native_name.to_string()))
            })?;
        match boxed.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(_) => Err(field_type_error::<T>(native_name)),
        }
    }

    /// Removes an optional field's value; absent fields are `None`.
    pub fn take_optional<T: 'static>(&mut self, native_name: &'static str) -> Result<Option<T>> {
        let Some(boxed) = self.values.remove(native_name) else {
            return Ok(None);
        };
        match boxed.downcast::<Option<T>>() {
            Ok(value) => Ok(*value),
            Err(_) => Err(field_type_error::<Option<T>>(native_name)),
        }
    }
}

fn field_type_error<T>(field: &'static str) -> Error {
    DecodeError::new(DecodeErrorKind::FieldType {
        field,
        expected: type_name::<T>(),
    })
    .into()
}

/// Checks the current token opens a record body and returns its closing kind.
/// A null `@ref` in place of the record fails with the reference's cause.
fn open_record(reader: &mut TokenReader) -> Result<TokenKind> {
    match reader.current().kind() {
        TokenKind::StartObject => Ok(TokenKind::EndObject),
        TokenKind::StartDocument => Ok(TokenKind::EndDocument),
        TokenKind::StartRef => match read_reference(reader)? {
            Reference::Null(r) => Err(DecodeError::new(DecodeErrorKind::NullDocument {
                id: r.id,
                coll: r.coll.to_string(),
                cause: r.cause,
            })
            .into()),
            _ => Err(DecodeError::unexpected(
                "StartObject or StartDocument",
                TokenKind::StartRef,
            )
            .into()),
        },
        other => Err(DecodeError::unexpected("StartObject or StartDocument", other).into()),
    }
}

fn validate<'a>(
    record: &'static str,
    descriptors: impl IntoIterator<Item = &'a FieldDescriptor>,
) -> Result<HashMap<&'static str, usize>, ConfigurationError> {
    let mut index = HashMap::new();
    let mut identity: Option<&'static str> = None;
    for (i, field) in descriptors.into_iter().enumerate() {
        if field.identity {
            if let Some(first) = identity {
                return Err(ConfigurationError::DuplicateIdentity {
                    record,
                    first,
                    second: field.native_name,
                });
            }
            identity = Some(field.native_name);
        }
        if index.insert(field.wire_name, i).is_some() {
            return Err(ConfigurationError::DuplicateWireName {
                record,
                wire_name: field.wire_name,
            });
        }
    }
    Ok(index)
}

/// Codec for one [`Record`] type.
pub struct RecordCodec<R> {
    slots: Vec<Box<dyn Slot<R>>>,
    fields: Vec<FieldDescriptor>,
    index: HashMap<&'static str, usize>,
    escaped: bool,
    registry: RegistryHandle,
}

impl<R: Record> RecordCodec<R> {
    pub(crate) fn derive(registry: RegistryHandle) -> Result<Self, ConfigurationError> {
        let shape = R::shape();
        let fields: Vec<FieldDescriptor> = shape.fields.iter().map(Field::describe).collect();
        let index = validate(R::NAME, &fields)?;
        let escaped = tags::needs_escape(fields.iter().map(|f| f.wire_name));
        Ok(Self {
            slots: shape.fields.into_iter().map(|f| f.slot).collect(),
            fields,
            index,
            escaped,
            registry,
        })
    }

    /// Derives every record reachable from this one's fields so their
    /// schemas can be found by name.
    pub(crate) fn resolve_nested(&self, registry: &CodecRegistry) -> Result<()> {
        for slot in &self.slots {
            slot.resolve_nested(registry)?;
        }
        Ok(())
    }

    pub fn schema(&self) -> RecordSchema {
        RecordSchema {
            name: R::NAME,
            fields: self.fields.clone(),
        }
    }
}

impl<R: Record> Codec<R> for RecordCodec<R> {
    fn decode(&self, reader: &mut TokenReader) -> Result<R> {
        let close = open_record(reader)?;
        let mut values = FieldValues::default();
        while let Some(name) = next_field(reader, close)? {
            reader.advance()?;
            let Some(&i) = self.index.get(name.as_str()) else {
                if reader.options().strict_fields {
                    return Err(DecodeError::new(DecodeErrorKind::UnknownField(name)).into());
                }
                trace!(record = R::NAME, field = %name, "skipping unknown field");
                reader.skip_value()?;
                continue;
            };
            let value = self.slots[i]
                .decode(reader, &self.registry)
                .map_err(|e| e.within(PathSegment::Field(name)))?;
            values.values.insert(self.fields[i].native_name, value);
        }
        if let Some(missing) = self
            .fields
            .iter()
            .find(|f| !f.nullable && !values.contains(f.native_name))
        {
            let kind = DecodeErrorKind::MissingField(missing.wire_name.to_string());
            return Err(DecodeError::new(kind).into());
        }
        R::assemble(&mut values)
    }

    fn encode(&self, writer: &mut TaggedWriter, value: &R) -> Result<()> {
        if self.escaped {
            writer.start_escaped_object()?;
        } else {
            writer.start_object()?;
        }
        for (slot, field) in self.slots.iter().zip(&self.fields) {
            if slot.is_absent(value) {
                continue;
            }
            writer.field_name(field.wire_name)?;
            slot.encode(value, writer, &self.registry)
                .map_err(|e| e.within(PathSegment::Field(field.wire_name.to_string())))?;
        }
        Ok(writer.end_object()?)
    }
}

/// Descriptor-driven record codec over [`Value::Object`], keyed by wire name.
pub(crate) struct DynRecordCodec {
    schema: Arc<RecordSchema>,
    index: HashMap<&'static str, usize>,
    codecs: Vec<OnceLock<Arc<dyn Codec<Value>>>>,
    escaped: bool,
    registry: RegistryHandle,
}

impl DynRecordCodec {
    pub(crate) fn new(
        schema: Arc<RecordSchema>,
        registry: RegistryHandle,
    ) -> Result<Self, ConfigurationError> {
        let index = validate(schema.name, &schema.fields)?;
        let escaped = tags::needs_escape(schema.fields.iter().map(|f| f.wire_name));
        let codecs = schema.fields.iter().map(|_| OnceLock::new()).collect();
        Ok(Self {
            schema,
            index,
            codecs,
            escaped,
            registry,
        })
    }

    fn codec(&self, i: usize) -> Result<Arc<dyn Codec<Value>>> {
        if let Some(codec) = self.codecs[i].get() {
            return Ok(Arc::clone(codec));
        }
        let descriptor = &self.schema.fields[i].descriptor;
        let codec = self.registry.upgrade(descriptor)?.get_dynamic(descriptor)?;
        Ok(Arc::clone(self.codecs[i].get_or_init(|| codec)))
    }
}

impl Codec<Value> for DynRecordCodec {
    fn decode(&self, reader: &mut TokenReader) -> Result<Value> {
        let close = open_record(reader)?;
        let mut decoded: Vec<Option<Value>> = vec![None; self.schema.fields.len()];
        while let Some(name) = next_field(reader, close)? {
            reader.advance()?;
            let Some(&i) = self.index.get(name.as_str()) else {
                if reader.options().strict_fields {
                    return Err(DecodeError::new(DecodeErrorKind::UnknownField(name)).into());
                }
                trace!(record = self.schema.name, field = %name, "skipping unknown field");
                reader.skip_value()?;
                continue;
            };
            let is_null = reader.current().kind() == TokenKind::Null;
            let value = if self.schema.fields[i].nullable && is_null {
                Value::Null
            } else {
                self.codec(i)?
                    .decode(reader)
                    .map_err(|e| e.within(PathSegment::Field(name)))?
            };
            decoded[i] = Some(value);
        }
        let mut object = IndexMap::with_capacity(decoded.len());
        for (field, value) in self.schema.fields.iter().zip(decoded) {
            match value {
                Some(value) => {
                    object.insert(field.wire_name.to_string(), value);
                }
                None if field.nullable => {}
                None => {
                    let kind = DecodeErrorKind::MissingField(field.wire_name.to_string());
                    return Err(DecodeError::new(kind).into());
                }
            }
        }
        Ok(Value::Object(object))
    }

    fn encode(&self, writer: &mut TaggedWriter, value: &Value) -> Result<()> {
        let Value::Object(map) = value else {
            return Err(EncodeErrorKind::TypeMismatch {
                expected: self.schema.name.to_string(),
                actual: value.kind_name(),
            }
            .into());
        };
        if self.escaped {
            writer.start_escaped_object()?;
        } else {
            writer.start_object()?;
        }
        for (i, field) in self.schema.fields.iter().enumerate() {
            let item = map.get(field.wire_name).unwrap_or(&Value::Null);
            if item.is_null() {
                if field.nullable {
                    continue;
                }
                let accepts_null = matches!(
                    field.descriptor,
                    TypeDescriptor::Optional(_) | TypeDescriptor::Dynamic
                );
                if !accepts_null {
                    let kind = EncodeErrorKind::NullForRequired(field.wire_name.to_string());
                    return Err(kind.into());
                }
            }
            writer.field_name(field.wire_name)?;
            self.codec(i)?
                .encode(writer, item)
                .map_err(|e| e.within(PathSegment::Field(field.wire_name.to_string())))?;
        }
        Ok(writer.end_object()?)
    }
}

/// Implements [`Wire`](crate::Wire) for one or more [`Record`] types.
#[macro_export]
macro_rules! wire_record {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::Wire for $ty {
            fn descriptor() -> $crate::TypeDescriptor {
                $crate::TypeDescriptor::Record(<$ty as $crate::Record>::NAME)
            }

            fn resolve(
                registry: &$crate::CodecRegistry,
            ) -> $crate::Result<::std::sync::Arc<dyn $crate::Codec<Self>>> {
                registry.derive_record::<$ty>()
            }
        }
    )+};
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pair {
        left: i32,
        right: i32,
    }

    impl Record for Pair {
        const NAME: &'static str = "Pair";

        fn shape() -> RecordShape<Self> {
            RecordShape::new()
                .field(Field::required("left", |p: &Pair| &p.left).identity())
                .field(Field::required("right", |p: &Pair| &p.right).identity())
        }

        fn assemble(fields: &mut FieldValues) -> Result<Self> {
            Ok(Pair {
                left: fields.take("left")?,
                right: fields.take("right")?,
            })
        }
    }

    #[test]
    fn identity_defaults_to_id_wire_name() {
        let field = Field::required("key", |p: &Pair| &p.left).identity().describe();
        assert_eq!(field.wire_name, IDENTITY_WIRE_NAME);
        let renamed = Field::required("key", |p: &Pair| &p.left)
            .identity()
            .wire("ref")
            .describe();
        assert_eq!(renamed.wire_name, "ref");
    }

    #[test]
    fn two_identity_fields_are_rejected() {
        let fields: Vec<FieldDescriptor> =
            Pair::shape().fields.iter().map(Field::describe).collect();
        let err = validate(Pair::NAME, &fields).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DuplicateIdentity {
                record: "Pair",
                first: "left",
                second: "right",
            }
        );
    }

    #[test]
    fn take_reports_wrong_type() {
        let mut values = FieldValues::default();
        values.values.insert("n", Box::new(1i32));
        let err = values.take::<String>("n").unwrap_err();
        assert!(matches!(
            err.as_decode().map(|e| &e.kind),
            Some(DecodeErrorKind::FieldType { field: "n", .. })
        ));
    }
}
