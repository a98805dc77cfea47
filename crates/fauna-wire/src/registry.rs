//! Codec registry with a concurrent populate-on-first-use cache.

use std::any::{Any, TypeId};
use std::io::{Read, Write};
use std::sync::{Arc, OnceLock, Weak};

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::codec::builtin::DocumentValueCodec;
use crate::codec::record::DynRecordCodec;
use crate::codec::{
    Codec, DynamicCodec, Lift, ListCodec, MapCodec, OptionalCodec, PageCodec, Record, RecordCodec,
    RecordSchema, ScalarCodec, TypeDescriptor, Wire,
};
use crate::document::{Module, Reference};
use crate::error::{ConfigurationError, Result};
use crate::options::{DecodeOptions, EncodeOptions};
use crate::page::Page;
use crate::reader::TokenReader;
use crate::value::Value;
use crate::writer::TaggedWriter;

type AnyCodec = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
pub(crate) struct RegistryInner {
    /// `TypeId::of::<T>()` to an `Arc<dyn Codec<T>>`, boxed as `Any`.
    typed: DashMap<TypeId, AnyCodec>,
    dynamic: DashMap<TypeDescriptor, Arc<dyn Codec<Value>>>,
    records: DashMap<&'static str, Arc<RecordSchema>>,
}

/// Non-owning link from a derived codec back to its registry.
#[derive(Clone)]
pub(crate) struct RegistryHandle(Weak<RegistryInner>);

impl RegistryHandle {
    pub(crate) fn upgrade(
        &self,
        resolving: &TypeDescriptor,
    ) -> Result<CodecRegistry, ConfigurationError> {
        self.0
            .upgrade()
            .map(|inner| CodecRegistry { inner })
            .ok_or_else(|| ConfigurationError::RegistryDropped(resolving.to_string()))
    }
}

/// Resolves and caches codecs by native type or by [`TypeDescriptor`].
///
/// Cloning is cheap and clones share one cache. Codecs are built on first
/// request and kept for the life of the registry; concurrent first requests
/// for the same type all receive the instance that was stored first.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    inner: Arc<RegistryInner>,
}

static GLOBAL: OnceLock<CodecRegistry> = OnceLock::new();

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by the crate-level free functions.
    pub fn global() -> &'static CodecRegistry {
        GLOBAL.get_or_init(CodecRegistry::new)
    }

    fn handle(&self) -> RegistryHandle {
        RegistryHandle(Arc::downgrade(&self.inner))
    }

    // ----------------------------------------------------------------
    // Typed lookup

    pub fn get<T: Wire>(&self) -> Result<Arc<dyn Codec<T>>> {
        let key = TypeId::of::<T>();
        let cached = self.inner.typed.get(&key).map(|entry| Arc::clone(entry.value()));
        if let Some(cached) = cached {
            return downcast::<T>(cached);
        }
        // Built without holding a shard lock: element lookups re-enter `get`.
        trace!(codec = %T::descriptor(), "resolving codec");
        let built: AnyCodec = Arc::new(T::resolve(self)?);
        let stored = Arc::clone(self.inner.typed.entry(key).or_insert(built).value());
        downcast::<T>(stored)
    }

    /// Installs `codec` for `T`, replacing any cached one. Containers already
    /// resolved against the previous codec keep using it.
    pub fn register<T: Wire>(&self, codec: Arc<dyn Codec<T>>) {
        debug!(codec = %T::descriptor(), "registering codec override");
        self.inner.typed.insert(TypeId::of::<T>(), Arc::new(codec));
    }

    /// Builds a fresh codec for record `R` and records its schema for
    /// descriptor lookups. Called from `Wire::resolve` of record types.
    pub fn derive_record<R: Record>(&self) -> Result<Arc<dyn Codec<R>>> {
        let codec = RecordCodec::<R>::derive(self.handle())?;
        let schema = codec.schema();
        debug!(record = R::NAME, fields = schema.fields.len(), "derived record codec");
        self.inner
            .records
            .entry(R::NAME)
            .or_insert_with(|| Arc::new(schema));
        // Walk the fields only once the own schema is stored so that
        // self-referential records see it and stop.
        codec.resolve_nested(self)?;
        Ok(Arc::new(codec))
    }

    /// Resolves record `R` ahead of use so its schema is available by name.
    pub fn register_record<R: Record + Wire>(&self) -> Result<()> {
        self.get::<R>().map(drop)
    }

    pub fn record_schema(&self, name: &str) -> Option<Arc<RecordSchema>> {
        self.inner.records.get(name).map(|entry| Arc::clone(entry.value()))
    }

    // ----------------------------------------------------------------
    // Descriptor lookup

    pub fn get_dynamic(&self, descriptor: &TypeDescriptor) -> Result<Arc<dyn Codec<Value>>> {
        let cached = self
            .inner
            .dynamic
            .get(descriptor)
            .map(|entry| Arc::clone(entry.value()));
        if let Some(cached) = cached {
            return Ok(cached);
        }
        trace!(codec = %descriptor, "resolving dynamic codec");
        let built = self.resolve_dynamic(descriptor)?;
        Ok(Arc::clone(
            self.inner
                .dynamic
                .entry(descriptor.clone())
                .or_insert(built)
                .value(),
        ))
    }

    pub fn register_dynamic(&self, descriptor: TypeDescriptor, codec: Arc<dyn Codec<Value>>) {
        debug!(codec = %descriptor, "registering dynamic codec override");
        self.inner.dynamic.insert(descriptor, codec);
    }

    fn resolve_dynamic(&self, descriptor: &TypeDescriptor) -> Result<Arc<dyn Codec<Value>>> {
        fn lift<T>(codec: Arc<dyn Codec<T>>, descriptor: &TypeDescriptor) -> Arc<dyn Codec<Value>>
        where
            T: Into<Value> + crate::value::FromValue + 'static,
        {
            Arc::new(Lift::new(codec, descriptor.clone()))
        }

        let codec: Arc<dyn Codec<Value>> = match descriptor {
            TypeDescriptor::Int => lift::<i32>(Arc::new(ScalarCodec), descriptor),
            TypeDescriptor::Long => lift::<i64>(Arc::new(ScalarCodec), descriptor),
            TypeDescriptor::Double => lift::<f64>(Arc::new(ScalarCodec), descriptor),
            TypeDescriptor::Bool => lift::<bool>(Arc::new(ScalarCodec), descriptor),
            TypeDescriptor::String => lift::<String>(Arc::new(ScalarCodec), descriptor),
            TypeDescriptor::Date => lift::<NaiveDate>(Arc::new(ScalarCodec), descriptor),
            TypeDescriptor::Time => lift::<DateTime<Utc>>(Arc::new(ScalarCodec), descriptor),
            TypeDescriptor::Module => lift::<Module>(Arc::new(ScalarCodec), descriptor),
            TypeDescriptor::Ref => {
                lift::<Reference>(Arc::new(crate::codec::ReferenceCodec), descriptor)
            }
            TypeDescriptor::Document => Arc::new(DocumentValueCodec),
            TypeDescriptor::Dynamic => Arc::new(DynamicCodec),
            TypeDescriptor::Optional(inner) => {
                let element = self.get_dynamic(inner)?;
                lift::<Option<Value>>(Arc::new(OptionalCodec::new(element)), descriptor)
            }
            TypeDescriptor::List(inner) => {
                let element = self.get_dynamic(inner)?;
                lift::<Vec<Value>>(Arc::new(ListCodec::new(element)), descriptor)
            }
            TypeDescriptor::Map(inner) => {
                let element = self.get_dynamic(inner)?;
                lift::<IndexMap<String, Value>>(
                    Arc::new(MapCodec::<IndexMap<String, Value>, Value>::new(element)),
                    descriptor,
                )
            }
            TypeDescriptor::Page(inner) => {
                let element = self.get_dynamic(inner)?;
                lift::<Page<Value>>(Arc::new(PageCodec::new(element)), descriptor)
            }
            TypeDescriptor::Record(name) => {
                let schema = self
                    .record_schema(name)
                    .ok_or_else(|| ConfigurationError::UnresolvableType(descriptor.to_string()))?;
                Arc::new(DynRecordCodec::new(schema, self.handle())?)
            }
            TypeDescriptor::Custom(_) => {
                return Err(ConfigurationError::UnresolvableType(descriptor.to_string()).into());
            }
        };
        Ok(codec)
    }

    // ----------------------------------------------------------------
    // Entry points

    pub fn decode<T: Wire>(&self, input: impl Into<Vec<u8>>) -> Result<T> {
        self.decode_with(input, DecodeOptions::default())
    }

    pub fn decode_with<T: Wire>(
        &self,
        input: impl Into<Vec<u8>>,
        options: DecodeOptions,
    ) -> Result<T> {
        let mut reader = TokenReader::with_options(input, options);
        self.decode_from(&mut reader)
    }

    /// Reads one complete body from `source` and decodes it.
    pub fn decode_reader<T: Wire, R: Read>(&self, source: R) -> Result<T> {
        let mut reader = TokenReader::from_reader(source, DecodeOptions::default())?;
        self.decode_from(&mut reader)
    }

    /// Decodes the whole remaining document held by `reader`.
    pub fn decode_from<T: Wire>(&self, reader: &mut TokenReader) -> Result<T> {
        let codec = self.get::<T>()?;
        reader.advance()?;
        let value = codec.decode(reader)?;
        reader.finish()?;
        Ok(value)
    }

    pub fn decode_dynamic(
        &self,
        input: impl Into<Vec<u8>>,
        descriptor: &TypeDescriptor,
    ) -> Result<Value> {
        let codec = self.get_dynamic(descriptor)?;
        let mut reader = TokenReader::new(input);
        reader.advance()?;
        let value = codec.decode(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }

    pub fn encode<T: Wire>(&self, value: &T) -> Result<Vec<u8>> {
        self.encode_with(value, &EncodeOptions::default())
    }

    pub fn encode_with<T: Wire>(&self, value: &T, options: &EncodeOptions) -> Result<Vec<u8>> {
        let mut writer = TaggedWriter::with_options(options);
        self.get::<T>()?.encode(&mut writer, value)?;
        Ok(writer.finish()?)
    }

    pub fn encode_to<T: Wire, W: Write>(&self, value: &T, sink: W) -> Result<()> {
        let mut writer = TaggedWriter::new();
        self.get::<T>()?.encode(&mut writer, value)?;
        Ok(writer.finish_to(sink)?)
    }

    pub fn encode_dynamic(&self, value: &Value, descriptor: &TypeDescriptor) -> Result<Vec<u8>> {
        let mut writer = TaggedWriter::new();
        self.get_dynamic(descriptor)?.encode(&mut writer, value)?;
        Ok(writer.finish()?)
    }

    /// Converts a native value into its dynamic form through the wire.
    pub fn to_value<T: Wire>(&self, value: &T) -> Result<Value> {
        let bytes = self.encode(value)?;
        self.decode::<Value>(bytes)
    }
}

fn downcast<T: Wire>(codec: AnyCodec) -> Result<Arc<dyn Codec<T>>> {
    codec
        .downcast_ref::<Arc<dyn Codec<T>>>()
        .map(Arc::clone)
        .ok_or_else(|| ConfigurationError::UnresolvableType(T::descriptor().to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lookup_hits_cache() {
        let registry = CodecRegistry::new();
        let a = registry.get::<Vec<i64>>().unwrap();
        let b = registry.get::<Vec<i64>>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn unknown_record_descriptor_is_a_configuration_error() {
        let registry = CodecRegistry::new();
        let err = registry
            .get_dynamic(&TypeDescriptor::Record("Nope"))
            .err()
            .unwrap();
        assert_eq!(
            err,
            crate::Error::Configuration(ConfigurationError::UnresolvableType("Nope".into()))
        );
    }

    #[test]
    fn custom_descriptor_needs_a_registered_codec() {
        let registry = CodecRegistry::new();
        let custom = TypeDescriptor::Custom("Query");
        assert!(registry.get_dynamic(&custom).is_err());
        registry.register_dynamic(custom.clone(), Arc::new(DynamicCodec));
        assert!(registry.get_dynamic(&custom).is_ok());
    }

    #[test]
    fn dangling_handle_reports_dropped_registry() {
        let handle = CodecRegistry::new().handle();
        let err = handle.upgrade(&TypeDescriptor::Int).err().unwrap();
        assert_eq!(err, ConfigurationError::RegistryDropped("Int".into()));
    }
}
