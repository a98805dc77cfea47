//! Tagged-value wire codec for a document database driver.
//!
//! The wire format is JSON in which values plain JSON cannot carry losslessly
//! travel inside single-key wrappers:
//!
//! | Wrapper | Meaning |
//! |---|---|
//! | `{"@int":"5"}`, `{"@long":"5"}`, `{"@double":"1.5"}` | numbers |
//! | `{"@date":"2024-01-31"}`, `{"@time":"2024-01-31T00:00:00Z"}` | dates and instants |
//! | `{"@mod":"Users"}` | a module, e.g. a collection |
//! | `{"@ref":{"id":"1","coll":{"@mod":"Users"}}}` | a document reference |
//! | `{"@doc":{...}}` | a materialised document |
//! | `{"@set":{"data":[...],"after":"..."}}` | a page of results |
//! | `{"@object":{...}}` | a plain object whose keys collide with a wrapper |
//!
//! [`TokenReader`] flattens a document into [`Token`]s with wrappers already
//! recognised, and [`TaggedWriter`] produces the same shapes. Codecs sit on
//! top of both and are resolved through a [`CodecRegistry`].
//!
//! ```
//! use fauna_wire::Page;
//!
//! let page: Page<i32> =
//!     fauna_wire::decode(r#"{"@set":{"data":[{"@int":"1"}],"after":"c"}}"#).unwrap();
//! assert_eq!(page.data, vec![1]);
//! assert_eq!(page.after.as_deref(), Some("c"));
//! ```

use std::io::{Read, Write};

pub mod codec;
pub mod document;
pub mod error;
pub mod options;
pub mod page;
pub mod reader;
pub mod registry;
pub mod tags;
pub mod token;
pub mod value;
pub mod writer;

pub use codec::{
    Codec, Field, FieldDescriptor, FieldValues, Record, RecordSchema, RecordShape, TypeDescriptor,
    Wire,
};
pub use document::{
    Document, DocumentReference, Module, NamedDocument, NamedDocumentReference,
    NullDocumentReference, NullableDocument, Reference,
};
pub use error::{
    ConfigurationError, DecodeError, DecodeErrorKind, EncodeError, EncodeErrorKind, Error,
    PathSegment, Result,
};
pub use options::{DecodeOptions, EncodeOptions};
pub use page::Page;
pub use reader::{tokenize, TokenReader};
pub use registry::CodecRegistry;
pub use token::{Token, TokenKind};
pub use value::{FromValue, Value};
pub use writer::TaggedWriter;

/// Decodes one wire document with the global registry.
pub fn decode<T: Wire>(input: impl Into<Vec<u8>>) -> Result<T> {
    CodecRegistry::global().decode(input)
}

pub fn decode_with<T: Wire>(input: impl Into<Vec<u8>>, options: DecodeOptions) -> Result<T> {
    CodecRegistry::global().decode_with(input, options)
}

/// Reads one complete body from `source` and decodes it with the global
/// registry.
pub fn decode_reader<T: Wire, R: Read>(source: R) -> Result<T> {
    CodecRegistry::global().decode_reader(source)
}

/// Encodes `value` with the global registry.
pub fn encode<T: Wire>(value: &T) -> Result<Vec<u8>> {
    CodecRegistry::global().encode(value)
}

pub fn encode_to<T: Wire, W: Write>(value: &T, sink: W) -> Result<()> {
    CodecRegistry::global().encode_to(value, sink)
}

pub fn to_value<T: Wire>(value: &T) -> Result<Value> {
    CodecRegistry::global().to_value(value)
}
