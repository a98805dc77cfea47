//! Modules, document references and materialised documents.

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::value::Value;

/// A named module, e.g. a collection (`{"@mod":"Users"}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Module(String);

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Module {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentReference {
    pub id: String,
    pub coll: Module,
}

/// Reference to a schema-level document addressed by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedDocumentReference {
    pub name: String,
    pub coll: Module,
}

/// A reference the server could not resolve, with its reason.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NullDocumentReference {
    pub id: String,
    pub coll: Module,
    pub cause: String,
}

/// Any `@ref` payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    Document(DocumentReference),
    Named(NamedDocumentReference),
    Null(NullDocumentReference),
}

impl Reference {
    pub fn coll(&self) -> &Module {
        match self {
            Reference::Document(r) => &r.coll,
            Reference::Named(r) => &r.coll,
            Reference::Null(r) => &r.coll,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Reference::Null(_))
    }
}

impl From<DocumentReference> for Reference {
    fn from(r: DocumentReference) -> Self {
        Reference::Document(r)
    }
}

impl From<NamedDocumentReference> for Reference {
    fn from(r: NamedDocumentReference) -> Self {
        Reference::Named(r)
    }
}

impl From<NullDocumentReference> for Reference {
    fn from(r: NullDocumentReference) -> Self {
        Reference::Null(r)
    }
}

/// A materialised `@doc` with an `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub coll: Module,
    pub ts: Option<DateTime<Utc>>,
    pub data: IndexMap<String, Value>,
}

impl Document {
    pub fn reference(&self) -> DocumentReference {
        DocumentReference {
            id: self.id.clone(),
            coll: self.coll.clone(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

/// A materialised `@doc` addressed by `name`.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedDocument {
    pub name: String,
    pub coll: Module,
    pub ts: Option<DateTime<Utc>>,
    pub data: IndexMap<String, Value>,
}

/// A document that may come back as an unresolvable reference instead.
#[derive(Debug, Clone, PartialEq)]
pub enum NullableDocument<T> {
    Present(T),
    Null(NullDocumentReference),
}

impl<T> NullableDocument<T> {
    pub fn as_ref(&self) -> NullableDocument<&T> {
        match self {
            NullableDocument::Present(v) => NullableDocument::Present(v),
            NullableDocument::Null(r) => NullableDocument::Null(r.clone()),
        }
    }

    /// The document, or the null reference explaining its absence.
    pub fn into_result(self) -> Result<T, NullDocumentReference> {
        match self {
            NullableDocument::Present(v) => Ok(v),
            NullableDocument::Null(r) => Err(r),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, NullableDocument::Null(_))
    }
}
