//! Request bodies.

use indexmap::IndexMap;

use fauna_wire::{
    wire_record, CodecRegistry, Field, FieldValues, Record, RecordShape, Result, Value, Wire,
};

use crate::query::Query;

/// The JSON body of one query call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    pub query: Query,
    /// Named values bound alongside the query. Omitted from the body when
    /// empty.
    pub arguments: IndexMap<String, Value>,
}

impl QueryRequest {
    pub fn new(query: impl Into<Query>) -> Self {
        Self {
            query: query.into(),
            arguments: IndexMap::new(),
        }
    }

    /// Binds `value` under `name`, converted with the global registry.
    pub fn argument<T: Wire>(self, name: impl Into<String>, value: &T) -> Result<Self> {
        self.argument_with(CodecRegistry::global(), name, value)
    }

    pub fn argument_with<T: Wire>(
        mut self,
        registry: &CodecRegistry,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self> {
        self.arguments.insert(name.into(), registry.to_value(value)?);
        Ok(self)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        fauna_wire::encode(self)
    }
}

impl Record for QueryRequest {
    const NAME: &'static str = "QueryRequest";

    fn shape() -> RecordShape<Self> {
        RecordShape::new()
            .field(Field::required("query", |r: &QueryRequest| &r.query))
            .field(Field::maybe("arguments", |r: &QueryRequest| {
                Some(&r.arguments).filter(|args| !args.is_empty())
            }))
    }

    fn assemble(fields: &mut FieldValues) -> Result<Self> {
        Ok(QueryRequest {
            query: fields.take("query")?,
            arguments: fields.take_optional("arguments")?.unwrap_or_default(),
        })
    }
}

wire_record!(QueryRequest);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_arguments_are_omitted() {
        let body = QueryRequest::new("Users.all()").to_bytes().unwrap();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            r#"{"query":{"fql":["Users.all()"]}}"#
        );
    }
}
