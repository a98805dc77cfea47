use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use fauna_wire::{
    wire_record, CodecRegistry, Document, DocumentReference, Field, FieldValues, Module,
    NullDocumentReference, Record, RecordShape, Reference, Result, Value,
};
use indexmap::IndexMap;
use proptest::prelude::*;

const RESERVED: [&str; 10] = [
    "@int", "@long", "@double", "@time", "@date", "@mod", "@doc", "@ref", "@set", "@object",
];

fn key() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => "\\PC{0,8}",
        1 => prop::sample::select(RESERVED.to_vec()).prop_map(str::to_string),
    ]
}

fn finite_double() -> impl Strategy<Value = f64> {
    any::<f64>().prop_filter("finite", |d| d.is_finite())
}

fn date() -> impl Strategy<Value = NaiveDate> {
    (1i32..=9999, 1u32..=366)
        .prop_filter_map("valid ordinal", |(y, d)| NaiveDate::from_yo_opt(y, d))
}

fn time() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..253_402_300_799, 0u32..1_000_000_000).prop_filter_map("valid instant", |(secs, nanos)| {
        Utc.timestamp_opt(secs, nanos).single()
    })
}

fn module() -> impl Strategy<Value = Module> {
    "[A-Z][a-z]{0,6}".prop_map(Module::new)
}

fn reference() -> impl Strategy<Value = Reference> {
    prop_oneof![
        ("[0-9]{1,6}", module())
            .prop_map(|(id, coll)| Reference::Document(DocumentReference { id, coll })),
        ("[0-9]{1,6}", module(), "[a-z ]{1,12}")
            .prop_map(|(id, coll, cause)| {
                Reference::Null(NullDocumentReference { id, coll, cause })
            }),
    ]
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::Int),
        any::<i64>().prop_map(Value::Long),
        finite_double().prop_map(Value::Double),
        "\\PC{0,12}".prop_map(Value::String),
        date().prop_map(Value::Date),
        time().prop_map(Value::Time),
        module().prop_map(Value::Module),
        reference().prop_map(Value::Ref),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec((key(), inner.clone()), 0..6)
                .prop_map(|entries| Value::Object(entries.into_iter().collect())),
            // Letters a-h never spell a document metadata key.
            (
                "[0-9]{1,6}",
                module(),
                prop::option::of(time()),
                prop::collection::vec(("[a-h]{1,6}", inner), 0..4),
            )
                .prop_map(|(id, coll, ts, data)| {
                    Value::Document(Document {
                        id,
                        coll,
                        ts,
                        data: data.into_iter().collect(),
                    })
                }),
        ]
    })
}

#[derive(Debug, Clone, PartialEq)]
struct Sample {
    id: String,
    count: i32,
    total: i64,
    ratio: f64,
    born: NaiveDate,
    note: Option<String>,
    scores: Vec<i64>,
    labels: IndexMap<String, String>,
}

impl Record for Sample {
    const NAME: &'static str = "Sample";

    fn shape() -> RecordShape<Self> {
        RecordShape::new()
            .field(Field::required("id", |s: &Sample| &s.id).identity())
            .field(Field::required("count", |s: &Sample| &s.count).wire("@int"))
            .field(Field::required("total", |s: &Sample| &s.total))
            .field(Field::required("ratio", |s: &Sample| &s.ratio))
            .field(Field::required("born", |s: &Sample| &s.born))
            .field(Field::optional("note", |s: &Sample| &s.note))
            .field(Field::required("scores", |s: &Sample| &s.scores))
            .field(Field::required("labels", |s: &Sample| &s.labels))
    }

    fn assemble(fields: &mut FieldValues) -> Result<Self> {
        Ok(Sample {
            id: fields.take("id")?,
            count: fields.take("count")?,
            total: fields.take("total")?,
            ratio: fields.take("ratio")?,
            born: fields.take("born")?,
            note: fields.take_optional("note")?,
            scores: fields.take("scores")?,
            labels: fields.take("labels")?,
        })
    }
}

wire_record!(Sample);

fn sample() -> impl Strategy<Value = Sample> {
    (
        "[a-z0-9]{1,8}",
        any::<i32>(),
        any::<i64>(),
        finite_double(),
        date(),
        prop::option::of("\\PC{0,10}"),
        prop::collection::vec(any::<i64>(), 0..5),
        prop::collection::vec((key(), "\\PC{0,6}"), 0..5),
    )
        .prop_map(|(id, count, total, ratio, born, note, scores, labels)| Sample {
            id,
            count,
            total,
            ratio,
            born,
            note,
            scores,
            labels: labels.into_iter().collect(),
        })
}

proptest! {
    #[test]
    fn dynamic_values_round_trip(v in value()) {
        let registry = CodecRegistry::new();
        let wire = registry.encode(&v).unwrap();
        prop_assert_eq!(registry.decode::<Value>(wire).unwrap(), v);
    }

    #[test]
    fn maps_with_reserved_keys_round_trip(
        entries in prop::collection::vec((key(), any::<i32>()), 0..8)
    ) {
        let map: IndexMap<String, i32> = entries.into_iter().collect();
        let registry = CodecRegistry::new();
        let wire = registry.encode(&map).unwrap();
        let text = String::from_utf8(wire.clone()).unwrap();
        let escaped = map.keys().any(|k| RESERVED.contains(&k.as_str()));
        prop_assert_eq!(text.starts_with(r#"{"@object":"#), escaped);
        prop_assert_eq!(registry.decode::<IndexMap<String, i32>>(wire).unwrap(), map);
    }

    #[test]
    fn records_round_trip(s in sample()) {
        let registry = CodecRegistry::new();
        let wire = registry.encode(&s).unwrap();
        prop_assert_eq!(registry.decode::<Sample>(wire).unwrap(), s);
    }

    #[test]
    fn encoding_is_deterministic(v in value()) {
        let registry = CodecRegistry::new();
        let once = registry.encode(&v).unwrap();
        let again = registry.encode(&registry.decode::<Value>(once.clone()).unwrap()).unwrap();
        prop_assert_eq!(once, again);
    }
}
