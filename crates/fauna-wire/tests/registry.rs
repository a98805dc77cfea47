use std::sync::{Arc, Barrier};
use std::thread;

use fauna_wire::{
    wire_record, Codec, CodecRegistry, ConfigurationError, DecodeError, Error, Field, FieldValues,
    Record, RecordShape, Result, TaggedWriter, Token, TokenReader, TypeDescriptor, Value,
};

#[derive(Debug, Clone, PartialEq)]
struct Account {
    id: String,
    balance: i64,
}

impl Record for Account {
    const NAME: &'static str = "Account";

    fn shape() -> RecordShape<Self> {
        RecordShape::new()
            .field(Field::required("id", |a: &Account| &a.id).identity())
            .field(Field::required("balance", |a: &Account| &a.balance))
    }

    fn assemble(fields: &mut FieldValues) -> Result<Self> {
        Ok(Account {
            id: fields.take("id")?,
            balance: fields.take("balance")?,
        })
    }
}

wire_record!(Account);

/// Booleans spelled as `"yes"`/`"no"` strings.
struct YesNo;

impl Codec<bool> for YesNo {
    fn decode(&self, reader: &mut TokenReader) -> Result<bool> {
        match reader.current() {
            Token::String(s) if s == "yes" => Ok(true),
            Token::String(s) if s == "no" => Ok(false),
            other => Err(DecodeError::unexpected("yes or no", other.kind()).into()),
        }
    }

    fn encode(&self, writer: &mut TaggedWriter, value: &bool) -> Result<()> {
        Ok(writer.write_string(if *value { "yes" } else { "no" })?)
    }
}

// ── Caching ─────────────────────────────────────────────────────────────

#[test]
fn concurrent_first_use_converges_on_one_codec() {
    let registry = CodecRegistry::new();
    let threads = 8;
    let barrier = Barrier::new(threads);

    let codecs: Vec<Arc<dyn Codec<Vec<Account>>>> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    registry.get::<Vec<Account>>().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let first = &codecs[0];
    assert!(codecs.iter().all(|c| Arc::ptr_eq(first, c)));
    assert!(Arc::ptr_eq(first, &registry.get::<Vec<Account>>().unwrap()));
}

#[test]
fn concurrent_decodes_share_the_registry() {
    let registry = CodecRegistry::new();
    let results: Vec<Account> = thread::scope(|s| {
        let handles: Vec<_> = (0..4i64)
            .map(|n| {
                let registry = registry.clone();
                s.spawn(move || {
                    let body = format!(r#"{{"id":"{n}","balance":{{"@long":"{}"}}}}"#, n * 100);
                    registry.decode::<Account>(body).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(results[3], Account { id: "3".into(), balance: 300 });
}

#[test]
fn clones_share_one_cache() {
    let registry = CodecRegistry::new();
    let clone = registry.clone();
    let a = registry.get::<Account>().unwrap();
    let b = clone.get::<Account>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(clone.record_schema("Account").is_some());
}

#[test]
fn separate_registries_do_not_share() {
    let a = CodecRegistry::new().get::<Vec<String>>().unwrap();
    let b = CodecRegistry::new().get::<Vec<String>>().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
}

// ── Overrides ───────────────────────────────────────────────────────────

#[test]
fn registered_codec_replaces_the_builtin() {
    let registry = CodecRegistry::new();
    registry.register::<bool>(Arc::new(YesNo));

    assert_eq!(registry.encode(&true).unwrap(), br#""yes""#.to_vec());
    assert!(!registry.decode::<bool>(r#""no""#).unwrap());

    // Containers resolved after the override pick it up.
    let wire = registry.encode(&vec![true, false]).unwrap();
    assert_eq!(String::from_utf8(wire).unwrap(), r#"["yes","no"]"#);
}

#[test]
fn override_failure_reports_the_token() {
    let registry = CodecRegistry::new();
    registry.register::<bool>(Arc::new(YesNo));
    let err = registry.decode::<bool>("true").unwrap_err();
    assert_eq!(err.to_string(), "expected yes or no, found True");
}

#[test]
fn registered_dynamic_codec_is_used_by_descriptor() {
    struct Uppercase;

    impl Codec<Value> for Uppercase {
        fn decode(&self, reader: &mut TokenReader) -> Result<Value> {
            match reader.current() {
                Token::String(s) => Ok(Value::String(s.to_uppercase())),
                other => Err(DecodeError::unexpected("String", other.kind()).into()),
            }
        }

        fn encode(&self, writer: &mut TaggedWriter, value: &Value) -> Result<()> {
            Ok(writer.write_string(value.as_str().unwrap_or_default())?)
        }
    }

    let registry = CodecRegistry::new();
    registry.register_dynamic(TypeDescriptor::String, Arc::new(Uppercase));
    let value = registry
        .decode_dynamic(r#"["a","b"]"#, &TypeDescriptor::list(TypeDescriptor::String))
        .unwrap();
    assert_eq!(value, Value::Array(vec![Value::from("A"), Value::from("B")]));
}

// ── Resolution failures ─────────────────────────────────────────────────

#[test]
fn unregistered_record_descriptor_is_unresolvable() {
    let registry = CodecRegistry::new();
    let err = registry
        .decode_dynamic("{}", &TypeDescriptor::map(TypeDescriptor::Record("Account")))
        .unwrap_err();
    assert_eq!(
        err,
        Error::Configuration(ConfigurationError::UnresolvableType("Account".into()))
    );

    registry.register_record::<Account>().unwrap();
    let value = registry
        .decode_dynamic(
            r#"{"x":{"id":"x","balance":{"@long":"1"}}}"#,
            &TypeDescriptor::map(TypeDescriptor::Record("Account")),
        )
        .unwrap();
    assert_eq!(
        value.get("x").and_then(|a| a.get("balance")),
        Some(&Value::Long(1))
    );
}

#[test]
fn global_registry_is_shared_by_free_functions() {
    let account = Account {
        id: "g".into(),
        balance: -5,
    };
    let wire = fauna_wire::encode(&account).unwrap();
    assert_eq!(fauna_wire::decode::<Account>(wire).unwrap(), account);
    assert!(CodecRegistry::global().record_schema("Account").is_some());
}

#[test]
fn decode_from_an_open_reader() {
    let registry = CodecRegistry::new();
    let mut reader = TokenReader::new(r#"[{"@int":"1"},{"@int":"2"}]"#);
    let items: Vec<i32> = registry.decode_from(&mut reader).unwrap();
    assert_eq!(items, vec![1, 2]);
    assert_eq!(reader.next_token().unwrap(), None);
}
