use chrono::{NaiveDate, TimeZone, Utc};
use fauna_wire::{tokenize, DecodeErrorKind, DecodeOptions, Token, TokenKind, TokenReader};

fn field(name: &str) -> Token {
    Token::FieldName(name.to_string())
}

fn string(s: &str) -> Token {
    Token::String(s.to_string())
}

fn kind_of(input: &str) -> DecodeErrorKind {
    tokenize(input).unwrap_err().kind
}

// ── Scalar tags ─────────────────────────────────────────────────────────

#[test]
fn scalar_tag_matrix() {
    assert_eq!(tokenize(r#"{"@int":"123"}"#).unwrap(), vec![Token::Int(123)]);
    assert_eq!(tokenize(r#"{"@int":"-2147483648"}"#).unwrap(), vec![Token::Int(i32::MIN)]);
    assert_eq!(
        tokenize(r#"{"@long":"9223372036854775807"}"#).unwrap(),
        vec![Token::Long(i64::MAX)]
    );
    assert_eq!(tokenize(r#"{"@double":"1.5"}"#).unwrap(), vec![Token::Double(1.5)]);
    assert_eq!(
        tokenize(r#"{"@double":"-Infinity"}"#).unwrap(),
        vec![Token::Double(f64::NEG_INFINITY)]
    );
    assert_eq!(
        tokenize(r#"{"@date":"2023-02-28"}"#).unwrap(),
        vec![Token::Date(NaiveDate::from_ymd_opt(2023, 2, 28).unwrap())]
    );
    assert_eq!(
        tokenize(r#"{"@time":"2023-02-28T10:10:10.000001Z"}"#).unwrap(),
        vec![Token::Time(
            Utc.with_ymd_and_hms(2023, 2, 28, 10, 10, 10).unwrap()
                + chrono::Duration::microseconds(1)
        )]
    );
    assert_eq!(
        tokenize(r#"{"@mod":"Users"}"#).unwrap(),
        vec![Token::Module("Users".into())]
    );
}

#[test]
fn nan_double() {
    match tokenize(r#"{"@double":"NaN"}"#).unwrap().as_slice() {
        [Token::Double(d)] => assert!(d.is_nan()),
        other => panic!("unexpected tokens {other:?}"),
    }
}

#[test]
fn int_out_of_range_fails_with_tag_and_payload() {
    assert_eq!(
        kind_of(r#"{"@int":"2147483648"}"#),
        DecodeErrorKind::InvalidTagPayload {
            tag: "@int",
            payload: "2147483648".into(),
        }
    );
}

#[test]
fn numeric_tags_require_string_payloads() {
    assert_eq!(
        kind_of(r#"{"@int":5}"#),
        DecodeErrorKind::InvalidTagPayload {
            tag: "@int",
            payload: "5".into(),
        }
    );
    assert!(matches!(
        kind_of(r#"{"@date":"2023-13-01"}"#),
        DecodeErrorKind::InvalidTagPayload { tag: "@date", .. }
    ));
    assert!(matches!(
        kind_of(r#"{"@time":"yesterday"}"#),
        DecodeErrorKind::InvalidTagPayload { tag: "@time", .. }
    ));
    assert!(matches!(
        kind_of(r#"{"@doc":"x"}"#),
        DecodeErrorKind::InvalidTagPayload { tag: "@doc", .. }
    ));
}

#[test]
fn numeric_payloads_reject_a_plus_sign() {
    assert_eq!(
        kind_of(r#"{"@int":"+5"}"#),
        DecodeErrorKind::InvalidTagPayload {
            tag: "@int",
            payload: "+5".into(),
        }
    );
    assert!(matches!(
        kind_of(r#"{"@long":"+9"}"#),
        DecodeErrorKind::InvalidTagPayload { tag: "@long", .. }
    ));
    assert!(matches!(
        kind_of(r#"{"@double":"+1.5"}"#),
        DecodeErrorKind::InvalidTagPayload { tag: "@double", .. }
    ));
    assert!(matches!(
        kind_of(r#"{"@double":"inf"}"#),
        DecodeErrorKind::InvalidTagPayload { tag: "@double", .. }
    ));
    assert_eq!(tokenize(r#"{"@double":"1e+3"}"#).unwrap(), vec![Token::Double(1000.0)]);
}

#[test]
fn time_offsets_normalise_to_utc() {
    let expected = Utc.with_ymd_and_hms(2023, 2, 28, 8, 10, 10).unwrap();
    assert_eq!(
        tokenize(r#"{"@time":"2023-02-28T10:10:10+02:00"}"#).unwrap(),
        vec![Token::Time(expected)]
    );
}

// ── Structural tags ─────────────────────────────────────────────────────

#[test]
fn doc_and_ref_wrappers() {
    assert_eq!(
        tokenize(concat!(
            r#"{"@doc":{"id":"1","coll":{"@mod":"Users"},"#,
            r#""ref":{"@ref":{"id":"2","coll":{"@mod":"Users"}}}}}"#,
        ))
        .unwrap(),
        vec![
            Token::StartDocument,
            field("id"),
            string("1"),
            field("coll"),
            Token::Module("Users".into()),
            field("ref"),
            Token::StartRef,
            field("id"),
            string("2"),
            field("coll"),
            Token::Module("Users".into()),
            Token::EndRef,
            Token::EndDocument,
        ]
    );
}

#[test]
fn set_payload_shapes() {
    assert_eq!(
        tokenize(r#"{"@set":{"data":[1],"after":"c"}}"#).unwrap(),
        vec![
            Token::StartPage,
            field("data"),
            Token::StartArray,
            Token::Int(1),
            Token::EndArray,
            field("after"),
            string("c"),
            Token::EndPage,
        ]
    );
    assert_eq!(
        tokenize(r#"{"@set":[1,2]}"#).unwrap(),
        vec![Token::StartSet, Token::Int(1), Token::Int(2), Token::EndSet]
    );
    assert_eq!(
        tokenize(r#"{"@set":"cursor"}"#).unwrap(),
        vec![Token::StartPage, field("after"), string("cursor"), Token::EndPage]
    );
}

#[test]
fn object_escape_keeps_first_level_keys_literal() {
    assert_eq!(
        tokenize(r#"{"@object":{"@int":{"@int":"1"},"@ref":"x"}}"#).unwrap(),
        vec![
            Token::StartObject,
            field("@int"),
            Token::Int(1),
            field("@ref"),
            string("x"),
            Token::EndObject,
        ]
    );
}

#[test]
fn reserved_first_key_with_siblings_is_a_plain_object() {
    assert_eq!(
        tokenize(r#"{"@doc":{"a":1},"b":{"@int":"2"}}"#).unwrap(),
        vec![
            Token::StartObject,
            field("@doc"),
            Token::StartObject,
            field("a"),
            Token::Int(1),
            Token::EndObject,
            field("b"),
            Token::Int(2),
            Token::EndObject,
        ]
    );
}

#[test]
fn unknown_at_keys_are_plain() {
    assert_eq!(
        tokenize(r#"{"@custom":"1"}"#).unwrap(),
        vec![Token::StartObject, field("@custom"), string("1"), Token::EndObject]
    );
}

#[test]
fn whitespace_around_wrappers() {
    assert_eq!(
        tokenize(" { \"@set\" : [ { \"@long\" : \"7\" } ] } ").unwrap(),
        vec![Token::StartSet, Token::Long(7), Token::EndSet]
    );
}

// ── Plain JSON ──────────────────────────────────────────────────────────

#[test]
fn plain_numbers_take_narrowest_kind() {
    assert_eq!(
        tokenize("[1,-3000000000,2.5,1e3]").unwrap(),
        vec![
            Token::StartArray,
            Token::Int(1),
            Token::Long(-3_000_000_000),
            Token::Double(2.5),
            Token::Double(1000.0),
            Token::EndArray,
        ]
    );
}

#[test]
fn malformed_input_matrix() {
    assert_eq!(kind_of("[1,"), DecodeErrorKind::UnexpectedEof);
    assert_eq!(kind_of(r#"{"a" 1}"#), DecodeErrorKind::InvalidJson(5));
    assert_eq!(kind_of("[1] x"), DecodeErrorKind::TrailingData(4));
}

#[test]
fn plain_numbers_follow_json_grammar() {
    assert_eq!(kind_of("[007]"), DecodeErrorKind::InvalidJson(1));
    assert_eq!(kind_of("-01"), DecodeErrorKind::InvalidJson(0));
    assert_eq!(kind_of("[1.]"), DecodeErrorKind::InvalidJson(1));
    assert_eq!(kind_of("2e"), DecodeErrorKind::InvalidJson(0));
    assert_eq!(
        tokenize("[0,-0,0.5,10]").unwrap(),
        vec![
            Token::StartArray,
            Token::Int(0),
            Token::Int(0),
            Token::Double(0.5),
            Token::Int(10),
            Token::EndArray,
        ]
    );
}

#[test]
fn raw_control_characters_in_strings_are_rejected() {
    assert_eq!(kind_of("\"a\nb\""), DecodeErrorKind::InvalidJson(2));
    assert_eq!(kind_of("{\"k\":\"\t\\n\"}"), DecodeErrorKind::InvalidJson(6));
    assert_eq!(tokenize(r#""a\nb""#).unwrap(), vec![string("a\nb")]);
}

// ── Reader helpers ──────────────────────────────────────────────────────

#[test]
fn empty_input_yields_no_tokens() {
    let mut reader = TokenReader::new("");
    assert_eq!(reader.next_token().unwrap(), None);
    assert_eq!(reader.current(), &Token::None);
}

#[test]
fn advance_past_end_is_eof() {
    let mut reader = TokenReader::new("1");
    assert_eq!(reader.advance().unwrap(), &Token::Int(1));
    let err = reader.advance().unwrap_err();
    assert_eq!(err.kind, DecodeErrorKind::UnexpectedEof);
}

#[test]
fn skip_a_wrapped_field_value() {
    let mut reader = TokenReader::new(r#"{"a":{"@doc":{"x":[1,{"@set":[2]}]}},"b":true}"#);
    assert_eq!(reader.advance().unwrap(), &Token::StartObject);
    assert_eq!(reader.advance().unwrap(), &field("a"));
    reader.skip_value().unwrap();
    assert_eq!(reader.current().kind(), TokenKind::EndDocument);
    assert_eq!(reader.depth(), 1);
    assert_eq!(reader.advance().unwrap(), &field("b"));
    assert_eq!(reader.advance().unwrap(), &Token::True);
    assert_eq!(reader.advance().unwrap(), &Token::EndObject);
    reader.finish().unwrap();
}

#[test]
fn skip_value_then_iterate_the_rest() {
    let mut reader = TokenReader::new("[[1,[2]],3]");
    assert_eq!(reader.advance().unwrap(), &Token::StartArray);
    assert_eq!(reader.advance().unwrap(), &Token::StartArray);
    reader.skip_value().unwrap();
    let rest: Vec<Token> = reader.map(Result::unwrap).collect();
    assert_eq!(rest, vec![Token::Int(3), Token::EndArray]);
}

#[test]
fn from_reader_consumes_the_source() {
    let body = std::io::Cursor::new(br#"{"@long":"42"}"#.to_vec());
    let mut reader = TokenReader::from_reader(body, DecodeOptions::default()).unwrap();
    assert_eq!(reader.advance().unwrap(), &Token::Long(42));
    reader.finish().unwrap();
}

#[test]
fn iterator_stops_after_first_error() {
    let results: Vec<_> = TokenReader::new("[1,}").collect();
    assert_eq!(results.len(), 3);
    assert!(results[2].is_err());
}

#[test]
#[should_panic(expected = "EndObject has no closing token")]
fn closing_of_a_non_opening_kind_panics() {
    TokenKind::EndObject.closing();
}
