//! Tagged wire writer.
//!
//! Mirrors [`TokenReader`](crate::TokenReader): one call per token. Scalars
//! that plain JSON cannot carry losslessly are wrapped (`{"@int":"5"}`), and
//! objects whose keys collide with a reserved tag are opened with
//! [`start_escaped_object`](TaggedWriter::start_escaped_object).

use std::io::Write;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::error::{EncodeError, EncodeErrorKind};
use crate::options::EncodeOptions;
use crate::tags::{
    DATE_TAG, DOC_TAG, DOUBLE_TAG, INT_TAG, LONG_TAG, MOD_TAG, OBJECT_TAG, REF_TAG, SET_TAG,
    TIME_TAG,
};
use crate::token::TokenKind;

type EncodeResult<T = ()> = std::result::Result<T, EncodeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

#[derive(Debug)]
struct Scope {
    container: Container,
    open: TokenKind,
    first: bool,
    /// A field name was written and its value is still owed.
    expect_value: bool,
    /// One extra `}` closes the tag wrapper around this container.
    wrapped: bool,
}

/// Writes one wire document into a growable buffer.
pub struct TaggedWriter {
    buf: Vec<u8>,
    scopes: Vec<Scope>,
    root_written: bool,
}

impl Default for TaggedWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TaggedWriter {
    pub fn new() -> Self {
        Self::with_options(&EncodeOptions::default())
    }

    pub fn with_options(options: &EncodeOptions) -> Self {
        Self {
            buf: Vec::with_capacity(options.initial_capacity),
            scopes: Vec::new(),
            root_written: false,
        }
    }

    /// Bytes written so far, complete or not.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the document once every container has been closed.
    pub fn finish(self) -> EncodeResult<Vec<u8>> {
        if !self.scopes.is_empty() {
            return Err(structure("document has unclosed containers"));
        }
        if !self.root_written {
            return Err(structure("nothing was written"));
        }
        Ok(self.buf)
    }

    /// Finishes the document and writes it to `sink`.
    pub fn finish_to<W: Write>(self, mut sink: W) -> EncodeResult {
        let bytes = self.finish()?;
        sink.write_all(&bytes)
            .and_then(|_| sink.flush())
            .map_err(|e| EncodeError::new(EncodeErrorKind::Io(e.to_string())))
    }

    // ----------------------------------------------------------------
    // Structure

    pub fn start_object(&mut self) -> EncodeResult {
        self.open(b"{", Container::Object, TokenKind::StartObject, false)
    }

    /// Opens `{"@object":{` so the keys are read back literally.
    pub fn start_escaped_object(&mut self) -> EncodeResult {
        self.open_wrapped(OBJECT_TAG, b'{', Container::Object, TokenKind::StartObject)
    }

    pub fn end_object(&mut self) -> EncodeResult {
        self.close(TokenKind::StartObject)
    }

    pub fn start_array(&mut self) -> EncodeResult {
        self.open(b"[", Container::Array, TokenKind::StartArray, false)
    }

    pub fn end_array(&mut self) -> EncodeResult {
        self.close(TokenKind::StartArray)
    }

    pub fn start_document(&mut self) -> EncodeResult {
        self.open_wrapped(DOC_TAG, b'{', Container::Object, TokenKind::StartDocument)
    }

    pub fn end_document(&mut self) -> EncodeResult {
        self.close(TokenKind::StartDocument)
    }

    pub fn start_ref(&mut self) -> EncodeResult {
        self.open_wrapped(REF_TAG, b'{', Container::Object, TokenKind::StartRef)
    }

    pub fn end_ref(&mut self) -> EncodeResult {
        self.close(TokenKind::StartRef)
    }

    /// Opens a paginated set: `{"@set":{"data":[...],"after":...}}`.
    pub fn start_page(&mut self) -> EncodeResult {
        self.open_wrapped(SET_TAG, b'{', Container::Object, TokenKind::StartPage)
    }

    pub fn end_page(&mut self) -> EncodeResult {
        self.close(TokenKind::StartPage)
    }

    /// Opens an inline set: `{"@set":[...]}`.
    pub fn start_set(&mut self) -> EncodeResult {
        self.open_wrapped(SET_TAG, b'[', Container::Array, TokenKind::StartSet)
    }

    pub fn end_set(&mut self) -> EncodeResult {
        self.close(TokenKind::StartSet)
    }

    pub fn field_name(&mut self, name: &str) -> EncodeResult {
        let scope = match self.scopes.last_mut() {
            Some(scope) if scope.container == Container::Object && !scope.expect_value => scope,
            _ => return Err(structure("field name outside an object")),
        };
        let first = std::mem::replace(&mut scope.first, false);
        scope.expect_value = true;
        if !first {
            self.buf.push(b',');
        }
        self.push_json_string(name)?;
        self.buf.push(b':');
        Ok(())
    }

    // ----------------------------------------------------------------
    // Scalars

    pub fn write_null(&mut self) -> EncodeResult {
        self.before_value()?;
        self.buf.extend_from_slice(b"null");
        Ok(())
    }

    pub fn write_bool(&mut self, b: bool) -> EncodeResult {
        self.before_value()?;
        self.buf
            .extend_from_slice(if b { b"true" } else { b"false" });
        Ok(())
    }

    pub fn write_string(&mut self, s: &str) -> EncodeResult {
        self.before_value()?;
        self.push_json_string(s)
    }

    /// Writes an untagged JSON integer, for envelope fields that are not
    /// tagged values.
    pub fn write_plain_number(&mut self, v: i64) -> EncodeResult {
        self.before_value()?;
        self.buf.extend_from_slice(v.to_string().as_bytes());
        Ok(())
    }

    pub fn write_int(&mut self, v: i32) -> EncodeResult {
        self.write_tagged(INT_TAG, &v.to_string())
    }

    pub fn write_long(&mut self, v: i64) -> EncodeResult {
        self.write_tagged(LONG_TAG, &v.to_string())
    }

    pub fn write_double(&mut self, v: f64) -> EncodeResult {
        let text = if v.is_nan() {
            "NaN".to_string()
        } else if v == f64::INFINITY {
            "Infinity".to_string()
        } else if v == f64::NEG_INFINITY {
            "-Infinity".to_string()
        } else {
            // Debug keeps the decimal point and switches to exponent form
            // for very large or small magnitudes; both parse back exactly.
            format!("{v:?}")
        };
        self.write_tagged(DOUBLE_TAG, &text)
    }

    pub fn write_date(&mut self, v: NaiveDate) -> EncodeResult {
        self.write_tagged(DATE_TAG, &v.format("%Y-%m-%d").to_string())
    }

    pub fn write_time(&mut self, v: DateTime<Utc>) -> EncodeResult {
        let format = if v.timestamp_subsec_nanos() % 1_000 == 0 {
            SecondsFormat::Micros
        } else {
            SecondsFormat::Nanos
        };
        self.write_tagged(TIME_TAG, &v.to_rfc3339_opts(format, true))
    }

    pub fn write_module(&mut self, name: &str) -> EncodeResult {
        self.write_tagged(MOD_TAG, name)
    }

    fn write_tagged(&mut self, tag: &str, payload: &str) -> EncodeResult {
        self.before_value()?;
        self.buf.push(b'{');
        self.push_json_string(tag)?;
        self.buf.push(b':');
        self.push_json_string(payload)?;
        self.buf.push(b'}');
        Ok(())
    }

    // ----------------------------------------------------------------
    // Bookkeeping

    fn before_value(&mut self) -> EncodeResult {
        match self.scopes.last_mut() {
            None => {
                if self.root_written {
                    return Err(structure("second root value"));
                }
                self.root_written = true;
                Ok(())
            }
            Some(scope) if scope.container == Container::Array => {
                if !std::mem::replace(&mut scope.first, false) {
                    self.buf.push(b',');
                }
                Ok(())
            }
            Some(scope) => {
                if !std::mem::replace(&mut scope.expect_value, false) {
                    return Err(structure("object value without a field name"));
                }
                Ok(())
            }
        }
    }

    fn open(
        &mut self,
        bytes: &[u8],
        container: Container,
        open: TokenKind,
        wrapped: bool,
    ) -> EncodeResult {
        self.before_value()?;
        self.buf.extend_from_slice(bytes);
        self.scopes.push(Scope {
            container,
            open,
            first: true,
            expect_value: false,
            wrapped,
        });
        Ok(())
    }

    fn open_wrapped(
        &mut self,
        tag: &str,
        bracket: u8,
        container: Container,
        open: TokenKind,
    ) -> EncodeResult {
        self.before_value()?;
        self.buf.push(b'{');
        self.push_json_string(tag)?;
        self.buf.push(b':');
        self.buf.push(bracket);
        self.scopes.push(Scope {
            container,
            open,
            first: true,
            expect_value: false,
            wrapped: true,
        });
        Ok(())
    }

    fn close(&mut self, open: TokenKind) -> EncodeResult {
        let scope = match self.scopes.pop() {
            Some(scope) if scope.open == open && !scope.expect_value => scope,
            Some(_) => return Err(structure("closing a container that is not the innermost")),
            None => return Err(structure("closing with no open container")),
        };
        self.buf.push(match scope.container {
            Container::Object => b'}',
            Container::Array => b']',
        });
        if scope.wrapped {
            self.buf.push(b'}');
        }
        Ok(())
    }

    fn push_json_string(&mut self, s: &str) -> EncodeResult {
        serde_json::to_writer(&mut self.buf, s)
            .map_err(|e| EncodeError::new(EncodeErrorKind::Io(e.to_string())))
    }
}

fn structure(message: &'static str) -> EncodeError {
    EncodeError::new(EncodeErrorKind::Structure(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(w: TaggedWriter) -> String {
        String::from_utf8(w.finish().unwrap()).unwrap()
    }

    #[test]
    fn nested_structure_with_tags() {
        let mut w = TaggedWriter::new();
        w.start_object().unwrap();
        w.field_name("n").unwrap();
        w.write_int(5).unwrap();
        w.field_name("xs").unwrap();
        w.start_array().unwrap();
        w.write_long(1).unwrap();
        w.write_string("a\"b").unwrap();
        w.end_array().unwrap();
        w.end_object().unwrap();
        assert_eq!(
            text(w),
            r#"{"n":{"@int":"5"},"xs":[{"@long":"1"},"a\"b"]}"#
        );
    }

    #[test]
    fn plain_numbers_are_untagged() {
        let mut w = TaggedWriter::new();
        w.start_array().unwrap();
        w.write_plain_number(-7).unwrap();
        w.write_plain_number(1_702_346_199_930_000).unwrap();
        w.end_array().unwrap();
        assert_eq!(text(w), "[-7,1702346199930000]");
    }

    #[test]
    fn escaped_object() {
        let mut w = TaggedWriter::new();
        w.start_escaped_object().unwrap();
        w.field_name("@int").unwrap();
        w.write_string("x").unwrap();
        w.end_object().unwrap();
        assert_eq!(text(w), r#"{"@object":{"@int":"x"}}"#);
    }

    #[test]
    fn doubles_keep_a_decimal_point() {
        let mut w = TaggedWriter::new();
        w.start_array().unwrap();
        w.write_double(1.0).unwrap();
        w.write_double(f64::NEG_INFINITY).unwrap();
        w.end_array().unwrap();
        assert_eq!(
            text(w),
            r#"[{"@double":"1.0"},{"@double":"-Infinity"}]"#
        );
    }

    #[test]
    fn mismatched_close_is_rejected() {
        let mut w = TaggedWriter::new();
        w.start_document().unwrap();
        let err = w.end_object().unwrap_err();
        assert!(matches!(err.kind, EncodeErrorKind::Structure(_)));
    }

    #[test]
    fn field_value_is_required_before_close() {
        let mut w = TaggedWriter::new();
        w.start_object().unwrap();
        w.field_name("a").unwrap();
        assert!(w.end_object().is_err());
    }

    #[test]
    fn unfinished_document_is_rejected() {
        let mut w = TaggedWriter::new();
        w.start_array().unwrap();
        assert!(w.finish().is_err());
    }
}
