//! Pull tokenizer over tagged wire JSON.
//!
//! Walks the input the way the pack's JSON decoders do (a byte buffer and a
//! cursor `x`), but instead of building a value it yields one [`Token`] per
//! call. Type wrappers are recognised when an object is opened: if its first
//! key is a reserved tag and it has no other key, the wrapper is consumed and
//! surfaced as the semantic token (`{"@int":"5"}` becomes `Token::Int(5)`).

use std::collections::VecDeque;
use std::io::Read;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{DecodeError, DecodeErrorKind};
use crate::options::DecodeOptions;
use crate::tags::{PayloadShape, Tag};
use crate::token::{Token, TokenKind};

type DecodeResult<T> = std::result::Result<T, DecodeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

#[derive(Debug)]
struct Frame {
    container: Container,
    open: TokenKind,
    first: bool,
    /// Closed by one extra `}` that belongs to a tag wrapper.
    wrapped: bool,
}

/// Tokenizer that owns one complete wire document.
pub struct TokenReader {
    data: Vec<u8>,
    x: usize,
    frames: Vec<Frame>,
    pending: VecDeque<Token>,
    current: Token,
    depth: usize,
    expect_value: bool,
    started: bool,
    failed: bool,
    options: DecodeOptions,
}

impl TokenReader {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self::with_options(data, DecodeOptions::default())
    }

    pub fn with_options(data: impl Into<Vec<u8>>, options: DecodeOptions) -> Self {
        Self {
            data: data.into(),
            x: 0,
            frames: Vec::new(),
            pending: VecDeque::new(),
            current: Token::None,
            depth: 0,
            expect_value: false,
            started: false,
            failed: false,
            options,
        }
    }

    /// Reads one whole response body from `reader`. The source is consumed and
    /// dropped before this returns.
    pub fn from_reader<R: Read>(mut reader: R, options: DecodeOptions) -> DecodeResult<Self> {
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(|e| DecodeError::new(DecodeErrorKind::Io(e.to_string())))?;
        Ok(Self::with_options(data, options))
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// The token most recently produced.
    pub fn current(&self) -> &Token {
        &self.current
    }

    /// Number of scopes opened and not yet closed by the tokens read so far.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Next token, or `None` once the root value has been fully read.
    pub fn next_token(&mut self) -> DecodeResult<Option<Token>> {
        if self.step()? {
            Ok(Some(self.current.clone()))
        } else {
            Ok(None)
        }
    }

    /// Moves to the next token; running out of input is an error here.
    pub fn advance(&mut self) -> DecodeResult<&Token> {
        if !self.step()? {
            return Err(DecodeError::new(DecodeErrorKind::UnexpectedEof));
        }
        Ok(&self.current)
    }

    /// Skips the value starting at the current token. On a field name the
    /// field's value is skipped. Leaves the closing token current.
    pub fn skip_value(&mut self) -> DecodeResult<()> {
        let kind = self.current.kind();
        if kind == TokenKind::FieldName {
            self.advance()?;
            return self.skip_value();
        }
        if !kind.is_start() {
            return Ok(());
        }
        let target = self.depth - 1;
        while self.depth > target {
            self.advance()?;
        }
        Ok(())
    }

    /// Asserts the root value has been read completely.
    pub fn finish(&mut self) -> DecodeResult<()> {
        match self.next_token()? {
            None => Ok(()),
            Some(token) => Err(DecodeError::unexpected("end of input", token.kind())),
        }
    }

    fn step(&mut self) -> DecodeResult<bool> {
        let next = match self.pending.pop_front() {
            Some(token) => Some(token),
            None => match self.read_token() {
                Ok(token) => token,
                Err(e) => {
                    self.failed = true;
                    return Err(e);
                }
            },
        };
        match next {
            Some(token) => {
                self.track(token.kind())?;
                self.current = token;
                Ok(true)
            }
            None => {
                self.current = Token::None;
                Ok(false)
            }
        }
    }

    fn track(&mut self, kind: TokenKind) -> DecodeResult<()> {
        if kind.is_start() {
            self.depth += 1;
            if self.depth > self.options.max_depth {
                self.failed = true;
                return Err(DecodeError::new(DecodeErrorKind::DepthLimit(
                    self.options.max_depth,
                )));
            }
        } else if kind.is_end() {
            self.depth = self.depth.saturating_sub(1);
        }
        Ok(())
    }

    // ----------------------------------------------------------------
    // Structure

    fn read_token(&mut self) -> DecodeResult<Option<Token>> {
        self.skip_ws();
        if self.expect_value {
            self.expect_value = false;
            return self.read_value().map(Some);
        }
        let (container, first) = match self.frames.last_mut() {
            Some(frame) => (frame.container, std::mem::replace(&mut frame.first, false)),
            None => return self.read_root(),
        };
        match container {
            Container::Object => {
                if self.peek() == Some(b'}') {
                    self.x += 1;
                    return self.close_frame().map(Some);
                }
                if !first {
                    self.expect_byte(b',')?;
                    self.skip_ws();
                }
                let key = self.read_string()?;
                self.skip_ws();
                self.expect_byte(b':')?;
                self.expect_value = true;
                Ok(Some(Token::FieldName(key)))
            }
            Container::Array => {
                if self.peek() == Some(b']') {
                    self.x += 1;
                    return self.close_frame().map(Some);
                }
                if !first {
                    self.expect_byte(b',')?;
                }
                self.read_value().map(Some)
            }
        }
    }

    fn read_root(&mut self) -> DecodeResult<Option<Token>> {
        if self.started {
            if self.x < self.data.len() {
                return Err(DecodeError::new(DecodeErrorKind::TrailingData(self.x)));
            }
            return Ok(None);
        }
        self.started = true;
        if self.x >= self.data.len() {
            return Ok(None);
        }
        self.read_value().map(Some)
    }

    fn push(&mut self, container: Container, open: TokenKind, wrapped: bool) {
        self.frames.push(Frame {
            container,
            open,
            first: true,
            wrapped,
        });
    }

    fn close_frame(&mut self) -> DecodeResult<Token> {
        let frame = match self.frames.pop() {
            Some(frame) => frame,
            None => return Err(DecodeError::new(DecodeErrorKind::InvalidJson(self.x))),
        };
        if frame.wrapped {
            self.skip_ws();
            self.expect_byte(b'}')?;
        }
        Ok(Token::closing(frame.open))
    }

    fn read_value(&mut self) -> DecodeResult<Token> {
        self.skip_ws();
        let x = self.x;
        match self.peek() {
            None => Err(DecodeError::new(DecodeErrorKind::UnexpectedEof)),
            Some(b'"') => Ok(Token::String(self.read_string()?)),
            Some(b'{') => self.read_object_start(),
            Some(b'[') => {
                self.x += 1;
                self.push(Container::Array, TokenKind::StartArray, false);
                Ok(Token::StartArray)
            }
            Some(b't') => self.read_literal(b"true", Token::True),
            Some(b'f') => self.read_literal(b"false", Token::False),
            Some(b'n') => self.read_literal(b"null", Token::Null),
            Some(c) if c == b'-' || c.is_ascii_digit() => self.read_number(),
            Some(_) => Err(DecodeError::new(DecodeErrorKind::InvalidJson(x))),
        }
    }

    // ----------------------------------------------------------------
    // Tag recognition

    fn read_object_start(&mut self) -> DecodeResult<Token> {
        let open = self.x;
        self.x += 1;
        self.skip_ws();
        if self.peek() == Some(b'"') {
            let key = self.read_string()?;
            if let Some(tag) = Tag::from_key(&key) {
                if let Some(token) = self.read_tagged(tag)? {
                    return Ok(token);
                }
            }
            // Not a wrapper: re-read the first key as an ordinary field.
            self.x = open + 1;
        }
        self.push(Container::Object, TokenKind::StartObject, false);
        Ok(Token::StartObject)
    }

    /// Called with the cursor just past a reserved first key. Returns `None`
    /// when the object has further keys and is therefore a plain object.
    fn read_tagged(&mut self, tag: Tag) -> DecodeResult<Option<Token>> {
        self.skip_ws();
        self.expect_byte(b':')?;
        self.skip_ws();
        let payload_start = self.x;
        self.skip_raw_value()?;
        let payload_end = self.x;
        self.skip_ws();
        if self.peek() != Some(b'}') {
            return Ok(None);
        }
        let close = self.x;
        self.x = payload_start;

        let first = self.peek();
        let token = match (tag.payload(), first) {
            (PayloadShape::String, Some(b'"')) => {
                let raw = self.read_string()?;
                self.x = close + 1;
                parse_scalar(tag, raw)?
            }
            (PayloadShape::Object, Some(b'{')) => {
                self.x += 1;
                let open = tag.token_kind();
                self.push(Container::Object, open, true);
                opening_token(open)
            }
            (PayloadShape::ObjectArrayOrString, Some(b'{')) => {
                self.x += 1;
                self.push(Container::Object, TokenKind::StartPage, true);
                Token::StartPage
            }
            (PayloadShape::ObjectArrayOrString, Some(b'[')) => {
                self.x += 1;
                self.push(Container::Array, TokenKind::StartSet, true);
                Token::StartSet
            }
            (PayloadShape::ObjectArrayOrString, Some(b'"')) => {
                // A bare cursor: a page boundary with no inline data.
                let cursor = self.read_string()?;
                self.x = close + 1;
                self.pending.extend([
                    Token::FieldName("after".to_string()),
                    Token::String(cursor),
                    Token::EndPage,
                ]);
                Token::StartPage
            }
            _ => {
                let payload = String::from_utf8_lossy(&self.data[payload_start..payload_end]);
                return Err(DecodeError::new(DecodeErrorKind::InvalidTagPayload {
                    tag: tag.key(),
                    payload: payload.into_owned(),
                }));
            }
        };
        Ok(Some(token))
    }

    /// Moves past one JSON value without interpreting it.
    fn skip_raw_value(&mut self) -> DecodeResult<()> {
        self.skip_ws();
        match self.peek() {
            None => Err(DecodeError::new(DecodeErrorKind::UnexpectedEof)),
            Some(b'"') => {
                self.x = self.find_end_quote(self.x + 1)? + 1;
                Ok(())
            }
            Some(b'{') | Some(b'[') => {
                let mut nesting = 0usize;
                while let Some(c) = self.peek() {
                    match c {
                        b'"' => {
                            self.x = self.find_end_quote(self.x + 1)? + 1;
                            continue;
                        }
                        b'{' | b'[' => nesting += 1,
                        b'}' | b']' => {
                            nesting -= 1;
                            if nesting == 0 {
                                self.x += 1;
                                return Ok(());
                            }
                        }
                        _ => {}
                    }
                    self.x += 1;
                }
                Err(DecodeError::new(DecodeErrorKind::UnexpectedEof))
            }
            Some(_) => {
                let start = self.x;
                while let Some(c) = self.peek() {
                    if matches!(c, b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r') {
                        break;
                    }
                    self.x += 1;
                }
                if self.x == start {
                    return Err(DecodeError::new(DecodeErrorKind::InvalidJson(start)));
                }
                Ok(())
            }
        }
    }

    // ----------------------------------------------------------------
    // Primitives

    fn peek(&self) -> Option<u8> {
        self.data.get(self.x).copied()
    }

    fn skip_ws(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.x += 1;
        }
    }

    fn expect_byte(&mut self, expected: u8) -> DecodeResult<()> {
        match self.peek() {
            Some(c) if c == expected => {
                self.x += 1;
                Ok(())
            }
            Some(_) => Err(DecodeError::new(DecodeErrorKind::InvalidJson(self.x))),
            None => Err(DecodeError::new(DecodeErrorKind::UnexpectedEof)),
        }
    }

    fn read_literal(&mut self, literal: &[u8], token: Token) -> DecodeResult<Token> {
        let end = self.x + literal.len();
        if end > self.data.len() || &self.data[self.x..end] != literal {
            return Err(DecodeError::new(DecodeErrorKind::InvalidJson(self.x)));
        }
        self.x = end;
        Ok(token)
    }

    fn read_number(&mut self) -> DecodeResult<Token> {
        let start = self.x;
        let invalid = || DecodeError::new(DecodeErrorKind::InvalidJson(start));
        let mut is_float = false;
        if self.peek() == Some(b'-') {
            self.x += 1;
        }
        let int_start = self.x;
        let int_digits = self.read_digits();
        if int_digits == 0 || (int_digits > 1 && self.data[int_start] == b'0') {
            return Err(invalid());
        }
        if self.peek() == Some(b'.') {
            is_float = true;
            self.x += 1;
            if self.read_digits() == 0 {
                return Err(invalid());
            }
        }
        if let Some(b'e' | b'E') = self.peek() {
            is_float = true;
            self.x += 1;
            if let Some(b'+' | b'-') = self.peek() {
                self.x += 1;
            }
            if self.read_digits() == 0 {
                return Err(invalid());
            }
        }
        let text = std::str::from_utf8(&self.data[start..self.x]).map_err(|_| invalid())?;
        if !is_float {
            if let Ok(i) = text.parse::<i32>() {
                return Ok(Token::Int(i));
            }
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Token::Long(i));
            }
        }
        text.parse::<f64>().map(Token::Double).map_err(|_| invalid())
    }

    fn read_digits(&mut self) -> usize {
        let from = self.x;
        while let Some(b'0'..=b'9') = self.peek() {
            self.x += 1;
        }
        self.x - from
    }

    fn read_string(&mut self) -> DecodeResult<String> {
        if self.peek() != Some(b'"') {
            return Err(match self.peek() {
                None => DecodeError::new(DecodeErrorKind::UnexpectedEof),
                Some(_) => DecodeError::new(DecodeErrorKind::InvalidJson(self.x)),
            });
        }
        let start = self.x + 1;
        let end = self.find_end_quote(start)?;
        let s = decode_json_string(&self.data[start..end], start)?;
        self.x = end + 1;
        Ok(s)
    }

    fn find_end_quote(&self, start: usize) -> DecodeResult<usize> {
        let mut i = start;
        while i < self.data.len() {
            match self.data[i] {
                b'\\' => i += 2,
                b'"' => return Ok(i),
                _ => i += 1,
            }
        }
        Err(DecodeError::new(DecodeErrorKind::UnexpectedEof))
    }
}

impl Iterator for TokenReader {
    type Item = DecodeResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.next_token().transpose()
    }
}

fn opening_token(open: TokenKind) -> Token {
    match open {
        TokenKind::StartDocument => Token::StartDocument,
        TokenKind::StartRef => Token::StartRef,
        _ => Token::StartObject,
    }
}

/// Tokenizes a whole document.
pub fn tokenize(input: impl Into<Vec<u8>>) -> DecodeResult<Vec<Token>> {
    TokenReader::new(input).collect()
}

fn decode_json_string(bytes: &[u8], offset: usize) -> DecodeResult<String> {
    // Control characters must arrive escaped.
    if let Some(i) = bytes.iter().position(|&b| b < 0x20) {
        return Err(DecodeError::new(DecodeErrorKind::InvalidJson(offset + i)));
    }
    if !bytes.contains(&b'\\') {
        return std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| DecodeError::new(DecodeErrorKind::InvalidUtf8(offset)));
    }
    // Quote again and let serde_json handle escapes and surrogate pairs.
    let mut quoted = Vec::with_capacity(bytes.len() + 2);
    quoted.push(b'"');
    quoted.extend_from_slice(bytes);
    quoted.push(b'"');
    serde_json::from_slice(&quoted)
        .map_err(|_| DecodeError::new(DecodeErrorKind::InvalidJson(offset)))
}

fn parse_scalar(tag: Tag, raw: String) -> DecodeResult<Token> {
    let parsed = match tag {
        // `str::parse` also takes a leading `+`, which the wire never carries.
        Tag::Int | Tag::Long | Tag::Double if raw.starts_with('+') => None,
        Tag::Int => raw.parse::<i32>().ok().map(Token::Int),
        Tag::Long => raw.parse::<i64>().ok().map(Token::Long),
        Tag::Double => match raw.as_str() {
            "Infinity" => Some(Token::Double(f64::INFINITY)),
            "-Infinity" => Some(Token::Double(f64::NEG_INFINITY)),
            "NaN" => Some(Token::Double(f64::NAN)),
            other if other.bytes().all(is_decimal_byte) => {
                other.parse::<f64>().ok().map(Token::Double)
            }
            _ => None,
        },
        Tag::Time => DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|t| Token::Time(t.with_timezone(&Utc))),
        Tag::Date => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .ok()
            .map(Token::Date),
        Tag::Module => return Ok(Token::Module(raw)),
        Tag::Doc | Tag::Ref | Tag::Set | Tag::Object => None,
    };
    parsed.ok_or_else(|| {
        DecodeError::new(DecodeErrorKind::InvalidTagPayload {
            tag: tag.key(),
            payload: raw,
        })
    })
}

fn is_decimal_byte(b: u8) -> bool {
    matches!(b, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
}
