//! Token vocabulary produced by [`TokenReader`](crate::TokenReader).

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};

/// One unit of the flattened view of a wire document.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    StartDocument,
    EndDocument,
    StartRef,
    EndRef,
    StartSet,
    EndSet,
    StartPage,
    EndPage,
    FieldName(String),
    String(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Date(NaiveDate),
    /// An `@time` instant. Any wire offset is folded into UTC on read, so only
    /// the instant survives and re-encoding always writes `Z`.
    Time(DateTime<Utc>),
    True,
    False,
    Null,
    Module(String),
    /// No token: before the first read or past the end of the stream.
    None,
}

/// Payload-free discriminant of [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    StartDocument,
    EndDocument,
    StartRef,
    EndRef,
    StartSet,
    EndSet,
    StartPage,
    EndPage,
    FieldName,
    String,
    Int,
    Long,
    Double,
    Date,
    Time,
    True,
    False,
    Null,
    Module,
    None,
}

/// Opening kind to closing kind. Nothing else ever opens a scope.
const CLOSING: [(TokenKind, TokenKind); 6] = [
    (TokenKind::StartObject, TokenKind::EndObject),
    (TokenKind::StartArray, TokenKind::EndArray),
    (TokenKind::StartDocument, TokenKind::EndDocument),
    (TokenKind::StartRef, TokenKind::EndRef),
    (TokenKind::StartSet, TokenKind::EndSet),
    (TokenKind::StartPage, TokenKind::EndPage),
];

impl TokenKind {
    pub fn is_start(self) -> bool {
        CLOSING.iter().any(|(open, _)| *open == self)
    }

    pub fn is_end(self) -> bool {
        CLOSING.iter().any(|(_, close)| *close == self)
    }

    /// The kind that closes a scope opened by `self`.
    ///
    /// # Panics
    ///
    /// When `self` never opens a scope. Callers only ask after checking
    /// [`is_start`](Self::is_start), so reaching the panic is a bug.
    pub fn closing(self) -> TokenKind {
        match CLOSING.iter().find(|(open, _)| *open == self) {
            Some((_, close)) => *close,
            None => panic!("{self} has no closing token"),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TokenKind::StartObject => "StartObject",
            TokenKind::EndObject => "EndObject",
            TokenKind::StartArray => "StartArray",
            TokenKind::EndArray => "EndArray",
            TokenKind::StartDocument => "StartDocument",
            TokenKind::EndDocument => "EndDocument",
            TokenKind::StartRef => "StartRef",
            TokenKind::EndRef => "EndRef",
            TokenKind::StartSet => "StartSet",
            TokenKind::EndSet => "EndSet",
            TokenKind::StartPage => "StartPage",
            TokenKind::EndPage => "EndPage",
            TokenKind::FieldName => "FieldName",
            TokenKind::String => "String",
            TokenKind::Int => "Int",
            TokenKind::Long => "Long",
            TokenKind::Double => "Double",
            TokenKind::Date => "Date",
            TokenKind::Time => "Time",
            TokenKind::True => "True",
            TokenKind::False => "False",
            TokenKind::Null => "Null",
            TokenKind::Module => "Module",
            TokenKind::None => "None",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::StartObject => TokenKind::StartObject,
            Token::EndObject => TokenKind::EndObject,
            Token::StartArray => TokenKind::StartArray,
            Token::EndArray => TokenKind::EndArray,
            Token::StartDocument => TokenKind::StartDocument,
            Token::EndDocument => TokenKind::EndDocument,
            Token::StartRef => TokenKind::StartRef,
            Token::EndRef => TokenKind::EndRef,
            Token::StartSet => TokenKind::StartSet,
            Token::EndSet => TokenKind::EndSet,
            Token::StartPage => TokenKind::StartPage,
            Token::EndPage => TokenKind::EndPage,
            Token::FieldName(_) => TokenKind::FieldName,
            Token::String(_) => TokenKind::String,
            Token::Int(_) => TokenKind::Int,
            Token::Long(_) => TokenKind::Long,
            Token::Double(_) => TokenKind::Double,
            Token::Date(_) => TokenKind::Date,
            Token::Time(_) => TokenKind::Time,
            Token::True => TokenKind::True,
            Token::False => TokenKind::False,
            Token::Null => TokenKind::Null,
            Token::Module(_) => TokenKind::Module,
            Token::None => TokenKind::None,
        }
    }

    /// The payload-free token that closes a scope opened by `open`.
    pub(crate) fn closing(open: TokenKind) -> Token {
        match open.closing() {
            TokenKind::EndObject => Token::EndObject,
            TokenKind::EndArray => Token::EndArray,
            TokenKind::EndDocument => Token::EndDocument,
            TokenKind::EndRef => Token::EndRef,
            TokenKind::EndSet => Token::EndSet,
            TokenKind::EndPage => Token::EndPage,
            other => unreachable!("{other} is not a closing token"),
        }
    }
}
