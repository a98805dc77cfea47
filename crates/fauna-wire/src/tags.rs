//! Reserved wire keys.
//!
//! A JSON object whose only key is one of these is a type wrapper rather than
//! a plain object: `{"@int":"5"}` is the 32-bit integer 5. Plain objects that
//! happen to use one of these keys travel inside `{"@object":{...}}`.

use crate::token::TokenKind;

pub const INT_TAG: &str = "@int";
pub const LONG_TAG: &str = "@long";
pub const DOUBLE_TAG: &str = "@double";
pub const TIME_TAG: &str = "@time";
pub const DATE_TAG: &str = "@date";
pub const MOD_TAG: &str = "@mod";
pub const DOC_TAG: &str = "@doc";
pub const REF_TAG: &str = "@ref";
pub const SET_TAG: &str = "@set";
pub const OBJECT_TAG: &str = "@object";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Int,
    Long,
    Double,
    Time,
    Date,
    Module,
    Doc,
    Ref,
    Set,
    Object,
}

/// JSON shapes a tag accepts as its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// Scalar tags always carry a JSON string, never a number.
    String,
    Object,
    /// `@set`: an object page, an inline array, or a bare cursor string.
    ObjectArrayOrString,
}

impl Tag {
    pub const ALL: [Tag; 10] = [
        Tag::Int,
        Tag::Long,
        Tag::Double,
        Tag::Time,
        Tag::Date,
        Tag::Module,
        Tag::Doc,
        Tag::Ref,
        Tag::Set,
        Tag::Object,
    ];

    pub fn from_key(key: &str) -> Option<Tag> {
        match key {
            INT_TAG => Some(Tag::Int),
            LONG_TAG => Some(Tag::Long),
            DOUBLE_TAG => Some(Tag::Double),
            TIME_TAG => Some(Tag::Time),
            DATE_TAG => Some(Tag::Date),
            MOD_TAG => Some(Tag::Module),
            DOC_TAG => Some(Tag::Doc),
            REF_TAG => Some(Tag::Ref),
            SET_TAG => Some(Tag::Set),
            OBJECT_TAG => Some(Tag::Object),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Tag::Int => INT_TAG,
            Tag::Long => LONG_TAG,
            Tag::Double => DOUBLE_TAG,
            Tag::Time => TIME_TAG,
            Tag::Date => DATE_TAG,
            Tag::Module => MOD_TAG,
            Tag::Doc => DOC_TAG,
            Tag::Ref => REF_TAG,
            Tag::Set => SET_TAG,
            Tag::Object => OBJECT_TAG,
        }
    }

    pub fn payload(self) -> PayloadShape {
        match self {
            Tag::Int | Tag::Long | Tag::Double | Tag::Time | Tag::Date | Tag::Module => {
                PayloadShape::String
            }
            Tag::Doc | Tag::Ref | Tag::Object => PayloadShape::Object,
            Tag::Set => PayloadShape::ObjectArrayOrString,
        }
    }

    /// The token the wrapper is surfaced as. `@set` with an array payload
    /// opens [`TokenKind::StartSet`] instead.
    pub fn token_kind(self) -> TokenKind {
        match self {
            Tag::Int => TokenKind::Int,
            Tag::Long => TokenKind::Long,
            Tag::Double => TokenKind::Double,
            Tag::Time => TokenKind::Time,
            Tag::Date => TokenKind::Date,
            Tag::Module => TokenKind::Module,
            Tag::Doc => TokenKind::StartDocument,
            Tag::Ref => TokenKind::StartRef,
            Tag::Set => TokenKind::StartPage,
            Tag::Object => TokenKind::StartObject,
        }
    }
}

pub fn is_reserved_key(key: &str) -> bool {
    Tag::from_key(key).is_some()
}

/// Whether an object with these keys must be written inside `@object`.
pub fn needs_escape<'a>(keys: impl IntoIterator<Item = &'a str>) -> bool {
    keys.into_iter().any(is_reserved_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_through_lookup() {
        for tag in Tag::ALL {
            assert_eq!(Tag::from_key(tag.key()), Some(tag));
        }
        assert_eq!(Tag::from_key("@integer"), None);
        assert_eq!(Tag::from_key("int"), None);
    }

    #[test]
    fn escape_is_needed_for_any_reserved_key() {
        assert!(needs_escape(["@int"]));
        assert!(needs_escape(["name", "@ref"]));
        assert!(!needs_escape(["name", "@custom"]));
        assert!(!needs_escape([]));
    }
}
