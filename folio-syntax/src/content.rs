//! Tokenizing content streams.
//!
//! A content stream is a flat sequence of operands followed by their operator. The
//! [`Tokenizer`] yields operands and operators one at a time, leaving it to the consumer to
//! collect operands on a stack. Inline images (`BI ... ID ... EI`) are special: they are
//! returned as a single [`Token::InlineImage`] holding a stream with an expanded dictionary.

use crate::Reader;
use crate::filter::Filter;
use crate::lexer::{Lexeme, Lexer};
use crate::object::dict::keys::*;
use crate::object::stream::decode_with;
use crate::object::{Array, Dict, Name, Object, Stream};
use crate::trivia::is_white_space_character;
use crate::xref::XRef;
use log::warn;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

/// An operator in a content stream.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Operator<'a>(&'a [u8]);

impl<'a> Operator<'a> {
    /// Return the bytes of the operator.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    /// Return the operator as a string.
    pub fn as_str(&self) -> &'a str {
        std::str::from_utf8(self.0).unwrap_or("{non-utf8}")
    }
}

impl Debug for Operator<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A token of a content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// An operand.
    Operand(Object),
    /// An operator.
    Operator(Operator<'a>),
    /// A complete inline image.
    InlineImage(Stream),
}

/// A tokenizer for content streams.
///
/// Indirect references are not recognized, as they can't appear in content streams.
/// Malformed input ends the token stream.
pub struct Tokenizer<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Tokenizer<'a> {
    /// Create a new tokenizer.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data, XRef::dummy(), false),
        }
    }

    fn read_inline_image(&mut self) -> Option<Stream> {
        let mut entries = BTreeMap::new();

        loop {
            match self.lexer.next_lexeme()? {
                Lexeme::Keyword(b"ID") => break,
                Lexeme::Object(Object::Name(key)) => {
                    let key = expand_key(key);
                    let value = self.lexer.read_object()?;
                    let value = if matches!(&*key, COLORSPACE | FILTER) {
                        expand_value(value)
                    } else {
                        value
                    };

                    entries.insert(key, value);
                }
                other => {
                    warn!("unexpected {other:?} in inline image dictionary");

                    return None;
                }
            }
        }

        let dict = Dict::new(entries, XRef::dummy());

        let r = self.lexer.reader_mut();
        // Exactly one white space separates `ID` from the data.
        r.read_byte()?;
        let start = r.offset();
        let data = r.data();

        let end = exact_length(&dict)
            .and_then(|len| start.checked_add(len))
            .filter(|end| is_followed_by_ei(data, *end))
            .or_else(|| find_ei(data, start, &dict))?;

        let payload = data.get(start..end)?;

        let mut r2 = Reader::new_with(data, end);
        r2.forward_while(is_white_space_character);
        r2.forward_tag(b"EI")?;
        r.jump(r2.offset());

        Some(Stream::new(dict, payload))
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.lexer.reader().at_end() {
            return None;
        }

        let token = match self.lexer.next_lexeme() {
            Some(Lexeme::Object(o)) => Token::Operand(o),
            Some(Lexeme::Keyword(b"BI")) => match self.read_inline_image() {
                Some(stream) => Token::InlineImage(stream),
                None => {
                    warn!("failed to read inline image");

                    return self.abort();
                }
            },
            Some(Lexeme::Keyword(k)) => Token::Operator(Operator(k)),
            None => {
                if !self.lexer.reader().at_end() {
                    warn!(
                        "malformed content stream at offset {}",
                        self.lexer.reader().offset()
                    );
                }

                return self.abort();
            }
        };

        Some(token)
    }
}

impl<'a> Tokenizer<'a> {
    fn abort(&mut self) -> Option<Token<'a>> {
        let r = self.lexer.reader_mut();
        r.jump(r.data().len());

        None
    }
}

fn expand_key(key: Name) -> Name {
    let expanded: &[u8] = match &*key {
        b"BPC" => BITS_PER_COMPONENT,
        b"CS" => COLORSPACE,
        b"D" => DECODE,
        b"DP" => DECODE_PARMS,
        b"F" => FILTER,
        b"H" => HEIGHT,
        b"IM" => IMAGE_MASK,
        b"I" => INTERPOLATE,
        b"W" => WIDTH,
        b"L" => LENGTH,
        _ => return key,
    };

    Name::new(expanded)
}

fn expand_value(value: Object) -> Object {
    match value {
        Object::Name(name) => {
            let expanded: &[u8] = match &*name {
                b"G" => DEVICE_GRAY,
                b"RGB" => DEVICE_RGB,
                b"CMYK" => DEVICE_CMYK,
                b"I" => INDEXED,
                b"AHx" => ASCII_HEX_DECODE,
                b"A85" => ASCII85_DECODE,
                b"LZW" => LZW_DECODE,
                b"Fl" => FLATE_DECODE,
                b"RL" => RUN_LENGTH_DECODE,
                b"CCF" => b"CCITTFaxDecode",
                b"DCT" => b"DCTDecode",
                _ => return Object::Name(name),
            };

            Object::Name(Name::new(expanded))
        }
        Object::Array(array) => Object::Array(Array::new(
            array.raw_iter().cloned().map(expand_value).collect(),
            XRef::dummy(),
        )),
        other => other,
    }
}

// The payload length of an unfiltered image with known geometry.
fn exact_length(dict: &Dict) -> Option<usize> {
    if let Some(length) = dict.get::<usize>(LENGTH) {
        return Some(length);
    }

    if dict.contains_key(FILTER) {
        return None;
    }

    let width = dict.get::<usize>(WIDTH)?;
    let height = dict.get::<usize>(HEIGHT)?;

    let (components, bpc) = if dict.get::<bool>(IMAGE_MASK).unwrap_or(false) {
        (1, 1)
    } else {
        let components = match dict.get_raw(COLORSPACE)? {
            Object::Name(n) => match &**n {
                DEVICE_GRAY | CAL_GRAY => 1,
                DEVICE_RGB | CAL_RGB => 3,
                DEVICE_CMYK => 4,
                _ => return None,
            },
            Object::Array(a) if a.get::<Name>(0).as_deref() == Some(INDEXED) => 1,
            _ => return None,
        };

        (components, dict.get::<usize>(BITS_PER_COMPONENT)?)
    };

    (width.checked_mul(components)?.checked_mul(bpc)?)
        .div_ceil(8)
        .checked_mul(height)
}

fn is_followed_by_ei(data: &[u8], end: usize) -> bool {
    let mut r = Reader::new_with(data, end);

    if end > data.len() {
        return false;
    }

    r.forward_while(is_white_space_character);
    r.forward_tag(b"EI").is_some() && r.peek_byte().is_none_or(is_white_space_character)
}

// Search for an `EI` surrounded by white space. If the data can be decoded, a candidate is
// only accepted if decoding the data before it succeeds, since `EI` might also appear inside
// of compressed data.
fn find_ei(data: &[u8], start: usize, dict: &Dict) -> Option<usize> {
    let can_validate = {
        let stream = Stream::new(dict.clone(), b"");
        let filters = stream.filters();
        !filters.is_empty() && filters.iter().all(Filter::is_supported)
    };

    let mut pos = start;

    while let Some(window) = data.get(pos..pos + 2) {
        let preceded = pos > start && data.get(pos - 1).copied().is_some_and(is_white_space_character);
        let followed = data.get(pos + 2).copied().is_none_or(is_white_space_character);

        if window == b"EI" && preceded && followed {
            let end = pos - 1;

            if !can_validate || decode_with(data.get(start..end)?, dict).is_some() {
                return Some(end);
            }
        }

        pos += 1;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Number;

    fn operators(data: &[u8]) -> Vec<std::string::String> {
        Tokenizer::new(data)
            .filter_map(|t| match t {
                Token::Operator(o) => Some(o.as_str().to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn simple_stream() {
        let tokens = Tokenizer::new(b"q 1 0 0 1 10 20 cm /GS0 gs Q").collect::<Vec<_>>();
        assert_eq!(tokens.len(), 11);
        assert_eq!(tokens[1], Token::Operand(Object::Number(Number::from_i64(1))));
        assert_eq!(operators(b"q 1 0 0 1 10 20 cm /GS0 gs Q"), ["q", "cm", "gs", "Q"]);
    }

    #[test]
    fn numbers_are_not_references() {
        let tokens = Tokenizer::new(b"1 0 R").collect::<Vec<_>>();
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn malformed_ends_stream() {
        assert_eq!(operators(b"q ) Q"), ["q"]);
    }

    #[test]
    fn inline_image_with_exact_length() {
        // The image data contains `EI`, but the length is known.
        let data = b"BI /W 2 /H 1 /CS /G /BPC 8 ID \x45\x49 EI Q";
        let tokens = Tokenizer::new(data).collect::<Vec<_>>();
        assert_eq!(tokens.len(), 2);

        let Token::InlineImage(stream) = &tokens[0] else {
            panic!("expected an inline image");
        };

        assert_eq!(stream.raw_data(), b"EI");
        assert_eq!(stream.dict().get::<Name>(COLORSPACE).unwrap().as_str(), "DeviceGray");
        assert_eq!(stream.dict().get::<u32>(BITS_PER_COMPONENT), Some(8));
        assert_eq!(tokens[1], Token::Operator(Operator(b"Q")));
    }

    #[test]
    fn inline_image_with_filter() {
        // The first `EI` is part of the encoded data, which is incomplete at that point.
        let data = b"BI /W 1 /H 1 /CS /RGB /BPC 8 /F /A85 ID 87cURD EI Z~> EI Q";
        let tokens = Tokenizer::new(data).collect::<Vec<_>>();

        let Token::InlineImage(stream) = &tokens[0] else {
            panic!("expected an inline image");
        };

        assert_eq!(stream.raw_data(), b"87cURD EI Z~>");
        assert_eq!(stream.filters(), vec![Filter::Ascii85Decode]);
        assert!(stream.decoded().is_some());
        assert_eq!(operators(data), ["Q"]);
    }
}
