use crate::Reader;
use crate::object::{Array, Dict, Name, ObjRef, Object, name, number, string};
use crate::trivia::{is_regular_character, skip_white_spaces_and_comments};
use crate::xref::XRef;
use log::warn;
use std::collections::BTreeMap;

// Guards against stack overflows caused by deeply nested arrays or dictionaries.
const MAX_NESTING: u32 = 256;

/// A single lexical item.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Lexeme<'a> {
    /// A complete object.
    Object(Object),
    /// A bare keyword, such as an operator or `obj`.
    Keyword(&'a [u8]),
}

/// A lexer for PDF objects.
///
/// In file mode (`allow_refs`), `int int R` is read as an indirect reference. In content
/// mode, the same sequence is read as two numbers followed by an operator.
pub(crate) struct Lexer<'a> {
    r: Reader<'a>,
    xref: XRef,
    allow_refs: bool,
    depth: u32,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(data: &'a [u8], xref: XRef, allow_refs: bool) -> Self {
        Self::new_with(Reader::new(data), xref, allow_refs)
    }

    pub(crate) fn new_with(r: Reader<'a>, xref: XRef, allow_refs: bool) -> Self {
        Self {
            r,
            xref,
            allow_refs,
            depth: 0,
        }
    }

    pub(crate) fn reader(&self) -> &Reader<'a> {
        &self.r
    }

    pub(crate) fn reader_mut(&mut self) -> &mut Reader<'a> {
        &mut self.r
    }

    /// Read the next object, failing if the next item is a keyword.
    pub(crate) fn read_object(&mut self) -> Option<Object> {
        match self.next_lexeme()? {
            Lexeme::Object(o) => Some(o),
            Lexeme::Keyword(_) => None,
        }
    }

    /// Read the next lexeme. Returns `None` at the end of data and on malformed input.
    pub(crate) fn next_lexeme(&mut self) -> Option<Lexeme<'a>> {
        skip_white_spaces_and_comments(&mut self.r);

        let lexeme = match self.r.peek_byte()? {
            b'/' => {
                self.r.forward();
                Lexeme::Object(Object::Name(self.read_name_body()))
            }
            b'[' => {
                self.r.forward();
                Lexeme::Object(Object::Array(self.read_array_body()?))
            }
            b'<' if self.r.peek_tag(b"<<").is_some() => {
                self.r.forward_tag(b"<<")?;
                Lexeme::Object(Object::Dict(self.read_dict_body()?))
            }
            b'<' => {
                self.r.forward();
                Lexeme::Object(Object::String(string::read_hex(&mut self.r)?))
            }
            b'(' => {
                self.r.forward();
                Lexeme::Object(Object::String(string::read_literal(&mut self.r)?))
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => Lexeme::Object(self.read_number_or_ref()?),
            b if is_regular_character(b) => {
                let start = self.r.offset();
                self.r.forward_while(is_regular_character);
                let keyword = self.r.data().get(start..self.r.offset())?;

                match keyword {
                    b"true" => Lexeme::Object(Object::Boolean(true)),
                    b"false" => Lexeme::Object(Object::Boolean(false)),
                    b"null" => Lexeme::Object(Object::Null),
                    _ => Lexeme::Keyword(keyword),
                }
            }
            b => {
                warn!("unexpected delimiter {:?} at offset {}", b as char, self.r.offset());

                return None;
            }
        };

        Some(lexeme)
    }

    fn read_name_body(&mut self) -> Name {
        let start = self.r.offset();
        self.r.forward_while(is_regular_character);
        let raw = self.r.data().get(start..self.r.offset()).unwrap_or_default();

        name::unescape(raw)
    }

    fn read_number_or_ref(&mut self) -> Option<Object> {
        let start = self.r.offset();
        self.r.forward_while(|b| matches!(b, b'+' | b'-' | b'.' | b'0'..=b'9'));
        let num = number::parse(self.r.data().get(start..self.r.offset())?)?;

        if self.allow_refs
            && num.is_integer()
            && let Some(obj_ref) = self.try_read_ref_tail(num.as_i64())
        {
            return Some(Object::Ref(obj_ref));
        }

        Some(Object::Number(num))
    }

    // Tries to read `gen R` after an object number, rewinding on failure.
    fn try_read_ref_tail(&mut self, obj_number: i64) -> Option<ObjRef> {
        let backup = self.r.offset();

        let result = (|| {
            skip_white_spaces_and_comments(&mut self.r);
            let start = self.r.offset();
            self.r.forward_while(|b| b.is_ascii_digit());
            let gen_number = number::parse(self.r.data().get(start..self.r.offset())?)?;
            skip_white_spaces_and_comments(&mut self.r);
            self.r.forward_tag(b"R")?;

            if self.r.peek_byte().is_some_and(is_regular_character) {
                return None;
            }

            Some(ObjRef::new(
                i32::try_from(obj_number).ok()?,
                i32::try_from(gen_number.as_i64()).ok()?,
            ))
        })();

        if result.is_none() {
            self.r.jump(backup);
        }

        result
    }

    fn enter(&mut self) -> Option<()> {
        self.depth += 1;

        if self.depth > MAX_NESTING {
            warn!("objects are nested too deeply");

            return None;
        }

        Some(())
    }

    fn read_array_body(&mut self) -> Option<Array> {
        self.enter()?;
        let mut items = Vec::new();

        loop {
            skip_white_spaces_and_comments(&mut self.r);

            if self.r.forward_tag(b"]").is_some() {
                break;
            }

            match self.next_lexeme()? {
                Lexeme::Object(o) => items.push(o),
                Lexeme::Keyword(k) => {
                    warn!("unexpected keyword {:?} in array", std::str::from_utf8(k));

                    return None;
                }
            }
        }

        self.depth -= 1;

        Some(Array::new(items, self.xref.clone()))
    }

    fn read_dict_body(&mut self) -> Option<Dict> {
        self.enter()?;
        let mut entries = BTreeMap::new();

        loop {
            skip_white_spaces_and_comments(&mut self.r);

            if self.r.forward_tag(b">>").is_some() {
                break;
            }

            let key = match self.next_lexeme()? {
                Lexeme::Object(Object::Name(n)) => n,
                other => {
                    warn!("expected a name as dictionary key, found {other:?}");

                    return None;
                }
            };

            skip_white_spaces_and_comments(&mut self.r);

            // Some producers omit the value of the last key.
            if self.r.peek_tag(b">>").is_some() {
                entries.insert(key, Object::Null);
                continue;
            }

            let value = self.read_object()?;
            entries.insert(key, value);
        }

        self.depth -= 1;

        Some(Dict::new(entries, self.xref.clone()))
    }
}
