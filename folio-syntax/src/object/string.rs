//! Strings.

use crate::Reader;
use crate::filter::ascii_hex;
use crate::trivia::{is_eol_character, is_white_space_character};
use std::sync::Arc;

/// A PDF string, holding the already unescaped bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct String(Arc<[u8]>);

impl String {
    /// Create a new string from raw bytes.
    pub fn new(data: &[u8]) -> Self {
        Self(Arc::from(data))
    }

    /// Return the bytes of the string.
    pub fn get(&self) -> &[u8] {
        &self.0
    }
}

/// Read a literal string. The reader must be positioned after the opening parenthesis.
pub(crate) fn read_literal(r: &mut Reader<'_>) -> Option<String> {
    let mut out = Vec::new();
    let mut depth = 1_u32;

    loop {
        let b = r.read_byte()?;

        match b {
            b'(' => {
                depth += 1;
                out.push(b);
            }
            b')' => {
                depth -= 1;

                if depth == 0 {
                    break;
                }

                out.push(b);
            }
            b'\\' => {
                let escaped = r.read_byte()?;

                match escaped {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0c),
                    b'(' | b')' | b'\\' => out.push(escaped),
                    // Line continuation.
                    b'\r' => {
                        r.forward_tag(b"\n");
                    }
                    b'\n' => {}
                    b'0'..=b'7' => {
                        let mut value = (escaped - b'0') as u32;

                        for _ in 0..2 {
                            match r.peek_byte() {
                                Some(d @ b'0'..=b'7') => {
                                    value = value * 8 + (d - b'0') as u32;
                                    r.forward();
                                }
                                _ => break,
                            }
                        }

                        out.push(value as u8);
                    }
                    // Unknown escapes are ignored, the backslash is dropped.
                    other => out.push(other),
                }
            }
            b'\r' => {
                // All end-of-line markers are normalized to a single line feed.
                r.forward_tag(b"\n");
                out.push(b'\n');
            }
            b if is_eol_character(b) => out.push(b'\n'),
            _ => out.push(b),
        }
    }

    Some(String(Arc::from(out)))
}

/// Read a hex string. The reader must be positioned after the opening `<`.
pub(crate) fn read_hex(r: &mut Reader<'_>) -> Option<String> {
    let start = r.offset();
    r.forward_while(|b| b != b'>');
    let end = r.offset();
    r.forward_tag(b">")?;

    let content = r.data().get(start..end)?;
    if content
        .iter()
        .any(|b| !b.is_ascii_hexdigit() && !is_white_space_character(*b))
    {
        return None;
    }

    let cleaned = content
        .iter()
        .copied()
        .filter(|b| b.is_ascii_hexdigit())
        .collect::<Vec<_>>();

    Some(String(Arc::from(ascii_hex::decode_hex_string(&cleaned)?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(data: &[u8]) -> Vec<u8> {
        let mut r = Reader::new(data);
        r.forward_tag(b"(").unwrap();
        read_literal(&mut r).unwrap().get().to_vec()
    }

    #[test]
    fn literal_nested_and_escaped() {
        assert_eq!(literal(b"(a (nested) string)"), b"a (nested) string");
        assert_eq!(literal(b"(tab\\tnew\\nline)"), b"tab\tnew\nline");
        assert_eq!(literal(b"(\\101\\7)"), b"A\x07");
        assert_eq!(literal(b"(split \\\r\nline)"), b"split line");
        assert_eq!(literal(b"(\\(\\))"), b"()");
    }

    #[test]
    fn hex_strings() {
        let mut r = Reader::new(b"<48 65 6C6C 6F>");
        r.forward_tag(b"<").unwrap();
        assert_eq!(read_hex(&mut r).unwrap().get(), b"Hello");

        let mut r = Reader::new(b"<4>");
        r.forward_tag(b"<").unwrap();
        assert_eq!(read_hex(&mut r).unwrap().get(), [0x40]);
    }
}
