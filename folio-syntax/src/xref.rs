//! Reading and querying the cross-reference table of a document.

use crate::Reader;
use crate::lexer::{Lexeme, Lexer};
use crate::object::dict::keys::{CATALOG, LENGTH, PREV, ROOT, TYPE};
use crate::object::{Dict, Name, ObjRef, Object, Stream, StreamId};
use crate::trivia::{is_eol_character, is_white_space_character, skip_white_spaces_and_comments};
use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

const XREF_ENTRY_LEN: usize = 20;
// References pointing to references are followed at most this many times.
const MAX_REF_CHAIN: usize = 8;

#[derive(Debug, Copy, Clone)]
struct Entry {
    offset: usize,
    gen_number: i32,
}

struct Repr {
    data: Arc<[u8]>,
    map: FxHashMap<i32, Entry>,
    repaired: bool,
}

/// A cross-reference table, used to lazily resolve indirect objects.
///
/// Cloning is cheap. The dummy table has no entries, so references resolved through it
/// always fail.
#[derive(Clone, Default)]
pub struct XRef(Option<Arc<Repr>>);

impl XRef {
    /// A cross-reference table without any entries.
    pub fn dummy() -> Self {
        Self(None)
    }

    /// Return the number of entries in the table.
    pub fn len(&self) -> usize {
        self.0.as_ref().map(|r| r.map.len()).unwrap_or(0)
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the table had to be rebuilt by scanning the file.
    pub fn is_repaired(&self) -> bool {
        self.0.as_ref().is_some_and(|r| r.repaired)
    }

    /// Resolve an object: references are looked up in the table, all other objects are
    /// returned as is.
    pub fn resolve_object(&self, object: Object) -> Option<Object> {
        let mut object = object;

        for _ in 0..MAX_REF_CHAIN {
            match object {
                Object::Ref(r) => object = self.get(r)?,
                other => return Some(other),
            }
        }

        warn!("reference chain is too long");

        None
    }

    /// Parse the indirect object with the given reference.
    pub fn get(&self, obj_ref: ObjRef) -> Option<Object> {
        let repr = self.0.as_ref()?;
        let entry = repr.map.get(&obj_ref.obj_number)?;

        if entry.gen_number != obj_ref.gen_number {
            warn!(
                "generation number mismatch for object {} ({} != {})",
                obj_ref.obj_number, obj_ref.gen_number, entry.gen_number
            );
        }

        self.parse_indirect(&repr.data, entry.offset, obj_ref)
    }

    fn parse_indirect(&self, data: &[u8], offset: usize, obj_ref: ObjRef) -> Option<Object> {
        let mut lexer = Lexer::new_with(Reader::new_with(data, offset), self.clone(), true);

        read_object_header(&mut lexer)?;
        let object = lexer.read_object()?;

        let Object::Dict(dict) = object else {
            return Some(object);
        };

        let r = lexer.reader_mut();
        let backup = r.offset();
        skip_white_spaces_and_comments(r);

        if r.forward_tag(b"stream").is_none() {
            r.jump(backup);
            return Some(Object::Dict(dict));
        }

        if r.forward_tag(b"\r\n").is_none() && r.forward_tag(b"\n").is_none() {
            // Lenient: accept a lone carriage return, or nothing at all.
            r.forward_tag(b"\r");
        }

        let start = r.offset();
        let stream_data = stream_data(data, start, dict.get::<usize>(LENGTH))?;

        Some(Object::Stream(
            Stream::new(dict, stream_data).with_id(StreamId::Ref(obj_ref)),
        ))
    }
}

impl Debug for XRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "XRef (entries: {})", self.len())
    }
}

// Determine the data of a stream, starting at `start`. The declared length is only trusted
// when it is followed by `endstream`.
fn stream_data(data: &[u8], start: usize, length: Option<usize>) -> Option<&[u8]> {
    if let Some(length) = length
        && let Some(end) = start.checked_add(length)
        && let Some(content) = data.get(start..end)
    {
        let mut r = Reader::new_with(data, end);
        r.forward_while(is_white_space_character);

        if r.peek_tag(b"endstream").is_some() {
            return Some(content);
        }
    }

    warn!("stream has an invalid length, searching for endstream");

    let tail = data.get(start..)?;
    let pos = find(tail, b"endstream")?;
    let mut content = &tail[..pos];

    // The end-of-line marker before `endstream` is not part of the data.
    if content.ends_with(b"\r\n") {
        content = &content[..content.len() - 2];
    } else if content.last().copied().is_some_and(is_eol_character) {
        content = &content[..content.len() - 1];
    }

    Some(content)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

// Read `N G obj`, returning the object number and generation.
fn read_object_header(lexer: &mut Lexer<'_>) -> Option<(i32, i32)> {
    let obj_number = lexer.read_object()?.cast::<i32>()?;
    let gen_number = lexer.read_object()?.cast::<i32>()?;

    match lexer.next_lexeme()? {
        Lexeme::Keyword(b"obj") => Some((obj_number, gen_number)),
        _ => None,
    }
}

/// Load the cross-reference table of a document, returning it together with the trailer
/// dictionary.
///
/// If the table is broken, it is rebuilt by scanning the file for object headers.
pub(crate) fn load(data: Arc<[u8]>) -> Option<(XRef, Dict)> {
    let mut map = FxHashMap::default();

    let trailer_pos = find_last_xref_pos(&data).and_then(|pos| {
        let mut visited = FxHashSet::default();
        populate_from_table(&data, pos, &mut map, &mut visited)
    });

    if let Some(trailer_pos) = trailer_pos {
        let xref = XRef(Some(Arc::new(Repr {
            data: data.clone(),
            map,
            repaired: false,
        })));

        if let Some(trailer) = read_trailer(&data, trailer_pos, &xref)
            && trailer.get::<Dict>(ROOT).is_some()
        {
            return Some((xref, trailer));
        }
    }

    fallback(data)
}

fn find_last_xref_pos(data: &[u8]) -> Option<usize> {
    let pos = rfind(data, b"startxref")?;
    let mut r = Reader::new_with(data, pos + b"startxref".len());
    skip_white_spaces_and_comments(&mut r);

    let start = r.offset();
    r.forward_while(|b| b.is_ascii_digit());
    std::str::from_utf8(data.get(start..r.offset())?)
        .ok()?
        .parse()
        .ok()
}

// Populate the map from the classic table at `pos` (and its predecessors), and return
// the offset of the trailer dictionary.
fn populate_from_table(
    data: &[u8],
    pos: usize,
    map: &mut FxHashMap<i32, Entry>,
    visited: &mut FxHashSet<usize>,
) -> Option<usize> {
    if !visited.insert(pos) {
        warn!("cycle in xref tables");

        return None;
    }

    let mut r = Reader::new_with(data, pos);
    skip_white_spaces_and_comments(&mut r);
    r.forward_tag(b"xref")?;

    let mut entries = vec![];

    loop {
        skip_white_spaces_and_comments(&mut r);

        if r.peek_tag(b"trailer").is_some() {
            break;
        }

        let start = read_u32(&mut r)?;
        r.forward_while(is_white_space_character);
        let count = read_u32(&mut r)?;
        r.forward_while(is_white_space_character);

        for obj_number in start..start.checked_add(count)? {
            let bytes = r.read_bytes(XREF_ENTRY_LEN)?;
            let offset = parse_digits(bytes.get(0..10)?)? as usize;
            let gen_number = i32::try_from(parse_digits(bytes.get(11..16)?)?).ok()?;

            if bytes.get(17) == Some(&b'n') {
                entries.push((i32::try_from(obj_number).ok()?, Entry { offset, gen_number }));
            }
        }
    }

    r.forward_tag(b"trailer")?;
    let trailer_pos = r.offset();
    let trailer = Lexer::new_with(Reader::new_with(data, trailer_pos), XRef::dummy(), true)
        .read_object()?
        .cast::<Dict>()?;

    // Older sections are inserted first, so that newer ones override them.
    if let Some(prev) = trailer.get::<usize>(PREV) {
        populate_from_table(data, prev, map, visited);
    }

    map.extend(entries);

    Some(trailer_pos)
}

fn read_u32(r: &mut Reader<'_>) -> Option<u32> {
    let start = r.offset();
    r.forward_while(|b| b.is_ascii_digit());
    parse_digits(r.data().get(start..r.offset())?)
}

fn parse_digits(data: &[u8]) -> Option<u32> {
    if data.is_empty() {
        return None;
    }

    let mut accum = 0_u32;

    for byte in data {
        match *byte {
            b'0'..=b'9' => accum = accum.checked_mul(10)?.checked_add((*byte - b'0') as u32)?,
            _ => return None,
        }
    }

    Some(accum)
}

fn read_trailer(data: &[u8], pos: usize, xref: &XRef) -> Option<Dict> {
    Lexer::new_with(Reader::new_with(data, pos), xref.clone(), true)
        .read_object()?
        .cast::<Dict>()
}

fn fallback(data: Arc<[u8]>) -> Option<(XRef, Dict)> {
    warn!("xref table was invalid, trying to rebuild it");

    let mut map = FxHashMap::default();
    let mut root_ref = None;

    for offset in 0..data.len() {
        let at_line_start = offset == 0
            || data
                .get(offset - 1)
                .copied()
                .is_some_and(is_white_space_character);

        if !at_line_start || !data[offset].is_ascii_digit() {
            continue;
        }

        let mut lexer = Lexer::new_with(Reader::new_with(&data, offset), XRef::dummy(), true);

        if let Some((obj_number, gen_number)) = read_object_header(&mut lexer) {
            map.insert(obj_number, Entry { offset, gen_number });

            if let Some(Object::Dict(dict)) = lexer.read_object()
                && dict.get::<Name>(TYPE).as_deref() == Some(CATALOG)
            {
                root_ref = Some(ObjRef::new(obj_number, gen_number));
            }
        }
    }

    let xref = XRef(Some(Arc::new(Repr {
        data: data.clone(),
        map,
        repaired: true,
    })));

    let trailer = rfind(&data, b"trailer")
        .and_then(|pos| read_trailer(&data, pos + b"trailer".len(), &xref))
        .filter(|t| t.get::<Dict>(ROOT).is_some())
        .or_else(|| {
            let mut entries = BTreeMap::new();
            entries.insert(Name::new(ROOT), Object::Ref(root_ref?));

            Some(Dict::new(entries, xref.clone()))
        });

    match trailer {
        Some(trailer) => {
            warn!("rebuilt xref table with {} entries", xref.len());

            Some((xref, trailer))
        }
        None => {
            warn!("couldn't find a document catalog, failed to rebuild xref table");

            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Number;

    const FILE: &[u8] = b"%PDF-1.3
1 0 obj
<< /Type /Catalog /Pages 2 0 R >>
endobj
2 0 obj
<< /Length 3 0 R >>
stream
abc
endstream
endobj
3 0 obj
3
endobj
xref
0 4
0000000000 65535 f\r
0000000009 00000 n\r
0000000058 00000 n\r
0000000114 00000 n\r
trailer
<< /Size 4 /Root 1 0 R >>
startxref
131
%%EOF";

    #[test]
    fn classic_table() {
        let (xref, trailer) = load(Arc::from(FILE)).unwrap();
        assert!(!xref.is_repaired());
        assert_eq!(xref.len(), 3);

        let catalog = trailer.get::<Dict>(ROOT).unwrap();
        let stream = catalog.get::<Stream>(b"Pages").unwrap();
        assert_eq!(stream.raw_data(), b"abc");
        assert_eq!(stream.id(), StreamId::Ref(ObjRef::new(2, 0)));
    }

    #[test]
    fn rebuilds_broken_table() {
        let mut broken = FILE.to_vec();
        let pos = rfind(&broken, b"131").unwrap();
        broken[pos..pos + 3].copy_from_slice(b"999");

        let (xref, trailer) = load(Arc::from(broken)).unwrap();
        assert!(xref.is_repaired());
        assert_eq!(
            xref.get(ObjRef::new(3, 0)),
            Some(Object::Number(Number::from_i64(3)))
        );
        assert!(trailer.get::<Dict>(ROOT).is_some());
    }
}
