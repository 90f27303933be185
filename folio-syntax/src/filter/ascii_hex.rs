//! A decoder for ASCII-hex-encoded streams.

use crate::Reader;
use crate::trivia::is_white_space_character;

/// Decode an ASCII-hex-encoded stream.
///
/// The terminating `>` is optional and an odd number of digits is padded with a zero.
pub(crate) fn decode(data: &[u8]) -> Option<Vec<u8>> {
    let mut reader = Reader::new(data);
    let mut cleaned = Vec::with_capacity(data.len());

    while let Some(byte) = reader.read_byte() {
        match byte {
            b'>' => break,
            b if b.is_ascii_hexdigit() => cleaned.push(b),
            b if is_white_space_character(b) => {}
            _ => return None,
        }
    }

    decode_hex_string(&cleaned)
}

/// Decode a string of hex digits, padding the last digit with a zero if necessary.
pub(crate) fn decode_hex_string(str: &[u8]) -> Option<Vec<u8>> {
    str.chunks(2)
        .map(|pair| Some((val(pair[0])? << 4) | val(*pair.get(1).unwrap_or(&b'0'))?))
        .collect()
}

fn val(c: u8) -> Option<u8> {
    match c {
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'0'..=b'9' => Some(c - b'0'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::decode;

    #[test]
    fn decode_simple() {
        assert_eq!(decode(b"AF3E2901>").unwrap(), vec![0xaf, 0x3e, 0x29, 0x01]);
    }

    #[test]
    fn decode_whitespaces() {
        assert_eq!(
            decode(b"AF3   E2 \n  901>").unwrap(),
            vec![0xaf, 0x3e, 0x29, 0x01]
        );
    }

    #[test]
    fn decode_without_gt() {
        assert_eq!(decode(b"AF3E2901").unwrap(), vec![0xaf, 0x3e, 0x29, 0x01]);
    }

    #[test]
    fn decode_with_padding() {
        assert_eq!(decode(b"AF3E291>").unwrap(), vec![0xaf, 0x3e, 0x29, 0x10]);
    }

    #[test]
    fn invalid_digit() {
        assert!(decode(b"AFXX>").is_none());
    }
}
