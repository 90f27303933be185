//! A decoder for ASCII-85-encoded streams.

use crate::trivia::is_white_space_character;

/// Decode an ASCII-85-encoded stream. The data must be terminated by `~>`.
pub(crate) fn decode(data: &[u8]) -> Option<Vec<u8>> {
    let mut decoded = vec![];

    let mut stream = data
        .iter()
        .copied()
        .filter(|&b| !is_white_space_character(b));

    let mut symbols = stream.by_ref().take_while(|&b| b != b'~');

    let (tail_len, tail) = loop {
        match symbols.next() {
            Some(b'z') => decoded.extend_from_slice(&[0; 4]),
            Some(a) => {
                let (b, c, d, e) = match (
                    symbols.next(),
                    symbols.next(),
                    symbols.next(),
                    symbols.next(),
                ) {
                    (Some(b), Some(c), Some(d), Some(e)) => (b, c, d, e),
                    (None, _, _, _) => break (1, [a, b'u', b'u', b'u', b'u']),
                    (Some(b), None, _, _) => break (2, [a, b, b'u', b'u', b'u']),
                    (Some(b), Some(c), None, _) => break (3, [a, b, c, b'u', b'u']),
                    (Some(b), Some(c), Some(d), None) => break (4, [a, b, c, d, b'u']),
                };
                decoded.extend_from_slice(&word_85([a, b, c, d, e])?);
            }
            None => break (0, [b'u'; 5]),
        }
    };

    if tail_len > 0 {
        let last = word_85(tail)?;
        decoded.extend_from_slice(&last[..tail_len - 1]);
    }

    match stream.next() {
        Some(b'>') => Some(decoded),
        _ => None,
    }
}

fn word_85(word: [u8; 5]) -> Option<[u8; 4]> {
    let mut q = 0_u64;

    for b in word {
        if !(0x21..=0x75).contains(&b) {
            return None;
        }

        q = q * 85 + (b - 0x21) as u64;
    }

    // 85^5 > 256^4, so the result might not fit.
    Some(u32::try_from(q).ok()?.to_be_bytes())
}
