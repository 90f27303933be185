//! Comments and white spaces.

use crate::Reader;

/// Whether the byte is a PDF white space character.
#[inline(always)]
pub fn is_white_space_character(char: u8) -> bool {
    matches!(char, 0x00 | 0x09 | 0x0a | 0x0c | 0x0d | 0x20)
}

/// Whether the byte is a delimiter character.
#[inline(always)]
pub fn is_delimiter_character(char: u8) -> bool {
    matches!(
        char,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Whether the byte is neither a white space nor a delimiter.
#[inline(always)]
pub fn is_regular_character(char: u8) -> bool {
    !is_white_space_character(char) && !is_delimiter_character(char)
}

#[inline(always)]
pub(crate) fn is_eol_character(char: u8) -> bool {
    matches!(char, 0x0a | 0x0d)
}

/// Skip any run of white spaces and `%` comments.
pub fn skip_white_spaces_and_comments(r: &mut Reader<'_>) {
    loop {
        r.forward_while(is_white_space_character);

        if r.forward_tag(b"%").is_some() {
            r.forward_while(|b| !is_eol_character(b));
        } else {
            break;
        }
    }
}
