//! Names.

use std::borrow::Borrow;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

/// A PDF name, stored without the leading slash and with `#xx` escapes resolved.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Arc<[u8]>);

impl Name {
    /// Create a new name from its (unescaped) bytes.
    pub fn new(data: &[u8]) -> Self {
        Self(Arc::from(data))
    }

    /// Return a string representation of the name.
    ///
    /// Names that are not valid UTF-8 are returned as `"{non-utf8}"`.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("{non-utf8}")
    }
}

impl Deref for Name {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Borrow<[u8]> for Name {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Name {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.as_str())
    }
}

/// Unescape the raw bytes of a name token.
pub(crate) fn unescape(raw: &[u8]) -> Name {
    if !raw.contains(&b'#') {
        return Name::new(raw);
    }

    let mut out = Vec::with_capacity(raw.len());
    let mut idx = 0;

    while idx < raw.len() {
        let b = raw[idx];

        if b == b'#'
            && let Some(hex) = raw.get(idx + 1..idx + 3)
            && let Ok(hex) = std::str::from_utf8(hex)
            && let Ok(decoded) = u8::from_str_radix(hex, 16)
        {
            out.push(decoded);
            idx += 3;
        } else {
            out.push(b);
            idx += 1;
        }
    }

    Name::new(&out)
}
