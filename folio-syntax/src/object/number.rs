//! Numbers.

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq)]
enum InternalNumber {
    Integer(i64),
    Real(f64),
}

/// A PDF number, either an integer or a real number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Number(InternalNumber);

impl Number {
    /// Zero.
    pub const ZERO: Self = Self(InternalNumber::Integer(0));

    /// Create a new integer number.
    pub fn from_i64(i: i64) -> Self {
        Self(InternalNumber::Integer(i))
    }

    /// Create a new real number.
    pub fn from_f64(f: f64) -> Self {
        Self(InternalNumber::Real(f))
    }

    /// Whether the number was written as an integer.
    pub fn is_integer(&self) -> bool {
        matches!(self.0, InternalNumber::Integer(_))
    }

    /// Return the number as an f64.
    pub fn as_f64(&self) -> f64 {
        match self.0 {
            InternalNumber::Integer(i) => i as f64,
            InternalNumber::Real(r) => r,
        }
    }

    /// Return the number as an f32.
    pub fn as_f32(&self) -> f32 {
        self.as_f64() as f32
    }

    /// Return the number as an i64, rounding real numbers.
    pub fn as_i64(&self) -> i64 {
        match self.0 {
            InternalNumber::Integer(i) => i,
            InternalNumber::Real(r) => r.round() as i64,
        }
    }

    pub(crate) fn as_i64_exact(&self) -> Option<i64> {
        match self.0 {
            InternalNumber::Integer(i) => Some(i),
            InternalNumber::Real(r) => (r.fract() == 0.0).then_some(r as i64),
        }
    }

    pub(crate) fn as_i32(&self) -> Option<i32> {
        self.as_i64_exact()?.try_into().ok()
    }

    pub(crate) fn as_u8(&self) -> Option<u8> {
        self.as_i64_exact()?.try_into().ok()
    }

    pub(crate) fn as_u16(&self) -> Option<u16> {
        self.as_i64_exact()?.try_into().ok()
    }

    pub(crate) fn as_u32(&self) -> Option<u32> {
        self.as_i64_exact()?.try_into().ok()
    }

    pub(crate) fn as_usize(&self) -> Option<usize> {
        self.as_i64_exact()?.try_into().ok()
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            InternalNumber::Integer(i) => write!(f, "{i}"),
            InternalNumber::Real(r) => write!(f, "{r}"),
        }
    }
}

/// Parse the bytes of a number token.
///
/// Like most readers, we are lenient and accept things like `4.`, `.5`, `+-3` or `1.2.3`
/// (which is read as `1.2`).
pub(crate) fn parse(bytes: &[u8]) -> Option<Number> {
    let mut negative = false;
    let mut idx = 0;

    while let Some(b) = bytes.get(idx) {
        match b {
            b'-' => negative = !negative,
            b'+' => {}
            _ => break,
        }

        idx += 1;
    }

    let rest = &bytes[idx..];
    let int_len = rest.iter().take_while(|b| b.is_ascii_digit()).count();

    if rest.get(int_len) != Some(&b'.') {
        if int_len == 0 {
            return None;
        }

        let digits = std::str::from_utf8(&rest[..int_len]).ok()?;
        let num = match digits.parse::<i64>() {
            Ok(i) => Number::from_i64(if negative { -i } else { i }),
            // Too large for an integer, fall back to a real.
            Err(_) => {
                let f = digits.parse::<f64>().ok()?;
                Number::from_f64(if negative { -f } else { f })
            }
        };

        return Some(num);
    }

    let frac_len = rest[int_len + 1..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();

    if int_len == 0 && frac_len == 0 {
        return None;
    }

    let mut text = std::string::String::with_capacity(int_len + frac_len + 2);
    text.push('0');
    text.push_str(std::str::from_utf8(&rest[..int_len]).ok()?);
    text.push('.');
    text.push_str(std::str::from_utf8(&rest[int_len + 1..int_len + 1 + frac_len]).ok()?);
    text.push('0');
    let value = text.parse::<f64>().ok()?;

    Some(Number::from_f64(if negative { -value } else { value }))
}
