//! PDF objects.

use crate::lexer::Lexer;
use crate::xref::XRef;
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) mod array;
pub(crate) mod dict;
pub(crate) mod name;
pub(crate) mod number;
pub(crate) mod rect;
pub(crate) mod stream;
pub(crate) mod string;

pub use array::Array;
pub use dict::{Dict, keys};
pub use name::Name;
pub use number::Number;
pub use rect::Rect;
pub use stream::{Stream, StreamId};
pub use string::String;

/// A reference to an indirect object.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef {
    /// The object number.
    pub obj_number: i32,
    /// The generation number.
    pub gen_number: i32,
}

impl ObjRef {
    /// Create a new object reference.
    pub fn new(obj_number: i32, gen_number: i32) -> Self {
        Self {
            obj_number,
            gen_number,
        }
    }
}

/// A primitive PDF object.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// A null object.
    Null,
    /// A boolean object.
    Boolean(bool),
    /// A number object.
    Number(Number),
    /// A string object.
    String(String),
    /// A name object.
    Name(Name),
    /// An array object.
    Array(Array),
    /// A dict object.
    Dict(Dict),
    /// A stream object.
    Stream(Stream),
    /// An unresolved reference to an indirect object.
    Ref(ObjRef),
}

impl Object {
    /// Parse a single direct object from the given bytes.
    ///
    /// References are recognized, but cannot be resolved.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        Lexer::new(data, XRef::dummy(), true).read_object()
    }

    /// Try casting the object to a specific subtype.
    #[inline]
    pub fn cast<T: FromObject>(self) -> Option<T> {
        T::from_object(self)
    }

    /// Return the object as a number, if it is one.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Return the object as a name, if it is one.
    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Self::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Return the dictionary of the object if it is either a dictionary or a stream.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Self::Dict(d) => Some(d),
            Self::Stream(s) => Some(s.dict()),
            _ => None,
        }
    }
}

/// A trait for types that can be extracted from a (resolved) [`Object`].
pub trait FromObject: Sized {
    /// Try to convert the object.
    fn from_object(object: Object) -> Option<Self>;
}

impl FromObject for Object {
    fn from_object(object: Object) -> Option<Self> {
        Some(object)
    }
}

impl FromObject for bool {
    fn from_object(object: Object) -> Option<Self> {
        match object {
            Object::Boolean(b) => Some(b),
            _ => None,
        }
    }
}

impl FromObject for Number {
    fn from_object(object: Object) -> Option<Self> {
        object.as_number()
    }
}

macro_rules! number_from_object {
    ($($t:ty => $conv:ident),*) => {
        $(
            impl FromObject for $t {
                fn from_object(object: Object) -> Option<Self> {
                    object.as_number().and_then(|n| n.$conv())
                }
            }
        )*
    };
}

number_from_object!(
    u8 => as_u8,
    u16 => as_u16,
    u32 => as_u32,
    i32 => as_i32,
    i64 => as_i64_exact,
    usize => as_usize
);

impl FromObject for f32 {
    fn from_object(object: Object) -> Option<Self> {
        object.as_number().map(|n| n.as_f32())
    }
}

impl FromObject for f64 {
    fn from_object(object: Object) -> Option<Self> {
        object.as_number().map(|n| n.as_f64())
    }
}

impl FromObject for String {
    fn from_object(object: Object) -> Option<Self> {
        match object {
            Object::String(s) => Some(s),
            _ => None,
        }
    }
}

impl FromObject for Name {
    fn from_object(object: Object) -> Option<Self> {
        match object {
            Object::Name(n) => Some(n),
            _ => None,
        }
    }
}

impl FromObject for Array {
    fn from_object(object: Object) -> Option<Self> {
        match object {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }
}

impl FromObject for Dict {
    fn from_object(object: Object) -> Option<Self> {
        match object {
            Object::Dict(d) => Some(d),
            _ => None,
        }
    }
}

impl FromObject for Stream {
    fn from_object(object: Object) -> Option<Self> {
        match object {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }
}

impl FromObject for ObjRef {
    fn from_object(object: Object) -> Option<Self> {
        match object {
            Object::Ref(r) => Some(r),
            _ => None,
        }
    }
}

impl<T: FromObject, const N: usize> FromObject for [T; N] {
    fn from_object(object: Object) -> Option<Self> {
        let array = Array::from_object(object)?;

        if array.len() != N {
            return None;
        }

        let items = array.iter::<T>().collect::<Vec<_>>();
        items.try_into().ok()
    }
}

/// Return a new, process-unique identifier for objects that don't have an object number.
pub(crate) fn next_anonymous_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    COUNTER.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_primitives() {
        assert_eq!(Object::from_bytes(b"null"), Some(Object::Null));
        assert_eq!(Object::from_bytes(b"true"), Some(Object::Boolean(true)));
        assert_eq!(
            Object::from_bytes(b"-3.5").and_then(|o| o.cast::<f32>()),
            Some(-3.5)
        );
        assert_eq!(
            Object::from_bytes(b"12 0 R"),
            Some(Object::Ref(ObjRef::new(12, 0)))
        );
    }

    #[test]
    fn fixed_size_arrays() {
        let arr = Object::from_bytes(b"[1 2 3]").unwrap();
        assert_eq!(arr.clone().cast::<[f32; 3]>(), Some([1.0, 2.0, 3.0]));
        assert_eq!(arr.cast::<[f32; 4]>(), None);
    }
}
