//! Dictionaries.

use crate::lexer::Lexer;
use crate::object::{FromObject, Name, ObjRef, Object};
use crate::xref::XRef;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// A PDF dictionary.
#[derive(Clone, Default)]
pub struct Dict {
    entries: Arc<BTreeMap<Name, Object>>,
    xref: XRef,
}

impl Dict {
    pub(crate) fn new(entries: BTreeMap<Name, Object>, xref: XRef) -> Self {
        Self {
            entries: Arc::new(entries),
            xref,
        }
    }

    /// Create a new, empty dictionary.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a dictionary from its textual representation.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        Lexer::new(data, XRef::dummy(), true).read_object()?.cast()
    }

    /// Return the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the dictionary contains the given key.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    /// Return the entry for the key, resolving references and casting to `T`.
    pub fn get<T: FromObject>(&self, key: &[u8]) -> Option<T> {
        self.xref.resolve_object(self.entries.get(key)?.clone())?.cast()
    }

    /// Return the raw entry for the key without resolving references.
    pub fn get_raw(&self, key: &[u8]) -> Option<&Object> {
        self.entries.get(key)
    }

    /// Return the reference stored under the key, if the entry is an indirect reference.
    pub fn get_ref(&self, key: &[u8]) -> Option<ObjRef> {
        match self.entries.get(key)? {
            Object::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// Return an iterator over all keys.
    pub fn keys(&self) -> impl Iterator<Item = &Name> + '_ {
        self.entries.keys()
    }

    /// Return an iterator over all raw entries.
    pub fn entries(&self) -> impl Iterator<Item = (&Name, &Object)> + '_ {
        self.entries.iter()
    }

    /// Return the cross-reference table used to resolve entries of this dictionary.
    pub fn xref(&self) -> &XRef {
        &self.xref
    }
}

impl PartialEq for Dict {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Debug for Dict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

/// Dictionary keys and well-known names.
#[allow(missing_docs)]
pub mod keys {
    macro_rules! key {
        ($i:ident, $e:expr) => {
            pub const $i: &[u8] = $e;
        };
    }

    key!(ALPHA, b"Alpha");
    key!(ALTERNATE, b"Alternate");
    key!(ANTI_ALIAS, b"AntiAlias");
    key!(ASCII85_DECODE, b"ASCII85Decode");
    key!(ASCII_HEX_DECODE, b"ASCIIHexDecode");
    key!(ART_BOX, b"ArtBox");
    key!(BACKGROUND, b"Background");
    key!(BBOX, b"BBox");
    key!(BC, b"BC");
    key!(BITS_PER_COMPONENT, b"BitsPerComponent");
    key!(BITS_PER_COORDINATE, b"BitsPerCoordinate");
    key!(BITS_PER_FLAG, b"BitsPerFlag");
    key!(BITS_PER_SAMPLE, b"BitsPerSample");
    key!(BLEED_BOX, b"BleedBox");
    key!(BM, b"BM");
    key!(BOUNDS, b"Bounds");
    key!(C0, b"C0");
    key!(C1, b"C1");
    key!(CA, b"CA");
    key!(CA_NS, b"ca");
    key!(CAL_GRAY, b"CalGray");
    key!(CATALOG, b"Catalog");
    key!(CAL_RGB, b"CalRGB");
    key!(COLORS, b"Colors");
    key!(COLORSPACE, b"ColorSpace");
    key!(COLUMNS, b"Columns");
    key!(CONTENTS, b"Contents");
    key!(COORDS, b"Coords");
    key!(COUNT, b"Count");
    key!(CROP_BOX, b"CropBox");
    key!(CS, b"CS");
    key!(D, b"D");
    key!(DECODE, b"Decode");
    key!(DECODE_PARMS, b"DecodeParms");
    key!(DEVICE_CMYK, b"DeviceCMYK");
    key!(DEVICE_GRAY, b"DeviceGray");
    key!(DEVICE_N, b"DeviceN");
    key!(DEVICE_RGB, b"DeviceRGB");
    key!(DOMAIN, b"Domain");
    key!(DP, b"DP");
    key!(EARLY_CHANGE, b"EarlyChange");
    key!(ENCODE, b"Encode");
    key!(EXT_G_STATE, b"ExtGState");
    key!(EXTEND, b"Extend");
    key!(F, b"F");
    key!(FILTER, b"Filter");
    key!(FLATE_DECODE, b"FlateDecode");
    key!(FORM, b"Form");
    key!(FUNCTION, b"Function");
    key!(FUNCTION_TYPE, b"FunctionType");
    key!(FUNCTIONS, b"Functions");
    key!(G, b"G");
    key!(GROUP, b"Group");
    key!(H, b"H");
    key!(HEIGHT, b"Height");
    key!(I, b"I");
    key!(ICC_BASED, b"ICCBased");
    key!(ID, b"ID");
    key!(IM, b"IM");
    key!(IMAGE, b"Image");
    key!(IMAGE_MASK, b"ImageMask");
    key!(INDEXED, b"Indexed");
    key!(INFO, b"Info");
    key!(INTERPOLATE, b"Interpolate");
    key!(K, b"K");
    key!(KIDS, b"Kids");
    key!(LAB, b"Lab");
    key!(LENGTH, b"Length");
    key!(LC, b"LC");
    key!(LJ, b"LJ");
    key!(LUMINOSITY, b"Luminosity");
    key!(LW, b"LW");
    key!(LZW_DECODE, b"LZWDecode");
    key!(MATRIX, b"Matrix");
    key!(MEDIA_BOX, b"MediaBox");
    key!(ML, b"ML");
    key!(N, b"N");
    key!(NONE, b"None");
    key!(ORDER, b"Order");
    key!(PAGE, b"Page");
    key!(PAGES, b"Pages");
    key!(PAINT_TYPE, b"PaintType");
    key!(PATTERN, b"Pattern");
    key!(PATTERN_TYPE, b"PatternType");
    key!(PREDICTOR, b"Predictor");
    key!(PREV, b"Prev");
    key!(RANGE, b"Range");
    key!(RESOURCES, b"Resources");
    key!(RI, b"RI");
    key!(ROOT, b"Root");
    key!(RUN_LENGTH_DECODE, b"RunLengthDecode");
    key!(S, b"S");
    key!(SEPARATION, b"Separation");
    key!(SHADING, b"Shading");
    key!(SHADING_TYPE, b"ShadingType");
    key!(SIZE, b"Size");
    key!(SMASK, b"SMask");
    key!(SUBTYPE, b"Subtype");
    key!(TILING_TYPE, b"TilingType");
    key!(TR, b"TR");
    key!(TRIM_BOX, b"TrimBox");
    key!(TRANSPARENCY, b"Transparency");
    key!(TYPE, b"Type");
    key!(VERTICES_PER_ROW, b"VerticesPerRow");
    key!(W, b"W");
    key!(WHITE_POINT, b"WhitePoint");
    key!(WIDTH, b"Width");
    key!(X_STEP, b"XStep");
    key!(XOBJECT, b"XObject");
    key!(Y_STEP, b"YStep");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Number;

    #[test]
    fn nested_dict() {
        let dict = Dict::from_bytes(b"<< /Type /Page /Inner << /A 1 /B [1 2] >> >>").unwrap();
        assert_eq!(dict.get::<Name>(keys::TYPE).unwrap().as_str(), "Page");

        let inner = dict.get::<Dict>(b"Inner").unwrap();
        assert_eq!(inner.get::<Number>(b"A"), Some(Number::from_i64(1)));
        assert_eq!(inner.len(), 2);
        assert!(inner.get::<Dict>(b"B").is_none());
    }

    #[test]
    fn unresolvable_reference() {
        let dict = Dict::from_bytes(b"<< /Resources 3 0 R >>").unwrap();
        assert_eq!(dict.get_ref(keys::RESOURCES), Some(ObjRef::new(3, 0)));
        assert!(dict.get::<Dict>(keys::RESOURCES).is_none());
    }
}
