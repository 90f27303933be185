//! Stream filters.
//!
//! Only the filters needed for content streams, sampled functions, mesh shadings and
//! non-DCT images are implemented. Other filters are recognized, but decoding them fails.

pub(crate) mod ascii_85;
pub(crate) mod ascii_hex;
pub(crate) mod flate;
pub(crate) mod lzw;
pub(crate) mod predictor;
pub(crate) mod run_length;

use crate::object::dict::keys::*;
use crate::object::{Dict, FromObject, Name, Object};
use crate::util::OptionLog;
use log::warn;

/// A stream filter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Filter {
    /// ASCII hex encoding.
    AsciiHexDecode,
    /// ASCII base-85 encoding.
    Ascii85Decode,
    /// Lempel-Ziv-Welch compression.
    LzwDecode,
    /// Deflate compression.
    FlateDecode,
    /// Run-length encoding.
    RunLengthDecode,
    /// CCITT fax compression (unsupported).
    CcittFaxDecode,
    /// JBIG2 compression (unsupported).
    Jbig2Decode,
    /// JPEG compression (unsupported).
    DctDecode,
    /// JPEG 2000 compression (unsupported).
    JpxDecode,
    /// Encryption (unsupported).
    Crypt,
}

impl Filter {
    fn debug_name(&self) -> &'static str {
        match self {
            Filter::AsciiHexDecode => "ascii_hex",
            Filter::Ascii85Decode => "ascii_85",
            Filter::LzwDecode => "lzw",
            Filter::FlateDecode => "flate",
            Filter::RunLengthDecode => "run-length",
            Filter::CcittFaxDecode => "ccitt_fax",
            Filter::Jbig2Decode => "jbig2",
            Filter::DctDecode => "dct",
            Filter::JpxDecode => "jpx",
            Filter::Crypt => "crypt",
        }
    }

    /// Whether data encoded with this filter can be decoded.
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            Filter::AsciiHexDecode
                | Filter::Ascii85Decode
                | Filter::LzwDecode
                | Filter::FlateDecode
                | Filter::RunLengthDecode
        )
    }

    /// Look up a filter by its full or abbreviated name.
    pub fn from_name(name: &[u8]) -> Option<Self> {
        let filter = match name {
            ASCII_HEX_DECODE | b"AHx" => Filter::AsciiHexDecode,
            ASCII85_DECODE | b"A85" => Filter::Ascii85Decode,
            LZW_DECODE | b"LZW" => Filter::LzwDecode,
            FLATE_DECODE | b"Fl" => Filter::FlateDecode,
            RUN_LENGTH_DECODE | b"RL" => Filter::RunLengthDecode,
            b"CCITTFaxDecode" | b"CCF" => Filter::CcittFaxDecode,
            b"JBIG2Decode" => Filter::Jbig2Decode,
            b"DCTDecode" | b"DCT" => Filter::DctDecode,
            b"JPXDecode" => Filter::JpxDecode,
            b"Crypt" => Filter::Crypt,
            _ => {
                warn!("unknown filter: {}", Name::new(name).as_str());

                return None;
            }
        };

        Some(filter)
    }

    /// Apply the filter to the data.
    pub fn apply(&self, data: &[u8], params: Option<&Dict>) -> Option<Vec<u8>> {
        match self {
            Filter::AsciiHexDecode => ascii_hex::decode(data),
            Filter::Ascii85Decode => ascii_85::decode(data),
            Filter::RunLengthDecode => run_length::decode(data),
            Filter::LzwDecode => lzw::decode(data, params),
            Filter::FlateDecode => flate::decode(data, params),
            _ => {
                warn!("the {} filter is not supported", self.debug_name());

                None
            }
        }
        .warn_none(&format!("failed to apply filter {}", self.debug_name()))
    }
}

impl FromObject for Filter {
    fn from_object(object: Object) -> Option<Self> {
        match object {
            Object::Name(n) => Filter::from_name(&n),
            _ => None,
        }
    }
}
