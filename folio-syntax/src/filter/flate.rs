//! A decoder for Flate-encoded streams.

use crate::filter::predictor::{self, PredictorParams};
use crate::object::Dict;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

pub(crate) fn decode(data: &[u8], params: Option<&Dict>) -> Option<Vec<u8>> {
    let decoded = zlib(data).or_else(|| deflate(data))?;

    predictor::apply(decoded, &PredictorParams::from_params(params))
}

fn zlib(data: &[u8]) -> Option<Vec<u8>> {
    let mut out = vec![];
    ZlibDecoder::new(data).read_to_end(&mut out).ok()?;

    Some(out)
}

fn deflate(data: &[u8]) -> Option<Vec<u8>> {
    let mut out = vec![];
    DeflateDecoder::new(data).read_to_end(&mut out).ok()?;

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::decode;
    use flate2::Compression;
    use flate2::write::{DeflateEncoder, ZlibEncoder};
    use std::io::Write;

    #[test]
    fn zlib_and_raw_deflate() {
        let mut e = ZlibEncoder::new(Vec::new(), Compression::new(6));
        e.write_all(b"0 0 1 1 re f").unwrap();
        assert_eq!(decode(&e.finish().unwrap(), None).unwrap(), b"0 0 1 1 re f");

        let mut e = DeflateEncoder::new(Vec::new(), Compression::new(6));
        e.write_all(b"q Q").unwrap();
        assert_eq!(decode(&e.finish().unwrap(), None).unwrap(), b"q Q");
    }

    #[test]
    fn garbage() {
        assert!(decode(b"not compressed at all", None).is_none());
    }
}
