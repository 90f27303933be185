//! Run-length decoding.
//!
//! Each run starts with a length byte. `0..=127` copies the next `n + 1` bytes, `129..=255`
//! repeats the next byte `257 - n` times and `128` marks the end of the data.

use log::warn;

const END_OF_DATA: u8 = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum RunLengthError {
    /// The data ended in the middle of a run. Holds everything up to that run, plus the
    /// bytes of a partial literal run.
    #[error("run-length data ended in the middle of a run")]
    Truncated(Vec<u8>),
}

pub(crate) fn decode(data: &[u8]) -> Option<Vec<u8>> {
    match expand(data) {
        Ok(decoded) => Some(decoded),
        Err(RunLengthError::Truncated(decoded)) => {
            warn!("run-length stream ended prematurely, keeping {} bytes", decoded.len());

            Some(decoded)
        }
    }
}

/// Expand all runs up to the end-of-data marker. A missing marker is fine.
pub(crate) fn expand(mut data: &[u8]) -> Result<Vec<u8>, RunLengthError> {
    let mut out = Vec::with_capacity(data.len());

    loop {
        data = match data {
            [] | [END_OF_DATA, ..] => return Ok(out),
            [n @ 0..=127, rest @ ..] => {
                let Some((literal, rest)) = rest.split_at_checked(*n as usize + 1) else {
                    out.extend_from_slice(rest);

                    return Err(RunLengthError::Truncated(out));
                };

                out.extend_from_slice(literal);
                rest
            }
            [n, byte, rest @ ..] => {
                out.resize(out.len() + 257 - *n as usize, *byte);
                rest
            }
            [_] => return Err(RunLengthError::Truncated(out)),
        };
    }
}
