//! Streams.

use crate::filter::Filter;
use crate::object::dict::keys::{DECODE_PARMS, FILTER};
use crate::object::{Array, Dict, ObjRef, next_anonymous_id};
use log::warn;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// The identity of a stream.
///
/// Streams that were loaded as indirect objects are identified by their reference, so
/// resolving the same object twice yields the same identity. All other streams (inline
/// images, streams parsed from raw bytes) get a fresh identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StreamId {
    /// A stream stored as an indirect object.
    Ref(ObjRef),
    /// A stream without an object number.
    Anonymous(u64),
}

impl StreamId {
    /// Create a new, unique anonymous identifier.
    pub fn anonymous() -> Self {
        Self::Anonymous(next_anonymous_id())
    }
}

/// A stream of arbitrary data.
#[derive(Clone)]
pub struct Stream {
    dict: Dict,
    data: Arc<[u8]>,
    id: StreamId,
}

impl Stream {
    /// Create a new stream from a dictionary and its raw (still encoded) data.
    pub fn new(dict: Dict, data: &[u8]) -> Self {
        Self {
            dict,
            data: Arc::from(data),
            id: StreamId::anonymous(),
        }
    }

    pub(crate) fn with_id(mut self, id: StreamId) -> Self {
        self.id = id;
        self
    }

    /// Return the dictionary of the stream.
    pub fn dict(&self) -> &Dict {
        &self.dict
    }

    /// Return the identity of the stream.
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Return the raw, undecoded data of the stream.
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    /// Return all filters declared by the stream, in application order.
    pub fn filters(&self) -> Vec<Filter> {
        filter_chain(&self.dict)
            .into_iter()
            .map(|(filter, _)| filter)
            .collect()
    }

    /// Return the decoded data of the stream.
    ///
    /// The result is not cached, so calling this method multiple times is expensive.
    pub fn decoded(&self) -> Option<Vec<u8>> {
        decode_with(&self.data, &self.dict)
    }
}

/// Apply the filter chain declared in `dict` to `data`.
pub(crate) fn decode_with(data: &[u8], dict: &Dict) -> Option<Vec<u8>> {
    let mut current = data.to_vec();

    for (filter, params) in filter_chain(dict) {
        current = filter.apply(&current, params.as_ref())?;
    }

    Some(current)
}

fn filter_chain(dict: &Dict) -> Vec<(Filter, Option<Dict>)> {
    if let Some(filter) = dict.get::<Filter>(FILTER) {
        vec![(filter, dict.get::<Dict>(DECODE_PARMS))]
    } else if let Some(filters) = dict.get::<Array>(FILTER) {
        let params = dict.get::<Array>(DECODE_PARMS);

        filters
            .iter::<Filter>()
            .enumerate()
            .map(|(i, f)| (f, params.as_ref().and_then(|p| p.get::<Dict>(i))))
            .collect()
    } else {
        if dict.contains_key(FILTER) {
            warn!("stream has an unrecognized filter entry, using raw data");
        }

        vec![]
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Debug for Stream {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Stream ({:?}, len: {:?})", self.id, self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_filter_chain() {
        let dict = Dict::from_bytes(b"<< /Filter [/AHx /RL] >>").unwrap();
        // Run-length: copy 3 literal bytes, then repeat `z` 4 times.
        let stream = Stream::new(dict, b"02 61 62 63 fd 7a 80>");

        assert_eq!(stream.decoded().unwrap(), b"abczzzz");
        assert_eq!(
            stream.filters(),
            vec![Filter::AsciiHexDecode, Filter::RunLengthDecode]
        );
    }

    #[test]
    fn anonymous_ids_differ() {
        let a = Stream::new(Dict::empty(), b"");
        let b = Stream::new(Dict::empty(), b"");
        assert_ne!(a.id(), b.id());
    }
}
