//! A decoder for LZW-encoded streams.

use crate::filter::predictor::{self, PredictorParams};
use crate::object::Dict;
use folio_common::bit::BitReader;

const CLEAR_TABLE: usize = 256;
const EOD: usize = 257;
const MAX_ENTRIES: usize = 4096;
const INITIAL_SIZE: usize = 258;

pub(crate) fn decode(data: &[u8], params: Option<&Dict>) -> Option<Vec<u8>> {
    let params = PredictorParams::from_params(params);
    let decoded = decode_impl(data, params.early_change)?;

    predictor::apply(decoded, &params)
}

fn decode_impl(data: &[u8], early_change: bool) -> Option<Vec<u8>> {
    let mut table = Table::new(early_change);

    let mut reader = BitReader::new(data);
    let mut decoded = vec![];
    let mut prev = None;

    loop {
        // A missing EOD marker is tolerated.
        let Some(next) = reader.read(table.code_length()) else {
            return Some(decoded);
        };

        match next as usize {
            CLEAR_TABLE => {
                table.clear();
                prev = None;
            }
            EOD => return Some(decoded),
            new => {
                if let Some(entry) = table.get(new) {
                    decoded.extend_from_slice(entry);
                    let first = entry[0];

                    if let Some(prev) = prev {
                        table.register(prev, first);
                    }
                } else {
                    let prev = prev?;
                    let new_byte = table.get(prev)?[0];

                    decoded.extend_from_slice(table.register(prev, new_byte)?);
                }

                prev = Some(new);
            }
        }
    }
}

struct Table {
    early_change: bool,
    entries: Vec<Vec<u8>>,
}

impl Table {
    fn new(early_change: bool) -> Self {
        let mut entries: Vec<_> = (0..=255).map(|b| vec![b]).collect();

        // Clear table and EOD don't have any data.
        entries.push(vec![0]);
        entries.push(vec![0]);

        Self {
            early_change,
            entries,
        }
    }

    fn register(&mut self, prev: usize, new_byte: u8) -> Option<&[u8]> {
        if self.entries.len() >= MAX_ENTRIES {
            return None;
        }

        let mut new_entry = self.get(prev)?.to_vec();
        new_entry.push(new_byte);
        self.entries.push(new_entry);

        self.entries.last().map(|v| &**v)
    }

    fn get(&self, index: usize) -> Option<&[u8]> {
        self.entries.get(index).map(|v| &**v)
    }

    fn clear(&mut self) {
        self.entries.truncate(INITIAL_SIZE);
    }

    fn code_length(&self) -> u8 {
        let adjusted = self.entries.len() + usize::from(self.early_change);

        if adjusted >= 2048 {
            12
        } else if adjusted >= 1024 {
            11
        } else if adjusted >= 512 {
            10
        } else {
            9
        }
    }
}
