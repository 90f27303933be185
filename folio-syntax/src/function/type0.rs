use crate::function::{Clamper, TupleVec, Values, interpolate, read_tuples};
use crate::object::dict::keys::{BITS_PER_SAMPLE, DECODE, ENCODE, SIZE};
use crate::object::{Array, Stream};
use folio_common::bit::{BitReader, bit_mask};
use log::{error, warn};
use rustc_hash::FxHashMap;
use smallvec::{SmallVec, ToSmallVec, smallvec};

type FloatVec = SmallVec<[f32; 4]>;
type IntVec = SmallVec<[u32; 4]>;

/// A type 0 function (sampled function).
#[derive(Debug)]
pub struct Type0 {
    sizes: IntVec,
    table: FxHashMap<Key, IntVec>,
    pub(crate) clamper: Clamper,
    range: TupleVec,
    bits_per_sample: u8,
    encode: TupleVec,
    decode: TupleVec,
}

impl Type0 {
    pub(crate) fn new(stream: &Stream) -> Option<Self> {
        let dict = stream.dict();
        let bits_per_sample = dict.get::<u8>(BITS_PER_SAMPLE)?;

        if !matches!(bits_per_sample, 1 | 2 | 4 | 8 | 12 | 16 | 24 | 32) {
            error!("invalid bits per sample: {bits_per_sample}");

            return None;
        }

        let clamper = Clamper::new(dict)?;
        let range = clamper.range.clone()?;

        let sizes = dict.get::<Array>(SIZE)?.iter::<u32>().collect::<IntVec>();

        if sizes.len() != clamper.domain.len() || sizes.contains(&0) {
            warn!("sampled function has invalid sizes");

            return None;
        }

        let encode = read_tuples(dict, ENCODE)
            .unwrap_or_else(|| sizes.iter().map(|s| (0.0, (*s - 1) as f32)).collect());
        let decode = read_tuples(dict, DECODE).unwrap_or_else(|| range.clone());

        let mut data = {
            let decoded = stream.decoded()?;
            let mut buf = vec![];
            let mut reader = BitReader::new(&decoded);

            while let Some(sample) = reader.read(bits_per_sample) {
                buf.push(sample);
            }

            buf
        };

        let num_expected_entries =
            sizes.iter().fold(1_usize, |acc, s| acc.saturating_mul(*s as usize)) * range.len();

        if data.len() < num_expected_entries {
            warn!("sampled function has too few samples");

            return None;
        }

        data.truncate(num_expected_entries);

        let table = build_table(&data, &sizes, range.len());

        Some(Self {
            sizes,
            table,
            clamper,
            range,
            bits_per_sample,
            encode,
            decode,
        })
    }

    pub(crate) fn eval(&self, mut input: Values) -> Option<Values> {
        if input.len() != self.sizes.len() {
            warn!("wrong number of arguments for sampled function");

            return None;
        }

        self.clamper.clamp_input(&mut input);

        let mut key = input;

        for (((x, domain), encode), size) in key
            .iter_mut()
            .zip(self.clamper.domain.iter())
            .zip(self.encode.iter())
            .zip(self.sizes.iter())
        {
            *x = interpolate(*x, domain.0, domain.1, encode.0, encode.1);
            *x = x.max(0.0).min(*size as f32 - 1.0);
        }

        let in_prev = key.iter().map(|v| v.floor() as u32).collect::<IntVec>();
        let in_next = key.iter().map(|v| v.ceil() as u32).collect::<IntVec>();

        let interpolator = Interpolator {
            input: key.to_smallvec(),
            in_prev,
            in_next,
            sizes: self.sizes.clone(),
            out_len: self.range.len(),
        };

        let interpolated = interpolator.interpolate(&self.table)?;
        let max_sample = bit_mask(self.bits_per_sample) as f32;

        let mut out = interpolated
            .iter()
            .zip(self.decode.iter())
            .map(|(x, decode)| interpolate(*x, 0.0, max_sample, decode.0, decode.1))
            .collect::<Values>();

        self.clamper.clamp_output(&mut out);

        Some(out)
    }
}

// See <https://github.com/apache/pdfbox/blob/bb778d4784f354c36ce032e91a0cee2169a4c598/pdfbox/src/main/java/org/apache/pdfbox/pdmodel/common/function/PDFunctionType0.java#L252>
struct Interpolator {
    input: FloatVec,
    sizes: IntVec,
    in_prev: IntVec,
    in_next: IntVec,
    out_len: usize,
}

impl Interpolator {
    fn interpolate(&self, table: &FxHashMap<Key, IntVec>) -> Option<FloatVec> {
        self.interpolate_inner(smallvec![0; self.input.len()], 0, table)
    }

    fn lookup(&self, table: &FxHashMap<Key, IntVec>, coord: &[u32]) -> Option<FloatVec> {
        Some(
            table
                .get(&Key::from_raw(&self.sizes, coord))?
                .iter()
                .map(|n| *n as f32)
                .collect(),
        )
    }

    fn interpolate_inner(
        &self,
        mut coord: IntVec,
        step: usize,
        table: &FxHashMap<Key, IntVec>,
    ) -> Option<FloatVec> {
        let last = step == self.input.len() - 1;

        coord[step] = self.in_prev[step];
        let val1 = if last {
            self.lookup(table, &coord)?
        } else {
            self.interpolate_inner(coord.clone(), step + 1, table)?
        };

        if self.in_prev[step] == self.in_next[step] {
            return Some(val1);
        }

        coord[step] = self.in_next[step];
        let val2 = if last {
            self.lookup(table, &coord)?
        } else {
            self.interpolate_inner(coord, step + 1, table)?
        };

        Some(
            (0..self.out_len)
                .map(|i| {
                    interpolate(
                        self.input[step],
                        self.in_prev[step] as f32,
                        self.in_next[step] as f32,
                        val1[i],
                        val2[i],
                    )
                })
                .collect(),
        )
    }
}

fn build_table(data: &[u32], sizes: &[u32], n: usize) -> FxHashMap<Key, IntVec> {
    let mut key = Key::new(sizes);
    let mut table = FxHashMap::default();

    for (i, b) in data.chunks_exact(n).enumerate() {
        if i > 0 {
            key.increment();
        }

        table.insert(key.clone(), b.to_smallvec());
    }

    table
}

/// A position in the sample table, with the first dimension varying fastest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Key {
    sizes: IntVec,
    parts: IntVec,
}

impl Key {
    fn new(sizes: &[u32]) -> Self {
        Self {
            sizes: sizes.to_smallvec(),
            parts: smallvec![0; sizes.len()],
        }
    }

    fn from_raw(sizes: &[u32], parts: &[u32]) -> Self {
        Self {
            sizes: sizes.to_smallvec(),
            parts: parts.to_smallvec(),
        }
    }

    fn increment(&mut self) -> Option<()> {
        self.increment_index(0)
    }

    fn increment_index(&mut self, index: usize) -> Option<()> {
        let size = *self.sizes.get(index).or_else(|| {
            error!("overflowed key in sampled function");

            None
        })?;
        let val = self.parts.get_mut(index)?;

        if *val >= (size - 1) {
            *val = 0;
            self.increment_index(index + 1)?;
        } else {
            *val += 1;
        }

        Some(())
    }
}

#[cfg(test)]
mod tests {
    use crate::function::Function;
    use crate::object::{Dict, Object, Stream};
    use smallvec::smallvec;

    fn sampled(dict: &[u8], data: &[u8]) -> Function {
        let stream = Stream::new(Dict::from_bytes(dict).unwrap(), data);
        Function::new(&Object::Stream(stream)).unwrap()
    }

    #[test]
    fn one_dimensional() {
        let func = sampled(
            b"<< /FunctionType 0 /Domain [0 1] /Range [0 1 0 1] /Size [2] /BitsPerSample 8 >>",
            &[0, 255, 255, 0],
        );

        assert_eq!(func.eval(smallvec![0.0]).unwrap().as_slice(), &[0.0, 1.0]);
        assert_eq!(func.eval(smallvec![1.0]).unwrap().as_slice(), &[1.0, 0.0]);
        assert_eq!(func.eval(smallvec![0.5]).unwrap().as_slice(), &[0.5, 0.5]);
    }

    #[test]
    fn two_dimensional() {
        // Samples at (0, 0), (1, 0), (0, 1), (1, 1).
        let func = sampled(
            b"<< /FunctionType 0 /Domain [0 1 0 1] /Range [0 1] /Size [2 2] /BitsPerSample 8 >>",
            &[0, 255, 255, 255],
        );

        assert_eq!(func.eval(smallvec![0.0, 0.0]).unwrap()[0], 0.0);
        assert_eq!(func.eval(smallvec![1.0, 0.0]).unwrap()[0], 1.0);
        assert_eq!(func.eval(smallvec![0.0, 1.0]).unwrap()[0], 1.0);
        assert_eq!(func.eval(smallvec![0.5, 0.0]).unwrap()[0], 0.5);
        assert_eq!(func.eval(smallvec![0.5, 0.5]).unwrap()[0], 0.75);
    }

    #[test]
    fn four_bit_samples_with_decode() {
        let func = sampled(
            b"<< /FunctionType 0 /Domain [0 1] /Range [0 10] /Decode [10 0] /Size [2] /BitsPerSample 4 >>",
            &[0x0f],
        );

        assert_eq!(func.eval(smallvec![0.0]).unwrap()[0], 10.0);
        assert_eq!(func.eval(smallvec![1.0]).unwrap()[0], 0.0);
    }

    #[test]
    fn too_few_samples() {
        let stream = Stream::new(
            Dict::from_bytes(
                b"<< /FunctionType 0 /Domain [0 1] /Range [0 1] /Size [4] /BitsPerSample 8 >>",
            )
            .unwrap(),
            &[0, 1],
        );

        assert!(Function::new(&Object::Stream(stream)).is_none());
    }
}
