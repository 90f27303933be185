use crate::function::{Clamper, Function, TupleVec, Values, interpolate, read_tuples};
use crate::object::dict::keys::{BOUNDS, ENCODE, FUNCTIONS};
use crate::object::{Array, Dict, Object};
use log::warn;
use smallvec::smallvec;

// Padding applied to the outer bounds, so that both ends of the domain are matched.
const BOUNDS_PADDING: f32 = 0.0001;

/// A type 3 function (stitching function).
#[derive(Debug)]
pub struct Type3 {
    functions: Vec<Function>,
    // The bounds, including the domain start and end.
    bounds: Vec<f32>,
    encode: TupleVec,
    pub(crate) clamper: Clamper,
}

impl Type3 {
    pub(crate) fn new(dict: &Dict) -> Option<Self> {
        let clamper = Clamper::new(dict)?;
        let functions = dict
            .get::<Array>(FUNCTIONS)?
            .iter::<Object>()
            .map(|o| Function::new(&o))
            .collect::<Option<Vec<_>>>()?;
        let (d0, d1) = *clamper.domain.first()?;

        let mut bounds = vec![d0];
        bounds.extend(dict.get::<Array>(BOUNDS)?.iter::<f32>());
        bounds.push(d1);

        let encode = read_tuples(dict, ENCODE)?;

        if bounds.len() != functions.len() + 1 || encode.len() != functions.len() {
            warn!(
                "stitching function has {} functions, {} bounds and {} encode pairs",
                functions.len(),
                bounds.len() - 2,
                encode.len()
            );

            return None;
        }

        if bounds.windows(2).any(|w| w[0] > w[1]) {
            warn!("stitching function has decreasing bounds");

            return None;
        }

        Some(Self {
            functions,
            bounds,
            encode,
            clamper,
        })
    }

    /// The sub-functions.
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// The bounds of the sub-functions, including the start and end of the domain.
    ///
    /// Sub-function `i` covers the interval `bounds[i]..bounds[i + 1]`.
    pub fn bounds(&self) -> &[f32] {
        &self.bounds
    }

    /// The `Encode` pairs of the sub-functions.
    pub fn encode(&self) -> &[(f32, f32)] {
        &self.encode
    }

    /// Evaluate sub-function `index` at `x`, which is given in the domain of the
    /// stitching function.
    pub fn eval_sub(&self, index: usize, x: f32) -> Option<Values> {
        let (start, end) = (*self.bounds.get(index)?, *self.bounds.get(index + 1)?);
        let (e0, e1) = *self.encode.get(index)?;
        let encoded = interpolate(x, start, end, e0, e1);

        let mut out = self.functions.get(index)?.eval(smallvec![encoded])?;
        self.clamper.clamp_output(&mut out);

        Some(out)
    }

    pub(crate) fn eval(&self, input: f32) -> Option<Values> {
        let mut input = [input];
        self.clamper.clamp_input(&mut input);
        let x = input[0];

        let index = find_interval(&self.bounds, x)?;

        self.eval_sub(index, x)
    }
}

// Find the interval `x` falls into. Intervals are closed on the left, except for the last,
// which is closed on both sides.
fn find_interval(bounds: &[f32], x: f32) -> Option<usize> {
    let mut padded = bounds.to_vec();
    *padded.first_mut()? -= BOUNDS_PADDING;
    *padded.last_mut()? += BOUNDS_PADDING;

    if x < padded[0] || x >= *padded.last()? {
        return None;
    }

    let idx = padded.partition_point(|val| *val <= x);

    // Skip empty intervals.
    Some(idx.checked_sub(1)?.min(bounds.len() - 2))
}
