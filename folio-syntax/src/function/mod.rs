//! Evaluating PDF functions.
//!
//! Functions map `m` input values to `n` output values and are used by shadings,
//! separation/DeviceN colour spaces and soft-mask transfer functions. All four function
//! types are supported:
//!
//! - type 0: sampled functions with multi-linear interpolation
//! - type 2: exponential interpolation
//! - type 3: stitching of other functions
//! - type 4: PostScript calculator programs

mod type0;
mod type2;
mod type3;
mod type4;

use crate::object::dict::keys::{DOMAIN, FUNCTION_TYPE, RANGE};
use crate::object::{Array, Dict, Object};
use log::warn;
use smallvec::SmallVec;
use std::sync::Arc;

pub use type0::Type0;
pub use type2::Type2;
pub use type3::Type3;
pub use type4::Type4;

/// The input or output values of a function.
pub type Values = SmallVec<[f32; 6]>;
/// A list of `(min, max)` pairs, as used by `Domain`, `Range`, `Encode` and `Decode`.
pub type TupleVec = SmallVec<[(f32, f32); 4]>;

/// A PDF function.
#[derive(Debug, Clone)]
pub struct Function(Arc<FunctionType>);

/// The different kinds of functions.
#[derive(Debug)]
pub enum FunctionType {
    /// A sampled function (type 0).
    Sampled(Type0),
    /// An exponential function (type 2).
    Exponential(Type2),
    /// A stitching function (type 3).
    Stitching(Type3),
    /// A PostScript calculator function (type 4).
    PostScript(Type4),
}

impl Function {
    /// Create a new function from a dictionary or stream object.
    pub fn new(obj: &Object) -> Option<Self> {
        let (dict, stream) = match obj {
            Object::Dict(d) => (d.clone(), None),
            Object::Stream(s) => (s.dict().clone(), Some(s)),
            _ => return None,
        };

        let function_type = match dict.get::<u8>(FUNCTION_TYPE)? {
            0 => FunctionType::Sampled(Type0::new(stream?)?),
            2 => FunctionType::Exponential(Type2::new(&dict)?),
            3 => FunctionType::Stitching(Type3::new(&dict)?),
            4 => FunctionType::PostScript(Type4::new(stream?)?),
            t => {
                warn!("unknown function type {t}");

                return None;
            }
        };

        Some(Self(Arc::new(function_type)))
    }

    /// Evaluate the function with the given input.
    pub fn eval(&self, input: Values) -> Option<Values> {
        match self.0.as_ref() {
            FunctionType::Sampled(t0) => t0.eval(input),
            FunctionType::Exponential(t2) => Some(t2.eval(*input.first()?)),
            FunctionType::Stitching(t3) => t3.eval(*input.first()?),
            FunctionType::PostScript(t4) => t4.eval(input),
        }
    }

    /// Return the kind of the function.
    pub fn kind(&self) -> &FunctionType {
        &self.0
    }

    /// Return the domain of the function.
    pub fn domain(&self) -> &[(f32, f32)] {
        &self.clamper().domain
    }

    /// Return the number of output values, if it can be determined without evaluating
    /// the function.
    pub fn output_dimension(&self) -> Option<usize> {
        if let Some(range) = &self.clamper().range {
            return Some(range.len());
        }

        match self.0.as_ref() {
            FunctionType::Exponential(t2) => Some(t2.c0().len()),
            FunctionType::Stitching(t3) => t3.functions().first()?.output_dimension(),
            // Range is required for the other types.
            _ => None,
        }
    }

    fn clamper(&self) -> &Clamper {
        match self.0.as_ref() {
            FunctionType::Sampled(t0) => &t0.clamper,
            FunctionType::Exponential(t2) => &t2.clamper,
            FunctionType::Stitching(t3) => &t3.clamper,
            FunctionType::PostScript(t4) => &t4.clamper,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Clamper {
    pub(crate) domain: TupleVec,
    pub(crate) range: Option<TupleVec>,
}

impl Clamper {
    pub(crate) fn new(dict: &Dict) -> Option<Self> {
        let domain = read_tuples(dict, DOMAIN).or_else(|| {
            warn!("function is missing a valid domain");

            None
        })?;
        let range = read_tuples(dict, RANGE);

        Some(Self { domain, range })
    }

    pub(crate) fn clamp_input(&self, input: &mut [f32]) {
        for (val, (min, max)) in input.iter_mut().zip(self.domain.iter()) {
            *val = clamp(*val, *min, *max);
        }
    }

    pub(crate) fn clamp_output(&self, output: &mut [f32]) {
        if let Some(range) = &self.range {
            for (val, (min, max)) in output.iter_mut().zip(range.iter()) {
                *val = clamp(*val, *min, *max);
            }
        }
    }
}

// Unlike `f32::clamp`, this doesn't panic for inverted intervals.
fn clamp(val: f32, min: f32, max: f32) -> f32 {
    val.max(min).min(max)
}

pub(crate) fn read_values(dict: &Dict, key: &[u8]) -> Option<Values> {
    Some(dict.get::<Array>(key)?.iter::<f32>().collect())
}

pub(crate) fn read_tuples(dict: &Dict, key: &[u8]) -> Option<TupleVec> {
    let values = dict.get::<Array>(key)?.iter::<f32>().collect::<Vec<_>>();

    if values.is_empty() || values.len() % 2 != 0 {
        return None;
    }

    Some(values.chunks_exact(2).map(|c| (c[0], c[1])).collect())
}

/// Linearly map `x` from `[x_min, x_max]` to `[y_min, y_max]`.
pub fn interpolate(x: f32, x_min: f32, x_max: f32, y_min: f32, y_max: f32) -> f32 {
    if x_max == x_min {
        return y_min;
    }

    y_min + (x - x_min) * (y_max - y_min) / (x_max - x_min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_dimension() {
        let func = Function::new(
            &Object::from_bytes(b"<< /FunctionType 2 /Domain [0 1] /C0 [0 0 0] /C1 [1 1 1] /N 1 >>")
                .unwrap(),
        )
        .unwrap();

        assert_eq!(func.output_dimension(), Some(3));
        assert_eq!(func.domain(), &[(0.0, 1.0)]);
        assert!(matches!(func.kind(), FunctionType::Exponential(_)));
    }

    #[test]
    fn missing_domain() {
        assert!(
            Function::new(&Object::from_bytes(b"<< /FunctionType 2 /N 1 >>").unwrap()).is_none()
        );
    }

    #[test]
    fn type_0_requires_stream() {
        let obj = Object::from_bytes(b"<< /FunctionType 0 /Domain [0 1] /Range [0 1] >>").unwrap();
        assert!(Function::new(&obj).is_none());
    }

    #[test]
    fn interpolation() {
        assert_eq!(interpolate(0.5, 0.0, 1.0, 10.0, 20.0), 15.0);
        assert_eq!(interpolate(3.0, 2.0, 2.0, 7.0, 9.0), 7.0);
    }
}
