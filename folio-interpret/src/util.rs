use log::warn;

pub(crate) trait OptionLog {
    fn warn_none(self, f: &str) -> Self;
}

impl<T> OptionLog for Option<T> {
    #[inline]
    fn warn_none(self, f: &str) -> Self {
        self.or_else(|| {
            warn!("{f}");

            None
        })
    }
}

const SCALAR_NEARLY_ZERO: f64 = 1.0 / (1 << 12) as f64;

pub(crate) trait FloatExt: Copy {
    /// Whether the number is approximately 0.
    fn is_nearly_zero(self) -> bool;
}

impl FloatExt for f64 {
    fn is_nearly_zero(self) -> bool {
        self.abs() <= SCALAR_NEARLY_ZERO
    }
}

impl FloatExt for f32 {
    fn is_nearly_zero(self) -> bool {
        (self as f64).is_nearly_zero()
    }
}

/// Return the inverse of a transform, unless it is (nearly) singular.
pub(crate) fn invert(transform: kurbo::Affine) -> Option<kurbo::Affine> {
    if transform.determinant().is_nearly_zero() {
        warn!("transform is not invertible");

        return None;
    }

    Some(transform.inverse())
}
