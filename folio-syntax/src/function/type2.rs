use crate::function::{Clamper, Values, read_values};
use crate::object::Dict;
use crate::object::dict::keys::{C0, C1, N};
use smallvec::smallvec;

/// A type 2 function (exponential interpolation).
#[derive(Debug)]
pub struct Type2 {
    c0: Values,
    c1: Values,
    pub(crate) clamper: Clamper,
    n: f32,
}

impl Type2 {
    pub(crate) fn new(dict: &Dict) -> Option<Self> {
        let c0 = read_values(dict, C0).unwrap_or(smallvec![0.0]);
        let c1 = read_values(dict, C1).unwrap_or(smallvec![1.0]);
        let clamper = Clamper::new(dict)?;
        let n = dict.get::<f32>(N)?;

        Some(Self { c0, c1, clamper, n })
    }

    /// The output at `t = 0`.
    pub fn c0(&self) -> &[f32] {
        &self.c0
    }

    /// The output at `t = 1`.
    pub fn c1(&self) -> &[f32] {
        &self.c1
    }

    /// The interpolation exponent.
    pub fn exponent(&self) -> f32 {
        self.n
    }

    pub(crate) fn eval(&self, input: f32) -> Values {
        let mut input = [input];
        self.clamper.clamp_input(&mut input);

        // The input is interpolated over the domain.
        let t = match self.clamper.domain.first() {
            Some(&(d0, d1)) if d1 != d0 => (input[0] - d0) / (d1 - d0),
            Some(_) => 0.0,
            None => input[0],
        }
        .powf(self.n);

        let mut out = self
            .c0
            .iter()
            .zip(self.c1.iter())
            .map(|(c0, c1)| *c0 + t * (*c1 - *c0))
            .collect::<Values>();

        self.clamper.clamp_output(&mut out);

        out
    }
}

#[cfg(test)]
mod tests {
    use crate::function::Function;
    use crate::object::Object;
    use smallvec::smallvec;

    fn function(data: &[u8]) -> Function {
        Function::new(&Object::from_bytes(data).unwrap()).unwrap()
    }

    #[test]
    fn simple() {
        let func = function(
            b"<<
              /FunctionType 2
              /Domain [ 0  1 ]
              /C0 [ 0 20  ]
              /C1 [ 30 -50 ]
              /N 1
            >>",
        );

        assert_eq!(func.eval(smallvec![0.0]).unwrap().as_ref(), &[0.0, 20.0]);
        assert_eq!(func.eval(smallvec![0.5]).unwrap().as_ref(), &[15.0, -15.0]);
        assert_eq!(func.eval(smallvec![1.0]).unwrap().as_ref(), &[30.0, -50.0]);
    }

    #[test]
    fn with_exponent() {
        let func = function(b"<< /FunctionType 2 /Domain [ 0 1 ] /C0 [ 0 ] /C1 [ 30 ] /N 2 >>");

        assert_eq!(func.eval(smallvec![0.5]), Some(smallvec![7.5]));
    }

    #[test]
    fn defaults() {
        let func = function(b"<< /FunctionType 2 /Domain [ 0 1 ] /N 1 >>");

        assert_eq!(func.eval(smallvec![0.25]), Some(smallvec![0.25]));
    }

    #[test]
    fn clamp_domain() {
        let func =
            function(b"<< /FunctionType 2 /Domain [ 0.2 0.8 ] /C0 [ 0 ] /C1 [ 30 ] /N 2 >>");

        assert_eq!(func.eval(smallvec![0.0]), func.eval(smallvec![0.2]));
        assert_eq!(func.eval(smallvec![-10.0]), func.eval(smallvec![0.2]));
        assert_eq!(func.eval(smallvec![1.2]), func.eval(smallvec![0.8]));
    }

    #[test]
    fn clamp_range() {
        let func = function(
            b"<< /FunctionType 2 /Domain [ 0 1 ] /Range [ 10 20 ] /C0 [ 0 ] /C1 [ 30 ] /N 1 >>",
        );

        assert_eq!(func.eval(smallvec![0.0]), Some(smallvec![10.0]));
        assert_eq!(func.eval(smallvec![0.5]), Some(smallvec![15.0]));
        assert_eq!(func.eval(smallvec![1.0]), Some(smallvec![20.0]));
    }

    #[test]
    fn input_is_relative_to_the_domain() {
        let func = function(b"<< /FunctionType 2 /Domain [ 0 2 ] /C0 [ 0 ] /C1 [ 1 ] /N 1 >>");

        assert_eq!(func.eval(smallvec![1.0]), Some(smallvec![0.5]));
        assert_eq!(func.eval(smallvec![2.0]), Some(smallvec![1.0]));

        let func = function(b"<< /FunctionType 2 /Domain [ 1 3 ] /C0 [ 0 ] /C1 [ 8 ] /N 3 >>");
        assert_eq!(func.eval(smallvec![2.0]), Some(smallvec![1.0]));

        let func = function(b"<< /FunctionType 2 /Domain [ 1 1 ] /C0 [ 4 ] /C1 [ 8 ] /N 1 >>");
        assert_eq!(func.eval(smallvec![1.0]), Some(smallvec![4.0]));
    }
}
