//! Rectangles.

use crate::object::{Array, FromObject, Object};

/// A normalized rectangle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rect {
    /// The minimum x coordinate.
    pub x0: f64,
    /// The minimum y coordinate.
    pub y0: f64,
    /// The maximum x coordinate.
    pub x1: f64,
    /// The maximum y coordinate.
    pub y1: f64,
}

impl Rect {
    /// The empty rectangle at the origin.
    pub const ZERO: Self = Self::new(0., 0., 0., 0.);

    /// A new rectangle from minimum and maximum coordinates.
    #[inline(always)]
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// The intersection of two rectangles.
    #[inline]
    pub fn intersect(&self, other: Self) -> Self {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        let x1 = self.x1.min(other.x1);
        let y1 = self.y1.min(other.y1);
        Self::new(x0, y0, x1.max(x0), y1.max(y0))
    }

    /// The width of the rectangle.
    #[inline]
    pub const fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    /// The height of the rectangle.
    #[inline]
    pub const fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

fn from_arr(array: &Array) -> Option<Rect> {
    let mut iter = array.iter::<f64>();
    let x0 = iter.next()?;
    let y0 = iter.next()?;
    let x1 = iter.next()?;
    let y1 = iter.next()?;

    Some(Rect::new(x0.min(x1), y0.min(y1), x1.max(x0), y1.max(y0)))
}

impl FromObject for Rect {
    fn from_object(object: Object) -> Option<Self> {
        match object {
            Object::Array(arr) => from_arr(&arr),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Rect;
    use crate::object::Object;

    #[test]
    fn normalizes_corners() {
        let rect = Object::from_bytes(b"[612 792 0 0]")
            .and_then(|o| o.cast::<Rect>())
            .unwrap();
        assert_eq!(rect, Rect::new(0.0, 0.0, 612.0, 792.0));
        assert_eq!(rect.width(), 612.0);
    }
}
