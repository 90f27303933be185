//! Serializing paths into content streams.

use kurbo::{Affine, BezPath, PathEl, Point};
use pdf_writer::Content;

/// Write a path, transformed by `transform`, using the shortest operator for each segment.
pub(crate) fn write_path(content: &mut Content, path: &BezPath, transform: Affine) {
    let elements = path.elements();
    let mut current = Point::ZERO;
    // Closing a subpath moves the current point back to its start.
    let mut start = Point::ZERO;
    let mut i = 0;

    while i < elements.len() {
        if let Some((rect, consumed)) = axis_aligned_rect(&elements[i..], transform) {
            let [x, y, w, h] = rect;
            content.rect(x, y, w, h);

            current = transform * first_point(&elements[i]);
            start = current;
            i += consumed;

            continue;
        }

        match elements[i] {
            PathEl::MoveTo(p) => {
                let p = transform * p;
                content.move_to(p.x as f32, p.y as f32);
                current = p;
                start = p;
            }
            PathEl::LineTo(p) => {
                let p = transform * p;
                content.line_to(p.x as f32, p.y as f32);
                current = p;
            }
            PathEl::QuadTo(p1, p2) => {
                let (c1, c2) = elevate(current, transform * p1, transform * p2);
                let end = transform * p2;
                write_cubic(content, current, c1, c2, end);
                current = end;
            }
            PathEl::CurveTo(p1, p2, p3) => {
                let end = transform * p3;
                write_cubic(content, current, transform * p1, transform * p2, end);
                current = end;
            }
            PathEl::ClosePath => {
                content.close_path();
                current = start;
            }
        }

        i += 1;
    }
}

fn write_cubic(content: &mut Content, current: Point, c1: Point, c2: Point, end: Point) {
    if c1 == current {
        content.cubic_to_initial(c2.x as f32, c2.y as f32, end.x as f32, end.y as f32);
    } else if c2 == end {
        content.cubic_to_final(c1.x as f32, c1.y as f32, end.x as f32, end.y as f32);
    } else {
        content.cubic_to(
            c1.x as f32,
            c1.y as f32,
            c2.x as f32,
            c2.y as f32,
            end.x as f32,
            end.y as f32,
        );
    }
}

/// Turn a quadratic curve into the control points of the equivalent cubic curve.
fn elevate(start: Point, control: Point, end: Point) -> (Point, Point) {
    let c1 = start + (control - start) * (2.0 / 3.0);
    let c2 = end + (control - end) * (2.0 / 3.0);

    (c1, c2)
}

fn first_point(el: &PathEl) -> Point {
    match el {
        PathEl::MoveTo(p) | PathEl::LineTo(p) => *p,
        _ => Point::ZERO,
    }
}

/// Check whether the path starts with a closed, axis-aligned rectangle that is traced in
/// the same direction as the `re` operator. Returns `[x, y, width, height]` and the number
/// of elements it spans.
fn axis_aligned_rect(elements: &[PathEl], transform: Affine) -> Option<([f32; 4], usize)> {
    let (points, consumed) = match elements {
        [
            PathEl::MoveTo(p0),
            PathEl::LineTo(p1),
            PathEl::LineTo(p2),
            PathEl::LineTo(p3),
            PathEl::ClosePath,
            ..,
        ] => ([*p0, *p1, *p2, *p3], 5),
        [
            PathEl::MoveTo(p0),
            PathEl::LineTo(p1),
            PathEl::LineTo(p2),
            PathEl::LineTo(p3),
            PathEl::LineTo(p4),
            PathEl::ClosePath,
            ..,
        ] if p4 == p0 => ([*p0, *p1, *p2, *p3], 6),
        _ => return None,
    };

    let [p0, p1, p2, p3] = points.map(|p| transform * p);
    let is_rect = p0.y == p1.y && p1.x == p2.x && p2.y == p3.y && p3.x == p0.x;

    if !is_rect || p0 == p1 || p1 == p2 {
        return None;
    }

    Some((
        [
            p0.x as f32,
            p0.y as f32,
            (p1.x - p0.x) as f32,
            (p2.y - p1.y) as f32,
        ],
        consumed,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Rect, Shape};

    fn serialize(path: &BezPath, transform: Affine) -> String {
        let mut content = Content::new();
        write_path(&mut content, path, transform);

        let out = String::from_utf8(content.finish().to_vec()).unwrap();

        out.trim_end().to_string()
    }

    #[test]
    fn rectangles() {
        let rect = Rect::new(0.0, 0.0, 1.0, 1.0).to_path(0.1);
        assert_eq!(serialize(&rect, Affine::IDENTITY), "0 0 1 1 re");

        let moved = serialize(&rect, Affine::translate((2.0, 3.0)));
        assert_eq!(moved, "2 3 1 1 re");
    }

    #[test]
    fn rotated_rectangle_is_a_polygon() {
        let rect = Rect::new(0.0, 0.0, 1.0, 1.0).to_path(0.1);
        let out = serialize(&rect, Affine::rotate(0.3));

        assert!(!out.contains("re"));
        assert!(out.ends_with('h'));
    }

    #[test]
    fn cubic_operators() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.curve_to((0.0, 0.0), (1.0, 1.0), (2.0, 0.0));
        path.curve_to((3.0, 1.0), (4.0, 0.0), (4.0, 0.0));
        path.curve_to((5.0, 1.0), (6.0, 1.0), (7.0, 0.0));

        let out = serialize(&path, Affine::IDENTITY);
        let ops = out
            .lines()
            .map(|l| l.rsplit(' ').next().unwrap())
            .collect::<Vec<_>>();

        assert_eq!(ops, ["m", "v", "y", "c"]);
        assert!(out.contains("1 1 2 0 v"));
        assert!(out.contains("3 1 4 0 y"));
    }

    #[test]
    fn quadratics_are_elevated() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.quad_to((3.0, 3.0), (6.0, 0.0));

        let out = serialize(&path, Affine::IDENTITY);
        assert!(out.ends_with("2 2 4 2 6 0 c"));
    }

    #[test]
    fn curves_after_close_start_at_the_subpath_start() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        path.line_to((10.0, 10.0));
        path.close_path();
        path.curve_to((10.0, 10.0), (5.0, 5.0), (0.0, 10.0));

        let out = serialize(&path, Affine::IDENTITY);
        assert!(out.ends_with("h\n10 10 5 5 0 10 c"), "{out}");

        let mut path = Rect::new(0.0, 0.0, 1.0, 1.0).to_path(0.1);
        path.curve_to((0.0, 0.0), (2.0, 2.0), (3.0, 0.0));

        let out = serialize(&path, Affine::IDENTITY);
        assert!(out.ends_with("re\n2 2 3 0 v"), "{out}");
    }
}
