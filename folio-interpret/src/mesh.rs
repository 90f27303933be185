//! Decoding and reasoning about the patches and triangles of mesh shadings.

use crate::MeshPatch;
use crate::color::ColorComponents;
use folio_common::bit::BitReader;
use kurbo::Point;
use log::warn;

/// For each edge flag, the boundary points and corner colours of the previous patch that
/// form the first edge of the next patch.
const SHARED_EDGES: [([usize; 4], [usize; 2]); 3] = [
    ([3, 4, 5, 6], [1, 2]),
    ([6, 7, 8, 9], [2, 3]),
    ([9, 10, 11, 0], [3, 0]),
];

/// How the samples of a mesh stream are laid out.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshLayout {
    /// The number of bits of an edge flag.
    pub bits_per_flag: u8,
    /// The number of bits of a coordinate.
    pub bits_per_coordinate: u8,
    /// The number of bits of a colour value.
    pub bits_per_component: u8,
    /// The `Decode` array: the ranges of x and y, followed by one range per colour value.
    pub decode: Vec<f32>,
    /// Whether the patches are tensor-product patches with 16 instead of 12 points.
    pub tensor: bool,
}

impl MeshLayout {
    /// Whether the bit widths are ones a mesh stream may use. Lattice meshes have no edge
    /// flags, so `with_flag` is `false` for them.
    pub fn has_valid_widths(&self, with_flag: bool) -> bool {
        let flag = !with_flag || matches!(self.bits_per_flag, 2 | 4 | 8);
        let coordinate = matches!(self.bits_per_coordinate, 1 | 2 | 4 | 8 | 12 | 16 | 24 | 32);
        let component = matches!(self.bits_per_component, 1 | 2 | 4 | 8 | 12 | 16);

        if !(flag && coordinate && component) {
            warn!(
                "mesh shading has invalid bit widths (flag {}, coordinate {}, component {})",
                self.bits_per_flag, self.bits_per_coordinate, self.bits_per_component
            );

            return false;
        }

        true
    }

    /// The number of bits a single vertex takes up, without the edge flag.
    fn bits_per_vertex(&self) -> usize {
        let num_values = self.decode.len().saturating_sub(4) / 2;

        2 * self.bits_per_coordinate as usize + num_values * self.bits_per_component as usize
    }

    fn coordinate(&self, reader: &mut BitReader<'_>) -> Option<Point> {
        let [x_min, x_max, y_min, y_max] = *self.decode.first_chunk::<4>()?;
        let x = reader.read_scaled(self.bits_per_coordinate, x_min, x_max)?;
        let y = reader.read_scaled(self.bits_per_coordinate, y_min, y_max)?;

        Some(Point::new(x as f64, y as f64))
    }

    fn color(&self, reader: &mut BitReader<'_>) -> Option<ColorComponents> {
        let ranges = self.decode.get(4..)?;

        if ranges.len() < 2 {
            return None;
        }

        ranges
            .chunks_exact(2)
            .map(|r| reader.read_scaled(self.bits_per_component, r[0], r[1]))
            .collect()
    }
}

/// A patch as stored in a mesh stream, with colours that still need to be converted.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchData {
    /// The edge flag, in `0..=3`.
    pub flag: u8,
    /// The boundary points.
    pub points: [Point; 12],
    /// The interior points of a tensor-product patch.
    pub interior: Option<[Point; 4]>,
    /// The colour values of the four corners. With a shading function, each colour has a
    /// single parametric value.
    pub colors: [ColorComponents; 4],
}

/// Decode the patches of a Coons (type 6) or tensor-product (type 7) patch mesh.
///
/// Decoding stops at the end of the data, at a malformed patch, or at a patch that shares
/// an edge without a previous patch.
pub fn decode_patches(data: &[u8], layout: &MeshLayout) -> Vec<PatchData> {
    if !layout.has_valid_widths(true) {
        return vec![];
    }

    let mut reader = BitReader::new(data);
    let mut patches: Vec<PatchData> = vec![];

    while !reader.at_end() {
        let start = reader.byte_pos();
        let Some(flag) = reader.read(layout.bits_per_flag) else {
            break;
        };

        let patch = match flag {
            0 => read_patch(&mut reader, layout, None),
            1..=3 => {
                let Some(prev) = patches.last() else {
                    warn!("mesh patch with edge flag {flag} has no previous patch");

                    break;
                };

                read_patch(&mut reader, layout, Some((flag as u8, prev)))
            }
            _ => {
                warn!("invalid edge flag {flag} in mesh shading");

                None
            }
        };

        let Some(patch) = patch else {
            break;
        };

        patches.push(patch);
        reader.align();

        if reader.byte_pos() == start {
            warn!("mesh patch without any data");

            break;
        }
    }

    patches
}

fn read_patch(
    reader: &mut BitReader<'_>,
    layout: &MeshLayout,
    shared: Option<(u8, &PatchData)>,
) -> Option<PatchData> {
    let mut points = [Point::ZERO; 12];
    let mut colors: [ColorComponents; 4] = Default::default();

    let first_new = match shared {
        Some((flag, prev)) => {
            let (edge, edge_colors) = SHARED_EDGES[flag as usize - 1];

            for (target, source) in edge.into_iter().enumerate() {
                points[target] = prev.points[source];
            }

            colors[0] = prev.colors[edge_colors[0]].clone();
            colors[1] = prev.colors[edge_colors[1]].clone();

            4
        }
        None => 0,
    };

    for point in &mut points[first_new..] {
        *point = layout.coordinate(reader)?;
    }

    let interior = if layout.tensor {
        let mut interior = [Point::ZERO; 4];

        for point in &mut interior {
            *point = layout.coordinate(reader)?;
        }

        Some(interior)
    } else {
        None
    };

    let first_new_color = if shared.is_some() { 2 } else { 0 };

    for color in &mut colors[first_new_color..] {
        *color = layout.color(reader)?;
    }

    Some(PatchData {
        flag: shared.map(|(flag, _)| flag).unwrap_or(0),
        points,
        interior,
        colors,
    })
}

/// Split patches into runs of connected patches. A new run starts at every patch with
/// edge flag 0.
pub fn split_runs(patches: &[PatchData]) -> Vec<&[PatchData]> {
    patches
        .chunk_by(|_, next| next.flag != 0)
        .collect()
}

/// Return the edge flag with which `next` can be written after `prev`, reusing one of its
/// edges. Returns 0 if no edge is shared.
pub fn shared_edge_flag(prev: &MeshPatch, next: &MeshPatch) -> u8 {
    for (flag, (edge, edge_colors)) in (1..).zip(SHARED_EDGES) {
        let points_match = edge
            .iter()
            .enumerate()
            .all(|(i, source)| prev.points[*source] == next.points[i]);
        let colors_match = prev.colors[edge_colors[0]] == next.colors[0]
            && prev.colors[edge_colors[1]] == next.colors[1];

        if points_match && colors_match {
            return flag;
        }
    }

    0
}

/// Compute the interior points that make a tensor-product patch equivalent to the Coons
/// patch with the given boundary.
pub fn coons_interior(points: &[Point; 12]) -> [Point; 4] {
    let p = |i: usize| points[i].to_vec2();
    let [p00, p01, p02, p03, p13, p23, p33, p32, p31, p30, p20, p10] =
        [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11].map(p);

    let p11 = -4.0 * p00 + 6.0 * (p01 + p10) - 2.0 * (p03 + p30) + 3.0 * (p31 + p13) - p33;
    let p12 = -4.0 * p03 + 6.0 * (p02 + p13) - 2.0 * (p00 + p33) + 3.0 * (p32 + p10) - p30;
    let p22 = -4.0 * p33 + 6.0 * (p32 + p23) - 2.0 * (p30 + p03) + 3.0 * (p02 + p20) - p00;
    let p21 = -4.0 * p30 + 6.0 * (p31 + p20) - 2.0 * (p33 + p00) + 3.0 * (p01 + p23) - p03;

    [p11, p12, p22, p21].map(|v| (v / 9.0).to_point())
}

/// A vertex of a triangle mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// The position.
    pub point: Point,
    /// The colour values.
    pub color: ColorComponents,
}

fn read_vertex(reader: &mut BitReader<'_>, layout: &MeshLayout) -> Option<Vertex> {
    let point = layout.coordinate(reader)?;
    let color = layout.color(reader)?;

    Some(Vertex { point, color })
}

/// Decode the triangles of a free-form triangle mesh (type 4).
pub fn decode_free_form_triangles(data: &[u8], layout: &MeshLayout) -> Vec<[Vertex; 3]> {
    if !layout.has_valid_widths(true) {
        return vec![];
    }

    let mut reader = BitReader::new(data);
    let mut triangles: Vec<[Vertex; 3]> = vec![];

    let read = |reader: &mut BitReader<'_>| {
        let flag = reader.read(layout.bits_per_flag)?;
        let vertex = read_vertex(reader, layout)?;
        reader.align();

        Some((flag, vertex))
    };

    while !reader.at_end() {
        let start = reader.byte_pos();
        let Some((flag, vertex)) = read(&mut reader) else {
            break;
        };

        if reader.byte_pos() == start {
            warn!("mesh vertex without any data");

            break;
        }

        let triangle = match (flag, triangles.last()) {
            (0, _) => {
                let (Some((_, b)), Some((_, c))) = (read(&mut reader), read(&mut reader)) else {
                    break;
                };

                [vertex, b, c]
            }
            (1, Some([_, b, c])) => [b.clone(), c.clone(), vertex],
            (2, Some([a, _, c])) => [a.clone(), c.clone(), vertex],
            _ => {
                warn!("invalid vertex flag {flag} in triangle mesh");

                break;
            }
        };

        triangles.push(triangle);
    }

    triangles
}

/// Decode the triangles of a lattice-form triangle mesh (type 5).
pub fn decode_lattice_triangles(
    data: &[u8],
    layout: &MeshLayout,
    vertices_per_row: usize,
) -> Vec<[Vertex; 3]> {
    if vertices_per_row < 2 {
        warn!("lattice mesh needs at least two vertices per row");

        return vec![];
    }

    if !layout.has_valid_widths(false) {
        return vec![];
    }

    // Every vertex starts at a byte boundary, so it takes up at least one byte.
    let max_vertices = data.len().min(data.len() * 8 / layout.bits_per_vertex().max(1));

    if vertices_per_row > max_vertices {
        warn!("lattice mesh has more vertices per row ({vertices_per_row}) than data");

        return vec![];
    }

    let mut reader = BitReader::new(data);
    let mut rows: Vec<Vec<Vertex>> = vec![];

    'rows: while !reader.at_end() {
        let mut row = Vec::with_capacity(vertices_per_row);

        for _ in 0..vertices_per_row {
            let Some(vertex) = read_vertex(&mut reader, layout) else {
                break 'rows;
            };

            reader.align();
            row.push(vertex);
        }

        rows.push(row);
    }

    let mut triangles = vec![];

    for pair in rows.windows(2) {
        let (top, bottom) = (&pair[0], &pair[1]);

        for j in 0..vertices_per_row - 1 {
            triangles.push([top[j].clone(), bottom[j].clone(), top[j + 1].clone()]);
            triangles.push([
                bottom[j + 1].clone(),
                bottom[j].clone(),
                top[j + 1].clone(),
            ]);
        }
    }

    triangles
}

/// Turn a triangle into a degenerate Coons patch whose last edge collapses into the third
/// vertex.
pub fn triangle_patch([a, b, c]: &[Vertex; 3]) -> PatchData {
    let lerp = |p: Point, q: Point, t: f64| p.lerp(q, t);
    let (a_p, b_p, c_p) = (a.point, b.point, c.point);

    PatchData {
        flag: 0,
        points: [
            a_p,
            lerp(a_p, b_p, 1.0 / 3.0),
            lerp(a_p, b_p, 2.0 / 3.0),
            b_p,
            lerp(b_p, c_p, 1.0 / 3.0),
            lerp(b_p, c_p, 2.0 / 3.0),
            c_p,
            c_p,
            c_p,
            c_p,
            lerp(c_p, a_p, 1.0 / 3.0),
            lerp(c_p, a_p, 2.0 / 3.0),
        ],
        interior: None,
        colors: [
            a.color.clone(),
            b.color.clone(),
            c.color.clone(),
            c.color.clone(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::AlphaColor;
    use folio_common::bit::BitWriter;
    use smallvec::smallvec;

    fn gray(v: f32) -> ColorComponents {
        smallvec![v]
    }

    fn layout(tensor: bool) -> MeshLayout {
        MeshLayout {
            bits_per_flag: 8,
            bits_per_coordinate: 8,
            bits_per_component: 8,
            decode: vec![0.0, 255.0, 0.0, 255.0, 0.0, 1.0],
            tensor,
        }
    }

    fn write_patch(writer: &mut BitWriter, flag: u8, start: u32) {
        writer.write(flag as u32, 8).unwrap();

        let (num_points, num_colors) = if flag == 0 { (12, 4) } else { (8, 2) };

        for i in 0..num_points {
            writer.write(start + i, 8).unwrap();
            writer.write(start + i, 8).unwrap();
        }

        for _ in 0..num_colors {
            writer.write(255, 8).unwrap();
        }

        writer.align();
    }

    #[test]
    fn shared_edges() {
        let mut writer = BitWriter::new();
        write_patch(&mut writer, 0, 0);
        write_patch(&mut writer, 1, 100);
        write_patch(&mut writer, 3, 150);
        let data = writer.finish();

        let patches = decode_patches(&data, &layout(false));
        assert_eq!(patches.len(), 3);

        let (first, second, third) = (&patches[0], &patches[1], &patches[2]);
        assert_eq!(second.flag, 1);
        assert_eq!(&second.points[..4], &first.points[3..7]);
        assert_eq!(second.points[4], Point::new(100.0, 100.0));
        assert_eq!(second.colors[0], gray(1.0));

        assert_eq!(third.points[0], second.points[9]);
        assert_eq!(third.points[3], second.points[0]);
        assert_eq!(third.colors[1], second.colors[0]);
    }

    #[test]
    fn orphaned_edge_flag_stops_decoding() {
        let mut writer = BitWriter::new();
        write_patch(&mut writer, 2, 0);
        let data = writer.finish();

        assert!(decode_patches(&data, &layout(false)).is_empty());
    }

    #[test]
    fn runs_start_at_flag_zero() {
        let mut writer = BitWriter::new();
        for flag in [0, 1, 0, 2, 2] {
            write_patch(&mut writer, flag, 10);
        }
        let data = writer.finish();

        let patches = decode_patches(&data, &layout(false));
        let runs = split_runs(&patches);
        assert_eq!(runs.iter().map(|r| r.len()).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn detects_shared_edges() {
        let square = |offset: f64| {
            let mut points = [Point::ZERO; 12];
            for (i, p) in points.iter_mut().enumerate() {
                *p = Point::new(offset + i as f64, 0.0);
            }
            points
        };

        let prev = MeshPatch {
            points: square(0.0),
            interior: None,
            colors: [AlphaColor::BLACK; 4],
        };
        let mut next = MeshPatch {
            points: square(50.0),
            interior: None,
            colors: [AlphaColor::BLACK; 4],
        };
        assert_eq!(shared_edge_flag(&prev, &next), 0);

        next.points[..4].copy_from_slice(&prev.points[6..10]);
        assert_eq!(shared_edge_flag(&prev, &next), 2);

        next.colors[0] = AlphaColor::WHITE;
        assert_eq!(shared_edge_flag(&prev, &next), 0);
    }

    #[test]
    fn flat_coons_interior() {
        // A straight-edged square, whose interior points lie on the thirds.
        let points = [
            (0., 0.),
            (0., 1.),
            (0., 2.),
            (0., 3.),
            (1., 3.),
            (2., 3.),
            (3., 3.),
            (3., 2.),
            (3., 1.),
            (3., 0.),
            (2., 0.),
            (1., 0.),
        ]
        .map(|(x, y)| Point::new(x, y));

        let interior = coons_interior(&points);
        let expected = [(1., 1.), (1., 2.), (2., 2.), (2., 1.)].map(|(x, y)| Point::new(x, y));

        for (a, b) in interior.iter().zip(expected) {
            assert!((a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9, "{a:?}");
        }
    }

    #[test]
    fn free_form_triangles() {
        let mut writer = BitWriter::new();
        for (flag, x) in [(0, 0), (0, 10), (0, 20), (1, 30), (2, 40)] {
            writer.write(flag, 8).unwrap();
            writer.write(x, 8).unwrap();
            writer.write(x, 8).unwrap();
            writer.write(128, 8).unwrap();
        }
        let data = writer.finish();

        let triangles = decode_free_form_triangles(&data, &layout(false));
        assert_eq!(triangles.len(), 3);
        assert_eq!(triangles[1][0].point, Point::new(10.0, 10.0));
        assert_eq!(triangles[2][0].point, Point::new(10.0, 10.0));
        assert_eq!(triangles[2][2].point, Point::new(40.0, 40.0));

        let patch = triangle_patch(&triangles[0]);
        assert_eq!(patch.points[0], Point::new(0.0, 0.0));
        assert_eq!(patch.points[3], Point::new(10.0, 10.0));
        assert_eq!(patch.points[6], Point::new(20.0, 20.0));
        assert_eq!(patch.colors[2], patch.colors[3]);
    }

    #[test]
    fn lattice_triangles() {
        let mut writer = BitWriter::new();
        for (x, y) in [(0, 0), (10, 0), (20, 0), (0, 10), (10, 10), (20, 10)] {
            writer.write(x, 8).unwrap();
            writer.write(y, 8).unwrap();
            writer.write(0, 8).unwrap();
        }
        let data = writer.finish();

        let triangles = decode_lattice_triangles(&data, &layout(false), 3);
        assert_eq!(triangles.len(), 4);
        assert!(decode_lattice_triangles(&data, &layout(false), 1).is_empty());
    }

    #[test]
    fn zero_bit_widths_are_rejected() {
        let empty = MeshLayout {
            bits_per_flag: 0,
            bits_per_coordinate: 0,
            bits_per_component: 0,
            ..layout(false)
        };
        let data = [0_u8; 4];

        assert!(decode_patches(&data, &empty).is_empty());
        assert!(decode_free_form_triangles(&data, &empty).is_empty());
        assert!(decode_lattice_triangles(&data, &empty, 2).is_empty());

        let odd = MeshLayout {
            bits_per_coordinate: 7,
            ..layout(false)
        };
        assert!(!odd.has_valid_widths(true));
        assert!(layout(true).has_valid_widths(true));
        assert!(
            MeshLayout {
                bits_per_flag: 0,
                ..layout(false)
            }
            .has_valid_widths(false)
        );
    }

    #[test]
    fn huge_rows_are_rejected() {
        let data = [0_u8; 6];

        assert!(decode_lattice_triangles(&data, &layout(false), 1 << 50).is_empty());
        assert!(decode_lattice_triangles(&data, &layout(false), usize::MAX).is_empty());
        // Three vertices of three bytes each don't fit into six bytes.
        assert!(decode_lattice_triangles(&data, &layout(false), 3).is_empty());
        assert!(decode_lattice_triangles(&data, &layout(false), 2).is_empty());
    }
}
