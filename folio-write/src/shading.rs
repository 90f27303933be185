//! Turning gradients and meshes into shadings.

use crate::color::ColorTarget;
use crate::resources::{Bits, Shading};
use folio_common::bit::BitWriter;
use folio_interpret::color::AlphaColor;
use folio_interpret::mesh::{coons_interior, shared_edge_flag};
use folio_interpret::{GradientStop, LinearGradient, MeshGradient, RadialGradient};
use kurbo::{Point, Rect};
use smallvec::{SmallVec, smallvec};

pub(crate) const BITS_PER_COORDINATE: u8 = 32;
pub(crate) const BITS_PER_COMPONENT: u8 = 16;
pub(crate) const BITS_PER_FLAG: u8 = 8;

/// Which part of a colour a shading carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Channel {
    /// The colour, converted into the target space.
    Color,
    /// Only the opacity, as a gray value.
    Alpha,
}

/// Sort the stops, remove duplicates and make sure that there is a stop at 0 and at 1.
pub(crate) fn normalize_stops(stops: &[GradientStop]) -> Vec<GradientStop> {
    let mut stops = stops
        .iter()
        .map(|s| GradientStop {
            offset: s.offset.clamp(0.0, 1.0),
            color: s.color,
        })
        .collect::<Vec<_>>();
    stops.sort_by(|a, b| a.offset.total_cmp(&b.offset));
    stops.dedup();

    if let Some(first) = stops.first().copied()
        && first.offset > 0.0
    {
        stops.insert(0, GradientStop { offset: 0.0, ..first });
    }

    if let Some(last) = stops.last().copied()
        && last.offset < 1.0
    {
        stops.push(GradientStop { offset: 1.0, ..last });
    }

    stops
}

/// Whether any stop is not fully opaque.
pub(crate) fn stops_have_alpha(stops: &[GradientStop]) -> bool {
    stops.iter().any(|s| s.color.alpha() < 1.0)
}

/// Whether any corner of any patch is not fully opaque.
pub(crate) fn mesh_has_alpha(mesh: &MeshGradient) -> bool {
    mesh.patches
        .iter()
        .flat_map(|p| p.colors.iter())
        .any(|c| c.alpha() < 1.0)
}

pub(crate) fn linear(
    gradient: &LinearGradient,
    stops: &[GradientStop],
    target: &ColorTarget<'_>,
    channel: Channel,
) -> Shading {
    let LinearGradient { start, end, .. } = gradient;

    Shading::Function {
        axial: true,
        coords: [start.x, start.y, end.x, end.y]
            .into_iter()
            .map(|v| Bits(v as f32))
            .collect(),
        stops: encode_stops(stops, target, channel),
        extend: gradient.extend,
        gray: target.gray || channel == Channel::Alpha,
    }
}

pub(crate) fn radial(
    gradient: &RadialGradient,
    stops: &[GradientStop],
    target: &ColorTarget<'_>,
    channel: Channel,
) -> Shading {
    let RadialGradient {
        start_center: c0,
        start_radius: r0,
        end_center: c1,
        end_radius: r1,
        ..
    } = gradient;

    Shading::Function {
        axial: false,
        coords: smallvec![
            Bits(c0.x as f32),
            Bits(c0.y as f32),
            Bits(*r0),
            Bits(c1.x as f32),
            Bits(c1.y as f32),
            Bits(*r1),
        ],
        stops: encode_stops(stops, target, channel),
        extend: gradient.extend,
        gray: target.gray || channel == Channel::Alpha,
    }
}

fn encode_stops(
    stops: &[GradientStop],
    target: &ColorTarget<'_>,
    channel: Channel,
) -> Vec<(Bits, SmallVec<[Bits; 4]>)> {
    stops
        .iter()
        .map(|stop| {
            let components = match channel {
                Channel::Color => target.convert_rgba(stop.color),
                Channel::Alpha => smallvec![stop.color.alpha()],
            };

            (Bits(stop.offset), components.into_iter().map(Bits).collect())
        })
        .collect()
}

/// Encode a run of patches as a mesh stream. Patches that start with an edge of the
/// previous patch reuse it through their edge flag.
pub(crate) fn mesh(
    mesh: &MeshGradient,
    target: &ColorTarget<'_>,
    channel: Channel,
) -> Option<Shading> {
    let tensor = mesh.patches.iter().any(|p| p.interior.is_some());
    let bounds = mesh_bounds(mesh)?;
    let num_components = match channel {
        Channel::Alpha => 1,
        Channel::Color => target.convert_rgba(AlphaColor::BLACK).len(),
    };

    let [x_min, x_max, y_min, y_max] =
        [bounds.x0, bounds.x1, bounds.y0, bounds.y1].map(|v| v as f32);
    let mut writer = BitWriter::new();
    let write_point = |writer: &mut BitWriter, p: Point| -> Option<()> {
        writer.write_scaled(p.x as f32, BITS_PER_COORDINATE, x_min, x_max)?;
        writer.write_scaled(p.y as f32, BITS_PER_COORDINATE, y_min, y_max)
    };

    for (i, patch) in mesh.patches.iter().enumerate() {
        let flag = match i.checked_sub(1) {
            Some(prev) => shared_edge_flag(&mesh.patches[prev], patch),
            None => 0,
        };
        let (first_point, first_color) = if flag == 0 { (0, 0) } else { (4, 2) };

        writer.write(flag as u32, BITS_PER_FLAG)?;

        for point in &patch.points[first_point..] {
            write_point(&mut writer, *point)?;
        }

        if tensor {
            let interior = patch
                .interior
                .unwrap_or_else(|| coons_interior(&patch.points));

            for point in interior {
                write_point(&mut writer, point)?;
            }
        }

        for color in &patch.colors[first_color..] {
            let components = match channel {
                Channel::Color => target.convert_rgba(*color),
                Channel::Alpha => smallvec![color.alpha()],
            };

            for component in components {
                writer.write_scaled(component, BITS_PER_COMPONENT, 0.0, 1.0)?;
            }
        }

        writer.align();
    }

    let decode = [x_min, x_max, y_min, y_max]
        .into_iter()
        .chain((0..num_components).flat_map(|_| [0.0, 1.0]))
        .map(Bits)
        .collect();

    Some(Shading::Mesh {
        tensor,
        data: writer.finish(),
        decode,
        gray: target.gray || channel == Channel::Alpha,
    })
}

/// The bounding box of all points of a mesh, widened where it is degenerate so that it can
/// serve as a decode range.
fn mesh_bounds(mesh: &MeshGradient) -> Option<Rect> {
    let mut points = mesh
        .patches
        .iter()
        .flat_map(|p| p.points.iter().chain(p.interior.iter().flatten()));
    let first = points.next()?;
    let mut bounds = Rect::from_points(*first, *first);

    for point in points {
        bounds = bounds.union_pt(*point);
    }

    if bounds.width() < 1.0 {
        bounds.x1 = bounds.x0 + 1.0;
    }

    if bounds.height() < 1.0 {
        bounds.y1 = bounds.y0 + 1.0;
    }

    Some(bounds)
}
