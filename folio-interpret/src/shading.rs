//! Shadings and the conversion of their functions into gradient stops.

use crate::cache::{Cache, CacheKey};
use crate::color::{AlphaColor, ColorComponents, ColorSpace};
use crate::mesh::{
    MeshLayout, PatchData, decode_free_form_triangles, decode_lattice_triangles, decode_patches,
    split_runs, triangle_patch,
};
use crate::util::FloatExt;
use crate::device::Device;
use crate::{
    FillRule, GradientStop, InterpreterWarning, LinearGradient, MeshGradient, MeshPatch,
    RadialGradient,
};
use folio_syntax::function::{Function, FunctionType, Values};
use folio_syntax::object::keys::*;
use folio_syntax::object::{Array, Dict, Object, Rect, Stream};
use kurbo::{Point, Shape};
use log::warn;
use smallvec::{SmallVec, smallvec};
use std::sync::Arc;

// The number of segments that non-linear parts of a function are split into.
const SAMPLES: usize = 16;

/// The function of a shading: either a single function with one output per colour
/// component, or one single-output function per component.
#[derive(Debug, Clone)]
pub enum ShadingFunction {
    /// A single function.
    Single(Function),
    /// One function per colour component.
    Multiple(SmallVec<[Function; 4]>),
}

impl ShadingFunction {
    fn new(object: &Object) -> Option<Self> {
        match object {
            Object::Array(array) => array
                .iter::<Object>()
                .map(|o| Function::new(&o))
                .collect::<Option<_>>()
                .map(Self::Multiple),
            _ => Function::new(object).map(Self::Single),
        }
    }

    /// Evaluate the function at `t`.
    pub fn eval(&self, t: f32) -> Option<Values> {
        match self {
            Self::Single(function) => function.eval(smallvec![t]),
            Self::Multiple(functions) => functions
                .iter()
                .map(|f| f.eval(smallvec![t]).and_then(|v| v.first().copied()))
                .collect(),
        }
    }

    /// The number of colour components the function produces, if known.
    pub fn output_dimension(&self) -> Option<usize> {
        match self {
            Self::Single(function) => function.output_dimension(),
            Self::Multiple(functions) => Some(functions.len()),
        }
    }
}

/// The geometry of a shading.
#[derive(Debug)]
pub enum ShadingKind {
    /// An axial shading (type 2).
    Axial {
        /// The start and end point, as `[x0, y0, x1, y1]`.
        coords: [f32; 4],
        /// The parametric domain.
        domain: [f32; 2],
        /// The colour function.
        function: ShadingFunction,
        /// Whether the shading extends beyond the start and the end.
        extend: [bool; 2],
    },
    /// A radial shading (type 3).
    Radial {
        /// The two circles, as `[x0, y0, r0, x1, y1, r1]`.
        coords: [f32; 6],
        /// The parametric domain.
        domain: [f32; 2],
        /// The colour function.
        function: ShadingFunction,
        /// Whether the shading extends beyond the start and the end.
        extend: [bool; 2],
    },
    /// A mesh shading (types 4 to 7), as runs of patches with converted colours. Triangles
    /// are represented as degenerate patches.
    Mesh {
        /// The original shading type.
        shading_type: u8,
        /// The runs of connected patches.
        runs: Arc<Vec<MeshGradient>>,
    },
}

/// A shading.
#[derive(Debug, Clone)]
pub struct Shading {
    /// The geometry and colours.
    pub kind: Arc<ShadingKind>,
    /// The colour space.
    pub color_space: ColorSpace,
    /// The background colour, only used by shading patterns.
    pub background: Option<ColorComponents>,
    /// The bounding box, in shading space.
    pub bbox: Option<kurbo::Rect>,
}

impl Shading {
    /// Parse a shading from a dictionary or a stream.
    pub fn new(object: &Object) -> Result<Self, InterpreterWarning> {
        Self::new_cached(object, &Cache::new())
    }

    pub(crate) fn new_cached(object: &Object, cache: &Cache) -> Result<Self, InterpreterWarning> {
        let (dict, stream) = match object {
            Object::Dict(dict) => (dict.clone(), None),
            Object::Stream(stream) => (stream.dict().clone(), Some(stream)),
            _ => {
                warn!("shading is neither a dictionary nor a stream");

                return Err(InterpreterWarning::UnsupportedShading);
            }
        };

        let unsupported = |msg: &str| {
            warn!("{msg}");

            InterpreterWarning::UnsupportedShading
        };

        let shading_type = dict
            .get::<u8>(SHADING_TYPE)
            .ok_or_else(|| unsupported("shading has no type"))?;
        let color_space = dict
            .get::<Object>(COLORSPACE)
            .and_then(|o| ColorSpace::new_cached(&o, cache))
            .ok_or_else(|| unsupported("shading has an invalid colour space"))?;

        if color_space.is_pattern() {
            return Err(unsupported("shading uses the pattern colour space"));
        }

        let function = dict.get::<Object>(FUNCTION).map(|o| {
            ShadingFunction::new(&o).ok_or(InterpreterWarning::UnsupportedFunction)
        });
        let function = function.transpose()?;

        if let Some(function) = &function
            && let Some(dimension) = function.output_dimension()
            && dimension != color_space.num_components()
        {
            warn!(
                "shading function has {dimension} outputs, but the colour space has {} components",
                color_space.num_components()
            );

            return Err(InterpreterWarning::UnsupportedFunction);
        }

        let kind = match shading_type {
            1 => return Err(unsupported("function-based shadings are not supported")),
            2 | 3 => {
                let function =
                    function.ok_or_else(|| unsupported("axial or radial shading has no function"))?;
                let domain = dict.get::<[f32; 2]>(DOMAIN).unwrap_or([0.0, 1.0]);
                let extend = dict.get::<[bool; 2]>(EXTEND).unwrap_or([false, false]);

                if shading_type == 2 {
                    ShadingKind::Axial {
                        coords: dict
                            .get::<[f32; 4]>(COORDS)
                            .ok_or_else(|| unsupported("axial shading has invalid coordinates"))?,
                        domain,
                        function,
                        extend,
                    }
                } else {
                    ShadingKind::Radial {
                        coords: dict
                            .get::<[f32; 6]>(COORDS)
                            .ok_or_else(|| unsupported("radial shading has invalid coordinates"))?,
                        domain,
                        function,
                        extend,
                    }
                }
            }
            4..=7 => {
                let stream = stream.ok_or_else(|| unsupported("mesh shading is not a stream"))?;
                let converter = ColorConverter {
                    color_space: color_space.clone(),
                    function,
                };

                let runs = cache
                    .get_or_insert_with(CacheKey::Stream(stream.id()), || {
                        Some(Arc::new(decode_mesh(stream, shading_type, &converter)?))
                    })
                    .ok_or_else(|| unsupported("failed to decode mesh shading"))?;

                ShadingKind::Mesh { shading_type, runs }
            }
            t => return Err(unsupported(&format!("unknown shading type {t}"))),
        };

        let background = dict
            .get::<Array>(BACKGROUND)
            .map(|a| a.iter::<f32>().collect::<ColorComponents>())
            .filter(|b| b.len() == color_space.num_components());
        let bbox = dict
            .get::<Rect>(BBOX)
            .map(|r| kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1));

        Ok(Self {
            kind: Arc::new(kind),
            color_space,
            background,
            bbox,
        })
    }

    /// The background colour as sRGB.
    pub fn background_color(&self) -> Option<AlphaColor> {
        self.background
            .as_ref()
            .map(|b| self.color_space.to_rgba(b, 1.0))
    }
}

/// Draw a shading onto the current clip area of the device, in shading space.
pub(crate) fn draw_shading(shading: &Shading, device: &mut dyn Device) {
    let clipped = if let Some(bbox) = shading.bbox {
        device.save_state();
        device.begin_layer();
        device.clip(&bbox.to_path(0.1), FillRule::NonZero);

        true
    } else {
        false
    };

    match shading.kind.as_ref() {
        ShadingKind::Axial {
            coords,
            domain,
            function,
            extend,
        } => {
            let [x0, y0, x1, y1] = *coords;

            device.draw_linear_gradient(&LinearGradient {
                start: Point::new(x0 as f64, y0 as f64),
                end: Point::new(x1 as f64, y1 as f64),
                stops: gradient_stops(function, *domain, &shading.color_space),
                extend: *extend,
            });
        }
        ShadingKind::Radial {
            coords,
            domain,
            function,
            extend,
        } => {
            let [x0, y0, r0, x1, y1, r1] = *coords;

            device.draw_radial_gradient(&RadialGradient {
                start_center: Point::new(x0 as f64, y0 as f64),
                start_radius: r0,
                end_center: Point::new(x1 as f64, y1 as f64),
                end_radius: r1,
                stops: gradient_stops(function, *domain, &shading.color_space),
                extend: *extend,
            });
        }
        ShadingKind::Mesh { runs, .. } => {
            for run in runs.iter().filter(|r| !r.patches.is_empty()) {
                device.draw_mesh_gradient(run);
            }
        }
    }

    if clipped {
        device.end_layer();
        device.restore_state();
    }
}

struct ColorConverter {
    color_space: ColorSpace,
    function: Option<ShadingFunction>,
}

impl ColorConverter {
    fn convert(&self, values: &[f32]) -> AlphaColor {
        match &self.function {
            Some(function) => {
                let t = values.first().copied().unwrap_or(0.0);
                let evaluated = function
                    .eval(t)
                    .unwrap_or_else(|| self.color_space.initial_color().into_iter().collect());

                self.color_space.to_rgba(&evaluated, 1.0)
            }
            None => self.color_space.to_rgba(values, 1.0),
        }
    }

    fn patch(&self, patch: &PatchData) -> MeshPatch {
        MeshPatch {
            points: patch.points,
            interior: patch.interior,
            colors: [0, 1, 2, 3].map(|i| self.convert(&patch.colors[i])),
        }
    }
}

fn decode_mesh(
    stream: &Stream,
    shading_type: u8,
    converter: &ColorConverter,
) -> Option<Vec<MeshGradient>> {
    let dict = stream.dict();
    let data = stream.decoded()?;
    let layout = mesh_layout(dict, shading_type)?;

    let runs = match shading_type {
        4 | 5 => {
            let triangles = if shading_type == 4 {
                decode_free_form_triangles(&data, &layout)
            } else {
                decode_lattice_triangles(&data, &layout, dict.get::<usize>(VERTICES_PER_ROW)?)
            };

            let patches = triangles
                .iter()
                .map(|t| converter.patch(&triangle_patch(t)))
                .collect::<Vec<_>>();

            vec![MeshGradient { patches }]
        }
        _ => {
            let patches = decode_patches(&data, &layout);

            split_runs(&patches)
                .into_iter()
                .map(|run| MeshGradient {
                    patches: run.iter().map(|p| converter.patch(p)).collect(),
                })
                .collect()
        }
    };

    Some(runs)
}

fn mesh_layout(dict: &Dict, shading_type: u8) -> Option<MeshLayout> {
    let layout = MeshLayout {
        // Lattice meshes have no flags.
        bits_per_flag: if shading_type == 5 {
            0
        } else {
            dict.get::<u8>(BITS_PER_FLAG)?
        },
        bits_per_coordinate: dict.get::<u8>(BITS_PER_COORDINATE)?,
        bits_per_component: dict.get::<u8>(BITS_PER_COMPONENT)?,
        decode: dict.get::<Array>(DECODE)?.iter::<f32>().collect(),
        tensor: shading_type == 7,
    };

    layout
        .has_valid_widths(shading_type != 5)
        .then_some(layout)
}

/// Convert the function of an axial or radial shading into gradient stops.
///
/// Offsets are relative to `domain`. Linear pieces of the function contribute their end
/// points, other pieces are sampled. At the bounds of a stitching function, the values of
/// both neighbouring functions are kept, so that jumps in colour are preserved. The
/// returned stops are sorted and always start at offset 0 and end at offset 1.
pub fn gradient_stops(
    function: &ShadingFunction,
    domain: [f32; 2],
    color_space: &ColorSpace,
) -> Vec<GradientStop> {
    let [d0, d1] = domain;
    let mut samples = vec![];

    match function {
        ShadingFunction::Single(f) => sample_function(f, d0, d1, &mut samples),
        ShadingFunction::Multiple(_) => {
            sample_uniform(|t| function.eval(t), d0, d1, SAMPLES, &mut samples);
        }
    }

    let span = d1 - d0;
    let mut stops = samples
        .into_iter()
        .map(|(t, values)| GradientStop {
            offset: if span.is_nearly_zero() {
                0.0
            } else {
                ((t - d0) / span).clamp(0.0, 1.0)
            },
            color: color_space.to_rgba(&values, 1.0),
        })
        .collect::<Vec<_>>();

    // Stable, so that the two sides of a jump keep their order.
    stops.sort_by(|a, b| a.offset.total_cmp(&b.offset));
    stops.dedup();

    let (Some(first), Some(last)) = (stops.first().copied(), stops.last().copied()) else {
        warn!("failed to evaluate the function of a shading");

        return vec![
            GradientStop {
                offset: 0.0,
                color: AlphaColor::BLACK,
            },
            GradientStop {
                offset: 1.0,
                color: AlphaColor::BLACK,
            },
        ];
    };

    if first.offset > 0.0 {
        stops.insert(0, GradientStop { offset: 0.0, ..first });
    }

    if last.offset < 1.0 {
        stops.push(GradientStop { offset: 1.0, ..last });
    }

    stops
}

fn is_linear(function: &Function) -> bool {
    matches!(function.kind(), FunctionType::Exponential(t2) if t2.exponent() == 1.0)
}

fn sample_function(function: &Function, t0: f32, t1: f32, out: &mut Vec<(f32, Values)>) {
    match function.kind() {
        FunctionType::Stitching(t3) => {
            let bounds = t3.bounds();

            for (i, sub) in t3.functions().iter().enumerate() {
                let lo = bounds[i].max(t0);
                let hi = bounds[i + 1].min(t1);

                if lo > hi {
                    continue;
                }

                let steps = if is_linear(sub) { 1 } else { SAMPLES };
                sample_uniform(|t| t3.eval_sub(i, t), lo, hi, steps, out);
            }
        }
        _ => {
            let steps = if is_linear(function) { 1 } else { SAMPLES };
            sample_uniform(|t| function.eval(smallvec![t]), t0, t1, steps, out);
        }
    }
}

fn sample_uniform(
    eval: impl Fn(f32) -> Option<Values>,
    t0: f32,
    t1: f32,
    steps: usize,
    out: &mut Vec<(f32, Values)>,
) {
    for step in 0..=steps {
        let t = t0 + (t1 - t0) * step as f32 / steps as f32;

        if let Some(values) = eval(t) {
            out.push((t, values));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(data: &[u8]) -> ShadingFunction {
        ShadingFunction::new(&Object::from_bytes(data).unwrap()).unwrap()
    }

    fn gray(v: f32) -> AlphaColor {
        AlphaColor::new([v, v, v, 1.0])
    }

    #[test]
    fn linear_function() {
        let f = function(b"<< /FunctionType 2 /Domain [0 1] /C0 [0] /C1 [1] /N 1 >>");
        let stops = gradient_stops(&f, [0.0, 1.0], &ColorSpace::device_gray());

        assert_eq!(
            stops,
            vec![
                GradientStop {
                    offset: 0.0,
                    color: gray(0.0)
                },
                GradientStop {
                    offset: 1.0,
                    color: gray(1.0)
                },
            ]
        );
    }

    #[test]
    fn non_linear_function_is_sampled() {
        let f = function(b"<< /FunctionType 2 /Domain [0 1] /C0 [0] /C1 [1] /N 2 >>");
        let stops = gradient_stops(&f, [0.0, 1.0], &ColorSpace::device_gray());

        assert_eq!(stops.len(), SAMPLES + 1);
        assert_eq!(stops[SAMPLES / 2].color, gray(0.25));
    }

    #[test]
    fn stitching_keeps_jumps() {
        let f = function(
            b"<< /FunctionType 3 /Domain [0 1] /Bounds [0.5] /Encode [0 1 0 1] /Functions [
                << /FunctionType 2 /Domain [0 1] /C0 [0] /C1 [0.5] /N 1 >>
                << /FunctionType 2 /Domain [0 1] /C0 [1] /C1 [1] /N 1 >>
            ] >>",
        );
        let stops = gradient_stops(&f, [0.0, 1.0], &ColorSpace::device_gray());
        let offsets = stops.iter().map(|s| s.offset).collect::<Vec<_>>();

        assert_eq!(offsets, vec![0.0, 0.5, 0.5, 1.0]);
        assert_eq!(stops[1].color, gray(0.5));
        assert_eq!(stops[2].color, gray(1.0));
    }

    #[test]
    fn stops_cover_the_whole_range() {
        let f = function(
            b"<< /FunctionType 3 /Domain [2 3] /Bounds [] /Encode [0 1] /Functions [
                << /FunctionType 2 /Domain [0 1] /C0 [1 0 0] /C1 [0 0 1] /N 1 >>
            ] >>",
        );
        let stops = gradient_stops(&f, [2.0, 4.0], &ColorSpace::device_rgb());

        assert_eq!(stops.first().map(|s| s.offset), Some(0.0));
        assert_eq!(stops.last().map(|s| s.offset), Some(1.0));
        assert_eq!(stops[stops.len() - 2].offset, 0.5);
        assert_eq!(stops.last().map(|s| s.color), Some(AlphaColor::new([0., 0., 1., 1.])));
    }

    #[test]
    fn one_function_per_component() {
        let f = function(
            b"[<< /FunctionType 2 /Domain [0 1] /C0 [0] /C1 [1] /N 1 >>
               << /FunctionType 2 /Domain [0 1] /C0 [1] /C1 [0] /N 1 >>
               << /FunctionType 2 /Domain [0 1] /C0 [0] /C1 [0] /N 1 >>]",
        );
        assert_eq!(f.output_dimension(), Some(3));

        let stops = gradient_stops(&f, [0.0, 1.0], &ColorSpace::device_rgb());
        assert_eq!(stops[0].color, AlphaColor::new([0., 1., 0., 1.]));
        assert_eq!(stops.last().map(|s| s.color), Some(AlphaColor::new([1., 0., 0., 1.])));
    }

    #[test]
    fn arity_mismatch() {
        let shading = Object::from_bytes(
            b"<< /ShadingType 2 /ColorSpace /DeviceRGB /Coords [0 0 1 0]
                /Function << /FunctionType 2 /Domain [0 1] /C0 [0] /C1 [1] /N 1 >> >>",
        )
        .unwrap();

        assert_eq!(
            Shading::new(&shading).err(),
            Some(InterpreterWarning::UnsupportedFunction)
        );
    }

    #[test]
    fn axial_shading() {
        let shading = Object::from_bytes(
            b"<< /ShadingType 2 /ColorSpace /DeviceGray /Coords [0 0 100 0] /Extend [true false]
                /Background [0.5]
                /Function << /FunctionType 2 /Domain [0 1] /C0 [0] /C1 [1] /N 1 >> >>",
        )
        .unwrap();
        let shading = Shading::new(&shading).unwrap();

        let ShadingKind::Axial { coords, extend, .. } = &*shading.kind else {
            panic!("expected an axial shading");
        };
        assert_eq!(*coords, [0.0, 0.0, 100.0, 0.0]);
        assert_eq!(*extend, [true, false]);
        assert_eq!(shading.background_color(), Some(gray(0.5)));
    }

    #[test]
    fn function_based_shading_is_unsupported() {
        let shading = Object::from_bytes(
            b"<< /ShadingType 1 /ColorSpace /DeviceGray
                /Function << /FunctionType 2 /Domain [0 1] /C0 [0] /C1 [1] /N 1 >> >>",
        )
        .unwrap();

        assert_eq!(
            Shading::new(&shading).err(),
            Some(InterpreterWarning::UnsupportedShading)
        );
    }
}
