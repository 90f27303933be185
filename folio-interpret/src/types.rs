use crate::color::{AlphaColor, Color};
use crate::pattern::TilingPattern;
use kurbo::{Affine, BezPath, Cap, Join, Point};
use smallvec::{SmallVec, smallvec};
use std::sync::Arc;

/// A fill rule.
#[derive(Clone, Debug, Copy, Default, Hash, PartialEq, Eq)]
pub enum FillRule {
    /// Non-zero filling.
    #[default]
    NonZero,
    /// Even-odd filling.
    EvenOdd,
}

/// A clip path, stored in device space.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipPath {
    /// The clipping path.
    pub path: BezPath,
    /// The fill rule.
    pub fill_rule: FillRule,
}

/// Stroke properties.
#[derive(Clone, Debug, PartialEq)]
pub struct StrokeProps {
    /// The line width.
    pub line_width: f32,
    /// The line cap.
    pub line_cap: Cap,
    /// The line join.
    pub line_join: Join,
    /// The miter limit.
    pub miter_limit: f32,
    /// The dash array.
    pub dash_array: SmallVec<[f32; 4]>,
    /// The dash offset.
    pub dash_offset: f32,
}

impl Default for StrokeProps {
    fn default() -> Self {
        Self {
            line_width: 1.0,
            line_cap: Cap::Butt,
            line_join: Join::Miter,
            miter_limit: 10.0,
            dash_array: smallvec![],
            dash_offset: 0.0,
        }
    }
}

impl StrokeProps {
    /// Convert the properties into a `kurbo` stroke style.
    pub fn to_kurbo(&self) -> kurbo::Stroke {
        let stroke = kurbo::Stroke::new(self.line_width as f64)
            .with_caps(self.line_cap)
            .with_join(self.line_join)
            .with_miter_limit(self.miter_limit as f64);

        if self.dash_array.is_empty() {
            stroke
        } else {
            stroke.with_dashes(
                self.dash_offset as f64,
                self.dash_array.iter().map(|d| *d as f64),
            )
        }
    }
}

/// A blend mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl BlendMode {
    /// Parse a blend mode from its name. `Compatible` is an alias of `Normal`.
    pub fn from_name(name: &[u8]) -> Option<Self> {
        Some(match name {
            b"Normal" | b"Compatible" => Self::Normal,
            b"Multiply" => Self::Multiply,
            b"Screen" => Self::Screen,
            b"Overlay" => Self::Overlay,
            b"Darken" => Self::Darken,
            b"Lighten" => Self::Lighten,
            b"ColorDodge" => Self::ColorDodge,
            b"ColorBurn" => Self::ColorBurn,
            b"HardLight" => Self::HardLight,
            b"SoftLight" => Self::SoftLight,
            b"Difference" => Self::Difference,
            b"Exclusion" => Self::Exclusion,
            b"Hue" => Self::Hue,
            b"Saturation" => Self::Saturation,
            b"Color" => Self::Color,
            b"Luminosity" => Self::Luminosity,
            _ => return None,
        })
    }

    /// The name of the blend mode.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Multiply => "Multiply",
            Self::Screen => "Screen",
            Self::Overlay => "Overlay",
            Self::Darken => "Darken",
            Self::Lighten => "Lighten",
            Self::ColorDodge => "ColorDodge",
            Self::ColorBurn => "ColorBurn",
            Self::HardLight => "HardLight",
            Self::SoftLight => "SoftLight",
            Self::Difference => "Difference",
            Self::Exclusion => "Exclusion",
            Self::Hue => "Hue",
            Self::Saturation => "Saturation",
            Self::Color => "Color",
            Self::Luminosity => "Luminosity",
        }
    }
}

/// How a drawing is turned into a mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaskKind {
    /// The luminosity of the drawing is used as the mask value.
    Luminosity,
    /// The alpha channel of the drawing is used as the mask value.
    Alpha,
}

/// A paint used for filling or stroking a path.
#[derive(Clone, Debug)]
pub enum Paint {
    /// A solid colour. The opacity of the graphics state is already applied to it.
    Color(Color),
    /// A coloured tiling pattern.
    Pattern(Box<PatternPaint>),
}

/// A tiling pattern, placed on the page.
#[derive(Clone, Debug)]
pub struct PatternPaint {
    /// The pattern.
    pub pattern: TilingPattern,
    /// The transform from pattern space to the base space of the device, meaning the
    /// space before any call to [`Device::concatenate`](crate::Device::concatenate).
    pub transform: Affine,
}

/// A stop of a gradient.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientStop {
    /// The offset of the stop, in `[0, 1]`.
    pub offset: f32,
    /// The colour at the stop.
    pub color: AlphaColor,
}

/// An axial gradient, in user space.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearGradient {
    /// The start point.
    pub start: Point,
    /// The end point.
    pub end: Point,
    /// The stops, sorted by offset. There is always a stop at 0 and at 1.
    pub stops: Vec<GradientStop>,
    /// Whether the gradient extends beyond the start and end point.
    pub extend: [bool; 2],
}

/// A radial gradient between two circles, in user space.
#[derive(Clone, Debug, PartialEq)]
pub struct RadialGradient {
    /// The centre of the start circle.
    pub start_center: Point,
    /// The radius of the start circle.
    pub start_radius: f32,
    /// The centre of the end circle.
    pub end_center: Point,
    /// The radius of the end circle.
    pub end_radius: f32,
    /// The stops, sorted by offset. There is always a stop at 0 and at 1.
    pub stops: Vec<GradientStop>,
    /// Whether the gradient extends beyond the start and end circle.
    pub extend: [bool; 2],
}

/// A Coons or tensor-product patch.
///
/// The twelve boundary points run counter-clockwise from the first corner: `points[0]`,
/// `points[3]`, `points[6]` and `points[9]` are the corners, the others are the control
/// points of the four edges.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshPatch {
    /// The boundary points.
    pub points: [Point; 12],
    /// The four interior control points of a tensor-product patch, in the order `p11`,
    /// `p12`, `p22`, `p21`.
    pub interior: Option<[Point; 4]>,
    /// The colours of the four corners.
    pub colors: [AlphaColor; 4],
}

/// A run of connected mesh patches, in user space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshGradient {
    /// The patches.
    pub patches: Vec<MeshPatch>,
}

/// An RGBA image with 8 bits per channel and non-premultiplied alpha.
///
/// Images are placed on the unit square of user space, with the first row at the top.
#[derive(Clone, Debug)]
pub struct RgbaImage {
    /// The pixel data. It has exactly `width * height * 4` bytes.
    pub data: Arc<[u8]>,
    /// The width.
    pub width: u32,
    /// The height.
    pub height: u32,
    /// Whether the image should be interpolated when scaled.
    pub interpolate: bool,
}

impl RgbaImage {
    /// Whether any pixel is not fully opaque.
    pub fn has_alpha(&self) -> bool {
        self.data.chunks_exact(4).any(|px| px[3] != 255)
    }
}
