use crate::color::{Color, ColorComponents, ColorSpace};
use crate::pattern::Pattern;
use crate::soft_mask::SoftMask;
use crate::{BlendMode, ClipPath, StrokeProps};
use kurbo::Affine;

/// The paint of one side (fill or stroke) of the graphics state.
#[derive(Clone, Debug)]
pub(crate) struct PaintData {
    pub(crate) color_space: ColorSpace,
    pub(crate) color: ColorComponents,
    pub(crate) pattern: Option<Pattern>,
    pub(crate) alpha: f32,
}

impl PaintData {
    /// Switch to a new colour space, which resets the colour to its initial value.
    pub(crate) fn set_color_space(&mut self, color_space: ColorSpace) {
        self.color = color_space.initial_color();
        self.color_space = color_space;
        self.pattern = None;
    }

    /// Set the colour components, ignoring colours with the wrong number of components.
    pub(crate) fn set_color(&mut self, color: ColorComponents) -> bool {
        if color.len() != self.color_space.num_components() {
            return false;
        }

        self.color = color;

        true
    }

    pub(crate) fn to_color(&self) -> Color {
        Color::new(self.color_space.clone(), self.color.clone(), self.alpha)
    }
}

impl Default for PaintData {
    fn default() -> Self {
        let color_space = ColorSpace::device_gray();

        Self {
            color: color_space.initial_color(),
            color_space,
            pattern: None,
            alpha: 1.0,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct State {
    pub(crate) ctm: Affine,

    pub(crate) fill: PaintData,
    pub(crate) stroke: PaintData,
    pub(crate) stroke_props: StrokeProps,

    pub(crate) blend_mode: BlendMode,
    // Only tracked, nothing depends on it.
    pub(crate) rendering_intent: Option<folio_syntax::object::Name>,
    pub(crate) flatness: f32,

    // In the base space of the device.
    pub(crate) clips: Vec<ClipPath>,
    pub(crate) soft_mask: Option<SoftMask>,
    // Set inside the cell of an uncoloured tiling pattern, where colour operators are
    // ignored.
    pub(crate) uncolored: bool,
}

impl State {
    pub(crate) fn new(ctm: Affine) -> Self {
        Self {
            ctm,
            fill: PaintData::default(),
            stroke: PaintData::default(),
            stroke_props: StrokeProps::default(),
            blend_mode: BlendMode::Normal,
            rendering_intent: None,
            flatness: 1.0,
            clips: vec![],
            soft_mask: None,
            uncolored: false,
        }
    }

    pub(crate) fn paint(&self, is_stroke: bool) -> &PaintData {
        if is_stroke { &self.stroke } else { &self.fill }
    }

    pub(crate) fn paint_mut(&mut self, is_stroke: bool) -> &mut PaintData {
        if is_stroke {
            &mut self.stroke
        } else {
            &mut self.fill
        }
    }
}
