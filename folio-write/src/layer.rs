//! Layers, the unit in which content is accumulated.
//!
//! Every page starts out with a single layer. Transparency layers and masks open a child
//! layer below the deepest one, which is turned into a form XObject once it ends. Clips are
//! never intersected here: a layer has exactly one clip at a time, which is applied by
//! restoring the graphics state to the one at the start of the layer and setting it again.

use crate::path::write_path;
use crate::resources::{Deduplicator, ExtGState};
use folio_interpret::color::ColorComponents;
use folio_interpret::{BlendMode, FillRule};
use kurbo::{Affine, BezPath};
use pdf_writer::types::ColorSpaceOperand;
use pdf_writer::{Content, Name};

/// The name of the page colour space in the resources.
pub(crate) const PAGE_COLOR_SPACE: &[u8] = b"Cs1";

/// The clip of a layer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LayerClip {
    /// A path in the space of the layer.
    Path(BezPath, FillRule),
    /// An extended graphics state with a soft mask.
    Mask(String),
}

/// The graphics state of the device, as seen by the caller.
#[derive(Debug, Clone)]
pub(crate) struct DeviceState {
    pub(crate) transform: Affine,
    pub(crate) opacity: f32,
    pub(crate) blend_mode: BlendMode,
    pub(crate) clip: Option<LayerClip>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SpaceName {
    Page,
    Gray,
    Pattern,
}

/// A colour or pattern, in the form it is written to the content stream.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PaintValue {
    Color {
        space: SpaceName,
        components: ColorComponents,
    },
    Pattern(String),
}

impl PaintValue {
    fn space(&self) -> SpaceName {
        match self {
            Self::Color { space, .. } => *space,
            Self::Pattern(_) => SpaceName::Pattern,
        }
    }
}

/// The colours and graphics state that were last written to a layer.
#[derive(Debug, Default, Clone)]
pub(crate) struct StyleCache {
    fill: Option<PaintValue>,
    stroke: Option<PaintValue>,
    ext_g_state: Option<String>,
}

impl StyleCache {
    pub(crate) fn set_paint(&mut self, content: &mut Content, stroke: bool, value: PaintValue) {
        let slot = if stroke {
            &mut self.stroke
        } else {
            &mut self.fill
        };

        if slot.as_ref() == Some(&value) {
            return;
        }

        // Setting the colour space resets the colour, so both are written together.
        if slot.as_ref().map(PaintValue::space) != Some(value.space()) {
            let operand = match value.space() {
                SpaceName::Page => ColorSpaceOperand::Named(Name(PAGE_COLOR_SPACE)),
                SpaceName::Gray => ColorSpaceOperand::DeviceGray,
                SpaceName::Pattern => ColorSpaceOperand::Pattern,
            };

            if stroke {
                content.set_stroke_color_space(operand);
            } else {
                content.set_fill_color_space(operand);
            }
        }

        match (&value, stroke) {
            (PaintValue::Color { components, .. }, false) => {
                content.set_fill_color(components.iter().copied());
            }
            (PaintValue::Color { components, .. }, true) => {
                content.set_stroke_color(components.iter().copied());
            }
            (PaintValue::Pattern(name), false) => {
                content.set_fill_pattern(None, Name(name.as_bytes()));
            }
            (PaintValue::Pattern(name), true) => {
                content.set_stroke_pattern(None, Name(name.as_bytes()));
            }
        }

        *slot = Some(value);
    }

    fn set_ext_g_state(&mut self, content: &mut Content, name: String) {
        if self.ext_g_state.as_ref() == Some(&name) {
            return;
        }

        content.set_parameters(Name(name.as_bytes()));
        self.ext_g_state = Some(name);
    }

    /// Write everything again, after the graphics state was restored.
    fn replay(&mut self, content: &mut Content) {
        let cache = std::mem::take(self);

        if let Some(fill) = cache.fill {
            self.set_paint(content, false, fill);
        }

        if let Some(stroke) = cache.stroke {
            self.set_paint(content, true, stroke);
        }

        if let Some(name) = cache.ext_g_state {
            self.set_ext_g_state(content, name);
        }
    }
}

pub(crate) struct Layer {
    pub(crate) content: Content,
    pub(crate) style: StyleCache,
    pub(crate) state: DeviceState,
    saved: Vec<DeviceState>,
    applied_clip: Option<LayerClip>,
    /// Whether the layer belongs to a mask, whose colours are all gray.
    pub(crate) gray: bool,
    /// The opacity and blend mode the layer is composited with.
    pub(crate) composite: ExtGState,
    pub(crate) child: Option<Box<Layer>>,
}

impl Layer {
    pub(crate) fn new(transform: Affine, gray: bool, composite: ExtGState) -> Self {
        let mut content = Content::new();
        content.save_state();

        Self {
            content,
            style: StyleCache::default(),
            state: DeviceState {
                transform,
                opacity: 1.0,
                blend_mode: BlendMode::Normal,
                clip: None,
            },
            saved: vec![],
            applied_clip: None,
            gray,
            composite,
            child: None,
        }
    }

    pub(crate) fn deepest(&self) -> &Self {
        match self.child {
            Some(ref child) => child.deepest(),
            None => self,
        }
    }

    pub(crate) fn deepest_mut(&mut self) -> &mut Self {
        match self.child {
            Some(ref mut child) => child.deepest_mut(),
            None => self,
        }
    }

    /// Detach the deepest layer. Returns `None` if this layer has no children.
    pub(crate) fn pop_deepest(&mut self) -> Option<Box<Self>> {
        let child = self.child.as_mut()?;

        if child.child.is_some() {
            child.pop_deepest()
        } else {
            self.child.take()
        }
    }

    /// The number of layers in the chain, including this one.
    pub(crate) fn depth(&self) -> usize {
        1 + self.child.as_ref().map_or(0, |c| c.depth())
    }

    pub(crate) fn save(&mut self) {
        self.saved.push(self.state.clone());
    }

    /// Returns `false` if there is no saved state.
    pub(crate) fn restore(&mut self) -> bool {
        let Some(state) = self.saved.pop() else {
            return false;
        };

        self.state = state;
        self.apply_clip();

        true
    }

    pub(crate) fn set_ext_g_state(
        &mut self,
        ext_g_states: &mut Deduplicator<ExtGState>,
        state: ExtGState,
    ) {
        if self.style.ext_g_state.is_none() && state == ExtGState::DEFAULT {
            return;
        }

        let id = ext_g_states.insert(state);
        let name = ext_g_states.name(id);
        self.style.set_ext_g_state(&mut self.content, name);
    }

    /// Bring the clip of the content stream in line with the clip of the device state.
    pub(crate) fn apply_clip(&mut self) {
        if self.applied_clip == self.state.clip {
            return;
        }

        self.content.restore_state();
        self.content.save_state();
        self.style.replay(&mut self.content);

        match &self.state.clip {
            Some(LayerClip::Path(path, fill_rule)) => {
                write_path(&mut self.content, path, Affine::IDENTITY);

                match fill_rule {
                    FillRule::NonZero => self.content.clip_nonzero(),
                    FillRule::EvenOdd => self.content.clip_even_odd(),
                };

                self.content.end_path();
            }
            Some(LayerClip::Mask(name)) => {
                self.content.set_parameters(Name(name.as_bytes()));
            }
            None => {}
        }

        self.applied_clip = self.state.clip.clone();
    }

    /// Finish the content stream of the layer, ignoring any children.
    pub(crate) fn finish(mut self) -> Vec<u8> {
        self.content.restore_state();

        self.content.finish().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Rect, Shape};

    fn output(layer: Layer) -> String {
        String::from_utf8(layer.finish()).unwrap()
    }

    #[test]
    fn unchanged_colors_are_skipped() {
        let mut layer = Layer::new(Affine::IDENTITY, false, ExtGState::DEFAULT);
        let red = PaintValue::Color {
            space: SpaceName::Page,
            components: [1.0, 0.0, 0.0].into_iter().collect(),
        };

        layer.style.set_paint(&mut layer.content, false, red.clone());
        layer.style.set_paint(&mut layer.content, false, red);

        let out = output(layer);
        assert_eq!(out.matches("/Cs1 cs").count(), 1);
        assert_eq!(out.matches("1 0 0 sc").count(), 1);
    }

    #[test]
    fn clips_replay_the_style() {
        let mut layer = Layer::new(Affine::IDENTITY, false, ExtGState::DEFAULT);
        let gray = PaintValue::Color {
            space: SpaceName::Gray,
            components: [0.5].into_iter().collect(),
        };
        layer.style.set_paint(&mut layer.content, false, gray);

        layer.save();
        layer.state.clip = Some(LayerClip::Path(
            Rect::new(0.0, 0.0, 2.0, 2.0).to_path(0.1),
            FillRule::EvenOdd,
        ));
        layer.apply_clip();
        assert!(layer.restore());
        assert!(!layer.restore());

        let out = output(layer);
        assert_eq!(out.matches("0.5 sc").count(), 3);
        assert!(out.contains("0 0 2 2 re\nW*\nn"));
        assert!(out.trim_end().ends_with('Q'));
    }

    #[test]
    fn layer_chain() {
        let mut root = Layer::new(Affine::IDENTITY, false, ExtGState::DEFAULT);
        root.child = Some(Box::new(Layer::new(Affine::IDENTITY, false, ExtGState::DEFAULT)));
        root.deepest_mut().child =
            Some(Box::new(Layer::new(Affine::IDENTITY, true, ExtGState::DEFAULT)));

        assert_eq!(root.depth(), 3);
        assert!(root.deepest().gray);

        let popped = root.pop_deepest().unwrap();
        assert!(popped.gray);
        assert_eq!(root.depth(), 2);

        root.pop_deepest().unwrap();
        assert!(root.pop_deepest().is_none());
    }
}
