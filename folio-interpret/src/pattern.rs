//! Tiling and shading patterns.

use crate::cache::Cache;
use crate::color::Color;
use crate::context::Context;
use crate::device::Device;
use crate::interpret::path::push_clip;
use crate::shading::Shading;
use crate::{FillRule, InterpreterSettings, interpret};
use folio_syntax::Resources;
use folio_syntax::content::Tokenizer;
use folio_syntax::object::keys::*;
use folio_syntax::object::{Dict, Object, Rect, Stream, StreamId};
use kurbo::{Affine, Shape};
use log::warn;
use rustc_hash::FxHashSet;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// A pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// A shading pattern.
    Shading(ShadingPattern),
    /// A tiling pattern.
    Tiling(TilingPattern),
}

impl Pattern {
    pub(crate) fn new(object: &Object, context: &Context, resources: &Resources) -> Option<Self> {
        let pattern_type = object.as_dict().and_then(|d| d.get::<u8>(PATTERN_TYPE));

        match (pattern_type, object) {
            (Some(1), Object::Stream(stream)) => {
                TilingPattern::new(stream, context, resources).map(Self::Tiling)
            }
            (Some(2), Object::Dict(dict)) => {
                ShadingPattern::new(dict, context).map(Self::Shading)
            }
            _ => {
                warn!("invalid pattern of type {pattern_type:?}");

                None
            }
        }
    }
}

/// A shading pattern, which fills an area with a shading.
#[derive(Debug, Clone)]
pub struct ShadingPattern {
    /// The shading.
    pub shading: Shading,
    /// The transform from shading space to the default space of the page (or of the form
    /// the pattern is used in).
    pub matrix: Affine,
}

impl ShadingPattern {
    fn new(dict: &Dict, context: &Context) -> Option<Self> {
        let object = dict.get::<Object>(SHADING)?;
        let shading = match Shading::new_cached(&object, context.cache()) {
            Ok(shading) => shading,
            Err(warning) => {
                context.warn(warning);

                return None;
            }
        };
        let matrix = dict
            .get::<[f64; 6]>(MATRIX)
            .map(Affine::new)
            .unwrap_or_default();

        if dict.contains_key(EXT_G_STATE) {
            warn!("extended graphics states of shading patterns are ignored");
        }

        Some(Self { shading, matrix })
    }
}

struct TilingRepr {
    stream: Stream,
    bbox: kurbo::Rect,
    x_step: f32,
    y_step: f32,
    matrix: Affine,
    colored: bool,
    resources: Resources,
    settings: InterpreterSettings,
    cache: Cache,
    open_streams: FxHashSet<StreamId>,
    depth: u32,
}

/// A tiling pattern, whose cell is a content stream that is repeated across the plane.
#[derive(Clone)]
pub struct TilingPattern {
    repr: Arc<TilingRepr>,
    tint: Option<Color>,
}

impl TilingPattern {
    fn new(stream: &Stream, context: &Context, resources: &Resources) -> Option<Self> {
        let dict = stream.dict();
        let bbox = dict.get::<Rect>(BBOX)?;
        let x_step = dict.get::<f32>(X_STEP)?;
        let y_step = dict.get::<f32>(Y_STEP)?;

        if x_step == 0.0 || y_step == 0.0 {
            warn!("tiling pattern has a step of zero");

            return None;
        }

        let colored = match dict.get::<u8>(PAINT_TYPE)? {
            1 => true,
            2 => false,
            other => {
                warn!("unknown paint type {other} of tiling pattern");

                return None;
            }
        };
        let matrix = dict
            .get::<[f64; 6]>(MATRIX)
            .map(Affine::new)
            .unwrap_or_default();
        let resources = Resources::from_parent(
            dict.get::<Dict>(RESOURCES).unwrap_or_default(),
            resources.clone(),
        );

        Some(Self {
            repr: Arc::new(TilingRepr {
                stream: stream.clone(),
                bbox: kurbo::Rect::new(bbox.x0, bbox.y0, bbox.x1, bbox.y1),
                x_step,
                y_step,
                matrix,
                colored,
                resources,
                settings: context.settings.clone(),
                cache: context.cache().clone(),
                open_streams: context.open_streams().clone(),
                depth: context.depth(),
            }),
            tint: None,
        })
    }

    /// The bounding box of a cell, in pattern space.
    pub fn bbox(&self) -> kurbo::Rect {
        self.repr.bbox
    }

    /// The horizontal distance between cells.
    pub fn x_step(&self) -> f32 {
        self.repr.x_step
    }

    /// The vertical distance between cells.
    pub fn y_step(&self) -> f32 {
        self.repr.y_step
    }

    /// The transform from pattern space to the default space of the page (or of the form
    /// the pattern is used in).
    pub fn matrix(&self) -> Affine {
        self.repr.matrix
    }

    /// Whether the cell specifies its own colours. Uncoloured cells are painted with a tint.
    pub fn is_colored(&self) -> bool {
        self.repr.colored
    }

    /// The stream that describes the cell.
    pub fn stream(&self) -> &Stream {
        &self.repr.stream
    }

    /// Paint the cell with a single colour, ignoring the colour operators in it.
    pub fn with_tint(&self, tint: Color) -> Self {
        Self {
            repr: self.repr.clone(),
            tint: Some(tint),
        }
    }

    /// Draw a single cell onto the device, whose current transform has to map pattern
    /// space to the device. The cell is clipped to its bounding box.
    pub fn interpret(&self, device: &mut dyn Device) {
        let repr = &self.repr;
        let mut context = Context::new_with(
            Affine::IDENTITY,
            repr.settings.clone(),
            repr.cache.clone(),
            repr.open_streams.clone(),
            repr.depth,
        );

        if let Some(tint) = &self.tint {
            let state = context.get_mut();
            state.uncolored = true;

            for paint in [&mut state.fill, &mut state.stroke] {
                paint.set_color_space(tint.color_space().clone());
                paint.set_color(tint.components().iter().copied().collect());
            }
        }

        let id = repr.stream.id();

        if !context.enter_stream(id) {
            return;
        }

        let Some(data) = repr.stream.decoded() else {
            warn!("failed to decode the content stream of a tiling pattern");
            context.leave_stream(id);

            return;
        };

        context.save_state(device);
        push_clip(
            &mut context,
            device,
            repr.bbox.to_path(0.1),
            FillRule::NonZero,
        );
        interpret(Tokenizer::new(&data), &repr.resources, &mut context, device);
        context.restore_state(device);
        context.leave_stream(id);
    }
}

impl Debug for TilingPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TilingPattern")
            .field("stream", &self.repr.stream.id())
            .field("bbox", &self.repr.bbox)
            .field("x_step", &self.repr.x_step)
            .field("y_step", &self.repr.y_step)
            .field("tint", &self.tint)
            .finish_non_exhaustive()
    }
}

impl PartialEq for TilingPattern {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.repr, &other.repr) && self.tint == other.tint
    }
}
