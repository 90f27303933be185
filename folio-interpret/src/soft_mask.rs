//! Soft masks, as set by the `SMask` entry of an extended graphics state.

use crate::color::{Color, ColorComponents, ColorSpace};
use crate::context::Context;
use crate::device::Device;
use crate::util::invert;
use crate::x_object::draw_form;
use crate::{FillRule, MaskKind, Paint};
use folio_syntax::Resources;
use folio_syntax::object::keys::*;
use folio_syntax::object::{Array, Dict, Name, Object, Rect, Stream};
use kurbo::{Affine, Shape};
use log::warn;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

struct SoftMaskRepr {
    group: Stream,
    kind: MaskKind,
    backdrop: Option<ColorComponents>,
    resources: Resources,
    transform: Affine,
}

/// A soft mask, whose values are given by drawing a transparency group.
#[derive(Clone)]
pub struct SoftMask(Arc<SoftMaskRepr>);

impl SoftMask {
    /// Create a soft mask from its dictionary. The group is drawn with the transform that
    /// is current when the mask is set.
    pub(crate) fn new(dict: &Dict, context: &Context, resources: &Resources) -> Option<Self> {
        let kind = match dict.get::<Name>(S)?.as_ref() {
            LUMINOSITY => MaskKind::Luminosity,
            ALPHA => MaskKind::Alpha,
            other => {
                warn!("unknown soft mask type {}", String::from_utf8_lossy(other));

                return None;
            }
        };
        let group = dict.get::<Stream>(G)?;
        let backdrop = dict
            .get::<Array>(BC)
            .map(|a| a.iter::<f32>().collect::<ColorComponents>());

        if dict.contains_key(TR) {
            warn!("transfer functions of soft masks are not supported");
        }

        Some(Self(Arc::new(SoftMaskRepr {
            group,
            kind,
            backdrop,
            resources: resources.clone(),
            transform: context.get().ctm,
        })))
    }

    /// How the drawing of the group is turned into mask values.
    pub fn kind(&self) -> MaskKind {
        self.0.kind
    }

    /// The transform of the group, relative to the base space of the device.
    pub fn transform(&self) -> Affine {
        self.0.transform
    }

    /// Draw the group of the mask. The current transform of `device` must be the current
    /// transform of `context`.
    pub(crate) fn draw(&self, context: &Context, device: &mut dyn Device) {
        let Some(inverse) = invert(context.get().ctm) else {
            return;
        };

        device.save_state();
        device.concatenate(inverse * self.0.transform);

        let mut nested = context.new_nested(self.0.transform);

        if let Some(backdrop) = self.backdrop() {
            let group = self.0.group.dict();
            let matrix = group
                .get::<[f64; 6]>(MATRIX)
                .map(Affine::new)
                .unwrap_or_default();

            if let Some(bbox) = group.get::<Rect>(BBOX) {
                let rect = kurbo::Rect::new(bbox.x0, bbox.y0, bbox.x1, bbox.y1);
                device.save_state();
                device.concatenate(matrix);
                device.draw(&rect.to_path(0.1), FillRule::NonZero, &Paint::Color(backdrop));
                device.restore_state();
            }
        }

        draw_form(&self.0.group, &self.0.resources, &mut nested, device);

        device.restore_state();
    }

    fn backdrop(&self) -> Option<Color> {
        let components = self.0.backdrop.clone()?;
        let color_space = self
            .0
            .group
            .dict()
            .get::<Dict>(GROUP)
            .and_then(|g| g.get::<Object>(CS))
            .and_then(|o| ColorSpace::new(&o))
            .unwrap_or_else(ColorSpace::device_gray);

        if components.len() != color_space.num_components() {
            warn!("backdrop of soft mask doesn't match the colour space of its group");

            return None;
        }

        Some(Color::new(color_space, components, 1.0))
    }
}

impl Debug for SoftMask {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SoftMask({:?}, {:?})", self.0.kind, self.0.group.id())
    }
}

impl PartialEq for SoftMask {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
