//! Extended graphics states and the line style operators.

use crate::BlendMode;
use crate::context::Context;
use crate::device::Device;
use crate::soft_mask::SoftMask;
use crate::util::OptionLog;
use folio_syntax::Resources;
use folio_syntax::object::keys::*;
use folio_syntax::object::{Array, Dict, Name, Object};
use kurbo::{Cap, Join};
use log::warn;
use smallvec::SmallVec;

pub(crate) fn convert_line_cap(cap: i64) -> Cap {
    match cap {
        1 => Cap::Round,
        2 => Cap::Square,
        _ => Cap::Butt,
    }
}

pub(crate) fn convert_line_join(join: i64) -> Join {
    match join {
        1 => Join::Round,
        2 => Join::Bevel,
        _ => Join::Miter,
    }
}

/// Set the dash pattern. Zero-length dashes are widened slightly, since a pattern of only
/// zeroes never advances.
pub(crate) fn set_dash(context: &mut Context, array: &Array, offset: f32) {
    let props = &mut context.get_mut().stroke_props;
    props.dash_offset = offset;
    props.dash_array = array
        .iter::<f32>()
        .map(|d| if d == 0.0 { 0.01 } else { d.abs() })
        .collect::<SmallVec<_>>();
}

/// Apply an extended graphics state.
pub(crate) fn handle_gs(
    dict: &Dict,
    context: &mut Context,
    device: &mut dyn Device,
    resources: &Resources,
) {
    for key in dict.keys() {
        handle_gs_single(dict, key, context, device, resources).warn_none(&format!(
            "invalid value in graphics state for {}",
            key.as_str()
        ));
    }
}

fn handle_gs_single(
    dict: &Dict,
    key: &Name,
    context: &mut Context,
    device: &mut dyn Device,
    resources: &Resources,
) -> Option<()> {
    match key.as_ref() {
        LW => context.get_mut().stroke_props.line_width = dict.get::<f32>(key)?,
        LC => context.get_mut().stroke_props.line_cap = convert_line_cap(dict.get::<i64>(key)?),
        LJ => {
            context.get_mut().stroke_props.line_join = convert_line_join(dict.get::<i64>(key)?)
        }
        ML => context.get_mut().stroke_props.miter_limit = dict.get::<f32>(key)?,
        D => {
            let dash = dict.get::<Array>(key)?;
            let pattern = dash.get::<Array>(0)?;
            let offset = dash.get::<f32>(1).unwrap_or(0.0);

            set_dash(context, &pattern, offset);
        }
        RI => context.get_mut().rendering_intent = Some(dict.get::<Name>(key)?),
        CA => context.get_mut().stroke.alpha = dict.get::<f32>(key)?.clamp(0.0, 1.0),
        CA_NS => context.get_mut().fill.alpha = dict.get::<f32>(key)?.clamp(0.0, 1.0),
        BM => {
            let blend_mode = blend_mode(&dict.get::<Object>(key)?);
            context.get_mut().blend_mode = blend_mode;
            device.set_blend_mode(blend_mode);
        }
        SMASK => match dict.get::<Object>(key)? {
            Object::Name(name) if name.as_ref() == NONE => context.get_mut().soft_mask = None,
            Object::Dict(mask) => {
                let soft_mask = SoftMask::new(&mask, context, resources)?;
                context.get_mut().soft_mask = Some(soft_mask);
            }
            _ => return None,
        },
        TR | b"TR2" => warn!("transfer functions are not supported"),
        _ => {}
    }

    Some(())
}

/// Resolve a blend mode, which can also be an array of modes, of which the first supported
/// one is used.
fn blend_mode(object: &Object) -> BlendMode {
    let from_name = |name: &Name| BlendMode::from_name(name);

    let mode = match object {
        Object::Name(name) => from_name(name),
        Object::Array(array) => array.iter::<Name>().find_map(|n| from_name(&n)),
        _ => None,
    };

    mode.unwrap_or_else(|| {
        warn!("unknown blend mode {object:?}, using Normal");

        BlendMode::Normal
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InterpreterSettings, MaskKind};
    use kurbo::Affine;

    struct Sink;

    impl Device for Sink {
        fn concatenate(&mut self, _: Affine) {}
        fn save_state(&mut self) {}
        fn restore_state(&mut self) {}
        fn set_opacity(&mut self, _: f32) {}
        fn set_blend_mode(&mut self, _: BlendMode) {}
        fn begin_layer(&mut self) {}
        fn end_layer(&mut self) {}
        fn clip(&mut self, _: &kurbo::BezPath, _: crate::FillRule) {}
        fn clip_to_drawing(&mut self, _: MaskKind, _: &mut dyn FnMut(&mut dyn Device)) {}
        fn draw(&mut self, _: &kurbo::BezPath, _: crate::FillRule, _: &crate::Paint) {}
        fn stroke(&mut self, _: &kurbo::BezPath, _: &crate::StrokeProps, _: &crate::Paint) {}
        fn draw_linear_gradient(&mut self, _: &crate::LinearGradient) {}
        fn draw_radial_gradient(&mut self, _: &crate::RadialGradient) {}
        fn draw_mesh_gradient(&mut self, _: &crate::MeshGradient) {}
        fn draw_image(&mut self, _: &crate::RgbaImage) {}
    }

    fn apply(gs: &[u8]) -> Context {
        let mut context = Context::new(Affine::IDENTITY, InterpreterSettings::default());
        let dict = Dict::from_bytes(gs).unwrap();
        handle_gs(&dict, &mut context, &mut Sink, &Resources::default());

        context
    }

    #[test]
    fn line_style() {
        let context = apply(b"<< /LW 3 /LC 1 /LJ 2 /ML 4 /D [[2 0] 1] >>");
        let props = &context.get().stroke_props;

        assert_eq!(props.line_width, 3.0);
        assert_eq!(props.line_cap, Cap::Round);
        assert_eq!(props.line_join, Join::Bevel);
        assert_eq!(props.miter_limit, 4.0);
        assert_eq!(props.dash_array.as_slice(), &[2.0, 0.01]);
        assert_eq!(props.dash_offset, 1.0);
    }

    #[test]
    fn opacities_are_clamped() {
        let context = apply(b"<< /CA 0.5 /ca 2 >>");

        assert_eq!(context.get().stroke.alpha, 0.5);
        assert_eq!(context.get().fill.alpha, 1.0);
    }

    #[test]
    fn blend_mode_arrays() {
        let context = apply(b"<< /BM [/Unknown /Multiply] >>");
        assert_eq!(context.get().blend_mode, BlendMode::Multiply);

        let context = apply(b"<< /BM /Compatible >>");
        assert_eq!(context.get().blend_mode, BlendMode::Normal);
    }

    #[test]
    fn soft_mask_without_group_is_ignored() {
        let context = apply(b"<< /SMask << /S /Luminosity >> >>");
        assert!(context.get().soft_mask.is_none());

        let context = apply(b"<< /SMask /None >>");
        assert!(context.get().soft_mask.is_none());
    }
}
