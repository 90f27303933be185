//! Form and image XObjects.

use crate::cache::CacheKey;
use crate::color::{AlphaColor, ColorSpace};
use crate::context::Context;
use crate::device::Device;
use crate::image::{DecodedImage, ImageError, decode};
use crate::interpret::path::{push_clip, with_soft_mask};
use crate::{BlendMode, FillRule, InterpreterWarning, interpret};
use folio_syntax::Resources;
use folio_syntax::content::Tokenizer;
use folio_syntax::object::keys::*;
use folio_syntax::object::{Dict, Name, Object, Rect, Stream, StreamId};
use kurbo::{Affine, Shape};
use log::warn;

/// Draw the XObject with the given name.
pub(crate) fn draw_x_object(
    name: &[u8],
    resources: &Resources,
    context: &mut Context,
    device: &mut dyn Device,
) {
    let Some(stream) = resources.x_object(name) else {
        warn!("XObject {} is missing", String::from_utf8_lossy(name));

        return;
    };

    match stream.dict().get::<Name>(SUBTYPE).as_deref() {
        Some(FORM) => draw_form(&stream, resources, context, device),
        Some(IMAGE) => draw_image(&stream, resources, context, device),
        Some(b"PS") => warn!("PostScript XObjects are not supported"),
        other => warn!("unknown XObject type {other:?}"),
    }
}

/// Draw a form XObject, whose resources are merged over `resources`.
pub(crate) fn draw_form(
    stream: &Stream,
    resources: &Resources,
    context: &mut Context,
    device: &mut dyn Device,
) {
    let id = stream.id();

    if !context.enter_stream(id) {
        return;
    }

    draw_form_inner(stream, resources, context, device);
    context.leave_stream(id);
}

fn draw_form_inner(
    stream: &Stream,
    resources: &Resources,
    context: &mut Context,
    device: &mut dyn Device,
) {
    let dict = stream.dict();

    let Some(data) = stream.decoded() else {
        warn!("failed to decode the content stream of a form");

        return;
    };

    let matrix = dict
        .get::<[f64; 6]>(MATRIX)
        .map(Affine::new)
        .unwrap_or_default();
    let Some(bbox) = dict.get::<Rect>(BBOX) else {
        warn!("form has no bounding box");

        return;
    };
    let group = dict.get::<Dict>(GROUP);
    let knockout_or_isolated = group.as_ref().is_some_and(|g| {
        g.get::<Name>(S).as_deref() == Some(TRANSPARENCY)
            && (g.get::<bool>(I).unwrap_or(false) || g.get::<bool>(K).unwrap_or(false))
    });

    context.save_state(device);
    context.pre_concat(matrix, device);
    context.push_root_transform();

    let state = context.get();
    let isolate = state.fill.alpha < 1.0
        || !state.clips.is_empty()
        || state.soft_mask.is_some()
        || knockout_or_isolated;

    let layers = if isolate {
        begin_isolation(context, device)
    } else {
        0
    };

    let rect = kurbo::Rect::new(bbox.x0, bbox.y0, bbox.x1, bbox.y1);
    push_clip(context, device, rect.to_path(0.1), FillRule::NonZero);

    let resources = Resources::from_parent(
        dict.get::<Dict>(RESOURCES).unwrap_or_default(),
        resources.clone(),
    );
    interpret(Tokenizer::new(&data), &resources, context, device);

    for _ in 0..layers {
        device.end_layer();
    }

    context.pop_root_transform();
    context.restore_state(device);
}

/// Open a layer that carries the opacity, blend mode, clip and soft mask of the current
/// state, and reset them inside of it. Returns the number of opened layers.
fn begin_isolation(context: &mut Context, device: &mut dyn Device) -> usize {
    let state = context.get();
    let mask = state.soft_mask.clone();

    device.set_opacity(state.fill.alpha);
    device.set_blend_mode(state.blend_mode);
    device.begin_layer();

    device.set_opacity(1.0);
    device.set_blend_mode(BlendMode::Normal);

    // The mask occupies the clip of its layer, so the content needs another one.
    let layers = if let Some(mask) = mask {
        let ctx: &Context = context;
        device.clip_to_drawing(mask.kind(), &mut |device: &mut dyn Device| mask.draw(ctx, device));
        device.begin_layer();

        2
    } else {
        1
    };

    let state = context.get_mut();
    state.fill.alpha = 1.0;
    state.stroke.alpha = 1.0;
    state.blend_mode = BlendMode::Normal;
    state.clips.clear();
    state.soft_mask = None;

    layers
}

/// Draw an image XObject or an inline image.
pub(crate) fn draw_image(
    stream: &Stream,
    resources: &Resources,
    context: &mut Context,
    device: &mut dyn Device,
) {
    let color_space = image_color_space(stream.dict(), resources, context);
    let decode_uncached = || decode(stream, color_space.clone());

    let decoded = match stream.id() {
        StreamId::Anonymous(_) => decode_uncached(),
        id => context
            .cache()
            .get_or_insert_with(CacheKey::Stream(id), || Some(decode_uncached()))
            .unwrap_or(Err(ImageError::Malformed)),
    };

    match decoded {
        Ok(image) => paint_image(image, context, device),
        Err(ImageError::UnsupportedFilter) => context.warn(InterpreterWarning::UnsupportedFilter),
        Err(ImageError::Malformed) => context.warn(InterpreterWarning::ImageDecodeFailure),
    }
}

fn image_color_space(dict: &Dict, resources: &Resources, context: &Context) -> Option<ColorSpace> {
    match dict.get::<Object>(COLORSPACE)? {
        Object::Name(name) => context.get_color_space(resources, &name),
        object => ColorSpace::new_cached(&object, context.cache()),
    }
}

fn paint_image(image: DecodedImage, context: &mut Context, device: &mut dyn Device) {
    let fill = &context.get().fill;
    let stencil_color = match &image {
        DecodedImage::Stencil { .. } if fill.color_space.is_pattern() => {
            warn!("stencil masks can't be painted with patterns, using black");

            AlphaColor::BLACK
        }
        _ => fill.color_space.to_rgba(&fill.color, 1.0),
    };
    let alpha = fill.alpha;
    let image = image.into_rgba(stencil_color);

    with_soft_mask(context, device, |_, device| {
        device.save_state();
        device.set_opacity(alpha);
        device.draw_image(&image);
        device.restore_state();
    });
}
