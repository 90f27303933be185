//! Path construction, painting and clipping.

use crate::color::{Color, ColorSpace};
use crate::context::Context;
use crate::device::Device;
use crate::pattern::{Pattern, ShadingPattern, TilingPattern};
use crate::shading::draw_shading;
use crate::util::invert;
use crate::{ClipPath, FillRule, MaskKind, Paint, PatternPaint, StrokeProps};
use kurbo::{BezPath, Point, Rect, Shape, StrokeOpts};
use log::warn;
use smallvec::smallvec;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DrawMode {
    Fill(FillRule),
    Stroke,
}

pub(crate) fn move_to(context: &mut Context, point: Point) {
    context.path_mut().move_to(point);
    context.set_sub_path_start(point);
    context.set_last_point(point);
}

pub(crate) fn line_to(context: &mut Context, mut point: Point) {
    if context.path().elements().is_empty() {
        warn!("line without a current point");

        return;
    }

    // Zero-length lines would otherwise vanish, even though they can have caps.
    if point == context.last_point() {
        point.x += 0.0001;
    }

    context.path_mut().line_to(point);
    context.set_last_point(point);
}

pub(crate) fn curve_to(context: &mut Context, p1: Point, p2: Point, p3: Point) {
    if context.path().elements().is_empty() {
        warn!("curve without a current point");

        return;
    }

    context.path_mut().curve_to(p1, p2, p3);
    context.set_last_point(p3);
}

pub(crate) fn close_path(context: &mut Context) {
    if context.path().elements().is_empty() {
        return;
    }

    context.path_mut().close_path();
    let start = context.sub_path_start();
    context.set_last_point(start);
}

pub(crate) fn rect(context: &mut Context, x: f64, y: f64, width: f64, height: f64) {
    let rect = Rect::new(x, y, x + width, y + height);
    let origin = Point::new(x, y);

    context.path_mut().extend(rect.path_elements(0.1));
    context.set_sub_path_start(origin);
    context.set_last_point(origin);
}

pub(crate) fn fill_path(context: &mut Context, device: &mut dyn Device, fill_rule: FillRule) {
    let path = finish_path(context, device);

    if !path.elements().is_empty() {
        paint_path(context, device, &path, DrawMode::Fill(fill_rule));
    }
}

pub(crate) fn stroke_path(context: &mut Context, device: &mut dyn Device) {
    let path = finish_path(context, device);

    if !path.elements().is_empty() {
        paint_path(context, device, &path, DrawMode::Stroke);
    }
}

pub(crate) fn fill_stroke_path(context: &mut Context, device: &mut dyn Device, fill_rule: FillRule) {
    let path = finish_path(context, device);

    if !path.elements().is_empty() {
        paint_path(context, device, &path, DrawMode::Fill(fill_rule));
        paint_path(context, device, &path, DrawMode::Stroke);
    }
}

/// End the path without painting it, only applying a pending clip.
pub(crate) fn end_path(context: &mut Context, device: &mut dyn Device) {
    finish_path(context, device);
}

fn finish_path(context: &mut Context, device: &mut dyn Device) -> BezPath {
    let path = context.take_path();

    if let Some(fill_rule) = context.take_pending_clip() {
        push_clip(context, device, path.clone(), fill_rule);
    }

    path
}

/// Intersect the clip with a path in user space.
pub(crate) fn push_clip(
    context: &mut Context,
    device: &mut dyn Device,
    path: BezPath,
    fill_rule: FillRule,
) {
    let ctm = context.get().ctm;
    context.get_mut().clips.push(ClipPath {
        path: ctm * path.clone(),
        fill_rule,
    });

    apply_clips(context, device, &path, fill_rule);
}

fn apply_clips(context: &Context, device: &mut dyn Device, path: &BezPath, fill_rule: FillRule) {
    let clips = &context.get().clips;

    if clips.len() <= 1 {
        device.clip(path, fill_rule);

        return;
    }

    let Some(inverse) = invert(context.get().ctm) else {
        return;
    };

    device.clip_to_drawing(MaskKind::Luminosity, &mut |device: &mut dyn Device| {
        device.save_state();
        device.set_opacity(1.0);
        device.set_blend_mode(crate::BlendMode::Normal);
        device.concatenate(inverse);

        let (last, rest) = match clips.split_last() {
            Some(split) => split,
            None => return,
        };

        for clip in rest {
            device.clip(&clip.path, clip.fill_rule);
            device.begin_layer();
        }

        device.draw(&last.path, last.fill_rule, &Paint::Color(white()));

        for _ in rest {
            device.end_layer();
        }

        device.restore_state();
    });
}

fn white() -> Color {
    Color::new(ColorSpace::device_gray(), smallvec![1.0], 1.0)
}

/// Run `draw`, masked by the soft mask of the current state.
pub(crate) fn with_soft_mask(
    context: &mut Context,
    device: &mut dyn Device,
    draw: impl FnOnce(&mut Context, &mut dyn Device),
) {
    let Some(mask) = context.get().soft_mask.clone() else {
        draw(context, device);

        return;
    };

    device.save_state();
    device.set_opacity(1.0);
    device.begin_layer();
    device.set_blend_mode(crate::BlendMode::Normal);

    let ctx: &Context = context;
    device.clip_to_drawing(mask.kind(), &mut |device: &mut dyn Device| mask.draw(ctx, device));
    // Drawing may clip, which must not replace the mask.
    device.begin_layer();

    draw(context, device);
    device.end_layer();
    device.end_layer();
    device.restore_state();
}

fn paint_path(context: &mut Context, device: &mut dyn Device, path: &BezPath, mode: DrawMode) {
    let is_stroke = mode == DrawMode::Stroke;
    let paint = context.get().paint(is_stroke).clone();
    let stroke_props = context.get().stroke_props.clone();

    match paint.pattern {
        None if paint.color_space.is_pattern() => {
            warn!("painting with the pattern colour space, but no pattern is set");
        }
        None => {
            let paint = Paint::Color(paint.to_color());

            with_soft_mask(context, device, |_, device| {
                draw_path(device, path, mode, &stroke_props, &paint);
            });
        }
        Some(Pattern::Tiling(pattern)) => {
            let alpha = paint.alpha;
            let tint = paint
                .color_space
                .pattern_base()
                .map(|base| Color::new(base.clone(), paint.color.clone(), 1.0));

            with_soft_mask(context, device, |context, device| {
                draw_tiling(context, device, path, mode, &stroke_props, &pattern, tint, alpha);
            });
        }
        Some(Pattern::Shading(pattern)) => {
            let alpha = paint.alpha;

            with_soft_mask(context, device, |context, device| {
                draw_shading_pattern(context, device, path, mode, &stroke_props, &pattern, alpha);
            });
        }
    }
}

fn draw_path(
    device: &mut dyn Device,
    path: &BezPath,
    mode: DrawMode,
    stroke_props: &StrokeProps,
    paint: &Paint,
) {
    match mode {
        DrawMode::Fill(fill_rule) => device.draw(path, fill_rule, paint),
        DrawMode::Stroke => device.stroke(path, stroke_props, paint),
    }
}

fn draw_tiling(
    context: &Context,
    device: &mut dyn Device,
    path: &BezPath,
    mode: DrawMode,
    stroke_props: &StrokeProps,
    pattern: &TilingPattern,
    tint: Option<Color>,
    alpha: f32,
) {
    let transform = context.root_transform() * pattern.matrix();

    device.save_state();
    device.set_opacity(alpha);

    if pattern.is_colored() {
        let paint = Paint::Pattern(Box::new(PatternPaint {
            pattern: pattern.clone(),
            transform,
        }));

        draw_path(device, path, mode, stroke_props, &paint);
    } else {
        let Some(tint) = tint else {
            warn!("uncoloured tiling pattern is used without a colour");
            device.restore_state();

            return;
        };

        let mask = Paint::Pattern(Box::new(PatternPaint {
            pattern: pattern.with_tint(white()),
            transform,
        }));

        device.begin_layer();
        device.set_opacity(1.0);
        device.clip_to_drawing(MaskKind::Luminosity, &mut |device: &mut dyn Device| {
            draw_path(device, path, mode, stroke_props, &mask);
        });
        draw_path(device, path, mode, stroke_props, &Paint::Color(tint));
        device.end_layer();
    }

    device.restore_state();
}

fn draw_shading_pattern(
    context: &Context,
    device: &mut dyn Device,
    path: &BezPath,
    mode: DrawMode,
    stroke_props: &StrokeProps,
    pattern: &ShadingPattern,
    alpha: f32,
) {
    let (outline, fill_rule) = match mode {
        DrawMode::Fill(fill_rule) => (path.clone(), fill_rule),
        DrawMode::Stroke => (
            kurbo::stroke(
                path.iter(),
                &stroke_props.to_kurbo(),
                &StrokeOpts::default(),
                0.01,
            ),
            FillRule::NonZero,
        ),
    };

    let Some(inverse) = invert(context.get().ctm) else {
        return;
    };

    let layered = !context.get().clips.is_empty();

    device.save_state();

    if layered {
        device.begin_layer();
    }

    device.clip(&outline, fill_rule);
    device.set_opacity(alpha);

    let shading = &pattern.shading;

    if let Some(background) = &shading.background {
        let color = Color::new(shading.color_space.clone(), background.clone(), 1.0);
        device.draw(&outline, fill_rule, &Paint::Color(color));
    }

    device.concatenate(inverse * context.root_transform() * pattern.matrix);
    draw_shading(shading, device);

    if layered {
        device.end_layer();
    }

    device.restore_state();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InterpreterSettings;
    use kurbo::{Affine, PathEl};

    fn context() -> Context {
        Context::new(Affine::IDENTITY, InterpreterSettings::default())
    }

    #[test]
    fn degenerate_lines_are_nudged() {
        let mut context = context();
        move_to(&mut context, Point::new(1.0, 1.0));
        line_to(&mut context, Point::new(1.0, 1.0));

        let els = context.path().elements();
        assert_eq!(els.len(), 2);
        assert!(matches!(els[1], PathEl::LineTo(p) if p.x > 1.0 && p.y == 1.0));
    }

    #[test]
    fn line_without_current_point_is_ignored() {
        let mut context = context();
        line_to(&mut context, Point::new(1.0, 1.0));

        assert!(context.path().elements().is_empty());
    }

    #[test]
    fn close_path_resets_current_point() {
        let mut context = context();
        move_to(&mut context, Point::new(1.0, 2.0));
        line_to(&mut context, Point::new(5.0, 2.0));
        close_path(&mut context);

        assert_eq!(context.last_point(), Point::new(1.0, 2.0));
        assert_eq!(context.path().elements().last(), Some(&PathEl::ClosePath));
    }

    #[test]
    fn rect_is_closed() {
        let mut context = context();
        rect(&mut context, 0.0, 0.0, 2.0, 3.0);

        let els = context.path().elements();
        assert!(matches!(els[0], PathEl::MoveTo(p) if p == Point::ZERO));
        assert_eq!(els.last(), Some(&PathEl::ClosePath));
    }
}
