use crate::color::{ColorComponents, ColorSpace};
use crate::context::Context;
use crate::device::Device;
use crate::interpret::path::{
    close_path, curve_to, end_path, fill_path, fill_stroke_path, line_to, move_to, rect,
    stroke_path, with_soft_mask,
};
use crate::interpret::state::{convert_line_cap, convert_line_join, handle_gs, set_dash};
use crate::pattern::Pattern;
use crate::shading::{Shading, draw_shading};
use crate::util::OptionLog;
use crate::x_object::{draw_image, draw_x_object};
use crate::FillRule;
use folio_syntax::Resources;
use folio_syntax::content::{Token, Tokenizer};
use folio_syntax::object::{Array, Name, Object};
use kurbo::{Affine, Point};
use log::{debug, warn};
use smallvec::SmallVec;

pub(crate) mod path;
pub(crate) mod state;

type Operands = SmallVec<[Object; 8]>;

/// Interpret the tokens of a content stream and draw them onto the device.
///
/// The current transform of `device` must be the current transform of `context`. Graphics
/// states that are saved but never restored are restored at the end.
pub fn interpret(
    tokens: Tokenizer<'_>,
    resources: &Resources,
    context: &mut Context,
    device: &mut dyn Device,
) {
    let num_states = context.num_states();
    let mut operands = Operands::new();

    for token in tokens {
        match token {
            Token::Operand(object) => operands.push(object),
            Token::Operator(op) => {
                if op.as_bytes() == b"Q" && context.num_states() <= num_states {
                    warn!("restoring a graphics state that was saved outside of this stream");
                } else {
                    run_operator(op.as_bytes(), &operands, resources, context, device);
                }

                operands.clear();
            }
            Token::InlineImage(stream) => {
                draw_image(&stream, resources, context, device);
                operands.clear();
            }
        }
    }

    while context.num_states() > num_states {
        context.restore_state(device);
    }
}

fn run_operator(
    op: &[u8],
    operands: &[Object],
    resources: &Resources,
    context: &mut Context,
    device: &mut dyn Device,
) {
    match op {
        // General graphics state.
        b"q" => context.save_state(device),
        b"Q" => context.restore_state(device),
        b"cm" => {
            let [a, b, c, d, e, f] = numbers(operands);
            context.pre_concat(Affine::new([a, b, c, d, e, f]), device);
        }
        b"w" => context.get_mut().stroke_props.line_width = number(operands) as f32,
        b"J" => {
            context.get_mut().stroke_props.line_cap = convert_line_cap(number(operands) as i64)
        }
        b"j" => {
            context.get_mut().stroke_props.line_join = convert_line_join(number(operands) as i64)
        }
        b"M" => context.get_mut().stroke_props.miter_limit = number(operands) as f32,
        b"d" => {
            let array = operands.first().cloned().and_then(|o| o.cast::<Array>());
            let phase = number(operands) as f32;

            match array {
                Some(array) => set_dash(context, &array, phase),
                None => warn!("dash pattern without an array"),
            }
        }
        b"ri" => context.get_mut().rendering_intent = name(operands),
        b"i" => context.get_mut().flatness = number(operands) as f32,
        b"gs" => {
            if let Some(name) = name(operands)
                && let Some(gs) = resources
                    .ext_g_state(&name)
                    .warn_none(&format!("failed to get extended graphics state {}", name.as_str()))
            {
                handle_gs(&gs, context, device, resources);
            }
        }

        // Path construction.
        b"m" => {
            let [x, y] = numbers(operands);
            move_to(context, Point::new(x, y));
        }
        b"l" => {
            let [x, y] = numbers(operands);
            line_to(context, Point::new(x, y));
        }
        b"c" => {
            let [x1, y1, x2, y2, x3, y3] = numbers(operands);
            curve_to(
                context,
                Point::new(x1, y1),
                Point::new(x2, y2),
                Point::new(x3, y3),
            );
        }
        b"v" => {
            let [x2, y2, x3, y3] = numbers(operands);
            let p1 = context.last_point();
            curve_to(context, p1, Point::new(x2, y2), Point::new(x3, y3));
        }
        b"y" => {
            let [x1, y1, x3, y3] = numbers(operands);
            let p3 = Point::new(x3, y3);
            curve_to(context, Point::new(x1, y1), p3, p3);
        }
        b"h" => close_path(context),
        b"re" => {
            let [x, y, w, h] = numbers(operands);
            rect(context, x, y, w, h);
        }

        // Path painting.
        b"f" | b"F" => fill_path(context, device, FillRule::NonZero),
        b"f*" => fill_path(context, device, FillRule::EvenOdd),
        b"S" => stroke_path(context, device),
        b"s" => {
            close_path(context);
            stroke_path(context, device);
        }
        b"B" => fill_stroke_path(context, device, FillRule::NonZero),
        b"B*" => fill_stroke_path(context, device, FillRule::EvenOdd),
        b"b" => {
            close_path(context);
            fill_stroke_path(context, device, FillRule::NonZero);
        }
        b"b*" => {
            close_path(context);
            fill_stroke_path(context, device, FillRule::EvenOdd);
        }
        b"n" => end_path(context, device),
        b"W" => context.set_pending_clip(FillRule::NonZero),
        b"W*" => context.set_pending_clip(FillRule::EvenOdd),

        // Colours.
        b"CS" | b"cs" | b"SC" | b"sc" | b"SCN" | b"scn" | b"G" | b"g" | b"RG" | b"rg" | b"K"
        | b"k" => {
            if context.get().uncolored {
                debug!("ignoring colour operator in uncoloured tiling pattern");
            } else {
                run_color_operator(op, operands, resources, context);
            }
        }

        // Shadings and XObjects.
        b"sh" => {
            if let Some(name) = name(operands) {
                draw_named_shading(&name, resources, context, device);
            }
        }
        b"Do" => {
            if let Some(name) = name(operands) {
                draw_x_object(&name, resources, context, device);
            }
        }

        // Text, which is parsed but not drawn.
        b"BT" | b"ET" | b"Tc" | b"Tw" | b"Tz" | b"TL" | b"Tf" | b"Tr" | b"Ts" | b"Td" | b"TD"
        | b"Tm" | b"T*" | b"Tj" | b"TJ" | b"'" | b"\"" | b"d0" | b"d1" => {
            debug!("ignoring text operator {}", String::from_utf8_lossy(op));
        }

        // Marked content and compatibility sections.
        b"BMC" | b"BDC" | b"EMC" | b"MP" | b"DP" | b"BX" | b"EX" => {
            debug!("ignoring marked content operator {}", String::from_utf8_lossy(op));
        }

        _ => warn!("unknown operator {}", String::from_utf8_lossy(op)),
    }
}

fn run_color_operator(
    op: &[u8],
    operands: &[Object],
    resources: &Resources,
    context: &mut Context,
) {
    let is_stroke = op.first().is_some_and(u8::is_ascii_uppercase);

    let device_space = match op {
        b"G" | b"g" => Some(ColorSpace::device_gray()),
        b"RG" | b"rg" => Some(ColorSpace::device_rgb()),
        b"K" | b"k" => Some(ColorSpace::device_cmyk()),
        _ => None,
    };

    if let Some(color_space) = device_space {
        let components = components(operands, color_space.num_components());
        let paint = context.get_mut().paint_mut(is_stroke);
        paint.set_color_space(color_space);
        paint.set_color(components);

        return;
    }

    match op {
        b"CS" | b"cs" => {
            let Some(name) = name(operands) else {
                return;
            };

            let color_space = context
                .get_color_space(resources, &name)
                .unwrap_or_else(ColorSpace::device_gray);
            context.get_mut().paint_mut(is_stroke).set_color_space(color_space);
        }
        _ => {
            // `SCN` and `scn` can end with the name of a pattern.
            let pattern = match operands.last() {
                Some(Object::Name(name)) if op.len() == 3 => {
                    Some(resolve_pattern(name, resources, context))
                }
                _ => None,
            };

            let paint = context.get_mut().paint_mut(is_stroke);
            let num_components = paint.color_space.num_components();
            let has_components = operands.iter().any(|o| o.as_number().is_some());

            if let Some(pattern) = &pattern {
                if !paint.color_space.is_pattern() {
                    warn!("setting a pattern, but the colour space isn't Pattern");
                }

                paint.pattern = pattern.clone();
            }

            // A lone pattern name keeps the components, anything else sets them.
            if (has_components || pattern.is_none())
                && !paint.set_color(components(operands, num_components))
            {
                warn!(
                    "wrong number of colour components for {}",
                    String::from_utf8_lossy(op)
                );
            }
        }
    }
}

fn resolve_pattern(name: &Name, resources: &Resources, context: &Context) -> Option<Pattern> {
    let object = resources
        .pattern(name)
        .warn_none(&format!("pattern {} is missing", name.as_str()))?;

    Pattern::new(&object, context, resources)
}

fn draw_named_shading(
    name: &Name,
    resources: &Resources,
    context: &mut Context,
    device: &mut dyn Device,
) {
    let Some(object) = resources
        .shading(name)
        .warn_none(&format!("shading {} is missing", name.as_str()))
    else {
        return;
    };

    let shading = match Shading::new_cached(&object, context.cache()) {
        Ok(shading) => shading,
        Err(warning) => {
            context.warn(warning);

            return;
        }
    };

    let alpha = context.get().fill.alpha;

    with_soft_mask(context, device, |_, device| {
        device.save_state();
        device.set_opacity(alpha);
        draw_shading(&shading, device);
        device.restore_state();
    });
}

/// The last `N` numbers of the operands, where missing ones are 0.
fn numbers<const N: usize>(operands: &[Object]) -> [f64; N] {
    let mut out = [0.0; N];
    let taken = operands.len().min(N);

    for (slot, operand) in out[N - taken..]
        .iter_mut()
        .zip(&operands[operands.len() - taken..])
    {
        *slot = operand.as_number().map(|n| n.as_f64()).unwrap_or_else(|| {
            warn!("expected a number, but got {operand:?}");

            0.0
        });
    }

    out
}

fn number(operands: &[Object]) -> f64 {
    let [n] = numbers(operands);

    n
}

fn name(operands: &[Object]) -> Option<Name> {
    operands
        .last()
        .and_then(|o| o.as_name().cloned())
        .warn_none("expected a name operand")
}

/// The last `n` numbers of the operands, as colour components. Missing leading components
/// are 0.
fn components(operands: &[Object], n: usize) -> ColorComponents {
    let numbers = operands
        .iter()
        .filter_map(|o| o.as_number().map(|n| n.as_f32()))
        .collect::<SmallVec<[f32; 8]>>();
    let taken = numbers.len().min(n);

    if taken < n {
        warn!("expected {n} colour components, but got {taken}");
    }

    std::iter::repeat_n(0.0, n - taken)
        .chain(numbers[numbers.len() - taken..].iter().copied())
        .collect()
}
