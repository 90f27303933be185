//! Encoding the drawing calls of a single page.

use crate::color::{ColorTarget, PageColorSpace};
use crate::layer::{Layer, LayerClip, PaintValue, SpaceName};
use crate::resources::{Bits, ExtGState, Form, Image, Pattern, ResourceTables, Shading, bits};
use crate::shading::{self, Channel, mesh_has_alpha, normalize_stops, stops_have_alpha};
use crate::path::write_path;
use folio_interpret::color::ColorSpace;
use folio_interpret::{
    BlendMode, Device, FillRule, LinearGradient, MaskKind, MeshGradient, Paint, PatternPaint,
    RadialGradient, RgbaImage, StrokeProps,
};
use kurbo::{Affine, BezPath, Cap, Join, Rect};
use log::warn;
use pdf_writer::Name;
use pdf_writer::types::{LineCapStyle, LineJoinStyle};
use std::fmt::{Debug, Formatter};

/// An encoder for a single page, which receives drawing calls through [`Device`].
///
/// The device starts out in the default user space of the page. Once all calls are made,
/// the page is added to a [`Document`](crate::Document).
pub struct PageEncoder {
    pub(crate) media_box: Rect,
    pub(crate) bleed_box: Rect,
    pub(crate) trim_box: Rect,
    pub(crate) art_box: Rect,
    color_space: ColorSpace,
    page_space: Option<PageColorSpace>,
    root: Layer,
    /// The bounding box of the forms that layers are turned into.
    bbox: Rect,
    resources: ResourceTables,
}

impl PageEncoder {
    /// Create a new page with the given media box, whose content is encoded in `color_space`.
    ///
    /// Only DeviceGray, DeviceRGB, DeviceCMYK and ICC-based colour spaces can be used,
    /// other colour spaces make [`Document::data`](crate::Document::data) fail.
    pub fn new(media_box: Rect, color_space: ColorSpace) -> Self {
        Self {
            media_box,
            bleed_box: media_box,
            trim_box: media_box,
            art_box: media_box,
            page_space: PageColorSpace::new(&color_space),
            color_space,
            root: Layer::new(Affine::IDENTITY, false, ExtGState::DEFAULT),
            bbox: media_box,
            resources: ResourceTables::default(),
        }
    }

    /// Set the bleed, trim and margin box of the page. The margin box is written as the
    /// art box.
    pub fn with_boxes(mut self, bleed_box: Rect, trim_box: Rect, margin_box: Rect) -> Self {
        self.bleed_box = bleed_box;
        self.trim_box = trim_box;
        self.art_box = margin_box;

        self
    }

    /// The number of transparency layers and masks that are currently open.
    pub fn layer_depth(&self) -> usize {
        self.root.depth() - 1
    }

    /// Close all open layers and finish the content stream.
    pub(crate) fn finish(mut self) -> EncodedPage {
        if self.layer_depth() > 0 {
            warn!("{} layers were left open", self.layer_depth());
            self.close_layers(1);
        }

        EncodedPage {
            media_box: self.media_box,
            bleed_box: self.bleed_box,
            trim_box: self.trim_box,
            art_box: self.art_box,
            color_space: self.page_space,
            content: self.root.finish(),
            resources: self.resources,
        }
    }

    fn current(&mut self) -> &mut Layer {
        self.root.deepest_mut()
    }

    fn target(&self) -> ColorTarget<'_> {
        ColorTarget {
            page: self.page_space.as_ref().map(|p| (p, &self.color_space)),
            gray: self.root.deepest().gray,
        }
    }

    /// End layers until only `depth` layers are left.
    fn close_layers(&mut self, depth: usize) {
        while self.root.depth() > depth {
            self.end_layer();
        }
    }

    /// Turn a paint into the value that is written to the content stream, together with
    /// its alpha.
    fn paint_value(&mut self, paint: &Paint) -> (PaintValue, f32) {
        match paint {
            Paint::Color(color) => {
                let target = self.target();
                let space = if target.gray {
                    SpaceName::Gray
                } else {
                    SpaceName::Page
                };
                let value = PaintValue::Color {
                    space,
                    components: target.convert(color),
                };

                (value, color.to_rgba().alpha())
            }
            Paint::Pattern(pattern) => (PaintValue::Pattern(self.register_pattern(pattern)), 1.0),
        }
    }

    /// Replay the cell of a tiling pattern into a fresh layer and register it.
    fn register_pattern(&mut self, paint: &PatternPaint) -> String {
        let pattern = &paint.pattern;
        let gray = self.root.deepest().gray;
        let cell_bbox = pattern.bbox();

        let cell = Layer::new(Affine::IDENTITY, gray, ExtGState::DEFAULT);
        let outer = std::mem::replace(&mut self.root, cell);
        let outer_bbox = std::mem::replace(&mut self.bbox, cell_bbox);

        pattern.interpret(self);
        self.close_layers(1);

        let cell = std::mem::replace(&mut self.root, outer);
        self.bbox = outer_bbox;

        let index = self.resources.patterns.insert(Pattern {
            content: cell.finish(),
            bbox: bits([cell_bbox.x0, cell_bbox.y0, cell_bbox.x1, cell_bbox.y1]),
            x_step: Bits(pattern.x_step()),
            y_step: Bits(pattern.y_step()),
            matrix: bits(paint.transform.as_coeffs()),
        });

        self.resources.patterns.name(index)
    }

    /// Run `draw` against a mask layer, and make the result the clip of the current layer.
    fn mask(&mut self, kind: MaskKind, draw: impl FnOnce(&mut Self)) {
        let depth = self.root.depth();
        let current = self.current();
        current.child = Some(Box::new(Layer::new(
            current.state.transform,
            true,
            ExtGState::DEFAULT,
        )));

        draw(self);
        self.close_layers(depth + 1);

        let Some(mask) = self.root.pop_deepest() else {
            return;
        };

        let mask = self.resources.masks.insert(Form {
            content: mask.finish(),
            bbox: rect_bits(self.bbox),
        });
        let state = self
            .resources
            .ext_g_states
            .insert(ExtGState::SoftMask { mask, kind });
        let name = self.resources.ext_g_states.name(state);

        let layer = self.root.deepest_mut();
        layer.state.clip = Some(LayerClip::Mask(name));
        layer.apply_clip();
    }

    /// Draw something whose colours may be partially transparent, which the shading it is
    /// written as can't express. The opacity is then drawn as a gray shading into a mask.
    fn paint_gradient(
        &mut self,
        has_alpha: bool,
        build: impl Fn(&ColorTarget<'_>, Channel) -> Option<Shading>,
    ) {
        if has_alpha {
            self.begin_layer();
            self.mask(MaskKind::Luminosity, |encoder| {
                let shading = build(&encoder.target(), Channel::Alpha);

                if let Some(shading) = shading {
                    encoder.paint_shading(shading);
                }
            });
        }

        let shading = build(&self.target(), Channel::Color);

        if let Some(shading) = shading {
            self.paint_shading(shading);
        }

        if has_alpha {
            self.end_layer();
        }
    }

    fn paint_shading(&mut self, shading: Shading) {
        let index = self.resources.shadings.insert(shading);
        let name = self.resources.shadings.name(index);

        let layer = self.root.deepest_mut();
        let composite = ExtGState::composite(layer.state.opacity, layer.state.blend_mode);
        layer.set_ext_g_state(&mut self.resources.ext_g_states, composite);

        let content = &mut layer.content;
        content.save_state();
        content.transform(coeffs(layer.state.transform));
        content.shading(Name(name.as_bytes()));
        content.restore_state();
    }
}

impl Device for PageEncoder {
    fn concatenate(&mut self, transform: Affine) {
        let state = &mut self.current().state;
        state.transform *= transform;
    }

    fn save_state(&mut self) {
        self.current().save();
    }

    fn restore_state(&mut self) {
        if !self.current().restore() {
            warn!("tried to restore a state that was never saved");
        }
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.current().state.opacity = opacity.clamp(0.0, 1.0);
    }

    fn set_blend_mode(&mut self, blend_mode: BlendMode) {
        self.current().state.blend_mode = blend_mode;
    }

    fn begin_layer(&mut self) {
        let current = self.current();
        let composite = ExtGState::composite(current.state.opacity, current.state.blend_mode);

        current.child = Some(Box::new(Layer::new(
            current.state.transform,
            current.gray,
            composite,
        )));
    }

    fn end_layer(&mut self) {
        let Some(layer) = self.root.pop_deepest() else {
            warn!("tried to end a layer, but no layer is open");

            return;
        };

        let composite = layer.composite;
        let index = self.resources.forms.insert(Form {
            content: layer.finish(),
            bbox: rect_bits(self.bbox),
        });
        let name = self.resources.forms.name(index);

        let parent = self.root.deepest_mut();
        parent.set_ext_g_state(&mut self.resources.ext_g_states, composite);
        parent.content.x_object(Name(name.as_bytes()));
    }

    fn clip(&mut self, path: &BezPath, fill_rule: FillRule) {
        let layer = self.current();
        let path = layer.state.transform * path.clone();

        layer.state.clip = Some(LayerClip::Path(path, fill_rule));
        layer.apply_clip();
    }

    fn clip_to_drawing(&mut self, kind: MaskKind, drawing: &mut dyn FnMut(&mut dyn Device)) {
        self.mask(kind, |encoder| drawing(encoder));
    }

    fn draw(&mut self, path: &BezPath, fill_rule: FillRule, paint: &Paint) {
        let (value, alpha) = self.paint_value(paint);

        let layer = self.root.deepest_mut();
        let composite = ExtGState::composite(layer.state.opacity * alpha, layer.state.blend_mode);
        layer.set_ext_g_state(&mut self.resources.ext_g_states, composite);
        layer.style.set_paint(&mut layer.content, false, value);

        write_path(&mut layer.content, path, layer.state.transform);

        match fill_rule {
            FillRule::NonZero => layer.content.fill_nonzero(),
            FillRule::EvenOdd => layer.content.fill_even_odd(),
        };
    }

    fn stroke(&mut self, path: &BezPath, stroke_props: &StrokeProps, paint: &Paint) {
        let (value, alpha) = self.paint_value(paint);

        let layer = self.root.deepest_mut();
        let composite = ExtGState::composite(layer.state.opacity * alpha, layer.state.blend_mode);
        layer.set_ext_g_state(&mut self.resources.ext_g_states, composite);
        layer.style.set_paint(&mut layer.content, true, value);

        let content = &mut layer.content;
        content.save_state();
        content.transform(coeffs(layer.state.transform));
        content.set_line_width(stroke_props.line_width);
        content.set_line_cap(match stroke_props.line_cap {
            Cap::Butt => LineCapStyle::ButtCap,
            Cap::Round => LineCapStyle::RoundCap,
            Cap::Square => LineCapStyle::ProjectingSquareCap,
        });
        content.set_line_join(match stroke_props.line_join {
            Join::Miter => LineJoinStyle::MiterJoin,
            Join::Round => LineJoinStyle::RoundJoin,
            Join::Bevel => LineJoinStyle::BevelJoin,
        });
        content.set_miter_limit(stroke_props.miter_limit);

        if !stroke_props.dash_array.is_empty() {
            content.set_dash_pattern(
                stroke_props.dash_array.iter().copied(),
                stroke_props.dash_offset,
            );
        }

        write_path(content, path, Affine::IDENTITY);
        content.stroke();
        content.restore_state();
    }

    fn draw_linear_gradient(&mut self, gradient: &LinearGradient) {
        let stops = normalize_stops(&gradient.stops);

        if stops.is_empty() {
            return;
        }

        self.paint_gradient(stops_have_alpha(&stops), |target, channel| {
            Some(shading::linear(gradient, &stops, target, channel))
        });
    }

    fn draw_radial_gradient(&mut self, gradient: &RadialGradient) {
        let stops = normalize_stops(&gradient.stops);

        if stops.is_empty() {
            return;
        }

        self.paint_gradient(stops_have_alpha(&stops), |target, channel| {
            Some(shading::radial(gradient, &stops, target, channel))
        });
    }

    fn draw_mesh_gradient(&mut self, mesh: &MeshGradient) {
        if mesh.patches.is_empty() {
            return;
        }

        self.paint_gradient(mesh_has_alpha(mesh), |target, channel| {
            shading::mesh(mesh, target, channel)
        });
    }

    fn draw_image(&mut self, image: &RgbaImage) {
        let expected = image.width as usize * image.height as usize * 4;

        if expected == 0 || image.data.len() != expected {
            warn!("image of size {}x{} has invalid data", image.width, image.height);

            return;
        }

        let index = self.resources.images.insert(Image {
            data: image.data.clone(),
            width: image.width,
            height: image.height,
            interpolate: image.interpolate,
        });
        let name = self.resources.images.name(index);

        let layer = self.root.deepest_mut();
        let composite = ExtGState::composite(layer.state.opacity, layer.state.blend_mode);
        layer.set_ext_g_state(&mut self.resources.ext_g_states, composite);

        let content = &mut layer.content;
        content.save_state();
        content.transform(coeffs(layer.state.transform));
        content.x_object(Name(name.as_bytes()));
        content.restore_state();
    }
}

impl Debug for PageEncoder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageEncoder")
            .field("media_box", &self.media_box)
            .field("color_space", &self.color_space)
            .field("layer_depth", &self.layer_depth())
            .finish_non_exhaustive()
    }
}

/// A page whose content stream is finished.
pub(crate) struct EncodedPage {
    pub(crate) media_box: Rect,
    pub(crate) bleed_box: Rect,
    pub(crate) trim_box: Rect,
    pub(crate) art_box: Rect,
    pub(crate) color_space: Option<PageColorSpace>,
    pub(crate) content: Vec<u8>,
    pub(crate) resources: ResourceTables,
}

fn coeffs(transform: Affine) -> [f32; 6] {
    transform.as_coeffs().map(|c| c as f32)
}

fn rect_bits(rect: Rect) -> [Bits; 4] {
    bits([rect.x0, rect.y0, rect.x1, rect.y1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_interpret::color::{AlphaColor, Color};
    use folio_interpret::{GradientStop, MeshPatch};
    use kurbo::{Point, Shape};

    fn page() -> PageEncoder {
        PageEncoder::new(Rect::new(0.0, 0.0, 100.0, 100.0), ColorSpace::device_rgb())
    }

    fn content(page: PageEncoder) -> String {
        String::from_utf8(page.finish().content).unwrap()
    }

    fn red() -> Paint {
        Paint::Color(Color::rgb(1.0, 0.0, 0.0))
    }

    fn square() -> BezPath {
        Rect::new(0.0, 0.0, 1.0, 1.0).to_path(0.1)
    }

    fn gradient(alpha: f32) -> LinearGradient {
        LinearGradient {
            start: Point::new(0.0, 0.0),
            end: Point::new(10.0, 0.0),
            stops: vec![
                GradientStop {
                    offset: 0.0,
                    color: AlphaColor::BLACK,
                },
                GradientStop {
                    offset: 1.0,
                    color: AlphaColor::WHITE.with_alpha(alpha),
                },
            ],
            extend: [true, true],
        }
    }

    #[test]
    fn fill_red_square() {
        let mut page = page();
        page.draw(&square(), FillRule::NonZero, &red());

        let out = content(page);
        assert!(out.contains("/Cs1 cs\n1 0 0 sc\n0 0 1 1 re\nf"));
        assert!(!out.contains("gs"));
    }

    #[test]
    fn transforms_are_applied_to_fills() {
        let mut page = page();
        page.concatenate(Affine::scale(2.0));
        page.draw(&square(), FillRule::EvenOdd, &red());

        assert!(content(page).contains("0 0 2 2 re\nf*"));
    }

    #[test]
    fn opacity_uses_ext_g_states() {
        let mut page = page();
        page.set_opacity(0.5);
        page.draw(&square(), FillRule::NonZero, &red());
        page.set_opacity(1.0);
        page.draw(&square(), FillRule::NonZero, &red());

        let resources = &page.resources;
        assert_eq!(resources.ext_g_states.len(), 2);

        let out = content(page);
        assert!(out.contains("/Gs1 gs"));
        assert!(out.contains("/Gs2 gs"));
    }

    #[test]
    fn nested_layers() {
        let mut page = page();
        page.begin_layer();
        page.begin_layer();
        assert_eq!(page.layer_depth(), 2);

        page.draw(&square(), FillRule::NonZero, &red());
        page.end_layer();
        assert_eq!(page.layer_depth(), 1);
        page.end_layer();
        assert_eq!(page.layer_depth(), 0);
        assert_eq!(page.resources.forms.len(), 2);

        // Unmatched, so nothing happens.
        page.end_layer();
        assert_eq!(page.layer_depth(), 0);

        assert_eq!(content(page).matches("Do").count(), 1);
    }

    #[test]
    fn open_layers_are_closed() {
        let mut page = page();
        page.begin_layer();
        page.draw(&square(), FillRule::NonZero, &red());

        let encoded = page.finish();
        assert_eq!(encoded.resources.forms.len(), 1);
    }

    #[test]
    fn clips_are_replaced() {
        let mut page = page();
        page.save_state();
        page.clip(&square(), FillRule::NonZero);
        page.clip(&Rect::new(0.0, 0.0, 2.0, 2.0).to_path(0.1), FillRule::NonZero);
        page.restore_state();

        let out = content(page);
        assert_eq!(out.matches("W\nn").count(), 2);
        assert_eq!(out.matches("Q\nq").count(), 3);
    }

    #[test]
    fn masks_become_clips() {
        let mut page = page();
        page.clip_to_drawing(MaskKind::Alpha, &mut |device: &mut dyn Device| {
            device.draw(&square(), FillRule::NonZero, &red());
        });

        assert_eq!(page.layer_depth(), 0);
        assert_eq!(page.resources.masks.len(), 1);

        let mask = &page.resources.masks.iter().next().unwrap().1.content;
        // Mask content is gray.
        assert!(String::from_utf8_lossy(mask).contains("/DeviceGray cs"));
        assert!(content(page).contains("/Gs1 gs"));
    }

    #[test]
    fn equal_shadings_are_deduplicated() {
        let mut page = page();
        page.draw_linear_gradient(&gradient(1.0));
        page.draw_linear_gradient(&gradient(1.0));

        assert_eq!(page.resources.shadings.len(), 1);
        assert_eq!(content(page).matches("/Sh1 sh").count(), 2);
    }

    #[test]
    fn transparent_gradients_use_a_mask() {
        let mut page = page();
        page.draw_linear_gradient(&gradient(0.5));

        assert_eq!(page.resources.shadings.len(), 2);
        assert_eq!(page.resources.masks.len(), 1);
        assert_eq!(page.resources.forms.len(), 1);
        assert_eq!(page.layer_depth(), 0);
    }

    #[test]
    fn meshes() {
        let mut points = [Point::ZERO; 12];

        for (i, point) in points.iter_mut().enumerate() {
            *point = Point::new(i as f64, (i % 3) as f64);
        }

        let mut page = page();
        page.draw_mesh_gradient(&MeshGradient {
            patches: vec![MeshPatch {
                points,
                interior: None,
                colors: [AlphaColor::BLACK; 4],
            }],
        });
        page.draw_mesh_gradient(&MeshGradient::default());

        assert_eq!(page.resources.shadings.len(), 1);
        assert!(matches!(
            page.resources.shadings.iter().next().unwrap().1,
            Shading::Mesh { tensor: false, .. }
        ));
    }

    #[test]
    fn images() {
        let mut page = page();
        let image = RgbaImage {
            data: vec![255; 2 * 2 * 4].into(),
            width: 2,
            height: 2,
            interpolate: false,
        };

        page.draw_image(&image);
        page.draw_image(&image);
        page.draw_image(&RgbaImage {
            data: vec![0; 3].into(),
            ..image
        });

        assert_eq!(page.resources.images.len(), 1);
        assert_eq!(content(page).matches("/Im1 Do").count(), 2);
    }
}
