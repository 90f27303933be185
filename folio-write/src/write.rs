//! Serializing finished pages into a document.

use crate::color::PageColorSpace;
use crate::page::EncodedPage;
use crate::resources::{Bits, ExtGState, Image, ResourceTables, Shading};
use crate::shading::{BITS_PER_COMPONENT, BITS_PER_COORDINATE, BITS_PER_FLAG};
use crate::{EncodeError, EncoderSettings};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use folio_interpret::{BlendMode, MaskKind};
use kurbo::Rect;
use log::warn;
use pdf_writer::types::{FunctionShadingType, MaskType, PaintType, TilingType};
use pdf_writer::writers::{ColorSpace, ExtGraphicsState, Resources, StreamShadingType};
use pdf_writer::{Filter, Finish, Name, Pdf, Ref, TextStr};
use smallvec::SmallVec;
use std::borrow::Cow;
use std::io::Write;

const COMPRESSION_LEVEL: u32 = 6;

/// Write a complete document with the given pages.
pub(crate) fn write_document(
    settings: &EncoderSettings,
    pages: &[EncodedPage],
) -> Result<Vec<u8>, EncodeError> {
    if pages.is_empty() {
        return Err(EncodeError::Empty);
    }

    for page in pages {
        check_boxes(page)?;

        if page.color_space.is_none() {
            return Err(EncodeError::UnsupportedColorSpace);
        }
    }

    let mut writer = DocumentWriter {
        pdf: Pdf::new(),
        next_ref: Ref::new(1),
        compress: settings.compress,
    };
    writer.pdf.set_version(1, 3);

    let catalog_ref = writer.bump();
    let tree_ref = writer.bump();

    let page_refs = pages
        .iter()
        .map(|page| writer.write_page(page, tree_ref))
        .collect::<Result<Vec<_>, _>>()?;

    writer.pdf.catalog(catalog_ref).pages(tree_ref);
    writer
        .pdf
        .pages(tree_ref)
        .kids(page_refs.iter().copied())
        .count(page_refs.len() as i32);

    let info_ref = writer.bump();
    let mut info = writer.pdf.document_info(info_ref);
    info.producer(TextStr(&settings.producer));

    if let Some(date) = settings.creation_date {
        info.creation_date(date);
    }

    if let Some(date) = settings.modification_date {
        info.modified_date(date);
    }

    info.finish();

    Ok(writer.pdf.finish())
}

fn check_boxes(page: &EncodedPage) -> Result<(), EncodeError> {
    let valid = |rect: Rect| {
        [rect.x0, rect.y0, rect.x1, rect.y1]
            .iter()
            .all(|v| v.is_finite())
    };

    let media_box = page.media_box;

    if !valid(media_box) || media_box.width() <= 0.0 || media_box.height() <= 0.0 {
        return Err(EncodeError::InvalidPageBox);
    }

    if ![page.bleed_box, page.trim_box, page.art_box]
        .into_iter()
        .all(valid)
    {
        return Err(EncodeError::InvalidPageBox);
    }

    Ok(())
}

struct DocumentWriter {
    pdf: Pdf,
    next_ref: Ref,
    compress: bool,
}

impl DocumentWriter {
    fn bump(&mut self) -> Ref {
        self.next_ref.bump()
    }

    /// Compress a stream if that is enabled. If compression fails, the data is written as is.
    fn encode<'a>(&self, data: &'a [u8]) -> (Cow<'a, [u8]>, Option<Filter>) {
        if self.compress
            && let Some(compressed) = deflate(data)
        {
            return (Cow::Owned(compressed), Some(Filter::FlateDecode));
        }

        (Cow::Borrowed(data), None)
    }

    fn write_page(&mut self, page: &EncodedPage, tree_ref: Ref) -> Result<Ref, EncodeError> {
        let color_space = page
            .color_space
            .as_ref()
            .ok_or(EncodeError::UnsupportedColorSpace)?;
        let resources = &page.resources;
        let resources_ref = self.bump();

        let icc_ref = match color_space {
            PageColorSpace::Icc { data, components } => {
                let icc_ref = self.bump();
                let (data, filter) = self.encode(data);
                let mut profile = self.pdf.icc_profile(icc_ref, &data);
                profile.n(*components as i32);

                if let Some(filter) = filter {
                    profile.filter(filter);
                }

                Some(icc_ref)
            }
            _ => None,
        };
        let page_space = PageSpace {
            color_space,
            icc_ref,
        };

        let shading_refs = resources
            .shadings
            .iter()
            .map(|(_, shading)| self.write_shading(shading, &page_space))
            .collect::<Vec<_>>();

        let mask_refs = resources
            .masks
            .iter()
            .map(|(_, mask)| {
                let mask_ref = self.bump();
                let (data, filter) = self.encode(&mask.content);
                let mut form = self.pdf.form_xobject(mask_ref, &data);
                form.bbox(pdf_rect(mask.bbox));
                form.pair(Name(b"Resources"), resources_ref);
                form.group().transparency().color_space().device_gray();

                if let Some(filter) = filter {
                    form.filter(filter);
                }

                mask_ref
            })
            .collect::<Vec<_>>();

        let form_refs = resources
            .forms
            .iter()
            .map(|(_, layer)| {
                let form_ref = self.bump();
                let (data, filter) = self.encode(&layer.content);
                let mut form = self.pdf.form_xobject(form_ref, &data);
                form.bbox(pdf_rect(layer.bbox));
                form.matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
                form.pair(Name(b"Resources"), resources_ref);
                form.group()
                    .transparency()
                    .isolated(true)
                    .knockout(false);

                if let Some(filter) = filter {
                    form.filter(filter);
                }

                form_ref
            })
            .collect::<Vec<_>>();

        let pattern_refs = resources
            .patterns
            .iter()
            .map(|(_, cell)| {
                let pattern_ref = self.bump();
                let (data, filter) = self.encode(&cell.content);
                let mut pattern = self.pdf.tiling_pattern(pattern_ref, &data);
                pattern
                    .tiling_type(TilingType::FastConstantSpacing)
                    .paint_type(PaintType::Colored)
                    .bbox(pdf_rect(cell.bbox))
                    .x_step(cell.x_step.0)
                    .y_step(cell.y_step.0)
                    .matrix(cell.matrix.map(|b| b.0));
                pattern.pair(Name(b"Resources"), resources_ref);

                if let Some(filter) = filter {
                    pattern.filter(filter);
                }

                pattern_ref
            })
            .collect::<Vec<_>>();

        let image_refs = resources
            .images
            .iter()
            .map(|(_, image)| self.write_image(image))
            .collect::<Vec<_>>();

        let mut dict = self.pdf.indirect(resources_ref).start::<Resources<'_>>();
        page_space.write(
            dict.color_spaces()
                .insert(Name(crate::layer::PAGE_COLOR_SPACE))
                .start::<ColorSpace<'_>>(),
            false,
        );
        write_ext_g_states(&mut dict, resources, &mask_refs);

        let mut x_objects = dict.x_objects();
        let named = resources
            .forms
            .iter()
            .map(|(name, _)| name)
            .zip(form_refs)
            .chain(resources.images.iter().map(|(name, _)| name).zip(image_refs));

        for (name, object_ref) in named {
            x_objects.pair(Name(name.as_bytes()), object_ref);
        }

        x_objects.finish();

        let mut shadings = dict.shadings();
        for ((name, _), shading_ref) in resources.shadings.iter().zip(shading_refs) {
            shadings.pair(Name(name.as_bytes()), shading_ref);
        }
        shadings.finish();

        let mut patterns = dict.patterns();
        for ((name, _), pattern_ref) in resources.patterns.iter().zip(pattern_refs) {
            patterns.pair(Name(name.as_bytes()), pattern_ref);
        }
        patterns.finish();
        dict.finish();

        let content_ref = self.bump();
        let (data, filter) = self.encode(&page.content);
        let mut stream = self.pdf.stream(content_ref, &data);

        if let Some(filter) = filter {
            stream.filter(filter);
        }

        stream.finish();

        let page_ref = self.bump();
        let media_box = rect_to_pdf(page.media_box);
        let mut writer = self.pdf.page(page_ref);
        writer
            .media_box(media_box)
            .parent(tree_ref)
            .contents(content_ref)
            .pair(Name(b"Resources"), resources_ref);

        if page.bleed_box != page.media_box {
            writer.bleed_box(rect_to_pdf(page.bleed_box));
        }

        if page.trim_box != page.media_box {
            writer.trim_box(rect_to_pdf(page.trim_box));
        }

        if page.art_box != page.media_box {
            writer.art_box(rect_to_pdf(page.art_box));
        }

        writer.finish();

        Ok(page_ref)
    }

    fn write_shading(&mut self, shading: &Shading, page_space: &PageSpace<'_>) -> Ref {
        match shading {
            Shading::Function {
                axial,
                coords,
                stops,
                extend,
                gray,
            } => {
                let function_ref = self.write_stops(stops);
                let shading_ref = self.bump();
                let mut writer = self.pdf.function_shading(shading_ref);
                writer.shading_type(if *axial {
                    FunctionShadingType::Axial
                } else {
                    FunctionShadingType::Radial
                });
                page_space.write(writer.color_space(), *gray);
                writer
                    .function(function_ref)
                    .coords(coords.iter().map(|c| c.0))
                    .extend(*extend);

                shading_ref
            }
            Shading::Mesh {
                tensor,
                data,
                decode,
                gray,
            } => {
                let shading_ref = self.bump();
                let (data, filter) = self.encode(data);
                let mut writer = self.pdf.stream_shading(shading_ref, &data);
                writer.shading_type(if *tensor {
                    StreamShadingType::TensorProductPatch
                } else {
                    StreamShadingType::CoonsPatch
                });
                page_space.write(writer.color_space(), *gray);
                writer
                    .bits_per_coordinate(i32::from(BITS_PER_COORDINATE))
                    .bits_per_component(i32::from(BITS_PER_COMPONENT))
                    .bits_per_flag(i32::from(BITS_PER_FLAG))
                    .decode(decode.iter().map(|d| d.0));

                if let Some(filter) = filter {
                    writer.filter(filter);
                }

                shading_ref
            }
        }
    }

    /// Write a stitching function that interpolates linearly between the given stops.
    fn write_stops(&mut self, stops: &[(Bits, SmallVec<[Bits; 4]>)]) -> Ref {
        let values = |i: usize| stops[i].1.iter().map(|c| c.0);

        if stops.len() < 2 {
            let function_ref = self.bump();
            let first = stops.first().map(|s| s.1.clone()).unwrap_or_default();
            self.pdf
                .exponential_function(function_ref)
                .domain([0.0, 1.0])
                .c0(first.iter().map(|c| c.0))
                .c1(first.iter().map(|c| c.0))
                .n(1.0);

            return function_ref;
        }

        let segments = (0..stops.len() - 1)
            .map(|i| {
                let segment_ref = self.bump();
                self.pdf
                    .exponential_function(segment_ref)
                    .domain([0.0, 1.0])
                    .c0(values(i))
                    .c1(values(i + 1))
                    .n(1.0);

                segment_ref
            })
            .collect::<Vec<_>>();

        let function_ref = self.bump();
        let inner = &stops[1..stops.len() - 1];
        self.pdf
            .stitching_function(function_ref)
            .domain([0.0, 1.0])
            .functions(segments.iter().copied())
            .bounds(inner.iter().map(|s| s.0.0))
            .encode(segments.iter().flat_map(|_| [0.0, 1.0]));

        function_ref
    }

    fn write_image(&mut self, image: &Image) -> Ref {
        let pixels = image.data.chunks_exact(4);
        let has_alpha = pixels.clone().any(|px| px[3] != 255);

        let s_mask_ref = has_alpha.then(|| {
            let alpha = pixels.clone().map(|px| px[3]).collect::<Vec<_>>();
            let s_mask_ref = self.bump();
            let (data, filter) = self.encode(&alpha);
            let mut s_mask = self.pdf.image_xobject(s_mask_ref, &data);
            s_mask
                .width(image.width as i32)
                .height(image.height as i32)
                .bits_per_component(8)
                .interpolate(image.interpolate);
            s_mask.color_space().device_gray();

            if let Some(filter) = filter {
                s_mask.filter(filter);
            }

            s_mask_ref
        });

        let rgb = pixels
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect::<Vec<_>>();
        let image_ref = self.bump();
        let (data, filter) = self.encode(&rgb);
        let mut writer = self.pdf.image_xobject(image_ref, &data);
        writer
            .width(image.width as i32)
            .height(image.height as i32)
            .bits_per_component(8)
            .interpolate(image.interpolate);
        writer.color_space().device_rgb();

        if let Some(s_mask_ref) = s_mask_ref {
            writer.s_mask(s_mask_ref);
        }

        if let Some(filter) = filter {
            writer.filter(filter);
        }

        image_ref
    }
}

/// The colour space of a page, once its profile has been written.
struct PageSpace<'a> {
    color_space: &'a PageColorSpace,
    icc_ref: Option<Ref>,
}

impl PageSpace<'_> {
    fn write(&self, writer: ColorSpace<'_>, gray: bool) {
        if gray {
            writer.device_gray();

            return;
        }

        match (self.color_space, self.icc_ref) {
            (PageColorSpace::Gray, _) => writer.device_gray(),
            (PageColorSpace::Cmyk, _) => writer.device_cmyk(),
            (PageColorSpace::Icc { .. }, Some(icc_ref)) => writer.icc_based(icc_ref),
            _ => writer.device_rgb(),
        }
    }
}

fn write_ext_g_states(dict: &mut Resources<'_>, resources: &ResourceTables, mask_refs: &[Ref]) {
    let mut states = dict.ext_g_states();

    for (name, state) in resources.ext_g_states.iter() {
        let mut writer = states
            .insert(Name(name.as_bytes()))
            .start::<ExtGraphicsState<'_>>();

        match state {
            ExtGState::Composite { alpha, blend_mode } => {
                writer
                    .non_stroking_alpha(alpha.0)
                    .stroking_alpha(alpha.0)
                    .blend_mode(convert_blend_mode(*blend_mode));
            }
            ExtGState::SoftMask { mask, kind } => match mask_refs.get(*mask) {
                Some(mask_ref) => {
                    writer
                        .soft_mask()
                        .subtype(convert_mask_kind(*kind))
                        .group(*mask_ref);
                }
                None => warn!("soft mask {mask} doesn't exist"),
            },
        }
    }
}

fn deflate(data: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(COMPRESSION_LEVEL));
    encoder.write_all(data).ok()?;

    encoder.finish().ok()
}

fn rect_to_pdf(rect: Rect) -> pdf_writer::Rect {
    pdf_writer::Rect::new(
        rect.x0 as f32,
        rect.y0 as f32,
        rect.x1 as f32,
        rect.y1 as f32,
    )
}

fn pdf_rect([x0, y0, x1, y1]: [Bits; 4]) -> pdf_writer::Rect {
    pdf_writer::Rect::new(x0.0, y0.0, x1.0, y1.0)
}

fn convert_mask_kind(kind: MaskKind) -> MaskType {
    match kind {
        MaskKind::Luminosity => MaskType::Luminosity,
        MaskKind::Alpha => MaskType::Alpha,
    }
}

fn convert_blend_mode(blend_mode: BlendMode) -> pdf_writer::types::BlendMode {
    use pdf_writer::types::BlendMode as Mode;

    match blend_mode {
        BlendMode::Normal => Mode::Normal,
        BlendMode::Multiply => Mode::Multiply,
        BlendMode::Screen => Mode::Screen,
        BlendMode::Overlay => Mode::Overlay,
        BlendMode::Darken => Mode::Darken,
        BlendMode::Lighten => Mode::Lighten,
        BlendMode::ColorDodge => Mode::ColorDodge,
        BlendMode::ColorBurn => Mode::ColorBurn,
        BlendMode::HardLight => Mode::HardLight,
        BlendMode::SoftLight => Mode::SoftLight,
        BlendMode::Difference => Mode::Difference,
        BlendMode::Exclusion => Mode::Exclusion,
        BlendMode::Hue => Mode::Hue,
        BlendMode::Saturation => Mode::Saturation,
        BlendMode::Color => Mode::Color,
        BlendMode::Luminosity => Mode::Luminosity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deflate_round_trip() {
        use flate2::read::ZlibDecoder;
        use std::io::Read;

        let data = b"q 0 0 1 1 re f Q".repeat(20);
        let compressed = deflate(&data).unwrap();
        assert!(compressed.len() < data.len());

        let mut decompressed = vec![];
        ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut decompressed)
            .unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn blend_modes_keep_their_name() {
        assert_eq!(
            convert_blend_mode(BlendMode::ColorDodge),
            pdf_writer::types::BlendMode::ColorDodge
        );
    }
}
