use crate::RgbaImage;
use crate::color::{AlphaColor, ColorSpace};
use folio_common::bit::BitReader;
use folio_syntax::object::keys::*;
use folio_syntax::object::{Array, Stream};
use log::warn;
use smallvec::SmallVec;
use std::sync::Arc;

// Images with more pixels than this are rejected.
const MAX_PIXELS: u64 = 1 << 28;

/// The samples of an image, with colours already applied, except for stencil masks, which
/// are painted with the current fill colour.
#[derive(Clone, Debug)]
pub(crate) enum DecodedImage {
    Color(RgbaImage),
    Stencil {
        coverage: Arc<[u8]>,
        width: u32,
        height: u32,
        interpolate: bool,
    },
}

impl DecodedImage {
    /// Turn the image into RGBA, using `fill` for stencil masks.
    pub(crate) fn into_rgba(self, fill: AlphaColor) -> RgbaImage {
        match self {
            Self::Color(image) => image,
            Self::Stencil {
                coverage,
                width,
                height,
                interpolate,
            } => {
                // The opacity of the fill is applied when drawing.
                let [r, g, b, _] = fill.to_rgba8();
                let data = coverage
                    .iter()
                    .flat_map(|c| [r, g, b, *c])
                    .collect::<Vec<_>>();

                RgbaImage {
                    data: Arc::from(data),
                    width,
                    height,
                    interpolate,
                }
            }
        }
    }
}

/// The reasons why decoding an image can fail.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ImageError {
    UnsupportedFilter,
    Malformed,
}

/// Decode an image XObject or inline image. `color_space` is the resolved `ColorSpace`
/// entry, unused for stencil masks.
pub(crate) fn decode(
    stream: &Stream,
    color_space: Option<ColorSpace>,
) -> Result<DecodedImage, ImageError> {
    let dict = stream.dict();

    if let Some(filter) = stream.filters().into_iter().find(|f| !f.is_supported()) {
        warn!("image uses the unsupported filter {filter:?}");

        return Err(ImageError::UnsupportedFilter);
    }

    let (width, height) = dimensions(stream).ok_or(ImageError::Malformed)?;
    let interpolate = dict.get::<bool>(INTERPOLATE).unwrap_or(false);
    let data = stream.decoded().ok_or_else(|| {
        warn!("failed to decode the data of an image");

        ImageError::Malformed
    })?;

    if dict.get::<bool>(IMAGE_MASK).unwrap_or(false) {
        // Samples that equal the first decode value are painted.
        let painted = match dict.get::<Array>(DECODE).and_then(|a| a.get::<f32>(0)) {
            Some(v) if v >= 0.5 => 1,
            _ => 0,
        };

        let samples = read_samples(&data, width, height, 1, 1).ok_or(ImageError::Malformed)?;
        let coverage = samples
            .iter()
            .map(|s| if *s == painted { 255 } else { 0 })
            .collect::<Vec<u8>>();

        return Ok(DecodedImage::Stencil {
            coverage: Arc::from(coverage),
            width,
            height,
            interpolate,
        });
    }

    let color_space = color_space.ok_or_else(|| {
        warn!("image has no valid colour space");

        ImageError::Malformed
    })?;
    let bpc = dict.get::<u8>(BITS_PER_COMPONENT).unwrap_or(8);

    if !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
        warn!("unsupported bit depth {bpc} of image");

        return Err(ImageError::Malformed);
    }

    let num_components = color_space.num_components();
    let decode = decode_array(dict.get::<Array>(DECODE), &color_space, bpc);
    let samples =
        read_samples(&data, width, height, num_components, bpc).ok_or(ImageError::Malformed)?;
    let max = ((1_u32 << bpc) - 1) as f32;

    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
    let mut components = SmallVec::<[f32; 4]>::new();

    for pixel in samples.chunks_exact(num_components) {
        components.clear();
        components.extend(
            pixel
                .iter()
                .zip(decode.iter())
                .map(|(s, (d_min, d_max))| d_min + *s as f32 * (d_max - d_min) / max),
        );

        rgba.extend(color_space.to_rgba(&components, 1.0).to_rgba8());
    }

    if let Some(mask) = dict.get::<Stream>(SMASK) {
        match decode_alpha(&mask, width, height) {
            Some(alpha) => {
                for (px, a) in rgba.chunks_exact_mut(4).zip(alpha) {
                    px[3] = a;
                }
            }
            None => warn!("failed to decode the soft mask of an image"),
        }
    }

    Ok(DecodedImage::Color(RgbaImage {
        data: Arc::from(rgba),
        width,
        height,
        interpolate,
    }))
}

fn dimensions(stream: &Stream) -> Option<(u32, u32)> {
    let dict = stream.dict();
    let width = dict.get::<u32>(WIDTH)?;
    let height = dict.get::<u32>(HEIGHT)?;

    if width == 0 || height == 0 || width as u64 * height as u64 > MAX_PIXELS {
        warn!("image has invalid dimensions {width}x{height}");

        return None;
    }

    Some((width, height))
}

fn decode_array(array: Option<Array>, color_space: &ColorSpace, bpc: u8) -> Vec<(f32, f32)> {
    let default = color_space.default_decode(bpc);

    let Some(array) = array else {
        return default.to_vec();
    };

    let values = array.iter::<f32>().collect::<Vec<_>>();

    if values.len() != default.len() * 2 {
        warn!("image has a decode array of the wrong length, ignoring it");

        return default.to_vec();
    }

    values.chunks_exact(2).map(|c| (c[0], c[1])).collect()
}

/// Read the samples of an image, whose rows start at byte boundaries.
fn read_samples(
    data: &[u8],
    width: u32,
    height: u32,
    num_components: usize,
    bpc: u8,
) -> Option<Vec<u16>> {
    let per_row = width as usize * num_components;
    let row_bytes = (per_row * bpc as usize).div_ceil(8);

    if data.len() < row_bytes * height as usize {
        warn!(
            "image data is too short, expected {} bytes but got {}",
            row_bytes * height as usize,
            data.len()
        );

        return None;
    }

    let mut samples = Vec::with_capacity(per_row * height as usize);

    for row in data.chunks_exact(row_bytes).take(height as usize) {
        let mut reader = BitReader::new(row);

        for _ in 0..per_row {
            samples.push(reader.read(bpc)? as u16);
        }
    }

    Some(samples)
}

/// Decode a soft mask image into an alpha channel of the given size.
fn decode_alpha(mask: &Stream, width: u32, height: u32) -> Option<Vec<u8>> {
    let decoded = decode(mask, Some(ColorSpace::device_gray())).ok()?;

    let DecodedImage::Color(mask) = decoded else {
        return None;
    };

    if mask.width == width && mask.height == height {
        return Some(mask.data.chunks_exact(4).map(|px| px[0]).collect());
    }

    // Nearest-neighbour resampling.
    let mut alpha = Vec::with_capacity(width as usize * height as usize);

    for y in 0..height as u64 {
        let src_y = y * mask.height as u64 / height as u64;

        for x in 0..width as u64 {
            let src_x = x * mask.width as u64 / width as u64;
            let index = (src_y * mask.width as u64 + src_x) as usize * 4;
            alpha.push(*mask.data.get(index)?);
        }
    }

    Some(alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_syntax::object::Dict;

    fn stream(dict: &[u8], data: &[u8]) -> Stream {
        Stream::new(Dict::from_bytes(dict).unwrap(), data)
    }

    fn pixels(image: &RgbaImage) -> Vec<[u8; 4]> {
        image
            .data
            .chunks_exact(4)
            .map(|px| [px[0], px[1], px[2], px[3]])
            .collect()
    }

    #[test]
    fn rgb_image() {
        let image = stream(
            b"<< /Width 2 /Height 1 /BitsPerComponent 8 >>",
            &[255, 0, 0, 0, 0, 255],
        );
        let DecodedImage::Color(image) = decode(&image, Some(ColorSpace::device_rgb())).unwrap()
        else {
            panic!("expected a colour image");
        };

        assert_eq!(pixels(&image), vec![[255, 0, 0, 255], [0, 0, 255, 255]]);
        assert!(!image.has_alpha());
    }

    #[test]
    fn one_bit_rows_are_padded() {
        // Each row of 3 pixels takes one byte.
        let image = stream(
            b"<< /Width 3 /Height 2 /BitsPerComponent 1 >>",
            &[0b1010_0000, 0b0100_0000],
        );
        let DecodedImage::Color(image) = decode(&image, Some(ColorSpace::device_gray())).unwrap()
        else {
            panic!("expected a colour image");
        };

        let gray = pixels(&image).iter().map(|px| px[0]).collect::<Vec<_>>();
        assert_eq!(gray, vec![255, 0, 255, 0, 255, 0]);
    }

    #[test]
    fn inverted_decode() {
        let image = stream(
            b"<< /Width 1 /Height 1 /BitsPerComponent 8 /Decode [1 0] >>",
            &[255],
        );
        let DecodedImage::Color(image) = decode(&image, Some(ColorSpace::device_gray())).unwrap()
        else {
            panic!("expected a colour image");
        };

        assert_eq!(pixels(&image), vec![[0, 0, 0, 255]]);
    }

    #[test]
    fn stencil_mask() {
        let image = stream(b"<< /Width 2 /Height 1 /ImageMask true >>", &[0b0100_0000]);
        let decoded = decode(&image, None).unwrap();
        let image = decoded.into_rgba(AlphaColor::new([1.0, 0.0, 0.0, 0.5]));

        assert_eq!(pixels(&image), vec![[255, 0, 0, 255], [255, 0, 0, 0]]);
    }

    #[test]
    fn soft_mask_alpha() {
        let image = Stream::new(
            Dict::from_bytes(b"<< /Width 2 /Height 1 /BitsPerComponent 8 >>").unwrap(),
            &[0, 0],
        );
        let mask = stream(b"<< /Width 1 /Height 1 /BitsPerComponent 8 >>", &[128]);
        let alpha = decode_alpha(&mask, 2, 1).unwrap();
        assert_eq!(alpha, vec![128, 128]);

        assert!(decode(&image, Some(ColorSpace::device_gray())).is_ok());
    }

    #[test]
    fn short_data_fails() {
        let image = stream(b"<< /Width 4 /Height 4 /BitsPerComponent 8 >>", &[0; 3]);
        assert_eq!(
            decode(&image, Some(ColorSpace::device_gray())).err(),
            Some(ImageError::Malformed)
        );

        let jpeg = stream(b"<< /Width 1 /Height 1 /Filter /DCTDecode >>", &[0]);
        assert_eq!(
            decode(&jpeg, Some(ColorSpace::device_rgb())).err(),
            Some(ImageError::UnsupportedFilter)
        );
    }
}
