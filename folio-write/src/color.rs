//! Converting colours into the colour space of a page.

use folio_interpret::color::{
    AlphaColor, Color, ColorComponents, ColorSpace, ColorSpaceKind, rgb_to_cmyk,
};
use smallvec::{SmallVec, smallvec};

/// The colour space that the content of a page is encoded in.
#[derive(Debug, Clone)]
pub(crate) enum PageColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Icc { data: Vec<u8>, components: usize },
}

impl PageColorSpace {
    /// Returns `None` for colour spaces that can't serve as the colour space of a page.
    pub(crate) fn new(color_space: &ColorSpace) -> Option<Self> {
        match color_space.kind() {
            ColorSpaceKind::DeviceGray => Some(Self::Gray),
            ColorSpaceKind::DeviceRgb => Some(Self::Rgb),
            ColorSpaceKind::DeviceCmyk => Some(Self::Cmyk),
            ColorSpaceKind::IccBased(icc) => Some(Self::Icc {
                data: icc.data().to_vec(),
                components: icc.num_components(),
            }),
            _ => None,
        }
    }

    fn num_components(&self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
            Self::Icc { components, .. } => *components,
        }
    }

    /// Convert an sRGB colour, ignoring its alpha.
    pub(crate) fn convert_rgba(&self, color: AlphaColor) -> ColorComponents {
        let [r, g, b, _] = color.components();

        match self.num_components() {
            1 => smallvec![color.luminance()],
            4 => SmallVec::from_slice(&rgb_to_cmyk([r, g, b])),
            _ => smallvec![r, g, b],
        }
    }
}

/// Where a colour ends up.
#[derive(Debug, Clone)]
pub(crate) struct ColorTarget<'a> {
    /// The colour space of the page, with the original colour space it was created from.
    pub(crate) page: Option<(&'a PageColorSpace, &'a ColorSpace)>,
    /// Whether the colour is drawn into a mask, whose group is always DeviceGray.
    pub(crate) gray: bool,
}

impl ColorTarget<'_> {
    /// Convert a colour, keeping its components if it already is in the target space.
    pub(crate) fn convert(&self, color: &Color) -> ColorComponents {
        if self.gray {
            if *color.color_space() == ColorSpace::device_gray() {
                return SmallVec::from_slice(color.components());
            }

            return smallvec![color.to_rgba().luminance()];
        }

        match self.page {
            Some((_, original)) if original == color.color_space() => {
                SmallVec::from_slice(color.components())
            }
            _ => self.convert_rgba(color.to_rgba()),
        }
    }

    /// Convert an sRGB colour, ignoring its alpha.
    pub(crate) fn convert_rgba(&self, color: AlphaColor) -> ColorComponents {
        if self.gray {
            return smallvec![color.luminance()];
        }

        match self.page {
            Some((page, _)) => page.convert_rgba(color),
            None => PageColorSpace::Rgb.convert_rgba(color),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_spaces() {
        let red = AlphaColor::new([1.0, 0.0, 0.0, 1.0]);

        assert_eq!(PageColorSpace::Rgb.convert_rgba(red).as_slice(), &[1.0, 0.0, 0.0]);
        assert_eq!(
            PageColorSpace::Cmyk.convert_rgba(red).as_slice(),
            &[0.0, 1.0, 1.0, 0.0]
        );
        assert_eq!(PageColorSpace::Gray.convert_rgba(AlphaColor::BLACK).as_slice(), &[0.0]);
    }

    #[test]
    fn matching_spaces_keep_their_components() {
        let cmyk = ColorSpace::device_cmyk();
        let page = PageColorSpace::new(&cmyk).unwrap();
        let target = ColorTarget {
            page: Some((&page, &cmyk)),
            gray: false,
        };
        let color = Color::new(cmyk.clone(), smallvec![0.1, 0.2, 0.3, 0.4], 1.0);

        assert_eq!(target.convert(&color).as_slice(), &[0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn masks_are_gray() {
        let target = ColorTarget {
            page: None,
            gray: true,
        };

        assert_eq!(target.convert(&Color::rgb(0.0, 0.0, 0.0)).as_slice(), &[0.0]);
    }

    #[test]
    fn unsupported_page_spaces() {
        assert!(PageColorSpace::new(&ColorSpace::pattern()).is_none());
    }
}
