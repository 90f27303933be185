//! Colours and colour spaces.

use crate::cache::{Cache, CacheKey};
use folio_syntax::function::Function;
use folio_syntax::object::keys::*;
use folio_syntax::object::{Array, Dict, Name, Object, Stream};
use log::warn;
use moxcms::{ColorProfile, Layout, TransformF32Executor, TransformOptions};
use smallvec::{SmallVec, smallvec};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// A storage for the components of colours.
pub type ColorComponents = SmallVec<[f32; 4]>;

/// An sRGB colour with an alpha channel, all channels in `[0, 1]`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AlphaColor {
    components: [f32; 4],
}

impl AlphaColor {
    /// Opaque black.
    pub const BLACK: Self = Self::new([0., 0., 0., 1.]);

    /// Opaque white.
    pub const WHITE: Self = Self::new([1., 1., 1., 1.]);

    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new([0., 0., 0., 0.]);

    /// Create a new colour from RGBA components.
    pub const fn new(components: [f32; 4]) -> Self {
        Self { components }
    }

    /// Create a new colour from RGBA8 values.
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new([r, g, b, a].map(|c| c as f32 / 255.0))
    }

    /// Return the colour as RGBA8.
    pub fn to_rgba8(&self) -> [u8; 4] {
        self.components.map(f32_to_u8)
    }

    /// Return the RGBA components.
    pub fn components(&self) -> [f32; 4] {
        self.components
    }

    /// Return the alpha channel.
    pub fn alpha(&self) -> f32 {
        self.components[3]
    }

    /// Return the colour with a different alpha channel.
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.components[3] = alpha;
        self
    }

    /// Return the luminance of the colour, ignoring alpha.
    pub fn luminance(&self) -> f32 {
        let [r, g, b, _] = self.components;

        0.3 * r + 0.59 * g + 0.11 * b
    }
}

fn f32_to_u8(val: f32) -> u8 {
    (val.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

/// The different kinds of colour spaces.
///
/// `CalGray`, `CalRGB` and `CalCMYK` are treated like their device counterparts.
#[derive(Debug)]
pub enum ColorSpaceKind {
    /// The DeviceGray colour space.
    DeviceGray,
    /// The DeviceRGB colour space.
    DeviceRgb,
    /// The DeviceCMYK colour space.
    DeviceCmyk,
    /// A colour space defined by an ICC profile.
    IccBased(IccProfile),
    /// An indexed colour space.
    Indexed(Indexed),
    /// A separation colour space.
    Separation(Separation),
    /// A DeviceN colour space.
    DeviceN(DeviceN),
    /// The pattern colour space, with the colour space used by uncoloured patterns.
    Pattern(ColorSpace),
}

/// A colour space.
///
/// Cloning is cheap.
#[derive(Clone)]
pub struct ColorSpace(Arc<ColorSpaceKind>);

impl ColorSpace {
    /// Create a colour space from its object, which is either a name or an array.
    pub fn new(object: &Object) -> Option<Self> {
        Self::new_cached(object, &Cache::new())
    }

    pub(crate) fn new_cached(object: &Object, cache: &Cache) -> Option<Self> {
        match object {
            Object::Name(name) => Self::from_name(name).or_else(|| {
                warn!("unknown colour space {}", name.as_str());

                None
            }),
            Object::Array(array) => Self::from_array(array, cache),
            _ => {
                warn!("invalid colour space {object:?}");

                None
            }
        }
    }

    /// Create one of the colour spaces that can be referred to by name without a resource
    /// dictionary.
    pub fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            DEVICE_GRAY | G | CAL_GRAY => Some(Self::device_gray()),
            DEVICE_RGB | b"RGB" | CAL_RGB => Some(Self::device_rgb()),
            DEVICE_CMYK | b"CMYK" | b"CalCMYK" => Some(Self::device_cmyk()),
            PATTERN => Some(Self::pattern()),
            _ => None,
        }
    }

    fn from_array(array: &Array, cache: &Cache) -> Option<Self> {
        let name = array.get::<Name>(0)?;

        let kind = match &*name {
            ICC_BASED => return Self::icc_from_array(array, cache),
            INDEXED | I => ColorSpaceKind::Indexed(Indexed::new(array, cache)?),
            SEPARATION => ColorSpaceKind::Separation(Separation::new(array, cache)?),
            DEVICE_N => ColorSpaceKind::DeviceN(DeviceN::new(array, cache)?),
            PATTERN => ColorSpaceKind::Pattern(
                array
                    .get::<Object>(1)
                    .and_then(|o| Self::new_cached(&o, cache))
                    .unwrap_or_else(Self::device_gray),
            ),
            other => return Self::from_name(other).or_else(|| {
                warn!("unsupported colour space {}", name.as_str());

                None
            }),
        };

        Some(Self(Arc::new(kind)))
    }

    fn icc_from_array(array: &Array, cache: &Cache) -> Option<Self> {
        let stream = array.get::<Stream>(1)?;
        let dict = stream.dict();
        let components = dict.get::<usize>(N)?;

        let icc = cache.get_or_insert_with(CacheKey::Stream(stream.id()), || {
            let data = stream.decoded()?;

            Self::icc_based(&data, components)
        });

        icc.or_else(|| {
            warn!("failed to load ICC profile, using a fallback");

            icc_fallback(dict, components, cache)
        })
    }

    /// The DeviceGray colour space.
    pub fn device_gray() -> Self {
        Self(Arc::new(ColorSpaceKind::DeviceGray))
    }

    /// The DeviceRGB colour space.
    pub fn device_rgb() -> Self {
        Self(Arc::new(ColorSpaceKind::DeviceRgb))
    }

    /// The DeviceCMYK colour space.
    pub fn device_cmyk() -> Self {
        Self(Arc::new(ColorSpaceKind::DeviceCmyk))
    }

    /// The pattern colour space, without a colour space for uncoloured patterns.
    pub fn pattern() -> Self {
        Self(Arc::new(ColorSpaceKind::Pattern(Self::device_gray())))
    }

    /// Create an ICC-based colour space from the data of a profile.
    pub fn icc_based(data: &[u8], components: usize) -> Option<Self> {
        IccProfile::new(data, components).map(|icc| Self(Arc::new(ColorSpaceKind::IccBased(icc))))
    }

    /// Return the kind of the colour space.
    pub fn kind(&self) -> &ColorSpaceKind {
        &self.0
    }

    /// Return the number of components of a colour in this colour space.
    pub fn num_components(&self) -> usize {
        match self.kind() {
            ColorSpaceKind::DeviceGray => 1,
            ColorSpaceKind::DeviceRgb => 3,
            ColorSpaceKind::DeviceCmyk => 4,
            ColorSpaceKind::IccBased(icc) => icc.num_components(),
            ColorSpaceKind::Indexed(_) | ColorSpaceKind::Separation(_) => 1,
            ColorSpaceKind::DeviceN(d) => d.num_components,
            ColorSpaceKind::Pattern(base) => base.num_components(),
        }
    }

    /// Return the colour that is selected when switching to this colour space.
    pub fn initial_color(&self) -> ColorComponents {
        match self.kind() {
            ColorSpaceKind::DeviceCmyk => smallvec![0.0, 0.0, 0.0, 1.0],
            ColorSpaceKind::IccBased(icc) if icc.num_components() == 4 => {
                smallvec![0.0, 0.0, 0.0, 1.0]
            }
            ColorSpaceKind::Separation(_) | ColorSpaceKind::DeviceN(_) => {
                smallvec![1.0; self.num_components()]
            }
            ColorSpaceKind::Pattern(base) => base.initial_color(),
            _ => smallvec![0.0; self.num_components()],
        }
    }

    /// Whether this is the pattern colour space.
    pub fn is_pattern(&self) -> bool {
        matches!(self.kind(), ColorSpaceKind::Pattern(_))
    }

    /// The colour space that uncoloured patterns are tinted in, if this is the pattern
    /// colour space.
    pub fn pattern_base(&self) -> Option<&ColorSpace> {
        match self.kind() {
            ColorSpaceKind::Pattern(base) => Some(base),
            _ => None,
        }
    }

    /// Return the data of the ICC profile, if this is an ICC-based colour space.
    pub fn icc_profile(&self) -> Option<&[u8]> {
        match self.kind() {
            ColorSpaceKind::IccBased(icc) => Some(icc.data()),
            _ => None,
        }
    }

    /// Convert a colour into sRGB.
    ///
    /// Malformed colours are converted to black. Colours of the `None` separation are
    /// fully transparent.
    pub fn to_rgba(&self, components: &[f32], opacity: f32) -> AlphaColor {
        let [r, g, b] = self.to_rgb(components).unwrap_or([0.0; 3]);
        let opacity = if self.is_none() { 0.0 } else { opacity };

        AlphaColor::new([r, g, b, opacity])
    }

    /// The decode array that maps image samples with the given bit depth into the colour
    /// space.
    pub(crate) fn default_decode(&self, bits_per_component: u8) -> SmallVec<[(f32, f32); 4]> {
        match self.kind() {
            ColorSpaceKind::Indexed(_) => {
                smallvec![(0.0, ((1_u32 << bits_per_component.min(16)) - 1) as f32)]
            }
            _ => smallvec![(0.0, 1.0); self.num_components()],
        }
    }

    fn to_rgb(&self, input: &[f32]) -> Option<[f32; 3]> {
        let get = |i: usize| input.get(i).copied().map(|v| v.clamp(0.0, 1.0));

        match self.kind() {
            ColorSpaceKind::DeviceGray => {
                let g = get(0)?;
                Some([g, g, g])
            }
            ColorSpaceKind::DeviceRgb => Some([get(0)?, get(1)?, get(2)?]),
            ColorSpaceKind::DeviceCmyk => Some(cmyk_to_rgb([get(0)?, get(1)?, get(2)?, get(3)?])),
            ColorSpaceKind::IccBased(icc) => icc.to_rgb(input),
            ColorSpaceKind::Indexed(indexed) => indexed.to_rgb(*input.first()?),
            ColorSpaceKind::Separation(s) => s.to_rgb(*input.first()?),
            ColorSpaceKind::DeviceN(d) => d.to_rgb(input),
            ColorSpaceKind::Pattern(base) => base.to_rgb(input),
        }
    }

    fn is_none(&self) -> bool {
        match self.kind() {
            ColorSpaceKind::Separation(s) => s.is_none,
            ColorSpaceKind::DeviceN(d) => d.is_none,
            _ => false,
        }
    }
}

impl PartialEq for ColorSpace {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }

        match (self.kind(), other.kind()) {
            (ColorSpaceKind::DeviceGray, ColorSpaceKind::DeviceGray)
            | (ColorSpaceKind::DeviceRgb, ColorSpaceKind::DeviceRgb)
            | (ColorSpaceKind::DeviceCmyk, ColorSpaceKind::DeviceCmyk) => true,
            (ColorSpaceKind::IccBased(a), ColorSpaceKind::IccBased(b)) => a.data() == b.data(),
            (ColorSpaceKind::Pattern(a), ColorSpaceKind::Pattern(b)) => a == b,
            _ => false,
        }
    }
}

impl Debug for ColorSpace {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

fn icc_fallback(dict: &Dict, components: usize, cache: &Cache) -> Option<ColorSpace> {
    if let Some(alternate) = dict
        .get::<Object>(ALTERNATE)
        .and_then(|o| ColorSpace::new_cached(&o, cache))
    {
        return Some(alternate);
    }

    match components {
        1 => Some(ColorSpace::device_gray()),
        3 => Some(ColorSpace::device_rgb()),
        4 => Some(ColorSpace::device_cmyk()),
        _ => None,
    }
}

/// A naive conversion, as no colour management is done for device colours.
pub(crate) fn cmyk_to_rgb([c, m, y, k]: [f32; 4]) -> [f32; 3] {
    [(1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k)]
}

/// The inverse of [`cmyk_to_rgb`], with maximum black generation.
pub fn rgb_to_cmyk([r, g, b]: [f32; 3]) -> [f32; 4] {
    let k = 1.0 - r.max(g).max(b);

    if k >= 1.0 {
        return [0.0, 0.0, 0.0, 1.0];
    }

    let scale = 1.0 - k;

    [
        (1.0 - r - k) / scale,
        (1.0 - g - k) / scale,
        (1.0 - b - k) / scale,
        k,
    ]
}

struct IccRepr {
    data: Arc<[u8]>,
    transform: Arc<TransformF32Executor>,
    components: usize,
    is_srgb: bool,
}

/// An ICC profile, together with a transform into sRGB.
#[derive(Clone)]
pub struct IccProfile(Arc<IccRepr>);

impl IccProfile {
    fn new(data: &[u8], components: usize) -> Option<Self> {
        let profile = ColorProfile::new_from_slice(data)
            .map_err(|e| warn!("failed to parse ICC profile: {e:?}"))
            .ok()?;

        let layout = match components {
            1 => Layout::Gray,
            3 => Layout::Rgb,
            4 => Layout::Rgba,
            _ => {
                warn!("unsupported number of components {components} for ICC profile");

                return None;
            }
        };

        let transform = profile
            .create_transform_f32(
                layout,
                &ColorProfile::new_srgb(),
                Layout::Rgb,
                TransformOptions::default(),
            )
            .map_err(|e| warn!("failed to create ICC transform: {e:?}"))
            .ok()?;

        // The device model of the profile header.
        let is_srgb = data.get(52..56) == Some(b"sRGB".as_slice());

        Some(Self(Arc::new(IccRepr {
            data: Arc::from(data),
            transform,
            components,
            is_srgb,
        })))
    }

    /// The raw data of the profile.
    pub fn data(&self) -> &[u8] {
        &self.0.data
    }

    /// The number of components of the profile.
    pub fn num_components(&self) -> usize {
        self.0.components
    }

    fn to_rgb(&self, input: &[f32]) -> Option<[f32; 3]> {
        let input = input.get(..self.0.components)?;

        if self.0.is_srgb && self.0.components == 3 {
            return Some([input[0], input[1], input[2]]);
        }

        let mut out = [0.0_f32; 3];
        self.0.transform.transform(input, &mut out).ok()?;

        Some(out.map(|c| c.clamp(0.0, 1.0)))
    }
}

impl Debug for IccProfile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "IccProfile({} components)", self.0.components)
    }
}

/// An indexed colour space.
#[derive(Debug)]
pub struct Indexed {
    base: ColorSpace,
    hival: u8,
    lookup: Vec<u8>,
}

impl Indexed {
    fn new(array: &Array, cache: &Cache) -> Option<Self> {
        let base = ColorSpace::new_cached(&array.get::<Object>(1)?, cache)?;
        let hival = array.get::<u8>(2)?;
        let lookup = match array.get::<Object>(3)? {
            Object::Stream(s) => s.decoded()?,
            Object::String(s) => s.get().to_vec(),
            _ => return None,
        };

        if lookup.len() < (hival as usize + 1) * base.num_components() {
            warn!("lookup table of indexed colour space is too short");
        }

        Some(Self {
            base,
            hival,
            lookup,
        })
    }

    fn to_rgb(&self, index: f32) -> Option<[f32; 3]> {
        let n = self.base.num_components();
        let index = (index.clamp(0.0, self.hival as f32) + 0.5) as usize;

        let entry = self
            .lookup
            .get(index * n..(index + 1) * n)
            .map(|e| e.iter().map(|v| *v as f32 / 255.0).collect::<ColorComponents>())
            .unwrap_or_else(|| self.base.initial_color());

        self.base.to_rgb(&entry)
    }
}

/// A separation colour space.
#[derive(Debug)]
pub struct Separation {
    alternate: ColorSpace,
    tint_transform: Function,
    is_none: bool,
}

impl Separation {
    fn new(array: &Array, cache: &Cache) -> Option<Self> {
        let name = array.get::<Name>(1)?;
        let alternate = ColorSpace::new_cached(&array.get::<Object>(2)?, cache)?;
        let tint_transform = Function::new(&array.get::<Object>(3)?)?;

        Some(Self {
            alternate,
            tint_transform,
            is_none: &*name == NONE,
        })
    }

    fn to_rgb(&self, tint: f32) -> Option<[f32; 3]> {
        match self.tint_transform.eval(smallvec![tint]) {
            Some(evaluated) => self.alternate.to_rgb(&evaluated),
            None => self.alternate.to_rgb(&self.alternate.initial_color()),
        }
    }
}

/// A DeviceN colour space.
#[derive(Debug)]
pub struct DeviceN {
    alternate: ColorSpace,
    tint_transform: Function,
    num_components: usize,
    is_none: bool,
}

impl DeviceN {
    fn new(array: &Array, cache: &Cache) -> Option<Self> {
        let names = array.get::<Array>(1)?.iter::<Name>().collect::<Vec<_>>();

        if names.is_empty() {
            warn!("DeviceN colour space without colourants");

            return None;
        }

        let alternate = ColorSpace::new_cached(&array.get::<Object>(2)?, cache)?;
        let tint_transform = Function::new(&array.get::<Object>(3)?)?;

        Some(Self {
            alternate,
            tint_transform,
            num_components: names.len(),
            is_none: names.iter().all(|n| &**n == NONE),
        })
    }

    fn to_rgb(&self, input: &[f32]) -> Option<[f32; 3]> {
        let input = input.get(..self.num_components)?;
        match self.tint_transform.eval(input.iter().copied().collect()) {
            Some(evaluated) => self.alternate.to_rgb(&evaluated),
            None => self.alternate.to_rgb(&self.alternate.initial_color()),
        }
    }
}

/// A colour, consisting of a colour space, its components and an opacity.
#[derive(Debug, Clone, PartialEq)]
pub struct Color {
    color_space: ColorSpace,
    components: ColorComponents,
    opacity: f32,
}

impl Color {
    /// Create a new colour.
    pub fn new(color_space: ColorSpace, components: ColorComponents, opacity: f32) -> Self {
        Self {
            color_space,
            components,
            opacity,
        }
    }

    /// Create an opaque DeviceRGB colour.
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(ColorSpace::device_rgb(), smallvec![r, g, b], 1.0)
    }

    /// The colour space of the colour.
    pub fn color_space(&self) -> &ColorSpace {
        &self.color_space
    }

    /// The components of the colour.
    pub fn components(&self) -> &[f32] {
        &self.components
    }

    /// The opacity of the colour.
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Return the colour as sRGB.
    pub fn to_rgba(&self) -> AlphaColor {
        self.color_space.to_rgba(&self.components, self.opacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cs(data: &[u8]) -> Option<ColorSpace> {
        ColorSpace::new(&Object::from_bytes(data).unwrap())
    }

    #[test]
    fn initial_colors() {
        assert_eq!(ColorSpace::device_gray().initial_color().as_slice(), &[0.0]);
        assert_eq!(
            ColorSpace::device_cmyk().initial_color().as_slice(),
            &[0.0, 0.0, 0.0, 1.0]
        );

        let sep = cs(b"[/Separation /Spot /DeviceGray
            << /FunctionType 2 /Domain [0 1] /C0 [1] /C1 [0] /N 1 >>]")
        .unwrap();
        assert_eq!(sep.num_components(), 1);
        assert_eq!(sep.initial_color().as_slice(), &[1.0]);
    }

    #[test]
    fn device_conversions() {
        let cmyk = ColorSpace::device_cmyk();
        assert_eq!(cmyk.to_rgba(&[0.0, 0.0, 0.0, 1.0], 1.0), AlphaColor::BLACK);
        assert_eq!(
            cmyk.to_rgba(&[0.0, 1.0, 1.0, 0.0], 0.5),
            AlphaColor::new([1.0, 0.0, 0.0, 0.5])
        );
        assert_eq!(rgb_to_cmyk([1.0, 0.0, 0.0]), [0.0, 1.0, 1.0, 0.0]);
        assert_eq!(
            ColorSpace::device_gray().to_rgba(&[1.0], 1.0),
            AlphaColor::WHITE
        );
    }

    #[test]
    fn indexed_lookup() {
        let indexed = cs(b"[/Indexed /DeviceRGB 1 <ff000000ff00>]").unwrap();
        assert_eq!(indexed.num_components(), 1);
        assert_eq!(indexed.to_rgba(&[1.0], 1.0), AlphaColor::new([0.0, 1.0, 0.0, 1.0]));
        // Out-of-range indices are clamped.
        assert_eq!(indexed.to_rgba(&[7.0], 1.0), AlphaColor::new([0.0, 1.0, 0.0, 1.0]));
        assert_eq!(indexed.default_decode(4).as_slice(), &[(0.0, 15.0)]);
    }

    #[test]
    fn separation_tint() {
        let sep = cs(b"[/Separation /Spot /DeviceRGB
            << /FunctionType 2 /Domain [0 1] /C0 [1 1 1] /C1 [0 0 1] /N 1 >>]")
        .unwrap();
        assert_eq!(sep.to_rgba(&[1.0], 1.0), AlphaColor::new([0.0, 0.0, 1.0, 1.0]));

        let none = cs(b"[/Separation /None /DeviceGray
            << /FunctionType 2 /Domain [0 1] /C0 [1] /C1 [0] /N 1 >>]")
        .unwrap();
        assert_eq!(none.to_rgba(&[1.0], 1.0).alpha(), 0.0);
    }

    #[test]
    fn pattern_spaces() {
        let plain = ColorSpace::from_name(b"Pattern").unwrap();
        assert!(plain.is_pattern());

        let uncolored = cs(b"[/Pattern /DeviceRGB]").unwrap();
        assert!(uncolored.is_pattern());
        assert_eq!(uncolored.num_components(), 3);
    }

    #[test]
    fn calibrated_spaces_are_device_spaces() {
        let cal = cs(b"[/CalRGB << /WhitePoint [0.95 1 1.09] >>]").unwrap();
        assert_eq!(cal, ColorSpace::device_rgb());
        assert!(cs(b"[/Lab << /WhitePoint [0.95 1 1.09] >>]").is_none());
        assert!(cs(b"/Unknown").is_none());
    }

    #[test]
    fn broken_icc_profile_falls_back() {
        let space = cs(b"[/ICCBased << /N 4 /Length 3 >>]");
        // Not a stream, so there is nothing to fall back from.
        assert!(space.is_none());
        assert!(ColorSpace::icc_based(b"not a profile", 3).is_none());
    }
}
