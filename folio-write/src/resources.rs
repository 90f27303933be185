//! The named resources of a page.
//!
//! All layers, masks and patterns of a page share one resource dictionary, so every resource
//! is registered at the page level and identical resources are only written once.

use folio_interpret::{BlendMode, MaskKind};
use rustc_hash::{FxBuildHasher, FxHashMap};
use smallvec::SmallVec;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

/// A float that is compared and hashed by its bit pattern.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Bits(pub(crate) f32);

impl PartialEq for Bits {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Bits {}

impl Hash for Bits {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

pub(crate) fn bits<const N: usize>(values: [f64; N]) -> [Bits; N] {
    values.map(|v| Bits(v as f32))
}

/// Stores values in insertion order and hands out the same index for equal values.
#[derive(Debug)]
pub(crate) struct Deduplicator<T> {
    prefix: &'static str,
    entries: Vec<T>,
    present: FxHashMap<u64, SmallVec<[usize; 1]>>,
}

impl<T: Hash + Eq> Deduplicator<T> {
    fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            entries: Vec::new(),
            present: FxHashMap::default(),
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> usize {
        let hash = FxBuildHasher.hash_one(&value);
        let bucket = self.present.entry(hash).or_default();

        if let Some(index) = bucket.iter().find(|i| self.entries[**i] == value) {
            return *index;
        }

        let index = self.entries.len();
        self.entries.push(value);
        bucket.push(index);

        index
    }

    /// The resource name of the entry at the given index.
    pub(crate) fn name(&self, index: usize) -> String {
        format!("{}{}", self.prefix, index + 1)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (String, &T)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (self.name(i), entry))
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// An extended graphics state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ExtGState {
    /// The opacity (for both filling and stroking) and blend mode.
    Composite { alpha: Bits, blend_mode: BlendMode },
    /// A soft mask, pointing to an entry of [`ResourceTables::masks`].
    SoftMask { mask: usize, kind: MaskKind },
}

impl ExtGState {
    pub(crate) const DEFAULT: Self = Self::Composite {
        alpha: Bits(1.0),
        blend_mode: BlendMode::Normal,
    };

    pub(crate) fn composite(alpha: f32, blend_mode: BlendMode) -> Self {
        Self::Composite {
            alpha: Bits(alpha.clamp(0.0, 1.0)),
            blend_mode,
        }
    }
}

/// A finished layer or mask.
#[derive(Debug, PartialEq, Eq, Hash)]
pub(crate) struct Form {
    pub(crate) content: Vec<u8>,
    pub(crate) bbox: [Bits; 4],
}

/// A finished tiling pattern cell.
#[derive(Debug, PartialEq, Eq, Hash)]
pub(crate) struct Pattern {
    pub(crate) content: Vec<u8>,
    pub(crate) bbox: [Bits; 4],
    pub(crate) x_step: Bits,
    pub(crate) y_step: Bits,
    pub(crate) matrix: [Bits; 6],
}

/// An RGBA image, identified by its pixel buffer.
#[derive(Debug)]
pub(crate) struct Image {
    pub(crate) data: Arc<[u8]>,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) interpolate: bool,
}

impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
            && self.width == other.width
            && self.height == other.height
            && self.interpolate == other.interpolate
    }
}

impl Eq for Image {}

impl Hash for Image {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.data).cast::<u8>().hash(state);
        self.width.hash(state);
        self.height.hash(state);
    }
}

/// A shading, in the colour space of the page or in DeviceGray.
#[derive(Debug, PartialEq, Eq, Hash)]
pub(crate) enum Shading {
    /// An axial or radial shading, whose function interpolates linearly between stops.
    Function {
        axial: bool,
        coords: SmallVec<[Bits; 6]>,
        stops: Vec<(Bits, SmallVec<[Bits; 4]>)>,
        extend: [bool; 2],
        gray: bool,
    },
    /// A Coons or tensor-product patch mesh.
    Mesh {
        tensor: bool,
        data: Vec<u8>,
        decode: Vec<Bits>,
        gray: bool,
    },
}

/// The resources of a page.
#[derive(Debug)]
pub(crate) struct ResourceTables {
    pub(crate) ext_g_states: Deduplicator<ExtGState>,
    pub(crate) forms: Deduplicator<Form>,
    pub(crate) masks: Deduplicator<Form>,
    pub(crate) images: Deduplicator<Image>,
    pub(crate) shadings: Deduplicator<Shading>,
    pub(crate) patterns: Deduplicator<Pattern>,
}

impl Default for ResourceTables {
    fn default() -> Self {
        Self {
            ext_g_states: Deduplicator::new("Gs"),
            forms: Deduplicator::new("Fm"),
            masks: Deduplicator::new("Mk"),
            images: Deduplicator::new("Im"),
            shadings: Deduplicator::new("Sh"),
            patterns: Deduplicator::new("P"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_values_share_a_name() {
        let mut states = Deduplicator::new("Gs");

        let a = states.insert(ExtGState::composite(0.5, BlendMode::Normal));
        let b = states.insert(ExtGState::composite(0.5, BlendMode::Multiply));
        let c = states.insert(ExtGState::composite(0.5, BlendMode::Normal));

        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(states.name(b), "Gs2");
        assert_eq!(states.len(), 2);
    }

    #[test]
    fn opacities_are_clamped() {
        assert_eq!(ExtGState::composite(1.5, BlendMode::Normal), ExtGState::DEFAULT);
    }
}
