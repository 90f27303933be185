//! Arrays.

use crate::object::{FromObject, Object};
use crate::xref::XRef;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// A PDF array.
#[derive(Clone)]
pub struct Array {
    items: Arc<[Object]>,
    xref: XRef,
}

impl Array {
    pub(crate) fn new(items: Vec<Object>, xref: XRef) -> Self {
        Self {
            items: Arc::from(items),
            xref,
        }
    }

    /// Return the number of entries in the array.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Return the (resolved) entry at the given index, cast to `T`.
    pub fn get<T: FromObject>(&self, index: usize) -> Option<T> {
        self.xref.resolve_object(self.items.get(index)?.clone())?.cast()
    }

    /// Iterate over all entries that can be resolved and cast to `T`.
    pub fn iter<'a, T: FromObject + 'a>(&'a self) -> impl Iterator<Item = T> + 'a {
        self.items
            .iter()
            .flat_map(|o| self.xref.resolve_object(o.clone()).and_then(|o| o.cast()))
    }

    /// Iterate over the raw, unresolved entries.
    pub fn raw_iter(&self) -> impl Iterator<Item = &Object> + '_ {
        self.items.iter()
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl Debug for Array {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}
