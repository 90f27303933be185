/*!
A crate for interpreting the content streams of PDF-like documents.

Interpretation is driven by [`interpret`] (or [`interpret_page`] for a whole page), which walks
the operators of a content stream, keeps track of the graphics state and forwards every
drawing instruction to a [`Device`]. Devices never see the operators themselves: they receive
paths in user space together with the transforms, clips, transparency layers and paints that
apply to them, so the same stream of calls can be rendered, recorded or encoded again.

Things that are worth knowing:
- Clip paths are intersected by the interpreter. A device only ever has to apply a single clip
  per layer; intersections of several clip paths are realized with a luminosity mask.
- Soft masks and uncoloured tiling patterns are realized with [`Device::clip_to_drawing`].
- Axial and radial shadings are turned into gradient stops, mesh shadings into patches.
- Text operators are tokenized, but ignored.
*/

#![forbid(unsafe_code)]

use folio_syntax::Page;
use folio_syntax::content::Tokenizer;
use kurbo::Affine;
use log::warn;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

mod cache;
pub mod color;
mod context;
mod device;
mod image;
mod interpret;
pub mod mesh;
pub mod pattern;
pub mod shading;
pub mod soft_mask;
mod state;
mod types;
mod util;
mod x_object;

pub use cache::{Cache, CacheKey};
pub use context::Context;
pub use device::Device;
pub use interpret::interpret;
pub use types::*;

/// A callback that receives warnings about unsupported or broken content.
pub type WarningSinkFn = Arc<dyn Fn(InterpreterWarning) + Send + Sync>;

/// Settings that influence the interpreter.
#[derive(Clone)]
pub struct InterpreterSettings {
    /// A sink for warnings that are emitted during interpretation.
    ///
    /// Warnings are also logged, the sink only exists so that callers can react to them.
    pub warning_sink: WarningSinkFn,
    /// How deeply form XObjects, patterns and soft masks may be nested.
    pub max_recursion_depth: u32,
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        Self {
            warning_sink: Arc::new(|_| {}),
            max_recursion_depth: 64,
        }
    }
}

impl Debug for InterpreterSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpreterSettings")
            .field("max_recursion_depth", &self.max_recursion_depth)
            .finish_non_exhaustive()
    }
}

/// A warning that occurred while interpreting a content stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InterpreterWarning {
    /// A shading was skipped, because it is malformed or of an unsupported type.
    UnsupportedShading,
    /// A function couldn't be used, for example because its output doesn't match the
    /// colour space it is used with.
    UnsupportedFunction,
    /// A form XObject was skipped because it (indirectly) draws itself.
    XObjectCycle,
    /// An image couldn't be decoded.
    ImageDecodeFailure,
    /// A stream uses a filter that isn't supported.
    UnsupportedFilter,
}

/// Interpret the content stream of a page.
///
/// The device is expected to start out with an identity transform, which maps to the
/// default user space of the page.
pub fn interpret_page(page: &Page, settings: InterpreterSettings, device: &mut dyn Device) {
    let mut context = Context::new(Affine::IDENTITY, settings);

    let Some(content) = page.content() else {
        warn!("failed to decode the content stream of a page");

        return;
    };

    interpret(
        Tokenizer::new(&content),
        page.resources(),
        &mut context,
        device,
    );
}
