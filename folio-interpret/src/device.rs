use crate::{
    BlendMode, FillRule, LinearGradient, MaskKind, MeshGradient, Paint, RadialGradient,
    RgbaImage, StrokeProps,
};
use kurbo::{Affine, BezPath};

/// An abstract drawing surface.
///
/// A device keeps its own graphics state, consisting of the current transform, opacity,
/// blend mode and clip. Paths and shapes are passed in user space, meaning they still have
/// to be transformed by the current transform.
///
/// The trait is object-safe, all drawing happens through `&mut dyn Device`.
pub trait Device {
    /// Pre-concatenate a transform to the current transform.
    fn concatenate(&mut self, transform: Affine);
    /// Save the graphics state.
    fn save_state(&mut self);
    /// Restore the last saved graphics state, including its clip.
    fn restore_state(&mut self);
    /// Set the opacity that applies to subsequent drawing and to layers that are begun.
    fn set_opacity(&mut self, opacity: f32);
    /// Set the blend mode that applies to subsequent drawing and to layers that are begun.
    fn set_blend_mode(&mut self, blend_mode: BlendMode);
    /// Begin a transparency layer. The layer is composited as a whole once it ends, using the
    /// opacity and blend mode that were active when it began.
    fn begin_layer(&mut self);
    /// End the innermost transparency layer.
    fn end_layer(&mut self);
    /// Replace the clip of the current layer.
    fn clip(&mut self, path: &BezPath, fill_rule: FillRule);
    /// Replace the clip of the current layer with a mask, which is defined by whatever
    /// `drawing` draws on the device that is passed to it.
    fn clip_to_drawing(&mut self, kind: MaskKind, drawing: &mut dyn FnMut(&mut dyn Device));
    /// Fill a path.
    fn draw(&mut self, path: &BezPath, fill_rule: FillRule, paint: &Paint);
    /// Stroke a path.
    fn stroke(&mut self, path: &BezPath, stroke_props: &StrokeProps, paint: &Paint);
    /// Fill the clip area with an axial gradient.
    fn draw_linear_gradient(&mut self, gradient: &LinearGradient);
    /// Fill the clip area with a radial gradient.
    fn draw_radial_gradient(&mut self, gradient: &RadialGradient);
    /// Draw a run of mesh patches.
    fn draw_mesh_gradient(&mut self, mesh: &MeshGradient);
    /// Draw an image onto the unit square.
    fn draw_image(&mut self, image: &RgbaImage);
}
