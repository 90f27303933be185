use crate::cache::Cache;
use crate::color::ColorSpace;
use crate::device::Device;
use crate::state::State;
use crate::{FillRule, InterpreterSettings, InterpreterWarning};
use folio_syntax::Resources;
use folio_syntax::object::StreamId;
use kurbo::{Affine, BezPath, Point};
use log::warn;
use rustc_hash::FxHashSet;

/// The state of an interpretation.
///
/// A context is created once per page (or per nested drawing, such as a tiling pattern or
/// a soft mask) and passed to every operator handler.
pub struct Context {
    current: State,
    stack: Vec<State>,
    path: BezPath,
    sub_path_start: Point,
    last_point: Point,
    pending_clip: Option<FillRule>,
    root_transforms: Vec<Affine>,
    open_streams: FxHashSet<StreamId>,
    depth: u32,
    pub(crate) settings: InterpreterSettings,
    pub(crate) cache: Cache,
}

impl Context {
    /// Create a new context.
    ///
    /// `initial_transform` must be the current transform of the device that is drawn onto.
    pub fn new(initial_transform: Affine, settings: InterpreterSettings) -> Self {
        Self::new_with(
            initial_transform,
            settings,
            Cache::new(),
            FxHashSet::default(),
            0,
        )
    }

    pub(crate) fn new_with(
        initial_transform: Affine,
        settings: InterpreterSettings,
        cache: Cache,
        open_streams: FxHashSet<StreamId>,
        depth: u32,
    ) -> Self {
        Self {
            current: State::new(initial_transform),
            stack: vec![],
            path: BezPath::new(),
            sub_path_start: Point::ZERO,
            last_point: Point::ZERO,
            pending_clip: None,
            root_transforms: vec![initial_transform],
            open_streams,
            depth,
            settings,
            cache,
        }
    }

    /// A fresh context for a nested drawing, which shares the cache and the set of open
    /// streams with this one.
    pub(crate) fn new_nested(&self, initial_transform: Affine) -> Self {
        Self::new_with(
            initial_transform,
            self.settings.clone(),
            self.cache.clone(),
            self.open_streams.clone(),
            self.depth,
        )
    }

    /// The cache of decoded objects.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub(crate) fn open_streams(&self) -> &FxHashSet<StreamId> {
        &self.open_streams
    }

    pub(crate) fn depth(&self) -> u32 {
        self.depth
    }

    /// Mark a stream as being interpreted. Returns `false` if it is already being
    /// interpreted further up, or if the nesting is too deep.
    pub(crate) fn enter_stream(&mut self, id: StreamId) -> bool {
        if self.depth >= self.settings.max_recursion_depth {
            warn!("maximum nesting depth of {} reached", self.depth);

            return false;
        }

        if !self.open_streams.insert(id) {
            warn!("stream {id:?} draws itself, skipping it");
            self.warn(InterpreterWarning::XObjectCycle);

            return false;
        }

        self.depth += 1;

        true
    }

    pub(crate) fn leave_stream(&mut self, id: StreamId) {
        self.open_streams.remove(&id);
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn warn(&self, warning: InterpreterWarning) {
        (self.settings.warning_sink)(warning);
    }

    pub(crate) fn save_state(&mut self, device: &mut dyn Device) {
        self.stack.push(self.current.clone());
        device.save_state();
    }

    pub(crate) fn restore_state(&mut self, device: &mut dyn Device) {
        let Some(state) = self.stack.pop() else {
            warn!("restoring the graphics state without saving it first");

            return;
        };

        self.current = state;
        device.restore_state();
    }

    pub(crate) fn num_states(&self) -> usize {
        self.stack.len()
    }

    pub(crate) fn get(&self) -> &State {
        &self.current
    }

    pub(crate) fn get_mut(&mut self) -> &mut State {
        &mut self.current
    }

    pub(crate) fn pre_concat(&mut self, transform: Affine, device: &mut dyn Device) {
        self.current.ctm *= transform;
        device.concatenate(transform);
    }

    pub(crate) fn path(&self) -> &BezPath {
        &self.path
    }

    pub(crate) fn path_mut(&mut self) -> &mut BezPath {
        &mut self.path
    }

    pub(crate) fn take_path(&mut self) -> BezPath {
        std::mem::take(&mut self.path)
    }

    pub(crate) fn sub_path_start(&self) -> Point {
        self.sub_path_start
    }

    pub(crate) fn set_sub_path_start(&mut self, point: Point) {
        self.sub_path_start = point;
    }

    pub(crate) fn last_point(&self) -> Point {
        self.last_point
    }

    pub(crate) fn set_last_point(&mut self, point: Point) {
        self.last_point = point;
    }

    pub(crate) fn set_pending_clip(&mut self, fill_rule: FillRule) {
        self.pending_clip = Some(fill_rule);
    }

    pub(crate) fn take_pending_clip(&mut self) -> Option<FillRule> {
        self.pending_clip.take()
    }

    pub(crate) fn push_root_transform(&mut self) {
        self.root_transforms.push(self.current.ctm);
    }

    pub(crate) fn pop_root_transform(&mut self) {
        if self.root_transforms.len() > 1 {
            self.root_transforms.pop();
        }
    }

    /// The transform from the space patterns are defined in to the base space of the
    /// device.
    pub(crate) fn root_transform(&self) -> Affine {
        self.root_transforms
            .last()
            .copied()
            .unwrap_or(Affine::IDENTITY)
    }

    /// Resolve a colour space by name, either one of the device colour spaces or one
    /// from the resources.
    pub(crate) fn get_color_space(&self, resources: &Resources, name: &[u8]) -> Option<ColorSpace> {
        if let Some(color_space) = ColorSpace::from_name(name) {
            return Some(color_space);
        }

        let object = resources.color_space(name).or_else(|| {
            warn!(
                "colour space {} is missing from the resources",
                String::from_utf8_lossy(name)
            );

            None
        })?;

        ColorSpace::new_cached(&object, &self.cache)
    }
}
