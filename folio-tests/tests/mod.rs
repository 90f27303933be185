use folio_interpret::color::AlphaColor;
use folio_interpret::{
    BlendMode, Device, FillRule, InterpreterSettings, InterpreterWarning, LinearGradient,
    MaskKind, MeshGradient, Paint, RadialGradient, RgbaImage, StrokeProps, interpret_page,
};
use folio_syntax::Document;
use folio_write::{EncoderSettings, PageEncoder};
use kurbo::{Affine, BezPath};
use std::sync::{Arc, Mutex};

mod interpret;

/// A drawing call, with all paths in device space.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Save,
    Restore,
    Opacity(f32),
    BeginLayer,
    EndLayer,
    Clip(BezPath, FillRule),
    ClipToDrawing(MaskKind, Vec<Event>),
    Fill(BezPath, FillRule, Option<AlphaColor>),
    Stroke(BezPath, f32),
    Linear(LinearGradient),
    Radial(RadialGradient),
    Mesh(MeshGradient),
    Image(u32, u32),
}

/// A device that records what is drawn onto it.
#[derive(Default)]
pub(crate) struct Recorder {
    transform: Affine,
    saved: Vec<Affine>,
    pub(crate) events: Vec<Event>,
}

impl Recorder {
    fn with_transform(transform: Affine) -> Self {
        Self {
            transform,
            ..Self::default()
        }
    }

    pub(crate) fn fills(&self) -> Vec<(BezPath, FillRule, Option<AlphaColor>)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Fill(path, rule, color) => Some((path.clone(), *rule, *color)),
                _ => None,
            })
            .collect()
    }
}

impl Device for Recorder {
    fn concatenate(&mut self, transform: Affine) {
        self.transform *= transform;
    }

    fn save_state(&mut self) {
        self.saved.push(self.transform);
        self.events.push(Event::Save);
    }

    fn restore_state(&mut self) {
        if let Some(transform) = self.saved.pop() {
            self.transform = transform;
        }

        self.events.push(Event::Restore);
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.events.push(Event::Opacity(opacity));
    }

    fn set_blend_mode(&mut self, _: BlendMode) {}

    fn begin_layer(&mut self) {
        self.events.push(Event::BeginLayer);
    }

    fn end_layer(&mut self) {
        self.events.push(Event::EndLayer);
    }

    fn clip(&mut self, path: &BezPath, fill_rule: FillRule) {
        self.events
            .push(Event::Clip(self.transform * path.clone(), fill_rule));
    }

    fn clip_to_drawing(&mut self, kind: MaskKind, drawing: &mut dyn FnMut(&mut dyn Device)) {
        let mut nested = Self::with_transform(self.transform);
        drawing(&mut nested);
        self.events.push(Event::ClipToDrawing(kind, nested.events));
    }

    fn draw(&mut self, path: &BezPath, fill_rule: FillRule, paint: &Paint) {
        let color = match paint {
            Paint::Color(color) => Some(color.to_rgba()),
            Paint::Pattern(_) => None,
        };

        self.events
            .push(Event::Fill(self.transform * path.clone(), fill_rule, color));
    }

    fn stroke(&mut self, path: &BezPath, stroke_props: &StrokeProps, _: &Paint) {
        self.events.push(Event::Stroke(
            self.transform * path.clone(),
            stroke_props.line_width,
        ));
    }

    fn draw_linear_gradient(&mut self, gradient: &LinearGradient) {
        self.events.push(Event::Linear(gradient.clone()));
    }

    fn draw_radial_gradient(&mut self, gradient: &RadialGradient) {
        self.events.push(Event::Radial(gradient.clone()));
    }

    fn draw_mesh_gradient(&mut self, mesh: &MeshGradient) {
        self.events.push(Event::Mesh(mesh.clone()));
    }

    fn draw_image(&mut self, image: &RgbaImage) {
        self.events.push(Event::Image(image.width, image.height));
    }
}

/// Interpret the first page of a document, returning the recorded calls and the warnings.
pub(crate) fn interpret_document(data: Vec<u8>) -> (Recorder, Vec<InterpreterWarning>) {
    let document = Document::load(data).unwrap();
    let warnings = Arc::new(Mutex::new(vec![]));
    let sink = warnings.clone();
    let settings = InterpreterSettings {
        warning_sink: Arc::new(move |w: InterpreterWarning| sink.lock().unwrap().push(w)),
        ..InterpreterSettings::default()
    };

    let mut recorder = Recorder::default();
    interpret_page(&document.pages()[0], settings, &mut recorder);

    let warnings = warnings.lock().unwrap().clone();
    (recorder, warnings)
}

/// Write a single page without compression.
pub(crate) fn write_page(page: PageEncoder) -> Vec<u8> {
    let mut document = folio_write::Document::new(EncoderSettings {
        compress: false,
        ..EncoderSettings::default()
    });
    document.add_page(page);

    document.data().unwrap()
}

pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
