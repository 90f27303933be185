use crate::{Event, interpret_document, write_page};
use folio_interpret::color::ColorSpace;
use folio_interpret::{FillRule, InterpreterSettings, InterpreterWarning, interpret_page};
use folio_syntax::Document;
use folio_syntax::bit::BitWriter;
use folio_write::PageEncoder;
use kurbo::{BezPath, Point, Shape};
use pdf_writer::types::FunctionShadingType;
use pdf_writer::writers::StreamShadingType;
use pdf_writer::writers::Resources;
use pdf_writer::{Finish, Name, Pdf, Rect, Ref};

fn resources_ref() -> Ref {
    Ref::new(5)
}

/// Write a document with a single page, whose resources are written by `resources` as
/// object 5. Further objects can be written by `objects`, starting at object 10.
fn single_page(
    content: &[u8],
    resources: impl FnOnce(&mut Resources<'_>),
    objects: impl FnOnce(&mut Pdf),
) -> Vec<u8> {
    let mut pdf = Pdf::new();
    pdf.catalog(Ref::new(1)).pages(Ref::new(2));
    pdf.pages(Ref::new(2)).kids([Ref::new(3)]).count(1);
    pdf.page(Ref::new(3))
        .media_box(Rect::new(0.0, 0.0, 100.0, 100.0))
        .parent(Ref::new(2))
        .contents(Ref::new(4))
        .pair(Name(b"Resources"), resources_ref());
    pdf.stream(Ref::new(4), content).finish();

    let mut dict = pdf.indirect(resources_ref()).start::<Resources<'_>>();
    resources(&mut dict);
    dict.finish();

    objects(&mut pdf);

    pdf.finish()
}

/// The area that something was painted in, as far as it is visible.
#[derive(Debug, Clone)]
struct Painted {
    path: BezPath,
    fill_rule: FillRule,
    clips: Vec<Area>,
}

impl Painted {
    fn contains(&self, point: Point) -> bool {
        inside(&self.path, self.fill_rule, point) && self.clips.iter().all(|c| c.contains(point))
    }
}

#[derive(Debug, Clone)]
enum Area {
    Everywhere,
    Path(BezPath, FillRule),
    /// Everything that was painted into a mask.
    Mask(Vec<Painted>),
}

impl Area {
    fn contains(&self, point: Point) -> bool {
        match self {
            Self::Everywhere => true,
            Self::Path(path, fill_rule) => inside(path, *fill_rule, point),
            Self::Mask(painted) => painted.iter().any(|p| p.contains(point)),
        }
    }
}

fn inside(path: &BezPath, fill_rule: FillRule, point: Point) -> bool {
    let winding = path.winding(point);

    match fill_rule {
        FillRule::NonZero => winding != 0,
        FillRule::EvenOdd => winding % 2 != 0,
    }
}

/// Evaluate the recorded clips, yielding the visible area of every fill.
fn painted_areas(events: &[Event]) -> Vec<Painted> {
    let mut clip = Area::Everywhere;
    let mut saved = vec![];
    let mut layers: Vec<(Area, Vec<Area>)> = vec![];
    let mut painted = vec![];

    for event in events {
        match event {
            Event::Save => saved.push(clip.clone()),
            Event::Restore => {
                if let Some(restored) = saved.pop() {
                    clip = restored;
                }
            }
            Event::BeginLayer => {
                let outer = std::mem::replace(&mut clip, Area::Everywhere);
                layers.push((outer, std::mem::take(&mut saved)));
            }
            Event::EndLayer => {
                if let Some((outer, outer_saved)) = layers.pop() {
                    clip = outer;
                    saved = outer_saved;
                }
            }
            Event::Clip(path, fill_rule) => clip = Area::Path(path.clone(), *fill_rule),
            Event::ClipToDrawing(_, inner) => clip = Area::Mask(painted_areas(inner)),
            Event::Fill(path, fill_rule, _) => painted.push(Painted {
                path: path.clone(),
                fill_rule: *fill_rule,
                clips: layers
                    .iter()
                    .map(|(outer, _)| outer.clone())
                    .chain([clip.clone()])
                    .collect(),
            }),
            _ => {}
        }
    }

    painted
}

#[test]
fn clips_intersect() {
    let data = single_page(
        b"0 0 10 10 re W n 5 5 10 10 re W n 0 0 20 20 re f",
        |_| {},
        |_| {},
    );

    let check = |events: &[Event]| {
        let painted = painted_areas(events);
        assert_eq!(painted.len(), 1);

        let fill = &painted[0];
        assert!(fill.contains(Point::new(7.0, 7.0)));
        // Inside only one of the clips.
        assert!(!fill.contains(Point::new(2.0, 2.0)));
        assert!(!fill.contains(Point::new(12.0, 12.0)));
        assert!(!fill.contains(Point::new(18.0, 2.0)));
    };

    let (recorder, _) = interpret_document(data.clone());
    check(&recorder.events);

    // The same has to hold once the page is encoded again.
    let document = Document::load(data).unwrap();
    let mut page = PageEncoder::new(
        kurbo::Rect::new(0.0, 0.0, 100.0, 100.0),
        ColorSpace::device_rgb(),
    );
    interpret_page(
        &document.pages()[0],
        InterpreterSettings::default(),
        &mut page,
    );

    let (recorder, _) = interpret_document(write_page(page));
    let painted = painted_areas(&recorder.events);
    assert_eq!(painted.len(), 1);

    let fill = &painted[0];
    assert!(fill.contains(Point::new(7.0, 7.0)));
    assert!(!fill.contains(Point::new(2.0, 2.0)));
    assert!(!fill.contains(Point::new(12.0, 12.0)));
}

#[test]
fn self_referencing_form_terminates() {
    let content = b"/Fm1 Do 0 0 1 1 re f";
    let data = single_page(
        content,
        |resources| {
            resources.x_objects().pair(Name(b"Fm1"), Ref::new(10));
        },
        |pdf| {
            let mut form = pdf.form_xobject(Ref::new(10), content);
            form.bbox(Rect::new(0.0, 0.0, 100.0, 100.0));
            form.pair(Name(b"Resources"), resources_ref());
        },
    );

    let (recorder, warnings) = interpret_document(data);

    assert_eq!(warnings, [InterpreterWarning::XObjectCycle]);
    // Once inside of the form, once on the page.
    assert_eq!(recorder.fills().len(), 2);
}

fn write_point(writer: &mut BitWriter, x: f32, y: f32) {
    writer.write_scaled(x, 16, 0.0, 10.0).unwrap();
    writer.write_scaled(y, 16, 0.0, 10.0).unwrap();
}

#[test]
fn mesh_with_shared_edges_is_a_single_run() {
    let mut writer = BitWriter::new();

    for (i, flag) in [0, 1, 1].into_iter().enumerate() {
        let (num_points, num_colors) = if flag == 0 { (12, 4) } else { (8, 2) };

        writer.write(flag, 8).unwrap();

        for p in 0..num_points {
            write_point(&mut writer, (i + p % 4) as f32, (p / 4) as f32);
        }

        for c in 0..num_colors {
            writer.write_scaled(c as f32 / 4.0, 16, 0.0, 1.0).unwrap();
        }

        writer.align();
    }

    let mesh = writer.finish();
    let data = single_page(
        b"/Sh1 sh",
        |resources| {
            resources.shadings().pair(Name(b"Sh1"), Ref::new(10));
        },
        |pdf| {
            let mut shading = pdf.stream_shading(Ref::new(10), &mesh);
            shading.shading_type(StreamShadingType::CoonsPatch);
            shading.color_space().device_gray();
            shading
                .bits_per_coordinate(16)
                .bits_per_component(16)
                .bits_per_flag(8)
                .decode([0.0, 10.0, 0.0, 10.0, 0.0, 1.0]);
        },
    );

    let (recorder, warnings) = interpret_document(data);
    assert!(warnings.is_empty());

    let runs = recorder
        .events
        .iter()
        .filter_map(|e| match e {
            Event::Mesh(mesh) => Some(mesh),
            _ => None,
        })
        .collect::<Vec<_>>();

    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].patches.len(), 3);

    let [first, second, _] = runs[0].patches.as_slice() else {
        panic!("expected three patches");
    };
    assert_eq!(second.points[..4], first.points[3..7]);
    assert_eq!(second.colors[..2], first.colors[1..3]);
}

#[test]
fn gradient_stops_cover_the_domain() {
    let data = single_page(
        b"/Sh1 sh",
        |resources| {
            resources.shadings().pair(Name(b"Sh1"), Ref::new(10));
        },
        |pdf| {
            pdf.exponential_function(Ref::new(11))
                .domain([0.0, 1.0])
                .c0([1.0, 0.0, 0.0])
                .c1([0.0, 1.0, 0.0])
                .n(1.0);
            pdf.exponential_function(Ref::new(12))
                .domain([0.0, 1.0])
                .c0([0.0, 1.0, 0.0])
                .c1([0.0, 0.0, 1.0])
                .n(1.0);
            pdf.stitching_function(Ref::new(13))
                .domain([0.0, 1.0])
                .functions([Ref::new(11), Ref::new(12)])
                .bounds([0.3])
                .encode([0.0, 1.0, 0.0, 1.0]);

            let mut shading = pdf.function_shading(Ref::new(10));
            shading.shading_type(FunctionShadingType::Axial);
            shading.color_space().device_rgb();
            shading
                .function(Ref::new(13))
                .coords([0.0, 0.0, 100.0, 0.0])
                .extend([true, true]);
        },
    );

    let (recorder, _) = interpret_document(data);
    let gradient = recorder.events.iter().find_map(|e| match e {
        Event::Linear(gradient) => Some(gradient),
        _ => None,
    });
    let gradient = gradient.unwrap();

    let offsets = gradient.stops.iter().map(|s| s.offset).collect::<Vec<_>>();
    assert_eq!(offsets.first(), Some(&0.0));
    assert_eq!(offsets.last(), Some(&1.0));
    assert!(offsets.is_sorted());
    assert!(offsets.iter().any(|o| (o - 0.3).abs() < 1e-4));
    assert_eq!(gradient.extend, [true, true]);
}
