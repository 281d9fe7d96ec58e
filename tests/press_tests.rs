//! Press tests: print engraved plates through the SVG renderer and a
//! recording renderer.

use scoreplate::duration::DurationEncoding;
use scoreplate::press::{GlyphMark, Press, Renderer, SvgRenderer};
use scoreplate::*;

fn sample() -> Document {
    let mut tied = Chord::new(DurationEncoding::new(4, 0), vec![Head::new(64).tied()]);
    tied.attachables.push(Attachable::text("dolce"));
    let objects = vec![
        ScoreObject::Clef(Clef::treble()),
        ScoreObject::Key(Key::flats(1)),
        ScoreObject::TimeSig(TimeSig::new(3, 4)),
        ScoreObject::Chord(tied),
        ScoreObject::Chord(Chord::tones(DurationEncoding::new(4, 0), &[64])),
        ScoreObject::Chord(Chord::tones(DurationEncoding::new(5, 0), &[60, 64, 67])),
        ScoreObject::Barline(Barline::final_bar()),
    ];
    Document::new(vec![Score::new(vec![Staff::new(Voice::new(objects))])])
}

#[derive(Default)]
struct Recorder {
    pages: Vec<usize>,
    lines: usize,
    rects: usize,
    polygons: usize,
    curves: usize,
    glyphs: Vec<String>,
    texts: Vec<String>,
    open: bool,
}

impl Renderer for Recorder {
    fn begin_page(&mut self, number: usize, _width: i64, _height: i64) {
        assert!(!self.open);
        self.open = true;
        self.pages.push(number);
    }

    fn line(&mut self, _from: Position, _to: Position, _thickness: i64) {
        self.lines += 1;
    }

    fn rect(&mut self, _rect: &Rect) {
        self.rects += 1;
    }

    fn polygon(&mut self, _points: &[Position]) {
        self.polygons += 1;
    }

    fn curve(&mut self, _points: &[Position; 4], _thickness: i64) {
        self.curves += 1;
    }

    fn glyph(&mut self, mark: &GlyphMark<'_>) {
        assert!(mark.codepoint.is_some(), "builtin glyph {} has no codepoint", mark.id);
        self.glyphs.push(mark.id.to_string());
    }

    fn text(&mut self, text: &str, _baseline: Position, _font_size: i64) {
        self.texts.push(text.to_string());
    }

    fn end_page(&mut self) {
        assert!(self.open);
        self.open = false;
    }
}

#[test]
fn press_visits_every_primitive() {
    let doc = sample();
    let glyphs = GlyphTable::builtin();
    let plate = engrave_document(&doc, &glyphs, &EngraveParams::default()).unwrap();

    let mut recorder = Recorder::default();
    Press::new(&glyphs, &doc.page).print(&plate, &mut recorder);

    assert_eq!(recorder.pages, vec![0]);
    // two beamed eighths
    assert_eq!(recorder.polygons, 1);
    // the tie
    assert_eq!(recorder.curves, 1);
    // final barline: thin and thick rule
    assert_eq!(recorder.rects, 2);
    assert_eq!(recorder.texts, vec!["dolce".to_string()]);
    // staff lines, stems and the ledger line of middle C at least
    assert!(recorder.lines >= 5 + 3 + 1);
    for name in ["clef.g", "acc.flat", "timesig.3", "timesig.4", "head.black"] {
        assert!(recorder.glyphs.iter().any(|g| g == name), "{} was not printed", name);
    }
}

#[test]
fn svg_output_has_one_document_per_page() {
    let doc = sample();
    let glyphs = GlyphTable::builtin();
    let pages = render_document_to_svg(&doc, &glyphs, &EngraveParams::default()).unwrap();

    assert_eq!(pages.len(), 1);
    let svg = &pages[0];
    assert!(svg.starts_with("<svg"), "Output should be SVG");
    assert!(svg.trim_end().ends_with("</svg>"), "SVG should be closed");
    assert!(svg.contains("<line"), "SVG should contain staff lines");
    assert!(svg.contains("<path"), "SVG should contain beams and ties");
    assert!(svg.contains("&#xE0A4;"), "SVG should contain black noteheads");
    assert!(svg.contains("dolce"));
}

#[test]
fn blank_pages_are_still_printed() {
    let doc = sample();
    let glyphs = GlyphTable::builtin();
    let plate = engrave_document(&doc, &glyphs, &EngraveParams::default()).unwrap();

    let mut svg = SvgRenderer::new();
    Press::new(&glyphs, &doc.page).print_page(&plate, 4, &mut svg);
    let pages = svg.into_pages();
    assert_eq!(pages.len(), 1);
    assert!(!pages[0].contains("<line"));
}
