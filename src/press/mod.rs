//! Reference press: walks a plate and issues drawing calls.
//!
//! The press knows nothing about output formats. It turns every primitive
//! of a plate page into calls on a [`Renderer`]; [`SvgRenderer`] is the
//! renderer shipped with the crate.

mod svg_builder;

use crate::glyphs::{GlyphId, GlyphTable};
use crate::model::PageLayout;
use crate::plate::{
    AttachableShape, BeamSegment, PlateCurve, PlateLine, PlateNote, PlateScore, PlateStaff, Plate, Position, Rect,
    StaffGroup,
};

pub use svg_builder::SvgRenderer;

/// A glyph ready to be drawn.
#[derive(Debug, Clone)]
pub struct GlyphMark<'a> {
    pub id: &'a GlyphId,
    /// Font character, when the table knows one
    pub codepoint: Option<char>,
    pub bounding_box: Rect,
    /// Y of the glyph's anchor (the text baseline for font output)
    pub baseline: i64,
    /// Font size matching the staff's head-height
    pub font_size: i64,
}

/// Drawing surface. All coordinates are milli-pixels on the page.
pub trait Renderer {
    fn begin_page(&mut self, number: usize, width: i64, height: i64);
    fn line(&mut self, from: Position, to: Position, thickness: i64);
    fn rect(&mut self, rect: &Rect);
    fn polygon(&mut self, points: &[Position]);
    fn curve(&mut self, points: &[Position; 4], thickness: i64);
    fn glyph(&mut self, mark: &GlyphMark<'_>);
    fn text(&mut self, text: &str, baseline: Position, font_size: i64);
    fn end_page(&mut self);
}

pub struct Press<'a> {
    glyphs: &'a GlyphTable,
    page: &'a PageLayout,
}

impl<'a> Press<'a> {
    pub fn new(glyphs: &'a GlyphTable, page: &'a PageLayout) -> Self {
        Self { glyphs, page }
    }

    /// Print every page of the plate, in page order.
    pub fn print(&self, plate: &Plate, renderer: &mut impl Renderer) {
        for number in 0..plate.page_count() {
            self.print_page(plate, number, renderer);
        }
    }

    /// Print one page. Pages without content come out blank.
    pub fn print_page(&self, plate: &Plate, number: usize, renderer: &mut impl Renderer) {
        renderer.begin_page(number, self.page.width, self.page.height);
        for score in &plate.scores {
            for page in score.pages.iter().filter(|p| p.number == number) {
                for line in &page.lines {
                    self.print_line(score, line, renderer);
                }
            }
        }
        renderer.end_page();
    }

    fn print_line(&self, score: &PlateScore, line: &PlateLine, renderer: &mut impl Renderer) {
        for staff in &line.staves {
            staff_lines(line, staff, renderer);
        }
        let head_height = line.staves.first().map_or(5000, |s| s.head_height);
        for group in &line.brackets {
            bracket(line.left, group, head_height, renderer);
        }
        for group in &line.braces {
            brace(line.left, group, head_height, renderer);
        }
        if let (Some(first), Some(last)) = (line.staves.first(), line.staves.last()) {
            let thickness = first.line_thickness;
            renderer.line(
                Position::new(line.left, first.top),
                Position::new(line.left, last.bottom()),
                thickness,
            );
        }

        for id in line.notes() {
            let Some(note) = score.note(id) else {
                log::warn!("line refers to missing plate note {:?}", id);
                continue;
            };
            let head_height = line.staves.get(note.staff).map_or(head_height, |s| s.head_height);
            self.print_note(note, head_height, renderer);
        }
    }

    fn print_note(&self, note: &PlateNote, head_height: i64, renderer: &mut impl Renderer) {
        for rule in &note.rules {
            renderer.rect(rule);
        }
        for run in &note.ledgers {
            for k in 0..run.count as i64 {
                let y = run.first_y + run.spacing * k;
                renderer.line(Position::new(run.x, y), Position::new(run.x + run.width, y), run.thickness);
            }
        }
        for head in &note.heads {
            let mark = self.mark(&head.glyph, head.bounding_box(), head_height);
            renderer.glyph(&mark);
        }
        for glyph in &note.glyphs {
            let mark = self.mark(&glyph.id, glyph.bounding_box(), head_height);
            renderer.glyph(&mark);
        }
        if let Some(stem) = &note.stem {
            renderer.line(Position::new(stem.x, stem.base), Position::new(stem.x, stem.tip), stem.thickness);
        }
        for beam in &note.beams {
            renderer.polygon(&beam_outline(beam));
        }
        for stroke in &note.strokes {
            renderer.line(stroke.from, stroke.to, stroke.thickness);
        }
        for tie in &note.ties {
            print_curve(tie, renderer);
        }

        for attachable in &note.attachables {
            match &attachable.shape {
                AttachableShape::Glyph(id) => {
                    let mark = self.mark(id, attachable.bounding_box, head_height);
                    renderer.glyph(&mark);
                }
                AttachableShape::Text { text, font_size } => {
                    renderer.text(text, attachable.position, *font_size);
                }
                AttachableShape::Curve(curve) => print_curve(curve, renderer),
                AttachableShape::Hairpin { strokes, .. } => {
                    for stroke in strokes {
                        renderer.line(stroke.from, stroke.to, stroke.thickness);
                    }
                }
            }
        }
    }

    fn mark<'g>(&self, id: &'g GlyphId, bounding_box: Rect, head_height: i64) -> GlyphMark<'g> {
        let codepoint = self
            .glyphs
            .get(id)
            .and_then(|info| info.integers.get("codepoint"))
            .and_then(|&c| u32::try_from(c).ok())
            .and_then(char::from_u32);
        let baseline = bounding_box.top + self.glyphs.scaled(id, head_height).anchor_y();
        GlyphMark {
            id,
            codepoint,
            bounding_box,
            baseline,
            // an em is four staff spaces
            font_size: 8 * head_height,
        }
    }
}

fn staff_lines(line: &PlateLine, staff: &PlateStaff, renderer: &mut impl Renderer) {
    for k in 0..staff.line_count as i64 {
        let y = staff.top + 2 * staff.head_height * k;
        renderer.line(Position::new(line.left, y), Position::new(line.right, y), staff.line_thickness);
    }
}

fn bracket(left: i64, group: &StaffGroup, head_height: i64, renderer: &mut impl Renderer) {
    let x = left - head_height;
    let width = head_height / 2;
    renderer.rect(&Rect::new(x - width, group.top - head_height / 2, x, group.bottom + head_height / 2));
}

/// A brace drawn as two mirrored curves.
fn brace(left: i64, group: &StaffGroup, head_height: i64, renderer: &mut impl Renderer) {
    let x = left - 2 * head_height;
    let depth = head_height;
    let middle = (group.top + group.bottom) / 2;
    let thickness = head_height / 3;
    let upper = [
        Position::new(x, group.top),
        Position::new(x - depth, group.top + (middle - group.top) / 3),
        Position::new(x + depth / 2, middle - (middle - group.top) / 3),
        Position::new(x - depth, middle),
    ];
    let lower = [
        Position::new(x - depth, middle),
        Position::new(x + depth / 2, middle + (group.bottom - middle) / 3),
        Position::new(x - depth, group.bottom - (group.bottom - middle) / 3),
        Position::new(x, group.bottom),
    ];
    renderer.curve(&upper, thickness);
    renderer.curve(&lower, thickness);
}

fn print_curve(curve: &PlateCurve, renderer: &mut impl Renderer) {
    renderer.curve(&curve.points, curve.thickness);
}

/// Corners of a beam segment, clockwise from the start's top.
fn beam_outline(beam: &BeamSegment) -> [Position; 4] {
    let down = Position::new(0, beam.thickness);
    [beam.from, beam.to, beam.to + down, beam.from + down]
}
