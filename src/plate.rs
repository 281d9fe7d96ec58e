//! The plate: positioned graphical primitives of an engraved score.
//!
//! A plate is rebuilt by every pass. Notes live in an arena per score and
//! are addressed by [`NoteId`]; pages, lines and voices only hold indices.
//! All coordinates are absolute milli-pixels on the page.

use std::ops::{Add, Sub};

use serde::Serialize;

use crate::duration::Duration;
use crate::glyphs::GlyphId;
use crate::model::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn shifted(self, dx: i64) -> Self {
        Self { x: self.x + dx, y: self.y }
    }
}

impl Add for Position {
    type Output = Position;
    fn add(self, rhs: Self) -> Self::Output {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Position {
    type Output = Position;
    fn sub(self, rhs: Self) -> Self::Output {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// An axis-aligned box. The default box is empty and vanishes in unions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl Default for Rect {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Rect {
    pub const EMPTY: Rect = Rect {
        left: i64::MAX,
        top: i64::MAX,
        right: i64::MIN,
        bottom: i64::MIN,
    };

    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
        }
    }

    pub fn from_size(origin: Position, width: i64, height: i64) -> Self {
        Self::new(origin.x, origin.y, origin.x + width, origin.y + height)
    }

    pub fn around(points: &[Position]) -> Self {
        let mut rect = Rect::EMPTY;
        for p in points {
            rect.include(*p);
        }
        rect
    }

    pub fn is_empty(&self) -> bool {
        self.left > self.right || self.top > self.bottom
    }

    pub fn width(&self) -> i64 {
        if self.is_empty() { 0 } else { self.right - self.left }
    }

    pub fn height(&self) -> i64 {
        if self.is_empty() { 0 } else { self.bottom - self.top }
    }

    pub fn contains(&self, p: Position) -> bool {
        !self.is_empty() && p.x >= self.left && p.x <= self.right && p.y >= self.top && p.y <= self.bottom
    }

    /// Grow this box to cover `other`.
    pub fn extend(&mut self, other: &Rect) {
        if other.is_empty() {
            return;
        }
        self.left = self.left.min(other.left);
        self.top = self.top.min(other.top);
        self.right = self.right.max(other.right);
        self.bottom = self.bottom.max(other.bottom);
    }

    pub fn include(&mut self, p: Position) {
        self.extend(&Rect::new(p.x, p.y, p.x, p.y));
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let mut out = *self;
        out.extend(other);
        out
    }

    pub fn inflate(&self, by: i64) -> Rect {
        if self.is_empty() {
            return *self;
        }
        Rect::new(self.left - by, self.top - by, self.right + by, self.bottom + by)
    }

    pub fn shifted(&self, dx: i64) -> Rect {
        if self.is_empty() {
            return *self;
        }
        Rect::new(self.left + dx, self.top, self.right + dx, self.bottom)
    }
}

/// Index of a note in its score's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NoteId(pub usize);

/// Role of a standalone glyph within a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GlyphRole {
    Main,
    KeyAccidental,
    Cancel,
    Digit,
    Accidental,
    Dot,
    Flag,
    Articulation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateGlyph {
    pub id: GlyphId,
    pub role: GlyphRole,
    /// Top-left corner
    pub position: Position,
    pub width: i64,
    pub height: i64,
}

impl PlateGlyph {
    pub fn bounding_box(&self) -> Rect {
        Rect::from_size(self.position, self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateHead {
    pub tone: i32,
    pub glyph: GlyphId,
    /// Top-left corner of the head glyph
    pub position: Position,
    pub width: i64,
    pub height: i64,
    /// Staff position (head-heights below the top line)
    pub staff_position: i32,
    /// Moved to the other side of the stem by a cluster
    pub opposite: bool,
}

impl PlateHead {
    pub fn center(&self) -> Position {
        Position::new(self.position.x + self.width / 2, self.position.y + self.height / 2)
    }

    pub fn bounding_box(&self) -> Rect {
        Rect::from_size(self.position, self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlateStem {
    pub x: i64,
    /// Stem end at the heads
    pub base: i64,
    /// Free stem end (where flags and beams attach)
    pub tip: i64,
    pub thickness: i64,
    pub up: bool,
}

impl PlateStem {
    pub fn bounding_box(&self) -> Rect {
        Rect::new(self.x - self.thickness / 2, self.base, self.x + self.thickness / 2, self.tip)
    }
}

/// A run of equally spaced ledger lines on one side of the staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerRun {
    pub x: i64,
    pub width: i64,
    /// Y of the line nearest to the staff
    pub first_y: i64,
    /// Signed distance between lines (negative above the staff)
    pub spacing: i64,
    pub count: u32,
    pub thickness: i64,
    /// Widened for heads on both sides of the stem
    pub wide: bool,
}

impl LedgerRun {
    pub fn bounding_box(&self) -> Rect {
        if self.count == 0 {
            return Rect::EMPTY;
        }
        let last = self.first_y + self.spacing * (self.count as i64 - 1);
        Rect::new(self.x, self.first_y, self.x + self.width, last).inflate(self.thickness / 2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Broken {
    /// Both ends belong to this line
    No,
    /// Runs out at the end of the line
    End,
    /// Comes in from the start of the line
    Start,
    /// Spans the whole line
    Both,
}

/// A cubic curve (tie or slur) with its line thickness.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateCurve {
    pub points: [Position; 4],
    pub thickness: i64,
    /// Note carrying the second anchor, if on this line
    pub end_note: Option<NoteId>,
    pub broken: Broken,
    /// Tied tone, for ties
    pub tone: Option<i32>,
}

impl PlateCurve {
    pub fn bounding_box(&self) -> Rect {
        cubic_bounding_box(&self.points).inflate(self.thickness / 2 + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stroke {
    pub from: Position,
    pub to: Position,
    pub thickness: i64,
}

impl Stroke {
    pub fn bounding_box(&self) -> Rect {
        Rect::around(&[self.from, self.to]).inflate(self.thickness / 2)
    }
}

/// One beam line between two stems (or a short stub).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeamSegment {
    /// 1 for the eighth-note beam, 2 for sixteenths, ...
    pub level: u8,
    pub from: Position,
    pub to: Position,
    pub thickness: i64,
    pub short: bool,
    pub end_note: Option<NoteId>,
}

impl BeamSegment {
    pub fn bounding_box(&self) -> Rect {
        let down = Position::new(0, self.thickness);
        Rect::around(&[self.from, self.to, self.from + down, self.to + down])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AttachableShape {
    Glyph(GlyphId),
    Text { text: String, font_size: i64 },
    Curve(PlateCurve),
    Hairpin { strokes: Vec<Stroke>, end_note: Option<NoteId>, broken: Broken },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateAttachable {
    pub object: EntityId,
    pub position: Position,
    pub shape: AttachableShape,
    pub bounding_box: Rect,
}

/// Everything engraved for one score object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateNote {
    pub object: EntityId,
    pub voice: EntityId,
    pub staff: usize,
    pub time: Duration,
    /// Generated by the engraver (line-start clef and key), not in the score
    pub generated: bool,
    /// X of the object's column, Y of the staff's top line
    pub position: Position,
    /// Box of the object's own glyphs or heads
    pub glyph_box: Rect,
    /// Box of everything below
    pub bounding_box: Rect,
    pub glyphs: Vec<PlateGlyph>,
    pub heads: Vec<PlateHead>,
    pub stem: Option<PlateStem>,
    pub ledgers: Vec<LedgerRun>,
    pub ties: Vec<PlateCurve>,
    pub beams: Vec<BeamSegment>,
    /// Filled rectangles (barline segments)
    pub rules: Vec<Rect>,
    pub strokes: Vec<Stroke>,
    pub attachables: Vec<PlateAttachable>,
    /// Heads on both sides of the stem
    pub cluster: bool,
}

impl PlateNote {
    pub fn new(object: EntityId, voice: EntityId, staff: usize, time: Duration, position: Position) -> Self {
        Self {
            object,
            voice,
            staff,
            time,
            generated: false,
            position,
            glyph_box: Rect::EMPTY,
            bounding_box: Rect::EMPTY,
            glyphs: Vec::new(),
            heads: Vec::new(),
            stem: None,
            ledgers: Vec::new(),
            ties: Vec::new(),
            beams: Vec::new(),
            rules: Vec::new(),
            strokes: Vec::new(),
            attachables: Vec::new(),
            cluster: false,
        }
    }

    /// Recompute both boxes from the note's geometry.
    pub fn refresh_boxes(&mut self) {
        let mut glyph_box = Rect::EMPTY;
        for head in &self.heads {
            glyph_box.extend(&head.bounding_box());
        }
        for glyph in self.glyphs.iter().filter(|g| matches!(g.role, GlyphRole::Main | GlyphRole::KeyAccidental | GlyphRole::Cancel | GlyphRole::Digit)) {
            glyph_box.extend(&glyph.bounding_box());
        }
        for rule in &self.rules {
            glyph_box.extend(rule);
        }

        let mut bbox = glyph_box;
        for glyph in &self.glyphs {
            bbox.extend(&glyph.bounding_box());
        }
        if let Some(stem) = &self.stem {
            bbox.extend(&stem.bounding_box());
        }
        for run in &self.ledgers {
            bbox.extend(&run.bounding_box());
        }
        for tie in &self.ties {
            bbox.extend(&tie.bounding_box());
        }
        for beam in &self.beams {
            bbox.extend(&beam.bounding_box());
        }
        for stroke in &self.strokes {
            bbox.extend(&stroke.bounding_box());
        }
        for attachable in &self.attachables {
            bbox.extend(&attachable.bounding_box);
        }
        self.glyph_box = glyph_box;
        self.bounding_box = bbox;
    }

    /// Right edge of the object's own glyphs.
    pub fn right(&self) -> i64 {
        if self.glyph_box.is_empty() { self.position.x } else { self.glyph_box.right }
    }

    pub fn is_at_line_start(&self) -> bool {
        self.generated
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateStaff {
    pub staff: EntityId,
    /// Y of the top line
    pub top: i64,
    pub line_count: u32,
    pub head_height: i64,
    pub line_thickness: i64,
}

impl PlateStaff {
    pub fn bottom(&self) -> i64 {
        self.top + 2 * self.head_height * (self.line_count.max(1) as i64 - 1)
    }
}

/// Staves joined by a brace or bracket at the line start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StaffGroup {
    pub first: usize,
    pub last: usize,
    pub top: i64,
    pub bottom: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateVoice {
    pub voice: EntityId,
    pub staff: usize,
    pub notes: Vec<NoteId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateLine {
    /// Left end of the staff lines
    pub left: i64,
    /// Right end of the staff lines
    pub right: i64,
    pub staves: Vec<PlateStaff>,
    pub voices: Vec<PlateVoice>,
    pub braces: Vec<StaffGroup>,
    pub brackets: Vec<StaffGroup>,
    pub bounding_box: Rect,
    pub justified: bool,
    /// Number of the measure the line starts with
    pub first_measure: u32,
}

impl PlateLine {
    pub fn voice_mut(&mut self, voice: EntityId, staff: usize) -> &mut PlateVoice {
        if let Some(idx) = self.voices.iter().position(|v| v.voice == voice) {
            return &mut self.voices[idx];
        }
        self.voices.push(PlateVoice {
            voice,
            staff,
            notes: Vec::new(),
        });
        let last = self.voices.len() - 1;
        &mut self.voices[last]
    }

    pub fn notes(&self) -> impl Iterator<Item = NoteId> + '_ {
        self.voices.iter().flat_map(|v| v.notes.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatePage {
    /// Page number within the document (0-based)
    pub number: usize,
    pub lines: Vec<PlateLine>,
}

/// The engraved form of one score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateScore {
    pub score: EntityId,
    /// Page the score starts on
    pub first_page: usize,
    /// Bottom of the content above the score on its first page
    pub start_y: Option<i64>,
    /// Tempo in quarter notes per minute
    pub tempo: u32,
    pub pages: Vec<PlatePage>,
    notes: Vec<PlateNote>,
}

impl PlateScore {
    pub fn new(score: EntityId) -> Self {
        Self {
            score,
            first_page: 0,
            start_y: None,
            tempo: 120,
            pages: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Id the next pushed note will get.
    pub fn next_id(&self) -> NoteId {
        NoteId(self.notes.len())
    }

    pub fn push(&mut self, note: PlateNote) -> NoteId {
        self.notes.push(note);
        NoteId(self.notes.len() - 1)
    }

    pub fn note(&self, id: NoteId) -> Option<&PlateNote> {
        self.notes.get(id.0)
    }

    pub fn note_mut(&mut self, id: NoteId) -> Option<&mut PlateNote> {
        self.notes.get_mut(id.0)
    }

    pub fn notes(&self) -> &[PlateNote] {
        &self.notes
    }

    /// Plate notes engraved for a score object (generated ones excluded).
    pub fn find(&self, object: EntityId) -> Option<NoteId> {
        self.notes
            .iter()
            .position(|n| n.object == object && !n.generated)
            .map(NoteId)
    }

    pub fn lines(&self) -> impl Iterator<Item = &PlateLine> + '_ {
        self.pages.iter().flat_map(|p| p.lines.iter())
    }

    /// Notes on a page whose bounding box contains the point.
    pub fn hit_test(&self, page: usize, point: Position) -> Vec<NoteId> {
        self.pages
            .iter()
            .filter(|p| p.number == page)
            .flat_map(|p| p.lines.iter())
            .filter(|l| l.bounding_box.contains(point))
            .flat_map(|l| l.notes())
            .filter(|id| self.note(*id).is_some_and(|n| n.bounding_box.contains(point)))
            .collect()
    }
}

/// The whole engraved document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plate {
    pub scores: Vec<PlateScore>,
}

impl Plate {
    pub fn page_count(&self) -> usize {
        self.scores
            .iter()
            .flat_map(|s| s.pages.iter())
            .map(|p| p.number + 1)
            .max()
            .unwrap_or(0)
    }

    /// Hits on a page across all scores, as `(score index, note)`.
    pub fn hit_test(&self, page: usize, point: Position) -> Vec<(usize, NoteId)> {
        self.scores
            .iter()
            .enumerate()
            .flat_map(|(i, s)| s.hit_test(page, point).into_iter().map(move |n| (i, n)))
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Curve geometry
// ═══════════════════════════════════════════════════════════════════════

/// Tight box of a cubic Bézier curve: the end points plus every parametric
/// extremum of each coordinate inside (0, 1).
pub fn cubic_bounding_box(points: &[Position; 4]) -> Rect {
    let mut rect = Rect::around(&[points[0], points[3]]);
    let xs = points.map(|p| p.x as f64);
    let ys = points.map(|p| p.y as f64);
    for t in extrema(&xs).into_iter().chain(extrema(&ys)) {
        let x = cubic_at(&xs, t).round() as i64;
        let y = cubic_at(&ys, t).round() as i64;
        rect.include(Position::new(x, y));
    }
    rect
}

fn cubic_at(c: &[f64; 4], t: f64) -> f64 {
    let u = 1.0 - t;
    u * u * u * c[0] + 3.0 * u * u * t * c[1] + 3.0 * u * t * t * c[2] + t * t * t * c[3]
}

/// Roots in (0, 1) of the derivative of one coordinate.
fn extrema(c: &[f64; 4]) -> Vec<f64> {
    // B'(t) / 3 = a t^2 + b t + k
    let a = -c[0] + 3.0 * c[1] - 3.0 * c[2] + c[3];
    let b = 2.0 * (c[0] - 2.0 * c[1] + c[2]);
    let k = c[1] - c[0];
    const EPS: f64 = 1e-9;

    let roots = if a.abs() < EPS {
        if b.abs() < EPS {
            // linear curve, monotonic
            Vec::new()
        } else {
            vec![-k / b]
        }
    } else {
        let disc = b * b - 4.0 * a * k;
        if disc < 0.0 {
            Vec::new()
        } else if disc.abs() < EPS {
            vec![-b / (2.0 * a)]
        } else {
            let sq = disc.sqrt();
            vec![(-b + sq) / (2.0 * a), (-b - sq) / (2.0 * a)]
        }
    };
    roots.into_iter().filter(|t| *t > 0.0 && *t < 1.0).collect()
}
