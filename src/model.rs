//! Data model for an editable score.
//!
//! Staves own a main voice; chords and rests may host sub-voices that start
//! sounding at their own time point. The engraver only reads this tree, it is
//! created and mutated by the editing layer.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::duration::{Duration, DurationEncoding};
use crate::glyphs::{names, GlyphId};

static NEXT_ENTITY: AtomicU64 = AtomicU64::new(1);

/// Logical identity of a score entity (object, voice or attachable).
/// Stays the same across engraving passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Allocate a fresh, process-unique id.
    pub fn next() -> Self {
        EntityId(NEXT_ENTITY.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A document: one or more scores laid out on pages of the same size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub scores: Vec<Score>,
    /// Page size and margins
    pub page: PageLayout,
}

/// Page geometry in milli-pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub width: i64,
    pub height: i64,
    pub margin_left: i64,
    pub margin_right: i64,
    pub margin_top: i64,
    pub margin_bottom: i64,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            width: 820_000,
            height: 1_160_000,
            margin_left: 50_000,
            margin_right: 30_000,
            margin_top: 30_000,
            margin_bottom: 30_000,
        }
    }
}

impl PageLayout {
    pub fn content_right(&self) -> i64 {
        self.width - self.margin_right
    }

    pub fn content_bottom(&self) -> i64 {
        self.height - self.margin_bottom
    }
}

/// A score: a system of staves engraved line by line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub id: EntityId,
    pub staves: Vec<Staff>,
    /// Initial tempo (quarter notes per minute)
    pub tempo: u32,
    /// Layout of the first line
    pub layout: LineLayout,
}

/// One staff with its main voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub id: EntityId,
    pub voice: Voice,
    /// Half the distance between two staff lines, in milli-pixels
    pub head_height: i64,
    /// Number of staff lines
    pub line_count: u32,
    /// Gap between the previous staff's bottom line and this staff's top line
    pub distance: i64,
    /// Number of staves (starting here) joined by a brace
    pub brace: u32,
    /// Number of staves (starting here) joined by a bracket
    pub bracket: u32,
    /// Barlines run through to the next staff
    pub long_barlines: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StemDirection {
    #[default]
    Auto,
    Up,
    Down,
}

/// An ordered sequence of score objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    pub id: EntityId,
    pub objects: Vec<ScoreObject>,
    /// Stem direction for every chord that does not set its own
    pub stem_direction: StemDirection,
}

/// Voices hosted by a chord or rest. Voices before `first_below` are drawn
/// above the hosting voice, the others below it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubVoices {
    pub voices: Vec<Voice>,
    pub first_below: usize,
}

impl SubVoices {
    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn is_above(&self, index: usize) -> bool {
        index < self.first_below
    }
}

/// Every kind of object a voice can contain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScoreObject {
    Clef(Clef),
    Key(Key),
    TimeSig(TimeSig),
    CustomTimeSig(CustomTimeSig),
    Barline(Barline),
    Newline(Newline),
    Pagebreak(Newline),
    Chord(Chord),
    Rest(Rest),
}

impl ScoreObject {
    pub fn id(&self) -> EntityId {
        match self {
            ScoreObject::Clef(o) => o.id,
            ScoreObject::Key(o) => o.id,
            ScoreObject::TimeSig(o) => o.id,
            ScoreObject::CustomTimeSig(o) => o.id,
            ScoreObject::Barline(o) => o.id,
            ScoreObject::Newline(o) | ScoreObject::Pagebreak(o) => o.id,
            ScoreObject::Chord(o) => o.id,
            ScoreObject::Rest(o) => o.id,
        }
    }

    /// Sounding length; zero for everything but chords and rests.
    pub fn duration(&self) -> Duration {
        match self {
            ScoreObject::Chord(c) => c.duration.value(),
            ScoreObject::Rest(r) => r.duration.value(),
            _ => Duration::zero(),
        }
    }

    pub fn is_note(&self) -> bool {
        matches!(self, ScoreObject::Chord(_) | ScoreObject::Rest(_))
    }

    pub fn is_break(&self) -> bool {
        matches!(self, ScoreObject::Newline(_) | ScoreObject::Pagebreak(_))
    }

    pub fn attachables(&self) -> &[Attachable] {
        match self {
            ScoreObject::Chord(c) => &c.attachables,
            ScoreObject::Rest(r) => &r.attachables,
            ScoreObject::Clef(c) => &c.attachables,
            _ => &[],
        }
    }

    pub fn sub_voices(&self) -> Option<&SubVoices> {
        match self {
            ScoreObject::Chord(c) => Some(&c.sub_voices),
            ScoreObject::Rest(r) => Some(&r.sub_voices),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ScoreObject::Clef(_) => "clef",
            ScoreObject::Key(_) => "key",
            ScoreObject::TimeSig(_) => "time signature",
            ScoreObject::CustomTimeSig(_) => "custom time signature",
            ScoreObject::Barline(_) => "barline",
            ScoreObject::Newline(_) => "newline",
            ScoreObject::Pagebreak(_) => "pagebreak",
            ScoreObject::Chord(_) => "chord",
            ScoreObject::Rest(_) => "rest",
        }
    }
}

/// A clef. `base_tone` is the natural tone sitting on staff position `line`
/// (counted in head-heights from the top line, downwards).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clef {
    pub id: EntityId,
    pub glyph: GlyphId,
    pub base_tone: i32,
    pub line: i32,
    /// Highest tone a sharp of the key signature may be placed on
    pub sharp_bound: i32,
    /// Highest tone a flat of the key signature may be placed on
    pub flat_bound: i32,
    pub attachables: Vec<Attachable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyKind {
    Sharp,
    Flat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Key {
    pub id: EntityId,
    pub kind: KeyKind,
    /// Number of accidentals (0..=7)
    pub count: u8,
}

/// A numeric time signature, engraved as two stacked numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSig {
    pub id: EntityId,
    pub number: u32,
    pub beat: u32,
}

/// A time signature drawn with a single symbol (common time, alla breve).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomTimeSig {
    pub id: EntityId,
    pub glyph: GlyphId,
    pub number: u32,
    pub beat: u32,
}

/// A barline. `style` alternates line thickness and the gap after it, both
/// in thousandths of a head-height, so it must have an even length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Barline {
    pub id: EntityId,
    pub style: Vec<i32>,
    /// Dashed segments along the vertical span: `(dash, gap)`
    pub dash: Option<(i32, i32)>,
}

/// Layout of the line started by a newline (or of a score's first line).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineLayout {
    /// Gap to the previous line (first staff) or to the previous staff;
    /// `None` keeps the staff's own distance
    pub distance: Option<i64>,
    pub indent: i64,
    pub right_margin: i64,
    pub justify: bool,
    /// Justify even beyond the maximum justification factor
    pub forced_justification: bool,
}

impl Default for LineLayout {
    fn default() -> Self {
        Self {
            distance: None,
            indent: 0,
            right_margin: 0,
            justify: true,
            forced_justification: false,
        }
    }
}

/// A line or page break; `layout` applies to the line it starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Newline {
    pub id: EntityId,
    pub layout: LineLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BeamMode {
    /// Beam to the next chord when both are short enough
    #[default]
    Auto,
    /// Never beam to the next chord
    Break,
    /// Beam to the next chord even across rests and barlines
    Force,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chord {
    pub id: EntityId,
    pub duration: DurationEncoding,
    pub heads: Vec<Head>,
    pub stem: StemDirection,
    /// Relation to the next chord of the voice
    pub beam: BeamMode,
    /// Beams above this level stop before the next chord
    pub beam_cut: Option<u8>,
    pub articulations: Vec<Articulation>,
    pub attachables: Vec<Attachable>,
    pub sub_voices: SubVoices,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rest {
    pub id: EntityId,
    pub duration: DurationEncoding,
    /// Vertical displacement in head-heights (positive is downwards)
    pub offset_y: i32,
    pub attachables: Vec<Attachable>,
    pub sub_voices: SubVoices,
}

/// One pitched note of a chord.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Head {
    /// MIDI-style tone number (60 = middle C)
    pub tone: i32,
    pub accidental: Accidental,
    /// Additional displacement of this head's dots
    pub dot_offset: Offset,
    /// Tie to the same tone on the next chord of the voice
    pub tie: Option<TieSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccidentalKind {
    /// Spelled from the key signature and the accidentals already sounded
    #[default]
    Auto,
    DoubleFlat,
    Flat,
    Natural,
    Sharp,
    DoubleSharp,
}

impl AccidentalKind {
    /// Semitone modifier; `None` for [`AccidentalKind::Auto`].
    pub fn modifier(&self) -> Option<i32> {
        match self {
            AccidentalKind::Auto => None,
            AccidentalKind::DoubleFlat => Some(-2),
            AccidentalKind::Flat => Some(-1),
            AccidentalKind::Natural => Some(0),
            AccidentalKind::Sharp => Some(1),
            AccidentalKind::DoubleSharp => Some(2),
        }
    }

    pub fn from_modifier(modifier: i32) -> Self {
        match modifier {
            m if m <= -2 => AccidentalKind::DoubleFlat,
            -1 => AccidentalKind::Flat,
            0 => AccidentalKind::Natural,
            1 => AccidentalKind::Sharp,
            _ => AccidentalKind::DoubleSharp,
        }
    }

    pub fn glyph(&self) -> Option<GlyphId> {
        let name = match self {
            AccidentalKind::Auto => return None,
            AccidentalKind::DoubleFlat => names::DOUBLE_FLAT,
            AccidentalKind::Flat => names::FLAT,
            AccidentalKind::Natural => names::NATURAL,
            AccidentalKind::Sharp => names::SHARP,
            AccidentalKind::DoubleSharp => names::DOUBLE_SHARP,
        };
        Some(GlyphId::from(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Accidental {
    pub kind: AccidentalKind,
    /// Print the accidental even when key and measure already imply it
    pub forced: bool,
    /// Semitones added to the key's modifier of the head's natural step;
    /// overrides `kind`
    #[serde(default)]
    pub relative: Option<i32>,
}

/// A displacement in thousandths of a head-height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Offset {
    pub x: i32,
    pub y: i32,
}

impl Offset {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CurveDirection {
    #[default]
    Auto,
    Up,
    Down,
}

/// Geometry of a tie, relative to the two heads it connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TieSpec {
    pub offset1: Offset,
    pub offset2: Offset,
    /// Curve height; zero uses the engraving default
    pub curvature: i32,
    pub direction: CurveDirection,
}

/// An articulation symbol attached to a chord.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Articulation {
    pub glyph: GlyphId,
    /// Placed beyond the stem end instead of next to the note body
    pub far: bool,
}

/// What a coordinate of an attachable is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Anchor {
    Page,
    Line,
    Staff,
    #[default]
    Parent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Unit {
    /// Milli-pixels
    Metric,
    /// Thousandths of the staff's head-height
    #[default]
    HeadHeight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnchoredPosition {
    pub x: i64,
    pub y: i64,
    pub anchor_x: Anchor,
    pub anchor_y: Anchor,
    pub unit: Unit,
}

impl AnchoredPosition {
    /// Relative to the parent object, in head-height thousandths.
    pub fn parent(x: i64, y: i64) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }
}

/// A positioned object owned by a score object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachable {
    pub id: EntityId,
    pub position: AnchoredPosition,
    pub kind: AttachableKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AttachableKind {
    /// A single glyph
    Symbol { glyph: GlyphId },
    Text(TextArea),
    /// A symbol with a second anchor on a later object
    Durable(Durable),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextArea {
    pub text: String,
    /// Font size in thousandths of a head-height
    pub font_size: i32,
    /// Explicit box size (same unit as the position); estimated when absent
    pub width: Option<i64>,
    pub height: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurableKind {
    Slur { direction: CurveDirection },
    /// Opening hairpin for crescendo, closing for diminuendo
    Hairpin { crescendo: bool, height: i32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Durable {
    pub kind: DurableKind,
    /// The later object carrying the second anchor
    pub end: EntityId,
    /// Second anchor, relative to the end object
    pub end_position: AnchoredPosition,
    /// Curve controls relative to the straight connection (slurs only)
    pub control1: Offset,
    pub control2: Offset,
}

// ═══════════════════════════════════════════════════════════════════════
// Constructors
// ═══════════════════════════════════════════════════════════════════════

impl Document {
    pub fn new(scores: Vec<Score>) -> Self {
        Self {
            scores,
            page: PageLayout::default(),
        }
    }
}

impl Score {
    pub fn new(staves: Vec<Staff>) -> Self {
        Self {
            id: EntityId::next(),
            staves,
            tempo: 120,
            layout: LineLayout::default(),
        }
    }
}

impl Staff {
    pub fn new(voice: Voice) -> Self {
        Self {
            id: EntityId::next(),
            voice,
            head_height: 5000,
            line_count: 5,
            distance: 30_000,
            brace: 0,
            bracket: 0,
            long_barlines: false,
        }
    }
}

impl Voice {
    pub fn new(objects: Vec<ScoreObject>) -> Self {
        Self {
            id: EntityId::next(),
            objects,
            stem_direction: StemDirection::Auto,
        }
    }
}

impl Clef {
    fn with(glyph: &str, base_tone: i32, line: i32, sharp_bound: i32, flat_bound: i32) -> Self {
        Self {
            id: EntityId::next(),
            glyph: GlyphId::from(glyph),
            base_tone,
            line,
            sharp_bound,
            flat_bound,
            attachables: Vec::new(),
        }
    }

    /// G clef on the second line (G4).
    pub fn treble() -> Self {
        Self::with(names::CLEF_G, 67, 6, 79, 76)
    }

    /// F clef on the fourth line (F3).
    pub fn bass() -> Self {
        Self::with(names::CLEF_F, 53, 2, 55, 52)
    }

    /// C clef on the middle line (C4).
    pub fn alto() -> Self {
        Self::with(names::CLEF_C, 60, 4, 67, 64)
    }
}

impl Key {
    pub fn none() -> Self {
        Self::sharps(0)
    }

    pub fn sharps(count: u8) -> Self {
        Self {
            id: EntityId::next(),
            kind: KeyKind::Sharp,
            count: count.min(7),
        }
    }

    pub fn flats(count: u8) -> Self {
        Self {
            id: EntityId::next(),
            kind: KeyKind::Flat,
            count: count.min(7),
        }
    }

    /// Steps (C = 0 .. B = 6) carrying an accidental, in signature order.
    pub fn steps(&self) -> Vec<usize> {
        const SHARP_ORDER: [usize; 7] = [3, 0, 4, 1, 5, 2, 6]; // F C G D A E B
        const FLAT_ORDER: [usize; 7] = [6, 2, 5, 1, 4, 0, 3]; // B E A D G C F
        let order = match self.kind {
            KeyKind::Sharp => &SHARP_ORDER,
            KeyKind::Flat => &FLAT_ORDER,
        };
        order[..self.count.min(7) as usize].to_vec()
    }

    /// Semitone modifier implied for each step (C..B).
    pub fn modifiers(&self) -> [i32; 7] {
        let value = match self.kind {
            KeyKind::Sharp => 1,
            KeyKind::Flat => -1,
        };
        let mut modifiers = [0; 7];
        for step in self.steps() {
            modifiers[step] = value;
        }
        modifiers
    }

    /// Signed accidental count (sharps positive).
    pub fn fifths(&self) -> i32 {
        match self.kind {
            KeyKind::Sharp => self.count as i32,
            KeyKind::Flat => -(self.count as i32),
        }
    }
}

impl TimeSig {
    pub fn new(number: u32, beat: u32) -> Self {
        Self {
            id: EntityId::next(),
            number,
            beat,
        }
    }
}

impl CustomTimeSig {
    pub fn common() -> Self {
        Self {
            id: EntityId::next(),
            glyph: GlyphId::from(names::TIMESIG_COMMON),
            number: 4,
            beat: 4,
        }
    }
}

impl Barline {
    pub fn with_style(style: Vec<i32>) -> Self {
        Self {
            id: EntityId::next(),
            style,
            dash: None,
        }
    }

    pub fn single() -> Self {
        Self::with_style(vec![320, 0])
    }

    pub fn double() -> Self {
        Self::with_style(vec![320, 800, 320, 0])
    }

    pub fn final_bar() -> Self {
        Self::with_style(vec![320, 800, 1000, 0])
    }
}

impl Newline {
    pub fn new(layout: LineLayout) -> Self {
        Self {
            id: EntityId::next(),
            layout,
        }
    }
}

impl Chord {
    pub fn new(duration: DurationEncoding, heads: Vec<Head>) -> Self {
        Self {
            id: EntityId::next(),
            duration,
            heads,
            stem: StemDirection::Auto,
            beam: BeamMode::Auto,
            beam_cut: None,
            articulations: Vec::new(),
            attachables: Vec::new(),
            sub_voices: SubVoices::default(),
        }
    }

    /// A chord with plain (auto-spelled) heads.
    pub fn tones(duration: DurationEncoding, tones: &[i32]) -> Self {
        Self::new(duration, tones.iter().map(|&t| Head::new(t)).collect())
    }
}

impl Rest {
    pub fn new(duration: DurationEncoding) -> Self {
        Self {
            id: EntityId::next(),
            duration,
            offset_y: 0,
            attachables: Vec::new(),
            sub_voices: SubVoices::default(),
        }
    }
}

impl Head {
    pub fn new(tone: i32) -> Self {
        Self {
            tone,
            accidental: Accidental::default(),
            dot_offset: Offset::default(),
            tie: None,
        }
    }

    pub fn with_accidental(mut self, kind: AccidentalKind) -> Self {
        self.accidental.kind = kind;
        self
    }

    pub fn forced(mut self) -> Self {
        self.accidental.forced = true;
        self
    }

    /// Write the head on its natural step, `offset` semitones from what the
    /// key signature implies for that step.
    pub fn relative(mut self, offset: i32) -> Self {
        self.accidental.relative = Some(offset);
        self
    }

    pub fn tied(mut self) -> Self {
        self.tie = Some(TieSpec::default());
        self
    }
}

impl Attachable {
    pub fn new(position: AnchoredPosition, kind: AttachableKind) -> Self {
        Self {
            id: EntityId::next(),
            position,
            kind,
        }
    }

    /// Text below the staff, left-aligned with the parent.
    pub fn text(text: &str) -> Self {
        let below = AnchoredPosition {
            anchor_y: Anchor::Staff,
            ..AnchoredPosition::parent(0, 11_000)
        };
        Self::new(
            below,
            AttachableKind::Text(TextArea {
                text: text.to_string(),
                font_size: 2400,
                width: None,
                height: None,
            }),
        )
    }

    pub fn slur(end: EntityId) -> Self {
        Self::new(
            AnchoredPosition::parent(0, -1500),
            AttachableKind::Durable(Durable {
                kind: DurableKind::Slur {
                    direction: CurveDirection::Auto,
                },
                end,
                end_position: AnchoredPosition::parent(0, -1500),
                control1: Offset::new(0, -2000),
                control2: Offset::new(0, -2000),
            }),
        )
    }

    /// A hairpin below the staff, from this object to `end`.
    pub fn hairpin(end: EntityId, crescendo: bool) -> Self {
        let below = AnchoredPosition {
            anchor_y: Anchor::Staff,
            ..AnchoredPosition::parent(0, 12_000)
        };
        Self::new(
            below,
            AttachableKind::Durable(Durable {
                kind: DurableKind::Hairpin {
                    crescendo,
                    height: 1800,
                },
                end,
                end_position: below,
                control1: Offset::default(),
                control2: Offset::default(),
            }),
        )
    }
}
