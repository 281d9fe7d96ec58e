//! Running interpreter state threaded through an engraving pass.
//!
//! Placement rules update these contexts as they go: the staff context
//! follows clef, key and the accidentals already sounded in the measure,
//! the voice context remembers the last placed object, the line context
//! holds per-staff line geometry and the score context the tempo and
//! measure count.

use std::collections::HashMap;

use crate::duration::Duration;
use crate::model::{AccidentalKind, Clef, Head, Key, KeyKind, Staff};
use crate::plate::NoteId;

/// Semitone of each natural step, C..B.
const WHITE_KEYS: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Absolute diatonic step (octave * 7 + C..B) of a natural tone, or `None`
/// when the tone is not a natural.
pub fn diatonic_step(tone: i32) -> Option<i32> {
    let pitch_class = tone.rem_euclid(12);
    let octave = tone.div_euclid(12);
    WHITE_KEYS
        .iter()
        .position(|&w| w == pitch_class)
        .map(|idx| octave * 7 + idx as i32)
}

/// Natural tone of an absolute diatonic step.
pub fn step_tone(step: i32) -> i32 {
    step.div_euclid(7) * 12 + WHITE_KEYS[step.rem_euclid(7) as usize]
}

/// How a tone is written: the staff step and its chromatic modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spelling {
    pub step: i32,
    pub modifier: i32,
}

impl Spelling {
    pub fn accidental(&self) -> AccidentalKind {
        AccidentalKind::from_modifier(self.modifier)
    }

    /// The tone this spelling sounds.
    pub fn tone(&self) -> i32 {
        step_tone(self.step) + self.modifier
    }
}

/// Clef, key and accidental memory of one staff.
#[derive(Debug, Clone)]
pub struct StaffContext {
    pub clef: Clef,
    pub key: Key,
    /// Active time signature `(number, beat)`
    pub time: Option<(u32, u32)>,
    pub head_height: i64,
    pub line_count: u32,
    /// Accidentals sounded in the current measure, by absolute step.
    accidentals: HashMap<i32, i32>,
    /// Onset of the current measure, unknown before the first barline
    measure_start: Option<Duration>,
}

impl StaffContext {
    pub fn new(staff: &Staff) -> Self {
        Self {
            clef: Clef::treble(),
            key: Key::none(),
            time: None,
            head_height: staff.head_height,
            line_count: staff.line_count,
            accidentals: HashMap::new(),
            measure_start: None,
        }
    }

    pub fn set_clef(&mut self, clef: &Clef) {
        self.clef = clef.clone();
    }

    /// Change the key; accidentals remembered so far stay valid until the
    /// next barline.
    pub fn set_key(&mut self, key: &Key) {
        self.key = key.clone();
    }

    pub fn base_clef_tone(&self) -> i32 {
        self.clef.base_tone
    }

    /// Close the measure ending at `end`. Returns the written and the
    /// expected length when they disagree with the active time signature.
    /// The first measure may be a pickup and is not checked.
    pub fn close_measure(&mut self, end: Duration) -> Option<(Duration, Duration)> {
        let start = self.measure_start.replace(end)?;
        let (number, beat) = self.time?;
        let expected = Duration::new(number as i64, beat as i64)?;
        let written = end - start;
        (!written.is_zero() && written != expected).then_some((written, expected))
    }

    /// Forget the accidentals of the finished measure.
    pub fn reset_accidentals(&mut self) {
        self.accidentals.clear();
    }

    /// Modifier a step carries without an explicit accidental.
    pub fn implied_modifier(&self, step: i32) -> i32 {
        self.accidentals
            .get(&step)
            .copied()
            .unwrap_or_else(|| self.key.modifiers()[step.rem_euclid(7) as usize])
    }

    /// Spell a head. A relative accidental writes the head's natural step
    /// with the key's modifier shifted by the offset. Explicit accidentals
    /// are honored when they describe the tone; everything else is spelled
    /// from memory and key signature.
    pub fn spell(&self, head: &Head) -> Spelling {
        if let Some(relative) = head.accidental.relative {
            match diatonic_step(head.tone) {
                Some(step) => return self.relative_accidental(step, relative),
                None => log::warn!(
                    "relative accidental on tone {} which is not a natural, spelling it without",
                    head.tone
                ),
            }
        }
        if let Some(modifier) = head.accidental.kind.modifier() {
            match diatonic_step(head.tone - modifier) {
                Some(step) => return Spelling { step, modifier },
                None => log::warn!(
                    "tone {} cannot be written with {:?}, spelling it automatically",
                    head.tone,
                    head.accidental.kind
                ),
            }
        }
        self.spell_auto(head.tone)
    }

    fn spell_auto(&self, tone: i32) -> Spelling {
        for modifier in [0, -1, 1, -2, 2] {
            if let Some(step) = diatonic_step(tone - modifier) {
                if self.implied_modifier(step) == modifier {
                    return Spelling { step, modifier };
                }
            }
        }
        if let Some(step) = diatonic_step(tone) {
            return Spelling { step, modifier: 0 };
        }
        let modifier = if self.key.kind == KeyKind::Flat && self.key.count > 0 {
            -1
        } else {
            1
        };
        // A black key is always one semitone from a natural.
        let step = diatonic_step(tone - modifier).unwrap_or_default();
        Spelling { step, modifier }
    }

    /// Whether a spelled head needs a printed accidental.
    pub fn accidental_visible(&self, spelling: &Spelling, forced: bool) -> bool {
        forced || self.implied_modifier(spelling.step) != spelling.modifier
    }

    pub fn is_accidental_visible(&self, head: &Head) -> bool {
        let spelling = self.spell(head);
        self.accidental_visible(&spelling, head.accidental.forced)
    }

    pub fn remember(&mut self, spelling: &Spelling) {
        self.accidentals.insert(spelling.step, spelling.modifier);
    }

    /// Spell a step with an accidental relative to the key: the key's
    /// modifier plus `relative`, saturated at double flat / double sharp.
    pub fn relative_accidental(&self, step: i32, relative: i32) -> Spelling {
        let modifier = (self.key.modifiers()[step.rem_euclid(7) as usize] + relative).clamp(-2, 2);
        Spelling { step, modifier }
    }

    /// Staff position (head-heights below the top line) of a step.
    pub fn position(&self, step: i32) -> i32 {
        let base = diatonic_step(self.clef.base_tone).unwrap_or_default();
        self.clef.line - (step - base)
    }

    /// Vertical offset of a spelled head from the top line, in milli-pixels.
    pub fn note_offset(&self, spelling: &Spelling) -> i64 {
        self.position(spelling.step) as i64 * self.head_height
    }

    /// Ledger lines needed at a staff position: negative above the staff,
    /// positive below.
    pub fn ledger_lines(&self, position: i32) -> i32 {
        let bottom = 2 * (self.line_count.max(1) as i32 - 1);
        if position <= -2 {
            -(-position / 2)
        } else if position >= bottom + 2 {
            (position - bottom) / 2
        } else {
            0
        }
    }

    pub fn middle_position(&self) -> i32 {
        self.line_count.max(1) as i32 - 1
    }

    /// Staff positions of the key signature's accidentals.
    pub fn key_positions(&self, key: &Key) -> Vec<i32> {
        let bound = match key.kind {
            KeyKind::Sharp => self.clef.sharp_bound,
            KeyKind::Flat => self.clef.flat_bound,
        };
        let bound_step = diatonic_step(bound).unwrap_or_else(|| diatonic_step(bound - 1).unwrap_or_default());
        key.steps()
            .into_iter()
            .map(|step| {
                let absolute = bound_step - (bound_step - step as i32).rem_euclid(7);
                self.position(absolute)
            })
            .collect()
    }
}

/// What was placed last in a voice, for collision distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacedKind {
    Clef,
    Key,
    TimeSig,
    Barline,
    Note,
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastPlaced {
    pub note: NoteId,
    pub kind: PlacedKind,
    /// Right edge of the object's glyph box
    pub right: i64,
}

#[derive(Debug, Clone, Default)]
pub struct VoiceContext {
    pub last: Option<LastPlaced>,
}

impl VoiceContext {
    pub fn place(&mut self, note: NoteId, kind: PlacedKind, right: i64) {
        self.last = Some(LastPlaced { note, kind, right });
    }

    /// Forget the previous object at a line start.
    pub fn clear(&mut self) {
        self.last = None;
    }
}

/// Per-staff geometry of the line being engraved.
#[derive(Debug, Clone, PartialEq)]
pub struct StaffLine {
    /// Y of the top staff line
    pub top: i64,
    /// Distance requested by this staff's newline for the next line
    pub next_distance: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct LineContext {
    pub staves: Vec<StaffLine>,
    /// Index of the line on its page
    pub index: usize,
}

impl LineContext {
    pub fn staff_top(&self, staff: usize) -> i64 {
        self.staves.get(staff).map_or(0, |s| s.top)
    }
}

#[derive(Debug, Clone)]
pub struct ScoreContext {
    pub tempo: u32,
    /// Number of the measure being engraved (1-based)
    pub measure: u32,
}

impl ScoreContext {
    pub fn new(tempo: u32) -> Self {
        Self { tempo, measure: 1 }
    }
}
