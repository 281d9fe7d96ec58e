//! Position-picking iterator.
//!
//! Walks every voice of a score in time order and yields the next object to
//! engrave together with the minimum x it may be placed at. Objects that
//! share an onset are aligned on one column. Ties between voices ready at
//! the same time are broken by declaration order (staff order first, then
//! sub-voices in the order they were reached).

use crate::duration::Duration;
use crate::model::{Score, ScoreObject, StemDirection, Voice};
use crate::params::EngraveParams;

/// How a voice relates to its staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceRole {
    Main,
    /// Sub-voice drawn above its host
    Above,
    /// Sub-voice drawn below its host
    Below,
}

impl VoiceRole {
    /// Stem direction for voices that do not declare one.
    pub fn default_stem(&self) -> StemDirection {
        match self {
            VoiceRole::Main => StemDirection::Auto,
            VoiceRole::Above => StemDirection::Up,
            VoiceRole::Below => StemDirection::Down,
        }
    }
}

/// Rank of an object among candidates with the same onset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    Barline,
    /// Attribute followed by a break of its own voice at the same time
    BeforeBreak,
    Break,
    Attribute,
    Note,
}

#[derive(Debug)]
struct Cursor<'a> {
    voice: &'a Voice,
    staff: usize,
    role: VoiceRole,
    index: usize,
    time: Duration,
    next_x: i64,
}

impl<'a> Cursor<'a> {
    fn current(&self) -> Option<&'a ScoreObject> {
        self.voice.objects.get(self.index)
    }

    fn rank(&self) -> Option<Rank> {
        let object = self.current()?;
        Some(match object {
            ScoreObject::Barline(_) => Rank::Barline,
            ScoreObject::Newline(_) | ScoreObject::Pagebreak(_) => Rank::Break,
            ScoreObject::Chord(_) | ScoreObject::Rest(_) => Rank::Note,
            _ if self.break_follows() => Rank::BeforeBreak,
            _ => Rank::Attribute,
        })
    }

    /// Whether a break of this voice follows at the current time.
    fn break_follows(&self) -> bool {
        self.voice.objects[self.index..]
            .iter()
            .take_while(|o| o.duration().is_zero())
            .any(|o| o.is_break())
    }

    fn advance(&mut self) {
        if let Some(object) = self.current() {
            self.time += object.duration();
            self.index += 1;
        }
    }
}

/// An object ready to be engraved.
#[derive(Debug, Clone, Copy)]
pub struct Picked<'a> {
    /// Index of the voice cursor; stable for the whole pass
    pub cursor: usize,
    pub object: &'a ScoreObject,
    pub voice: &'a Voice,
    /// Index of the object in its voice
    pub index: usize,
    pub staff: usize,
    pub role: VoiceRole,
    pub time: Duration,
    /// Minimum x for the object's column
    pub x: i64,
}

pub enum Step<'a> {
    Place(Picked<'a>),
    /// Line or page breaks consumed together; `x` is unused
    Break(Vec<Picked<'a>>),
}

#[derive(Debug, Clone, Copy)]
struct Column {
    time: Duration,
    rank: Rank,
    x: i64,
}

pub struct Pick<'a> {
    cursors: Vec<Cursor<'a>>,
    params: &'a EngraveParams,
    head_heights: Vec<i64>,
    column: Option<Column>,
    /// Onset and x of the last note column
    last_note: Option<(Duration, i64)>,
}

impl<'a> Pick<'a> {
    pub fn new(score: &'a Score, params: &'a EngraveParams, head_heights: Vec<i64>) -> Self {
        let cursors = score
            .staves
            .iter()
            .enumerate()
            .map(|(staff, s)| Cursor {
                voice: &s.voice,
                staff,
                role: VoiceRole::Main,
                index: 0,
                time: Duration::zero(),
                next_x: 0,
            })
            .collect();
        Self {
            cursors,
            params,
            head_heights,
            column: None,
            last_note: None,
        }
    }

    pub fn cursor_count(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_done(&self) -> bool {
        self.cursors.iter().all(|c| c.current().is_none())
    }

    fn head_height(&self, staff: usize) -> i64 {
        self.head_heights.get(staff).copied().unwrap_or(5000)
    }

    /// Next object in time order, or `None` when every voice is exhausted.
    pub fn next(&mut self) -> Option<Step<'a>> {
        self.skip_foreign_objects();

        let (best, time, rank) = self
            .cursors
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.rank().map(|r| (i, c.time, r)))
            .min_by_key(|&(i, time, rank)| (time, rank, i))?;

        if rank == Rank::Break {
            return Some(Step::Break(self.take_breaks(time)));
        }

        let x = self.column_x(time, rank);
        let cursor = &self.cursors[best];
        let object = cursor.current()?;
        log::trace!("pick {} at {} (voice {}, x {})", object.kind_name(), time, best, x);
        Some(Step::Place(Picked {
            cursor: best,
            object,
            voice: cursor.voice,
            index: cursor.index,
            staff: cursor.staff,
            role: cursor.role,
            time,
            x,
        }))
    }

    /// Sub-voices only carry notes; anything else is dropped.
    fn skip_foreign_objects(&mut self) {
        for cursor in self.cursors.iter_mut().filter(|c| c.role != VoiceRole::Main) {
            while let Some(object) = cursor.current() {
                if object.is_note() {
                    break;
                }
                log::warn!("{} in a sub-voice is ignored", object.kind_name());
                cursor.index += 1;
            }
        }
    }

    fn take_breaks(&mut self, time: Duration) -> Vec<Picked<'a>> {
        let mut breaks = Vec::new();
        for (i, cursor) in self.cursors.iter_mut().enumerate() {
            if cursor.time != time {
                continue;
            }
            if let Some(object) = cursor.current().filter(|o| o.is_break()) {
                breaks.push(Picked {
                    cursor: i,
                    object,
                    voice: cursor.voice,
                    index: cursor.index,
                    staff: cursor.staff,
                    role: cursor.role,
                    time,
                    x: cursor.next_x,
                });
                cursor.advance();
            }
        }
        self.column = None;
        breaks
    }

    /// X shared by all objects of one onset and rank.
    fn column_x(&mut self, time: Duration, rank: Rank) -> i64 {
        if let Some(column) = self.column {
            if column.time == time && column.rank == rank {
                return column.x;
            }
        }
        let mut x = self
            .cursors
            .iter()
            .filter(|c| c.time == time && c.rank() == Some(rank))
            .map(|c| c.next_x)
            .max()
            .unwrap_or(0);
        if rank == Rank::Note {
            if let Some((last_time, last_x)) = self.last_note {
                if time > last_time {
                    let min = self.params.len(self.params.min_distance, self.head_height(0));
                    x = x.max(last_x + min);
                }
            }
            self.last_note = Some((time, x));
        }
        self.column = Some(Column { time, rank, x });
        x
    }

    /// Advance past a placed object. `right` is the right edge of what was
    /// engraved for it.
    pub fn commit(&mut self, picked: &Picked<'a>, right: i64) {
        let hh = self.head_height(picked.staff);
        let p = self.params;
        let next_x = match picked.object {
            ScoreObject::Chord(_) | ScoreObject::Rest(_) => {
                let space = self.note_space(picked.object.duration(), hh);
                (picked.x + space).max(right + p.len(p.min_distance, hh))
            }
            ScoreObject::Barline(_) => right + p.len(p.barline_distance, hh),
            _ => right + p.len(p.nonnote_distance, hh),
        };

        if let Some(cursor) = self.cursors.get_mut(picked.cursor) {
            cursor.next_x = next_x;
            cursor.advance();
        }

        // A staff-wide object pushes every voice of its staff.
        if !picked.object.is_note() {
            for cursor in self.cursors.iter_mut().filter(|c| c.staff == picked.staff) {
                cursor.next_x = cursor.next_x.max(next_x);
            }
        }

        if let Some(sub) = picked.object.sub_voices() {
            for (i, voice) in sub.voices.iter().enumerate() {
                let role = if sub.is_above(i) { VoiceRole::Above } else { VoiceRole::Below };
                self.cursors.push(Cursor {
                    voice,
                    staff: picked.staff,
                    role,
                    index: 0,
                    time: picked.time,
                    next_x: picked.x,
                });
            }
        }
    }

    /// Horizontal room a note of this length claims.
    pub fn note_space(&self, duration: Duration, head_height: i64) -> i64 {
        let p = self.params;
        if duration.is_zero() {
            return p.len(p.min_distance, head_height);
        }
        let quarters = duration.to_f64() * 4.0;
        let promille = p.quarter_distance as f64 * quarters.powf(p.duration_exponent);
        (promille as i64 * head_height / 1000).max(p.len(p.min_distance, head_height))
    }

    /// Move the current column and every pending position right.
    pub fn add_offset(&mut self, dx: i64) {
        if dx == 0 {
            return;
        }
        for cursor in &mut self.cursors {
            cursor.next_x += dx;
        }
        if let Some(column) = &mut self.column {
            column.x += dx;
        }
        if let Some((_, x)) = &mut self.last_note {
            *x += dx;
        }
    }

    /// Restart horizontal positions at a new line.
    pub fn start_line(&mut self, x: i64) {
        for cursor in &mut self.cursors {
            cursor.next_x = x;
        }
        self.column = None;
        self.last_note = None;
    }
}
