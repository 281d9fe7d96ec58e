//! Beam groups.
//!
//! A group is opened at its first chord from a look-ahead over the voice
//! and closed once its last chord has been placed. Stems of the members are
//! then shortened or lengthened to meet the beam.

use crate::model::{BeamMode, Chord, EntityId, ScoreObject, StemDirection, Voice};
use crate::params::EngraveParams;
use crate::pick::Picked;
use crate::plate::{BeamSegment, PlateScore, Position};

use super::state::{BeamInfo, BeamMember};
use super::Pass;

fn beamable(chord: &Chord) -> bool {
    chord.duration.flag_count() > 0 && !chord.heads.is_empty()
}

/// Chords beamed together starting with the chord at `index`. Rests and
/// barlines end a group unless the chord before them forces the beam on;
/// clefs, keys and time signatures are stepped over. Returns an empty list
/// when fewer than two chords would be joined.
pub fn collect_group(voice: &Voice, index: usize) -> Vec<EntityId> {
    let Some(ScoreObject::Chord(first)) = voice.objects.get(index) else {
        return Vec::new();
    };
    if !beamable(first) {
        return Vec::new();
    }

    let mut members = vec![first.id];
    let mut last = first;
    for object in &voice.objects[index + 1..] {
        if last.beam == BeamMode::Break {
            break;
        }
        match object {
            ScoreObject::Chord(chord) if beamable(chord) => {
                members.push(chord.id);
                last = chord;
            }
            ScoreObject::Chord(_) => break,
            ScoreObject::Rest(_) | ScoreObject::Barline(_) => {
                if last.beam != BeamMode::Force {
                    break;
                }
            }
            ScoreObject::Clef(_) | ScoreObject::Key(_) | ScoreObject::TimeSig(_) | ScoreObject::CustomTimeSig(_) => {}
            ScoreObject::Newline(_) | ScoreObject::Pagebreak(_) => break,
        }
    }
    if members.len() < 2 {
        members.clear();
    }
    members
}

impl Pass<'_, '_> {
    /// Stem direction imposed by the beam group a chord belongs to, opening
    /// the group at its first chord.
    pub(super) fn beam_direction(&mut self, picked: &Picked<'_>, chord: &Chord) -> Option<bool> {
        let cursor = picked.cursor;
        if let Some(info) = self.beams.get(&cursor) {
            if info.expects(chord.id) {
                return Some(info.up);
            }
            log::warn!(
                "beam group ended after {} of {} chords",
                info.placed.len(),
                info.members.len()
            );
            self.finalize_beam(cursor);
        }

        let members = collect_group(picked.voice, picked.index);
        if members.is_empty() {
            return None;
        }
        let up = self.group_direction(picked, &members);
        log::trace!("beam group of {} chords, stems {}", members.len(), if up { "up" } else { "down" });
        self.beams.insert(
            cursor,
            BeamInfo {
                members,
                placed: Vec::new(),
                up,
                head_height: self.head_height(picked.staff),
            },
        );
        Some(up)
    }

    fn group_direction(&self, picked: &Picked<'_>, members: &[EntityId]) -> bool {
        let chords: Vec<&Chord> = picked
            .voice
            .objects
            .iter()
            .filter_map(|o| match o {
                ScoreObject::Chord(c) if members.contains(&c.id) => Some(c),
                _ => None,
            })
            .collect();
        let explicit = chords.first().map(|c| c.stem).unwrap_or_default();
        for direction in [explicit, picked.voice.stem_direction, picked.role.default_stem()] {
            match direction {
                StemDirection::Up => return true,
                StemDirection::Down => return false,
                StemDirection::Auto => {}
            }
        }

        let Some(ctx) = self.staves.get(picked.staff) else { return true };
        let positions: Vec<i64> = chords
            .iter()
            .flat_map(|c| c.heads.iter())
            .map(|h| ctx.position(ctx.spell(h).step) as i64)
            .collect();
        if positions.is_empty() {
            return true;
        }
        // below the middle line on average
        positions.iter().sum::<i64>() >= ctx.middle_position() as i64 * positions.len() as i64
    }

    pub(super) fn add_beam_member(&mut self, cursor: usize, member: BeamMember) {
        if let Some(info) = self.beams.get_mut(&cursor) {
            info.placed.push(member);
        }
    }

    /// Draw the group of a voice once its last chord is on the plate.
    pub(super) fn complete_beam(&mut self, cursor: usize) {
        if self.beams.get(&cursor).is_some_and(|info| info.is_complete()) {
            self.finalize_beam(cursor);
        }
    }

    fn finalize_beam(&mut self, cursor: usize) {
        let Some(info) = self.beams.remove(&cursor) else { return };
        if info.placed.len() < 2 {
            log::warn!("beam group with {} placed chord(s) is dropped", info.placed.len());
            return;
        }
        draw_beams(&mut self.plate, &info, self.params);
    }

    /// Groups left open when a line ends.
    pub(super) fn flush_open_beams(&mut self) {
        let mut open: Vec<usize> = self.beams.keys().copied().collect();
        open.sort_unstable();
        for cursor in open {
            log::warn!("beam group of voice cursor {} is still open at the line end", cursor);
            self.finalize_beam(cursor);
        }
    }
}

/// Slope-limited beams over the placed members, with stems adjusted to
/// reach them.
fn draw_beams(plate: &mut PlateScore, info: &BeamInfo, params: &EngraveParams) {
    let hh = info.head_height;
    let members = &info.placed;
    let (Some(first), Some(last)) = (members.first(), members.last()) else { return };
    let stem = params.len(params.stem_length, hh);
    let thickness = params.len(params.beam_thickness, hh);
    let gap = params.len(params.beam_gap, hh);
    let min_stem = params.len(params.beam_min_stem, hh);
    let sign = if info.up { -1 } else { 1 };

    let first_end = first.near_y + sign * stem;
    let last_end = last.near_y + sign * stem;
    let dx = last.stem_x - first.stem_x;
    let slope = if dx != 0 {
        ((last_end - first_end) as f64 / dx as f64).clamp(-params.beam_max_slope, params.beam_max_slope)
    } else {
        0.0
    };
    let line_y = |x: i64| first_end + (slope * (x - first.stem_x) as f64).round() as i64;

    let mut shift = 0;
    for m in members {
        let length = (m.near_y - (line_y(m.stem_x) + shift)).abs();
        if length < min_stem {
            shift += sign * (min_stem - length);
        }
    }
    let beam_y = |x: i64| line_y(x) + shift;
    let level_y = |level: u8, x: i64| {
        let inner = (level as i64 - 1) * (thickness + gap);
        if info.up {
            beam_y(x) + inner
        } else {
            beam_y(x) - thickness - inner
        }
    };

    for m in members {
        if let Some(note) = plate.note_mut(m.note) {
            if let Some(stem) = &mut note.stem {
                stem.tip = beam_y(m.stem_x);
            }
        }
    }

    let short = params.len(params.short_beam_length, hh);
    let levels = members.iter().map(|m| m.flags).max().unwrap_or(1);
    for level in 1..=levels {
        let joins = |i: usize| -> bool {
            let (a, b) = (&members[i], members.get(i + 1));
            b.is_some_and(|b| a.flags >= level && b.flags >= level && a.cut.map_or(true, |cut| level <= cut))
        };
        for (i, m) in members.iter().enumerate() {
            if m.flags < level {
                continue;
            }
            let segment = if joins(i) {
                let next = &members[i + 1];
                BeamSegment {
                    level,
                    from: Position::new(m.stem_x, level_y(level, m.stem_x)),
                    to: Position::new(next.stem_x, level_y(level, next.stem_x)),
                    thickness,
                    short: false,
                    end_note: Some(next.note),
                }
            } else if i > 0 && joins(i - 1) {
                continue;
            } else {
                let towards_next = i + 1 < members.len() && m.cut.map_or(true, |cut| level <= cut);
                let (from, to) = if towards_next {
                    let room = (members[i + 1].stem_x - m.stem_x) / 2;
                    (m.stem_x, m.stem_x + short.min(room))
                } else {
                    let room = if i > 0 { (m.stem_x - members[i - 1].stem_x) / 2 } else { short };
                    (m.stem_x - short.min(room), m.stem_x)
                };
                BeamSegment {
                    level,
                    from: Position::new(from, level_y(level, from)),
                    to: Position::new(to, level_y(level, to)),
                    thickness,
                    short: true,
                    end_note: None,
                }
            };
            if let Some(note) = plate.note_mut(m.note) {
                note.beams.push(segment);
            }
        }
    }

    for m in members {
        if let Some(note) = plate.note_mut(m.note) {
            note.refresh_boxes();
        }
    }
}
