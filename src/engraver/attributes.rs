//! Clefs, key signatures and time signatures.

use crate::duration::Duration;
use crate::glyphs::{names, GlyphId};
use crate::model::{Clef, CustomTimeSig, Key, KeyKind, TimeSig};
use crate::plate::{GlyphRole, PlateNote, Position};

use super::{glyph_at, Pass};

/// Naturals needed when the key changes from `old_fifths` to `new_fifths`
/// (sharps positive).
pub(super) fn cancellation_count(old_fifths: i32, new_fifths: i32) -> usize {
    if old_fifths == 0 {
        return 0;
    }
    let same_direction = (old_fifths > 0 && new_fifths > 0) || (old_fifths < 0 && new_fifths < 0);
    if same_direction {
        old_fifths.unsigned_abs().saturating_sub(new_fifths.unsigned_abs()) as usize
    } else {
        old_fifths.unsigned_abs() as usize
    }
}

/// Decimal digits of a time signature number.
fn digits(n: u32) -> Vec<usize> {
    n.to_string()
        .bytes()
        .map(|b| (b - b'0') as usize)
        .collect()
}

impl Pass<'_, '_> {
    pub(super) fn engrave_clef(&mut self, note: &mut PlateNote, clef: &Clef) {
        let staff = note.staff;
        let glyph = self.scaled(&clef.glyph, staff);
        let y = note.position.y + clef.line as i64 * self.head_height(staff);
        note.glyphs.push(glyph_at(&glyph, GlyphRole::Main, note.position.x, y));
        if let Some(ctx) = self.staves.get_mut(staff) {
            ctx.set_clef(clef);
        }
    }

    pub(super) fn engrave_key(&mut self, note: &mut PlateNote, key: &Key) {
        let staff = note.staff;
        let Some(ctx) = self.staves.get(staff) else { return };
        let old = &ctx.key;
        let count = cancellation_count(old.fifths(), key.fifths());
        let old_positions = ctx.key_positions(old);
        let cancel = &old_positions[old_positions.len().saturating_sub(count)..];
        log::trace!("key change {} -> {}, {} natural(s)", old.fifths(), key.fifths(), cancel.len());

        self.key_glyphs(note, key, cancel);
        if let Some(ctx) = self.staves.get_mut(staff) {
            ctx.set_key(key);
        }
    }

    /// Cancelling naturals followed by the accidentals of `key`, starting at
    /// the note's x.
    fn key_glyphs(&self, note: &mut PlateNote, key: &Key, cancel: &[i32]) {
        let staff = note.staff;
        let Some(ctx) = self.staves.get(staff) else { return };
        let hh = self.head_height(staff);
        let top = note.position.y;
        let mut x = note.position.x;

        let natural = self.scaled(&GlyphId::from(names::NATURAL), staff);
        for &position in cancel {
            note.glyphs.push(glyph_at(&natural, GlyphRole::Cancel, x, top + position as i64 * hh));
            x += natural.width() + natural.real_or("distance", 0);
        }

        let accidental = match key.kind {
            KeyKind::Sharp => names::SHARP,
            KeyKind::Flat => names::FLAT,
        };
        let glyph = self.scaled(&GlyphId::from(accidental), staff);
        for position in ctx.key_positions(key) {
            note.glyphs.push(glyph_at(&glyph, GlyphRole::KeyAccidental, x, top + position as i64 * hh));
            x += glyph.width() + glyph.real_or("distance", 0);
        }
    }

    pub(super) fn engrave_time(&mut self, note: &mut PlateNote, time: &TimeSig) {
        let staff = note.staff;
        let Some(ctx) = self.staves.get(staff) else { return };
        let hh = self.head_height(staff);
        let middle = ctx.middle_position();
        let rows = [(time.number, middle / 2), (time.beat, middle + middle / 2)];

        let widths: Vec<i64> = rows
            .iter()
            .map(|(n, _)| {
                digits(*n)
                    .into_iter()
                    .map(|d| self.scaled(&GlyphId::from(names::TIMESIG_DIGITS[d]), staff).width())
                    .sum()
            })
            .collect();
        let widest = widths.iter().copied().max().unwrap_or(0);

        for ((n, position), width) in rows.iter().zip(&widths) {
            let mut x = note.position.x + (widest - width) / 2;
            let y = note.position.y + *position as i64 * hh;
            for d in digits(*n) {
                let glyph = self.scaled(&GlyphId::from(names::TIMESIG_DIGITS[d]), staff);
                note.glyphs.push(glyph_at(&glyph, GlyphRole::Digit, x, y));
                x += glyph.width();
            }
        }
        if let Some(ctx) = self.staves.get_mut(staff) {
            ctx.time = Some((time.number, time.beat));
        }
    }

    pub(super) fn engrave_custom_time(&mut self, note: &mut PlateNote, time: &CustomTimeSig) {
        let staff = note.staff;
        let Some(ctx) = self.staves.get(staff) else { return };
        let y = note.position.y + ctx.middle_position() as i64 * self.head_height(staff);
        let glyph = self.scaled(&time.glyph, staff);
        note.glyphs.push(glyph_at(&glyph, GlyphRole::Main, note.position.x, y));
        if let Some(ctx) = self.staves.get_mut(staff) {
            ctx.time = Some((time.number, time.beat));
        }
    }

    /// Repeat the active clef and key at the start of a continuation line.
    /// Returns the first x free for the line's own objects.
    pub(super) fn engrave_prefixes(&mut self, left: i64, time: Duration) -> i64 {
        let score = self.score;
        let start = left + self.len(self.params.min_distance, 0);

        let mut clefs = Vec::with_capacity(score.staves.len());
        for (i, staff) in score.staves.iter().enumerate() {
            let Some(clef) = self.staves.get(i).map(|ctx| ctx.clef.clone()) else { continue };
            let mut note = PlateNote::new(clef.id, staff.voice.id, i, time, Position::new(start, self.staff_top(i)));
            note.generated = true;
            self.engrave_clef(&mut note, &clef);
            note.refresh_boxes();
            clefs.push(note);
        }
        let clef_right = clefs.iter().map(|n| n.right()).max().unwrap_or(start);
        let mut right = clef_right;

        let mut keys = Vec::new();
        for (i, staff) in score.staves.iter().enumerate() {
            let Some(key) = self.staves.get(i).map(|ctx| ctx.key.clone()) else { continue };
            if key.count == 0 {
                continue;
            }
            let x = clef_right + self.len(self.params.nonnote_distance, i);
            let mut note = PlateNote::new(key.id, staff.voice.id, i, time, Position::new(x, self.staff_top(i)));
            note.generated = true;
            self.key_glyphs(&mut note, &key, &[]);
            note.refresh_boxes();
            right = right.max(note.right());
            keys.push(note);
        }

        for note in clefs.into_iter().chain(keys) {
            let staff = note.staff;
            let voice = note.voice;
            let note_right = note.right();
            let id = self.plate.push(note);
            self.line.plate.voice_mut(voice, staff).notes.push(id);
            if let Some(edge) = self.staff_edges.get_mut(staff) {
                *edge = Some(edge.map_or(note_right, |e| e.max(note_right)));
            }
        }
        right + self.len(self.params.nonnote_distance, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_follows_the_key_change() {
        // D major to G major drops one sharp
        assert_eq!(cancellation_count(2, 1), 1);
        // adding accidentals cancels nothing
        assert_eq!(cancellation_count(1, 3), 0);
        // sharps to flats cancels every sharp
        assert_eq!(cancellation_count(3, -2), 3);
        // to C major
        assert_eq!(cancellation_count(-4, 0), 4);
        assert_eq!(cancellation_count(0, 5), 0);
    }

    #[test]
    fn numbers_split_into_digits() {
        assert_eq!(digits(12), vec![1, 2]);
        assert_eq!(digits(0), vec![0]);
        assert_eq!(digits(4), vec![4]);
    }
}
