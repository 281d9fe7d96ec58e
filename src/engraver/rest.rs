//! Rests.

use crate::duration::BASE;
use crate::glyphs::{names, GlyphId};
use crate::model::Rest;
use crate::pick::Picked;
use crate::plate::{GlyphRole, PlateNote, Position, Stroke};

use super::{glyph_at, Pass};

fn rest_glyph(exponent: u8) -> &'static str {
    match exponent {
        e if e >= BASE => names::REST_WHOLE,
        6 => names::REST_HALF,
        5 => names::REST_QUARTER,
        _ => names::REST_FLAG,
    }
}

impl Pass<'_, '_> {
    pub(super) fn engrave_rest(&mut self, picked: &Picked<'_>, rest: &Rest, note: &mut PlateNote) {
        let staff = picked.staff;
        let hh = self.head_height(staff);
        let x = note.position.x;
        let top = note.position.y;
        let flags = rest.duration.flag_count() as i64;
        let glyph = self.scaled(&GlyphId::from(rest_glyph(rest.duration.exponent)), staff);
        let line = glyph.integer("line").unwrap_or(4) as i32 + rest.offset_y;

        if flags == 0 {
            note.glyphs.push(glyph_at(&glyph, GlyphRole::Main, x, top + line as i64 * hh));
        } else {
            // Lower flags hang further left along the slanted stem.
            let slope = glyph.ratio("slope").unwrap_or(0.0);
            let step = 2 * hh;
            let lean = (slope * step as f64).round() as i64;
            let stem_x = glyph.real_or("stem.x", glyph.width());
            let first_left = x + lean * (flags - 1);
            let first_y = top + line as i64 * hh;

            for k in 0..flags {
                note.glyphs.push(glyph_at(&glyph, GlyphRole::Main, first_left - lean * k, first_y + step * k));
            }
            let length = step * flags + hh;
            let from = Position::new(first_left + stem_x, first_y - glyph.anchor_y());
            let to = Position::new(from.x - (slope * length as f64).round() as i64, from.y + length);
            note.strokes.push(Stroke {
                from,
                to,
                thickness: self.len(self.params.stem_width, staff),
            });
        }

        let dots = rest.duration.dots as i64;
        if dots > 0 {
            let dot = self.scaled(&GlyphId::from(names::DOT), staff);
            let right = note
                .glyphs
                .iter()
                .map(|g| g.position.x + g.width)
                .max()
                .unwrap_or(x);
            let start = right + self.len(self.params.dot_distance, staff);
            let spacing = dot.width() + self.len(self.params.dot_spacing, staff);
            let position = if line % 2 == 0 { line - 1 } else { line };
            let y = top + position as i64 * hh;
            for k in 0..dots {
                note.glyphs.push(glyph_at(&dot, GlyphRole::Dot, start + k * spacing, y));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glyph_follows_the_exponent() {
        assert_eq!(rest_glyph(8), names::REST_WHOLE);
        assert_eq!(rest_glyph(7), names::REST_WHOLE);
        assert_eq!(rest_glyph(6), names::REST_HALF);
        assert_eq!(rest_glyph(5), names::REST_QUARTER);
        assert_eq!(rest_glyph(3), names::REST_FLAG);
    }
}
