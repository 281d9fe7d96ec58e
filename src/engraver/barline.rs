//! Barlines.

use crate::model::Barline;
use crate::plate::{PlateNote, Rect};

use super::Pass;

const SINGLE: [(i32, i32); 1] = [(320, 0)];

/// `(thickness, gap)` pairs of a barline style. Malformed styles are
/// trimmed or replaced by a single thin line.
fn style_pairs(style: &[i32]) -> Vec<(i32, i32)> {
    let mut style = style.to_vec();
    if style.len() % 2 == 1 {
        log::warn!("barline style {:?} has an odd length, ignoring its last entry", style);
        style.pop();
    }
    if style.is_empty() {
        log::warn!("empty barline style, using a single line");
        return SINGLE.to_vec();
    }
    style.chunks_exact(2).map(|c| (c[0], c[1])).collect()
}

/// Vertical pieces of a dashed line between `top` and `bottom`.
fn dash_segments(top: i64, bottom: i64, dash: i64, gap: i64) -> Vec<(i64, i64)> {
    let mut segments = Vec::new();
    let mut y = top;
    while y < bottom {
        segments.push((y, (y + dash).min(bottom)));
        y += dash + gap;
    }
    segments
}

impl Pass<'_, '_> {
    pub(super) fn engrave_barline(&mut self, note: &mut PlateNote, barline: &Barline) {
        let staff = note.staff;
        let (top, bottom) = self.barline_span(staff);

        let dash = barline.dash.and_then(|(d, g)| {
            if d > 0 && g >= 0 {
                Some((self.len(d, staff), self.len(g, staff)))
            } else {
                log::warn!("invalid barline dash ({}, {}), drawing a solid line", d, g);
                None
            }
        });

        let mut x = note.position.x;
        for (thickness, gap) in style_pairs(&barline.style) {
            let width = self.len(thickness, staff);
            match dash {
                Some((d, g)) if d > 0 => {
                    for (from, to) in dash_segments(top, bottom, d, g) {
                        note.rules.push(Rect::new(x, from, x + width, to));
                    }
                }
                _ => note.rules.push(Rect::new(x, top, x + width, bottom)),
            }
            x += width + self.len(gap, staff);
        }

        let staff_voice = self.score.staves.get(staff).map(|s| s.voice.id);
        if let Some(ctx) = self.staves.get_mut(staff) {
            if staff_voice == Some(note.voice) {
                if let Some((written, expected)) = ctx.close_measure(note.time) {
                    log::warn!(
                        "measure {} on staff {} lasts {} instead of {}",
                        self.score_ctx.measure,
                        staff,
                        written,
                        expected
                    );
                }
            }
            ctx.reset_accidentals();
        }
        let main = self.score.staves.first().map(|s| s.voice.id);
        if staff == 0 && main == Some(note.voice) {
            self.score_ctx.measure += 1;
        }
    }

    /// Vertical extent of a barline on a staff. Long barlines continue to
    /// the end of the staff's brace or bracket group, or to the next staff.
    fn barline_span(&self, staff: usize) -> (i64, i64) {
        let line = &self.line.plate;
        let Some(plate_staff) = line.staves.get(staff) else {
            return (self.staff_top(staff), self.staff_top(staff) + self.staff_height(staff));
        };
        let top = plate_staff.top;
        let mut bottom = plate_staff.bottom();

        let long = self.score.staves.get(staff).is_some_and(|s| s.long_barlines);
        if long {
            let group = line
                .braces
                .iter()
                .chain(&line.brackets)
                .filter(|g| g.first <= staff && g.last > staff)
                .map(|g| g.bottom)
                .max();
            bottom = match group {
                Some(group_bottom) => group_bottom,
                None => line.staves.get(staff + 1).map_or(bottom, |next| next.top),
            };
        }
        (top, bottom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_styles_lose_their_last_entry() {
        assert_eq!(style_pairs(&[320, 800, 1000]), vec![(320, 800)]);
        assert_eq!(style_pairs(&[320, 800, 320, 0]), vec![(320, 800), (320, 0)]);
    }

    #[test]
    fn empty_style_falls_back_to_a_single_line() {
        assert_eq!(style_pairs(&[]), vec![(320, 0)]);
        assert_eq!(style_pairs(&[500]), vec![(320, 0)]);
    }

    #[test]
    fn dashes_are_clipped_at_the_bottom() {
        assert_eq!(dash_segments(0, 100, 30, 20), vec![(0, 30), (50, 80)]);
        assert_eq!(dash_segments(0, 110, 30, 20), vec![(0, 30), (50, 80), (100, 110)]);
    }
}
