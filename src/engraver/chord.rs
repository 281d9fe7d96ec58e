//! Chords: heads, accidentals, stems, dots, ledger lines, ties,
//! articulations and flags.

use crate::context::{PlacedKind, Spelling};
use crate::duration::BASE;
use crate::glyphs::{names, GlyphId, ScaledGlyph};
use crate::model::{AccidentalKind, Chord, CurveDirection, EntityId, StemDirection};
use crate::pick::{Pick, Picked};
use crate::plate::{
    Broken, GlyphRole, LedgerRun, NoteId, PlateCurve, PlateGlyph, PlateHead, PlateNote, PlateStem, Position,
};

use super::state::{BeamMember, TieInfo};
use super::{glyph_at, Pass};

/// A head before it is put on the plate. `left` is relative to the column.
#[derive(Debug, Clone, Copy)]
struct HeadLayout {
    /// Index in the chord's head list
    index: usize,
    tone: i32,
    spelling: Spelling,
    position: i32,
    accidental: Option<AccidentalKind>,
    opposite: bool,
    left: i64,
}

fn head_glyph(exponent: u8) -> &'static str {
    match exponent {
        e if e >= BASE => names::HEAD_WHOLE,
        6 => names::HEAD_HALF,
        _ => names::HEAD_BLACK,
    }
}

/// Stem direction from the first explicit choice in `directions`, or from
/// the head positions: up when the lowest head is further below the middle
/// line than the highest head is above it.
fn stem_up(directions: [StemDirection; 3], positions: &[i32], middle: i32) -> bool {
    for direction in directions {
        match direction {
            StemDirection::Up => return true,
            StemDirection::Down => return false,
            StemDirection::Auto => {}
        }
    }
    let highest = positions.iter().copied().min().unwrap_or(middle);
    let lowest = positions.iter().copied().max().unwrap_or(middle);
    lowest - middle > middle - highest
}

/// Head order and side of the stem. Heads are walked top to bottom for
/// stems up and bottom to top for stems down; a head within one position of
/// the previous head on the normal side moves to the other side.
fn place_heads(heads: &mut [HeadLayout], up: bool, width: i64, stem_x: i64) {
    heads.sort_by_key(|h| h.position);
    if !up {
        heads.reverse();
    }
    let mut last_normal: Option<i32> = None;
    for head in heads.iter_mut() {
        let clash = last_normal.is_some_and(|p| (head.position - p).abs() <= 1);
        head.opposite = clash;
        head.left = match (clash, up) {
            (false, _) => 0,
            (true, true) => stem_x,
            (true, false) => -width,
        };
        if !clash {
            last_normal = Some(head.position);
        }
    }
}

/// Greedy column assignment for accidentals given as `(top, bottom)`
/// extents, top to bottom. Returns the column of each accidental.
fn accidental_columns(extents: &[(i64, i64)]) -> Vec<usize> {
    let mut columns: Vec<Vec<(i64, i64)>> = Vec::new();
    extents
        .iter()
        .map(|&(top, bottom)| {
            let free = columns
                .iter()
                .position(|col| col.iter().all(|&(t, b)| bottom <= t || top >= b));
            let column = free.unwrap_or(columns.len());
            if column == columns.len() {
                columns.push(Vec::new());
            }
            columns[column].push((top, bottom));
            column
        })
        .collect()
}

impl<'a> Pass<'a, '_> {
    pub(super) fn engrave_chord(
        &mut self,
        pick: &mut Pick<'a>,
        picked: &Picked<'a>,
        chord: &Chord,
        id: NoteId,
        note: &mut PlateNote,
    ) {
        let staff = picked.staff;
        if chord.heads.is_empty() {
            log::warn!("chord without heads, nothing to engrave");
            return;
        }
        let hh = self.head_height(staff);
        let Some(ctx) = self.staves.get(staff) else { return };
        let middle = ctx.middle_position();
        let mut heads: Vec<HeadLayout> = chord
            .heads
            .iter()
            .enumerate()
            .map(|(index, head)| {
                let spelling = ctx.spell(head);
                let visible = ctx.accidental_visible(&spelling, head.accidental.forced);
                HeadLayout {
                    index,
                    tone: spelling.tone(),
                    spelling,
                    position: ctx.position(spelling.step),
                    accidental: visible.then(|| spelling.accidental()),
                    opposite: false,
                    left: 0,
                }
            })
            .collect();

        let beamed = self.beam_direction(picked, chord);
        let up = beamed.unwrap_or_else(|| {
            let positions: Vec<i32> = heads.iter().map(|h| h.position).collect();
            let directions = [chord.stem, picked.voice.stem_direction, picked.role.default_stem()];
            stem_up(directions, &positions, middle)
        });

        let head = self.scaled(&GlyphId::from(head_glyph(chord.duration.exponent)), staff);
        let width = head.width();
        let stem_offset = head.real_or("stem.x", width);
        place_heads(&mut heads, up, width, stem_offset);
        note.cluster = heads.iter().any(|h| h.opposite);

        // ── Accidentals and collision offset ──
        let accidentals = self.layout_accidentals(&heads, staff);
        let leftmost = accidentals
            .iter()
            .map(|(_, _, left)| *left)
            .chain(heads.iter().map(|h| h.left))
            .min()
            .unwrap_or(0);
        let dx = self.collision_offset(picked, leftmost);
        if dx > 0 {
            self.apply_offset(pick, dx);
        }
        let x = picked.x + dx.max(0);
        note.position.x = x;
        let top = note.position.y;
        let center_y = |position: i32| top + position as i64 * hh;

        for h in &heads {
            note.heads.push(PlateHead {
                tone: h.tone,
                glyph: head.id.clone(),
                position: Position::new(x + h.left, center_y(h.position) - head.anchor_y()),
                width,
                height: head.height(),
                staff_position: h.position,
                opposite: h.opposite,
            });
        }
        for (h, glyph, left) in &accidentals {
            note.glyphs.push(glyph_at(glyph, GlyphRole::Accidental, x + left, center_y(h.position)));
        }

        // ── Stem ──
        let flags = chord.duration.flag_count();
        if chord.duration.exponent < BASE {
            let highest = center_y(heads.iter().map(|h| h.position).min().unwrap_or(middle));
            let lowest = center_y(heads.iter().map(|h| h.position).max().unwrap_or(middle));
            let mut length = self.len(self.params.stem_length, staff)
                + flags.saturating_sub(2) as i64 * self.len(self.params.flag_stem_extension, staff);
            if note.cluster {
                length += self.len(self.params.cluster_stem_extension, staff);
            }
            let thickness = self.len(self.params.stem_width, staff);
            let middle_y = center_y(middle);
            note.stem = Some(if up {
                PlateStem {
                    x: x + stem_offset - thickness / 2,
                    base: lowest,
                    tip: (highest - length).min(middle_y),
                    thickness,
                    up,
                }
            } else {
                PlateStem {
                    x: x + thickness / 2,
                    base: highest,
                    tip: (lowest + length).max(middle_y),
                    thickness,
                    up,
                }
            });
        }

        self.engrave_dots(chord, &heads, note, width);
        self.engrave_ledgers(&heads, note, width);

        // ── Ties ──
        self.resolve_ties(picked.voice.id, id, note);
        self.open_ties(picked, chord, &heads, up, id, note);

        self.engrave_articulations(chord, note);

        // ── Flags or beam membership ──
        if let Some(stem) = note.stem {
            if beamed.is_some() {
                let near = if up {
                    heads.iter().map(|h| h.position).min()
                } else {
                    heads.iter().map(|h| h.position).max()
                };
                let near_y = center_y(near.unwrap_or(middle));
                self.add_beam_member(
                    picked.cursor,
                    BeamMember {
                        note: id,
                        flags,
                        cut: chord.beam_cut,
                        stem_x: stem.x,
                        near_y,
                    },
                );
            } else if flags > 0 {
                let flag = self.scaled(&GlyphId::from(if up { names::FLAG_UP } else { names::FLAG_DOWN }), staff);
                let distance = flag.real_or("distance", hh);
                for k in 0..flags as i64 {
                    let y = if up { stem.tip + k * distance } else { stem.tip - k * distance };
                    note.glyphs.push(glyph_at(&flag, GlyphRole::Flag, stem.x - stem.thickness / 2, y));
                }
            }
        }

        if let Some(ctx) = self.staves.get_mut(staff) {
            for h in &heads {
                ctx.remember(&h.spelling);
            }
        }
    }

    /// Visible accidentals with their glyph and left edge relative to the
    /// column, stacked into columns left of the heads.
    fn layout_accidentals(&self, heads: &[HeadLayout], staff: usize) -> Vec<(HeadLayout, ScaledGlyph<'a>, i64)> {
        let hh = self.head_height(staff);
        let mut visible: Vec<(HeadLayout, ScaledGlyph<'a>)> = heads
            .iter()
            .filter_map(|h| {
                let glyph = h.accidental?.glyph()?;
                Some((*h, self.scaled(&glyph, staff)))
            })
            .collect();
        if visible.is_empty() {
            return Vec::new();
        }
        visible.sort_by_key(|(h, _)| h.position);

        let extents: Vec<(i64, i64)> = visible
            .iter()
            .map(|(h, g)| {
                let top = h.position as i64 * hh - g.anchor_y();
                (top, top + g.height())
            })
            .collect();
        let columns = accidental_columns(&extents);
        let count = columns.iter().copied().max().map_or(0, |c| c + 1);
        let mut widths = vec![0; count];
        for ((_, g), &c) in visible.iter().zip(&columns) {
            widths[c] = widths[c].max(g.width());
        }

        let heads_left = heads.iter().map(|h| h.left).min().unwrap_or(0);
        let mut rights = Vec::with_capacity(count);
        let mut right = heads_left - self.len(self.params.accidental_distance, staff);
        for w in &widths {
            rights.push(right);
            right -= w + self.len(self.params.accidental_column_distance, staff);
        }

        visible
            .into_iter()
            .zip(columns)
            .map(|((h, g), c)| {
                let left = rights[c] - g.width();
                (h, g, left)
            })
            .collect()
    }

    /// How far the column must move right so that the chord's leftmost
    /// extent keeps its distance from what precedes it.
    fn collision_offset(&self, picked: &Picked<'_>, leftmost: i64) -> i64 {
        let left = picked.x + leftmost;
        let min = self.len(self.params.min_distance, picked.staff);
        let mut need = 0;
        if let Some(last) = self.voices.get(picked.cursor).and_then(|v| v.last) {
            let gap = if last.kind == PlacedKind::Note {
                self.len(self.params.accidental_distance, picked.staff)
            } else {
                min
            };
            need = need.max(last.right + gap - left);
        }
        if let Some(Some(edge)) = self.staff_edges.get(picked.staff) {
            need = need.max(edge + min - left);
        }
        need
    }

    fn engrave_dots(&self, chord: &Chord, heads: &[HeadLayout], note: &mut PlateNote, width: i64) {
        let dots = chord.duration.dots as i64;
        if dots == 0 {
            return;
        }
        let staff = note.staff;
        let hh = self.head_height(staff);
        let dot = self.scaled(&GlyphId::from(names::DOT), staff);
        let x = note.position.x;
        let right = x + heads.iter().map(|h| h.left + width).max().unwrap_or(width);
        let start = right + self.len(self.params.dot_distance, staff);
        let step = dot.width() + self.len(self.params.dot_spacing, staff);

        let mut taken = Vec::new();
        for h in heads {
            // dots sit in spaces
            let position = if h.position % 2 == 0 { h.position - 1 } else { h.position };
            if taken.contains(&position) {
                continue;
            }
            taken.push(position);
            let offset = chord.heads[h.index].dot_offset;
            let ox = self.len(offset.x, staff);
            let y = note.position.y + position as i64 * hh + self.len(offset.y, staff);
            for k in 0..dots {
                note.glyphs.push(glyph_at(&dot, GlyphRole::Dot, start + k * step + ox, y));
            }
        }
    }

    /// Ledger runs above and below the staff. Lines shared with heads on
    /// the far side of the stem are widened over both head columns.
    fn engrave_ledgers(&self, heads: &[HeadLayout], note: &mut PlateNote, width: i64) {
        let staff = note.staff;
        let Some(ctx) = self.staves.get(staff) else { return };
        let hh = self.head_height(staff);
        let overhang = self.len(self.params.ledger_overhang, staff);
        let thickness = self.len(self.params.ledger_thickness, staff);
        let x = note.position.x;
        let top = note.position.y;
        let bottom_position = 2 * ctx.middle_position();

        for above in [true, false] {
            let count = |h: &&HeadLayout| {
                let n = ctx.ledger_lines(h.position);
                if above { (-n).max(0) } else { n.max(0) }
            };
            let normal = heads.iter().filter(|h| !h.opposite).map(|h| count(&h)).max().unwrap_or(0);
            let wide = heads.iter().filter(|h| h.opposite).map(|h| count(&h)).max().unwrap_or(0);
            if normal.max(wide) == 0 {
                continue;
            }
            let (first_y, spacing) = if above {
                (top - 2 * hh, -2 * hh)
            } else {
                (top + (bottom_position + 2) as i64 * hh, 2 * hh)
            };

            if wide > 0 {
                let left = heads.iter().map(|h| h.left).min().unwrap_or(0);
                let right = heads.iter().map(|h| h.left + width).max().unwrap_or(width);
                note.ledgers.push(LedgerRun {
                    x: x + left - overhang,
                    width: right - left + 2 * overhang,
                    first_y,
                    spacing,
                    count: wide as u32,
                    thickness,
                    wide: true,
                });
            }
            if normal > wide {
                note.ledgers.push(LedgerRun {
                    x: x - overhang,
                    width: width + 2 * overhang,
                    first_y: first_y + spacing * wide as i64,
                    spacing,
                    count: (normal - wide) as u32,
                    thickness,
                    wide: false,
                });
            }
        }
    }

    fn engrave_articulations(&self, chord: &Chord, note: &mut PlateNote) {
        if chord.articulations.is_empty() {
            return;
        }
        let staff = note.staff;
        let distance = self.len(self.params.articulation_distance, staff);
        let head_top = note.heads.iter().map(|h| h.position.y).min().unwrap_or(note.position.y);
        let head_bottom = note
            .heads
            .iter()
            .map(|h| h.position.y + h.height)
            .max()
            .unwrap_or(note.position.y);
        let center_x = note
            .heads
            .iter()
            .find(|h| !h.opposite)
            .map_or(note.position.x, |h| h.position.x + h.width / 2);
        let stem = note.stem;

        let mut near_above = head_top - distance;
        let mut near_below = head_bottom + distance;
        let mut far = match stem {
            Some(s) if s.up => s.tip - distance,
            Some(s) => s.tip + distance,
            None => head_top - distance,
        };

        for articulation in &chord.articulations {
            let glyph = self.scaled(&articulation.glyph, staff);
            let (cursor, above) = match (articulation.far, stem) {
                (true, Some(s)) => (&mut far, s.up),
                (true, None) => (&mut near_above, true),
                (false, Some(s)) if s.up => (&mut near_below, false),
                (false, _) => (&mut near_above, true),
            };
            let top = if above { *cursor - glyph.height() } else { *cursor };
            note.glyphs.push(PlateGlyph {
                id: glyph.id.clone(),
                role: GlyphRole::Articulation,
                position: Position::new(center_x - glyph.width() / 2, top),
                width: glyph.width(),
                height: glyph.height(),
            });
            *cursor = if above { top - distance } else { top + glyph.height() + distance };
        }
    }

    // ── Ties ────────────────────────────────────────────────────────────

    /// Close the ties the previous chord of this voice left open.
    fn resolve_ties(&mut self, voice: EntityId, id: NoteId, note: &mut PlateNote) {
        let (mine, others): (Vec<TieInfo>, Vec<TieInfo>) =
            std::mem::take(&mut self.ties).into_iter().partition(|t| t.voice == voice);
        self.ties = others;

        for tie in mine {
            let Some(head) = note.heads.iter().find(|h| h.tone == tie.tone) else {
                log::warn!("tie on tone {} has no matching head in the next chord", tie.tone);
                self.stub_tie(&tie);
                continue;
            };
            let hh = tie.head_height;
            let sign = if tie.up { -1 } else { 1 };
            let end = Position::new(
                head.position.x + self.params.len(tie.spec.offset2.x, hh),
                head.center().y + sign * self.params.len(self.params.tie_offset, hh) + self.params.len(tie.spec.offset2.y, hh),
            );
            match tie.carried {
                None => {
                    let curve = self.tie_curve(&tie, tie.start, end, Broken::No, Some(id));
                    if let Some(source) = self.plate.note_mut(tie.note) {
                        source.ties.push(curve);
                        source.refresh_boxes();
                    }
                }
                Some(length) => {
                    let start = Position::new((end.x - length).max(self.line.plate.left), end.y);
                    note.ties.push(self.tie_curve(&tie, start, end, Broken::Start, None));
                }
            }
        }
    }

    /// Register ties starting at this chord.
    fn open_ties(&mut self, picked: &Picked<'_>, chord: &Chord, heads: &[HeadLayout], up: bool, id: NoteId, note: &PlateNote) {
        let mut by_position: Vec<&HeadLayout> = heads.iter().collect();
        by_position.sort_by_key(|h| h.position);
        let count = by_position.len();

        for (rank, h) in by_position.into_iter().enumerate() {
            let Some(spec) = chord.heads[h.index].tie else { continue };
            let tie_up = match spec.direction {
                CurveDirection::Up => true,
                CurveDirection::Down => false,
                CurveDirection::Auto if count > 1 => rank * 2 < count,
                CurveDirection::Auto => !up,
            };
            let Some(head) = note.heads.iter().find(|p| p.tone == h.tone && p.staff_position == h.position) else {
                continue;
            };
            let hh = self.head_height(picked.staff);
            let sign = if tie_up { -1 } else { 1 };
            let start = Position::new(
                head.position.x + head.width + self.params.len(spec.offset1.x, hh),
                head.center().y + sign * self.params.len(self.params.tie_offset, hh) + self.params.len(spec.offset1.y, hh),
            );
            self.ties.push(TieInfo {
                voice: picked.voice.id,
                tone: h.tone,
                note: id,
                start,
                up: tie_up,
                spec,
                head_height: hh,
                carried: None,
            });
        }
    }

    fn tie_curve(&self, tie: &TieInfo, start: Position, end: Position, broken: Broken, end_note: Option<NoteId>) -> PlateCurve {
        let hh = tie.head_height;
        let curvature = if tie.spec.curvature != 0 {
            tie.spec.curvature
        } else {
            self.params.tie_curvature
        };
        let bend = self.params.len(curvature, hh) * if tie.up { -1 } else { 1 };
        let dx = end.x - start.x;
        let mid_y = (start.y + end.y) / 2;
        PlateCurve {
            points: [
                start,
                Position::new(start.x + dx / 4, mid_y + bend),
                Position::new(start.x + 3 * dx / 4, mid_y + bend),
                end,
            ],
            thickness: self.params.len(self.params.tie_thickness, hh),
            end_note,
            broken,
            tone: Some(tie.tone),
        }
    }

    /// A short tie on the source head when its continuation is missing.
    fn stub_tie(&mut self, tie: &TieInfo) {
        if tie.carried.is_some() {
            return;
        }
        let end = tie.start.shifted(4 * tie.head_height);
        let curve = self.tie_curve(tie, tie.start, end, Broken::No, None);
        if let Some(source) = self.plate.note_mut(tie.note) {
            source.ties.push(curve);
            source.refresh_boxes();
        }
    }

    /// Give up on the open ties of a voice.
    pub(super) fn stub_ties(&mut self, voice: EntityId, reason: &str) {
        let (mine, others): (Vec<TieInfo>, Vec<TieInfo>) =
            std::mem::take(&mut self.ties).into_iter().partition(|t| t.voice == voice);
        self.ties = others;
        for tie in mine {
            log::warn!("tie on tone {} is interrupted by {}", tie.tone, reason);
            self.stub_tie(&tie);
        }
    }

    /// Cut open ties at the line end. The half drawn here is mirrored at
    /// the start of the next line.
    pub(super) fn break_ties(&mut self) {
        let right = self.line.plate.right;
        let mut carried = Vec::new();
        for mut tie in std::mem::take(&mut self.ties) {
            if tie.carried.is_some() {
                log::warn!("tie on tone {} found no chord on a whole line, dropping it", tie.tone);
                continue;
            }
            let end = Position::new(right.max(tie.start.x), tie.start.y);
            let curve = self.tie_curve(&tie, tie.start, end, Broken::End, None);
            if let Some(source) = self.plate.note_mut(tie.note) {
                source.ties.push(curve);
                source.refresh_boxes();
            }
            tie.carried = Some(end.x - tie.start.x);
            carried.push(tie);
        }
        self.ties = carried;
    }
}
