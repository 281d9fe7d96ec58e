//! Engraving state machine.
//!
//! A pass walks the objects of one score in time order (see [`crate::pick`]),
//! creates a plate note for each and dispatches to the placement rule of
//! the object's kind. The pass also owns everything that spans several
//! objects: open beams, ties and durables, the line under construction,
//! page flow, and the queue of dependency notifications.

mod attributes;
mod barline;
mod beams;
mod chord;
mod justify;
mod movable;
mod rest;
mod state;

use std::collections::{HashMap, HashSet};

use crate::context::{LineContext, PlacedKind, ScoreContext, StaffContext, StaffLine, VoiceContext};
use crate::duration::Duration;
use crate::error::EngraveError;
use crate::glyphs::{GlyphId, GlyphTable, ScaledGlyph};
use crate::model::{Document, EntityId, LineLayout, PageLayout, Score, ScoreObject};
use crate::params::EngraveParams;
use crate::pick::{Pick, Picked, Step};
use crate::plate::{
    GlyphRole, NoteId, Plate, PlateGlyph, PlateLine, PlateNote, PlatePage, PlateScore, PlateStaff, Position, Rect,
    StaffGroup,
};
use crate::reengrave::{ReengraveState, ReengraveTracker};

use state::{BeamInfo, LineInfo, OpenDurable, TieInfo};

pub use beams::collect_group;
pub use justify::distribute_slack;

/// Outcome of a tracked pass.
#[derive(Debug)]
pub struct Reengraved {
    pub plate: Plate,
    /// Registered entities the pass never reached
    pub unresolved: Vec<EntityId>,
}

impl Reengraved {
    /// Treat unresolved registrations as an error.
    pub fn into_result(self) -> Result<Plate, EngraveError> {
        if self.unresolved.is_empty() {
            Ok(self.plate)
        } else {
            Err(EngraveError::Unresolved(self.unresolved))
        }
    }
}

/// Where a score starts in the page flow.
#[derive(Debug, Clone, Copy)]
struct Origin {
    page: usize,
    y: Option<i64>,
}

pub struct Engraver<'a> {
    glyphs: &'a GlyphTable,
    params: &'a EngraveParams,
}

impl<'a> Engraver<'a> {
    pub fn new(glyphs: &'a GlyphTable, params: &'a EngraveParams) -> Self {
        Self { glyphs, params }
    }

    /// Full pass over a document.
    pub fn engrave(&self, doc: &Document) -> Result<Plate, EngraveError> {
        let mut tracker = ReengraveTracker::new();
        Ok(self.engrave_tracked(doc, &mut tracker)?.plate)
    }

    /// Full pass notifying the tracker's observers.
    pub fn engrave_tracked(&self, doc: &Document, tracker: &mut ReengraveTracker) -> Result<Reengraved, EngraveError> {
        if doc.scores.is_empty() {
            return Err(EngraveError::NoScore);
        }
        for (index, score) in doc.scores.iter().enumerate() {
            validate(index, score)?;
        }
        log::debug!("engraving {} score(s)", doc.scores.len());

        let mut plate = Plate::default();
        let mut origin = Origin { page: 0, y: None };
        for index in 0..doc.scores.len() {
            let heads = head_heights(&doc.scores[index], None);
            let (score, next) = self.pass(doc, index, heads, origin, tracker);
            origin = next;
            plate.scores.push(score);
        }
        let unresolved = tracker.finish();
        Ok(Reengraved { plate, unresolved })
    }

    /// Re-engrave one score in place. Returns the unresolved registrations.
    pub fn reengrave_score(
        &self,
        doc: &Document,
        plate: &mut Plate,
        score: usize,
        tracker: &mut ReengraveTracker,
    ) -> Result<Vec<EntityId>, EngraveError> {
        self.partial(doc, plate, score, None, tracker)
    }

    /// Re-engrave the score holding a staff, with a new head-height for
    /// that staff.
    pub fn reengrave_staff(
        &self,
        doc: &Document,
        plate: &mut Plate,
        score: usize,
        staff: usize,
        head_height: i64,
        tracker: &mut ReengraveTracker,
    ) -> Result<Vec<EntityId>, EngraveError> {
        if head_height <= 0 {
            return Err(EngraveError::InvalidHeadHeight(head_height));
        }
        let s = doc.scores.get(score).ok_or(EngraveError::ScoreOutOfRange(score))?;
        if staff >= s.staves.len() {
            return Err(EngraveError::StaffOutOfRange { score, staff });
        }
        self.partial(doc, plate, score, Some((staff, head_height)), tracker)
    }

    fn partial(
        &self,
        doc: &Document,
        plate: &mut Plate,
        index: usize,
        head_override: Option<(usize, i64)>,
        tracker: &mut ReengraveTracker,
    ) -> Result<Vec<EntityId>, EngraveError> {
        let score = doc.scores.get(index).ok_or(EngraveError::ScoreOutOfRange(index))?;
        validate(index, score)?;
        let old = plate.scores.get(index).ok_or(EngraveError::ScoreOutOfRange(index))?;
        let origin = Origin {
            page: old.first_page,
            y: old.start_y,
        };
        log::debug!("re-engraving score {}", index);

        let heads = head_heights(score, head_override);
        let (new, _) = self.pass(doc, index, heads, origin, tracker);
        plate.scores[index] = new;
        Ok(tracker.finish())
    }

    fn pass(
        &self,
        doc: &Document,
        index: usize,
        head_heights: Vec<i64>,
        origin: Origin,
        tracker: &mut ReengraveTracker,
    ) -> (PlateScore, Origin) {
        let score = &doc.scores[index];
        let mut pick = Pick::new(score, self.params, head_heights.clone());
        let mut pass = Pass::new(self, &doc.page, score, index, head_heights, origin, tracker);
        pass.run(&mut pick);
        pass.finish()
    }
}

fn validate(index: usize, score: &Score) -> Result<(), EngraveError> {
    if score.staves.is_empty() {
        return Err(EngraveError::NoStaff { score: index });
    }
    if let Some(staff) = score.staves.iter().find(|s| s.head_height <= 0) {
        return Err(EngraveError::InvalidHeadHeight(staff.head_height));
    }
    Ok(())
}

fn head_heights(score: &Score, head_override: Option<(usize, i64)>) -> Vec<i64> {
    score
        .staves
        .iter()
        .enumerate()
        .map(|(i, s)| match head_override {
            Some((staff, hh)) if staff == i => hh,
            _ => s.head_height,
        })
        .collect()
}

/// A glyph whose anchor sits at `(x, anchor_y)`.
fn glyph_at(glyph: &ScaledGlyph<'_>, role: GlyphRole, x: i64, anchor_y: i64) -> PlateGlyph {
    PlateGlyph {
        id: glyph.id.clone(),
        role,
        position: Position::new(x, anchor_y - glyph.anchor_y()),
        width: glyph.width(),
        height: glyph.height(),
    }
}

fn empty_line(page: usize) -> LineInfo {
    LineInfo {
        plate: PlateLine {
            left: 0,
            right: 0,
            staves: Vec::new(),
            voices: Vec::new(),
            braces: Vec::new(),
            brackets: Vec::new(),
            bounding_box: Rect::EMPTY,
            justified: false,
            first_measure: 1,
        },
        page,
        layout: LineLayout::default(),
        content_start: 0,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// One pass over one score
// ═══════════════════════════════════════════════════════════════════════

struct Pass<'a, 't> {
    glyphs: &'a GlyphTable,
    params: &'a EngraveParams,
    page_layout: &'a PageLayout,
    score: &'a Score,
    score_index: usize,
    head_heights: Vec<i64>,
    plate: PlateScore,

    staves: Vec<StaffContext>,
    /// Indexed by pick cursor
    voices: Vec<VoiceContext>,
    /// Right edge of the last staff-wide object per staff on this line
    staff_edges: Vec<Option<i64>>,
    score_ctx: ScoreContext,
    line_ctx: LineContext,
    line: LineInfo,
    /// Bottom of the last line on the current page
    page_y: Option<i64>,

    beams: HashMap<usize, BeamInfo>,
    ties: Vec<TieInfo>,
    durables: Vec<OpenDurable>,

    /// Notes of the column being placed
    column: Vec<NoteId>,
    column_key: Option<(Duration, i64)>,

    seen_voices: HashSet<EntityId>,
    /// Notifications held back until the line's positions are final
    pending: Vec<(EntityId, NoteId)>,
    tracker: &'t mut ReengraveTracker,
}

impl<'a, 't> Pass<'a, 't> {
    fn new(
        engraver: &Engraver<'a>,
        page_layout: &'a PageLayout,
        score: &'a Score,
        score_index: usize,
        head_heights: Vec<i64>,
        origin: Origin,
        tracker: &'t mut ReengraveTracker,
    ) -> Self {
        let staves = score
            .staves
            .iter()
            .zip(&head_heights)
            .map(|(staff, &hh)| {
                let mut ctx = StaffContext::new(staff);
                ctx.head_height = hh;
                ctx
            })
            .collect();
        let mut plate = PlateScore::new(score.id);
        plate.first_page = origin.page;
        plate.start_y = origin.y;

        Self {
            glyphs: engraver.glyphs,
            params: engraver.params,
            page_layout,
            score,
            score_index,
            plate,
            staves,
            voices: Vec::new(),
            staff_edges: vec![None; score.staves.len()],
            score_ctx: ScoreContext::new(score.tempo),
            line_ctx: LineContext::default(),
            line: empty_line(origin.page),
            page_y: origin.y,
            beams: HashMap::new(),
            ties: Vec::new(),
            durables: Vec::new(),
            column: Vec::new(),
            column_key: None,
            seen_voices: HashSet::new(),
            pending: Vec::new(),
            tracker,
            head_heights,
        }
    }

    fn head_height(&self, staff: usize) -> i64 {
        self.head_heights.get(staff).copied().unwrap_or(5000)
    }

    /// Promille of a staff's head-height in milli-pixels.
    fn len(&self, promille: i32, staff: usize) -> i64 {
        self.params.len(promille, self.head_height(staff))
    }

    fn scaled(&self, id: &GlyphId, staff: usize) -> ScaledGlyph<'a> {
        self.glyphs.scaled(id, self.head_height(staff))
    }

    fn staff_height(&self, staff: usize) -> i64 {
        let lines = self.score.staves.get(staff).map_or(5, |s| s.line_count.max(1));
        2 * self.head_height(staff) * (lines as i64 - 1)
    }

    fn staff_top(&self, staff: usize) -> i64 {
        self.line_ctx.staff_top(staff)
    }

    fn run(&mut self, pick: &mut Pick<'a>) {
        log::debug!("pass over score {} ({} staves)", self.score_index, self.score.staves.len());
        self.begin_line(self.score.layout.clone(), false, None);
        pick.start_line(self.line.content_start);

        while let Some(step) = pick.next() {
            match step {
                Step::Place(picked) => self.place(pick, picked),
                Step::Break(breaks) => self.line_break(pick, &breaks),
            }
        }

        self.close_dangling();
        self.end_line();
    }

    fn finish(mut self) -> (PlateScore, Origin) {
        let origin = Origin {
            page: self.line.page,
            y: self.page_y,
        };
        self.plate.tempo = self.score_ctx.tempo;
        (self.plate, origin)
    }

    // ── Objects ─────────────────────────────────────────────────────────

    fn place(&mut self, pick: &mut Pick<'a>, picked: Picked<'a>) {
        if self.voices.len() < pick.cursor_count() {
            self.voices.resize_with(pick.cursor_count(), VoiceContext::default);
        }
        if self.column_key != Some((picked.time, picked.x)) {
            self.column.clear();
            self.column_key = Some((picked.time, picked.x));
        }

        let id = self.plate.next_id();
        let top = self.staff_top(picked.staff);
        let mut note = PlateNote::new(
            picked.object.id(),
            picked.voice.id,
            picked.staff,
            picked.time,
            Position::new(picked.x, top),
        );

        let kind = match picked.object {
            ScoreObject::Clef(clef) => {
                self.engrave_clef(&mut note, clef);
                PlacedKind::Clef
            }
            ScoreObject::Key(key) => {
                self.engrave_key(&mut note, key);
                PlacedKind::Key
            }
            ScoreObject::TimeSig(time) => {
                self.engrave_time(&mut note, time);
                PlacedKind::TimeSig
            }
            ScoreObject::CustomTimeSig(time) => {
                self.engrave_custom_time(&mut note, time);
                PlacedKind::TimeSig
            }
            ScoreObject::Barline(barline) => {
                self.engrave_barline(&mut note, barline);
                PlacedKind::Barline
            }
            ScoreObject::Chord(chord) => {
                self.engrave_chord(pick, &picked, chord, id, &mut note);
                PlacedKind::Note
            }
            ScoreObject::Rest(rest) => {
                self.engrave_rest(&picked, rest, &mut note);
                PlacedKind::Note
            }
            ScoreObject::Newline(_) | ScoreObject::Pagebreak(_) => PlacedKind::Break,
        };

        note.refresh_boxes();
        let right = if note.bounding_box.is_empty() {
            note.position.x
        } else {
            note.bounding_box.right
        };
        let placed = Picked {
            x: note.position.x,
            ..picked
        };
        log::trace!(
            "{} placed at ({}, {})",
            picked.object.kind_name(),
            note.position.x,
            note.position.y
        );

        self.plate.push(note);
        self.line.plate.voice_mut(picked.voice.id, picked.staff).notes.push(id);
        self.column.push(id);
        if let Some(voice) = self.voices.get_mut(picked.cursor) {
            voice.place(id, kind, right);
        }
        if kind != PlacedKind::Note {
            if let Some(edge) = self.staff_edges.get_mut(picked.staff) {
                *edge = Some(right);
            }
        }

        match picked.object {
            ScoreObject::Chord(_) => self.complete_beam(picked.cursor),
            ScoreObject::Rest(_) => self.stub_ties(picked.voice.id, "a rest"),
            _ => {}
        }
        self.engrave_attachables(id, picked.object);
        self.reach_durables(picked.object.id(), id);
        self.queue_notify(picked.object.id(), id);
        if self.seen_voices.insert(picked.voice.id) {
            self.queue_notify(picked.voice.id, id);
        }

        pick.commit(&placed, right);
    }

    /// Move the current column (and everything still to come) right.
    fn apply_offset(&mut self, pick: &mut Pick<'a>, dx: i64) {
        if dx <= 0 {
            return;
        }
        log::trace!("collision offset of {} on column {:?}", dx, self.column_key);
        let shifts: HashMap<NoteId, i64> = self.column.iter().map(|id| (*id, dx)).collect();
        let ids: Vec<NoteId> = self.line.plate.notes().collect();
        justify::apply_shifts(&mut self.plate, &ids, &shifts);
        pick.add_offset(dx);
        if let Some((_, x)) = &mut self.column_key {
            *x += dx;
        }
    }

    fn queue_notify(&mut self, entity: EntityId, note: NoteId) {
        if self.tracker.is_registered(entity) {
            self.pending.push((entity, note));
        }
    }

    fn flush_notifications(&mut self, line_index: usize) {
        for (entity, id) in std::mem::take(&mut self.pending) {
            let Some(note) = self.plate.note(id) else { continue };
            let state = ReengraveState {
                entity,
                score: self.score_index,
                note: id,
                page: self.line.page,
                line: line_index,
                position: note.position,
                bounding_box: note.bounding_box,
            };
            self.tracker.notify(&state);
        }
    }

    // ── Lines and pages ─────────────────────────────────────────────────

    fn line_break(&mut self, pick: &mut Pick<'a>, breaks: &[Picked<'a>]) {
        let right = self
            .line
            .plate
            .notes()
            .filter_map(|id| self.plate.note(id))
            .filter(|n| !n.bounding_box.is_empty())
            .map(|n| n.bounding_box.right)
            .max()
            .unwrap_or(self.line.content_start);

        let mut layout = None;
        let mut page_break = false;
        for b in breaks {
            let (ScoreObject::Newline(newline) | ScoreObject::Pagebreak(newline)) = b.object else {
                continue;
            };
            page_break |= matches!(b.object, ScoreObject::Pagebreak(_));
            if layout.is_none() {
                layout = Some(newline.layout.clone());
            }
            if b.staff > 0 {
                if let Some(line) = self.line_ctx.staves.get_mut(b.staff) {
                    line.next_distance = newline.layout.distance;
                }
            }
            let id = self.plate.next_id();
            let top = self.staff_top(b.staff);
            let note = PlateNote::new(newline.id, b.voice.id, b.staff, b.time, Position::new(right, top));
            self.plate.push(note);
            self.line.plate.voice_mut(b.voice.id, b.staff).notes.push(id);
            self.queue_notify(newline.id, id);
        }

        let time = breaks.first().map(|b| b.time).unwrap_or_default();
        self.end_line();
        self.begin_line(layout.unwrap_or_default(), page_break, Some(time));
        pick.start_line(self.line.content_start);
    }

    /// Open a new line below the previous one. `time` is `None` for the
    /// first line of the score, which gets no generated clef and key.
    fn begin_line(&mut self, layout: LineLayout, page_break: bool, time: Option<Duration>) {
        let mut page = self.line.page;
        if page_break {
            page += 1;
            self.page_y = None;
        }
        let mut tops = self.stack_staves(&layout, self.page_y);
        if self.page_y.is_some() && self.bottom_of(&tops) > self.page_layout.content_bottom() {
            log::debug!("line does not fit on page {}, continuing on the next page", page);
            page += 1;
            self.page_y = None;
            tops = self.stack_staves(&layout, None);
        }

        let left = self.page_layout.margin_left + layout.indent;
        let right = self.page_layout.content_right() - layout.right_margin;
        let staves = self
            .score
            .staves
            .iter()
            .zip(&tops)
            .enumerate()
            .map(|(i, (staff, &top))| PlateStaff {
                staff: staff.id,
                top,
                line_count: staff.line_count,
                head_height: self.head_height(i),
                line_thickness: self.len(self.params.staff_line_thickness, i),
            })
            .collect();
        let braces = self.staff_groups(&tops, |s| s.brace);
        let brackets = self.staff_groups(&tops, |s| s.bracket);

        self.line_ctx.index = self
            .plate
            .pages
            .iter()
            .find(|p| p.number == page)
            .map_or(0, |p| p.lines.len());
        self.line_ctx.staves = tops
            .iter()
            .map(|&top| StaffLine {
                top,
                next_distance: None,
            })
            .collect();
        self.line = LineInfo {
            plate: PlateLine {
                left,
                right,
                staves,
                voices: Vec::new(),
                braces,
                brackets,
                bounding_box: Rect::EMPTY,
                justified: false,
                first_measure: self.score_ctx.measure,
            },
            page,
            layout,
            content_start: left,
        };
        for voice in &mut self.voices {
            voice.clear();
        }
        self.staff_edges.fill(None);
        self.column.clear();
        self.column_key = None;

        self.line.content_start = match time {
            None => left + self.len(self.params.min_distance, 0),
            Some(time) => self.engrave_prefixes(left, time),
        };
        self.resume_durables();
        log::debug!(
            "line {} on page {} starts at measure {}",
            self.line_ctx.index,
            page,
            self.score_ctx.measure
        );
    }

    /// Y of each staff's top line for a line placed below `after` (or at
    /// the top of a fresh page).
    fn stack_staves(&self, layout: &LineLayout, after: Option<i64>) -> Vec<i64> {
        let mut tops = Vec::with_capacity(self.score.staves.len());
        let mut y = after.unwrap_or(self.page_layout.margin_top);
        for (i, staff) in self.score.staves.iter().enumerate() {
            let gap = if i == 0 {
                match after {
                    Some(_) => layout
                        .distance
                        .unwrap_or_else(|| self.len(self.params.line_distance, 0)),
                    None => layout.distance.unwrap_or(staff.distance),
                }
            } else {
                self.line_ctx
                    .staves
                    .get(i)
                    .and_then(|s| s.next_distance)
                    .unwrap_or(staff.distance)
            };
            let top = y + gap;
            tops.push(top);
            y = top + self.staff_height(i);
        }
        tops
    }

    fn bottom_of(&self, tops: &[i64]) -> i64 {
        tops.last()
            .map_or(0, |top| top + self.staff_height(tops.len() - 1))
    }

    fn staff_groups(&self, tops: &[i64], size: impl Fn(&crate::model::Staff) -> u32) -> Vec<StaffGroup> {
        let count = self.score.staves.len();
        self.score
            .staves
            .iter()
            .enumerate()
            .filter(|(_, staff)| size(staff) > 0)
            .map(|(first, staff)| {
                let last = (first + size(staff) as usize - 1).min(count - 1);
                StaffGroup {
                    first,
                    last,
                    top: tops[first],
                    bottom: tops[last] + self.staff_height(last),
                }
            })
            .collect()
    }

    fn end_line(&mut self) {
        self.flush_open_beams();

        let mut justified = false;
        if self.line.layout.justify {
            justified = justify::justify_line(
                &mut self.plate,
                &self.line.plate,
                self.line.content_start,
                &self.params.justification,
                self.line.layout.forced_justification,
            );
        }
        self.break_ties();
        self.split_durables();

        let line = &mut self.line.plate;
        line.justified = justified;
        let mut bbox = Rect::EMPTY;
        for staff in &line.staves {
            bbox.extend(&Rect::new(line.left, staff.top, line.right, staff.bottom()));
        }
        for id in line.notes() {
            if let Some(note) = self.plate.note(id) {
                bbox.extend(&note.bounding_box);
            }
        }
        line.bounding_box = bbox;
        self.page_y = line.staves.last().map(|s| s.bottom());

        let line_index = self.line_ctx.index;
        self.flush_notifications(line_index);

        let page = self.line.page;
        let line = std::mem::replace(&mut self.line.plate, empty_line(page).plate);
        match self.plate.pages.iter_mut().find(|p| p.number == page) {
            Some(existing) => existing.lines.push(line),
            None => self.plate.pages.push(PlatePage {
                number: page,
                lines: vec![line],
            }),
        }
    }

    /// Features that can no longer be completed at the end of the score.
    fn close_dangling(&mut self) {
        let mut voices: Vec<EntityId> = self.ties.iter().map(|t| t.voice).collect();
        voices.sort();
        voices.dedup();
        for voice in voices {
            self.stub_ties(voice, "the end of the score");
        }
        self.drop_unreached_durables();
    }
}
