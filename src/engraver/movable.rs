//! Attachables: symbols, text and durables (slurs, hairpins).
//!
//! Symbols and text are placed as soon as their owner is. A durable opens
//! at its owner and is drawn once its end object has been engraved; if the
//! end lies on a later line, one piece is drawn per line.

use crate::model::{
    Anchor, AnchoredPosition, Attachable, AttachableKind, CurveDirection, DurableKind, EntityId, ScoreObject, Unit,
};
use crate::plate::{
    AttachableShape, Broken, NoteId, PlateAttachable, PlateCurve, PlateNote, Position, Rect, Stroke,
};

use super::state::OpenDurable;
use super::Pass;

fn lerp(a: Position, b: Position, num: i64, den: i64) -> Position {
    Position::new(a.x + (b.x - a.x) * num / den, a.y + (b.y - a.y) * num / den)
}

/// Rough width of a text run.
fn text_width(text: &str, font_size: i64) -> i64 {
    text.chars().count() as i64 * font_size * 6 / 10
}

impl Pass<'_, '_> {
    fn to_mpx(&self, value: i64, unit: Unit, staff: usize) -> i64 {
        match unit {
            Unit::Metric => value,
            Unit::HeadHeight => value * self.head_height(staff) / 1000,
        }
    }

    /// Absolute position of an anchored point relative to a placed note.
    fn resolve(&self, position: &AnchoredPosition, note: &PlateNote) -> Position {
        let x = self.to_mpx(position.x, position.unit, note.staff);
        let y = self.to_mpx(position.y, position.unit, note.staff);
        let base_x = match position.anchor_x {
            Anchor::Page => 0,
            Anchor::Line | Anchor::Staff => self.line.plate.left,
            Anchor::Parent => note.position.x,
        };
        let base_y = match position.anchor_y {
            Anchor::Page => 0,
            Anchor::Line => self.staff_top(0),
            Anchor::Staff => note.position.y,
            Anchor::Parent if !note.glyph_box.is_empty() => note.glyph_box.top,
            Anchor::Parent => note.position.y,
        };
        Position::new(base_x + x, base_y + y)
    }

    pub(super) fn engrave_attachables(&mut self, id: NoteId, object: &ScoreObject) {
        let attachables = object.attachables();
        if attachables.is_empty() {
            return;
        }
        let Some(note) = self.plate.note(id) else { return };
        let staff = note.staff;
        let hh = self.head_height(staff);

        let mut placed = Vec::new();
        let mut opened = Vec::new();
        for attachable in attachables {
            let p = self.resolve(&attachable.position, note);
            match &attachable.kind {
                AttachableKind::Symbol { glyph } => {
                    let g = self.scaled(glyph, staff);
                    let top_left = Position::new(p.x, p.y - g.anchor_y());
                    placed.push(PlateAttachable {
                        object: attachable.id,
                        position: p,
                        shape: AttachableShape::Glyph(g.id.clone()),
                        bounding_box: Rect::from_size(top_left, g.width(), g.height()),
                    });
                }
                AttachableKind::Text(area) => {
                    let font_size = area.font_size as i64 * hh / 1000;
                    let width = area
                        .width
                        .map_or_else(|| text_width(&area.text, font_size), |w| self.to_mpx(w, attachable.position.unit, staff));
                    let height = area
                        .height
                        .map_or(font_size, |h| self.to_mpx(h, attachable.position.unit, staff));
                    placed.push(PlateAttachable {
                        object: attachable.id,
                        position: p,
                        shape: AttachableShape::Text {
                            text: area.text.clone(),
                            font_size,
                        },
                        bounding_box: Rect::new(p.x, p.y - height, p.x + width, p.y),
                    });
                }
                AttachableKind::Durable(durable) => {
                    if self.plate.find(durable.end).is_some() {
                        log::warn!("durable {:?} ends on an object engraved before it, skipping", attachable.id);
                        continue;
                    }
                    opened.push(OpenDurable {
                        attachable: attachable.id,
                        owner: id,
                        start: p,
                        staff,
                        durable: durable.clone(),
                        head_height: hh,
                        continued: false,
                    });
                }
            }
        }

        self.durables.extend(opened);
        if !placed.is_empty() {
            for attachable in &placed {
                self.queue_notify(attachable.object, id);
            }
            if let Some(note) = self.plate.note_mut(id) {
                note.attachables.extend(placed);
                note.refresh_boxes();
            }
        }
        for attachable in durables_of(attachables) {
            self.queue_notify(attachable.id, id);
        }
    }

    /// Draw the durables ending at the object just placed.
    pub(super) fn reach_durables(&mut self, object: EntityId, id: NoteId) {
        if !self.durables.iter().any(|d| d.durable.end == object) {
            return;
        }
        let (reached, open): (Vec<OpenDurable>, Vec<OpenDurable>) =
            std::mem::take(&mut self.durables).into_iter().partition(|d| d.durable.end == object);
        self.durables = open;

        let Some(target) = self.plate.note(id) else { return };
        let pieces: Vec<(NoteId, PlateAttachable)> = reached
            .iter()
            .map(|d| {
                let end = self.resolve(&d.durable.end_position, target);
                let broken = if d.continued { Broken::Start } else { Broken::No };
                (d.owner, self.durable_piece(d, end, Some(id), broken))
            })
            .collect();
        for (owner, piece) in pieces {
            if let Some(note) = self.plate.note_mut(owner) {
                note.attachables.push(piece);
                note.refresh_boxes();
            }
        }
    }

    fn durable_piece(&self, open: &OpenDurable, end: Position, end_note: Option<NoteId>, broken: Broken) -> PlateAttachable {
        let start = open.start;
        let hh = open.head_height;
        let (shape, bounding_box) = match open.durable.kind {
            DurableKind::Slur { direction } => {
                let bend = |offset: i32| -> i64 {
                    let y = self.params.len(offset, hh);
                    match direction {
                        CurveDirection::Up => -y.abs(),
                        CurveDirection::Down => y.abs(),
                        CurveDirection::Auto => y,
                    }
                };
                let c1 = &open.durable.control1;
                let c2 = &open.durable.control2;
                let p1 = lerp(start, end, 1, 3) + Position::new(self.params.len(c1.x, hh), bend(c1.y));
                let p2 = lerp(start, end, 2, 3) + Position::new(self.params.len(c2.x, hh), bend(c2.y));
                let curve = PlateCurve {
                    points: [start, p1, p2, end],
                    thickness: self.params.len(self.params.slur_thickness, hh),
                    end_note,
                    broken,
                    tone: None,
                };
                let bbox = curve.bounding_box();
                (AttachableShape::Curve(curve), bbox)
            }
            DurableKind::Hairpin { crescendo, height } => {
                let half = self.params.len(height, hh) / 2;
                let thickness = self.params.len(self.params.staff_line_thickness, hh);
                let (narrow, wide) = if crescendo { (start, end) } else { (end, start) };
                let strokes = [-half, half]
                    .into_iter()
                    .map(|dy| {
                        let open_end = Position::new(wide.x, wide.y + dy);
                        let (from, to) = if crescendo { (narrow, open_end) } else { (open_end, narrow) };
                        Stroke { from, to, thickness }
                    })
                    .collect::<Vec<_>>();
                let mut bbox = Rect::EMPTY;
                for stroke in &strokes {
                    bbox.extend(&stroke.bounding_box());
                }
                (
                    AttachableShape::Hairpin {
                        strokes,
                        end_note,
                        broken,
                    },
                    bbox,
                )
            }
        };
        PlateAttachable {
            object: open.attachable,
            position: start,
            shape,
            bounding_box,
        }
    }

    /// Draw the part of each open durable that lies on the closing line.
    pub(super) fn split_durables(&mut self) {
        if self.durables.is_empty() {
            return;
        }
        let right = self.line.plate.right;
        let mut open = std::mem::take(&mut self.durables);
        for d in &mut open {
            let end = Position::new(right.max(d.start.x), d.start.y);
            let broken = if d.continued { Broken::Both } else { Broken::End };
            let piece = self.durable_piece(d, end, None, broken);
            if let Some(note) = self.plate.note_mut(d.owner) {
                note.attachables.push(piece);
                note.refresh_boxes();
            }
            // keep the height relative to the staff for the next line
            d.start = Position::new(0, d.start.y - self.staff_top(d.staff));
            d.continued = true;
        }
        self.durables = open;
    }

    /// Hand continued durables to the first note of their staff on the new
    /// line. The piece starts halfway between the clef and key prefix and
    /// the first column.
    pub(super) fn resume_durables(&mut self) {
        let mut open = std::mem::take(&mut self.durables);
        for d in open.iter_mut().filter(|d| d.continued) {
            let staff_notes: Vec<NoteId> = self
                .line
                .plate
                .voices
                .iter()
                .filter(|v| v.staff == d.staff)
                .flat_map(|v| v.notes.iter().copied())
                .collect();
            match staff_notes.first() {
                Some(owner) => d.owner = *owner,
                None => log::warn!("no note to continue durable {:?} from", d.attachable),
            }
            let prefix_right = staff_notes
                .iter()
                .filter_map(|id| self.plate.note(*id))
                .filter(|n| n.generated && !n.bounding_box.is_empty())
                .map(|n| n.bounding_box.right)
                .max()
                .unwrap_or(self.line.plate.left);
            let gap = self.len(self.params.nonnote_distance, d.staff) / 2;
            d.start = Position::new(prefix_right + gap, self.staff_top(d.staff) + d.start.y);
        }
        self.durables = open;
    }

    pub(super) fn drop_unreached_durables(&mut self) {
        for d in self.durables.drain(..) {
            log::warn!("durable {:?} never reached its end object {:?}", d.attachable, d.durable.end);
        }
    }
}

fn durables_of(attachables: &[Attachable]) -> impl Iterator<Item = &Attachable> {
    attachables.iter().filter(|a| matches!(a.kind, AttachableKind::Durable(_)))
}
