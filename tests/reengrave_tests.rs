//! Re-engraving tests: observers registered on score entities follow them
//! through full and partial passes.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use scoreplate::duration::DurationEncoding;
use scoreplate::*;

#[derive(Default)]
struct Cursor {
    states: Vec<ReengraveState>,
    answer: Option<ReengraveStatus>,
    finished: bool,
}

impl Reengraveable for Cursor {
    fn on_reengrave(&mut self, state: &ReengraveState) -> ReengraveStatus {
        self.states.push(state.clone());
        self.answer.unwrap_or(ReengraveStatus::Done)
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

fn quarter(tone: i32) -> Chord {
    Chord::tones(DurationEncoding::new(5, 0), &[tone])
}

fn document(chords: Vec<Chord>) -> Document {
    let objects = chords.into_iter().map(ScoreObject::Chord).collect();
    Document::new(vec![Score::new(vec![Staff::new(Voice::new(objects))])])
}

#[test]
fn observers_learn_the_new_position() {
    let _ = env_logger::builder().is_test(true).try_init();
    let target = quarter(64);
    let id = target.id;
    let doc = document(vec![quarter(60), target, quarter(67)]);
    let glyphs = GlyphTable::builtin();
    let params = EngraveParams::default();
    let engraver = Engraver::new(&glyphs, &params);

    let cursor = Rc::new(RefCell::new(Cursor::default()));
    let mut tracker = ReengraveTracker::new();
    tracker.register(id, cursor.clone());
    let outcome = engraver.engrave_tracked(&doc, &mut tracker).unwrap();
    assert!(outcome.unresolved.is_empty());
    assert!(tracker.is_empty());

    let states = &cursor.borrow().states;
    assert_eq!(states.len(), 1);
    let state = &states[0];
    assert_eq!(state.entity, id);
    assert_eq!((state.score, state.page, state.line), (0, 0, 0));
    let note = outcome.plate.scores[0].note(state.note).unwrap();
    assert_eq!(note.object, id);
    // reported after justification
    assert_eq!(state.position, note.position);
    assert_eq!(state.bounding_box, note.bounding_box);
}

#[test]
fn unreached_registrations_are_reported() {
    let doc = document(vec![quarter(60)]);
    let glyphs = GlyphTable::builtin();
    let params = EngraveParams::default();
    let engraver = Engraver::new(&glyphs, &params);

    let missing = EntityId::next();
    let cursor = Rc::new(RefCell::new(Cursor::default()));
    let mut tracker = ReengraveTracker::new();
    tracker.register(missing, cursor.clone());
    let outcome = engraver.engrave_tracked(&doc, &mut tracker).unwrap();
    assert_eq!(outcome.unresolved, vec![missing]);
    assert!(cursor.borrow().states.is_empty());
    assert!(matches!(outcome.into_result(), Err(EngraveError::Unresolved(ids)) if ids == vec![missing]));
}

#[test]
fn deferred_observers_are_finished_after_the_pass() {
    let voice_chord = quarter(62);
    let id = voice_chord.id;
    let doc = document(vec![voice_chord]);
    let glyphs = GlyphTable::builtin();
    let params = EngraveParams::default();
    let engraver = Engraver::new(&glyphs, &params);

    let cursor = Rc::new(RefCell::new(Cursor {
        answer: Some(ReengraveStatus::Finish),
        ..Default::default()
    }));
    let mut tracker = ReengraveTracker::new();
    tracker.register(id, cursor.clone());
    engraver.engrave_tracked(&doc, &mut tracker).unwrap();
    assert!(cursor.borrow().finished);
}

#[test]
fn reengraving_an_unchanged_score_is_stable() {
    let target = quarter(65);
    let id = target.id;
    let doc = document(vec![quarter(60), quarter(62), target]);
    let glyphs = GlyphTable::builtin();
    let params = EngraveParams::default();
    let engraver = Engraver::new(&glyphs, &params);
    let mut plate = engraver.engrave(&doc).unwrap();
    let before = plate.clone();

    let cursor = Rc::new(RefCell::new(Cursor::default()));
    let mut tracker = ReengraveTracker::new();
    tracker.register(id, cursor.clone());
    let unresolved = engraver.reengrave_score(&doc, &mut plate, 0, &mut tracker).unwrap();

    assert!(unresolved.is_empty());
    assert_eq!(plate, before);
    assert_eq!(cursor.borrow().states.len(), 1);
}

#[test]
fn staff_head_height_change_rescales_the_staff() {
    let target = quarter(67);
    let id = target.id;
    let doc = document(vec![target]);
    let glyphs = GlyphTable::builtin();
    let params = EngraveParams::default();
    let engraver = Engraver::new(&glyphs, &params);
    let mut plate = engraver.engrave(&doc).unwrap();
    let width_before = {
        let score = &plate.scores[0];
        score.note(score.find(id).unwrap()).unwrap().heads[0].width
    };

    let mut tracker = ReengraveTracker::new();
    engraver.reengrave_staff(&doc, &mut plate, 0, 0, 10_000, &mut tracker).unwrap();
    let score = &plate.scores[0];
    let line = score.lines().next().unwrap();
    assert_eq!(line.staves[0].head_height, 10_000);
    let width_after = score.note(score.find(id).unwrap()).unwrap().heads[0].width;
    assert_eq!(width_after, 2 * width_before);
}

#[test]
fn partial_passes_validate_their_arguments() {
    let doc = document(vec![quarter(60)]);
    let glyphs = GlyphTable::builtin();
    let params = EngraveParams::default();
    let engraver = Engraver::new(&glyphs, &params);
    let mut plate = engraver.engrave(&doc).unwrap();
    let mut tracker = ReengraveTracker::new();

    assert!(matches!(
        engraver.reengrave_score(&doc, &mut plate, 3, &mut tracker),
        Err(EngraveError::ScoreOutOfRange(3))
    ));
    assert!(matches!(
        engraver.reengrave_staff(&doc, &mut plate, 0, 2, 5000, &mut tracker),
        Err(EngraveError::StaffOutOfRange { score: 0, staff: 2 })
    ));
    assert!(matches!(
        engraver.reengrave_staff(&doc, &mut plate, 0, 0, 0, &mut tracker),
        Err(EngraveError::InvalidHeadHeight(0))
    ));
}
