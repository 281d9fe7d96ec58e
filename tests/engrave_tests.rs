//! Engraving tests: build small scores through the model API and check
//! the geometry of the resulting plate.

use pretty_assertions::assert_eq;
use scoreplate::duration::DurationEncoding;
use scoreplate::glyphs::names;
use scoreplate::plate::{AttachableShape, Broken, GlyphRole, PlateCurve, PlateNote, PlateScore};
use scoreplate::*;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn quarter(tones: &[i32]) -> Chord {
    Chord::tones(DurationEncoding::new(5, 0), tones)
}

fn eighth(tones: &[i32]) -> Chord {
    Chord::tones(DurationEncoding::new(4, 0), tones)
}

fn single_staff(objects: Vec<ScoreObject>) -> Document {
    Document::new(vec![Score::new(vec![Staff::new(Voice::new(objects))])])
}

fn engrave(doc: &Document) -> Plate {
    init_logger();
    engrave_document(doc, &GlyphTable::builtin(), &EngraveParams::default()).expect("engraving failed")
}

fn note<'p>(score: &'p PlateScore, object: EntityId) -> &'p PlateNote {
    let id = score.find(object).expect("object was not engraved");
    score.note(id).expect("dangling note id")
}

fn accidentals(note: &PlateNote) -> usize {
    note.glyphs.iter().filter(|g| g.role == GlyphRole::Accidental).count()
}

fn stem_length(note: &PlateNote) -> i64 {
    let stem = note.stem.expect("note without a stem");
    (stem.tip - stem.base).abs()
}

fn curve(note: &PlateNote) -> &PlateCurve {
    note.attachables
        .iter()
        .find_map(|a| match &a.shape {
            AttachableShape::Curve(curve) => Some(curve),
            _ => None,
        })
        .expect("note holds no curve")
}

fn newline() -> ScoreObject {
    ScoreObject::Newline(Newline::new(LineLayout::default()))
}

// ═══════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn empty_document_is_rejected() {
    let doc = Document::new(vec![]);
    let result = engrave_document(&doc, &GlyphTable::builtin(), &EngraveParams::default());
    assert!(matches!(result, Err(EngraveError::NoScore)));
}

#[test]
fn score_without_staves_is_rejected() {
    let doc = Document::new(vec![Score::new(vec![])]);
    let result = engrave_document(&doc, &GlyphTable::builtin(), &EngraveParams::default());
    assert!(matches!(result, Err(EngraveError::NoStaff { score: 0 })));
}

// ═══════════════════════════════════════════════════════════════════════
// Accidentals
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn accidentals_are_remembered_until_the_barline() {
    let first = Chord::new(
        DurationEncoding::new(5, 0),
        vec![Head::new(70).with_accidental(AccidentalKind::Flat)],
    );
    let again = quarter(&[70]);
    let after_bar = quarter(&[70]);
    let ids = (first.id, again.id, after_bar.id);
    let doc = single_staff(vec![
        ScoreObject::Chord(first),
        ScoreObject::Chord(again),
        ScoreObject::Barline(Barline::single()),
        ScoreObject::Chord(after_bar),
    ]);
    let plate = engrave(&doc);
    let score = &plate.scores[0];

    assert_eq!(accidentals(note(score, ids.0)), 1);
    assert_eq!(accidentals(note(score, ids.1)), 0);
    assert_eq!(accidentals(note(score, ids.2)), 1);
}

#[test]
fn forced_accidentals_are_always_printed() {
    let plain = quarter(&[60]);
    let forced = Chord::new(DurationEncoding::new(5, 0), vec![Head::new(60).forced()]);
    let ids = (plain.id, forced.id);
    let doc = single_staff(vec![ScoreObject::Chord(plain), ScoreObject::Chord(forced)]);
    let plate = engrave(&doc);
    let score = &plate.scores[0];

    assert_eq!(accidentals(note(score, ids.0)), 0);
    assert_eq!(accidentals(note(score, ids.1)), 1);
}

#[test]
fn relative_accidentals_follow_the_key() {
    let lowered = Chord::new(DurationEncoding::new(5, 0), vec![Head::new(65).relative(-1)]);
    let in_key = Chord::new(DurationEncoding::new(5, 0), vec![Head::new(65).relative(0)]);
    let raised = Chord::new(DurationEncoding::new(5, 0), vec![Head::new(65).relative(3)]);
    let ids = (lowered.id, in_key.id, raised.id);
    let doc = single_staff(vec![
        ScoreObject::Key(Key::sharps(1)),
        ScoreObject::Chord(lowered),
        ScoreObject::Barline(Barline::single()),
        ScoreObject::Chord(in_key),
        ScoreObject::Barline(Barline::single()),
        ScoreObject::Chord(raised),
    ]);
    let plate = engrave(&doc);
    let score = &plate.scores[0];
    let accidental = |n: &PlateNote| {
        n.glyphs
            .iter()
            .find(|g| g.role == GlyphRole::Accidental)
            .map(|g| g.id.clone())
    };

    let n = note(score, ids.0);
    assert_eq!(n.heads[0].tone, 65);
    assert_eq!(accidental(n), Some(GlyphId::from(names::NATURAL)));

    let n = note(score, ids.1);
    assert_eq!(n.heads[0].tone, 66);
    assert_eq!(accidental(n), None);

    // saturates at a double sharp
    let n = note(score, ids.2);
    assert_eq!(n.heads[0].tone, 67);
    assert_eq!(accidental(n), Some(GlyphId::from(names::DOUBLE_SHARP)));
    // all three share the F line
    assert_eq!(n.heads[0].staff_position, note(score, ids.0).heads[0].staff_position);
}

#[test]
fn stacked_accidentals_push_the_chord_right() {
    let first = quarter(&[67]);
    let sharp = |tone| Head::new(tone).with_accidental(AccidentalKind::Sharp);
    let second = Chord::new(DurationEncoding::new(5, 0), vec![sharp(66), sharp(68), sharp(70)]);
    let ids = (first.id, second.id);
    let mut doc = single_staff(vec![ScoreObject::Chord(first), ScoreObject::Chord(second)]);
    doc.scores[0].layout.justify = false;
    let plate = engrave(&doc);
    let score = &plate.scores[0];

    let first = note(score, ids.0);
    let second = note(score, ids.1);
    let params = EngraveParams::default();
    let lefts: Vec<i64> = second
        .glyphs
        .iter()
        .filter(|g| g.role == GlyphRole::Accidental)
        .map(|g| g.position.x)
        .collect();
    assert_eq!(lefts.len(), 3);
    // three overlapping sharps need three columns
    let mut columns = lefts.clone();
    columns.sort_unstable();
    columns.dedup();
    assert_eq!(columns.len(), 3);

    let leftmost = *columns.first().unwrap();
    assert_eq!(leftmost, first.bounding_box.right + params.len(params.accidental_distance, 5000));
    assert!(second.position.x - first.position.x > params.len(params.quarter_distance, 5000));
}

#[test]
fn seconds_put_one_head_across_the_stem() {
    let chord = quarter(&[64, 65]);
    let id = chord.id;
    let plate = engrave(&single_staff(vec![ScoreObject::Chord(chord)]));
    let n = note(&plate.scores[0], id);

    assert!(n.cluster);
    let opposite: Vec<_> = n.heads.iter().filter(|h| h.opposite).collect();
    let regular: Vec<_> = n.heads.iter().filter(|h| !h.opposite).collect();
    assert_eq!((opposite.len(), regular.len()), (1, 1));
    assert!(n.stem.unwrap().up);
    // displaced to the right of an up stem by the head's stem offset
    assert_eq!(opposite[0].position.x - regular[0].position.x, 11_800);
}

// ═══════════════════════════════════════════════════════════════════════
// Ties
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn tie_ends_at_the_following_head() {
    let source = Chord::new(DurationEncoding::new(5, 0), vec![Head::new(64).tied()]);
    let target = quarter(&[64]);
    let ids = (source.id, target.id);
    let doc = single_staff(vec![ScoreObject::Chord(source), ScoreObject::Chord(target)]);
    let plate = engrave(&doc);
    let score = &plate.scores[0];

    let source = note(score, ids.0);
    let target_id = score.find(ids.1).unwrap();
    let target = score.note(target_id).unwrap();
    assert_eq!(source.ties.len(), 1);
    let tie = &source.ties[0];
    assert_eq!(tie.broken, Broken::No);
    assert_eq!(tie.end_note, Some(target_id));
    assert_eq!(tie.tone, Some(64));
    assert_eq!(tie.points[3].x, target.heads[0].position.x);
    assert!(tie.points[0].x > source.heads[0].position.x);
}

#[test]
fn tie_across_a_newline_is_drawn_in_two_halves() {
    let source = Chord::new(DurationEncoding::new(5, 0), vec![Head::new(67).tied()]);
    let target = quarter(&[67]);
    let ids = (source.id, target.id);
    let doc = single_staff(vec![
        ScoreObject::Chord(source),
        ScoreObject::Newline(Newline::new(LineLayout::default())),
        ScoreObject::Chord(target),
    ]);
    let plate = engrave(&doc);
    let score = &plate.scores[0];
    let lines: Vec<_> = score.lines().collect();
    assert_eq!(lines.len(), 2);

    let first_half = &note(score, ids.0).ties[0];
    assert_eq!(first_half.broken, Broken::End);
    assert_eq!(first_half.end_note, None);
    assert_eq!(first_half.points[3].x, lines[0].right);

    let target = note(score, ids.1);
    assert_eq!(target.ties.len(), 1);
    let second_half = &target.ties[0];
    assert_eq!(second_half.broken, Broken::Start);
    assert_eq!(second_half.points[3].x, target.heads[0].position.x);
    assert!(second_half.points[0].x >= lines[1].left);
}

#[test]
fn tie_without_a_continuation_gets_a_stub() {
    let source = Chord::new(DurationEncoding::new(5, 0), vec![Head::new(64).tied()]);
    let id = source.id;
    let doc = single_staff(vec![
        ScoreObject::Chord(source),
        ScoreObject::Rest(Rest::new(DurationEncoding::new(5, 0))),
    ]);
    let plate = engrave(&doc);
    let ties = &note(&plate.scores[0], id).ties;
    assert_eq!(ties.len(), 1);
    assert_eq!(ties[0].broken, Broken::No);
    assert_eq!(ties[0].end_note, None);
}

// ═══════════════════════════════════════════════════════════════════════
// Beams and stems
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn eighths_share_one_beam() {
    let chords: Vec<Chord> = [60, 62, 64, 65].iter().map(|&t| eighth(&[t])).collect();
    let ids: Vec<EntityId> = chords.iter().map(|c| c.id).collect();
    let doc = single_staff(chords.into_iter().map(ScoreObject::Chord).collect());
    let plate = engrave(&doc);
    let score = &plate.scores[0];
    let notes: Vec<&PlateNote> = ids.iter().map(|id| note(score, *id)).collect();

    for (i, n) in notes.iter().enumerate() {
        let stem = n.stem.expect("eighth without a stem");
        assert!(stem.up, "low notes get stems up");
        assert!(n.glyphs.iter().all(|g| g.role != GlyphRole::Flag), "beamed notes have no flags");
        if i + 1 < notes.len() {
            assert_eq!(n.beams.len(), 1);
            let beam = &n.beams[0];
            assert_eq!(beam.level, 1);
            assert_eq!(beam.end_note, score.find(ids[i + 1]));
            assert_eq!(beam.from.y, stem.tip);
        } else {
            assert!(n.beams.is_empty());
            assert_eq!(notes[i - 1].beams[0].to.y, stem.tip);
        }
    }
}

#[test]
fn lone_eighth_gets_a_flag() {
    let chord = eighth(&[72]);
    let id = chord.id;
    let doc = single_staff(vec![
        ScoreObject::Chord(chord),
        ScoreObject::Rest(Rest::new(DurationEncoding::new(4, 0))),
    ]);
    let plate = engrave(&doc);
    let n = note(&plate.scores[0], id);
    assert!(n.beams.is_empty());
    assert_eq!(n.glyphs.iter().filter(|g| g.role == GlyphRole::Flag).count(), 1);
    // C5 sits above the middle line
    assert!(!n.stem.unwrap().up);
}

#[test]
fn middle_c_has_one_ledger_line() {
    let chord = quarter(&[60]);
    let id = chord.id;
    let plate = engrave(&single_staff(vec![ScoreObject::Chord(chord)]));
    let n = note(&plate.scores[0], id);
    assert_eq!(n.ledgers.len(), 1);
    assert_eq!(n.ledgers[0].count, 1);
    assert!(n.ledgers[0].first_y > n.position.y);
}

#[test]
fn clustered_chords_get_longer_stems() {
    let plain = quarter(&[64]);
    let clustered = quarter(&[64, 65]);
    let ids = (plain.id, clustered.id);
    let doc = single_staff(vec![ScoreObject::Chord(plain), ScoreObject::Chord(clustered)]);
    let plate = engrave(&doc);
    let score = &plate.scores[0];
    let params = EngraveParams::default();

    let plain = stem_length(note(score, ids.0));
    assert_eq!(plain, params.len(params.stem_length, 5000));
    // one head-height more span plus the cluster extension
    let extension = params.len(params.cluster_stem_extension, 5000);
    assert!(extension > 0);
    assert_eq!(stem_length(note(score, ids.1)), plain + 5000 + extension);
}

#[test]
fn rest_splits_a_beam_group() {
    let chords: Vec<Chord> = [67, 69, 71, 72].iter().map(|&t| eighth(&[t])).collect();
    let ids: Vec<EntityId> = chords.iter().map(|c| c.id).collect();
    let mut objects: Vec<ScoreObject> = chords.into_iter().map(ScoreObject::Chord).collect();
    objects.insert(2, ScoreObject::Rest(Rest::new(DurationEncoding::new(4, 0))));
    let plate = engrave(&single_staff(objects));
    let score = &plate.scores[0];
    let notes: Vec<&PlateNote> = ids.iter().map(|id| note(score, *id)).collect();

    assert_eq!(notes[0].beams.len(), 1);
    assert_eq!(notes[0].beams[0].end_note, score.find(ids[1]));
    assert!(notes[1].beams.is_empty());
    assert_eq!(notes[2].beams.len(), 1);
    assert_eq!(notes[2].beams[0].end_note, score.find(ids[3]));
    assert!(notes[3].beams.is_empty());
    for n in &notes {
        assert!(n.glyphs.iter().all(|g| g.role != GlyphRole::Flag));
    }
}

#[test]
fn sixteenth_rest_hangs_two_flags_on_a_stem() {
    let rest = Rest::new(DurationEncoding::new(3, 0));
    let id = rest.id;
    let plate = engrave(&single_staff(vec![ScoreObject::Rest(rest)]));
    let n = note(&plate.scores[0], id);

    let flags: Vec<_> = n
        .glyphs
        .iter()
        .filter(|g| g.id == GlyphId::from(names::REST_FLAG))
        .collect();
    assert_eq!(flags.len(), 2);
    assert!(flags[1].position.y > flags[0].position.y);
    assert!(flags[1].position.x < flags[0].position.x);
    assert_eq!(n.strokes.len(), 1);
    let stem = &n.strokes[0];
    assert!(stem.to.y > stem.from.y);
    assert!(stem.to.x < stem.from.x, "the stem leans like the flags");
}

#[test]
fn dotted_rest_gets_a_dot() {
    let rest = Rest::new(DurationEncoding::new(5, 1));
    let id = rest.id;
    let plate = engrave(&single_staff(vec![ScoreObject::Rest(rest)]));
    let n = note(&plate.scores[0], id);

    let main = n.glyphs.iter().find(|g| g.role == GlyphRole::Main).unwrap();
    assert_eq!(main.id, GlyphId::from(names::REST_QUARTER));
    let dots: Vec<_> = n.glyphs.iter().filter(|g| g.role == GlyphRole::Dot).collect();
    assert_eq!(dots.len(), 1);
    assert!(dots[0].position.x > main.position.x + main.width);
}

#[test]
fn sub_voices_take_stems_from_their_side() {
    let above = quarter(&[79]);
    let below = quarter(&[55]);
    let mut host = quarter(&[67]);
    let ids = (host.id, above.id, below.id);
    host.sub_voices = SubVoices {
        voices: vec![
            Voice::new(vec![ScoreObject::Chord(above)]),
            Voice::new(vec![ScoreObject::Chord(below)]),
        ],
        first_below: 1,
    };
    let plate = engrave(&single_staff(vec![ScoreObject::Chord(host), ScoreObject::Chord(quarter(&[67]))]));
    let score = &plate.scores[0];

    let host = note(score, ids.0);
    let above = note(score, ids.1);
    let below = note(score, ids.2);
    assert_eq!(above.time, host.time);
    assert_eq!(below.time, host.time);
    // G5 would take a down stem on its own, G3 an up stem
    assert!(above.stem.unwrap().up);
    assert!(!below.stem.unwrap().up);
    assert_ne!(above.voice, host.voice);
    assert_ne!(below.voice, above.voice);
}

#[test]
fn time_signature_digits_are_stacked_and_centered() {
    let time = TimeSig::new(12, 8);
    let id = time.id;
    let plate = engrave(&single_staff(vec![ScoreObject::TimeSig(time), ScoreObject::Chord(eighth(&[67]))]));
    let n = note(&plate.scores[0], id);

    let digits: Vec<_> = n.glyphs.iter().filter(|g| g.role == GlyphRole::Digit).collect();
    assert_eq!(digits.len(), 3);
    let (one, two, eight) = (digits[0], digits[1], digits[2]);
    assert_eq!(one.id, GlyphId::from(names::TIMESIG_DIGITS[1]));
    assert_eq!(two.id, GlyphId::from(names::TIMESIG_DIGITS[2]));
    assert_eq!(eight.id, GlyphId::from(names::TIMESIG_DIGITS[8]));

    assert_eq!(one.position.y, two.position.y);
    assert_eq!(two.position.x, one.position.x + one.width);
    assert!(eight.position.y > one.position.y);
    // the narrower row is centered under the wider one
    let upper_center = (one.position.x + two.position.x + two.width) / 2;
    assert_eq!(eight.position.x + eight.width / 2, upper_center);
}

// ═══════════════════════════════════════════════════════════════════════
// Lines, barlines and justification
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn forced_justification_fills_the_line() {
    let mut doc = single_staff((0..4).map(|_| ScoreObject::Chord(quarter(&[67]))).collect());
    doc.scores[0].layout.forced_justification = true;
    let plate = engrave(&doc);
    let score = &plate.scores[0];
    let line = score.lines().next().unwrap();

    assert!(line.justified);
    let right = line
        .notes()
        .filter_map(|id| score.note(id))
        .map(|n| n.bounding_box.right)
        .max()
        .unwrap();
    assert_eq!(right, line.right);
}

#[test]
fn forced_justification_reaches_the_edge_before_a_newline() {
    let mut objects: Vec<ScoreObject> = (0..4).map(|_| ScoreObject::Chord(quarter(&[67]))).collect();
    objects.push(ScoreObject::Barline(Barline::single()));
    objects.push(newline());
    objects.push(ScoreObject::Chord(quarter(&[67])));
    let mut doc = single_staff(objects);
    doc.scores[0].layout.forced_justification = true;
    let plate = engrave(&doc);
    let score = &plate.scores[0];
    let line = score.lines().next().unwrap();

    assert!(line.justified);
    let right = line
        .notes()
        .filter_map(|id| score.note(id))
        .filter(|n| !n.bounding_box.is_empty())
        .map(|n| n.bounding_box.right)
        .max()
        .unwrap();
    assert_eq!(right, line.right);
}

#[test]
fn justification_is_capped_without_forcing() {
    let chords: Vec<Chord> = (0..4).map(|_| quarter(&[67])).collect();
    let ids: Vec<EntityId> = chords.iter().map(|c| c.id).collect();
    let mut natural = single_staff(chords.into_iter().map(ScoreObject::Chord).collect());
    let mut stretched = natural.clone();
    natural.scores[0].layout.justify = false;
    stretched.scores[0].layout.justify = true;

    let mut params = EngraveParams::default();
    params.justification.max_factor = 0.5;
    init_logger();
    let glyphs = GlyphTable::builtin();
    let natural = engrave_document(&natural, &glyphs, &params).unwrap();
    let stretched = engrave_document(&stretched, &glyphs, &params).unwrap();

    let xs = |plate: &Plate| -> Vec<i64> {
        ids.iter().map(|id| note(&plate.scores[0], *id).position.x).collect()
    };
    let (before, after) = (xs(&natural), xs(&stretched));
    let span = before[3] - before[0];
    let cap = (0.5 * span as f64).floor() as i64;
    let line = stretched.scores[0].lines().next().unwrap();
    assert!(line.justified);
    assert!(line.right - note(&natural.scores[0], ids[3]).bounding_box.right > cap);

    assert_eq!(after[0], before[0]);
    assert_eq!(after[3] - before[3], cap);
    for (a, b) in after.windows(2).zip(before.windows(2)) {
        assert!(a[1] - a[0] >= b[1] - b[0], "justification never shrinks a gap");
    }
}

#[test]
fn unjustified_lines_keep_their_natural_width() {
    let mut doc = single_staff((0..4).map(|_| ScoreObject::Chord(quarter(&[67]))).collect());
    doc.scores[0].layout.justify = false;
    let plate = engrave(&doc);
    let score = &plate.scores[0];
    let line = score.lines().next().unwrap();

    assert!(!line.justified);
    let xs: Vec<i64> = line.notes().filter_map(|id| score.note(id)).map(|n| n.position.x).collect();
    assert!(xs.windows(2).all(|w| w[0] < w[1]));
    let right = line
        .notes()
        .filter_map(|id| score.note(id))
        .map(|n| n.bounding_box.right)
        .max()
        .unwrap();
    assert!(right < line.right);
}

#[test]
fn continuation_lines_start_with_clef_and_key() {
    let doc = single_staff(vec![
        ScoreObject::Key(Key::sharps(2)),
        ScoreObject::Chord(quarter(&[62])),
        ScoreObject::Barline(Barline::single()),
        ScoreObject::Newline(Newline::new(LineLayout::default())),
        ScoreObject::Chord(quarter(&[66])),
    ]);
    let plate = engrave(&doc);
    let score = &plate.scores[0];
    let lines: Vec<_> = score.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].first_measure, 1);
    assert_eq!(lines[1].first_measure, 2);

    let generated: Vec<&PlateNote> = lines[1]
        .notes()
        .filter_map(|id| score.note(id))
        .filter(|n| n.is_at_line_start())
        .collect();
    assert_eq!(generated.len(), 2);
    let key = generated[1];
    assert_eq!(key.glyphs.iter().filter(|g| g.role == GlyphRole::KeyAccidental).count(), 2);
    // F sharp comes from the key
    let chord = lines[1].notes().filter_map(|id| score.note(id)).find(|n| !n.heads.is_empty()).unwrap();
    assert_eq!(accidentals(chord), 0);
    assert!(chord.position.x > key.right());
}

#[test]
fn key_change_prints_cancelling_naturals() {
    let key = Key::none();
    let id = key.id;
    let doc = single_staff(vec![
        ScoreObject::Key(Key::flats(3)),
        ScoreObject::Chord(quarter(&[63])),
        ScoreObject::Barline(Barline::single()),
        ScoreObject::Key(key),
        ScoreObject::Chord(quarter(&[64])),
    ]);
    let plate = engrave(&doc);
    let n = note(&plate.scores[0], id);
    assert_eq!(n.glyphs.iter().filter(|g| g.role == GlyphRole::Cancel).count(), 3);
    assert_eq!(n.glyphs.iter().filter(|g| g.role == GlyphRole::KeyAccidental).count(), 0);
}

#[test]
fn long_barlines_reach_the_next_staff() {
    let barline = Barline::single();
    let id = barline.id;
    let upper = Voice::new(vec![ScoreObject::Chord(quarter(&[72])), ScoreObject::Barline(barline)]);
    let lower = Voice::new(vec![ScoreObject::Chord(quarter(&[48]))]);
    let mut top = Staff::new(upper);
    top.long_barlines = true;
    let doc = Document::new(vec![Score::new(vec![top, Staff::new(lower)])]);
    let plate = engrave(&doc);
    let score = &plate.scores[0];
    let line = score.lines().next().unwrap();

    let rules = &note(score, id).rules;
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].top, line.staves[0].top);
    assert_eq!(rules[0].bottom, line.staves[1].top);
}

#[test]
fn double_barline_has_two_rules() {
    let barline = Barline::double();
    let id = barline.id;
    let doc = single_staff(vec![ScoreObject::Chord(quarter(&[67])), ScoreObject::Barline(barline)]);
    let plate = engrave(&doc);
    let score = &plate.scores[0];
    let line = score.lines().next().unwrap();
    let rules = &note(score, id).rules;
    assert_eq!(rules.len(), 2);
    assert!(rules[0].right < rules[1].left);
    assert_eq!(rules[1].bottom, line.staves[0].bottom());
}

#[test]
fn lines_overflow_onto_the_next_page() {
    let mut objects = Vec::new();
    for _ in 0..30 {
        objects.push(ScoreObject::Chord(quarter(&[67])));
        objects.push(ScoreObject::Newline(Newline::new(LineLayout::default())));
    }
    objects.push(ScoreObject::Chord(quarter(&[67])));
    let doc = single_staff(objects);
    let plate = engrave(&doc);

    assert!(plate.page_count() >= 2);
    let bottom = doc.page.content_bottom();
    for page in &plate.scores[0].pages {
        for line in &page.lines {
            assert!(line.staves[0].bottom() <= bottom);
        }
    }
    assert_eq!(plate.scores[0].lines().count(), 31);
}

// ═══════════════════════════════════════════════════════════════════════
// Attachables and lookup
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn slur_runs_to_its_end_object() {
    let end = quarter(&[67]);
    let mut start = quarter(&[64]);
    start.attachables.push(Attachable::slur(end.id));
    let ids = (start.id, end.id);
    let doc = single_staff(vec![
        ScoreObject::Chord(start),
        ScoreObject::Chord(quarter(&[65])),
        ScoreObject::Chord(end),
    ]);
    let plate = engrave(&doc);
    let score = &plate.scores[0];
    let start = note(score, ids.0);
    assert_eq!(start.attachables.len(), 1);
    match &start.attachables[0].shape {
        AttachableShape::Curve(curve) => {
            assert_eq!(curve.end_note, score.find(ids.1));
            assert_eq!(curve.broken, Broken::No);
            assert!(curve.points[3].x > curve.points[0].x);
        }
        other => panic!("expected a slur curve, got {:?}", other),
    }
}

#[test]
fn crescendo_opens_towards_its_end() {
    let end = quarter(&[67]);
    let mut start = quarter(&[64]);
    start.attachables.push(Attachable::hairpin(end.id, true));
    let ids = (start.id, end.id);
    let doc = single_staff(vec![
        ScoreObject::Chord(start),
        ScoreObject::Chord(quarter(&[65])),
        ScoreObject::Chord(end),
    ]);
    let plate = engrave(&doc);
    let score = &plate.scores[0];
    let start = note(score, ids.0);
    let target = note(score, ids.1);

    assert_eq!(start.attachables.len(), 1);
    let attachable = &start.attachables[0];
    match &attachable.shape {
        AttachableShape::Hairpin { strokes, end_note, broken } => {
            assert_eq!(*end_note, score.find(ids.1));
            assert_eq!(*broken, Broken::No);
            assert_eq!(strokes.len(), 2);
            for stroke in strokes {
                assert_eq!(stroke.from, attachable.position);
                assert_eq!(stroke.to.x, target.position.x);
            }
            let opening = (strokes[1].to.y - strokes[0].to.y).abs();
            assert_eq!(opening, EngraveParams::default().len(1800, 5000));
            assert!(attachable.position.y > start.position.y, "hairpins sit below the staff");
        }
        other => panic!("expected a hairpin, got {:?}", other),
    }
}

#[test]
fn slur_across_a_newline_continues_after_the_clef() {
    let end = quarter(&[67]);
    let mut start = quarter(&[64]);
    start.attachables.push(Attachable::slur(end.id));
    let ids = (start.id, end.id);
    let doc = single_staff(vec![ScoreObject::Chord(start), newline(), ScoreObject::Chord(end)]);
    let plate = engrave(&doc);
    let score = &plate.scores[0];
    let lines: Vec<_> = score.lines().collect();
    assert_eq!(lines.len(), 2);

    let first = curve(note(score, ids.0));
    assert_eq!(first.broken, Broken::End);
    assert_eq!(first.end_note, None);
    assert_eq!(first.points[3].x, lines[0].right);

    let clef = lines[1]
        .notes()
        .filter_map(|id| score.note(id))
        .find(|n| n.generated && !n.attachables.is_empty())
        .expect("continuation held by the generated clef");
    let second = curve(clef);
    let target = note(score, ids.1);
    assert_eq!(second.broken, Broken::Start);
    assert_eq!(second.end_note, score.find(ids.1));
    assert_eq!(second.points[3].x, target.position.x);
    assert!(second.points[0].x > clef.glyph_box.right);
    assert!(second.points[3].x > second.points[0].x, "the continuation has a width");
}

#[test]
fn slur_over_a_whole_line_is_broken_on_both_sides() {
    let end = quarter(&[67]);
    let mut start = quarter(&[64]);
    start.attachables.push(Attachable::slur(end.id));
    let ids = (start.id, end.id);
    let doc = single_staff(vec![
        ScoreObject::Chord(start),
        newline(),
        ScoreObject::Chord(quarter(&[65])),
        newline(),
        ScoreObject::Chord(end),
    ]);
    let plate = engrave(&doc);
    let score = &plate.scores[0];
    let lines: Vec<_> = score.lines().collect();
    assert_eq!(lines.len(), 3);

    let mut pieces: Vec<(usize, &PlateCurve)> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        for n in line.notes().filter_map(|id| score.note(id)) {
            for a in &n.attachables {
                if let AttachableShape::Curve(curve) = &a.shape {
                    pieces.push((i, curve));
                }
            }
        }
    }
    let brokens: Vec<(usize, Broken)> = pieces.iter().map(|(i, c)| (*i, c.broken)).collect();
    assert_eq!(brokens, vec![(0, Broken::End), (1, Broken::Both), (2, Broken::Start)]);

    let middle = pieces[1].1;
    assert!(middle.points[0].x > lines[1].left);
    assert_eq!(middle.points[3].x, lines[1].right);
    assert_eq!(pieces[2].1.end_note, score.find(ids.1));
    assert_eq!(curve(note(score, ids.0)).broken, Broken::End);
}

#[test]
fn hit_test_finds_the_head_under_the_point() {
    let chord = quarter(&[67]);
    let id = chord.id;
    let plate = engrave(&single_staff(vec![ScoreObject::Chord(chord)]));
    let score = &plate.scores[0];
    let note_id = score.find(id).unwrap();
    let center = score.note(note_id).unwrap().heads[0].center();

    assert_eq!(plate.hit_test(0, center), vec![(0, note_id)]);
    assert!(plate.hit_test(0, Position::new(-1, -1)).is_empty());
}

#[test]
fn plate_carries_the_score_tempo() {
    let mut doc = single_staff(vec![ScoreObject::Chord(quarter(&[67]))]);
    doc.scores[0].tempo = 96;
    let plate = engrave(&doc);
    assert_eq!(plate.scores[0].tempo, 96);
}

#[test]
fn plate_serializes_to_json() {
    let plate = engrave(&single_staff(vec![ScoreObject::Chord(quarter(&[67]))]));
    let json = plate_to_json(&plate).unwrap();
    assert!(json.contains("\"scores\""));
    assert!(json.contains("\"heads\""));
}
