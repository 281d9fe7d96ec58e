//! Horizontal justification and shifting of placed notes.

use std::collections::HashMap;

use crate::params::JustifyParams;
use crate::plate::{AttachableShape, Broken, NoteId, PlateCurve, PlateLine, PlateNote, PlateScore, Rect};

/// Split `slack` over the gaps of a line. Each gap gets a share
/// proportional to `constant + linear * gap^exponent`; without `forced`
/// the total is capped at `max_factor` times the sum of the gaps. The
/// shares always add up to the distributed total.
pub fn distribute_slack(gaps: &[i64], slack: i64, params: &JustifyParams, forced: bool) -> Vec<i64> {
    if gaps.is_empty() || slack <= 0 {
        return vec![0; gaps.len()];
    }
    let mut slack = slack;
    if !forced {
        let total: i64 = gaps.iter().map(|g| (*g).max(0)).sum();
        let cap = (params.max_factor * total as f64).floor() as i64;
        slack = slack.min(cap.max(0));
    }

    let weights: Vec<f64> = gaps
        .iter()
        .map(|&gap| {
            let w = params.constant_coefficient
                + params.linear_coefficient * (gap.max(0) as f64).powf(params.exponent);
            w.max(0.0)
        })
        .collect();
    let sum: f64 = weights.iter().sum();

    let mut shares: Vec<i64> = if sum > 0.0 {
        weights
            .iter()
            .map(|w| (slack as f64 * w / sum).floor() as i64)
            .collect()
    } else {
        vec![slack / gaps.len() as i64; gaps.len()]
    };
    let given: i64 = shares.iter().sum();
    if let Some(last) = shares.last_mut() {
        *last += slack - given;
    }
    shares
}

/// Stretch a finished line to its right edge. Returns whether anything
/// was moved.
pub(super) fn justify_line(
    plate: &mut PlateScore,
    line: &PlateLine,
    content_start: i64,
    params: &JustifyParams,
    forced: bool,
) -> bool {
    let ids: Vec<NoteId> = line.notes().collect();
    let movable = |n: &PlateNote| !n.generated && n.position.x >= content_start;

    // Line break markers have no extent and sit at the natural right edge;
    // they follow the last column instead of forming one.
    let mut columns: Vec<i64> = ids
        .iter()
        .filter_map(|id| plate.note(*id))
        .filter(|n| movable(n) && !n.bounding_box.is_empty())
        .map(|n| n.position.x)
        .collect();
    columns.sort_unstable();
    columns.dedup();
    if columns.len() < 2 {
        return false;
    }

    let natural_right = ids
        .iter()
        .filter_map(|id| plate.note(*id))
        .filter(|n| !n.bounding_box.is_empty())
        .map(|n| n.bounding_box.right)
        .max()
        .unwrap_or(line.right);
    let slack = line.right - natural_right;
    if slack <= 0 {
        return false;
    }

    let gaps: Vec<i64> = columns.windows(2).map(|w| w[1] - w[0]).collect();
    let shares = distribute_slack(&gaps, slack, params, forced);

    let mut column_shift = HashMap::with_capacity(columns.len());
    let mut acc = 0;
    column_shift.insert(columns[0], 0);
    for (column, share) in columns.iter().skip(1).zip(&shares) {
        acc += share;
        column_shift.insert(*column, acc);
    }

    let shifts: HashMap<NoteId, i64> = ids
        .iter()
        .filter_map(|id| {
            let note = plate.note(*id)?;
            if !movable(note) {
                return None;
            }
            if note.bounding_box.is_empty() {
                return Some((*id, acc));
            }
            column_shift.get(&note.position.x).map(|s| (*id, *s))
        })
        .collect();
    log::trace!("justified {} column(s) by {}", columns.len(), acc);
    apply_shifts(plate, &ids, &shifts);
    true
}

/// Move notes horizontally. Curve and beam ends anchored on another note
/// follow that note's shift, ends at a line boundary stay put.
pub(super) fn apply_shifts(plate: &mut PlateScore, ids: &[NoteId], shifts: &HashMap<NoteId, i64>) {
    let shift_of = |id: NoteId| shifts.get(&id).copied().unwrap_or(0);
    for id in ids {
        let own = shift_of(*id);
        let Some(note) = plate.note_mut(*id) else { continue };
        let end_of = |end: Option<NoteId>, broken: Broken| match broken {
            Broken::End | Broken::Both => 0,
            _ => end.map_or(own, shift_of),
        };
        let start_of = |broken: Broken| match broken {
            Broken::Start | Broken::Both => 0,
            _ => own,
        };

        if own != 0 {
            shift_body(note, own);
        }
        for tie in &mut note.ties {
            let (a, b) = (start_of(tie.broken), end_of(tie.end_note, tie.broken));
            shift_curve(tie, a, b);
        }
        for beam in &mut note.beams {
            beam.from.x += own;
            beam.to.x += end_of(beam.end_note, Broken::No);
        }
        for attachable in &mut note.attachables {
            match &mut attachable.shape {
                AttachableShape::Glyph(_) | AttachableShape::Text { .. } => {
                    attachable.position.x += own;
                    attachable.bounding_box = attachable.bounding_box.shifted(own);
                }
                AttachableShape::Curve(curve) => {
                    let (a, b) = (start_of(curve.broken), end_of(curve.end_note, curve.broken));
                    shift_curve(curve, a, b);
                    attachable.position.x += a;
                    attachable.bounding_box = curve.bounding_box();
                }
                AttachableShape::Hairpin { strokes, end_note, broken } => {
                    let (a, b) = (start_of(*broken), end_of(*end_note, *broken));
                    let mut rect = Rect::EMPTY;
                    for stroke in strokes.iter_mut() {
                        stroke.from.x += a;
                        stroke.to.x += b;
                        rect.extend(&stroke.bounding_box());
                    }
                    attachable.position.x += a;
                    attachable.bounding_box = rect;
                }
            }
        }
        note.refresh_boxes();
    }
}

/// Everything a note owns outright.
fn shift_body(note: &mut PlateNote, dx: i64) {
    note.position.x += dx;
    for glyph in &mut note.glyphs {
        glyph.position.x += dx;
    }
    for head in &mut note.heads {
        head.position.x += dx;
    }
    if let Some(stem) = &mut note.stem {
        stem.x += dx;
    }
    for run in &mut note.ledgers {
        run.x += dx;
    }
    for rule in &mut note.rules {
        *rule = rule.shifted(dx);
    }
    for stroke in &mut note.strokes {
        stroke.from.x += dx;
        stroke.to.x += dx;
    }
}

fn shift_curve(curve: &mut PlateCurve, start: i64, end: i64) {
    curve.points[0].x += start;
    curve.points[1].x += start;
    curve.points[2].x += end;
    curve.points[3].x += end;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_add_up_to_the_slack() {
        let params = JustifyParams::default();
        let gaps = [7000, 13_000, 9000, 21_000];
        let shares = distribute_slack(&gaps, 50_001, &params, false);
        assert_eq!(shares.iter().sum::<i64>(), 50_001);
        assert!(shares.iter().all(|s| *s >= 0));
    }

    #[test]
    fn linear_weights_are_proportional() {
        let params = JustifyParams::default();
        assert_eq!(distribute_slack(&[10, 30], 40, &params, false), vec![10, 30]);
    }

    #[test]
    fn cap_applies_unless_forced() {
        let params = JustifyParams {
            max_factor: 1.0,
            ..Default::default()
        };
        let capped = distribute_slack(&[100, 100], 1000, &params, false);
        assert_eq!(capped.iter().sum::<i64>(), 200);
        let forced = distribute_slack(&[100, 100], 1000, &params, true);
        assert_eq!(forced, vec![500, 500]);
    }

    #[test]
    fn constant_weights_spread_evenly() {
        let params = JustifyParams {
            exponent: 1.0,
            linear_coefficient: 0.0,
            constant_coefficient: 1.0,
            max_factor: 10.0,
        };
        assert_eq!(distribute_slack(&[10, 50, 90], 30, &params, false), vec![10, 10, 10]);
    }

    #[test]
    fn nothing_to_distribute() {
        let params = JustifyParams::default();
        assert_eq!(distribute_slack(&[10, 20], 0, &params, false), vec![0, 0]);
        assert!(distribute_slack(&[], 100, &params, false).is_empty());
    }
}
