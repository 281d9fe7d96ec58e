//! Engraving parameters.
//!
//! All lengths are given in thousandths of a head-height and converted to
//! milli-pixels per staff with [`EngraveParams::len`]. Every field has a
//! default, so a partial JSON object deserializes into a full parameter set.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngraveParams {
    // ── Horizontal spacing ──────────────────────────────────────────────
    /// Minimum gap between two consecutive objects of one voice.
    pub min_distance: i32,
    /// Gap after a barline.
    pub barline_distance: i32,
    /// Gap after clefs, keys and time signatures.
    pub nonnote_distance: i32,
    /// Width allotted to a quarter note.
    pub quarter_distance: i32,
    /// Power applied to the duration ratio when spacing notes.
    pub duration_exponent: f64,

    // ── Note body ───────────────────────────────────────────────────────
    pub accidental_distance: i32,
    pub accidental_column_distance: i32,
    pub dot_distance: i32,
    pub dot_spacing: i32,
    pub stem_length: i32,
    pub stem_width: i32,
    /// Extra stem length per flag beyond the second.
    pub flag_stem_extension: i32,
    /// Extra stem length for chords with heads on both sides of the stem.
    pub cluster_stem_extension: i32,
    pub ledger_overhang: i32,
    pub ledger_thickness: i32,
    pub articulation_distance: i32,

    // ── Beams ───────────────────────────────────────────────────────────
    pub beam_thickness: i32,
    pub beam_gap: i32,
    pub beam_max_slope: f64,
    pub beam_min_stem: i32,
    pub short_beam_length: i32,

    // ── Curves ──────────────────────────────────────────────────────────
    pub tie_offset: i32,
    pub tie_curvature: i32,
    pub tie_thickness: i32,
    pub slur_thickness: i32,

    // ── Staff ───────────────────────────────────────────────────────────
    pub staff_line_thickness: i32,
    /// Default distance between the bottom of one line and the next line.
    pub line_distance: i32,

    pub justification: JustifyParams,
}

impl Default for EngraveParams {
    fn default() -> Self {
        Self {
            min_distance: 1200,
            barline_distance: 2000,
            nonnote_distance: 1500,
            quarter_distance: 7000,
            duration_exponent: 0.6,

            accidental_distance: 300,
            accidental_column_distance: 150,
            dot_distance: 500,
            dot_spacing: 450,
            stem_length: 7000,
            stem_width: 250,
            flag_stem_extension: 750,
            cluster_stem_extension: 1000,
            ledger_overhang: 400,
            ledger_thickness: 320,
            articulation_distance: 600,

            beam_thickness: 1000,
            beam_gap: 500,
            beam_max_slope: 0.5,
            beam_min_stem: 5000,
            short_beam_length: 2300,

            tie_offset: 600,
            tie_curvature: 1200,
            tie_thickness: 350,
            slur_thickness: 450,

            staff_line_thickness: 260,
            line_distance: 12_000,

            justification: JustifyParams::default(),
        }
    }
}

impl EngraveParams {
    /// Convert a promille-of-head-height length to milli-pixels.
    pub fn len(&self, promille: i32, head_height: i64) -> i64 {
        head_height * promille as i64 / 1000
    }
}

/// How leftover line width is spread over the gaps of a justified line.
///
/// Each gap receives a share proportional to
/// `constant_coefficient + linear_coefficient * gap^exponent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JustifyParams {
    pub exponent: f64,
    pub linear_coefficient: f64,
    pub constant_coefficient: f64,
    /// Upper bound of the added width relative to the line's natural gap
    /// sum, ignored for forced justification.
    pub max_factor: f64,
}

impl Default for JustifyParams {
    fn default() -> Self {
        Self {
            exponent: 1.0,
            linear_coefficient: 1.0,
            constant_coefficient: 0.0,
            max_factor: 3.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let params: EngraveParams =
            serde_json::from_str(r#"{ "stem_length": 8000, "justification": { "exponent": 2.0 } }"#)
                .unwrap();
        assert_eq!(params.stem_length, 8000);
        assert_eq!(params.justification.exponent, 2.0);
        assert_eq!(params.justification.max_factor, 3.0);
        assert_eq!(params.min_distance, EngraveParams::default().min_distance);
    }

    #[test]
    fn promille_conversion() {
        let params = EngraveParams::default();
        assert_eq!(params.len(1500, 5000), 7500);
        assert_eq!(params.len(params.stem_length, 5000), 35_000);
    }
}
