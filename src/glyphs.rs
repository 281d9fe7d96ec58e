//! Glyph metadata: symbolic glyph ids mapped to their geometric metrics.
//!
//! The engraver only queries this table. Metrics are stored in table units
//! where `head_height` units equal one head-height (half a staff space); they
//! are scaled to milli-pixels per staff with [`GlyphTable::scaled`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngraveError;

/// Symbolic ids of the glyphs the engraver asks for by default.
pub mod names {
    pub const HEAD_BLACK: &str = "head.black";
    pub const HEAD_HALF: &str = "head.half";
    pub const HEAD_WHOLE: &str = "head.whole";

    pub const CLEF_G: &str = "clef.g";
    pub const CLEF_F: &str = "clef.f";
    pub const CLEF_C: &str = "clef.c";

    pub const SHARP: &str = "acc.sharp";
    pub const FLAT: &str = "acc.flat";
    pub const NATURAL: &str = "acc.natural";
    pub const DOUBLE_SHARP: &str = "acc.double-sharp";
    pub const DOUBLE_FLAT: &str = "acc.double-flat";

    pub const TIMESIG_DIGITS: [&str; 10] = [
        "timesig.0", "timesig.1", "timesig.2", "timesig.3", "timesig.4",
        "timesig.5", "timesig.6", "timesig.7", "timesig.8", "timesig.9",
    ];
    pub const TIMESIG_COMMON: &str = "timesig.common";
    pub const TIMESIG_CUT: &str = "timesig.cut";

    pub const DOT: &str = "dot";
    pub const FLAG_UP: &str = "flag.up";
    pub const FLAG_DOWN: &str = "flag.down";

    pub const REST_WHOLE: &str = "rest.whole";
    pub const REST_HALF: &str = "rest.half";
    pub const REST_QUARTER: &str = "rest.quarter";
    pub const REST_FLAG: &str = "rest.flag";

    pub const STACCATO: &str = "artic.staccato";
    pub const ACCENT: &str = "artic.accent";
    pub const TENUTO: &str = "artic.tenuto";
    pub const FERMATA: &str = "artic.fermata";
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlyphId(String);

impl GlyphId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GlyphId {
    fn from(name: &str) -> Self {
        GlyphId(name.to_string())
    }
}

impl fmt::Display for GlyphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metrics of one glyph, in table units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlyphInfo {
    pub width: f64,
    pub height: f64,
    /// Named lengths (`anchor.x`, `anchor.y`, `stem.x`, `distance`, ...),
    /// scaled together with width and height.
    #[serde(default)]
    pub reals: HashMap<String, f64>,
    /// Named integers (`line`, `codepoint`, ...), never scaled.
    #[serde(default)]
    pub integers: HashMap<String, i64>,
}

impl GlyphInfo {
    fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    fn real(mut self, name: &str, value: f64) -> Self {
        self.reals.insert(name.to_string(), value);
        self
    }

    fn integer(mut self, name: &str, value: i64) -> Self {
        self.integers.insert(name.to_string(), value);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GlyphTable {
    /// Table units per head-height.
    pub head_height: f64,
    glyphs: HashMap<String, GlyphInfo>,
    /// Metrics used in place of any glyph the table does not define.
    undefined: GlyphInfo,
}

#[derive(Deserialize)]
struct RawTable {
    head_height: f64,
    #[serde(default)]
    glyphs: HashMap<String, GlyphInfo>,
    #[serde(default)]
    undefined: Option<GlyphInfo>,
}

impl GlyphTable {
    /// An empty table; every lookup falls back to the undefined metrics.
    pub fn new(head_height: f64) -> Self {
        Self {
            head_height,
            glyphs: HashMap::new(),
            undefined: undefined_glyph(head_height),
        }
    }

    /// Build a table from its JSON form. Without an `undefined` entry the
    /// fallback is a box of two head-heights.
    pub fn from_json(json: &str) -> Result<Self, EngraveError> {
        let raw: RawTable = serde_json::from_str(json)?;
        let mut table = Self::new(raw.head_height);
        table.glyphs = raw.glyphs;
        if let Some(undefined) = raw.undefined {
            table.undefined = undefined;
        }
        Ok(table)
    }

    pub fn insert(&mut self, id: &str, info: GlyphInfo) {
        self.glyphs.insert(id.to_string(), info);
    }

    pub fn get(&self, id: &GlyphId) -> Option<&GlyphInfo> {
        self.glyphs.get(id.as_str())
    }

    pub fn contains(&self, id: &GlyphId) -> bool {
        self.glyphs.contains_key(id.as_str())
    }

    /// Look a glyph up. `None` when the table does not define it.
    pub fn resolve(&self, id: &GlyphId) -> Option<&GlyphInfo> {
        self.glyphs.get(id.as_str())
    }

    pub fn undefined(&self) -> &GlyphInfo {
        &self.undefined
    }

    /// Resolve a glyph and scale it to a staff with the given head-height
    /// (in milli-pixels). An unknown id keeps its name but gets the
    /// undefined metrics.
    pub fn scaled(&self, id: &GlyphId, head_height: i64) -> ScaledGlyph<'_> {
        let info = self.resolve(id).unwrap_or_else(|| {
            log::warn!("glyph '{}' is not defined, using the undefined metrics", id);
            &self.undefined
        });
        ScaledGlyph {
            id: id.clone(),
            info,
            scale: head_height as f64 / self.head_height,
        }
    }

    /// Metrics modelled on a SMuFL font, 125 units per head-height.
    pub fn builtin() -> Self {
        use names::*;
        let mut t = Self::new(125.0);

        let head = |w: f64| {
            GlyphInfo::new(w, 250.0)
                .real("anchor.y", 125.0)
                .real("stem.x", w)
        };
        t.insert(HEAD_BLACK, head(295.0).integer("codepoint", 0xE0A4));
        t.insert(HEAD_HALF, head(295.0).integer("codepoint", 0xE0A3));
        t.insert(HEAD_WHOLE, head(422.0).integer("codepoint", 0xE0A2));

        t.insert(CLEF_G, GlyphInfo::new(671.0, 1750.0).real("anchor.y", 1100.0).real("distance", 250.0).integer("codepoint", 0xE050));
        t.insert(CLEF_F, GlyphInfo::new(684.0, 850.0).real("anchor.y", 250.0).real("distance", 250.0).integer("codepoint", 0xE062));
        t.insert(CLEF_C, GlyphInfo::new(699.0, 1000.0).real("anchor.y", 500.0).real("distance", 250.0).integer("codepoint", 0xE05C));

        t.insert(SHARP, GlyphInfo::new(250.0, 700.0).real("anchor.y", 350.0).real("distance", 40.0).integer("codepoint", 0xE262));
        t.insert(FLAT, GlyphInfo::new(225.0, 600.0).real("anchor.y", 440.0).real("distance", 40.0).integer("codepoint", 0xE260));
        t.insert(NATURAL, GlyphInfo::new(168.0, 675.0).real("anchor.y", 338.0).real("distance", 40.0).integer("codepoint", 0xE261));
        t.insert(DOUBLE_SHARP, GlyphInfo::new(250.0, 250.0).real("anchor.y", 125.0).real("distance", 40.0).integer("codepoint", 0xE263));
        t.insert(DOUBLE_FLAT, GlyphInfo::new(410.0, 600.0).real("anchor.y", 440.0).real("distance", 40.0).integer("codepoint", 0xE264));

        for (digit, name) in TIMESIG_DIGITS.iter().enumerate() {
            let width = if digit == 1 { 300.0 } else { 450.0 };
            t.insert(
                name,
                GlyphInfo::new(width, 500.0)
                    .real("anchor.y", 250.0)
                    .integer("codepoint", 0xE080 + digit as i64),
            );
        }
        t.insert(TIMESIG_COMMON, GlyphInfo::new(425.0, 525.0).real("anchor.y", 262.0).integer("codepoint", 0xE08A));
        t.insert(TIMESIG_CUT, GlyphInfo::new(425.0, 700.0).real("anchor.y", 350.0).integer("codepoint", 0xE08B));

        t.insert(DOT, GlyphInfo::new(100.0, 100.0).real("anchor.y", 50.0).integer("codepoint", 0xE1E7));
        t.insert(FLAG_UP, GlyphInfo::new(264.0, 810.0).real("anchor.y", 0.0).real("distance", 188.0).integer("codepoint", 0xE240));
        t.insert(FLAG_DOWN, GlyphInfo::new(290.0, 810.0).real("anchor.y", 810.0).real("distance", 188.0).integer("codepoint", 0xE241));

        t.insert(REST_WHOLE, GlyphInfo::new(282.0, 125.0).real("anchor.y", 0.0).integer("line", 2).integer("codepoint", 0xE4E3));
        t.insert(REST_HALF, GlyphInfo::new(282.0, 125.0).real("anchor.y", 125.0).integer("line", 4).integer("codepoint", 0xE4E4));
        t.insert(REST_QUARTER, GlyphInfo::new(270.0, 700.0).real("anchor.y", 350.0).integer("line", 4).integer("codepoint", 0xE4E5));
        t.insert(
            REST_FLAG,
            GlyphInfo::new(200.0, 200.0)
                .real("anchor.y", 100.0)
                .real("distance", 250.0)
                .real("slope", 0.25)
                .real("stem.x", 190.0)
                .integer("line", 3)
                .integer("codepoint", 0xE4E6),
        );

        t.insert(STACCATO, GlyphInfo::new(75.0, 75.0).real("anchor.y", 38.0).integer("codepoint", 0xE4A2));
        t.insert(ACCENT, GlyphInfo::new(340.0, 175.0).real("anchor.y", 88.0).integer("codepoint", 0xE4A0));
        t.insert(TENUTO, GlyphInfo::new(338.0, 40.0).real("anchor.y", 20.0).integer("codepoint", 0xE4A4));
        t.insert(FERMATA, GlyphInfo::new(600.0, 325.0).real("anchor.y", 325.0).integer("codepoint", 0xE4C0));
        t
    }
}

fn undefined_glyph(head_height: f64) -> GlyphInfo {
    GlyphInfo::new(2.0 * head_height, 2.0 * head_height).real("anchor.y", head_height)
}

/// A resolved glyph with its metrics converted to milli-pixels.
#[derive(Debug, Clone)]
pub struct ScaledGlyph<'a> {
    pub id: GlyphId,
    info: &'a GlyphInfo,
    scale: f64,
}

impl<'a> ScaledGlyph<'a> {
    pub fn width(&self) -> i64 {
        (self.info.width * self.scale).round() as i64
    }

    pub fn height(&self) -> i64 {
        (self.info.height * self.scale).round() as i64
    }

    /// A scaled named length.
    pub fn real(&self, name: &str) -> Option<i64> {
        self.info
            .reals
            .get(name)
            .map(|v| (v * self.scale).round() as i64)
    }

    pub fn real_or(&self, name: &str, default: i64) -> i64 {
        self.real(name).unwrap_or(default)
    }

    /// An unscaled named ratio (such as `slope`).
    pub fn ratio(&self, name: &str) -> Option<f64> {
        self.info.reals.get(name).copied()
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.info.integers.get(name).copied()
    }

    pub fn anchor_y(&self) -> i64 {
        self.real_or("anchor.y", self.height() / 2)
    }
}
