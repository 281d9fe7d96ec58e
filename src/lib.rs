//! scoreplate: music engraving core.
//!
//! Turns an editable score model into a plate: positioned glyphs, stems,
//! beams, ties, slurs and barlines grouped into pages and lines, with
//! bounding boxes for hit-testing. The plate can be printed through the
//! reference [`press`] or handed across a JSON boundary.
//!
//! # Example
//! ```
//! use scoreplate::duration::DurationEncoding;
//! use scoreplate::{engrave_document, Chord, Document, EngraveParams, GlyphTable, Score, ScoreObject, Staff, Voice};
//!
//! let voice = Voice::new(vec![
//!     ScoreObject::Chord(Chord::tones(DurationEncoding::new(5, 0), &[60, 64, 67])),
//! ]);
//! let doc = Document::new(vec![Score::new(vec![Staff::new(voice)])]);
//! let plate = engrave_document(&doc, &GlyphTable::builtin(), &EngraveParams::default()).unwrap();
//! assert_eq!(plate.page_count(), 1);
//! ```

pub mod context;
pub mod duration;
pub mod engraver;
pub mod error;
pub mod glyphs;
pub mod model;
pub mod params;
pub mod pick;
pub mod plate;
pub mod press;
pub mod reengrave;

pub use engraver::{Engraver, Reengraved};
pub use error::EngraveError;
pub use glyphs::{GlyphId, GlyphTable};
pub use model::*;
pub use params::{EngraveParams, JustifyParams};
pub use plate::{NoteId, Plate, PlateNote, Position, Rect};
pub use reengrave::{ReengraveState, ReengraveStatus, ReengraveTracker, Reengraveable};

/// Engrave a whole document with the given glyph metrics and parameters.
pub fn engrave_document(doc: &Document, glyphs: &GlyphTable, params: &EngraveParams) -> Result<Plate, EngraveError> {
    Engraver::new(glyphs, params).engrave(doc)
}

/// Convert an engraved plate to a JSON string.
/// Useful for passing data across FFI boundaries.
pub fn plate_to_json(plate: &Plate) -> Result<String, EngraveError> {
    serde_json::to_string_pretty(plate).map_err(EngraveError::Serialize)
}

/// Engrave a document and print every page to SVG.
pub fn render_document_to_svg(
    doc: &Document,
    glyphs: &GlyphTable,
    params: &EngraveParams,
) -> Result<Vec<String>, EngraveError> {
    let plate = engrave_document(doc, glyphs, params)?;
    let mut svg = press::SvgRenderer::new();
    press::Press::new(glyphs, &doc.page).print(&plate, &mut svg);
    Ok(svg.into_pages())
}
