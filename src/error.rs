//! Errors raised to the caller of an engraving pass.
//!
//! Only structural problems end up here. Malformed but recoverable input is
//! logged with `log::warn!` and engraving continues with a fallback.

use thiserror::Error;

use crate::model::EntityId;

#[derive(Debug, Error)]
pub enum EngraveError {
    /// The document contains no score at all.
    #[error("document has no score to engrave")]
    NoScore,

    /// A score without staves cannot be laid out.
    #[error("score {score} has no staff")]
    NoStaff { score: usize },

    #[error("score index {0} is out of range")]
    ScoreOutOfRange(usize),

    #[error("staff index {staff} is out of range for score {score}")]
    StaffOutOfRange { score: usize, staff: usize },

    /// The head height used for a pass must be positive.
    #[error("invalid head height {0}")]
    InvalidHeadHeight(i64),

    /// A glyph table could not be built from its serialized form.
    #[error("invalid glyph table: {0}")]
    Glyphs(#[from] serde_json::Error),

    #[error("plate serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Observers registered for re-engraving whose entity was never reached.
    #[error("{} reengrave registration(s) left unresolved", .0.len())]
    Unresolved(Vec<EntityId>),
}
