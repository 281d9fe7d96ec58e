//! Bookkeeping records that live for one pass.
//!
//! Each record correlates a graphical feature that is still open with the
//! note that will close it: a beam group with its remaining members, a tie
//! with the next chord of its voice, a slur or hairpin with its target.

use crate::model::{Durable, EntityId, LineLayout, TieSpec};
use crate::plate::{NoteId, PlateLine, Position};

/// One placed member of a beam group.
#[derive(Debug, Clone, Copy)]
pub(super) struct BeamMember {
    pub note: NoteId,
    pub flags: u8,
    /// Beams above this level stop before the next member
    pub cut: Option<u8>,
    pub stem_x: i64,
    /// Center y of the head nearest to the beam
    pub near_y: i64,
}

/// Beam group of one voice cursor, opened at its first chord.
#[derive(Debug, Clone)]
pub(super) struct BeamInfo {
    /// Chords of the group, in voice order
    pub members: Vec<EntityId>,
    pub placed: Vec<BeamMember>,
    pub up: bool,
    pub head_height: i64,
}

impl BeamInfo {
    pub fn expects(&self, object: EntityId) -> bool {
        self.members.get(self.placed.len()) == Some(&object)
    }

    pub fn is_complete(&self) -> bool {
        self.placed.len() == self.members.len()
    }
}

/// An outgoing tie waiting for the next chord of its voice.
#[derive(Debug, Clone)]
pub(super) struct TieInfo {
    pub voice: EntityId,
    pub tone: i32,
    /// Note holding the start of the tie
    pub note: NoteId,
    pub start: Position,
    pub up: bool,
    pub spec: TieSpec,
    pub head_height: i64,
    /// Set once the tie was cut at a line end: length of the half-tie drawn
    /// there, to be mirrored on the next line
    pub carried: Option<i64>,
}

/// A slur or hairpin whose target has not been engraved yet.
#[derive(Debug, Clone)]
pub(super) struct OpenDurable {
    pub attachable: EntityId,
    /// Note holding the current piece
    pub owner: NoteId,
    pub start: Position,
    pub staff: usize,
    pub durable: Durable,
    pub head_height: i64,
    /// Started on an earlier line
    pub continued: bool,
}

/// The line under construction.
#[derive(Debug, Clone)]
pub(super) struct LineInfo {
    pub plate: PlateLine,
    pub page: usize,
    pub layout: LineLayout,
    /// First x available to score objects (after generated prefixes)
    pub content_start: i64,
}
