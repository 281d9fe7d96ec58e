//! Dependency tracker for re-engraving.
//!
//! External observers (edit cursors, selections) register for the logical
//! entity they point at before a pass. The engraver notifies them each
//! time that entity is placed, so they can re-attach to the rebuilt plate.
//! Registrations never reached by a pass are reported back to the caller.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::model::EntityId;
use crate::plate::{NoteId, Position, Rect};

/// Where an entity ended up in the new plate.
#[derive(Debug, Clone, PartialEq)]
pub struct ReengraveState {
    pub entity: EntityId,
    /// Index of the score in the document
    pub score: usize,
    pub note: NoteId,
    /// Document page number
    pub page: usize,
    /// Line index on that page
    pub line: usize,
    pub position: Position,
    pub bounding_box: Rect,
}

/// Answer of an observer to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReengraveStatus {
    /// Updated; drop the registration
    Done,
    /// Not satisfied yet; notify again at the next occurrence
    Retry,
    /// Call [`Reengraveable::finish`] once the pass is complete
    Finish,
}

pub trait Reengraveable {
    fn on_reengrave(&mut self, state: &ReengraveState) -> ReengraveStatus;

    /// Called after the pass for observers that asked for it.
    fn finish(&mut self) {}
}

pub type Observer = Rc<RefCell<dyn Reengraveable>>;

struct Registration {
    observer: Observer,
    notified: bool,
}

#[derive(Default)]
pub struct ReengraveTracker {
    registrations: HashMap<EntityId, Vec<Registration>>,
    deferred: Vec<Observer>,
}

impl ReengraveTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entity: EntityId, observer: Observer) {
        self.registrations.entry(entity).or_default().push(Registration {
            observer,
            notified: false,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty() && self.deferred.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.registrations.values().map(Vec::len).sum()
    }

    pub fn is_registered(&self, entity: EntityId) -> bool {
        self.registrations.contains_key(&entity)
    }

    /// Hand the new plate location of an entity to its observers.
    pub fn notify(&mut self, state: &ReengraveState) {
        let Some(mut list) = self.registrations.remove(&state.entity) else {
            return;
        };
        list.retain_mut(|reg| {
            reg.notified = true;
            match reg.observer.borrow_mut().on_reengrave(state) {
                ReengraveStatus::Done => false,
                ReengraveStatus::Retry => true,
                ReengraveStatus::Finish => {
                    self.deferred.push(Rc::clone(&reg.observer));
                    false
                }
            }
        });
        if !list.is_empty() {
            self.registrations.insert(state.entity, list);
        }
    }

    /// Run deferred observers and collect registrations whose entity the
    /// pass never reached. Observers that were reached but kept asking for
    /// a retry are finished like deferred ones.
    pub fn finish(&mut self) -> Vec<EntityId> {
        let mut unresolved = Vec::new();
        for (entity, list) in self.registrations.drain() {
            for reg in list {
                if reg.notified {
                    self.deferred.push(reg.observer);
                } else {
                    unresolved.push(entity);
                }
            }
        }
        for observer in self.deferred.drain(..) {
            observer.borrow_mut().finish();
        }
        unresolved.sort();
        unresolved.dedup();
        if !unresolved.is_empty() {
            log::error!(
                "{} reengrave registration(s) were never reached: {:?}",
                unresolved.len(),
                unresolved
            );
        }
        unresolved
    }
}
