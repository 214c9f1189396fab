//! Per-analyzer completion tracking: one tri-state slot per entity, with
//! free-list pooling of the mutable state records.

use std::collections::{HashMap, HashSet};

use crate::registry::actions::{ActionId, AnalyzerActions};
use crate::state::Entity;

/// Pooled records kept per analyzer; beyond this they are dropped.
const POOL_CAP: usize = 128;

/// Mutable progress of one in-process (or resumable) entity: the subset of
/// actions already executed, and any nested actions collected by the start
/// phase so far. Survives an abort so a reclaim resumes from the remainder.
#[derive(Default)]
pub struct StateData {
    pub processed: HashSet<ActionId>,
    pub nested: AnalyzerActions,
}

impl StateData {
    pub fn is_processed(&self, id: ActionId) -> bool {
        self.processed.contains(&id)
    }

    pub fn mark_processed(&mut self, id: ActionId) {
        self.processed.insert(id);
    }

    pub fn has_progress(&self) -> bool {
        !self.processed.is_empty() || !self.nested.is_empty()
    }

    fn reset(&mut self) {
        self.processed.clear();
        self.nested = AnalyzerActions::default();
    }
}

enum Slot {
    /// Claimed; the claimant owns the state record until complete or abort.
    InProcess,
    /// Released mid-set; the record keeps partial progress for resumption.
    Ready(Box<StateData>),
    /// Terminal. Never reclaimed, carries no payload.
    Done,
}

pub enum ClaimOutcome {
    Claimed(Box<StateData>),
    AlreadyDone,
    OwnedElsewhere,
}

#[derive(Default)]
pub struct PerAnalyzerState {
    entities: HashMap<Entity, Slot>,
    pool: Vec<Box<StateData>>,
}

impl PerAnalyzerState {
    /// Ready/absent → InProcess, handing the caller the pooled record.
    /// Fails against a live claim or a fully processed entity; callers
    /// distinguish the two through the returned variant.
    pub fn try_claim(&mut self, entity: Entity) -> ClaimOutcome {
        match self.entities.get_mut(&entity) {
            None => {
                let data = self.acquire();
                self.entities.insert(entity, Slot::InProcess);
                ClaimOutcome::Claimed(data)
            }
            Some(slot @ Slot::Ready(_)) => {
                let Slot::Ready(data) = std::mem::replace(slot, Slot::InProcess) else {
                    unreachable!()
                };
                ClaimOutcome::Claimed(data)
            }
            Some(Slot::InProcess) => ClaimOutcome::OwnedElsewhere,
            Some(Slot::Done) => ClaimOutcome::AlreadyDone,
        }
    }

    /// InProcess → FullyProcessed; the record returns to the pool.
    pub fn complete(&mut self, entity: Entity, data: Box<StateData>) {
        self.entities.insert(entity, Slot::Done);
        self.release(data);
    }

    /// InProcess → Ready. A record with partial progress stays attached so a
    /// later claim resumes from the unexecuted remainder; one without goes
    /// back to the pool.
    pub fn abort(&mut self, entity: Entity, data: Box<StateData>) {
        if data.has_progress() {
            self.entities.insert(entity, Slot::Ready(data));
        } else {
            self.entities.remove(&entity);
            self.release(data);
        }
    }

    /// Marks an entity fully processed without a claim cycle, used when no
    /// registered action responds to it. Idempotent; a live claim wins.
    pub fn mark_complete(&mut self, entity: Entity) {
        match self.entities.get(&entity) {
            Some(Slot::InProcess) => {}
            Some(Slot::Done) => {}
            Some(Slot::Ready(_)) => {
                let Some(Slot::Ready(data)) = self.entities.insert(entity, Slot::Done) else {
                    unreachable!()
                };
                self.release(data);
            }
            None => {
                self.entities.insert(entity, Slot::Done);
            }
        }
    }

    pub fn is_complete(&self, entity: Entity) -> bool {
        matches!(self.entities.get(&entity), Some(Slot::Done))
    }

    /// Whether any tracked entity is not yet fully processed.
    pub fn has_pending(&self) -> bool {
        self.entities
            .values()
            .any(|slot| !matches!(slot, Slot::Done))
    }

    fn acquire(&mut self) -> Box<StateData> {
        self.pool.pop().unwrap_or_default()
    }

    fn release(&mut self, mut data: Box<StateData>) {
        if self.pool.len() < POOL_CAP {
            data.reset();
            self.pool.push(data);
        }
    }

    #[cfg(test)]
    pub(crate) fn pooled(&self) -> usize {
        self.pool.len()
    }
}
