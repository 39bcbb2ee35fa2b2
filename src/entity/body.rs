//! Shared physical state of a threaded agent
//!
//! Position and the alive flag are written by the agent's own thread and
//! read by the orchestrator without taking the gate lock. Both fit in a
//! single atomic word, so a reader always sees some whole value from the
//! current or the previous step.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::core::types::{AgentId, Position};

#[derive(Debug)]
pub struct AgentBody {
    id: AgentId,
    name: String,
    position: AtomicU32,
    alive: AtomicBool,
}

impl AgentBody {
    pub fn new(id: AgentId, name: impl Into<String>, start: Position) -> Self {
        Self {
            id,
            name: name.into(),
            position: AtomicU32::new(start),
            alive: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Position {
        self.position.load(Ordering::Acquire)
    }

    pub fn set_position(&self, position: Position) {
        self.position.store(position, Ordering::Release);
    }

    /// Move by a signed number of unit steps, stopping at zero.
    /// Returns the new position.
    pub fn step_by(&self, delta: i32) -> Position {
        let current = self.position();
        let next = if delta >= 0 {
            current.saturating_add(delta.unsigned_abs())
        } else {
            current.saturating_sub(delta.unsigned_abs())
        };
        self.set_position(next);
        next
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::Release);
    }
}
