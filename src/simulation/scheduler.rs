//! Scripted one-shot encounters keyed by step
//!
//! An encounter becomes active once the world reaches its step and waits at
//! that position on the march until the player walks into it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::config::EncounterConfig;
use crate::core::types::{CreatureKind, Position, Step};
use crate::sync::SyncGate;

#[derive(Debug, Default)]
struct Encounters {
    pending: BTreeMap<Step, Vec<CreatureKind>>,
    active: BTreeMap<Step, Vec<CreatureKind>>,
}

#[derive(Debug, Default)]
pub struct StepEventScheduler {
    encounters: Mutex<Encounters>,
}

impl StepEventScheduler {
    pub fn new(configs: &[EncounterConfig]) -> Self {
        let mut pending: BTreeMap<Step, Vec<CreatureKind>> = BTreeMap::new();
        for config in configs {
            pending
                .entry(config.step)
                .or_default()
                .extend(config.creatures.iter().copied());
        }
        Self {
            encounters: Mutex::new(Encounters {
                pending,
                active: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Encounters> {
        self.encounters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Activate every pending encounter at or before `step`.
    /// Idempotent; returns how many were newly activated.
    pub fn activate_through(&self, step: Step) -> usize {
        let mut encounters = self.lock();
        let later = encounters.pending.split_off(&(step + 1));
        let due = std::mem::replace(&mut encounters.pending, later);
        let count = due.len();
        for (at, kinds) in due {
            tracing::info!("Something stirs at step {}: {}", at, describe(&kinds));
            encounters.active.insert(at, kinds);
        }
        count
    }

    /// Consume the active encounter waiting at `position`
    pub fn take_active_at(&self, position: Position) -> Option<Vec<CreatureKind>> {
        self.lock().active.remove(&Step::from(position))
    }

    #[cfg(test)]
    fn active_steps(&self) -> Vec<Step> {
        self.lock().active.keys().copied().collect()
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Watcher loop: activate encounters as the step counter advances
    pub fn watch(self: Arc<Self>, gate: Arc<SyncGate>) {
        let mut last_step = 0;
        while let Some(step) = gate.await_step(last_step) {
            last_step = step;
            self.activate_through(step);
        }
        tracing::debug!("encounter watcher stopped");
    }
}

fn describe(kinds: &[CreatureKind]) -> String {
    kinds
        .iter()
        .map(|k| k.display_name())
        .collect::<Vec<_>>()
        .join(", ")
}
