//! Creatures spawned fresh for scripted encounters

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::battle::Combatant;
use crate::core::config::CreatureConfig;
use crate::core::error::{Result, SimError};
use crate::core::types::{CreatureKind, Reward, Vitals};

/// Strikes between TickiBird detonations
const TICKIBIRD_FUSE: u32 = 3;

#[derive(Debug)]
struct CreatureState {
    vitals: Vitals,
    strikes: u32,
}

#[derive(Debug)]
pub struct Creature {
    name: String,
    kind: CreatureKind,
    description: String,
    reward: Reward,
    state: Mutex<CreatureState>,
}

impl Creature {
    pub fn new(name: impl Into<String>, stats: &CreatureConfig) -> Self {
        Self {
            name: name.into(),
            kind: stats.kind,
            description: stats.description.clone(),
            reward: stats.reward(),
            state: Mutex::new(CreatureState {
                vitals: stats.vitals(),
                strikes: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, CreatureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Combatant for Creature {
    fn name(&self) -> &str {
        &self.name
    }

    fn vitals(&self) -> Vitals {
        self.state().vitals
    }

    fn take_damage(&self, amount: u32) -> bool {
        self.state().vitals.take_damage(amount)
    }

    fn strike(&self) -> u32 {
        let mut state = self.state();
        state.strikes += 1;
        match self.kind {
            CreatureKind::Slime => state.vitals.attack,
            CreatureKind::TickiBird if state.strikes % TICKIBIRD_FUSE == 0 => state.vitals.attack,
            CreatureKind::TickiBird => 0,
        }
    }

    fn reward(&self) -> Reward {
        self.reward
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Builds creatures from the configured stat blocks
#[derive(Debug, Clone, Default)]
pub struct CreatureFactory {
    stats: BTreeMap<CreatureKind, CreatureConfig>,
}

impl CreatureFactory {
    pub fn new(creatures: &[CreatureConfig]) -> Self {
        Self {
            stats: creatures.iter().map(|c| (c.kind, c.clone())).collect(),
        }
    }

    pub fn spawn(&self, kind: CreatureKind, name: impl Into<String>) -> Result<Creature> {
        let stats = self.stats.get(&kind).ok_or(SimError::UnknownCreature(kind))?;
        Ok(Creature::new(name, stats))
    }

    /// Spawn one encounter's worth of creatures. A lone creature keeps its
    /// plain kind name; a group is numbered by position ("Slime #2").
    pub fn spawn_encounter(&self, kinds: &[CreatureKind]) -> Result<Vec<Creature>> {
        let numbered = kinds.len() > 1;
        kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                let name = if numbered {
                    format!("{} #{}", kind.display_name(), i + 1)
                } else {
                    kind.display_name().to_string()
                };
                self.spawn(*kind, name)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> CreatureFactory {
        CreatureFactory::new(&[CreatureConfig::slime(), CreatureConfig::tickibird()])
    }

    #[test]
    fn test_tickibird_strikes_every_third_turn() {
        let bird = factory().spawn(CreatureKind::TickiBird, "TickiBird").unwrap();
        let strikes: Vec<u32> = (0..6).map(|_| bird.strike()).collect();
        assert_eq!(strikes, vec![0, 0, 15, 0, 0, 15]);
    }

    #[test]
    fn test_slime_strikes_every_turn() {
        let slime = factory().spawn(CreatureKind::Slime, "Slime").unwrap();
        assert_eq!(slime.strike(), 1);
        assert_eq!(slime.strike(), 1);
    }

    #[test]
    fn test_group_names_are_numbered() {
        let group = factory()
            .spawn_encounter(&[CreatureKind::Slime, CreatureKind::Slime, CreatureKind::TickiBird])
            .unwrap();
        let names: Vec<&str> = group.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Slime #1", "Slime #2", "TickiBird #3"]);

        let single = factory().spawn_encounter(&[CreatureKind::Slime]).unwrap();
        assert_eq!(single[0].name(), "Slime");
    }

    #[test]
    fn test_missing_stat_block_is_an_error() {
        let factory = CreatureFactory::new(&[CreatureConfig::slime()]);
        assert!(matches!(
            factory.spawn(CreatureKind::TickiBird, "x"),
            Err(SimError::UnknownCreature(CreatureKind::TickiBird))
        ));
    }
}
