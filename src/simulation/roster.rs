//! Ordered set of live roster enemies
//!
//! Lives inside the gate's mutex; only the orchestrator mutates it.

use std::sync::Arc;

use crate::core::config::EnemyConfig;
use crate::core::types::{AgentId, Position};
use crate::entity::enemy::{Enemy, EnemySnapshot};

#[derive(Debug, Default)]
pub struct Roster {
    enemies: Vec<Arc<Enemy>>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from config in order; enemy ids start after the player's
    pub fn from_configs(configs: &[EnemyConfig]) -> Self {
        let enemies = configs
            .iter()
            .enumerate()
            .map(|(i, config)| Arc::new(Enemy::from_config(AgentId::new(i as u32 + 1), config)))
            .collect();
        Self { enemies }
    }

    /// First live enemy standing at `position`, in roster order
    pub fn first_at(&self, position: Position) -> Option<Arc<Enemy>> {
        self.enemies
            .iter()
            .find(|e| e.body().is_alive() && e.position() == position)
            .cloned()
    }

    pub fn get(&self, id: AgentId) -> Option<Arc<Enemy>> {
        self.enemies.iter().find(|e| e.id() == id).cloned()
    }

    pub fn remove(&mut self, id: AgentId) -> Option<Arc<Enemy>> {
        let index = self.enemies.iter().position(|e| e.id() == id)?;
        Some(self.enemies.remove(index))
    }

    pub fn boss(&self) -> Option<Arc<Enemy>> {
        self.enemies.iter().find(|e| e.is_boss()).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Enemy>> {
        self.enemies.iter()
    }

    pub fn len(&self) -> usize {
        self.enemies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enemies.is_empty()
    }

    pub fn snapshot(&self) -> Vec<EnemySnapshot> {
        self.enemies.iter().map(|e| e.snapshot()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Roster {
        let mut second_thief = EnemyConfig::thief();
        second_thief.name = "Cutpurse".to_string();
        Roster::from_configs(&[EnemyConfig::thief(), second_thief, EnemyConfig::wizard()])
    }

    #[test]
    fn test_first_at_uses_roster_order() {
        let roster = roster();
        let hit = roster.first_at(25).unwrap();
        assert_eq!(hit.id(), AgentId(1));
    }

    #[test]
    fn test_first_at_skips_dead() {
        let roster = roster();
        roster.get(AgentId(1)).unwrap().body().mark_dead();
        assert_eq!(roster.first_at(25).unwrap().id(), AgentId(2));
    }

    #[test]
    fn test_remove_and_boss() {
        let mut roster = roster();
        assert_eq!(roster.boss().unwrap().id(), AgentId(3));
        assert!(roster.remove(AgentId(3)).is_some());
        assert!(roster.boss().is_none());
        assert!(roster.remove(AgentId(3)).is_none());
        assert_eq!(roster.len(), 2);
    }
}
