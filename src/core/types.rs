//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// World step counter (simulation time unit)
pub type Step = u64;

/// Position along the march. Never negative.
pub type Position = u32;

/// Identifier for a threaded agent (the player or a roster enemy)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl AgentId {
    pub const PLAYER: AgentId = AgentId(0);

    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

/// Unique identifier for a battle session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Kinds of roster enemies that walk the march on their own thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnemyKind {
    Thief,
    Wizard,
}

/// Kinds of creatures spawned for scripted encounters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatureKind {
    Slime,
    TickiBird,
}

impl CreatureKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            CreatureKind::Slime => "Slime",
            CreatureKind::TickiBird => "TickiBird",
        }
    }
}

/// Combat numbers shared by every combatant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vitals {
    pub health: u32,
    pub max_health: u32,
    pub attack: u32,
    pub stealth: u32,
}

impl Vitals {
    pub fn new(max_health: u32, attack: u32, stealth: u32) -> Self {
        Self {
            health: max_health,
            max_health,
            attack,
            stealth,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Apply damage, returning true if still standing
    pub fn take_damage(&mut self, amount: u32) -> bool {
        self.health = self.health.saturating_sub(amount);
        self.is_alive()
    }

    /// Heal up to max health, returning the amount actually restored
    pub fn heal(&mut self, amount: u32) -> u32 {
        let before = self.health;
        self.health = self.health.saturating_add(amount).min(self.max_health);
        self.health - before
    }
}

/// Experience and gold granted for defeating a combatant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub experience: u32,
    pub gold: u32,
}
