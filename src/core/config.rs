//! Simulation configuration with documented constants
//!
//! All magic numbers are collected here with explanations of their purpose
//! and how they interact with each other. Every section can be overridden
//! from a TOML file; missing keys fall back to the defaults below.

use std::fs;
use std::path::Path;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};
use crate::core::types::{CreatureKind, EnemyKind, Position, Reward, Step, Vitals};

/// Top-level configuration for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub world: WorldConfig,
    pub timing: TimingConfig,
    pub player: PlayerConfig,
    /// Roster enemies, in encounter-priority order
    pub enemies: Vec<EnemyConfig>,
    /// Stat blocks for creatures spawned by scripted encounters
    pub creatures: Vec<CreatureConfig>,
    /// Scripted one-shot encounters keyed by step
    pub encounters: Vec<EncounterConfig>,
}

/// World-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Position at which the final boss encounter is forced
    pub max_steps: Position,

    /// Base seed for every agent RNG (each agent offsets it by its index)
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            seed: 12345,
        }
    }
}

/// Inclusive range of milliseconds used for randomized pacing delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn none() -> Self {
        Self::new(0, 0)
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }
}

/// Timing of the step protocol
///
/// The player-move wait is a soft ceiling: when it expires the step carries
/// on without the player. A slow player thread may then move late and be
/// counted on the next step. This slack is tolerated, never escalated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Interval between polls of the player-moved flag
    pub player_poll_interval_ms: u64,

    /// Number of polls before the orchestrator gives up on the player
    ///
    /// At 50 polls of 10ms the ceiling is 500ms.
    pub player_poll_limit: u32,

    /// Time given to enemies to apply their movement after the enemy phase
    /// signal, before encounters are checked again
    ///
    /// Shorter than a slow enemy's whole turn at the default pacing. Moves
    /// still under way when the settle ends land during the next player
    /// phase and are caught by that step's encounter checks.
    pub enemy_settle_ms: u64,

    /// Interval at which agents re-check the battle gate while combat runs
    pub battle_poll_ms: u64,

    /// How long shutdown waits for each thread before detaching it
    pub join_timeout_ms: u64,

    /// Pause after a battle so the outcome can be read
    pub post_battle_pause_ms: u64,

    /// Simulated action time of the player after each move
    pub player_action_delay: DelayRange,

    /// Pause after every unit step of an enemy, for observable pacing
    pub enemy_step_delay: DelayRange,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            player_poll_interval_ms: 10,
            player_poll_limit: 50,
            enemy_settle_ms: 200,
            battle_poll_ms: 100,
            join_timeout_ms: 2000,
            post_battle_pause_ms: 1000,
            player_action_delay: DelayRange::new(200, 700),
            enemy_step_delay: DelayRange::new(100, 400),
        }
    }
}

impl TimingConfig {
    /// Short timings for headless runs and tests
    pub fn brisk() -> Self {
        Self {
            player_poll_interval_ms: 2,
            player_poll_limit: 250,
            enemy_settle_ms: 40,
            battle_poll_ms: 5,
            join_timeout_ms: 2000,
            post_battle_pause_ms: 0,
            player_action_delay: DelayRange::none(),
            enemy_step_delay: DelayRange::none(),
        }
    }

    pub fn player_poll_interval(&self) -> Duration {
        Duration::from_millis(self.player_poll_interval_ms)
    }

    pub fn player_wait_ceiling(&self) -> Duration {
        self.player_poll_interval() * self.player_poll_limit
    }

    pub fn enemy_settle(&self) -> Duration {
        Duration::from_millis(self.enemy_settle_ms)
    }

    pub fn battle_poll(&self) -> Duration {
        Duration::from_millis(self.battle_poll_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn post_battle_pause(&self) -> Duration {
        Duration::from_millis(self.post_battle_pause_ms)
    }
}

/// The human-controlled agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub name: String,
    pub start: Position,
    pub max_health: u32,
    pub attack: u32,
    pub stealth: u32,

    /// Experience needed for the first level-up
    pub first_level_threshold: u32,

    /// Added to the threshold after every level-up
    pub level_threshold_growth: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            name: "Knight".to_string(),
            start: 0,
            max_health: 15,
            attack: 3,
            stealth: 5,
            first_level_threshold: 3,
            level_threshold_growth: 5,
        }
    }
}

impl PlayerConfig {
    pub fn vitals(&self) -> Vitals {
        Vitals::new(self.max_health, self.attack, self.stealth)
    }
}

/// A roster enemy: runs on its own thread and walks toward or away from
/// the player every enemy phase
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyConfig {
    pub name: String,
    pub kind: EnemyKind,
    pub start: Position,

    /// Unit steps taken backward when the player is behind, rolled in
    /// `retreat_min..=retreat_max`
    pub retreat_min: u32,
    pub retreat_max: u32,

    /// Unit steps taken forward when the player is ahead
    pub chase_steps: u32,

    /// Enemy phases spent frozen after the player flees from it
    pub freeze_turns: u32,

    /// Defeating the boss ends the run in victory
    pub boss: bool,

    pub max_health: u32,
    pub attack: u32,
    pub stealth: u32,
    pub experience: u32,
    pub gold: u32,
    pub description: String,
}

impl Default for EnemyConfig {
    fn default() -> Self {
        Self::thief()
    }
}

impl EnemyConfig {
    pub fn thief() -> Self {
        Self {
            name: "Thief".to_string(),
            kind: EnemyKind::Thief,
            start: 25,
            retreat_min: 1,
            retreat_max: 1,
            chase_steps: 2,
            freeze_turns: 3,
            boss: false,
            max_health: 60,
            attack: 7,
            stealth: 20,
            experience: 15,
            gold: 25,
            description: "A tough thief with a decent attack. Slipping away from it takes patience."
                .to_string(),
        }
    }

    pub fn wizard() -> Self {
        Self {
            name: "Wizard".to_string(),
            kind: EnemyKind::Wizard,
            start: 15,
            retreat_min: 1,
            retreat_max: 1,
            chase_steps: 3,
            freeze_turns: 4,
            boss: true,
            max_health: 100,
            attack: 15,
            stealth: 0,
            experience: 100,
            gold: 100,
            description: "The wizard of the lowest realms. Defeat it to end the journey.".to_string(),
        }
    }

    pub fn vitals(&self) -> Vitals {
        Vitals::new(self.max_health, self.attack, self.stealth)
    }

    pub fn reward(&self) -> Reward {
        Reward {
            experience: self.experience,
            gold: self.gold,
        }
    }
}

/// Stat block for a creature kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatureConfig {
    pub kind: CreatureKind,
    pub max_health: u32,
    pub attack: u32,
    pub stealth: u32,
    pub experience: u32,
    pub gold: u32,
    #[serde(default)]
    pub description: String,
}

impl CreatureConfig {
    pub fn slime() -> Self {
        Self {
            kind: CreatureKind::Slime,
            max_health: 5,
            attack: 1,
            stealth: 0,
            experience: 2,
            gold: 3,
            description: "Weak but persistent. Would be a lovely fellow if it weren't acidic."
                .to_string(),
        }
    }

    pub fn tickibird() -> Self {
        Self {
            kind: CreatureKind::TickiBird,
            max_health: 10,
            attack: 15,
            stealth: 10,
            experience: 7,
            gold: 10,
            description: "A strange bird with an explosive personality. Three turns and you're out."
                .to_string(),
        }
    }

    pub fn vitals(&self) -> Vitals {
        Vitals::new(self.max_health, self.attack, self.stealth)
    }

    pub fn reward(&self) -> Reward {
        Reward {
            experience: self.experience,
            gold: self.gold,
        }
    }
}

/// A scripted encounter that becomes active when the world reaches `step`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterConfig {
    pub step: Step,
    pub creatures: Vec<CreatureKind>,
}

impl EncounterConfig {
    pub fn new(step: Step, creatures: &[CreatureKind]) -> Self {
        Self {
            step,
            creatures: creatures.to_vec(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        use CreatureKind::{Slime, TickiBird};

        Self {
            world: WorldConfig::default(),
            timing: TimingConfig::default(),
            player: PlayerConfig::default(),
            enemies: vec![EnemyConfig::thief(), EnemyConfig::wizard()],
            creatures: vec![CreatureConfig::slime(), CreatureConfig::tickibird()],
            encounters: vec![
                EncounterConfig::new(2, &[Slime]),
                EncounterConfig::new(4, &[Slime]),
                EncounterConfig::new(5, &[TickiBird]),
                EncounterConfig::new(7, &[Slime, Slime, Slime]),
                EncounterConfig::new(10, &[Slime, TickiBird]),
                EncounterConfig::new(12, &[Slime, Slime, TickiBird]),
                EncounterConfig::new(15, &[TickiBird, TickiBird, TickiBird]),
                EncounterConfig::new(18, &[Slime, TickiBird]),
            ],
        }
    }
}

impl SimulationConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn creature(&self, kind: CreatureKind) -> Option<&CreatureConfig> {
        self.creatures.iter().find(|c| c.kind == kind)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.world.max_steps == 0 {
            return Err(SimError::InvalidConfig("world.max_steps must be positive".into()));
        }

        if self.timing.player_poll_limit == 0 {
            return Err(SimError::InvalidConfig(
                "timing.player_poll_limit must be positive".into(),
            ));
        }

        if self.timing.battle_poll_ms == 0 {
            // Zero would turn the battle poll into a busy spin
            return Err(SimError::InvalidConfig("timing.battle_poll_ms must be positive".into()));
        }

        if self.player.max_health == 0 {
            return Err(SimError::InvalidConfig("player.max_health must be positive".into()));
        }

        for enemy in &self.enemies {
            if enemy.retreat_min > enemy.retreat_max {
                return Err(SimError::InvalidConfig(format!(
                    "enemy {}: retreat_min ({}) exceeds retreat_max ({})",
                    enemy.name, enemy.retreat_min, enemy.retreat_max
                )));
            }
            if enemy.max_health == 0 {
                return Err(SimError::InvalidConfig(format!(
                    "enemy {}: max_health must be positive",
                    enemy.name
                )));
            }
        }

        let bosses = self.enemies.iter().filter(|e| e.boss).count();
        if bosses > 1 {
            return Err(SimError::InvalidConfig(format!(
                "at most one boss may be configured, found {}",
                bosses
            )));
        }

        for encounter in &self.encounters {
            if encounter.creatures.is_empty() {
                return Err(SimError::InvalidConfig(format!(
                    "encounter at step {} has no creatures",
                    encounter.step
                )));
            }
            for kind in &encounter.creatures {
                if self.creature(*kind).is_none() {
                    return Err(SimError::UnknownCreature(*kind));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_player_wait_ceiling_is_half_a_second() {
        let timing = TimingConfig::default();
        assert_eq!(timing.player_wait_ceiling(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SimulationConfig::from_toml_str(
            r#"
            [world]
            max_steps = 12

            [timing]
            enemy_settle_ms = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.world.max_steps, 12);
        assert_eq!(config.world.seed, 12345);
        assert_eq!(config.timing.enemy_settle_ms, 50);
        assert_eq!(config.timing.player_poll_limit, 50);
        assert_eq!(config.enemies.len(), 2);
        assert_eq!(config.encounters.len(), 8);
    }

    #[test]
    fn test_toml_roster_override() {
        let config = SimulationConfig::from_toml_str(
            r#"
            encounters = []

            [[enemies]]
            name = "Cutpurse"
            kind = "thief"
            start = 9
            chase_steps = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.enemies.len(), 1);
        let enemy = &config.enemies[0];
        assert_eq!(enemy.name, "Cutpurse");
        assert_eq!(enemy.start, 9);
        assert_eq!(enemy.chase_steps, 4);
        // Unspecified fields come from the thief defaults
        assert_eq!(enemy.freeze_turns, 3);
        assert!(config.encounters.is_empty());
    }

    #[test]
    fn test_inverted_retreat_range_rejected() {
        let mut config = SimulationConfig::default();
        config.enemies[0].retreat_min = 3;
        config.enemies[0].retreat_max = 1;
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_two_bosses_rejected() {
        let mut config = SimulationConfig::default();
        config.enemies[0].boss = true;
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_encounter_with_missing_stat_block_rejected() {
        let mut config = SimulationConfig::default();
        config.creatures.retain(|c| c.kind != CreatureKind::TickiBird);
        assert!(matches!(
            config.validate(),
            Err(SimError::UnknownCreature(CreatureKind::TickiBird))
        ));
    }

    #[test]
    fn test_unknown_kind_fails_to_parse() {
        let result = SimulationConfig::from_toml_str(
            r#"
            [[encounters]]
            step = 3
            creatures = ["dragon"]
            "#,
        );
        assert!(matches!(result, Err(SimError::ConfigParse(_))));
    }

    #[test]
    fn test_delay_range_sampling_stays_in_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let range = DelayRange::new(100, 400);
        for _ in 0..100 {
            let d = range.sample(&mut rng);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(400));
        }
        assert_eq!(DelayRange::none().sample(&mut rng), Duration::ZERO);
    }
}
