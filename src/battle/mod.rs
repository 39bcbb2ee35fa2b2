//! Synchronous battle resolution
//!
//! A battle is resolved entirely on the orchestrator's thread while every
//! agent thread is held at the battle gate. The executor owns the turn
//! loop; the orchestrator only builds the session and applies the report.

pub mod autopilot;
pub mod executor;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::types::{Position, Reward, SessionId, Step, Vitals};
use crate::entity::player::Player;

pub use autopilot::AutoPilot;
pub use executor::TurnBattle;

/// Anything the player can fight
///
/// Methods take `&self`: roster enemies are shared with their own agent
/// thread, so combat state sits behind interior mutability.
pub trait Combatant: Send + Sync {
    fn name(&self) -> &str;
    fn vitals(&self) -> Vitals;
    fn is_alive(&self) -> bool {
        self.vitals().is_alive()
    }
    /// Apply damage, returning true if still standing
    fn take_damage(&self, amount: u32) -> bool;
    /// Damage dealt by this combatant's strike for the current round
    fn strike(&self) -> u32;
    fn reward(&self) -> Reward;
    fn description(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattleOutcome {
    Victory,
    Defeat,
    Fled,
}

/// Result of one battle, applied to the player in a single step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleReport {
    pub session: SessionId,
    pub outcome: BattleOutcome,
    pub experience: u32,
    pub gold: u32,
    /// Names of every foe that fell, in order
    pub defeated: Vec<String>,
}

/// One combat session: the foes and what has been earned so far
pub struct BattleSession {
    pub id: SessionId,
    pub step: Step,
    pub position: Position,
    /// Fleeing from this fight does not end the journey
    pub final_battle: bool,
    foes: Vec<Arc<dyn Combatant>>,
    experience: u32,
    gold: u32,
    defeated: Vec<String>,
}

impl BattleSession {
    pub fn new(step: Step, position: Position, foes: Vec<Arc<dyn Combatant>>) -> Self {
        Self {
            id: SessionId::new(),
            step,
            position,
            final_battle: false,
            foes,
            experience: 0,
            gold: 0,
            defeated: Vec::new(),
        }
    }

    pub fn final_battle(mut self) -> Self {
        self.final_battle = true;
        self
    }

    /// Foes still standing, in encounter order
    pub fn foes(&self) -> &[Arc<dyn Combatant>] {
        &self.foes
    }

    pub fn is_cleared(&self) -> bool {
        self.foes.is_empty()
    }

    /// Remove every fallen foe and credit its reward.
    /// Returns the names of the foes removed.
    pub fn collect_fallen(&mut self) -> Vec<String> {
        let mut fallen = Vec::new();
        let mut standing = Vec::with_capacity(self.foes.len());
        for foe in self.foes.drain(..) {
            if foe.is_alive() {
                standing.push(foe);
                continue;
            }
            let reward = foe.reward();
            self.experience += reward.experience;
            self.gold += reward.gold;
            fallen.push(foe.name().to_string());
        }
        self.foes = standing;
        self.defeated.extend(fallen.iter().cloned());
        fallen
    }

    /// Close the session. Foes that fell but were never collected are
    /// credited first, so every combatant ends up present or in the report.
    pub fn conclude(&mut self, outcome: BattleOutcome) -> BattleReport {
        self.collect_fallen();
        BattleReport {
            session: self.id,
            outcome,
            experience: self.experience,
            gold: self.gold,
            defeated: self.defeated.clone(),
        }
    }
}

/// Resolves one battle to completion. May block on human input.
pub trait BattleExecutor {
    fn resolve(&mut self, player: &Player, session: &mut BattleSession) -> BattleReport;
}

/// One battle turn choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattleCommand {
    /// Full attack on the first foe
    Slash,
    /// Half attack on every foe
    Fire,
    /// Halve incoming damage this round
    Defend,
    Heal,
    /// Reveal the first foe's stat sheet
    Inspect,
    Flee,
}

impl BattleCommand {
    pub const ALL: [BattleCommand; 6] = [
        BattleCommand::Slash,
        BattleCommand::Fire,
        BattleCommand::Defend,
        BattleCommand::Heal,
        BattleCommand::Inspect,
        BattleCommand::Flee,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BattleCommand::Slash => "Slash",
            BattleCommand::Fire => "Fire",
            BattleCommand::Defend => "Defend",
            BattleCommand::Heal => "Heal",
            BattleCommand::Inspect => "Inspect",
            BattleCommand::Flee => "Flee",
        }
    }
}

/// A foe as presented to a command source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoeView {
    pub name: String,
    pub vitals: Vitals,
}

/// Everything a command source may look at before choosing
#[derive(Debug, Clone)]
pub struct BattleView {
    pub round: u32,
    pub player: Vitals,
    pub foes: Vec<FoeView>,
    pub failed_flees: u32,
    pub final_battle: bool,
}

/// Supplies the player's command for each round
pub trait CommandSource {
    fn next_command(&mut self, view: &BattleView) -> BattleCommand;
}

/// Plays back a fixed list of commands, then repeats the last one
#[derive(Debug, Clone)]
pub struct ScriptedCommands {
    commands: Vec<BattleCommand>,
    next: usize,
}

impl ScriptedCommands {
    pub fn new(commands: impl Into<Vec<BattleCommand>>) -> Self {
        Self {
            commands: commands.into(),
            next: 0,
        }
    }
}

impl CommandSource for ScriptedCommands {
    fn next_command(&mut self, _view: &BattleView) -> BattleCommand {
        let command = self
            .commands
            .get(self.next)
            .or_else(|| self.commands.last())
            .copied()
            .unwrap_or(BattleCommand::Slash);
        self.next += 1;
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Dummy {
        name: String,
        vitals: Mutex<Vitals>,
    }

    impl Dummy {
        fn new(name: &str, health: u32) -> Arc<dyn Combatant> {
            Arc::new(Self {
                name: name.to_string(),
                vitals: Mutex::new(Vitals::new(health, 1, 0)),
            })
        }
    }

    impl Combatant for Dummy {
        fn name(&self) -> &str {
            &self.name
        }
        fn vitals(&self) -> Vitals {
            *self.vitals.lock().unwrap()
        }
        fn take_damage(&self, amount: u32) -> bool {
            self.vitals.lock().unwrap().take_damage(amount)
        }
        fn strike(&self) -> u32 {
            1
        }
        fn reward(&self) -> Reward {
            Reward {
                experience: 2,
                gold: 3,
            }
        }
        fn description(&self) -> &str {
            "a dummy"
        }
    }

    #[test]
    fn test_collect_fallen_credits_rewards() {
        let mut session = BattleSession::new(1, 1, vec![Dummy::new("A", 1), Dummy::new("B", 5)]);
        session.foes()[0].take_damage(1);

        assert_eq!(session.collect_fallen(), vec!["A".to_string()]);
        assert_eq!(session.foes().len(), 1);

        let report = session.conclude(BattleOutcome::Fled);
        assert_eq!(report.experience, 2);
        assert_eq!(report.gold, 3);
        assert_eq!(report.defeated, vec!["A".to_string()]);
    }

    #[test]
    fn test_conclude_collects_uncredited_fallen() {
        let mut session = BattleSession::new(1, 1, vec![Dummy::new("A", 1)]);
        session.foes()[0].take_damage(9);
        let report = session.conclude(BattleOutcome::Victory);
        assert!(session.is_cleared());
        assert_eq!(report.defeated.len(), 1);
    }

    #[test]
    fn test_scripted_commands_repeat_last() {
        let view = BattleView {
            round: 1,
            player: Vitals::new(10, 1, 1),
            foes: Vec::new(),
            failed_flees: 0,
            final_battle: false,
        };
        let mut script = ScriptedCommands::new(vec![BattleCommand::Defend, BattleCommand::Fire]);
        assert_eq!(script.next_command(&view), BattleCommand::Defend);
        assert_eq!(script.next_command(&view), BattleCommand::Fire);
        assert_eq!(script.next_command(&view), BattleCommand::Fire);
    }
}
