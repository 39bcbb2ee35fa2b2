//! The player agent and its thread loop

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::battle::BattleReport;
use crate::core::config::{DelayRange, PlayerConfig};
use crate::core::types::{AgentId, Position, Step, Vitals};
use crate::entity::body::AgentBody;
use crate::entity::progression::{BattleRecord, PlayerSheet};
use crate::sync::SyncGate;

#[derive(Debug)]
pub struct Player {
    body: AgentBody,
    sheet: Mutex<PlayerSheet>,
}

/// Point-in-time view of the player
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub name: String,
    pub position: Position,
    pub alive: bool,
    pub level: u32,
    pub experience: u32,
    pub next_level: u32,
    pub gold: u32,
    pub vitals: Vitals,
    pub record: BattleRecord,
}

impl Player {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            body: AgentBody::new(AgentId::PLAYER, config.name.clone(), config.start),
            sheet: Mutex::new(PlayerSheet::new(config)),
        }
    }

    pub fn body(&self) -> &AgentBody {
        &self.body
    }

    pub fn name(&self) -> &str {
        self.body.name()
    }

    pub fn position(&self) -> Position {
        self.body.position()
    }

    pub fn is_alive(&self) -> bool {
        self.body.is_alive()
    }

    pub fn sheet(&self) -> MutexGuard<'_, PlayerSheet> {
        self.sheet.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn vitals(&self) -> Vitals {
        self.sheet().vitals
    }

    /// Apply damage, returning true if still standing
    pub fn take_damage(&self, amount: u32) -> bool {
        let standing = self.sheet().vitals.take_damage(amount);
        if !standing {
            self.body.mark_dead();
        }
        standing
    }

    pub fn heal_fraction(&self, fraction: f32) -> u32 {
        self.sheet().heal_fraction(fraction)
    }

    pub fn credit(&self, report: &BattleReport) {
        self.sheet().credit(report);
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let sheet = self.sheet();
        PlayerSnapshot {
            name: self.name().to_string(),
            position: self.position(),
            alive: self.is_alive(),
            level: sheet.level,
            experience: sheet.experience,
            next_level: sheet.next_level,
            gold: sheet.gold,
            vitals: sheet.vitals,
            record: sheet.record.clone(),
        }
    }
}

/// Drives the player on its own thread: one unit step per world step
pub struct PlayerRunner {
    player: Arc<Player>,
    gate: Arc<SyncGate>,
    rng: ChaCha8Rng,
    action_delay: DelayRange,
}

impl PlayerRunner {
    pub fn new(
        player: Arc<Player>,
        gate: Arc<SyncGate>,
        rng: ChaCha8Rng,
        action_delay: DelayRange,
    ) -> Self {
        Self {
            player,
            gate,
            rng,
            action_delay,
        }
    }

    pub fn run(mut self) {
        let mut last_step: Step = 0;

        while let Some(step) = self.gate.await_step(last_step) {
            last_step = step;
            if !self.player.is_alive() {
                break;
            }
            if !self.gate.player_should_move() {
                continue;
            }
            match self.step_forward() {
                Some(position) => {
                    tracing::debug!(step, position, "{} moves forward", self.player.name());
                    thread::sleep(self.action_delay.sample(&mut self.rng));
                }
                None => break,
            }
        }

        if self.player.is_alive() {
            tracing::debug!("{} stops marching", self.player.name());
        } else {
            tracing::debug!("{} has fallen and marches no more", self.player.name());
        }
    }

    /// Move one step, waiting out any battle. None once the gate stops.
    fn step_forward(&self) -> Option<Position> {
        loop {
            if !self.gate.hold_while_battle() {
                return None;
            }
            if let Some(position) = self.gate.apply_player_move(|| self.player.body().step_by(1)) {
                return Some(position);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::roster::Roster;
    use rand::SeedableRng;
    use std::time::{Duration, Instant};

    #[test]
    fn test_take_damage_marks_body_dead() {
        let player = Player::new(&PlayerConfig::default());
        assert!(player.take_damage(5));
        assert!(!player.take_damage(50));
        assert!(!player.is_alive());
    }

    #[test]
    fn test_runner_moves_once_per_step() {
        let player = Arc::new(Player::new(&PlayerConfig::default()));
        let gate = Arc::new(SyncGate::new(Roster::new(), Duration::from_millis(5)));
        let runner = PlayerRunner::new(
            Arc::clone(&player),
            Arc::clone(&gate),
            ChaCha8Rng::seed_from_u64(0),
            DelayRange::none(),
        );
        let handle = thread::spawn(move || runner.run());

        gate.open_step(true);
        let deadline = Instant::now() + Duration::from_secs(2);
        while !gate.player_moved() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(player.position(), 1);

        gate.close_player_phase();
        gate.open_step(false);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(player.position(), 1);

        gate.stop();
        handle.join().unwrap();
    }
}
