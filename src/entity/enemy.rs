//! Autonomous roster enemies and their thread loop

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::battle::Combatant;
use crate::core::config::{DelayRange, EnemyConfig};
use crate::core::types::{AgentId, EnemyKind, Position, Reward, Vitals};
use crate::entity::behavior::{behavior_for, EnemyBehavior, MovementProfile, TurnContext};
use crate::entity::body::AgentBody;
use crate::entity::player::Player;
use crate::sync::{Phase, SyncGate};

#[derive(Debug)]
pub struct Enemy {
    body: AgentBody,
    kind: EnemyKind,
    boss: bool,
    profile: MovementProfile,
    /// Enemy phases left to sit out after the player fled
    frozen: AtomicU32,
    vitals: Mutex<Vitals>,
    reward: Reward,
    description: String,
}

/// Point-in-time view of a roster enemy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnemySnapshot {
    pub id: AgentId,
    pub name: String,
    pub kind: EnemyKind,
    pub boss: bool,
    pub position: Position,
    pub alive: bool,
    pub frozen_turns: u32,
    pub vitals: Vitals,
}

impl Enemy {
    pub fn from_config(id: AgentId, config: &EnemyConfig) -> Self {
        Self {
            body: AgentBody::new(id, config.name.clone(), config.start),
            kind: config.kind,
            boss: config.boss,
            profile: MovementProfile::from_config(config),
            frozen: AtomicU32::new(0),
            vitals: Mutex::new(config.vitals()),
            reward: config.reward(),
            description: config.description.clone(),
        }
    }

    pub fn body(&self) -> &AgentBody {
        &self.body
    }

    pub fn id(&self) -> AgentId {
        self.body.id()
    }

    pub fn position(&self) -> Position {
        self.body.position()
    }

    pub fn kind(&self) -> EnemyKind {
        self.kind
    }

    pub fn is_boss(&self) -> bool {
        self.boss
    }

    pub fn profile(&self) -> &MovementProfile {
        &self.profile
    }

    pub fn frozen_turns(&self) -> u32 {
        self.frozen.load(Ordering::Acquire)
    }

    /// Start the post-flee cooldown
    pub fn freeze_after_flee(&self) {
        self.frozen.store(self.profile.freeze_turns, Ordering::Release);
        tracing::info!(
            "{} is stunned for {} turns",
            self.body.name(),
            self.profile.freeze_turns
        );
    }

    /// Spend one frozen turn, returning the turns still left
    fn thaw_one(&self) -> u32 {
        let left = self.frozen_turns().saturating_sub(1);
        self.frozen.store(left, Ordering::Release);
        left
    }

    fn guard(&self) -> MutexGuard<'_, Vitals> {
        self.vitals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> EnemySnapshot {
        EnemySnapshot {
            id: self.id(),
            name: self.body.name().to_string(),
            kind: self.kind,
            boss: self.boss,
            position: self.position(),
            alive: self.body.is_alive(),
            frozen_turns: self.frozen_turns(),
            vitals: *self.guard(),
        }
    }
}

impl Combatant for Enemy {
    fn name(&self) -> &str {
        self.body.name()
    }

    fn vitals(&self) -> Vitals {
        *self.guard()
    }

    fn is_alive(&self) -> bool {
        self.body.is_alive()
    }

    fn take_damage(&self, amount: u32) -> bool {
        let standing = self.guard().take_damage(amount);
        if !standing {
            self.body.mark_dead();
        }
        standing
    }

    fn strike(&self) -> u32 {
        self.guard().attack
    }

    fn reward(&self) -> Reward {
        self.reward
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Drives one enemy on its own thread, acting on enemy-phase signals only
pub struct EnemyRunner {
    enemy: Arc<Enemy>,
    player: Arc<Player>,
    gate: Arc<SyncGate>,
    behavior: Box<dyn EnemyBehavior>,
    rng: ChaCha8Rng,
    step_delay: DelayRange,
}

impl EnemyRunner {
    pub fn new(
        enemy: Arc<Enemy>,
        player: Arc<Player>,
        gate: Arc<SyncGate>,
        rng: ChaCha8Rng,
        step_delay: DelayRange,
    ) -> Self {
        let behavior = behavior_for(enemy.kind());
        Self {
            enemy,
            player,
            gate,
            behavior,
            rng,
            step_delay,
        }
    }

    pub fn run(mut self) {
        let mut last_seen = 0;

        while let Some(signal) = self.gate.await_phase(Phase::Enemies, last_seen) {
            last_seen = signal.value;
            if !self.enemy.body().is_alive() {
                break;
            }
            if signal.stand_down {
                continue;
            }
            if !self.gate.hold_while_battle() {
                break;
            }
            self.take_turn();
        }

        let name = self.enemy.body().name();
        if self.enemy.body().is_alive() {
            tracing::debug!("{} withdraws from the march", name);
        } else {
            tracing::debug!("{} lies defeated", name);
        }
    }

    fn take_turn(&mut self) {
        let profile = *self.enemy.profile();
        let name = self.enemy.body().name().to_string();

        if self.enemy.frozen_turns() > 0 {
            let Some(left) = self.calmly(|enemy| enemy.thaw_one()) else {
                return;
            };
            let ctx = TurnContext {
                name: &name,
                position: self.enemy.position(),
                player_position: self.player.position(),
                profile: &profile,
            };
            self.behavior.on_frozen_turn(&ctx, left);
            return;
        }

        let ctx = TurnContext {
            name: &name,
            position: self.enemy.position(),
            player_position: self.player.position(),
            profile: &profile,
        };
        let movement = self.behavior.compute_movement(&ctx, &mut self.rng);
        let direction = movement.signum();

        for _ in 0..movement.unsigned_abs() {
            let moved = self.calmly(|enemy| {
                // A flee mid-move freezes the enemy where it stands
                if !enemy.body().is_alive() || enemy.frozen_turns() > 0 {
                    None
                } else {
                    Some(enemy.body().step_by(direction))
                }
            });
            match moved.flatten() {
                Some(position) => tracing::debug!("{} moves to step {}", name, position),
                None => return,
            }
            thread::sleep(self.step_delay.sample(&mut self.rng));
        }

        let ctx = TurnContext {
            name: &name,
            position: self.enemy.position(),
            player_position: self.player.position(),
            profile: &profile,
        };
        self.behavior.on_turn_end(&ctx);
    }

    /// Apply a state change under the gate, waiting out any battle first.
    /// None once the gate stops.
    fn calmly<R>(&self, apply: impl Fn(&Enemy) -> R) -> Option<R> {
        loop {
            if !self.gate.hold_while_battle() {
                return None;
            }
            if let Some(result) = self.gate.apply_if_calm(|| apply(self.enemy.as_ref())) {
                return Some(result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damage_to_zero_marks_dead() {
        let thief = Enemy::from_config(AgentId(1), &EnemyConfig::thief());
        assert!(thief.take_damage(59));
        assert!(thief.is_alive());
        assert!(!thief.take_damage(1));
        assert!(!thief.body().is_alive());
    }

    #[test]
    fn test_freeze_and_thaw() {
        let thief = Enemy::from_config(AgentId(1), &EnemyConfig::thief());
        thief.freeze_after_flee();
        assert_eq!(thief.frozen_turns(), 3);
        assert_eq!(thief.thaw_one(), 2);
        assert_eq!(thief.snapshot().frozen_turns, 2);
    }

    #[test]
    fn test_snapshot_reports_config() {
        let wizard = Enemy::from_config(AgentId(2), &EnemyConfig::wizard());
        let snapshot = wizard.snapshot();
        assert!(snapshot.boss);
        assert_eq!(snapshot.position, 15);
        assert_eq!(snapshot.vitals.max_health, 100);
    }
}
