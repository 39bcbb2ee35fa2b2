//! Enemy movement behavior framework
//!
//! Every roster enemy follows the same pursuit policy: chase fast when the
//! player is ahead, back off slowly when the player is behind, hold still
//! when level. Kinds differ only in their per-turn hooks.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::config::EnemyConfig;
use crate::core::types::{EnemyKind, Position};

/// Movement parameters of one enemy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementProfile {
    pub retreat_min: u32,
    pub retreat_max: u32,
    pub chase_steps: u32,
    pub freeze_turns: u32,
}

impl MovementProfile {
    pub fn from_config(config: &EnemyConfig) -> Self {
        Self {
            retreat_min: config.retreat_min,
            retreat_max: config.retreat_max,
            chase_steps: config.chase_steps,
            freeze_turns: config.freeze_turns,
        }
    }

    fn roll_retreat<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        if self.retreat_min >= self.retreat_max {
            return self.retreat_min;
        }
        rng.gen_range(self.retreat_min..=self.retreat_max)
    }
}

/// Signed number of unit steps for this turn.
///
/// Player behind: negative, magnitude rolled in the retreat range.
/// Player ahead: the chase distance. Level: zero.
pub fn pursuit_movement<R: Rng + ?Sized>(
    profile: &MovementProfile,
    own: Position,
    player: Position,
    rng: &mut R,
) -> i32 {
    use std::cmp::Ordering;

    match player.cmp(&own) {
        Ordering::Less => -(profile.roll_retreat(rng) as i32),
        Ordering::Greater => profile.chase_steps as i32,
        Ordering::Equal => 0,
    }
}

/// What an enemy sees when deciding its turn
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    pub name: &'a str,
    pub position: Position,
    pub player_position: Position,
    pub profile: &'a MovementProfile,
}

/// Capability interface for enemy kinds
pub trait EnemyBehavior: Send {
    /// Signed unit steps to take this enemy phase
    fn compute_movement(&mut self, ctx: &TurnContext<'_>, rng: &mut dyn rand::RngCore) -> i32 {
        pursuit_movement(ctx.profile, ctx.position, ctx.player_position, rng)
    }

    /// Runs instead of movement while the enemy is frozen
    fn on_frozen_turn(&mut self, ctx: &TurnContext<'_>, turns_left: u32);

    /// Runs once after the enemy finished moving
    fn on_turn_end(&mut self, ctx: &TurnContext<'_>);
}

/// Get the behavior handler for an enemy kind
pub fn behavior_for(kind: EnemyKind) -> Box<dyn EnemyBehavior> {
    match kind {
        EnemyKind::Thief => Box::new(ThiefBehavior::default()),
        EnemyKind::Wizard => Box::new(WizardBehavior),
    }
}

/// Stalks the player and remembers how long it has gone unseen
#[derive(Debug, Default)]
pub struct ThiefBehavior {
    turns_lurking: u32,
}

impl EnemyBehavior for ThiefBehavior {
    fn on_frozen_turn(&mut self, ctx: &TurnContext<'_>, turns_left: u32) {
        tracing::info!("{} is still recovering... ({} turns remaining)", ctx.name, turns_left);
    }

    fn on_turn_end(&mut self, ctx: &TurnContext<'_>) {
        if ctx.player_position < ctx.position {
            self.turns_lurking += 1;
            tracing::debug!(
                "{} stalks from the shadows at step {} ({} turns unseen)",
                ctx.name,
                ctx.position,
                self.turns_lurking
            );
        } else {
            self.turns_lurking = 0;
        }
    }
}

pub struct WizardBehavior;

impl EnemyBehavior for WizardBehavior {
    fn on_frozen_turn(&mut self, ctx: &TurnContext<'_>, turns_left: u32) {
        tracing::info!(
            "{} gathers its scattered wits... ({} turns remaining)",
            ctx.name,
            turns_left
        );
    }

    fn on_turn_end(&mut self, ctx: &TurnContext<'_>) {
        tracing::debug!("{} levitates at step {}", ctx.name, ctx.position);
    }
}
