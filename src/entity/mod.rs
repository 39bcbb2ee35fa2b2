//! Agents of the march: the player, roster enemies and encounter creatures

pub mod behavior;
pub mod body;
pub mod creature;
pub mod enemy;
pub mod player;
pub mod progression;

pub use behavior::{behavior_for, EnemyBehavior, MovementProfile};
pub use creature::{Creature, CreatureFactory};
pub use enemy::{Enemy, EnemyRunner, EnemySnapshot};
pub use player::{Player, PlayerRunner, PlayerSnapshot};
