//! Knight's March - a step-synchronized march with threaded agents
//!
//! The player and every roster enemy run on their own thread. A shared
//! two-phase barrier makes them move once per world step, player first,
//! and a battle gate freezes all of them while a fight is resolved.

pub mod battle;
pub mod core;
pub mod entity;
pub mod simulation;
pub mod sync;
