//! Step and notification counters
//!
//! Both counters only ever grow. The notification counter's parity selects
//! which class of agent may act: odd values open the player phase, even
//! values open the enemy phase.

use serde::{Deserialize, Serialize};

use crate::core::types::Step;

/// The two halves of a world step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Odd notification values: the player may move
    Player,
    /// Even notification values: autonomous enemies may move
    Enemies,
}

impl Phase {
    /// Phase opened by a notification value (0 opens nothing)
    pub fn of(value: u64) -> Option<Phase> {
        match value {
            0 => None,
            v if v % 2 == 1 => Some(Phase::Player),
            _ => Some(Phase::Enemies),
        }
    }

    /// True if `value` is a signal of this phase
    pub fn admits(self, value: u64) -> bool {
        Phase::of(value) == Some(self)
    }

    /// The phase that must be signalled after this one
    pub fn next(self) -> Phase {
        match self {
            Phase::Player => Phase::Enemies,
            Phase::Enemies => Phase::Player,
        }
    }
}

/// Monotonic step and notification counters
///
/// Not synchronized on its own; lives inside the gate's mutex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepClock {
    step: Step,
    notifications: u64,
}

impl StepClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn notifications(&self) -> u64 {
        self.notifications
    }

    /// Phase opened by the latest signal, if any
    pub fn open_phase(&self) -> Option<Phase> {
        Phase::of(self.notifications)
    }

    /// Phase the next signal will open
    pub fn next_phase(&self) -> Phase {
        self.open_phase().map_or(Phase::Player, Phase::next)
    }

    pub fn advance_step(&mut self) -> Step {
        self.step += 1;
        self.step
    }

    /// Issue one phase signal
    pub fn bump(&mut self) -> u64 {
        self.notifications += 1;
        self.notifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_clock_opens_player_phase_first() {
        let clock = StepClock::new();
        assert_eq!(clock.open_phase(), None);
        assert_eq!(clock.next_phase(), Phase::Player);
    }

    #[test]
    fn test_parity_alternates() {
        let mut clock = StepClock::new();
        assert_eq!(Phase::of(clock.bump()), Some(Phase::Player));
        assert_eq!(clock.next_phase(), Phase::Enemies);
        assert_eq!(Phase::of(clock.bump()), Some(Phase::Enemies));
        assert_eq!(clock.next_phase(), Phase::Player);
    }

    #[test]
    fn test_admits_is_exact() {
        assert!(Phase::Player.admits(1));
        assert!(Phase::Player.admits(7));
        assert!(!Phase::Player.admits(4));
        assert!(Phase::Enemies.admits(4));
        assert!(!Phase::Enemies.admits(0));
    }
}
