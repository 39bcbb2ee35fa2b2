//! The shared monitor every agent coordinates through
//!
//! One mutex and one condition variable guard the step clock, the per-cycle
//! player-moved signal, the battle and flee flags, the run flag and the
//! roster. Phase signals wake everyone; each waiter re-checks the parity it
//! cares about and goes back to sleep on anything else.
//!
//! Battle resolution deliberately does not go through the condition
//! variable. Agents that find a battle in progress poll the flag at a fixed
//! interval until it clears.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crate::core::types::Step;
use crate::simulation::roster::Roster;
use crate::sync::clock::{Phase, StepClock};

/// What a waiter observed when its phase opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSignal {
    /// Notification counter value that released the waiter
    pub value: u64,
    /// Step counter at the time of release
    pub step: Step,
    /// The enemy phase closes a cycle in which a battle ran; nobody moves
    pub stand_down: bool,
}

#[derive(Debug)]
struct GateState {
    clock: StepClock,
    running: bool,
    player_moved: bool,
    player_should_move: bool,
    battle_in_progress: bool,
    just_fled: bool,
    last_stand_down: u64,
    roster: Roster,
}

/// Two-phase step barrier plus the battle gate
#[derive(Debug)]
pub struct SyncGate {
    state: Mutex<GateState>,
    changed: Condvar,
    battle_poll: Duration,
}

impl SyncGate {
    pub fn new(roster: Roster, battle_poll: Duration) -> Self {
        Self {
            state: Mutex::new(GateState {
                clock: StepClock::new(),
                running: true,
                player_moved: false,
                player_should_move: false,
                battle_in_progress: false,
                just_fled: false,
                last_stand_down: 0,
                roster,
            }),
            changed: Condvar::new(),
            battle_poll,
        }
    }

    // Every guarded value is consistent between statements, so a panic on
    // another thread never leaves it half-written.
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, GateState>) -> MutexGuard<'a, GateState> {
        self.changed.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    // === COUNTERS ===

    pub fn current_step(&self) -> Step {
        self.lock().clock.step()
    }

    pub fn notifications(&self) -> u64 {
        self.lock().clock.notifications()
    }

    pub fn clock(&self) -> StepClock {
        self.lock().clock
    }

    // === BARRIER ===

    /// Advance the step counter and open its player phase in one critical
    /// section. Clears the player-moved signal first.
    pub fn open_step(&self, player_should_move: bool) -> (Step, u64) {
        let mut state = self.lock();
        debug_assert_eq!(
            state.clock.next_phase(),
            Phase::Player,
            "previous cycle was left open"
        );
        let step = state.clock.advance_step();
        state.player_moved = false;
        state.player_should_move = player_should_move;
        let value = state.clock.bump();
        self.changed.notify_all();
        tracing::debug!(step, value, "player phase opened");
        (step, value)
    }

    /// Issue one phase signal and wake every waiter
    pub fn signal(&self, phase: Phase) -> u64 {
        let mut state = self.lock();
        debug_assert_eq!(state.clock.next_phase(), phase, "phase signals must alternate");
        let value = state.clock.bump();
        self.changed.notify_all();
        tracing::debug!(value, ?phase, "phase signal");
        value
    }

    /// Close a cycle with an enemy-parity signal during which nobody moves
    pub fn stand_down(&self) -> u64 {
        let mut state = self.lock();
        debug_assert_eq!(state.clock.next_phase(), Phase::Enemies);
        let value = state.clock.bump();
        state.last_stand_down = value;
        self.changed.notify_all();
        tracing::debug!(value, "enemy phase stood down");
        value
    }

    /// Stand down if a player phase is still open; no-op otherwise
    pub fn close_player_phase(&self) -> Option<u64> {
        let open = self.lock().clock.open_phase();
        match open {
            Some(Phase::Player) => Some(self.stand_down()),
            _ => None,
        }
    }

    /// Block until the notification counter exceeds `last_seen` with the
    /// parity of `phase`. Signals of the other parity and stale values put
    /// the caller back to sleep without acting.
    ///
    /// Returns `None` once the gate is stopped.
    pub fn await_phase(&self, phase: Phase, last_seen: u64) -> Option<PhaseSignal> {
        let mut state = self.lock();
        loop {
            if !state.running {
                return None;
            }
            let value = state.clock.notifications();
            if value > last_seen && phase.admits(value) {
                return Some(PhaseSignal {
                    value,
                    step: state.clock.step(),
                    stand_down: value == state.last_stand_down,
                });
            }
            state = self.wait(state);
        }
    }

    /// Block until the step counter moves past `last_step`, whatever the
    /// phase. Returns `None` once the gate is stopped.
    pub fn await_step(&self, last_step: Step) -> Option<Step> {
        let mut state = self.lock();
        loop {
            if !state.running {
                return None;
            }
            if state.clock.step() > last_step {
                return Some(state.clock.step());
            }
            state = self.wait(state);
        }
    }

    // === PLAYER SIGNALS ===

    pub fn mark_player_moved(&self) {
        self.lock().player_moved = true;
    }

    pub fn player_moved(&self) -> bool {
        self.lock().player_moved
    }

    pub fn player_should_move(&self) -> bool {
        self.lock().player_should_move
    }

    // === BATTLE GATE ===

    pub fn set_battle_in_progress(&self, in_progress: bool) {
        self.lock().battle_in_progress = in_progress;
    }

    pub fn is_battle_in_progress(&self) -> bool {
        self.lock().battle_in_progress
    }

    /// Poll at the battle interval until no battle is in progress.
    ///
    /// Returns false if the gate stopped while waiting.
    pub fn hold_while_battle(&self) -> bool {
        loop {
            {
                let state = self.lock();
                if !state.running {
                    return false;
                }
                if !state.battle_in_progress {
                    return true;
                }
            }
            thread::sleep(self.battle_poll);
        }
    }

    /// Run `apply` under the gate lock unless a battle is in progress.
    ///
    /// Position changes go through here so that none can land after
    /// `set_battle_in_progress(true)` returns.
    pub fn apply_if_calm<R>(&self, apply: impl FnOnce() -> R) -> Option<R> {
        let state = self.lock();
        if state.battle_in_progress || !state.running {
            return None;
        }
        let result = apply();
        drop(state);
        Some(result)
    }

    /// Apply the player's move and raise the moved signal atomically.
    /// Refused like `apply_if_calm` while a battle runs.
    pub fn apply_player_move<R>(&self, apply: impl FnOnce() -> R) -> Option<R> {
        let mut state = self.lock();
        if state.battle_in_progress || !state.running {
            return None;
        }
        let result = apply();
        state.player_moved = true;
        state.player_should_move = false;
        Some(result)
    }

    // === FLEE GRACE ===

    pub fn set_just_fled(&self) {
        self.lock().just_fled = true;
    }

    pub fn just_fled(&self) -> bool {
        self.lock().just_fled
    }

    /// Clear the flee flag, returning whether it was set
    pub fn take_just_fled(&self) -> bool {
        std::mem::take(&mut self.lock().just_fled)
    }

    // === RUN FLAG ===

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Clear the run flag and wake every waiter so it can exit
    pub fn stop(&self) {
        self.lock().running = false;
        self.changed.notify_all();
    }

    // === ROSTER ===

    pub(crate) fn with_roster<R>(&self, f: impl FnOnce(&mut Roster) -> R) -> R {
        f(&mut self.lock().roster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn gate() -> Arc<SyncGate> {
        Arc::new(SyncGate::new(Roster::new(), Duration::from_millis(5)))
    }

    #[test]
    fn test_open_step_then_enemy_signal_alternates_parity() {
        let gate = gate();
        let (step, first) = gate.open_step(true);
        assert_eq!(step, 1);
        assert_eq!(Phase::of(first), Some(Phase::Player));
        let second = gate.signal(Phase::Enemies);
        assert_eq!(Phase::of(second), Some(Phase::Enemies));
        assert_eq!(gate.notifications(), 2);
    }

    #[test]
    fn test_open_step_clears_player_moved() {
        let gate = gate();
        gate.mark_player_moved();
        gate.open_step(true);
        assert!(!gate.player_moved());
        assert!(gate.player_should_move());
    }

    #[test]
    fn test_close_player_phase_is_idempotent() {
        let gate = gate();
        gate.open_step(true);
        assert_eq!(gate.close_player_phase(), Some(2));
        assert_eq!(gate.close_player_phase(), None);
        assert_eq!(gate.notifications(), 2);
    }

    #[test]
    fn test_await_phase_ignores_wrong_parity() {
        let gate = gate();
        let seen = Arc::new(AtomicU64::new(0));

        let waiter = {
            let gate = Arc::clone(&gate);
            let seen = Arc::clone(&seen);
            thread::spawn(move || {
                if let Some(signal) = gate.await_phase(Phase::Enemies, 0) {
                    seen.store(signal.value, Ordering::SeqCst);
                }
            })
        };

        gate.open_step(true);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(seen.load(Ordering::SeqCst), 0, "odd signal must not release");

        gate.signal(Phase::Enemies);
        waiter.join().unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stand_down_is_flagged() {
        let gate = gate();
        gate.open_step(true);
        gate.stand_down();
        let signal = gate.await_phase(Phase::Enemies, 0).unwrap();
        assert!(signal.stand_down);

        gate.open_step(true);
        gate.signal(Phase::Enemies);
        let signal = gate.await_phase(Phase::Enemies, signal.value).unwrap();
        assert!(!signal.stand_down);
        assert_eq!(signal.value, 4);
    }

    #[test]
    fn test_stop_releases_waiters() {
        let gate = gate();
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.await_step(0))
        };
        thread::sleep(Duration::from_millis(20));
        gate.stop();
        assert_eq!(waiter.join().unwrap(), None);
    }

    #[test]
    fn test_hold_while_battle_polls_until_clear() {
        let gate = gate();
        gate.set_battle_in_progress(true);

        let clearer = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(60));
                gate.set_battle_in_progress(false);
            })
        };

        let started = Instant::now();
        assert!(gate.hold_while_battle());
        assert!(started.elapsed() >= Duration::from_millis(50));
        clearer.join().unwrap();
    }

    #[test]
    fn test_apply_if_calm_refuses_during_battle() {
        let gate = gate();
        assert_eq!(gate.apply_if_calm(|| 1), Some(1));
        gate.set_battle_in_progress(true);
        assert_eq!(gate.apply_if_calm(|| 1), None);
    }

    #[test]
    fn test_apply_player_move_raises_signal() {
        let gate = gate();
        gate.open_step(true);
        assert_eq!(gate.apply_player_move(|| 7), Some(7));
        assert!(gate.player_moved());
        assert!(!gate.player_should_move());
    }

    #[test]
    fn test_take_just_fled_clears_flag() {
        let gate = gate();
        assert!(!gate.take_just_fled());
        gate.set_just_fled();
        assert!(gate.take_just_fled());
        assert!(!gate.just_fled());
    }
}
