//! The step loop
//!
//! The orchestrator runs on the caller's thread. It is the only writer of
//! the step and notification counters and of the roster, and the only
//! caller of the battle executor.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::battle::{BattleExecutor, BattleOutcome, BattleReport, BattleSession, Combatant};
use crate::core::config::SimulationConfig;
use crate::core::error::{Result, SimError};
use crate::core::types::{AgentId, CreatureKind, Step};
use crate::entity::creature::CreatureFactory;
use crate::entity::enemy::{Enemy, EnemyRunner, EnemySnapshot};
use crate::entity::player::{Player, PlayerRunner, PlayerSnapshot};
use crate::simulation::input::{StepDecision, StepInput, StepView};
use crate::simulation::roster::Roster;
use crate::simulation::scheduler::StepEventScheduler;
use crate::sync::{Phase, SyncGate};

/// Interval at which shutdown checks whether a thread has finished
const JOIN_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// The boss fell, or no boss was left to face
    Victory,
    Defeat,
    Stopped,
}

/// End-of-run report
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub outcome: Option<RunOutcome>,
    pub steps: Step,
    pub notifications: u64,
    pub battles: u32,
    /// Player phases that closed before the player moved
    pub missed_moves: u32,
    pub player: PlayerSnapshot,
    pub roster: Vec<EnemySnapshot>,
    pub most_defeated: Option<(String, usize)>,
}

struct AgentThread {
    name: String,
    handle: JoinHandle<()>,
}

pub struct Orchestrator {
    config: SimulationConfig,
    gate: Arc<SyncGate>,
    player: Arc<Player>,
    scheduler: Arc<StepEventScheduler>,
    factory: CreatureFactory,
    executor: Box<dyn BattleExecutor>,
    threads: Vec<AgentThread>,
    started: bool,
    /// Enemy whose encounter fires on the next check, position or not
    forced: Option<AgentId>,
    outcome: Option<RunOutcome>,
    battles: u32,
    missed_moves: u32,
}

impl Orchestrator {
    pub fn new(config: SimulationConfig, executor: Box<dyn BattleExecutor>) -> Result<Self> {
        config.validate()?;

        let roster = Roster::from_configs(&config.enemies);
        let gate = Arc::new(SyncGate::new(roster, config.timing.battle_poll()));
        let player = Arc::new(Player::new(&config.player));
        let scheduler = Arc::new(StepEventScheduler::new(&config.encounters));
        let factory = CreatureFactory::new(&config.creatures);

        Ok(Self {
            config,
            gate,
            player,
            scheduler,
            factory,
            executor,
            threads: Vec::new(),
            started: false,
            forced: None,
            outcome: None,
            battles: 0,
            missed_moves: 0,
        })
    }

    // === LIFECYCLE ===

    /// Spawn the player, every roster enemy and the encounter watcher
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(SimError::AlreadyStarted);
        }
        self.started = true;

        let seed = self.config.world.seed;
        let timing = self.config.timing.clone();

        let runner = PlayerRunner::new(
            Arc::clone(&self.player),
            Arc::clone(&self.gate),
            ChaCha8Rng::seed_from_u64(seed),
            timing.player_action_delay,
        );
        self.spawn("player".to_string(), move || runner.run())?;

        let enemies: Vec<Arc<Enemy>> = self.gate.with_roster(|r| r.iter().cloned().collect());
        for enemy in enemies {
            let name = format!("enemy-{}", enemy.id().0);
            let rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(u64::from(enemy.id().0)));
            let runner = EnemyRunner::new(
                enemy,
                Arc::clone(&self.player),
                Arc::clone(&self.gate),
                rng,
                timing.enemy_step_delay,
            );
            self.spawn(name, move || runner.run())?;
        }

        let scheduler = Arc::clone(&self.scheduler);
        let gate = Arc::clone(&self.gate);
        self.spawn("encounters".to_string(), move || scheduler.watch(gate))?;

        tracing::info!(
            threads = self.threads.len(),
            "{} sets out on the march",
            self.player.name()
        );
        Ok(())
    }

    fn spawn(&mut self, name: String, body: impl FnOnce() + Send + 'static) -> Result<()> {
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(body)
            .map_err(|source| SimError::ThreadSpawn {
                name: name.clone(),
                source,
            })?;
        self.threads.push(AgentThread { name, handle });
        Ok(())
    }

    /// Drive the march until it ends or the input quits, then shut down
    pub fn run(&mut self, input: &mut dyn StepInput) -> Result<RunOutcome> {
        if !self.started {
            self.start()?;
        }
        let result = self.drive(input);
        self.shutdown();
        result
    }

    fn drive(&mut self, input: &mut dyn StepInput) -> Result<RunOutcome> {
        loop {
            if let Some(outcome) = self.outcome {
                tracing::info!(?outcome, "the march is over");
                return Ok(outcome);
            }

            if self.player.position() >= self.config.world.max_steps {
                self.trigger_final_encounter();
                continue;
            }

            let view = self.step_view();
            match input.decide(&view)? {
                StepDecision::Advance => self.advance_step(),
                StepDecision::Wait => self.hold_position(),
                StepDecision::Quit => {
                    tracing::info!("{} abandons the march", self.player.name());
                    self.outcome = Some(RunOutcome::Stopped);
                }
            }
        }
    }

    /// Clear the run flag and wake every waiting agent
    pub fn request_stop(&self) {
        self.gate.stop();
    }

    /// Stop every thread, waiting up to the join timeout for each.
    /// Threads that miss it are detached. Returns how many were.
    pub fn shutdown(&mut self) -> usize {
        self.request_stop();
        let timeout = self.config.timing.join_timeout();
        let mut detached = 0;

        for AgentThread { name, handle } in self.threads.drain(..) {
            let deadline = Instant::now() + timeout;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(JOIN_POLL);
            }
            if !handle.is_finished() {
                tracing::warn!(thread = %name, "did not stop within {:?}, detaching", timeout);
                detached += 1;
                continue;
            }
            if handle.join().is_err() {
                tracing::warn!(thread = %name, "thread panicked");
            }
        }
        detached
    }

    // === STEP PROTOCOL ===

    /// One full world step: the player marches, then the enemies move
    pub fn advance_step(&mut self) {
        self.run_cycle(true);
    }

    /// One world step in which the player holds position
    pub fn hold_position(&mut self) {
        self.run_cycle(false);
    }

    fn run_cycle(&mut self, move_player: bool) {
        let (step, _) = self.gate.open_step(move_player);
        self.scheduler.activate_through(step);
        tracing::info!("=== Step {} ===", step);

        if move_player {
            self.await_player_move(step);
        }

        if self.check_encounters() {
            // No enemy movement in a cycle that had a battle
            self.gate.close_player_phase();
            return;
        }

        self.gate.signal(Phase::Enemies);
        thread::sleep(self.config.timing.enemy_settle());
        self.check_encounters();
    }

    /// Poll for the player's move up to the configured ceiling. A miss is
    /// tolerated and counted: the late move lands on a later step.
    fn await_player_move(&mut self, step: Step) {
        let interval = self.config.timing.player_poll_interval();
        for _ in 0..self.config.timing.player_poll_limit {
            if self.gate.player_moved() || !self.player.is_alive() {
                return;
            }
            thread::sleep(interval);
        }
        if self.gate.player_moved() {
            return;
        }
        self.missed_moves += 1;
        tracing::warn!(
            step,
            "player did not move within {:?}, continuing",
            self.config.timing.player_wait_ceiling()
        );
    }

    /// Run at most one battle for the player's current position.
    /// Returns true if a battle was fought.
    pub fn check_encounters(&mut self) -> bool {
        if self.outcome.is_some() {
            return false;
        }

        if let Some(id) = self.forced.take() {
            if let Some(enemy) = self.gate.with_roster(|r| r.get(id)) {
                self.engage_enemy(enemy);
                return true;
            }
        }

        if self.gate.take_just_fled() {
            tracing::debug!("grace step after fleeing, no encounter");
            return false;
        }

        let position = self.player.position();
        if let Some(enemy) = self.gate.with_roster(|r| r.first_at(position)) {
            self.engage_enemy(enemy);
            return true;
        }

        self.scheduler.activate_through(self.gate.current_step());
        match self.scheduler.take_active_at(position) {
            Some(kinds) => self.engage_creatures(&kinds),
            None => false,
        }
    }

    // === BATTLES ===

    fn engage_enemy(&mut self, enemy: Arc<Enemy>) {
        let step = self.gate.current_step();
        let position = self.player.position();
        tracing::info!("{} blocks the path at step {}!", enemy.name(), position);

        let mut session =
            BattleSession::new(step, position, vec![Arc::clone(&enemy) as Arc<dyn Combatant>]);
        if enemy.is_boss() {
            session = session.final_battle();
        }

        // The outcome lands while the gate is still closed, so an enemy
        // held mid-turn sees its freeze or removal before it can move again
        let report = self.resolve_battle(&mut session);
        let fled = if !self.player.is_alive() {
            self.outcome = Some(RunOutcome::Defeat);
            false
        } else if !enemy.is_alive() {
            self.gate.with_roster(|r| r.remove(enemy.id()));
            if enemy.is_boss() {
                tracing::info!("{} is vanquished. The march is won!", enemy.name());
                self.outcome = Some(RunOutcome::Victory);
            }
            false
        } else if report.outcome == BattleOutcome::Fled {
            enemy.freeze_after_flee();
            self.gate.set_just_fled();
            true
        } else {
            false
        };
        self.end_battle();

        if fled {
            self.flee_step();
        }
    }

    /// Returns false if the encounter could not be spawned
    fn engage_creatures(&mut self, kinds: &[CreatureKind]) -> bool {
        let creatures = match self.factory.spawn_encounter(kinds) {
            Ok(creatures) => creatures,
            Err(err) => {
                tracing::warn!(%err, "skipping encounter");
                return false;
            }
        };

        let step = self.gate.current_step();
        let position = self.player.position();
        let names: Vec<&str> = creatures.iter().map(|c| c.name()).collect();
        tracing::info!("Ambushed at step {} by {}!", position, names.join(", "));

        let foes = creatures
            .into_iter()
            .map(|c| Arc::new(c) as Arc<dyn Combatant>)
            .collect();
        let mut session = BattleSession::new(step, position, foes);

        let report = self.resolve_battle(&mut session);
        let fled = if !self.player.is_alive() {
            self.outcome = Some(RunOutcome::Defeat);
            false
        } else if report.outcome == BattleOutcome::Fled {
            self.gate.set_just_fled();
            true
        } else {
            false
        };
        self.end_battle();

        if fled {
            self.flee_step();
        }
        true
    }

    /// Close the battle gate and run the executor. The gate stays closed
    /// until `end_battle`, so the caller applies the outcome first.
    fn resolve_battle(&mut self, session: &mut BattleSession) -> BattleReport {
        self.gate.set_battle_in_progress(true);
        let report = self.executor.resolve(&self.player, session);

        self.player.credit(&report);
        self.battles += 1;
        tracing::info!(
            outcome = ?report.outcome,
            experience = report.experience,
            gold = report.gold,
            "battle over"
        );
        report
    }

    /// Sit out the post-battle pause, then release every agent
    fn end_battle(&self) {
        let pause = self.config.timing.post_battle_pause();
        if !pause.is_zero() {
            thread::sleep(pause);
        }
        self.gate.set_battle_in_progress(false);
    }

    /// Supplementary step after a flee: the player moves, nobody else does
    fn flee_step(&mut self) {
        self.gate.close_player_phase();
        let (step, _) = self.gate.open_step(true);
        self.scheduler.activate_through(step);
        tracing::info!("You escape ahead (step {})", step);
        self.await_player_move(step);
        self.gate.close_player_phase();
    }

    // === FINAL ENCOUNTER ===

    /// Bring the boss to the player and force the next encounter check to
    /// engage it. With no boss left the march ends in victory.
    pub fn stage_final_encounter(&mut self) -> bool {
        let Some(boss) = self.gate.with_roster(|r| r.boss()) else {
            tracing::info!("No foe remains to bar the way. Peace reigns.");
            self.outcome = Some(RunOutcome::Victory);
            return false;
        };

        // No gate needed: the forced encounter ignores position, so a late
        // unit step of the boss cannot dodge it
        boss.body().set_position(self.player.position());
        tracing::info!("{} appears before you!", boss.name());
        self.forced = Some(boss.id());
        true
    }

    pub fn trigger_final_encounter(&mut self) -> bool {
        self.stage_final_encounter() && self.check_encounters()
    }

    // === ACCESSORS ===

    pub fn gate(&self) -> &Arc<SyncGate> {
        &self.gate
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn player(&self) -> &Arc<Player> {
        &self.player
    }

    pub fn scheduler(&self) -> &Arc<StepEventScheduler> {
        &self.scheduler
    }

    pub fn current_step(&self) -> Step {
        self.gate.current_step()
    }

    pub fn is_battle_in_progress(&self) -> bool {
        self.gate.is_battle_in_progress()
    }

    pub fn enemy(&self, id: AgentId) -> Option<Arc<Enemy>> {
        self.gate.with_roster(|r| r.get(id))
    }

    pub fn roster_snapshot(&self) -> Vec<EnemySnapshot> {
        self.gate.with_roster(|r| r.snapshot())
    }

    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome
    }

    pub fn battles(&self) -> u32 {
        self.battles
    }

    pub fn missed_moves(&self) -> u32 {
        self.missed_moves
    }

    pub fn step_view(&self) -> StepView {
        let player = self.player.snapshot();
        StepView {
            step: self.current_step(),
            position: player.position,
            max_steps: self.config.world.max_steps,
            vitals: player.vitals,
            level: player.level,
            gold: player.gold,
            roster: self.roster_snapshot(),
        }
    }

    pub fn summary(&self) -> RunSummary {
        let clock = self.gate.clock();
        let player = self.player.snapshot();
        let most_defeated = player.record.most_defeated();
        RunSummary {
            outcome: self.outcome,
            steps: clock.step(),
            notifications: clock.notifications(),
            battles: self.battles,
            missed_moves: self.missed_moves,
            player,
            roster: self.roster_snapshot(),
            most_defeated,
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if !self.threads.is_empty() {
            self.shutdown();
        }
    }
}
