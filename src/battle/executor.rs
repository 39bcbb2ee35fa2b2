//! Turn-based battle rules
//!
//! Each round the player issues one command, then every foe still standing
//! strikes back. A successful flee ends the battle before the foes act.

use crate::battle::{
    BattleCommand, BattleExecutor, BattleOutcome, BattleReport, BattleSession, BattleView,
    CommandSource, FoeView,
};
use crate::entity::player::Player;

/// Fraction of max health restored by Heal
pub const HEAL_FRACTION: f32 = 0.3;

/// Default executor, driven by any command source
pub struct TurnBattle<S> {
    source: S,
}

impl<S: CommandSource> TurnBattle<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    fn view(player: &Player, session: &BattleSession, round: u32, failed_flees: u32) -> BattleView {
        BattleView {
            round,
            player: player.vitals(),
            foes: session
                .foes()
                .iter()
                .map(|foe| FoeView {
                    name: foe.name().to_string(),
                    vitals: foe.vitals(),
                })
                .collect(),
            failed_flees,
            final_battle: session.final_battle,
        }
    }
}

/// Flee succeeds when the player's stealth, boosted by every failed
/// attempt, beats the stealth of every foe
pub fn flee_succeeds(player_stealth: u32, failed_flees: u32, session: &BattleSession) -> bool {
    let effective = player_stealth.saturating_mul(1 + failed_flees);
    session
        .foes()
        .iter()
        .all(|foe| effective > foe.vitals().stealth)
}

impl<S: CommandSource> BattleExecutor for TurnBattle<S> {
    fn resolve(&mut self, player: &Player, session: &mut BattleSession) -> BattleReport {
        let mut round = 0;
        let mut failed_flees = 0;

        loop {
            session.collect_fallen();
            if session.is_cleared() {
                tracing::info!("All foes defeated!");
                return session.conclude(BattleOutcome::Victory);
            }
            if !player.is_alive() {
                tracing::info!("{} has fallen in battle", player.name());
                return session.conclude(BattleOutcome::Defeat);
            }

            round += 1;
            let view = Self::view(player, session, round, failed_flees);
            let command = self.source.next_command(&view);
            let attack = player.vitals().attack;
            let mut defending = false;

            match command {
                BattleCommand::Slash => {
                    if let Some(foe) = session.foes().first() {
                        foe.take_damage(attack);
                        tracing::info!("You slash {} for {} damage", foe.name(), attack);
                    }
                }
                BattleCommand::Fire => {
                    let damage = attack / 2;
                    for foe in session.foes() {
                        foe.take_damage(damage);
                    }
                    tracing::info!("Flames wash over every foe for {} damage", damage);
                }
                BattleCommand::Defend => {
                    defending = true;
                    tracing::info!("You raise your shield");
                }
                BattleCommand::Heal => {
                    let restored = player.heal_fraction(HEAL_FRACTION);
                    tracing::info!("You recover {} health", restored);
                }
                BattleCommand::Inspect => {
                    if let Some(foe) = session.foes().first() {
                        let vitals = foe.vitals();
                        tracing::info!(
                            "{}: {} ({}/{} hp, {} atk, {} stealth)",
                            foe.name(),
                            foe.description(),
                            vitals.health,
                            vitals.max_health,
                            vitals.attack,
                            vitals.stealth
                        );
                    }
                }
                BattleCommand::Flee => {
                    if flee_succeeds(player.vitals().stealth, failed_flees, session) {
                        tracing::info!("You slip away!");
                        return session.conclude(BattleOutcome::Fled);
                    }
                    failed_flees += 1;
                    tracing::info!("You fail to escape");
                }
            }

            for fallen in session.collect_fallen() {
                tracing::info!("{} is defeated", fallen);
            }

            for foe in session.foes() {
                let mut damage = foe.strike();
                if defending {
                    damage /= 2;
                }
                if damage == 0 {
                    continue;
                }
                let standing = player.take_damage(damage);
                tracing::info!("{} hits you for {} damage", foe.name(), damage);
                if !standing {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::{Combatant, ScriptedCommands};
    use crate::core::config::{CreatureConfig, PlayerConfig};
    use crate::entity::creature::Creature;
    use std::sync::Arc;

    fn player() -> Player {
        Player::new(&PlayerConfig::default())
    }

    fn session(creatures: Vec<CreatureConfig>) -> BattleSession {
        let foes = creatures
            .iter()
            .enumerate()
            .map(|(i, stats)| {
                Arc::new(Creature::new(format!("Foe #{}", i + 1), stats)) as Arc<dyn Combatant>
            })
            .collect();
        BattleSession::new(3, 3, foes)
    }

    #[test]
    fn test_slash_kills_slime_in_two_rounds() {
        let player = player();
        let mut session = session(vec![CreatureConfig::slime()]);
        let mut battle = TurnBattle::new(ScriptedCommands::new(vec![BattleCommand::Slash]));

        let report = battle.resolve(&player, &mut session);
        assert_eq!(report.outcome, BattleOutcome::Victory);
        assert_eq!(report.experience, 2);
        assert_eq!(report.gold, 3);
        // Only the first round's counterattack lands
        assert_eq!(player.vitals().health, 14);
    }

    #[test]
    fn test_fire_hits_every_foe_for_half_attack() {
        let player = player();
        let mut session = session(vec![CreatureConfig::slime(), CreatureConfig::slime()]);
        let mut battle = TurnBattle::new(ScriptedCommands::new(vec![BattleCommand::Fire]));

        let report = battle.resolve(&player, &mut session);
        assert_eq!(report.outcome, BattleOutcome::Victory);
        assert_eq!(report.defeated.len(), 2);
        // 5 hp at 1 damage per round: four rounds of two strikes each
        assert_eq!(player.vitals().health, 15 - 8);
    }

    #[test]
    fn test_flee_succeeds_against_stealthless_foe() {
        let player = player();
        let mut session = session(vec![CreatureConfig::slime()]);
        let mut battle = TurnBattle::new(ScriptedCommands::new(vec![BattleCommand::Flee]));

        let report = battle.resolve(&player, &mut session);
        assert_eq!(report.outcome, BattleOutcome::Fled);
        assert_eq!(player.vitals().health, 15);
        assert_eq!(session.foes().len(), 1);
    }

    #[test]
    fn test_failed_flees_build_up() {
        let player = player();
        // TickiBird stealth 10 beats 5 and 10, loses to 15
        let mut session = session(vec![CreatureConfig::tickibird()]);
        assert!(!flee_succeeds(5, 0, &session));
        assert!(!flee_succeeds(5, 1, &session));
        assert!(flee_succeeds(5, 2, &session));

        let mut battle = TurnBattle::new(ScriptedCommands::new(vec![BattleCommand::Flee]));
        let report = battle.resolve(&player, &mut session);
        assert_eq!(report.outcome, BattleOutcome::Fled);
        // The bird's fuse did not reach its third strike
        assert_eq!(player.vitals().health, 15);
    }

    #[test]
    fn test_defeat_when_health_runs_out() {
        let player = player();
        let mut session = session(vec![CreatureConfig::tickibird()]);
        let mut battle = TurnBattle::new(ScriptedCommands::new(vec![BattleCommand::Inspect]));

        let report = battle.resolve(&player, &mut session);
        assert_eq!(report.outcome, BattleOutcome::Defeat);
        assert!(!player.is_alive());
        assert!(report.defeated.is_empty());
    }

    #[test]
    fn test_defend_halves_damage() {
        let player = player();
        let mut session = session(vec![CreatureConfig::tickibird()]);
        let mut battle = TurnBattle::new(ScriptedCommands::new(vec![
            BattleCommand::Defend,
            BattleCommand::Defend,
            BattleCommand::Defend,
            BattleCommand::Flee,
            BattleCommand::Flee,
            BattleCommand::Flee,
        ]));

        battle.resolve(&player, &mut session);
        // Third strike lands for 15, halved to 7
        assert_eq!(player.vitals().health, 8);
    }
}
