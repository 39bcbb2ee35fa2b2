//! Heuristic command source for headless runs

use crate::battle::{BattleCommand, BattleView, CommandSource};

/// Health fraction below which the autopilot heals
const HEAL_BELOW: f32 = 0.4;

/// Heals allowed per battle, so a stalemate cannot spin forever
const MAX_HEALS: u32 = 3;

/// Picks a sensible command from the visible state of the fight
#[derive(Debug, Clone, Default)]
pub struct AutoPilot {
    heals_used: u32,
}

impl AutoPilot {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the fight cannot be won before the player falls,
    /// assuming every foe lands its full attack each round
    fn hopeless(view: &BattleView) -> bool {
        let attack = view.player.attack.max(1);
        let rounds_to_win: u32 = view
            .foes
            .iter()
            .map(|foe| foe.vitals.health.div_ceil(attack))
            .sum();
        let incoming: u32 = view.foes.iter().map(|foe| foe.vitals.attack).sum();
        rounds_to_win.saturating_mul(incoming) >= view.player.health.saturating_mul(2)
    }
}

impl CommandSource for AutoPilot {
    fn next_command(&mut self, view: &BattleView) -> BattleCommand {
        if view.round == 1 {
            self.heals_used = 0;
        }

        let player = view.player;
        let wounded = (player.health as f32) < player.max_health as f32 * HEAL_BELOW;
        if wounded && self.heals_used < MAX_HEALS {
            self.heals_used += 1;
            return BattleCommand::Heal;
        }

        // Running from the final battle only postpones it
        if !view.final_battle && Self::hopeless(view) {
            return BattleCommand::Flee;
        }

        if view.foes.len() > 1 && player.attack / 2 > 0 {
            BattleCommand::Fire
        } else {
            BattleCommand::Slash
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::FoeView;
    use crate::core::types::Vitals;

    fn view(player: Vitals, foes: &[(u32, u32)], final_battle: bool) -> BattleView {
        BattleView {
            round: 1,
            player,
            foes: foes
                .iter()
                .enumerate()
                .map(|(i, (health, attack))| FoeView {
                    name: format!("Foe #{}", i + 1),
                    vitals: Vitals::new(*health, *attack, 0),
                })
                .collect(),
            failed_flees: 0,
            final_battle,
        }
    }

    #[test]
    fn test_slashes_single_weak_foe() {
        let mut pilot = AutoPilot::new();
        let command = pilot.next_command(&view(Vitals::new(15, 3, 5), &[(5, 1)], false));
        assert_eq!(command, BattleCommand::Slash);
    }

    #[test]
    fn test_fires_into_a_crowd() {
        let mut pilot = AutoPilot::new();
        let command = pilot.next_command(&view(Vitals::new(15, 3, 5), &[(5, 1), (5, 1)], false));
        assert_eq!(command, BattleCommand::Fire);
    }

    #[test]
    fn test_heals_when_wounded() {
        let mut pilot = AutoPilot::new();
        let mut player = Vitals::new(15, 3, 5);
        player.take_damage(10);
        let command = pilot.next_command(&view(player, &[(5, 1)], false));
        assert_eq!(command, BattleCommand::Heal);
    }

    #[test]
    fn test_flees_hopeless_fight_but_not_the_final_one() {
        let mut pilot = AutoPilot::new();
        let player = Vitals::new(15, 3, 5);
        assert_eq!(
            pilot.next_command(&view(player, &[(60, 7)], false)),
            BattleCommand::Flee
        );
        assert_eq!(
            pilot.next_command(&view(player, &[(60, 7)], true)),
            BattleCommand::Slash
        );
    }
}
