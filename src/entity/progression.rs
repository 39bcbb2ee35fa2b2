//! Player progression: experience, levels, gold and the battle record

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::battle::{BattleOutcome, BattleReport};
use crate::core::config::PlayerConfig;
use crate::core::types::Vitals;

/// Tally of battles fought and creatures felled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRecord {
    pub won: u32,
    pub lost: u32,
    pub fled: u32,
    /// Names of every defeated combatant, in order
    pub defeated: Vec<String>,
}

/// "Slime #2" and "Slime #3" count as the same kind
fn kind_of(name: &str) -> &str {
    match name.rsplit_once(" #") {
        Some((kind, id)) if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) => kind,
        _ => name,
    }
}

impl BattleRecord {
    pub fn defeated_by_kind(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for name in &self.defeated {
            *counts.entry(kind_of(name).to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Most frequently defeated kind; ties go to the alphabetically first
    pub fn most_defeated(&self) -> Option<(String, usize)> {
        self.defeated_by_kind()
            .into_iter()
            .fold(None, |best, (kind, count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((kind, count)),
            })
    }
}

/// Everything about the player that changes through combat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSheet {
    pub vitals: Vitals,
    pub level: u32,
    pub experience: u32,
    pub next_level: u32,
    pub gold: u32,
    pub record: BattleRecord,
    threshold_growth: u32,
}

impl PlayerSheet {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            vitals: config.vitals(),
            level: 1,
            experience: 0,
            next_level: config.first_level_threshold,
            gold: 0,
            record: BattleRecord::default(),
            threshold_growth: config.level_threshold_growth,
        }
    }

    /// Add experience and apply every level-up it pays for.
    /// Returns the number of levels gained.
    pub fn gain_experience(&mut self, amount: u32) -> u32 {
        if !self.vitals.is_alive() || amount == 0 {
            return 0;
        }
        self.experience += amount;

        let mut gained = 0;
        // A zero threshold would level forever
        while self.next_level > 0 && self.experience >= self.next_level {
            self.experience -= self.next_level;
            self.vitals.max_health += 5 * self.level;
            self.vitals.attack += 2 * self.level;
            self.vitals.stealth += 3 * self.level;
            self.level += 1;
            self.next_level += self.threshold_growth;
            self.vitals.health = self.vitals.max_health;
            gained += 1;

            tracing::info!(
                "LEVEL UP! Now level {} (max health {}, attack {}, stealth {})",
                self.level,
                self.vitals.max_health,
                self.vitals.attack,
                self.vitals.stealth
            );
        }
        gained
    }

    pub fn add_gold(&mut self, amount: u32) {
        if amount > 0 && self.vitals.is_alive() {
            self.gold += amount;
        }
    }

    /// Spend gold if there is enough of it
    pub fn spend_gold(&mut self, amount: u32) -> bool {
        if amount == 0 || amount > self.gold || !self.vitals.is_alive() {
            return false;
        }
        self.gold -= amount;
        true
    }

    /// Heal by a fraction of max health, returning what was restored
    pub fn heal_fraction(&mut self, fraction: f32) -> u32 {
        if !self.vitals.is_alive() {
            return 0;
        }
        let amount = (self.vitals.max_health as f32 * fraction) as u32;
        self.vitals.heal(amount)
    }

    /// Credit the outcome of a finished battle in one step.
    ///
    /// Rewards are paid on victory and on a successful flee (for the foes
    /// that fell before the escape); a defeated player collects nothing.
    pub fn credit(&mut self, report: &BattleReport) {
        self.record.defeated.extend(report.defeated.iter().cloned());
        match report.outcome {
            BattleOutcome::Victory => self.record.won += 1,
            BattleOutcome::Defeat => self.record.lost += 1,
            BattleOutcome::Fled => self.record.fled += 1,
        }
        if report.outcome != BattleOutcome::Defeat {
            self.gain_experience(report.experience);
            self.add_gold(report.gold);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SessionId;

    fn sheet() -> PlayerSheet {
        PlayerSheet::new(&PlayerConfig::default())
    }

    fn report(outcome: BattleOutcome, experience: u32, gold: u32) -> BattleReport {
        BattleReport {
            session: SessionId::new(),
            outcome,
            experience,
            gold,
            defeated: vec!["Slime #1".to_string()],
        }
    }

    #[test]
    fn test_level_up_keeps_remainder() {
        let mut sheet = sheet();
        assert_eq!(sheet.gain_experience(4), 1);
        assert_eq!(sheet.level, 2);
        assert_eq!(sheet.experience, 1);
        assert_eq!(sheet.next_level, 8);
        assert_eq!(sheet.vitals.max_health, 20);
        assert_eq!(sheet.vitals.attack, 5);
        assert_eq!(sheet.vitals.stealth, 8);
        assert_eq!(sheet.vitals.health, 20);
    }

    #[test]
    fn test_multiple_level_ups_in_one_award() {
        let mut sheet = sheet();
        // 3 for level 2, then 8 for level 3
        assert_eq!(sheet.gain_experience(11), 2);
        assert_eq!(sheet.level, 3);
        assert_eq!(sheet.experience, 0);
        // +5 at level 1, +10 at level 2
        assert_eq!(sheet.vitals.max_health, 30);
    }

    #[test]
    fn test_spend_gold_requires_funds() {
        let mut sheet = sheet();
        sheet.add_gold(10);
        assert!(!sheet.spend_gold(11));
        assert!(sheet.spend_gold(4));
        assert_eq!(sheet.gold, 6);
    }

    #[test]
    fn test_heal_fraction_rounds_down() {
        let mut sheet = sheet();
        sheet.vitals.take_damage(10);
        // 30% of 15 is 4.5
        assert_eq!(sheet.heal_fraction(0.3), 4);
        assert_eq!(sheet.vitals.health, 9);
    }

    #[test]
    fn test_credit_victory_pays_rewards() {
        let mut sheet = sheet();
        sheet.credit(&report(BattleOutcome::Victory, 2, 3));
        assert_eq!(sheet.record.won, 1);
        assert_eq!(sheet.gold, 3);
        assert_eq!(sheet.experience, 2);
        assert_eq!(sheet.record.defeated, vec!["Slime #1".to_string()]);
    }

    #[test]
    fn test_credit_defeat_pays_nothing() {
        let mut sheet = sheet();
        sheet.vitals.take_damage(100);
        sheet.credit(&report(BattleOutcome::Defeat, 2, 3));
        assert_eq!(sheet.record.lost, 1);
        assert_eq!(sheet.gold, 0);
        assert_eq!(sheet.experience, 0);
    }

    #[test]
    fn test_most_defeated_groups_numbered_names() {
        let record = BattleRecord {
            defeated: vec![
                "Slime #1".into(),
                "Slime #2".into(),
                "TickiBird".into(),
                "Slime #1".into(),
            ],
            ..BattleRecord::default()
        };
        assert_eq!(record.most_defeated(), Some(("Slime".to_string(), 3)));
        assert_eq!(record.defeated_by_kind().get("TickiBird"), Some(&1));
    }

    #[test]
    fn test_most_defeated_empty() {
        assert_eq!(BattleRecord::default().most_defeated(), None);
    }
}
