//! Per-step decisions fed to the orchestrator

use serde::Serialize;

use crate::core::error::Result;
use crate::core::types::{Position, Step, Vitals};
use crate::entity::enemy::EnemySnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepDecision {
    /// Advance the world and march one step
    Advance,
    /// Advance the world while the player holds position
    Wait,
    Quit,
}

/// What a step input sees before deciding
#[derive(Debug, Clone, Serialize)]
pub struct StepView {
    pub step: Step,
    pub position: Position,
    pub max_steps: Position,
    pub vitals: Vitals,
    pub level: u32,
    pub gold: u32,
    pub roster: Vec<EnemySnapshot>,
}

pub trait StepInput {
    fn decide(&mut self, view: &StepView) -> Result<StepDecision>;
}

/// Always advances, optionally quitting after a fixed number of steps
#[derive(Debug, Clone, Default)]
pub struct AutoAdvance {
    limit: Option<Step>,
}

impl AutoAdvance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: Step) -> Self {
        Self { limit: Some(limit) }
    }
}

impl StepInput for AutoAdvance {
    fn decide(&mut self, view: &StepView) -> Result<StepDecision> {
        match self.limit {
            Some(limit) if view.step >= limit => Ok(StepDecision::Quit),
            _ => Ok(StepDecision::Advance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(step: Step) -> StepView {
        StepView {
            step,
            position: 0,
            max_steps: 20,
            vitals: Vitals::new(15, 3, 5),
            level: 1,
            gold: 0,
            roster: Vec::new(),
        }
    }

    #[test]
    fn test_auto_advance_quits_at_limit() {
        let mut input = AutoAdvance::with_limit(3);
        assert_eq!(input.decide(&view(2)).unwrap(), StepDecision::Advance);
        assert_eq!(input.decide(&view(3)).unwrap(), StepDecision::Quit);
        assert_eq!(AutoAdvance::new().decide(&view(99)).unwrap(), StepDecision::Advance);
    }
}
