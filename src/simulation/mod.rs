//! World-step orchestration: the step loop, the roster and scripted encounters

pub mod input;
pub mod orchestrator;
pub mod roster;
pub mod scheduler;

pub use input::{AutoAdvance, StepDecision, StepInput, StepView};
pub use orchestrator::{Orchestrator, RunOutcome, RunSummary};
pub use roster::Roster;
pub use scheduler::StepEventScheduler;
