//! Step synchronization: the counters and the shared gate

pub mod clock;
pub mod gate;

pub use clock::{Phase, StepClock};
pub use gate::{PhaseSignal, SyncGate};
