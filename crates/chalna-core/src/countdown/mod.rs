mod engine;
mod remaining;

pub use engine::{test_mode_deadline, CountdownEngine, DeadlineOverride};
pub use remaining::{compute_remaining, Countdown, RemainingTime};
