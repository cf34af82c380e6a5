//! Activity streaks for the progress tracker.

pub mod streak;
mod tracker;

pub use streak::{update, StreakState};
pub use tracker::ProgressTracker;
