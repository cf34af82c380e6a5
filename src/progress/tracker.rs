use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use super::streak::{self, StreakState};

/// Progress collaborator: owns the streak and the set of active days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressTracker {
  state: StreakState,
  active_days: BTreeSet<NaiveDate>,
}

impl ProgressTracker {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn state(&self) -> StreakState {
    self.state
  }

  /// Record activity on a calendar day and return the new streak.
  pub fn record_activity(&mut self, date: NaiveDate) -> StreakState {
    let mut next = streak::update(self.state, date);
    if self.active_days.insert(date) {
      next.total_active_days = next.total_active_days.saturating_add(1);
    }
    debug!(
      %date,
      current_streak = next.current_streak,
      total_active_days = next.total_active_days,
      "record_activity: updated"
    );
    self.state = next;
    next
  }

  /// Record activity at a local timestamp.
  pub fn record_activity_at(&mut self, at: DateTime<Local>) -> StreakState {
    self.record_activity(at.date_naive())
  }
}
