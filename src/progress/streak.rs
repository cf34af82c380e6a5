//! Consecutive-day streak arithmetic.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Streak snapshot.
///
/// `current_streak` is zero only before the first recorded activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
  pub last_activity_date: Option<NaiveDate>,
  pub current_streak: u32,
  /// Maintained by the caller, see [`super::ProgressTracker`]
  pub total_active_days: u32,
}

/// Apply one activity to a streak. Pure; calendar-day granularity.
///
/// A date earlier than the last recorded one (clock skew, replayed events)
/// counts as a same-day repeat and never shortens the streak.
pub fn update(state: StreakState, activity_date: NaiveDate) -> StreakState {
  let Some(last) = state.last_activity_date else {
    return StreakState {
      last_activity_date: Some(activity_date),
      current_streak: 1,
      ..state
    };
  };

  let gap_days = (activity_date - last).num_days();
  let current_streak = match gap_days {
    1 => state.current_streak.max(1).saturating_add(1),
    g if g >= 2 => 1,
    // same day or out of order
    _ => state.current_streak.max(1),
  };

  StreakState {
    last_activity_date: Some(last.max(activity_date)),
    current_streak,
    total_active_days: state.total_active_days,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
  }

  fn state(last: &str, streak: u32) -> StreakState {
    StreakState {
      last_activity_date: Some(day(last)),
      current_streak: streak,
      total_active_days: streak,
    }
  }

  #[test]
  fn test_first_activity() {
    let next = update(StreakState::default(), day("2024-03-10"));
    assert_eq!(next.current_streak, 1);
    assert_eq!(next.last_activity_date, Some(day("2024-03-10")));
  }

  #[test]
  fn test_consecutive_day_extends() {
    let next = update(state("2024-03-09", 4), day("2024-03-10"));
    assert_eq!(next.current_streak, 5);
    assert_eq!(next.last_activity_date, Some(day("2024-03-10")));
  }

  #[test]
  fn test_gap_resets() {
    let next = update(state("2024-03-07", 7), day("2024-03-10"));
    assert_eq!(next.current_streak, 1);
  }

  #[test]
  fn test_same_day_unchanged() {
    let next = update(state("2024-03-10", 3), day("2024-03-10"));
    assert_eq!(next.current_streak, 3);
    assert_eq!(next.last_activity_date, Some(day("2024-03-10")));
  }

  #[test]
  fn test_out_of_order_does_not_regress() {
    let next = update(state("2024-03-10", 6), day("2024-03-01"));
    assert_eq!(next.current_streak, 6);
    assert_eq!(next.last_activity_date, Some(day("2024-03-10")));
  }

  #[test]
  fn test_month_and_year_boundaries() {
    assert_eq!(update(state("2024-02-29", 2), day("2024-03-01")).current_streak, 3);
    assert_eq!(update(state("2023-12-31", 9), day("2024-01-01")).current_streak, 10);
  }

  #[test]
  fn test_total_is_left_to_caller() {
    let next = update(state("2024-03-09", 4), day("2024-03-10"));
    assert_eq!(next.total_active_days, 4);
  }
}
