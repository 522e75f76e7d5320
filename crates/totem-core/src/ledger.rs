//! Visit fund and streak arithmetic.
//!
//! Both are derived from a member's history on demand and never stored as
//! independent state. The visit fund charges [`PENALTY_PER_MISSED_HABIT`]
//! for every habit left undone on a day strictly before today; today is
//! always in progress and never charged.

use crate::day::DayKey;
use crate::member::{DayLog, HABITS_PER_DAY};
use std::collections::BTreeMap;

/// Units added to the visit fund for each missed habit.
pub const PENALTY_PER_MISSED_HABIT: u32 = 10;

/// How far back a streak is followed.
pub const STREAK_LOOKBACK_DAYS: u32 = 365;

/// Number of habits done in a day's log.
pub fn completed(log: &DayLog) -> usize {
    log.iter().filter(|done| **done).count()
}

/// Whether every habit was done.
pub fn is_complete(log: &DayLog) -> bool {
    log.iter().all(|done| *done)
}

/// Penalty for a single day: 0 when complete, up to 50 when nothing was done.
pub fn day_penalty(log: &DayLog) -> u32 {
    let missed = HABITS_PER_DAY - completed(log);
    missed as u32 * PENALTY_PER_MISSED_HABIT
}

/// Total penalty over every recorded day strictly before `today`.
pub fn visit_fund(history: &BTreeMap<DayKey, DayLog>, today: DayKey) -> u32 {
    history.range(..today).map(|(_, log)| day_penalty(log)).sum()
}

/// Consecutive fully complete days, walking back from `today`.
///
/// A missing or incomplete log ends the streak, except on `today` itself,
/// which is skipped while still in progress.
pub fn streak(history: &BTreeMap<DayKey, DayLog>, today: DayKey) -> u32 {
    let mut streak = 0;
    let mut day = Some(today);

    for offset in 0..STREAK_LOOKBACK_DAYS {
        let Some(current) = day else { break };
        day = current.pred();

        match history.get(&current) {
            Some(log) if is_complete(log) => streak += 1,
            _ if offset == 0 => continue,
            _ => break,
        }
    }

    streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::EMPTY_DAY;

    const T: bool = true;
    const F: bool = false;

    fn day(s: &str) -> DayKey {
        s.parse().unwrap()
    }

    #[test]
    fn per_habit_penalty() {
        assert_eq!(day_penalty(&[T; 5]), 0);
        assert_eq!(day_penalty(&[T, F, T, T, T]), 10);
        assert_eq!(day_penalty(&EMPTY_DAY), 50);
    }

    #[test]
    fn fund_counts_only_days_before_today() {
        let mut history = BTreeMap::new();
        history.insert(day("2024-05-01"), [T, T, T, T, T]);
        history.insert(day("2024-05-02"), [T, F, F, F, F]);
        assert_eq!(visit_fund(&history, day("2024-05-03")), 40);

        // Today is exempt even when empty.
        history.insert(day("2024-05-03"), EMPTY_DAY);
        assert_eq!(visit_fund(&history, day("2024-05-03")), 40);

        // Future entries are ignored as well.
        history.insert(day("2024-05-09"), EMPTY_DAY);
        assert_eq!(visit_fund(&history, day("2024-05-03")), 40);
    }

    #[test]
    fn fund_is_idempotent() {
        let mut history = BTreeMap::new();
        history.insert(day("2024-05-01"), [F, F, T, T, T]);
        let today = day("2024-05-02");
        assert_eq!(visit_fund(&history, today), visit_fund(&history, today));
    }

    #[test]
    fn streak_skips_empty_today() {
        let mut history = BTreeMap::new();
        history.insert(day("2024-05-06"), [T; 5]);
        history.insert(day("2024-05-07"), [T; 5]);
        history.insert(day("2024-05-08"), [T; 5]);
        history.insert(day("2024-05-05"), [T, T, F, T, T]);

        assert_eq!(streak(&history, day("2024-05-09")), 3);
    }

    #[test]
    fn streak_skips_incomplete_today() {
        let mut history = BTreeMap::new();
        history.insert(day("2024-05-08"), [T; 5]);
        history.insert(day("2024-05-09"), [T, F, F, F, F]);
        assert_eq!(streak(&history, day("2024-05-09")), 1);
    }

    #[test]
    fn streak_counts_complete_today() {
        let mut history = BTreeMap::new();
        history.insert(day("2024-05-08"), [T; 5]);
        history.insert(day("2024-05-09"), [T; 5]);
        assert_eq!(streak(&history, day("2024-05-09")), 2);
    }

    #[test]
    fn gap_breaks_streak() {
        let mut history = BTreeMap::new();
        history.insert(day("2024-05-09"), [T; 5]);
        history.insert(day("2024-05-07"), [T; 5]);
        assert_eq!(streak(&history, day("2024-05-09")), 1);
    }

    #[test]
    fn streak_is_capped_by_lookback() {
        let today = day("2024-12-31");
        let history: BTreeMap<_, _> = (0..400)
            .map(|i| (today.days_before(i).unwrap(), [T; 5]))
            .collect();
        assert_eq!(streak(&history, today), STREAK_LOOKBACK_DAYS);
    }
}
