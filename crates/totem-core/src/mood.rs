//! Totem mood derived from the day's completions.

use crate::day::DayKey;
use crate::member::{Member, HABITS_PER_DAY};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mood of the totem, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Depressed,
    Hungry,
    Neutral,
    Happy,
    WindingUp,
    Radiant,
}

impl Mood {
    /// Map habits completed today (0..=5) to a mood. Counts above five are radiant.
    pub fn from_completed(completed: usize) -> Self {
        match completed {
            0 => Mood::Depressed,
            1 => Mood::Hungry,
            2 => Mood::Neutral,
            3 => Mood::Happy,
            4 => Mood::WindingUp,
            _ => Mood::Radiant,
        }
    }

    /// Displayed level, never below 1.
    pub fn level(completed: usize) -> usize {
        completed.clamp(1, HABITS_PER_DAY)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mood::Depressed => "Depressed",
            Mood::Hungry => "Hungry",
            Mood::Neutral => "Neutral",
            Mood::Happy => "Happy",
            Mood::WindingUp => "Winding Up",
            Mood::Radiant => "Radiant",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Members with fewer completions than this after noon make the tribe hungry.
const HUNGRY_BELOW: usize = 2;

/// Mood of the shared totem.
///
/// Radiant when every member finished every habit on `today`; hungry when
/// it is past noon and anyone is below two completions; neutral otherwise.
pub fn tribe_mood<'a>(
    members: impl IntoIterator<Item = &'a Member>,
    today: DayKey,
    past_noon: bool,
) -> Mood {
    let counts: Vec<usize> = members
        .into_iter()
        .map(|m| m.completed_on(today))
        .collect();

    if counts.is_empty() {
        return Mood::Neutral;
    }
    if counts.iter().all(|&c| c == HABITS_PER_DAY) {
        return Mood::Radiant;
    }
    if past_noon && counts.iter().any(|&c| c < HUNGRY_BELOW) {
        return Mood::Hungry;
    }
    Mood::Neutral
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str, today: DayKey, done: usize) -> Member {
        let mut m = Member::with_id(id, id, ["a", "b", "c", "d", "e"].map(String::from));
        for i in 0..done {
            m.toggle(today, i).unwrap();
        }
        m
    }

    #[test]
    fn moods_are_monotonic() {
        let moods: Vec<Mood> = (0..=HABITS_PER_DAY).map(Mood::from_completed).collect();
        assert!(moods.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(moods[0], Mood::Depressed);
        assert_eq!(moods[5], Mood::Radiant);
        assert_eq!(Mood::from_completed(9), Mood::Radiant);
    }

    #[test]
    fn level_floor_is_one() {
        assert_eq!(Mood::level(0), 1);
        assert_eq!(Mood::level(3), 3);
        assert_eq!(Mood::WindingUp.to_string(), "Winding Up");
    }

    #[test]
    fn tribe_mood_rules() {
        let today: DayKey = "2024-05-01".parse().unwrap();
        let done = member("a", today, 5);
        let half = member("b", today, 3);
        let idle = member("c", today, 1);

        assert_eq!(tribe_mood([&done], today, true), Mood::Radiant);
        assert_eq!(tribe_mood([&done, &half], today, true), Mood::Neutral);
        assert_eq!(tribe_mood([&done, &idle], today, false), Mood::Neutral);
        assert_eq!(tribe_mood([&done, &idle], today, true), Mood::Hungry);
        assert_eq!(tribe_mood(std::iter::empty(), today, true), Mood::Neutral);
    }
}
