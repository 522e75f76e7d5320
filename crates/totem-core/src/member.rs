//! Tribe member model.

use crate::day::{day_key, parse_timezone, DayKey, MAX_DAY_END_OFFSET};
use crate::error::{Error, Result};
use crate::ledger;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of habits every member tracks.
pub const HABITS_PER_DAY: usize = 5;

/// Completion flags for one day, indexed like [`Member::habits`].
pub type DayLog = [bool; HABITS_PER_DAY];

/// A day with nothing done yet.
pub const EMPTY_DAY: DayLog = [false; HABITS_PER_DAY];

/// Member identifiers are stable strings chosen at creation.
pub type MemberId = String;

/// Length of the random suffix appended to generated member ids.
const ID_SUFFIX_LEN: usize = 9;

/// One tracked habit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Habit {
    pub id: String,
    pub text: String,
}

/// Per-member preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Hours after midnight at which the member's day rolls over.
    #[serde(default)]
    pub day_end_offset: u8,

    /// IANA timezone used to read the calendar date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl Settings {
    /// Reject offsets above [`MAX_DAY_END_OFFSET`] and unknown timezones.
    pub fn validate(&self) -> Result<()> {
        if self.day_end_offset > MAX_DAY_END_OFFSET {
            return Err(Error::InvalidInput(format!(
                "day end offset {} exceeds {} hours",
                self.day_end_offset, MAX_DAY_END_OFFSET
            )));
        }
        if let Some(tz) = &self.timezone {
            parse_timezone(tz)?;
        }
        Ok(())
    }

    /// The effective day at `now` under these settings.
    pub fn today(&self, now: DateTime<Utc>) -> DayKey {
        day_key(now, self.day_end_offset, self.timezone.as_deref())
    }
}

/// A member of a tribe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Immutable identifier (name slug plus random suffix)
    pub id: MemberId,

    /// Display name
    pub name: String,

    /// Exactly five habits
    pub habits: [Habit; HABITS_PER_DAY],

    /// Completion log keyed by day
    #[serde(default)]
    pub history: BTreeMap<DayKey, DayLog>,

    /// Accumulated penalty, always derivable from `history`
    #[serde(default)]
    pub visit_fund: u32,

    #[serde(default)]
    pub settings: Settings,

    /// Per-day habit text substitutions
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<DayKey, BTreeMap<usize, String>>,

    /// Per-day penalty figures as recorded by the remote sheet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_funds: Option<BTreeMap<DayKey, u32>>,
}

impl Member {
    /// Create a member with a freshly generated id.
    ///
    /// The name and every habit must contain something other than whitespace.
    pub fn new(name: &str, habits: [String; HABITS_PER_DAY]) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("member name is empty".into()));
        }
        if let Some(i) = habits.iter().position(|h| h.trim().is_empty()) {
            return Err(Error::InvalidInput(format!("habit {} is empty", i + 1)));
        }

        Ok(Self::with_id(Self::generate_id(name), name, habits))
    }

    /// Create a member with a known id and no history.
    pub fn with_id(id: impl Into<MemberId>, name: &str, habits: [String; HABITS_PER_DAY]) -> Self {
        let mut index = 0;
        let habits = habits.map(|text| {
            let habit = Habit {
                id: index.to_string(),
                text: text.trim().to_string(),
            };
            index += 1;
            habit
        });

        Self {
            id: id.into(),
            name: name.to_string(),
            habits,
            history: BTreeMap::new(),
            visit_fund: 0,
            settings: Settings::default(),
            overrides: BTreeMap::new(),
            history_funds: None,
        }
    }

    /// Generate an id: lower-cased name with whitespace runs turned into `-`,
    /// followed by a random base-36 suffix.
    pub fn generate_id(name: &str) -> MemberId {
        const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

        let slug = name
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");

        let mut rng = rand::thread_rng();
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();

        format!("{}-{}", slug, suffix)
    }

    /// The effective day at `now` under this member's settings.
    pub fn today(&self, now: DateTime<Utc>) -> DayKey {
        self.settings.today(now)
    }

    /// The log for `date`, all-false if nothing was recorded.
    pub fn log(&self, date: DayKey) -> DayLog {
        self.history.get(&date).copied().unwrap_or(EMPTY_DAY)
    }

    /// Number of habits done on `date`.
    pub fn completed_on(&self, date: DayKey) -> usize {
        ledger::completed(&self.log(date))
    }

    /// Flip one habit on one day and return its new state.
    pub fn toggle(&mut self, date: DayKey, index: usize) -> Result<bool> {
        check_index(index)?;
        let log = self.history.entry(date).or_insert(EMPTY_DAY);
        log[index] = !log[index];
        Ok(log[index])
    }

    /// Change the canonical text of a habit.
    pub fn rename_habit(&mut self, index: usize, text: &str) -> Result<()> {
        check_index(index)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("habit text is empty".into()));
        }
        self.habits[index].text = text.to_string();
        Ok(())
    }

    /// Substitute a habit's text for a single day.
    pub fn set_override(&mut self, date: DayKey, index: usize, text: &str) -> Result<()> {
        check_index(index)?;
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("override text is empty".into()));
        }
        self.overrides
            .entry(date)
            .or_default()
            .insert(index, text.trim().to_string());
        Ok(())
    }

    /// Drop a day's substitution. Returns whether one existed.
    pub fn clear_override(&mut self, date: DayKey, index: usize) -> Result<bool> {
        check_index(index)?;
        let Some(day) = self.overrides.get_mut(&date) else {
            return Ok(false);
        };
        let removed = day.remove(&index).is_some();
        if day.is_empty() {
            self.overrides.remove(&date);
        }
        Ok(removed)
    }

    /// Text shown for habit `index` on `date`: the override if any, else the canonical text.
    pub fn habit_text(&self, date: DayKey, index: usize) -> Option<&str> {
        let canonical = self.habits.get(index)?;
        let text = self
            .overrides
            .get(&date)
            .and_then(|day| day.get(&index))
            .unwrap_or(&canonical.text);
        Some(text.as_str())
    }

    /// All five effective habit texts for `date`.
    pub fn habit_texts_on(&self, date: DayKey) -> [String; HABITS_PER_DAY] {
        let mut index = 0;
        self.habits.clone().map(|habit| {
            let text = self
                .overrides
                .get(&date)
                .and_then(|day| day.get(&index))
                .cloned()
                .unwrap_or(habit.text);
            index += 1;
            text
        })
    }

    /// Recompute `visit_fund` from history. Returns whether the value changed.
    pub fn recompute_visit_fund(&mut self, today: DayKey) -> bool {
        let fund = ledger::visit_fund(&self.history, today);
        if fund == self.visit_fund {
            return false;
        }
        self.visit_fund = fund;
        true
    }

    /// Consecutive fully complete days ending at `today`.
    pub fn streak(&self, today: DayKey) -> u32 {
        ledger::streak(&self.history, today)
    }
}

fn check_index(index: usize) -> Result<()> {
    if index < HABITS_PER_DAY {
        Ok(())
    } else {
        Err(Error::HabitIndex(index))
    }
}
