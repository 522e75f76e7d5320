//! Digital Totem core
//!
//! Pure domain model for a tribe of habit trackers. Every member keeps five
//! daily habits; missed habits on past days accrue a shared "visit fund",
//! and the day's completions drive the totem's mood.
//!
//! Nothing here reads the clock or touches the network. Callers pass "now"
//! (or an already resolved [`DayKey`]) so every function stays deterministic.
//!
//! # Modules
//!
//! - **day**: effective-day resolution under day-end offsets and timezones
//! - **member**: members, habits, day logs and per-day text overrides
//! - **ledger**: visit fund and streak arithmetic
//! - **mood**: member and tribe mood
//! - **stats**: fund goal progress and monthly reports

mod day;
mod error;
mod ledger;
mod member;
mod mood;
mod stats;

pub use day::{day_key, local_hour, parse_timezone, DayKey, MonthKey, MAX_DAY_END_OFFSET};
pub use error::{Error, Result};
pub use ledger::{
    completed, day_penalty, is_complete, streak, visit_fund, PENALTY_PER_MISSED_HABIT,
    STREAK_LOOKBACK_DAYS,
};
pub use member::{DayLog, Habit, Member, MemberId, Settings, EMPTY_DAY, HABITS_PER_DAY};
pub use mood::{tribe_mood, Mood};
pub use stats::{monthly_report, tribe_fund, FundGoal, MemberMonth, MonthlyReport};
