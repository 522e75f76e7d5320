//! Shared visit fund totals and monthly breakdowns.

use crate::day::MonthKey;
use crate::ledger;
use crate::member::{Member, MemberId, HABITS_PER_DAY};
use serde::Serialize;

/// What the tribe is saving towards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundGoal {
    pub name: String,
    pub amount: u32,
}

impl Default for FundGoal {
    fn default() -> Self {
        Self {
            name: "Flight Ticket".to_string(),
            amount: 8000,
        }
    }
}

impl FundGoal {
    /// Percentage of the goal reached by `total`, capped at 100.
    pub fn progress(&self, total: u32) -> f64 {
        if self.amount == 0 {
            return 100.0;
        }
        (f64::from(total) / f64::from(self.amount) * 100.0).min(100.0)
    }
}

/// Sum of every member's visit fund.
pub fn tribe_fund<'a>(members: impl IntoIterator<Item = &'a Member>) -> u32 {
    members.into_iter().map(|m| m.visit_fund).sum()
}

/// One member's figures for a month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberMonth {
    pub member_id: MemberId,
    pub name: String,
    pub days_tracked: usize,
    pub completed_habits: usize,
    pub total_penalty: u32,
    /// Percentage of tracked habits completed
    pub completion_rate: f64,
    /// Average habits completed per tracked day
    pub avg_daily: f64,
}

/// Monthly leaderboard, highest contributor first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyReport {
    pub month: String,
    pub members: Vec<MemberMonth>,
    pub grand_total: u32,
}

/// Build the report for `month`.
///
/// Each tracked day contributes the penalty recorded by the sheet when there
/// is one, and the computed per-habit penalty otherwise.
pub fn monthly_report<'a>(
    members: impl IntoIterator<Item = &'a Member>,
    month: MonthKey,
) -> MonthlyReport {
    let mut rows: Vec<MemberMonth> = members
        .into_iter()
        .map(|member| member_month(member, month))
        .collect();

    rows.sort_by(|a, b| {
        b.total_penalty
            .cmp(&a.total_penalty)
            .then_with(|| a.name.cmp(&b.name))
    });
    let grand_total = rows.iter().map(|r| r.total_penalty).sum();

    MonthlyReport {
        month: month.to_string(),
        members: rows,
        grand_total,
    }
}

fn member_month(member: &Member, month: MonthKey) -> MemberMonth {
    let mut days_tracked = 0;
    let mut completed_habits = 0;
    let mut total_penalty = 0;

    for (day, log) in member.history.iter().filter(|(day, _)| month.contains(**day)) {
        let recorded = member
            .history_funds
            .as_ref()
            .and_then(|funds| funds.get(day).copied());

        days_tracked += 1;
        completed_habits += ledger::completed(log);
        total_penalty += recorded.unwrap_or_else(|| ledger::day_penalty(log));
    }

    let (completion_rate, avg_daily) = if days_tracked > 0 {
        let total_habits = (days_tracked * HABITS_PER_DAY) as f64;
        (
            completed_habits as f64 / total_habits * 100.0,
            completed_habits as f64 / days_tracked as f64,
        )
    } else {
        (0.0, 0.0)
    };

    MemberMonth {
        member_id: member.id.clone(),
        name: member.name.clone(),
        days_tracked,
        completed_habits,
        total_penalty,
        completion_rate,
        avg_daily,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::day::DayKey;
    use std::collections::BTreeMap;

    fn day(s: &str) -> DayKey {
        s.parse().unwrap()
    }

    fn member(id: &str, days: &[(&str, usize)]) -> Member {
        let mut m = Member::with_id(id, id, ["a", "b", "c", "d", "e"].map(String::from));
        for (d, done) in days {
            let mut log = [false; HABITS_PER_DAY];
            log.iter_mut().take(*done).for_each(|slot| *slot = true);
            m.history.insert(day(d), log);
        }
        m
    }

    #[test]
    fn goal_progress_caps() {
        let goal = FundGoal::default();
        assert_eq!(goal.progress(0), 0.0);
        assert_eq!(goal.progress(4000), 50.0);
        assert_eq!(goal.progress(20_000), 100.0);
    }

    #[test]
    fn tribe_fund_sums_members() {
        let mut a = member("a", &[]);
        let mut b = member("b", &[]);
        a.visit_fund = 150;
        b.visit_fund = 300;
        assert_eq!(tribe_fund([&a, &b]), 450);
    }

    #[test]
    fn monthly_report_filters_and_sorts() {
        let alice = member("alice", &[("2024-05-01", 5), ("2024-05-02", 3), ("2024-04-30", 0)]);
        let bob = member("bob", &[("2024-05-01", 1)]);
        let month: MonthKey = "2024-05".parse().unwrap();

        let report = monthly_report([&alice, &bob], month);
        assert_eq!(report.month, "2024-05");
        assert_eq!(report.grand_total, 20 + 40);

        let top = &report.members[0];
        assert_eq!(top.member_id, "bob");
        assert_eq!(top.total_penalty, 40);

        let second = &report.members[1];
        assert_eq!(second.days_tracked, 2);
        assert_eq!(second.completed_habits, 8);
        assert_eq!(second.completion_rate, 80.0);
        assert_eq!(second.avg_daily, 4.0);
    }

    #[test]
    fn recorded_funds_take_priority() {
        let mut bob = member("bob", &[("2024-05-01", 1), ("2024-05-02", 1)]);
        bob.history_funds = Some(BTreeMap::from([(day("2024-05-01"), 50)]));

        let report = monthly_report([&bob], "2024-05".parse().unwrap());
        assert_eq!(report.members[0].total_penalty, 50 + 40);
    }

    #[test]
    fn empty_month() {
        let bob = member("bob", &[("2024-04-01", 1)]);
        let report = monthly_report([&bob], "2024-05".parse().unwrap());
        assert_eq!(report.members[0].days_tracked, 0);
        assert_eq!(report.members[0].completion_rate, 0.0);
        assert_eq!(report.grand_total, 0);
    }
}
