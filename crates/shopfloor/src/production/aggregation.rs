use super::domain::ProductionLogEntry;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Days shown by the short rolling history.
pub const SHORT_HISTORY_DAYS: usize = 15;
/// Days shown by the long rolling history.
pub const LONG_HISTORY_DAYS: usize = 30;

/// Calendar window used to scope logs before aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum LogWindow {
    Day { date: NaiveDate },
    Month { year: i32, month: u32 },
    Range { from: NaiveDate, to: NaiveDate },
    Unrestricted,
}

impl LogWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        match *self {
            LogWindow::Day { date: day } => date == day,
            LogWindow::Month { year, month } => date.year() == year && date.month() == month,
            LogWindow::Range { from, to } => date >= from && date <= to,
            LogWindow::Unrestricted => true,
        }
    }

    /// Inclusive first and last day, or `None` when the window is unbounded
    /// or names a month that does not exist.
    pub fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        match *self {
            LogWindow::Day { date } => Some((date, date)),
            LogWindow::Month { year, month } => {
                let first = NaiveDate::from_ymd_opt(year, month, 1)?;
                let next = if month == 12 {
                    NaiveDate::from_ymd_opt(year + 1, 1, 1)?
                } else {
                    NaiveDate::from_ymd_opt(year, month + 1, 1)?
                };
                Some((first, next - Duration::days(1)))
            }
            LogWindow::Range { from, to } => Some((from, to)),
            LogWindow::Unrestricted => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayOrder {
    Ascending,
    Descending,
}

/// Work recorded by one operator on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayAggregate {
    pub date: NaiveDate,
    pub points: f64,
    pub has_unrated: bool,
    pub units: u64,
    pub entries: usize,
}

impl DayAggregate {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            points: 0.0,
            has_unrated: false,
            units: 0,
            entries: 0,
        }
    }

    /// A pure day has points and no unrated work mixed in.
    pub fn is_pure(&self) -> bool {
        self.points > 0.0 && !self.has_unrated
    }
}

/// Filters logs down to one operator and one window.
pub fn scope_logs<'a>(
    logs: &'a [ProductionLogEntry],
    operator: &'a str,
    window: LogWindow,
) -> impl Iterator<Item = &'a ProductionLogEntry> + 'a {
    logs.iter()
        .filter(move |entry| entry.operator == operator && window.contains(entry.work_date()))
}

/// Groups logs by the calendar date of their timestamp.
///
/// Days without logs are never produced.
pub fn aggregate_by_day<'a, I>(logs: I, order: DayOrder) -> Vec<DayAggregate>
where
    I: IntoIterator<Item = &'a ProductionLogEntry>,
{
    let mut days: BTreeMap<NaiveDate, DayAggregate> = BTreeMap::new();

    for entry in logs {
        let date = entry.work_date();
        let day = days
            .entry(date)
            .or_insert_with(|| DayAggregate::empty(date));
        day.points += entry.total_points;
        day.units += u64::from(entry.quantity);
        day.entries += 1;
        if entry.is_unrated() {
            day.has_unrated = true;
        }
    }

    match order {
        DayOrder::Ascending => days.into_values().collect(),
        DayOrder::Descending => days.into_values().rev().collect(),
    }
}

/// The `limit` most recent days, most recent first.
pub fn recent_days<'a, I>(logs: I, limit: usize) -> Vec<DayAggregate>
where
    I: IntoIterator<Item = &'a ProductionLogEntry>,
{
    let mut days = aggregate_by_day(logs, DayOrder::Descending);
    days.truncate(limit);
    days
}
