use super::aggregation::{aggregate_by_day, recent_days, scope_logs, DayAggregate, DayOrder, LogWindow};
use super::averages::{compute_averages, efficiency_pct, ProductivityAverages};
use super::domain::{ProductionLogEntry, Sector};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayEfficiencyView {
    pub date: NaiveDate,
    pub points: f64,
    pub units: u64,
    pub entries: usize,
    pub has_unrated: bool,
    pub pure: bool,
    pub efficiency_pct: f64,
}

impl DayEfficiencyView {
    pub fn from_day(day: &DayAggregate, target: f64) -> Self {
        Self {
            date: day.date,
            points: day.points,
            units: day.units,
            entries: day.entries,
            has_unrated: day.has_unrated,
            pure: day.is_pure(),
            efficiency_pct: efficiency_pct(day.points, target),
        }
    }
}

/// Chronological productivity report for one operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorReport {
    pub operator: String,
    pub window: LogWindow,
    pub target: f64,
    pub total_points: f64,
    pub days: Vec<DayEfficiencyView>,
    pub averages: ProductivityAverages,
}

impl OperatorReport {
    pub fn build(
        operator: &str,
        window: LogWindow,
        target: f64,
        logs: &[ProductionLogEntry],
    ) -> Self {
        let days = aggregate_by_day(scope_logs(logs, operator, window), DayOrder::Ascending);
        let averages = compute_averages(&days, target);
        let total_points = days.iter().map(|day| day.points).sum();

        Self {
            operator: operator.to_string(),
            window,
            target,
            total_points,
            days: days
                .iter()
                .map(|day| DayEfficiencyView::from_day(day, target))
                .collect(),
            averages,
        }
    }
}

/// Rolling history for one operator, most recent day first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorHistory {
    pub operator: String,
    pub target: f64,
    pub days: Vec<DayEfficiencyView>,
    pub averages: ProductivityAverages,
}

impl OperatorHistory {
    pub fn build(operator: &str, target: f64, limit: usize, logs: &[ProductionLogEntry]) -> Self {
        let days = recent_days(scope_logs(logs, operator, LogWindow::Unrestricted), limit);
        let averages = compute_averages(&days, target);

        Self {
            operator: operator.to_string(),
            target,
            days: days
                .iter()
                .map(|day| DayEfficiencyView::from_day(day, target))
                .collect(),
            averages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRow {
    pub operator: String,
    pub sectors: Vec<Sector>,
    pub points: f64,
    pub units: u64,
    pub has_unrated: bool,
    pub efficiency_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorTotal {
    pub sector: Sector,
    pub sector_label: &'static str,
    pub points: f64,
    pub units: u64,
    pub operators: usize,
}

/// Manager view of one production day across the floor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyDashboard {
    pub date: NaiveDate,
    pub target: f64,
    pub total_points: f64,
    pub operators: Vec<DashboardRow>,
    pub sectors: Vec<SectorTotal>,
}

#[derive(Default)]
struct OperatorTally {
    sectors: BTreeSet<Sector>,
    points: f64,
    units: u64,
    has_unrated: bool,
}

#[derive(Default)]
struct SectorTally {
    points: f64,
    units: u64,
    operators: BTreeSet<String>,
}

impl DailyDashboard {
    pub fn build(date: NaiveDate, target: f64, logs: &[ProductionLogEntry]) -> Self {
        let mut by_operator: BTreeMap<&str, OperatorTally> = BTreeMap::new();
        let mut by_sector: HashMap<Sector, SectorTally> = HashMap::new();

        for entry in logs.iter().filter(|entry| entry.work_date() == date) {
            let tally = by_operator.entry(entry.operator.as_str()).or_default();
            tally.sectors.insert(entry.sector);
            tally.points += entry.total_points;
            tally.units += u64::from(entry.quantity);
            if entry.is_unrated() {
                tally.has_unrated = true;
            }

            let sector = by_sector.entry(entry.sector).or_default();
            sector.points += entry.total_points;
            sector.units += u64::from(entry.quantity);
            sector.operators.insert(entry.operator.clone());
        }

        let mut operators: Vec<DashboardRow> = by_operator
            .into_iter()
            .map(|(operator, tally)| DashboardRow {
                operator: operator.to_string(),
                sectors: tally.sectors.into_iter().collect(),
                points: tally.points,
                units: tally.units,
                has_unrated: tally.has_unrated,
                efficiency_pct: efficiency_pct(tally.points, target),
            })
            .collect();
        // Stable sort keeps the alphabetical order among equal totals.
        operators.sort_by(|a, b| b.points.total_cmp(&a.points));

        let sectors: Vec<SectorTotal> = Sector::ordered()
            .into_iter()
            .filter_map(|sector| {
                by_sector.get(&sector).map(|tally| SectorTotal {
                    sector,
                    sector_label: sector.label(),
                    points: tally.points,
                    units: tally.units,
                    operators: tally.operators.len(),
                })
            })
            .collect();

        let total_points = operators.iter().map(|row| row.points).sum();

        Self {
            date,
            target,
            total_points,
            operators,
            sectors,
        }
    }
}
