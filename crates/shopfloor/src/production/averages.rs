use super::aggregation::DayAggregate;
use serde::Serialize;

/// Gross and pure daily averages, expressed as percentages of the target.
///
/// `avg_general` averages every day present. `avg_productive` only averages
/// pure days, so days mixing priced and unrated work stay out of the figure
/// used for incentive settlement. Neither value is clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProductivityAverages {
    pub avg_general: f64,
    pub avg_productive: f64,
    pub total_days: usize,
    pub pure_days: usize,
    pub mixed_days: usize,
}

impl ProductivityAverages {
    pub const fn zero() -> Self {
        Self {
            avg_general: 0.0,
            avg_productive: 0.0,
            total_days: 0,
            pure_days: 0,
            mixed_days: 0,
        }
    }
}

pub fn compute_averages(days: &[DayAggregate], target: f64) -> ProductivityAverages {
    if days.is_empty() {
        return ProductivityAverages::zero();
    }

    let total_points: f64 = days.iter().map(|day| day.points).sum();
    let general_mean = total_points / days.len() as f64;

    let (pure_points, pure_days) = days
        .iter()
        .filter(|day| day.is_pure())
        .fold((0.0, 0usize), |(sum, count), day| (sum + day.points, count + 1));
    let productive_mean = if pure_days > 0 {
        pure_points / pure_days as f64
    } else {
        0.0
    };

    ProductivityAverages {
        avg_general: efficiency_pct(general_mean, target),
        avg_productive: efficiency_pct(productive_mean, target),
        total_days: days.len(),
        pure_days,
        mixed_days: days.iter().filter(|day| day.has_unrated).count(),
    }
}

/// `points` as a percentage of `target`; zero when the target is unusable.
pub fn efficiency_pct(points: f64, target: f64) -> f64 {
    if target > 0.0 && target.is_finite() {
        points / target * 100.0
    } else {
        0.0
    }
}
