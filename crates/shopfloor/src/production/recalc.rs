use super::domain::{PointRule, ProductionLogEntry};
use super::pricing::compute_points;

/// Stored points closer than this to the re-priced value are left alone.
pub const RECALCULATION_EPSILON: f64 = 0.01;

/// Default chunk size for writing recalculated entries back.
pub const DEFAULT_RECALC_BATCH_SIZE: usize = 400;

fn reprice(entry: &ProductionLogEntry, rules: &[PointRule]) -> Option<f64> {
    let points = compute_points(
        rules,
        entry.sector,
        &entry.model,
        &entry.operation,
        entry.quantity,
    );
    ((points - entry.total_points).abs() > RECALCULATION_EPSILON).then_some(points)
}

/// Re-prices every entry against `rules` in place and returns how many changed.
pub fn recalculate_all(logs: &mut [ProductionLogEntry], rules: &[PointRule]) -> usize {
    let mut modified = 0;
    for entry in logs.iter_mut() {
        if let Some(points) = reprice(entry, rules) {
            entry.total_points = points;
            modified += 1;
        }
    }
    modified
}

/// Re-priced copies of the entries whose stored points are stale.
pub fn pending_updates(logs: &[ProductionLogEntry], rules: &[PointRule]) -> Vec<ProductionLogEntry> {
    logs.iter()
        .filter_map(|entry| {
            reprice(entry, rules).map(|points| ProductionLogEntry {
                total_points: points,
                ..entry.clone()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::production::domain::{LogId, RuleId, Sector};
    use chrono::NaiveDate;

    fn rules(points: f64) -> Vec<PointRule> {
        vec![PointRule {
            id: RuleId("r1".to_string()),
            sector: Sector::Corte,
            model: "Model-X".to_string(),
            operation: "Laser Cut".to_string(),
            points_per_unit: points,
        }]
    }

    fn entry(id: &str, model: &str, quantity: u32, stored: f64) -> ProductionLogEntry {
        ProductionLogEntry {
            id: LogId(id.to_string()),
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 10)
                .and_then(|date| date.and_hms_opt(9, 0, 0))
                .expect("valid timestamp"),
            operator: "A".to_string(),
            sector: Sector::Corte,
            model: model.to_string(),
            operation: "Laser Cut".to_string(),
            quantity,
            total_points: stored,
            order_ref: None,
            comment: None,
        }
    }

    #[test]
    fn second_pass_modifies_nothing() {
        let mut logs = vec![
            entry("a", "Model-X", 10, 0.0),
            entry("b", "Model-X", 4, 20.0),
            entry("c", "Unknown", 3, 9.0),
        ];

        assert_eq!(recalculate_all(&mut logs, &rules(5.0)), 2);
        assert_eq!(logs[0].total_points, 50.0);
        assert_eq!(logs[2].total_points, 0.0);
        assert_eq!(recalculate_all(&mut logs, &rules(5.0)), 0);
    }

    #[test]
    fn differences_within_epsilon_are_ignored() {
        let mut logs = vec![entry("a", "Model-X", 3, 15.005)];
        assert_eq!(recalculate_all(&mut logs, &rules(5.0)), 0);
        assert_eq!(logs[0].total_points, 15.005);
    }

    #[test]
    fn pending_updates_leave_input_untouched() {
        let logs = vec![entry("a", "Model-X", 2, 10.0), entry("b", "Model-X", 2, 0.0)];

        let updates = pending_updates(&logs, &rules(5.0));
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].id, LogId("b".to_string()));
        assert_eq!(updates[0].total_points, 10.0);
        assert_eq!(logs[1].total_points, 0.0);
    }

    #[test]
    fn outcome_does_not_depend_on_log_order() {
        let mut forward = vec![entry("a", "Model-X", 1, 0.0), entry("b", "Unknown", 2, 4.0)];
        let mut backward: Vec<_> = forward.iter().rev().cloned().collect();

        assert_eq!(
            recalculate_all(&mut forward, &rules(7.5)),
            recalculate_all(&mut backward, &rules(7.5))
        );
        backward.reverse();
        assert_eq!(forward, backward);
    }
}
