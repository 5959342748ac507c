use super::domain::{PointRule, Sector};

/// Returns the first rule whose triple matches exactly, if any.
pub fn find_rule<'a>(
    rules: &'a [PointRule],
    sector: Sector,
    model: &str,
    operation: &str,
) -> Option<&'a PointRule> {
    rules
        .iter()
        .find(|rule| rule.matches(sector, model, operation))
}

/// Prices `quantity` units of work. Unmatched work is worth zero points.
pub fn compute_points(
    rules: &[PointRule],
    sector: Sector,
    model: &str,
    operation: &str,
    quantity: u32,
) -> f64 {
    match find_rule(rules, sector, model, operation) {
        Some(rule) => rule.points_per_unit * f64::from(quantity),
        None => 0.0,
    }
}
