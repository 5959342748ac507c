use clap::Args;
use serde_json::Value;
use shopfloor::error::AppError;
use shopfloor::production::dates::parse_month;
use shopfloor::production::import::{parse_logs, parse_rules};
use shopfloor::production::migration::{migrate_documents, MigrationReport};
use shopfloor::production::{
    recalculate_all, LogWindow, OperatorReport, PointRule, ProductionLogEntry,
    ProductionServiceError, ProductivityTarget, RuleId,
};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct ReportArgs {
    /// Points matrix CSV (sector,model,operation,points_per_unit)
    #[arg(long)]
    pub(crate) rules: PathBuf,
    /// Production log CSV export
    #[arg(long)]
    pub(crate) logs: PathBuf,
    /// Operator to report on
    #[arg(long)]
    pub(crate) operator: String,
    /// Restrict the report to one month (YYYY-MM)
    #[arg(long, value_parser = parse_month)]
    pub(crate) month: Option<LogWindow>,
    /// Daily points target (defaults to the plant standard)
    #[arg(long)]
    pub(crate) target: Option<f64>,
    /// Re-price every log against the matrix before reporting
    #[arg(long)]
    pub(crate) recalculate: bool,
}

#[derive(Args, Debug)]
pub(crate) struct MigrateArgs {
    /// JSON file holding an array of legacy log documents
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Where to write migrated logs (stdout when omitted)
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

pub(crate) struct ReportOutcome {
    pub(crate) report: OperatorReport,
    pub(crate) repriced: Option<usize>,
}

pub(crate) fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let rules = BufReader::new(File::open(&args.rules)?);
    let logs = BufReader::new(File::open(&args.logs)?);
    let outcome = build_report(rules, logs, &args)?;
    render_report(&outcome);
    Ok(())
}

pub(crate) fn build_report<Rr: Read, Lr: Read>(
    rules: Rr,
    logs: Lr,
    args: &ReportArgs,
) -> Result<ReportOutcome, AppError> {
    let target = args.target.unwrap_or(ProductivityTarget::DEFAULT_POINTS);
    if !(target.is_finite() && target > 0.0) {
        return Err(ProductionServiceError::Validation(
            "report target must be a positive number".to_string(),
        )
        .into());
    }

    let rules: Vec<PointRule> = parse_rules(rules)?
        .into_iter()
        .enumerate()
        .map(|(index, draft)| draft.into_rule(RuleId(format!("rule-{:06}", index + 1))))
        .collect();
    let mut logs: Vec<ProductionLogEntry> = parse_logs(logs)?
        .into_iter()
        .map(|imported| imported.into_entry(&rules))
        .collect();

    let repriced = args
        .recalculate
        .then(|| recalculate_all(&mut logs, &rules));
    let window = args.month.unwrap_or(LogWindow::Unrestricted);

    Ok(ReportOutcome {
        report: OperatorReport::build(&args.operator, window, target, &logs),
        repriced,
    })
}

fn describe_window(window: &LogWindow) -> String {
    match window {
        LogWindow::Day { date } => date.to_string(),
        LogWindow::Month { year, month } => format!("{year}-{month:02}"),
        LogWindow::Range { from, to } => format!("{from} -> {to}"),
        LogWindow::Unrestricted => "all recorded days".to_string(),
    }
}

fn render_report(outcome: &ReportOutcome) {
    let report = &outcome.report;
    println!("Productivity report for {}", report.operator);
    println!(
        "Window: {} (target {:.0} points/day)",
        describe_window(&report.window),
        report.target
    );
    if let Some(repriced) = outcome.repriced {
        println!("Recalculated {repriced} log entries against the current matrix");
    }

    if report.days.is_empty() {
        println!("\nNo production recorded in this window");
        return;
    }

    println!("\nDaily efficiency");
    for day in &report.days {
        let marker = if day.has_unrated { " (includes unrated work)" } else { "" };
        println!(
            "- {}: {:.1} points, {} units, {:.1}%{}",
            day.date, day.points, day.units, day.efficiency_pct, marker
        );
    }

    let averages = &report.averages;
    println!(
        "\nGeneral average: {:.1}% over {} days",
        averages.avg_general, averages.total_days
    );
    println!(
        "Productive average: {:.1}% over {} pure days ({} mixed)",
        averages.avg_productive, averages.pure_days, averages.mixed_days
    );
    println!("Total points: {:.1}", report.total_points);
}

pub(crate) fn run_migrate(args: MigrateArgs) -> Result<(), AppError> {
    let input: Value = serde_json::from_reader(BufReader::new(File::open(&args.input)?))?;
    let report = migrate_value(input);

    for failure in &report.failures {
        eprintln!("document {} skipped: {}", failure.index, failure.error);
    }

    let rendered = serde_json::to_string_pretty(&report.entries)?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, rendered)?;
            eprintln!(
                "migrated {} documents to {} ({} skipped)",
                report.entries.len(),
                path.display(),
                report.failures.len()
            );
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

/// A lone object is migrated as a one-document batch.
pub(crate) fn migrate_value(input: Value) -> MigrationReport {
    match input {
        Value::Array(documents) => migrate_documents(&documents),
        other => migrate_documents(std::slice::from_ref(&other)),
    }
}
