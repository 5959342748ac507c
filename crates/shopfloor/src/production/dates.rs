use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use super::aggregation::LogWindow;

pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Parses `YYYY-MM` into a month window.
pub fn parse_month(raw: &str) -> Result<LogWindow, String> {
    let first = NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM ({err})"))?;
    Ok(LogWindow::Month {
        year: first.year(),
        month: first.month(),
    })
}

pub fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.filter(|value| !value.trim().is_empty())
        .map(|value| parse_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}

pub fn deserialize_optional_month<'de, D>(deserializer: D) -> Result<Option<LogWindow>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.filter(|value| !value.trim().is_empty())
        .map(|value| parse_month(&value).map_err(serde::de::Error::custom))
        .transpose()
}
