use std::borrow::Cow;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::Serialize;

use crate::models::MonthlyViews;
use crate::report::TableRow;
use crate::search::{Predicate, Searchable};
use crate::table::{ColumnSpec, SortValue, Sortable};

pub const COLUMNS: [ColumnSpec; 9] = [
    ColumnSpec::asc("month"),
    ColumnSpec::desc("total_views"),
    ColumnSpec::desc("started_views"),
    ColumnSpec::desc("finished_views"),
    ColumnSpec::desc("retention_rate"),
    ColumnSpec::desc("passed_views"),
    ColumnSpec::desc("failed_views"),
    ColumnSpec::desc("unfinished_views"),
    ColumnSpec::desc("pass_rate"),
];

pub const DEFAULT_SORT: &str = "month";

/// Parses `YYYY-MM` (an optional `-DD` suffix is ignored) to the first of the month.
pub fn parse_month(raw: &str) -> Result<NaiveDate> {
    let mut parts = raw.trim().splitn(3, '-');
    let year: i32 = parts
        .next()
        .unwrap_or_default()
        .parse()
        .with_context(|| format!("invalid month {raw:?}, expected YYYY-MM"))?;
    let month: u32 = parts
        .next()
        .unwrap_or_default()
        .parse()
        .with_context(|| format!("invalid month {raw:?}, expected YYYY-MM"))?;
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| anyhow!("invalid month {raw:?}, expected YYYY-MM"))
}

pub fn end_of_month(month: NaiveDate) -> NaiveDate {
    month
        .with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
        .unwrap_or(month)
}

fn rate(part: i64, whole: i64) -> i64 {
    if whole > 0 {
        (part as f64 / whole as f64 * 100.0).round() as i64
    } else {
        0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRow {
    pub month: NaiveDate,
    pub total_views: i64,
    pub started_views: i64,
    pub finished_views: i64,
    pub passed_views: i64,
    pub failed_views: i64,
    pub unfinished_views: i64,
    /// Finished as a share of started, whole percent.
    pub retention_rate: i64,
    /// Passed as a share of started, whole percent.
    pub pass_rate: i64,
}

impl MonthlyRow {
    pub fn label(&self) -> String {
        self.month.format("%b %Y").to_string()
    }

    fn month_start(&self) -> DateTime<Utc> {
        self.month.and_time(chrono::NaiveTime::MIN).and_utc()
    }
}

impl TryFrom<MonthlyViews> for MonthlyRow {
    type Error = anyhow::Error;

    fn try_from(views: MonthlyViews) -> Result<Self> {
        Ok(Self {
            month: parse_month(&views.month)?,
            retention_rate: rate(views.finished_views, views.started_views),
            pass_rate: rate(views.passed_views, views.started_views),
            total_views: views.total_views,
            started_views: views.started_views,
            finished_views: views.finished_views,
            passed_views: views.passed_views,
            failed_views: views.failed_views,
            unfinished_views: views.unfinished_views,
        })
    }
}

/// Rows whose month cannot be read are logged and left out.
pub fn decorate(months: Vec<MonthlyViews>) -> Vec<MonthlyRow> {
    months
        .into_iter()
        .filter_map(|views| match MonthlyRow::try_from(views) {
            Ok(row) => Some(row),
            Err(e) => {
                tracing::warn!("Skipping monthly row: {e:#}");
                None
            }
        })
        .collect()
}

impl Searchable for MonthlyRow {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Owned(self.month.format("%Y-%m").to_string()),
            Cow::Owned(self.label()),
        ]
    }
}

impl Sortable for MonthlyRow {
    fn sort_value(&self, column: &str) -> SortValue<'_> {
        match column {
            "month" => SortValue::Date(self.month_start()),
            "total_views" => self.total_views.into(),
            "started_views" => self.started_views.into(),
            "finished_views" => self.finished_views.into(),
            "retention_rate" => self.retention_rate.into(),
            "passed_views" => self.passed_views.into(),
            "failed_views" => self.failed_views.into(),
            "unfinished_views" => self.unfinished_views.into(),
            "pass_rate" => self.pass_rate.into(),
            _ => SortValue::Null,
        }
    }
}

impl TableRow for MonthlyRow {
    fn headers() -> &'static [&'static str] {
        &[
            "Month",
            "Total",
            "Started",
            "Finished",
            "Retention",
            "Passed",
            "Failed",
            "Unfinished",
            "Pass rate",
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.month.format("%Y-%m").to_string(),
            self.total_views.to_string(),
            self.started_views.to_string(),
            self.finished_views.to_string(),
            format!("{}%", self.retention_rate),
            self.passed_views.to_string(),
            self.failed_views.to_string(),
            self.unfinished_views.to_string(),
            format!("{}%", self.pass_rate),
        ]
    }
}

/// Whole months from `from` through `to`, either end optional.
pub fn month_range<'a>(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Vec<Predicate<'a, MonthlyRow>> {
    if from.is_none() && to.is_none() {
        return Vec::new();
    }
    let start = from.map(|m| m.with_day(1).unwrap_or(m)).unwrap_or(NaiveDate::MIN);
    let end = to.map(end_of_month).unwrap_or(NaiveDate::MAX);
    vec![Predicate::date_range(start, end, |row: &MonthlyRow| {
        Some(row.month_start())
    })]
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthPoint {
    pub label: String,
    pub started: i64,
    pub finished: i64,
    pub passed: i64,
    pub failed: i64,
    pub unfinished: i64,
}

/// Views per month in calendar order, for the line chart.
pub fn series(rows: &[&MonthlyRow]) -> Vec<MonthPoint> {
    let mut ordered: Vec<&MonthlyRow> = rows.to_vec();
    ordered.sort_by_key(|row| row.month);
    ordered
        .into_iter()
        .map(|row| MonthPoint {
            label: row.label(),
            started: row.started_views,
            finished: row.finished_views,
            passed: row.passed_views,
            failed: row.failed_views,
            unfinished: row.unfinished_views,
        })
        .collect()
}

pub fn export_file_name(month: &str, include_all: bool) -> String {
    if include_all {
        format!("{month}_views_all_data.csv")
    } else {
        format!("{month}_views_filtered_data.csv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::filter_records;

    fn views(month: &str, started: i64, finished: i64, passed: i64) -> MonthlyViews {
        MonthlyViews {
            month: month.to_string(),
            total_views: started + 2,
            started_views: started,
            finished_views: finished,
            passed_views: passed,
            failed_views: finished - passed,
            unfinished_views: started - finished,
        }
    }

    #[test]
    fn rates_round_and_guard_zero_started() {
        let row = MonthlyRow::try_from(views("2024-03", 3, 2, 1)).unwrap();
        assert_eq!(row.retention_rate, 67);
        assert_eq!(row.pass_rate, 33);

        let empty = MonthlyRow::try_from(views("2024-04", 0, 0, 0)).unwrap();
        assert_eq!(empty.retention_rate, 0);
        assert_eq!(empty.pass_rate, 0);
    }

    #[test]
    fn parses_months_and_month_ends() {
        assert_eq!(
            parse_month("2024-02").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
        assert_eq!(
            parse_month("2024-02-15").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
        assert!(parse_month("Feb 2024").is_err());
        assert_eq!(
            end_of_month(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn month_range_is_inclusive() {
        let rows = decorate(vec![
            views("2024-01", 1, 1, 1),
            views("2024-02", 1, 1, 1),
            views("2024-03", 1, 1, 1),
            views("2024-04", 1, 1, 1),
        ]);
        let filter = month_range(parse_month("2024-02").ok(), parse_month("2024-03").ok());

        let found = filter_records(&rows, "", &filter);

        let months: Vec<String> = found.iter().map(|r| r.label()).collect();
        assert_eq!(months, vec!["Feb 2024", "Mar 2024"]);
    }

    #[test]
    fn unreadable_months_are_dropped() {
        let rows = decorate(vec![views("soon", 1, 1, 1), views("2024-01", 1, 1, 1)]);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn series_is_chronological() {
        let rows = decorate(vec![views("2024-05", 9, 1, 1), views("2023-12", 4, 1, 1)]);
        let refs: Vec<&MonthlyRow> = rows.iter().collect();
        let points = series(&refs);
        assert_eq!(points[0].label, "Dec 2023");
        assert_eq!(points[1].started, 9);
    }

    #[test]
    fn export_names_follow_scope() {
        assert_eq!(export_file_name("2024-05", false), "2024-05_views_filtered_data.csv");
        assert_eq!(export_file_name("2024-05", true), "2024-05_views_all_data.csv");
    }
}
