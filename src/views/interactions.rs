use std::borrow::Cow;

use crate::aggregate::{self, Bucket, Histogram, LabelMap, Measure};
use crate::models::Interaction;
use crate::report::TableRow;
use crate::search::{FilterState, Predicate, Searchable};
use crate::table::{ColumnSpec, SortValue, Sortable};

use super::{format_date, format_seconds, standard_predicates};

pub const COLUMNS: [ColumnSpec; 8] = [
    ColumnSpec::desc("interaction_id"),
    ColumnSpec::asc("title"),
    ColumnSpec::asc("type"),
    ColumnSpec::asc("action_type"),
    ColumnSpec::asc("start_time_seconds"),
    ColumnSpec::desc("duration_seconds"),
    ColumnSpec::desc("total_clicks"),
    ColumnSpec::desc("created_at"),
];

pub const DEFAULT_SORT: &str = "title";

/// Longest interaction (seconds) counted in the clicks-by-video-time chart.
pub const DEFAULT_DURATION_BOUND: f64 = 20.0;

impl Searchable for Interaction {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Owned(self.interaction_id.to_string()),
            Cow::Borrowed(&self.title),
            Cow::Borrowed(&self.kind),
            Cow::Borrowed(&self.action_type),
        ]
    }
}

impl Sortable for Interaction {
    fn sort_value(&self, column: &str) -> SortValue<'_> {
        match column {
            "interaction_id" => self.interaction_id.into(),
            "title" => self.title.as_str().into(),
            "type" => self.kind.as_str().into(),
            "action_type" => self.action_type.as_str().into(),
            "start_time_seconds" => self.start_time_seconds.into(),
            "end_time_seconds" => self.end_time_seconds.into(),
            "duration_seconds" => self.duration_seconds.into(),
            "total_clicks" => self.total_clicks.into(),
            "created_at" => self.created_at.into(),
            _ => SortValue::Null,
        }
    }
}

impl TableRow for Interaction {
    fn headers() -> &'static [&'static str] {
        &[
            "ID",
            "Title",
            "Type",
            "Action type",
            "Start",
            "Duration",
            "Clicks",
            "Created",
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.interaction_id.to_string(),
            self.title.clone(),
            self.kind.clone(),
            self.action_type.clone(),
            format_seconds(self.start_time_seconds),
            format_seconds(self.duration_seconds),
            self.total_clicks.to_string(),
            format_date(self.created_at),
        ]
    }
}

/// Date range on `created_at`, optional include-set on interaction type.
pub fn predicates<'a>(filters: &FilterState) -> Vec<Predicate<'a, Interaction>> {
    standard_predicates(
        filters,
        |i: &Interaction| i.created_at,
        |i: &Interaction| i.kind.clone(),
    )
}

pub fn action_type_labels() -> LabelMap {
    LabelMap::new()
        .exact("No action type selected", "Other")
        .exact("Jump to specific time in video", "Jump to time")
        .exact("Jump to start of video", "Jump to start")
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionCharts {
    pub clicks_by_type: Vec<Bucket>,
    pub clicks_by_action_type: Vec<Bucket>,
    pub interactions_by_type: Vec<Bucket>,
}

pub fn charts(rows: &[&Interaction]) -> InteractionCharts {
    let labels = action_type_labels();
    let clicks = Measure::sum(|i: &Interaction| i.total_clicks as f64);

    InteractionCharts {
        clicks_by_type: aggregate::ranked(
            rows.iter().copied(),
            |i: &Interaction| i.kind.clone(),
            &clicks,
        ),
        clicks_by_action_type: aggregate::ranked(
            rows.iter().copied(),
            |i: &Interaction| labels.apply(&i.action_type),
            &clicks,
        ),
        interactions_by_type: aggregate::ranked(
            rows.iter().copied(),
            |i: &Interaction| i.kind.clone(),
            &Measure::Count,
        ),
    }
}

/// Clicks by where in the video each interaction starts, counting only
/// interactions no longer than `duration_bound` seconds.
pub fn clicks_by_video_time(
    rows: &[&Interaction],
    video_duration_seconds: f64,
    duration_bound: f64,
) -> Histogram {
    aggregate::timeline_histogram(
        rows.iter()
            .copied()
            .filter(|i: &&Interaction| i.duration_seconds <= duration_bound),
        video_duration_seconds,
        |i: &Interaction| i.start_time_seconds,
        |i: &Interaction| i.total_clicks as f64,
    )
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::search::filter_records;
    use crate::table::{sort_rows, Collation, SortState};

    fn interaction(id: i64, kind: &str, action_type: &str, clicks: i64) -> Interaction {
        Interaction {
            interaction_id: id,
            title: format!("Interaction {id}"),
            kind: kind.to_string(),
            action_type: action_type.to_string(),
            start_time_seconds: id as f64,
            end_time_seconds: id as f64 + 5.0,
            duration_seconds: 5.0,
            link: String::new(),
            total_clicks: clicks,
            created_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()),
        }
    }

    #[test]
    fn charts_group_and_relabel() {
        let records = vec![
            interaction(1, "hotspot", "Jump to start of video", 10),
            interaction(2, "button", "No action type selected", 30),
            interaction(3, "hotspot", "Jump to specific time in video", 5),
        ];
        let rows: Vec<&Interaction> = records.iter().collect();

        let charts = charts(&rows);

        assert_eq!(charts.clicks_by_type[0].key, "button");
        assert_eq!(charts.clicks_by_type[0].total, 30.0);
        assert_eq!(charts.clicks_by_type[1].total, 15.0);
        let action_keys: Vec<&str> = charts
            .clicks_by_action_type
            .iter()
            .map(|b| b.key.as_str())
            .collect();
        assert_eq!(action_keys, vec!["Other", "Jump to start", "Jump to time"]);
        assert_eq!(charts.interactions_by_type[0].key, "hotspot");
        assert_eq!(charts.interactions_by_type[0].total, 2.0);
    }

    #[test]
    fn quoted_search_finds_action_type() {
        let records = vec![
            interaction(1, "hotspot", "Jump to start of video", 10),
            interaction(2, "button", "Open link", 3),
        ];
        let found = filter_records(&records, r#""jump" "start of video""#, &[]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].interaction_id, 1);
    }

    #[test]
    fn date_range_excludes_other_days() {
        let mut records = vec![
            interaction(1, "hotspot", "Open link", 1),
            interaction(2, "hotspot", "Open link", 1),
        ];
        records[1].created_at = Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        let filters = FilterState {
            date_range: Some((
                NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
            )),
            ..FilterState::default()
        };

        let found = filter_records(&records, "", &predicates(&filters));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].interaction_id, 1);
    }

    #[test]
    fn long_interactions_are_left_out_of_timeline() {
        let mut records = vec![
            interaction(2, "hotspot", "Open link", 4),
            interaction(12, "hotspot", "Open link", 6),
        ];
        records[1].duration_seconds = 45.0;
        let rows: Vec<&Interaction> = records.iter().collect();

        let histogram = clicks_by_video_time(&rows, 40.0, DEFAULT_DURATION_BOUND);

        assert_eq!(histogram.bucket_seconds, 2);
        assert_eq!(histogram.totals[1], 4.0);
        assert_eq!(histogram.totals.iter().sum::<f64>(), 4.0);
    }

    #[test]
    fn default_sort_is_title_ascending() {
        let records = vec![
            interaction(2, "hotspot", "Open link", 1),
            interaction(1, "hotspot", "Open link", 1),
        ];
        let mut rows: Vec<&Interaction> = records.iter().collect();
        let state = SortState::for_column(DEFAULT_SORT, &COLUMNS);
        sort_rows(&mut rows, &state, &Collation::new());
        assert_eq!(rows[0].interaction_id, 1);
    }
}
