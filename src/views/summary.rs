use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{MonthOverMonth, Video, VideoRating, VideoStats};
use crate::report::TableRow;
use crate::search::{FilterState, Predicate, Searchable};
use crate::table::{ColumnSpec, SortValue, Sortable};

use super::{format_date, standard_predicates};

pub const COLUMNS: [ColumnSpec; 8] = [
    ColumnSpec::asc("title"),
    ColumnSpec::desc("total_views"),
    ColumnSpec::desc("started_views"),
    ColumnSpec::desc("view_rate"),
    ColumnSpec::desc("finished_views"),
    ColumnSpec::desc("interaction_clicks"),
    ColumnSpec::desc("average_rating"),
    ColumnSpec::desc("created_date"),
];

pub const DEFAULT_SORT: &str = "title";

/// Display names for video privacy status codes 0 through 4.
pub const STATUS_LABELS: [&str; 5] = [
    "Only you",
    "Embed only",
    "Only with the link",
    "Anyone",
    "Only those specified",
];

/// Content toggle that unlocks rating columns.
pub const RATINGS_TOGGLE: &str = "benesse_toggle";

pub fn status_label(status: i64) -> Cow<'static, str> {
    usize::try_from(status)
        .ok()
        .and_then(|index| STATUS_LABELS.get(index))
        .map(|label| Cow::Borrowed(*label))
        .unwrap_or_else(|| Cow::Owned(format!("Status {status}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StarCounts {
    pub average: f64,
    pub one: i64,
    pub two: i64,
    pub three: i64,
    pub four: i64,
    pub five: i64,
}

impl From<&VideoRating> for StarCounts {
    fn from(rating: &VideoRating) -> Self {
        Self {
            average: rating.average_rating,
            one: rating.one_star,
            two: rating.two_star,
            three: rating.three_star,
            four: rating.four_star,
            five: rating.five_star,
        }
    }
}

/// One video's stats with its rating (if any) and view rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub video: Video,
    pub total_views: i64,
    pub started_views: i64,
    pub finished_views: i64,
    pub interaction_clicks: i64,
    pub video_duration_seconds: f64,
    /// Started as a share of total views, whole percent.
    pub view_rate: i64,
    pub rating: Option<StarCounts>,
}

impl SummaryRow {
    pub fn new(stats: VideoStats, rating: Option<StarCounts>) -> Self {
        let view_rate = if stats.total_views > 0 {
            (stats.started_views as f64 / stats.total_views as f64 * 100.0).round() as i64
        } else {
            0
        };
        Self {
            video: stats.video,
            total_views: stats.total_views,
            started_views: stats.started_views,
            finished_views: stats.finished_views,
            interaction_clicks: stats.interaction_clicks,
            video_duration_seconds: stats.video_duration_seconds,
            view_rate,
            rating,
        }
    }
}

/// Joins stats with ratings by video id. Videos without a rating keep `None`.
pub fn merge(stats: Vec<VideoStats>, ratings: &[VideoRating]) -> Vec<SummaryRow> {
    let by_video: HashMap<i64, StarCounts> = ratings
        .iter()
        .map(|rating| (rating.video.video_id, StarCounts::from(rating)))
        .collect();
    stats
        .into_iter()
        .map(|stats| {
            let rating = by_video.get(&stats.video.video_id).copied();
            SummaryRow::new(stats, rating)
        })
        .collect()
}

impl Searchable for SummaryRow {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(&self.video.title),
            Cow::Owned(self.video.video_id.to_string()),
        ]
    }
}

impl Sortable for SummaryRow {
    fn sort_value(&self, column: &str) -> SortValue<'_> {
        match column {
            "video_id" => self.video.video_id.into(),
            "title" => self.video.title.as_str().into(),
            "total_views" => self.total_views.into(),
            "started_views" => self.started_views.into(),
            "view_rate" => self.view_rate.into(),
            "finished_views" => self.finished_views.into(),
            "interaction_clicks" => self.interaction_clicks.into(),
            "average_rating" => self
                .rating
                .map(|r| SortValue::Number(r.average))
                .unwrap_or(SortValue::Null),
            "created_date" => self.video.created_date.into(),
            _ => SortValue::Null,
        }
    }
}

impl TableRow for SummaryRow {
    fn headers() -> &'static [&'static str] {
        &[
            "ID",
            "Title",
            "Status",
            "Total views",
            "Started",
            "View rate",
            "Finished",
            "Clicks",
            "Rating",
            "Created",
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.video.video_id.to_string(),
            self.video.title.clone(),
            status_label(self.video.status).into_owned(),
            self.total_views.to_string(),
            self.started_views.to_string(),
            format!("{}%", self.view_rate),
            self.finished_views.to_string(),
            self.interaction_clicks.to_string(),
            self.rating
                .map(|r| format!("{:.2}", r.average))
                .unwrap_or_else(|| "-".to_string()),
            format_date(self.video.created_date),
        ]
    }
}

/// Created-date range and status set (by label).
pub fn predicates<'a>(filters: &FilterState) -> Vec<Predicate<'a, SummaryRow>> {
    standard_predicates(
        filters,
        |row: &SummaryRow| row.video.created_date,
        |row: &SummaryRow| status_label(row.video.status).into_owned(),
    )
}

impl Searchable for Video {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(&self.title),
            Cow::Owned(self.video_id.to_string()),
        ]
    }
}

impl TableRow for Video {
    fn headers() -> &'static [&'static str] {
        &["ID", "Title", "Status", "Created"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.video_id.to_string(),
            self.title.clone(),
            status_label(self.status).into_owned(),
            format_date(self.created_date),
        ]
    }
}

/// The same created-date and status filters, for the bare video list.
pub fn video_predicates<'a>(filters: &FilterState) -> Vec<Predicate<'a, Video>> {
    standard_predicates(
        filters,
        |video: &Video| video.created_date,
        |video: &Video| status_label(video.status).into_owned(),
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub num_videos: i64,
    pub total_views: i64,
    pub started_views: i64,
    pub finished_views: i64,
    pub interaction_clicks: i64,
}

impl Totals {
    pub fn of<'r, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'r SummaryRow>,
    {
        rows.into_iter().fold(Self::default(), |mut totals, row| {
            totals.num_videos += 1;
            totals.total_views += row.total_views;
            totals.started_views += row.started_views;
            totals.finished_views += row.finished_views;
            totals.interaction_clicks += row.interaction_clicks;
            totals
        })
    }

    /// `(label, filtered, overall)` per total, in display order.
    pub fn compare(&self, overall: &Totals) -> [(&'static str, i64, i64); 5] {
        [
            ("Videos", self.num_videos, overall.num_videos),
            ("Total views", self.total_views, overall.total_views),
            ("Started views", self.started_views, overall.started_views),
            ("Finished views", self.finished_views, overall.finished_views),
            ("Interaction clicks", self.interaction_clicks, overall.interaction_clicks),
        ]
    }
}

/// Filtered share of an overall total, two decimals; 0 when the overall is 0.
pub fn share(filtered: i64, overall: i64) -> f64 {
    if overall == 0 {
        return 0.0;
    }
    (filtered as f64 / overall as f64 * 10_000.0).round() / 100.0
}

pub fn video_export_file_name(video_id: i64, at: DateTime<Utc>) -> String {
    format!("video_id_{video_id}_at_{}.json", at.format("%Y-%m-%dT%H-%M-%S"))
}

/// Month-over-month change per video, largest gain first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingRow {
    pub video_id: String,
    pub title: String,
    pub last_month: i64,
    pub two_months_ago: i64,
    pub change: i64,
}

pub fn trending(changes: Vec<MonthOverMonth>, videos: &[Video]) -> Vec<TrendingRow> {
    let titles: HashMap<String, &str> = videos
        .iter()
        .map(|video| (video.video_id.to_string(), video.title.as_str()))
        .collect();
    let mut rows: Vec<TrendingRow> = changes
        .into_iter()
        .map(|entry| TrendingRow {
            title: titles
                .get(&entry.video_id)
                .map(|title| title.to_string())
                .unwrap_or_else(|| "-".to_string()),
            change: entry.change(),
            video_id: entry.video_id,
            last_month: entry.last_month,
            two_months_ago: entry.two_months_ago,
        })
        .collect();
    rows.sort_by(|a, b| b.change.cmp(&a.change));
    rows
}

impl TableRow for TrendingRow {
    fn headers() -> &'static [&'static str] {
        &["ID", "Title", "Last month", "Month before", "Change"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.video_id.clone(),
            self.title.clone(),
            self.last_month.to_string(),
            self.two_months_ago.to_string(),
            format!("{:+}", self.change),
        ]
    }
}
