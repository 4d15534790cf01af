use std::borrow::Cow;

use crate::aggregate::{self, Bucket, LabelMap, Measure, PairBucket};
use crate::models::ViewSession;
use crate::report::TableRow;
use crate::search::{FilterState, Predicate, Searchable};
use crate::table::{ColumnSpec, SortValue, Sortable};

pub const COLUMNS: [ColumnSpec; 7] = [
    ColumnSpec::asc("session_id"),
    ColumnSpec::asc("viewer_os"),
    ColumnSpec::asc("viewer_browser"),
    ColumnSpec::asc("device"),
    ColumnSpec::asc("viewer_device"),
    ColumnSpec::asc("is_bot"),
    ColumnSpec::desc("viewer_count"),
];

pub const DEFAULT_SORT: &str = "viewer_count";

pub const DEVICE_OPTIONS: [&str; 2] = ["Desktop", "Mobile"];

pub fn device_label(session: &ViewSession) -> &'static str {
    if session.viewer_mobile {
        "Mobile"
    } else {
        "Desktop"
    }
}

impl Searchable for ViewSession {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(&self.viewer_os),
            Cow::Borrowed(&self.viewer_browser),
        ]
    }
}

impl Sortable for ViewSession {
    fn sort_value(&self, column: &str) -> SortValue<'_> {
        match column {
            "session_id" => self.session_id.into(),
            "viewer_os" => self.viewer_os.as_str().into(),
            "viewer_browser" => self.viewer_browser.as_str().into(),
            "device" => device_label(self).into(),
            "viewer_device" => self.viewer_device.as_str().into(),
            "is_bot" => i64::from(self.is_bot).into(),
            "viewer_count" => self.viewer_count.into(),
            "last_reached_percent" => self.last_reached_percent.into(),
            _ => SortValue::Null,
        }
    }
}

impl TableRow for ViewSession {
    fn headers() -> &'static [&'static str] {
        &["OS", "Browser", "Desktop or Mobile", "Device model", "User or Bot", "Viewers"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            format!("{} {}", self.viewer_os, self.os_version).trim().to_string(),
            format!("{} {}", self.viewer_browser, self.browser_version)
                .trim()
                .to_string(),
            device_label(self).to_string(),
            if self.viewer_device.is_empty() {
                "N/A".to_string()
            } else {
                self.viewer_device.clone()
            },
            if self.is_bot { "Bot" } else { "User" }.to_string(),
            self.viewer_count.to_string(),
        ]
    }
}

/// Device include-set; the date range does not apply to sessions.
pub fn predicates<'a>(filters: &FilterState) -> Vec<Predicate<'a, ViewSession>> {
    filters
        .include
        .iter()
        .map(|allowed| {
            Predicate::include_set(allowed.clone(), |s: &ViewSession| {
                device_label(s).to_string()
            })
        })
        .collect()
}

/// Folds mobile and versioned browser names into their family.
pub fn browser_labels() -> LabelMap {
    ["Chrome", "Facebook", "Edge", "Safari", "Firefox", "IE", "Bing"]
        .into_iter()
        .fold(LabelMap::new(), |labels, family| {
            labels.containing(family, family)
        })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceCounts {
    pub mobile: usize,
    pub desktop: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionCharts {
    pub sessions_by_os: Vec<Bucket>,
    /// `first` is mobile sessions, `second` desktop.
    pub browsers: Vec<PairBucket>,
    pub devices: DeviceCounts,
}

/// `exclude_bots` only narrows the browser breakdown.
pub fn charts(rows: &[&ViewSession], exclude_bots: bool) -> SessionCharts {
    let labels = browser_labels();
    let mobile = |s: &ViewSession| if s.viewer_mobile { 1.0 } else { 0.0 };

    let browsers = aggregate::split_by(
        rows.iter()
            .copied()
            .filter(|s: &&ViewSession| !(exclude_bots && s.is_bot)),
        |s: &ViewSession| labels.apply(&s.viewer_browser),
        mobile,
        |s: &ViewSession| 1.0 - mobile(s),
    );

    let devices = rows.iter().fold(DeviceCounts::default(), |mut counts, s| {
        if s.viewer_mobile {
            counts.mobile += 1;
        } else {
            counts.desktop += 1;
        }
        counts
    });

    SessionCharts {
        sessions_by_os: aggregate::ranked(
            rows.iter().copied(),
            |s: &ViewSession| s.viewer_os.clone(),
            &Measure::Count,
        ),
        browsers,
        devices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::filter_records;

    fn session(id: i64, os: &str, browser: &str, mobile: bool, bot: bool) -> ViewSession {
        ViewSession {
            session_id: id,
            started_time_unix: 0,
            ended_time_unix: 0,
            viewer_timezone: "Asia/Tokyo".to_string(),
            viewer_os: os.to_string(),
            viewer_browser: browser.to_string(),
            viewer_mobile: mobile,
            last_reached_seconds: 0,
            last_reached_percent: 0.0,
            is_bot: bot,
            os_version: String::new(),
            browser_version: String::new(),
            viewer_device: String::new(),
            viewer_count: id,
        }
    }

    fn sample() -> Vec<ViewSession> {
        vec![
            session(1, "iOS", "Mobile Safari", true, false),
            session(2, "Windows", "Chrome", false, false),
            session(3, "Android", "Chrome Mobile", true, false),
            session(4, "Windows", "Edge", false, true),
            session(5, "Mac OS X", "Safari", false, false),
        ]
    }

    #[test]
    fn browsers_fold_into_families_split_by_device() {
        let records = sample();
        let rows: Vec<&ViewSession> = records.iter().collect();

        let charts = charts(&rows, false);

        assert_eq!(charts.browsers[0].key, "Safari");
        assert_eq!(charts.browsers[0].first, 1.0);
        assert_eq!(charts.browsers[0].second, 1.0);
        assert_eq!(charts.browsers[1].key, "Chrome");
        assert_eq!(charts.devices, DeviceCounts { mobile: 2, desktop: 3 });
        assert_eq!(charts.sessions_by_os[0].key, "Windows");
        assert_eq!(charts.sessions_by_os[0].percent, 40.0);
    }

    #[test]
    fn bot_exclusion_only_touches_browsers() {
        let records = sample();
        let rows: Vec<&ViewSession> = records.iter().collect();

        let charts = charts(&rows, true);

        assert!(charts.browsers.iter().all(|b| b.key != "Edge"));
        assert_eq!(charts.devices.desktop, 3);
    }

    #[test]
    fn search_and_device_filter() {
        let records = sample();
        let filters = FilterState {
            include: Some(["Mobile".to_string()].into_iter().collect()),
            ..FilterState::default()
        };

        let found = filter_records(&records, "chrome windows", &predicates(&filters));

        let ids: Vec<i64> = found.iter().map(|s| s.session_id).collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn empty_device_set_hides_everything() {
        let records = sample();
        let filters = FilterState {
            include: Some(Default::default()),
            ..FilterState::default()
        };
        assert!(filter_records(&records, "", &predicates(&filters)).is_empty());
    }
}
