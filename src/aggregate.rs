use std::collections::HashMap;

use tracing::warn;

/// What each record contributes to its bucket.
pub enum Measure<'a, R> {
    Count,
    Sum(Box<dyn Fn(&R) -> f64 + 'a>),
}

impl<'a, R> Measure<'a, R> {
    pub fn sum<F>(measure: F) -> Self
    where
        F: Fn(&R) -> f64 + 'a,
    {
        Self::Sum(Box::new(measure))
    }

    fn value(&self, record: &R) -> f64 {
        match self {
            Measure::Count => 1.0,
            Measure::Sum(measure) => measure(record),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub key: String,
    pub total: f64,
    pub percent: f64,
}

/// Two measures per key, e.g. mobile/desktop sessions per browser.
#[derive(Debug, Clone, PartialEq)]
pub struct PairBucket {
    pub key: String,
    pub first: f64,
    pub second: f64,
}

impl PairBucket {
    pub fn total(&self) -> f64 {
        self.first + self.second
    }
}

/// Rounds to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Share of `total` in `grand_total`, one decimal. A zero grand total is
/// floored to 1 so empty data yields 0% rather than NaN.
pub fn percent_of(total: f64, grand_total: f64) -> f64 {
    round1(total / grand_total.max(1.0) * 100.0)
}

/// Groups records by key in first-occurrence order and fills in percentages.
pub fn group_by<'r, R, I, K>(records: I, key_fn: K, measure: &Measure<'_, R>) -> Vec<Bucket>
where
    R: 'r,
    I: IntoIterator<Item = &'r R>,
    K: Fn(&R) -> String,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<Bucket> = Vec::new();

    for record in records {
        let key = key_fn(record);
        let value = measure.value(record);
        match index.get(&key) {
            Some(&position) => buckets[position].total += value,
            None => {
                index.insert(key.clone(), buckets.len());
                buckets.push(Bucket {
                    key,
                    total: value,
                    percent: 0.0,
                });
            }
        }
    }

    let grand_total: f64 = buckets.iter().map(|b| b.total).sum();
    for bucket in buckets.iter_mut() {
        bucket.percent = percent_of(bucket.total, grand_total);
    }
    buckets
}

/// Stable sort, largest total first.
pub fn sort_descending(mut buckets: Vec<Bucket>) -> Vec<Bucket> {
    buckets.sort_by(|a, b| b.total.total_cmp(&a.total));
    buckets
}

/// `group_by` followed by `sort_descending`, the order charts present.
pub fn ranked<'r, R, I, K>(records: I, key_fn: K, measure: &Measure<'_, R>) -> Vec<Bucket>
where
    R: 'r,
    I: IntoIterator<Item = &'r R>,
    K: Fn(&R) -> String,
{
    sort_descending(group_by(records, key_fn, measure))
}

/// Groups by key with two measures per bucket, sorted by combined total.
pub fn split_by<'r, R, I, K, A, B>(records: I, key_fn: K, first: A, second: B) -> Vec<PairBucket>
where
    R: 'r,
    I: IntoIterator<Item = &'r R>,
    K: Fn(&R) -> String,
    A: Fn(&R) -> f64,
    B: Fn(&R) -> f64,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<PairBucket> = Vec::new();

    for record in records {
        let key = key_fn(record);
        let position = match index.get(&key) {
            Some(&position) => position,
            None => {
                index.insert(key.clone(), buckets.len());
                buckets.push(PairBucket {
                    key,
                    first: 0.0,
                    second: 0.0,
                });
                buckets.len() - 1
            }
        };
        buckets[position].first += first(record);
        buckets[position].second += second(record);
    }

    buckets.sort_by(|a, b| b.total().total_cmp(&a.total()));
    buckets
}

/// Caller-supplied remapping of raw categorical values to display labels.
///
/// Exact matches win; otherwise the first substring rule that matches applies;
/// otherwise the raw value is kept.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    exact: HashMap<String, String>,
    contains: Vec<(String, String)>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exact(mut self, raw: &str, label: &str) -> Self {
        self.exact.insert(raw.to_string(), label.to_string());
        self
    }

    pub fn containing(mut self, needle: &str, label: &str) -> Self {
        self.contains.push((needle.to_string(), label.to_string()));
        self
    }

    pub fn apply(&self, raw: &str) -> String {
        if let Some(label) = self.exact.get(raw) {
            return label.clone();
        }
        self.contains
            .iter()
            .find(|(needle, _)| raw.contains(needle.as_str()))
            .map(|(_, label)| label.clone())
            .unwrap_or_else(|| raw.to_string())
    }
}

/// Measure totals over fixed-width slices of a video's timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub bucket_seconds: u32,
    pub totals: Vec<f64>,
}

impl Histogram {
    /// `(start_second, total)` pairs for charting.
    pub fn points(&self) -> Vec<(u32, f64)> {
        self.totals
            .iter()
            .enumerate()
            .map(|(i, total)| (i as u32 * self.bucket_seconds, *total))
            .collect()
    }
}

/// Slices width is 5% of the duration rounded, at least one second.
pub fn timeline_bucket_seconds(duration_seconds: f64) -> u32 {
    (duration_seconds * 0.05).round().max(1.0) as u32
}

/// Accumulates `measure` into the slice containing each record's start time.
/// Starts outside the timeline are skipped.
pub fn timeline_histogram<'r, R, I, S, M>(
    records: I,
    duration_seconds: f64,
    start_fn: S,
    measure: M,
) -> Histogram
where
    R: 'r,
    I: IntoIterator<Item = &'r R>,
    S: Fn(&R) -> f64,
    M: Fn(&R) -> f64,
{
    let bucket_seconds = timeline_bucket_seconds(duration_seconds);
    let len = (duration_seconds.max(0.0) / bucket_seconds as f64).ceil() as usize;
    let mut totals = vec![0.0; len];

    for record in records {
        let start = start_fn(record);
        let index = (start / bucket_seconds as f64).floor();
        if index >= 0.0 && (index as usize) < totals.len() {
            totals[index as usize] += measure(record);
        } else {
            warn!(
                "Skipping record starting at {start}s, outside the {duration_seconds}s timeline"
            );
        }
    }

    Histogram {
        bucket_seconds,
        totals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Click {
        kind: &'static str,
        clicks: f64,
        start: f64,
    }

    fn click(kind: &'static str, clicks: f64) -> Click {
        Click {
            kind,
            clicks,
            start: 0.0,
        }
    }

    #[test]
    fn sums_and_ranks_by_total() {
        let records = vec![click("A", 10.0), click("B", 30.0)];
        let buckets = ranked(
            &records,
            |r: &Click| r.kind.to_string(),
            &Measure::sum(|r: &Click| r.clicks),
        );

        assert_eq!(
            buckets,
            vec![
                Bucket {
                    key: "B".to_string(),
                    total: 30.0,
                    percent: 75.0
                },
                Bucket {
                    key: "A".to_string(),
                    total: 10.0,
                    percent: 25.0
                },
            ]
        );
    }

    #[test]
    fn unsorted_groups_keep_first_occurrence_order() {
        let records = vec![click("C", 1.0), click("A", 5.0), click("C", 1.0), click("B", 9.0)];
        let keys: Vec<String> = group_by(&records, |r: &Click| r.kind.to_string(), &Measure::Count)
            .into_iter()
            .map(|b| b.key)
            .collect();
        assert_eq!(keys, vec!["C", "A", "B"]);
    }

    #[test]
    fn count_measure_counts_records() {
        let records = vec![click("A", 10.0), click("A", 3.0), click("B", 1.0)];
        let buckets = group_by(&records, |r: &Click| r.kind.to_string(), &Measure::Count);
        assert_eq!(buckets[0].total, 2.0);
        assert_eq!(buckets[1].total, 1.0);
        assert_eq!(buckets[0].percent, 66.7);
        assert_eq!(buckets[1].percent, 33.3);
    }

    #[test]
    fn percentages_sum_to_about_one_hundred() {
        let records = vec![
            click("A", 1.0),
            click("B", 1.0),
            click("C", 1.0),
            click("D", 4.0),
        ];
        let buckets = group_by(
            &records,
            |r: &Click| r.kind.to_string(),
            &Measure::sum(|r: &Click| r.clicks),
        );
        let sum: f64 = buckets.iter().map(|b| b.percent).sum();
        assert!((sum - 100.0).abs() <= 0.1 * buckets.len() as f64);
    }

    #[test]
    fn zero_total_yields_zero_percent() {
        let records = vec![click("A", 0.0), click("B", 0.0)];
        let buckets = group_by(
            &records,
            |r: &Click| r.kind.to_string(),
            &Measure::sum(|r: &Click| r.clicks),
        );
        assert!(buckets.iter().all(|b| b.percent == 0.0));
        assert!(buckets.iter().all(|b| !b.percent.is_nan()));
    }

    #[test]
    fn label_map_remaps_before_grouping() {
        let labels = LabelMap::new()
            .exact("No action type selected", "Other")
            .exact("Jump to start of video", "Jump to start");
        let records = vec![
            click("No action type selected", 2.0),
            click("Jump to start of video", 5.0),
            click("Open link", 1.0),
        ];
        let keys: Vec<String> = ranked(
            &records,
            |r: &Click| labels.apply(r.kind),
            &Measure::sum(|r: &Click| r.clicks),
        )
        .into_iter()
        .map(|b| b.key)
        .collect();
        assert_eq!(keys, vec!["Jump to start", "Other", "Open link"]);
    }

    #[test]
    fn substring_rules_apply_in_order() {
        let labels = LabelMap::new()
            .containing("Chrome", "Chrome")
            .containing("Safari", "Safari");
        assert_eq!(labels.apply("Chrome Mobile iOS"), "Chrome");
        assert_eq!(labels.apply("Mobile Safari"), "Safari");
        assert_eq!(labels.apply("Opera"), "Opera");
    }

    #[test]
    fn split_by_sums_both_sides() {
        let records = vec![click("Chrome", 1.0), click("Chrome", 0.0), click("Edge", 1.0)];
        let pairs = split_by(
            &records,
            |r: &Click| r.kind.to_string(),
            |r: &Click| r.clicks,
            |r: &Click| 1.0 - r.clicks,
        );
        assert_eq!(pairs[0].key, "Chrome");
        assert_eq!(pairs[0].first, 1.0);
        assert_eq!(pairs[0].second, 1.0);
        assert_eq!(pairs[1].total(), 1.0);
    }

    #[test]
    fn timeline_buckets_are_five_percent_of_duration() {
        assert_eq!(timeline_bucket_seconds(100.0), 5);
        assert_eq!(timeline_bucket_seconds(10.0), 1);

        let records = vec![
            Click {
                kind: "a",
                clicks: 3.0,
                start: 0.0,
            },
            Click {
                kind: "b",
                clicks: 2.0,
                start: 7.5,
            },
            Click {
                kind: "c",
                clicks: 9.0,
                start: 150.0,
            },
        ];
        let histogram = timeline_histogram(&records, 100.0, |r: &Click| r.start, |r: &Click| r.clicks);

        assert_eq!(histogram.bucket_seconds, 5);
        assert_eq!(histogram.totals.len(), 20);
        assert_eq!(histogram.totals[0], 3.0);
        assert_eq!(histogram.totals[1], 2.0);
        assert_eq!(histogram.totals.iter().sum::<f64>(), 5.0);
        assert_eq!(histogram.points()[1], (5, 2.0));
    }
}
