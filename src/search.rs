//! Free-text search plus structural predicates over fetched records.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

/// Records expose the string fields free-text search looks at.
pub trait Searchable {
    fn search_fields(&self) -> Vec<Cow<'_, str>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    Greater,
    GreaterOrEqual,
    LessOrEqual,
    Equal,
}

impl ThresholdOp {
    pub fn matches(self, value: f64, threshold: f64) -> bool {
        match self {
            ThresholdOp::Greater => value > threshold,
            ThresholdOp::GreaterOrEqual => value >= threshold,
            ThresholdOp::LessOrEqual => value <= threshold,
            ThresholdOp::Equal => value == threshold,
        }
    }
}

/// User-entered filter state for one view. Rebuilt per render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    pub search_query: String,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub include: Option<BTreeSet<String>>,
    pub threshold: Option<(ThresholdOp, f64)>,
}

type Extract<'a, R, T> = Box<dyn Fn(&R) -> T + 'a>;

/// A structural predicate; all active predicates are ANDed with the text match.
pub enum Predicate<'a, R> {
    /// Inclusive at day granularity: start-of-day `start` to end-of-day `end`.
    DateRange {
        start: NaiveDate,
        end: NaiveDate,
        value: Extract<'a, R, Option<DateTime<Utc>>>,
    },
    IncludeSet {
        allowed: BTreeSet<String>,
        value: Extract<'a, R, String>,
    },
    Threshold {
        op: ThresholdOp,
        threshold: f64,
        value: Extract<'a, R, f64>,
    },
}

impl<'a, R> Predicate<'a, R> {
    pub fn date_range<F>(start: NaiveDate, end: NaiveDate, value: F) -> Self
    where
        F: Fn(&R) -> Option<DateTime<Utc>> + 'a,
    {
        Self::DateRange {
            start,
            end,
            value: Box::new(value),
        }
    }

    pub fn include_set<F>(allowed: BTreeSet<String>, value: F) -> Self
    where
        F: Fn(&R) -> String + 'a,
    {
        Self::IncludeSet {
            allowed,
            value: Box::new(value),
        }
    }

    pub fn threshold<F>(op: ThresholdOp, threshold: f64, value: F) -> Self
    where
        F: Fn(&R) -> f64 + 'a,
    {
        Self::Threshold {
            op,
            threshold,
            value: Box::new(value),
        }
    }

    pub fn matches(&self, record: &R) -> bool {
        match self {
            Predicate::DateRange { start, end, value } => match value(record) {
                Some(at) => {
                    let day = at.date_naive();
                    day >= *start && day <= *end
                }
                None => false,
            },
            Predicate::IncludeSet { allowed, value } => allowed.contains(&value(record)),
            Predicate::Threshold {
                op,
                threshold,
                value,
            } => op.matches(value(record), *threshold),
        }
    }
}

fn term_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| match Regex::new(r#"(?:[^\s"]+|"[^"]*")+"#) {
        Ok(pattern) => pattern,
        Err(e) => unreachable!("search term pattern is valid: {e}"),
    })
}

/// Splits a query into lower-cased terms. Whitespace separates terms except
/// inside double quotes; quotes are stripped and empty terms dropped.
pub fn parse_query(query: &str) -> Vec<String> {
    term_pattern()
        .find_iter(query)
        .map(|m| m.as_str().replace('"', "").to_lowercase())
        .filter(|term| !term.is_empty())
        .collect()
}

/// True when any term is a substring of any searchable field. No terms matches everything.
pub fn matches_terms<R: Searchable>(record: &R, terms: &[String]) -> bool {
    if terms.is_empty() {
        return true;
    }
    let fields: Vec<String> = record
        .search_fields()
        .iter()
        .map(|field| field.to_lowercase())
        .collect();
    terms
        .iter()
        .any(|term| fields.iter().any(|field| field.contains(term.as_str())))
}

/// Keeps records that match the query and every predicate, in input order.
pub fn filter_records<'r, R: Searchable>(
    records: &'r [R],
    query: &str,
    predicates: &[Predicate<'_, R>],
) -> Vec<&'r R> {
    let terms = parse_query(query);
    records
        .iter()
        .filter(|record| {
            matches_terms(*record, &terms) && predicates.iter().all(|p| p.matches(record))
        })
        .collect()
}
