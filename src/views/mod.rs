//! Per-view configuration of the shared pipeline:
//! fetch, decorate, filter, group, sort, paginate, render.
//!
//! Each submodule supplies the searchable fields, predicates, groupings and
//! sortable columns for one dashboard view. The engines themselves live in
//! `search`, `aggregate` and `table`.

pub mod interactions;
pub mod monthly;
pub mod questions;
pub mod sessions;
pub mod summary;
pub mod users;

use chrono::{DateTime, Utc};

use crate::search::{filter_records, FilterState, Predicate, Searchable};
use crate::table::{sort_rows, Collation, SortState, Sortable};

/// Filters then sorts, leaving the source records untouched.
pub fn filter_and_sort<'r, R>(
    records: &'r [R],
    query: &str,
    predicates: &[Predicate<'_, R>],
    sort: &SortState,
    collation: &Collation,
) -> Vec<&'r R>
where
    R: Searchable + Sortable,
{
    let mut rows = filter_records(records, query, predicates);
    sort_rows(&mut rows, sort, collation);
    rows
}

/// The date-range and include-set predicates a `FilterState` asks for.
pub fn standard_predicates<'a, R, D, I>(
    filters: &FilterState,
    date: D,
    category: I,
) -> Vec<Predicate<'a, R>>
where
    D: Fn(&R) -> Option<DateTime<Utc>> + 'a,
    I: Fn(&R) -> String + 'a,
{
    let mut predicates = Vec::new();
    if let Some((start, end)) = filters.date_range {
        predicates.push(Predicate::date_range(start, end, date));
    }
    if let Some(allowed) = &filters.include {
        predicates.push(Predicate::include_set(allowed.clone(), category));
    }
    predicates
}

pub fn format_date(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn format_seconds(value: f64) -> String {
    format!("{value:.1}s")
}
