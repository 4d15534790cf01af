//! Column sorting and page windowing for tabular views.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use icu_collator::{Collator, CollatorOptions};
use icu_locid::locale;
use tracing::warn;

/// A single cell value as seen by the comparator.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue<'a> {
    Number(f64),
    Date(DateTime<Utc>),
    Text(Cow<'a, str>),
    Null,
}

impl SortValue<'_> {
    fn rank(&self) -> u8 {
        match self {
            SortValue::Number(_) => 0,
            SortValue::Date(_) => 1,
            SortValue::Text(_) => 2,
            SortValue::Null => 3,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SortValue::Null)
    }
}

impl From<i64> for SortValue<'_> {
    fn from(value: i64) -> Self {
        SortValue::Number(value as f64)
    }
}

impl From<f64> for SortValue<'_> {
    fn from(value: f64) -> Self {
        SortValue::Number(value)
    }
}

impl<'a> From<&'a str> for SortValue<'a> {
    fn from(value: &'a str) -> Self {
        SortValue::Text(Cow::Borrowed(value))
    }
}

impl From<Option<DateTime<Utc>>> for SortValue<'_> {
    fn from(value: Option<DateTime<Utc>>) -> Self {
        value.map(SortValue::Date).unwrap_or(SortValue::Null)
    }
}

/// Rows expose a value per sortable column; unknown columns are `Null`.
pub trait Sortable {
    fn sort_value(&self, column: &str) -> SortValue<'_>;
}

/// Locale-aware text ordering for Latin and Japanese data.
pub struct Collation {
    collator: Option<Collator>,
}

impl Collation {
    pub fn new() -> Self {
        let collator = match Collator::try_new(&locale!("ja").into(), CollatorOptions::new()) {
            Ok(collator) => Some(collator),
            Err(e) => {
                warn!("Japanese collation unavailable ({e}), using case-folded ordering");
                None
            }
        };
        Self { collator }
    }

    pub fn compare_text(&self, a: &str, b: &str) -> Ordering {
        match &self.collator {
            Some(collator) => collator.compare(a, b),
            None => a
                .to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b)),
        }
    }
}

impl Default for Collation {
    fn default() -> Self {
        Self::new()
    }
}

/// Total order over cell values: numbers, then dates, then text, then nulls.
pub fn compare_values(a: &SortValue<'_>, b: &SortValue<'_>, collation: &Collation) -> Ordering {
    match (a, b) {
        (SortValue::Number(x), SortValue::Number(y)) => x.total_cmp(y),
        (SortValue::Date(x), SortValue::Date(y)) => x.cmp(y),
        (SortValue::Text(x), SortValue::Text(y)) => collation.compare_text(x, y),
        _ => a.rank().cmp(&b.rank()),
    }
}

/// Ascending comparison of two rows on `column`.
pub fn compare<R: Sortable>(a: &R, b: &R, column: &str, collation: &Collation) -> Ordering {
    compare_values(&a.sort_value(column), &b.sort_value(column), collation)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => write!(f, "asc"),
            SortDirection::Descending => write!(f, "desc"),
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(format!("unknown sort direction {other:?}, expected asc or desc")),
        }
    }
}

/// A sortable column and the direction it starts in when first selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub default_direction: SortDirection,
}

impl ColumnSpec {
    pub const fn asc(name: &'static str) -> Self {
        Self {
            name,
            default_direction: SortDirection::Ascending,
        }
    }

    pub const fn desc(name: &'static str) -> Self {
        Self {
            name,
            default_direction: SortDirection::Descending,
        }
    }
}

pub fn default_direction(column: &str, columns: &[ColumnSpec]) -> SortDirection {
    columns
        .iter()
        .find(|spec| spec.name == column)
        .map(|spec| spec.default_direction)
        .unwrap_or(SortDirection::Descending)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortState {
    pub column: String,
    pub direction: SortDirection,
}

impl SortState {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    /// Starts sorting on `column` in its configured default direction.
    pub fn for_column(column: &str, columns: &[ColumnSpec]) -> Self {
        Self::new(column, default_direction(column, columns))
    }

    /// Clicking the active column flips direction; another column resets to its default.
    pub fn toggle(&mut self, column: &str, columns: &[ColumnSpec]) {
        if self.column == column {
            self.direction = self.direction.toggled();
        } else {
            *self = Self::for_column(column, columns);
        }
    }
}

/// Sorts rows in place; nulls go last in either direction.
pub fn sort_rows<R: Sortable>(rows: &mut [&R], state: &SortState, collation: &Collation) {
    rows.sort_by(|a, b| {
        let left = a.sort_value(&state.column);
        let right = b.sort_value(&state.column);
        match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => state
                .direction
                .apply(compare_values(&left, &right, collation)),
        }
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    Five,
    #[default]
    Ten,
    TwentyFive,
    Fifty,
}

impl PageSize {
    pub const ALL: [PageSize; 4] = [
        PageSize::Five,
        PageSize::Ten,
        PageSize::TwentyFive,
        PageSize::Fifty,
    ];

    pub fn rows(self) -> usize {
        match self {
            PageSize::Five => 5,
            PageSize::Ten => 10,
            PageSize::TwentyFive => 25,
            PageSize::Fifty => 50,
        }
    }
}

impl TryFrom<usize> for PageSize {
    type Error = String;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        PageSize::ALL
            .into_iter()
            .find(|size| size.rows() == value)
            .ok_or_else(|| format!("page size must be one of 5, 10, 25, 50 (got {value})"))
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rows: usize = s
            .trim()
            .parse()
            .map_err(|_| format!("invalid page size {s:?}"))?;
        PageSize::try_from(rows)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub page_index: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

pub fn total_pages(total_items: usize, size: PageSize) -> usize {
    total_items.div_ceil(size.rows())
}

/// Clamps a zero-based page index into `0..total_pages`.
pub fn clamp_page(page_index: i64, total_pages: usize) -> usize {
    if page_index <= 0 || total_pages == 0 {
        return 0;
    }
    (page_index as usize).min(total_pages - 1)
}

pub fn paginate<T>(records: &[T], page_index: i64, size: PageSize) -> Page<'_, T> {
    let total_items = records.len();
    let total_pages = total_pages(total_items, size);
    let page_index = clamp_page(page_index, total_pages);
    let start = (page_index * size.rows()).min(total_items);
    let end = (start + size.rows()).min(total_items);

    Page {
        items: &records[start..end],
        page_index,
        total_pages,
        total_items,
    }
}

/// Parses a one-based "go to page" entry into a zero-based index, clamping
/// out-of-range numbers. Non-numeric input is ignored.
pub fn jump_to_page(input: &str, total_pages: usize) -> Option<usize> {
    let requested: i64 = input.trim().parse().ok()?;
    Some(clamp_page(requested - 1, total_pages))
}
