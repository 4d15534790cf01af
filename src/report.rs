use std::fmt::Write;

use crate::aggregate::{Bucket, Histogram, PairBucket};
use crate::table::{Page, SortState};

pub const NO_DATA: &str = "No data to display.";

/// A row that renders as table cells, for markdown and CSV output.
pub trait TableRow {
    fn headers() -> &'static [&'static str];
    fn cells(&self) -> Vec<String>;
}

impl<T: TableRow> TableRow for &T {
    fn headers() -> &'static [&'static str] {
        T::headers()
    }

    fn cells(&self) -> Vec<String> {
        (**self).cells()
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value:.1}")
    }
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace('\n', " ")
}

pub fn markdown_table<R: TableRow>(rows: &[R]) -> String {
    let mut output = String::new();
    let headers = R::headers();
    let _ = writeln!(output, "| {} |", headers.join(" | "));
    let _ = writeln!(
        output,
        "|{}",
        headers.iter().map(|_| " --- |").collect::<String>()
    );
    for row in rows {
        let cells: Vec<String> = row.cells().iter().map(|c| escape_cell(c)).collect();
        let _ = writeln!(output, "| {} |", cells.join(" | "));
    }
    output
}

/// The table, or the empty-state line when there are no rows.
pub fn rows_or_empty<R: TableRow>(rows: &[R]) -> String {
    if rows.is_empty() {
        format!("{NO_DATA}\n")
    } else {
        markdown_table(rows)
    }
}

/// Pre-formatted lines as a bullet list.
pub fn bullets(lines: &[String]) -> String {
    let mut output = String::new();
    if lines.is_empty() {
        let _ = writeln!(output, "{NO_DATA}");
    }
    for line in lines {
        let _ = writeln!(output, "- {line}");
    }
    output
}

pub fn list_section(title: &str, lines: &[String]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## {title}");
    output.push_str(&bullets(lines));
    output
}

/// One chart's data as a ranked list with percentages.
pub fn bucket_section(title: &str, buckets: &[Bucket]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## {title}");

    if buckets.is_empty() {
        let _ = writeln!(output, "{NO_DATA}");
        return output;
    }

    for bucket in buckets {
        let _ = writeln!(
            output,
            "- {}: {} ({:.1}%)",
            bucket.key,
            format_number(bucket.total),
            bucket.percent
        );
    }
    output
}

pub fn pair_section(title: &str, labels: (&str, &str), buckets: &[PairBucket]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## {title}");

    if buckets.is_empty() {
        let _ = writeln!(output, "{NO_DATA}");
        return output;
    }

    for bucket in buckets {
        let _ = writeln!(
            output,
            "- {}: {} {}, {} {}",
            bucket.key,
            format_number(bucket.first),
            labels.0,
            format_number(bucket.second),
            labels.1
        );
    }
    output
}

pub fn histogram_section(title: &str, histogram: &Histogram) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "## {title} ({}s buckets)",
        histogram.bucket_seconds
    );

    if histogram.totals.iter().all(|total| *total == 0.0) {
        let _ = writeln!(output, "{NO_DATA}");
        return output;
    }

    for (start, total) in histogram.points() {
        let _ = writeln!(output, "- {start}s: {}", format_number(total));
    }
    output
}

/// A page of a sorted table with its position line.
pub fn table_section<R: TableRow>(title: &str, page: &Page<'_, R>, sort: &SortState) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## {title}");

    if page.total_items == 0 {
        let _ = writeln!(output, "{NO_DATA}");
        return output;
    }

    output.push_str(&markdown_table(page.items));
    let _ = writeln!(
        output,
        "Page {} of {} ({} rows, sorted by {} {})",
        page.page_index + 1,
        page.total_pages,
        page.total_items,
        sort.column,
        sort.direction
    );
    output
}

pub fn heading(title: &str, subtitle: &str) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# {title}");
    if !subtitle.is_empty() {
        let _ = writeln!(output, "{subtitle}");
    }
    let _ = writeln!(output);
    output
}

/// A view with nothing to show, e.g. when no video can be selected.
pub fn empty_view(title: &str) -> String {
    format!("{}{NO_DATA}\n", heading(title, ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{paginate, PageSize, SortDirection};

    struct Row(&'static str, i64);

    impl TableRow for Row {
        fn headers() -> &'static [&'static str] {
            &["Name", "Clicks"]
        }

        fn cells(&self) -> Vec<String> {
            vec![self.0.to_string(), self.1.to_string()]
        }
    }

    #[test]
    fn renders_ranked_buckets() {
        let buckets = vec![
            Bucket {
                key: "B".to_string(),
                total: 30.0,
                percent: 75.0,
            },
            Bucket {
                key: "A".to_string(),
                total: 10.0,
                percent: 25.0,
            },
        ];
        let section = bucket_section("Clicks per type", &buckets);
        assert!(section.contains("- B: 30 (75.0%)"));
        assert!(section.contains("- A: 10 (25.0%)"));
    }

    #[test]
    fn empty_sections_show_placeholder() {
        assert!(bucket_section("Clicks", &[]).contains(NO_DATA));

        let rows: Vec<Row> = Vec::new();
        let page = paginate(&rows, 0, PageSize::Ten);
        let sort = SortState::new("title", SortDirection::Ascending);
        assert!(table_section("Table", &page, &sort).contains(NO_DATA));
    }

    #[test]
    fn lists_and_tables_fall_back_to_placeholder() {
        assert_eq!(list_section("Devices", &[]), format!("## Devices\n{NO_DATA}\n"));
        assert_eq!(
            bullets(&["Mobile: 2".to_string(), "Desktop: 5".to_string()]),
            "- Mobile: 2\n- Desktop: 5\n"
        );

        let rows: Vec<Row> = Vec::new();
        assert_eq!(rows_or_empty(&rows), format!("{NO_DATA}\n"));
        assert!(rows_or_empty(&[Row("c", 2)]).contains("| c | 2 |"));
        assert_eq!(empty_view("Sessions"), format!("# Sessions\n\n{NO_DATA}\n"));
    }

    #[test]
    fn table_escapes_pipes_and_reports_position() {
        let rows = vec![Row("a|b", 1), Row("c", 2)];
        let page = paginate(&rows, 0, PageSize::Five);
        let sort = SortState::new("clicks", SortDirection::Descending);
        let section = table_section("Interactions", &page, &sort);
        assert!(section.contains("| a\\|b | 1 |"));
        assert!(section.contains("Page 1 of 1 (2 rows, sorted by clicks desc)"));
    }
}
