use std::borrow::Cow;
use std::str::FromStr;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::{self, Bucket, Measure, PairBucket};
use crate::models::{Question, QuestionAnswer};
use crate::report::TableRow;
use crate::search::{FilterState, Predicate, Searchable, ThresholdOp};
use crate::table::{ColumnSpec, SortValue, Sortable};

use super::{format_date, format_seconds, standard_predicates};

pub const COLUMNS: [ColumnSpec; 9] = [
    ColumnSpec::asc("question_id"),
    ColumnSpec::asc("title"),
    ColumnSpec::asc("type"),
    ColumnSpec::asc("video_time_seconds"),
    ColumnSpec::desc("average_answer_time_seconds"),
    ColumnSpec::desc("total_answered"),
    ColumnSpec::desc("total_correctly_answered"),
    ColumnSpec::desc("percent_correct"),
    ColumnSpec::desc("created_at"),
];

pub const DEFAULT_SORT: &str = "question_id";

pub const TYPE_OPTIONS: [&str; 8] = [
    "mc", "mr", "image", "entry", "open", "essay", "vacancy", "rating",
];

/// Types with no right answer; they have no percent correct and are never
/// picked as the default question for the answer breakdown.
pub const UNGRADED_TYPES: [&str; 4] = ["open", "essay", "vacancy", "rating"];

pub const AVERAGE_TIME_OPTIONS: [f64; 7] = [0.0, 10.0, 20.0, 30.0, 60.0, 120.0, 240.0];

const EDITOR_PARAGRAPH_PREFIX: &str = "<!--TINYMCE-->\n<p>";
const EDITOR_PREFIX: &str = "<!--TINYMCE-->";
const LABEL_LIMIT: usize = 30;
const LABEL_KEEP: usize = 27;

/// Drops the rich-text editor marker (and wrapping paragraph) some titles carry.
pub fn clean_title(raw: &str) -> String {
    if let Some(rest) = raw.strip_prefix(EDITOR_PARAGRAPH_PREFIX) {
        return rest.strip_suffix("</p>").unwrap_or(rest).to_string();
    }
    if let Some(rest) = raw.strip_prefix(EDITOR_PREFIX) {
        return rest.chars().skip(1).collect();
    }
    raw.to_string()
}

pub fn is_graded(kind: &str) -> bool {
    !UNGRADED_TYPES.contains(&kind)
}

/// A question with its display title cleaned and percent correct derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionRow {
    pub question_id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub video_time_seconds: f64,
    pub average_answer_time_seconds: f64,
    pub total_answered: i64,
    pub total_correctly_answered: i64,
    pub percent_correct: i64,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<Question> for QuestionRow {
    fn from(question: Question) -> Self {
        let percent_correct = if question.total_answered > 0 {
            (question.total_correctly_answered as f64 / question.total_answered as f64 * 100.0)
                .round() as i64
        } else {
            0
        };
        Self {
            question_id: question.question_id,
            title: clean_title(&question.title),
            kind: question.kind,
            video_time_seconds: question.video_time_seconds,
            average_answer_time_seconds: question.average_answer_time_seconds,
            total_answered: question.total_answered,
            total_correctly_answered: question.total_correctly_answered,
            percent_correct,
            created_at: question.created_at,
        }
    }
}

pub fn decorate(questions: Vec<Question>) -> Vec<QuestionRow> {
    questions.into_iter().map(QuestionRow::from).collect()
}

impl Searchable for QuestionRow {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Owned(self.question_id.to_string()),
            Cow::Borrowed(&self.title),
            Cow::Borrowed(&self.kind),
        ]
    }
}

impl Sortable for QuestionRow {
    fn sort_value(&self, column: &str) -> SortValue<'_> {
        match column {
            "question_id" => self.question_id.into(),
            "title" => self.title.as_str().into(),
            "type" => self.kind.as_str().into(),
            "video_time_seconds" => self.video_time_seconds.into(),
            "average_answer_time_seconds" => self.average_answer_time_seconds.into(),
            "total_answered" => self.total_answered.into(),
            "total_correctly_answered" => self.total_correctly_answered.into(),
            "percent_correct" => self.percent_correct.into(),
            "created_at" => self.created_at.into(),
            _ => SortValue::Null,
        }
    }
}

impl TableRow for QuestionRow {
    fn headers() -> &'static [&'static str] {
        &[
            "ID",
            "Title",
            "Type",
            "Video time",
            "Avg answer time",
            "Answered",
            "Correct",
            "% correct",
            "Created",
        ]
    }

    fn cells(&self) -> Vec<String> {
        let percent = if matches!(self.kind.as_str(), "open" | "essay" | "vacancy") {
            "N/A".to_string()
        } else {
            format!("{}%", self.percent_correct)
        };
        vec![
            self.question_id.to_string(),
            self.title.clone(),
            self.kind.clone(),
            format_seconds(self.video_time_seconds),
            format_seconds(self.average_answer_time_seconds),
            self.total_answered.to_string(),
            self.total_correctly_answered.to_string(),
            percent,
            format_date(self.created_at),
        ]
    }
}

/// Percent-correct bands offered by the filter menu.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentFilter {
    pub op: ThresholdOp,
    pub percent: f64,
}

impl FromStr for PercentFilter {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let compact: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '%')
            .collect();
        let (op, percent) = match compact.as_str() {
            "=0" => (ThresholdOp::Equal, 0.0),
            ">=25" => (ThresholdOp::GreaterOrEqual, 25.0),
            "<=25" => (ThresholdOp::LessOrEqual, 25.0),
            ">=50" => (ThresholdOp::GreaterOrEqual, 50.0),
            "<=50" => (ThresholdOp::LessOrEqual, 50.0),
            ">=75" => (ThresholdOp::GreaterOrEqual, 75.0),
            "<=75" => (ThresholdOp::LessOrEqual, 75.0),
            "=100" => (ThresholdOp::Equal, 100.0),
            _ => bail!("unknown percent filter {raw:?}; use all, =0, >=25, <=25, >=50, <=50, >=75, <=75 or =100"),
        };
        Ok(Self { op, percent })
    }
}

/// Accepts only the average-time choices the questions page offers.
pub fn parse_average_time(raw: &str) -> Result<f64> {
    let seconds: f64 = raw.trim().parse()?;
    if !AVERAGE_TIME_OPTIONS.contains(&seconds) {
        bail!("average time must be one of {AVERAGE_TIME_OPTIONS:?} seconds, got {raw:?}");
    }
    Ok(seconds)
}

/// `"all"` (or nothing) means no percent filter.
pub fn parse_percent_filter(raw: Option<&str>) -> Result<Option<PercentFilter>> {
    match raw {
        None => Ok(None),
        Some(text) if text.trim().eq_ignore_ascii_case("all") => Ok(None),
        Some(text) => text.parse().map(Some),
    }
}

/// Date range and type set from `filters`; its threshold, when set, bounds
/// the average answer time.
pub fn predicates<'a>(
    filters: &FilterState,
    percent: Option<PercentFilter>,
) -> Vec<Predicate<'a, QuestionRow>> {
    let mut predicates = standard_predicates(
        filters,
        |q: &QuestionRow| q.created_at,
        |q: &QuestionRow| q.kind.clone(),
    );
    if let Some((op, seconds)) = filters.threshold {
        predicates.push(Predicate::threshold(
            op,
            seconds,
            |q: &QuestionRow| q.average_answer_time_seconds,
        ));
    }
    if let Some(percent) = percent {
        predicates.push(Predicate::threshold(
            percent.op,
            percent.percent,
            |q: &QuestionRow| q.percent_correct as f64,
        ));
    }
    predicates
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionCharts {
    /// `first` is correct answers, `second` incorrect.
    pub answers_by_type: Vec<PairBucket>,
    pub questions_by_type: Vec<Bucket>,
}

pub fn charts(rows: &[&QuestionRow]) -> QuestionCharts {
    QuestionCharts {
        answers_by_type: aggregate::split_by(
            rows.iter().copied(),
            |q: &QuestionRow| q.kind.clone(),
            |q: &QuestionRow| q.total_correctly_answered as f64,
            |q: &QuestionRow| (q.total_answered - q.total_correctly_answered) as f64,
        ),
        questions_by_type: aggregate::ranked(
            rows.iter().copied(),
            |q: &QuestionRow| q.kind.clone(),
            &Measure::Count,
        ),
    }
}

/// Answered and correctly answered counts in video order.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelinePoint {
    pub label: String,
    pub answered: i64,
    pub correct: i64,
}

pub fn answers_timeline(rows: &[&QuestionRow]) -> Vec<TimelinePoint> {
    let mut ordered: Vec<&QuestionRow> = rows.to_vec();
    ordered.sort_by(|a, b| a.video_time_seconds.total_cmp(&b.video_time_seconds));
    ordered
        .into_iter()
        .map(|q| TimelinePoint {
            label: format!("{} ({}s)", q.title, q.video_time_seconds),
            answered: q.total_answered,
            correct: q.total_correctly_answered,
        })
        .collect()
}

/// The question whose answers are broken down when none is chosen.
pub fn default_selected_question(rows: &[QuestionRow]) -> Option<i64> {
    rows.iter()
        .find(|q| is_graded(&q.kind))
        .map(|q| q.question_id)
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerSlice {
    pub label: String,
    pub count: i64,
    pub percent: f64,
    pub is_correct: bool,
}

fn shorten(label: &str) -> String {
    if label.chars().count() > LABEL_LIMIT {
        let kept: String = label.chars().take(LABEL_KEEP).collect();
        format!("{kept}...")
    } else {
        label.to_string()
    }
}

/// How the answers to `question_id` were spread, most chosen first, as a
/// share of everyone who answered it.
pub fn answer_breakdown(
    answers: &[QuestionAnswer],
    question_id: i64,
    total_answered: i64,
) -> Vec<AnswerSlice> {
    let mut slices: Vec<AnswerSlice> = answers
        .iter()
        .filter(|answer| answer.question.question_id == question_id)
        .map(|answer| AnswerSlice {
            label: shorten(&answer.label),
            count: answer.answered_count,
            percent: aggregate::percent_of(answer.answered_count as f64, total_answered as f64),
            is_correct: answer.is_correct_answer,
        })
        .collect();
    slices.sort_by(|a, b| b.count.cmp(&a.count));
    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::filter_records;
    use crate::table::{sort_rows, Collation, SortDirection, SortState};

    fn question(id: i64, kind: &str, answered: i64, correct: i64) -> Question {
        Question {
            question_id: id,
            title: format!("Question {id}"),
            kind: kind.to_string(),
            video_time_seconds: (10 - id) as f64,
            average_answer_time_seconds: id as f64 * 5.0,
            total_answered: answered,
            total_correctly_answered: correct,
            created_at: None,
        }
    }

    fn answer(question: &Question, label: &str, count: i64, correct: bool) -> QuestionAnswer {
        QuestionAnswer {
            question: question.clone(),
            label: label.to_string(),
            answered_count: count,
            is_correct_answer: correct,
        }
    }

    #[test]
    fn editor_markup_is_stripped_from_titles() {
        assert_eq!(clean_title("<!--TINYMCE-->\n<p>What is 2+2?</p>"), "What is 2+2?");
        assert_eq!(clean_title("<!--TINYMCE-->\nPick one"), "Pick one");
        assert_eq!(clean_title("Plain title"), "Plain title");
    }

    #[test]
    fn percent_correct_rounds_and_handles_no_answers() {
        assert_eq!(QuestionRow::from(question(1, "mc", 3, 2)).percent_correct, 67);
        assert_eq!(QuestionRow::from(question(2, "mc", 0, 0)).percent_correct, 0);
    }

    #[test]
    fn percent_filter_parses_menu_options() {
        let filter: PercentFilter = ">= 25%".parse().unwrap();
        assert_eq!(filter.op, ThresholdOp::GreaterOrEqual);
        assert_eq!(filter.percent, 25.0);
        assert_eq!(parse_percent_filter(Some("all")).unwrap(), None);
        assert!("> 10".parse::<PercentFilter>().is_err());
    }

    #[test]
    fn filters_combine_type_time_and_percent() {
        let rows = decorate(vec![
            question(1, "mc", 10, 10),
            question(2, "mc", 10, 2),
            question(3, "essay", 10, 10),
            question(4, "mr", 10, 10),
        ]);
        let filters = FilterState {
            include: Some(["mc", "mr"].iter().map(|s| s.to_string()).collect()),
            threshold: Some((ThresholdOp::Greater, 5.0)),
            ..FilterState::default()
        };
        let percent = parse_percent_filter(Some("=100")).unwrap();

        let found = filter_records(&rows, "", &predicates(&filters, percent));
        let ids: Vec<i64> = found.iter().map(|q| q.question_id).collect();
        assert_eq!(ids, vec![4]);
    }

    #[test]
    fn time_threshold_honours_its_operator() {
        let rows = decorate(vec![question(2, "mc", 10, 5), question(3, "mc", 10, 5)]);
        let at_least = FilterState {
            threshold: Some((ThresholdOp::GreaterOrEqual, 10.0)),
            ..FilterState::default()
        };
        let strictly = FilterState {
            threshold: Some((ThresholdOp::Greater, 10.0)),
            ..FilterState::default()
        };

        assert_eq!(filter_records(&rows, "", &predicates(&at_least, None)).len(), 2);
        let found = filter_records(&rows, "", &predicates(&strictly, None));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].question_id, 3);
    }

    #[test]
    fn average_time_choices() {
        assert_eq!(parse_average_time("120").unwrap(), 120.0);
        assert_eq!(parse_average_time(" 0 ").unwrap(), 0.0);
        assert!(parse_average_time("45").is_err());
        assert!(parse_average_time("soon").is_err());
    }

    #[test]
    fn charts_split_correct_and_incorrect() {
        let rows = decorate(vec![
            question(1, "mc", 10, 7),
            question(2, "mc", 4, 1),
            question(3, "mr", 2, 2),
        ]);
        let refs: Vec<&QuestionRow> = rows.iter().collect();

        let charts = charts(&refs);

        assert_eq!(charts.answers_by_type[0].key, "mc");
        assert_eq!(charts.answers_by_type[0].first, 8.0);
        assert_eq!(charts.answers_by_type[0].second, 6.0);
        assert_eq!(charts.questions_by_type[0].total, 2.0);
        assert_eq!(charts.questions_by_type[0].percent, 66.7);
    }

    #[test]
    fn timeline_follows_video_time() {
        let rows = decorate(vec![question(1, "mc", 1, 1), question(5, "mc", 2, 0)]);
        let refs: Vec<&QuestionRow> = rows.iter().collect();
        let points = answers_timeline(&refs);
        assert_eq!(points[0].label, "Question 5 (5s)");
        assert_eq!(points[1].answered, 1);
    }

    #[test]
    fn default_question_skips_ungraded() {
        let rows = decorate(vec![question(1, "essay", 1, 0), question(2, "mc", 1, 1)]);
        assert_eq!(default_selected_question(&rows), Some(2));
        assert_eq!(default_selected_question(&decorate(vec![question(1, "open", 0, 0)])), None);
    }

    #[test]
    fn breakdown_sorts_and_shortens_labels() {
        let q = question(1, "mc", 4, 1);
        let other = question(2, "mc", 1, 1);
        let answers = vec![
            answer(&q, "Yes", 1, true),
            answer(&q, "An answer label that is far too long to show", 3, false),
            answer(&other, "Ignored", 1, true),
        ];

        let slices = answer_breakdown(&answers, 1, q.total_answered);

        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].label, "An answer label that is far...");
        assert_eq!(slices[0].percent, 75.0);
        assert!(slices[1].is_correct);
        assert!(answer_breakdown(&answers, 1, 0)[0].percent.is_finite());
    }

    #[test]
    fn percent_correct_sorts_descending_by_default() {
        let rows = decorate(vec![question(1, "mc", 4, 1), question(2, "mc", 4, 3)]);
        let mut refs: Vec<&QuestionRow> = rows.iter().collect();
        let mut state = SortState::for_column(DEFAULT_SORT, &COLUMNS);
        state.toggle("percent_correct", &COLUMNS);
        assert_eq!(state.direction, SortDirection::Descending);
        sort_rows(&mut refs, &state, &Collation::new());
        assert_eq!(refs[0].question_id, 2);
    }
}
