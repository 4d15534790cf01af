use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Body returned by `login/` and `register/`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub tokens: TokenPair,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub content_toggles: BTreeMap<String, bool>,
}

/// Boolean preference switches keyed by name. Non-boolean fields in the
/// response (ids, owner) are dropped.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ContentToggles(pub BTreeMap<String, bool>);

impl<'de> Deserialize<'de> for ContentToggles {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: BTreeMap<String, serde_json::Value> = BTreeMap::deserialize(deserializer)?;
        Ok(Self(
            raw.into_iter()
                .filter_map(|(name, value)| value.as_bool().map(|flag| (name, flag)))
                .collect(),
        ))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Video {
    pub video_id: i64,
    #[serde(default)]
    pub uuid: String,
    pub title: String,
    #[serde(default)]
    pub status: i64,
    #[serde(default, deserialize_with = "flexible_datetime::option")]
    pub created_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct VideoStats {
    pub video: Video,
    pub total_views: i64,
    pub started_views: i64,
    pub finished_views: i64,
    pub interaction_clicks: i64,
    pub video_duration_seconds: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Interaction {
    pub interaction_id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub action_type: String,
    #[serde(default)]
    pub start_time_seconds: f64,
    #[serde(default)]
    pub end_time_seconds: f64,
    #[serde(default)]
    pub duration_seconds: f64,
    #[serde(default)]
    pub link: String,
    pub total_clicks: i64,
    #[serde(default, deserialize_with = "flexible_datetime::option")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MonthlyViews {
    /// `YYYY-MM`
    pub month: String,
    pub total_views: i64,
    pub started_views: i64,
    pub finished_views: i64,
    pub passed_views: i64,
    pub failed_views: i64,
    pub unfinished_views: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ViewSession {
    pub session_id: i64,
    #[serde(default)]
    pub started_time_unix: i64,
    #[serde(default)]
    pub ended_time_unix: i64,
    #[serde(default)]
    pub viewer_timezone: String,
    pub viewer_os: String,
    pub viewer_browser: String,
    pub viewer_mobile: bool,
    #[serde(default)]
    pub last_reached_seconds: i64,
    #[serde(default)]
    pub last_reached_percent: f64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub os_version: String,
    #[serde(default)]
    pub browser_version: String,
    #[serde(default)]
    pub viewer_device: String,
    /// Views sharing this user agent.
    #[serde(default)]
    pub viewer_count: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Question {
    pub question_id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub video_time_seconds: f64,
    #[serde(default)]
    pub average_answer_time_seconds: f64,
    pub total_answered: i64,
    pub total_correctly_answered: i64,
    #[serde(default, deserialize_with = "flexible_datetime::option")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct QuestionAnswer {
    pub question: Question,
    pub label: String,
    pub answered_count: i64,
    pub is_correct_answer: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct VideoRating {
    pub video: Video,
    #[serde(default)]
    pub rating_id: i64,
    pub average_rating: f64,
    #[serde(default)]
    pub one_star: i64,
    #[serde(default)]
    pub two_star: i64,
    #[serde(default)]
    pub three_star: i64,
    #[serde(default)]
    pub four_star: i64,
    #[serde(default)]
    pub five_star: i64,
}

/// Total views per video for last month and the month before.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthOverMonth {
    pub video_id: String,
    pub last_month: i64,
    pub two_months_ago: i64,
}

impl MonthOverMonth {
    pub fn from_map(raw: BTreeMap<String, [i64; 2]>) -> Vec<Self> {
        raw.into_iter()
            .map(|(video_id, [last_month, two_months_ago])| Self {
                video_id,
                last_month,
                two_months_ago,
            })
            .collect()
    }

    pub fn change(&self) -> i64 {
        self.last_month - self.two_months_ago
    }
}

/// One page of a paginated list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound = "T: Deserialize<'de>")]
pub struct Paginated<T> {
    #[serde(default)]
    pub count: usize,
    pub next: Option<String>,
    #[serde(default)]
    pub results: Vec<T>,
}

/// Accepts RFC 3339 timestamps and naive `YYYY-MM-DDTHH:MM:SS[.f]` values,
/// reading the latter as UTC.
pub mod flexible_datetime {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(text) if text.trim().is_empty() => Ok(None),
            Some(text) => parse(&text)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {text:?}"))),
        }
    }
}
