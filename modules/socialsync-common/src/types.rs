use std::fmt;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::schema::{Column, ColumnType, Row, Value};

/// Post messages are cut to this many characters before loading.
pub const MESSAGE_MAX_CHARS: usize = 200;

// --- Date ranges ---

/// Half-open interval `[start, end)` of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// True when the range holds no days (`start >= end`).
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn days(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start).num_days()
        }
    }

    /// Last day inside the range, for APIs that take inclusive bounds.
    pub fn last_day(&self) -> Option<NaiveDate> {
        if self.is_empty() {
            return None;
        }
        self.end.checked_sub_days(Days::new(1))
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// --- Table references ---

/// Fully-qualified warehouse table. `dataset` maps to a schema in the
/// warehouse; `project` names the warehouse itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(project: &str, dataset: &str, table: &str) -> Self {
        Self {
            project: project.to_string(),
            dataset: dataset.to_string(),
            table: table.to_string(),
        }
    }

    /// Reject anything that cannot be safely interpolated as an identifier.
    pub fn validate(&self) -> Result<(), IngestError> {
        for part in [&self.project, &self.dataset, &self.table] {
            validate_identifier(part).map_err(IngestError::Config)?;
        }
        Ok(())
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Identifier rules shared by every table part: non-empty, at most 63 bytes,
/// starts with a letter or underscore, then letters, digits or underscores.
pub fn validate_identifier(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("identifier must not be empty".to_string());
    }
    if name.len() > 63 {
        return Err(format!(
            "identifier '{name}' exceeds 63 bytes (got {})",
            name.len()
        ));
    }

    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(format!(
                "identifier '{name}' must start with a letter or underscore"
            ));
        }
    }
    if let Some(bad) = chars.find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(format!("identifier '{name}' contains invalid character '{bad}'"));
    }
    Ok(())
}

// --- Rows ---

/// One day of one page metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub date: NaiveDate,
    pub metric_name: String,
    pub value: f64,
    pub ingestion_time: DateTime<Utc>,
}

impl Row for MetricRow {
    const SCHEMA: &'static [Column] = &[
        Column::new("date", ColumnType::Date),
        Column::new("metric_name", ColumnType::Text),
        Column::new("value", ColumnType::Float),
        Column::new("ingestion_time", ColumnType::Timestamp),
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Date(self.date),
            Value::Text(self.metric_name.clone()),
            Value::Float(self.value),
            Value::Timestamp(self.ingestion_time),
        ]
    }
}

/// A post merged with its lifetime insights.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRow {
    pub post_id: String,
    pub created_at: DateTime<Utc>,
    pub message: String,
    pub post_url: String,
    pub impressions: i64,
    pub engaged_users: i64,
    pub likes: i64,
    pub ingestion_time: DateTime<Utc>,
}

impl Row for PostRow {
    const SCHEMA: &'static [Column] = &[
        Column::new("post_id", ColumnType::Text),
        Column::new("created_at", ColumnType::Timestamp),
        Column::new("message", ColumnType::Text),
        Column::new("post_url", ColumnType::Text),
        Column::new("impressions", ColumnType::Integer),
        Column::new("engaged_users", ColumnType::Integer),
        Column::new("likes", ColumnType::Integer),
        Column::new("ingestion_time", ColumnType::Timestamp),
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.post_id.clone()),
            Value::Timestamp(self.created_at),
            Value::Text(self.message.clone()),
            Value::Text(self.post_url.clone()),
            Value::Integer(self.impressions),
            Value::Integer(self.engaged_users),
            Value::Integer(self.likes),
            Value::Timestamp(self.ingestion_time),
        ]
    }
}

/// One day of site traffic from the analytics report.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficRow {
    pub date: NaiveDate,
    pub sessions: i64,
    pub active_users: i64,
    pub page_views: i64,
    pub event_count: i64,
    pub ingestion_time: DateTime<Utc>,
}

impl Row for TrafficRow {
    const SCHEMA: &'static [Column] = &[
        Column::new("date", ColumnType::Date),
        Column::new("sessions", ColumnType::Integer),
        Column::new("active_users", ColumnType::Integer),
        Column::new("page_views", ColumnType::Integer),
        Column::new("event_count", ColumnType::Integer),
        Column::new("ingestion_time", ColumnType::Timestamp),
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Date(self.date),
            Value::Integer(self.sessions),
            Value::Integer(self.active_users),
            Value::Integer(self.page_views),
            Value::Integer(self.event_count),
            Value::Timestamp(self.ingestion_time),
        ]
    }
}

/// Cut `text` to at most `max` characters without splitting a character.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn date_range_width_and_last_day() {
        let r = DateRange::new(day(2024, 1, 1), day(2024, 1, 31));
        assert_eq!(r.days(), 30);
        assert_eq!(r.last_day(), Some(day(2024, 1, 30)));
        assert_eq!(r.to_string(), "[2024-01-01, 2024-01-31)");
    }

    #[test]
    fn inverted_range_is_empty() {
        let r = DateRange::new(day(2024, 2, 1), day(2024, 1, 1));
        assert!(r.is_empty());
        assert_eq!(r.days(), 0);
        assert!(r.last_day().is_none());
    }

    #[test]
    fn identifiers_are_validated() {
        assert!(validate_identifier("social_analytics").is_ok());
        assert!(validate_identifier("_raw2").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2fast").is_err());
        assert!(validate_identifier("posts; DROP TABLE x").is_err());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }

    #[test]
    fn table_ref_displays_dotted_path() {
        let t = TableRef::new("analytics", "raw_social", "page_insights");
        assert!(t.validate().is_ok());
        assert_eq!(t.to_string(), "analytics.raw_social.page_insights");

        let bad = TableRef::new("analytics", "raw-social", "page_insights");
        assert!(matches!(bad.validate(), Err(IngestError::Config(_))));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("short", 200), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        let emoji = "🎤".repeat(250);
        let cut = truncate_chars(&emoji, MESSAGE_MAX_CHARS);
        assert_eq!(cut.chars().count(), MESSAGE_MAX_CHARS);
    }

    #[test]
    fn row_values_line_up_with_schema() {
        let now = Utc::now();
        let metric = MetricRow {
            date: day(2024, 5, 1),
            metric_name: "page_impressions".into(),
            value: 10.0,
            ingestion_time: now,
        };
        assert_eq!(metric.values().len(), MetricRow::SCHEMA.len());

        let post = PostRow {
            post_id: "1".into(),
            created_at: now,
            message: String::new(),
            post_url: String::new(),
            impressions: 0,
            engaged_users: 0,
            likes: 0,
            ingestion_time: now,
        };
        assert_eq!(post.values().len(), PostRow::SCHEMA.len());

        let traffic = TrafficRow {
            date: day(2024, 5, 1),
            sessions: 1,
            active_users: 1,
            page_views: 1,
            event_count: 1,
            ingestion_time: now,
        };
        assert_eq!(traffic.values().len(), TrafficRow::SCHEMA.len());
    }
}
