use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Body of a `properties/{id}:runReport` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportRequest {
    pub date_ranges: Vec<ReportDateRange>,
    pub dimensions: Vec<Named>,
    pub metrics: Vec<Named>,
}

/// Inclusive on both ends, formatted `YYYY-MM-DD`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDateRange {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Named {
    pub name: String,
}

impl Named {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl RunReportRequest {
    /// One row per day between `first_day` and `last_day` (both inclusive).
    pub fn daily(first_day: NaiveDate, last_day: NaiveDate, metrics: &[&str]) -> Self {
        Self {
            date_ranges: vec![ReportDateRange {
                start_date: first_day.format("%Y-%m-%d").to_string(),
                end_date: last_day.format("%Y-%m-%d").to_string(),
            }],
            dimensions: vec![Named::new("date")],
            metrics: metrics.iter().map(|m| Named::new(m)).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportResponse {
    #[serde(default)]
    pub dimension_headers: Vec<Named>,
    #[serde(default)]
    pub metric_headers: Vec<Named>,
    #[serde(default)]
    pub rows: Vec<ReportRow>,
    pub row_count: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(default)]
    pub dimension_values: Vec<CellValue>,
    #[serde(default)]
    pub metric_values: Vec<CellValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CellValue {
    #[serde(default)]
    pub value: String,
}

impl RunReportResponse {
    /// Position of a metric column by header name.
    pub fn metric_index(&self, name: &str) -> Option<usize> {
        self.metric_headers.iter().position(|h| h.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn daily_request_serializes_camel_case() {
        let req = RunReportRequest::daily(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 30).unwrap(),
            &["sessions", "activeUsers"],
        );
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(
            body,
            json!({
                "dateRanges": [{ "startDate": "2024-01-01", "endDate": "2024-01-30" }],
                "dimensions": [{ "name": "date" }],
                "metrics": [{ "name": "sessions" }, { "name": "activeUsers" }]
            })
        );
    }

    #[test]
    fn response_tolerates_missing_rows() {
        let resp: RunReportResponse = serde_json::from_value(json!({
            "metricHeaders": [{ "name": "sessions", "type": "TYPE_INTEGER" }],
            "kind": "analyticsData#runReport"
        }))
        .unwrap();
        assert!(resp.rows.is_empty());
        assert_eq!(resp.metric_index("sessions"), Some(0));
        assert_eq!(resp.metric_index("eventCount"), None);
    }
}
