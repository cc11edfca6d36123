//! Shape raw API payloads into warehouse rows.
//!
//! Everything here is pure: the caller stamps `ingested_at` once per chunk
//! or batch and passes it in.

use chrono::{DateTime, NaiveDate, Utc};
use ga4_client::RunReportResponse;
use graph_client::{InsightMetric, PostInsights, PostStub};
use socialsync_common::{
    truncate_chars, IngestError, MetricRow, PostRow, Result, TrafficRow, MESSAGE_MAX_CHARS,
};
use tracing::debug;

use crate::sources::TRAFFIC_METRICS;

/// Flatten a page insights payload into one row per metric per day.
///
/// A payload with no `data` section (or `data: null`) is an empty result.
pub fn normalize_page_insights(
    payload: &serde_json::Value,
    ingested_at: DateTime<Utc>,
) -> Result<Vec<MetricRow>> {
    let data = match payload.get("data") {
        None | Some(serde_json::Value::Null) => return Ok(Vec::new()),
        Some(data) if !data.is_array() => {
            return Err(IngestError::PermanentFetch(
                "insights payload: `data` is not an array".to_string(),
            ))
        }
        Some(data) => data,
    };

    let metrics: Vec<InsightMetric> = serde_json::from_value(data.clone())
        .map_err(|e| IngestError::PermanentFetch(format!("insights payload: {e}")))?;

    let mut rows = Vec::new();
    for metric in &metrics {
        for point in &metric.values {
            let Some(value) = point.value.as_f64() else {
                debug!(metric = metric.name.as_str(), value = %point.value, "Skipping non-numeric insight value");
                continue;
            };
            let date = insight_date(point.end_time.as_deref(), &metric.name)?;
            rows.push(MetricRow {
                date,
                metric_name: metric.name.clone(),
                value,
                ingestion_time: ingested_at,
            });
        }
    }
    Ok(rows)
}

/// Calendar date of an insight `end_time`: its first ten characters.
fn insight_date(end_time: Option<&str>, metric: &str) -> Result<NaiveDate> {
    let raw = end_time.ok_or_else(|| {
        IngestError::PermanentFetch(format!("insight value for {metric} has no end_time"))
    })?;
    raw.get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        .ok_or_else(|| {
            IngestError::PermanentFetch(format!("insight end_time for {metric} is malformed: {raw}"))
        })
}

/// Merge a listed post with its detail numbers.
pub fn post_row(stub: &PostStub, insights: PostInsights, ingested_at: DateTime<Utc>) -> PostRow {
    PostRow {
        post_id: stub.id.clone(),
        created_at: stub.created_time,
        message: stub
            .message
            .as_deref()
            .map(|m| truncate_chars(m, MESSAGE_MAX_CHARS))
            .unwrap_or_default(),
        post_url: stub.permalink_url.clone().unwrap_or_default(),
        impressions: insights.impressions,
        engaged_users: insights.engaged_users,
        likes: stub.like_count(),
        ingestion_time: ingested_at,
    }
}

/// One traffic row per report row. Metric columns are located by header
/// name; a report without headers is read positionally.
pub fn normalize_traffic_report(
    report: &RunReportResponse,
    ingested_at: DateTime<Utc>,
) -> Result<Vec<TrafficRow>> {
    let columns = metric_columns(report)?;

    report
        .rows
        .iter()
        .map(|row| {
            let raw_date = row
                .dimension_values
                .first()
                .map(|c| c.value.as_str())
                .unwrap_or_default();
            let date = NaiveDate::parse_from_str(raw_date, "%Y%m%d").map_err(|_| {
                IngestError::PermanentFetch(format!("report date is malformed: {raw_date:?}"))
            })?;

            let metric = |i: usize| -> Result<i64> {
                match row.metric_values.get(columns[i]) {
                    Some(cell) => parse_count(&cell.value),
                    None => Ok(0),
                }
            };

            Ok(TrafficRow {
                date,
                sessions: metric(0)?,
                active_users: metric(1)?,
                page_views: metric(2)?,
                event_count: metric(3)?,
                ingestion_time: ingested_at,
            })
        })
        .collect()
}

/// Column of each traffic metric. When headers are present every metric
/// must be named in them.
fn metric_columns(report: &RunReportResponse) -> Result<Vec<usize>> {
    if report.metric_headers.is_empty() {
        return Ok((0..TRAFFIC_METRICS.len()).collect());
    }
    TRAFFIC_METRICS
        .iter()
        .map(|name| {
            report.metric_index(name).ok_or_else(|| {
                IngestError::PermanentFetch(format!("report has no {name} metric column"))
            })
        })
        .collect()
}

fn parse_count(raw: &str) -> Result<i64> {
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse::<i64>()
        .or_else(|_| raw.parse::<f64>().map(|v| v.round() as i64))
        .map_err(|_| IngestError::PermanentFetch(format!("report metric is not a number: {raw:?}")))
}
