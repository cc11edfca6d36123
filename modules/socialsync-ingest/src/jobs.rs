//! Chunk jobs for the two time-series sources.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use ga4_client::RunReportResponse;
use socialsync_common::{DateRange, IngestError, MetricRow, Result, TrafficRow};

use crate::backfill::ChunkJob;
use crate::normalize::{normalize_page_insights, normalize_traffic_report};
use crate::retry::RetryPolicy;
use crate::sources::{InsightsSource, TrafficSource};

/// Unix timestamp of UTC midnight at the start of `day`.
pub fn utc_midnight(day: NaiveDate) -> i64 {
    day.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

pub struct PageInsightsJob<'a> {
    source: &'a dyn InsightsSource,
    retry: &'a RetryPolicy,
}

impl<'a> PageInsightsJob<'a> {
    pub fn new(source: &'a dyn InsightsSource, retry: &'a RetryPolicy) -> Self {
        Self { source, retry }
    }
}

#[async_trait]
impl<'a> ChunkJob for PageInsightsJob<'a> {
    type Payload = serde_json::Value;
    type Row = MetricRow;

    fn name(&self) -> &str {
        "page_insights"
    }

    async fn fetch(&self, chunk: DateRange) -> Result<serde_json::Value> {
        let since = utc_midnight(chunk.start);
        let until = utc_midnight(chunk.end);
        self.retry
            .run("page_insights", || self.source.fetch_insights(since, until))
            .await
    }

    fn normalize(
        &self,
        payload: serde_json::Value,
        ingested_at: DateTime<Utc>,
    ) -> Result<Vec<MetricRow>> {
        normalize_page_insights(&payload, ingested_at)
    }
}

pub struct TrafficJob<'a> {
    source: &'a dyn TrafficSource,
    retry: &'a RetryPolicy,
}

impl<'a> TrafficJob<'a> {
    pub fn new(source: &'a dyn TrafficSource, retry: &'a RetryPolicy) -> Self {
        Self { source, retry }
    }
}

#[async_trait]
impl<'a> ChunkJob for TrafficJob<'a> {
    type Payload = RunReportResponse;
    type Row = TrafficRow;

    fn name(&self) -> &str {
        "traffic"
    }

    async fn fetch(&self, chunk: DateRange) -> Result<RunReportResponse> {
        let last_day = chunk
            .last_day()
            .ok_or_else(|| IngestError::Config(format!("empty chunk {chunk}")))?;
        self.retry
            .run("traffic_report", || {
                self.source.daily_report(chunk.start, last_day)
            })
            .await
    }

    fn normalize(
        &self,
        payload: RunReportResponse,
        ingested_at: DateTime<Utc>,
    ) -> Result<Vec<TrafficRow>> {
        normalize_traffic_report(&payload, ingested_at)
    }
}
