//! Trait boundaries for the external analytics APIs, and their production
//! implementations over the Graph and GA4 clients.
//!
//! Stages only ever see these traits; tests swap in the fakes from
//! `crate::testing`.

use async_trait::async_trait;
use chrono::NaiveDate;
use ga4_client::{Ga4Client, RunReportRequest, RunReportResponse};
use graph_client::{GraphClient, Page, PostInsights, PostStub};
use socialsync_common::Result;

/// Metrics requested from the analytics report, in column order.
pub const TRAFFIC_METRICS: [&str; 4] = ["sessions", "activeUsers", "screenPageViews", "eventCount"];

/// Daily page-level insight series.
#[async_trait]
pub trait InsightsSource: Send + Sync {
    /// Raw insights payload between two Unix timestamps.
    async fn fetch_insights(&self, since: i64, until: i64) -> Result<serde_json::Value>;
}

/// Earliest date a source has data for. `Ok(None)` means the source does
/// not know.
#[async_trait]
pub trait OriginSource: Send + Sync {
    async fn origin_date(&self) -> Result<Option<NaiveDate>>;
}

/// Paginated post listing plus per-post detail.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn first_posts_page(&self) -> Result<Page<PostStub>>;

    /// Continuation request for a `paging.next` URL.
    async fn next_posts_page(&self, next_url: &str) -> Result<Page<PostStub>>;

    async fn post_insights(&self, post_id: &str) -> Result<PostInsights>;
}

/// Date-ranged traffic report. Bounds are inclusive.
#[async_trait]
pub trait TrafficSource: Send + Sync {
    async fn daily_report(&self, first_day: NaiveDate, last_day: NaiveDate)
        -> Result<RunReportResponse>;
}

// ---------------------------------------------------------------------------
// GraphSource (production)
// ---------------------------------------------------------------------------

pub struct GraphSource {
    client: GraphClient,
    metrics: Vec<String>,
    page_size: u32,
}

impl GraphSource {
    pub fn new(client: GraphClient, metrics: Vec<String>, page_size: u32) -> Self {
        Self {
            client,
            metrics,
            page_size,
        }
    }
}

#[async_trait]
impl InsightsSource for GraphSource {
    async fn fetch_insights(&self, since: i64, until: i64) -> Result<serde_json::Value> {
        Ok(self.client.page_insights(&self.metrics, since, until).await?)
    }
}

#[async_trait]
impl OriginSource for GraphSource {
    async fn origin_date(&self) -> Result<Option<NaiveDate>> {
        Ok(self.client.page_created_date().await?)
    }
}

#[async_trait]
impl PostSource for GraphSource {
    async fn first_posts_page(&self) -> Result<Page<PostStub>> {
        Ok(self.client.posts_first_page(self.page_size).await?)
    }

    async fn next_posts_page(&self, next_url: &str) -> Result<Page<PostStub>> {
        Ok(self.client.posts_next_page(next_url).await?)
    }

    async fn post_insights(&self, post_id: &str) -> Result<PostInsights> {
        Ok(self.client.post_insights(post_id).await?)
    }
}

// ---------------------------------------------------------------------------
// Ga4Source (production)
// ---------------------------------------------------------------------------

pub struct Ga4Source {
    client: Ga4Client,
}

impl Ga4Source {
    pub fn new(client: Ga4Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TrafficSource for Ga4Source {
    async fn daily_report(
        &self,
        first_day: NaiveDate,
        last_day: NaiveDate,
    ) -> Result<RunReportResponse> {
        let request = RunReportRequest::daily(first_day, last_day, &TRAFFIC_METRICS);
        Ok(self.client.run_report(&request).await?)
    }
}

// ---------------------------------------------------------------------------
// FixedOrigin
// ---------------------------------------------------------------------------

/// Origin known up front, e.g. a configured first day of tracking.
pub struct FixedOrigin(pub NaiveDate);

#[async_trait]
impl OriginSource for FixedOrigin {
    async fn origin_date(&self) -> Result<Option<NaiveDate>> {
        Ok(Some(self.0))
    }
}
