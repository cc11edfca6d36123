pub mod error;
pub mod types;

pub use error::{GraphError, Result};
pub use types::{
    parse_graph_time, InsightMetric, InsightValue, Page, PageInfo, Paging, PostInsights, PostStub,
};

use std::time::Duration;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;

const BASE_URL: &str = "https://graph.facebook.com";

/// Fields requested for each post on the `/posts` edge. `likes.summary(true).limit(0)`
/// returns only the like total, not the likers.
const POST_FIELDS: &str = "id,created_time,message,permalink_url,likes.summary(true).limit(0)";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
    page_id: String,
    token: String,
}

impl GraphClient {
    pub fn new(api_version: &str, page_id: &str, token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/{}", BASE_URL, api_version.trim_matches('/')),
            page_id: page_id.to_string(),
            token: token.to_string(),
        })
    }

    /// Point the client at a different host (proxies, recorded fixtures).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Daily page insights between two Unix timestamps. Returned undecoded;
    /// the caller decides how to shape the series.
    pub async fn page_insights(
        &self,
        metrics: &[String],
        since: i64,
        until: i64,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/{}/insights", self.base_url, self.page_id);
        let metric = metrics.join(",");
        let since = since.to_string();
        let until = until.to_string();

        tracing::debug!(page_id = %self.page_id, %since, %until, "Fetching page insights");

        let request = self.client.get(&url).query(&[
            ("metric", metric.as_str()),
            ("period", "day"),
            ("since", since.as_str()),
            ("until", until.as_str()),
            ("access_token", self.token.as_str()),
        ]);
        self.send_json(request).await
    }

    /// Creation date of the page, used as the earliest point worth backfilling.
    pub async fn page_created_date(&self) -> Result<Option<NaiveDate>> {
        let url = format!("{}/{}", self.base_url, self.page_id);
        let request = self.client.get(&url).query(&[
            ("fields", "created_time"),
            ("access_token", self.token.as_str()),
        ]);
        let info: PageInfo = self.send_json(request).await?;
        Ok(info.created_date())
    }

    /// First page of the page's posts.
    pub async fn posts_first_page(&self, limit: u32) -> Result<Page<PostStub>> {
        let url = format!("{}/{}/posts", self.base_url, self.page_id);
        let limit = limit.to_string();
        let request = self.client.get(&url).query(&[
            ("fields", POST_FIELDS),
            ("limit", limit.as_str()),
            ("access_token", self.token.as_str()),
        ]);
        self.send_json(request).await
    }

    /// Follow a `paging.next` URL. The URL is used as-is: it already carries
    /// fields, limit, cursor and token.
    pub async fn posts_next_page(&self, next_url: &str) -> Result<Page<PostStub>> {
        self.send_json(self.client.get(next_url)).await
    }

    /// Lifetime impressions and engaged users for one post.
    pub async fn post_insights(&self, post_id: &str) -> Result<PostInsights> {
        let url = format!("{}/{}/insights", self.base_url, post_id);
        let metric = format!("{},{}", types::POST_IMPRESSIONS, types::POST_ENGAGED_USERS);
        let request = self.client.get(&url).query(&[
            ("metric", metric.as_str()),
            ("access_token", self.token.as_str()),
        ]);
        let page: Page<InsightMetric> = self.send_json(request).await?;
        Ok(PostInsights::from_metrics(&page.data))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let resp = request.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GraphError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
