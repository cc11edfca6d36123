// Fake sources for pipeline tests.
//
// One fake per trait boundary:
// - FakeInsightsSource (InsightsSource): one value per day, optional failing chunk
// - FakePostSource (PostSource): numbered pages, failing pages and posts
// - FakeTrafficSource (TrafficSource): one report row per day
// - FailingOrigin (OriginSource): origin lookup that always errors
//
// Plus `stub()` for building post stubs by hand.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use ga4_client::RunReportResponse;
use graph_client::types::{LikesField, LikesSummary};
use graph_client::{Page, Paging, PostInsights, PostStub};
use serde_json::json;
use socialsync_common::{IngestError, Result};

use crate::sources::{InsightsSource, OriginSource, PostSource, TrafficSource};

/// Metric name produced by [`FakeInsightsSource`].
pub const FAKE_METRIC: &str = "page_impressions";

/// Numbers every successful post detail fetch returns.
pub const FAKE_POST_INSIGHTS: PostInsights = PostInsights {
    impressions: 100,
    engaged_users: 10,
};

fn day_from_unix(ts: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
}

// ---------------------------------------------------------------------------
// FakeInsightsSource
// ---------------------------------------------------------------------------

/// Answers every request with one `FAKE_METRIC` value per day in
/// `[since, until)`. A chunk can be made to fail transiently on every attempt.
pub struct FakeInsightsSource {
    requests: Mutex<Vec<(i64, i64)>>,
    failing_since: Option<i64>,
    fixed_payload: Option<serde_json::Value>,
}

impl FakeInsightsSource {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            failing_since: None,
            fixed_payload: None,
        }
    }

    /// Every request whose `since` is midnight of `start` fails with a
    /// transient error.
    pub fn fail_chunk_starting(mut self, start: NaiveDate) -> Self {
        self.failing_since = Some(crate::jobs::utc_midnight(start));
        self
    }

    /// Return `payload` for every request instead of generated values.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.fixed_payload = Some(payload);
        self
    }

    /// `(since, until)` of every request, in call order.
    pub fn requests(&self) -> Vec<(i64, i64)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, start: NaiveDate) -> usize {
        let since = crate::jobs::utc_midnight(start);
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == since)
            .count()
    }
}

impl Default for FakeInsightsSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InsightsSource for FakeInsightsSource {
    async fn fetch_insights(&self, since: i64, until: i64) -> Result<serde_json::Value> {
        self.requests.lock().unwrap().push((since, until));

        if self.failing_since == Some(since) {
            return Err(IngestError::TransientFetch(
                "HTTP 503: service unavailable".to_string(),
            ));
        }
        if let Some(payload) = &self.fixed_payload {
            return Ok(payload.clone());
        }

        let (Some(first), Some(end)) = (day_from_unix(since), day_from_unix(until)) else {
            return Err(IngestError::PermanentFetch("bad timestamps".to_string()));
        };
        let mut values = Vec::new();
        let mut day = first;
        while day < end {
            values.push(json!({
                "value": 10,
                "end_time": format!("{}T07:00:00+0000", day.format("%Y-%m-%d")),
            }));
            day = day + Days::new(1);
        }
        Ok(json!({ "data": [{ "name": FAKE_METRIC, "period": "day", "values": values }] }))
    }
}

// ---------------------------------------------------------------------------
// Origins
// ---------------------------------------------------------------------------

/// Origin lookup that always fails.
pub struct FailingOrigin;

#[async_trait]
impl OriginSource for FailingOrigin {
    async fn origin_date(&self) -> Result<Option<NaiveDate>> {
        Err(IngestError::PermanentFetch(
            "HTTP 403: missing pages_read_engagement".to_string(),
        ))
    }
}

// ---------------------------------------------------------------------------
// FakePostSource
// ---------------------------------------------------------------------------

/// Build a post stub with a fixed creation time.
pub fn stub(id: &str) -> PostStub {
    PostStub {
        id: id.to_string(),
        created_time: Utc
            .with_ymd_and_hms(2024, 5, 1, 10, 0, 0)
            .single()
            .unwrap_or_default(),
        message: Some(format!("Post {id}")),
        permalink_url: Some(format!("https://www.facebook.com/{id}")),
        likes: Some(LikesField {
            summary: Some(LikesSummary { total_count: 5 }),
        }),
    }
}

/// Serves pages of posts sized by `with_pages`. Page `n` links to
/// `page:{n+1}` except the last page, which has no cursor. Post ids are
/// `p{page}_{index}`.
pub struct FakePostSource {
    page_sizes: Vec<usize>,
    failing_page: Option<usize>,
    failing_posts: HashSet<String>,
    continuations: Mutex<Vec<String>>,
    insight_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakePostSource {
    pub fn with_pages(page_sizes: Vec<usize>) -> Self {
        Self {
            page_sizes,
            failing_page: None,
            failing_posts: HashSet::new(),
            continuations: Mutex::new(Vec::new()),
            insight_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Page `n` (1-based) fails with a permanent error.
    pub fn fail_page(mut self, n: usize) -> Self {
        self.failing_page = Some(n);
        self
    }

    /// Detail fetches for these ids fail with a permanent error.
    pub fn fail_insights_for(mut self, ids: &[&str]) -> Self {
        self.failing_posts = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn continuation_urls(&self) -> Vec<String> {
        self.continuations.lock().unwrap().clone()
    }

    pub fn insight_calls(&self) -> usize {
        self.insight_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Every post id the listing would return, in page order.
    pub fn all_ids(&self) -> Vec<String> {
        self.page_sizes
            .iter()
            .enumerate()
            .flat_map(|(i, size)| (0..*size).map(move |j| format!("p{}_{}", i + 1, j)))
            .collect()
    }

    fn page(&self, n: usize) -> Result<Page<PostStub>> {
        if self.failing_page == Some(n) {
            return Err(IngestError::PermanentFetch(format!(
                "HTTP 400: invalid cursor for page {n}"
            )));
        }
        let size = n
            .checked_sub(1)
            .and_then(|i| self.page_sizes.get(i))
            .copied()
            .unwrap_or(0);
        let data = (0..size).map(|j| stub(&format!("p{n}_{j}"))).collect();
        let next = (n < self.page_sizes.len()).then(|| format!("page:{}", n + 1));
        Ok(Page {
            data,
            paging: Some(Paging {
                next,
                previous: None,
            }),
        })
    }
}

#[async_trait]
impl PostSource for FakePostSource {
    async fn first_posts_page(&self) -> Result<Page<PostStub>> {
        self.page(1)
    }

    async fn next_posts_page(&self, next_url: &str) -> Result<Page<PostStub>> {
        self.continuations.lock().unwrap().push(next_url.to_string());
        let n = next_url
            .strip_prefix("page:")
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or_else(|| IngestError::PermanentFetch(format!("unknown cursor {next_url}")))?;
        self.page(n)
    }

    async fn post_insights(&self, post_id: &str) -> Result<PostInsights> {
        self.insight_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_posts.contains(post_id) {
            return Err(IngestError::PermanentFetch(format!(
                "HTTP 400: unsupported get request for {post_id}"
            )));
        }
        Ok(FAKE_POST_INSIGHTS)
    }
}

// ---------------------------------------------------------------------------
// FakeTrafficSource
// ---------------------------------------------------------------------------

/// Returns one report row per day in the requested inclusive range.
pub struct FakeTrafficSource {
    requests: Mutex<Vec<(NaiveDate, NaiveDate)>>,
    fail_always: bool,
}

impl FakeTrafficSource {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail_always: false,
        }
    }

    /// Every request fails with a permanent error.
    pub fn failing() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail_always: true,
        }
    }

    /// `(first_day, last_day)` of every request, in call order.
    pub fn requests(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for FakeTrafficSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrafficSource for FakeTrafficSource {
    async fn daily_report(
        &self,
        first_day: NaiveDate,
        last_day: NaiveDate,
    ) -> Result<RunReportResponse> {
        self.requests.lock().unwrap().push((first_day, last_day));
        if self.fail_always {
            return Err(IngestError::PermanentFetch(
                "HTTP 403: property access denied".to_string(),
            ));
        }

        let mut rows = Vec::new();
        let mut day = first_day;
        while day <= last_day {
            rows.push(json!({
                "dimensionValues": [{ "value": day.format("%Y%m%d").to_string() }],
                "metricValues": [
                    { "value": "12" },
                    { "value": "9" },
                    { "value": "30" },
                    { "value": "75" }
                ]
            }));
            day = day + Days::new(1);
        }
        let row_count = rows.len();
        let report = json!({
            "dimensionHeaders": [{ "name": "date" }],
            "metricHeaders": [
                { "name": "sessions" },
                { "name": "activeUsers" },
                { "name": "screenPageViews" },
                { "name": "eventCount" }
            ],
            "rows": rows,
            "rowCount": row_count,
        });
        serde_json::from_value(report).map_err(|e| IngestError::PermanentFetch(e.to_string()))
    }
}
