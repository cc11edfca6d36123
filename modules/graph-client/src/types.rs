use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

/// Timestamp layout used by the Graph API, e.g. `2024-05-01T07:00:00+0000`.
const GRAPH_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Metrics requested from the per-post insights endpoint.
pub const POST_IMPRESSIONS: &str = "post_impressions";
pub const POST_ENGAGED_USERS: &str = "post_engaged_users";

/// Parse a Graph API timestamp into UTC.
pub fn parse_graph_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, GRAPH_TIME_FORMAT)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn graph_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_graph_time(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid Graph timestamp: {raw}")))
}

// --- Pagination envelope ---

/// One page of a Graph API edge. `paging.next` is a fully-formed URL that
/// already carries every query parameter of the original request.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    pub paging: Option<Paging>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paging {
    pub next: Option<String>,
    pub previous: Option<String>,
}

impl<T> Page<T> {
    /// Continuation URL for the following page, if the server sent one.
    pub fn next_url(&self) -> Option<&str> {
        self.paging
            .as_ref()
            .and_then(|p| p.next.as_deref())
            .filter(|url| !url.is_empty())
    }
}

// --- Page metadata ---

/// Subset of page fields requested with `fields=created_time`.
#[derive(Debug, Clone, Deserialize)]
pub struct PageInfo {
    pub id: Option<String>,
    pub created_time: Option<String>,
}

impl PageInfo {
    /// Calendar date the page was created, if the field was present and well-formed.
    pub fn created_date(&self) -> Option<NaiveDate> {
        let raw = self.created_time.as_deref()?;
        let day = raw.get(..10)?;
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }
}

// --- Posts ---

/// A post as listed by the `/{page_id}/posts` edge.
#[derive(Debug, Clone, Deserialize)]
pub struct PostStub {
    pub id: String,
    #[serde(deserialize_with = "graph_time")]
    pub created_time: DateTime<Utc>,
    pub message: Option<String>,
    pub permalink_url: Option<String>,
    pub likes: Option<LikesField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LikesField {
    pub summary: Option<LikesSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LikesSummary {
    #[serde(default)]
    pub total_count: i64,
}

impl PostStub {
    /// Like count from the `likes.summary(true)` expansion; 0 when absent.
    pub fn like_count(&self) -> i64 {
        self.likes
            .as_ref()
            .and_then(|l| l.summary.as_ref())
            .map(|s| s.total_count)
            .unwrap_or(0)
    }
}

// --- Insights ---

/// One metric series from an `/insights` edge.
#[derive(Debug, Clone, Deserialize)]
pub struct InsightMetric {
    pub name: String,
    pub period: Option<String>,
    #[serde(default)]
    pub values: Vec<InsightValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsightValue {
    #[serde(default)]
    pub value: serde_json::Value,
    pub end_time: Option<String>,
}

/// Lifetime insight numbers for a single post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostInsights {
    pub impressions: i64,
    pub engaged_users: i64,
}

impl PostInsights {
    /// Pick the first value of each known metric. Unknown metrics and
    /// non-numeric values are ignored.
    pub fn from_metrics(metrics: &[InsightMetric]) -> Self {
        let mut insights = Self::default();
        for metric in metrics {
            let Some(value) = metric.values.first().and_then(|v| as_count(&v.value)) else {
                continue;
            };
            match metric.name.as_str() {
                POST_IMPRESSIONS => insights.impressions = value,
                POST_ENGAGED_USERS => insights.engaged_users = value,
                _ => {}
            }
        }
        insights
    }
}

fn as_count(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn post_stub_parses_graph_payload() {
        let stub: PostStub = serde_json::from_value(json!({
            "id": "123_456",
            "created_time": "2024-05-01T12:30:00+0000",
            "message": "Karaoke night!",
            "permalink_url": "https://facebook.com/123/posts/456",
            "likes": { "data": [], "summary": { "total_count": 42 } }
        }))
        .unwrap();

        assert_eq!(stub.id, "123_456");
        assert_eq!(stub.created_time.to_rfc3339(), "2024-05-01T12:30:00+00:00");
        assert_eq!(stub.like_count(), 42);
    }

    #[test]
    fn post_stub_without_likes_counts_zero() {
        let stub: PostStub = serde_json::from_value(json!({
            "id": "1",
            "created_time": "2024-05-01T00:00:00+0000"
        }))
        .unwrap();
        assert_eq!(stub.like_count(), 0);
        assert!(stub.message.is_none());
    }

    #[test]
    fn post_stub_rejects_malformed_timestamp() {
        let result: Result<PostStub, _> = serde_json::from_value(json!({
            "id": "1",
            "created_time": "yesterday"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn page_next_url_ignores_missing_and_empty() {
        let page: Page<PostStub> = serde_json::from_value(json!({ "data": [] })).unwrap();
        assert!(page.next_url().is_none());

        let page: Page<PostStub> =
            serde_json::from_value(json!({ "data": [], "paging": { "next": "" } })).unwrap();
        assert!(page.next_url().is_none());

        let page: Page<PostStub> = serde_json::from_value(
            json!({ "data": [], "paging": { "next": "https://graph.facebook.com/next" } }),
        )
        .unwrap();
        assert_eq!(page.next_url(), Some("https://graph.facebook.com/next"));
    }

    #[test]
    fn post_insights_picks_known_metrics() {
        let metrics: Vec<InsightMetric> = serde_json::from_value(json!([
            { "name": "post_impressions", "period": "lifetime", "values": [{ "value": 1500 }] },
            { "name": "post_engaged_users", "period": "lifetime", "values": [{ "value": 87 }] },
            { "name": "post_clicks", "period": "lifetime", "values": [{ "value": 9 }] }
        ]))
        .unwrap();

        let insights = PostInsights::from_metrics(&metrics);
        assert_eq!(insights.impressions, 1500);
        assert_eq!(insights.engaged_users, 87);
    }

    #[test]
    fn post_insights_default_to_zero_for_missing_values() {
        let metrics: Vec<InsightMetric> = serde_json::from_value(json!([
            { "name": "post_impressions", "values": [] },
            { "name": "post_engaged_users", "values": [{ "value": { "a": 1 } }] }
        ]))
        .unwrap();
        assert_eq!(PostInsights::from_metrics(&metrics), PostInsights::default());
    }

    #[test]
    fn page_info_created_date_truncates_timestamp() {
        let info = PageInfo {
            id: Some("1".into()),
            created_time: Some("2023-01-01T08:15:00+0000".into()),
        };
        assert_eq!(
            info.created_date(),
            NaiveDate::from_ymd_opt(2023, 1, 1)
        );

        let missing = PageInfo {
            id: None,
            created_time: None,
        };
        assert!(missing.created_date().is_none());
    }
}
