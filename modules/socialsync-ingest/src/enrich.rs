//! Per-post detail fetches on a bounded pool.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use graph_client::{PostInsights, PostStub};
use socialsync_common::{IngestError, PostRow};
use tracing::{info, warn};

use crate::normalize::post_row;
use crate::retry::RetryPolicy;
use crate::sources::PostSource;

const PROGRESS_EVERY: usize = 50;

/// Result of enriching one post. A degraded row keeps the stub fields and
/// likes but carries zeroed insight numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    Complete(PostRow),
    Degraded { row: PostRow, cause: IngestError },
}

impl Enrichment {
    pub fn row(&self) -> &PostRow {
        match self {
            Enrichment::Complete(row) | Enrichment::Degraded { row, .. } => row,
        }
    }

    pub fn into_row(self) -> PostRow {
        match self {
            Enrichment::Complete(row) | Enrichment::Degraded { row, .. } => row,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Enrichment::Degraded { .. })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentStats {
    pub complete: usize,
    pub degraded: usize,
}

impl EnrichmentStats {
    pub fn from_results(results: &[Enrichment]) -> Self {
        let degraded = results.iter().filter(|r| r.is_degraded()).count();
        Self {
            complete: results.len() - degraded,
            degraded,
        }
    }
}

/// Fetch insights for every stub with at most `concurrency` requests in
/// flight. Always returns one result per stub, in completion order.
pub async fn enrich_posts(
    source: &dyn PostSource,
    stubs: Vec<PostStub>,
    concurrency: usize,
    retry: &RetryPolicy,
) -> Vec<Enrichment> {
    let total = stubs.len();
    info!(posts = total, concurrency, "Enriching posts");

    let mut pending = stream::iter(stubs.into_iter().map(|stub| async move {
        let outcome = retry
            .run("post_insights", || source.post_insights(&stub.id))
            .await;
        let ingested_at = Utc::now();
        match outcome {
            Ok(insights) => Enrichment::Complete(post_row(&stub, insights, ingested_at)),
            Err(cause) => {
                warn!(post_id = stub.id.as_str(), error = %cause, "Post insights unavailable, loading zeros");
                Enrichment::Degraded {
                    row: post_row(&stub, PostInsights::default(), ingested_at),
                    cause,
                }
            }
        }
    }))
    .buffer_unordered(concurrency.max(1));

    let mut results = Vec::with_capacity(total);
    while let Some(result) = pending.next().await {
        results.push(result);
        if results.len() % PROGRESS_EVERY == 0 {
            info!(done = results.len(), total, "Enrichment progress");
        }
    }

    let stats = EnrichmentStats::from_results(&results);
    info!(
        complete = stats.complete,
        degraded = stats.degraded,
        "Enrichment finished"
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{stub, FakePostSource};

    #[test]
    fn stats_count_degraded_results() {
        let row = post_row(&stub("1"), PostInsights::default(), Utc::now());
        let results = vec![
            Enrichment::Complete(row.clone()),
            Enrichment::Degraded {
                row: row.clone(),
                cause: IngestError::PermanentFetch("404".into()),
            },
            Enrichment::Complete(row),
        ];
        assert_eq!(
            EnrichmentStats::from_results(&results),
            EnrichmentStats {
                complete: 2,
                degraded: 1
            }
        );
    }

    #[tokio::test]
    async fn empty_input_yields_no_results() {
        let source = FakePostSource::with_pages(vec![]);
        let results = enrich_posts(&source, Vec::new(), 10, &RetryPolicy::none()).await;
        assert!(results.is_empty());
    }
}
