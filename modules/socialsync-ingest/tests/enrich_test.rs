//! Post listing plus enrichment fan-out.

use std::collections::HashSet;
use std::time::Duration;

use socialsync_common::IngestError;
use socialsync_ingest::enrich::{enrich_posts, Enrichment, EnrichmentStats};
use socialsync_ingest::paginate::collect_posts;
use socialsync_ingest::retry::RetryPolicy;
use socialsync_ingest::testing::{FakePostSource, FAKE_POST_INSIGHTS};

#[tokio::test]
async fn every_post_gets_exactly_one_result() {
    let source = FakePostSource::with_pages(vec![4, 3]).fail_insights_for(&["p1_1", "p2_0"]);
    let retry = RetryPolicy::new(3, Duration::ZERO);

    let stubs = collect_posts(&source, &retry)
        .await
        .into_result()
        .unwrap();
    assert_eq!(stubs.len(), 7);

    let results = enrich_posts(&source, stubs, 3, &retry).await;
    assert_eq!(results.len(), 7);

    let ids: HashSet<String> = results.iter().map(|r| r.row().post_id.clone()).collect();
    let expected: HashSet<String> = source.all_ids().into_iter().collect();
    assert_eq!(ids, expected);

    assert_eq!(
        EnrichmentStats::from_results(&results),
        EnrichmentStats {
            complete: 5,
            degraded: 2
        }
    );

    for result in &results {
        let row = result.row();
        assert_eq!(row.likes, 5, "likes come from the stub for {}", row.post_id);
        match result {
            Enrichment::Degraded { row, cause } => {
                assert!(["p1_1", "p2_0"].contains(&row.post_id.as_str()));
                assert_eq!(row.impressions, 0);
                assert_eq!(row.engaged_users, 0);
                assert!(matches!(cause, IngestError::PermanentFetch(_)));
            }
            Enrichment::Complete(row) => {
                assert_eq!(row.impressions, FAKE_POST_INSIGHTS.impressions);
                assert_eq!(row.engaged_users, FAKE_POST_INSIGHTS.engaged_users);
            }
        }
    }

    // Permanent detail failures are attempted once.
    assert_eq!(source.insight_calls(), 7);
}

#[tokio::test]
async fn fan_out_respects_the_concurrency_bound() {
    let source = FakePostSource::with_pages(vec![25, 25]);
    let stubs = collect_posts(&source, &RetryPolicy::none())
        .await
        .into_result()
        .unwrap();

    let results = enrich_posts(&source, stubs, 4, &RetryPolicy::none()).await;

    assert_eq!(results.len(), 50);
    assert!(results.iter().all(|r| !r.is_degraded()));
    assert!(source.max_in_flight() >= 1);
    assert!(source.max_in_flight() <= 4);
}

#[tokio::test]
async fn degraded_rows_keep_stub_fields() {
    let source = FakePostSource::with_pages(vec![1]).fail_insights_for(&["p1_0"]);
    let stubs = collect_posts(&source, &RetryPolicy::none())
        .await
        .into_result()
        .unwrap();

    let results = enrich_posts(&source, stubs, 10, &RetryPolicy::none()).await;

    assert_eq!(results.len(), 1);
    assert!(results[0].is_degraded());
    let row = results.into_iter().next().unwrap().into_row();
    assert_eq!(row.message, "Post p1_0");
    assert_eq!(row.post_url, "https://www.facebook.com/p1_0");
}
