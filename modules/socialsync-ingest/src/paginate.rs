use graph_client::PostStub;
use socialsync_common::{IngestError, Result};
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;
use crate::sources::PostSource;

/// Posts gathered by [`collect_posts`], plus the error that cut the walk
/// short, if any.
#[derive(Debug, Default)]
pub struct PostListing {
    pub posts: Vec<PostStub>,
    pub pages: u32,
    pub error: Option<IngestError>,
}

impl PostListing {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// The posts, or the listing error if the walk did not finish.
    pub fn into_result(self) -> Result<Vec<PostStub>> {
        match self.error {
            None => Ok(self.posts),
            Some(e) => Err(e),
        }
    }
}

/// Walk the post listing to the end.
///
/// The first page is a parameterized request; every later page is a
/// continuation request against the server's `next` URL. Stops when no
/// cursor remains or a page comes back empty. A page that still fails after
/// retries ends the walk; the posts from earlier pages are kept.
pub async fn collect_posts(source: &dyn PostSource, retry: &RetryPolicy) -> PostListing {
    let mut listing = PostListing::default();
    let mut next: Option<String> = None;

    loop {
        let fetched = match &next {
            None => {
                retry
                    .run("posts_first_page", || source.first_posts_page())
                    .await
            }
            Some(url) => {
                retry
                    .run("posts_next_page", || source.next_posts_page(url))
                    .await
            }
        };
        let mut page = match fetched {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    page = listing.pages + 1,
                    collected = listing.posts.len(),
                    error = %e,
                    "Post listing stopped early"
                );
                listing.error = Some(e);
                return listing;
            }
        };
        listing.pages += 1;

        let count = page.data.len();
        debug!(page = listing.pages, posts = count, "Fetched posts page");
        if count == 0 {
            break;
        }

        next = page.next_url().map(str::to_string);
        listing.posts.append(&mut page.data);
        if next.is_none() {
            break;
        }
    }

    info!(pages = listing.pages, posts = listing.posts.len(), "Collected post listing");
    listing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePostSource;

    #[tokio::test]
    async fn follows_cursors_until_missing() {
        let source = FakePostSource::with_pages(vec![3, 2, 1]);
        let listing = collect_posts(&source, &RetryPolicy::none()).await;
        assert!(listing.is_complete());
        assert_eq!(listing.pages, 3);
        assert_eq!(listing.posts.len(), 6);
        assert_eq!(source.continuation_urls(), vec!["page:2", "page:3"]);
    }

    #[tokio::test]
    async fn stops_on_empty_page_even_with_cursor() {
        let source = FakePostSource::with_pages(vec![2, 0, 5]);
        let posts = collect_posts(&source, &RetryPolicy::none())
            .await
            .into_result()
            .unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(source.continuation_urls(), vec!["page:2"]);
    }

    #[tokio::test]
    async fn failing_page_keeps_earlier_posts() {
        let source = FakePostSource::with_pages(vec![2, 2, 2]).fail_page(2);
        let listing = collect_posts(&source, &RetryPolicy::none()).await;
        assert!(!listing.is_complete());
        assert_eq!(listing.pages, 1);
        let ids: Vec<&str> = listing.posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1_0", "p1_1"]);
        assert!(matches!(
            listing.into_result(),
            Err(IngestError::PermanentFetch(_))
        ));
    }

    #[tokio::test]
    async fn failing_first_page_collects_nothing() {
        let source = FakePostSource::with_pages(vec![2]).fail_page(1);
        let listing = collect_posts(&source, &RetryPolicy::none()).await;
        assert!(listing.posts.is_empty());
        assert_eq!(listing.pages, 0);
        assert!(listing.error.is_some());
    }
}
