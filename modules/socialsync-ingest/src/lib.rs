pub mod backfill;
pub mod enrich;
pub mod jobs;
pub mod normalize;
pub mod paginate;
pub mod pipeline;
pub mod retry;
pub mod sources;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod watermark;
