//! The daily run: page insights backfill, post refresh, traffic backfill.
//!
//! Stages are independent. A failure in one is recorded in the
//! [`RunSummary`] and the next stage still runs.

use std::fmt;

use chrono::NaiveDate;
use socialsync_common::{DateRange, FileConfig, IngestError, Result};
use socialsync_warehouse::{append_rows, Warehouse};
use tracing::{error, info, warn};

use crate::backfill::{run_backfill, BackfillOutcome, BackfillReport};
use crate::enrich::{enrich_posts, Enrichment, EnrichmentStats};
use crate::jobs::{PageInsightsJob, TrafficJob};
use crate::paginate::collect_posts;
use crate::retry::RetryPolicy;
use crate::sources::{InsightsSource, OriginSource, PostSource, TrafficSource};
use crate::watermark::WatermarkResolver;

/// Everything the pipeline reads from. Traffic is optional: without it the
/// traffic stage is skipped.
#[derive(Clone, Copy)]
pub struct Sources<'a> {
    pub insights: &'a dyn InsightsSource,
    pub origin: Option<&'a dyn OriginSource>,
    pub posts: &'a dyn PostSource,
    pub traffic: Option<&'a dyn TrafficSource>,
    pub traffic_origin: Option<&'a dyn OriginSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PageInsights,
    Posts,
    Traffic,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::PageInsights => "page_insights",
            Stage::Posts => "posts",
            Stage::Traffic => "traffic",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageStatus {
    Completed,
    UpToDate,
    Skipped,
    Failed(IngestError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    pub rows_loaded: u64,
    pub degraded: usize,
}

impl StageReport {
    fn failed(stage: Stage, error: IngestError) -> Self {
        Self {
            stage,
            status: StageStatus::Failed(error),
            rows_loaded: 0,
            degraded: 0,
        }
    }

    fn from_backfill(stage: Stage, report: BackfillReport) -> Self {
        let status = match report.outcome {
            BackfillOutcome::UpToDate => StageStatus::UpToDate,
            BackfillOutcome::Completed => StageStatus::Completed,
            BackfillOutcome::Aborted { error, .. } => StageStatus::Failed(error),
        };
        Self {
            stage,
            status,
            rows_loaded: report.rows_loaded,
            degraded: 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, StageStatus::Failed(_))
    }
}

/// Outcome of a full post refresh. `listing_error` is set when the listing
/// stopped early; the posts listed before it were still loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRefresh {
    pub listed: usize,
    pub stats: EnrichmentStats,
    pub rows_loaded: u64,
    pub listing_error: Option<IngestError>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub stages: Vec<StageReport>,
}

impl RunSummary {
    /// True when no executed stage failed.
    pub fn succeeded(&self) -> bool {
        !self.stages.iter().any(StageReport::is_failure)
    }

    pub fn rows_loaded(&self) -> u64 {
        self.stages.iter().map(|s| s.rows_loaded).sum()
    }

    pub fn log(&self) {
        for report in &self.stages {
            match &report.status {
                StageStatus::Failed(e) => error!(
                    stage = %report.stage,
                    rows = report.rows_loaded,
                    kind = e.kind(),
                    error = %e,
                    "Stage failed"
                ),
                status => info!(
                    stage = %report.stage,
                    status = ?status,
                    rows = report.rows_loaded,
                    degraded = report.degraded,
                    "Stage finished"
                ),
            }
        }
        info!(
            stages = self.stages.len(),
            rows = self.rows_loaded(),
            succeeded = self.succeeded(),
            "Run summary"
        );
    }
}

pub struct Pipeline<'a> {
    config: &'a FileConfig,
    warehouse: &'a dyn Warehouse,
    sources: Sources<'a>,
    retry: RetryPolicy,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a FileConfig, warehouse: &'a dyn Warehouse, sources: Sources<'a>) -> Self {
        Self {
            config,
            warehouse,
            sources,
            retry: RetryPolicy::from_config(&config.retry),
        }
    }

    /// Backfill page insights from the watermark up to (not including) `today`.
    pub async fn sync_page_insights(&self, today: NaiveDate) -> Result<BackfillReport> {
        let table = self.config.warehouse.insights();
        let mut resolver =
            WatermarkResolver::new(self.warehouse, &table, self.config.sync.lookback_days);
        if let Some(origin) = self.sources.origin {
            resolver = resolver.with_origin(origin);
        }
        let watermark = resolver.resolve(today).await?;

        let job = PageInsightsJob::new(self.sources.insights, &self.retry);
        run_backfill(
            &job,
            self.warehouse,
            &table,
            DateRange::new(watermark.start, today),
            self.config.sync.chunk_days,
        )
        .await
    }

    /// List every post, enrich each with its insights, and append the lot.
    /// A listing that fails partway still loads what it collected.
    pub async fn refresh_posts(&self) -> Result<PostRefresh> {
        let listing = collect_posts(self.sources.posts, &self.retry).await;
        let listed = listing.posts.len();

        let results = enrich_posts(
            self.sources.posts,
            listing.posts,
            self.config.sync.enrichment_concurrency,
            &self.retry,
        )
        .await;
        let stats = EnrichmentStats::from_results(&results);
        let rows: Vec<_> = results.into_iter().map(Enrichment::into_row).collect();

        let rows_loaded = append_rows(self.warehouse, &self.config.warehouse.posts(), &rows).await?;
        Ok(PostRefresh {
            listed,
            stats,
            rows_loaded,
            listing_error: listing.error,
        })
    }

    /// Backfill daily traffic. An explicit `window` replaces the watermark.
    pub async fn sync_traffic(
        &self,
        today: NaiveDate,
        window: Option<DateRange>,
    ) -> Result<BackfillReport> {
        let source = self.sources.traffic.ok_or_else(|| {
            IngestError::Config(
                "traffic source is not configured ([ga4] section and GA4_ACCESS_TOKEN)".to_string(),
            )
        })?;
        let table = self.config.warehouse.traffic();

        let range = match window {
            Some(range) => {
                info!(range = %range, "Using explicit traffic window");
                range
            }
            None => {
                let mut resolver =
                    WatermarkResolver::new(self.warehouse, &table, self.config.sync.lookback_days);
                if let Some(origin) = self.sources.traffic_origin {
                    resolver = resolver.with_origin(origin);
                }
                DateRange::new(resolver.resolve(today).await?.start, today)
            }
        };

        let job = TrafficJob::new(source, &self.retry);
        run_backfill(
            &job,
            self.warehouse,
            &table,
            range,
            self.config.sync.ga4_chunk_days,
        )
        .await
    }

    pub async fn page_insights_stage(&self, today: NaiveDate) -> StageReport {
        info!(stage = %Stage::PageInsights, "Stage starting");
        match self.sync_page_insights(today).await {
            Ok(report) => StageReport::from_backfill(Stage::PageInsights, report),
            Err(e) => StageReport::failed(Stage::PageInsights, e),
        }
    }

    pub async fn posts_stage(&self) -> StageReport {
        info!(stage = %Stage::Posts, "Stage starting");
        match self.refresh_posts().await {
            Ok(refresh) => StageReport {
                stage: Stage::Posts,
                status: match refresh.listing_error {
                    Some(e) => StageStatus::Failed(e),
                    None => StageStatus::Completed,
                },
                rows_loaded: refresh.rows_loaded,
                degraded: refresh.stats.degraded,
            },
            Err(e) => StageReport::failed(Stage::Posts, e),
        }
    }

    pub async fn traffic_stage(&self, today: NaiveDate, window: Option<DateRange>) -> StageReport {
        info!(stage = %Stage::Traffic, "Stage starting");
        match self.sync_traffic(today, window).await {
            Ok(report) => StageReport::from_backfill(Stage::Traffic, report),
            Err(e) => StageReport::failed(Stage::Traffic, e),
        }
    }

    /// All stages in order. The traffic stage is skipped when no traffic
    /// source is configured.
    pub async fn run(&self, today: NaiveDate) -> RunSummary {
        let mut summary = RunSummary::default();

        summary.stages.push(self.page_insights_stage(today).await);
        summary.stages.push(self.posts_stage().await);

        if self.sources.traffic.is_some() {
            summary.stages.push(self.traffic_stage(today, None).await);
        } else {
            warn!(stage = %Stage::Traffic, "No traffic source configured, skipping");
            summary.stages.push(StageReport {
                stage: Stage::Traffic,
                status: StageStatus::Skipped,
                rows_loaded: 0,
                degraded: 0,
            });
        }

        summary
    }
}
