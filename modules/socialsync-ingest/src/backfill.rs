//! Date-chunked backfill.
//!
//! A range is split into fixed-width chunks that run strictly in order:
//! fetch, normalize, load. The first chunk that fails stops the run. Chunks
//! already loaded stay loaded; chunks after the failure are never attempted.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Days, Utc};
use socialsync_common::{DateRange, IngestError, Result, Row, TableRef};
use socialsync_warehouse::{append_rows, Warehouse};
use tracing::{error, info};

/// Split `[start, end)` into contiguous chunks of `chunk_days`. The last
/// chunk may be shorter. An empty range plans nothing.
pub fn plan_chunks(range: DateRange, chunk_days: u32) -> Result<Vec<DateRange>> {
    if chunk_days == 0 {
        return Err(IngestError::Config(
            "chunk width must be at least 1 day".to_string(),
        ));
    }

    let mut chunks = Vec::new();
    let mut cursor = range.start;
    while cursor < range.end {
        let next = cursor
            .checked_add_days(Days::new(u64::from(chunk_days)))
            .map_or(range.end, |d| d.min(range.end));
        chunks.push(DateRange::new(cursor, next));
        cursor = next;
    }
    Ok(chunks)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    Fetching,
    Loading,
    Done,
    Failed,
}

/// Step of the chunk pipeline where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStep {
    Fetch,
    Normalize,
    Load,
}

impl fmt::Display for ChunkStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChunkStep::Fetch => "fetch",
            ChunkStep::Normalize => "normalize",
            ChunkStep::Load => "load",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkProgress {
    pub range: DateRange,
    pub state: ChunkState,
    pub rows: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackfillOutcome {
    /// Nothing to fetch: the range was empty.
    UpToDate,
    Completed,
    Aborted {
        chunk: DateRange,
        step: ChunkStep,
        error: IngestError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackfillReport {
    pub outcome: BackfillOutcome,
    pub chunks: Vec<ChunkProgress>,
    pub rows_loaded: u64,
}

impl BackfillReport {
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, BackfillOutcome::Aborted { .. })
    }

    pub fn count(&self, state: ChunkState) -> usize {
        self.chunks.iter().filter(|c| c.state == state).count()
    }
}

/// One source's chunk pipeline. `fetch` is expected to apply its own retry
/// policy; any error it returns is final for the chunk.
#[async_trait]
pub trait ChunkJob: Send + Sync {
    type Payload: Send;
    type Row: Row + 'static;

    fn name(&self) -> &str;

    async fn fetch(&self, chunk: DateRange) -> Result<Self::Payload>;

    fn normalize(
        &self,
        payload: Self::Payload,
        ingested_at: DateTime<Utc>,
    ) -> Result<Vec<Self::Row>>;
}

/// Run `job` over `range` in chunks of `chunk_days`, appending each chunk
/// to `table`.
///
/// Chunk failures are reported in the returned [`BackfillReport`]; `Err` is
/// reserved for an invalid chunk width.
pub async fn run_backfill<J: ChunkJob>(
    job: &J,
    warehouse: &dyn Warehouse,
    table: &TableRef,
    range: DateRange,
    chunk_days: u32,
) -> Result<BackfillReport> {
    let planned = plan_chunks(range, chunk_days)?;
    let mut chunks: Vec<ChunkProgress> = planned
        .iter()
        .map(|r| ChunkProgress {
            range: *r,
            state: ChunkState::Pending,
            rows: 0,
        })
        .collect();

    if chunks.is_empty() {
        info!(job = job.name(), range = %range, "Already up to date");
        return Ok(BackfillReport {
            outcome: BackfillOutcome::UpToDate,
            chunks,
            rows_loaded: 0,
        });
    }

    info!(
        job = job.name(),
        range = %range,
        chunks = chunks.len(),
        chunk_days,
        "Starting backfill"
    );

    let total = chunks.len();
    let mut rows_loaded = 0u64;

    for idx in 0..total {
        let chunk = chunks[idx].range;

        chunks[idx].state = ChunkState::Fetching;
        match run_chunk(job, warehouse, table, chunk, &mut chunks[idx]).await {
            Ok(written) => {
                rows_loaded += written;
                chunks[idx].state = ChunkState::Done;
                chunks[idx].rows = written;
                info!(
                    job = job.name(),
                    chunk = %chunk,
                    rows = written,
                    progress = %format!("{}/{}", idx + 1, total),
                    "Chunk done"
                );
            }
            Err((step, error)) => {
                chunks[idx].state = ChunkState::Failed;
                error!(
                    job = job.name(),
                    chunk = %chunk,
                    step = %step,
                    error = %error,
                    skipped = total - idx - 1,
                    "Chunk failed, aborting backfill"
                );
                return Ok(BackfillReport {
                    outcome: BackfillOutcome::Aborted { chunk, step, error },
                    chunks,
                    rows_loaded,
                });
            }
        }
    }

    info!(job = job.name(), rows = rows_loaded, "Backfill completed");
    Ok(BackfillReport {
        outcome: BackfillOutcome::Completed,
        chunks,
        rows_loaded,
    })
}

async fn run_chunk<J: ChunkJob>(
    job: &J,
    warehouse: &dyn Warehouse,
    table: &TableRef,
    chunk: DateRange,
    progress: &mut ChunkProgress,
) -> std::result::Result<u64, (ChunkStep, IngestError)> {
    let payload = job
        .fetch(chunk)
        .await
        .map_err(|e| (ChunkStep::Fetch, e))?;

    let rows = job
        .normalize(payload, Utc::now())
        .map_err(|e| (ChunkStep::Normalize, e))?;

    progress.state = ChunkState::Loading;
    if rows.is_empty() {
        info!(job = job.name(), chunk = %chunk, "No rows in chunk, skipping load");
        return Ok(0);
    }

    append_rows(warehouse, table, &rows)
        .await
        .map_err(|e| (ChunkStep::Load, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn sixty_five_days_split_thirty_thirty_five() {
        let range = DateRange::new(day(2024, 1, 1), day(2024, 3, 6));
        assert_eq!(range.days(), 65);

        let chunks = plan_chunks(range, 30).unwrap();
        let widths: Vec<i64> = chunks.iter().map(DateRange::days).collect();
        assert_eq!(widths, vec![30, 30, 5]);
    }

    #[test]
    fn chunks_are_contiguous_and_cover_the_range() {
        let range = DateRange::new(day(2023, 11, 17), day(2024, 6, 2));
        for width in [1, 7, 30, 31, 90, 400] {
            let chunks = plan_chunks(range, width).unwrap();
            assert_eq!(chunks.first().unwrap().start, range.start);
            assert_eq!(chunks.last().unwrap().end, range.end);
            for pair in chunks.windows(2) {
                assert_eq!(pair[0].end, pair[1].start);
            }
            for chunk in &chunks[..chunks.len() - 1] {
                assert_eq!(chunk.days(), i64::from(width));
            }
            assert!(chunks.iter().all(|c| !c.is_empty()));
            assert!(chunks.last().unwrap().days() <= i64::from(width));
        }
    }

    #[test]
    fn empty_or_inverted_range_plans_nothing() {
        let same = DateRange::new(day(2024, 5, 2), day(2024, 5, 2));
        assert!(plan_chunks(same, 30).unwrap().is_empty());

        let inverted = DateRange::new(day(2024, 5, 3), day(2024, 5, 2));
        assert!(plan_chunks(inverted, 30).unwrap().is_empty());
    }

    #[test]
    fn zero_width_is_a_config_error() {
        let range = DateRange::new(day(2024, 1, 1), day(2024, 2, 1));
        assert!(matches!(
            plan_chunks(range, 0),
            Err(IngestError::Config(_))
        ));
    }
}
