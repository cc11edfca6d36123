use async_trait::async_trait;
use chrono::NaiveDate;
use socialsync_common::{Column, IngestError, Result, Row, TableRef, Value};
use tracing::info;

/// Storage contract for the loader and the watermark resolver.
///
/// Implemented by PgWarehouse (postgres) and MemoryWarehouse (tests).
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Create `table` with `schema` if it does not exist, then append `rows`.
    /// Each row must hold one value per schema column, in order.
    /// Returns the number of rows written.
    async fn append(
        &self,
        table: &TableRef,
        schema: &'static [Column],
        rows: Vec<Vec<Value>>,
    ) -> Result<u64>;

    /// Latest value of a DATE column, or `None` when the table is absent or empty.
    /// A failing query is a `Resolution` error, never `None`.
    async fn max_date(&self, table: &TableRef, column: &str) -> Result<Option<NaiveDate>>;
}

/// Append typed rows to `table`.
pub async fn append_rows<R: Row>(
    warehouse: &dyn Warehouse,
    table: &TableRef,
    rows: &[R],
) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }
    let values: Vec<Vec<Value>> = rows.iter().map(Row::values).collect();
    let written = warehouse.append(table, R::SCHEMA, values).await?;
    info!(table = %table, rows = written, "Appended rows");
    Ok(written)
}

/// Reject rows whose width does not match the schema.
pub(crate) fn check_widths(schema: &[Column], rows: &[Vec<Value>]) -> Result<()> {
    if let Some(row) = rows.iter().find(|r| r.len() != schema.len()) {
        return Err(IngestError::Load(format!(
            "row has {} values but schema has {} columns",
            row.len(),
            schema.len()
        )));
    }
    Ok(())
}
