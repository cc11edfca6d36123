//! Postgres-backed warehouse. `dataset` becomes a schema, `table` a table.

use async_trait::async_trait;
use chrono::NaiveDate;
use socialsync_common::{Column, IngestError, Result, TableRef, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::warehouse::{check_widths, Warehouse};

/// Postgres caps a statement at 65535 bind parameters.
const MAX_BIND_PARAMS: usize = 65_535;

/// Rows per INSERT statement before the bind limit kicks in.
const DEFAULT_BATCH_ROWS: usize = 1_000;

#[derive(Clone)]
pub struct PgWarehouse {
    pool: PgPool,
    batch_rows: usize,
}

impl PgWarehouse {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            batch_rows: DEFAULT_BATCH_ROWS,
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| IngestError::Load(format!("connect: {e}")))?;
        Ok(Self::new(pool))
    }

    pub fn with_batch_rows(mut self, batch_rows: usize) -> Self {
        self.batch_rows = batch_rows.max(1);
        self
    }
}

fn quote(ident: &str) -> String {
    format!("\"{ident}\"")
}

fn qualified(table: &TableRef) -> String {
    format!("{}.{}", quote(&table.dataset), quote(&table.table))
}

fn create_table_sql(table: &TableRef, schema: &[Column]) -> String {
    let columns: Vec<String> = schema
        .iter()
        .map(|c| format!("{} {} NOT NULL", quote(c.name), c.kind.sql_type()))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        qualified(table),
        columns.join(", ")
    )
}

fn load_error(e: sqlx::Error) -> IngestError {
    IngestError::Load(e.to_string())
}

fn resolution_error(e: sqlx::Error) -> IngestError {
    IngestError::Resolution(e.to_string())
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn append(
        &self,
        table: &TableRef,
        schema: &'static [Column],
        rows: Vec<Vec<Value>>,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        table.validate()?;
        check_widths(schema, &rows)?;

        let mut tx = self.pool.begin().await.map_err(load_error)?;

        sqlx::query(&format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            quote(&table.dataset)
        ))
        .execute(&mut *tx)
        .await
        .map_err(load_error)?;

        sqlx::query(&create_table_sql(table, schema))
            .execute(&mut *tx)
            .await
            .map_err(load_error)?;

        let column_list: Vec<String> = schema.iter().map(|c| quote(c.name)).collect();
        let insert_prefix = format!(
            "INSERT INTO {} ({}) ",
            qualified(table),
            column_list.join(", ")
        );
        let per_statement = (MAX_BIND_PARAMS / schema.len()).min(self.batch_rows).max(1);

        let mut written = 0u64;
        for batch in rows.chunks(per_statement) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(&insert_prefix);
            qb.push_values(batch.iter(), |mut b, row| {
                for value in row {
                    match value.clone() {
                        Value::Date(v) => {
                            b.push_bind(v);
                        }
                        Value::Timestamp(v) => {
                            b.push_bind(v);
                        }
                        Value::Text(v) => {
                            b.push_bind(v);
                        }
                        Value::Integer(v) => {
                            b.push_bind(v);
                        }
                        Value::Float(v) => {
                            b.push_bind(v);
                        }
                    }
                }
            });

            let result = qb.build().execute(&mut *tx).await.map_err(load_error)?;
            written += result.rows_affected();
            debug!(table = %table, batch = batch.len(), "Inserted batch");
        }

        tx.commit().await.map_err(load_error)?;
        Ok(written)
    }

    async fn max_date(&self, table: &TableRef, column: &str) -> Result<Option<NaiveDate>> {
        table.validate()?;

        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(qualified(table))
            .fetch_one(&self.pool)
            .await
            .map_err(resolution_error)?;
        if !exists {
            return Ok(None);
        }

        let sql = format!("SELECT MAX({}) FROM {}", quote(column), qualified(table));
        let latest: Option<NaiveDate> = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(resolution_error)?;
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socialsync_common::{MetricRow, Row};

    #[test]
    fn create_table_uses_schema_types() {
        let table = TableRef::new("analytics", "raw_social", "page_insights");
        let sql = create_table_sql(&table, MetricRow::SCHEMA);
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"raw_social\".\"page_insights\" (\
             \"date\" DATE NOT NULL, \
             \"metric_name\" TEXT NOT NULL, \
             \"value\" DOUBLE PRECISION NOT NULL, \
             \"ingestion_time\" TIMESTAMPTZ NOT NULL)"
        );
    }
}
