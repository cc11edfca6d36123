// In-memory warehouse for tests. Same append/watermark contract as the
// Postgres implementation, plus failure injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use socialsync_common::{Column, IngestError, Result, TableRef, Value};

use crate::warehouse::{check_widths, Warehouse};

#[derive(Debug, Clone)]
struct MemoryTable {
    schema: &'static [Column],
    rows: Vec<Vec<Value>>,
}

#[derive(Default)]
pub struct MemoryWarehouse {
    tables: Mutex<HashMap<TableRef, MemoryTable>>,
    append_calls: AtomicUsize,
    fail_append_call: Mutex<Option<usize>>,
    fail_max_date: Mutex<Option<String>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`th call to `append` (1-based, counting every call) fail.
    pub fn fail_append_call(&self, n: usize) {
        *self.fail_append_call.lock().unwrap() = Some(n);
    }

    /// Make every `max_date` query fail with `message`.
    pub fn fail_max_date(&self, message: &str) {
        *self.fail_max_date.lock().unwrap() = Some(message.to_string());
    }

    /// All rows stored in `table` (for test assertions).
    pub fn rows(&self, table: &TableRef) -> Vec<Vec<Value>> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &TableRef) -> usize {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    pub fn has_table(&self, table: &TableRef) -> bool {
        self.tables.lock().unwrap().contains_key(table)
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn append(
        &self,
        table: &TableRef,
        schema: &'static [Column],
        rows: Vec<Vec<Value>>,
    ) -> Result<u64> {
        let call = self.append_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_append_call.lock().unwrap() == Some(call) {
            return Err(IngestError::Load(format!("injected failure on append #{call}")));
        }
        if rows.is_empty() {
            return Ok(0);
        }
        table.validate()?;
        check_widths(schema, &rows)?;

        let mut tables = self.tables.lock().unwrap();
        let entry = tables.entry(table.clone()).or_insert_with(|| MemoryTable {
            schema,
            rows: Vec::new(),
        });
        if entry.schema != schema {
            return Err(IngestError::Load(format!(
                "schema mismatch for existing table {table}"
            )));
        }

        let written = rows.len() as u64;
        entry.rows.extend(rows);
        Ok(written)
    }

    async fn max_date(&self, table: &TableRef, column: &str) -> Result<Option<NaiveDate>> {
        if let Some(message) = self.fail_max_date.lock().unwrap().clone() {
            return Err(IngestError::Resolution(message));
        }

        let tables = self.tables.lock().unwrap();
        let Some(stored) = tables.get(table) else {
            return Ok(None);
        };
        let Some(idx) = stored.schema.iter().position(|c| c.name == column) else {
            return Err(IngestError::Resolution(format!(
                "column {column} not found in {table}"
            )));
        };

        Ok(stored.rows.iter().filter_map(|r| r[idx].as_date()).max())
    }
}
