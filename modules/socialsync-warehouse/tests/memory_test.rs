//! Append/watermark contract exercised against the in-memory warehouse.

use chrono::{NaiveDate, Utc};
use socialsync_common::{IngestError, MetricRow, PostRow, TableRef};
use socialsync_warehouse::{append_rows, MemoryWarehouse, Warehouse};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn metric(date: NaiveDate, name: &str, value: f64) -> MetricRow {
    MetricRow {
        date,
        metric_name: name.to_string(),
        value,
        ingestion_time: Utc::now(),
    }
}

fn insights_table() -> TableRef {
    TableRef::new("analytics", "raw_social", "page_insights")
}

#[tokio::test]
async fn first_append_creates_table() {
    let wh = MemoryWarehouse::new();
    let table = insights_table();
    assert!(!wh.has_table(&table));

    let rows = vec![
        metric(day(2024, 5, 1), "page_impressions", 10.0),
        metric(day(2024, 5, 2), "page_impressions", 12.0),
    ];
    let written = append_rows(&wh, &table, &rows).await.unwrap();

    assert_eq!(written, 2);
    assert!(wh.has_table(&table));
    assert_eq!(wh.row_count(&table), 2);
}

#[tokio::test]
async fn empty_append_is_a_noop() {
    let wh = MemoryWarehouse::new();
    let table = insights_table();
    let written = append_rows::<MetricRow>(&wh, &table, &[]).await.unwrap();
    assert_eq!(written, 0);
    assert!(!wh.has_table(&table));
    assert_eq!(wh.append_calls(), 0);
}

#[tokio::test]
async fn reloading_the_same_rows_appends_duplicates() {
    let wh = MemoryWarehouse::new();
    let table = insights_table();
    let rows = vec![metric(day(2024, 5, 1), "page_impressions", 10.0)];

    append_rows(&wh, &table, &rows).await.unwrap();
    append_rows(&wh, &table, &rows).await.unwrap();

    assert_eq!(wh.row_count(&table), 2);
}

#[tokio::test]
async fn max_date_reports_latest_day() {
    let wh = MemoryWarehouse::new();
    let table = insights_table();
    let rows = vec![
        metric(day(2024, 4, 30), "page_impressions", 1.0),
        metric(day(2024, 5, 1), "page_impressions", 2.0),
        metric(day(2024, 4, 1), "page_impressions", 3.0),
    ];
    append_rows(&wh, &table, &rows).await.unwrap();

    let latest = wh.max_date(&table, "date").await.unwrap();
    assert_eq!(latest, Some(day(2024, 5, 1)));
}

#[tokio::test]
async fn max_date_on_absent_table_is_none() {
    let wh = MemoryWarehouse::new();
    assert_eq!(wh.max_date(&insights_table(), "date").await.unwrap(), None);
}

#[tokio::test]
async fn max_date_failure_is_a_resolution_error() {
    let wh = MemoryWarehouse::new();
    wh.fail_max_date("connection refused");
    let err = wh.max_date(&insights_table(), "date").await.unwrap_err();
    assert!(matches!(err, IngestError::Resolution(_)));
}

#[tokio::test]
async fn injected_append_failure_is_a_load_error() {
    let wh = MemoryWarehouse::new();
    let table = insights_table();
    wh.fail_append_call(2);

    let rows = vec![metric(day(2024, 5, 1), "page_impressions", 1.0)];
    append_rows(&wh, &table, &rows).await.unwrap();
    let err = append_rows(&wh, &table, &rows).await.unwrap_err();

    assert!(matches!(err, IngestError::Load(_)));
    assert_eq!(wh.row_count(&table), 1);
}

#[tokio::test]
async fn schema_mismatch_on_existing_table_is_rejected() {
    let wh = MemoryWarehouse::new();
    let table = insights_table();
    append_rows(&wh, &table, &[metric(day(2024, 5, 1), "page_impressions", 1.0)])
        .await
        .unwrap();

    let post = PostRow {
        post_id: "1".into(),
        created_at: Utc::now(),
        message: String::new(),
        post_url: String::new(),
        impressions: 0,
        engaged_users: 0,
        likes: 0,
        ingestion_time: Utc::now(),
    };
    let err = append_rows(&wh, &table, &[post]).await.unwrap_err();
    assert!(matches!(err, IngestError::Load(_)));
}
