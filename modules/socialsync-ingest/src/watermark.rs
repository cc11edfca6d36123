//! Where an incremental run starts.

use std::fmt;

use chrono::{Days, NaiveDate};
use socialsync_common::{IngestError, Result, TableRef};
use socialsync_warehouse::Warehouse;
use tracing::{info, warn};

use crate::sources::OriginSource;

/// Date column every time-series table is keyed on.
pub const DATE_COLUMN: &str = "date";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkBasis {
    /// Resuming after the latest date already in the warehouse.
    Warehouse(NaiveDate),
    /// Nothing loaded yet; starting from the source's first day.
    SourceOrigin,
    /// Nothing loaded and no origin known; fixed lookback from today.
    Lookback,
}

impl fmt::Display for WatermarkBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatermarkBasis::Warehouse(last) => write!(f, "warehouse (last {last})"),
            WatermarkBasis::SourceOrigin => write!(f, "source origin"),
            WatermarkBasis::Lookback => write!(f, "lookback"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark {
    pub start: NaiveDate,
    pub basis: WatermarkBasis,
}

pub struct WatermarkResolver<'a> {
    warehouse: &'a dyn Warehouse,
    table: &'a TableRef,
    column: &'static str,
    origin: Option<&'a dyn OriginSource>,
    lookback_days: u32,
}

impl<'a> WatermarkResolver<'a> {
    pub fn new(warehouse: &'a dyn Warehouse, table: &'a TableRef, lookback_days: u32) -> Self {
        Self {
            warehouse,
            table,
            column: DATE_COLUMN,
            origin: None,
            lookback_days,
        }
    }

    pub fn with_origin(mut self, origin: &'a dyn OriginSource) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Day after the latest loaded date, else the source origin, else
    /// `today - lookback_days`.
    pub async fn resolve(&self, today: NaiveDate) -> Result<Watermark> {
        let latest = self
            .warehouse
            .max_date(self.table, self.column)
            .await
            .map_err(|e| match e {
                IngestError::Resolution(_) => e,
                other => IngestError::Resolution(other.to_string()),
            })?;

        let watermark = if let Some(last) = latest {
            let start = last.checked_add_days(Days::new(1)).ok_or_else(|| {
                IngestError::Resolution(format!("{} has an out-of-range date {last}", self.table))
            })?;
            Watermark {
                start,
                basis: WatermarkBasis::Warehouse(last),
            }
        } else if let Some(origin) = self.origin_date().await {
            Watermark {
                start: origin,
                basis: WatermarkBasis::SourceOrigin,
            }
        } else {
            Watermark {
                start: today
                    .checked_sub_days(Days::new(u64::from(self.lookback_days)))
                    .unwrap_or(NaiveDate::MIN),
                basis: WatermarkBasis::Lookback,
            }
        };

        info!(table = %self.table, start = %watermark.start, basis = %watermark.basis, "Resolved watermark");
        Ok(watermark)
    }

    async fn origin_date(&self) -> Option<NaiveDate> {
        let origin = self.origin?;
        match origin.origin_date().await {
            Ok(date) => date,
            Err(e) => {
                warn!(table = %self.table, error = %e, "Origin date lookup failed, falling back to lookback");
                None
            }
        }
    }
}
