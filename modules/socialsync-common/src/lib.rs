pub mod config;
pub mod error;
pub mod file_config;
pub mod schema;
pub mod types;

pub use config::AppConfig;
pub use error::{IngestError, Result};
pub use file_config::{load_config, BackoffKind, FileConfig};
pub use schema::{Column, ColumnType, Row, Value};
pub use types::*;
