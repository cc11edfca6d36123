//! Append-only warehouse loader.
//!
//! Tables are created on first write with the row type's fixed schema and
//! only ever appended to. There is no row-level dedup: loading the same
//! window twice stores it twice.

pub mod memory;
pub mod postgres;
pub mod warehouse;

pub use memory::MemoryWarehouse;
pub use postgres::PgWarehouse;
pub use warehouse::{append_rows, Warehouse};
