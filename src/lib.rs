//! Fetch the IMF climate indicator CSVs, drop sparse columns and rows, and
//! store the results in SQLite.

pub mod config;
pub mod data;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod store;

pub use data::model::{Table, Value};
pub use error::{EtlError, Result};
