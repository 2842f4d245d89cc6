//! Data ingestion, storage and train/test splitting
//!
//! CSV import, SQLite match store and the date-based dataset splitter.

pub mod database;
pub mod dataset;
pub mod import;

pub use database::Database;
pub use dataset::{Dataset, DatasetSplitter, Samples};
