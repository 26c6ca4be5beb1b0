pub mod analyzers;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod output;
pub mod report;

pub use error::{ScoreError, SchemaError};
