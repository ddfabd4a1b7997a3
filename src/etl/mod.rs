// Streaming ETL Engine (C7) - extract, transform, load for one table.
pub mod engine;

pub use engine::StreamingEtlEngine;
