// Row envelope and the result types that flow back up through the pipeline.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single column value, carried without ever round-tripping through a
/// string (dates/timestamps stay typed end to end).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum RowValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl RowValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RowValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RowValue::Null)
    }
}

/// A row as it comes off the warehouse reader or goes into the sink writer:
/// a keyed map of column name to value. Nulls are preserved explicitly.
pub type Row = HashMap<String, RowValue>;

/// A page of rows, the unit the warehouse reader yields and the sink writer
/// consumes. Row batches exist only for the lifetime of one page.
pub type RowBatch = Vec<Row>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Success,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EtlStats {
    pub processed: u64,
    pub transformed: u64,
    pub skipped: u64,
    pub errors: u64,
}

impl EtlStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: &EtlStats) {
        self.processed += other.processed;
        self.transformed += other.transformed;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }
}

/// Result of a sink write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResult {
    pub total_received: u64,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub duration_seconds: f64,
    pub status: LoadStatus,
    pub error: Option<String>,
}

impl LoadResult {
    pub fn empty_success() -> Self {
        Self {
            total_received: 0,
            inserted: 0,
            updated: 0,
            skipped: 0,
            duration_seconds: 0.0,
            status: LoadStatus::Success,
            error: None,
        }
    }

    /// totalReceived >= inserted + updated + skipped, always.
    pub fn is_internally_consistent(&self) -> bool {
        self.total_received >= self.inserted + self.updated + self.skipped
    }
}

/// Result of one table's extraction for one campaign (C7 output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableLoadResult {
    pub table_name: String,
    pub load_result: LoadResult,
    pub strategy: &'static str,
}

/// Result of the per-campaign pipeline (C10 output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignLoadResult {
    pub archivo: String,
    pub status: LoadStatus,
    pub duration_seconds: f64,
    pub errors: Vec<String>,
    pub raw_records_total: u64,
    pub mart_records_total: u64,
    pub cancelled: bool,
}

impl CampaignLoadResult {
    pub fn is_success(&self) -> bool {
        self.status == LoadStatus::Success
    }
}
