// Watermark record - durable per-table extraction state.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkStatus {
    Success,
    Running,
    Failed,
    Reset,
}

impl WatermarkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatermarkStatus::Success => "success",
            WatermarkStatus::Running => "running",
            WatermarkStatus::Failed => "failed",
            WatermarkStatus::Reset => "reset",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "success" => Some(WatermarkStatus::Success),
            "running" => Some(WatermarkStatus::Running),
            "failed" => Some(WatermarkStatus::Failed),
            "reset" => Some(WatermarkStatus::Reset),
            _ => None,
        }
    }

    /// Only `success` and `reset` advance the incremental floor.
    pub fn advances_floor(&self) -> bool {
        matches!(self, WatermarkStatus::Success | WatermarkStatus::Reset)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatermarkRecord {
    pub table_name: String,
    pub last_extracted_at: Option<DateTime<Utc>>,
    pub status: WatermarkStatus,
    pub records_extracted: i64,
    pub duration_seconds: f64,
    pub extraction_id: String,
    pub error_message: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate counters returned by `WatermarkStore::summary`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatermarkSummary {
    pub total_tables: i64,
    pub successful_tables: i64,
    pub failed_tables: i64,
    pub running_tables: i64,
    pub total_records_extracted: i64,
    pub avg_extraction_seconds: f64,
    pub last_activity: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_success_and_reset_advance_floor() {
        assert!(WatermarkStatus::Success.advances_floor());
        assert!(WatermarkStatus::Reset.advances_floor());
        assert!(!WatermarkStatus::Running.advances_floor());
        assert!(!WatermarkStatus::Failed.advances_floor());
    }

    #[test]
    fn round_trips_through_str() {
        for s in [
            WatermarkStatus::Success,
            WatermarkStatus::Running,
            WatermarkStatus::Failed,
            WatermarkStatus::Reset,
        ] {
            assert_eq!(WatermarkStatus::from_str(s.as_str()), Some(s));
        }
    }
}
