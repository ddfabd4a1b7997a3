// Watermark Store (C3) - durable per-table extraction state.
//
// One row per logical table (or per-campaign pseudo-table, `campaign__<archivo>`),
// upserted atomically on every start/complete so a crash mid-extraction leaves
// a `running` row that `reap_stale` can find and fail out.
use crate::domain::{WatermarkRecord, WatermarkStatus, WatermarkSummary};
use crate::error::Result;
use crate::sink::Database;
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::{info, warn};

pub struct WatermarkStore {
    db: Database,
}

impl WatermarkStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Marks `table_name` as `running`, so a crash before `complete` leaves
    /// a visible trail for `reap_stale` to clean up.
    pub async fn start(&self, table_name: &str, extraction_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO etl_watermarks (table_name, last_extracted_at, status, extraction_id, updated_at)
            VALUES ($1, now(), 'running', $2, now())
            ON CONFLICT (table_name) DO UPDATE SET
                status = 'running',
                extraction_id = $2,
                updated_at = now()
            "#,
        )
        .bind(table_name)
        .bind(extraction_id)
        .execute(self.db.pool())
        .await?;

        info!(table_name, extraction_id, "watermark extraction started");
        Ok(())
    }

    /// Records the outcome of an extraction. Only `success`/`reset` move
    /// `last_extracted_at` forward in the sense callers rely on; `failed`
    /// still records the attempt for observability.
    #[allow(clippy::too_many_arguments)]
    pub async fn complete(
        &self,
        table_name: &str,
        last_extracted_at: DateTime<Utc>,
        status: WatermarkStatus,
        records_extracted: i64,
        duration_seconds: f64,
        extraction_id: &str,
        error_message: Option<&str>,
        metadata: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO etl_watermarks (
                table_name, last_extracted_at, status, records_extracted,
                duration_seconds, error_message, extraction_id, metadata,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), now())
            ON CONFLICT (table_name) DO UPDATE SET
                last_extracted_at = $2,
                status = $3,
                records_extracted = $4,
                duration_seconds = $5,
                error_message = $6,
                extraction_id = $7,
                metadata = $8,
                updated_at = now()
            "#,
        )
        .bind(table_name)
        .bind(last_extracted_at)
        .bind(status.as_str())
        .bind(records_extracted)
        .bind(duration_seconds)
        .bind(error_message)
        .bind(extraction_id)
        .bind(metadata)
        .execute(self.db.pool())
        .await?;

        info!(table_name, status = status.as_str(), records_extracted, "watermark updated");
        Ok(())
    }

    pub async fn get_watermark(&self, table_name: &str) -> Result<Option<WatermarkRecord>> {
        let row = sqlx::query(
            r#"
            SELECT table_name, last_extracted_at, status, records_extracted,
                   duration_seconds, extraction_id, error_message, metadata,
                   created_at, updated_at
            FROM etl_watermarks WHERE table_name = $1
            "#,
        )
        .bind(table_name)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Self::record_from_row))
    }

    /// The incremental floor for `table_name`: `None` if no watermark
    /// exists or the last attempt didn't advance it.
    pub async fn last_extraction_time(&self, table_name: &str) -> Result<Option<DateTime<Utc>>> {
        let watermark = self.get_watermark(table_name).await?;
        Ok(watermark
            .filter(|w| w.status.advances_floor())
            .and_then(|w| w.last_extracted_at))
    }

    /// Manually resets a table's watermark to `timestamp` (operator recovery path).
    pub async fn reset(&self, table_name: &str, timestamp: DateTime<Utc>) -> Result<()> {
        self.complete(
            table_name,
            timestamp,
            WatermarkStatus::Reset,
            0,
            0.0,
            "manual-reset",
            Some(&format!("manually reset to {timestamp}")),
            serde_json::json!({}),
        )
        .await?;
        warn!(table_name, %timestamp, "watermark manually reset");
        Ok(())
    }

    /// Fails out any watermark still `running` after `timeout_minutes`,
    /// recovering from a crashed extraction. Returns the count cleaned up.
    pub async fn reap_stale(&self, timeout_minutes: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE etl_watermarks
            SET status = 'failed',
                error_message = 'extraction timed out, marked failed by reaper',
                updated_at = now()
            WHERE status = 'running'
              AND updated_at < now() - make_interval(mins => $1)
            "#,
        )
        .bind(timeout_minutes as i32)
        .execute(self.db.pool())
        .await?;

        let count = result.rows_affected();
        if count > 0 {
            warn!(count, "reaped stale running watermarks");
        }
        Ok(count)
    }

    pub async fn summary(&self) -> Result<WatermarkSummary> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_tables,
                COUNT(*) FILTER (WHERE status = 'success') AS successful_tables,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed_tables,
                COUNT(*) FILTER (WHERE status = 'running') AS running_tables,
                COALESCE(SUM(records_extracted), 0) AS total_records_extracted,
                COALESCE(AVG(duration_seconds), 0) AS avg_extraction_seconds,
                MAX(updated_at) AS last_activity
            FROM etl_watermarks
            "#,
        )
        .fetch_one(self.db.pool())
        .await?;

        Ok(WatermarkSummary {
            total_tables: row.get("total_tables"),
            successful_tables: row.get("successful_tables"),
            failed_tables: row.get("failed_tables"),
            running_tables: row.get("running_tables"),
            total_records_extracted: row.get("total_records_extracted"),
            avg_extraction_seconds: row.get("avg_extraction_seconds"),
            last_activity: row.get("last_activity"),
        })
    }

    fn record_from_row(row: sqlx::postgres::PgRow) -> WatermarkRecord {
        let status_str: String = row.get("status");
        WatermarkRecord {
            table_name: row.get("table_name"),
            last_extracted_at: row.get("last_extracted_at"),
            status: WatermarkStatus::from_str(&status_str).unwrap_or(WatermarkStatus::Failed),
            records_extracted: row.get("records_extracted"),
            duration_seconds: row.get("duration_seconds"),
            extraction_id: row.get("extraction_id"),
            error_message: row.get("error_message"),
            metadata: row.get("metadata"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// The pseudo-table name the per-campaign pipeline's own watermark is
/// stored under, distinct from any of the catalog's per-table watermarks.
pub fn campaign_watermark_name(archivo: &str) -> String {
    format!("campaign__{archivo}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_watermark_name_is_namespaced() {
        assert_eq!(campaign_watermark_name("C_2025_01"), "campaign__C_2025_01");
    }
}
