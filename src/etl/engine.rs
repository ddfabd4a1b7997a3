// Streaming ETL Engine (C7) - extract, transform, load for one table.
//
// The warehouse reader and the sink writer run concurrently, joined by a
// bounded channel: the producer blocks once the channel is full, so a slow
// sink naturally throttles a fast warehouse instead of the engine buffering
// an unbounded number of pages in memory.
use crate::domain::{
    CampaignWindow, EtlStats, LoadStatus, TableConfig, TableLoadResult, WatermarkRecord,
};
use crate::error::{EtlError, Result};
use crate::query::{build_query, ExtractionStrategy};
use crate::sink::SinkWriter;
use crate::strategy::determine_extraction_strategy;
use crate::transform::TransformerRegistry;
use crate::warehouse::WarehouseClient;
use crate::watermark_store::WatermarkStore;
use chrono::{NaiveDate, Utc};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Hard cap on a single sink write; a warehouse page larger than this is
/// split into smaller chunks before it reaches the sink writer.
const CHANNEL_CAPACITY: usize = 1;

pub struct StreamingEtlEngine {
    warehouse: Arc<dyn WarehouseClient>,
    sink: Arc<SinkWriter>,
    watermarks: Arc<WatermarkStore>,
    project_id: String,
    dataset_id: String,
    project_uid: String,
    max_batch_size: usize,
}

impl StreamingEtlEngine {
    pub fn new(
        warehouse: Arc<dyn WarehouseClient>,
        sink: Arc<SinkWriter>,
        watermarks: Arc<WatermarkStore>,
        project_id: String,
        dataset_id: String,
        project_uid: String,
        max_batch_size: usize,
    ) -> Self {
        Self {
            warehouse,
            sink,
            watermarks,
            project_id,
            dataset_id,
            project_uid,
            max_batch_size,
        }
    }

    /// Runs the full extract/transform/load cycle for one table, optionally
    /// scoped to a campaign. Cooperative cancellation: `cancelled` is
    /// checked between pages, never mid-page.
    pub async fn run_table_for_campaign(
        &self,
        config: &TableConfig,
        campaign: Option<&CampaignWindow>,
        force_full_refresh: bool,
        cancelled: Arc<AtomicBool>,
    ) -> Result<TableLoadResult> {
        let extraction_id = Uuid::new_v4().to_string()[..8].to_string();
        let start = Instant::now();

        self.watermarks.start(config.name, &extraction_id).await?;

        let watermark = self.watermarks.get_watermark(config.name).await?;
        let today = Utc::now().date_naive();
        let strategy = self.select_strategy(config, campaign, watermark.as_ref(), today);

        let sql = build_query(
            config,
            strategy,
            campaign,
            watermark.as_ref(),
            force_full_refresh,
            &self.project_id,
            &self.dataset_id,
            today,
        );

        info!(table = config.name, strategy = strategy.as_str(), "starting table extraction");

        let result = self
            .extract_transform_load(config, &sql, cancelled.clone())
            .await;

        let duration = start.elapsed().as_secs_f64();

        match result {
            Ok((load_result, stats)) => {
                let watermark_timestamp = self.next_watermark_timestamp(strategy, campaign, today);
                self.watermarks
                    .complete(
                        config.name,
                        watermark_timestamp,
                        crate::domain::WatermarkStatus::Success,
                        (load_result.inserted + load_result.updated) as i64,
                        duration,
                        &extraction_id,
                        None,
                        serde_json::json!({
                            "strategy": strategy.as_str(),
                            "campaign": campaign.map(|c| c.archivo.clone()),
                            "errors_during_transform": stats.errors,
                        }),
                    )
                    .await?;

                Ok(TableLoadResult {
                    table_name: config.name.to_string(),
                    load_result,
                    strategy: strategy.as_str(),
                })
            }
            Err(err) => {
                self.watermarks
                    .complete(
                        config.name,
                        Utc::now(),
                        crate::domain::WatermarkStatus::Failed,
                        0,
                        duration,
                        &extraction_id,
                        Some(&err.to_string()),
                        serde_json::json!({"strategy": strategy.as_str()}),
                    )
                    .await?;
                Err(err)
            }
        }
    }

    fn select_strategy(
        &self,
        config: &TableConfig,
        campaign: Option<&CampaignWindow>,
        watermark: Option<&WatermarkRecord>,
        today: NaiveDate,
    ) -> ExtractionStrategy {
        if config.default_mode == crate::domain::ExtractionMode::FullRefresh {
            return ExtractionStrategy::CalendarDriven;
        }
        let last_extracted = watermark
            .filter(|w| w.status.advances_floor())
            .and_then(|w| w.last_extracted_at)
            .map(|ts| ts.date_naive());
        determine_extraction_strategy(campaign, last_extracted, today)
    }

    /// For a calendar-driven extraction the watermark advances to the
    /// campaign's anchor date, not "now", so the next run's lookback window
    /// starts from data the campaign actually covers.
    fn next_watermark_timestamp(
        &self,
        strategy: ExtractionStrategy,
        campaign: Option<&CampaignWindow>,
        today: NaiveDate,
    ) -> chrono::DateTime<Utc> {
        match (strategy, campaign) {
            (ExtractionStrategy::CalendarDriven, Some(campaign)) => campaign
                .watermark_anchor()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                .and_utc(),
            _ => {
                let _ = today;
                Utc::now()
            }
        }
    }

    async fn extract_transform_load(
        &self,
        config: &TableConfig,
        sql: &str,
        cancelled: Arc<AtomicBool>,
    ) -> Result<(crate::domain::LoadResult, EtlStats)> {
        let page_size = config.batch_size.min(self.max_batch_size.max(1));
        let mut pages = self.warehouse.stream(sql, page_size).await?;

        let (tx, mut rx) = mpsc::channel::<crate::domain::RowBatch>(CHANNEL_CAPACITY);
        let table_name = config.name.to_string();
        let cancel_producer = cancelled.clone();

        let producer = tokio::spawn(async move {
            let mut batch_count = 0u64;
            while let Some(page) = pages.next().await {
                if cancel_producer.load(Ordering::Relaxed) {
                    debug!(table = %table_name, "producer stopping, cancellation requested");
                    break;
                }
                match page {
                    Ok(rows) if rows.is_empty() => continue,
                    Ok(rows) => {
                        batch_count += 1;
                        if tx.send(rows).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(table = %table_name, error = %err, "warehouse page failed");
                        return Err(err);
                    }
                }
            }
            debug!(table = %table_name, batch_count, "producer finished");
            Ok(())
        });

        let mut stats = EtlStats::new();
        let mut total = crate::domain::LoadResult::empty_success();
        let mut total_errors: Vec<String> = Vec::new();
        let is_full_refresh = config.default_mode == crate::domain::ExtractionMode::FullRefresh;
        let mut truncated = false;

        while let Some(raw_batch) = rx.recv().await {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }

            for chunk in raw_batch.chunks(self.max_batch_size) {
                let transformed = match TransformerRegistry::transform_batch(config.name, chunk.to_vec(), &mut stats) {
                    Ok(rows) => rows,
                    Err(err) => {
                        stats.errors += 1;
                        total_errors.push(err.to_string());
                        continue;
                    }
                };

                // A full-refresh table truncates only once, on its first
                // chunk: truncating per chunk would wipe out rows already
                // loaded by earlier chunks of the same run.
                let load_result = if is_full_refresh && !truncated {
                    truncated = true;
                    self.sink.truncate_and_load(config, &self.project_uid, transformed).await?
                } else {
                    self.sink.load_batch(config, &self.project_uid, transformed).await?
                };

                total.total_received += load_result.total_received;
                total.inserted += load_result.inserted;
                total.updated += load_result.updated;
                total.skipped += load_result.skipped;
                total.duration_seconds += load_result.duration_seconds;
            }
        }

        if is_full_refresh && !truncated {
            let load_result = self.sink.truncate_and_load(config, &self.project_uid, Vec::new()).await?;
            total.total_received += load_result.total_received;
            total.duration_seconds += load_result.duration_seconds;
        }

        producer.await.map_err(|e| EtlError::Transaction(e.to_string()))??;

        total.status = if total_errors.is_empty() {
            LoadStatus::Success
        } else if total.inserted > 0 {
            LoadStatus::Partial
        } else {
            LoadStatus::Failed
        };
        if !total_errors.is_empty() {
            total.error = Some(total_errors.join("; "));
        }

        Ok((total, stats))
    }
}
