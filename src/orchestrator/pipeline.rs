// Per-Campaign Pipeline (C10) - raw extraction fan-out plus the mart stage
// for one campaign.
use crate::domain::{CampaignLoadResult, CampaignWindow, LoadStatus};
use crate::etl::StreamingEtlEngine;
use crate::mart::MartBuilder;
use crate::watermark_store::{campaign_watermark_name, WatermarkStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info};
use uuid::Uuid;

pub struct PerCampaignPipeline {
    engine: Arc<StreamingEtlEngine>,
    mart_builder: Arc<dyn MartBuilder>,
    watermarks: Arc<WatermarkStore>,
    per_campaign_concurrency: usize,
}

impl PerCampaignPipeline {
    pub fn new(
        engine: Arc<StreamingEtlEngine>,
        mart_builder: Arc<dyn MartBuilder>,
        watermarks: Arc<WatermarkStore>,
        per_campaign_concurrency: usize,
    ) -> Self {
        Self {
            engine,
            mart_builder,
            watermarks,
            per_campaign_concurrency,
        }
    }

    /// Runs the end-to-end pipeline for one campaign: raw tables first
    /// (concurrently, bounded by `per_campaign_concurrency`), then the mart
    /// stage only if every raw table succeeded.
    pub async fn run_for_campaign(&self, campaign: &CampaignWindow, cancelled: Arc<AtomicBool>) -> CampaignLoadResult {
        let start = Instant::now();
        let watermark_name = campaign_watermark_name(&campaign.archivo);
        let extraction_id = format!("e2e_{}", Uuid::new_v4());

        info!(archivo = %campaign.archivo, "starting end-to-end pipeline for campaign");

        if let Err(err) = self.watermarks.start(&watermark_name, &extraction_id).await {
            return CampaignLoadResult {
                archivo: campaign.archivo.clone(),
                status: LoadStatus::Failed,
                duration_seconds: start.elapsed().as_secs_f64(),
                errors: vec![format!("failed to start campaign watermark: {err}")],
                raw_records_total: 0,
                mart_records_total: 0,
                cancelled: false,
            };
        }

        let (raw_records, raw_errors) = self.run_raw_tables(campaign, cancelled.clone()).await;

        let mut errors = raw_errors;
        let mut mart_records = 0u64;

        if errors.is_empty() && !cancelled.load(Ordering::Relaxed) {
            match self.mart_builder.run_for_campaign(campaign).await {
                Ok(records) => mart_records = records,
                Err(err) => errors.push(format!("mart build pipeline failed: {err}")),
            }
        }

        let status = if errors.is_empty() {
            LoadStatus::Success
        } else if raw_records > 0 {
            LoadStatus::Partial
        } else {
            LoadStatus::Failed
        };

        let duration = start.elapsed().as_secs_f64();

        if let Err(err) = self
            .watermarks
            .complete(
                &watermark_name,
                chrono::Utc::now(),
                if status == LoadStatus::Success {
                    crate::domain::WatermarkStatus::Success
                } else {
                    crate::domain::WatermarkStatus::Failed
                },
                (raw_records + mart_records) as i64,
                duration,
                &extraction_id,
                if errors.is_empty() { None } else { Some(&errors.join("; ")) },
                serde_json::json!({}),
            )
            .await
        {
            error!(archivo = %campaign.archivo, %err, "failed to record campaign watermark completion");
        }

        info!(
            archivo = %campaign.archivo,
            status = ?status,
            duration_seconds = duration,
            "finished end-to-end pipeline for campaign"
        );

        CampaignLoadResult {
            archivo: campaign.archivo.clone(),
            status,
            duration_seconds: duration,
            errors,
            raw_records_total: raw_records,
            mart_records_total: mart_records,
            cancelled: cancelled.load(Ordering::Relaxed),
        }
    }

    async fn run_raw_tables(&self, campaign: &CampaignWindow, cancelled: Arc<AtomicBool>) -> (u64, Vec<String>) {
        let semaphore = Arc::new(Semaphore::new(self.per_campaign_concurrency.max(1)));
        let mut handles = Vec::new();

        for config in crate::domain::catalog().raw_tables() {
            let engine = self.engine.clone();
            let semaphore = semaphore.clone();
            let cancelled = cancelled.clone();
            let campaign = campaign.clone();
            let config_name = config.name;

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                if cancelled.load(Ordering::Relaxed) {
                    return Err(format!("{config_name}: skipped, campaign run cancelled"));
                }
                let config = crate::domain::catalog().require(config_name).expect("catalog entry vanished");
                engine
                    .run_table_for_campaign(config, Some(&campaign), false, cancelled)
                    .await
                    .map(|r| r.load_result.inserted + r.load_result.updated)
                    .map_err(|err| format!("{config_name}: {err}"))
            }));
        }

        let mut total = 0u64;
        let mut errors = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Ok(inserted)) => total += inserted,
                Ok(Err(err)) => errors.push(err),
                Err(join_err) => errors.push(format!("table task panicked: {join_err}")),
            }
        }

        (total, errors)
    }
}
