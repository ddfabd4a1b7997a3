// Campaign Orchestrator (C9) - the top-level entry point: finds pending
// campaigns, decides which need processing, and runs them in batches.
use crate::domain::{CampaignLoadResult, CampaignStatus, CampaignWindow};
use crate::error::Result;
use crate::orchestrator::pipeline::PerCampaignPipeline;
use crate::sink::Database;
use crate::watermark_store::{campaign_watermark_name, WatermarkStore};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::Row;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub status: &'static str,
    pub duration_seconds: f64,
    pub campaigns_total_in_sink: usize,
    pub campaigns_eligible: usize,
    pub campaigns_processed: usize,
    pub campaigns_successful: usize,
    pub campaigns_failed: usize,
    pub total_raw_records: u64,
    pub total_mart_records: u64,
    pub failed_archivos: Vec<String>,
}

pub struct CampaignOrchestrator {
    db: Database,
    watermarks: Arc<WatermarkStore>,
    pipeline: Arc<PerCampaignPipeline>,
    project_uid: String,
    is_running: Arc<Mutex<bool>>,
    cancelled: Arc<AtomicBool>,
}

impl CampaignOrchestrator {
    pub fn new(
        db: Database,
        watermarks: Arc<WatermarkStore>,
        pipeline: Arc<PerCampaignPipeline>,
        project_uid: String,
    ) -> Self {
        Self {
            db,
            watermarks,
            pipeline,
            project_uid,
            is_running: Arc::new(Mutex::new(false)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.lock().await
    }

    /// Signals a running catch-up to stop after its current batch.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        warn!("cancellation requested, will stop after the current batch");
    }

    /// Reads the campaign windows already loaded into the sink's raw
    /// calendar table, ordered oldest-open-date first.
    pub async fn campaign_windows(&self, limit: Option<i64>) -> Result<Vec<CampaignWindow>> {
        let calendar_config = crate::domain::catalog().require("calendar")?;
        let fq_table = calendar_config.fq_name(&self.project_uid);

        let mut sql = format!(
            "SELECT archivo, fecha_apertura, fecha_cierre, tipo_cartera, estado_cartera \
             FROM {fq_table} WHERE fecha_apertura IS NOT NULL ORDER BY fecha_apertura ASC"
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let rows = sqlx::query(&sql).fetch_all(self.db.pool()).await?;

        let campaigns = rows
            .into_iter()
            .filter_map(|row| {
                let archivo: String = row.get("archivo");
                let open_date: NaiveDate = row.get("fecha_apertura");
                let close_date: Option<NaiveDate> = row.get("fecha_cierre");
                let portfolio_type: Option<String> = row.get("tipo_cartera");
                let estado: Option<String> = row.get("estado_cartera");
                let status = match estado.as_deref() {
                    Some("cerrada") | Some("closed") => CampaignStatus::Closed,
                    _ => CampaignStatus::Open,
                };
                CampaignWindow::new(archivo.clone(), open_date, close_date, portfolio_type.unwrap_or_default(), status)
                    .map_err(|e| warn!(archivo, %e, "dropping malformed campaign window"))
                    .ok()
            })
            .collect();

        Ok(campaigns)
    }

    /// Whether `campaign` needs (re)processing: no watermark yet, the last
    /// attempt failed, or the campaign is still open and might have new data.
    async fn should_process_campaign(&self, campaign: &CampaignWindow, force_refresh: bool) -> bool {
        if force_refresh {
            return true;
        }
        let watermark_name = campaign_watermark_name(&campaign.archivo);
        match self.watermarks.get_watermark(&watermark_name).await {
            Ok(Some(watermark)) => {
                !watermark.status.advances_floor() || campaign.is_active()
            }
            Ok(None) => true,
            Err(err) => {
                warn!(archivo = %campaign.archivo, %err, "failed to read campaign watermark, processing anyway");
                true
            }
        }
    }

    /// Runs every eligible campaign, `batch_size` at a time. Returns
    /// `already_running` instead of a summary if a catch-up is in flight.
    pub async fn run_all_pending_campaigns(
        &self,
        batch_size: usize,
        max_campaigns: Option<i64>,
        force_refresh_all: bool,
    ) -> Result<RunSummary> {
        {
            let mut running = self.is_running.lock().await;
            if *running {
                warn!("catch-up already running, ignoring new request");
                return Ok(RunSummary {
                    status: "already_running",
                    duration_seconds: 0.0,
                    campaigns_total_in_sink: 0,
                    campaigns_eligible: 0,
                    campaigns_processed: 0,
                    campaigns_successful: 0,
                    campaigns_failed: 0,
                    total_raw_records: 0,
                    total_mart_records: 0,
                    failed_archivos: Vec::new(),
                });
            }
            *running = true;
        }
        self.cancelled.store(false, Ordering::Relaxed);

        let start = Instant::now();
        let result = self.run_all_pending_campaigns_inner(batch_size, max_campaigns, force_refresh_all, start).await;

        *self.is_running.lock().await = false;
        self.cancelled.store(false, Ordering::Relaxed);

        result
    }

    async fn run_all_pending_campaigns_inner(
        &self,
        batch_size: usize,
        max_campaigns: Option<i64>,
        force_refresh_all: bool,
        start: Instant,
    ) -> Result<RunSummary> {
        info!(force_refresh_all, "starting campaign catch-up");

        let all_campaigns = self.campaign_windows(max_campaigns).await?;
        if all_campaigns.is_empty() {
            return Ok(RunSummary {
                status: "completed",
                duration_seconds: start.elapsed().as_secs_f64(),
                campaigns_total_in_sink: 0,
                campaigns_eligible: 0,
                campaigns_processed: 0,
                campaigns_successful: 0,
                campaigns_failed: 0,
                total_raw_records: 0,
                total_mart_records: 0,
                failed_archivos: Vec::new(),
            });
        }

        let mut eligible = Vec::new();
        for campaign in &all_campaigns {
            if self.should_process_campaign(campaign, force_refresh_all).await {
                eligible.push(campaign.clone());
            }
        }

        info!(
            total = all_campaigns.len(),
            eligible = eligible.len(),
            "campaign eligibility determined"
        );

        let mut results: Vec<CampaignLoadResult> = Vec::new();
        for batch in eligible.chunks(batch_size.max(1)) {
            if self.cancelled.load(Ordering::Relaxed) {
                info!("catch-up cancelled, stopping before next batch");
                break;
            }

            let handles: Vec<_> = batch
                .iter()
                .map(|campaign| {
                    let pipeline = self.pipeline.clone();
                    let campaign = campaign.clone();
                    let cancelled = self.cancelled.clone();
                    tokio::spawn(async move { pipeline.run_for_campaign(&campaign, cancelled).await })
                })
                .collect();

            for (handle, campaign) in handles.into_iter().zip(batch.iter()) {
                match handle.await {
                    Ok(result) => results.push(result),
                    Err(join_err) => results.push(CampaignLoadResult {
                        archivo: campaign.archivo.clone(),
                        status: crate::domain::LoadStatus::Failed,
                        duration_seconds: 0.0,
                        errors: vec![format!("campaign task panicked: {join_err}")],
                        raw_records_total: 0,
                        mart_records_total: 0,
                        cancelled: false,
                    }),
                }
            }
        }

        Ok(self.summarize(start, &all_campaigns, &eligible, &results))
    }

    fn summarize(
        &self,
        start: Instant,
        all_campaigns: &[CampaignWindow],
        eligible: &[CampaignWindow],
        results: &[CampaignLoadResult],
    ) -> RunSummary {
        let successful = results.iter().filter(|r| r.is_success()).count();
        let failed = results.len() - successful;

        RunSummary {
            status: if self.cancelled.load(Ordering::Relaxed) { "cancelled" } else { "completed" },
            duration_seconds: start.elapsed().as_secs_f64(),
            campaigns_total_in_sink: all_campaigns.len(),
            campaigns_eligible: eligible.len(),
            campaigns_processed: results.len(),
            campaigns_successful: successful,
            campaigns_failed: failed,
            total_raw_records: results.iter().map(|r| r.raw_records_total).sum(),
            total_mart_records: results.iter().map(|r| r.mart_records_total).sum(),
            failed_archivos: results.iter().filter(|r| !r.is_success()).map(|r| r.archivo.clone()).collect(),
        }
    }
}
