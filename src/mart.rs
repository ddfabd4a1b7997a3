// Mart Builder - builds the reporting (mart) layer from the raw/aux layers
// for one campaign.
//
// This is an external collaborator: the engine owns raw extraction and
// loading, and hands the campaign off to whatever implements this trait once
// raw data lands. The business logic that turns raw rows into dashboard
// tables lives outside this crate's scope; `NoopMartBuilder` is the default
// so the orchestrator runs end-to-end without one configured.
use crate::domain::CampaignWindow;
use crate::error::Result;
use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait MartBuilder: Send + Sync {
    /// Builds (or refreshes) the mart layer for `campaign`, returning the
    /// number of mart records produced.
    async fn run_for_campaign(&self, campaign: &CampaignWindow) -> Result<u64>;
}

/// Default `MartBuilder`: does nothing and reports zero records, so a
/// deployment without a mart layer configured still completes the raw stage.
pub struct NoopMartBuilder;

#[async_trait]
impl MartBuilder for NoopMartBuilder {
    async fn run_for_campaign(&self, campaign: &CampaignWindow) -> Result<u64> {
        debug!(archivo = %campaign.archivo, "no mart builder configured, skipping mart stage");
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CampaignStatus;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn noop_builder_reports_zero_records() {
        let campaign = CampaignWindow::new(
            "C_2025_01".into(),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            None,
            "consumo".into(),
            CampaignStatus::Open,
        )
        .unwrap();

        let produced = NoopMartBuilder.run_for_campaign(&campaign).await.unwrap();
        assert_eq!(produced, 0);
    }
}
