// Campaign window - the unit of work the orchestrator schedules around.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a campaign, as recorded in the sink's calendar table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Open,
    Closed,
}

/// A time-windowed debt-collection campaign ("archivo").
///
/// `close_date` is `None` for campaigns still open. Supplied by an external
/// calendar table in the sink; the engine never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignWindow {
    pub archivo: String,
    pub open_date: NaiveDate,
    pub close_date: Option<NaiveDate>,
    pub portfolio_type: String,
    pub status: CampaignStatus,
}

impl CampaignWindow {
    pub fn new(
        archivo: String,
        open_date: NaiveDate,
        close_date: Option<NaiveDate>,
        portfolio_type: String,
        status: CampaignStatus,
    ) -> Result<Self, String> {
        if let Some(close) = close_date {
            if open_date > close {
                return Err(format!(
                    "campaign {archivo}: open_date {open_date} is after close_date {close}"
                ));
            }
        }

        Ok(Self {
            archivo,
            open_date,
            close_date,
            portfolio_type,
            status,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == CampaignStatus::Open
    }

    /// Days since the campaign opened, as of `today`.
    pub fn age_days(&self, today: NaiveDate) -> i64 {
        (today - self.open_date).num_days()
    }

    /// The basename up to the first underscore, used by the debts window
    /// strategy's `archive LIKE '<basename>%'` predicate.
    pub fn basename(&self) -> &str {
        self.archivo.split('_').next().unwrap_or(&self.archivo)
    }

    /// The watermark timestamp a calendar-strategy extraction advances to:
    /// the campaign's close date, falling back to its open date.
    pub fn watermark_anchor(&self) -> NaiveDate {
        self.close_date.unwrap_or(self.open_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rejects_close_before_open() {
        let result = CampaignWindow::new(
            "C_2025_01".into(),
            date(2025, 1, 31),
            Some(date(2025, 1, 1)),
            "consumo".into(),
            CampaignStatus::Closed,
        );
        assert!(result.is_err());
    }

    #[test]
    fn basename_splits_on_underscore() {
        let c = CampaignWindow::new(
            "C_2025_01".into(),
            date(2025, 1, 1),
            None,
            "consumo".into(),
            CampaignStatus::Open,
        )
        .unwrap();
        assert_eq!(c.basename(), "C");
    }

    #[test]
    fn watermark_anchor_falls_back_to_open_date() {
        let c = CampaignWindow::new(
            "C_2025_01".into(),
            date(2025, 1, 1),
            None,
            "consumo".into(),
            CampaignStatus::Open,
        )
        .unwrap();
        assert_eq!(c.watermark_anchor(), date(2025, 1, 1));
    }

    #[test]
    fn age_days_counts_from_open_date() {
        let c = CampaignWindow::new(
            "C_2025_01".into(),
            date(2025, 1, 1),
            None,
            "consumo".into(),
            CampaignStatus::Open,
        )
        .unwrap();
        assert_eq!(c.age_days(date(2025, 4, 1)), 90);
    }
}
