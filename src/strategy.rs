// Strategy Selector (C8) - chooses calendar-driven vs watermark-driven
// extraction for a (table, campaign?) pair.
//
// The decision rule favors precision for fresh campaigns and efficiency for
// old ones: a campaign that just opened is small enough that the exact
// calendar window is cheap and accurate, while an old campaign is cheaper to
// keep current off its watermark than to re-scan its whole window.
use crate::domain::CampaignWindow;
use crate::query::ExtractionStrategy;
use chrono::NaiveDate;

const CAMPAIGN_AGE_THRESHOLD_DAYS: i64 = 90;

/// Picks calendar-driven or watermark-driven extraction for `table`.
///
/// `last_extracted_at` is the table's current watermark floor, if any, read
/// by the caller before invoking this (a pure function over its inputs).
pub fn determine_extraction_strategy(
    campaign: Option<&CampaignWindow>,
    last_extracted_at: Option<NaiveDate>,
    today: NaiveDate,
) -> ExtractionStrategy {
    match campaign {
        Some(campaign) => {
            let age_days = campaign.age_days(today);
            match last_extracted_at {
                None => ExtractionStrategy::CalendarDriven,
                Some(_) if age_days > CAMPAIGN_AGE_THRESHOLD_DAYS => ExtractionStrategy::WatermarkDriven,
                Some(last) if campaign.open_date < last => ExtractionStrategy::WatermarkDriven,
                Some(_) => ExtractionStrategy::CalendarDriven,
            }
        }
        None => match last_extracted_at {
            Some(_) => ExtractionStrategy::WatermarkDriven,
            None => ExtractionStrategy::CalendarDriven,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CampaignStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn campaign(open: NaiveDate, close: Option<NaiveDate>) -> CampaignWindow {
        CampaignWindow::new("C_2025_01".into(), open, close, "consumo".into(), CampaignStatus::Closed).unwrap()
    }

    #[test]
    fn no_watermark_with_campaign_uses_calendar() {
        let c = campaign(date(2025, 1, 1), None);
        let strategy = determine_extraction_strategy(Some(&c), None, date(2025, 1, 10));
        assert_eq!(strategy, ExtractionStrategy::CalendarDriven);
    }

    #[test]
    fn old_campaign_with_watermark_switches_to_watermark() {
        let c = campaign(date(2024, 1, 1), Some(date(2024, 2, 1)));
        let strategy = determine_extraction_strategy(Some(&c), Some(date(2024, 2, 5)), date(2025, 1, 1));
        assert_eq!(strategy, ExtractionStrategy::WatermarkDriven);
    }

    #[test]
    fn campaign_predating_last_extraction_uses_watermark() {
        let c = campaign(date(2025, 1, 1), Some(date(2025, 1, 10)));
        let strategy = determine_extraction_strategy(Some(&c), Some(date(2025, 1, 20)), date(2025, 1, 25));
        assert_eq!(strategy, ExtractionStrategy::WatermarkDriven);
    }

    #[test]
    fn fresh_campaign_with_watermark_still_uses_calendar() {
        let c = campaign(date(2025, 1, 20), None);
        let strategy = determine_extraction_strategy(Some(&c), Some(date(2025, 1, 10)), date(2025, 1, 25));
        assert_eq!(strategy, ExtractionStrategy::CalendarDriven);
    }

    #[test]
    fn no_campaign_with_watermark_uses_watermark() {
        let strategy = determine_extraction_strategy(None, Some(date(2025, 1, 10)), date(2025, 1, 25));
        assert_eq!(strategy, ExtractionStrategy::WatermarkDriven);
    }

    #[test]
    fn no_campaign_no_watermark_defaults_to_calendar() {
        let strategy = determine_extraction_strategy(None, None, date(2025, 1, 25));
        assert_eq!(strategy, ExtractionStrategy::CalendarDriven);
    }
}
