// Per-table calendar window strategies.
//
// Modeled as a trait so the query builder dispatches by table name instead
// of a large if/elif chain.
use crate::domain::CampaignWindow;
use chrono::{Duration, NaiveDate};

pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// An additional OR-clause appended after the date predicate, e.g. the
    /// assignments table's late-bound-rows `archive = '<archivo>'` clause.
    pub extra_predicate: Option<String>,
}

pub trait WindowStrategy: Send + Sync {
    fn window(&self, campaign: &CampaignWindow, today: NaiveDate, extended: bool) -> Window;
}

fn close_or(campaign: &CampaignWindow, fallback_days: i64, today: NaiveDate) -> NaiveDate {
    campaign.close_date.unwrap_or(today + Duration::days(fallback_days))
}

pub struct AssignmentsWindow;
impl WindowStrategy for AssignmentsWindow {
    fn window(&self, campaign: &CampaignWindow, today: NaiveDate, extended: bool) -> Window {
        if !extended {
            return Window {
                start: campaign.open_date,
                end: campaign.close_date.unwrap_or(today),
                extra_predicate: None,
            };
        }
        Window {
            start: campaign.open_date - Duration::days(30),
            end: close_or(campaign, 15, today),
            extra_predicate: Some(format!("archive = '{}'", campaign.archivo)),
        }
    }
}

pub struct DebtsWindow;
impl WindowStrategy for DebtsWindow {
    fn window(&self, campaign: &CampaignWindow, today: NaiveDate, extended: bool) -> Window {
        if !extended {
            return Window {
                start: campaign.open_date,
                end: campaign.close_date.unwrap_or(today),
                extra_predicate: None,
            };
        }
        Window {
            start: campaign.open_date - Duration::days(7),
            end: close_or(campaign, 30, today),
            extra_predicate: Some(format!("archive LIKE '{}%'", campaign.basename())),
        }
    }
}

pub struct PaymentsWindow;
impl WindowStrategy for PaymentsWindow {
    fn window(&self, campaign: &CampaignWindow, today: NaiveDate, extended: bool) -> Window {
        if !extended {
            return Window {
                start: campaign.open_date,
                end: campaign.close_date.unwrap_or(today),
                extra_predicate: None,
            };
        }
        Window {
            start: campaign.open_date - Duration::days(7),
            end: close_or(campaign, 45, today),
            extra_predicate: None,
        }
    }
}

pub struct InteractionsWindow;
impl WindowStrategy for InteractionsWindow {
    fn window(&self, campaign: &CampaignWindow, _today: NaiveDate, _extended: bool) -> Window {
        Window {
            start: campaign.open_date,
            end: campaign
                .close_date
                .unwrap_or(campaign.open_date + Duration::days(90)),
            extra_predicate: None,
        }
    }
}

pub struct DefaultWindow;
impl WindowStrategy for DefaultWindow {
    fn window(&self, campaign: &CampaignWindow, today: NaiveDate, extended: bool) -> Window {
        if !extended {
            return Window {
                start: campaign.open_date,
                end: campaign.close_date.unwrap_or(today),
                extra_predicate: None,
            };
        }
        Window {
            start: campaign.open_date - Duration::days(15),
            end: close_or(campaign, 15, today),
            extra_predicate: None,
        }
    }
}

/// Selects the window strategy for a logical table name.
pub fn strategy_for(table_name: &str) -> Box<dyn WindowStrategy> {
    match table_name {
        "assignments" => Box::new(AssignmentsWindow),
        "debts" => Box::new(DebtsWindow),
        "payments" => Box::new(PaymentsWindow),
        "bot_interactions" | "human_interactions" => Box::new(InteractionsWindow),
        _ => Box::new(DefaultWindow),
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
    fn assignments_extends_30_days_pre_and_15_post() {
        let c = campaign(date(2025, 1, 1), Some(date(2025, 1, 31)));
        let w = strategy_for("assignments").window(&c, date(2025, 2, 1), true);
        assert_eq!(w.start, date(2024, 12, 2));
        assert_eq!(w.end, date(2025, 2, 15));
        assert!(w.extra_predicate.unwrap().contains("archive = 'C_2025_01'"));
    }

    #[test]
    fn debts_uses_basename_like_clause() {
        let c = campaign(date(2025, 1, 1), Some(date(2025, 1, 31)));
        let w = strategy_for("debts").window(&c, date(2025, 2, 1), true);
        assert_eq!(w.start, date(2024, 12, 25));
        assert_eq!(w.end, date(2025, 3, 2));
        assert_eq!(w.extra_predicate.unwrap(), "archive LIKE 'C%'");
    }

    #[test]
    fn interactions_falls_back_to_90_days_open_ended() {
        let c = campaign(date(2025, 1, 1), None);
        let w = strategy_for("bot_interactions").window(&c, date(2025, 2, 1), true);
        assert_eq!(w.start, date(2025, 1, 1));
        assert_eq!(w.end, date(2025, 4, 1));
    }

    #[test]
    fn non_extended_window_uses_exact_campaign_dates() {
        let c = campaign(date(2025, 1, 1), Some(date(2025, 1, 31)));
        let w = strategy_for("assignments").window(&c, date(2025, 2, 1), false);
        assert_eq!(w.start, date(2025, 1, 1));
        assert_eq!(w.end, date(2025, 1, 31));
        assert!(w.extra_predicate.is_none());
    }
}
