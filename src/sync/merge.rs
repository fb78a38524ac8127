//! Cross-platform campaign merge for the dashboard feed.
//!
//! Live vendor results and persisted fallback rows are combined into one
//! list, de-duplicated by normalized campaign name. Live entries always win
//! on collision; ordering is vendor order first, then unmatched persisted
//! rows.

use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize)]
pub struct CampaignOverview {
    pub name: String,
    pub platform: Option<String>,
    pub status: String,
    pub impressions: i64,
    pub clicks: i64,
    pub spend: f64,
    pub leads: i64,
    pub ctr: String,
    pub cpc: String,
}

impl CampaignOverview {
    #[allow(clippy::too_many_arguments)]
    pub fn from_totals(
        name: impl Into<String>,
        platform: Option<String>,
        status: impl Into<String>,
        impressions: i64,
        clicks: i64,
        spend: f64,
        leads: i64,
    ) -> Self {
        let ctr = if impressions > 0 {
            clicks as f64 / impressions as f64 * 100.0
        } else {
            0.0
        };
        let cpc = if clicks > 0 {
            spend / clicks as f64
        } else {
            0.0
        };

        Self {
            name: name.into(),
            platform,
            status: status.into(),
            impressions,
            clicks,
            spend,
            leads,
            ctr: format!("{ctr:.2}"),
            cpc: format!("{cpc:.2}"),
        }
    }
}

fn dedup_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Merge live vendor campaigns with persisted fallback rows. The dedup key
/// is the normalized name only (not platform + name), matching how the
/// dashboard has always presented cross-platform lists.
pub fn merge_campaigns(
    live: Vec<CampaignOverview>,
    persisted: Vec<CampaignOverview>,
) -> Vec<CampaignOverview> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(live.len() + persisted.len());

    for campaign in live {
        if seen.insert(dedup_key(&campaign.name)) {
            merged.push(campaign);
        }
    }
    for campaign in persisted {
        if seen.insert(dedup_key(&campaign.name)) {
            merged.push(campaign);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(name: &str, platform: &str) -> CampaignOverview {
        CampaignOverview::from_totals(name, Some(platform.to_string()), "active", 100, 10, 5.0, 1)
    }

    fn persisted(name: &str) -> CampaignOverview {
        CampaignOverview::from_totals(name, None, "paused", 50, 5, 2.0, 0)
    }

    #[test]
    fn vendor_entry_wins_over_persisted_on_name_collision() {
        let merged = merge_campaigns(
            vec![live("Engineer Role", "meta")],
            vec![persisted("engineer role ")],
        );

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "Engineer Role");
        assert_eq!(merged[0].platform.as_deref(), Some("meta"));
    }

    #[test]
    fn unmatched_persisted_rows_follow_vendor_rows() {
        let merged = merge_campaigns(
            vec![live("A", "meta"), live("B", "tiktok")],
            vec![persisted("b"), persisted("C")],
        );

        let names: Vec<_> = merged.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn ctr_and_cpc_are_zero_guarded() {
        let no_impressions = CampaignOverview::from_totals("x", None, "active", 0, 0, 10.0, 0);
        assert_eq!(no_impressions.ctr, "0.00");
        assert_eq!(no_impressions.cpc, "0.00");

        let no_clicks = CampaignOverview::from_totals("y", None, "active", 500, 0, 10.0, 0);
        assert_eq!(no_clicks.ctr, "0.00");
        assert_eq!(no_clicks.cpc, "0.00");
    }

    #[test]
    fn q1_hiring_numbers_compute_as_expected() {
        let overview = CampaignOverview::from_totals(
            "Q1 Hiring",
            Some("meta".to_string()),
            "active",
            1000,
            50,
            25.0,
            4,
        );
        let merged = merge_campaigns(vec![overview], vec![]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].platform.as_deref(), Some("meta"));
        assert_eq!(merged[0].ctr, "5.00");
        assert_eq!(merged[0].cpc, "0.50");
    }
}
