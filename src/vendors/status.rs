//! Vendor status and objective mapping.

use crate::shared::models::CampaignStatus;

/// Meta campaign status mapping. Unknown values fall back to draft.
pub fn map_meta_status(raw: &str) -> CampaignStatus {
    match raw {
        "ACTIVE" => CampaignStatus::Active,
        "PAUSED" => CampaignStatus::Paused,
        "DELETED" => CampaignStatus::Deleted,
        "ARCHIVED" => CampaignStatus::Archived,
        _ => CampaignStatus::Draft,
    }
}

/// TikTok campaign status mapping. Unknown values fall back to paused
/// (intentionally different from the Meta fallback).
pub fn map_tiktok_status(raw: &str) -> CampaignStatus {
    match raw {
        "CAMPAIGN_STATUS_ENABLE" => CampaignStatus::Active,
        "CAMPAIGN_STATUS_DISABLE" => CampaignStatus::Paused,
        "CAMPAIGN_STATUS_DELETE" => CampaignStatus::Deleted,
        _ => CampaignStatus::Paused,
    }
}

/// Display form of a vendor objective: vendor prefix stripped, lowercased,
/// underscores replaced with spaces.
pub fn display_objective(raw: &str) -> String {
    raw.trim_start_matches("OUTCOME_")
        .to_lowercase()
        .replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_statuses_map_to_normalized_set() {
        assert_eq!(map_meta_status("ACTIVE"), CampaignStatus::Active);
        assert_eq!(map_meta_status("PAUSED"), CampaignStatus::Paused);
        assert_eq!(map_meta_status("DELETED"), CampaignStatus::Deleted);
        assert_eq!(map_meta_status("ARCHIVED"), CampaignStatus::Archived);
        assert_eq!(map_meta_status("IN_PROCESS"), CampaignStatus::Draft);
        assert_eq!(map_meta_status(""), CampaignStatus::Draft);
    }

    #[test]
    fn tiktok_statuses_map_with_paused_fallback() {
        assert_eq!(
            map_tiktok_status("CAMPAIGN_STATUS_ENABLE"),
            CampaignStatus::Active
        );
        assert_eq!(
            map_tiktok_status("CAMPAIGN_STATUS_DISABLE"),
            CampaignStatus::Paused
        );
        assert_eq!(
            map_tiktok_status("CAMPAIGN_STATUS_DELETE"),
            CampaignStatus::Deleted
        );
        assert_eq!(
            map_tiktok_status("CAMPAIGN_STATUS_FROZEN"),
            CampaignStatus::Paused
        );
    }

    #[test]
    fn objective_display_normalization() {
        assert_eq!(display_objective("OUTCOME_LEADS"), "leads");
        assert_eq!(display_objective("OUTCOME_TRAFFIC"), "traffic");
        assert_eq!(display_objective("LEAD_GENERATION"), "lead generation");
    }
}
