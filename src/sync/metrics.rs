//! Metrics reconciliation: full replacement of a campaign's metric rows.
//!
//! The stored set is not an append-only history; every sync deletes the
//! campaign's rows and inserts the freshly fetched ones. Callers run this
//! inside the same transaction as the campaign upsert so a failure cannot
//! leave the campaign metric-less.

use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Date, Double, Uuid as SqlUuid};
use uuid::Uuid;

use crate::vendors::VendorInsight;

struct NewMetric {
    id: Uuid,
    campaign_id: Uuid,
    date: NaiveDate,
    impressions: i64,
    clicks: i64,
    spend: f64,
    leads: i64,
}

fn metric_rows(campaign_id: Uuid, insights: &[VendorInsight]) -> Vec<NewMetric> {
    insights
        .iter()
        .map(|i| NewMetric {
            id: Uuid::new_v4(),
            campaign_id,
            date: i.date,
            impressions: i.impressions,
            clicks: i.clicks,
            spend: i.spend,
            leads: i.leads,
        })
        .collect()
}

/// Delete every metric row for the campaign, then insert the fetched set.
/// Returns the number of rows inserted. Zero fetched insights leaves the
/// campaign with zero rows; that is accepted behavior, not an error.
pub fn replace_metrics(
    conn: &mut PgConnection,
    campaign_id: Uuid,
    insights: &[VendorInsight],
) -> Result<usize, diesel::result::Error> {
    diesel::sql_query("DELETE FROM metrics WHERE campaign_id = $1")
        .bind::<SqlUuid, _>(campaign_id)
        .execute(conn)?;

    let rows = metric_rows(campaign_id, insights);
    for row in &rows {
        diesel::sql_query(
            "INSERT INTO metrics (id, campaign_id, date, impressions, clicks, spend, leads) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind::<SqlUuid, _>(row.id)
        .bind::<SqlUuid, _>(row.campaign_id)
        .bind::<Date, _>(row.date)
        .bind::<BigInt, _>(row.impressions)
        .bind::<BigInt, _>(row.clicks)
        .bind::<Double, _>(row.spend)
        .bind::<BigInt, _>(row.leads)
        .execute(conn)?;
    }

    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insight(day: &str, impressions: i64) -> VendorInsight {
        VendorInsight {
            date: day.parse().unwrap(),
            impressions,
            clicks: impressions / 10,
            spend: impressions as f64 / 100.0,
            leads: 0,
        }
    }

    #[test]
    fn replacement_set_has_exactly_one_row_per_insight() {
        let campaign_id = Uuid::new_v4();
        let insights = vec![
            insight("2026-02-01", 100),
            insight("2026-02-02", 200),
            insight("2026-02-03", 0),
        ];

        let rows = metric_rows(campaign_id, &insights);
        assert_eq!(rows.len(), insights.len());
        assert!(rows.iter().all(|r| r.campaign_id == campaign_id));
        assert_eq!(rows[1].impressions, 200);
        assert_eq!(rows[1].clicks, 20);
        assert_eq!(rows[1].spend, 2.0);
    }

    #[test]
    fn zero_insights_produce_zero_rows() {
        assert!(metric_rows(Uuid::new_v4(), &[]).is_empty());
    }
}
