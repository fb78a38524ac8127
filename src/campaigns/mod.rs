//! Campaign CRUD and the merged dashboard feed.
//!
//! Campaigns come from two places: the campaign wizard (manual creation,
//! platform null) and the sync pipeline (vendor-sourced rows). Sync never
//! hard-deletes a campaign; only the DELETE endpoint does, and metrics go
//! with it.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, post, put};
use axum::Router;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Jsonb, Nullable, Text, Uuid as SqlUuid};
use log::error;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::shared::models::{CampaignRow, CampaignStatus};
use crate::shared::state::AppState;
use crate::shared::utils::with_db;
use crate::sync::merge::{merge_campaigns, CampaignOverview};

const CAMPAIGN_COLUMNS: &str = "id, org_id, name, external_id, status, objective, budget, \
     platform, start_date, end_date, location_targeting, audience_targeting, ad_copy, \
     cta_button, creative_assets, created_by, created_at, updated_at";

#[derive(Debug, QueryableByName)]
struct OverviewRow {
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = Nullable<Text>)]
    platform: Option<String>,
    #[diesel(sql_type = Text)]
    status: String,
    #[diesel(sql_type = BigInt)]
    impressions: i64,
    #[diesel(sql_type = BigInt)]
    clicks: i64,
    #[diesel(sql_type = Double)]
    spend: f64,
    #[diesel(sql_type = BigInt)]
    leads: i64,
}

/// Persisted fallback list for the dashboard: every campaign in the org
/// with its lifetime metric totals.
pub fn persisted_overviews(
    conn: &mut PgConnection,
    org_id: Uuid,
) -> Result<Vec<CampaignOverview>, diesel::result::Error> {
    let rows: Vec<OverviewRow> = diesel::sql_query(
        "SELECT c.name, c.platform, c.status, \
                COALESCE(SUM(m.impressions), 0)::BIGINT AS impressions, \
                COALESCE(SUM(m.clicks), 0)::BIGINT AS clicks, \
                COALESCE(SUM(m.spend), 0)::FLOAT8 AS spend, \
                COALESCE(SUM(m.leads), 0)::BIGINT AS leads \
         FROM campaigns c \
         LEFT JOIN metrics m ON m.campaign_id = c.id \
         WHERE c.org_id = $1 \
         GROUP BY c.id, c.name, c.platform, c.status, c.created_at \
         ORDER BY c.created_at DESC",
    )
    .bind::<SqlUuid, _>(org_id)
    .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|r| {
            // stored status strings outside the vocabulary surface as "unknown"
            let status = r
                .status
                .parse::<CampaignStatus>()
                .unwrap_or(CampaignStatus::Unknown);
            CampaignOverview::from_totals(
                r.name,
                r.platform,
                status.as_str(),
                r.impressions,
                r.clicks,
                r.spend,
                r.leads,
            )
        })
        .collect())
}

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub objective: Option<String>,
    pub budget: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub location_targeting: Option<serde_json::Value>,
    pub audience_targeting: Option<serde_json::Value>,
    pub ad_copy: Option<String>,
    pub cta_button: Option<String>,
    pub creative_assets: Option<serde_json::Value>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub objective: Option<String>,
    pub budget: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub location_targeting: Option<serde_json::Value>,
    pub audience_targeting: Option<serde_json::Value>,
    pub ad_copy: Option<String>,
    pub cta_button: Option<String>,
    pub creative_assets: Option<serde_json::Value>,
}

fn db_error(context: &str, e: String) -> axum::response::Response {
    error!("[CAMPAIGNS] {context}: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"success": false, "error": "Database error"})),
    )
        .into_response()
}

async fn handle_campaign_list(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<Uuid>,
) -> impl IntoResponse {
    let result = with_db(&state.conn, move |conn| {
        diesel::sql_query(format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE org_id = $1 ORDER BY created_at DESC"
        ))
        .bind::<SqlUuid, _>(org_id)
        .load::<CampaignRow>(conn)
    })
    .await;

    match result {
        Ok(rows) => (StatusCode::OK, Json(json!({ "campaigns": rows }))).into_response(),
        Err(e) => db_error("list failed", e),
    }
}

async fn handle_campaign_create(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<CreateCampaignRequest>,
) -> impl IntoResponse {
    if payload.name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "name is required"})),
        )
            .into_response();
    }

    let id = Uuid::new_v4();
    let result = with_db(&state.conn, move |conn| {
        diesel::sql_query(
            "INSERT INTO campaigns \
             (id, org_id, name, status, objective, budget, start_date, end_date, \
              location_targeting, audience_targeting, ad_copy, cta_button, creative_assets, created_by) \
             VALUES ($1, $2, $3, 'draft', $4, $5, $6, $7, \
                     COALESCE($8, '{}'::jsonb), COALESCE($9, '{}'::jsonb), $10, $11, \
                     COALESCE($12, '[]'::jsonb), $13)",
        )
        .bind::<SqlUuid, _>(id)
        .bind::<SqlUuid, _>(org_id)
        .bind::<Text, _>(payload.name.trim())
        .bind::<Nullable<Text>, _>(payload.objective.as_deref())
        .bind::<Double, _>(payload.budget.unwrap_or(0.0))
        .bind::<Nullable<diesel::sql_types::Date>, _>(payload.start_date)
        .bind::<Nullable<diesel::sql_types::Date>, _>(payload.end_date)
        .bind::<Nullable<Jsonb>, _>(payload.location_targeting.clone())
        .bind::<Nullable<Jsonb>, _>(payload.audience_targeting.clone())
        .bind::<Nullable<Text>, _>(payload.ad_copy.as_deref())
        .bind::<Nullable<Text>, _>(payload.cta_button.as_deref())
        .bind::<Nullable<Jsonb>, _>(payload.creative_assets.clone())
        .bind::<Nullable<SqlUuid>, _>(payload.created_by)
        .execute(conn)
    })
    .await;

    match result {
        Ok(_) => (
            StatusCode::CREATED,
            Json(json!({"success": true, "id": id})),
        )
            .into_response(),
        Err(e) => db_error("create failed", e),
    }
}

async fn handle_campaign_get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let result = with_db(&state.conn, move |conn| {
        diesel::sql_query(format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1 LIMIT 1"
        ))
        .bind::<SqlUuid, _>(id)
        .get_result::<CampaignRow>(conn)
        .optional()
    })
    .await;

    match result {
        Ok(Some(row)) => (StatusCode::OK, Json(json!(row))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "Campaign not found"})),
        )
            .into_response(),
        Err(e) => db_error("get failed", e),
    }
}

async fn handle_campaign_update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCampaignRequest>,
) -> impl IntoResponse {
    let result = with_db(&state.conn, move |conn| {
        diesel::sql_query(
            "UPDATE campaigns SET \
                 name = COALESCE($1, name), \
                 objective = COALESCE($2, objective), \
                 budget = COALESCE($3, budget), \
                 start_date = COALESCE($4, start_date), \
                 end_date = COALESCE($5, end_date), \
                 location_targeting = COALESCE($6, location_targeting), \
                 audience_targeting = COALESCE($7, audience_targeting), \
                 ad_copy = COALESCE($8, ad_copy), \
                 cta_button = COALESCE($9, cta_button), \
                 creative_assets = COALESCE($10, creative_assets), \
                 updated_at = now() \
             WHERE id = $11",
        )
        .bind::<Nullable<Text>, _>(payload.name.as_deref())
        .bind::<Nullable<Text>, _>(payload.objective.as_deref())
        .bind::<Nullable<Double>, _>(payload.budget)
        .bind::<Nullable<diesel::sql_types::Date>, _>(payload.start_date)
        .bind::<Nullable<diesel::sql_types::Date>, _>(payload.end_date)
        .bind::<Nullable<Jsonb>, _>(payload.location_targeting.clone())
        .bind::<Nullable<Jsonb>, _>(payload.audience_targeting.clone())
        .bind::<Nullable<Text>, _>(payload.ad_copy.as_deref())
        .bind::<Nullable<Text>, _>(payload.cta_button.as_deref())
        .bind::<Nullable<Jsonb>, _>(payload.creative_assets.clone())
        .bind::<SqlUuid, _>(id)
        .execute(conn)
    })
    .await;

    match result {
        Ok(0) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "Campaign not found"})),
        )
            .into_response(),
        Ok(_) => (StatusCode::OK, Json(json!({"success": true}))).into_response(),
        Err(e) => db_error("update failed", e),
    }
}

async fn handle_campaign_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let result = with_db(&state.conn, move |conn| {
        // metrics rows go via ON DELETE CASCADE
        diesel::sql_query("DELETE FROM campaigns WHERE id = $1")
            .bind::<SqlUuid, _>(id)
            .execute(conn)
    })
    .await;

    match result {
        Ok(0) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "Campaign not found"})),
        )
            .into_response(),
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => db_error("delete failed", e),
    }
}

async fn set_campaign_status(
    state: Arc<AppState>,
    id: Uuid,
    status: CampaignStatus,
) -> axum::response::Response {
    let result = with_db(&state.conn, move |conn| {
        diesel::sql_query("UPDATE campaigns SET status = $1, updated_at = now() WHERE id = $2")
            .bind::<Text, _>(status.as_str())
            .bind::<SqlUuid, _>(id)
            .execute(conn)
    })
    .await;

    match result {
        Ok(0) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "Campaign not found"})),
        )
            .into_response(),
        Ok(_) => (
            StatusCode::OK,
            Json(json!({"success": true, "status": status.as_str()})),
        )
            .into_response(),
        Err(e) => db_error("status change failed", e),
    }
}

async fn handle_campaign_pause(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    set_campaign_status(state, id, CampaignStatus::Paused).await
}

async fn handle_campaign_resume(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    set_campaign_status(state, id, CampaignStatus::Active).await
}

/// Dashboard feed: persisted campaigns with lifetime totals, run through
/// the same merge path the sync response uses (with no live entries).
async fn handle_dashboard(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<Uuid>,
) -> impl IntoResponse {
    let result = with_db(&state.conn, move |conn| {
        persisted_overviews(conn, org_id)
    })
    .await;

    match result {
        Ok(persisted) => {
            let campaigns = merge_campaigns(Vec::new(), persisted);
            (StatusCode::OK, Json(json!({ "campaigns": campaigns }))).into_response()
        }
        Err(e) => db_error("dashboard failed", e),
    }
}

pub fn configure_campaign_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orgs/:org_id/campaigns", get(handle_campaign_list))
        .route("/orgs/:org_id/campaigns", post(handle_campaign_create))
        .route("/orgs/:org_id/dashboard", get(handle_dashboard))
        .route("/campaigns/:id", get(handle_campaign_get))
        .route("/campaigns/:id", put(handle_campaign_update))
        .route("/campaigns/:id", delete(handle_campaign_delete))
        .route("/campaigns/:id/pause", post(handle_campaign_pause))
        .route("/campaigns/:id/resume", post(handle_campaign_resume))
}
