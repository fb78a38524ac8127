//! Campaign/metrics synchronization pipeline and its HTTP entry points.
//!
//! One sync invocation: resolve credential → normalize date range → fetch
//! the vendor's campaign list → fetch per-campaign insights with a bounded
//! fan-out → upsert campaign + replace metrics (one transaction per
//! campaign) → stamp the integration's last-sync time. Per-campaign
//! failures are logged and skipped; auth failures abort the invocation.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use diesel::Connection;
use futures::StreamExt;
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub mod merge;
pub mod metrics;
pub mod upsert;

use crate::campaigns::persisted_overviews;
use crate::shared::state::AppState;
use crate::vendors::date_range::{parse_date_range, DateRange};
use crate::vendors::{VendorCampaign, VendorError, VendorInsight, VendorType};
use merge::{merge_campaigns, CampaignOverview};
use metrics::replace_metrics;
use upsert::upsert_campaign;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0}")]
    Vendor(#[from] VendorError),
    #[error("Database error: {0}")]
    Persistence(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
}

impl From<diesel::result::Error> for SyncError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl SyncError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Vendor(_) | Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncRequest {
    pub org_id: Option<String>,
    pub date_range: Option<String>,
    pub access_token: Option<String>,
    #[serde(alias = "advertiser_id")]
    pub ad_account_id: Option<String>,
    #[serde(default)]
    pub save_connection: bool,
    pub user_id: Option<Uuid>,
}

#[derive(Debug)]
pub struct SyncSummary {
    pub synced_count: usize,
    pub total_campaigns: usize,
    pub campaigns: Vec<CampaignOverview>,
}

struct ResolvedCredential {
    access_token: String,
    account_id: String,
    integration_id: Option<Uuid>,
}

fn parse_org_id(req: &SyncRequest) -> Result<Uuid, SyncError> {
    let raw = req
        .org_id
        .as_deref()
        .ok_or_else(|| SyncError::Validation("org_id is required".to_string()))?;
    raw.parse()
        .map_err(|_| SyncError::Validation(format!("Invalid org_id: {raw}")))
}

async fn resolve_credential(
    state: &Arc<AppState>,
    org_id: Uuid,
    vendor: VendorType,
    req: &SyncRequest,
) -> Result<ResolvedCredential, SyncError> {
    if let Some(token) = req.access_token.clone() {
        let account_id = req.ad_account_id.clone().ok_or_else(|| {
            SyncError::Validation(
                "ad_account_id is required when access_token is supplied".to_string(),
            )
        })?;

        let integration_id = if req.save_connection {
            let id = state
                .credentials()
                .save(org_id, req.user_id, vendor, &token, &account_id)
                .await
                .map_err(SyncError::Persistence)?;
            Some(id)
        } else {
            None
        };

        return Ok(ResolvedCredential {
            access_token: token,
            account_id,
            integration_id,
        });
    }

    let stored = state
        .credentials()
        .find_active(org_id, vendor, req.user_id)
        .await
        .map_err(SyncError::Persistence)?;

    let integration = stored.ok_or_else(|| {
        SyncError::NotFound(format!(
            "No {vendor} integration found. Connect your account first."
        ))
    })?;

    Ok(ResolvedCredential {
        access_token: integration.access_token,
        account_id: integration.ad_account_id,
        integration_id: Some(integration.integration_id),
    })
}

pub fn aggregate_insights(insights: &[VendorInsight]) -> (i64, i64, f64, i64) {
    insights.iter().fold((0, 0, 0.0, 0), |acc, i| {
        (
            acc.0 + i.impressions,
            acc.1 + i.clicks,
            acc.2 + i.spend,
            acc.3 + i.leads,
        )
    })
}

/// Run one vendor's sync for one organization.
pub async fn run_vendor_sync(
    state: &Arc<AppState>,
    vendor: VendorType,
    req: &SyncRequest,
) -> Result<SyncSummary, SyncError> {
    let org_id = parse_org_id(req)?;
    let raw_range = req
        .date_range
        .as_deref()
        .ok_or_else(|| SyncError::Validation("date_range is required".to_string()))?;
    let today = chrono::Utc::now().date_naive();
    let range: DateRange = parse_date_range(raw_range, today).map_err(SyncError::Validation)?;

    let _permit = state.sync_guard.try_acquire(org_id, vendor).ok_or_else(|| {
        SyncError::Conflict(format!(
            "A {vendor} sync is already running for this organization"
        ))
    })?;

    // Credential resolution happens before any vendor call; a missing
    // integration short-circuits without touching the network.
    let credential = resolve_credential(state, org_id, vendor, req).await?;

    let provider = state
        .provider(vendor)
        .ok_or_else(|| SyncError::Validation(format!("No provider registered for {vendor}")))?;

    let campaigns = provider
        .fetch_campaigns(&credential.access_token, &credential.account_id)
        .await?;
    let total_campaigns = campaigns.len();
    info!("[SYNC] {vendor}: fetched {total_campaigns} campaigns for org {org_id}");

    // Bounded fan-out for the per-campaign insight calls, vendor order kept.
    let fetched: Vec<(VendorCampaign, Result<Vec<VendorInsight>, VendorError>)> =
        futures::stream::iter(campaigns.into_iter().map(|campaign| {
            let provider = provider.clone();
            let token = credential.access_token.clone();
            let account = credential.account_id.clone();
            async move {
                let insights = provider
                    .fetch_insights(&token, &account, &campaign.external_id, &range)
                    .await;
                (campaign, insights)
            }
        }))
        .buffered(state.config.vendors.insight_concurrency)
        .collect()
        .await;

    // An expired credential is terminal for the whole invocation.
    for (_, result) in &fetched {
        if let Err(VendorError::AuthenticationFailed(msg)) = result {
            return Err(VendorError::AuthenticationFailed(msg.clone()).into());
        }
    }

    let conn = state.conn.clone();
    let acting_user = req.user_id;
    let integration_id = credential.integration_id;
    let (synced_count, live) = tokio::task::spawn_blocking(move || {
        let mut db = conn
            .get()
            .map_err(|e| SyncError::Persistence(e.to_string()))?;

        let mut synced = 0usize;
        let mut live = Vec::new();

        for (campaign, insights) in fetched {
            let insights = match insights {
                Ok(rows) => rows,
                Err(err) => {
                    warn!("[SYNC] skipping campaign '{}': {}", campaign.name, err);
                    continue;
                }
            };

            // Upsert and metric replacement commit together or not at all.
            let applied = db.transaction::<_, diesel::result::Error, _>(|tx| {
                let campaign_id = upsert_campaign(tx, org_id, vendor, acting_user, &campaign)?;
                replace_metrics(tx, campaign_id, &insights)?;
                Ok(())
            });

            match applied {
                Ok(()) => {
                    synced += 1;
                    let (impressions, clicks, spend, leads) = aggregate_insights(&insights);
                    live.push(CampaignOverview::from_totals(
                        campaign.name.clone(),
                        Some(vendor.to_string()),
                        campaign.status.as_str(),
                        impressions,
                        clicks,
                        spend,
                        leads,
                    ));
                }
                Err(err) => {
                    error!("[SYNC] persist failed for '{}': {}", campaign.name, err);
                }
            }
        }

        Ok::<_, SyncError>((synced, live))
    })
    .await
    .map_err(|e| SyncError::Persistence(e.to_string()))??;

    if let Some(id) = integration_id {
        if let Err(err) = state.credentials().touch_last_sync(id).await {
            warn!("[SYNC] failed to stamp last_sync_at: {}", err);
        }
    }

    info!("[SYNC] {vendor}: synced {synced_count}/{total_campaigns} campaigns for org {org_id}");

    Ok(SyncSummary {
        synced_count,
        total_campaigns,
        campaigns: live,
    })
}

fn sync_error_response(vendor: Option<VendorType>, err: &SyncError) -> Response {
    match vendor {
        Some(v) => error!("[SYNC] {v} sync failed: {err}"),
        None => error!("[SYNC] sync failed: {err}"),
    }
    (
        err.status_code(),
        Json(json!({"success": false, "error": err.to_string()})),
    )
        .into_response()
}

async fn vendor_sync_response(
    state: Arc<AppState>,
    vendor: VendorType,
    req: SyncRequest,
) -> Response {
    match run_vendor_sync(&state, vendor, &req).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "synced_count": summary.synced_count,
                "total_campaigns": summary.total_campaigns,
                "campaigns": summary.campaigns,
            })),
        )
            .into_response(),
        Err(err) => sync_error_response(Some(vendor), &err),
    }
}

pub async fn handle_meta_sync(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SyncRequest>,
) -> Response {
    vendor_sync_response(state, VendorType::Meta, req).await
}

pub async fn handle_tiktok_sync(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SyncRequest>,
) -> Response {
    vendor_sync_response(state, VendorType::TikTok, req).await
}

/// Sync both vendors. One vendor's failure never blocks the other; the
/// aggregate count sums whatever succeeded, and the merged campaign list is
/// returned for the dashboard refresh.
pub async fn handle_sync_all(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SyncRequest>,
) -> Response {
    let org_id = match parse_org_id(&req) {
        Ok(id) => id,
        Err(err) => return sync_error_response(None, &err),
    };

    let mut synced_count = 0usize;
    let mut total_campaigns = 0usize;
    let mut live = Vec::new();
    let mut vendor_errors = serde_json::Map::new();

    for vendor in [VendorType::Meta, VendorType::TikTok] {
        match run_vendor_sync(&state, vendor, &req).await {
            Ok(summary) => {
                synced_count += summary.synced_count;
                total_campaigns += summary.total_campaigns;
                live.extend(summary.campaigns);
            }
            Err(err) => {
                error!("[SYNC] {vendor} sync failed: {err}");
                vendor_errors.insert(vendor.to_string(), json!(err.to_string()));
            }
        }
    }

    if vendor_errors.len() == 2 {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"success": false, "error": "All vendor syncs failed", "errors": vendor_errors})),
        )
            .into_response();
    }

    // Merge live results with the persisted fallback rows.
    let conn = state.conn.clone();
    let persisted = tokio::task::spawn_blocking(move || {
        let mut db = conn
            .get()
            .map_err(|e| SyncError::Persistence(e.to_string()))?;
        persisted_overviews(&mut db, org_id).map_err(SyncError::from)
    })
    .await
    .map_err(|e| SyncError::Persistence(e.to_string()));

    let persisted = match persisted {
        Ok(Ok(rows)) => rows,
        Ok(Err(err)) | Err(err) => {
            warn!("[SYNC] persisted fallback unavailable: {err}");
            Vec::new()
        }
    };

    let campaigns = merge_campaigns(live, persisted);

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "synced_count": synced_count,
            "total_campaigns": total_campaigns,
            "campaigns": campaigns,
            "errors": vendor_errors,
        })),
    )
        .into_response()
}

pub fn configure_sync_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sync/meta", post(handle_meta_sync))
        .route("/sync/tiktok", post(handle_tiktok_sync))
        .route("/sync/all", post(handle_sync_all))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, DatabaseConfig, ServerConfig, VendorConfig};
    use crate::integrations::{CredentialStore, StoredCredential};
    use crate::vendors::meta::MetaAdsProvider;
    use crate::vendors::RetryPolicy;
    use diesel::r2d2::{ConnectionManager, Pool};
    use diesel::PgConnection;
    use std::time::Duration;

    struct NoCredentials;

    #[async_trait::async_trait]
    impl CredentialStore for NoCredentials {
        async fn find_active(
            &self,
            _org_id: Uuid,
            _vendor: VendorType,
            _user_id: Option<Uuid>,
        ) -> Result<Option<StoredCredential>, String> {
            Ok(None)
        }

        async fn save(
            &self,
            _org_id: Uuid,
            _user_id: Option<Uuid>,
            _vendor: VendorType,
            _access_token: &str,
            _ad_account_id: &str,
        ) -> Result<Uuid, String> {
            Err("store unavailable".to_string())
        }

        async fn touch_last_sync(&self, _integration_id: Uuid) -> Result<(), String> {
            Ok(())
        }
    }

    // State backed by an unconnected pool: any accidental database or
    // vendor call in the path under test fails loudly.
    fn offline_state(vendor_base_url: &str) -> Arc<AppState> {
        let config = AppConfig {
            database: DatabaseConfig {
                url: "postgres://localhost/unused".to_string(),
                max_connections: 1,
            },
            server: ServerConfig { port: 0 },
            vendors: VendorConfig::default(),
        };
        let manager = ConnectionManager::<PgConnection>::new(&config.database.url);
        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(0))
            .build_unchecked(manager);

        let mut state = AppState::new(config, pool).expect("state");
        state.register_provider(Arc::new(MetaAdsProvider::new(
            reqwest::Client::new(),
            vendor_base_url,
            RetryPolicy::new(0, Duration::from_millis(1)),
        )));
        state.set_credential_store(Arc::new(NoCredentials));
        Arc::new(state)
    }

    #[tokio::test]
    async fn missing_integration_short_circuits_without_vendor_calls() {
        let mut server = mockito::Server::new_async().await;
        let vendor_api = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let state = offline_state(&server.url());
        let req = SyncRequest {
            org_id: Some(Uuid::new_v4().to_string()),
            date_range: Some("last_7d".to_string()),
            access_token: None,
            ad_account_id: None,
            save_connection: false,
            user_id: None,
        };

        let err = run_vendor_sync(&state, VendorType::Meta, &req)
            .await
            .unwrap_err();
        match err {
            SyncError::NotFound(message) => {
                assert!(message.contains("No meta integration found"))
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        // the provider was never asked for campaigns or insights
        vendor_api.assert_async().await;
    }

    fn insight(impressions: i64, clicks: i64, spend: f64, leads: i64) -> VendorInsight {
        VendorInsight {
            date: "2026-02-01".parse().unwrap(),
            impressions,
            clicks,
            spend,
            leads,
        }
    }

    #[test]
    fn aggregate_sums_all_metric_fields() {
        let insights = vec![insight(1000, 50, 25.0, 4), insight(500, 10, 5.5, 1)];
        let (impressions, clicks, spend, leads) = aggregate_insights(&insights);
        assert_eq!(impressions, 1500);
        assert_eq!(clicks, 60);
        assert_eq!(spend, 30.5);
        assert_eq!(leads, 5);
    }

    #[test]
    fn validation_errors_map_to_400() {
        let err = SyncError::Validation("org_id is required".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = SyncError::NotFound("No meta integration found".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = SyncError::Vendor(VendorError::AuthenticationFailed("expired".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_org_id_is_rejected_before_anything_else() {
        let req = SyncRequest {
            org_id: None,
            date_range: Some("last_7d".to_string()),
            access_token: None,
            ad_account_id: None,
            save_connection: false,
            user_id: None,
        };
        assert!(matches!(
            parse_org_id(&req),
            Err(SyncError::Validation(_))
        ));
    }
}
