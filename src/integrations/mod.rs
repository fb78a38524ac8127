//! Integration credential store.
//!
//! One row per connected vendor account, scoped to an organization and
//! optionally to a user. At most one active integration per
//! (org, vendor, user) tuple; a user-level credential takes precedence over
//! the org-level one when both exist.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, post};
use axum::Router;
use diesel::prelude::*;
use diesel::sql_types::{Nullable, Text, Uuid as SqlUuid};
use log::error;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::shared::models::IntegrationRow;
use crate::shared::state::AppState;
use crate::shared::utils::{with_db, DbPool};
use crate::vendors::VendorType;

/// Credential needed to call a vendor API on behalf of an organization.
#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub integration_id: Uuid,
    pub access_token: String,
    pub ad_account_id: String,
}

/// Credential access for the sync pipeline. A trait so tests can swap in a
/// fixed store without a database, the same way providers are swapped.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_active(
        &self,
        org_id: Uuid,
        vendor: VendorType,
        user_id: Option<Uuid>,
    ) -> Result<Option<StoredCredential>, String>;

    async fn save(
        &self,
        org_id: Uuid,
        user_id: Option<Uuid>,
        vendor: VendorType,
        access_token: &str,
        ad_account_id: &str,
    ) -> Result<Uuid, String>;

    async fn touch_last_sync(&self, integration_id: Uuid) -> Result<(), String>;
}

pub struct DbCredentialStore {
    pool: DbPool,
}

impl DbCredentialStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CredentialStore for DbCredentialStore {
    async fn find_active(
        &self,
        org_id: Uuid,
        vendor: VendorType,
        user_id: Option<Uuid>,
    ) -> Result<Option<StoredCredential>, String> {
        let row = with_db(&self.pool, move |conn| {
            find_active_integration(conn, org_id, vendor, user_id)
        })
        .await?;
        Ok(row.map(|r| StoredCredential {
            integration_id: r.id,
            access_token: r.access_token,
            ad_account_id: r.ad_account_id,
        }))
    }

    async fn save(
        &self,
        org_id: Uuid,
        user_id: Option<Uuid>,
        vendor: VendorType,
        access_token: &str,
        ad_account_id: &str,
    ) -> Result<Uuid, String> {
        let token = access_token.to_string();
        let account = ad_account_id.to_string();
        with_db(&self.pool, move |conn| {
            save_integration(conn, org_id, user_id, vendor, &token, &account)
        })
        .await
    }

    async fn touch_last_sync(&self, integration_id: Uuid) -> Result<(), String> {
        with_db(&self.pool, move |conn| {
            touch_last_sync(conn, integration_id)
        })
        .await
    }
}

/// Active credential for (org, vendor), user-level rows first.
pub fn find_active_integration(
    conn: &mut PgConnection,
    org_id: Uuid,
    vendor: VendorType,
    user_id: Option<Uuid>,
) -> Result<Option<IntegrationRow>, diesel::result::Error> {
    diesel::sql_query(
        "SELECT id, org_id, user_id, integration_type, access_token, ad_account_id, status, last_sync_at \
         FROM integrations \
         WHERE org_id = $1 AND integration_type = $2 AND status = 'active' \
           AND (user_id IS NULL OR user_id = $3) \
         ORDER BY (user_id IS NULL), updated_at DESC \
         LIMIT 1",
    )
    .bind::<SqlUuid, _>(org_id)
    .bind::<Text, _>(vendor.to_string())
    .bind::<Nullable<SqlUuid>, _>(user_id)
    .get_result(conn)
    .optional()
}

/// Store a new credential, deactivating any previous active row for the
/// same (org, vendor, user) tuple.
pub fn save_integration(
    conn: &mut PgConnection,
    org_id: Uuid,
    user_id: Option<Uuid>,
    vendor: VendorType,
    access_token: &str,
    ad_account_id: &str,
) -> Result<Uuid, diesel::result::Error> {
    conn.transaction(|tx| {
        diesel::sql_query(
            "UPDATE integrations SET status = 'inactive', updated_at = now() \
             WHERE org_id = $1 AND integration_type = $2 AND status = 'active' \
               AND user_id IS NOT DISTINCT FROM $3",
        )
        .bind::<SqlUuid, _>(org_id)
        .bind::<Text, _>(vendor.to_string())
        .bind::<Nullable<SqlUuid>, _>(user_id)
        .execute(tx)?;

        let id = Uuid::new_v4();
        diesel::sql_query(
            "INSERT INTO integrations \
             (id, org_id, user_id, integration_type, access_token, ad_account_id, status) \
             VALUES ($1, $2, $3, $4, $5, $6, 'active')",
        )
        .bind::<SqlUuid, _>(id)
        .bind::<SqlUuid, _>(org_id)
        .bind::<Nullable<SqlUuid>, _>(user_id)
        .bind::<Text, _>(vendor.to_string())
        .bind::<Text, _>(access_token)
        .bind::<Text, _>(ad_account_id)
        .execute(tx)?;

        Ok(id)
    })
}

pub fn touch_last_sync(
    conn: &mut PgConnection,
    integration_id: Uuid,
) -> Result<(), diesel::result::Error> {
    diesel::sql_query(
        "UPDATE integrations SET last_sync_at = now(), updated_at = now() WHERE id = $1",
    )
    .bind::<SqlUuid, _>(integration_id)
    .execute(conn)?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub integration_type: String,
    pub access_token: String,
    #[serde(alias = "advertiser_id")]
    pub ad_account_id: String,
    pub user_id: Option<Uuid>,
}

fn db_error(context: &str, e: String) -> axum::response::Response {
    error!("[INTEGRATIONS] {context}: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"success": false, "error": "Database error"})),
    )
        .into_response()
}

async fn handle_integration_list(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<Uuid>,
) -> impl IntoResponse {
    let result = with_db(&state.conn, move |conn| {
        diesel::sql_query(
            "SELECT id, org_id, user_id, integration_type, access_token, ad_account_id, status, last_sync_at \
             FROM integrations WHERE org_id = $1 ORDER BY created_at DESC",
        )
        .bind::<SqlUuid, _>(org_id)
        .load::<IntegrationRow>(conn)
    })
    .await;

    match result {
        Ok(rows) => {
            // tokens are secrets; the list view only reveals suffixes
            let sanitized: Vec<_> = rows
                .into_iter()
                .map(|r| {
                    let chars: Vec<char> = r.access_token.chars().collect();
                    let suffix: String =
                        chars[chars.len().saturating_sub(4)..].iter().collect();
                    json!({
                        "id": r.id,
                        "org_id": r.org_id,
                        "user_id": r.user_id,
                        "integration_type": r.integration_type,
                        "ad_account_id": r.ad_account_id,
                        "status": r.status,
                        "last_sync_at": r.last_sync_at,
                        "access_token_suffix": suffix,
                    })
                })
                .collect();
            (StatusCode::OK, Json(json!({ "integrations": sanitized }))).into_response()
        }
        Err(e) => db_error("list failed", e),
    }
}

async fn handle_integration_connect(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<ConnectRequest>,
) -> impl IntoResponse {
    let vendor: VendorType = match payload.integration_type.parse() {
        Ok(v) => v,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "error": format!("Unknown integration type: {}", payload.integration_type)
                })),
            )
                .into_response();
        }
    };

    let result = with_db(&state.conn, move |conn| {
        save_integration(
            conn,
            org_id,
            payload.user_id,
            vendor,
            &payload.access_token,
            &payload.ad_account_id,
        )
    })
    .await;

    match result {
        Ok(id) => (
            StatusCode::CREATED,
            Json(json!({"success": true, "id": id})),
        )
            .into_response(),
        Err(e) => db_error("connect failed", e),
    }
}

async fn handle_integration_disconnect(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let result = with_db(&state.conn, move |conn| {
        diesel::sql_query(
            "UPDATE integrations SET status = 'inactive', updated_at = now() WHERE id = $1",
        )
        .bind::<SqlUuid, _>(id)
        .execute(conn)
    })
    .await;

    match result {
        Ok(0) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "Integration not found"})),
        )
            .into_response(),
        Ok(_) => (StatusCode::OK, Json(json!({"success": true}))).into_response(),
        Err(e) => db_error("disconnect failed", e),
    }
}

pub fn configure_integration_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orgs/:org_id/integrations", get(handle_integration_list))
        .route(
            "/orgs/:org_id/integrations",
            post(handle_integration_connect),
        )
        .route(
            "/integrations/:id",
            delete(handle_integration_disconnect),
        )
}
