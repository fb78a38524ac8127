//! Organization invitations: issue a token, accept it into a membership.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use axum::Router;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Text, Timestamptz, Uuid as SqlUuid};
use log::error;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::shared::state::AppState;
use crate::shared::utils::with_db;

const DEFAULT_EXPIRY_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
pub struct CreateInvitationRequest {
    pub email: String,
    pub role: Option<String>,
    pub invited_by: Option<Uuid>,
    pub expires_in_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AcceptInvitationRequest {
    pub token: String,
    pub user_id: Uuid,
}

#[derive(Debug, QueryableByName)]
struct InvitationRow {
    #[diesel(sql_type = SqlUuid)]
    id: Uuid,
    #[diesel(sql_type = SqlUuid)]
    org_id: Uuid,
    #[diesel(sql_type = Text)]
    role: String,
    #[diesel(sql_type = Text)]
    status: String,
    #[diesel(sql_type = Timestamptz)]
    expires_at: DateTime<Utc>,
}

fn db_error(context: &str, e: String) -> axum::response::Response {
    error!("[INVITES] {context}: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"success": false, "error": "Database error"})),
    )
        .into_response()
}

async fn handle_invitation_create(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<CreateInvitationRequest>,
) -> impl IntoResponse {
    if payload.email.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "email is required"})),
        )
            .into_response();
    }

    let id = Uuid::new_v4();
    let token = Uuid::new_v4().simple().to_string();
    let token_out = token.clone();
    let expires_in = payload.expires_in_days.unwrap_or(DEFAULT_EXPIRY_DAYS);
    let expires_at = Utc::now() + chrono::Duration::days(expires_in);

    let result = with_db(&state.conn, move |conn| {
        diesel::sql_query(
            "INSERT INTO invitations (id, org_id, email, role, token, invited_by, expires_at) \
             VALUES ($1, $2, $3, COALESCE($4, 'member'), $5, $6, $7)",
        )
        .bind::<SqlUuid, _>(id)
        .bind::<SqlUuid, _>(org_id)
        .bind::<Text, _>(payload.email.trim())
        .bind::<diesel::sql_types::Nullable<Text>, _>(payload.role.as_deref())
        .bind::<Text, _>(&token)
        .bind::<diesel::sql_types::Nullable<SqlUuid>, _>(payload.invited_by)
        .bind::<Timestamptz, _>(expires_at)
        .execute(conn)
    })
    .await;

    match result {
        Ok(_) => (
            StatusCode::CREATED,
            Json(json!({"success": true, "id": id, "token": token_out})),
        )
            .into_response(),
        Err(e) => db_error("create failed", e),
    }
}

/// Accept an invitation: a valid pending token becomes a membership row.
/// Invalid, expired, and already-used tokens all answer 404.
async fn handle_invitation_accept(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AcceptInvitationRequest>,
) -> impl IntoResponse {
    let token = payload.token.clone();
    let user_id = payload.user_id;

    let result = with_db(&state.conn, move |conn| {
        let invitation: Option<InvitationRow> = diesel::sql_query(
            "SELECT id, org_id, role, status, expires_at FROM invitations \
             WHERE token = $1 LIMIT 1",
        )
        .bind::<Text, _>(&token)
        .get_result(conn)
        .optional()?;

        let invitation = match invitation {
            Some(inv) if inv.status == "pending" && inv.expires_at > Utc::now() => inv,
            _ => return Ok(None),
        };

        conn.transaction(|tx| {
            diesel::sql_query(
                "INSERT INTO members (id, user_id, org_id, role) VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (user_id, org_id) DO NOTHING",
            )
            .bind::<SqlUuid, _>(Uuid::new_v4())
            .bind::<SqlUuid, _>(user_id)
            .bind::<SqlUuid, _>(invitation.org_id)
            .bind::<Text, _>(&invitation.role)
            .execute(tx)?;

            diesel::sql_query(
                "UPDATE invitations \
                 SET status = 'accepted', accepted_at = now(), accepted_by = $1 \
                 WHERE id = $2",
            )
            .bind::<SqlUuid, _>(user_id)
            .bind::<SqlUuid, _>(invitation.id)
            .execute(tx)?;

            Ok(Some(invitation.org_id))
        })
    })
    .await;

    match result {
        Ok(Some(org_id)) => (
            StatusCode::OK,
            Json(json!({"success": true, "org_id": org_id})),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "Invalid or expired invitation"})),
        )
            .into_response(),
        Err(e) => db_error("accept failed", e),
    }
}

pub fn configure_invitation_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orgs/:org_id/invitations", post(handle_invitation_create))
        .route("/invitations/accept", post(handle_invitation_accept))
}
