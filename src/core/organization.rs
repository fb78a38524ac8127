//! Organization and membership management for multi-tenant deployments.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use diesel::prelude::*;
use diesel::sql_types::{Text, Uuid as SqlUuid};
use log::error;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::shared::models::{MemberRole, MemberRow, OrganizationRow};
use crate::shared::state::AppState;
use crate::shared::utils::{slugify, with_db};

/// Pick the primary organization for a user with multiple memberships:
/// owner > admin > member, first-found breaking ties.
pub fn resolve_primary_org(memberships: &[MemberRow]) -> Option<&MemberRow> {
    let mut best: Option<(&MemberRow, u8)> = None;

    for membership in memberships {
        let rank = membership
            .role
            .parse::<MemberRole>()
            .map(|r| r.rank())
            .unwrap_or(u8::MAX);
        match best {
            Some((_, best_rank)) if best_rank <= rank => {}
            _ => best = Some((membership, rank)),
        }
    }

    best.map(|(membership, _)| membership)
}

#[derive(Debug, Deserialize)]
pub struct CreateOrgRequest {
    pub name: String,
    pub owner_user_id: Uuid,
}

fn db_error(context: &str, e: String) -> axum::response::Response {
    error!("[ORGS] {context}: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"success": false, "error": "Database error"})),
    )
        .into_response()
}

async fn handle_org_create(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrgRequest>,
) -> impl IntoResponse {
    if payload.name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "name is required"})),
        )
            .into_response();
    }

    let org_id = Uuid::new_v4();
    let name = payload.name.trim().to_string();
    let slug = slugify(&name);
    let owner = payload.owner_user_id;

    let result = with_db(&state.conn, move |conn| {
        conn.transaction(|tx| {
            diesel::sql_query("INSERT INTO organizations (id, name, slug) VALUES ($1, $2, $3)")
                .bind::<SqlUuid, _>(org_id)
                .bind::<Text, _>(&name)
                .bind::<Text, _>(&slug)
                .execute(tx)?;
            diesel::sql_query(
                "INSERT INTO members (id, user_id, org_id, role) VALUES ($1, $2, $3, $4)",
            )
            .bind::<SqlUuid, _>(Uuid::new_v4())
            .bind::<SqlUuid, _>(owner)
            .bind::<SqlUuid, _>(org_id)
            .bind::<Text, _>(MemberRole::Owner.as_str())
            .execute(tx)?;
            Ok(())
        })
    })
    .await;

    match result {
        Ok(()) => (
            StatusCode::CREATED,
            Json(json!({"success": true, "id": org_id})),
        )
            .into_response(),
        Err(e) => db_error("create failed", e),
    }
}

async fn handle_org_get(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<Uuid>,
) -> impl IntoResponse {
    let result = with_db(&state.conn, move |conn| {
        diesel::sql_query(
            "SELECT id, name, slug, created_at FROM organizations WHERE id = $1 LIMIT 1",
        )
        .bind::<SqlUuid, _>(org_id)
        .get_result::<OrganizationRow>(conn)
        .optional()
    })
    .await;

    match result {
        Ok(Some(org)) => (StatusCode::OK, Json(json!(org))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "Organization not found"})),
        )
            .into_response(),
        Err(e) => db_error("get failed", e),
    }
}

async fn handle_member_list(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<Uuid>,
) -> impl IntoResponse {
    let result = with_db(&state.conn, move |conn| {
        diesel::sql_query(
            "SELECT id, user_id, org_id, role FROM members WHERE org_id = $1 ORDER BY created_at",
        )
        .bind::<SqlUuid, _>(org_id)
        .load::<MemberRow>(conn)
    })
    .await;

    match result {
        Ok(rows) => (StatusCode::OK, Json(json!({ "members": rows }))).into_response(),
        Err(e) => db_error("member list failed", e),
    }
}

/// Resolve the user's primary organization across all memberships.
async fn handle_primary_org(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> impl IntoResponse {
    let result = with_db(&state.conn, move |conn| {
        diesel::sql_query("SELECT id, user_id, org_id, role FROM members WHERE user_id = $1")
            .bind::<SqlUuid, _>(user_id)
            .load::<MemberRow>(conn)
    })
    .await;

    match result {
        Ok(memberships) => match resolve_primary_org(&memberships) {
            Some(membership) => (StatusCode::OK, Json(json!(membership))).into_response(),
            None => (
                StatusCode::NOT_FOUND,
                Json(json!({"success": false, "error": "User has no memberships"})),
            )
                .into_response(),
        },
        Err(e) => db_error("primary org lookup failed", e),
    }
}

pub fn configure_org_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orgs", post(handle_org_create))
        .route("/orgs/:org_id", get(handle_org_get))
        .route("/orgs/:org_id/members", get(handle_member_list))
        .route("/users/:user_id/primary-org", get(handle_primary_org))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(role: &str) -> MemberRow {
        MemberRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            role: role.to_string(),
        }
    }

    #[test]
    fn owner_wins_over_admin_and_member() {
        let memberships = vec![membership("member"), membership("owner"), membership("admin")];
        let primary = resolve_primary_org(&memberships).unwrap();
        assert_eq!(primary.role, "owner");
    }

    #[test]
    fn first_found_breaks_ties() {
        let memberships = vec![membership("admin"), membership("admin")];
        let primary = resolve_primary_org(&memberships).unwrap();
        assert_eq!(primary.id, memberships[0].id);
    }

    #[test]
    fn unknown_roles_rank_last() {
        let memberships = vec![membership("viewer"), membership("member")];
        let primary = resolve_primary_org(&memberships).unwrap();
        assert_eq!(primary.role, "member");
    }

    #[test]
    fn empty_memberships_resolve_to_none() {
        assert!(resolve_primary_org(&[]).is_none());
    }
}
