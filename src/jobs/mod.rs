//! Vacancy records, independent of campaigns, scoped to an organization.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, post, put};
use axum::Router;
use diesel::prelude::*;
use diesel::sql_types::{Jsonb, Nullable, Text, Uuid as SqlUuid};
use log::error;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::shared::models::JobRow;
use crate::shared::state::AppState;
use crate::shared::utils::with_db;

const JOB_COLUMNS: &str =
    "id, org_id, title, description, status, external_id, metadata, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub external_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub external_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

fn db_error(context: &str, e: String) -> axum::response::Response {
    error!("[JOBS] {context}: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"success": false, "error": "Database error"})),
    )
        .into_response()
}

async fn handle_job_list(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<Uuid>,
) -> impl IntoResponse {
    let result = with_db(&state.conn, move |conn| {
        diesel::sql_query(format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE org_id = $1 ORDER BY created_at DESC"
        ))
        .bind::<SqlUuid, _>(org_id)
        .load::<JobRow>(conn)
    })
    .await;

    match result {
        Ok(rows) => (StatusCode::OK, Json(json!({ "jobs": rows }))).into_response(),
        Err(e) => db_error("list failed", e),
    }
}

async fn handle_job_create(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<CreateJobRequest>,
) -> impl IntoResponse {
    if payload.title.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "title is required"})),
        )
            .into_response();
    }

    let id = Uuid::new_v4();
    let result = with_db(&state.conn, move |conn| {
        diesel::sql_query(
            "INSERT INTO jobs (id, org_id, title, description, status, external_id, metadata) \
             VALUES ($1, $2, $3, $4, COALESCE($5, 'open'), $6, COALESCE($7, '{}'::jsonb))",
        )
        .bind::<SqlUuid, _>(id)
        .bind::<SqlUuid, _>(org_id)
        .bind::<Text, _>(payload.title.trim())
        .bind::<Nullable<Text>, _>(payload.description.as_deref())
        .bind::<Nullable<Text>, _>(payload.status.as_deref())
        .bind::<Nullable<Text>, _>(payload.external_id.as_deref())
        .bind::<Nullable<Jsonb>, _>(payload.metadata.clone())
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

async fn handle_job_update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateJobRequest>,
) -> impl IntoResponse {
    let result = with_db(&state.conn, move |conn| {
        diesel::sql_query(
            "UPDATE jobs SET \
                 title = COALESCE($1, title), \
                 description = COALESCE($2, description), \
                 status = COALESCE($3, status), \
                 external_id = COALESCE($4, external_id), \
                 metadata = COALESCE($5, metadata), \
                 updated_at = now() \
             WHERE id = $6",
        )
        .bind::<Nullable<Text>, _>(payload.title.as_deref())
        .bind::<Nullable<Text>, _>(payload.description.as_deref())
        .bind::<Nullable<Text>, _>(payload.status.as_deref())
        .bind::<Nullable<Text>, _>(payload.external_id.as_deref())
        .bind::<Nullable<Jsonb>, _>(payload.metadata.clone())
        .bind::<SqlUuid, _>(id)
        .execute(conn)
    })
    .await;

    match result {
        Ok(0) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "Job not found"})),
        )
            .into_response(),
        Ok(_) => (StatusCode::OK, Json(json!({"success": true}))).into_response(),
        Err(e) => db_error("update failed", e),
    }
}

async fn handle_job_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let result = with_db(&state.conn, move |conn| {
        diesel::sql_query("DELETE FROM jobs WHERE id = $1")
            .bind::<SqlUuid, _>(id)
            .execute(conn)
    })
    .await;

    match result {
        Ok(0) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "Job not found"})),
        )
            .into_response(),
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => db_error("delete failed", e),
    }
}

pub fn configure_job_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orgs/:org_id/jobs", get(handle_job_list))
        .route("/orgs/:org_id/jobs", post(handle_job_create))
        .route("/jobs/:id", put(handle_job_update))
        .route("/jobs/:id", delete(handle_job_delete))
}
