//! Meeting endpoints.

use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::handlers::auth::types::MessageResponse;
use crate::api::handlers::auth::{require_auth, AuthConfig};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeetingRequest {
    pub title: String,
    pub agenda: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attendees: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeetingRequest {
    pub title: Option<String>,
    pub agenda: Option<String>,
    pub location: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub attendees: Option<Vec<String>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeetingResponse {
    pub id: Uuid,
    pub title: String,
    pub agenda: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub attendees: Vec<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, title, agenda, location, starts_at, ends_at, attendees, \
                       created_by, created_at, updated_at";

fn from_row(row: &sqlx::postgres::PgRow) -> MeetingResponse {
    MeetingResponse {
        id: row.get("id"),
        title: row.get("title"),
        agenda: row.get("agenda"),
        location: row.get("location"),
        starts_at: row.get("starts_at"),
        ends_at: row.get("ends_at"),
        attendees: row.get("attendees"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

async fn insert(
    pool: &PgPool,
    request: &CreateMeetingRequest,
    created_by: Uuid,
) -> Result<MeetingResponse> {
    let query = format!(
        r"
        INSERT INTO meetings (title, agenda, location, starts_at, ends_at, attendees, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(request.title.trim())
        .bind(request.agenda.as_deref())
        .bind(request.location.as_deref())
        .bind(request.starts_at)
        .bind(request.ends_at)
        .bind(&request.attendees)
        .bind(created_by)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to insert meeting")?;

    Ok(from_row(&row))
}

async fn list(pool: &PgPool) -> Result<Vec<MeetingResponse>> {
    let query = format!("SELECT {COLUMNS} FROM meetings ORDER BY starts_at DESC");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list meetings")?;

    Ok(rows.iter().map(from_row).collect())
}

async fn fetch(pool: &PgPool, id: Uuid) -> Result<Option<MeetingResponse>> {
    let query = format!("SELECT {COLUMNS} FROM meetings WHERE id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch meeting")?;

    Ok(row.as_ref().map(from_row))
}

async fn update(
    pool: &PgPool,
    id: Uuid,
    request: &UpdateMeetingRequest,
) -> Result<Option<MeetingResponse>> {
    let query = format!(
        r"
        UPDATE meetings
        SET title = COALESCE($2, title),
            agenda = COALESCE($3, agenda),
            location = COALESCE($4, location),
            starts_at = COALESCE($5, starts_at),
            ends_at = COALESCE($6, ends_at),
            attendees = COALESCE($7, attendees),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(id)
        .bind(request.title.as_deref().map(str::trim))
        .bind(request.agenda.as_deref())
        .bind(request.location.as_deref())
        .bind(request.starts_at)
        .bind(request.ends_at)
        .bind(request.attendees.as_deref())
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to update meeting")?;

    Ok(row.as_ref().map(from_row))
}

async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
    let query = "DELETE FROM meetings WHERE id = $1 RETURNING id";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to delete meeting")?;

    Ok(row.is_some())
}

/// List meetings, most recent start first.
#[utoipa::path(
    get,
    path = "/api/meetings",
    security(("bearer" = [])),
    responses((status = 200, description = "Meetings", body = [MeetingResponse])),
    tag = "meetings"
)]
pub async fn list_meetings(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;
    Ok(Json(list(&pool).await?))
}

/// Schedule a meeting.
#[utoipa::path(
    post,
    path = "/api/meetings",
    request_body = CreateMeetingRequest,
    security(("bearer" = [])),
    responses((status = 201, description = "Meeting created", body = MeetingResponse)),
    tag = "meetings"
)]
pub async fn create_meeting(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<CreateMeetingRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    if request.title.trim().is_empty() {
        return Err(ApiError::Validation(
            "Meeting title is required".to_string(),
        ));
    }
    if request.ends_at.is_some_and(|ends| ends <= request.starts_at) {
        return Err(ApiError::Validation(
            "Meeting must end after it starts".to_string(),
        ));
    }

    let meeting = insert(&pool, &request, principal.account_id).await?;
    Ok((StatusCode::CREATED, Json(meeting)))
}

/// Fetch a single meeting.
#[utoipa::path(
    get,
    path = "/api/meetings/{id}",
    params(("id" = Uuid, Path, description = "Meeting id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Meeting", body = MeetingResponse),
        (status = 404, description = "Meeting not found")
    ),
    tag = "meetings"
)]
pub async fn get_meeting(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;
    let meeting = fetch(&pool, id)
        .await?
        .ok_or(ApiError::NotFound("Meeting"))?;
    Ok(Json(meeting))
}

/// Update a meeting; omitted fields keep their value.
#[utoipa::path(
    put,
    path = "/api/meetings/{id}",
    params(("id" = Uuid, Path, description = "Meeting id")),
    request_body = UpdateMeetingRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated meeting", body = MeetingResponse),
        (status = 404, description = "Meeting not found")
    ),
    tag = "meetings"
)]
pub async fn update_meeting(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<UpdateMeetingRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let meeting = update(&pool, id, &request)
        .await?
        .ok_or(ApiError::NotFound("Meeting"))?;
    Ok(Json(meeting))
}

/// Cancel a meeting.
#[utoipa::path(
    delete,
    path = "/api/meetings/{id}",
    params(("id" = Uuid, Path, description = "Meeting id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Meeting deleted", body = MessageResponse),
        (status = 404, description = "Meeting not found")
    ),
    tag = "meetings"
)]
pub async fn delete_meeting(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;

    if !delete(&pool, id).await? {
        return Err(ApiError::NotFound("Meeting"));
    }

    Ok(Json(MessageResponse::new("Meeting deleted")))
}
