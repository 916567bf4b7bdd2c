//! Project endpoints.

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
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub starts_on: Option<DateTime<Utc>>,
    pub due_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub starts_on: Option<DateTime<Utc>>,
    pub due_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub starts_on: Option<DateTime<Utc>>,
    pub due_on: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, name, description, status, starts_on, due_on, \
                       created_by, created_at, updated_at";

fn from_row(row: &sqlx::postgres::PgRow) -> ProjectResponse {
    ProjectResponse {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        status: row.get("status"),
        starts_on: row.get("starts_on"),
        due_on: row.get("due_on"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

async fn insert(
    pool: &PgPool,
    request: &CreateProjectRequest,
    created_by: Uuid,
) -> Result<ProjectResponse> {
    let query = format!(
        r"
        INSERT INTO projects (name, description, status, starts_on, due_on, created_by)
        VALUES ($1, $2, COALESCE($3, 'planned'), $4, $5, $6)
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
        .bind(request.name.trim())
        .bind(request.description.as_deref())
        .bind(request.status.as_deref())
        .bind(request.starts_on)
        .bind(request.due_on)
        .bind(created_by)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to insert project")?;

    Ok(from_row(&row))
}

async fn list(pool: &PgPool) -> Result<Vec<ProjectResponse>> {
    let query = format!("SELECT {COLUMNS} FROM projects ORDER BY created_at DESC");
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
        .context("failed to list projects")?;

    Ok(rows.iter().map(from_row).collect())
}

async fn fetch(pool: &PgPool, id: Uuid) -> Result<Option<ProjectResponse>> {
    let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
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
        .context("failed to fetch project")?;

    Ok(row.as_ref().map(from_row))
}

async fn update(
    pool: &PgPool,
    id: Uuid,
    request: &UpdateProjectRequest,
) -> Result<Option<ProjectResponse>> {
    let query = format!(
        r"
        UPDATE projects
        SET name = COALESCE($2, name),
            description = COALESCE($3, description),
            status = COALESCE($4, status),
            starts_on = COALESCE($5, starts_on),
            due_on = COALESCE($6, due_on),
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
        .bind(request.name.as_deref().map(str::trim))
        .bind(request.description.as_deref())
        .bind(request.status.as_deref())
        .bind(request.starts_on)
        .bind(request.due_on)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to update project")?;

    Ok(row.as_ref().map(from_row))
}

async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
    let query = "DELETE FROM projects WHERE id = $1 RETURNING id";
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
        .context("failed to delete project")?;

    Ok(row.is_some())
}

/// List projects, newest first.
#[utoipa::path(
    get,
    path = "/api/projects",
    security(("bearer" = [])),
    responses((status = 200, description = "Projects", body = [ProjectResponse])),
    tag = "projects"
)]
pub async fn list_projects(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;
    Ok(Json(list(&pool).await?))
}

/// Create a project.
#[utoipa::path(
    post,
    path = "/api/projects",
    request_body = CreateProjectRequest,
    security(("bearer" = [])),
    responses((status = 201, description = "Project created", body = ProjectResponse)),
    tag = "projects"
)]
pub async fn create_project(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<CreateProjectRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    if request.name.trim().is_empty() {
        return Err(ApiError::Validation("Project name is required".to_string()));
    }

    let project = insert(&pool, &request, principal.account_id).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// Fetch a single project.
#[utoipa::path(
    get,
    path = "/api/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Project", body = ProjectResponse),
        (status = 404, description = "Project not found")
    ),
    tag = "projects"
)]
pub async fn get_project(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;
    let project = fetch(&pool, id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;
    Ok(Json(project))
}

/// Update a project; omitted fields keep their value.
#[utoipa::path(
    put,
    path = "/api/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = UpdateProjectRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated project", body = ProjectResponse),
        (status = 404, description = "Project not found")
    ),
    tag = "projects"
)]
pub async fn update_project(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<UpdateProjectRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let project = update(&pool, id, &request)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;
    Ok(Json(project))
}

/// Delete a project.
#[utoipa::path(
    delete,
    path = "/api/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Project deleted", body = MessageResponse),
        (status = 404, description = "Project not found")
    ),
    tag = "projects"
)]
pub async fn delete_project(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;

    if !delete(&pool, id).await? {
        return Err(ApiError::NotFound("Project"));
    }

    Ok(Json(MessageResponse::new("Project deleted")))
}
