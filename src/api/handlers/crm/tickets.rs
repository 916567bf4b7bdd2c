//! Support ticket endpoints.
//!
//! Deleting a ticket requires the `tickets.delete` grant; the other
//! operations only require authentication.

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
use crate::api::handlers::auth::{require_auth, require_permission, AuthConfig};
use crate::api::handlers::roles::permissions::{Feature, PermissionAction};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketRequest {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub customer_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTicketRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub customer_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub customer_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, title, description, status, priority, customer_id, \
                       assigned_to, created_by, created_at, updated_at";

fn from_row(row: &sqlx::postgres::PgRow) -> TicketResponse {
    TicketResponse {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        status: row.get("status"),
        priority: row.get("priority"),
        customer_id: row.get("customer_id"),
        assigned_to: row.get("assigned_to"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

async fn insert(
    pool: &PgPool,
    request: &CreateTicketRequest,
    created_by: Uuid,
) -> Result<TicketResponse> {
    let query = format!(
        r"
        INSERT INTO tickets (title, description, status, priority, customer_id, assigned_to, created_by)
        VALUES ($1, $2, COALESCE($3, 'open'), COALESCE($4, 'medium'), $5, $6, $7)
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
        .bind(request.description.as_deref())
        .bind(request.status.as_deref())
        .bind(request.priority.as_deref())
        .bind(request.customer_id)
        .bind(request.assigned_to)
        .bind(created_by)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to insert ticket")?;

    Ok(from_row(&row))
}

async fn list(pool: &PgPool) -> Result<Vec<TicketResponse>> {
    let query = format!("SELECT {COLUMNS} FROM tickets ORDER BY created_at DESC");
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
        .context("failed to list tickets")?;

    Ok(rows.iter().map(from_row).collect())
}

async fn fetch(pool: &PgPool, id: Uuid) -> Result<Option<TicketResponse>> {
    let query = format!("SELECT {COLUMNS} FROM tickets WHERE id = $1");
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
        .context("failed to fetch ticket")?;

    Ok(row.as_ref().map(from_row))
}

async fn update(
    pool: &PgPool,
    id: Uuid,
    request: &UpdateTicketRequest,
) -> Result<Option<TicketResponse>> {
    let query = format!(
        r"
        UPDATE tickets
        SET title = COALESCE($2, title),
            description = COALESCE($3, description),
            status = COALESCE($4, status),
            priority = COALESCE($5, priority),
            customer_id = COALESCE($6, customer_id),
            assigned_to = COALESCE($7, assigned_to),
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
        .bind(request.description.as_deref())
        .bind(request.status.as_deref())
        .bind(request.priority.as_deref())
        .bind(request.customer_id)
        .bind(request.assigned_to)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to update ticket")?;

    Ok(row.as_ref().map(from_row))
}

async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
    let query = "DELETE FROM tickets WHERE id = $1 RETURNING id";
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
        .context("failed to delete ticket")?;

    Ok(row.is_some())
}

/// List tickets, newest first.
#[utoipa::path(
    get,
    path = "/api/tickets",
    security(("bearer" = [])),
    responses((status = 200, description = "Tickets", body = [TicketResponse])),
    tag = "tickets"
)]
pub async fn list_tickets(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;
    Ok(Json(list(&pool).await?))
}

/// Create a ticket.
#[utoipa::path(
    post,
    path = "/api/tickets",
    request_body = CreateTicketRequest,
    security(("bearer" = [])),
    responses((status = 201, description = "Ticket created", body = TicketResponse)),
    tag = "tickets"
)]
pub async fn create_ticket(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<CreateTicketRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    if request.title.trim().is_empty() {
        return Err(ApiError::Validation("Ticket title is required".to_string()));
    }

    let ticket = insert(&pool, &request, principal.account_id).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Fetch a single ticket.
#[utoipa::path(
    get,
    path = "/api/tickets/{id}",
    params(("id" = Uuid, Path, description = "Ticket id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Ticket", body = TicketResponse),
        (status = 404, description = "Ticket not found")
    ),
    tag = "tickets"
)]
pub async fn get_ticket(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;
    let ticket = fetch(&pool, id)
        .await?
        .ok_or(ApiError::NotFound("Ticket"))?;
    Ok(Json(ticket))
}

/// Update a ticket; omitted fields keep their value.
#[utoipa::path(
    put,
    path = "/api/tickets/{id}",
    params(("id" = Uuid, Path, description = "Ticket id")),
    request_body = UpdateTicketRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated ticket", body = TicketResponse),
        (status = 404, description = "Ticket not found")
    ),
    tag = "tickets"
)]
pub async fn update_ticket(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<UpdateTicketRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let ticket = update(&pool, id, &request)
        .await?
        .ok_or(ApiError::NotFound("Ticket"))?;
    Ok(Json(ticket))
}

/// Delete a ticket (requires the `tickets.delete` grant).
#[utoipa::path(
    delete,
    path = "/api/tickets/{id}",
    params(("id" = Uuid, Path, description = "Ticket id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Ticket deleted", body = MessageResponse),
        (status = 403, description = "Missing tickets.delete grant"),
        (status = 404, description = "Ticket not found")
    ),
    tag = "tickets"
)]
pub async fn delete_ticket(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;
    require_permission(&principal, Feature::Tickets, PermissionAction::Delete)?;

    if !delete(&pool, id).await? {
        return Err(ApiError::NotFound("Ticket"));
    }

    Ok(Json(MessageResponse::new("Ticket deleted")))
}
