//! Lead endpoints.
//!
//! Deleting a lead is allowed for admins, superadmins, or the account that
//! created it.

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
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::handlers::auth::types::MessageResponse;
use crate::api::handlers::auth::{require_auth, AuthConfig, Principal};
use std::sync::Arc;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadResponse {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, name, email, phone, company, source, status, notes, \
                       assigned_to, created_by, created_at, updated_at";

fn from_row(row: &sqlx::postgres::PgRow) -> LeadResponse {
    LeadResponse {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        company: row.get("company"),
        source: row.get("source"),
        status: row.get("status"),
        notes: row.get("notes"),
        assigned_to: row.get("assigned_to"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

async fn insert(
    pool: &PgPool,
    request: &CreateLeadRequest,
    created_by: Uuid,
) -> Result<LeadResponse> {
    let query = format!(
        r"
        INSERT INTO leads (name, email, phone, company, source, status, notes, assigned_to, created_by)
        VALUES ($1, $2, $3, $4, $5, COALESCE($6, 'new'), $7, $8, $9)
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
        .bind(request.email.as_deref())
        .bind(request.phone.as_deref())
        .bind(request.company.as_deref())
        .bind(request.source.as_deref())
        .bind(request.status.as_deref())
        .bind(request.notes.as_deref())
        .bind(request.assigned_to)
        .bind(created_by)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to insert lead")?;

    Ok(from_row(&row))
}

async fn list(pool: &PgPool) -> Result<Vec<LeadResponse>> {
    let query = format!("SELECT {COLUMNS} FROM leads ORDER BY created_at DESC");
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
        .context("failed to list leads")?;

    Ok(rows.iter().map(from_row).collect())
}

async fn fetch(pool: &PgPool, id: Uuid) -> Result<Option<LeadResponse>> {
    let query = format!("SELECT {COLUMNS} FROM leads WHERE id = $1");
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
        .context("failed to fetch lead")?;

    Ok(row.as_ref().map(from_row))
}

async fn update(
    pool: &PgPool,
    id: Uuid,
    request: &UpdateLeadRequest,
) -> Result<Option<LeadResponse>> {
    let query = format!(
        r"
        UPDATE leads
        SET name = COALESCE($2, name),
            email = COALESCE($3, email),
            phone = COALESCE($4, phone),
            company = COALESCE($5, company),
            source = COALESCE($6, source),
            status = COALESCE($7, status),
            notes = COALESCE($8, notes),
            assigned_to = COALESCE($9, assigned_to),
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
        .bind(request.email.as_deref())
        .bind(request.phone.as_deref())
        .bind(request.company.as_deref())
        .bind(request.source.as_deref())
        .bind(request.status.as_deref())
        .bind(request.notes.as_deref())
        .bind(request.assigned_to)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to update lead")?;

    Ok(row.as_ref().map(from_row))
}

async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
    let query = "DELETE FROM leads WHERE id = $1 RETURNING id";
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
        .context("failed to delete lead")?;

    Ok(row.is_some())
}

fn can_delete(principal: &Principal, created_by: Uuid) -> bool {
    principal.has_role(&["admin", "superadmin"]) || principal.account_id == created_by
}

/// List leads, newest first.
#[utoipa::path(
    get,
    path = "/api/leads",
    security(("bearer" = [])),
    responses((status = 200, description = "Leads", body = [LeadResponse])),
    tag = "leads"
)]
pub async fn list_leads(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;
    Ok(Json(list(&pool).await?))
}

/// Create a lead.
#[utoipa::path(
    post,
    path = "/api/leads",
    request_body = CreateLeadRequest,
    security(("bearer" = [])),
    responses((status = 201, description = "Lead created", body = LeadResponse)),
    tag = "leads"
)]
pub async fn create_lead(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<CreateLeadRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    if request.name.trim().is_empty() {
        return Err(ApiError::Validation("Lead name is required".to_string()));
    }

    let lead = insert(&pool, &request, principal.account_id).await?;
    Ok((StatusCode::CREATED, Json(lead)))
}

/// Fetch a single lead.
#[utoipa::path(
    get,
    path = "/api/leads/{id}",
    params(("id" = Uuid, Path, description = "Lead id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Lead", body = LeadResponse),
        (status = 404, description = "Lead not found")
    ),
    tag = "leads"
)]
pub async fn get_lead(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;
    let lead = fetch(&pool, id).await?.ok_or(ApiError::NotFound("Lead"))?;
    Ok(Json(lead))
}

/// Update a lead; omitted fields keep their value.
#[utoipa::path(
    put,
    path = "/api/leads/{id}",
    params(("id" = Uuid, Path, description = "Lead id")),
    request_body = UpdateLeadRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated lead", body = LeadResponse),
        (status = 404, description = "Lead not found")
    ),
    tag = "leads"
)]
pub async fn update_lead(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<UpdateLeadRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let lead = update(&pool, id, &request)
        .await?
        .ok_or(ApiError::NotFound("Lead"))?;
    Ok(Json(lead))
}

/// Delete a lead (admin, superadmin, or its creator).
#[utoipa::path(
    delete,
    path = "/api/leads/{id}",
    params(("id" = Uuid, Path, description = "Lead id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Lead deleted", body = MessageResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Lead not found")
    ),
    tag = "leads"
)]
pub async fn delete_lead(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;

    let lead = fetch(&pool, id).await?.ok_or(ApiError::NotFound("Lead"))?;
    if !can_delete(&principal, lead.created_by) {
        return Err(ApiError::Forbidden);
    }

    if !delete(&pool, id).await? {
        return Err(ApiError::NotFound("Lead"));
    }

    Ok(Json(MessageResponse::new("Lead deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::roles::permissions::PermissionMap;

    fn principal(role: &str, is_superadmin: bool, account_id: Uuid) -> Principal {
        Principal {
            account_id,
            email: "user@example.com".to_string(),
            role_name: role.to_string(),
            permissions: PermissionMap::employee(),
            is_superadmin,
            token_hash: vec![0; 32],
        }
    }

    #[test]
    fn delete_allowed_for_admin_and_owner() {
        let owner = Uuid::new_v4();

        assert!(can_delete(&principal("admin", false, Uuid::new_v4()), owner));
        assert!(can_delete(
            &principal("superadmin", true, Uuid::new_v4()),
            owner
        ));
        assert!(can_delete(&principal("employee", false, owner), owner));
        assert!(!can_delete(
            &principal("employee", false, Uuid::new_v4()),
            owner
        ));
    }

    #[test]
    fn create_request_uses_camel_case_keys() {
        let assignee = Uuid::new_v4();
        let request: CreateLeadRequest = serde_json::from_str(&format!(
            r#"{{"name":"Acme","assignedTo":"{assignee}"}}"#
        ))
        .expect("deserialize");
        assert_eq!(request.name, "Acme");
        assert_eq!(request.assigned_to, Some(assignee));
    }
}
