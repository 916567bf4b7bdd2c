//! Quotation endpoints.
//!
//! Quotation numbers are unique; totals are exact decimals, never floats.

use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::handlers::auth::types::MessageResponse;
use crate::api::handlers::auth::utils::is_unique_violation;
use crate::api::handlers::auth::{require_auth, AuthConfig};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuotationRequest {
    pub number: String,
    pub customer_id: Option<Uuid>,
    pub status: Option<String>,
    /// Line items as free-form JSON, stored verbatim.
    pub items: Option<serde_json::Value>,
    #[schema(value_type = String, example = "1250.00")]
    pub total: Option<Decimal>,
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuotationRequest {
    pub number: Option<String>,
    pub customer_id: Option<Uuid>,
    pub status: Option<String>,
    pub items: Option<serde_json::Value>,
    #[schema(value_type = String, example = "1250.00")]
    pub total: Option<Decimal>,
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuotationResponse {
    pub id: Uuid,
    pub number: String,
    pub customer_id: Option<Uuid>,
    pub status: String,
    pub items: serde_json::Value,
    #[schema(value_type = String)]
    pub total: Decimal,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, number, customer_id, status, items, total, valid_until, \
                       created_by, created_at, updated_at";

fn from_row(row: &sqlx::postgres::PgRow) -> QuotationResponse {
    QuotationResponse {
        id: row.get("id"),
        number: row.get("number"),
        customer_id: row.get("customer_id"),
        status: row.get("status"),
        items: row.get("items"),
        total: row.get("total"),
        valid_until: row.get("valid_until"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn validate_total(total: Option<Decimal>) -> Result<(), ApiError> {
    if total.is_some_and(|total| total < Decimal::ZERO) {
        return Err(ApiError::Validation("Total cannot be negative".to_string()));
    }
    Ok(())
}

async fn insert(
    pool: &PgPool,
    request: &CreateQuotationRequest,
    created_by: Uuid,
) -> Result<Option<QuotationResponse>> {
    let query = format!(
        r"
        INSERT INTO quotations (number, customer_id, status, items, total, valid_until, created_by)
        VALUES ($1, $2, COALESCE($3, 'draft'), COALESCE($4, '[]'::jsonb), COALESCE($5, 0), $6, $7)
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
        .bind(request.number.trim())
        .bind(request.customer_id)
        .bind(request.status.as_deref())
        .bind(request.items.as_ref())
        .bind(request.total)
        .bind(request.valid_until)
        .bind(created_by)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(Some(from_row(&row))),
        Err(err) if is_unique_violation(&err) => Ok(None),
        Err(err) => Err(err).context("failed to insert quotation"),
    }
}

async fn list(pool: &PgPool) -> Result<Vec<QuotationResponse>> {
    let query = format!("SELECT {COLUMNS} FROM quotations ORDER BY created_at DESC");
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
        .context("failed to list quotations")?;

    Ok(rows.iter().map(from_row).collect())
}

async fn fetch(pool: &PgPool, id: Uuid) -> Result<Option<QuotationResponse>> {
    let query = format!("SELECT {COLUMNS} FROM quotations WHERE id = $1");
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
        .context("failed to fetch quotation")?;

    Ok(row.as_ref().map(from_row))
}

enum UpdateOutcome {
    Updated(QuotationResponse),
    Conflict,
    Missing,
}

async fn update(
    pool: &PgPool,
    id: Uuid,
    request: &UpdateQuotationRequest,
) -> Result<UpdateOutcome> {
    let query = format!(
        r"
        UPDATE quotations
        SET number = COALESCE($2, number),
            customer_id = COALESCE($3, customer_id),
            status = COALESCE($4, status),
            items = COALESCE($5, items),
            total = COALESCE($6, total),
            valid_until = COALESCE($7, valid_until),
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
        .bind(request.number.as_deref().map(str::trim))
        .bind(request.customer_id)
        .bind(request.status.as_deref())
        .bind(request.items.as_ref())
        .bind(request.total)
        .bind(request.valid_until)
        .fetch_optional(pool)
        .instrument(span)
        .await;

    match row {
        Ok(Some(row)) => Ok(UpdateOutcome::Updated(from_row(&row))),
        Ok(None) => Ok(UpdateOutcome::Missing),
        Err(err) if is_unique_violation(&err) => Ok(UpdateOutcome::Conflict),
        Err(err) => Err(err).context("failed to update quotation"),
    }
}

async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
    let query = "DELETE FROM quotations WHERE id = $1 RETURNING id";
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
        .context("failed to delete quotation")?;

    Ok(row.is_some())
}

/// List quotations, newest first.
#[utoipa::path(
    get,
    path = "/api/quotations",
    security(("bearer" = [])),
    responses((status = 200, description = "Quotations", body = [QuotationResponse])),
    tag = "quotations"
)]
pub async fn list_quotations(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;
    Ok(Json(list(&pool).await?))
}

/// Create a quotation.
#[utoipa::path(
    post,
    path = "/api/quotations",
    request_body = CreateQuotationRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Quotation created", body = QuotationResponse),
        (status = 400, description = "Number already used")
    ),
    tag = "quotations"
)]
pub async fn create_quotation(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<CreateQuotationRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    if request.number.trim().is_empty() {
        return Err(ApiError::Validation(
            "Quotation number is required".to_string(),
        ));
    }
    validate_total(request.total)?;

    let quotation = insert(&pool, &request, principal.account_id)
        .await?
        .ok_or_else(|| {
            ApiError::DuplicateResource("Quotation number is already used".to_string())
        })?;
    Ok((StatusCode::CREATED, Json(quotation)))
}

/// Fetch a single quotation.
#[utoipa::path(
    get,
    path = "/api/quotations/{id}",
    params(("id" = Uuid, Path, description = "Quotation id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Quotation", body = QuotationResponse),
        (status = 404, description = "Quotation not found")
    ),
    tag = "quotations"
)]
pub async fn get_quotation(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;
    let quotation = fetch(&pool, id)
        .await?
        .ok_or(ApiError::NotFound("Quotation"))?;
    Ok(Json(quotation))
}

/// Update a quotation; omitted fields keep their value.
#[utoipa::path(
    put,
    path = "/api/quotations/{id}",
    params(("id" = Uuid, Path, description = "Quotation id")),
    request_body = UpdateQuotationRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated quotation", body = QuotationResponse),
        (status = 400, description = "Number already used"),
        (status = 404, description = "Quotation not found")
    ),
    tag = "quotations"
)]
pub async fn update_quotation(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<UpdateQuotationRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    validate_total(request.total)?;

    match update(&pool, id, &request).await? {
        UpdateOutcome::Updated(quotation) => Ok(Json(quotation)),
        UpdateOutcome::Conflict => Err(ApiError::DuplicateResource(
            "Quotation number is already used".to_string(),
        )),
        UpdateOutcome::Missing => Err(ApiError::NotFound("Quotation")),
    }
}

/// Delete a quotation.
#[utoipa::path(
    delete,
    path = "/api/quotations/{id}",
    params(("id" = Uuid, Path, description = "Quotation id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Quotation deleted", body = MessageResponse),
        (status = 404, description = "Quotation not found")
    ),
    tag = "quotations"
)]
pub async fn delete_quotation(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;

    if !delete(&pool, id).await? {
        return Err(ApiError::NotFound("Quotation"));
    }

    Ok(Json(MessageResponse::new("Quotation deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_totals_rejected() {
        assert!(validate_total(Some(Decimal::new(-1, 2))).is_err());
        assert!(validate_total(Some(Decimal::ZERO)).is_ok());
        assert!(validate_total(Some(Decimal::new(125_000, 2))).is_ok());
        assert!(validate_total(None).is_ok());
    }
}
