//! Invoice endpoints.
//!
//! Same shape as quotations: unique numbers, decimal totals, free-form line
//! items stored as JSONB.

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
pub struct CreateInvoiceRequest {
    pub number: String,
    pub customer_id: Option<Uuid>,
    pub status: Option<String>,
    pub items: Option<serde_json::Value>,
    #[schema(value_type = String, example = "980.50")]
    pub total: Option<Decimal>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoiceRequest {
    pub number: Option<String>,
    pub customer_id: Option<Uuid>,
    pub status: Option<String>,
    pub items: Option<serde_json::Value>,
    #[schema(value_type = String, example = "980.50")]
    pub total: Option<Decimal>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub number: String,
    pub customer_id: Option<Uuid>,
    pub status: String,
    pub items: serde_json::Value,
    #[schema(value_type = String)]
    pub total: Decimal,
    pub due_date: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, number, customer_id, status, items, total, due_date, \
                       created_by, created_at, updated_at";

fn from_row(row: &sqlx::postgres::PgRow) -> InvoiceResponse {
    InvoiceResponse {
        id: row.get("id"),
        number: row.get("number"),
        customer_id: row.get("customer_id"),
        status: row.get("status"),
        items: row.get("items"),
        total: row.get("total"),
        due_date: row.get("due_date"),
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
    request: &CreateInvoiceRequest,
    created_by: Uuid,
) -> Result<Option<InvoiceResponse>> {
    let query = format!(
        r"
        INSERT INTO invoices (number, customer_id, status, items, total, due_date, created_by)
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
        .bind(request.due_date)
        .bind(created_by)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(Some(from_row(&row))),
        Err(err) if is_unique_violation(&err) => Ok(None),
        Err(err) => Err(err).context("failed to insert invoice"),
    }
}

async fn list(pool: &PgPool) -> Result<Vec<InvoiceResponse>> {
    let query = format!("SELECT {COLUMNS} FROM invoices ORDER BY created_at DESC");
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
        .context("failed to list invoices")?;

    Ok(rows.iter().map(from_row).collect())
}

async fn fetch(pool: &PgPool, id: Uuid) -> Result<Option<InvoiceResponse>> {
    let query = format!("SELECT {COLUMNS} FROM invoices WHERE id = $1");
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
        .context("failed to fetch invoice")?;

    Ok(row.as_ref().map(from_row))
}

enum UpdateOutcome {
    Updated(InvoiceResponse),
    Conflict,
    Missing,
}

async fn update(pool: &PgPool, id: Uuid, request: &UpdateInvoiceRequest) -> Result<UpdateOutcome> {
    let query = format!(
        r"
        UPDATE invoices
        SET number = COALESCE($2, number),
            customer_id = COALESCE($3, customer_id),
            status = COALESCE($4, status),
            items = COALESCE($5, items),
            total = COALESCE($6, total),
            due_date = COALESCE($7, due_date),
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
        .bind(request.due_date)
        .fetch_optional(pool)
        .instrument(span)
        .await;

    match row {
        Ok(Some(row)) => Ok(UpdateOutcome::Updated(from_row(&row))),
        Ok(None) => Ok(UpdateOutcome::Missing),
        Err(err) if is_unique_violation(&err) => Ok(UpdateOutcome::Conflict),
        Err(err) => Err(err).context("failed to update invoice"),
    }
}

async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
    let query = "DELETE FROM invoices WHERE id = $1 RETURNING id";
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
        .context("failed to delete invoice")?;

    Ok(row.is_some())
}

/// List invoices, newest first.
#[utoipa::path(
    get,
    path = "/api/invoices",
    security(("bearer" = [])),
    responses((status = 200, description = "Invoices", body = [InvoiceResponse])),
    tag = "invoices"
)]
pub async fn list_invoices(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;
    Ok(Json(list(&pool).await?))
}

/// Create an invoice.
#[utoipa::path(
    post,
    path = "/api/invoices",
    request_body = CreateInvoiceRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Invoice created", body = InvoiceResponse),
        (status = 400, description = "Number already used")
    ),
    tag = "invoices"
)]
pub async fn create_invoice(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<CreateInvoiceRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    if request.number.trim().is_empty() {
        return Err(ApiError::Validation(
            "Invoice number is required".to_string(),
        ));
    }
    validate_total(request.total)?;

    let invoice = insert(&pool, &request, principal.account_id)
        .await?
        .ok_or_else(|| ApiError::DuplicateResource("Invoice number is already used".to_string()))?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// Fetch a single invoice.
#[utoipa::path(
    get,
    path = "/api/invoices/{id}",
    params(("id" = Uuid, Path, description = "Invoice id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Invoice", body = InvoiceResponse),
        (status = 404, description = "Invoice not found")
    ),
    tag = "invoices"
)]
pub async fn get_invoice(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;
    let invoice = fetch(&pool, id)
        .await?
        .ok_or(ApiError::NotFound("Invoice"))?;
    Ok(Json(invoice))
}

/// Update an invoice; omitted fields keep their value.
#[utoipa::path(
    put,
    path = "/api/invoices/{id}",
    params(("id" = Uuid, Path, description = "Invoice id")),
    request_body = UpdateInvoiceRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated invoice", body = InvoiceResponse),
        (status = 400, description = "Number already used"),
        (status = 404, description = "Invoice not found")
    ),
    tag = "invoices"
)]
pub async fn update_invoice(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<UpdateInvoiceRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    validate_total(request.total)?;

    match update(&pool, id, &request).await? {
        UpdateOutcome::Updated(invoice) => Ok(Json(invoice)),
        UpdateOutcome::Conflict => Err(ApiError::DuplicateResource(
            "Invoice number is already used".to_string(),
        )),
        UpdateOutcome::Missing => Err(ApiError::NotFound("Invoice")),
    }
}

/// Delete an invoice.
#[utoipa::path(
    delete,
    path = "/api/invoices/{id}",
    params(("id" = Uuid, Path, description = "Invoice id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Invoice deleted", body = MessageResponse),
        (status = 404, description = "Invoice not found")
    ),
    tag = "invoices"
)]
pub async fn delete_invoice(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;

    if !delete(&pool, id).await? {
        return Err(ApiError::NotFound("Invoice"));
    }

    Ok(Json(MessageResponse::new("Invoice deleted")))
}
