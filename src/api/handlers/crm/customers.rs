//! Customer endpoints.

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
pub struct CreateCustomerRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerResponse {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub status: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str =
    "id, name, email, phone, company, address, status, created_by, created_at, updated_at";

fn from_row(row: &sqlx::postgres::PgRow) -> CustomerResponse {
    CustomerResponse {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        company: row.get("company"),
        address: row.get("address"),
        status: row.get("status"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

async fn insert(
    pool: &PgPool,
    request: &CreateCustomerRequest,
    created_by: Uuid,
) -> Result<CustomerResponse> {
    let query = format!(
        r"
        INSERT INTO customers (name, email, phone, company, address, status, created_by)
        VALUES ($1, $2, $3, $4, $5, COALESCE($6, 'active'), $7)
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
        .bind(request.address.as_deref())
        .bind(request.status.as_deref())
        .bind(created_by)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to insert customer")?;

    Ok(from_row(&row))
}

async fn list(pool: &PgPool) -> Result<Vec<CustomerResponse>> {
    let query = format!("SELECT {COLUMNS} FROM customers ORDER BY created_at DESC");
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
        .context("failed to list customers")?;

    Ok(rows.iter().map(from_row).collect())
}

async fn fetch(pool: &PgPool, id: Uuid) -> Result<Option<CustomerResponse>> {
    let query = format!("SELECT {COLUMNS} FROM customers WHERE id = $1");
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
        .context("failed to fetch customer")?;

    Ok(row.as_ref().map(from_row))
}

async fn update(
    pool: &PgPool,
    id: Uuid,
    request: &UpdateCustomerRequest,
) -> Result<Option<CustomerResponse>> {
    let query = format!(
        r"
        UPDATE customers
        SET name = COALESCE($2, name),
            email = COALESCE($3, email),
            phone = COALESCE($4, phone),
            company = COALESCE($5, company),
            address = COALESCE($6, address),
            status = COALESCE($7, status),
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
        .bind(request.address.as_deref())
        .bind(request.status.as_deref())
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to update customer")?;

    Ok(row.as_ref().map(from_row))
}

async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
    let query = "DELETE FROM customers WHERE id = $1 RETURNING id";
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
        .context("failed to delete customer")?;

    Ok(row.is_some())
}

/// List customers, newest first.
#[utoipa::path(
    get,
    path = "/api/customers",
    security(("bearer" = [])),
    responses((status = 200, description = "Customers", body = [CustomerResponse])),
    tag = "customers"
)]
pub async fn list_customers(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;
    Ok(Json(list(&pool).await?))
}

/// Create a customer.
#[utoipa::path(
    post,
    path = "/api/customers",
    request_body = CreateCustomerRequest,
    security(("bearer" = [])),
    responses((status = 201, description = "Customer created", body = CustomerResponse)),
    tag = "customers"
)]
pub async fn create_customer(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<CreateCustomerRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    if request.name.trim().is_empty() {
        return Err(ApiError::Validation(
            "Customer name is required".to_string(),
        ));
    }

    let customer = insert(&pool, &request, principal.account_id).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// Fetch a single customer.
#[utoipa::path(
    get,
    path = "/api/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Customer", body = CustomerResponse),
        (status = 404, description = "Customer not found")
    ),
    tag = "customers"
)]
pub async fn get_customer(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;
    let customer = fetch(&pool, id)
        .await?
        .ok_or(ApiError::NotFound("Customer"))?;
    Ok(Json(customer))
}

/// Update a customer; omitted fields keep their value.
#[utoipa::path(
    put,
    path = "/api/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    request_body = UpdateCustomerRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated customer", body = CustomerResponse),
        (status = 404, description = "Customer not found")
    ),
    tag = "customers"
)]
pub async fn update_customer(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<UpdateCustomerRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let customer = update(&pool, id, &request)
        .await?
        .ok_or(ApiError::NotFound("Customer"))?;
    Ok(Json(customer))
}

/// Delete a customer.
#[utoipa::path(
    delete,
    path = "/api/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Customer deleted", body = MessageResponse),
        (status = 404, description = "Customer not found")
    ),
    tag = "customers"
)]
pub async fn delete_customer(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &pool, &config).await?;

    if !delete(&pool, id).await? {
        return Err(ApiError::NotFound("Customer"));
    }

    Ok(Json(MessageResponse::new("Customer deleted")))
}
