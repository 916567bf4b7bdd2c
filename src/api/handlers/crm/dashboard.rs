//! Dashboard summary endpoint.
//!
//! One aggregate query over the CRM tables; revenue is the sum of invoice
//! totals created in the current calendar month.

use anyhow::{Context, Result};
use axum::{extract::Extension, http::HeaderMap, response::IntoResponse, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::Instrument;
use utoipa::ToSchema;

use crate::api::error::ApiError;
use crate::api::handlers::auth::{require_auth, require_permission, AuthConfig};
use crate::api::handlers::roles::permissions::{Feature, PermissionAction};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub total_leads: i64,
    pub total_customers: i64,
    pub open_tickets: i64,
    #[schema(value_type = String, example = "5000.00")]
    pub monthly_revenue: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub success: bool,
    pub data: DashboardData,
}

async fn fetch(pool: &PgPool) -> Result<DashboardData> {
    let query = r"
        SELECT
            (SELECT COUNT(*) FROM leads) AS total_leads,
            (SELECT COUNT(*) FROM customers) AS total_customers,
            (SELECT COUNT(*) FROM tickets WHERE status = 'open') AS open_tickets,
            (SELECT COALESCE(SUM(total), 0) FROM invoices
             WHERE created_at >= date_trunc('month', NOW())) AS monthly_revenue
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to load dashboard counts")?;

    Ok(DashboardData {
        total_leads: row.get("total_leads"),
        total_customers: row.get("total_customers"),
        open_tickets: row.get("open_tickets"),
        monthly_revenue: row.get("monthly_revenue"),
    })
}

#[utoipa::path(
    get,
    path = "/api/dashboard",
    security(("bearer" = [])),
    responses((status = 200, description = "Dashboard summary", body = DashboardResponse)),
    tag = "dashboard"
)]
pub async fn get_dashboard(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;
    require_permission(&principal, Feature::Dashboard, PermissionAction::View)?;

    let data = fetch(&pool).await?;

    Ok(Json(DashboardResponse {
        success: true,
        data,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashboard_data_serializes_camel_case_keys() {
        let data = DashboardData {
            total_leads: 12,
            total_customers: 4,
            open_tickets: 3,
            monthly_revenue: Decimal::new(500_000, 2),
        };

        let body = serde_json::to_value(&data).expect("serialize");
        assert_eq!(body["totalLeads"], serde_json::json!(12));
        assert_eq!(body["openTickets"], serde_json::json!(3));
        assert_eq!(body["monthlyRevenue"], serde_json::json!("5000.00"));
    }
}
