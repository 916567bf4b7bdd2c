//! Service banner at `/`.

use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ServiceInfo {
    name: String,
    version: String,
}

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service name and version", body = ServiceInfo)),
    tag = "health"
)]
pub async fn root() -> impl IntoResponse {
    Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn banner_reports_cargo_metadata() {
        let response = root().await.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
