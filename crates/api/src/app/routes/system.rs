use axum::{Json, http::StatusCode, response::IntoResponse};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    axum::extract::Extension(org): axum::extract::Extension<crate::context::OrganizationContext>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "organization_id": org.organization_id().to_string(),
    }))
}
