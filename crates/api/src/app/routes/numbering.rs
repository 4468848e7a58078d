use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use kontor_numbering::NumberingPolicy;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/allocate", post(allocate_number))
        .route(
            "/policies/:document_type",
            get(get_policy).put(upsert_policy),
        )
        .route("/counters/:document_type", get(current_counter))
}

pub async fn allocate_number(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<crate::context::OrganizationContext>,
    Json(body): Json<dto::AllocateNumberRequest>,
) -> axum::response::Response {
    let document_type = match errors::parse_document_type(&body.document_type) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.allocate_number(org.organization_id(), document_type, Utc::now()) {
        Ok(number) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "number": number.as_str() })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_policy(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<crate::context::OrganizationContext>,
    Path(document_type): Path<String>,
) -> axum::response::Response {
    let document_type = match errors::parse_document_type(&document_type) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.resolve_policy(org.organization_id(), document_type) {
        Ok(policy) => Json(dto::policy_response(&policy)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn upsert_policy(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<crate::context::OrganizationContext>,
    Path(document_type): Path<String>,
    Json(body): Json<dto::UpsertPolicyRequest>,
) -> axum::response::Response {
    let document_type = match errors::parse_document_type(&document_type) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let reset_cadence = match errors::parse_reset_cadence(&body.reset_cadence) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let policy = NumberingPolicy {
        organization_id: org.organization_id(),
        document_type,
        prefix: body.prefix,
        suffix: body.suffix,
        separator: body.separator.unwrap_or_else(|| "-".to_string()),
        digit_width: body.digit_width,
        date_format_token: body.date_format_token,
        reset_cadence,
        widen_on_overflow: body.widen_on_overflow.unwrap_or(true),
        active: body.active.unwrap_or(true),
    };

    if let Err(e) = policy.validate() {
        return errors::domain_error_to_response(e);
    }

    match services.upsert_policy(policy.clone()) {
        Ok(()) => (StatusCode::OK, Json(dto::policy_response(&policy))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn current_counter(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<crate::context::OrganizationContext>,
    Path(document_type): Path<String>,
) -> axum::response::Response {
    let document_type = match errors::parse_document_type(&document_type) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.current_counter(org.organization_id(), document_type, Utc::now()) {
        Ok(value) => Json(serde_json::json!({ "current_value": value })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
