use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use kontor_core::OrganizationId;

use crate::app::errors;
use crate::context::OrganizationContext;

/// Header carrying the caller's organization scope. Authentication itself is
/// out of scope; every domain route still requires an explicit organization.
pub const ORGANIZATION_HEADER: &str = "x-organization-id";

pub async fn organization_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let organization_id = extract_organization(req.headers())?;

    req.extensions_mut()
        .insert(OrganizationContext::new(organization_id));

    Ok(next.run(req).await)
}

fn extract_organization(headers: &HeaderMap) -> Result<OrganizationId, Response> {
    let header = headers.get(ORGANIZATION_HEADER).ok_or_else(|| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "missing_organization",
            "X-Organization-Id header is required",
        )
    })?;

    let header = header.to_str().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_organization",
            "X-Organization-Id must be a UUID",
        )
    })?;

    header.trim().parse::<OrganizationId>().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_organization",
            "X-Organization-Id must be a UUID",
        )
    })
}
