use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use kontor_core::DomainError;
use kontor_infra::ServiceError;
use kontor_numbering::{DocumentType, ResetCadence};

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            e.to_string(),
        ),
        ServiceError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::PolicyInactive(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "policy_inactive", msg)
        }
        DomainError::FormatOverflow(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "format_overflow", msg)
        }
        DomainError::Overpayment(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "overpayment", msg)
        }
        DomainError::InvoiceClosed(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invoice_closed", msg)
        }
        DomainError::ScheduleLocked(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "schedule_locked", msg)
        }
        DomainError::ConcurrentAllocation(msg) => {
            json_error(StatusCode::CONFLICT, "concurrent_allocation", msg)
        }
        DomainError::ConcurrentModification(msg) => {
            json_error(StatusCode::CONFLICT, "conflict", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_document_type(s: &str) -> Result<DocumentType, axum::response::Response> {
    s.parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_document_type",
            "document_type must be one of: invoice, purchase_order, credit_note, quote, delivery_note",
        )
    })
}

pub fn parse_reset_cadence(s: &str) -> Result<ResetCadence, axum::response::Response> {
    match s {
        "never" => Ok(ResetCadence::Never),
        "yearly" => Ok(ResetCadence::Yearly),
        "monthly" => Ok(ResetCadence::Monthly),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_reset_cadence",
            "reset_cadence must be one of: never, yearly, monthly",
        )),
    }
}
