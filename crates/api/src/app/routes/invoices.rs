use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use kontor_core::{AggregateId, Money, Rounding};
use kontor_invoicing::{
    ApplyPayment, CancelInvoice, ClientId, FinalizeInvoice, InvoiceId, PaymentId, PaymentMethod,
    PlanInstallments,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_invoice))
        .route("/:id", get(get_invoice))
        .route("/:id/finalize", post(finalize_invoice))
        .route("/:id/cancel", post(cancel_invoice))
        .route("/:id/payments", post(apply_payment).get(list_payments))
        .route("/:id/installments", post(plan_installments))
}

fn parse_invoice_id(id: &str) -> Result<InvoiceId, axum::response::Response> {
    id.parse::<AggregateId>().map(InvoiceId::new).map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id")
    })
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<crate::context::OrganizationContext>,
    Json(body): Json<dto::CreateInvoiceRequest>,
) -> axum::response::Response {
    let client_agg: AggregateId = match body.client_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid client_id");
        }
    };

    let decimal_places = body.decimal_places.unwrap_or(2);
    if decimal_places > 9 {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "decimal_places must be at most 9",
        );
    }
    let rounding = Rounding {
        decimal_places,
        ..Rounding::default()
    };

    match services.create_invoice(
        org.organization_id(),
        ClientId::new(client_agg),
        Money::new(body.total),
        rounding,
        Utc::now(),
    ) {
        Ok(snapshot) => {
            (StatusCode::CREATED, Json(dto::invoice_response(&snapshot))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<crate::context::OrganizationContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let invoice_id = match parse_invoice_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.get_invoice(org.organization_id(), invoice_id) {
        Ok(snapshot) => Json(dto::invoice_response(&snapshot)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn finalize_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<crate::context::OrganizationContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let invoice_id = match parse_invoice_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.finalize_invoice(FinalizeInvoice {
        organization_id: org.organization_id(),
        invoice_id,
        occurred_at: Utc::now(),
    }) {
        Ok(snapshot) => Json(dto::invoice_response(&snapshot)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn cancel_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<crate::context::OrganizationContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CancelInvoiceRequest>,
) -> axum::response::Response {
    let invoice_id = match parse_invoice_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.cancel_invoice(CancelInvoice {
        organization_id: org.organization_id(),
        invoice_id,
        reason: body.reason,
        occurred_at: Utc::now(),
    }) {
        Ok(snapshot) => Json(dto::invoice_response(&snapshot)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn apply_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<crate::context::OrganizationContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ApplyPaymentRequest>,
) -> axum::response::Response {
    let invoice_id = match parse_invoice_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let method: PaymentMethod = match body.method.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_method",
                "method must be one of: transfer, card, cheque, cash, reversal",
            );
        }
    };

    let command = ApplyPayment {
        organization_id: org.organization_id(),
        invoice_id,
        payment_id: PaymentId::new(AggregateId::new()),
        amount: Money::new(body.amount),
        date: body.date,
        method,
        installment_no: body.installment_no,
        occurred_at: Utc::now(),
    };

    match services.apply_payment(&command) {
        Ok(snapshot) => Json(dto::invoice_response(&snapshot)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_payments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<crate::context::OrganizationContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let invoice_id = match parse_invoice_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.invoice_payments(org.organization_id(), invoice_id) {
        Ok(payments) => Json(
            payments
                .iter()
                .map(dto::payment_response)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn plan_installments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<crate::context::OrganizationContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PlanInstallmentsRequest>,
) -> axum::response::Response {
    let invoice_id = match parse_invoice_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.plan_installments(PlanInstallments {
        organization_id: org.organization_id(),
        invoice_id,
        count: body.count,
        first_due_date: body.first_due_date,
        interval_days: body.interval_days,
        discount_rate: body.discount_rate,
        grace_days: body.grace_days.unwrap_or(0),
        occurred_at: Utc::now(),
    }) {
        Ok(snapshot) => Json(dto::invoice_response(&snapshot)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
