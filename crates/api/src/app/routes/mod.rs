use axum::{Router, routing::get};

pub mod invoices;
pub mod numbering;
pub mod system;

/// Router for all organization-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/numbering", numbering::router())
        .nest("/invoices", invoices::router())
}
