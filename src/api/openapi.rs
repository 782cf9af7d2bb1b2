//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{circulation, health, loans, reservations, titles};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Circulation API",
        version = "1.0.0",
        description = "Loans, reservation queues and stock for a library/bookstore platform",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Titles
        titles::create_title,
        titles::get_title,
        titles::request_loan,
        titles::adjust_stock,
        titles::list_queue,
        titles::enroll_reservation,
        titles::refresh_estimates,
        // Loans
        loans::get_loan,
        loans::get_user_loans,
        loans::approve_loan,
        loans::reject_loan,
        loans::activate_loan,
        loans::return_loan,
        loans::cancel_loan,
        loans::extend_loan,
        loans::renew_loan,
        // Reservations
        reservations::get_reservation,
        reservations::cancel_reservation,
        reservations::promote_reservation,
        reservations::convert_reservation,
        reservations::notify_reservation,
        // Scheduled passes
        circulation::sweep_overdue,
        circulation::remind_due_loans,
    ),
    components(
        schemas(
            crate::models::Title,
            crate::models::CreateTitle,
            crate::models::StockPool,
            crate::models::Loan,
            crate::models::LoanStatus,
            crate::models::Reservation,
            titles::LoanRequest,
            titles::LoanRequestResponse,
            titles::StockOperation,
            titles::StockAdjustment,
            loans::RejectLoanRequest,
            reservations::QueueChangeResponse,
            reservations::ConversionResponse,
            crate::circulation::PassReport,
            health::HealthResponse,
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "titles", description = "Titles, stock and borrow requests"),
        (name = "loans", description = "Loan lifecycle"),
        (name = "reservations", description = "Waiting lists"),
        (name = "circulation", description = "Overdue sweep and reminders")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
