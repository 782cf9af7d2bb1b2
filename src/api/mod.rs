//! API handlers for the circulation REST endpoints

pub mod circulation;
pub mod health;
pub mod loans;
pub mod openapi;
pub mod reservations;
pub mod titles;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::AppError,
    models::{Actor, UserClaims},
    AppState,
};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

impl AuthenticatedUser {
    pub fn actor(&self) -> Actor {
        self.0.actor()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Titles
        .route("/titles", post(titles::create_title))
        .route("/titles/:id", get(titles::get_title))
        .route("/titles/:id/loans", post(titles::request_loan))
        .route("/titles/:id/stock", post(titles::adjust_stock))
        .route(
            "/titles/:id/reservations",
            get(titles::list_queue).post(titles::enroll_reservation),
        )
        .route("/titles/:id/reservations/refresh", post(titles::refresh_estimates))
        // Loans
        .route("/loans/:id", get(loans::get_loan))
        .route("/loans/:id/approve", post(loans::approve_loan))
        .route("/loans/:id/reject", post(loans::reject_loan))
        .route("/loans/:id/activate", post(loans::activate_loan))
        .route("/loans/:id/return", post(loans::return_loan))
        .route("/loans/:id/cancel", post(loans::cancel_loan))
        .route("/loans/:id/extend", post(loans::extend_loan))
        .route("/loans/:id/renew", post(loans::renew_loan))
        .route("/users/:id/loans", get(loans::get_user_loans))
        // Reservations
        .route("/reservations/:id", get(reservations::get_reservation))
        .route("/reservations/:id/cancel", post(reservations::cancel_reservation))
        .route("/reservations/:id/promote", post(reservations::promote_reservation))
        .route("/reservations/:id/convert", post(reservations::convert_reservation))
        .route("/reservations/:id/notify", post(reservations::notify_reservation))
        // Scheduled passes, on demand
        .route("/circulation/sweep", post(circulation::sweep_overdue))
        .route("/circulation/reminders", post(circulation::remind_due_loans))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
