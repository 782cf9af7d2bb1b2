//! Loan management endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{error::AppResult, models::Loan, AppState};

use super::AuthenticatedUser;

/// Reject loan request
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RejectLoanRequest {
    /// Appended to the loan notes and sent to the member
    pub reason: Option<String>,
}

/// Get a loan
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan", body = Loan),
        (status = 403, description = "Not the borrower"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.circulation.loan(&user.actor(), loan_id).await?;
    Ok(Json(loan))
}

/// Get loans for a specific user
#[utoipa::path(
    get,
    path = "/users/{id}/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User's loans, most recent first", body = Vec<Loan>),
        (status = 403, description = "Not the user")
    )
)]
pub async fn get_user_loans(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<Loan>>> {
    let loans = state
        .services
        .circulation
        .user_loans(&user.actor(), user_id)
        .await?;
    Ok(Json(loans))
}

/// Approve a requested loan, reserving one copy
#[utoipa::path(
    post,
    path = "/loans/{id}/approve",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan approved", body = Loan),
        (status = 403, description = "Staff only"),
        (status = 409, description = "Wrong status or no copy left")
    )
)]
pub async fn approve_loan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state
        .services
        .circulation
        .approve_loan(&user.actor(), loan_id)
        .await?;
    Ok(Json(loan))
}

/// Refuse a requested loan
#[utoipa::path(
    post,
    path = "/loans/{id}/reject",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    request_body = RejectLoanRequest,
    responses(
        (status = 200, description = "Loan rejected", body = Loan),
        (status = 403, description = "Staff only"),
        (status = 409, description = "Loan is not pending")
    )
)]
pub async fn reject_loan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(loan_id): Path<i32>,
    body: Option<Json<RejectLoanRequest>>,
) -> AppResult<Json<Loan>> {
    let reason = body.and_then(|Json(request)| request.reason);
    let loan = state
        .services
        .circulation
        .reject_loan(&user.actor(), loan_id, reason)
        .await?;
    Ok(Json(loan))
}

/// Hand the copy over
#[utoipa::path(
    post,
    path = "/loans/{id}/activate",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan active", body = Loan),
        (status = 409, description = "Loan is not approved")
    )
)]
pub async fn activate_loan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state
        .services
        .circulation
        .activate_loan(&user.actor(), loan_id)
        .await?;
    Ok(Json(loan))
}

/// Return a borrowed copy
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Copy returned", body = Loan),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan is not out")
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state
        .services
        .circulation
        .return_loan(&user.actor(), loan_id)
        .await?;
    Ok(Json(loan))
}

/// Cancel a pending or approved loan
#[utoipa::path(
    post,
    path = "/loans/{id}/cancel",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan cancelled", body = Loan),
        (status = 409, description = "Loan already started or closed")
    )
)]
pub async fn cancel_loan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state
        .services
        .circulation
        .cancel_loan(&user.actor(), loan_id)
        .await?;
    Ok(Json(loan))
}

/// Reinstate an overdue loan for another period
#[utoipa::path(
    post,
    path = "/loans/{id}/extend",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan extended", body = Loan),
        (status = 409, description = "Loan is not overdue"),
        (status = 422, description = "Maximum extensions reached")
    )
)]
pub async fn extend_loan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state
        .services
        .circulation
        .extend_loan(&user.actor(), loan_id)
        .await?;
    Ok(Json(loan))
}

/// Renew an active loan before its due date
#[utoipa::path(
    post,
    path = "/loans/{id}/renew",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan renewed", body = Loan),
        (status = 409, description = "Loan is not active"),
        (status = 422, description = "Maximum extensions reached")
    )
)]
pub async fn renew_loan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state
        .services
        .circulation
        .renew_loan(&user.actor(), loan_id)
        .await?;
    Ok(Json(loan))
}
