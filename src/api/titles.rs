//! Title endpoints: stock, borrow requests and waiting lists

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    circulation::LoanRequestOutcome,
    error::{AppError, AppResult},
    models::{CreateTitle, Loan, Reservation, StockPool, Title},
    AppState,
};

use super::AuthenticatedUser;

/// Borrow request body
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LoanRequest {
    /// Free text kept on the loan
    pub notes: Option<String>,
}

/// Either a pending loan or, when no copy is left, a waiting-list entry
#[derive(Serialize, ToSchema)]
pub struct LoanRequestResponse {
    pub loan: Option<Loan>,
    pub reservation: Option<Reservation>,
}

impl From<LoanRequestOutcome> for LoanRequestResponse {
    fn from(outcome: LoanRequestOutcome) -> Self {
        match outcome {
            LoanRequestOutcome::Requested(loan) => Self {
                loan: Some(loan),
                reservation: None,
            },
            LoanRequestOutcome::Queued(reservation) => Self {
                loan: None,
                reservation: Some(reservation),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StockOperation {
    Restock,
    Withdraw,
}

/// Stock adjustment body
#[derive(Debug, Deserialize, ToSchema)]
pub struct StockAdjustment {
    pub pool: StockPool,
    pub operation: StockOperation,
    /// Number of copies, must be positive
    pub quantity: i32,
}

/// Register a title
#[utoipa::path(
    post,
    path = "/titles",
    tag = "titles",
    security(("bearer_auth" = [])),
    request_body = CreateTitle,
    responses(
        (status = 201, description = "Title created", body = Title),
        (status = 400, description = "Invalid title"),
        (status = 403, description = "Staff only")
    )
)]
pub async fn create_title(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(data): Json<CreateTitle>,
) -> AppResult<(StatusCode, Json<Title>)> {
    data.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let title = state
        .services
        .circulation
        .create_title(&user.actor(), &data)
        .await?;
    Ok((StatusCode::CREATED, Json(title)))
}

/// Get a title with its stock counters
#[utoipa::path(
    get,
    path = "/titles/{id}",
    tag = "titles",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Title ID")),
    responses(
        (status = 200, description = "Title", body = Title),
        (status = 404, description = "Title not found")
    )
)]
pub async fn get_title(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(title_id): Path<i32>,
) -> AppResult<Json<Title>> {
    let title = state.services.circulation.title(title_id).await?;
    Ok(Json(title))
}

/// Ask to borrow a title
#[utoipa::path(
    post,
    path = "/titles/{id}/loans",
    tag = "titles",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Title ID")),
    request_body = LoanRequest,
    responses(
        (status = 201, description = "Loan requested or reservation created", body = LoanRequestResponse),
        (status = 404, description = "Title not found"),
        (status = 409, description = "Open loan or reservation already exists"),
        (status = 422, description = "Title is not borrowable")
    )
)]
pub async fn request_loan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(title_id): Path<i32>,
    body: Option<Json<LoanRequest>>,
) -> AppResult<(StatusCode, Json<LoanRequestResponse>)> {
    let notes = body.and_then(|Json(request)| request.notes);
    let outcome = state
        .services
        .circulation
        .request_loan(&user.actor(), title_id, notes)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// Restock or withdraw copies
#[utoipa::path(
    post,
    path = "/titles/{id}/stock",
    tag = "titles",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Title ID")),
    request_body = StockAdjustment,
    responses(
        (status = 200, description = "Updated counters", body = Title),
        (status = 400, description = "Invalid quantity"),
        (status = 409, description = "Not enough copies to withdraw")
    )
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(title_id): Path<i32>,
    Json(adjustment): Json<StockAdjustment>,
) -> AppResult<Json<Title>> {
    let circulation = &state.services.circulation;
    let actor = user.actor();
    let title = match adjustment.operation {
        StockOperation::Restock => {
            circulation
                .restock(&actor, title_id, adjustment.pool, adjustment.quantity)
                .await?
        }
        StockOperation::Withdraw => {
            circulation
                .withdraw(&actor, title_id, adjustment.pool, adjustment.quantity)
                .await?
        }
    };
    Ok(Json(title))
}

/// Waiting list of a title, head first
#[utoipa::path(
    get,
    path = "/titles/{id}/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Title ID")),
    responses(
        (status = 200, description = "Active reservations", body = Vec<Reservation>),
        (status = 403, description = "Staff only"),
        (status = 404, description = "Title not found")
    )
)]
pub async fn list_queue(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(title_id): Path<i32>,
) -> AppResult<Json<Vec<Reservation>>> {
    let queue = state
        .services
        .circulation
        .queue(&user.actor(), title_id)
        .await?;
    Ok(Json(queue))
}

/// Join the waiting list
#[utoipa::path(
    post,
    path = "/titles/{id}/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Title ID")),
    responses(
        (status = 201, description = "Reservation created", body = Reservation),
        (status = 409, description = "Open loan or reservation already exists")
    )
)]
pub async fn enroll_reservation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(title_id): Path<i32>,
) -> AppResult<(StatusCode, Json<Reservation>)> {
    let reservation = state
        .services
        .circulation
        .enroll_reservation(&user.actor(), title_id)
        .await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// Recompute expected-available dates
#[utoipa::path(
    post,
    path = "/titles/{id}/reservations/refresh",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Title ID")),
    responses(
        (status = 200, description = "Refreshed reservations", body = Vec<Reservation>),
        (status = 403, description = "Staff only")
    )
)]
pub async fn refresh_estimates(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(title_id): Path<i32>,
) -> AppResult<Json<Vec<Reservation>>> {
    let queue = state
        .services
        .circulation
        .refresh_estimates(&user.actor(), title_id)
        .await?;
    Ok(Json(queue))
}
