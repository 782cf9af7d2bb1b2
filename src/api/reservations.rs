//! Reservation (waiting list) endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{Loan, Reservation},
    AppState,
};

use super::AuthenticatedUser;

/// Queue change after a reservation left the waiting list
#[derive(Serialize, ToSchema)]
pub struct QueueChangeResponse {
    pub reservation: Reservation,
    /// Remaining reservations whose position changed
    pub moved: Vec<Reservation>,
}

/// Loan created from the head of a waiting list
#[derive(Serialize, ToSchema)]
pub struct ConversionResponse {
    pub loan: Loan,
    pub reservation: Reservation,
    pub moved: Vec<Reservation>,
}

/// Get a reservation
#[utoipa::path(
    get,
    path = "/reservations/{id}",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation", body = Reservation),
        (status = 403, description = "Not the member"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(reservation_id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    let reservation = state
        .services
        .circulation
        .reservation(&user.actor(), reservation_id)
        .await?;
    Ok(Json(reservation))
}

/// Leave the waiting list
#[utoipa::path(
    post,
    path = "/reservations/{id}/cancel",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation cancelled", body = QueueChangeResponse),
        (status = 422, description = "Reservation already inactive")
    )
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(reservation_id): Path<i32>,
) -> AppResult<Json<QueueChangeResponse>> {
    let removal = state
        .services
        .circulation
        .cancel_reservation(&user.actor(), reservation_id)
        .await?;
    Ok(Json(QueueChangeResponse {
        reservation: removal.reservation,
        moved: removal.moved,
    }))
}

/// Move a reservation one place up
#[utoipa::path(
    post,
    path = "/reservations/{id}/promote",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservations whose position changed", body = Vec<Reservation>),
        (status = 422, description = "Already at the head or inactive")
    )
)]
pub async fn promote_reservation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(reservation_id): Path<i32>,
) -> AppResult<Json<Vec<Reservation>>> {
    let changed = state
        .services
        .circulation
        .promote_reservation(&user.actor(), reservation_id)
        .await?;
    Ok(Json(changed))
}

/// Turn the head of the queue into an approved loan
#[utoipa::path(
    post,
    path = "/reservations/{id}/convert",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 201, description = "Loan created", body = ConversionResponse),
        (status = 409, description = "Not the queue head or no copy left")
    )
)]
pub async fn convert_reservation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(reservation_id): Path<i32>,
) -> AppResult<(StatusCode, Json<ConversionResponse>)> {
    let conversion = state
        .services
        .circulation
        .convert_reservation_to_loan(&user.actor(), reservation_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ConversionResponse {
            loan: conversion.loan,
            reservation: conversion.reservation,
            moved: conversion.moved,
        }),
    ))
}

/// Tell the member a copy is waiting
#[utoipa::path(
    post,
    path = "/reservations/{id}/notify",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Member notified", body = Reservation),
        (status = 422, description = "Reservation inactive")
    )
)]
pub async fn notify_reservation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(reservation_id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    let reservation = state
        .services
        .circulation
        .notify_reservation(&user.actor(), reservation_id)
        .await?;
    Ok(Json(reservation))
}
