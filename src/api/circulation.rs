//! On-demand runs of the scheduled circulation passes

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{circulation::PassReport, error::AppResult, AppState};

use super::AuthenticatedUser;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReminderQuery {
    /// Reminder window in days; the configured default when absent
    pub days: Option<i64>,
}

/// Flag overdue loans now
#[utoipa::path(
    post,
    path = "/circulation/sweep",
    tag = "circulation",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep report", body = PassReport),
        (status = 403, description = "Staff only")
    )
)]
pub async fn sweep_overdue(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<PassReport>> {
    user.actor().require_staff()?;
    let report = state.services.circulation.sweep_overdue().await?;
    Ok(Json(report))
}

/// Send due-soon reminders now
#[utoipa::path(
    post,
    path = "/circulation/reminders",
    tag = "circulation",
    security(("bearer_auth" = [])),
    params(ReminderQuery),
    responses(
        (status = 200, description = "Reminder report", body = PassReport),
        (status = 403, description = "Staff only")
    )
)]
pub async fn remind_due_loans(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ReminderQuery>,
) -> AppResult<Json<PassReport>> {
    user.actor().require_staff()?;
    let days = query
        .days
        .unwrap_or(state.config.circulation.reminder_days);
    let report = state.services.circulation.remind_due_loans(days).await?;
    Ok(Json(report))
}
