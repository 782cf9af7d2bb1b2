//! Reservation (waiting list entry) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Reservation model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reservation {
    pub id: i32,
    pub title_id: i32,
    pub user_id: i32,
    pub requested_at: DateTime<Utc>,
    /// 0 is next in line; only meaningful while active
    pub position: i32,
    pub active: bool,
    pub notified_at: Option<DateTime<Utc>>,
    pub expected_available_date: Option<DateTime<Utc>>,
}

/// Values for inserting a reservation row
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub title_id: i32,
    pub user_id: i32,
    pub requested_at: DateTime<Utc>,
    pub position: i32,
    pub expected_available_date: Option<DateTime<Utc>>,
}

impl NewReservation {
    pub(crate) fn into_reservation(self, id: i32) -> Reservation {
        Reservation {
            id,
            title_id: self.title_id,
            user_id: self.user_id,
            requested_at: self.requested_at,
            position: self.position,
            active: true,
            notified_at: None,
            expected_available_date: self.expected_available_date,
        }
    }
}
