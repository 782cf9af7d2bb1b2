//! Reservations table queries

use sqlx::PgExecutor;

use crate::{
    error::AppResult,
    models::{NewReservation, Reservation},
};

pub(super) async fn find<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<Option<Reservation>> {
    let reservation = sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(reservation)
}

pub(super) async fn find_for_title<'e, E: PgExecutor<'e>>(
    executor: E,
    title_id: i32,
    id: i32,
) -> AppResult<Option<Reservation>> {
    let reservation = sqlx::query_as::<_, Reservation>(
        "SELECT * FROM reservations WHERE id = $1 AND title_id = $2",
    )
    .bind(id)
    .bind(title_id)
    .fetch_optional(executor)
    .await?;
    Ok(reservation)
}

pub(super) async fn active_for_title<'e, E: PgExecutor<'e>>(
    executor: E,
    title_id: i32,
) -> AppResult<Vec<Reservation>> {
    let reservations = sqlx::query_as::<_, Reservation>(
        "SELECT * FROM reservations WHERE title_id = $1 AND active ORDER BY position, id",
    )
    .bind(title_id)
    .fetch_all(executor)
    .await?;
    Ok(reservations)
}

pub(super) async fn insert<'e, E: PgExecutor<'e>>(
    executor: E,
    reservation: &NewReservation,
) -> AppResult<Reservation> {
    let reservation = sqlx::query_as::<_, Reservation>(
        r#"
        INSERT INTO reservations (
            title_id, user_id, requested_at, position, active, expected_available_date
        )
        VALUES ($1, $2, $3, $4, TRUE, $5)
        RETURNING *
        "#,
    )
    .bind(reservation.title_id)
    .bind(reservation.user_id)
    .bind(reservation.requested_at)
    .bind(reservation.position)
    .bind(reservation.expected_available_date)
    .fetch_one(executor)
    .await?;
    Ok(reservation)
}

pub(super) async fn update<'e, E: PgExecutor<'e>>(executor: E, reservation: &Reservation) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE reservations SET
            position = $2, active = $3, notified_at = $4, expected_available_date = $5
        WHERE id = $1
        "#,
    )
    .bind(reservation.id)
    .bind(reservation.position)
    .bind(reservation.active)
    .bind(reservation.notified_at)
    .bind(reservation.expected_available_date)
    .execute(executor)
    .await?;
    Ok(())
}
