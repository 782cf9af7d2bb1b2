//! Loans table queries

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;

use crate::{
    error::AppResult,
    models::{Loan, NewLoan},
};

pub(super) async fn find<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<Option<Loan>> {
    let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(loan)
}

pub(super) async fn find_for_title<'e, E: PgExecutor<'e>>(
    executor: E,
    title_id: i32,
    id: i32,
) -> AppResult<Option<Loan>> {
    let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 AND title_id = $2")
        .bind(id)
        .bind(title_id)
        .fetch_optional(executor)
        .await?;
    Ok(loan)
}

pub(super) async fn open_for_title<'e, E: PgExecutor<'e>>(
    executor: E,
    title_id: i32,
) -> AppResult<Vec<Loan>> {
    let loans = sqlx::query_as::<_, Loan>(
        r#"
        SELECT * FROM loans
        WHERE title_id = $1 AND status NOT IN ('returned', 'cancelled')
        ORDER BY requested_at, id
        "#,
    )
    .bind(title_id)
    .fetch_all(executor)
    .await?;
    Ok(loans)
}

pub(super) async fn for_user<'e, E: PgExecutor<'e>>(executor: E, user_id: i32) -> AppResult<Vec<Loan>> {
    let loans = sqlx::query_as::<_, Loan>(
        "SELECT * FROM loans WHERE user_id = $1 ORDER BY requested_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;
    Ok(loans)
}

pub(super) async fn insert<'e, E: PgExecutor<'e>>(executor: E, loan: &NewLoan) -> AppResult<Loan> {
    let loan = sqlx::query_as::<_, Loan>(
        r#"
        INSERT INTO loans (
            title_id, user_id, status, requested_at,
            approved_at, approved_by, due_date, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(loan.title_id)
    .bind(loan.user_id)
    .bind(loan.status)
    .bind(loan.requested_at)
    .bind(loan.approved_at)
    .bind(loan.approved_by)
    .bind(loan.due_date)
    .bind(&loan.notes)
    .fetch_one(executor)
    .await?;
    Ok(loan)
}

pub(super) async fn update<'e, E: PgExecutor<'e>>(executor: E, loan: &Loan) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE loans SET
            status = $2, approved_at = $3, approved_by = $4, loan_start_date = $5,
            due_date = $6, returned_at = $7, cancelled_at = $8, notes = $9,
            extensions = $10, reminded_at = $11
        WHERE id = $1
        "#,
    )
    .bind(loan.id)
    .bind(loan.status)
    .bind(loan.approved_at)
    .bind(loan.approved_by)
    .bind(loan.loan_start_date)
    .bind(loan.due_date)
    .bind(loan.returned_at)
    .bind(loan.cancelled_at)
    .bind(&loan.notes)
    .bind(loan.extensions)
    .bind(loan.reminded_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub(super) async fn overdue_candidates<'e, E: PgExecutor<'e>>(
    executor: E,
    now: DateTime<Utc>,
) -> AppResult<Vec<Loan>> {
    let loans = sqlx::query_as::<_, Loan>(
        "SELECT * FROM loans WHERE status = 'active' AND due_date < $1 ORDER BY due_date, id",
    )
    .bind(now)
    .fetch_all(executor)
    .await?;
    Ok(loans)
}

pub(super) async fn reminder_candidates<'e, E: PgExecutor<'e>>(
    executor: E,
    now: DateTime<Utc>,
    until: DateTime<Utc>,
) -> AppResult<Vec<Loan>> {
    let loans = sqlx::query_as::<_, Loan>(
        r#"
        SELECT * FROM loans
        WHERE status = 'active' AND reminded_at IS NULL
          AND due_date >= $1 AND due_date <= $2
        ORDER BY due_date, id
        "#,
    )
    .bind(now)
    .bind(until)
    .fetch_all(executor)
    .await?;
    Ok(loans)
}
