//! Titles table queries

use sqlx::PgExecutor;

use crate::{
    error::AppResult,
    models::{CreateTitle, StockPool, Title},
};

pub(super) async fn create<'e, E: PgExecutor<'e>>(executor: E, data: &CreateTitle) -> AppResult<Title> {
    let title = sqlx::query_as::<_, Title>(
        r#"
        INSERT INTO titles (name, stock_for_sale, stock_for_loan, total_stock, borrowable)
        VALUES ($1, $2, $3, $2 + $3, $4)
        RETURNING *
        "#,
    )
    .bind(&data.name)
    .bind(data.stock_for_sale)
    .bind(data.stock_for_loan)
    .bind(data.borrowable)
    .fetch_one(executor)
    .await?;
    Ok(title)
}

pub(super) async fn find<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<Option<Title>> {
    let title = sqlx::query_as::<_, Title>("SELECT * FROM titles WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(title)
}

/// Row-lock the title for the rest of the transaction
pub(super) async fn lock<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<Option<Title>> {
    let title = sqlx::query_as::<_, Title>("SELECT * FROM titles WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(title)
}

/// Guarded update: no row is touched when the pool would go negative
pub(super) async fn apply_stock_delta<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i32,
    pool: StockPool,
    delta: i32,
) -> AppResult<Option<Title>> {
    let column = pool.column();
    let query = format!(
        r#"
        UPDATE titles
        SET {column} = {column} + $2,
            total_stock = stock_for_sale + stock_for_loan + $2
        WHERE id = $1 AND {column} + $2 >= 0
        RETURNING *
        "#,
        column = column
    );

    let title = sqlx::query_as::<_, Title>(&query)
        .bind(id)
        .bind(delta)
        .fetch_optional(executor)
        .await?;
    Ok(title)
}
