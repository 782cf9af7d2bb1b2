//! Stock ledger: the only writer of a title's stock counters

use crate::{
    error::{AppError, AppResult},
    models::{StockPool, Title},
    repository::TitleUnit,
};

pub struct StockLedger;

impl StockLedger {
    /// Take `n` copies out of `pool`; fails without touching the counters if
    /// fewer than `n` remain
    pub async fn decrement(unit: &mut dyn TitleUnit, pool: StockPool, n: i32) -> AppResult<Title> {
        let title_id = unit.title_id();
        let delta = checked_quantity(n)?
            .checked_neg()
            .ok_or_else(|| AppError::Validation(format!("Invalid stock quantity {}", n)))?;

        match unit.apply_stock_delta(pool, delta).await? {
            Some(title) => {
                tracing::debug!(title_id, pool = %pool, n, remaining = title.stock(pool), "Stock decremented");
                Ok(title)
            }
            None => {
                tracing::info!(title_id, pool = %pool, n, "Stock decrement refused");
                Err(AppError::InsufficientStock { title_id, pool })
            }
        }
    }

    /// Put `n` copies back into `pool`
    pub async fn increment(unit: &mut dyn TitleUnit, pool: StockPool, n: i32) -> AppResult<Title> {
        let title_id = unit.title_id();
        let delta = checked_quantity(n)?;
        let current = unit.title().await?;
        if current.stock(pool).checked_add(delta).is_none()
            || current.total_stock.checked_add(delta).is_none()
        {
            return Err(AppError::Validation(format!(
                "Adding {} copies would overflow the {} stock of title {}",
                n, pool, title_id
            )));
        }

        let title = unit
            .apply_stock_delta(pool, delta)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Stock overflow on title {}", title_id)))?;
        tracing::debug!(title_id, pool = %pool, n, remaining = title.stock(pool), "Stock incremented");
        Ok(title)
    }
}

fn checked_quantity(n: i32) -> AppResult<i32> {
    if n > 0 {
        Ok(n)
    } else {
        Err(AppError::Validation(format!(
            "Stock quantity must be positive, got {}",
            n
        )))
    }
}
