//! Title (book) model and stock pools

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// The two independent stock pools of a title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StockPool {
    Sale,
    Loan,
}

impl StockPool {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockPool::Sale => "sale",
            StockPool::Loan => "loan",
        }
    }

    /// Column holding this pool's counter
    pub(crate) fn column(&self) -> &'static str {
        match self {
            StockPool::Sale => "stock_for_sale",
            StockPool::Loan => "stock_for_loan",
        }
    }
}

impl std::fmt::Display for StockPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Title model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Title {
    pub id: i32,
    pub name: String,
    pub stock_for_sale: i32,
    pub stock_for_loan: i32,
    /// Always `stock_for_sale + stock_for_loan`, kept for reporting
    pub total_stock: i32,
    pub borrowable: bool,
}

impl Title {
    pub fn stock(&self, pool: StockPool) -> i32 {
        match pool {
            StockPool::Sale => self.stock_for_sale,
            StockPool::Loan => self.stock_for_loan,
        }
    }

    /// Counters after applying `delta` to `pool`, or `None` if a counter would go negative
    pub fn with_stock_delta(&self, pool: StockPool, delta: i32) -> Option<Title> {
        let updated = self.stock(pool).checked_add(delta).filter(|v| *v >= 0)?;
        let mut title = self.clone();
        match pool {
            StockPool::Sale => title.stock_for_sale = updated,
            StockPool::Loan => title.stock_for_loan = updated,
        }
        title.total_stock = title.stock_for_sale.checked_add(title.stock_for_loan)?;
        Some(title)
    }
}

/// Create title request (catalog seeding and tests)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateTitle {
    #[validate(length(min = 1, message = "Title name is required"))]
    pub name: String,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock_for_sale: i32,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock_for_loan: i32,
    pub borrowable: bool,
}

impl CreateTitle {
    pub fn borrowable(name: &str, stock_for_loan: i32) -> Self {
        Self {
            name: name.to_string(),
            stock_for_sale: 0,
            stock_for_loan,
            borrowable: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title(sale: i32, loan: i32) -> Title {
        Title {
            id: 1,
            name: "Dune".to_string(),
            stock_for_sale: sale,
            stock_for_loan: loan,
            total_stock: sale + loan,
            borrowable: true,
        }
    }

    #[test]
    fn test_delta_recomputes_total() {
        let t = title(2, 1).with_stock_delta(StockPool::Sale, 3).unwrap();
        assert_eq!(t.stock_for_sale, 5);
        assert_eq!(t.stock_for_loan, 1);
        assert_eq!(t.total_stock, 6);
    }

    #[test]
    fn test_delta_never_negative() {
        assert!(title(0, 1).with_stock_delta(StockPool::Loan, -2).is_none());
        assert!(title(0, 1).with_stock_delta(StockPool::Sale, -1).is_none());

        let t = title(0, 1).with_stock_delta(StockPool::Loan, -1).unwrap();
        assert_eq!(t.stock_for_loan, 0);
        assert_eq!(t.total_stock, 0);
    }
}
