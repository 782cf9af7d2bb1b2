//! Postgres-backed circulation store
//!
//! A unit of work is a database transaction that starts by taking a row lock
//! on the title (`SELECT ... FOR UPDATE`), so every mutation touching a title's
//! stock, loans or queue is serialized per title.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};

use super::{loans, reservations, titles, users, CirculationStore, TitleUnit};
use crate::{
    error::{AppError, AppResult},
    models::{
        CreateTitle, Loan, NewLoan, NewReservation, Reservation, StockPool, Title, UserContact,
    },
};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CirculationStore for Repository {
    async fn begin(&self, title_id: i32) -> AppResult<Box<dyn TitleUnit>> {
        let mut tx = self.pool.begin().await?;
        titles::lock(&mut *tx, title_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Title with id {} not found", title_id)))?;
        Ok(Box::new(PgUnit { tx, title_id }))
    }

    async fn create_title(&self, data: &CreateTitle) -> AppResult<Title> {
        titles::create(&self.pool, data).await
    }

    async fn get_title(&self, id: i32) -> AppResult<Title> {
        titles::find(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Title with id {} not found", id)))
    }

    async fn get_loan(&self, id: i32) -> AppResult<Loan> {
        loans::find(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn get_reservation(&self, id: i32) -> AppResult<Reservation> {
        reservations::find(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", id)))
    }

    async fn user_loans(&self, user_id: i32) -> AppResult<Vec<Loan>> {
        loans::for_user(&self.pool, user_id).await
    }

    async fn title_queue(&self, title_id: i32) -> AppResult<Vec<Reservation>> {
        reservations::active_for_title(&self.pool, title_id).await
    }

    async fn overdue_candidates(&self, now: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        loans::overdue_candidates(&self.pool, now).await
    }

    async fn reminder_candidates(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<Loan>> {
        loans::reminder_candidates(&self.pool, now, until).await
    }

    async fn user_contact(&self, user_id: i32) -> AppResult<Option<UserContact>> {
        users::find_contact(&self.pool, user_id).await
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Transaction holding the row lock of one title
struct PgUnit {
    tx: Transaction<'static, Postgres>,
    title_id: i32,
}

#[async_trait]
impl TitleUnit for PgUnit {
    fn title_id(&self) -> i32 {
        self.title_id
    }

    async fn title(&mut self) -> AppResult<Title> {
        titles::find(&mut *self.tx, self.title_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Title with id {} not found", self.title_id)))
    }

    async fn apply_stock_delta(&mut self, pool: StockPool, delta: i32) -> AppResult<Option<Title>> {
        titles::apply_stock_delta(&mut *self.tx, self.title_id, pool, delta).await
    }

    async fn loan(&mut self, id: i32) -> AppResult<Loan> {
        loans::find_for_title(&mut *self.tx, self.title_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn open_loans(&mut self) -> AppResult<Vec<Loan>> {
        loans::open_for_title(&mut *self.tx, self.title_id).await
    }

    async fn insert_loan(&mut self, loan: NewLoan) -> AppResult<Loan> {
        loans::insert(&mut *self.tx, &loan).await
    }

    async fn save_loan(&mut self, loan: &Loan) -> AppResult<()> {
        loans::update(&mut *self.tx, loan).await
    }

    async fn reservation(&mut self, id: i32) -> AppResult<Reservation> {
        reservations::find_for_title(&mut *self.tx, self.title_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", id)))
    }

    async fn active_reservations(&mut self) -> AppResult<Vec<Reservation>> {
        reservations::active_for_title(&mut *self.tx, self.title_id).await
    }

    async fn insert_reservation(&mut self, reservation: NewReservation) -> AppResult<Reservation> {
        reservations::insert(&mut *self.tx, &reservation).await
    }

    async fn save_reservation(&mut self, reservation: &Reservation) -> AppResult<()> {
        reservations::update(&mut *self.tx, reservation).await
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let PgUnit { tx, .. } = *self;
        tx.commit().await?;
        Ok(())
    }
}
