//! Repository layer for circulation data
//!
//! Every mutation happens inside a [`TitleUnit`]: a unit of work that holds
//! the exclusive lock on one title until it is committed or dropped. Dropping
//! a unit without committing discards everything staged in it.

pub mod memory;
pub mod postgres;

mod loans;
mod reservations;
mod titles;
mod users;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{
        CreateTitle, Loan, NewLoan, NewReservation, Reservation, StockPool, Title, UserContact,
    },
};

pub use memory::InMemoryStore;
pub use postgres::Repository;

/// Storage for titles, loans and reservations
#[async_trait]
pub trait CirculationStore: Send + Sync {
    /// Open a unit of work holding the exclusive lock on `title_id`
    async fn begin(&self, title_id: i32) -> AppResult<Box<dyn TitleUnit>>;

    async fn create_title(&self, data: &CreateTitle) -> AppResult<Title>;

    async fn get_title(&self, id: i32) -> AppResult<Title>;

    async fn get_loan(&self, id: i32) -> AppResult<Loan>;

    async fn get_reservation(&self, id: i32) -> AppResult<Reservation>;

    /// All loans of a user, most recent request first
    async fn user_loans(&self, user_id: i32) -> AppResult<Vec<Loan>>;

    /// Active reservations of a title ordered by position
    async fn title_queue(&self, title_id: i32) -> AppResult<Vec<Reservation>>;

    /// Active loans whose due date is before `now`
    async fn overdue_candidates(&self, now: DateTime<Utc>) -> AppResult<Vec<Loan>>;

    /// Active, not yet reminded loans due in `[now, until]`
    async fn reminder_candidates(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<Loan>>;

    async fn user_contact(&self, user_id: i32) -> AppResult<Option<UserContact>>;

    /// Connectivity check for readiness probes
    async fn ping(&self) -> AppResult<()>;
}

/// Unit of work scoped to one title
#[async_trait]
pub trait TitleUnit: Send {
    fn title_id(&self) -> i32;

    async fn title(&mut self) -> AppResult<Title>;

    /// Guarded counter update: returns `None` and changes nothing when the
    /// pool would go negative. Only the stock ledger calls this.
    async fn apply_stock_delta(&mut self, pool: StockPool, delta: i32) -> AppResult<Option<Title>>;

    /// Loan of this title
    async fn loan(&mut self, id: i32) -> AppResult<Loan>;

    /// Loans of this title that are neither returned nor cancelled
    async fn open_loans(&mut self) -> AppResult<Vec<Loan>>;

    async fn insert_loan(&mut self, loan: NewLoan) -> AppResult<Loan>;

    async fn save_loan(&mut self, loan: &Loan) -> AppResult<()>;

    /// Reservation of this title
    async fn reservation(&mut self, id: i32) -> AppResult<Reservation>;

    /// Active reservations ordered by position, then id
    async fn active_reservations(&mut self) -> AppResult<Vec<Reservation>>;

    async fn insert_reservation(&mut self, reservation: NewReservation) -> AppResult<Reservation>;

    async fn save_reservation(&mut self, reservation: &Reservation) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
