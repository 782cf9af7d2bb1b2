//! In-memory circulation store
//!
//! Provides the same interface as the Postgres repository. Each title has its
//! own async mutex; a unit of work holds it while working on a private copy of
//! the title's rows, which is written back on commit.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::{CirculationStore, TitleUnit};
use crate::{
    error::{AppError, AppResult},
    models::{
        CreateTitle, Loan, NewLoan, NewReservation, Reservation, StockPool, Title, UserContact,
    },
};

#[derive(Debug, Default)]
struct Tables {
    titles: BTreeMap<i32, Title>,
    loans: BTreeMap<i32, Loan>,
    reservations: BTreeMap<i32, Reservation>,
    users: BTreeMap<i32, UserContact>,
    last_title_id: i32,
    last_loan_id: i32,
    last_reservation_id: i32,
}

/// In-memory store for tests and `database.url = "memory"` runs
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    title_locks: Arc<Mutex<HashMap<i32, Arc<Mutex<()>>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register contact details for a user
    pub async fn insert_user(&self, contact: UserContact) {
        self.tables.write().await.users.insert(contact.id, contact);
    }

    /// Titles are never deleted, so only existing ids get a lock entry
    async fn lock_title(&self, title_id: i32) -> AppResult<OwnedMutexGuard<()>> {
        if !self.tables.read().await.titles.contains_key(&title_id) {
            return Err(title_not_found(title_id));
        }
        let lock = self
            .title_locks
            .lock()
            .await
            .entry(title_id)
            .or_default()
            .clone();
        Ok(lock.lock_owned().await)
    }
}

fn title_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Title with id {} not found", id))
}

fn loan_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Loan with id {} not found", id))
}

fn reservation_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Reservation with id {} not found", id))
}

#[async_trait]
impl CirculationStore for InMemoryStore {
    async fn begin(&self, title_id: i32) -> AppResult<Box<dyn TitleUnit>> {
        let guard = self.lock_title(title_id).await?;

        let tables = self.tables.read().await;
        let title = tables
            .titles
            .get(&title_id)
            .cloned()
            .ok_or_else(|| title_not_found(title_id))?;
        let loans = tables
            .loans
            .values()
            .filter(|l| l.title_id == title_id)
            .map(|l| (l.id, l.clone()))
            .collect();
        let reservations = tables
            .reservations
            .values()
            .filter(|r| r.title_id == title_id)
            .map(|r| (r.id, r.clone()))
            .collect();
        drop(tables);

        Ok(Box::new(MemoryUnit {
            _guard: guard,
            tables: Arc::clone(&self.tables),
            title,
            loans,
            reservations,
        }))
    }

    async fn create_title(&self, data: &CreateTitle) -> AppResult<Title> {
        let mut tables = self.tables.write().await;
        tables.last_title_id += 1;
        let title = Title {
            id: tables.last_title_id,
            name: data.name.clone(),
            stock_for_sale: data.stock_for_sale,
            stock_for_loan: data.stock_for_loan,
            total_stock: data.stock_for_sale + data.stock_for_loan,
            borrowable: data.borrowable,
        };
        tables.titles.insert(title.id, title.clone());
        Ok(title)
    }

    async fn get_title(&self, id: i32) -> AppResult<Title> {
        self.tables
            .read()
            .await
            .titles
            .get(&id)
            .cloned()
            .ok_or_else(|| title_not_found(id))
    }

    async fn get_loan(&self, id: i32) -> AppResult<Loan> {
        self.tables
            .read()
            .await
            .loans
            .get(&id)
            .cloned()
            .ok_or_else(|| loan_not_found(id))
    }

    async fn get_reservation(&self, id: i32) -> AppResult<Reservation> {
        self.tables
            .read()
            .await
            .reservations
            .get(&id)
            .cloned()
            .ok_or_else(|| reservation_not_found(id))
    }

    async fn user_loans(&self, user_id: i32) -> AppResult<Vec<Loan>> {
        let tables = self.tables.read().await;
        let mut loans: Vec<Loan> = tables
            .loans
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        loans.sort_by(|a, b| b.requested_at.cmp(&a.requested_at).then(b.id.cmp(&a.id)));
        Ok(loans)
    }

    async fn title_queue(&self, title_id: i32) -> AppResult<Vec<Reservation>> {
        let tables = self.tables.read().await;
        let mut queue: Vec<Reservation> = tables
            .reservations
            .values()
            .filter(|r| r.title_id == title_id && r.active)
            .cloned()
            .collect();
        queue.sort_by_key(|r| (r.position, r.id));
        Ok(queue)
    }

    async fn overdue_candidates(&self, now: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        let tables = self.tables.read().await;
        let mut loans: Vec<Loan> = tables
            .loans
            .values()
            .filter(|l| l.is_overdue_at(now))
            .cloned()
            .collect();
        loans.sort_by_key(|l| (l.due_date, l.id));
        Ok(loans)
    }

    async fn reminder_candidates(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<Loan>> {
        let tables = self.tables.read().await;
        let mut loans: Vec<Loan> = tables
            .loans
            .values()
            .filter(|l| {
                l.status == crate::models::LoanStatus::Active
                    && l.reminded_at.is_none()
                    && l.due_date.is_some_and(|due| due >= now && due <= until)
            })
            .cloned()
            .collect();
        loans.sort_by_key(|l| (l.due_date, l.id));
        Ok(loans)
    }

    async fn user_contact(&self, user_id: i32) -> AppResult<Option<UserContact>> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Staged copy of one title's rows, guarded by the title lock
struct MemoryUnit {
    _guard: OwnedMutexGuard<()>,
    tables: Arc<RwLock<Tables>>,
    title: Title,
    loans: BTreeMap<i32, Loan>,
    reservations: BTreeMap<i32, Reservation>,
}

#[async_trait]
impl TitleUnit for MemoryUnit {
    fn title_id(&self) -> i32 {
        self.title.id
    }

    async fn title(&mut self) -> AppResult<Title> {
        Ok(self.title.clone())
    }

    async fn apply_stock_delta(&mut self, pool: StockPool, delta: i32) -> AppResult<Option<Title>> {
        let updated = self.title.with_stock_delta(pool, delta);
        if let Some(title) = &updated {
            self.title = title.clone();
        }
        Ok(updated)
    }

    async fn loan(&mut self, id: i32) -> AppResult<Loan> {
        self.loans.get(&id).cloned().ok_or_else(|| loan_not_found(id))
    }

    async fn open_loans(&mut self) -> AppResult<Vec<Loan>> {
        let mut loans: Vec<Loan> = self
            .loans
            .values()
            .filter(|l| l.status.is_open())
            .cloned()
            .collect();
        loans.sort_by_key(|l| (l.requested_at, l.id));
        Ok(loans)
    }

    async fn insert_loan(&mut self, loan: NewLoan) -> AppResult<Loan> {
        let id = {
            let mut tables = self.tables.write().await;
            tables.last_loan_id += 1;
            tables.last_loan_id
        };
        let loan = loan.into_loan(id);
        self.loans.insert(id, loan.clone());
        Ok(loan)
    }

    async fn save_loan(&mut self, loan: &Loan) -> AppResult<()> {
        match self.loans.get_mut(&loan.id) {
            Some(existing) => {
                *existing = loan.clone();
                Ok(())
            }
            None => Err(loan_not_found(loan.id)),
        }
    }

    async fn reservation(&mut self, id: i32) -> AppResult<Reservation> {
        self.reservations
            .get(&id)
            .cloned()
            .ok_or_else(|| reservation_not_found(id))
    }

    async fn active_reservations(&mut self) -> AppResult<Vec<Reservation>> {
        let mut queue: Vec<Reservation> = self
            .reservations
            .values()
            .filter(|r| r.active)
            .cloned()
            .collect();
        queue.sort_by_key(|r| (r.position, r.id));
        Ok(queue)
    }

    async fn insert_reservation(&mut self, reservation: NewReservation) -> AppResult<Reservation> {
        let id = {
            let mut tables = self.tables.write().await;
            tables.last_reservation_id += 1;
            tables.last_reservation_id
        };
        let reservation = reservation.into_reservation(id);
        self.reservations.insert(id, reservation.clone());
        Ok(reservation)
    }

    async fn save_reservation(&mut self, reservation: &Reservation) -> AppResult<()> {
        match self.reservations.get_mut(&reservation.id) {
            Some(existing) => {
                *existing = reservation.clone();
                Ok(())
            }
            None => Err(reservation_not_found(reservation.id)),
        }
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryUnit {
            _guard,
            tables,
            title,
            loans,
            reservations,
        } = *self;

        let mut tables = tables.write().await;
        tables.titles.insert(title.id, title);
        tables.loans.extend(loans);
        tables.reservations.extend(reservations);
        Ok(())
    }
}
