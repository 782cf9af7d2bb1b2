//! Circulation coordinator
//!
//! Entry point for every circulation operation. Each call checks the actor's
//! rights, runs the state machine and queue inside one title unit of work,
//! commits, then sends notices. Notice failures are logged and never undo a
//! committed change.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use utoipa::ToSchema;

use super::{
    ledger::StockLedger,
    loan_state::LoanStateMachine,
    queue::{self, Conversion, QueueRemoval, ReservationQueue},
};
use crate::{
    clock::Clock,
    config::CirculationConfig,
    error::{AppError, AppResult},
    models::{
        Actor, CreateTitle, Loan, LoanStatus, NewLoan, Reservation, StockPool, Title,
    },
    repository::{CirculationStore, TitleUnit},
    services::notifications::{CirculationEvent, Notifier},
};

/// Result of a member asking to borrow a title
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoanRequestOutcome {
    /// A copy is available; the request waits for staff approval
    Requested(Loan),
    /// No copy left; the member joined the waiting list
    Queued(Reservation),
}

/// Summary of a scheduled pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct PassReport {
    /// Another pass was already running
    pub skipped: bool,
    pub processed: usize,
    pub failed: usize,
}

impl PassReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

pub struct CirculationCoordinator {
    store: Arc<dyn CirculationStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    loans: LoanStateMachine,
    queue: ReservationQueue,
    sweep_gate: Mutex<()>,
    reminder_gate: Mutex<()>,
}

impl CirculationCoordinator {
    pub fn new(
        store: Arc<dyn CirculationStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: &CirculationConfig,
    ) -> Self {
        let period = Duration::try_days(config.loan_period_days).unwrap_or_else(|| {
            tracing::warn!(
                loan_period_days = config.loan_period_days,
                "Loan period out of range, using default"
            );
            Duration::days(CirculationConfig::default().loan_period_days)
        });
        Self {
            store,
            notifier,
            clock,
            loans: LoanStateMachine::new(period, config.max_extensions),
            queue: ReservationQueue::new(period),
            sweep_gate: Mutex::new(()),
            reminder_gate: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn CirculationStore> {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ---- Titles and stock ----

    pub async fn create_title(&self, actor: &Actor, data: &CreateTitle) -> AppResult<Title> {
        actor.require_staff()?;
        let title = self.store.create_title(data).await?;
        tracing::info!(title_id = title.id, name = %title.name, "Title created");
        Ok(title)
    }

    pub async fn title(&self, title_id: i32) -> AppResult<Title> {
        self.store.get_title(title_id).await
    }

    /// Put copies into a pool. Notifies the queue head when loan stock was empty.
    pub async fn restock(
        &self,
        actor: &Actor,
        title_id: i32,
        pool: StockPool,
        n: i32,
    ) -> AppResult<Title> {
        actor.require_staff()?;
        let now = self.now();
        let mut unit = self.store.begin(title_id).await?;

        let before = unit.title().await?.stock(pool);
        let title = StockLedger::increment(unit.as_mut(), pool, n).await?;
        let head = if pool == StockPool::Loan && before == 0 {
            self.queue.notify_head(unit.as_mut(), now).await?
        } else {
            None
        };
        unit.commit().await?;

        tracing::info!(title_id, pool = %pool, n, "Stock added");
        self.dispatch(head.iter().map(available)).await;
        Ok(title)
    }

    /// Take copies out of a pool (sale, damage, inventory correction)
    pub async fn withdraw(
        &self,
        actor: &Actor,
        title_id: i32,
        pool: StockPool,
        n: i32,
    ) -> AppResult<Title> {
        actor.require_staff()?;
        let mut unit = self.store.begin(title_id).await?;
        let title = StockLedger::decrement(unit.as_mut(), pool, n).await?;
        unit.commit().await?;

        tracing::info!(title_id, pool = %pool, n, "Stock withdrawn");
        Ok(title)
    }

    // ---- Loans ----

    /// Member borrow request: a pending loan when a copy is free, otherwise a
    /// place in the waiting list
    pub async fn request_loan(
        &self,
        actor: &Actor,
        title_id: i32,
        notes: Option<String>,
    ) -> AppResult<LoanRequestOutcome> {
        let now = self.now();
        let mut unit = self.store.begin(title_id).await?;

        let title = unit.title().await?;
        if !title.borrowable {
            return Err(AppError::InvalidOperation(format!(
                "Title {} is not available for loan",
                title_id
            )));
        }
        queue::ensure_no_open_request(unit.as_mut(), actor.user_id).await?;

        let outcome = if title.stock_for_loan > 0 {
            let loan = unit
                .insert_loan(NewLoan::requested(title_id, actor.user_id, now, notes))
                .await?;
            tracing::info!(loan_id = loan.id, title_id, user_id = actor.user_id, "Loan requested");
            LoanRequestOutcome::Requested(loan)
        } else {
            LoanRequestOutcome::Queued(self.queue.enroll(unit.as_mut(), actor.user_id, now).await?)
        };

        unit.commit().await?;
        Ok(outcome)
    }

    pub async fn loan(&self, actor: &Actor, loan_id: i32) -> AppResult<Loan> {
        let loan = self.store.get_loan(loan_id).await?;
        actor.require_owner_or_staff(loan.user_id)?;
        Ok(loan)
    }

    pub async fn user_loans(&self, actor: &Actor, user_id: i32) -> AppResult<Vec<Loan>> {
        actor.require_owner_or_staff(user_id)?;
        self.store.user_loans(user_id).await
    }

    pub async fn approve_loan(&self, actor: &Actor, loan_id: i32) -> AppResult<Loan> {
        actor.require_staff()?;
        let now = self.now();
        let (mut unit, mut loan) = self.open_loan(loan_id).await?;

        self.loans
            .approve(unit.as_mut(), &mut loan, actor.user_id, now)
            .await?;
        unit.commit().await?;

        self.dispatch([approved(&loan)]).await;
        Ok(loan)
    }

    pub async fn reject_loan(
        &self,
        actor: &Actor,
        loan_id: i32,
        reason: Option<String>,
    ) -> AppResult<Loan> {
        actor.require_staff()?;
        let now = self.now();
        let (mut unit, mut loan) = self.open_loan(loan_id).await?;

        self.loans
            .reject(unit.as_mut(), &mut loan, reason.as_deref(), now)
            .await?;
        unit.commit().await?;

        self.dispatch([CirculationEvent::LoanRejected {
            loan_id: loan.id,
            user_id: loan.user_id,
            title_id: loan.title_id,
            reason,
        }])
        .await;
        Ok(loan)
    }

    pub async fn activate_loan(&self, actor: &Actor, loan_id: i32) -> AppResult<Loan> {
        actor.require_staff()?;
        let now = self.now();
        let (mut unit, mut loan) = self.open_loan(loan_id).await?;

        self.loans.activate(unit.as_mut(), &mut loan, now).await?;
        unit.commit().await?;
        Ok(loan)
    }

    pub async fn return_loan(&self, actor: &Actor, loan_id: i32) -> AppResult<Loan> {
        let now = self.now();
        let (mut unit, mut loan) = self.open_loan(loan_id).await?;
        actor.require_owner_or_staff(loan.user_id)?;

        self.loans.return_loan(unit.as_mut(), &mut loan, now).await?;
        let head = self.queue.notify_head(unit.as_mut(), now).await?;
        unit.commit().await?;

        self.dispatch(head.iter().map(available)).await;
        Ok(loan)
    }

    pub async fn cancel_loan(&self, actor: &Actor, loan_id: i32) -> AppResult<Loan> {
        let now = self.now();
        let (mut unit, mut loan) = self.open_loan(loan_id).await?;
        actor.require_owner_or_staff(loan.user_id)?;

        let restocked = self.loans.cancel(unit.as_mut(), &mut loan, now).await?;
        let head = if restocked {
            self.queue.notify_head(unit.as_mut(), now).await?
        } else {
            None
        };
        unit.commit().await?;

        self.dispatch(head.iter().map(available)).await;
        Ok(loan)
    }

    /// Reinstate an overdue loan for another loan period
    pub async fn extend_loan(&self, actor: &Actor, loan_id: i32) -> AppResult<Loan> {
        actor.require_staff()?;
        let now = self.now();
        let (mut unit, mut loan) = self.open_loan(loan_id).await?;

        self.loans.extend(unit.as_mut(), &mut loan, now).await?;
        unit.commit().await?;
        Ok(loan)
    }

    /// Push the due date of an active loan one period further
    pub async fn renew_loan(&self, actor: &Actor, loan_id: i32) -> AppResult<Loan> {
        let now = self.now();
        let (mut unit, mut loan) = self.open_loan(loan_id).await?;
        actor.require_owner_or_staff(loan.user_id)?;

        self.loans.renew(unit.as_mut(), &mut loan, now).await?;
        unit.commit().await?;
        Ok(loan)
    }

    // ---- Reservations ----

    pub async fn enroll_reservation(&self, actor: &Actor, title_id: i32) -> AppResult<Reservation> {
        let now = self.now();
        let mut unit = self.store.begin(title_id).await?;
        if !unit.title().await?.borrowable {
            return Err(AppError::InvalidOperation(format!(
                "Title {} is not available for loan",
                title_id
            )));
        }

        let mut reservation = self.queue.enroll(unit.as_mut(), actor.user_id, now).await?;
        // copies on the shelf and nobody ahead: the member can come now
        let available_now =
            reservation.position == 0 && unit.title().await?.stock_for_loan > 0;
        if available_now {
            reservation = self.queue.notify(unit.as_mut(), reservation.id, now).await?;
        }
        unit.commit().await?;

        if available_now {
            self.dispatch([available(&reservation)]).await;
        }
        Ok(reservation)
    }

    pub async fn reservation(&self, actor: &Actor, reservation_id: i32) -> AppResult<Reservation> {
        let reservation = self.store.get_reservation(reservation_id).await?;
        actor.require_owner_or_staff(reservation.user_id)?;
        Ok(reservation)
    }

    /// Waiting list of a title, head first
    pub async fn queue(&self, actor: &Actor, title_id: i32) -> AppResult<Vec<Reservation>> {
        actor.require_staff()?;
        self.store.get_title(title_id).await?;
        self.store.title_queue(title_id).await
    }

    pub async fn cancel_reservation(
        &self,
        actor: &Actor,
        reservation_id: i32,
    ) -> AppResult<QueueRemoval> {
        let now = self.now();
        let (mut unit, reservation) = self.open_reservation(reservation_id).await?;
        actor.require_owner_or_staff(reservation.user_id)?;

        let removal = self.queue.cancel(unit.as_mut(), reservation_id, now).await?;
        unit.commit().await?;

        let mut events = vec![CirculationEvent::ReservationCancelled {
            reservation_id,
            user_id: removal.reservation.user_id,
            title_id: removal.reservation.title_id,
        }];
        events.extend(removal.moved.iter().map(position_updated));
        self.dispatch(events).await;
        Ok(removal)
    }

    /// Move a reservation one place up; returns the reservations that moved
    pub async fn promote_reservation(
        &self,
        actor: &Actor,
        reservation_id: i32,
    ) -> AppResult<Vec<Reservation>> {
        actor.require_staff()?;
        let (mut unit, _) = self.open_reservation(reservation_id).await?;

        let changed = self.queue.promote(unit.as_mut(), reservation_id).await?;
        unit.commit().await?;

        self.dispatch(changed.iter().map(position_updated)).await;
        Ok(changed)
    }

    pub async fn convert_reservation_to_loan(
        &self,
        actor: &Actor,
        reservation_id: i32,
    ) -> AppResult<Conversion> {
        actor.require_staff()?;
        let now = self.now();
        let (mut unit, _) = self.open_reservation(reservation_id).await?;

        let conversion = self
            .queue
            .convert_to_loan(unit.as_mut(), reservation_id, actor.user_id, now)
            .await?;
        unit.commit().await?;

        let mut events = vec![approved(&conversion.loan)];
        events.extend(conversion.moved.iter().map(position_updated));
        self.dispatch(events).await;
        Ok(conversion)
    }

    pub async fn notify_reservation(
        &self,
        actor: &Actor,
        reservation_id: i32,
    ) -> AppResult<Reservation> {
        actor.require_staff()?;
        let now = self.now();
        let (mut unit, _) = self.open_reservation(reservation_id).await?;

        let reservation = self.queue.notify(unit.as_mut(), reservation_id, now).await?;
        unit.commit().await?;

        self.dispatch([available(&reservation)]).await;
        Ok(reservation)
    }

    /// Recompute expected-available dates for a whole waiting list
    pub async fn refresh_estimates(
        &self,
        actor: &Actor,
        title_id: i32,
    ) -> AppResult<Vec<Reservation>> {
        actor.require_staff()?;
        let now = self.now();
        let mut unit = self.store.begin(title_id).await?;

        let queue = self.queue.refresh_estimates(unit.as_mut(), now).await?;
        unit.commit().await?;

        tracing::info!(title_id, reservations = queue.len(), "Estimates refreshed");
        Ok(queue)
    }

    // ---- Scheduled passes ----

    /// Flag active loans past their due date. Runs once at a time; a call
    /// made while a pass is in progress returns a skipped report.
    pub async fn sweep_overdue(&self) -> AppResult<PassReport> {
        let Ok(_running) = self.sweep_gate.try_lock() else {
            tracing::debug!("Overdue sweep already running");
            return Ok(PassReport::skipped());
        };

        let now = self.now();
        let mut report = PassReport::default();
        for candidate in self.store.overdue_candidates(now).await? {
            match self.mark_overdue(&candidate, now).await {
                Ok(Some(loan)) => {
                    report.processed += 1;
                    self.dispatch([CirculationEvent::LoanOverdue {
                        loan_id: loan.id,
                        user_id: loan.user_id,
                        title_id: loan.title_id,
                        due_date: loan.due_date,
                    }])
                    .await;
                }
                Ok(None) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(loan_id = candidate.id, error = %e, "Overdue sweep failed for loan");
                }
            }
        }

        tracing::info!(processed = report.processed, failed = report.failed, "Overdue sweep done");
        Ok(report)
    }

    /// Remind members of active loans due within `days`, once per due date
    pub async fn remind_due_loans(&self, days: i64) -> AppResult<PassReport> {
        if days < 0 {
            return Err(AppError::Validation(format!(
                "Reminder window must not be negative, got {}",
                days
            )));
        }
        let now = self.now();
        let until = Duration::try_days(days)
            .and_then(|window| now.checked_add_signed(window))
            .ok_or_else(|| {
                AppError::Validation(format!("Reminder window of {} days is out of range", days))
            })?;
        let Ok(_running) = self.reminder_gate.try_lock() else {
            tracing::debug!("Reminder pass already running");
            return Ok(PassReport::skipped());
        };

        let mut report = PassReport::default();
        for candidate in self.store.reminder_candidates(now, until).await? {
            match self.mark_reminded(&candidate, now, until).await {
                Ok(Some(loan)) => {
                    report.processed += 1;
                    self.dispatch([CirculationEvent::LoanReturnReminder {
                        loan_id: loan.id,
                        user_id: loan.user_id,
                        title_id: loan.title_id,
                        due_date: loan.due_date,
                    }])
                    .await;
                }
                Ok(None) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(loan_id = candidate.id, error = %e, "Reminder failed for loan");
                }
            }
        }

        tracing::info!(processed = report.processed, failed = report.failed, "Reminder pass done");
        Ok(report)
    }

    // ---- helpers ----

    async fn open_loan(&self, loan_id: i32) -> AppResult<(Box<dyn TitleUnit>, Loan)> {
        let title_id = self.store.get_loan(loan_id).await?.title_id;
        let mut unit = self.store.begin(title_id).await?;
        let loan = unit.loan(loan_id).await?;
        Ok((unit, loan))
    }

    async fn open_reservation(
        &self,
        reservation_id: i32,
    ) -> AppResult<(Box<dyn TitleUnit>, Reservation)> {
        let title_id = self.store.get_reservation(reservation_id).await?.title_id;
        let mut unit = self.store.begin(title_id).await?;
        let reservation = unit.reservation(reservation_id).await?;
        Ok((unit, reservation))
    }

    /// `None` when the loan changed since it was listed
    async fn mark_overdue(&self, candidate: &Loan, now: DateTime<Utc>) -> AppResult<Option<Loan>> {
        let mut unit = self.store.begin(candidate.title_id).await?;
        let mut loan = unit.loan(candidate.id).await?;
        if !loan.is_overdue_at(now) {
            return Ok(None);
        }

        self.loans.mark_overdue(unit.as_mut(), &mut loan, now).await?;
        unit.commit().await?;
        Ok(Some(loan))
    }

    async fn mark_reminded(
        &self,
        candidate: &Loan,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Option<Loan>> {
        let mut unit = self.store.begin(candidate.title_id).await?;
        let mut loan = unit.loan(candidate.id).await?;
        let due_soon = loan.due_date.is_some_and(|due| due >= now && due <= until);
        if loan.status != LoanStatus::Active || loan.reminded_at.is_some() || !due_soon {
            return Ok(None);
        }

        loan.reminded_at = Some(now);
        unit.save_loan(&loan).await?;
        unit.commit().await?;
        Ok(Some(loan))
    }

    async fn dispatch(&self, events: impl IntoIterator<Item = CirculationEvent>) {
        for event in events {
            if let Err(e) = self.notifier.notify(&event).await {
                tracing::warn!(
                    event = event.kind(),
                    user_id = event.user_id(),
                    error = %e,
                    "Failed to send circulation notice"
                );
            }
        }
    }
}

fn approved(loan: &Loan) -> CirculationEvent {
    CirculationEvent::LoanApproved {
        loan_id: loan.id,
        user_id: loan.user_id,
        title_id: loan.title_id,
        due_date: loan.due_date,
    }
}

fn available(reservation: &Reservation) -> CirculationEvent {
    CirculationEvent::ReservationAvailable {
        reservation_id: reservation.id,
        user_id: reservation.user_id,
        title_id: reservation.title_id,
    }
}

fn position_updated(reservation: &Reservation) -> CirculationEvent {
    CirculationEvent::ReservationPositionUpdated {
        reservation_id: reservation.id,
        user_id: reservation.user_id,
        title_id: reservation.title_id,
        position: reservation.position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        repository::InMemoryStore,
        services::notifications::MockNotifier,
    };
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    async fn coordinator(
        notifier: MockNotifier,
        stock: i32,
    ) -> (CirculationCoordinator, Arc<ManualClock>, Title) {
        let store = InMemoryStore::new();
        let title = store
            .create_title(&CreateTitle::borrowable("Foundation", stock))
            .await
            .unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let coordinator = CirculationCoordinator::new(
            Arc::new(store),
            Arc::new(notifier),
            clock.clone(),
            &CirculationConfig::default(),
        );
        (coordinator, clock, title)
    }

    #[tokio::test]
    async fn test_approve_sends_notice_after_commit() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|e| matches!(e, CirculationEvent::LoanApproved { user_id: 1, .. }))
            .times(1)
            .returning(|_| Ok(()));
        let (c, _, title) = coordinator(notifier, 1).await;

        let LoanRequestOutcome::Requested(loan) =
            c.request_loan(&Actor::member(1), title.id, None).await.unwrap()
        else {
            panic!("expected a loan request");
        };
        let loan = c.approve_loan(&Actor::staff(50), loan.id).await.unwrap();
        assert_eq!(loan.status, LoanStatus::Approved);
        assert_eq!(c.title(title.id).await.unwrap().stock_for_loan, 0);
    }

    #[tokio::test]
    async fn test_notice_failure_keeps_change() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .returning(|_| Err(AppError::Internal("smtp down".to_string())));
        let (c, _, title) = coordinator(notifier, 1).await;

        let LoanRequestOutcome::Requested(loan) =
            c.request_loan(&Actor::member(1), title.id, None).await.unwrap()
        else {
            panic!("expected a loan request");
        };
        c.approve_loan(&Actor::staff(50), loan.id).await.unwrap();
        assert_eq!(
            c.store().get_loan(loan.id).await.unwrap().status,
            LoanStatus::Approved
        );
    }

    #[tokio::test]
    async fn test_member_cannot_approve_or_touch_others() {
        let (c, _, title) = coordinator(MockNotifier::new(), 1).await;
        let LoanRequestOutcome::Requested(loan) =
            c.request_loan(&Actor::member(1), title.id, None).await.unwrap()
        else {
            panic!("expected a loan request");
        };

        assert!(matches!(
            c.approve_loan(&Actor::member(1), loan.id).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            c.cancel_loan(&Actor::member(2), loan.id).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            c.loan(&Actor::member(2), loan.id).await,
            Err(AppError::Unauthorized(_))
        ));
        // unchanged
        assert_eq!(
            c.loan(&Actor::member(1), loan.id).await.unwrap().status,
            LoanStatus::Requested
        );
    }

    #[tokio::test]
    async fn test_request_queues_when_out_of_stock() {
        let (c, _, title) = coordinator(MockNotifier::new(), 0).await;

        let outcome = c.request_loan(&Actor::member(3), title.id, None).await.unwrap();
        let LoanRequestOutcome::Queued(reservation) = outcome else {
            panic!("expected a reservation");
        };
        assert_eq!(reservation.position, 0);

        assert!(matches!(
            c.request_loan(&Actor::member(3), title.id, None).await,
            Err(AppError::DuplicateRequest { user_id: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_request_unborrowable_title() {
        let store = InMemoryStore::new();
        let title = store
            .create_title(&CreateTitle {
                name: "Atlas".to_string(),
                stock_for_sale: 3,
                stock_for_loan: 0,
                borrowable: false,
            })
            .await
            .unwrap();
        let c = CirculationCoordinator::new(
            Arc::new(store),
            Arc::new(MockNotifier::new()),
            Arc::new(ManualClock::new(t0())),
            &CirculationConfig::default(),
        );

        assert!(matches!(
            c.request_loan(&Actor::member(1), title.id, None).await,
            Err(AppError::InvalidOperation(_))
        ));
        assert!(matches!(
            c.request_loan(&Actor::member(1), title.id + 1, None).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_restock_from_empty_notifies_head() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|e| matches!(e, CirculationEvent::ReservationAvailable { user_id: 8, .. }))
            .times(1)
            .returning(|_| Ok(()));
        let (c, _, title) = coordinator(notifier, 0).await;

        let reservation = c.enroll_reservation(&Actor::member(8), title.id).await.unwrap();
        let updated = c
            .restock(&Actor::staff(50), title.id, StockPool::Loan, 2)
            .await
            .unwrap();
        assert_eq!(updated.stock_for_loan, 2);

        let head = c.reservation(&Actor::member(8), reservation.id).await.unwrap();
        assert_eq!(head.notified_at, Some(t0()));
        assert!(head.active);

        // stock was not empty: no second notice
        c.restock(&Actor::staff(50), title.id, StockPool::Loan, 1)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_is_single_flight() {
        let (c, _, _) = coordinator(MockNotifier::new(), 0).await;

        let _held = c.sweep_gate.lock().await;
        let report = c.sweep_overdue().await.unwrap();
        assert!(report.skipped);
        assert_eq!(report.processed, 0);
    }

    #[tokio::test]
    async fn test_reminders_once_per_due_date() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|e| matches!(e, CirculationEvent::LoanApproved { .. }))
            .returning(|_| Ok(()));
        notifier
            .expect_notify()
            .withf(|e| matches!(e, CirculationEvent::LoanReturnReminder { .. }))
            .times(2)
            .returning(|_| Ok(()));
        let (c, clock, title) = coordinator(notifier, 1).await;
        let staff = Actor::staff(50);

        let LoanRequestOutcome::Requested(loan) =
            c.request_loan(&Actor::member(1), title.id, None).await.unwrap()
        else {
            panic!("expected a loan request");
        };
        c.approve_loan(&staff, loan.id).await.unwrap();
        c.activate_loan(&staff, loan.id).await.unwrap();

        // due in 14 days: outside a 3-day window
        assert_eq!(c.remind_due_loans(3).await.unwrap().processed, 0);

        clock.advance(Duration::days(12));
        assert_eq!(c.remind_due_loans(3).await.unwrap().processed, 1);
        assert_eq!(c.remind_due_loans(3).await.unwrap().processed, 0);

        // a renewal moves the due date and re-arms the reminder
        c.renew_loan(&Actor::member(1), loan.id).await.unwrap();
        clock.advance(Duration::days(13));
        assert_eq!(c.remind_due_loans(3).await.unwrap().processed, 1);

        assert!(matches!(
            c.remind_due_loans(-1).await,
            Err(AppError::Validation(_))
        ));
    }
}
