//! Per-title reservation queue
//!
//! Active reservations of a title always hold positions `0..n`, without gaps
//! or duplicates. Any removal (cancellation, conversion into a loan) re-ranks
//! the remaining entries by request time, id breaking ties.

use chrono::{DateTime, Duration, Utc};

use super::{estimator, ledger::StockLedger};
use crate::{
    error::{AppError, AppResult},
    models::{Loan, LoanStatus, NewLoan, NewReservation, Reservation, StockPool},
    repository::TitleUnit,
};

/// Outcome of taking a reservation out of the queue
#[derive(Debug, Clone)]
pub struct QueueRemoval {
    pub reservation: Reservation,
    /// Remaining reservations whose position changed
    pub moved: Vec<Reservation>,
}

/// Outcome of turning the queue head into a loan
#[derive(Debug, Clone)]
pub struct Conversion {
    pub loan: Loan,
    pub reservation: Reservation,
    pub moved: Vec<Reservation>,
}

/// Assign positions `0..n` ordered by (`requested_at`, `id`).
/// Returns the indices, after sorting, of entries whose position changed.
pub fn rerank(queue: &mut [Reservation]) -> Vec<usize> {
    queue.sort_by(|a, b| a.requested_at.cmp(&b.requested_at).then(a.id.cmp(&b.id)));

    let mut changed = Vec::new();
    for (idx, reservation) in queue.iter_mut().enumerate() {
        let position = idx as i32;
        if reservation.position != position {
            reservation.position = position;
            changed.push(idx);
        }
    }
    changed
}

/// A member may hold at most one open loan or active reservation per title
pub async fn ensure_no_open_request(unit: &mut dyn TitleUnit, user_id: i32) -> AppResult<()> {
    let title_id = unit.title_id();
    let has_loan = unit.open_loans().await?.iter().any(|l| l.user_id == user_id);
    let has_reservation = unit
        .active_reservations()
        .await?
        .iter()
        .any(|r| r.user_id == user_id);

    if has_loan || has_reservation {
        Err(AppError::DuplicateRequest { user_id, title_id })
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ReservationQueue {
    loan_period: Duration,
}

impl ReservationQueue {
    pub fn new(loan_period: Duration) -> Self {
        Self { loan_period }
    }

    /// Append `user_id` to the tail of the queue
    pub async fn enroll(
        &self,
        unit: &mut dyn TitleUnit,
        user_id: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Reservation> {
        ensure_no_open_request(unit, user_id).await?;

        let title_id = unit.title_id();
        let position = unit.active_reservations().await?.len() as i32;
        let open_loans = unit.open_loans().await?;
        let expected = estimator::estimate(&open_loans, position, now, self.loan_period);

        let reservation = unit
            .insert_reservation(NewReservation {
                title_id,
                user_id,
                requested_at: now,
                position,
                expected_available_date: Some(expected),
            })
            .await?;

        tracing::info!(
            reservation_id = reservation.id,
            title_id = reservation.title_id,
            user_id,
            position,
            "Reservation enrolled"
        );
        Ok(reservation)
    }

    /// Deactivate a reservation and close the gap it leaves
    pub async fn cancel(
        &self,
        unit: &mut dyn TitleUnit,
        reservation_id: i32,
        now: DateTime<Utc>,
    ) -> AppResult<QueueRemoval> {
        let mut reservation = unit.reservation(reservation_id).await?;
        if !reservation.active {
            return Err(AppError::InvalidOperation(format!(
                "Reservation {} is already inactive",
                reservation_id
            )));
        }

        reservation.active = false;
        reservation.notified_at = Some(now);
        unit.save_reservation(&reservation).await?;
        let moved = self.rerank_and_save(unit).await?;

        tracing::info!(
            reservation_id,
            title_id = reservation.title_id,
            moved = moved.len(),
            "Reservation cancelled"
        );
        Ok(QueueRemoval { reservation, moved })
    }

    /// Move a reservation one place forward, swapping with the entry ahead.
    /// Returns the changed reservations, the promoted one first.
    pub async fn promote(
        &self,
        unit: &mut dyn TitleUnit,
        reservation_id: i32,
    ) -> AppResult<Vec<Reservation>> {
        let mut reservation = unit.reservation(reservation_id).await?;
        if !reservation.active {
            return Err(AppError::InvalidOperation(format!(
                "Reservation {} is inactive",
                reservation_id
            )));
        }
        if reservation.position == 0 {
            return Err(AppError::InvalidOperation(format!(
                "Reservation {} is already at the head of the queue",
                reservation_id
            )));
        }

        let target = reservation.position - 1;
        let ahead = unit
            .active_reservations()
            .await?
            .into_iter()
            .find(|r| r.position == target && r.id != reservation.id);

        reservation.position = target;
        unit.save_reservation(&reservation).await?;
        let mut changed = vec![reservation];

        if let Some(mut ahead) = ahead {
            ahead.position = target + 1;
            unit.save_reservation(&ahead).await?;
            changed.push(ahead);
        }

        tracing::info!(reservation_id, position = target, "Reservation promoted");
        Ok(changed)
    }

    /// Turn the queue head directly into an approved loan
    pub async fn convert_to_loan(
        &self,
        unit: &mut dyn TitleUnit,
        reservation_id: i32,
        approver: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Conversion> {
        let mut reservation = unit.reservation(reservation_id).await?;
        if !reservation.active || reservation.position != 0 {
            return Err(AppError::NotQueueHead {
                reservation_id,
                position: reservation.position,
            });
        }

        StockLedger::decrement(unit, StockPool::Loan, 1).await?;

        let loan = unit
            .insert_loan(NewLoan {
                title_id: reservation.title_id,
                user_id: reservation.user_id,
                status: LoanStatus::Approved,
                requested_at: now,
                approved_at: Some(now),
                approved_by: Some(approver),
                due_date: Some(now + self.loan_period),
                notes: format!("Converted from reservation #{}", reservation.id),
            })
            .await?;

        reservation.active = false;
        reservation.notified_at = Some(now);
        unit.save_reservation(&reservation).await?;
        let moved = self.rerank_and_save(unit).await?;

        tracing::info!(
            reservation_id,
            loan_id = loan.id,
            title_id = loan.title_id,
            "Reservation converted to loan"
        );
        Ok(Conversion {
            loan,
            reservation,
            moved,
        })
    }

    /// Record that the member was told a copy is waiting
    pub async fn notify(
        &self,
        unit: &mut dyn TitleUnit,
        reservation_id: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Reservation> {
        let mut reservation = unit.reservation(reservation_id).await?;
        if !reservation.active {
            return Err(AppError::InvalidOperation(format!(
                "Reservation {} is inactive",
                reservation_id
            )));
        }
        reservation.notified_at = Some(now);
        unit.save_reservation(&reservation).await?;
        Ok(reservation)
    }

    /// Notify the queue head, if any
    pub async fn notify_head(
        &self,
        unit: &mut dyn TitleUnit,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Reservation>> {
        let head = unit
            .active_reservations()
            .await?
            .into_iter()
            .find(|r| r.position == 0);
        match head {
            Some(head) => Ok(Some(self.notify(unit, head.id, now).await?)),
            None => Ok(None),
        }
    }

    /// Recompute every expected-available date from current positions
    pub async fn refresh_estimates(
        &self,
        unit: &mut dyn TitleUnit,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Reservation>> {
        let open_loans = unit.open_loans().await?;
        let mut queue = unit.active_reservations().await?;
        for reservation in queue.iter_mut() {
            reservation.expected_available_date = Some(estimator::estimate(
                &open_loans,
                reservation.position,
                now,
                self.loan_period,
            ));
            unit.save_reservation(reservation).await?;
        }
        Ok(queue)
    }

    async fn rerank_and_save(&self, unit: &mut dyn TitleUnit) -> AppResult<Vec<Reservation>> {
        let mut queue = unit.active_reservations().await?;
        let changed = rerank(&mut queue);

        let mut moved = Vec::with_capacity(changed.len());
        for idx in changed {
            unit.save_reservation(&queue[idx]).await?;
            moved.push(queue[idx].clone());
        }
        Ok(moved)
    }
}
