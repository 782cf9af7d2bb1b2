//! Loan lifecycle
//!
//! ```text
//! Requested ──approve──▶ Approved ──activate──▶ Active ──return──▶ Returned
//!     │                      │                   │  ▲
//!     │ cancel/reject        │ cancel     sweep  ▼  │ extend
//!     ▼                      ▼                  Overdue ──return──▶ Returned
//! Cancelled ◀────────────────┘
//! ```
//!
//! `renew` pushes the due date of an `Active` loan without changing its state.
//!
//! Every transition checks its source state first; a refused transition
//! leaves both the loan and the stock untouched.

use chrono::{DateTime, Duration, Utc};

use super::ledger::StockLedger;
use crate::{
    error::{AppError, AppResult},
    models::{Loan, LoanStatus, StockPool},
    repository::TitleUnit,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanAction {
    Approve,
    Reject,
    Cancel,
    Activate,
    Return,
    MarkOverdue,
    Extend,
    Renew,
}

impl LoanAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanAction::Approve => "approve",
            LoanAction::Reject => "reject",
            LoanAction::Cancel => "cancel",
            LoanAction::Activate => "activate",
            LoanAction::Return => "return",
            LoanAction::MarkOverdue => "mark overdue",
            LoanAction::Extend => "extend",
            LoanAction::Renew => "renew",
        }
    }

    /// States this action may start from
    pub fn sources(&self) -> &'static [LoanStatus] {
        use LoanStatus::*;
        match self {
            LoanAction::Approve | LoanAction::Reject => &[Requested],
            LoanAction::Cancel => &[Requested, Approved],
            LoanAction::Activate => &[Approved],
            LoanAction::Return => &[Active, Overdue],
            LoanAction::MarkOverdue | LoanAction::Renew => &[Active],
            LoanAction::Extend => &[Overdue],
        }
    }

    pub fn target(&self) -> LoanStatus {
        match self {
            LoanAction::Approve => LoanStatus::Approved,
            LoanAction::Reject | LoanAction::Cancel => LoanStatus::Cancelled,
            LoanAction::Activate | LoanAction::Extend | LoanAction::Renew => LoanStatus::Active,
            LoanAction::Return => LoanStatus::Returned,
            LoanAction::MarkOverdue => LoanStatus::Overdue,
        }
    }
}

/// Fails with `InvalidTransition` unless `action` may start from the loan's status
pub fn check(loan: &Loan, action: LoanAction) -> AppResult<()> {
    if action.sources().contains(&loan.status) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition {
            loan_id: loan.id,
            status: loan.status,
            action: action.as_str(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct LoanStateMachine {
    loan_period: Duration,
    max_extensions: Option<i32>,
}

impl LoanStateMachine {
    pub fn new(loan_period: Duration, max_extensions: Option<i32>) -> Self {
        Self {
            loan_period,
            max_extensions,
        }
    }

    pub fn loan_period(&self) -> Duration {
        self.loan_period
    }

    /// Requested → Approved, taking one copy out of loan stock
    pub async fn approve(
        &self,
        unit: &mut dyn TitleUnit,
        loan: &mut Loan,
        approver: i32,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        check(loan, LoanAction::Approve)?;
        StockLedger::decrement(unit, StockPool::Loan, 1).await?;

        let mut next = loan.clone();
        next.status = LoanStatus::Approved;
        next.approved_at = Some(now);
        next.approved_by = Some(approver);
        next.due_date = Some(now + self.loan_period);
        self.commit(unit, loan, next, LoanAction::Approve).await
    }

    /// Staff refusal of a pending request
    pub async fn reject(
        &self,
        unit: &mut dyn TitleUnit,
        loan: &mut Loan,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        check(loan, LoanAction::Reject)?;

        let mut next = loan.clone();
        next.status = LoanStatus::Cancelled;
        next.cancelled_at = Some(now);
        if let Some(reason) = reason {
            next.append_note(&format!("Rejected: {}", reason));
        }
        self.commit(unit, loan, next, LoanAction::Reject).await
    }

    /// Requested|Approved → Cancelled. An approved loan gives its reserved
    /// copy back; returns whether that happened.
    pub async fn cancel(
        &self,
        unit: &mut dyn TitleUnit,
        loan: &mut Loan,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        check(loan, LoanAction::Cancel)?;

        let restock = loan.status == LoanStatus::Approved;
        if restock {
            StockLedger::increment(unit, StockPool::Loan, 1).await?;
        }

        let mut next = loan.clone();
        next.status = LoanStatus::Cancelled;
        next.cancelled_at = Some(now);
        self.commit(unit, loan, next, LoanAction::Cancel).await?;
        Ok(restock)
    }

    /// Approved → Active once the copy is handed over
    pub async fn activate(
        &self,
        unit: &mut dyn TitleUnit,
        loan: &mut Loan,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        check(loan, LoanAction::Activate)?;

        let mut next = loan.clone();
        next.status = LoanStatus::Active;
        next.loan_start_date = Some(now);
        if next.due_date.is_none() {
            next.due_date = Some(now + self.loan_period);
        }
        self.commit(unit, loan, next, LoanAction::Activate).await
    }

    /// Active|Overdue → Returned, putting the copy back into loan stock
    pub async fn return_loan(
        &self,
        unit: &mut dyn TitleUnit,
        loan: &mut Loan,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        check(loan, LoanAction::Return)?;
        StockLedger::increment(unit, StockPool::Loan, 1).await?;

        let mut next = loan.clone();
        next.status = LoanStatus::Returned;
        next.returned_at = Some(now);
        self.commit(unit, loan, next, LoanAction::Return).await
    }

    /// Active → Overdue; only the overdue sweep drives this
    pub async fn mark_overdue(
        &self,
        unit: &mut dyn TitleUnit,
        loan: &mut Loan,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        check(loan, LoanAction::MarkOverdue)?;
        if !loan.is_overdue_at(now) {
            return Err(AppError::InvalidOperation(format!(
                "Loan {} is not past its due date",
                loan.id
            )));
        }

        let mut next = loan.clone();
        next.status = LoanStatus::Overdue;
        self.commit(unit, loan, next, LoanAction::MarkOverdue).await
    }

    /// Overdue → Active, pushing the due date one loan period further
    pub async fn extend(
        &self,
        unit: &mut dyn TitleUnit,
        loan: &mut Loan,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        check(loan, LoanAction::Extend)?;
        let next = self.prolonged(loan, now)?;
        self.commit(unit, loan, next, LoanAction::Extend).await
    }

    /// Active → Active renewal before the due date
    pub async fn renew(
        &self,
        unit: &mut dyn TitleUnit,
        loan: &mut Loan,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        check(loan, LoanAction::Renew)?;
        let next = self.prolonged(loan, now)?;
        self.commit(unit, loan, next, LoanAction::Renew).await
    }

    fn prolonged(&self, loan: &Loan, now: DateTime<Utc>) -> AppResult<Loan> {
        if let Some(max) = self.max_extensions {
            if loan.extensions >= max {
                return Err(AppError::InvalidOperation(format!(
                    "Maximum extensions reached ({}/{})",
                    loan.extensions, max
                )));
            }
        }

        let mut next = loan.clone();
        next.status = LoanStatus::Active;
        next.due_date = Some(loan.due_date.unwrap_or(now) + self.loan_period);
        next.extensions += 1;
        next.reminded_at = None;
        Ok(next)
    }

    async fn commit(
        &self,
        unit: &mut dyn TitleUnit,
        loan: &mut Loan,
        next: Loan,
        action: LoanAction,
    ) -> AppResult<()> {
        debug_assert_eq!(next.status, action.target());
        unit.save_loan(&next).await?;
        tracing::info!(
            loan_id = next.id,
            title_id = next.title_id,
            from = %loan.status,
            to = %next.status,
            "Loan {}",
            action.as_str()
        );
        *loan = next;
        Ok(())
    }
}
