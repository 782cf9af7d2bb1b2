//! Loan model and lifecycle states

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Loan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "loan_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Requested,
    Approved,
    Active,
    Overdue,
    Returned,
    Cancelled,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Requested => "requested",
            LoanStatus::Approved => "approved",
            LoanStatus::Active => "active",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Returned => "returned",
            LoanStatus::Cancelled => "cancelled",
        }
    }

    /// Counts against the one-open-request-per-title rule
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    /// Holds (or has reserved) a physical copy
    pub fn holds_copy(&self) -> bool {
        matches!(self, LoanStatus::Approved | LoanStatus::Active | LoanStatus::Overdue)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Returned | LoanStatus::Cancelled)
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Loan model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub title_id: i32,
    pub user_id: i32,
    pub status: LoanStatus,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    /// Staff member who approved the loan
    pub approved_by: Option<i32>,
    pub loan_start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub notes: String,
    pub extensions: i32,
    /// Set once the due-soon reminder went out for the current due date
    pub reminded_at: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.status == LoanStatus::Active && self.due_date.is_some_and(|due| due < now)
    }

    /// Append a line to the free-text notes
    pub fn append_note(&mut self, note: &str) {
        let note = note.trim();
        if note.is_empty() {
            return;
        }
        if !self.notes.is_empty() {
            self.notes.push('\n');
        }
        self.notes.push_str(note);
    }
}

/// Values for inserting a loan row
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub title_id: i32,
    pub user_id: i32,
    pub status: LoanStatus,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
    pub notes: String,
}

impl NewLoan {
    /// Member borrow request, pending staff approval
    pub fn requested(title_id: i32, user_id: i32, now: DateTime<Utc>, notes: Option<String>) -> Self {
        Self {
            title_id,
            user_id,
            status: LoanStatus::Requested,
            requested_at: now,
            approved_at: None,
            approved_by: None,
            due_date: None,
            notes: notes.unwrap_or_default(),
        }
    }

    pub(crate) fn into_loan(self, id: i32) -> Loan {
        Loan {
            id,
            title_id: self.title_id,
            user_id: self.user_id,
            status: self.status,
            requested_at: self.requested_at,
            approved_at: self.approved_at,
            approved_by: self.approved_by,
            loan_start_date: None,
            due_date: self.due_date,
            returned_at: None,
            cancelled_at: None,
            notes: self.notes,
            extensions: 0,
            reminded_at: None,
        }
    }
}
