//! Expected-availability heuristic for new reservations

use chrono::{DateTime, Duration, Utc};

use crate::models::Loan;

/// Date at which the member entering the queue at `queue_position` is
/// expected to be able to borrow the title.
///
/// The base is the earliest due date among the loans currently holding a
/// copy; `now + 1 day` when nobody holds one; `now + loan_period` when copies
/// are held but no due date is known. Each member ahead in the queue is
/// assumed to keep the title for one full loan period.
pub fn estimate(
    current_loans: &[Loan],
    queue_position: i32,
    now: DateTime<Utc>,
    loan_period: Duration,
) -> DateTime<Utc> {
    let holding: Vec<&Loan> = current_loans
        .iter()
        .filter(|l| l.status.holds_copy())
        .collect();

    let base = if holding.is_empty() {
        now + Duration::days(1)
    } else {
        holding
            .iter()
            .filter_map(|l| l.due_date)
            .min()
            .unwrap_or(now + loan_period)
    };

    base + loan_period * queue_position.max(0)
}
