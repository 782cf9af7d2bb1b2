//! Coordinator scenarios against the in-memory store

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use circulation_server::{
    circulation::{CirculationCoordinator, LoanRequestOutcome},
    clock::ManualClock,
    config::CirculationConfig,
    error::{AppError, AppResult},
    models::{Actor, CreateTitle, Loan, LoanStatus, Reservation, StockPool},
    repository::{CirculationStore, InMemoryStore},
    services::notifications::{CirculationEvent, Notifier},
};

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<CirculationEvent>>,
}

impl RecordingNotifier {
    fn take(&self) -> Vec<CirculationEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &CirculationEvent) -> AppResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

struct Harness {
    circulation: Arc<CirculationCoordinator>,
    store: InMemoryStore,
    clock: Arc<ManualClock>,
    notices: Arc<RecordingNotifier>,
    staff: Actor,
}

impl Harness {
    fn new(start: DateTime<Utc>) -> Self {
        let store = InMemoryStore::new();
        let clock = Arc::new(ManualClock::new(start));
        let notices = Arc::new(RecordingNotifier::default());
        let circulation = Arc::new(CirculationCoordinator::new(
            Arc::new(store.clone()),
            notices.clone(),
            clock.clone(),
            &CirculationConfig::default(),
        ));
        Self {
            circulation,
            store,
            clock,
            notices,
            staff: Actor::staff(900),
        }
    }

    async fn title(&self, stock_for_loan: i32) -> i32 {
        self.store
            .create_title(&CreateTitle::borrowable("The Left Hand of Darkness", stock_for_loan))
            .await
            .unwrap()
            .id
    }

    async fn stock(&self, title_id: i32) -> i32 {
        self.circulation.title(title_id).await.unwrap().stock_for_loan
    }

    async fn request(&self, user_id: i32, title_id: i32) -> LoanRequestOutcome {
        self.circulation
            .request_loan(&Actor::member(user_id), title_id, None)
            .await
            .unwrap()
    }

    async fn requested(&self, user_id: i32, title_id: i32) -> Loan {
        match self.request(user_id, title_id).await {
            LoanRequestOutcome::Requested(loan) => loan,
            other => panic!("expected a loan, got {:?}", other),
        }
    }

    async fn queued(&self, user_id: i32, title_id: i32) -> Reservation {
        match self.request(user_id, title_id).await {
            LoanRequestOutcome::Queued(reservation) => reservation,
            other => panic!("expected a reservation, got {:?}", other),
        }
    }

    /// Requested, approved and handed over
    async fn active_loan(&self, user_id: i32, title_id: i32) -> Loan {
        let loan = self.requested(user_id, title_id).await;
        self.circulation.approve_loan(&self.staff, loan.id).await.unwrap();
        self.circulation.activate_loan(&self.staff, loan.id).await.unwrap()
    }

    async fn positions(&self, title_id: i32) -> Vec<(i32, i32)> {
        self.circulation
            .queue(&self.staff, title_id)
            .await
            .unwrap()
            .iter()
            .map(|r| (r.id, r.position))
            .collect()
    }
}

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
}

#[tokio::test]
async fn test_first_in_line_expects_current_due_date() {
    let h = Harness::new(at(2024, 3, 1));
    let title = h.title(1).await;

    let loan_a = h.requested(1, title).await;
    let loan_a = h.circulation.approve_loan(&h.staff, loan_a.id).await.unwrap();
    assert_eq!(h.stock(title).await, 0);
    assert_eq!(loan_a.due_date, Some(at(2024, 3, 15)));

    let reservation_b = h.queued(2, title).await;
    assert_eq!(reservation_b.position, 0);
    assert_eq!(reservation_b.expected_available_date, loan_a.due_date);
}

#[tokio::test]
async fn test_cancelling_middle_reservation_closes_gap() {
    let h = Harness::new(at(2024, 3, 1));
    let title = h.title(0).await;

    let r1 = h.queued(1, title).await;
    h.clock.advance(Duration::minutes(1));
    let r2 = h.queued(2, title).await;
    h.clock.advance(Duration::minutes(1));
    let r3 = h.queued(3, title).await;

    let removal = h
        .circulation
        .cancel_reservation(&Actor::member(2), r2.id)
        .await
        .unwrap();
    assert!(!removal.reservation.active);
    assert_eq!(h.positions(title).await, vec![(r1.id, 0), (r3.id, 1)]);

    let notices = h.notices.take();
    assert!(notices.contains(&CirculationEvent::ReservationCancelled {
        reservation_id: r2.id,
        user_id: 2,
        title_id: title,
    }));
    assert!(notices.contains(&CirculationEvent::ReservationPositionUpdated {
        reservation_id: r3.id,
        user_id: 3,
        title_id: title,
        position: 1,
    }));
}

#[tokio::test]
async fn test_overdue_sweep_is_idempotent() {
    let h = Harness::new(at(2023, 12, 27));
    let title = h.title(1).await;
    let loan = h.active_loan(1, title).await;
    assert_eq!(loan.due_date, Some(at(2024, 1, 10)));
    h.notices.take();

    h.clock.set(at(2024, 1, 11));
    let report = h.circulation.sweep_overdue().await.unwrap();
    assert_eq!(report.processed, 1);
    assert!(!report.skipped);

    let loan = h.circulation.loan(&h.staff, loan.id).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Overdue);
    assert_eq!(
        h.notices.take(),
        vec![CirculationEvent::LoanOverdue {
            loan_id: loan.id,
            user_id: 1,
            title_id: title,
            due_date: Some(at(2024, 1, 10)),
        }]
    );

    h.clock.set(at(2024, 1, 12));
    let report = h.circulation.sweep_overdue().await.unwrap();
    assert_eq!(report.processed, 0);
    assert!(h.notices.take().is_empty());
    assert_eq!(
        h.circulation.loan(&h.staff, loan.id).await.unwrap().status,
        LoanStatus::Overdue
    );
}

#[tokio::test]
async fn test_concurrent_approvals_of_last_copy() {
    let h = Harness::new(at(2024, 3, 1));
    let title = h.title(1).await;
    let first = h.requested(1, title).await;
    let second = h.requested(2, title).await;

    let (a, b) = tokio::join!(
        {
            let c = h.circulation.clone();
            let staff = h.staff;
            tokio::spawn(async move { c.approve_loan(&staff, first.id).await })
        },
        {
            let c = h.circulation.clone();
            let staff = h.staff;
            tokio::spawn(async move { c.approve_loan(&staff, second.id).await })
        }
    );
    let results = [a.unwrap(), b.unwrap()];

    let approved = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::InsufficientStock { .. })))
        .count();
    assert_eq!((approved, refused), (1, 1));
    assert_eq!(h.stock(title).await, 0);
}

#[tokio::test]
async fn test_approve_without_stock_changes_nothing() {
    let h = Harness::new(at(2024, 3, 1));
    let title = h.title(1).await;
    let first = h.requested(1, title).await;
    let second = h.requested(2, title).await;
    h.circulation.approve_loan(&h.staff, first.id).await.unwrap();

    let err = h
        .circulation
        .approve_loan(&h.staff, second.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { pool: StockPool::Loan, .. }));
    assert_eq!(
        h.circulation.loan(&h.staff, second.id).await.unwrap().status,
        LoanStatus::Requested
    );
    assert_eq!(h.stock(title).await, 0);
}

#[tokio::test]
async fn test_return_hands_copy_to_queue_head() {
    let h = Harness::new(at(2024, 3, 1));
    let title = h.title(1).await;
    let loan = h.active_loan(1, title).await;
    let r2 = h.queued(2, title).await;
    h.clock.advance(Duration::minutes(1));
    let r3 = h.queued(3, title).await;
    h.notices.take();

    h.clock.advance(Duration::days(5));
    let returned = h
        .circulation
        .return_loan(&Actor::member(1), loan.id)
        .await
        .unwrap();
    assert_eq!(returned.status, LoanStatus::Returned);
    assert_eq!(returned.returned_at, Some(h.clock_now()));
    assert_eq!(h.stock(title).await, 1);
    assert_eq!(
        h.notices.take(),
        vec![CirculationEvent::ReservationAvailable {
            reservation_id: r2.id,
            user_id: 2,
            title_id: title,
        }]
    );

    // only the head can be converted
    let err = h
        .circulation
        .convert_reservation_to_loan(&h.staff, r3.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotQueueHead { position: 1, .. }));
    assert_eq!(h.stock(title).await, 1);

    let conversion = h
        .circulation
        .convert_reservation_to_loan(&h.staff, r2.id)
        .await
        .unwrap();
    assert_eq!(conversion.loan.status, LoanStatus::Approved);
    assert_eq!(conversion.loan.user_id, 2);
    assert!(!conversion.reservation.active);
    assert_eq!(h.stock(title).await, 0);
    assert_eq!(h.positions(title).await, vec![(r3.id, 0)]);
}

#[tokio::test]
async fn test_cancel_approved_loan_restocks_and_notifies() {
    let h = Harness::new(at(2024, 3, 1));
    let title = h.title(1).await;
    let loan = h.requested(1, title).await;
    h.circulation.approve_loan(&h.staff, loan.id).await.unwrap();
    let waiting = h.queued(2, title).await;
    h.notices.take();

    let cancelled = h
        .circulation
        .cancel_loan(&Actor::member(1), loan.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, LoanStatus::Cancelled);
    assert_eq!(h.stock(title).await, 1);
    assert_eq!(
        h.notices.take(),
        vec![CirculationEvent::ReservationAvailable {
            reservation_id: waiting.id,
            user_id: 2,
            title_id: title,
        }]
    );
}

#[tokio::test]
async fn test_extend_overdue_loan() {
    let h = Harness::new(at(2023, 12, 27));
    let title = h.title(1).await;
    let loan = h.active_loan(1, title).await;

    assert!(matches!(
        h.circulation.extend_loan(&h.staff, loan.id).await,
        Err(AppError::InvalidTransition { status: LoanStatus::Active, .. })
    ));

    h.clock.set(at(2024, 1, 11));
    h.circulation.sweep_overdue().await.unwrap();
    let extended = h.circulation.extend_loan(&h.staff, loan.id).await.unwrap();
    assert_eq!(extended.status, LoanStatus::Active);
    assert_eq!(extended.due_date, Some(at(2024, 1, 24)));
    assert_eq!(extended.extensions, 1);
}

#[tokio::test]
async fn test_closed_loans_refuse_every_transition() {
    let h = Harness::new(at(2024, 3, 1));
    let title = h.title(1).await;
    let loan = h.active_loan(1, title).await;
    h.circulation.return_loan(&h.staff, loan.id).await.unwrap();

    let c = &h.circulation;
    let s = &h.staff;
    assert!(matches!(c.approve_loan(s, loan.id).await, Err(AppError::InvalidTransition { .. })));
    assert!(matches!(c.cancel_loan(s, loan.id).await, Err(AppError::InvalidTransition { .. })));
    assert!(matches!(c.activate_loan(s, loan.id).await, Err(AppError::InvalidTransition { .. })));
    assert!(matches!(c.return_loan(s, loan.id).await, Err(AppError::InvalidTransition { .. })));
    assert!(matches!(c.extend_loan(s, loan.id).await, Err(AppError::InvalidTransition { .. })));
    assert_eq!(h.stock(title).await, 1);
}

#[tokio::test]
async fn test_positions_stay_dense() {
    let h = Harness::new(at(2024, 3, 1));
    let title = h.title(0).await;

    let mut ids = Vec::new();
    for user in 1..=8 {
        h.clock.advance(Duration::minutes(1));
        ids.push(h.queued(user, title).await.id);
    }
    for idx in [3, 0, 6, 1] {
        h.circulation
            .cancel_reservation(&h.staff, ids[idx])
            .await
            .unwrap();
        let positions: Vec<i32> = h.positions(title).await.iter().map(|p| p.1).collect();
        assert_eq!(positions, (0..positions.len() as i32).collect::<Vec<_>>());
    }

    h.circulation
        .promote_reservation(&h.staff, ids[7])
        .await
        .unwrap();
    let queue = h.positions(title).await;
    assert_eq!(
        queue,
        vec![(ids[2], 0), (ids[4], 1), (ids[7], 2), (ids[5], 3)]
    );

    // a later removal re-ranks by arrival again
    h.circulation
        .cancel_reservation(&h.staff, ids[2])
        .await
        .unwrap();
    assert_eq!(
        h.positions(title).await,
        vec![(ids[4], 0), (ids[5], 1), (ids[7], 2)]
    );
}

#[tokio::test]
async fn test_withdraw_and_restock_through_ledger() {
    let h = Harness::new(at(2024, 3, 1));
    let title = h.store
        .create_title(&CreateTitle {
            name: "Kindred".to_string(),
            stock_for_sale: 2,
            stock_for_loan: 0,
            borrowable: true,
        })
        .await
        .unwrap()
        .id;

    let updated = h
        .circulation
        .withdraw(&h.staff, title, StockPool::Sale, 2)
        .await
        .unwrap();
    assert_eq!((updated.stock_for_sale, updated.total_stock), (0, 0));
    assert!(matches!(
        h.circulation.withdraw(&h.staff, title, StockPool::Sale, 1).await,
        Err(AppError::InsufficientStock { pool: StockPool::Sale, .. })
    ));
    assert!(matches!(
        h.circulation
            .restock(&Actor::member(1), title, StockPool::Loan, 1)
            .await,
        Err(AppError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn test_reject_is_staff_only_and_keeps_stock() {
    let h = Harness::new(at(2024, 3, 1));
    let title = h.title(1).await;
    let loan = h.requested(1, title).await;
    h.notices.take();

    assert!(matches!(
        h.circulation
            .reject_loan(&Actor::member(1), loan.id, None)
            .await,
        Err(AppError::Unauthorized(_))
    ));
    assert_eq!(
        h.circulation.loan(&h.staff, loan.id).await.unwrap().status,
        LoanStatus::Requested
    );

    let rejected = h
        .circulation
        .reject_loan(&h.staff, loan.id, Some("copy damaged".to_string()))
        .await
        .unwrap();
    assert_eq!(rejected.status, LoanStatus::Cancelled);
    assert_eq!(rejected.cancelled_at, Some(at(2024, 3, 1)));
    assert!(rejected.notes.contains("Rejected: copy damaged"));
    assert_eq!(h.stock(title).await, 1);
    assert_eq!(
        h.notices.take(),
        vec![CirculationEvent::LoanRejected {
            loan_id: loan.id,
            user_id: 1,
            title_id: title,
            reason: Some("copy damaged".to_string()),
        }]
    );
}

#[tokio::test]
async fn test_member_cannot_cancel_anothers_reservation() {
    let h = Harness::new(at(2024, 3, 1));
    let title = h.title(0).await;
    let r1 = h.queued(1, title).await;
    h.clock.advance(Duration::minutes(1));
    let r2 = h.queued(2, title).await;
    h.notices.take();

    assert!(matches!(
        h.circulation
            .cancel_reservation(&Actor::member(2), r1.id)
            .await,
        Err(AppError::Unauthorized(_))
    ));
    assert_eq!(h.positions(title).await, vec![(r1.id, 0), (r2.id, 1)]);
    assert!(h.circulation.reservation(&h.staff, r1.id).await.unwrap().active);
    assert!(h.notices.take().is_empty());
}

#[tokio::test]
async fn test_notify_reservation_keeps_it_queued() {
    let h = Harness::new(at(2024, 3, 1));
    let title = h.title(0).await;
    let reservation = h.queued(1, title).await;
    h.notices.take();

    assert!(matches!(
        h.circulation
            .notify_reservation(&Actor::member(1), reservation.id)
            .await,
        Err(AppError::Unauthorized(_))
    ));

    h.clock.advance(Duration::hours(2));
    let notified = h
        .circulation
        .notify_reservation(&h.staff, reservation.id)
        .await
        .unwrap();
    assert!(notified.active);
    assert_eq!(notified.position, 0);
    assert_eq!(notified.notified_at, Some(h.clock_now()));
    assert_eq!(
        h.notices.take(),
        vec![CirculationEvent::ReservationAvailable {
            reservation_id: reservation.id,
            user_id: 1,
            title_id: title,
        }]
    );
    assert_eq!(h.positions(title).await, vec![(reservation.id, 0)]);
}

#[tokio::test]
async fn test_promote_reports_both_moves() {
    let h = Harness::new(at(2024, 3, 1));
    let title = h.title(0).await;
    let r1 = h.queued(1, title).await;
    h.clock.advance(Duration::minutes(1));
    let r2 = h.queued(2, title).await;
    h.notices.take();

    assert!(matches!(
        h.circulation
            .promote_reservation(&Actor::member(2), r2.id)
            .await,
        Err(AppError::Unauthorized(_))
    ));

    h.circulation
        .promote_reservation(&h.staff, r2.id)
        .await
        .unwrap();
    assert_eq!(h.positions(title).await, vec![(r2.id, 0), (r1.id, 1)]);
    assert_eq!(
        h.notices.take(),
        vec![
            CirculationEvent::ReservationPositionUpdated {
                reservation_id: r2.id,
                user_id: 2,
                title_id: title,
                position: 0,
            },
            CirculationEvent::ReservationPositionUpdated {
                reservation_id: r1.id,
                user_id: 1,
                title_id: title,
                position: 1,
            },
        ]
    );

    assert!(matches!(
        h.circulation.promote_reservation(&h.staff, r2.id).await,
        Err(AppError::InvalidOperation(_))
    ));
}

#[tokio::test]
async fn test_enroll_with_copies_on_shelf_notifies_at_once() {
    let h = Harness::new(at(2024, 3, 1));
    let title = h.title(1).await;

    let reservation = h
        .circulation
        .enroll_reservation(&Actor::member(4), title)
        .await
        .unwrap();
    assert_eq!(reservation.position, 0);
    assert!(reservation.active);
    assert_eq!(reservation.notified_at, Some(at(2024, 3, 1)));
    assert_eq!(
        h.notices.take(),
        vec![CirculationEvent::ReservationAvailable {
            reservation_id: reservation.id,
            user_id: 4,
            title_id: title,
        }]
    );

    // second in line waits for the head
    let second = h
        .circulation
        .enroll_reservation(&Actor::member(5), title)
        .await
        .unwrap();
    assert_eq!(second.position, 1);
    assert_eq!(second.notified_at, None);
    assert!(h.notices.take().is_empty());
}

#[tokio::test]
async fn test_reminder_window_out_of_range() {
    let h = Harness::new(at(2024, 3, 1));
    for days in [100_000_000, i64::MAX] {
        assert!(matches!(
            h.circulation.remind_due_loans(days).await,
            Err(AppError::Validation(_))
        ));
    }
    // the gate was not left held
    assert!(!h.circulation.remind_due_loans(3).await.unwrap().skipped);
}

impl Harness {
    fn clock_now(&self) -> DateTime<Utc> {
        use circulation_server::clock::Clock;
        self.clock.now()
    }
}
