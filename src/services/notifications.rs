//! Circulation notices sent to members

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::email::EmailService;
use crate::{error::AppResult, repository::CirculationStore};

/// Something a member should hear about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CirculationEvent {
    LoanApproved {
        loan_id: i32,
        user_id: i32,
        title_id: i32,
        due_date: Option<DateTime<Utc>>,
    },
    LoanRejected {
        loan_id: i32,
        user_id: i32,
        title_id: i32,
        reason: Option<String>,
    },
    LoanOverdue {
        loan_id: i32,
        user_id: i32,
        title_id: i32,
        due_date: Option<DateTime<Utc>>,
    },
    LoanReturnReminder {
        loan_id: i32,
        user_id: i32,
        title_id: i32,
        due_date: Option<DateTime<Utc>>,
    },
    ReservationAvailable {
        reservation_id: i32,
        user_id: i32,
        title_id: i32,
    },
    ReservationPositionUpdated {
        reservation_id: i32,
        user_id: i32,
        title_id: i32,
        position: i32,
    },
    ReservationCancelled {
        reservation_id: i32,
        user_id: i32,
        title_id: i32,
    },
}

impl CirculationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            CirculationEvent::LoanApproved { .. } => "loan_approved",
            CirculationEvent::LoanRejected { .. } => "loan_rejected",
            CirculationEvent::LoanOverdue { .. } => "loan_overdue",
            CirculationEvent::LoanReturnReminder { .. } => "loan_return_reminder",
            CirculationEvent::ReservationAvailable { .. } => "reservation_available",
            CirculationEvent::ReservationPositionUpdated { .. } => "reservation_position_updated",
            CirculationEvent::ReservationCancelled { .. } => "reservation_cancelled",
        }
    }

    /// Recipient of the notice
    pub fn user_id(&self) -> i32 {
        match self {
            CirculationEvent::LoanApproved { user_id, .. }
            | CirculationEvent::LoanRejected { user_id, .. }
            | CirculationEvent::LoanOverdue { user_id, .. }
            | CirculationEvent::LoanReturnReminder { user_id, .. }
            | CirculationEvent::ReservationAvailable { user_id, .. }
            | CirculationEvent::ReservationPositionUpdated { user_id, .. }
            | CirculationEvent::ReservationCancelled { user_id, .. } => *user_id,
        }
    }

    pub fn title_id(&self) -> i32 {
        match self {
            CirculationEvent::LoanApproved { title_id, .. }
            | CirculationEvent::LoanRejected { title_id, .. }
            | CirculationEvent::LoanOverdue { title_id, .. }
            | CirculationEvent::LoanReturnReminder { title_id, .. }
            | CirculationEvent::ReservationAvailable { title_id, .. }
            | CirculationEvent::ReservationPositionUpdated { title_id, .. }
            | CirculationEvent::ReservationCancelled { title_id, .. } => *title_id,
        }
    }

    /// Subject line and plain-text body for `title`
    pub fn render(&self, recipient: &str, title: &str) -> (String, String) {
        let day = |d: &Option<DateTime<Utc>>| {
            d.map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string())
        };

        let (subject, line) = match self {
            CirculationEvent::LoanApproved { due_date, .. } => (
                format!("Loan approved: {}", title),
                format!(
                    "Your loan of \"{}\" was approved. Please return it by {}.",
                    title,
                    day(due_date)
                ),
            ),
            CirculationEvent::LoanRejected { reason, .. } => (
                format!("Loan request declined: {}", title),
                match reason {
                    Some(reason) => format!(
                        "Your request for \"{}\" was declined: {}",
                        title, reason
                    ),
                    None => format!("Your request for \"{}\" was declined.", title),
                },
            ),
            CirculationEvent::LoanOverdue { due_date, .. } => (
                format!("Overdue: {}", title),
                format!(
                    "\"{}\" was due on {}. Please return it as soon as possible.",
                    title,
                    day(due_date)
                ),
            ),
            CirculationEvent::LoanReturnReminder { due_date, .. } => (
                format!("Return reminder: {}", title),
                format!("\"{}\" is due on {}.", title, day(due_date)),
            ),
            CirculationEvent::ReservationAvailable { .. } => (
                format!("Available for you: {}", title),
                format!("A copy of \"{}\" is waiting for you.", title),
            ),
            CirculationEvent::ReservationPositionUpdated { position, .. } => (
                format!("Waiting list update: {}", title),
                format!(
                    "You are now number {} in line for \"{}\".",
                    position + 1,
                    title
                ),
            ),
            CirculationEvent::ReservationCancelled { .. } => (
                format!("Reservation cancelled: {}", title),
                format!("Your reservation for \"{}\" was cancelled.", title),
            ),
        };

        (subject, format!("Hello {},\n\n{}\n", recipient, line))
    }
}

/// Delivery channel for circulation notices
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &CirculationEvent) -> AppResult<()>;
}

/// Writes notices to the log; used when email is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &CirculationEvent) -> AppResult<()> {
        tracing::info!(
            event = event.kind(),
            user_id = event.user_id(),
            title_id = event.title_id(),
            "Circulation notice"
        );
        Ok(())
    }
}

/// Emails notices to the member's registered address
#[derive(Clone)]
pub struct EmailNotifier {
    store: Arc<dyn CirculationStore>,
    email: EmailService,
}

impl EmailNotifier {
    pub fn new(store: Arc<dyn CirculationStore>, email: EmailService) -> Self {
        Self { store, email }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, event: &CirculationEvent) -> AppResult<()> {
        let contact = self.store.user_contact(event.user_id()).await?;
        let Some((name, address)) =
            contact.and_then(|c| c.email.map(|email| (c.display_name, email)))
        else {
            tracing::debug!(
                event = event.kind(),
                user_id = event.user_id(),
                "No email address, notice dropped"
            );
            return Ok(());
        };

        let title = self.store.get_title(event.title_id()).await?;
        let (subject, body) = event.render(&name, &title.name);
        self.email.send_email(&address, &subject, &body).await?;

        tracing::debug!(event = event.kind(), user_id = event.user_id(), "Notice emailed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let event = CirculationEvent::ReservationPositionUpdated {
            reservation_id: 4,
            user_id: 12,
            title_id: 3,
            position: 0,
        };
        assert_eq!(event.kind(), "reservation_position_updated");
        assert_eq!(event.user_id(), 12);
        assert_eq!(event.title_id(), 3);

        let (subject, body) = event.render("Ada", "Dune");
        assert_eq!(subject, "Waiting list update: Dune");
        assert!(body.starts_with("Hello Ada,"));
        assert!(body.contains("number 1 in line"));
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = CirculationEvent::ReservationCancelled {
            reservation_id: 1,
            user_id: 2,
            title_id: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "reservation_cancelled");
        assert_eq!(json["user_id"], 2);
    }

    #[tokio::test]
    async fn test_email_notifier_skips_users_without_address() {
        use crate::{
            config::EmailConfig,
            models::{CreateTitle, UserContact},
            repository::InMemoryStore,
        };

        let store = InMemoryStore::new();
        let title = store
            .create_title(&CreateTitle::borrowable("Dune", 1))
            .await
            .unwrap();
        store
            .insert_user(UserContact {
                id: 5,
                display_name: "Ada".to_string(),
                email: None,
            })
            .await;

        // would fail to connect if it tried to send
        let notifier = EmailNotifier::new(Arc::new(store), EmailService::new(EmailConfig::default()));
        for user_id in [5, 6] {
            notifier
                .notify(&CirculationEvent::ReservationAvailable {
                    reservation_id: 1,
                    user_id,
                    title_id: title.id,
                })
                .await
                .unwrap();
        }
    }
}
