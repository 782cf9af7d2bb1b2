//! Services around the circulation core: notices, email and scheduling

pub mod email;
pub mod notifications;
pub mod scheduler;

use std::sync::Arc;

use crate::{
    circulation::CirculationCoordinator,
    clock::Clock,
    config::{CirculationConfig, EmailConfig},
    repository::CirculationStore,
};

use notifications::{EmailNotifier, LogNotifier, Notifier};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub circulation: Arc<CirculationCoordinator>,
}

impl Services {
    pub fn new(
        store: Arc<dyn CirculationStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: &CirculationConfig,
    ) -> Self {
        Self {
            circulation: Arc::new(CirculationCoordinator::new(store, notifier, clock, config)),
        }
    }
}

/// Email notices when SMTP is enabled, log lines otherwise
pub fn notifier_for(config: &EmailConfig, store: Arc<dyn CirculationStore>) -> Arc<dyn Notifier> {
    if config.enabled {
        tracing::info!(smtp_host = %config.smtp_host, "Circulation notices sent by email");
        Arc::new(EmailNotifier::new(store, email::EmailService::new(config.clone())))
    } else {
        tracing::info!("Email disabled, circulation notices are logged");
        Arc::new(LogNotifier)
    }
}
