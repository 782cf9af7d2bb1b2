//! Background task running the overdue sweep and due-soon reminders

use std::sync::Arc;

use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::{
    circulation::{CirculationCoordinator, PassReport},
    config::CirculationConfig,
};

/// Start the periodic passes; `None` when `sweep_interval_secs` is 0
pub fn spawn(
    coordinator: Arc<CirculationCoordinator>,
    config: &CirculationConfig,
) -> Option<JoinHandle<()>> {
    if config.sweep_interval_secs == 0 {
        tracing::info!("Circulation scheduler disabled");
        return None;
    }

    let period = std::time::Duration::from_secs(config.sweep_interval_secs);
    let reminder_days = config.reminder_days;
    tracing::info!(interval_secs = config.sweep_interval_secs, reminder_days, "Circulation scheduler started");

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            run_once(&coordinator, reminder_days).await;
        }
    }))
}

/// One scheduler tick: sweep first so freshly overdue loans are not reminded
pub async fn run_once(
    coordinator: &CirculationCoordinator,
    reminder_days: i64,
) -> (Option<PassReport>, Option<PassReport>) {
    let sweep = match coordinator.sweep_overdue().await {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::warn!(error = %e, "Scheduled overdue sweep failed");
            None
        }
    };

    let reminders = match coordinator.remind_due_loans(reminder_days).await {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::warn!(error = %e, "Scheduled reminder pass failed");
            None
        }
    };

    (sweep, reminders)
}
