//! Periodic overdue sweep

use std::time::Duration;

use tokio::{task::JoinHandle, time::MissedTickBehavior};

use super::loans::LoansService;

/// Run the overdue sweep every `period` until the task is aborted
pub fn spawn_sweeper(loans: LoansService, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) = loans.sweep_overdue().await {
                tracing::warn!("Overdue sweep failed: {}", e);
            }
        }
    })
}
