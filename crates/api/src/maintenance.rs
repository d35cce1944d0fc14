//! Periodic housekeeping
//!
//! Purges expired sessions from the store and drops idle rate-limiter keys.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::state::AppState;

/// Run one maintenance pass. Returns the number of sessions purged.
pub async fn run_once(state: &AppState) -> u64 {
    let purged = match state.auth.sessions().purge_expired().await {
        Ok(count) => count,
        Err(e) => {
            error!(error = %e, "Failed to purge expired sessions");
            0
        }
    };

    let swept = state.login_limiter.sweep().await;
    if swept > 0 {
        info!(count = swept, "Swept idle rate limit entries");
    }

    purged
}

/// Spawn the maintenance loop on the runtime
pub fn spawn(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            run_once(&state).await;
        }
    })
}
