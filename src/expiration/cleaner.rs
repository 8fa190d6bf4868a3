use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::AppState;

/// Start the background reaper that deletes records past their expiry
pub fn start_expiration_cleaner(state: Arc<AppState>) -> JoinHandle<()> {
    let interval = Duration::from_secs(state.config.tokens.cleanup_interval_seconds.max(1));

    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);

        loop {
            interval_timer.tick().await;
            run_cleanup(Arc::clone(&state)).await;
        }
    })
}

/// Run one reaper pass, returning how many records were removed
pub async fn run_cleanup(state: Arc<AppState>) -> usize {
    debug!("Running expiration cleanup");

    let result = tokio::task::spawn_blocking(move || state.engine.reap()).await;

    match result {
        Ok(Ok(count)) => {
            if count > 0 {
                debug!(records_cleaned = count, "Expired records cleaned");
            }
            count
        }
        Ok(Err(e)) => {
            error!(error = %e, "Failed to clean up expired records");
            0
        }
        Err(e) => {
            error!(error = %e, "Expiration cleanup task panicked");
            0
        }
    }
}
