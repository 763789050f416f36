//! Expiry sweep background task.
//!
//! Wakes on a fixed interval and asks the lifecycle actor to sweep the
//! registry. The sweep itself runs inside the actor so it never races a
//! command; this task only supplies the tick and the current time.

use crate::state::{DeleteConfirmations, LifecycleHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Spawn the sweep task.
///
/// The first sweep runs immediately so records that expired while the
/// daemon was down are handled at startup. The task ends once the actor
/// has shut down.
pub fn spawn_sweep_task(
    handle: LifecycleHandle,
    confirmations: Arc<DeleteConfirmations>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = period.as_secs(), "Expiry sweep scheduled");

        loop {
            interval.tick().await;
            confirmations.purge_expired();
            if let Err(e) = handle.sweep(handle.now()).await {
                debug!(error = %e, "Sweep task stopping");
                break;
            }
        }
    })
}
