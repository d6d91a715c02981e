use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use citabot_core::ConversationStore;

/// Spawns the periodic idle sweep. Runs until the process exits; a tick that
/// falls behind is delayed instead of bursting.
pub fn spawn_idle_sweep(
    store: Arc<ConversationStore>,
    ttl: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so the sweep only
        // runs after a full interval of real time.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let evicted = store.sweep_idle(ttl).await;
            if evicted > 0 {
                let remaining = store.len().await;
                info!(
                    event_name = "system.sweep.completed",
                    evicted,
                    remaining,
                    "idle sweep evicted conversations"
                );
            } else {
                debug!(event_name = "system.sweep.completed", evicted, "idle sweep found nothing");
            }
        }
    })
}
