//! Background outbox flusher.
//!
//! Mutations only queue their remote writes; this worker delivers them on
//! an interval, so a failed write surfaces as a `Pending` sync status and
//! is retried with backoff instead of being lost. Logout does not stop
//! the worker; queued writes drain regardless of session state.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use togather_store::RemoteGateway;

use crate::state::SharedState;

/// Spawn the periodic flush task. Abort the returned handle to stop it.
pub fn spawn_sync_worker<G>(state: SharedState, gateway: G, interval: Duration) -> JoinHandle<()>
where
    G: RemoteGateway + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let report = {
                let mut guard = state.lock().await;
                guard.store.flush_pending(&gateway, Utc::now()).await
            };

            if report.delivered > 0 || report.requeued > 0 {
                debug!(
                    delivered = report.delivered,
                    requeued = report.requeued,
                    "Outbox flush pass"
                );
            }
        }
    })
}
