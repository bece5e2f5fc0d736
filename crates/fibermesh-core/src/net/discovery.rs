//! Periodic peer-address discovery worker
//!
//! Polls the configured refresh callback on its interval and feeds each
//! successful result through [`Endpoints::reconcile`]. The cycle runs
//! inline in the tick arm, which is what pauses the periodic task for
//! its duration: no second tick can start a second reconciliation, so
//! cycles never overlap.
//!
//! A failed refresh leaves the next-address snapshot unchanged and the
//! worker ticking; a failed reconciliation is fatal only for that cycle
//! and the worker keeps running so a later tick can retry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, trace, warn};

use crate::config::RefreshFn;
use crate::error::FiberError;
use crate::net::state::{Endpoints, NetContext};

/// Handle to the running discovery worker
pub(crate) struct DiscoveryWorker {
    task: JoinHandle<()>,
}

impl DiscoveryWorker {
    /// Spawn the worker on the fiber's scheduler
    pub(crate) fn spawn(
        ctx: Arc<NetContext>,
        endpoints: Arc<Mutex<Endpoints>>,
        refresh: RefreshFn,
        interval: Duration,
    ) -> Self {
        let scheduler = ctx.scheduler.clone();
        let task = scheduler.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval fires immediately; the
            // first refresh should happen one interval after start.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                trace!("Refreshing peer addresses");

                let result = (refresh)()
                    .await
                    .map_err(|e| FiberError::Discovery(e.to_string()));
                match result {
                    Err(e) => {
                        warn!(error = %e, "Error fetching list of addresses");
                    }
                    Ok(next) => {
                        let mut endpoints = endpoints.lock().await;
                        match endpoints.reconcile(&ctx, next) {
                            Ok(false) => {}
                            Ok(true) => info!("Peer set reconciled"),
                            Err(e) => {
                                // Fatal for this cycle only; ticking resumes.
                                error!(error = %e, "Error cycling addresses");
                            }
                        }
                    }
                }
            }
        });

        Self { task }
    }

    /// Stop the worker; results from an in-flight refresh are discarded
    pub(crate) fn stop(self) {
        self.task.abort();
    }
}
