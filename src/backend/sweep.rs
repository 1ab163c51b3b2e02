//! Periodic TTL sweep for [`LruStore`](super::LruStore).
//!
//! Lazy expiry only frees an entry when it is next read. A sweeper purges
//! expired entries on a fixed interval, taking the same store mutex as
//! `set`/`delete`.
//!
//! The task holds a `Weak` reference to the store, so it never keeps a
//! discarded store alive and exits on the first tick after the last clone is
//! dropped.

use super::lru::StoreInner;
use crate::error::{Error, Result};
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to a running sweep task.
///
/// Call [`SweepHandle::shutdown`] for a graceful stop. Dropping the handle
/// aborts the task.
pub struct SweepHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SweepHandle {
    pub(crate) fn spawn(store: Weak<StoreInner>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::ConfigError(
                "sweep interval must be greater than zero".to_string(),
            ));
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            Error::ConfigError("TTL sweeper requires a running Tokio runtime".to_string())
        })?;

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task = runtime.spawn(async move {
            info!("Starting TTL sweeper with interval {:?}", interval);

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let Some(inner) = store.upgrade() else {
                            debug!("TTL sweeper: store dropped");
                            break;
                        };
                        let removed = inner.purge_expired();
                        if removed > 0 {
                            info!("TTL sweep: removed {} expired entries", removed);
                        } else {
                            debug!("TTL sweep: no expired entries found");
                        }
                    }
                }
            }

            info!("TTL sweeper stopped");
        });

        Ok(SweepHandle {
            stop: Some(stop_tx),
            task: Some(task),
        })
    }

    /// Stop the sweeper and wait for the task to finish.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// `true` once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
