//! Scheduled sweep task.
//!
//! Lazy checks only reclaim drops that somebody touches. The sweeper runs
//! [`DropService::sweep`] on a fixed interval so abandoned drops, stale tokens
//! and old clearances are removed too. Sleeping goes through the
//! [`Environment`], so under a simulated clock the sweeper follows virtual
//! time.
//!
//! Each pass runs on the blocking pool under a timeout, so a stuck backend
//! never holds a runtime worker or delays shutdown. A pass that overruns is
//! logged and left to finish; the schedule skips until it does.

use std::time::Duration;

use tokio::{sync::watch, task::JoinHandle};
use vanish_core::{
    DropError, DropService, Environment, SweepReport,
    storage::{DropStore, ObjectStore},
};

use crate::error::ServerError;

/// Starts sweep tasks.
pub struct Sweeper;

impl Sweeper {
    /// Spawn a task that sweeps `service` every `interval` until stopped.
    ///
    /// The first pass runs one interval after start. A failed pass, or one
    /// still running after `pass_timeout`, is logged and the schedule
    /// continues.
    pub fn start<E, S, O>(
        service: DropService<E, S, O>,
        interval: Duration,
        pass_timeout: Duration,
    ) -> SweeperHandle
    where
        E: Environment,
        S: DropStore,
        O: ObjectStore,
    {
        let (shutdown, mut stopped) = watch::channel(false);

        let task = tokio::spawn(async move {
            let env = service.env().clone();
            let mut passes = 0u64;
            let mut overrun: Option<JoinHandle<Result<SweepReport, DropError>>> = None;

            loop {
                tokio::select! {
                    () = env.sleep(interval) => {},
                    _ = stopped.changed() => break,
                }

                if overrun.as_ref().is_some_and(|pass| !pass.is_finished()) {
                    tracing::warn!("previous sweep pass still running, skipping this one");
                    continue;
                }

                let sweeping = service.clone();
                let mut pass = tokio::task::spawn_blocking(move || sweeping.sweep());

                let finished = tokio::select! {
                    finished = tokio::time::timeout(pass_timeout, &mut pass) => finished,
                    _ = stopped.changed() => break,
                };

                overrun = None;
                match finished {
                    Ok(Ok(Ok(_))) => passes += 1,
                    Ok(Ok(Err(e))) => tracing::error!(error = %e, "sweep pass failed"),
                    Ok(Err(e)) => tracing::error!(error = %e, "sweep task failed"),
                    Err(_) => {
                        tracing::error!(timeout = ?pass_timeout, "sweep pass timed out");
                        overrun = Some(pass);
                    },
                }
            }

            tracing::debug!(passes, "sweeper stopped");
            passes
        });

        SweeperHandle { shutdown, task }
    }
}

/// Handle to a running sweeper.
///
/// Dropping the handle without calling [`SweeperHandle::stop`] also ends the
/// task.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl SweeperHandle {
    /// Signal shutdown and wait for the task to finish.
    ///
    /// Returns the number of completed sweep passes. Does not wait for a
    /// pass still running on the blocking pool.
    ///
    /// # Errors
    ///
    /// `ServerError::Io` if the task panicked.
    pub async fn stop(self) -> Result<u64, ServerError> {
        let _ = self.shutdown.send(true);
        self.task.await.map_err(|e| ServerError::Io(format!("sweeper task failed: {e}")))
    }
}
