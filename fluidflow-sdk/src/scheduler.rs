//! Periodic work queue: runs a task body on a fixed cadence.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::error::SimulatorError;

/// What a periodic task wants after one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep the task scheduled.
    Continue,
    /// Deregister the task; it is not invoked again.
    Exit,
}

/// A body that a [`WorkQueue`] invokes once per period.
///
/// `run` must not block: it is called from the runtime and all of its work
/// has to finish within the call.
pub trait PeriodicTask: Send + 'static {
    fn run(&mut self) -> TickOutcome;
}

/// Registers periodic tasks on a tokio runtime.
///
/// Each scheduled task lives on its own tokio task, so invocations of one
/// task never overlap. The first invocation happens one period after
/// registration. If the runtime falls behind, missed invocations are
/// skipped rather than replayed in a burst.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    name: String,
    runtime: Handle,
}

impl WorkQueue {
    /// Bind to the runtime of the calling context.
    pub fn current(name: impl Into<String>) -> Result<Self, SimulatorError> {
        let runtime = Handle::try_current().map_err(|e| SimulatorError::Scheduler(e.to_string()))?;
        Ok(Self::with_handle(name, runtime))
    }

    pub fn with_handle(name: impl Into<String>, runtime: Handle) -> Self {
        Self {
            name: name.into(),
            runtime,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke `task` every `period` until it returns [`TickOutcome::Exit`]
    /// or the returned handle is cleared or dropped.
    pub fn schedule_on_interval<T: PeriodicTask>(
        &self,
        period: Duration,
        mut task: T,
    ) -> Result<ScheduleHandle, SimulatorError> {
        if period.is_zero() {
            return Err(SimulatorError::InvalidPeriod);
        }

        let (clear_tx, mut clear_rx) = watch::channel(false);
        // Dropped with the loop; receivers see the channel close.
        let (done_tx, done_rx) = watch::channel(());
        let name = self.name.clone();

        let join = self.runtime.spawn(async move {
            let _done = done_tx;
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        if task.run() == TickOutcome::Exit {
                            break;
                        }
                    }
                    changed = clear_rx.changed() => {
                        if changed.is_err() || *clear_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!(work_queue = %name, "work item deregistered");
        });

        tracing::debug!(work_queue = %self.name, period_us = period.as_micros() as u64, "work item scheduled");
        Ok(ScheduleHandle {
            clear_tx,
            done_rx,
            join,
        })
    }
}

/// Handle to a scheduled task.
///
/// Dropping the handle deregisters the task, as does [`ScheduleHandle::clear`].
#[derive(Debug)]
pub struct ScheduleHandle {
    clear_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<()>,
    join: JoinHandle<()>,
}

impl ScheduleHandle {
    /// Deregister without waiting for the task body to agree.
    pub fn clear(&self) {
        let _ = self.clear_tx.send(true);
    }

    /// Whether the task has been deregistered.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// A future that resolves once the task is deregistered. It does not
    /// borrow the handle, so it can be moved into other tasks.
    pub fn deregistered(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut done = self.done_rx.clone();
        async move {
            while done.changed().await.is_ok() {}
        }
    }

    /// Wait until the task is deregistered.
    pub async fn join(self) {
        let ScheduleHandle { clear_tx, join, .. } = self;
        let _ = join.await;
        drop(clear_tx);
    }
}
