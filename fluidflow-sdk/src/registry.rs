//! Explicit ownership of running simulator tasks.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fluidflow_types::{FlowParams, FlowSample};
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::bus::Bus;
use crate::clock::MonotonicClock;
use crate::config::SimulatorConfig;
use crate::error::SimulatorError;
use crate::output::Output;
use crate::params::ParameterStore;
use crate::perf::{PerfCounter, PerfSummary};
use crate::scheduler::{ScheduleHandle, WorkQueue};
use crate::simulator::{FlowSimulator, StopSignal, TaskStats};

/// Handle to a task started through a [`TaskRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a registered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    /// Stop was requested; the next tick deregisters.
    StopRequested,
    Stopped,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Running => "running",
            TaskState::StopRequested => "stopping",
            TaskState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskStatus {
    pub id: TaskId,
    pub name: String,
    pub topic: String,
    pub state: TaskState,
    pub published: u64,
    pub regenerations: u64,
    pub rejected_updates: u64,
    pub last_sample: Option<FlowSample>,
    pub params: FlowParams,
    pub perf: PerfSummary,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}: {} on '{}'", self.name, self.id, self.state, self.topic)?;
        match self.last_sample {
            Some(sample) => writeln!(
                f,
                "  flow rate: {:.2} l/min at {} us",
                sample.flow_rate,
                sample.timestamp.as_micros()
            )?,
            None => writeln!(f, "  flow rate: (nothing published yet)")?,
        }
        writeln!(
            f,
            "  range: [{:.2}, {:.2}) l/min, change interval {} us",
            self.params.min_flow, self.params.max_flow, self.params.change_interval_micros
        )?;
        writeln!(
            f,
            "  published {}, regenerated {}, rejected updates {}",
            self.published, self.regenerations, self.rejected_updates
        )?;
        write!(f, "  {}", self.perf)
    }
}

#[derive(Debug)]
struct TaskEntry {
    name: String,
    topic: String,
    stop: StopSignal,
    stats: Arc<TaskStats>,
    perf: Arc<PerfCounter>,
    schedule: ScheduleHandle,
    outputs: Vec<JoinHandle<()>>,
}

impl TaskEntry {
    fn state(&self) -> TaskState {
        if self.stats.is_stopped() || self.schedule.is_finished() {
            TaskState::Stopped
        } else if self.stop.is_requested() {
            TaskState::StopRequested
        } else {
            TaskState::Running
        }
    }

    fn is_live(&self) -> bool {
        self.state() != TaskState::Stopped
    }

    fn status(&self, id: TaskId) -> TaskStatus {
        TaskStatus {
            id,
            name: self.name.clone(),
            topic: self.topic.clone(),
            state: self.state(),
            published: self.stats.published(),
            regenerations: self.stats.regenerations(),
            rejected_updates: self.stats.rejected_updates(),
            last_sample: self.stats.last_sample(),
            params: self.stats.active_params(),
            perf: self.perf.summary(),
        }
    }

    fn detach_outputs(&mut self) {
        for output in self.outputs.drain(..) {
            output.abort();
        }
    }
}

/// Owns every task started in the process, keyed by [`TaskId`].
///
/// Tasks share the registry's bus and parameter store. At most one live
/// task may hold a given name.
#[derive(Debug)]
pub struct TaskRegistry {
    tasks: RwLock<BTreeMap<TaskId, TaskEntry>>,
    next_id: AtomicU64,
    bus: Bus,
    store: ParameterStore,
}

impl TaskRegistry {
    pub fn new(bus: Bus, store: ParameterStore) -> Self {
        Self {
            tasks: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            bus,
            store,
        }
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    /// Seed the shared store with `config.params`, then construct a
    /// simulator bound to that store and schedule it on the current tokio
    /// runtime.
    ///
    /// Later updates go through [`TaskRegistry::store`]. Other tasks sharing
    /// the store see the seeded values too. On failure nothing is retained
    /// and the store is left untouched.
    pub fn start(&self, config: &SimulatorConfig) -> Result<TaskId, SimulatorError> {
        config.validate()?;

        let mut tasks = self.tasks.write();
        if tasks
            .values()
            .any(|entry| entry.name == config.module_name && entry.is_live())
        {
            return Err(SimulatorError::AlreadyRunning(config.module_name.clone()));
        }

        let queue = WorkQueue::current(config.module_name.as_str())?;
        self.store.set_all(config.params);

        let mut builder = FlowSimulator::builder(Arc::new(self.bus.clone()))
            .name(config.module_name.as_str())
            .topic(config.topic.as_str())
            .params(self.store.clone())
            .clock(Arc::new(MonotonicClock::new()));
        if let Some(seed) = config.seed {
            builder = builder.seed(seed);
        }
        let simulator = builder.build()?;

        let stop = simulator.stop_signal();
        let stats = simulator.stats();
        let perf = simulator.perf();
        let schedule = queue.schedule_on_interval(config.period(), simulator)?;

        let outputs = config
            .outputs
            .iter()
            .map(|output| {
                Output::from(output).attach_until(
                    &self.bus,
                    &config.topic,
                    schedule.deregistered(),
                )
            })
            .collect();

        // A stopped task with the same name is replaced.
        let stale: Vec<TaskId> = tasks
            .iter()
            .filter(|(_, entry)| entry.name == config.module_name)
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            if let Some(mut entry) = tasks.remove(&id) {
                entry.detach_outputs();
            }
        }

        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tasks.insert(
            id,
            TaskEntry {
                name: config.module_name.clone(),
                topic: config.topic.clone(),
                stop,
                stats,
                perf,
                schedule,
                outputs,
            },
        );

        tracing::info!(
            task = %id,
            name = %config.module_name,
            topic = %config.topic,
            period_us = config.period_micros,
            "simulator started"
        );
        Ok(id)
    }

    /// Request a task to stop. It deregisters on its next tick.
    pub fn stop(&self, id: TaskId) -> Result<(), SimulatorError> {
        let tasks = self.tasks.read();
        match tasks.get(&id) {
            Some(entry) if entry.is_live() => {
                entry.stop.request();
                tracing::info!(task = %id, name = %entry.name, "stop requested");
                Ok(())
            }
            _ => Err(SimulatorError::NotRunning(id)),
        }
    }

    /// Stop the live task registered under `name`.
    pub fn stop_by_name(&self, name: &str) -> Result<TaskId, SimulatorError> {
        let id = self
            .find(name)
            .ok_or_else(|| SimulatorError::Config(format!("{name} is not running")))?;
        self.stop(id)?;
        Ok(id)
    }

    /// The most recent task registered under `name`.
    pub fn find(&self, name: &str) -> Option<TaskId> {
        self.tasks
            .read()
            .iter()
            .rev()
            .find(|(_, entry)| entry.name == name)
            .map(|(id, _)| *id)
    }

    pub fn status(&self, id: TaskId) -> Option<TaskStatus> {
        self.tasks.read().get(&id).map(|entry| entry.status(id))
    }

    /// Status of every known task, oldest first.
    pub fn list(&self) -> Vec<TaskStatus> {
        self.tasks
            .read()
            .iter()
            .map(|(id, entry)| entry.status(*id))
            .collect()
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.tasks
            .read()
            .values()
            .any(|entry| entry.name == name && entry.is_live())
    }

    /// Forget stopped tasks. Returns how many were removed.
    pub fn purge_stopped(&self) -> usize {
        let mut tasks = self.tasks.write();
        let stopped: Vec<TaskId> = tasks
            .iter()
            .filter(|(_, entry)| !entry.is_live())
            .map(|(id, _)| *id)
            .collect();
        for id in &stopped {
            if let Some(mut entry) = tasks.remove(id) {
                entry.detach_outputs();
            }
        }
        stopped.len()
    }

    /// Stop every task and wait for each to deregister.
    pub async fn shutdown(&self) {
        let entries: Vec<(TaskId, TaskEntry)> = {
            let mut tasks = self.tasks.write();
            std::mem::take(&mut *tasks).into_iter().collect()
        };

        for (id, mut entry) in entries {
            entry.stop.request();
            entry.schedule.clear();
            entry.detach_outputs();
            entry.schedule.join().await;
            tracing::debug!(task = %id, name = %entry.name, "task shut down");
        }
    }
}
