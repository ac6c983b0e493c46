// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

//! Periodic jobs. Subscriptions register their update job and monitored items register their
//! sampling job through the `JobScheduler` trait so the engine can be driven either by real
//! timers (`TokioScheduler`) or on demand (`ManualScheduler`).

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use hashbrown::HashMap;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::{
    core::handle::Handle, deregister_runtime_component, register_runtime_component,
    sync::Mutex,
};

/// A periodic callback. It runs to completion each time it fires.
pub type Job = Box<dyn FnMut() + Send>;

/// Identifies a registered job so it can be unregistered.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobHandle(u32);

impl JobHandle {
    pub fn id(&self) -> u32 {
        self.0
    }
}

pub trait JobScheduler: Send + Sync {
    /// Registers a job that fires every `interval` until it is unregistered. The first firing
    /// happens one interval after registration.
    fn register(&self, interval: Duration, job: Job) -> JobHandle;

    /// Unregisters the job. After this returns the job will not be started again. Unregistering
    /// an unknown handle does nothing.
    fn unregister(&self, handle: JobHandle);
}

/// Converts an interval in milliseconds, as used by the protocol, to a `Duration`. Whole
/// microseconds are kept. Negative or NaN values become zero.
pub fn duration_from_ms(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_micros((ms * 1000.0).round() as u64)
    } else {
        Duration::ZERO
    }
}

static NEXT_SCHEDULER_ID: AtomicU32 = AtomicU32::new(1);

/// Runs each job as a tokio task driven by `tokio::time::interval`.
pub struct TokioScheduler {
    id: u32,
    runtime: tokio::runtime::Handle,
    handles: Mutex<Handle>,
    tasks: Mutex<HashMap<JobHandle, JoinHandle<()>>>,
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        let mut tasks = trace_lock!(self.tasks);
        for (handle, task) in tasks.drain() {
            task.abort();
            deregister_runtime_component!(&component_name(self.id, handle));
        }
    }
}

impl TokioScheduler {
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        Self {
            id: NEXT_SCHEDULER_ID.fetch_add(1, Ordering::Relaxed),
            runtime,
            handles: Mutex::new(Handle::new(1)),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a scheduler for the runtime of the caller. Returns `None` outside of a tokio
    /// runtime.
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }

    /// The name the job's task is registered under in `core::RUNTIME`
    pub fn component_name(&self, handle: JobHandle) -> String {
        component_name(self.id, handle)
    }

    /// The number of jobs currently running
    pub fn len(&self) -> usize {
        trace_lock!(self.tasks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobScheduler for TokioScheduler {
    fn register(&self, interval: Duration, mut job: Job) -> JobHandle {
        // tokio panics on a zero period
        let period = interval.max(Duration::from_millis(1));
        let handle = JobHandle(trace_lock!(self.handles).next());
        let task = self.runtime.spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut tick = tokio::time::interval_at(start, period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                job();
            }
        });
        register_runtime_component!(&self.component_name(handle));
        debug!("Registered job {} with interval {:?}", handle.id(), period);
        trace_lock!(self.tasks).insert(handle, task);
        handle
    }

    fn unregister(&self, handle: JobHandle) {
        if let Some(task) = trace_lock!(self.tasks).remove(&handle) {
            task.abort();
            deregister_runtime_component!(&self.component_name(handle));
            debug!("Unregistered job {}", handle.id());
        }
    }
}

fn component_name(scheduler_id: u32, handle: JobHandle) -> String {
    format!("scheduler-{}/job-{}", scheduler_id, handle.id())
}

struct ManualJob {
    interval: Duration,
    // None while the job is firing
    job: Option<Job>,
}

/// A scheduler whose jobs only run when told to. Tests use it to step the engine through
/// sampling and publishing cycles deterministically.
pub struct ManualScheduler {
    handles: Mutex<Handle>,
    jobs: Mutex<BTreeMap<JobHandle, ManualJob>>,
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self {
            handles: Mutex::new(Handle::new(1)),
            jobs: Mutex::new(BTreeMap::new()),
        }
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires a single job. Returns false if the job is not registered. The job may register or
    /// unregister jobs, including itself, while it runs.
    pub fn fire(&self, handle: JobHandle) -> bool {
        let job = {
            let mut jobs = trace_lock!(self.jobs);
            jobs.get_mut(&handle).and_then(|j| j.job.take())
        };
        let Some(mut job) = job else {
            return false;
        };
        job();
        let mut jobs = trace_lock!(self.jobs);
        if let Some(entry) = jobs.get_mut(&handle) {
            entry.job = Some(job);
        }
        true
    }

    /// Fires every job registered with the interval, in registration order. Returns how many
    /// were fired.
    pub fn fire_every(&self, interval: Duration) -> usize {
        let handles: Vec<JobHandle> = {
            let jobs = trace_lock!(self.jobs);
            jobs.iter()
                .filter(|(_, j)| j.interval == interval)
                .map(|(h, _)| *h)
                .collect()
        };
        handles.into_iter().filter(|h| self.fire(*h)).count()
    }

    /// Fires every registered job once, in registration order.
    pub fn fire_all(&self) -> usize {
        let handles: Vec<JobHandle> = trace_lock!(self.jobs).keys().copied().collect();
        handles.into_iter().filter(|h| self.fire(*h)).count()
    }

    pub fn len(&self) -> usize {
        trace_lock!(self.jobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_registered(&self, handle: JobHandle) -> bool {
        trace_lock!(self.jobs).contains_key(&handle)
    }

    pub fn interval(&self, handle: JobHandle) -> Option<Duration> {
        trace_lock!(self.jobs).get(&handle).map(|j| j.interval)
    }
}

impl JobScheduler for ManualScheduler {
    fn register(&self, interval: Duration, job: Job) -> JobHandle {
        let handle = JobHandle(trace_lock!(self.handles).next());
        trace!("Registered manual job {} with interval {:?}", handle.id(), interval);
        trace_lock!(self.jobs).insert(
            handle,
            ManualJob {
                interval,
                job: Some(job),
            },
        );
        handle
    }

    fn unregister(&self, handle: JobHandle) {
        if trace_lock!(self.jobs).remove(&handle).is_some() {
            trace!("Unregistered manual job {}", handle.id());
        }
    }
}
