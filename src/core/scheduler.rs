//! Priority task scheduler with dependency gating and bounded concurrency.
//!
//! All mutable scheduler state sits behind one `parking_lot::Mutex` that is
//! never held across an `.await` or while an event handler runs. Events are
//! appended to an outbox while the lock is held and delivered afterwards in
//! that same order, so observers see lifecycle events in the order the state
//! actually changed.
//!
//! Dependency handling is event-driven: a task whose dependencies are not yet
//! complete is parked with a count of outstanding dependencies and is pushed
//! onto the ready queue only when that count reaches zero. Dependencies that
//! can never complete (unknown ids, failed or cancelled tasks) fail the
//! dependent immediately, transitively.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::core::notifier::{panic_message, EventBus, Subscription, SubscriptionId};
use crate::core::stats::StatsCounters;
use crate::core::task::TaskRecord;
use crate::core::{
    DependencyProblem, EventKind, FnWork, SchedulerError, SchedulerEvent, SchedulerStats,
    TaskError, TaskId, TaskOptions, TaskOutput, TaskSnapshot, TaskSpec, TaskStatus, TaskWork,
};
use crate::runtime::TokioSpawner;
use crate::util::clock::duration_ms;

/// Future handed to a [`Spawn`] implementation.
pub type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Abstraction for spawning task execution on a runtime.
pub trait Spawn: Send + Sync + 'static {
    /// Spawn a detached future.
    fn spawn(&self, fut: BoxedTask);
}

/// Entry in the ready queue. Ties on priority go to the earlier submission.
#[derive(Debug, Clone, Copy)]
struct QueuedTask {
    id: TaskId,
    priority: i32,
}

fn dispatch_order(a: &QueuedTask, b: &QueuedTask) -> CmpOrdering {
    a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id))
}

type ReadyQueue = crate::infra::PriorityQueue<QueuedTask, fn(&QueuedTask, &QueuedTask) -> CmpOrdering>;

/// Everything a spawned execution needs, captured at dispatch.
struct Launch<T> {
    id: TaskId,
    work: Arc<dyn TaskWork<T>>,
    delay: Duration,
    timeout: Duration,
}

struct SchedulerState<T> {
    next_id: u64,
    /// Pending tasks whose dependencies are all complete.
    queue: ReadyQueue,
    /// Every task ever submitted.
    registry: HashMap<TaskId, TaskRecord<T>>,
    /// Pending tasks still waiting on dependencies, with the outstanding count.
    blocked: HashMap<TaskId, usize>,
    /// Reverse dependency index: task -> tasks blocked on it.
    dependents: HashMap<TaskId, Vec<TaskId>>,
    completed: BTreeSet<TaskId>,
    failed: BTreeSet<TaskId>,
    running: usize,
    /// Set on submission, cleared when the scheduler drains.
    active: bool,
    stats: StatsCounters,
    outbox: VecDeque<SchedulerEvent<T>>,
}

impl<T: TaskOutput> SchedulerState<T> {
    fn new() -> Self {
        Self {
            next_id: 0,
            queue: ReadyQueue::with_comparator(dispatch_order),
            registry: HashMap::new(),
            blocked: HashMap::new(),
            dependents: HashMap::new(),
            completed: BTreeSet::new(),
            failed: BTreeSet::new(),
            running: 0,
            active: false,
            stats: StatsCounters::default(),
            outbox: VecDeque::new(),
        }
    }

    /// Resolve a freshly registered task's dependencies: enqueue it, park it,
    /// or fail it when a dependency can never complete.
    fn admit(&mut self, id: TaskId) {
        let Some(record) = self.registry.get(&id) else {
            return;
        };
        let dependencies = record.dependencies.clone();

        let mut waiting_on = Vec::new();
        for dep in dependencies {
            // Only earlier submissions can be dependencies, which also rules out cycles.
            let status = if dep < id {
                self.registry.get(&dep).map(|r| r.status)
            } else {
                None
            };
            match status {
                Some(TaskStatus::Completed) => {}
                Some(TaskStatus::Failed) => {
                    return self.fail_unsatisfiable(id, dep, DependencyProblem::Failed);
                }
                Some(TaskStatus::Cancelled) => {
                    return self.fail_unsatisfiable(id, dep, DependencyProblem::Cancelled);
                }
                Some(_) => waiting_on.push(dep),
                None => return self.fail_unsatisfiable(id, dep, DependencyProblem::Missing),
            }
        }

        if waiting_on.is_empty() {
            self.enqueue(id);
            return;
        }
        debug!(task_id = %id, outstanding = waiting_on.len(), "task waiting on dependencies");
        self.blocked.insert(id, waiting_on.len());
        for dep in waiting_on {
            self.dependents.entry(dep).or_default().push(id);
        }
    }

    fn enqueue(&mut self, id: TaskId) {
        if let Some(record) = self.registry.get(&id) {
            self.queue.push(QueuedTask {
                id,
                priority: record.priority,
            });
            debug!(task_id = %id, priority = record.priority, depth = self.queue.len(), "task enqueued");
        }
    }

    /// Pop eligible tasks into free slots and mark them running.
    fn dispatch(&mut self, max_concurrent: usize) -> Vec<Launch<T>> {
        let mut launches = Vec::new();
        while self.running < max_concurrent {
            let Some(entry) = self.queue.pop() else {
                break;
            };
            let Some(record) = self.registry.get_mut(&entry.id) else {
                continue;
            };
            if record.status != TaskStatus::Pending || !record.transition(TaskStatus::Running) {
                continue;
            }
            self.running += 1;
            debug!(
                task_id = %entry.id,
                priority = entry.priority,
                running = self.running,
                "dispatching task"
            );
            launches.push(Launch {
                id: entry.id,
                work: Arc::clone(&record.work),
                delay: record.delay,
                timeout: record.timeout,
            });
            self.outbox.push_back(SchedulerEvent::TaskStarted(record.snapshot()));
        }
        launches
    }

    /// Wake dependents of a task that just completed.
    fn release_dependents(&mut self, id: TaskId) {
        for dependent in self.dependents.remove(&id).unwrap_or_default() {
            let Some(outstanding) = self.blocked.get_mut(&dependent) else {
                continue;
            };
            *outstanding -= 1;
            if *outstanding == 0 {
                self.blocked.remove(&dependent);
                self.enqueue(dependent);
            }
        }
    }

    /// Fail `id` because `dependency` can never complete, then every task
    /// transitively blocked on it.
    fn fail_unsatisfiable(&mut self, id: TaskId, dependency: TaskId, reason: DependencyProblem) {
        let mut pending = vec![(id, dependency, reason)];
        while let Some((id, dependency, reason)) = pending.pop() {
            self.blocked.remove(&id);
            let Some(record) = self.registry.get_mut(&id) else {
                continue;
            };
            if record.status != TaskStatus::Pending || !record.transition(TaskStatus::Failed) {
                continue;
            }
            warn!(task_id = %id, %dependency, %reason, "dependency unsatisfiable, failing task");
            let error = TaskError::DependencyUnsatisfiable { dependency, reason };
            record.error = Some(error.clone());
            let task = record.snapshot();

            self.failed.insert(id);
            self.stats.failed_tasks += 1;
            self.outbox.push_back(SchedulerEvent::TaskFailed { task, error });

            for dependent in self.dependents.remove(&id).unwrap_or_default() {
                pending.push((dependent, id, DependencyProblem::Failed));
            }
        }
    }

    fn cancel(&mut self, id: TaskId) -> bool {
        let Some(record) = self.registry.get_mut(&id) else {
            return false;
        };
        if record.status != TaskStatus::Pending || !record.transition(TaskStatus::Cancelled) {
            return false;
        }
        let task = record.snapshot();
        info!(task_id = %id, name = %task.name, "task cancelled");

        self.queue.retain(|entry| entry.id != id);
        self.blocked.remove(&id);
        self.stats.cancelled_tasks += 1;
        self.outbox.push_back(SchedulerEvent::TaskCancelled(task));

        for dependent in self.dependents.remove(&id).unwrap_or_default() {
            self.fail_unsatisfiable(dependent, id, DependencyProblem::Cancelled);
        }
        true
    }

    /// Mark the start of an attempt. Returns the attempt number.
    fn begin_attempt(&mut self, id: TaskId) -> u32 {
        let Some(record) = self.registry.get_mut(&id) else {
            return 0;
        };
        if record.status == TaskStatus::Retrying {
            record.transition(TaskStatus::Running);
        }
        record.attempts += 1;
        record.started_at.get_or_insert_with(Instant::now);
        record.attempts
    }

    /// Spend one retry on a failed attempt. Returns `false` when the budget
    /// is exhausted.
    fn schedule_retry(&mut self, id: TaskId, error: &TaskError) -> bool {
        let Some(record) = self.registry.get_mut(&id) else {
            return false;
        };
        if record.retries_remaining == 0 || !record.transition(TaskStatus::Retrying) {
            return false;
        }
        record.retries_remaining -= 1;
        warn!(
            task_id = %id,
            name = %record.name,
            retries_remaining = record.retries_remaining,
            %error,
            "attempt failed, retrying"
        );
        self.outbox.push_back(SchedulerEvent::TaskRetrying {
            task: record.snapshot(),
            error: error.clone(),
        });
        true
    }

    /// Record the terminal outcome of a dispatched task and free its slot.
    fn finish(&mut self, id: TaskId, outcome: Result<T, TaskError>) {
        self.running = self.running.saturating_sub(1);
        let Some(record) = self.registry.get_mut(&id) else {
            return;
        };

        match outcome {
            Ok(result) => {
                record.result = Some(result.clone());
                record.transition(TaskStatus::Completed);
                let duration = record.duration().unwrap_or_default();
                info!(
                    task_id = %id,
                    name = %record.name,
                    duration_ms = duration_ms(duration),
                    attempts = record.attempts,
                    "task completed"
                );
                let task = record.snapshot();

                self.completed.insert(id);
                self.stats.completed_tasks += 1;
                self.stats.total_duration += duration;
                self.outbox.push_back(SchedulerEvent::TaskCompleted { task, result });
                self.release_dependents(id);
            }
            Err(error) => {
                record.error = Some(error.clone());
                record.transition(TaskStatus::Failed);
                warn!(
                    task_id = %id,
                    name = %record.name,
                    attempts = record.attempts,
                    %error,
                    "task failed"
                );
                let task = record.snapshot();

                self.failed.insert(id);
                self.stats.failed_tasks += 1;
                self.outbox.push_back(SchedulerEvent::TaskFailed { task, error });
                for dependent in self.dependents.remove(&id).unwrap_or_default() {
                    self.fail_unsatisfiable(dependent, id, DependencyProblem::Failed);
                }
            }
        }
    }

    fn is_drained(&self) -> bool {
        self.running == 0 && self.queue.is_empty()
    }
}

struct Inner<T: TaskOutput> {
    config: SchedulerConfig,
    state: Mutex<SchedulerState<T>>,
    events: EventBus<SchedulerEvent<T>>,
    /// Held by whichever thread is currently delivering the outbox.
    flushing: Mutex<()>,
    spawner: Arc<dyn Spawn>,
}

impl<T: TaskOutput> Inner<T> {
    /// Fill free slots, detect the drained state, and deliver pending events.
    fn pump(self: &Arc<Self>) {
        let launches = {
            let mut state = self.state.lock();
            let launches = state.dispatch(self.config.max_concurrent);
            if state.active && state.is_drained() {
                state.active = false;
                let stats = state.stats.snapshot();
                info!(
                    total = stats.total_tasks,
                    completed = stats.completed_tasks,
                    failed = stats.failed_tasks,
                    cancelled = stats.cancelled_tasks,
                    "all tasks completed"
                );
                state.outbox.push_back(SchedulerEvent::AllTasksCompleted(stats));
            }
            launches
        };

        for launch in launches {
            let inner = Arc::clone(self);
            self.spawner.spawn(Box::pin(inner.execute(launch)));
        }
        self.flush();
    }

    /// Deliver queued events in order. Only one thread delivers at a time; a
    /// thread that finds delivery in progress leaves its events to it.
    fn flush(&self) {
        loop {
            let Some(guard) = self.flushing.try_lock() else {
                return;
            };
            while let Some(event) = self.next_event() {
                self.events.publish(&event);
            }
            drop(guard);
            // Events pushed while we were releasing the guard would be stranded.
            if self.state.lock().outbox.is_empty() {
                return;
            }
        }
    }

    /// Pop the next deliverable event. A drain notice is dropped when work was
    /// submitted after it was queued; the next drain publishes a fresh one.
    fn next_event(&self) -> Option<SchedulerEvent<T>> {
        let mut state = self.state.lock();
        loop {
            match state.outbox.pop_front() {
                Some(SchedulerEvent::AllTasksCompleted(_)) if state.active => {
                    debug!("dropping superseded drain notice");
                }
                next => return next,
            }
        }
    }

    /// Run a dispatched task through delay, attempts and retries to a
    /// terminal state.
    async fn execute(self: Arc<Self>, launch: Launch<T>) {
        let Launch {
            id,
            work,
            delay,
            timeout,
        } = launch;

        if !delay.is_zero() {
            debug!(task_id = %id, delay_ms = duration_ms(delay), "delaying task start");
            tokio::time::sleep(delay).await;
        }

        let outcome = loop {
            let attempt = self.state.lock().begin_attempt(id);
            debug!(task_id = %id, attempt, "starting attempt");

            match run_attempt(work.as_ref(), timeout).await {
                Ok(value) => break Ok(value),
                Err(error) => {
                    let retry = self.state.lock().schedule_retry(id, &error);
                    if !retry {
                        break Err(error);
                    }
                    self.flush();
                    tokio::time::sleep(self.config.retry_backoff()).await;
                }
            }
        };

        self.state.lock().finish(id, outcome);
        self.pump();
    }
}

/// Race one attempt of `work` against `timeout`.
///
/// When the timer wins the work future is dropped, so a late result can never
/// be observed.
async fn run_attempt<T: TaskOutput>(work: &dyn TaskWork<T>, timeout: Duration) -> Result<T, TaskError> {
    let attempt = AssertUnwindSafe(work.run()).catch_unwind();
    match tokio::time::timeout(timeout, attempt).await {
        Err(_) => Err(TaskError::TimeoutExceeded {
            timeout_ms: duration_ms(timeout),
        }),
        Ok(Err(panic)) => Err(TaskError::WorkFailure(format!(
            "panicked: {}",
            panic_message(panic.as_ref())
        ))),
        Ok(Ok(Err(err))) => Err(TaskError::WorkFailure(format!("{err:#}"))),
        Ok(Ok(Ok(value))) => Ok(value),
    }
}

/// In-process task scheduler.
///
/// Tasks are submitted with a priority (lower runs first), an optional delay,
/// a retry budget, a per-attempt timeout and dependencies on earlier tasks.
/// At most `max_concurrent` tasks occupy a slot at once. Lifecycle events are
/// published through the embedded [`EventBus`].
///
/// `Scheduler` is a cheap handle; clones share the same scheduler.
///
/// ```rust,ignore
/// use prometheus_task_scheduler::{Scheduler, SchedulerConfig, TaskOptions};
///
/// let scheduler = Scheduler::<String>::new(SchedulerConfig::default())?;
/// let fetch = scheduler.add_task("fetch", || async { Ok("data".to_string()) }, TaskOptions::new().with_priority(1));
/// scheduler.add_task(
///     "report",
///     || async { Ok("report".to_string()) },
///     TaskOptions::new().with_dependencies([fetch]),
/// );
/// let stats = scheduler.wait_for_completion().await;
/// assert_eq!(stats.completed_tasks, 2);
/// ```
pub struct Scheduler<T: TaskOutput> {
    inner: Arc<Inner<T>>,
}

impl<T: TaskOutput> Clone for Scheduler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: TaskOutput> fmt::Debug for Scheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Scheduler")
            .field("config", &self.inner.config)
            .field("queued", &state.queue.len())
            .field("blocked", &state.blocked.len())
            .field("running", &state.running)
            .field("total_tasks", &state.stats.total_tasks)
            .finish_non_exhaustive()
    }
}

impl<T: TaskOutput> Scheduler<T> {
    /// Create a scheduler that spawns on the current tokio runtime.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let spawner = TokioSpawner::current()?;
        Self::with_spawner(config, Arc::new(spawner))
    }

    /// Create a scheduler that launches executions through `spawner`.
    pub fn with_spawner(config: SchedulerConfig, spawner: Arc<dyn Spawn>) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        debug!(?config, "scheduler created");
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(SchedulerState::new()),
                events: EventBus::new(),
                flushing: Mutex::new(()),
                spawner,
            }),
        })
    }

    /// Submit a task whose work is a closure returning a future.
    ///
    /// Returns the new task's id without waiting for it to run.
    pub fn add_task<F, Fut>(&self, name: impl Into<String>, work: F, options: TaskOptions) -> TaskId
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.add_work(name, Arc::new(FnWork::new(work)), options)
    }

    /// Submit a task backed by a [`TaskWork`] implementation.
    pub fn add_work(&self, name: impl Into<String>, work: Arc<dyn TaskWork<T>>, options: TaskOptions) -> TaskId {
        let id = {
            let mut state = self.inner.state.lock();
            let id = TaskId::new(state.next_id);
            state.next_id += 1;

            let record = TaskRecord::new(
                id,
                name.into(),
                work,
                options,
                self.inner.config.default_timeout(),
            );
            info!(
                task_id = %id,
                name = %record.name,
                priority = record.priority,
                dependencies = record.dependencies.len(),
                "task added"
            );
            state.outbox.push_back(SchedulerEvent::TaskAdded(record.snapshot()));
            state.registry.insert(id, record);
            state.stats.total_tasks += 1;
            state.active = true;
            state.admit(id);
            id
        };
        self.inner.pump();
        id
    }

    /// Submit several tasks in order, returning their ids in the same order.
    pub fn add_bulk_tasks<I>(&self, specs: I) -> Vec<TaskId>
    where
        I: IntoIterator<Item = TaskSpec<T>>,
    {
        specs
            .into_iter()
            .map(|spec| self.add_work(spec.name, spec.work, spec.options))
            .collect()
    }

    /// Snapshot of a task, or `None` for an unknown id.
    pub fn get_task(&self, id: TaskId) -> Option<TaskSnapshot<T>> {
        self.inner.state.lock().registry.get(&id).map(TaskRecord::snapshot)
    }

    /// Current aggregate statistics.
    pub fn get_stats(&self) -> SchedulerStats {
        self.inner.state.lock().stats.snapshot()
    }

    /// Cancel a pending task. Returns `false` if the task is unknown or has
    /// already been dispatched or finished.
    ///
    /// Tasks waiting on the cancelled one fail with
    /// [`TaskError::DependencyUnsatisfiable`].
    pub fn cancel_task(&self, id: TaskId) -> bool {
        let cancelled = self.inner.state.lock().cancel(id);
        if cancelled {
            self.inner.pump();
        }
        cancelled
    }

    /// Wait until the scheduler drains, returning the stats at that point.
    ///
    /// Returns immediately when nothing is queued or running.
    pub async fn wait_for_completion(&self) -> SchedulerStats {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let subscription = self
            .inner
            .events
            .subscribe_once(EventKind::AllTasksCompleted, move |event| {
                if let SchedulerEvent::AllTasksCompleted(stats) = event {
                    if let Some(tx) = tx.lock().take() {
                        let _ = tx.send(stats.clone());
                    }
                }
            });

        {
            let state = self.inner.state.lock();
            if !state.active && state.outbox.is_empty() {
                let stats = state.stats.snapshot();
                drop(state);
                subscription.unsubscribe();
                return stats;
            }
        }

        rx.await.unwrap_or_else(|_| self.get_stats())
    }

    /// Whether nothing is queued, blocked or running.
    pub fn is_idle(&self) -> bool {
        !self.inner.state.lock().active
    }

    /// Tasks currently occupying a concurrency slot.
    pub fn running_count(&self) -> usize {
        self.inner.state.lock().running
    }

    /// Eligible tasks waiting for a slot.
    pub fn queued_count(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Pending tasks waiting on dependencies.
    pub fn blocked_count(&self) -> usize {
        self.inner.state.lock().blocked.len()
    }

    /// Ids of completed tasks, ascending.
    pub fn completed_ids(&self) -> Vec<TaskId> {
        self.inner.state.lock().completed.iter().copied().collect()
    }

    /// Ids of failed tasks, ascending.
    pub fn failed_ids(&self) -> Vec<TaskId> {
        self.inner.state.lock().failed.iter().copied().collect()
    }

    /// Configuration in effect.
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// The notifier lifecycle events are published on.
    pub fn events(&self) -> &EventBus<SchedulerEvent<T>> {
        &self.inner.events
    }

    /// Register a handler for every future event of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription<SchedulerEvent<T>>
    where
        F: Fn(&SchedulerEvent<T>) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(kind, handler)
    }

    /// Register a handler for the next event of `kind` only.
    pub fn subscribe_once<F>(&self, kind: EventKind, handler: F) -> Subscription<SchedulerEvent<T>>
    where
        F: Fn(&SchedulerEvent<T>) + Send + Sync + 'static,
    {
        self.inner.events.subscribe_once(kind, handler)
    }

    /// Remove a handler registration.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(kind, id)
    }
}
