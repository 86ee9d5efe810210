//! Process Supervisor - background shell commands
//!
//! Features:
//! - Spawn a shell command and return its record immediately
//! - Rolling stdout/stderr capture
//! - Graceful cancellation with forced kill after a grace period
//! - Lifecycle events (start / done / error / cancel)
//!
//! The task registry and the process handles live behind one lock, so a
//! reader never sees a record whose status disagrees with its handle:
//! a handle exists exactly while the record is `Running`. Events are
//! published after the lock is released.

mod process;

use crate::buffer::DEFAULT_BUFFER_CAPACITY;
use crate::event::TaskEvent;
use crate::format::StatusFormatter;
use crate::state::TaskStatus;
use crate::task::{TaskFailure, TaskId, TaskRecord};
use parking_lot::Mutex;
use process::{ProcessHandle, Signal, Stream};
use relay_foundation::{Error, EventBus, EventListener, ListenerId, RelayConfig, Result};
use std::collections::HashMap;
use std::io;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default delay between graceful and forced termination
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Default characters of output shown in summaries
pub const DEFAULT_SUMMARY_TAIL: usize = 500;

/// Slack on top of the grace period when waiting for cancelled processes
const EXIT_MARGIN: Duration = Duration::from_secs(1);

/// Configuration for the supervisor
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Rolling buffer capacity per stream, in characters
    pub max_buffer_chars: usize,

    /// Delay between the graceful and the forced signal on cancel
    pub grace_period: Duration,

    /// Characters of output shown in status summaries
    pub summary_tail_chars: usize,

    /// Shell override (`sh -c` / `cmd /C` when unset)
    pub shell: Option<String>,

    /// Run each command in its own process group and signal the group
    pub kill_process_group: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_buffer_chars: DEFAULT_BUFFER_CAPACITY,
            grace_period: DEFAULT_GRACE_PERIOD,
            summary_tail_chars: DEFAULT_SUMMARY_TAIL,
            shell: None,
            kill_process_group: true,
        }
    }
}

impl From<&RelayConfig> for SupervisorConfig {
    fn from(config: &RelayConfig) -> Self {
        let defaults = Self::default();
        Self {
            max_buffer_chars: config.max_buffer_chars.unwrap_or(defaults.max_buffer_chars),
            grace_period: config
                .grace_period_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.grace_period),
            summary_tail_chars: config
                .summary_tail_chars
                .unwrap_or(defaults.summary_tail_chars),
            shell: config.shell.clone().filter(|s| !s.trim().is_empty()),
            kill_process_group: config
                .kill_process_group
                .unwrap_or(defaults.kill_process_group),
        }
    }
}

#[derive(Default)]
struct Registry {
    /// All tasks by ID
    tasks: HashMap<TaskId, TaskRecord>,

    /// Insertion order, for listing
    order: Vec<TaskId>,

    /// Live processes; present iff the task is `Running`
    processes: HashMap<TaskId, ProcessHandle>,

    /// Cancelled processes not yet reaped
    terminating: HashMap<TaskId, ProcessHandle>,
}

struct Inner {
    config: SupervisorConfig,
    runtime: Handle,
    registry: Mutex<Registry>,
    events: EventBus<TaskEvent>,

    /// Woken on every terminal transition and every reap
    settled: Notify,
}

/// Process Supervisor - owns every background task
#[derive(Clone)]
pub struct ProcessSupervisor {
    inner: Arc<Inner>,
}

impl ProcessSupervisor {
    /// Create a supervisor bound to the current tokio runtime
    ///
    /// Must be called from within a runtime; `spawn` may then be called
    /// from any thread, including event listeners.
    pub fn new(config: SupervisorConfig) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Runtime(format!("supervisor needs a tokio runtime: {}", e)))?;

        Ok(Self::with_runtime(config, runtime))
    }

    /// Create a supervisor that spawns its work onto `runtime`
    pub fn with_runtime(config: SupervisorConfig, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                runtime,
                registry: Mutex::new(Registry::default()),
                events: EventBus::new(),
                settled: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    /// Formatter using the configured summary tail length
    pub fn formatter(&self) -> StatusFormatter {
        StatusFormatter::new(self.inner.config.summary_tail_chars)
    }

    // ========================================================================
    // Spawn
    // ========================================================================

    /// Launch `command` through the shell and return its record
    ///
    /// Never fails: a launch failure yields a record in `Error` status
    /// with the reason in stderr, and an `Error` event.
    pub fn spawn(&self, command: impl Into<String>, description: impl Into<String>) -> TaskRecord {
        let command = command.into();
        let id = self.inner.fresh_id();
        let mut record = TaskRecord::new(
            id.clone(),
            command.as_str(),
            description,
            self.inner.config.max_buffer_chars,
        );

        let launched = {
            let _guard = self.inner.runtime.enter();
            process::shell_command(&command, &self.inner.config)
                .spawn()
                .map_err(|e| Error::spawn(&command, e))
        };

        match launched {
            Ok(child) => {
                let pid = child.id();
                let (handle, signals) = ProcessHandle::new();
                record.start(pid);

                {
                    let mut registry = self.inner.registry.lock();
                    registry.order.push(id.clone());
                    registry.processes.insert(id.clone(), handle);
                    registry.tasks.insert(id.clone(), record.clone());
                }

                debug!(task_id = %id, pid = ?pid, command = %command, "Started background task");
                self.inner.events.publish(&TaskEvent::Start(record.clone()));

                self.inner
                    .runtime
                    .spawn(supervise(Arc::clone(&self.inner), id, child, signals));
            }
            Err(err) => {
                let message = err.to_string();
                warn!(task_id = %id, error = %message, "Failed to launch background task");

                record.stderr.append(&message);
                record.fail(TaskFailure::SpawnFailure { message });

                {
                    let mut registry = self.inner.registry.lock();
                    registry.order.push(id.clone());
                    registry.tasks.insert(id, record.clone());
                }

                self.inner.events.publish(&TaskEvent::Error(record.clone()));
                self.inner.settled.notify_waiters();
            }
        }

        record
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Snapshot of one task
    pub fn get_task(&self, id: impl AsRef<str>) -> Option<TaskRecord> {
        self.inner.registry.lock().tasks.get(id.as_ref()).cloned()
    }

    /// Snapshots in insertion order, optionally filtered by status
    pub fn list_tasks(&self, status: Option<TaskStatus>) -> Vec<TaskRecord> {
        let registry = self.inner.registry.lock();
        registry
            .order
            .iter()
            .filter_map(|id| registry.tasks.get(id))
            .filter(|task| status.map_or(true, |s| task.status == s))
            .cloned()
            .collect()
    }

    pub fn running_count(&self) -> usize {
        self.inner.registry.lock().processes.len()
    }

    /// Format one task with the configured tail length
    pub fn format_task(&self, record: &TaskRecord) -> String {
        self.formatter().format_task(record)
    }

    /// Wait until the task reaches a terminal status
    ///
    /// Returns `None` for unknown IDs (or if the task is removed by
    /// `cleanup` while waiting, which only happens after it settled).
    pub async fn wait(&self, id: impl AsRef<str>) -> Option<TaskRecord> {
        let id = id.as_ref();
        loop {
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let task = self.get_task(id)?;
            if task.is_terminal() {
                return Some(task);
            }
            notified.await;
        }
    }

    // ========================================================================
    // Cancellation
    // ========================================================================

    /// Cancel a running task
    ///
    /// Sends the graceful signal now and the forced one after the grace
    /// period, unless the process is gone by then. Returns `false` for
    /// unknown or non-running tasks.
    pub fn cancel_task(&self, id: impl AsRef<str>) -> bool {
        let id = id.as_ref();

        let (record, handle) = {
            let mut registry = self.inner.registry.lock();
            let Registry {
                tasks,
                processes,
                terminating,
                ..
            } = &mut *registry;

            let Some(task) = tasks.get_mut(id) else {
                return false;
            };
            if !task.status.is_running() {
                return false;
            }
            let Some(handle) = processes.remove(id) else {
                warn!(task_id = %id, "Running task has no process handle");
                return false;
            };

            task.finish(TaskStatus::Cancelled);
            terminating.insert(task.id.clone(), handle.clone());
            (task.clone(), handle)
        };

        debug!(task_id = %record.id, "Cancelled task");

        if !handle.signal(Signal::Terminate) {
            debug!(task_id = %record.id, "Process exited before it could be signalled");
        }
        self.inner.schedule_kill(record.id.clone(), handle);

        self.inner.events.publish(&TaskEvent::Cancel(record));
        self.inner.settled.notify_waiters();
        true
    }

    /// Cancel every running task, returning the IDs that were cancelled
    pub fn cancel_all(&self) -> Vec<TaskId> {
        let running: Vec<TaskId> = self.inner.registry.lock().processes.keys().cloned().collect();

        let cancelled: Vec<TaskId> = running
            .into_iter()
            .filter(|id| self.cancel_task(id))
            .collect();

        if !cancelled.is_empty() {
            debug!(count = cancelled.len(), "Cancelled running tasks");
        }
        cancelled
    }

    /// Wait until every cancelled process has been reaped
    ///
    /// Cancellation only queues the signals; call this before the runtime
    /// goes away. Bounded by the grace period plus a margin, `false` if a
    /// process was still alive when the bound expired.
    pub async fn wait_for_exits(&self) -> bool {
        let handles: Vec<ProcessHandle> = self
            .inner
            .registry
            .lock()
            .terminating
            .values()
            .cloned()
            .collect();
        if handles.is_empty() {
            return true;
        }

        let bound = self.inner.config.grace_period + EXIT_MARGIN;
        let all_exited = async {
            for handle in &handles {
                handle.exited().await;
            }
        };

        match tokio::time::timeout(bound, all_exited).await {
            Ok(()) => true,
            Err(_) => {
                let remaining = self.inner.registry.lock().terminating.len();
                warn!(remaining, bound = ?bound, "Cancelled processes still running");
                false
            }
        }
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Drop every task in a terminal status, returning how many were removed
    pub fn cleanup(&self) -> usize {
        let mut registry = self.inner.registry.lock();
        let before = registry.tasks.len();

        registry.tasks.retain(|_, task| !task.is_terminal());
        let Registry { tasks, order, .. } = &mut *registry;
        order.retain(|id| tasks.contains_key(id));

        let removed = before - registry.tasks.len();
        if removed > 0 {
            debug!("Cleaned up {} finished tasks", removed);
        }
        removed
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub fn subscribe(&self, listener: Arc<dyn EventListener<TaskEvent>>) -> ListenerId {
        self.inner.events.subscribe(listener)
    }

    pub fn subscribe_fn<F>(&self, name: impl Into<String>, handler: F) -> ListenerId
    where
        F: Fn(&TaskEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe_fn(name, handler)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.events.unsubscribe(id)
    }
}

impl Inner {
    /// Random ID not already in the registry
    fn fresh_id(&self) -> TaskId {
        let registry = self.registry.lock();
        loop {
            let id = TaskId::new();
            if !registry.tasks.contains_key(&id) {
                return id;
            }
        }
    }

    fn append_output(&self, id: &TaskId, stream: Stream, chunk: &str) {
        let mut registry = self.registry.lock();
        // Gone after cleanup; late output is dropped
        if let Some(task) = registry.tasks.get_mut(id) {
            match stream {
                Stream::Stdout => task.stdout.append(chunk),
                Stream::Stderr => task.stderr.append(chunk),
            }
        }
    }

    /// Forced kill after the grace period, unless the process exits first
    fn schedule_kill(&self, id: TaskId, handle: ProcessHandle) {
        let grace = self.config.grace_period;
        self.runtime.spawn(async move {
            tokio::select! {
                _ = handle.exited() => {
                    debug!(task_id = %id, "Process exited within the grace period");
                }
                _ = tokio::time::sleep(grace) => {
                    if handle.signal(Signal::Kill) {
                        warn!(task_id = %id, grace = ?grace, "Process outlived the grace period, force killing");
                    }
                }
            }
        });
    }

    /// Record the exit and settle the task, unless it was cancelled first
    fn finalize(&self, id: &TaskId, exit: io::Result<ExitStatus>, mut faults: Vec<String>) {
        let event = {
            let mut registry = self.registry.lock();
            registry.processes.remove(id);
            registry.terminating.remove(id);

            let Some(task) = registry.tasks.get_mut(id) else {
                debug!(task_id = %id, "Task was removed before it exited");
                return;
            };

            match &exit {
                Ok(status) => {
                    let (code, signal) = process::exit_parts(status);
                    task.exit_code = code;
                    task.exit_signal = signal;
                }
                Err(err) => faults.insert(0, format!("failed to wait for process: {}", err)),
            }

            if task.status == TaskStatus::Cancelled {
                debug!(
                    task_id = %id,
                    exit_code = ?task.exit_code,
                    exit_signal = ?task.exit_signal,
                    "Discarding exit of cancelled task"
                );
                None
            } else {
                debug_assert!(task.status.is_running());

                let failure = if !faults.is_empty() {
                    let message = faults.join("; ");
                    warn!(task_id = %id, error = %message, "Output stream fault");
                    if !task.stderr.is_empty() {
                        task.stderr.append("\n");
                    }
                    task.stderr.append(&message);
                    Some(TaskFailure::StreamFault { message })
                } else {
                    match (task.exit_code, task.exit_signal) {
                        (Some(0), _) => None,
                        (Some(code), _) => Some(TaskFailure::NonZeroExit { code }),
                        (None, Some(signal)) => Some(TaskFailure::Signalled { signal }),
                        (None, None) => Some(TaskFailure::StreamFault {
                            message: "process exited without a status".to_string(),
                        }),
                    }
                };

                match failure {
                    None => {
                        task.finish(TaskStatus::Done);
                        debug!(task_id = %id, "Task completed");
                        Some(TaskEvent::Done(task.clone()))
                    }
                    Some(failure) => {
                        debug!(task_id = %id, failure = %failure, "Task failed");
                        task.fail(failure);
                        Some(TaskEvent::Error(task.clone()))
                    }
                }
            }
        };

        // Listeners first, so a woken waiter sees their effects
        if let Some(event) = event {
            self.events.publish(&event);
        }
        self.settled.notify_waiters();
    }
}

/// Owns the child until it is reaped and its pipes are drained
///
/// Dropping `signals` at the end is what tells a pending forced kill that
/// the process is gone.
async fn supervise(
    inner: Arc<Inner>,
    id: TaskId,
    mut child: Child,
    mut signals: mpsc::UnboundedReceiver<Signal>,
) {
    let pid = child.id();
    let kill_group = inner.config.kill_process_group;

    let mut pumps: Vec<JoinHandle<io::Result<()>>> = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        pumps.push(spawn_pump(&inner, &id, Stream::Stdout, stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        pumps.push(spawn_pump(&inner, &id, Stream::Stderr, stderr));
    }

    let mut signals_open = true;

    let exit = loop {
        tokio::select! {
            status = child.wait() => break status,
            signal = signals.recv(), if signals_open => match signal {
                Some(signal) => send_signal(&mut child, &id, pid, signal, kill_group, false),
                None => signals_open = false,
            },
        }
    };

    // Descendants may still hold the pipes open; signals keep reaching
    // them through the group until the output is drained
    let drain = async {
        let mut faults = Vec::new();
        for pump in pumps {
            match pump.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => faults.push(format!("output read failed: {}", err)),
                Err(err) => faults.push(format!("output reader aborted: {}", err)),
            }
        }
        faults
    };
    tokio::pin!(drain);

    let faults = loop {
        tokio::select! {
            faults = &mut drain => break faults,
            signal = signals.recv(), if signals_open => match signal {
                Some(signal) => send_signal(&mut child, &id, pid, signal, kill_group, true),
                None => signals_open = false,
            },
        }
    };

    inner.finalize(&id, exit, faults);
    drop(signals);
}

fn spawn_pump<R>(inner: &Arc<Inner>, id: &TaskId, stream: Stream, reader: R) -> JoinHandle<io::Result<()>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let inner = Arc::clone(inner);
    let id = id.clone();
    tokio::spawn(async move {
        process::pump(reader, |chunk| inner.append_output(&id, stream, chunk)).await
    })
}

fn send_signal(
    child: &mut Child,
    id: &TaskId,
    pid: Option<u32>,
    signal: Signal,
    kill_group: bool,
    reaped: bool,
) {
    debug!(task_id = %id, signal = ?signal, "Delivering signal");
    if let Err(err) = process::deliver(child, pid, signal, kill_group, reaped) {
        warn!(task_id = %id, error = %err, "Failed to signal process");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_relay_config() {
        let relay = RelayConfig {
            max_buffer_chars: Some(100),
            grace_period_ms: Some(250),
            shell: Some("  ".to_string()),
            ..Default::default()
        };

        let config = SupervisorConfig::from(&relay);
        assert_eq!(config.max_buffer_chars, 100);
        assert_eq!(config.grace_period, Duration::from_millis(250));
        assert_eq!(config.summary_tail_chars, DEFAULT_SUMMARY_TAIL);
        assert_eq!(config.shell, None);
        assert!(config.kill_process_group);
    }

    #[test]
    fn test_new_requires_runtime() {
        let err = ProcessSupervisor::new(SupervisorConfig::default()).err();
        assert!(matches!(err, Some(Error::Runtime(_))));
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let supervisor = ProcessSupervisor::new(SupervisorConfig::default()).unwrap();
        assert!(supervisor.get_task("task_missing").is_none());
        assert!(!supervisor.cancel_task("task_missing"));
        assert!(supervisor.wait("task_missing").await.is_none());
        assert!(supervisor.list_tasks(None).is_empty());
        assert_eq!(supervisor.cleanup(), 0);
    }

    #[tokio::test]
    async fn test_spawn_failure_with_missing_shell() {
        let config = SupervisorConfig {
            shell: Some("/nonexistent/relay-shell".to_string()),
            ..Default::default()
        };
        let supervisor = ProcessSupervisor::new(config).unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        supervisor.subscribe_fn("test", move |event: &TaskEvent| sink.lock().push(event.kind()));

        let record = supervisor.spawn("echo hi", "");
        assert_eq!(record.status, TaskStatus::Error);
        assert!(record.finished_at.is_some());
        assert!(record.stderr.as_str().starts_with("Failed to spawn process: echo hi"));
        assert!(matches!(record.failure, Some(TaskFailure::SpawnFailure { .. })));
        assert_eq!(supervisor.running_count(), 0);

        assert_eq!(*events.lock(), vec![crate::event::TaskEventKind::Error]);
        assert_eq!(supervisor.get_task(&record.id).unwrap().status, TaskStatus::Error);
    }
}
