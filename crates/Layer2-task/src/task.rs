//! Task record and identifiers

use crate::buffer::OutputBuffer;
use crate::state::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for a task
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a new random TaskId (`task_` + 12 hex chars)
    pub fn new() -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self(format!("task_{}", &uuid[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets registries keyed by TaskId be queried with plain strings
impl std::borrow::Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Why a task ended in `TaskStatus::Error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskFailure {
    /// The shell could not be launched at all
    SpawnFailure { message: String },

    /// The process exited with a non-zero code
    NonZeroExit { code: i32 },

    /// The process was killed by a signal nobody on our side sent
    Signalled { signal: i32 },

    /// Reading stdout/stderr or waiting on the process failed
    StreamFault { message: String },
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskFailure::SpawnFailure { message } => write!(f, "spawn failed: {}", message),
            TaskFailure::NonZeroExit { code } => write!(f, "exited with code {}", code),
            TaskFailure::Signalled { signal } => write!(f, "killed by signal {}", signal),
            TaskFailure::StreamFault { message } => write!(f, "stream fault: {}", message),
        }
    }
}

/// State of one background command
///
/// Records handed out by the supervisor are snapshots: changing one does not
/// affect the registry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Unique task identifier
    pub id: TaskId,

    /// Shell command text
    pub command: String,

    /// Caller-supplied label (defaults to the command)
    pub description: String,

    /// Current status
    pub status: TaskStatus,

    /// Rolling stdout buffer
    pub stdout: OutputBuffer,

    /// Rolling stderr buffer
    pub stderr: OutputBuffer,

    /// Exit code, once the process has actually exited with one
    pub exit_code: Option<i32>,

    /// Terminating signal, once the process has been reaped (Unix)
    pub exit_signal: Option<i32>,

    /// Process ID, once launched
    pub pid: Option<u32>,

    /// Typed reason for an `Error` status
    pub failure: Option<TaskFailure>,

    /// When the record was created
    pub started_at: DateTime<Utc>,

    /// When a terminal status was assigned
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Create a pending record
    pub fn new(
        id: TaskId,
        command: impl Into<String>,
        description: impl Into<String>,
        buffer_capacity: usize,
    ) -> Self {
        let command = command.into();
        let description = description.into();
        let description = if description.trim().is_empty() {
            command.clone()
        } else {
            description
        };

        Self {
            id,
            command,
            description,
            status: TaskStatus::Pending,
            stdout: OutputBuffer::with_capacity(buffer_capacity),
            stderr: OutputBuffer::with_capacity(buffer_capacity),
            exit_code: None,
            exit_signal: None,
            pid: None,
            failure: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Mark the process as launched
    pub(crate) fn start(&mut self, pid: Option<u32>) {
        debug_assert!(
            self.status.can_transition_to(TaskStatus::Running),
            "task {} cannot start from {:?}",
            self.id,
            self.status
        );
        self.pid = pid;
        self.status = TaskStatus::Running;
    }

    /// Assign a terminal status; `finished_at` is stamped here and only here
    pub(crate) fn finish(&mut self, status: TaskStatus) {
        debug_assert!(status.is_terminal());
        debug_assert!(
            self.status.can_transition_to(status),
            "task {} cannot move from {:?} to {:?}",
            self.id,
            self.status,
            status
        );
        debug_assert!(self.finished_at.is_none());

        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    /// Mark as failed with a reason
    pub(crate) fn fail(&mut self, failure: TaskFailure) {
        self.failure = Some(failure);
        self.finish(TaskStatus::Error);
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Elapsed time: until `finished_at` when terminal, else until `now`
    pub fn duration_at(&self, now: DateTime<Utc>) -> Duration {
        let end = self.finished_at.unwrap_or(now);
        (end - self.started_at).to_std().unwrap_or_default()
    }

    pub fn duration(&self) -> Duration {
        self.duration_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::DEFAULT_BUFFER_CAPACITY;

    fn record(command: &str, description: &str) -> TaskRecord {
        TaskRecord::new(TaskId::new(), command, description, DEFAULT_BUFFER_CAPACITY)
    }

    #[test]
    fn test_task_id_format() {
        let id = TaskId::new();
        assert!(id.as_str().starts_with("task_"));
        assert_eq!(id.as_str().len(), "task_".len() + 12);
        assert_ne!(id, TaskId::new());
    }

    #[test]
    fn test_description_defaults_to_command() {
        assert_eq!(record("make", "").description, "make");
        assert_eq!(record("make", "  ").description, "make");
        assert_eq!(record("make", "build").description, "build");
    }

    #[test]
    fn test_lifecycle() {
        let mut task = record("sleep 1", "");
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.finished_at.is_none());

        task.start(Some(42));
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.pid, Some(42));
        assert!(task.finished_at.is_none());

        task.finish(TaskStatus::Done);
        assert!(task.is_terminal());
        assert!(task.finished_at.is_some());
    }

    #[test]
    fn test_fail_sets_reason() {
        let mut task = record("false", "");
        task.start(Some(7));
        task.fail(TaskFailure::NonZeroExit { code: 1 });
        assert_eq!(task.status, TaskStatus::Error);
        assert_eq!(task.failure, Some(TaskFailure::NonZeroExit { code: 1 }));
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn test_terminal_status_is_final() {
        let mut task = record("true", "");
        task.start(None);
        task.finish(TaskStatus::Cancelled);
        task.finish(TaskStatus::Done);
    }

    #[test]
    fn test_duration_uses_finished_at() {
        let mut task = record("true", "");
        task.start(None);
        task.finish(TaskStatus::Done);

        let finished = task.finished_at.unwrap();
        let later = finished + chrono::Duration::seconds(60);
        assert_eq!(task.duration_at(later), task.duration_at(finished));
    }

    #[test]
    fn test_serialize_camel_case() {
        let task = record("echo hi", "greet");
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["description"], "greet");
        assert!(json["exitCode"].is_null());
        assert!(json.get("startedAt").is_some());
    }
}
