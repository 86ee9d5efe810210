//! Task lifecycle events

use crate::task::TaskRecord;
use serde::Serialize;

/// Event kind, without the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskEventKind {
    Start,
    Done,
    Error,
    Cancel,
}

impl TaskEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskEventKind::Start => "start",
            TaskEventKind::Done => "done",
            TaskEventKind::Error => "error",
            TaskEventKind::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for TaskEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle notification, carrying a snapshot of the record taken when the
/// transition happened
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "task", rename_all = "lowercase")]
pub enum TaskEvent {
    /// Process launched (`Running`)
    Start(TaskRecord),

    /// Exited with code 0
    Done(TaskRecord),

    /// Spawn failure, non-zero exit or stream fault
    Error(TaskRecord),

    /// Cancellation accepted; the process may still be shutting down
    Cancel(TaskRecord),
}

impl TaskEvent {
    pub fn kind(&self) -> TaskEventKind {
        match self {
            TaskEvent::Start(_) => TaskEventKind::Start,
            TaskEvent::Done(_) => TaskEventKind::Done,
            TaskEvent::Error(_) => TaskEventKind::Error,
            TaskEvent::Cancel(_) => TaskEventKind::Cancel,
        }
    }

    pub fn record(&self) -> &TaskRecord {
        match self {
            TaskEvent::Start(task)
            | TaskEvent::Done(task)
            | TaskEvent::Error(task)
            | TaskEvent::Cancel(task) => task,
        }
    }

    pub fn into_record(self) -> TaskRecord {
        match self {
            TaskEvent::Start(task)
            | TaskEvent::Done(task)
            | TaskEvent::Error(task)
            | TaskEvent::Cancel(task) => task,
        }
    }
}
