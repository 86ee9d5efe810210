//! Status Formatter - human-readable task summaries
//!
//! Pure functions over record snapshots; nothing here touches the registry.

use crate::buffer::OutputBuffer;
use crate::event::TaskEvent;
use crate::state::TaskStatus;
use crate::supervisor::DEFAULT_SUMMARY_TAIL;
use crate::task::TaskRecord;
use chrono::{DateTime, Utc};

/// Characters of stderr quoted in failure notifications
pub const NOTIFICATION_ERROR_TAIL: usize = 200;

/// Separator between records in a task list
const LIST_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFormatter {
    /// Characters of each stream included in a summary
    tail_chars: usize,
}

impl Default for StatusFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_TAIL)
    }
}

impl StatusFormatter {
    pub fn new(tail_chars: usize) -> Self {
        Self { tail_chars }
    }

    pub fn tail_chars(&self) -> usize {
        self.tail_chars
    }

    /// One-record summary, elapsed time measured against the wall clock
    pub fn format_task(&self, record: &TaskRecord) -> String {
        self.format_task_at(record, Utc::now())
    }

    /// One-record summary, elapsed time measured against `now`
    ///
    /// ```text
    /// [task_0a1b2c3d4e5f] ⟳ Running | build docs | 3.2s (running)
    /// Output:
    /// ...last characters of stdout
    /// ```
    pub fn format_task_at(&self, record: &TaskRecord, now: DateTime<Utc>) -> String {
        let secs = record.duration_at(now).as_secs_f64();
        let elapsed = if record.is_terminal() {
            format!("{:.1}s", secs)
        } else {
            format!("{:.1}s (running)", secs)
        };

        let mut out = format!(
            "[{}] {} {} | {} | {}",
            record.id,
            record.status.symbol(),
            record.status.display_name(),
            record.description,
            elapsed
        );

        if !record.stdout.is_empty() {
            out.push_str("\nOutput:\n");
            out.push_str(&self.excerpt(&record.stdout));
        }

        // stderr is noise unless the task failed
        if record.status == TaskStatus::Error && !record.stderr.is_empty() {
            out.push_str("\nErrors:\n");
            out.push_str(&self.excerpt(&record.stderr));
        }

        out
    }

    /// Summary of many records
    pub fn format_task_list(&self, records: &[TaskRecord]) -> String {
        if records.is_empty() {
            return "No background tasks.".to_string();
        }

        let now = Utc::now();
        let body = records
            .iter()
            .map(|record| self.format_task_at(record, now))
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR);

        let noun = if records.len() == 1 { "task" } else { "tasks" };
        format!("{} {}:\n\n{}", records.len(), noun, body)
    }

    /// Short notice for finished tasks; `None` for start and cancel events
    pub fn format_notification(&self, event: &TaskEvent) -> Option<String> {
        match event {
            TaskEvent::Done(record) => Some(format!(
                "[Background task done] {}\nTaskID: {}",
                record.description, record.id
            )),
            TaskEvent::Error(record) => {
                let preview = if record.stderr.is_empty() {
                    "unknown error".to_string()
                } else {
                    record.stderr.tail(NOTIFICATION_ERROR_TAIL).0.to_string()
                };
                Some(format!(
                    "[Background task failed] {}\nTaskID: {}\nError: {}",
                    record.description, record.id, preview
                ))
            }
            TaskEvent::Start(_) | TaskEvent::Cancel(_) => None,
        }
    }

    fn excerpt(&self, buffer: &OutputBuffer) -> String {
        match buffer.tail(self.tail_chars) {
            (tail, true) => format!("...{}", tail),
            (tail, false) => tail.to_string(),
        }
    }
}
