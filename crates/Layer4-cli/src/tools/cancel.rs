//! cancel_task - request cancellation of a running task

use super::{TaskTool, ToolDef, ToolOutput};
use relay_task::ProcessSupervisor;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct CancelTaskTool {
    supervisor: ProcessSupervisor,
}

#[derive(Debug, Deserialize)]
struct CancelParams {
    task_id: String,
}

impl CancelTaskTool {
    pub fn new(supervisor: ProcessSupervisor) -> Self {
        Self { supervisor }
    }
}

impl TaskTool for CancelTaskTool {
    fn definition(&self) -> ToolDef {
        let grace = self.supervisor.config().grace_period;
        ToolDef::builder(
            "cancel_task",
            format!(
                "Cancel a running background task. Sends SIGTERM first and SIGKILL if the \
                 process is still alive after {:.1}s.",
                grace.as_secs_f64()
            ),
        )
        .string_param("task_id", "ID of the background task to cancel", true)
        .build()
    }

    fn execute(&self, params: Value) -> ToolOutput {
        let params: CancelParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolOutput::invalid_params(e),
        };
        let task_id = params.task_id.trim();

        if self.supervisor.cancel_task(task_id) {
            return ToolOutput::success(
                format!("Cancellation signal sent to task {}.", task_id),
                json!({ "cancelled": true }),
            );
        }

        let reason = match self.supervisor.get_task(task_id) {
            Some(task) => format!(
                "Task is currently \"{}\" and cannot be cancelled (only running tasks can be cancelled).",
                task.status.as_str()
            ),
            None => format!("Task not found: {}.", task_id),
        };
        ToolOutput::error(reason, json!({ "cancelled": false }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_task::{SupervisorConfig, TaskStatus};

    #[tokio::test]
    async fn test_unknown_task() {
        let supervisor = ProcessSupervisor::new(SupervisorConfig::default()).unwrap();
        let tool = CancelTaskTool::new(supervisor);

        let output = tool.execute(json!({ "task_id": "task_nope" }));
        assert!(output.is_error);
        assert_eq!(output.content, "Task not found: task_nope.");
        assert_eq!(output.details, json!({ "cancelled": false }));

        assert!(tool.execute(json!({})).content.starts_with("Invalid parameters"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_then_reject() {
        let supervisor = ProcessSupervisor::new(SupervisorConfig::default()).unwrap();
        let tool = CancelTaskTool::new(supervisor.clone());
        let task = supervisor.spawn("sleep 30", "");

        let output = tool.execute(json!({ "task_id": task.id }));
        assert!(!output.is_error);
        assert_eq!(output.details, json!({ "cancelled": true }));
        assert_eq!(
            supervisor.get_task(&task.id).unwrap().status,
            TaskStatus::Cancelled
        );

        let output = tool.execute(json!({ "task_id": task.id }));
        assert!(output.is_error);
        assert!(output.content.contains("\"cancelled\""));
    }
}
