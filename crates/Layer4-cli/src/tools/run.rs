//! run_background_task - start a long-running command

use super::{TaskTool, ToolDef, ToolOutput};
use relay_task::{ProcessSupervisor, TaskStatus};
use serde::Deserialize;
use serde_json::{json, Value};

pub struct RunBackgroundTaskTool {
    supervisor: ProcessSupervisor,
}

#[derive(Debug, Deserialize)]
struct RunParams {
    command: String,
    #[serde(default)]
    description: String,
}

impl RunBackgroundTaskTool {
    pub fn new(supervisor: ProcessSupervisor) -> Self {
        Self { supervisor }
    }
}

impl TaskTool for RunBackgroundTaskTool {
    fn definition(&self) -> ToolDef {
        ToolDef::builder(
            "run_background_task",
            "Start a long-running shell command (build, clone, data processing) in a \
             background process and return its TaskID immediately. Meant for commands \
             expected to take more than about 10 seconds.",
        )
        .string_param("command", "The shell command to run", true)
        .string_param(
            "description",
            "Short description of the task, e.g. 'build the project'",
            false,
        )
        .build()
    }

    fn execute(&self, params: Value) -> ToolOutput {
        let params: RunParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolOutput::invalid_params(e),
        };

        let command = params.command.trim();
        if command.is_empty() {
            return ToolOutput::invalid_params("command must not be empty");
        }

        let task = self.supervisor.spawn(command, params.description);

        if task.status == TaskStatus::Error {
            let reason = task.stderr.as_str().to_string();
            return ToolOutput::error(
                format!("Failed to start background task: {}", reason),
                json!({ "taskId": task.id, "error": reason }),
            );
        }

        let pid = task
            .pid
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        ToolOutput::success(
            format!(
                "Background task started.\nTaskID: {}\nDescription: {}\nPID: {}\n\n\
                 The conversation can continue; use check_task_status later to follow its progress.",
                task.id, task.description, pid
            ),
            json!({ "taskId": task.id, "pid": task.pid }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_task::SupervisorConfig;

    #[tokio::test]
    async fn test_rejects_missing_command() {
        let supervisor = ProcessSupervisor::new(SupervisorConfig::default()).unwrap();
        let tool = RunBackgroundTaskTool::new(supervisor.clone());

        let output = tool.execute(json!({ "description": "nothing" }));
        assert!(output.is_error);
        assert!(output.content.starts_with("Invalid parameters"));

        let output = tool.execute(json!({ "command": "   " }));
        assert!(output.is_error);
        assert!(supervisor.list_tasks(None).is_empty());
    }

    #[tokio::test]
    async fn test_launch_failure_is_reported() {
        let supervisor = ProcessSupervisor::new(SupervisorConfig {
            shell: Some("/nonexistent/shell".to_string()),
            ..Default::default()
        })
        .unwrap();
        let tool = RunBackgroundTaskTool::new(supervisor);

        let output = tool.execute(json!({ "command": "echo hi" }));
        assert!(output.is_error);
        assert!(output.content.starts_with("Failed to start background task"));
        assert!(output.details["taskId"].as_str().unwrap().starts_with("task_"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_starts_task() {
        let supervisor = ProcessSupervisor::new(SupervisorConfig::default()).unwrap();
        let tool = RunBackgroundTaskTool::new(supervisor.clone());

        let output = tool.execute(json!({ "command": "echo hi", "description": "greet" }));
        assert!(!output.is_error);
        assert!(output.content.contains("Description: greet"));

        let id = output.details["taskId"].as_str().unwrap().to_string();
        assert!(output.details["pid"].is_number());
        assert!(output.content.contains(&format!("TaskID: {}", id)));

        let task = tokio::time::timeout(std::time::Duration::from_secs(10), supervisor.wait(&id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.status, TaskStatus::Done);
    }
}
