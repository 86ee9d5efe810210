//! check_task_status - inspect one task or list all

use super::{TaskTool, ToolDef, ToolOutput};
use relay_task::ProcessSupervisor;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct CheckTaskStatusTool {
    supervisor: ProcessSupervisor,
}

#[derive(Debug, Default, Deserialize)]
struct CheckParams {
    #[serde(default)]
    task_id: Option<String>,
}

impl CheckTaskStatusTool {
    pub fn new(supervisor: ProcessSupervisor) -> Self {
        Self { supervisor }
    }

    fn check_one(&self, task_id: &str) -> ToolOutput {
        let Some(task) = self.supervisor.get_task(task_id) else {
            return ToolOutput::error(
                format!("Task not found: {}", task_id),
                json!({ "error": "not_found" }),
            );
        };

        let content = self.supervisor.format_task(&task);
        match serde_json::to_value(&task) {
            Ok(details) => ToolOutput::success(content, details),
            Err(e) => query_failed(e),
        }
    }

    fn check_all(&self) -> ToolOutput {
        let tasks = self.supervisor.list_tasks(None);
        let content = self.supervisor.formatter().format_task_list(&tasks);

        match serde_json::to_value(&tasks) {
            Ok(tasks) => ToolOutput::success(content, json!({ "tasks": tasks })),
            Err(e) => query_failed(e),
        }
    }
}

fn query_failed(err: serde_json::Error) -> ToolOutput {
    ToolOutput::error(
        format!("Failed to query tasks: {}", err),
        json!({ "error": err.to_string() }),
    )
}

impl TaskTool for CheckTaskStatusTool {
    fn definition(&self) -> ToolDef {
        ToolDef::builder(
            "check_task_status",
            "Show the status and output of a background task. Lists every task when \
             task_id is omitted.",
        )
        .string_param(
            "task_id",
            "ID of the background task; omit to list all tasks",
            false,
        )
        .build()
    }

    fn execute(&self, params: Value) -> ToolOutput {
        let params: CheckParams = if params.is_null() {
            CheckParams::default()
        } else {
            match serde_json::from_value(params) {
                Ok(p) => p,
                Err(e) => return ToolOutput::invalid_params(e),
            }
        };

        match params.task_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => self.check_one(id),
            _ => self.check_all(),
        }
    }
}
