//! Task tools - agent-style adapters over the supervisor
//!
//! - `run_background_task`: spawn a command, return its TaskID
//! - `check_task_status`: one task, or the whole list
//! - `cancel_task`: request cancellation of a running task

mod cancel;
mod check;
mod run;

pub use cancel::CancelTaskTool;
pub use check::CheckTaskStatusTool;
pub use run::RunBackgroundTaskTool;

use relay_task::ProcessSupervisor;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Definition of a tool (name, description, JSON Schema parameters)
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDef {
    pub fn builder(name: impl Into<String>, description: impl Into<String>) -> ToolDefBuilder {
        ToolDefBuilder {
            name: name.into(),
            description: description.into(),
            properties: serde_json::Map::new(),
            required: vec![],
        }
    }
}

pub struct ToolDefBuilder {
    name: String,
    description: String,
    properties: serde_json::Map<String, Value>,
    required: Vec<String>,
}

impl ToolDefBuilder {
    pub fn string_param(mut self, name: &str, description: &str, required: bool) -> Self {
        self.properties.insert(
            name.to_string(),
            json!({ "type": "string", "description": description }),
        );
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn build(self) -> ToolDef {
        ToolDef {
            name: self.name,
            description: self.description,
            parameters: json!({
                "type": "object",
                "properties": self.properties,
                "required": self.required,
            }),
        }
    }
}

/// Result of a tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Text shown to the caller
    pub content: String,

    /// Structured payload
    pub details: Value,

    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>, details: Value) -> Self {
        Self {
            content: content.into(),
            details,
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>, details: Value) -> Self {
        Self {
            content: content.into(),
            details,
            is_error: true,
        }
    }

    /// Malformed call arguments
    pub fn invalid_params(err: impl std::fmt::Display) -> Self {
        let message = format!("Invalid parameters: {}", err);
        Self::error(message.clone(), json!({ "error": message }))
    }
}

/// Tool trait
///
/// Every supervisor operation behind these tools is non-blocking, so
/// `execute` is synchronous.
pub trait TaskTool: Send + Sync {
    fn definition(&self) -> ToolDef;

    fn execute(&self, params: Value) -> ToolOutput;

    fn name(&self) -> String {
        self.definition().name
    }
}

/// Registry of the task tools
pub struct TaskTools {
    tools: HashMap<String, Arc<dyn TaskTool>>,
}

impl TaskTools {
    /// All three tools bound to `supervisor`
    pub fn new(supervisor: ProcessSupervisor) -> Self {
        let mut tools = Self {
            tools: HashMap::new(),
        };
        tools.register(Arc::new(RunBackgroundTaskTool::new(supervisor.clone())));
        tools.register(Arc::new(CheckTaskStatusTool::new(supervisor.clone())));
        tools.register(Arc::new(CancelTaskTool::new(supervisor)));
        tools
    }

    pub fn register(&mut self, tool: Arc<dyn TaskTool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskTool>> {
        self.tools.get(name).cloned()
    }

    /// Definitions sorted by name
    pub fn definitions(&self) -> Vec<ToolDef> {
        let mut defs: Vec<ToolDef> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool by name
    pub fn execute(&self, name: &str, params: Value) -> ToolOutput {
        match self.get(name) {
            Some(tool) => tool.execute(params),
            None => ToolOutput::error(
                format!("Unknown tool: {}", name),
                json!({ "error": "unknown_tool" }),
            ),
        }
    }
}
