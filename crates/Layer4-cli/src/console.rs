//! Interactive console
//!
//! Reads one command per line from stdin:
//!
//! ```text
//! run [<description> --] <command>   start a background task
//! status [<id>]                      one task, or all of them
//! list [<status>]                    tasks, optionally by status
//! cancel <id>                        cancel a running task
//! cleanup                            forget finished tasks
//! help | exit
//! ```

use crate::tools::{TaskTools, ToolOutput};
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use relay_task::{ProcessSupervisor, TaskStatus};
use serde_json::json;
use std::io::{self, Write};
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

const PROMPT: &str = "relay> ";

const HELP: &str = "\
Commands:
  run [<description> --] <command>   Start a background task
  status [<id>]                      Show one task, or all tasks
  list [<status>]                    List tasks (pending|running|done|error|cancelled)
  cancel <id>                        Cancel a running task
  cleanup                            Remove finished tasks
  help                               Show this help
  exit                               Cancel running tasks and quit";

/// A parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Run {
        command: String,
        description: String,
    },
    Status(Option<String>),
    List(Option<TaskStatus>),
    Cancel(String),
    Cleanup,
    Help,
    Exit,
    Empty,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "" => Ok(Self::Empty),
            "run" => parse_run(rest),
            "status" => Ok(Self::Status(non_empty(rest))),
            "list" | "ls" => match non_empty(rest) {
                Some(status) => status.parse().map(|s| Self::List(Some(s))),
                None => Ok(Self::List(None)),
            },
            "cancel" => non_empty(rest)
                .map(Self::Cancel)
                .ok_or_else(|| "usage: cancel <id>".to_string()),
            "cleanup" => Ok(Self::Cleanup),
            "help" | "?" => Ok(Self::Help),
            "exit" | "quit" => Ok(Self::Exit),
            other => Err(format!("unknown command: {} (type 'help')", other)),
        }
    }
}

fn parse_run(rest: &str) -> Result<ConsoleCommand, String> {
    let split = rest
        .split_once(" -- ")
        .or_else(|| rest.strip_suffix(" --").map(|description| (description, "")));

    let (description, command) = match split {
        Some((description, command)) => (description.trim(), command.trim()),
        None => ("", rest.trim_start_matches("-- ").trim()),
    };

    if command.is_empty() {
        return Err("usage: run [<description> --] <command>".to_string());
    }

    Ok(ConsoleCommand::Run {
        command: command.to_string(),
        description: description.to_string(),
    })
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// What the loop should do after a command
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Error(String),
    Silent,
    Exit,
}

impl From<ToolOutput> for Reply {
    fn from(output: ToolOutput) -> Self {
        if output.is_error {
            Reply::Error(output.content)
        } else {
            Reply::Text(output.content)
        }
    }
}

pub struct Console {
    supervisor: ProcessSupervisor,
    tools: TaskTools,
}

impl Console {
    pub fn new(supervisor: ProcessSupervisor) -> Self {
        let tools = TaskTools::new(supervisor.clone());
        Self { supervisor, tools }
    }

    /// Execute one command; never waits on a child process
    pub fn handle(&self, command: ConsoleCommand) -> Reply {
        match command {
            ConsoleCommand::Run {
                command,
                description,
            } => self
                .tools
                .execute(
                    "run_background_task",
                    json!({ "command": command, "description": description }),
                )
                .into(),
            ConsoleCommand::Status(task_id) => self
                .tools
                .execute("check_task_status", json!({ "task_id": task_id }))
                .into(),
            ConsoleCommand::List(status) => {
                let tasks = self.supervisor.list_tasks(status);
                Reply::Text(self.supervisor.formatter().format_task_list(&tasks))
            }
            ConsoleCommand::Cancel(task_id) => self
                .tools
                .execute("cancel_task", json!({ "task_id": task_id }))
                .into(),
            ConsoleCommand::Cleanup => {
                let removed = self.supervisor.cleanup();
                Reply::Text(format!("Removed {} finished task(s).", removed))
            }
            ConsoleCommand::Help => Reply::Text(HELP.to_string()),
            ConsoleCommand::Exit => Reply::Exit,
            ConsoleCommand::Empty => Reply::Silent,
        }
    }

    /// Read-eval loop until `exit`, EOF or Ctrl-C
    pub async fn run(self) -> anyhow::Result<()> {
        println!("relay console - type 'help' for commands");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("{}", PROMPT);
            io::stdout().flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    None
                }
            };

            let Some(line) = line else {
                break;
            };

            let reply = match line.parse::<ConsoleCommand>() {
                Ok(command) => self.handle(command),
                Err(e) => Reply::Error(e),
            };

            match reply {
                Reply::Text(text) => println!("{}", text),
                Reply::Error(text) => print_error(&text)?,
                Reply::Silent => {}
                Reply::Exit => break,
            }
        }

        let cancelled = self.supervisor.cancel_all();
        if !cancelled.is_empty() {
            println!("Cancelled {} running task(s).", cancelled.len());
            if !self.supervisor.wait_for_exits().await {
                warn!("Some cancelled processes did not exit before shutdown");
            }
        }
        debug!("Console closed");
        Ok(())
    }
}

fn print_error(text: &str) -> io::Result<()> {
    execute!(
        io::stdout(),
        SetForegroundColor(Color::Red),
        Print(format!("{}\n", text)),
        ResetColor
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_task::SupervisorConfig;

    #[test]
    fn test_parse_run() {
        assert_eq!(
            "run build docs -- make docs".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Run {
                command: "make docs".to_string(),
                description: "build docs".to_string(),
            }
        );
        assert_eq!(
            "run cargo build --release".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Run {
                command: "cargo build --release".to_string(),
                description: String::new(),
            }
        );
        assert!("run".parse::<ConsoleCommand>().is_err());
        assert!("run docs -- ".parse::<ConsoleCommand>().is_err());
    }

    #[test]
    fn test_parse_others() {
        assert_eq!("".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Empty));
        assert_eq!("status".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Status(None)));
        assert_eq!(
            "status task_1".parse::<ConsoleCommand>(),
            Ok(ConsoleCommand::Status(Some("task_1".to_string())))
        );
        assert_eq!(
            "LIST running".parse::<ConsoleCommand>(),
            Ok(ConsoleCommand::List(Some(TaskStatus::Running)))
        );
        assert!("list sideways".parse::<ConsoleCommand>().is_err());
        assert!("cancel".parse::<ConsoleCommand>().is_err());
        assert_eq!("quit".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Exit));
        assert!("frobnicate".parse::<ConsoleCommand>().is_err());
    }

    #[tokio::test]
    async fn test_handle_without_tasks() {
        let console = Console::new(ProcessSupervisor::new(SupervisorConfig::default()).unwrap());

        assert_eq!(
            console.handle(ConsoleCommand::Status(None)),
            Reply::Text("No background tasks.".to_string())
        );
        assert_eq!(
            console.handle(ConsoleCommand::Cleanup),
            Reply::Text("Removed 0 finished task(s).".to_string())
        );
        assert!(matches!(
            console.handle(ConsoleCommand::Cancel("task_x".to_string())),
            Reply::Error(_)
        ));
        assert_eq!(console.handle(ConsoleCommand::Exit), Reply::Exit);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_then_list() {
        let supervisor = ProcessSupervisor::new(SupervisorConfig::default()).unwrap();
        let console = Console::new(supervisor.clone());

        let reply = console.handle("run nap -- sleep 30".parse().unwrap());
        assert!(matches!(&reply, Reply::Text(text) if text.contains("Description: nap")));

        let Reply::Text(listing) = console.handle(ConsoleCommand::List(Some(TaskStatus::Running)))
        else {
            panic!("expected a listing");
        };
        assert!(listing.starts_with("1 task:"));

        assert_eq!(supervisor.cancel_all().len(), 1);
        assert!(supervisor.wait_for_exits().await);
    }
}
