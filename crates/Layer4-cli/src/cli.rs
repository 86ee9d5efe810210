//! Non-interactive mode: run one command through the supervisor

use relay_task::{ProcessSupervisor, TaskRecord, TaskStatus};
use std::io::{self, Write};

/// Exit code reported when the task was cancelled (128 + SIGINT)
const CANCELLED_EXIT_CODE: i32 = 130;

/// Run `command` as a supervised task and wait for it
///
/// Ctrl-C cancels the task. Returns the exit code to report.
pub async fn run_once(
    supervisor: &ProcessSupervisor,
    command: &str,
    description: &str,
) -> anyhow::Result<i32> {
    let task = supervisor.spawn(command, description);

    let finished = tokio::select! {
        finished = supervisor.wait(&task.id) => finished,
        _ = tokio::signal::ctrl_c() => {
            supervisor.cancel_task(&task.id);
            supervisor.wait_for_exits().await;
            supervisor.wait(&task.id).await
        }
    };

    let Some(finished) = finished else {
        anyhow::bail!("task {} disappeared before it finished", task.id);
    };

    print_result(&finished)?;
    eprintln!("{}", supervisor.format_task(&without_output(&finished)));

    Ok(exit_code(&finished))
}

fn print_result(task: &TaskRecord) -> io::Result<()> {
    let mut stdout = io::stdout();
    stdout.write_all(task.stdout.as_str().as_bytes())?;
    stdout.flush()?;

    let mut stderr = io::stderr();
    stderr.write_all(task.stderr.as_str().as_bytes())?;
    stderr.flush()
}

/// Header-only copy for the closing summary (output was already printed)
fn without_output(task: &TaskRecord) -> TaskRecord {
    let mut header = task.clone();
    header.stdout = Default::default();
    header.stderr = Default::default();
    header
}

fn exit_code(task: &TaskRecord) -> i32 {
    match task.status {
        TaskStatus::Done => 0,
        TaskStatus::Cancelled => CANCELLED_EXIT_CODE,
        _ => match (task.exit_code, task.exit_signal) {
            (Some(code), _) => code,
            (None, Some(signal)) => 128 + signal,
            (None, None) => 1,
        },
    }
}
