//! Child process plumbing
//!
//! - Shell command construction (stdin closed, stdout/stderr piped)
//! - Output pumps (raw chunks, UTF-8 safe across reads)
//! - Signal delivery (SIGTERM -> SIGKILL escalation on Unix)

use super::SupervisorConfig;
use crate::buffer::Utf8Decoder;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// Read size for output pumps
const READ_CHUNK: usize = 8 * 1024;

/// Which output stream a chunk came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stream {
    Stdout,
    Stderr,
}

/// Termination request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    /// Graceful (SIGTERM)
    Terminate,
    /// Forced (SIGKILL)
    Kill,
}

impl Signal {
    #[cfg(unix)]
    fn to_nix(self) -> nix::sys::signal::Signal {
        match self {
            Signal::Terminate => nix::sys::signal::Signal::SIGTERM,
            Signal::Kill => nix::sys::signal::Signal::SIGKILL,
        }
    }
}

/// Registry-side handle to a live process
///
/// Signals are not sent by pid from here: they go through a channel to the
/// task that owns the `Child`, which only acts on them while the process
/// group can still be addressed. The channel closes once that task is done
/// with the process, which doubles as the exit acknowledgement.
#[derive(Debug, Clone)]
pub(crate) struct ProcessHandle {
    signals: mpsc::UnboundedSender<Signal>,
}

impl ProcessHandle {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<Signal>) {
        let (signals, rx) = mpsc::unbounded_channel();
        (Self { signals }, rx)
    }

    /// Request a signal; `false` if the process is already gone
    pub(crate) fn signal(&self, signal: Signal) -> bool {
        self.signals.send(signal).is_ok()
    }

    /// Resolves once the process has exited and its output is drained
    pub(crate) async fn exited(&self) {
        self.signals.closed().await
    }
}

/// Build the platform shell invocation for `command`
pub(crate) fn shell_command(command: &str, config: &SupervisorConfig) -> Command {
    let (shell, flag) = match config.shell.as_deref() {
        Some(shell) => (shell, shell_flag(shell)),
        None if cfg!(windows) => ("cmd", "/C"),
        None => ("sh", "-c"),
    };

    let mut cmd = Command::new(shell);
    cmd.arg(flag)
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so signals reach everything the shell started
    #[cfg(unix)]
    {
        if config.kill_process_group {
            cmd.process_group(0);
        }
    }

    cmd
}

fn shell_flag(shell: &str) -> &'static str {
    let name = Path::new(shell)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(shell)
        .to_ascii_lowercase();

    match name.as_str() {
        "cmd" => "/C",
        "powershell" | "pwsh" => "-Command",
        _ => "-c",
    }
}

/// Copy a pipe into `sink` chunk by chunk until EOF
pub(crate) async fn pump<R, F>(mut reader: R, mut sink: F) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut buf = vec![0u8; READ_CHUNK];
    let mut decoder = Utf8Decoder::default();

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let text = decoder.decode(&buf[..n]);
        if !text.is_empty() {
            sink(&text);
        }
    }

    let rest = decoder.finish();
    if !rest.is_empty() {
        sink(&rest);
    }
    Ok(())
}

/// Send `signal` to the process (group)
///
/// Once the shell has been reaped its pid may be recycled, so it is only
/// addressed through its process group, which the kernel keeps reserved
/// while any member is alive.
#[cfg(unix)]
pub(crate) fn deliver(
    _child: &mut Child,
    pid: Option<u32>,
    signal: Signal,
    kill_group: bool,
    reaped: bool,
) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, killpg};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        return Ok(());
    };
    let pid = Pid::from_raw(pid as i32);

    let sent = if kill_group {
        killpg(pid, signal.to_nix())
    } else if reaped {
        return Ok(());
    } else {
        kill(pid, signal.to_nix())
    };

    match sent {
        // Already gone
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(errno.into()),
    }
}

#[cfg(not(unix))]
pub(crate) fn deliver(
    child: &mut Child,
    _pid: Option<u32>,
    _signal: Signal,
    _kill_group: bool,
    reaped: bool,
) -> io::Result<()> {
    // No graceful option on Windows; both phases terminate the process
    if reaped {
        Ok(())
    } else {
        child.start_kill()
    }
}

/// Split an exit status into (code, signal)
pub(crate) fn exit_parts(status: &ExitStatus) -> (Option<i32>, Option<i32>) {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        (status.code(), status.signal())
    }
    #[cfg(not(unix))]
    {
        (status.code(), None)
    }
}
