// EN: src/system/process.rs

use crate::models::{ExitCode, LaunchSpec, ProcessState, ProcessSummary, Role, WaitOutcome};
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

/// Read buffer size used when draining a child's output pipes.
const DRAIN_CHUNK_SIZE: usize = 8 * 1024;

/// Why a process could not be started.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The executable path does not exist. Nothing was spawned.
    #[error("The {role} executable was not found at '{}'", .path.display())]
    MissingExecutable {
        /// Which process.
        role: Role,
        /// The path that was checked.
        path: PathBuf,
    },
    /// The OS refused to create the process.
    #[error("The {role} process could not be started from '{}': {source}", .path.display())]
    SpawnFailure {
        /// Which process.
        role: Role,
        /// The executable that was launched.
        path: PathBuf,
        /// The OS error.
        #[source]
        source: io::Error,
    },
}

/// A failure to act on a running process.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Sending a stop request or a kill failed.
    #[error("Could not signal the {role} process (PID: {pid}): {source}")]
    Signal {
        /// Which process.
        role: Role,
        /// Its OS process id.
        pid: u32,
        /// The OS error.
        #[source]
        source: io::Error,
    },
}

/// A spawned OS process owned by the supervisor, plus its observed lifecycle state.
///
/// All operations are safe to call after the process has exited: stop and kill
/// requests become no-ops and waits return the recorded exit.
#[derive(Debug)]
pub struct ManagedProcess {
    role: Role,
    pid: u32,
    child: Child,
    state: ProcessState,
    exit: Option<ExitCode>,
}

impl ManagedProcess {
    /// Starts the process described by `spec`.
    ///
    /// stdout and stderr are piped and drained into the log by background tasks, so the
    /// child never blocks on a full pipe and never writes to the supervisor's console.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// - `MissingExecutable` if the executable path does not exist. Nothing is spawned.
    /// - `SpawnFailure` if the OS refuses to create the process.
    pub fn spawn(role: Role, spec: &LaunchSpec) -> Result<Self, LaunchError> {
        if !spec.executable_exists() {
            return Err(LaunchError::MissingExecutable {
                role,
                path: spec.executable.clone(),
            });
        }

        let working_dir = spec.effective_working_dir();
        let clean_cwd = dunce::simplified(&working_dir);

        let mut command = Command::new(&spec.executable);
        command
            .args(&spec.args)
            .current_dir(clean_cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            if spec.hide_console {
                command.creation_flags(CREATE_NO_WINDOW);
            }
        }

        let mut child = command.spawn().map_err(|source| LaunchError::SpawnFailure {
            role,
            path: spec.executable.clone(),
            source,
        })?;

        // `id()` is only `None` once the child has been reaped, which cannot have happened yet.
        let pid = child.id().unwrap_or_default();
        log::debug!(
            "Spawned {} '{}' in '{}' (PID: {})",
            role,
            spec.executable.display(),
            clean_cwd.display(),
            pid
        );

        if let Some(stdout) = child.stdout.take() {
            drain_output(role, pid, "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            drain_output(role, pid, "stderr", stderr);
        }

        Ok(Self {
            role,
            pid,
            child,
            state: ProcessState::Running,
            exit: None,
        })
    }

    /// Which side of the session this process is.
    pub fn role(&self) -> Role {
        self.role
    }

    /// OS process id assigned at spawn. Kept after the process is reaped.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Last observed lifecycle state.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// The exit observed so far, if any.
    pub fn exit(&self) -> Option<ExitCode> {
        self.exit
    }

    /// A copy of the identity and state that outlives the handle.
    pub fn summary(&self) -> ProcessSummary {
        ProcessSummary {
            role: self.role,
            pid: self.pid,
            state: self.state,
        }
    }

    /// Non-blocking liveness check.
    ///
    /// A poll error is reported as "alive" so that shutdown still escalates.
    pub fn is_alive(&mut self) -> bool {
        if self.exit.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.record_exit(status.into());
                false
            }
            Ok(None) => true,
            Err(e) => {
                log::warn!(
                    "Could not poll the {} process (PID: {}): {}",
                    self.role,
                    self.pid,
                    e
                );
                true
            }
        }
    }

    /// Parks until the process exits and returns how it ended.
    pub async fn wait(&mut self) -> io::Result<ExitCode> {
        if let Some(exit) = self.exit {
            return Ok(exit);
        }
        let status = self.child.wait().await?;
        let exit = ExitCode::from(status);
        self.record_exit(exit);
        Ok(exit)
    }

    /// Like [`wait`](Self::wait), but gives up after `timeout`.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> io::Result<WaitOutcome> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(result) => result.map(WaitOutcome::Exited),
            Err(_) => Ok(WaitOutcome::TimedOut),
        }
    }

    /// Sends a cooperative termination request. Does not wait for the exit.
    ///
    /// On Unix this is `SIGTERM`. Windows has no such request for arbitrary processes,
    /// so there the process is terminated right away.
    pub fn request_graceful_stop(&mut self) -> Result<(), ProcessError> {
        if !self.is_alive() {
            return Ok(());
        }
        self.send_terminate()?;
        if self.state == ProcessState::Running {
            self.state = ProcessState::TerminationRequested;
        }
        Ok(())
    }

    /// Terminates the process immediately (`SIGKILL` / `TerminateProcess`).
    pub fn force_kill(&mut self) -> Result<(), ProcessError> {
        if !self.is_alive() {
            return Ok(());
        }
        match self.child.start_kill() {
            Ok(()) => {
                self.state = ProcessState::Killed;
                Ok(())
            }
            // tokio reports an already reaped child as an invalid input.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(source) => Err(ProcessError::Signal {
                role: self.role,
                pid: self.pid,
                source,
            }),
        }
    }

    /// Last-resort synchronous kill for when the async shutdown sequence cannot run.
    pub fn abandon(&mut self) {
        if self.exit.is_some() {
            return;
        }
        log::warn!(
            "Supervision ended abruptly, killing the {} process (PID: {})",
            self.role,
            self.pid
        );
        if let Err(e) = self.force_kill() {
            log::error!("{}", e);
        }
    }

    fn record_exit(&mut self, exit: ExitCode) {
        self.exit = Some(exit);
        if self.state != ProcessState::Killed {
            self.state = if exit.success() {
                ProcessState::ExitedNormally
            } else {
                ProcessState::ExitedWithError
            };
        }
    }

    #[cfg(unix)]
    fn send_terminate(&mut self) -> Result<(), ProcessError> {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        // Signal through the live handle only: once reaped, the PID may belong to someone else.
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        let raw_pid = i32::try_from(pid).map_err(|_| ProcessError::Signal {
            role: self.role,
            pid,
            source: io::Error::new(io::ErrorKind::InvalidInput, "PID out of range"),
        })?;

        match kill(Pid::from_raw(raw_pid), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(ProcessError::Signal {
                role: self.role,
                pid,
                source: errno.into(),
            }),
        }
    }

    #[cfg(not(unix))]
    fn send_terminate(&mut self) -> Result<(), ProcessError> {
        match self.child.start_kill() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(source) => Err(ProcessError::Signal {
                role: self.role,
                pid: self.pid,
                source,
            }),
        }
    }
}

/// Reads a child pipe until EOF and forwards it to the log one line at a time.
fn drain_output<R>(role: Role, pid: u32, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let reader = BufReader::with_capacity(DRAIN_CHUNK_SIZE, reader);
        let forwarded = forward_lines(reader, |line| {
            log::debug!(target: "tether::child", "[{} {} {}] {}", role, pid, stream, line);
        })
        .await;
        if let Err(e) = forwarded {
            log::debug!("Stopped reading {} of the {} process (PID: {}): {}", stream, role, pid, e);
        }
    });
}

/// Hands every complete line to `emit`, without its line terminator.
///
/// Lines are reassembled across reads of any size. A final line without a
/// trailing newline is still emitted. Invalid UTF-8 is replaced, not rejected.
async fn forward_lines<R, F>(mut reader: BufReader<R>, mut emit: F) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&line);
        emit(text.trim_end_matches(['\r', '\n']));
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;

    const SH: &str = "/bin/sh";

    fn shell(script: &str) -> LaunchSpec {
        LaunchSpec::new(SH).with_args(vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_spawn_missing_executable() {
        let spec = LaunchSpec::new("/definitely/not/here/backend_service");

        let result = ManagedProcess::spawn(Role::Backend, &spec);

        assert!(matches!(
            result,
            Err(LaunchError::MissingExecutable {
                role: Role::Backend,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_spawn_non_executable_file_is_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_a_program");
        fs::write(&path, "plain text").unwrap();

        let result = ManagedProcess::spawn(Role::Frontend, &LaunchSpec::new(&path));

        assert!(matches!(
            result,
            Err(LaunchError::SpawnFailure {
                role: Role::Frontend,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_wait_returns_exit_code() {
        let mut process = ManagedProcess::spawn(Role::Frontend, &shell("exit 3")).unwrap();
        assert_eq!(process.state(), ProcessState::Running);

        let exit = process.wait().await.unwrap();

        assert_eq!(exit.code, Some(3));
        assert_eq!(process.state(), ProcessState::ExitedWithError);
        assert!(!process.is_alive());
    }

    #[tokio::test]
    async fn test_stop_and_kill_are_noops_after_exit() {
        let mut process = ManagedProcess::spawn(Role::Backend, &shell("exit 0")).unwrap();
        process.wait().await.unwrap();

        assert!(process.request_graceful_stop().is_ok());
        assert!(process.force_kill().is_ok());
        assert!(process.request_graceful_stop().is_ok());

        assert_eq!(process.state(), ProcessState::ExitedNormally);
        assert_eq!(process.wait().await.unwrap(), ExitCode::from_code(0));
    }

    #[tokio::test]
    async fn test_graceful_stop_terminates_cooperative_process() {
        let mut process = ManagedProcess::spawn(Role::Backend, &shell("exec sleep 30")).unwrap();
        assert!(process.is_alive());

        process.request_graceful_stop().unwrap();
        assert_eq!(process.state(), ProcessState::TerminationRequested);

        let outcome = process.wait_timeout(Duration::from_secs(5)).await.unwrap();

        assert_eq!(
            outcome,
            WaitOutcome::Exited(ExitCode {
                code: None,
                signal: Some(15)
            })
        );
        assert!(!process.is_alive());
        assert!(!process.state().is_live());
    }

    #[tokio::test]
    async fn test_wait_timeout_then_force_kill() {
        let mut process =
            ManagedProcess::spawn(Role::Backend, &shell("trap '' TERM; exec sleep 30")).unwrap();
        // Give the shell time to install the trap before it is signalled.
        tokio::time::sleep(Duration::from_millis(300)).await;

        process.request_graceful_stop().unwrap();
        let outcome = process
            .wait_timeout(Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(process.is_alive());

        process.force_kill().unwrap();
        let exit = process.wait().await.unwrap();

        assert_eq!(exit.signal, Some(9));
        assert_eq!(process.state(), ProcessState::Killed);
        assert!(process.force_kill().is_ok());
    }

    #[tokio::test]
    async fn test_chatty_child_does_not_stall_on_full_pipe() {
        // Far more than a pipe buffer holds, on both streams.
        let spec = shell("head -c 1000000 /dev/zero; head -c 1000000 /dev/zero 1>&2; exit 0");
        let mut process = ManagedProcess::spawn(Role::Backend, &spec).unwrap();

        let outcome = process.wait_timeout(Duration::from_secs(10)).await.unwrap();

        assert_eq!(outcome, WaitOutcome::Exited(ExitCode::from_code(0)));
    }

    #[tokio::test]
    async fn test_output_is_forwarded_line_by_line() {
        let long_line = "x".repeat(40);
        let input = format!("first line\nsecond\r\n{}\n\nno newline at end", long_line);
        // A buffer far smaller than the lines forces them to span several reads.
        let reader = BufReader::with_capacity(4, input.as_bytes());

        let mut lines = Vec::new();
        forward_lines(reader, |line| lines.push(line.to_string()))
            .await
            .unwrap();

        assert_eq!(
            lines,
            vec![
                "first line".to_string(),
                "second".to_string(),
                long_line,
                String::new(),
                "no newline at end".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_utf8_output_is_replaced() {
        let reader = BufReader::new(&b"caf\xe9\n"[..]);

        let mut lines = Vec::new();
        forward_lines(reader, |line| lines.push(line.to_string()))
            .await
            .unwrap();

        assert_eq!(lines, vec!["caf\u{fffd}".to_string()]);
    }

    #[tokio::test]
    async fn test_abandon_kills_running_process() {
        let mut process = ManagedProcess::spawn(Role::Frontend, &shell("exec sleep 30")).unwrap();

        process.abandon();
        let exit = process.wait().await.unwrap();

        assert_eq!(exit.signal, Some(9));
        assert_eq!(process.summary().state, ProcessState::Killed);
    }
}
