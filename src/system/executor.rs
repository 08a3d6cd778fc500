// src/system/executor.rs

use crate::CancellationToken;
use crate::system::shell;
use std::collections::HashMap;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, Command as StdCommand, ExitStatus, Stdio};
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command could not be parsed: {0}")]
    CommandParse(String),
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, std::io::Error),
    #[error("Command '{command}' produced output that was not valid UTF-8")]
    InvalidUtf8Output {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
    #[error("Operation was interrupted by the user.")]
    Interrupted,
}

/// The outcome of one command: the rolling status that chain links gate on.
/// A non-zero exit code or a signal is a normal outcome here, never an
/// `ExecutionError` — command failures must not unwind the session.
#[derive(Debug, Clone, Default)]
pub struct CommandResult {
    pub code: Option<i32>,
    pub signal: Option<i32>,
    pub timed_out: bool,
    /// Stdout, when the capture flag was set.
    pub captured: Option<String>,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.code == Some(0) && !self.timed_out
    }

    /// The synthesized result of an in-process callback.
    pub fn synthetic(ok: bool) -> Self {
        Self {
            code: Some(if ok { 0 } else { 1 }),
            ..Self::default()
        }
    }

    pub fn describe(&self) -> String {
        if self.timed_out {
            return "timed out".to_string();
        }
        match (self.code, self.signal) {
            (Some(code), _) => format!("exit code {code}"),
            (None, Some(signal)) => format!("signal {signal}"),
            (None, None) => "unknown status".to_string(),
        }
    }

    fn from_status(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: signal_of(status),
            timed_out: false,
            captured: None,
        }
    }
}

#[cfg(unix)]
fn signal_of(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: ExitStatus) -> Option<i32> {
    None
}

/// Everything a single synchronous execution needs.
pub struct ExecRequest<'a> {
    pub command_line: &'a str,
    pub cwd: &'a Path,
    pub env: &'a HashMap<String, String>,
    pub capture: bool,
    pub timeout: Option<Duration>,
    pub login_shell: bool,
}

/// Executes a command and blocks until it finishes. The wait is a `try_wait`
/// polling loop so a configured timeout can terminate the child and the
/// cancellation token can abort between ticks; interactive callers simply
/// never set the token while a foreground command is in flight.
pub fn run_sync(
    request: &ExecRequest<'_>,
    cancellation: &CancellationToken,
) -> Result<CommandResult, ExecutionError> {
    let trimmed = request.command_line.trim();
    if trimmed.is_empty() {
        // An empty command is a success, not an error.
        return Ok(CommandResult::synthetic(true));
    }

    let mut child = spawn_child(trimmed, request)?;

    // Drain stdout on a separate thread when capturing, so a chatty child
    // cannot deadlock on a full pipe while we poll its status.
    let capture_rx = child.stdout.take().map(|mut stdout| {
        let (tx, rx) = mpsc::channel::<std::io::Result<Vec<u8>>>();
        thread::spawn(move || {
            let mut collected = Vec::new();
            let result = stdout.read_to_end(&mut collected).map(|_| collected);
            let _ = tx.send(result);
        });
        rx
    });

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if let Some(timeout) = request.timeout
                    && started.elapsed() >= timeout
                {
                    log::debug!(
                        "command '{}' exceeded its timeout of {:?}, terminating",
                        trimmed,
                        timeout
                    );
                    terminate(&mut child, trimmed)?;
                    let mut result = CommandResult {
                        timed_out: true,
                        ..CommandResult::default()
                    };
                    result.captured = collect_captured(capture_rx, trimmed)?;
                    return Ok(result);
                }
                if cancellation.load(Ordering::SeqCst) {
                    log::debug!("cancellation requested, killing child (pid {})", child.id());
                    terminate(&mut child, trimmed)?;
                    return Err(ExecutionError::Interrupted);
                }
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => return Err(ExecutionError::CommandFailed(trimmed.to_string(), e)),
        }
    };

    let mut result = CommandResult::from_status(status);
    result.captured = collect_captured(capture_rx, trimmed)?;
    Ok(result)
}

fn spawn_child(trimmed: &str, request: &ExecRequest<'_>) -> Result<Child, ExecutionError> {
    let clean_cwd = dunce::simplified(request.cwd);
    let stdout = || {
        if request.capture {
            Stdio::piped()
        } else {
            Stdio::inherit()
        }
    };

    if request.login_shell || cfg!(target_os = "windows") {
        let (program, args) = shell::shell_invocation(trimmed, request.login_shell);
        return StdCommand::new(program)
            .args(args)
            .current_dir(clean_cwd)
            .envs(request.env)
            .stdin(Stdio::inherit())
            .stdout(stdout())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| ExecutionError::CommandFailed(trimmed.to_string(), e));
    }

    let parts = shlex::split(trimmed).ok_or_else(|| ExecutionError::CommandParse(trimmed.to_string()))?;
    let Some((program, args)) = parts.split_first() else {
        return Err(ExecutionError::CommandParse(trimmed.to_string()));
    };

    let mut command = StdCommand::new(program);
    command
        .args(args)
        .current_dir(clean_cwd)
        .envs(request.env)
        .stdin(Stdio::inherit())
        .stdout(stdout())
        .stderr(Stdio::inherit());

    match command.spawn() {
        Ok(child) => Ok(child),
        // Shell-builtin fallback: retry the full, unparsed line through the
        // default shell when the program itself is not found.
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("command '{}' not found, retrying through {}", program, shell::default_shell());
            let (shell_program, shell_args) = shell::shell_invocation(trimmed, false);
            StdCommand::new(shell_program)
                .args(shell_args)
                .current_dir(clean_cwd)
                .envs(request.env)
                .stdin(Stdio::inherit())
                .stdout(stdout())
                .stderr(Stdio::inherit())
                .spawn()
                .map_err(|e| ExecutionError::CommandFailed(trimmed.to_string(), e))
        }
        Err(e) => Err(ExecutionError::CommandFailed(trimmed.to_string(), e)),
    }
}

fn terminate(child: &mut Child, command: &str) -> Result<(), ExecutionError> {
    if let Err(e) = child.kill() {
        log::warn!("failed to kill child process {}: {}", child.id(), e);
    }
    child
        .wait()
        .map_err(|e| ExecutionError::CommandFailed(command.to_string(), e))?;
    Ok(())
}

fn collect_captured(
    rx: Option<mpsc::Receiver<std::io::Result<Vec<u8>>>>,
    command: &str,
) -> Result<Option<String>, ExecutionError> {
    let Some(rx) = rx else { return Ok(None) };
    let bytes = match rx.recv() {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => return Err(ExecutionError::CommandFailed(command.to_string(), e)),
        // Reader thread died; treat as empty output rather than failing the run.
        Err(_) => Vec::new(),
    };
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|source| ExecutionError::InvalidUtf8Output {
            command: command.to_string(),
            source,
        })
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    fn request<'a>(command: &'a str, cwd: &'a Path, env: &'a HashMap<String, String>) -> ExecRequest<'a> {
        ExecRequest {
            command_line: command,
            cwd,
            env,
            capture: true,
            timeout: None,
            login_shell: false,
        }
    }

    fn token() -> CancellationToken {
        Arc::new(AtomicBool::new(false))
    }

    #[test]
    fn test_empty_command_is_success() {
        let env = HashMap::new();
        let cwd = std::env::current_dir().expect("cwd");
        let result = run_sync(&request("   ", &cwd, &env), &token()).expect("run");
        assert!(result.success());
    }

    #[test]
    #[cfg(unix)]
    fn test_captures_stdout_and_exit_code() {
        let env = HashMap::new();
        let cwd = std::env::current_dir().expect("cwd");
        let result = run_sync(&request("echo hello", &cwd, &env), &token()).expect("run");
        assert!(result.success());
        assert_eq!(result.captured.as_deref().map(str::trim), Some("hello"));
    }

    #[test]
    #[cfg(unix)]
    fn test_nonzero_exit_is_a_result_not_an_error() {
        let env = HashMap::new();
        let cwd = std::env::current_dir().expect("cwd");
        let result = run_sync(&request("false", &cwd, &env), &token()).expect("run");
        assert!(!result.success());
        assert_eq!(result.code, Some(1));
        assert_eq!(result.describe(), "exit code 1");
    }

    #[test]
    #[cfg(unix)]
    fn test_env_is_passed_without_mutating_own_environment() {
        let mut env = HashMap::new();
        env.insert("KEYDECK_TEST_VALUE".to_string(), "42".to_string());
        let cwd = std::env::current_dir().expect("cwd");
        let result = run_sync(
            &request("sh -c 'echo $KEYDECK_TEST_VALUE'", &cwd, &env),
            &token(),
        )
        .expect("run");
        assert_eq!(result.captured.as_deref().map(str::trim), Some("42"));
        assert!(std::env::var("KEYDECK_TEST_VALUE").is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_timeout_terminates_child() {
        let env = HashMap::new();
        let cwd = std::env::current_dir().expect("cwd");
        let req = ExecRequest {
            command_line: "sleep 5",
            cwd: &cwd,
            env: &env,
            capture: false,
            timeout: Some(Duration::from_millis(200)),
            login_shell: false,
        };
        let started = Instant::now();
        let result = run_sync(&req, &token()).expect("run");
        assert!(result.timed_out);
        assert!(!result.success());
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
