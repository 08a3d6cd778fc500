// src/system/processes.rs

use crate::constants::{PROCESS_LOG_CAPACITY, PROCESS_TAIL_CAPACITY};
use crate::core::buffer::CircularBuffer;
use crate::system::executor::ExecutionError;
use crate::system::shell;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command as StdCommand, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Emitted when a tracked background process exits. The interactive loop
/// drains these on its poll tick and prints the summary; registry threads
/// never write to the terminal themselves.
#[derive(Debug, Clone)]
pub struct ProcessEvent {
    pub pid: u32,
    pub label: String,
    pub success: bool,
    pub code: Option<i32>,
    /// Trailing portion of the per-invocation output buffer.
    pub tail: Vec<String>,
}

/// A currently running background process, as listed by the synthetic menu.
#[derive(Debug, Clone)]
pub struct BackgroundEntry {
    pub pid: u32,
    pub label: String,
    pub command: String,
}

struct Tracked {
    label: String,
    command: String,
    kill_flag: Arc<AtomicBool>,
}

struct RegistryInner {
    entries: HashMap<u32, Tracked>,
    log: CircularBuffer,
}

/// Tracks detached processes and their bounded output. The single shared
/// mutable structure touched from outside the interactive thread; every
/// mutation goes through one mutex. The event sender sits behind a mutex of
/// its own so the registry stays `Sync` and can be captured by callbacks.
#[derive(Clone)]
pub struct ProcessRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    events: Arc<Mutex<Sender<ProcessEvent>>>,
}

impl ProcessRegistry {
    pub fn new() -> (Self, Receiver<ProcessEvent>) {
        let (events, receiver) = mpsc::channel();
        let registry = Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                entries: HashMap::new(),
                log: CircularBuffer::new(PROCESS_LOG_CAPACITY),
            })),
            events: Arc::new(Mutex::new(events)),
        };
        (registry, receiver)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        self.inner.lock().expect("process registry lock poisoned")
    }

    /// Launches a detached process and registers it. Output lines go both to
    /// the global log (label-prefixed) and to a per-invocation buffer whose
    /// tail is attached to the exit event.
    pub fn spawn(
        &self,
        label: &str,
        command_line: &str,
        cwd: &Path,
        env: &HashMap<String, String>,
        login_shell: bool,
    ) -> Result<u32, ExecutionError> {
        let (program, args) = shell::shell_invocation(command_line, login_shell);
        let mut child = StdCommand::new(program)
            .args(args)
            .current_dir(dunce::simplified(cwd))
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExecutionError::CommandFailed(command_line.to_string(), e))?;

        let pid = child.id();
        let kill_flag = Arc::new(AtomicBool::new(false));
        let invocation = Arc::new(Mutex::new(CircularBuffer::new(PROCESS_TAIL_CAPACITY)));

        self.lock().entries.insert(
            pid,
            Tracked {
                label: label.to_string(),
                command: command_line.to_string(),
                kill_flag: Arc::clone(&kill_flag),
            },
        );
        log::debug!("registered background process {} ('{}')", pid, label);

        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(self.spawn_reader(label, stdout, Arc::clone(&invocation)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(self.spawn_reader(label, stderr, Arc::clone(&invocation)));
        }

        // Waiter thread: polls the child, honors the kill flag, deregisters
        // on exit and emits the exit event.
        let registry = self.clone();
        let events = Arc::clone(&self.events);
        let waiter_label = label.to_string();
        thread::spawn(move || {
            let status = loop {
                match child.try_wait() {
                    Ok(Some(status)) => break Some(status),
                    Ok(None) => {
                        if kill_flag.load(Ordering::SeqCst) {
                            if let Err(e) = child.kill() {
                                log::warn!("failed to kill background process {pid}: {e}");
                            }
                            break child.wait().ok();
                        }
                        thread::sleep(Duration::from_millis(100));
                    }
                    Err(e) => {
                        log::warn!("lost track of background process {pid}: {e}");
                        break None;
                    }
                }
            };
            // Let the readers flush the last lines before taking the tail.
            for reader in readers {
                let _ = reader.join();
            }
            registry.lock().entries.remove(&pid);
            let tail = invocation
                .lock()
                .map(|buffer| buffer.get())
                .unwrap_or_default();
            let code = status.and_then(|s| s.code());
            if let Ok(sender) = events.lock() {
                let _ = sender.send(ProcessEvent {
                    pid,
                    label: waiter_label,
                    success: status.is_some_and(|s| s.success()),
                    code,
                    tail,
                });
            }
        });

        Ok(pid)
    }

    fn spawn_reader(
        &self,
        label: &str,
        stream: impl Read + Send + 'static,
        invocation: Arc<Mutex<CircularBuffer>>,
    ) -> thread::JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let label = label.to_string();
        thread::spawn(move || {
            let reader = BufReader::new(stream);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if let Ok(mut guard) = inner.lock() {
                    guard.log.push(format!("[{label}] {line}"));
                }
                if let Ok(mut buffer) = invocation.lock() {
                    buffer.push(line);
                }
            }
        })
    }

    pub fn running(&self) -> Vec<BackgroundEntry> {
        let guard = self.lock();
        let mut entries: Vec<BackgroundEntry> = guard
            .entries
            .iter()
            .map(|(pid, tracked)| BackgroundEntry {
                pid: *pid,
                label: tracked.label.clone(),
                command: tracked.command.clone(),
            })
            .collect();
        entries.sort_by_key(|e| e.pid);
        entries
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Requests termination of one process. Returns false when the pid is not
    /// (or no longer) registered.
    pub fn kill(&self, pid: u32) -> bool {
        let guard = self.lock();
        match guard.entries.get(&pid) {
            Some(tracked) => {
                tracked.kill_flag.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Force-kills every registered process and waits (bounded) for the
    /// waiters to deregister them. Returns how many were killed.
    pub fn kill_all(&self) -> usize {
        let count = {
            let guard = self.lock();
            for tracked in guard.entries.values() {
                tracked.kill_flag.store(true, Ordering::SeqCst);
            }
            guard.entries.len()
        };
        let deadline = Instant::now() + Duration::from_secs(2);
        while !self.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(50));
        }
        count
    }

    /// The global label-prefixed log, oldest retained line first.
    pub fn log_lines(&self) -> Vec<String> {
        self.lock().log.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    #[cfg(unix)]
    fn test_spawn_registers_and_exit_deregisters() {
        let (registry, events) = ProcessRegistry::new();
        let cwd = std::env::current_dir().expect("cwd");
        let pid = registry
            .spawn("greeter", "echo background-hello", &cwd, &env(), false)
            .expect("spawn");
        assert!(pid > 0);
        let event = events
            .recv_timeout(Duration::from_secs(5))
            .expect("exit event");
        assert_eq!(event.pid, pid);
        assert!(event.success);
        assert!(event.tail.iter().any(|l| l.contains("background-hello")));
        assert!(registry.is_empty());
        assert!(
            registry
                .log_lines()
                .iter()
                .any(|l| l.starts_with("[greeter]"))
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_kill_all_reports_count() {
        let (registry, events) = ProcessRegistry::new();
        let cwd = std::env::current_dir().expect("cwd");
        registry
            .spawn("sleeper-1", "sleep 30", &cwd, &env(), false)
            .expect("spawn");
        registry
            .spawn("sleeper-2", "sleep 30", &cwd, &env(), false)
            .expect("spawn");
        assert_eq!(registry.len(), 2);
        let killed = registry.kill_all();
        assert_eq!(killed, 2);
        assert!(registry.is_empty());
        // Both exit events still arrive, flagged unsuccessful.
        let first = events.recv_timeout(Duration::from_secs(5)).expect("event");
        let second = events.recv_timeout(Duration::from_secs(5)).expect("event");
        assert!(!first.success && !second.success);
    }

    #[test]
    #[cfg(unix)]
    fn test_kill_unknown_pid_is_false() {
        let (registry, _events) = ProcessRegistry::new();
        assert!(!registry.kill(99_999_999));
    }
}
