// src/core/pipeline.rs
//
// The action pipeline: ordered composition of prompt resolution, command
// materialization, working-directory and environment scoping, the
// confirmation gate, hooks, the primary execution mode, conditional chaining
// and the final notification. States run in order and none is ever revisited
// within one invocation.

use crate::CancellationToken;
use crate::cli::printer::Printer;
use crate::core::history::{HistoryKind, HistoryLog};
use crate::core::menu::{Action, CallbackCtx, CallbackFn, MenuNode, Payload, Primary};
use crate::core::prompts::{PromptEngine, Prompter, parse_confirm};
use crate::core::substitute::{substitute, substitute_env};
use crate::core::watch::{WatchSignal, WatchSpec, Watcher};
use crate::system::executor::{self, CommandResult, ExecRequest};
use anyhow::{Context, Result};
use colored::*;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// How one pipeline invocation ended.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// A synchronous primary ran to completion (or no primary was
    /// configured); carries the rolling status the chain saw.
    Completed(CommandResult),
    /// The confirmation gate was declined; nothing past it ran.
    Declined,
    /// A detached process was registered; the pipeline ended there.
    Background { pid: u32 },
    /// All parallel tasks finished.
    Parallel { succeeded: usize, failed: usize },
    /// A watch loop ran until it was interrupted.
    Watched { runs: usize },
}

/// Runs one action's full pipeline. Owns nothing: every collaborator is
/// borrowed from the interactive loop (or from a test harness), so the
/// pipeline itself carries no process-wide state.
pub struct ActionExecutor<'a> {
    pub prompter: &'a mut dyn Prompter,
    pub printer: &'a mut Printer,
    pub registry: &'a crate::system::processes::ProcessRegistry,
    pub history: &'a mut HistoryLog,
    pub cancellation: &'a CancellationToken,
    /// Polled between watch-mode runs; returning true ends the watch loop.
    pub stop_poll: Box<dyn FnMut() -> bool + 'a>,
}

impl ActionExecutor<'_> {
    pub fn execute(&mut self, action: &Action, node: &mut MenuNode) -> Result<PipelineOutcome> {
        // 1. Prompt resolution.
        let values = {
            let mut engine = PromptEngine::new(self.prompter);
            if !action.wizard.is_empty() {
                engine.resolve_wizard(&action.wizard)?
            } else if !action.prompts.is_empty() {
                engine.resolve(&action.prompts)?
            } else {
                HashMap::new()
            }
        };

        // 2. Command materialization.
        let command = match &action.primary {
            Some(Primary::Shell(template)) => Some(substitute(template, &values)),
            _ => None,
        };

        // 3. Working-directory scoping. The guard restores the node's
        // directory on every exit path, including the declined-confirmation
        // return and error propagation below.
        let saved_dir = node.working_directory.clone();
        let mut node = scopeguard::guard(node, move |node| {
            node.working_directory = saved_dir;
        });
        if let Some(template) = &action.working_dir {
            let raw = substitute(template, &values);
            let expanded = shellexpand::full(&raw)
                .with_context(|| format!("failed to expand working directory '{raw}'"))?;
            let dir = PathBuf::from(expanded.into_owned());
            node.working_directory = if dir.is_absolute() {
                dir
            } else {
                node.working_directory.join(dir)
            };
        }
        let cwd = node.working_directory.clone();
        let login_shell = node.options.borrow().login_shell;

        // 4. Environment binding; merged into child processes only, never
        // into our own environment.
        let env = substitute_env(&action.env, &values);

        // 5. Confirmation gate.
        if let Some(confirmation) = &action.confirm {
            let suffix = if confirmation.default_yes { "[Y/n]" } else { "[y/N]" };
            let answer = self
                .prompter
                .read_line(&format!("{} {suffix}", confirmation.message))?;
            if !parse_confirm(&answer, confirmation.default_yes) {
                self.printer
                    .line(&format!("{}", "Cancelled.".yellow()), false);
                return Ok(PipelineOutcome::Declined);
            }
        }

        // 6. Watch-mode branch; runs until interrupted, never chains.
        if let Some(spec) = &action.watch {
            if action.has_inert_secondaries() {
                log::warn!(
                    "action '{}' configures chains/after-hooks/notify alongside watch mode; they will not run",
                    action.base.label
                );
            }
            return self.run_watch(action, spec, command.as_deref(), &values, &cwd, &env, login_shell);
        }

        // 7. Before hooks: always all run, outcomes not inspected.
        for payload in &action.before {
            self.run_payload(payload, &values, None, None, &cwd, &env, login_shell);
        }

        // 8. Primary execution.
        let result = match &action.primary {
            Some(Primary::Parallel(tasks)) => {
                if action.has_inert_secondaries() {
                    log::warn!(
                        "action '{}' configures chains/after-hooks/notify alongside parallel tasks; they will not run",
                        action.base.label
                    );
                }
                return Ok(self.run_parallel(tasks, &values, &cwd, &env, login_shell));
            }
            Some(Primary::Shell(_)) if action.shell_options.background => {
                if action.has_inert_secondaries() {
                    log::warn!(
                        "action '{}' configures chains/after-hooks/notify alongside background execution; they will not run",
                        action.base.label
                    );
                }
                let command = command.as_deref().unwrap_or_default();
                let pid = self
                    .registry
                    .spawn(&action.base.label, command, &cwd, &env, login_shell)?;
                self.printer.line(
                    &format!(
                        "{} {}",
                        format!("Started '{}' in the background", action.base.label).dimmed(),
                        format!("(pid {pid})").dimmed()
                    ),
                    false,
                );
                return Ok(PipelineOutcome::Background { pid });
            }
            Some(Primary::Shell(_)) => {
                let command = command.clone().unwrap_or_default();
                let result = self.run_primary_shell(action, &command, &cwd, &env, login_shell);
                self.history.record(
                    &action.base.label,
                    &command,
                    HistoryKind::Shell,
                    if result.timed_out { None } else { result.code },
                );
                result
            }
            Some(Primary::Callback(callback)) => {
                let result = self.run_primary_callback(&action.base.label, callback, &values);
                self.history
                    .record(&action.base.label, "<callback>", HistoryKind::Callback, result.code);
                result
            }
            None => CommandResult::synthetic(true),
        };

        // 9. Chaining against the rolling status. Success links stop the
        // chain at the first failure; error links fire per-link without
        // consuming the failure.
        let mut chain_values = values.clone();
        if let Some(captured) = &result.captured {
            chain_values.insert(
                "output".to_string(),
                captured.trim_end_matches('\n').to_string(),
            );
        }
        let mut rolling_success = result.success();
        for link in &action.chain {
            if link.run_on_error {
                if !rolling_success {
                    self.run_payload(
                        &link.payload,
                        &chain_values,
                        result.captured.as_deref(),
                        result.code,
                        &cwd,
                        &env,
                        login_shell,
                    );
                }
            } else if rolling_success
                && !self.run_payload(
                    &link.payload,
                    &chain_values,
                    result.captured.as_deref(),
                    result.code,
                    &cwd,
                    &env,
                    login_shell,
                )
            {
                rolling_success = false;
            }
        }

        // 10. After hooks: run regardless of the final status; callbacks see
        // the primary's exit code.
        for payload in &action.after {
            self.run_payload(
                payload,
                &chain_values,
                result.captured.as_deref(),
                result.code,
                &cwd,
                &env,
                login_shell,
            );
        }

        // 11. Notification.
        if let Some(template) = &action.notify {
            let message = substitute(template, &chain_values);
            self.printer.line(&format!("{}", message.cyan()), false);
        }

        // 12. The scope guard restores the working directory as `node` drops.
        Ok(PipelineOutcome::Completed(result))
    }

    // --- Primary Modes ---

    fn run_primary_shell(
        &mut self,
        action: &Action,
        command: &str,
        cwd: &Path,
        env: &HashMap<String, String>,
        login_shell: bool,
    ) -> CommandResult {
        if !action.shell_options.silent {
            self.printer
                .line(&format!("{} {}", "→".blue(), command.green()), false);
        }
        let request = ExecRequest {
            command_line: command,
            cwd,
            env,
            capture: action.shell_options.capture,
            timeout: action.shell_options.timeout,
            login_shell,
        };
        let result = match executor::run_sync(&request, self.cancellation) {
            Ok(result) => result,
            Err(e) => {
                self.printer.line(
                    &format!("{} {} {}", action.base.label.bold(), "›".dimmed(), e.to_string().red()),
                    false,
                );
                return CommandResult::synthetic(false);
            }
        };
        if action.shell_options.capture
            && !action.shell_options.silent
            && let Some(captured) = &result.captured
            && !captured.is_empty()
        {
            self.printer.line(captured.trim_end_matches('\n'), false);
        }
        self.print_result_line(&action.base.label, &result);
        result
    }

    fn run_primary_callback(
        &mut self,
        label: &str,
        callback: &CallbackFn,
        values: &HashMap<String, String>,
    ) -> CommandResult {
        let ctx = CallbackCtx {
            values,
            exit_code: None,
            output: None,
        };
        match callback(&ctx) {
            Ok(returned) => {
                if let Some(text) = returned {
                    self.printer.line(&text, false);
                }
                let result = CommandResult::synthetic(true);
                self.print_result_line(label, &result);
                result
            }
            Err(e) => {
                // A thrown callback error is caught and reported, never
                // propagated into the session.
                self.printer.line(
                    &format!("{} {} {}", label.bold(), "›".dimmed(), e.to_string().red()),
                    false,
                );
                CommandResult::synthetic(false)
            }
        }
    }

    fn run_parallel(
        &mut self,
        tasks: &[crate::core::menu::ParallelTask],
        values: &HashMap<String, String>,
        cwd: &Path,
        env: &HashMap<String, String>,
        login_shell: bool,
    ) -> PipelineOutcome {
        self.printer.line(
            &format!("┌─ Running {} tasks in parallel...", tasks.len()).dimmed().to_string(),
            false,
        );
        for task in tasks {
            self.printer.line(
                &format!("{} {}", "├─>".dimmed(), task.payload.describe().green()),
                false,
            );
        }

        let cancellation = self.cancellation;
        let results: Vec<(String, bool)> = tasks
            .par_iter()
            .map(|task| {
                let ok = match &task.payload {
                    Payload::Shell(template) => {
                        let command = substitute(template, values);
                        let request = ExecRequest {
                            command_line: &command,
                            cwd,
                            env,
                            capture: false,
                            timeout: None,
                            login_shell,
                        };
                        executor::run_sync(&request, cancellation)
                            .map(|r| r.success())
                            .unwrap_or(false)
                    }
                    Payload::Callback(callback) => {
                        let ctx = CallbackCtx {
                            values,
                            exit_code: None,
                            output: None,
                        };
                        callback(&ctx).is_ok()
                    }
                };
                (task.label.clone(), ok)
            })
            .collect();

        let mut succeeded = 0;
        let mut failed = 0;
        for (label, ok) in &results {
            if *ok {
                succeeded += 1;
                self.printer
                    .line(&format!("  {} {}", "✔".green(), label), false);
            } else {
                failed += 1;
                self.printer
                    .line(&format!("  {} {}", "✘".red(), label), false);
            }
        }
        let summary = format!("└─ {succeeded} succeeded, {failed} failed.");
        self.printer.line(
            &if failed == 0 {
                summary.green().to_string()
            } else {
                summary.red().to_string()
            },
            false,
        );
        PipelineOutcome::Parallel { succeeded, failed }
    }

    fn run_watch(
        &mut self,
        action: &Action,
        spec: &WatchSpec,
        command: Option<&str>,
        values: &HashMap<String, String>,
        cwd: &Path,
        env: &HashMap<String, String>,
        login_shell: bool,
    ) -> Result<PipelineOutcome> {
        self.printer.line(
            &"Watching — press Esc or Ctrl-C to stop.".dimmed().to_string(),
            false,
        );
        let mut watcher = Watcher::new(spec.clone(), cwd);
        let mut runs = 0;
        loop {
            for payload in &action.before {
                self.run_payload(payload, values, None, None, cwd, env, login_shell);
            }
            match (&action.primary, command) {
                (_, Some(command)) => {
                    let _ = self.run_primary_shell(action, command, cwd, env, login_shell);
                }
                (Some(Primary::Callback(callback)), _) => {
                    let _ = self.run_primary_callback(&action.base.label, callback, values);
                }
                _ => {}
            }
            runs += 1;
            let cancellation = self.cancellation;
            let stop_poll = &mut self.stop_poll;
            let mut stop =
                || stop_poll() || cancellation.load(std::sync::atomic::Ordering::SeqCst);
            match watcher.wait(&mut stop) {
                WatchSignal::Triggered => {}
                WatchSignal::Stopped => break,
            }
        }
        self.printer
            .line(&format!("{}", "Watch stopped.".dimmed()), false);
        Ok(PipelineOutcome::Watched { runs })
    }

    // --- Hook / Chain Bodies ---

    /// Runs one payload and reports whether it succeeded. Failures are
    /// reported inline and never unwind the pipeline.
    fn run_payload(
        &mut self,
        payload: &Payload,
        values: &HashMap<String, String>,
        output: Option<&str>,
        exit_code: Option<i32>,
        cwd: &Path,
        env: &HashMap<String, String>,
        login_shell: bool,
    ) -> bool {
        match payload {
            Payload::Shell(template) => {
                let command = substitute(template, values);
                self.printer
                    .line(&format!("{} {}", "→".blue(), command.green()), false);
                let request = ExecRequest {
                    command_line: &command,
                    cwd,
                    env,
                    capture: false,
                    timeout: None,
                    login_shell,
                };
                match executor::run_sync(&request, self.cancellation) {
                    Ok(result) => result.success(),
                    Err(e) => {
                        self.printer
                            .line(&format!("{}", e.to_string().red()), false);
                        false
                    }
                }
            }
            Payload::Callback(callback) => {
                let ctx = CallbackCtx {
                    values,
                    exit_code,
                    output,
                };
                match callback(&ctx) {
                    Ok(_) => true,
                    Err(e) => {
                        self.printer
                            .line(&format!("{}", e.to_string().red()), false);
                        false
                    }
                }
            }
        }
    }

    fn print_result_line(&mut self, label: &str, result: &CommandResult) {
        let status = if result.success() {
            result.describe().green().to_string()
        } else {
            result.describe().red().to_string()
        };
        let mut line = format!("{} {} {}", label.bold(), "›".dimmed(), status);
        if !result.success()
            && let Some(captured) = &result.captured
            && let Some(last) = captured.lines().filter(|l| !l.trim().is_empty()).last()
        {
            line.push_str(&format!(" {}", last.dimmed()));
        }
        self.printer.line(&line, false);
    }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::menu::{Action, Payload};
    use crate::core::prompts::{PromptDef, ScriptedPrompter};
    use crate::system::processes::ProcessRegistry;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Mutex};

    struct Harness {
        printer: Printer,
        registry: ProcessRegistry,
        history: HistoryLog,
        cancellation: CancellationToken,
    }

    impl Harness {
        fn new() -> Self {
            let (registry, _events) = ProcessRegistry::new();
            Self {
                printer: Printer::new(),
                registry,
                history: HistoryLog::new(),
                cancellation: Arc::new(AtomicBool::new(false)),
            }
        }

        fn execute(
            &mut self,
            prompter: &mut ScriptedPrompter,
            action: &Action,
            node: &mut MenuNode,
        ) -> PipelineOutcome {
            let mut executor = ActionExecutor {
                prompter,
                printer: &mut self.printer,
                registry: &self.registry,
                history: &mut self.history,
                cancellation: &self.cancellation,
                stop_poll: Box::new(|| false),
            };
            executor.execute(action, node).expect("pipeline")
        }
    }

    /// A callback payload that appends `tag` to a shared trace.
    fn tracing(trace: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> Payload {
        let trace = Arc::clone(trace);
        Payload::Callback(Arc::new(move |_ctx| {
            trace.lock().expect("trace lock").push(tag);
            Ok(None)
        }))
    }

    fn failing(trace: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> Payload {
        let trace = Arc::clone(trace);
        Payload::Callback(Arc::new(move |_ctx| {
            trace.lock().expect("trace lock").push(tag);
            anyhow::bail!("deliberate failure")
        }))
    }

    #[test]
    fn test_chain_success_path_skips_error_links() {
        // Exit code 0 with [then(A), onError(B), then(C)]: only A and C run,
        // in that order.
        let trace = Arc::new(Mutex::new(Vec::new()));
        let action = Action::new("ok")
            .callback(|_| Ok(None))
            .then(tracing(&trace, "A"))
            .on_error(tracing(&trace, "B"))
            .then(tracing(&trace, "C"));
        let mut harness = Harness::new();
        let mut node = MenuNode::root("root", "");
        let mut prompter = ScriptedPrompter::new(&[]);
        harness.execute(&mut prompter, &action, &mut node);
        assert_eq!(*trace.lock().expect("lock"), vec!["A", "C"]);
    }

    #[test]
    fn test_chain_failure_path_runs_only_error_links() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let action = Action::new("broken")
            .callback(|_| anyhow::bail!("primary failed"))
            .then(tracing(&trace, "A"))
            .on_error(tracing(&trace, "B"))
            .then(tracing(&trace, "C"))
            .on_error(tracing(&trace, "D"));
        let mut harness = Harness::new();
        let mut node = MenuNode::root("root", "");
        let mut prompter = ScriptedPrompter::new(&[]);
        harness.execute(&mut prompter, &action, &mut node);
        // Both error handlers fire; neither success link does.
        assert_eq!(*trace.lock().expect("lock"), vec!["B", "D"]);
    }

    #[test]
    fn test_chain_halts_at_first_failed_success_link() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let action = Action::new("midway")
            .callback(|_| Ok(None))
            .then(failing(&trace, "A"))
            .then(tracing(&trace, "B"))
            .on_error(tracing(&trace, "E"));
        let mut harness = Harness::new();
        let mut node = MenuNode::root("root", "");
        let mut prompter = ScriptedPrompter::new(&[]);
        harness.execute(&mut prompter, &action, &mut node);
        // A fails, B is gated off, the error handler after it fires.
        assert_eq!(*trace.lock().expect("lock"), vec!["A", "E"]);
    }

    #[test]
    fn test_declined_confirmation_short_circuits() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let primary_trace = Arc::clone(&trace);
        let action = Action::new("guarded")
            .callback(move |_| {
                primary_trace.lock().expect("lock").push("primary");
                Ok(None)
            })
            .confirm("Really?", true)
            .before(tracing(&trace, "before"))
            .then(tracing(&trace, "then"))
            .after(tracing(&trace, "after"));
        let mut harness = Harness::new();
        let mut node = MenuNode::root("root", "");
        let mut prompter = ScriptedPrompter::new(&["n"]);
        let outcome = harness.execute(&mut prompter, &action, &mut node);
        assert!(matches!(outcome, PipelineOutcome::Declined));
        assert!(trace.lock().expect("lock").is_empty());
        assert!(harness.history.is_empty());
    }

    #[test]
    fn test_confirm_garbage_input_takes_default() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let action = Action::new("guarded")
            .callback(|_| Ok(None))
            .confirm("Proceed?", true)
            .then(tracing(&trace, "ran"));
        let mut harness = Harness::new();
        let mut node = MenuNode::root("root", "");
        let mut prompter = ScriptedPrompter::new(&["bananas"]);
        let outcome = harness.execute(&mut prompter, &action, &mut node);
        assert!(matches!(outcome, PipelineOutcome::Completed(_)));
        assert_eq!(*trace.lock().expect("lock"), vec!["ran"]);
    }

    #[test]
    fn test_working_directory_restored_after_completion_and_decline() {
        let mut harness = Harness::new();
        let mut node = MenuNode::root("root", "");
        let original = node.working_directory.clone();

        let completed = Action::new("scoped").callback(|_| Ok(None)).working_dir("/tmp");
        let mut prompter = ScriptedPrompter::new(&[]);
        harness.execute(&mut prompter, &completed, &mut node);
        assert_eq!(node.working_directory, original);

        let declined = Action::new("scoped")
            .callback(|_| Ok(None))
            .working_dir("/tmp")
            .confirm("Sure?", false);
        let mut prompter = ScriptedPrompter::new(&[""]);
        let outcome = harness.execute(&mut prompter, &declined, &mut node);
        assert!(matches!(outcome, PipelineOutcome::Declined));
        assert_eq!(node.working_directory, original);
    }

    #[test]
    fn test_callback_sees_scoped_directory_values() {
        // The prompt value flows into the working directory template, and the
        // callback observes the scoped directory through the node.
        let seen = Arc::new(Mutex::new(HashMap::new()));
        let sink = Arc::clone(&seen);
        let action = Action::new("probe")
            .prompt(PromptDef::unnamed())
            .callback(move |ctx| {
                sink.lock()
                    .expect("lock")
                    .extend(ctx.values.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok(None)
            });
        let mut harness = Harness::new();
        let mut node = MenuNode::root("root", "");
        let mut prompter = ScriptedPrompter::new(&["X"]);
        harness.execute(&mut prompter, &action, &mut node);
        assert_eq!(
            seen.lock().expect("lock").get("input").map(String::as_str),
            Some("X")
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_prompt_value_reaches_shell_command() {
        // prompt('name') + shell('echo {{input}}') with input "X" executes
        // `echo X`.
        let mut harness = Harness::new();
        let mut node = MenuNode::root("root", "");
        let action = Action::new("echoer")
            .prompt(PromptDef::unnamed())
            .shell("echo {{input}}")
            .capture()
            .silent();
        let mut prompter = ScriptedPrompter::new(&["X"]);
        let outcome = harness.execute(&mut prompter, &action, &mut node);
        match outcome {
            PipelineOutcome::Completed(result) => {
                assert_eq!(result.captured.as_deref().map(str::trim), Some("X"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        // The materialized command is what history records.
        let entry = harness.history.entries().next().expect("history entry");
        assert_eq!(entry.command, "echo X");
        assert_eq!(entry.exit_code, Some(0));
    }

    #[test]
    #[cfg(unix)]
    fn test_output_placeholder_flows_into_chain_and_notify() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let action = Action::new("pipeline")
            .shell("echo captured-line")
            .capture()
            .silent()
            .then(Payload::Callback(Arc::new(move |ctx| {
                *sink.lock().expect("lock") = ctx.output.map(|s| s.trim().to_string());
                Ok(None)
            })))
            .notify("done: {{output}}");
        let mut harness = Harness::new();
        let mut node = MenuNode::root("root", "");
        let mut prompter = ScriptedPrompter::new(&[]);
        harness.execute(&mut prompter, &action, &mut node);
        assert_eq!(
            seen.lock().expect("lock").as_deref(),
            Some("captured-line")
        );
    }

    #[test]
    fn test_after_hooks_run_on_failure_and_see_exit_code() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let action = Action::new("failing")
            .callback(|_| anyhow::bail!("nope"))
            .after(Payload::Callback(Arc::new(move |ctx| {
                *sink.lock().expect("lock") = ctx.exit_code;
                Ok(None)
            })));
        let mut harness = Harness::new();
        let mut node = MenuNode::root("root", "");
        let mut prompter = ScriptedPrompter::new(&[]);
        harness.execute(&mut prompter, &action, &mut node);
        assert_eq!(*seen.lock().expect("lock"), Some(1));
    }

    #[test]
    fn test_parallel_aggregates_mixed_results() {
        let action = Action::new("fan-out").parallel(vec![
            crate::core::menu::ParallelTask {
                label: "ok-1".to_string(),
                payload: Payload::Callback(Arc::new(|_| Ok(None))),
            },
            crate::core::menu::ParallelTask {
                label: "bad".to_string(),
                payload: Payload::Callback(Arc::new(|_| anyhow::bail!("boom"))),
            },
            crate::core::menu::ParallelTask {
                label: "ok-2".to_string(),
                payload: Payload::Callback(Arc::new(|_| Ok(None))),
            },
        ]);
        let mut harness = Harness::new();
        let mut node = MenuNode::root("root", "");
        let mut prompter = ScriptedPrompter::new(&[]);
        let outcome = harness.execute(&mut prompter, &action, &mut node);
        match outcome {
            PipelineOutcome::Parallel { succeeded, failed } => {
                assert_eq!((succeeded, failed), (2, 1));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        // Parallel runs are excluded from history.
        assert!(harness.history.is_empty());
    }

    #[test]
    fn test_callback_error_is_caught_and_recorded_as_failure() {
        let mut harness = Harness::new();
        let mut node = MenuNode::root("root", "");
        let action = Action::new("thrower").callback(|_| anyhow::bail!("exploded"));
        let mut prompter = ScriptedPrompter::new(&[]);
        let outcome = harness.execute(&mut prompter, &action, &mut node);
        match outcome {
            PipelineOutcome::Completed(result) => assert!(!result.success()),
            other => panic!("unexpected outcome: {other:?}"),
        }
        let entry = harness.history.entries().next().expect("entry");
        assert_eq!(entry.exit_code, Some(1));
    }

    #[test]
    fn test_watch_interval_runs_until_stopped() {
        let runs = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&runs);
        let action = Action::new("watched")
            .callback(move |_| {
                *counter.lock().expect("lock") += 1;
                Ok(None)
            })
            .watch(WatchSpec::interval(std::time::Duration::from_millis(50)));
        let mut harness = Harness::new();
        let mut node = MenuNode::root("root", "");
        let mut prompter = ScriptedPrompter::new(&[]);
        let mut polls = 0;
        let outcome = {
            let mut executor = ActionExecutor {
                prompter: &mut prompter,
                printer: &mut harness.printer,
                registry: &harness.registry,
                history: &mut harness.history,
                cancellation: &harness.cancellation,
                stop_poll: Box::new(move || {
                    polls += 1;
                    polls > 3
                }),
            };
            executor.execute(&action, &mut node).expect("pipeline")
        };
        match outcome {
            PipelineOutcome::Watched { runs: reported } => assert!(reported >= 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(*runs.lock().expect("lock") >= 1);
        // Watch runs never reach the history log.
        assert!(harness.history.is_empty());
    }
}
