// src/cli/interactive.rs
//
// The key-read/dispatch loop: renders the current menu node, waits for a
// single keypress or a background-process event, and dispatches to the
// action pipeline or the navigation stack. The loop owns the navigation
// stack and threads it through explicitly; nothing here is process-global.

use crate::CancellationToken;
use crate::cli::printer::Printer;
use crate::constants::{BACKGROUND_MENU_ID, POLL_INTERVAL_MS};
use crate::core::history::{HistoryKind, HistoryLog};
use crate::core::keymap::{self, KeyMap};
use crate::core::menu::{Action, Category, Item, MenuNode, NavigationStack};
use crate::core::pipeline::ActionExecutor;
use crate::core::prompts::TermPrompter;
use crate::system::processes::{ProcessEvent, ProcessRegistry};
use anyhow::Result;
use colored::*;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::Receiver;
use std::time::{Duration, SystemTime};

enum Dispatch {
    Run(Action),
    Enter(Category),
    Pop,
    History,
    Redraw,
    Quit,
}

pub struct InteractiveLoop {
    nav: NavigationStack,
    printer: Printer,
    registry: ProcessRegistry,
    events: Receiver<ProcessEvent>,
    history: HistoryLog,
    cancellation: CancellationToken,
    prompter: TermPrompter,
}

impl InteractiveLoop {
    pub fn new(root: MenuNode) -> Self {
        let (registry, events) = ProcessRegistry::new();
        Self {
            nav: NavigationStack::new(root),
            printer: Printer::new(),
            registry,
            events,
            history: HistoryLog::new(),
            cancellation: Arc::new(AtomicBool::new(false)),
            prompter: TermPrompter,
        }
    }

    pub fn run(mut self) -> Result<()> {
        loop {
            let entries = self.build_entries();
            let keys = {
                let refs: Vec<&Item> = entries.iter().collect();
                keymap::assign(&refs)
            };
            self.render(&entries, &keys);

            match self.wait_for_dispatch(&entries, &keys)? {
                Dispatch::Quit => {
                    self.printer.clear();
                    let killed = self.registry.kill_all();
                    if killed > 0 {
                        self.printer.line(
                            &format!("Killed {killed} background process(es)."),
                            false,
                        );
                    }
                    return Ok(());
                }
                Dispatch::Pop => {
                    // Popping at the root is a no-op, not an exit.
                    self.nav.pop();
                }
                Dispatch::Enter(category) => {
                    self.nav.enter_category(&category);
                }
                Dispatch::Run(action) => {
                    self.printer.clear();
                    self.run_action(&action);
                }
                Dispatch::History => {
                    self.printer.clear();
                    self.print_history();
                }
                Dispatch::Redraw => {}
            }
        }
    }

    // --- Dispatch ---

    fn wait_for_dispatch(&mut self, entries: &[Item], keys: &KeyMap) -> Result<Dispatch> {
        loop {
            if let Ok(event) = self.events.try_recv() {
                self.handle_process_event(&event);
                return Ok(Dispatch::Redraw);
            }
            let Some(key) = read_key(Duration::from_millis(POLL_INTERVAL_MS))? else {
                continue;
            };
            match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(Dispatch::Quit);
                }
                KeyCode::Esc | KeyCode::Backspace => return Ok(Dispatch::Pop),
                KeyCode::Char('!') => return Ok(Dispatch::History),
                KeyCode::Char(pressed) => {
                    if let Some(idx) = keys.lookup(pressed)
                        && let Some(item) = entries.get(idx)
                    {
                        return Ok(match item {
                            Item::Action(action) => Dispatch::Run(action.clone()),
                            Item::Category(category) => Dispatch::Enter(category.clone()),
                        });
                    }
                }
                _ => {}
            }
        }
    }

    fn run_action(&mut self, action: &Action) {
        let result = {
            let mut executor = ActionExecutor {
                prompter: &mut self.prompter,
                printer: &mut self.printer,
                registry: &self.registry,
                history: &mut self.history,
                cancellation: &self.cancellation,
                stop_poll: Box::new(stop_key_pressed),
            };
            executor.execute(action, self.nav.current_mut())
        };
        if let Err(e) = result {
            // Pipeline setup failures (prompt I/O, path expansion) are
            // reported inline; the session keeps running.
            self.printer
                .line(&format!("{}: {e:#}", "Error".red().bold()), false);
        }
    }

    // --- Background Processes ---

    fn handle_process_event(&mut self, event: &ProcessEvent) {
        self.printer.clear();
        if !event.tail.is_empty() {
            self.printer.line(
                &format!("── output of '{}' ──", event.label)
                    .dimmed()
                    .to_string(),
                false,
            );
            self.printer.multiline(&event.tail, false);
        }
        let status = match (event.success, event.code) {
            (true, _) => "finished successfully (exit code 0)".green().to_string(),
            (false, Some(code)) => format!("failed (exit code {code})").red().to_string(),
            (false, None) => "terminated".red().to_string(),
        };
        self.printer.line(
            &format!("{} {} {}", event.label.bold(), "›".dimmed(), status),
            false,
        );
        // Leaving an emptied background menu automatically.
        if self.nav.current().id == Some(BACKGROUND_MENU_ID) && self.registry.is_empty() {
            self.nav.pop();
        }
    }

    fn build_entries(&self) -> Vec<Item> {
        let mut entries: Vec<Item> = self
            .nav
            .current()
            .visible_items()
            .into_iter()
            .cloned()
            .collect();
        // The synthetic background-processes entry appears whenever detached
        // work is running, except inside that menu itself (no re-entry).
        if !self.registry.is_empty() && self.nav.current().id != Some(BACKGROUND_MENU_ID) {
            entries.push(Item::Category(background_menu(&self.registry)));
        }
        entries
    }

    // --- Rendering ---

    fn render(&mut self, entries: &[Item], keys: &KeyMap) {
        self.printer.clear();
        let key_color = self
            .nav
            .current()
            .options
            .borrow()
            .key_color
            .as_deref()
            .map_or(Color::Yellow, Color::from);

        let mut lines = vec![self.nav.breadcrumb(), String::new()];

        // Display order is alphabetical; key assignment already happened in
        // insertion order, so sorting here cannot change the mapping.
        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by_key(|&i| entries.get(i).map(|e| e.label().to_lowercase()));
        for idx in order {
            let Some(item) = entries.get(idx) else { continue };
            let key_part = match keys.key_for(idx) {
                Some(key) => format!("[{key}]").color(key_color).to_string(),
                None => "   ".to_string(),
            };
            let marker = match item {
                Item::Action(action) if action.favorite => "★ ".yellow().to_string(),
                _ => String::new(),
            };
            let label = match item {
                Item::Category(_) => format!("{} ›", item.label()).bold().to_string(),
                Item::Action(_) => item.label().to_string(),
            };
            let base = item.base();
            let detail = if base.description.is_empty() {
                match item {
                    Item::Action(action) => action.help.clone().unwrap_or_default(),
                    Item::Category(_) => String::new(),
                }
            } else {
                base.description.clone()
            };
            let mut line = format!("  {key_part} {marker}{label}");
            if !detail.is_empty() {
                line.push_str(&format!("  {}", detail.dimmed()));
            }
            lines.push(line);
        }

        lines.push(String::new());
        let mut hint = String::from("esc back · ! history · ctrl-c quit");
        let running = self.registry.len();
        if running > 0 {
            hint.push_str(&format!(" · {running} background"));
        }
        lines.push(hint.dimmed().to_string());
        self.printer.multiline(&lines, true);
    }

    fn print_history(&mut self) {
        if self.history.is_empty() {
            self.printer
                .line(&"No commands executed yet.".dimmed().to_string(), false);
            return;
        }
        let mut lines = vec!["Recent commands (newest first):".bold().to_string()];
        for entry in self.history.entries() {
            let status = match entry.exit_code {
                Some(0) => "0".green().to_string(),
                Some(code) => code.to_string().red().to_string(),
                None => "killed".red().to_string(),
            };
            let kind = match entry.kind {
                HistoryKind::Shell => entry.command.as_str().green().to_string(),
                HistoryKind::Callback => entry.command.as_str().cyan().to_string(),
            };
            lines.push(format!(
                "  {} {} {} {} ({})",
                format_age(entry.timestamp).dimmed(),
                entry.label.bold(),
                "›".dimmed(),
                kind,
                status
            ));
        }
        self.printer.multiline(&lines, false);
    }
}

/// Builds the synthetic menu listing running detached processes; each entry's
/// key kills its process. The node id guards against recursive re-entry and
/// drives the automatic pop when the registry empties.
fn background_menu(registry: &ProcessRegistry) -> Category {
    let snapshot = registry.clone();
    Category::new("Background processes", move |node| {
        for entry in snapshot.running() {
            let killer = snapshot.clone();
            let pid = entry.pid;
            node.add(
                Action::new(format!("{} (pid {pid})", entry.label))
                    .description(entry.command.clone())
                    .callback(move |_ctx| {
                        if killer.kill(pid) {
                            Ok(Some(format!("Sent kill to pid {pid}.")))
                        } else {
                            Ok(Some(format!("Process {pid} is no longer running.")))
                        }
                    }),
            );
        }
    })
    .description("running detached commands")
    .node_id(BACKGROUND_MENU_ID)
}

/// Reads one key event, entering raw mode only for the read itself so all
/// printing stays in cooked mode. Returns `None` when `timeout` elapses.
fn read_key(timeout: Duration) -> Result<Option<KeyEvent>> {
    terminal::enable_raw_mode()?;
    let _cooked = scopeguard::guard((), |()| {
        let _ = terminal::disable_raw_mode();
    });
    if event::poll(timeout)?
        && let Event::Key(key) = event::read()?
        && key.kind != KeyEventKind::Release
    {
        return Ok(Some(key));
    }
    Ok(None)
}

/// Watch-mode interrupt poll: Esc or Ctrl-C ends the watch loop.
fn stop_key_pressed() -> bool {
    match read_key(Duration::from_millis(0)) {
        Ok(Some(key)) => {
            key.code == KeyCode::Esc
                || (key.code == KeyCode::Char('c')
                    && key.modifiers.contains(KeyModifiers::CONTROL))
        }
        _ => false,
    }
}

fn format_age(timestamp: SystemTime) -> String {
    let Ok(elapsed) = timestamp.elapsed() else {
        return "now".to_string();
    };
    let secs = elapsed.as_secs();
    if secs < 60 {
        format!("{secs}s ago")
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}
