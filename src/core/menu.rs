// src/core/menu.rs

use crate::core::prompts::{PromptDef, WizardStep};
use crate::core::watch::WatchSpec;
use anyhow::Result;
use colored::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

// --- Callback Types ---

/// Context handed to in-process callbacks: resolved prompt values, the final
/// exit code (after-hooks only) and captured primary output when available.
pub struct CallbackCtx<'a> {
    pub values: &'a HashMap<String, String>,
    pub exit_code: Option<i32>,
    pub output: Option<&'a str>,
}

/// An in-process action body. The returned string, if any, is reported as the
/// command's result; an `Err` is caught at the point of invocation and
/// reported inline, never propagated to the session.
pub type CallbackFn = Arc<dyn Fn(&CallbackCtx<'_>) -> Result<Option<String>> + Send + Sync>;

/// Visibility predicate, re-evaluated on every keymap build. An item whose
/// condition returns `Ok(false)` or `Err(_)` is hidden for that render pass.
pub type ConditionFn = Arc<dyn Fn() -> Result<bool> + Send + Sync>;

/// Content builder for a category: invoked with the freshly pushed menu node.
pub type ContentFn = Rc<dyn Fn(&mut MenuNode)>;

// --- Item Building Blocks ---

/// Fallback-key search behavior for an item whose preferred key collides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AlternativeKey {
    /// Scan the label, then the alphabet (the default).
    #[default]
    Auto,
    /// No fallback: the item stays unassigned on collision.
    Disabled,
    /// Try this key first, then fall back to the scan.
    Explicit(char),
}

/// Fields shared by actions and categories.
#[derive(Clone)]
pub struct ItemBase {
    pub label: String,
    pub description: String,
    pub key: Option<char>,
    pub alternative_key: AlternativeKey,
    pub persistent: bool,
    pub condition: Option<ConditionFn>,
}

impl ItemBase {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: String::new(),
            key: None,
            alternative_key: AlternativeKey::Auto,
            persistent: false,
            condition: None,
        }
    }
}

/// A follow-up or hook body: a shell command line or an in-process callback.
#[derive(Clone)]
pub enum Payload {
    Shell(String),
    Callback(CallbackFn),
}

impl Payload {
    pub fn describe(&self) -> String {
        match self {
            Self::Shell(cmd) => cmd.clone(),
            Self::Callback(_) => "<callback>".to_string(),
        }
    }
}

/// One link of an action's chain, gated on the rolling status of the primary
/// execution.
#[derive(Clone)]
pub struct ChainLink {
    pub payload: Payload,
    pub run_on_error: bool,
}

/// One task of a parallel primary execution.
#[derive(Clone)]
pub struct ParallelTask {
    pub label: String,
    pub payload: Payload,
}

/// The primary execution mode of an action.
#[derive(Clone)]
pub enum Primary {
    Shell(String),
    Callback(CallbackFn),
    Parallel(Vec<ParallelTask>),
}

/// Confirmation gate shown before the pipeline proceeds past its prompts.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub message: String,
    pub default_yes: bool,
}

/// Execution flags for shell primaries.
#[derive(Debug, Clone, Default)]
pub struct ShellOptions {
    /// Spawn detached and register with the process registry.
    pub background: bool,
    /// Capture stdout for `{{output}}` substitution and the result line.
    pub capture: bool,
    /// Suppress the command echo line.
    pub silent: bool,
    /// Terminate the child when exceeded (synchronous commands only).
    pub timeout: Option<Duration>,
}

// --- Action ---

/// A menu entry that runs something when its key is pressed. Built with the
/// builder methods below; label, description and key stay mutable until the
/// item is first displayed.
#[derive(Clone)]
pub struct Action {
    pub base: ItemBase,
    pub primary: Option<Primary>,
    pub shell_options: ShellOptions,
    pub prompts: Vec<PromptDef>,
    pub wizard: Vec<WizardStep>,
    pub confirm: Option<Confirmation>,
    pub before: Vec<Payload>,
    pub after: Vec<Payload>,
    pub chain: Vec<ChainLink>,
    pub env: Vec<(String, String)>,
    pub working_dir: Option<String>,
    pub notify: Option<String>,
    pub favorite: bool,
    pub help: Option<String>,
    pub watch: Option<WatchSpec>,
}

impl Action {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            base: ItemBase::new(label),
            primary: None,
            shell_options: ShellOptions::default(),
            prompts: Vec::new(),
            wizard: Vec::new(),
            confirm: None,
            before: Vec::new(),
            after: Vec::new(),
            chain: Vec::new(),
            env: Vec::new(),
            working_dir: None,
            notify: None,
            favorite: false,
            help: None,
            watch: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.base.description = description.into();
        self
    }

    pub fn key(mut self, key: char) -> Self {
        self.base.key = Some(key);
        self
    }

    pub fn alternative_key(mut self, alt: AlternativeKey) -> Self {
        self.base.alternative_key = alt;
        self
    }

    pub fn persistent(mut self) -> Self {
        self.base.persistent = true;
        self
    }

    pub fn condition(mut self, condition: impl Fn() -> Result<bool> + Send + Sync + 'static) -> Self {
        self.base.condition = Some(Arc::new(condition));
        self
    }

    pub fn shell(mut self, command: impl Into<String>) -> Self {
        self.primary = Some(Primary::Shell(command.into()));
        self
    }

    pub fn callback(
        mut self,
        callback: impl Fn(&CallbackCtx<'_>) -> Result<Option<String>> + Send + Sync + 'static,
    ) -> Self {
        self.primary = Some(Primary::Callback(Arc::new(callback)));
        self
    }

    pub fn parallel(mut self, tasks: Vec<ParallelTask>) -> Self {
        self.primary = Some(Primary::Parallel(tasks));
        self
    }

    pub fn background(mut self) -> Self {
        self.shell_options.background = true;
        self
    }

    pub fn capture(mut self) -> Self {
        self.shell_options.capture = true;
        self
    }

    pub fn silent(mut self) -> Self {
        self.shell_options.silent = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.shell_options.timeout = Some(timeout);
        self
    }

    /// Adds a convenience prompt; unnamed prompts resolve as `input`,
    /// `input2`, ... in definition order.
    pub fn prompt(mut self, def: PromptDef) -> Self {
        self.prompts.push(def);
        self
    }

    pub fn wizard(mut self, steps: Vec<WizardStep>) -> Self {
        self.wizard = steps;
        self
    }

    pub fn confirm(mut self, message: impl Into<String>, default_yes: bool) -> Self {
        self.confirm = Some(Confirmation {
            message: message.into(),
            default_yes,
        });
        self
    }

    pub fn before(mut self, payload: Payload) -> Self {
        self.before.push(payload);
        self
    }

    pub fn after(mut self, payload: Payload) -> Self {
        self.after.push(payload);
        self
    }

    /// Appends a chain link that runs while the rolling status is success.
    pub fn then(mut self, payload: Payload) -> Self {
        self.chain.push(ChainLink {
            payload,
            run_on_error: false,
        });
        self
    }

    /// Appends a chain link that runs only when the rolling status is failure.
    pub fn on_error(mut self, payload: Payload) -> Self {
        self.chain.push(ChainLink {
            payload,
            run_on_error: true,
        });
        self
    }

    pub fn env(mut self, key: impl Into<String>, value_template: impl Into<String>) -> Self {
        self.env.push((key.into(), value_template.into()));
        self
    }

    pub fn working_dir(mut self, template: impl Into<String>) -> Self {
        self.working_dir = Some(template.into());
        self
    }

    pub fn notify(mut self, message: impl Into<String>) -> Self {
        self.notify = Some(message.into());
        self
    }

    pub fn favorite(mut self) -> Self {
        self.favorite = true;
        self
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }

    pub fn watch(mut self, spec: WatchSpec) -> Self {
        self.watch = Some(spec);
        self
    }

    /// True when the action combines a mode that ends the pipeline early
    /// (background, parallel, watch) with secondary stages that would never
    /// run. The config loader rejects these; the pipeline warns and ignores.
    pub fn has_inert_secondaries(&self) -> bool {
        let ends_early = self.shell_options.background
            || self.watch.is_some()
            || matches!(self.primary, Some(Primary::Parallel(_)));
        ends_early && (!self.chain.is_empty() || !self.after.is_empty() || self.notify.is_some())
    }
}

// --- Category ---

/// A menu entry that pushes a sub-menu. Its content builder runs against the
/// freshly pushed node; invoking it is the category's whole action.
#[derive(Clone)]
pub struct Category {
    pub base: ItemBase,
    pub content: ContentFn,
    pub from_dir: Option<PathBuf>,
    pub node_id: Option<&'static str>,
}

impl Category {
    pub fn new(label: impl Into<String>, content: impl Fn(&mut MenuNode) + 'static) -> Self {
        Self {
            base: ItemBase::new(label),
            content: Rc::new(content),
            from_dir: None,
            node_id: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.base.description = description.into();
        self
    }

    pub fn key(mut self, key: char) -> Self {
        self.base.key = Some(key);
        self
    }

    pub fn alternative_key(mut self, alt: AlternativeKey) -> Self {
        self.base.alternative_key = alt;
        self
    }

    pub fn persistent(mut self) -> Self {
        self.base.persistent = true;
        self
    }

    pub fn condition(mut self, condition: impl Fn() -> Result<bool> + Send + Sync + 'static) -> Self {
        self.base.condition = Some(Arc::new(condition));
        self
    }

    /// Sets the working directory of the pushed node.
    pub fn from_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.from_dir = Some(dir.into());
        self
    }

    pub fn node_id(mut self, id: &'static str) -> Self {
        self.node_id = Some(id);
        self
    }
}

// --- Item ---

/// A menu entry: either an action or a category.
#[derive(Clone)]
pub enum Item {
    Action(Action),
    Category(Category),
}

impl Item {
    pub fn base(&self) -> &ItemBase {
        match self {
            Self::Action(a) => &a.base,
            Self::Category(c) => &c.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut ItemBase {
        match self {
            Self::Action(a) => &mut a.base,
            Self::Category(c) => &mut c.base,
        }
    }

    pub fn label(&self) -> &str {
        &self.base().label
    }

    /// Evaluates the item's condition. A predicate error hides the item for
    /// this pass rather than surfacing to the user.
    pub fn is_visible(&self) -> bool {
        match &self.base().condition {
            None => true,
            Some(condition) => match condition() {
                Ok(visible) => visible,
                Err(e) => {
                    log::debug!("condition for '{}' failed, hiding item: {}", self.label(), e);
                    false
                }
            },
        }
    }
}

impl From<Action> for Item {
    fn from(action: Action) -> Self {
        Self::Action(action)
    }
}

impl From<Category> for Item {
    fn from(category: Category) -> Self {
        Self::Category(category)
    }
}

// --- MenuNode ---

/// Display and behavior options for a node. Children created while
/// `inherit_options` is set share the parent's cell, so a later change on the
/// parent is visible to every child that has not overridden it.
#[derive(Debug, Clone)]
pub struct MenuOptions {
    /// Launch shell commands through the user's login shell.
    pub login_shell: bool,
    pub inherit_options: bool,
    pub breadcrumb_color: Option<String>,
    pub key_color: Option<String>,
}

impl Default for MenuOptions {
    fn default() -> Self {
        Self {
            login_shell: false,
            inherit_options: true,
            breadcrumb_color: None,
            key_color: None,
        }
    }
}

/// One level of the navigation tree.
pub struct MenuNode {
    pub label: String,
    pub description: String,
    pub options: Rc<RefCell<MenuOptions>>,
    pub items: Vec<Item>,
    pub persistent_items: Vec<Item>,
    pub working_directory: PathBuf,
    pub id: Option<&'static str>,
}

impl std::fmt::Debug for MenuNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MenuNode")
            .field("label", &self.label)
            .field("description", &self.description)
            .field("options", &self.options.borrow())
            .field("items", &self.items.iter().map(Item::label).collect::<Vec<_>>())
            .field(
                "persistent_items",
                &self.persistent_items.iter().map(Item::label).collect::<Vec<_>>(),
            )
            .field("working_directory", &self.working_directory)
            .field("id", &self.id)
            .finish()
    }
}

impl MenuNode {
    /// Creates the root node; its working directory is the process cwd.
    pub fn root(label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: description.into(),
            options: Rc::new(RefCell::new(MenuOptions::default())),
            items: Vec::new(),
            persistent_items: Vec::new(),
            working_directory: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            id: None,
        }
    }

    /// Creates a child node: persistent items are copied in (minus the
    /// excluded one, usually the category that triggered the push), options
    /// are shared by reference when inheriting, and the working directory is
    /// taken from the parent.
    pub fn child(&self, label: &str, description: &str, exclude: Option<&str>) -> Self {
        let options = if self.options.borrow().inherit_options {
            Rc::clone(&self.options)
        } else {
            Rc::new(RefCell::new(self.options.borrow().clone()))
        };
        let persistent_items = self
            .persistent_items
            .iter()
            .filter(|item| exclude != Some(item.label()))
            .cloned()
            .collect();
        Self {
            label: label.to_string(),
            description: description.to_string(),
            options,
            items: Vec::new(),
            persistent_items,
            working_directory: self.working_directory.clone(),
            id: None,
        }
    }

    /// Adds an item, routing it by its `persistent` flag.
    pub fn add(&mut self, item: impl Into<Item>) {
        let item = item.into();
        if item.base().persistent {
            self.persistent_items.push(item);
        } else {
            self.items.push(item);
        }
    }

    /// Explicitly removes a persistent item by label. Persistent items are
    /// never removed any other way; navigation only copies them forward.
    pub fn remove_persistent(&mut self, label: &str) -> bool {
        let before = self.persistent_items.len();
        self.persistent_items.retain(|item| item.label() != label);
        self.persistent_items.len() != before
    }

    /// The items currently eligible for display and key assignment, in
    /// conflict-resolution order: owned items first, then persistent ones.
    pub fn visible_items(&self) -> Vec<&Item> {
        self.items
            .iter()
            .chain(self.persistent_items.iter())
            .filter(|item| item.is_visible())
            .collect()
    }
}

// --- NavigationStack ---

/// The current menu node plus its ancestor trail. Owned by the interactive
/// loop and threaded through it explicitly; there is no process-wide current
/// menu.
pub struct NavigationStack {
    current: MenuNode,
    ancestors: Vec<MenuNode>,
}

impl NavigationStack {
    pub fn new(root: MenuNode) -> Self {
        Self {
            current: root,
            ancestors: Vec::new(),
        }
    }

    pub fn current(&self) -> &MenuNode {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut MenuNode {
        &mut self.current
    }

    pub fn ancestors(&self) -> &[MenuNode] {
        &self.ancestors
    }

    pub fn at_root(&self) -> bool {
        self.ancestors.is_empty()
    }

    /// Pushes a new child of the current node and makes it current.
    pub fn push(&mut self, label: &str, description: &str, exclude_from_persistent: Option<&str>) {
        let child = self.current.child(label, description, exclude_from_persistent);
        let previous = std::mem::replace(&mut self.current, child);
        self.ancestors.push(previous);
    }

    /// Enters a category: pushes a node (excluding the category itself from
    /// the persistent copies), applies its directory override and id, then
    /// runs its content builder against the new node.
    pub fn enter_category(&mut self, category: &Category) {
        self.push(
            &category.base.label,
            &category.base.description,
            Some(&category.base.label),
        );
        if let Some(dir) = &category.from_dir {
            self.current.working_directory = resolve_dir(&self.current.working_directory, dir);
        }
        self.current.id = category.node_id;
        (category.content)(&mut self.current);
    }

    /// Leaves the current node. At the root this is a no-op, not an error.
    pub fn pop(&mut self) -> bool {
        match self.ancestors.pop() {
            Some(parent) => {
                self.current = parent;
                true
            }
            None => false,
        }
    }

    /// Renders the ancestor trail, the separator glyph and the current label.
    /// Purely a read operation.
    pub fn breadcrumb(&self) -> String {
        let options = self.current.options.borrow();
        let parent_color = options
            .breadcrumb_color
            .as_deref()
            .map_or(Color::BrightBlack, Color::from);
        let mut crumb = String::new();
        for ancestor in &self.ancestors {
            crumb.push_str(&format!("{} ", ancestor.label.color(parent_color)));
        }
        crumb.push_str(&format!("{} {}", "›".dimmed(), self.current.label.bold()));
        if !self.current.description.is_empty() {
            crumb.push_str(&format!(" {}", self.current.description.dimmed()));
        }
        crumb
    }
}

fn resolve_dir(base: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        base.join(dir)
    }
}
