// src/core/config_loader.rs
//
// Discovery, parsing and validation of the declarative configuration, and
// the one-shot populate pass that turns it into the runtime menu tree. The
// rest of the crate never reads configuration files itself.

use crate::constants::{CONFIG_DIR, CONFIG_FILENAME, HIDDEN_CONFIG_FILENAME, WATCH_DEBOUNCE_MS};
use crate::core::menu::{
    Action, AlternativeKey, Category, Item, MenuNode, MenuOptions, ParallelTask, Payload,
};
use crate::core::prompts::{PromptDef, PromptKind, WizardStep};
use crate::core::watch::WatchSpec;
use crate::models::{
    AltKeySpec, ConfirmSpec, ItemSpec, MenuFile, ParallelTaskSpec, PromptKindSpec, PromptSpec,
    WatchSpecConfig, WizardStepSpec,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "No configuration file found. Create one with `keydeck --init` or pass `--file <path>`."
    )]
    NotFound,
    #[error("Configuration file '{0}' does not exist.")]
    ExplicitMissing(PathBuf),
    #[error("Filesystem error while reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse '{path}': {message}")]
    Parse { path: PathBuf, message: String },
    #[error("Unsupported configuration format '{0}' (expected .toml or .json).")]
    UnsupportedFormat(String),
    #[error("Invalid menu configuration:\n{0}")]
    Invalid(String),
}

// --- Discovery ---

/// Resolves the configuration file to load: the explicit `--file` path when
/// given (which must exist), otherwise the first candidate found walking up
/// from the current directory.
pub fn discover(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(ConfigError::ExplicitMissing(path.to_path_buf()))
        };
    }
    let start = env::current_dir().map_err(|source| ConfigError::Io {
        path: PathBuf::from("."),
        source,
    })?;
    discover_from(&start)
}

/// The upward search itself, separated from the cwd lookup so it can run
/// against any starting directory. Falls back to the user-level
/// configuration (`~/.config/keydeck/keydeck.toml`) when no project file
/// exists anywhere above `start`.
pub fn discover_from(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut dir = start.to_path_buf();
    loop {
        for candidate in [
            dir.join(CONFIG_FILENAME),
            dir.join(HIDDEN_CONFIG_FILENAME),
            dir.join(CONFIG_DIR).join(CONFIG_FILENAME),
        ] {
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => break,
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("keydeck").join(CONFIG_FILENAME);
        if global.is_file() {
            return Ok(global);
        }
    }
    Err(ConfigError::NotFound)
}

// --- Parsing ---

/// Parses a configuration file, choosing the format by extension.
pub fn load(path: &Path) -> Result<MenuFile, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
        Some("json") => serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
        other => Err(ConfigError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

// --- Validation ---

/// Validates the whole item tree, collecting every issue into one error so
/// the user can fix a broken file in a single pass.
pub fn validate(file: &MenuFile) -> Result<(), ConfigError> {
    let mut issues = Vec::new();
    if file.menu.items.is_empty() {
        issues.push("the menu has no items".to_string());
    }
    let mut trail = Vec::new();
    for item in &file.menu.items {
        validate_item(item, &mut trail, &mut issues);
    }
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(
            issues
                .iter()
                .map(|i| format!("  - {i}"))
                .collect::<Vec<_>>()
                .join("\n"),
        ))
    }
}

fn validate_item(item: &ItemSpec, trail: &mut Vec<String>, issues: &mut Vec<String>) {
    trail.push(item.label.clone());
    let here = trail.join(" > ");

    let has_items = !item.items.is_empty();
    let has_shell = item.shell.as_ref().is_some_and(|s| !s.trim().is_empty());
    let has_parallel = !item.parallel.is_empty();

    if has_items && (has_shell || has_parallel) {
        issues.push(format!(
            "'{here}' cannot have 'items' together with 'shell' or 'parallel'"
        ));
    }
    if has_shell && has_parallel {
        issues.push(format!("'{here}' cannot specify both 'shell' and 'parallel'"));
    }
    if !has_items && !has_shell && !has_parallel {
        issues.push(format!("'{here}' has no action ('shell'/'parallel') and no 'items'"));
    }
    if !item.prompts.is_empty() && !item.wizard.is_empty() {
        issues.push(format!("'{here}' cannot have both 'prompts' and 'wizard'"));
    }
    if item.background && item.watch.is_some() {
        issues.push(format!("'{here}' cannot combine 'background' with 'watch'"));
    }

    // Background, parallel and watch end the pipeline before the chaining,
    // after-hook and notification stages; configuring both is rejected
    // instead of silently ignored.
    let ends_early = item.background || has_parallel || item.watch.is_some();
    if ends_early && (!item.chain.is_empty() || !item.after.is_empty() || item.notify.is_some()) {
        issues.push(format!(
            "'{here}' combines background/parallel/watch with 'chain', 'after' or 'notify', which would never run"
        ));
    }

    for prompt in item
        .prompts
        .iter()
        .chain(item.wizard.iter().flat_map(|s| s.prompts.iter()))
    {
        if prompt.kind == PromptKindSpec::Select && prompt.options.is_empty() {
            issues.push(format!("'{here}' has a select prompt without 'options'"));
        }
    }

    for child in &item.items {
        validate_item(child, trail, issues);
    }
    trail.pop();
}

// --- Tree Construction ---

/// Validates the file and populates a fresh root node from it. Invoked once
/// at startup against the freshly constructed root.
pub fn build_root(file: &MenuFile) -> Result<MenuNode, ConfigError> {
    validate(file)?;
    let mut root = MenuNode::root(
        file.menu.label.clone().unwrap_or_else(|| "keydeck".to_string()),
        file.menu.description.clone().unwrap_or_default(),
    );
    {
        let mut options = root.options.borrow_mut();
        *options = MenuOptions {
            login_shell: file.menu.options.login_shell,
            inherit_options: file.menu.options.inherit_options.unwrap_or(true),
            breadcrumb_color: file.menu.options.breadcrumb_color.clone(),
            key_color: file.menu.options.key_color.clone(),
        };
    }
    for spec in &file.menu.items {
        root.add(item_from_spec(spec));
    }
    Ok(root)
}

/// Converts one validated spec into a runtime item. Specs with children
/// become categories whose content builder materializes the child specs
/// against the pushed node.
fn item_from_spec(spec: &ItemSpec) -> Item {
    if !spec.items.is_empty() {
        let children = spec.items.clone();
        let mut category = Category::new(spec.label.clone(), move |node| {
            for child in &children {
                node.add(item_from_spec(child));
            }
        });
        category.base.description = spec.description.clone().unwrap_or_default();
        category.base.key = spec.key;
        category.base.alternative_key = alt_key_from_spec(spec.alternative_key.as_ref());
        category.base.persistent = spec.persistent;
        if let Some(from) = &spec.from {
            category = category.from_dir(PathBuf::from(shellexpand::tilde(from).into_owned()));
        }
        return Item::Category(category);
    }

    let mut action = Action::new(spec.label.clone());
    action.base.description = spec.description.clone().unwrap_or_default();
    action.base.key = spec.key;
    action.base.alternative_key = alt_key_from_spec(spec.alternative_key.as_ref());
    action.base.persistent = spec.persistent;

    if let Some(shell) = &spec.shell {
        action = action.shell(shell.clone());
    }
    if !spec.parallel.is_empty() {
        let tasks = spec
            .parallel
            .iter()
            .map(|task| match task {
                ParallelTaskSpec::Command(command) => ParallelTask {
                    label: command.clone(),
                    payload: Payload::Shell(command.clone()),
                },
                ParallelTaskSpec::Labeled { label, shell } => ParallelTask {
                    label: label.clone(),
                    payload: Payload::Shell(shell.clone()),
                },
            })
            .collect();
        action = action.parallel(tasks);
    }

    action.shell_options.background = spec.background;
    action.shell_options.capture = spec.capture;
    action.shell_options.silent = spec.silent;
    action.shell_options.timeout = spec.timeout_secs.map(Duration::from_secs);

    action.prompts = spec.prompts.iter().map(prompt_from_spec).collect();
    action.wizard = spec.wizard.iter().map(wizard_step_from_spec).collect();

    if let Some(confirm) = &spec.confirm {
        action = match confirm {
            ConfirmSpec::Message(message) => action.confirm(message.clone(), true),
            ConfirmSpec::Full { message, default } => action.confirm(message.clone(), *default),
        };
    }
    for command in &spec.before {
        action = action.before(Payload::Shell(command.clone()));
    }
    for command in &spec.after {
        action = action.after(Payload::Shell(command.clone()));
    }
    for link in &spec.chain {
        action = if link.on_error {
            action.on_error(Payload::Shell(link.run.clone()))
        } else {
            action.then(Payload::Shell(link.run.clone()))
        };
    }
    for (key, value) in &spec.env {
        action = action.env(key.clone(), value.clone());
    }
    if let Some(dir) = &spec.working_dir {
        action = action.working_dir(dir.clone());
    }
    if let Some(notify) = &spec.notify {
        action = action.notify(notify.clone());
    }
    if spec.favorite {
        action = action.favorite();
    }
    if let Some(help) = &spec.help {
        action = action.help(help.clone());
    }
    if let Some(watch) = &spec.watch {
        action = action.watch(watch_from_spec(watch));
    }
    Item::Action(action)
}

fn alt_key_from_spec(spec: Option<&AltKeySpec>) -> AlternativeKey {
    match spec {
        None | Some(AltKeySpec::Enabled(true)) => AlternativeKey::Auto,
        Some(AltKeySpec::Enabled(false)) => AlternativeKey::Disabled,
        Some(AltKeySpec::Key(key)) => AlternativeKey::Explicit(*key),
    }
}

fn prompt_from_spec(spec: &PromptSpec) -> PromptDef {
    let kind = match spec.kind {
        PromptKindSpec::Text => PromptKind::Text {
            default: spec.default.clone(),
        },
        PromptKindSpec::Password => PromptKind::Password,
        PromptKindSpec::Select => PromptKind::Select {
            options: spec.options.clone(),
        },
        PromptKindSpec::Confirm => PromptKind::Confirm {
            default_yes: spec.default_yes.unwrap_or(true),
        },
    };
    PromptDef {
        name: spec.name.clone(),
        message: spec.message.clone(),
        kind,
    }
}

fn wizard_step_from_spec(spec: &WizardStepSpec) -> WizardStep {
    let mut step = WizardStep::new(spec.prompts.iter().map(prompt_from_spec).collect());
    if let Some(when) = &spec.when {
        let name = when.name.clone();
        let equals = when.equals.clone();
        step = step.when(move |values| values.get(&name) == Some(&equals));
    }
    step
}

fn watch_from_spec(spec: &WatchSpecConfig) -> WatchSpec {
    let mut watch = match spec.interval_secs {
        Some(secs) => WatchSpec::interval(Duration::from_secs(secs)),
        None => WatchSpec::paths(spec.paths.iter().map(PathBuf::from).collect()),
    };
    watch = watch.debounce(Duration::from_millis(
        spec.debounce_ms.unwrap_or(WATCH_DEBOUNCE_MS),
    ));
    watch
}

// MARK: --- UNIT TESTS ---
