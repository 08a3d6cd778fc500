// src/models.rs
//
// Declarative configuration models: what the user writes in keydeck.toml (or
// keydeck.json). These are deserialize-only; the loader converts them into
// the runtime item tree. Declarative files can only express shell payloads;
// in-process callbacks exist on the library builder surface.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Top level of a configuration file.
#[derive(Deserialize, Debug, Clone)]
pub struct MenuFile {
    pub menu: MenuSpec,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct MenuSpec {
    pub label: Option<String>,
    #[serde(default, alias = "desc")]
    pub description: Option<String>,
    #[serde(default)]
    pub options: OptionsSpec,
    #[serde(default)]
    pub items: Vec<ItemSpec>,
}

/// Display and behavior options of the root node.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct OptionsSpec {
    #[serde(default)]
    pub login_shell: bool,
    pub inherit_options: Option<bool>,
    pub breadcrumb_color: Option<String>,
    pub key_color: Option<String>,
}

/// A menu entry. Whether it is an action or a category is decided by field
/// presence (`items` makes it a category) and checked by the loader's
/// validation pass.
#[derive(Deserialize, Debug, Clone)]
pub struct ItemSpec {
    pub label: String,
    #[serde(default, alias = "desc")]
    pub description: Option<String>,
    pub key: Option<char>,
    pub alternative_key: Option<AltKeySpec>,
    #[serde(default)]
    pub persistent: bool,

    // --- Action fields ---
    pub shell: Option<String>,
    #[serde(default)]
    pub parallel: Vec<ParallelTaskSpec>,
    #[serde(default)]
    pub background: bool,
    #[serde(default)]
    pub capture: bool,
    #[serde(default)]
    pub silent: bool,
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub prompts: Vec<PromptSpec>,
    #[serde(default)]
    pub wizard: Vec<WizardStepSpec>,
    pub confirm: Option<ConfirmSpec>,
    #[serde(default)]
    pub before: Vec<String>,
    #[serde(default)]
    pub after: Vec<String>,
    #[serde(default)]
    pub chain: Vec<ChainSpec>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<String>,
    pub notify: Option<String>,
    #[serde(default)]
    pub favorite: bool,
    pub help: Option<String>,
    pub watch: Option<WatchSpecConfig>,

    // --- Category fields ---
    #[serde(default)]
    pub items: Vec<ItemSpec>,
    /// Working-directory override applied to the pushed node.
    pub from: Option<String>,
}

/// `alternative_key = false` disables the fallback scan;
/// `alternative_key = "x"` overrides the fallback key.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum AltKeySpec {
    Enabled(bool),
    Key(char),
}

/// `confirm = "message"` with a yes default, or the full form with an
/// explicit default.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum ConfirmSpec {
    Message(String),
    Full {
        message: String,
        #[serde(default = "default_true")]
        default: bool,
    },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum ParallelTaskSpec {
    Command(String),
    Labeled { label: String, shell: String },
}

/// One chain link: `run` executes against the rolling status; with
/// `on_error` it fires only when that status is failure.
#[derive(Deserialize, Debug, Clone)]
pub struct ChainSpec {
    pub run: String,
    #[serde(default)]
    pub on_error: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PromptSpec {
    pub name: Option<String>,
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: PromptKindSpec,
    #[serde(default)]
    pub options: Vec<String>,
    pub default: Option<String>,
    pub default_yes: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PromptKindSpec {
    #[default]
    Text,
    Password,
    Select,
    Confirm,
}

#[derive(Deserialize, Debug, Clone)]
pub struct WizardStepSpec {
    pub when: Option<WhenSpec>,
    #[serde(default)]
    pub prompts: Vec<PromptSpec>,
}

/// Declarative step predicate: the step runs when an earlier value equals
/// the given string.
#[derive(Deserialize, Debug, Clone)]
pub struct WhenSpec {
    pub name: String,
    pub equals: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct WatchSpecConfig {
    pub interval_secs: Option<u64>,
    #[serde(default)]
    pub paths: Vec<String>,
    pub debounce_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}
