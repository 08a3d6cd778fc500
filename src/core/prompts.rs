// src/core/prompts.rs

use anyhow::{Result, anyhow};
use dialoguer::{Input, Password, theme::ColorfulTheme};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Predicate deciding whether a wizard step runs, given the values
/// accumulated by earlier steps.
pub type WhenFn = Arc<dyn Fn(&HashMap<String, String>) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum PromptKind {
    Text { default: Option<String> },
    Password,
    Select { options: Vec<String> },
    Confirm { default_yes: bool },
}

/// One prompt of an action. Unnamed prompts resolve under the convenience
/// names `input`, `input2`, `input3`, ... in definition order.
#[derive(Clone)]
pub struct PromptDef {
    pub name: Option<String>,
    pub message: Option<String>,
    pub kind: PromptKind,
}

impl PromptDef {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            message: None,
            kind: PromptKind::Text { default: None },
        }
    }

    /// The unnamed convenience prompt backing a lone `{{input}}` placeholder.
    pub fn unnamed() -> Self {
        Self {
            name: None,
            message: None,
            kind: PromptKind::Text { default: None },
        }
    }

    pub fn password(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            message: None,
            kind: PromptKind::Password,
        }
    }

    pub fn select(name: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            name: Some(name.into()),
            message: None,
            kind: PromptKind::Select { options },
        }
    }

    pub fn confirm(name: impl Into<String>, default_yes: bool) -> Self {
        Self {
            name: Some(name.into()),
            message: None,
            kind: PromptKind::Confirm { default_yes },
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        if let PromptKind::Text { default } = &mut self.kind {
            *default = Some(value.into());
        }
        self
    }
}

/// A conditionally skippable group of prompts within a multi-step form.
#[derive(Clone)]
pub struct WizardStep {
    pub when: Option<WhenFn>,
    pub prompts: Vec<PromptDef>,
}

impl WizardStep {
    pub fn new(prompts: Vec<PromptDef>) -> Self {
        Self {
            when: None,
            prompts,
        }
    }

    pub fn when(
        mut self,
        predicate: impl Fn(&HashMap<String, String>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.when = Some(Arc::new(predicate));
        self
    }
}

// --- Input Boundary ---

/// The blocking line-read boundary the engine suspends on. At most one read
/// is in flight at a time; the engine calls these strictly in prompt order.
pub trait Prompter {
    fn read_line(&mut self, prompt: &str) -> Result<String>;
    fn read_password(&mut self, prompt: &str) -> Result<String>;
    /// Emits an informational line (numbered select options).
    fn show(&mut self, line: &str);
}

/// Terminal-backed prompter.
pub struct TermPrompter;

impl Prompter for TermPrompter {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        Ok(Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?)
    }

    fn read_password(&mut self, prompt: &str) -> Result<String> {
        Ok(Password::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()?)
    }

    fn show(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Prompter fed from a fixed answer list. Used by tests and by callers that
/// drive the pipeline without a terminal.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub shown: Vec<String>,
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|s| s.to_string()).collect(),
            shown: Vec::new(),
            asked: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        self.asked.push(prompt.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted answer left for prompt '{prompt}'"))
    }

    fn read_password(&mut self, prompt: &str) -> Result<String> {
        self.read_line(prompt)
    }

    fn show(&mut self, line: &str) {
        self.shown.push(line.to_string());
    }
}

// --- Answer Parsing ---

/// Maps a confirm answer to a boolean: `y`/`yes` and `n`/`no` are explicit
/// (case-insensitive); anything else, including an empty line, resolves to
/// the default rather than erroring.
pub fn parse_confirm(input: &str, default_yes: bool) -> bool {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default_yes,
    }
}

/// Parses a numbered-list selection. Valid answers are `1..=option_count`;
/// everything else re-prompts.
pub fn parse_selection(input: &str, option_count: usize) -> Option<usize> {
    input
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=option_count).contains(n))
        .map(|n| n - 1)
}

// --- Engine ---

/// Resolves prompt and wizard definitions into a name-to-value mapping,
/// strictly in definition order.
pub struct PromptEngine<'a> {
    prompter: &'a mut dyn Prompter,
    unnamed_count: usize,
}

impl<'a> PromptEngine<'a> {
    pub fn new(prompter: &'a mut dyn Prompter) -> Self {
        Self {
            prompter,
            unnamed_count: 0,
        }
    }

    pub fn resolve(&mut self, defs: &[PromptDef]) -> Result<HashMap<String, String>> {
        let mut values = HashMap::new();
        self.resolve_into(defs, &mut values)?;
        Ok(values)
    }

    /// Resolves a wizard: steps run in order, a step whose predicate rejects
    /// the values accumulated so far is skipped entirely (no suspension, no
    /// output).
    pub fn resolve_wizard(&mut self, steps: &[WizardStep]) -> Result<HashMap<String, String>> {
        let mut values = HashMap::new();
        for step in steps {
            if let Some(when) = &step.when
                && !when(&values)
            {
                continue;
            }
            self.resolve_into(&step.prompts, &mut values)?;
        }
        Ok(values)
    }

    fn resolve_into(
        &mut self,
        defs: &[PromptDef],
        values: &mut HashMap<String, String>,
    ) -> Result<()> {
        for def in defs {
            let name = self.name_for(def);
            let value = self.ask(def)?;
            values.insert(name, value);
        }
        Ok(())
    }

    fn name_for(&mut self, def: &PromptDef) -> String {
        match &def.name {
            Some(name) => name.clone(),
            None => {
                self.unnamed_count += 1;
                if self.unnamed_count == 1 {
                    "input".to_string()
                } else {
                    format!("input{}", self.unnamed_count)
                }
            }
        }
    }

    fn ask(&mut self, def: &PromptDef) -> Result<String> {
        let label = def
            .message
            .clone()
            .or_else(|| def.name.clone())
            .unwrap_or_else(|| "input".to_string());
        match &def.kind {
            PromptKind::Text { default } => {
                let prompt = match default {
                    Some(d) => format!("{label} [{d}]"),
                    None => label,
                };
                let raw = self.prompter.read_line(&prompt)?;
                if raw.is_empty()
                    && let Some(d) = default
                {
                    return Ok(d.clone());
                }
                Ok(raw)
            }
            PromptKind::Password => self.prompter.read_password(&label),
            PromptKind::Select { options } => {
                for (i, option) in options.iter().enumerate() {
                    self.prompter.show(&format!("  {}) {option}", i + 1));
                }
                loop {
                    let raw = self
                        .prompter
                        .read_line(&format!("{label} (1-{})", options.len()))?;
                    if let Some(idx) = parse_selection(&raw, options.len())
                        && let Some(choice) = options.get(idx)
                    {
                        return Ok(choice.clone());
                    }
                    // Out-of-range or non-numeric input re-prompts until valid.
                }
            }
            PromptKind::Confirm { default_yes } => {
                let suffix = if *default_yes { "[Y/n]" } else { "[y/N]" };
                let raw = self.prompter.read_line(&format!("{label} {suffix}"))?;
                Ok(if parse_confirm(&raw, *default_yes) {
                    "true".to_string()
                } else {
                    "false".to_string()
                })
            }
        }
    }
}

// MARK: --- UNIT TESTS ---
