// src/cli/init.rs

use crate::constants::CONFIG_FILENAME;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InitError {
    #[error("Refusing to overwrite existing configuration file '{0}'.")]
    AlreadyExists(PathBuf),
    #[error("Unknown init format '{0}' (expected 'toml' or 'json').")]
    UnknownFormat(String),
    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

const STARTER_TOML: &str = r#"# keydeck starter configuration.
# Every item maps one key press to a shell command, or opens a sub-menu.

[menu]
label = "my-project"
description = "project shortcuts"

[[menu.items]]
label = "Greet"
key = "g"
shell = "echo hello {{input}}"
prompts = [{ message = "Who should be greeted?" }]

[[menu.items]]
label = "Lists"

[[menu.items.items]]
label = "All files"
key = "a"
shell = "ls -la"
"#;

const STARTER_JSON: &str = r#"{
  "menu": {
    "label": "my-project",
    "description": "project shortcuts",
    "items": [
      {
        "label": "Greet",
        "key": "g",
        "shell": "echo hello {{input}}",
        "prompts": [{ "message": "Who should be greeted?" }]
      },
      {
        "label": "Lists",
        "items": [{ "label": "All files", "key": "a", "shell": "ls -la" }]
      }
    ]
  }
}
"#;

/// Writes a starter configuration into `dir`. Refuses to overwrite an
/// existing file; the caller maps that case to exit code 2.
pub fn handle(format: &str, dir: &Path) -> Result<PathBuf, InitError> {
    let (filename, contents) = match format {
        "toml" => (CONFIG_FILENAME, STARTER_TOML),
        "json" => ("keydeck.json", STARTER_JSON),
        other => return Err(InitError::UnknownFormat(other.to_string())),
    };
    let target = dir.join(filename);
    if target.exists() {
        return Err(InitError::AlreadyExists(target));
    }
    fs::write(&target, contents)?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config_loader;

    #[test]
    fn test_scaffolds_a_loadable_toml_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = handle("toml", dir.path()).expect("init");
        let file = config_loader::load(&target).expect("load");
        assert!(config_loader::build_root(&file).is_ok());
    }

    #[test]
    fn test_scaffolds_a_loadable_json_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = handle("json", dir.path()).expect("init");
        let file = config_loader::load(&target).expect("load");
        assert!(config_loader::build_root(&file).is_ok());
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        handle("toml", dir.path()).expect("first init");
        let result = handle("toml", dir.path());
        assert!(matches!(result, Err(InitError::AlreadyExists(_))));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            handle("yaml", dir.path()),
            Err(InitError::UnknownFormat(_))
        ));
    }
}
