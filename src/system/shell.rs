// src/system/shell.rs

use std::env;

/// The platform's non-interactive default shell.
pub fn default_shell() -> &'static str {
    if cfg!(target_os = "windows") { "cmd" } else { "sh" }
}

/// Builds the program and argument list that runs `command_line` through a
/// shell. With `login_shell` set the user's own shell (`$SHELL`) runs it as a
/// login command (`-lc`), so profile-provided aliases, functions and PATH
/// entries are available; otherwise the platform default shell runs it
/// non-interactively. Windows always goes through `cmd /C`.
pub fn shell_invocation(command_line: &str, login_shell: bool) -> (String, Vec<String>) {
    if cfg!(target_os = "windows") {
        return (
            "cmd".to_string(),
            vec!["/C".to_string(), command_line.to_string()],
        );
    }
    if login_shell {
        let shell = env::var("SHELL").unwrap_or_else(|_| default_shell().to_string());
        return (shell, vec!["-lc".to_string(), command_line.to_string()]);
    }
    (
        default_shell().to_string(),
        vec!["-c".to_string(), command_line.to_string()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_plain_invocation_uses_default_shell() {
        let (program, args) = shell_invocation("echo hi", false);
        assert_eq!(program, "sh");
        assert_eq!(args, vec!["-c".to_string(), "echo hi".to_string()]);
    }

    #[test]
    #[cfg(unix)]
    fn test_login_invocation_uses_user_shell() {
        let (_, args) = shell_invocation("echo hi", true);
        assert_eq!(args.first().map(String::as_str), Some("-lc"));
    }
}
