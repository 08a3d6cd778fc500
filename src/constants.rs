// src/constants.rs

/// The default configuration file looked up in the working directory and its ancestors.
pub const CONFIG_FILENAME: &str = "keydeck.toml";

/// The hidden variant of the configuration file.
pub const HIDDEN_CONFIG_FILENAME: &str = ".keydeck.toml";

/// The name of the per-project configuration directory.
pub const CONFIG_DIR: &str = ".keydeck";

/// Maximum number of entries retained by the command history.
pub const HISTORY_CAPACITY: usize = 50;

/// Capacity of the global background-process log buffer (lines).
pub const PROCESS_LOG_CAPACITY: usize = 500;

/// Capacity of the per-invocation output buffer shown when a background process exits.
pub const PROCESS_TAIL_CAPACITY: usize = 20;

/// Tick interval for the key-event / process-event poll loop.
pub const POLL_INTERVAL_MS: u64 = 100;

/// Default quiet window before a filesystem change re-triggers a watched action.
pub const WATCH_DEBOUNCE_MS: u64 = 300;

/// Identifier of the synthetic "background processes" menu node.
pub const BACKGROUND_MENU_ID: &str = "background-processes";
