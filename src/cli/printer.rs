// src/cli/printer.rs

use crossterm::terminal::{Clear, ClearType};
use crossterm::{cursor, execute};
use std::io::{self, Write};

/// Terminal printer with clearable-line tracking.
///
/// Lines printed as clearable (the menu itself, transient notices) are erased
/// by the next `clear()`. Non-clearable lines (command output, result lines)
/// persist; printing one also makes the clearable lines above it permanent,
/// since the cursor could no longer skip over it to erase them.
pub struct Printer {
    clearable: usize,
}

impl Printer {
    pub fn new() -> Self {
        Self { clearable: 0 }
    }

    pub fn line(&mut self, text: &str, clearable: bool) {
        println!("{text}");
        if clearable {
            self.clearable += text.lines().count().max(1);
        } else {
            self.clearable = 0;
        }
    }

    pub fn multiline(&mut self, lines: &[String], clearable: bool) {
        for line in lines {
            self.line(line, clearable);
        }
    }

    /// Erases every clearable line printed since the last clear.
    pub fn clear(&mut self) {
        if self.clearable == 0 {
            return;
        }
        let mut stdout = io::stdout();
        for _ in 0..self.clearable {
            let _ = execute!(stdout, cursor::MoveUp(1), Clear(ClearType::CurrentLine));
        }
        let _ = stdout.flush();
        self.clearable = 0;
    }

    pub fn is_displayed(&self) -> bool {
        self.clearable > 0
    }
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clearable_lines_are_tracked() {
        let mut printer = Printer::new();
        assert!(!printer.is_displayed());
        printer.line("menu line", true);
        printer.multiline(&["a".to_string(), "b".to_string()], true);
        assert!(printer.is_displayed());
        printer.clear();
        assert!(!printer.is_displayed());
    }

    #[test]
    fn test_non_clearable_line_pins_earlier_output() {
        let mut printer = Printer::new();
        printer.line("menu line", true);
        printer.line("command output", false);
        // The permanent line resets the counter: nothing left to erase.
        assert!(!printer.is_displayed());
    }

    #[test]
    fn test_embedded_newlines_count_as_lines() {
        let mut printer = Printer::new();
        printer.line("one\ntwo\nthree", true);
        assert!(printer.is_displayed());
        assert_eq!(printer.clearable, 3);
    }
}
