// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! Output mode flags and terminal styling shared by every subcommand.
//!
//! `main` exports the global `--json` / `--quiet` / `--no-color` flags as
//! environment variables so any module can check them without threading
//! the parsed CLI around.

use serde::Serialize;
use std::io::IsTerminal;

pub const JSON_ENV: &str = "OPENBOX_JSON";
pub const QUIET_ENV: &str = "OPENBOX_QUIET";
pub const NO_COLOR_ENV: &str = "OPENBOX_NO_COLOR";

fn flag(name: &str) -> bool {
    std::env::var_os(name).is_some_and(|v| !v.is_empty() && v != "0")
}

pub fn is_json() -> bool {
    flag(JSON_ENV)
}

pub fn is_quiet() -> bool {
    flag(QUIET_ENV)
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("  Error: failed to encode output: {e}"),
    }
}

/// ANSI styling for stderr, disabled when stderr is not a terminal.
#[derive(Debug, Clone, Copy)]
pub struct Styled {
    color: bool,
}

impl Styled {
    pub fn new() -> Self {
        let color = !flag(NO_COLOR_ENV) && std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal();
        Self { color }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    pub fn ok_sym(&self) -> String {
        self.paint("32", "✓")
    }

    pub fn warn_sym(&self) -> String {
        self.paint("33", "!")
    }

    pub fn err_sym(&self) -> String {
        self.paint("31", "✗")
    }

    pub fn bold(&self, text: &str) -> String {
        self.paint("1", text)
    }

    pub fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_styling_has_no_escapes() {
        let s = Styled::plain();
        assert_eq!(s.ok_sym(), "✓");
        assert_eq!(s.bold("Summary"), "Summary");
    }

    #[test]
    fn test_colored_styling_wraps_text() {
        let s = Styled { color: true };
        assert_eq!(s.err_sym(), "\x1b[31m✗\x1b[0m");
    }
}
