//! Terminal rendering for command results.

pub mod progress;
pub mod reporter;
pub mod styles;

use std::ffi::OsStr;

use console::Term;
use owo_colors::{OwoColorize as _, Style};
pub use reporter::TerminalReporter;
pub use styles::Styles;

/// Column the values of `kv` lines start at.
const KEY_WIDTH: usize = 14;

/// Whether `NO_COLOR` is set to a non-empty value.
#[must_use]
pub fn no_color_env() -> bool {
    no_color_requested(std::env::var_os("NO_COLOR").as_deref())
}

fn no_color_requested(value: Option<&OsStr>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

/// Where command output goes and how it looks.
pub struct OutputContext {
    pub styles: Styles,
    /// stdout is a terminal
    pub is_tty: bool,
    /// Only errors are printed.
    pub quiet: bool,
}

impl OutputContext {
    /// Colors are used only on a terminal, without `--no-color` or `NO_COLOR`.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let colored = is_tty && !no_color && !no_color_env();
        Self {
            styles: Styles::for_terminal(colored),
            is_tty,
            quiet,
        }
    }

    /// Spinners and bars need a terminal and a non-quiet run.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        !self.quiet && self.is_tty
    }

    pub fn success(&self, msg: &str) {
        self.line("✓", self.styles.success, msg);
    }

    pub fn warn(&self, msg: &str) {
        self.line("!", self.styles.warning, msg);
    }

    pub fn info(&self, msg: &str) {
        self.line("ℹ", self.styles.info, msg);
    }

    /// Title line above a block of `kv` rows.
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }
        println!("  {}", title.style(self.styles.header));
    }

    /// Indented `key value` row, keys padded to a common column.
    pub fn kv(&self, key: &str, value: &str) {
        if self.quiet {
            return;
        }
        let padded = format!("{key:<KEY_WIDTH$}");
        println!("    {} {value}", padded.style(self.styles.dim));
    }

    fn line(&self, marker: &str, style: Style, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", marker.style(style));
        }
    }
}
