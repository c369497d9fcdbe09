//! Console output for compacty
//!
//! Everything meant for the user (summaries, warnings, command lines) goes
//! through [`Output`]. Diagnostics go through `tracing` instead.

use console::style;

/// Output handler for consistent CLI formatting
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    verbose: bool,
    quiet: bool,
}

impl Output {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    /// Output handler that prints nothing
    pub fn silent() -> Self {
        Self::new(false, true)
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("✔").green(), message);
        }
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("⚠").yellow(), message);
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("ℹ").blue(), message);
        }
    }

    /// Only shown with `--verbose`
    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("{} {}", style("ℹ").dim(), style(message).dim());
        }
    }

    pub fn plain(&self, message: &str) {
        if !self.quiet {
            println!("{message}");
        }
    }

    /// Echo of a tool invocation about to run
    pub fn command_line(&self, line: &str) {
        if !self.quiet {
            println!("{} {}", style("|").cyan(), style(line).dim());
        }
    }

    pub fn section_header(&self, title: &str) {
        if !self.quiet {
            println!("\n{}", style(title).bold().cyan());
        }
    }

    pub fn step(&self, step: &str) {
        if !self.quiet {
            println!("{} {}", style("❯").cyan(), step);
        }
    }

    pub fn blank_line(&self) {
        if !self.quiet {
            println!();
        }
    }
}
