//! Terminal UI utilities for progress indication and styled output.

use std::borrow::Cow;
use std::io::{self, Write};
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Spinner for a single co-simulation or build.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    /// A spinner that draws nothing, for `--silent` and JSON output.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn finish_with_success(&self, message: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", style("✓").green().bold(), message);
    }

    pub fn finish_with_failure(&self, message: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", style("✗").red().bold(), message);
    }

    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Progress bar over the images of a batch.
pub struct Progress {
    bar: ProgressBar,
}

impl Progress {
    pub fn new(total: u64, message: &str) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:30.cyan/dim}] {pos}/{len} {elapsed}")
                .unwrap()
                .progress_chars("━╸━"),
        );
        bar.set_message(message.to_string());
        Self { bar }
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    /// Print a line above the bar without corrupting it.
    pub fn println(&self, message: &str) {
        self.bar.println(message);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

// ============================================================================
// Styled output helpers
// ============================================================================

/// Print an info message to stderr.
pub fn info(message: &str) {
    eprintln!("{} {}", style("→").cyan(), message);
}

/// Print a success message to stderr.
pub fn success(message: &str) {
    eprintln!("{} {}", style("✓").green().bold(), message);
}

/// Print an error message to stderr.
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// Print a warning message to stderr.
pub fn warning(message: &str) {
    eprintln!("{} {}", style("!").yellow().bold(), message);
}

/// Print an indented line to stderr.
pub fn indent(message: &str) {
    eprintln!("  {message}");
}

/// Print a path output (like "-> /path/to/file").
pub fn path_output(path: &std::path::Path) {
    eprintln!("  {} {}", style("→").dim(), style(path.display()).dim());
}

/// Styled verdict label.
pub fn status_label(status: friscv::runner::TestStatus) -> String {
    use friscv::runner::TestStatus;
    match status {
        TestStatus::Pass => style("PASS").green().to_string(),
        TestStatus::Fail => style("FAIL").red().to_string(),
        TestStatus::Error => style("ERROR").yellow().to_string(),
    }
}

// ============================================================================
// Table output (for batch results)
// ============================================================================

/// A builder for plain markdown tables.
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    alignments: Vec<Alignment>,
}

/// Column alignment.
#[derive(Clone, Copy, Default)]
pub enum Alignment {
    #[default]
    Left,
    Right,
}

impl Table {
    pub fn new(headers: Vec<&str>) -> Self {
        let count = headers.len();
        Self {
            headers: headers.into_iter().map(String::from).collect(),
            rows: Vec::new(),
            alignments: vec![Alignment::Left; count],
        }
    }

    #[must_use]
    pub fn with_alignments(mut self, alignments: Vec<Alignment>) -> Self {
        self.alignments = alignments;
        self
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn render(&self) -> String {
        if self.headers.is_empty() {
            return String::new();
        }

        let mut widths: Vec<usize> = self.headers.iter().map(String::len).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.len());
                }
            }
        }

        let mut output = String::from("|");
        for (i, header) in self.headers.iter().enumerate() {
            let w = widths.get(i).copied().unwrap_or(0);
            output.push_str(&format!(" {header:^w$} |"));
        }
        output.push_str("\n|");
        for (i, &width) in widths.iter().enumerate() {
            let sep = match self.alignments.get(i).copied().unwrap_or_default() {
                Alignment::Left => format!(":{:-<w$}|", "", w = width + 1),
                Alignment::Right => format!("{:-<w$}:|", "", w = width + 1),
            };
            output.push_str(&sep);
        }
        output.push('\n');

        for row in &self.rows {
            output.push('|');
            for (i, cell) in row.iter().enumerate() {
                let w = widths.get(i).copied().unwrap_or(0);
                let formatted = match self.alignments.get(i).copied().unwrap_or_default() {
                    Alignment::Left => format!(" {cell:<w$} |"),
                    Alignment::Right => format!(" {cell:>w$} |"),
                };
                output.push_str(&formatted);
            }
            output.push('\n');
        }

        output
    }

    pub fn print(&self) {
        print!("{}", self.render());
        let _ = io::stdout().flush();
    }
}
