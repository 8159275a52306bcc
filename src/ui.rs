//! Terminal UI — spinners, stage lines, and the closing summary banner.
//!
//! A pipeline is a short list of stages run in order.  While a stage runs the
//! user sees a spinner and its label; when it finishes the spinner is
//! replaced by a static `✓ label` or `✗ label` line.  The first failing stage
//! stops the pipeline; its error travels back to the caller, which prints it
//! once.
//!
//! ```text
//!   ✓  List keys (42)
//!   ✓  Reset ./data
//!   ✓  Write files (42/42)
//!
//!   ✓ Backup completed.
//! ```

use std::time::Duration;

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

// ─── Icons ───────────────────────────────────────────────────────────────────

/// Braille spinner frames — same style as indicatif's default.
static SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

fn icon_ok() -> console::StyledObject<&'static str> {
    style("✓").green().bold()
}
fn icon_err() -> console::StyledObject<&'static str> {
    style("✗").red().bold()
}
fn icon_done() -> console::StyledObject<&'static str> {
    style("✓").cyan().bold()
}

// ─── Stage result ─────────────────────────────────────────────────────────────

/// The outcome of a single pipeline stage.
#[derive(Debug)]
pub struct StageOutcome {
    /// Human-readable label, possibly refined by the stage while it ran.
    pub label: String,
    pub success: bool,
}

impl StageOutcome {
    /// The one-line summary: ✓/✗ and the label.
    fn render(&self) -> String {
        let icon = if self.success { icon_ok() } else { icon_err() };
        format!("  {icon}  {}", style(&self.label).bold())
    }

    pub fn print(&self) {
        println!("{}", self.render());
    }

    pub const fn failed(&self) -> bool {
        !self.success
    }
}

// ─── Spinner ──────────────────────────────────────────────────────────────────

/// Create and start an indeterminate spinner for `label`.
///
/// indicatif hides itself when stderr is not a terminal, so this is silent
/// under tests and pipes.
fn make_spinner(label: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style_) = ProgressStyle::with_template("  {spinner:.cyan}  {msg}") {
        pb.set_style(style_.tick_chars(SPINNER_CHARS));
    }
    pb.set_message(format!("{}", style(label).dim()));
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ─── Stage handle ─────────────────────────────────────────────────────────────

/// Passed to a running stage so it can report progress and refine its label.
pub struct Stage {
    spinner: ProgressBar,
    label: String,
}

impl Stage {
    /// Show `n/total` next to the label while the stage is running.
    pub fn progress(&self, n: usize, total: usize) {
        self.spinner
            .set_message(format!("{} ({n}/{total})", style(&self.label).dim()));
    }

    /// Replace the label printed once the stage finishes.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
        self.spinner
            .set_message(format!("{}", style(&self.label).dim()));
    }
}

// ─── Pipeline ─────────────────────────────────────────────────────────────────

/// Runs stages in order and remembers their outcomes for the summary.
pub struct Pipeline {
    name: &'static str,
    outcomes: Vec<StageOutcome>,
}

impl Pipeline {
    pub fn new(name: &'static str) -> Self {
        println!();
        Self {
            name,
            outcomes: Vec::new(),
        }
    }

    /// Run `f` behind a spinner labelled `label`.
    ///
    /// On success the stage's value is returned.  On failure the summary
    /// banner is printed and the error is returned with a `pipeline aborted`
    /// context, left for the caller to report.
    pub fn stage<T>(
        &mut self,
        label: &str,
        f: impl FnOnce(&mut Stage) -> Result<T>,
    ) -> Result<T> {
        let mut stage = Stage {
            spinner: make_spinner(label),
            label: label.to_string(),
        };

        let result = f(&mut stage);
        stage.spinner.finish_and_clear();

        let outcome = StageOutcome {
            label: stage.label,
            success: result.is_ok(),
        };
        outcome.print();
        let failed = outcome.failed();
        self.outcomes.push(outcome);

        if failed {
            print_summary(self.name, &self.outcomes);
        }
        result.map_err(|e| e.context(format!("{} aborted: {label} failed", self.name)))
    }

    /// Print the success banner after the last stage.
    pub fn finish(self) {
        print_summary(self.name, &self.outcomes);
    }

    #[cfg(test)]
    pub fn outcomes(&self) -> &[StageOutcome] {
        &self.outcomes
    }
}

// ─── Summary banner ───────────────────────────────────────────────────────────

/// Print a success banner when every stage passed, or a failure banner
/// listing the stages that failed.
pub fn print_summary(name: &str, outcomes: &[StageOutcome]) {
    let failed: Vec<&StageOutcome> = outcomes.iter().filter(|o| o.failed()).collect();
    println!();
    if failed.is_empty() {
        println!(
            "  {} {}",
            icon_done(),
            style(format!("{name} completed.")).cyan().bold()
        );
    } else {
        eprintln!(
            "  {}  {}",
            icon_err(),
            style(format!("{name} failed.")).red().bold()
        );
        for o in &failed {
            eprintln!("    {} {}", icon_err(), style(&o.label).red());
        }
    }
    println!();
}

// ─── Tests ────────────────────────────────────────────────────────────────────
