//! The `Reporter` collaborator: formatting and emitting progress/result
//! text. The engine never prints directly; everything user-visible flows
//! through this trait, so embedders can capture or restyle the output.

use std::io::Write;
use std::time::Duration;

use colored::Colorize;

use crate::options::Options;

/// A reported failure: the formatted message plus the assertion's source
/// location, when one is known. Foreign panics carry no location.
pub struct Failure {
    pub message: String,
    pub location: Option<(&'static str, u32)>,
}

/// Receiver for every user-visible event of a run.
///
/// `depth` is the nesting level: a top-level suite banner is depth 0, its
/// cases are depth 1, a subdesc's cases depth 2, and so on.
pub trait Reporter {
    /// A suite banner: `Testing <name>:`.
    fn suite_begin(&mut self, depth: usize, name: &str);
    /// A suite footer: `<name>: Passed <passed>/<total> tests.`
    fn suite_end(&mut self, depth: usize, name: &str, passed: u32, total: u32, elapsed: Duration);
    /// The pre-case progress notice (the "maybe" line).
    fn case_begin(&mut self, depth: usize, name: &str);
    fn case_success(&mut self, depth: usize, name: &str, elapsed: Duration);
    fn case_failure(&mut self, depth: usize, name: &str, failure: &Failure, suite: &str);
    /// An after-hook failure. Reported separately because it never flips the
    /// case's own outcome, but still fails the run.
    fn after_hook_failure(&mut self, depth: usize, name: &str, failure: &Failure, suite: &str);
    /// A failure inside a deferred cleanup action.
    fn defer_failure(&mut self, depth: usize, name: &str, failure: &Failure, suite: &str);
    /// One entry of `--list` output.
    fn list_entry(&mut self, full_name: &str);
    /// The final aggregate line.
    fn total(&mut self, passed: u32, total: u32, elapsed: Duration);
}

// ============================================================================
// Console reporter
// ============================================================================

/// The default reporter: writes the classic indented console format to
/// stdout or the `--log` file, honoring quiet/maybes/cr/timer/color.
pub struct ConsoleReporter {
    out: Box<dyn Write>,
    quiet: bool,
    maybes: bool,
    cr: bool,
    timer: bool,
}

impl ConsoleReporter {
    pub fn new(out: Box<dyn Write>, opts: &Options) -> Self {
        colored::control::set_override(opts.color);
        ConsoleReporter {
            out,
            quiet: opts.quiet,
            maybes: opts.maybes,
            cr: opts.cr,
            timer: opts.timer,
        }
    }

    fn elapsed_suffix(&self, elapsed: Duration) -> String {
        if self.timer {
            format!(" ({})", format_duration(elapsed))
        } else {
            String::new()
        }
    }

    fn failure_block(
        &mut self,
        depth: usize,
        label: &str,
        name: &str,
        failure: &Failure,
        suite: &str,
    ) {
        let indent = "  ".repeat(depth);
        let _ = writeln!(
            self.out,
            "{indent}{} {}",
            format!("✕ {label}:").red().bold(),
            format!("{name}:").bold()
        );
        let _ = writeln!(self.out, "{indent}    {}", failure.message.red());
        if let Some((file, line)) = failure.location {
            let _ = writeln!(self.out, "{indent}    in {file}:{line}({suite})");
        }
        let _ = self.out.flush();
    }
}

impl Reporter for ConsoleReporter {
    fn suite_begin(&mut self, depth: usize, name: &str) {
        if self.quiet {
            return;
        }
        let indent = "  ".repeat(depth);
        let _ = writeln!(self.out, "{indent}{}", format!("Testing {name}:").bold());
    }

    fn suite_end(&mut self, depth: usize, name: &str, passed: u32, total: u32, elapsed: Duration) {
        if self.quiet {
            return;
        }
        let indent = "  ".repeat(depth);
        let suffix = self.elapsed_suffix(elapsed);
        let _ = writeln!(
            self.out,
            "{indent}{}{suffix}",
            format!("{name}: Passed {passed}/{total} tests.").bold()
        );
    }

    fn case_begin(&mut self, depth: usize, name: &str) {
        if self.quiet || !self.maybes {
            return;
        }
        let indent = "  ".repeat(depth);
        let line = format!("{indent}? Testing: {name}").dimmed();
        if self.cr {
            // The result line is at least as wide and overwrites this one.
            let _ = write!(self.out, "{line}\r");
        } else {
            let _ = writeln!(self.out, "{line}");
        }
        let _ = self.out.flush();
    }

    fn case_success(&mut self, depth: usize, name: &str, elapsed: Duration) {
        if self.quiet {
            return;
        }
        let indent = "  ".repeat(depth);
        let suffix = self.elapsed_suffix(elapsed);
        let _ = writeln!(
            self.out,
            "{indent}{} {}{suffix}",
            "✓ Success:".green().bold(),
            name.bold()
        );
    }

    fn case_failure(&mut self, depth: usize, name: &str, failure: &Failure, suite: &str) {
        self.failure_block(depth, "Failed", name, failure, suite);
    }

    fn after_hook_failure(&mut self, depth: usize, name: &str, failure: &Failure, suite: &str) {
        self.failure_block(depth, "Failed in after hook", name, failure, suite);
    }

    fn defer_failure(&mut self, depth: usize, name: &str, failure: &Failure, suite: &str) {
        self.failure_block(depth, "Failed in defer", name, failure, suite);
    }

    fn list_entry(&mut self, full_name: &str) {
        let _ = writeln!(self.out, "{full_name}");
    }

    fn total(&mut self, passed: u32, total: u32, elapsed: Duration) {
        let suffix = self.elapsed_suffix(elapsed);
        let _ = writeln!(
            self.out,
            "{}{suffix}",
            format!("Total: Passed {passed}/{total} tests.").bold()
        );
        let _ = self.out.flush();
    }
}

/// Sub-second durations in milliseconds, everything else in seconds, two
/// decimals each.
pub(crate) fn format_duration(d: Duration) -> String {
    let ms = d.as_secs_f64() * 1000.0;
    if ms >= 1000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else {
        format!("{ms:.2}ms")
    }
}
