//! Suite-tree execution: the engine, the per-run session state, and the
//! case state machine.
//!
//! A run walks the registered suite trees depth-first with an explicit
//! frame stack. Each frame carries the suite's dotted full name, its
//! enabled flag, its pass/fail counters, and the effective around-hooks.
//! Counters roll up into the parent frame when a suite ends. A case
//! executes as: before-hook, body, LIFO defer drain, after-hook. A
//! failing assertion anywhere in the first two steps unwinds straight to
//! the defer drain without skipping it.

use std::io::{self, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::process::Command;
use std::rc::Rc;
use std::time::Instant;

use crate::check::{self, CaseFailed};
use crate::options::{usage, ConfigError, FilterSet, LogTarget, Options};
use crate::report::{ConsoleReporter, Failure, Reporter};

/// An around-hook. Shared by reference down the suite tree so a parent's
/// hook can apply to every descendant case without cloning the closure.
pub type Hook = Rc<dyn Fn()>;

// ============================================================================
// Test tree
// ============================================================================

/// A node in the suite tree.
pub enum TestNode {
    /// A `describe`/`subdesc` container.
    Describe {
        name: String,
        /// This suite's own before-hook. `None` means inherit the parent's.
        before_each: Option<Hook>,
        /// This suite's own after-hook. `None` means inherit the parent's.
        after_each: Option<Hook>,
        children: Vec<TestNode>,
    },
    /// An individual `it`/`test` case.
    Case { name: String, body: Box<dyn Fn()> },
}

impl TestNode {
    /// A suite without hooks of its own.
    pub fn describe(name: impl Into<String>, children: Vec<TestNode>) -> Self {
        TestNode::Describe {
            name: name.into(),
            before_each: None,
            after_each: None,
            children,
        }
    }

    pub fn case(name: impl Into<String>, body: impl Fn() + 'static) -> Self {
        TestNode::Case {
            name: name.into(),
            body: Box::new(body),
        }
    }
}

// ============================================================================
// Run summary
// ============================================================================

/// Aggregate outcome of one engine run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub num_tests: u32,
    pub num_success: u32,
    /// After-hook failures. These never flip a case's outcome but always
    /// fail the run.
    pub hook_failures: u32,
    pub exit_code: i32,
}

impl RunSummary {
    fn trivial() -> Self {
        RunSummary::default()
    }

    fn forwarded(exit_code: i32) -> Self {
        RunSummary {
            exit_code,
            ..RunSummary::default()
        }
    }

    pub fn all_passed(&self) -> bool {
        self.exit_code == 0
    }
}

// ============================================================================
// Engine
// ============================================================================

/// The top-level driver: an explicit, ordered registry of suites plus the
/// CLI entry points. Build one in `main`, register suites, then call
/// [`Engine::run`] or [`Engine::main_from`].
#[derive(Default)]
pub struct Engine {
    suites: Vec<TestNode>,
    default_args: Vec<String>,
}

impl Engine {
    pub fn new() -> Self {
        Engine::default()
    }

    /// Register a top-level suite. Suites run in registration order.
    pub fn register(&mut self, name: impl Into<String>, children: Vec<TestNode>) -> &mut Self {
        self.suites.push(TestNode::describe(name, children));
        self
    }

    /// Register a prebuilt tree node. The node must be a suite; a loose
    /// top-level case is rejected at run time.
    pub fn register_node(&mut self, node: TestNode) -> &mut Self {
        self.suites.push(node);
        self
    }

    /// Arguments parsed before the real command line, so the command line
    /// still overrides them. The compiled-in counterpart of shell defaults.
    pub fn default_args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Parse `argv` (including the program name), then run.
    ///
    /// Returns the summary, or the configuration error that prevented any
    /// test from running.
    pub fn run<I, S>(&self, argv: I) -> Result<RunSummary, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (prog, rest, opts) = self.parse_argv(argv)?;
        if opts.gdb {
            return self.relaunch_under_gdb(&rest);
        }
        let out: Box<dyn Write> = match &opts.log {
            LogTarget::Stdout => Box::new(io::stdout()),
            LogTarget::File(path) => {
                let file = std::fs::File::create(path).map_err(|source| ConfigError::Log {
                    path: path.clone(),
                    source,
                })?;
                Box::new(file)
            }
        };
        let mut reporter = ConsoleReporter::new(out, &opts);
        Ok(self.run_opts(&prog, &opts, &mut reporter))
    }

    /// Like [`Engine::run`], but with a caller-supplied [`Reporter`].
    /// The `--log` target and `--gdb` relaunch are ignored on this path;
    /// the reporter owns the output.
    pub fn run_with_reporter<I, S>(
        &self,
        argv: I,
        reporter: &mut dyn Reporter,
    ) -> Result<RunSummary, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (prog, _, opts) = self.parse_argv(argv)?;
        Ok(self.run_opts(&prog, &opts, reporter))
    }

    /// Convenience for `fn main`: run, report configuration errors to
    /// stderr, and map the outcome to a process exit code.
    pub fn main_from<I, S>(&self, argv: I) -> std::process::ExitCode
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self.run(argv) {
            Ok(summary) if summary.all_passed() => std::process::ExitCode::SUCCESS,
            Ok(_) => std::process::ExitCode::FAILURE,
            Err(err) => {
                eprintln!("attest: {err}");
                eprintln!("Run with --help for usage.");
                std::process::ExitCode::FAILURE
            }
        }
    }

    fn parse_argv<I, S>(&self, argv: I) -> Result<(String, Vec<String>, Options), ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        let prog = argv.next().unwrap_or_else(|| "attest".to_string());
        let rest: Vec<String> = argv.collect();
        let opts = Options::parse(self.default_args.iter().cloned().chain(rest.iter().cloned()))?;
        Ok((prog, rest, opts))
    }

    fn run_opts(&self, prog: &str, opts: &Options, reporter: &mut dyn Reporter) -> RunSummary {
        if opts.help {
            println!("{}", usage(prog));
            return RunSummary::trivial();
        }
        if opts.version {
            println!("attest {}", env!("CARGO_PKG_VERSION"));
            return RunSummary::trivial();
        }
        if opts.list {
            list_nodes(&self.suites, None, false, &opts.filters, reporter);
            return RunSummary::trivial();
        }

        check::install_panic_hook();
        let mut session = Session {
            opts,
            reporter,
            stack: Vec::new(),
            total_tests: 0,
            total_success: 0,
            top_suites_ran: 0,
            any_case_failed: false,
            hook_failures: 0,
        };
        session.run(&self.suites)
    }

    // Process-supervision wrapper: hand the whole binary to gdb and forward
    // the child's exit status. Not part of the case state machine.
    fn relaunch_under_gdb(&self, args: &[String]) -> Result<RunSummary, ConfigError> {
        let exe = std::env::current_exe().map_err(ConfigError::Debugger)?;
        let passthrough = args
            .iter()
            .filter(|a| a.as_str() != "--gdb" && a.as_str() != "-g");
        let status = Command::new("gdb")
            .arg("-q")
            .arg("--args")
            .arg(&exe)
            .args(passthrough)
            .arg("--no-gdb")
            .arg("--rerun-failed")
            .status()
            .map_err(ConfigError::Debugger)?;
        Ok(RunSummary::forwarded(status.code().unwrap_or(1)))
    }
}

/// `--list`: emit dotted full names of enabled suites and their cases
/// without executing anything.
fn list_nodes(
    nodes: &[TestNode],
    prefix: Option<&str>,
    parent_enabled: bool,
    filters: &FilterSet,
    reporter: &mut dyn Reporter,
) {
    for node in nodes {
        match node {
            TestNode::Describe { name, children, .. } => {
                let full = match prefix {
                    Some(p) => format!("{p}.{name}"),
                    None => name.clone(),
                };
                let enabled = filters.enabled(&full, parent_enabled);
                if enabled {
                    reporter.list_entry(&full);
                }
                list_nodes(children, Some(&full), enabled, filters, reporter);
            }
            TestNode::Case { name, .. } => {
                if let (Some(p), true) = (prefix, parent_enabled) {
                    reporter.list_entry(&format!("{p}.{name}"));
                }
            }
        }
    }
}

// ============================================================================
// Session — per-run state
// ============================================================================

struct SuiteFrame {
    name: String,
    full_name: String,
    enabled: bool,
    banner_printed: bool,
    num_tests: u32,
    num_success: u32,
    start: Instant,
    before_each: Option<Hook>,
    after_each: Option<Hook>,
}

struct Session<'a> {
    opts: &'a Options,
    reporter: &'a mut dyn Reporter,
    stack: Vec<SuiteFrame>,
    total_tests: u32,
    total_success: u32,
    top_suites_ran: u32,
    any_case_failed: bool,
    hook_failures: u32,
}

impl Session<'_> {
    fn run(&mut self, suites: &[TestNode]) -> RunSummary {
        let start = Instant::now();
        for node in suites {
            self.run_node(node);
        }
        if self.top_suites_ran > 1 || self.opts.quiet {
            self.reporter
                .total(self.total_success, self.total_tests, start.elapsed());
        }
        let failed = self.any_case_failed || self.hook_failures > 0;
        RunSummary {
            num_tests: self.total_tests,
            num_success: self.total_success,
            hook_failures: self.hook_failures,
            exit_code: if failed { 1 } else { 0 },
        }
    }

    fn run_node(&mut self, node: &TestNode) {
        match node {
            TestNode::Describe {
                name,
                before_each,
                after_each,
                children,
            } => {
                self.begin_suite(name, before_each.clone(), after_each.clone());
                for child in children {
                    self.run_node(child);
                }
                self.end_suite();
            }
            TestNode::Case { name, body } => self.run_case(name, body.as_ref()),
        }
    }

    fn begin_suite(&mut self, name: &str, own_before: Option<Hook>, own_after: Option<Hook>) {
        let (full_name, parent_enabled, inherited_before, inherited_after) =
            match self.stack.last() {
                Some(parent) => (
                    format!("{}.{name}", parent.full_name),
                    parent.enabled,
                    parent.before_each.clone(),
                    parent.after_each.clone(),
                ),
                None => (name.to_string(), false, None, None),
            };
        let enabled = self.opts.filters.enabled(&full_name, parent_enabled);
        self.stack.push(SuiteFrame {
            name: name.to_string(),
            full_name,
            enabled,
            banner_printed: false,
            num_tests: 0,
            num_success: 0,
            start: Instant::now(),
            // Shadowing: an own hook fully replaces the inherited one.
            before_each: own_before.or(inherited_before),
            after_each: own_after.or(inherited_after),
        });
        if enabled {
            self.print_banners();
        }
    }

    fn end_suite(&mut self) {
        let frame = self.stack.pop().expect("unbalanced suite stack");
        let depth = self.stack.len();
        if frame.enabled && !frame.banner_printed {
            // A zero-case suite still reports Passed 0/0.
            self.print_banners();
            self.reporter.suite_begin(depth, &frame.name);
        }
        if frame.enabled || frame.banner_printed {
            self.reporter.suite_end(
                depth,
                &frame.name,
                frame.num_success,
                frame.num_tests,
                frame.start.elapsed(),
            );
        }
        match self.stack.last_mut() {
            Some(parent) => {
                parent.num_tests += frame.num_tests;
                parent.num_success += frame.num_success;
            }
            None => {
                self.total_tests += frame.num_tests;
                self.total_success += frame.num_success;
                if frame.enabled || frame.num_tests > 0 {
                    self.top_suites_ran += 1;
                }
            }
        }
    }

    // Banners print lazily so a suite disabled by filters stays silent
    // until an enabled descendant produces output beneath it.
    fn print_banners(&mut self) {
        for i in 0..self.stack.len() {
            if !self.stack[i].banner_printed {
                self.reporter.suite_begin(i, &self.stack[i].name);
                self.stack[i].banner_printed = true;
            }
        }
    }

    fn run_case(&mut self, name: &str, body: &dyn Fn()) {
        let frame = self
            .stack
            .last()
            .expect("test cases must be declared inside a describe");
        if !frame.enabled {
            return;
        }
        let before = frame.before_each.clone();
        let after = frame.after_each.clone();
        let suite_full = frame.full_name.clone();
        self.print_banners();

        let depth = self.stack.len();
        self.reporter.case_begin(depth, name);
        self.stack.last_mut().expect("suite stack").num_tests += 1;

        let start = Instant::now();
        let passed = self.execute_case(
            depth,
            name,
            body,
            before.as_deref(),
            after.as_deref(),
            &suite_full,
            false,
        );

        if passed {
            self.stack.last_mut().expect("suite stack").num_success += 1;
            self.reporter.case_success(depth, name, start.elapsed());
        } else {
            self.any_case_failed = true;
            if self.opts.rerun_failed {
                // One diagnostic re-execution: same hooks, body, and defers,
                // with accounting and output suppressed. Its only purpose is
                // to hit `break_on_failure` when the failure repeats.
                check::set_rerunning(true);
                let _ = self.execute_case(
                    depth,
                    name,
                    body,
                    before.as_deref(),
                    after.as_deref(),
                    &suite_full,
                    true,
                );
                check::set_rerunning(false);
            }
        }
    }

    // The case state machine. Every exit path drains the defer stack in
    // LIFO order exactly once and then runs the after-hook.
    #[allow(clippy::too_many_arguments)]
    fn execute_case(
        &mut self,
        depth: usize,
        name: &str,
        body: &dyn Fn(),
        before: Option<&dyn Fn()>,
        after: Option<&dyn Fn()>,
        suite: &str,
        rerunning: bool,
    ) -> bool {
        crate::clear_defers();
        let mut failed = false;

        if let Some(hook) = before {
            if let Err(failure) = run_step(hook) {
                failed = true;
                if !rerunning {
                    self.reporter.case_failure(depth, name, &failure, suite);
                }
            }
        }

        // A before-hook failure skips the body but never the cleanup below.
        if !failed {
            if let Err(failure) = run_step(body) {
                failed = true;
                if !rerunning {
                    self.reporter.case_failure(depth, name, &failure, suite);
                }
            }
        }

        for deferred in crate::take_defers().into_iter().rev() {
            if let Err(failure) = run_step(deferred) {
                failed = true;
                if !rerunning {
                    self.reporter.defer_failure(depth, name, &failure, suite);
                }
            }
        }

        if let Some(hook) = after {
            if let Err(failure) = run_step(hook) {
                if !rerunning {
                    self.hook_failures += 1;
                    self.reporter
                        .after_hook_failure(depth, name, &failure, suite);
                }
            }
        }

        !failed
    }
}

fn run_step(step: impl FnOnce()) -> Result<(), Failure> {
    catch_unwind(AssertUnwindSafe(step)).map_err(|payload| {
        match payload.downcast::<CaseFailed>() {
            Ok(failed) => Failure {
                message: failed.message,
                location: Some((failed.file, failed.line)),
            },
            Err(payload) => {
                let message = if let Some(s) = payload.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                Failure {
                    message,
                    location: None,
                }
            }
        }
    })
}
