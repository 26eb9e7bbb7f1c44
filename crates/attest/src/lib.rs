//! # attest — an in-process hierarchical test harness
//!
//! Declare nested suites (`describe` → `subdesc` → `it`/`test`), run them
//! with pass/fail accounting at every level, and get guaranteed cleanup:
//! a failing assertion aborts the case but still runs every registered
//! `defer` (in reverse order) and the inherited after-hook.
//!
//! ## Quick example
//!
//! ```rust,no_run
//! fn main() -> std::process::ExitCode {
//!     attest::run(|ctx| {
//!         ctx.describe("math", |ctx| {
//!             ctx.it("adds", || {
//!                 attest::attest_eq!(2 + 3, 5);
//!             });
//!
//!             ctx.subdesc("division", |ctx| {
//!                 ctx.it("divides evenly", || {
//!                     attest::attest_eq!(10 / 2, 5);
//!                 });
//!             });
//!         });
//!     })
//! }
//! ```
//!
//! Build the binary as a `harness = false` test target and drive it from
//! the command line: positional arguments are glob filters over dotted
//! suite names, `--list` prints what would run, `--quiet` trims output to
//! failures and the total. See `--help` for the full flag table.
//!
//! ## Features
//!
//! - `macros` (default) — the [`suite!`] / [`harness!`] nested-block DSL.

pub mod check;
mod context;
pub mod options;
pub mod report;
pub mod runner;

pub use context::{run, Context};

/// Nested-block DSL producing a `Vec<TestNode>`. Available with the
/// `macros` feature.
#[cfg(feature = "macros")]
pub use attest_macros::suite;

/// Generates `fn main()` for a `harness = false` test binary. Available
/// with the `macros` feature.
#[cfg(feature = "macros")]
pub use attest_macros::harness;

use std::cell::RefCell;

// ============================================================================
// Defer — per-case LIFO cleanup stack
// ============================================================================

thread_local! {
    static DEFER_STACK: RefCell<Vec<Box<dyn FnOnce()>>> = const { RefCell::new(Vec::new()) };
}

/// Register a cleanup action for the current test case.
///
/// Actions run in reverse registration order when the case ends, whether
/// it completed normally or aborted on a failing assertion. Each action
/// runs exactly once; a failure inside one action does not stop the rest.
///
/// ```rust,no_run
/// # fn main() { attest::run(|ctx| { ctx.describe("files", |ctx| {
/// ctx.it("writes a scratch file", || {
///     std::fs::write("scratch", b"data").unwrap();
///     attest::defer(|| {
///         let _ = std::fs::remove_file("scratch");
///     });
///     attest::attest!(std::path::Path::new("scratch").exists());
/// });
/// # }); }); }
/// ```
pub fn defer(action: impl FnOnce() + 'static) {
    DEFER_STACK.with(|stack| {
        stack.borrow_mut().push(Box::new(action));
    });
}

/// Drain the current case's defer stack, in registration order. The case
/// runner reverses before invoking.
pub(crate) fn take_defers() -> Vec<Box<dyn FnOnce()>> {
    DEFER_STACK.with(|stack| stack.borrow_mut().drain(..).collect())
}

/// Drop anything left on the stack without running it. Called at case
/// entry so one case's leftovers can never leak into the next.
pub(crate) fn clear_defers() {
    DEFER_STACK.with(|stack| stack.borrow_mut().clear());
}

// ============================================================================
// Guard — scope-bound cleanup
// ============================================================================

/// A drop guard that runs its cleanup when the scope ends, panic or not.
/// The scope-bound sibling of [`defer`]: use it when the cleanup belongs
/// to a lexical scope rather than to the whole case.
pub struct Guard<F: FnOnce()> {
    f: Option<F>,
}

impl<F: FnOnce()> Guard<F> {
    pub fn new(f: F) -> Self {
        Guard { f: Some(f) }
    }
}

impl<F: FnOnce()> Drop for Guard<F> {
    fn drop(&mut self) {
        if let Some(f) = self.f.take() {
            f();
        }
    }
}
