#![allow(dead_code)]

use std::time::Duration;

use attest::report::{Failure, Reporter};
use attest::runner::{Engine, RunSummary};

/// Captures every reporter event as a compact string so tests can assert
/// on ordering and content without touching real output streams.
#[derive(Default)]
pub struct RecordingReporter {
    pub events: Vec<String>,
}

impl Reporter for RecordingReporter {
    fn suite_begin(&mut self, depth: usize, name: &str) {
        self.events.push(format!("begin:{depth}:{name}"));
    }

    fn suite_end(&mut self, depth: usize, name: &str, passed: u32, total: u32, _: Duration) {
        self.events
            .push(format!("end:{depth}:{name}:{passed}/{total}"));
    }

    fn case_begin(&mut self, _: usize, name: &str) {
        self.events.push(format!("maybe:{name}"));
    }

    fn case_success(&mut self, _: usize, name: &str, _: Duration) {
        self.events.push(format!("ok:{name}"));
    }

    fn case_failure(&mut self, _: usize, name: &str, failure: &Failure, suite: &str) {
        self.events
            .push(format!("fail:{suite}:{name}:{}", failure.message));
    }

    fn after_hook_failure(&mut self, _: usize, name: &str, failure: &Failure, suite: &str) {
        self.events
            .push(format!("afterfail:{suite}:{name}:{}", failure.message));
    }

    fn defer_failure(&mut self, _: usize, name: &str, failure: &Failure, suite: &str) {
        self.events
            .push(format!("deferfail:{suite}:{name}:{}", failure.message));
    }

    fn list_entry(&mut self, full_name: &str) {
        self.events.push(format!("list:{full_name}"));
    }

    fn total(&mut self, passed: u32, total: u32, _: Duration) {
        self.events.push(format!("total:{passed}/{total}"));
    }
}

/// Run an engine with a recording reporter and the given extra arguments.
pub fn run_recorded(engine: &Engine, args: &[&str]) -> (RunSummary, Vec<String>) {
    let mut reporter = RecordingReporter::default();
    let argv = std::iter::once("attest").chain(args.iter().copied());
    let summary = engine
        .run_with_reporter(argv, &mut reporter)
        .expect("run must not hit a configuration error");
    (summary, reporter.events)
}
