mod common;

use std::cell::RefCell;
use std::rc::Rc;

use attest::runner::{Engine, TestNode};
use common::run_recorded;

thread_local! {
    static MARKS: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
}

fn mark(label: &'static str) {
    MARKS.with(|m| m.borrow_mut().push(label));
}

fn take_marks() -> Vec<&'static str> {
    MARKS.with(|m| m.borrow_mut().drain(..).collect())
}

#[test]
fn suite_macro_builds_a_runnable_tree() {
    let nodes = attest::suite! {
        describe "calculator" {
            it "adds two numbers" {
                attest::attest_eq!(2 + 3, 5);
            }

            test "multiplies" {
                attest::attest_eq!(3 * 4, 12);
            }

            subdesc "negatives" {
                it "handles them" {
                    attest::attest_eq!(-1 + 1, 0);
                }

                it "spots a lie" {
                    attest::attest_eq!(1, 2);
                }
            }
        }
    };

    let mut engine = Engine::new();
    for node in nodes {
        engine.register_node(node);
    }

    let (summary, events) = run_recorded(&engine, &[]);
    assert_eq!(summary.num_tests, 4);
    assert_eq!(summary.num_success, 3);
    assert_eq!(summary.exit_code, 1);
    assert!(events.contains(&"end:1:negatives:1/2".to_string()));
    assert!(events.contains(&"end:0:calculator:3/4".to_string()));
    assert!(events
        .iter()
        .any(|e| e.contains("Expected 1 to equal 2, but got 1")));
}

#[test]
fn dsl_hooks_inherit_and_shadow() {
    let nodes = attest::suite! {
        describe "outer" {
            before_each { mark("outer-before"); }
            after_each { mark("outer-after"); }

            it "direct" { mark("direct"); }

            subdesc "plain" {
                it "inherits" { mark("inherited"); }
            }

            subdesc "shadowed" {
                before_each { mark("inner-before"); }
                after_each { mark("inner-after"); }

                it "overrides" { mark("overridden"); }
            }
        }
    };

    let mut engine = Engine::new();
    for node in nodes {
        engine.register_node(node);
    }
    let (summary, _) = run_recorded(&engine, &[]);
    assert_eq!(summary.num_success, 3);
    assert_eq!(
        take_marks(),
        vec![
            "outer-before",
            "direct",
            "outer-after",
            "outer-before",
            "inherited",
            "outer-after",
            "inner-before",
            "overridden",
            "inner-after",
        ]
    );
}

#[test]
fn dsl_cases_can_defer_and_unwind() {
    let log = Rc::new(RefCell::new(Vec::new()));
    // The DSL body is ordinary Rust: closures may capture from the
    // enclosing test through clones declared before the macro.
    let first = log.clone();
    let nodes = attest::suite! {
        describe "cleanup" {
            it "unwinds through defers" {
                let log = first.clone();
                attest::defer(move || log.borrow_mut().push("cleaned"));
                attest::attest!(false, "stop here");
            }
        }
    };

    let mut engine = Engine::new();
    for node in nodes {
        engine.register_node(node);
    }
    let (summary, events) = run_recorded(&engine, &[]);
    assert_eq!(summary.exit_code, 1);
    assert_eq!(*log.borrow(), vec!["cleaned"]);
    assert!(events.iter().any(|e| e.contains("stop here")));
}

#[test]
fn dsl_subtrees_respect_filters() {
    let nodes = attest::suite! {
        describe "net" {
            it "connects" { mark("net"); }
        }
        describe "fs" {
            it "reads" { mark("fs"); }
        }
    };

    let mut engine = Engine::new();
    for node in nodes {
        engine.register_node(node);
    }
    let (summary, _) = run_recorded(&engine, &["fs"]);
    assert_eq!(summary.num_tests, 1);
    assert_eq!(take_marks(), vec!["fs"]);
}

#[test]
fn describe_helper_and_macro_trees_mix() {
    let mut engine = Engine::new();
    engine.register("handmade", vec![TestNode::case("works", || {})]);
    for node in attest::suite! {
        describe "generated" {
            it "also works" { }
        }
    } {
        engine.register_node(node);
    }
    let (summary, _) = run_recorded(&engine, &[]);
    assert_eq!(summary.num_tests, 2);
    assert_eq!(summary.exit_code, 0);
}
