//! Closure-based builder API — `Context`, the suite builder, and `run()`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::runner::{Engine, Hook, TestNode};

// ============================================================================
// Thread-local suite builder
// ============================================================================

thread_local! {
    static BUILDER: RefCell<Option<SuiteBuilder>> = const { RefCell::new(None) };
}

pub(crate) struct SuiteBuilder {
    stack: Vec<GroupFrame>,
}

struct GroupFrame {
    name: String,
    before_each: Option<Hook>,
    after_each: Option<Hook>,
    children: Vec<TestNode>,
}

impl GroupFrame {
    fn new(name: String) -> Self {
        GroupFrame {
            name,
            before_each: None,
            after_each: None,
            children: Vec::new(),
        }
    }
}

impl SuiteBuilder {
    fn new() -> Self {
        SuiteBuilder {
            stack: vec![GroupFrame::new(String::new())],
        }
    }

    fn push_group(&mut self, name: String) {
        self.stack.push(GroupFrame::new(name));
    }

    fn pop_group(&mut self) {
        let frame = self.stack.pop().expect("attest: unbalanced group push/pop");
        let node = TestNode::Describe {
            name: frame.name,
            before_each: frame.before_each,
            after_each: frame.after_each,
            children: frame.children,
        };
        self.current_frame_mut().children.push(node);
    }

    fn add_case(&mut self, node: TestNode) {
        self.current_frame_mut().children.push(node);
    }

    fn set_before_each(&mut self, hook: Hook) {
        self.current_frame_mut().before_each = Some(hook);
    }

    fn set_after_each(&mut self, hook: Hook) {
        self.current_frame_mut().after_each = Some(hook);
    }

    fn current_frame_mut(&mut self) -> &mut GroupFrame {
        self.stack.last_mut().expect("attest: empty builder stack")
    }

    fn into_nodes(mut self) -> Vec<TestNode> {
        assert_eq!(
            self.stack.len(),
            1,
            "attest: unbalanced group push/pop at finalization"
        );
        let children = self.stack.pop().expect("attest: empty builder stack").children;
        for node in &children {
            assert!(
                matches!(node, TestNode::Describe { .. }),
                "attest: test cases must be declared inside a describe"
            );
        }
        children
    }
}

fn with_builder<R>(f: impl FnOnce(&mut SuiteBuilder) -> R) -> R {
    BUILDER.with(|cell| {
        let mut opt = cell.borrow_mut();
        let builder = opt
            .as_mut()
            .expect("attest: Context used outside of attest::run()");
        f(builder)
    })
}

// ============================================================================
// Context — the user-facing handle
// ============================================================================

/// A lightweight handle for declaring suite structure.
///
/// All methods delegate to a thread-local builder. `Context` is `Copy` so
/// it can be passed into nested closures without ceremony.
///
/// # Example
/// ```rust,no_run
/// fn main() -> std::process::ExitCode {
///     attest::run(|ctx| {
///         ctx.describe("strings", |ctx| {
///             ctx.it("concatenates", || {
///                 attest::attest_eq!(format!("a{}", "b"), "ab");
///             });
///         });
///     })
/// }
/// ```
#[derive(Copy, Clone)]
pub struct Context;

impl Context {
    /// Declare a suite. At the top level this registers a new root suite;
    /// nested, it behaves exactly like [`Context::subdesc`].
    pub fn describe(&self, name: &str, body: impl FnOnce(Context)) {
        with_builder(|b| b.push_group(name.to_string()));
        body(Context);
        with_builder(|b| b.pop_group());
    }

    /// Declare a nested suite. Its dotted full name extends the parent's,
    /// and it inherits the parent's hooks unless it declares its own.
    pub fn subdesc(&self, name: &str, body: impl FnOnce(Context)) {
        self.describe(name, body);
    }

    /// Declare a test case.
    pub fn it(&self, name: &str, body: impl Fn() + 'static) {
        with_builder(|b| b.add_case(TestNode::case(name, body)));
    }

    /// Alias for [`Context::it`].
    pub fn test(&self, name: &str, body: impl Fn() + 'static) {
        self.it(name, body);
    }

    /// Set this suite's before-hook. It runs before every case in this
    /// suite and every descendant suite that does not declare its own:
    /// a nested hook replaces the inherited one, it does not chain.
    /// Declaring a second hook in the same suite replaces the first.
    pub fn before_each(&self, hook: impl Fn() + 'static) {
        with_builder(|b| b.set_before_each(Rc::new(hook)));
    }

    /// Set this suite's after-hook. Same inheritance and replacement rules
    /// as [`Context::before_each`]; it runs even when the case fails.
    pub fn after_each(&self, hook: impl Fn() + 'static) {
        with_builder(|b| b.set_after_each(Rc::new(hook)));
    }
}

// ============================================================================
// run() — entry point
// ============================================================================

/// Build and run a suite tree from the process arguments.
///
/// This is the main entry point for `harness = false` test binaries:
///
/// ```rust,no_run
/// fn main() -> std::process::ExitCode {
///     attest::run(|ctx| {
///         ctx.describe("math", |ctx| {
///             ctx.it("adds", || { attest::attest_eq!(2 + 3, 5); });
///         });
///     })
/// }
/// ```
pub fn run(body: impl FnOnce(Context)) -> std::process::ExitCode {
    // Phase 1: build the tree.
    BUILDER.with(|cell| {
        *cell.borrow_mut() = Some(SuiteBuilder::new());
    });

    body(Context);

    let nodes = BUILDER.with(|cell| {
        cell.borrow_mut()
            .take()
            .expect("attest: builder missing after run")
            .into_nodes()
    });

    // Phase 2: execute it.
    let mut engine = Engine::new();
    for node in nodes {
        engine.register_node(node);
    }
    engine.main_from(std::env::args())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(body: impl FnOnce(Context)) -> Vec<TestNode> {
        BUILDER.with(|cell| {
            *cell.borrow_mut() = Some(SuiteBuilder::new());
        });
        body(Context);
        BUILDER.with(|cell| cell.borrow_mut().take().unwrap().into_nodes())
    }

    #[test]
    fn builds_nested_tree() {
        let nodes = build(|ctx| {
            ctx.describe("outer", |ctx| {
                ctx.it("case", || {});
                ctx.subdesc("inner", |ctx| {
                    ctx.test("nested case", || {});
                });
            });
        });

        assert_eq!(nodes.len(), 1);
        let TestNode::Describe { name, children, .. } = &nodes[0] else {
            panic!("expected a describe at the root");
        };
        assert_eq!(name, "outer");
        assert_eq!(children.len(), 2);
        assert!(matches!(&children[0], TestNode::Case { name, .. } if name == "case"));
        assert!(matches!(&children[1], TestNode::Describe { name, .. } if name == "inner"));
    }

    #[test]
    fn hooks_attach_to_the_declaring_group() {
        let nodes = build(|ctx| {
            ctx.describe("hooked", |ctx| {
                ctx.before_each(|| {});
                ctx.subdesc("bare", |_| {});
            });
        });

        let TestNode::Describe {
            before_each,
            after_each,
            children,
            ..
        } = &nodes[0]
        else {
            panic!("expected a describe at the root");
        };
        assert!(before_each.is_some());
        assert!(after_each.is_none());
        let TestNode::Describe {
            before_each: inner_before,
            ..
        } = &children[0]
        else {
            panic!("expected nested describe");
        };
        // Inheritance happens at run time; the built tree records only
        // hooks a suite declared itself.
        assert!(inner_before.is_none());
    }

    #[test]
    #[should_panic(expected = "inside a describe")]
    fn top_level_cases_are_rejected() {
        build(|ctx| {
            ctx.it("floating", || {});
        });
    }
}
