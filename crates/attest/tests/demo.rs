//! Self-hosted demo: the harness running a real suite tree end to end.
//!
//! Built with `harness = false`, so this binary's `main` *is* the engine.
//! Run it directly to see the console output:
//!
//! ```sh
//! cargo test --test demo -- --maybes --no-cr
//! ```

use std::cell::Cell;
use std::process::ExitCode;
use std::rc::Rc;

fn main() -> ExitCode {
    attest::run(|ctx| {
        ctx.describe("arithmetic", |ctx| {
            ctx.it("adds", || {
                attest::attest_eq!(2 + 3, 5);
            });

            ctx.it("compares strings", || {
                attest::attest_eq!("hello".to_uppercase(), "HELLO");
                attest::attest_ne!("left", "right");
            });

            ctx.subdesc("division", |ctx| {
                ctx.it("divides evenly", || {
                    attest::attest_eq!(10 / 2, 5);
                });

                ctx.it("truncates", || {
                    attest::attest_eq!(7 / 2, 3);
                });
            });
        });

        ctx.describe("fixtures", |ctx| {
            let calls = Rc::new(Cell::new(0u32));
            {
                let calls = calls.clone();
                ctx.before_each(move || calls.set(calls.get() + 1));
            }

            {
                let calls = calls.clone();
                ctx.it("sees the before hook", move || {
                    attest::attest!(calls.get() >= 1);
                });
            }

            ctx.it("releases resources in reverse order", || {
                let order = Rc::new(Cell::new(0u32));
                let scratch = std::env::temp_dir().join("attest-demo-scratch");
                std::fs::write(&scratch, b"demo").unwrap();
                {
                    let scratch = scratch.clone();
                    let order = order.clone();
                    attest::defer(move || {
                        // Last registered, first run.
                        attest::attest_eq!(order.get(), 0u32);
                        order.set(1);
                        let _ = std::fs::remove_file(&scratch);
                    });
                }
                let _g = attest::Guard::new(move || {
                    // Guards fire at scope exit, before the defer drain.
                    attest::attest!(scratch.exists());
                });
            });
        });
    })
}
