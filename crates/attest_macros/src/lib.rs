//! Proc macros for the `attest` test harness.

mod codegen;
mod dsl;

/// Nested-block suite syntax. Expands to a `Vec<attest::runner::TestNode>`
/// expression, ready for `Engine::register_node`.
///
/// # Example
///
/// ```text
/// let nodes = attest::suite! {
///     describe "calculator" {
///         before_each {
///             // runs before every case below, including subdescs
///         }
///
///         it "adds two numbers" {
///             attest::attest_eq!(2 + 3, 5);
///         }
///
///         subdesc "negatives" {
///             it "handles them" {
///                 attest::attest_eq!(-1 + 1, 0);
///             }
///         }
///     }
/// };
/// ```
///
/// # Supported DSL keywords
///
/// - `describe "name" { ... }` / `subdesc "name" { ... }` — a suite; only
///   `describe` is allowed at the top level
/// - `it "name" { ... }` / `test "name" { ... }` — a test case
/// - `before_each { ... }` / `after_each { ... }` — around-hooks for this
///   suite and every descendant suite without hooks of its own (a nested
///   hook replaces the inherited one; a later hook in the same block
///   replaces an earlier one)
#[proc_macro]
pub fn suite(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let suite = syn::parse_macro_input!(input as dsl::Suite);
    codegen::generate(suite).into()
}

/// Generates a `main()` that registers the given suites and runs the
/// engine against the process arguments.
///
/// # Setup
///
/// In `Cargo.toml`:
/// ```toml
/// [[test]]
/// name = "my_suite"
/// harness = false
/// ```
///
/// In your test file:
/// ```text
/// attest::harness! {
///     describe "calculator" {
///         it "adds" { attest::attest_eq!(2 + 3, 5); }
///     }
/// }
/// ```
///
/// Run with:
/// ```sh
/// cargo test --test my_suite
/// ```
///
/// Arguments after `--` reach the harness: glob patterns select suites by
/// dotted full name, `--list` prints them, `--quiet` trims the output.
#[proc_macro]
pub fn harness(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let suite = syn::parse_macro_input!(input as dsl::Suite);
    codegen::generate_harness(suite).into()
}
