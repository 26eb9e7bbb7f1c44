//! Code generation — transforms the DSL AST into suite-tree expressions.

use proc_macro2::TokenStream;
use quote::quote;

use crate::dsl::*;

// ============================================================================
// Public entry points
// ============================================================================

/// `suite!` — expands to a `Vec<attest::runner::TestNode>` expression.
pub fn generate(suite: Suite) -> TokenStream {
    let nodes: Vec<TokenStream> = suite.items.iter().map(generate_item).collect();
    quote! {
        {
            let __attest_nodes: ::std::vec::Vec<::attest::runner::TestNode> =
                ::std::vec![ #(#nodes),* ];
            __attest_nodes
        }
    }
}

/// `harness!` — expands to `fn main()` registering every suite and running
/// the engine against the process arguments.
pub fn generate_harness(suite: Suite) -> TokenStream {
    let nodes: Vec<TokenStream> = suite.items.iter().map(generate_item).collect();
    quote! {
        fn main() -> ::std::process::ExitCode {
            let mut __attest_engine = ::attest::runner::Engine::new();
            #( __attest_engine.register_node(#nodes); )*
            __attest_engine.main_from(::std::env::args())
        }
    }
}

// ============================================================================
// Node generation
// ============================================================================

fn generate_item(item: &DslItem) -> TokenStream {
    match item {
        DslItem::Describe(block) => generate_describe(block),
        DslItem::Case(block) => generate_case(block),
        // Hooks are consumed by the enclosing describe, never emitted as
        // nodes; `Suite::parse` rejects them at the top level.
        DslItem::BeforeEach(_) | DslItem::AfterEach(_) => unreachable!("hook outside describe"),
    }
}

fn generate_describe(block: &DescribeBlock) -> TokenStream {
    let name = &block.name;

    // A later hook in the same block replaces an earlier one, matching the
    // closure API.
    let before = hook_expr(block.items.iter().filter_map(|item| match item {
        DslItem::BeforeEach(hook) => Some(&hook.body),
        _ => None,
    }));
    let after = hook_expr(block.items.iter().filter_map(|item| match item {
        DslItem::AfterEach(hook) => Some(&hook.body),
        _ => None,
    }));

    let children: Vec<TokenStream> = block
        .items
        .iter()
        .filter(|item| matches!(item, DslItem::Describe(_) | DslItem::Case(_)))
        .map(generate_item)
        .collect();

    quote! {
        ::attest::runner::TestNode::Describe {
            name: ::std::string::String::from(#name),
            before_each: #before,
            after_each: #after,
            children: ::std::vec![ #(#children),* ],
        }
    }
}

fn hook_expr<'a>(bodies: impl Iterator<Item = &'a TokenStream>) -> TokenStream {
    match bodies.last() {
        Some(body) => quote! {
            ::std::option::Option::Some(::std::rc::Rc::new(move || { #body }))
        },
        None => quote! { ::std::option::Option::None },
    }
}

fn generate_case(block: &CaseBlock) -> TokenStream {
    let name = &block.name;
    let body = &block.body;
    quote! {
        ::attest::runner::TestNode::Case {
            name: ::std::string::String::from(#name),
            body: ::std::boxed::Box::new(move || { #body }),
        }
    }
}
