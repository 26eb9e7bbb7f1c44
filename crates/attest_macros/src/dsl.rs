//! DSL AST types and `syn::parse::Parse` implementations.
//!
//! Parses the nested-block suite syntax into a structured AST.

use proc_macro2::TokenStream;
use syn::parse::{Parse, ParseStream};
use syn::{braced, Ident, LitStr, Result};

// ============================================================================
// AST types
// ============================================================================

/// Top-level input of `suite!` / `harness!` — a list of `describe` blocks.
#[derive(Debug)]
pub struct Suite {
    pub items: Vec<DslItem>,
}

/// A single DSL node.
#[derive(Debug)]
pub enum DslItem {
    Describe(DescribeBlock),
    Case(CaseBlock),
    BeforeEach(HookBlock),
    AfterEach(HookBlock),
}

/// `describe "name" { ... }` / `subdesc "name" { ... }`
#[derive(Debug)]
pub struct DescribeBlock {
    pub name: LitStr,
    pub items: Vec<DslItem>,
}

/// `it "name" { ... }` / `test "name" { ... }`
#[derive(Debug)]
pub struct CaseBlock {
    pub name: LitStr,
    pub body: TokenStream,
}

/// `before_each { ... }` / `after_each { ... }`
#[derive(Debug)]
pub struct HookBlock {
    pub body: TokenStream,
}

// ============================================================================
// Parsing
// ============================================================================

impl Parse for Suite {
    fn parse(input: ParseStream) -> Result<Self> {
        let items = parse_items(input)?;
        for item in &items {
            if !matches!(item, DslItem::Describe(_)) {
                return Err(syn::Error::new(
                    proc_macro2::Span::call_site(),
                    "top-level items must be `describe` blocks",
                ));
            }
        }
        Ok(Suite { items })
    }
}

/// Parse a sequence of DSL items until the stream is exhausted.
fn parse_items(input: ParseStream) -> Result<Vec<DslItem>> {
    let mut items = Vec::new();
    while !input.is_empty() {
        items.push(input.parse::<DslItem>()?);
    }
    Ok(items)
}

impl Parse for DslItem {
    fn parse(input: ParseStream) -> Result<Self> {
        let ident: Ident = input.parse()?;
        let name = ident.to_string();

        match name.as_str() {
            "describe" | "subdesc" | "context" => {
                Ok(DslItem::Describe(parse_describe_block(input)?))
            }
            "it" | "test" => Ok(DslItem::Case(parse_case_block(input)?)),
            "before_each" => Ok(DslItem::BeforeEach(parse_hook_block(input)?)),
            "after_each" => Ok(DslItem::AfterEach(parse_hook_block(input)?)),
            _ => Err(syn::Error::new(
                ident.span(),
                format!(
                    "unknown DSL keyword `{name}`. Expected one of: \
                     describe, subdesc, it, test, before_each, after_each"
                ),
            )),
        }
    }
}

// ============================================================================
// Block parsers
// ============================================================================

/// Parse: `"name" { items... }`
fn parse_describe_block(input: ParseStream) -> Result<DescribeBlock> {
    let name: LitStr = input.parse()?;
    let content;
    braced!(content in input);
    let items = parse_items(&content)?;
    Ok(DescribeBlock { name, items })
}

/// Parse: `"name" { body }`
fn parse_case_block(input: ParseStream) -> Result<CaseBlock> {
    let name: LitStr = input.parse()?;
    let body_content;
    braced!(body_content in input);
    let body: TokenStream = body_content.parse()?;
    Ok(CaseBlock { name, body })
}

/// Parse: `{ body }`
fn parse_hook_block(input: ParseStream) -> Result<HookBlock> {
    let content;
    braced!(content in input);
    let body: TokenStream = content.parse()?;
    Ok(HookBlock { body })
}
