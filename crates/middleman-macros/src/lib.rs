//! Procedural macros for the Middleman message router.
//!
//! This crate provides:
//!
//! - `#[derive(Command)]`, `#[derive(Event)]` - implement the message marker traits
//! - `#[derive(Query)]` with `#[query(result = Type)]` - implement `Query`
//! - `#[derive(HandlerOrder)]` with optional `#[order(N)]` - declare an event handler's order
//!
//! Generated code refers to `::middleman::core`. Crates that depend on
//! `middleman-core` without the facade add `#[middleman(crate = "middleman_core")]`.
//!
//! ```rust,ignore
//! use middleman::prelude::*;
//!
//! #[derive(Command)]
//! pub struct PlaceOrder {
//!     pub sku: u32,
//! }
//!
//! #[derive(Query)]
//! #[query(result = UserDto)]
//! pub struct GetUserQuery {
//!     pub id: u64,
//! }
//!
//! #[derive(HandlerOrder)]
//! #[order(500)]
//! pub struct SendReceiptHandler;
//! ```

mod message;
mod order;
mod path;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Implements `middleman_core::Command`.
#[proc_macro_derive(Command, attributes(middleman))]
pub fn derive_command(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match message::derive_command(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Implements `middleman_core::Event`.
#[proc_macro_derive(Event, attributes(middleman))]
pub fn derive_event(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match message::derive_event(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Implements `middleman_core::Query`.
///
/// # Attributes
///
/// - `#[query(result = Type)]` - the query's result type (required)
/// - `#[middleman(crate = "path")]` - path to the core crate, for every derive
#[proc_macro_derive(Query, attributes(query, middleman))]
pub fn derive_query(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match message::derive_query(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Implements `middleman_core::HandlerOrder`.
///
/// # Attributes
///
/// - `#[order(N)]` - the handler's order; repeatable, the first one is used.
///   Without it the handler runs at the default order.
#[proc_macro_derive(HandlerOrder, attributes(order, middleman))]
pub fn derive_handler_order(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match order::derive_handler_order(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
