//! Message derive macro implementations.
//!
//! | Derive | Struct attribute | Generates |
//! |--------|------------------|-----------|
//! | `Command` | - | `impl Command` |
//! | `Event` | - | `impl Event` |
//! | `Query` | `#[query(result = Type)]` (required) | `impl Query { type Result = Type; }` |
//!
//! All three accept `#[middleman(crate = "path")]` to change the path used
//! to reach the core crate (see [`core_path`]).
//!
//! Generic messages are supported; the usual `Send + Sync + 'static` bounds
//! of the message traits still apply to every instantiation.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Type, spanned::Spanned};

use crate::path::core_path;

/// Rejects unions; messages are plain data.
fn check_data(input: &DeriveInput, derive: &str) -> syn::Result<()> {
    match &input.data {
        Data::Struct(_) | Data::Enum(_) => Ok(()),
        Data::Union(_) => Err(syn::Error::new(
            input.span(),
            format!("{derive} cannot be derived for unions"),
        )),
    }
}

/// Emits `impl <core>::<marker> for Type {}`.
fn marker_impl(input: &DeriveInput, derive: &str, marker: &str) -> syn::Result<TokenStream> {
    check_data(input, derive)?;

    let core = core_path(&input.attrs)?;
    let marker = syn::Ident::new(marker, proc_macro2::Span::call_site());
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #core::#marker for #name #ty_generics #where_clause {}
    })
}

pub fn derive_command(input: &DeriveInput) -> syn::Result<TokenStream> {
    marker_impl(input, "Command", "Command")
}

pub fn derive_event(input: &DeriveInput) -> syn::Result<TokenStream> {
    marker_impl(input, "Event", "Event")
}

pub fn derive_query(input: &DeriveInput) -> syn::Result<TokenStream> {
    check_data(input, "Query")?;

    let result = parse_query_result(&input.attrs, input.ident.span())?;
    let core = core_path(&input.attrs)?;
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #core::Query for #name #ty_generics #where_clause {
            type Result = #result;
        }
    })
}

// ============================================================================
// Attribute parsing
// ============================================================================

fn parse_query_result(attrs: &[Attribute], span: proc_macro2::Span) -> syn::Result<Type> {
    let mut result: Option<Type> = None;

    for attr in attrs {
        if !attr.path().is_ident("query") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("result") {
                if result.is_some() {
                    return Err(meta.error("duplicate `result`"));
                }
                result = Some(meta.value()?.parse::<Type>()?);
                Ok(())
            } else {
                Err(meta.error("unknown query attribute, expected `result = Type`"))
            }
        })?;
    }

    result.ok_or_else(|| syn::Error::new(span, "#[derive(Query)] requires `#[query(result = Type)]`"))
}
