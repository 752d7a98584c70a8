//! `#[derive(HandlerOrder)]` implementation.
//!
//! Every `#[order(N)]` attribute on the handler contributes one entry to
//! `HandlerOrder::ORDERS`, in source order. The router uses the first one.
//! `N` is any constant `i32` expression, so `#[order(-10)]` and
//! `#[order(BASE + 1)]` both work. Without `#[order]` the handler runs at the
//! default order.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Expr};

use crate::path::core_path;

pub fn derive_handler_order(input: &DeriveInput) -> syn::Result<TokenStream> {
    let orders = input
        .attrs
        .iter()
        .filter(|attr| attr.path().is_ident("order"))
        .map(|attr| attr.parse_args::<Expr>())
        .collect::<syn::Result<Vec<_>>>()?;

    let core = core_path(&input.attrs)?;
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    if orders.is_empty() {
        return Ok(quote! {
            impl #impl_generics #core::HandlerOrder for #name #ty_generics #where_clause {}
        });
    }

    Ok(quote! {
        impl #impl_generics #core::HandlerOrder for #name #ty_generics #where_clause {
            const ORDERS: &'static [i32] = &[#(#orders),*];
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn orders_keep_source_order() {
        let input: DeriveInput = parse_quote! {
            #[order(500)]
            #[order(-1)]
            struct SendReceiptHandler;
        };
        let tokens = derive_handler_order(&input).unwrap().to_string();
        assert_eq!(
            tokens,
            quote! {
                impl ::middleman::core::HandlerOrder for SendReceiptHandler {
                    const ORDERS: &'static [i32] = &[500, -1];
                }
            }
            .to_string()
        );
    }

    #[test]
    fn no_order_keeps_the_default() {
        let input: DeriveInput = parse_quote! {
            struct UpdateInventoryHandler;
        };
        let tokens = derive_handler_order(&input).unwrap().to_string();
        assert_eq!(
            tokens,
            quote!(impl ::middleman::core::HandlerOrder for UpdateInventoryHandler {}).to_string()
        );
    }

    #[test]
    fn empty_order_is_rejected() {
        let input: DeriveInput = parse_quote! {
            #[order()]
            struct Audit;
        };
        assert!(derive_handler_order(&input).is_err());
    }
}
