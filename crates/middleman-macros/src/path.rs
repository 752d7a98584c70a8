//! Resolution of the path generated code uses to reach `middleman-core`.
//!
//! Applications depend on the `middleman` facade, which re-exports the core as
//! `middleman::core`, so that is the default. Crates that depend on
//! `middleman-core` directly override it, as with serde's `crate` attribute:
//!
//! ```rust,ignore
//! #[derive(Command)]
//! #[middleman(crate = "middleman_core")]
//! struct PlaceOrder;
//! ```

use syn::{Attribute, LitStr, Path, parse_quote};

/// Returns the core path requested by `#[middleman(crate = "...")]`, or
/// `::middleman::core`.
pub fn core_path(attrs: &[Attribute]) -> syn::Result<Path> {
    let mut path: Option<Path> = None;

    for attr in attrs {
        if !attr.path().is_ident("middleman") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("crate") {
                if path.is_some() {
                    return Err(meta.error("duplicate `crate`"));
                }
                let lit: LitStr = meta.value()?.parse()?;
                path = Some(lit.parse()?);
                Ok(())
            } else {
                Err(meta.error("unknown middleman attribute, expected `crate = \"path\"`"))
            }
        })?;
    }

    Ok(path.unwrap_or_else(|| parse_quote!(::middleman::core)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::quote;
    use syn::DeriveInput;

    #[test]
    fn facade_path_by_default() {
        let input: DeriveInput = parse_quote! {
            struct PlaceOrder;
        };
        let path = core_path(&input.attrs).unwrap();
        assert_eq!(quote!(#path).to_string(), quote!(::middleman::core).to_string());
    }

    #[test]
    fn crate_attribute_overrides() {
        let input: DeriveInput = parse_quote! {
            #[middleman(crate = "::middleman_core")]
            struct PlaceOrder;
        };
        let path = core_path(&input.attrs).unwrap();
        assert_eq!(quote!(#path).to_string(), quote!(::middleman_core).to_string());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let input: DeriveInput = parse_quote! {
            #[middleman(krate = "x")]
            struct PlaceOrder;
        };
        assert!(core_path(&input.attrs).is_err());
    }
}
