//! `#[derive(StateDiff)]` — generates a `state_diff` method that compares
//! a struct against a previous snapshot of itself and reports only the
//! fields that changed, shaped for [`tuiflow_core::component::ComponentInstance::get_state_changes`].
//!
//! Grounded in the teacher's `#[derive(DebugState)]`: same per-field
//! reflection over a named struct, different output (a state patch instead
//! of a debug-overlay section list).

use darling::{FromDeriveInput, FromField};
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

/// Container-level attributes for `#[derive(StateDiff)]`.
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(state_diff), supports(struct_named))]
struct StateDiffOpts {
    ident: syn::Ident,
    data: darling::ast::Data<(), StateDiffField>,
    /// Key prefix joined to each field name with `.`. Defaults to no prefix.
    #[darling(default)]
    prefix: Option<String>,
}

/// Field-level attributes for `#[derive(StateDiff)]`.
#[derive(Debug, FromField)]
#[darling(attributes(state))]
struct StateDiffField {
    ident: Option<syn::Ident>,

    /// Exclude this field from the diff entirely (caches, handles, etc).
    #[darling(default)]
    skip: bool,

    /// Report under this key instead of the field's name.
    #[darling(default)]
    key: Option<String>,
}

/// Derives a `state_diff(&self, previous: &Self) -> tuiflow_core::StateChanges`
/// inherent method that serializes each non-`#[state(skip)]` field with
/// `serde_json::to_value` and includes it only when it differs (by `PartialEq`)
/// from the same field on `previous`.
///
/// ```ignore
/// #[derive(StateDiff, PartialEq, Clone)]
/// #[state_diff(prefix = "counter")]
/// struct CounterState {
///     count: i32,
///     #[state(skip)]
///     render_cache: String,
/// }
///
/// // in ComponentInstance::get_state_changes:
/// let changes = self.state.state_diff(&self.previous);
/// let changed = !changes.is_empty();
/// self.previous = self.state.clone();
/// ```
#[proc_macro_derive(StateDiff, attributes(state, state_diff))]
pub fn derive_state_diff(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let opts = match StateDiffOpts::from_derive_input(&input) {
        Ok(opts) => opts,
        Err(e) => return e.write_errors().into(),
    };

    let name = &opts.ident;

    let fields = match &opts.data {
        darling::ast::Data::Struct(fields) => fields,
        _ => {
            return syn::Error::new_spanned(&input, "StateDiff can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let entries: Vec<_> = fields
        .iter()
        .filter(|f| !f.skip)
        .filter_map(|field| {
            let field_ident = field.ident.as_ref()?;
            let key = field.key.clone().unwrap_or_else(|| field_ident.to_string());
            let key = match &opts.prefix {
                Some(prefix) => format!("{prefix}.{key}"),
                None => key,
            };

            Some(quote! {
                if self.#field_ident != previous.#field_ident {
                    changes.insert(
                        #key.to_string(),
                        ::serde_json::to_value(&self.#field_ident).unwrap_or(::serde_json::Value::Null),
                    );
                }
            })
        })
        .collect();

    let expanded = quote! {
        impl #name {
            pub fn state_diff(&self, previous: &Self) -> ::tuiflow::StateChanges {
                let mut changes = ::tuiflow::StateChanges::new();
                #(#entries)*
                changes
            }
        }
    };

    TokenStream::from(expanded)
}
