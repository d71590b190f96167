use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, ImplItemFn, LitStr};

/// Proc macro to denote a Task
///
/// Wraps the body of an `async fn` returning `Result<T, E>` so that every call is timed and
/// recorded against the running swarm. The task is recorded under the function name unless a
/// name is given.
///
/// NOTE: Only works on `async` functions with a `Result<T, E>` return value.
///
/// # Example
/// ```ignore
/// use morpho_load::prelude::*;
///
/// impl MyUser {
///     #[task]
///     async fn list_projects(&mut self) -> Result<(), TaskError> {
///         ...
///     }
///
///     #[task("models")]
///     async fn list_models(&mut self) -> Result<(), TaskError> {
///         ...
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn task(attr: TokenStream, item: TokenStream) -> TokenStream {
    let name = if attr.is_empty() {
        None
    } else {
        Some(parse_macro_input!(attr as LitStr))
    };
    // NOTE: ImplItemFn also accepts free functions, the block is all we touch.
    let input = parse_macro_input!(item as ImplItemFn);
    task_internal(name, input).into()
}

fn task_internal(name: Option<LitStr>, input: ImplItemFn) -> TokenStream2 {
    let ImplItemFn {
        attrs,
        vis,
        defaultness,
        sig,
        block,
    } = input;

    if sig.asyncness.is_none() {
        return syn::Error::new_spanned(&sig.fn_token, "#[task] requires an async fn")
            .to_compile_error();
    }

    let stmts = &block.stmts;
    let ident = &sig.ident;
    let name = match name {
        Some(name) => quote! { #name },
        None => quote! { stringify!(#ident) },
    };

    quote! {
        #(#attrs)* #vis #defaultness #sig {
            ::morpho_load::task::task_hook(#name, async move {
                #(#stmts)*
            }).await
        }
    }
}
