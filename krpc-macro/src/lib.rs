//! # KRPC Procedural Macros
//!
//! ## `#[service]` Macro
//!
//! Turns a trait into a KRPC service. The trait is kept as written and gains:
//! - `const NAME: &'static str`, the trait name, used as the service name
//! - `fn krpc_export(self: Arc<Self>, builder: &mut EndPointBuilder)`, which
//!   registers every method through a `ServiceBase<Self>`
//!
//! Methods are registered under their UpperCamelCase name, so `list_files`
//! is served as `ListFiles`.
//!
//! ### Example
//!
//! ```rust,ignore
//! #[krpc::service]
//! pub trait Echo {
//!     fn echo(&self, ctx: &Context, req: &String, out: &mut OutputJsonStream) -> Result<()>;
//! }
//! ```
//!
//! ### Requirements
//!
//! Service methods must follow this signature:
//! - `fn method_name(&self, ctx: &Context, req: &Req, out: &mut OutputJsonStream) -> R`
//! - `Req` must implement `DeserializeOwned + JsonSchema`, use `&()` for
//!   methods without arguments
//! - `R` must convert into `Status`, typically `Result<()>` or `Status`

use proc_macro::TokenStream;
use quote::quote;
use syn::{FnArg, ItemTrait, TraitItem, Type, parse_macro_input};

/// Procedural macro for defining KRPC services.
///
/// # Panics
///
/// Panics at compile time if:
/// - Methods don't match the required signature
/// - A method is named `krpc_export` (reserved name)
///
/// # Example
///
/// ```rust,ignore
/// #[service]
/// pub trait Greeter {
///     fn greet(&self, ctx: &Context, req: &String, out: &mut OutputJsonStream) -> Result<()>;
/// }
/// ```
#[proc_macro_attribute]
pub fn service(_attr: TokenStream, input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as ItemTrait);

    let trait_ident = &input.ident;
    let visibility = &input.vis;
    let attrs = &input.attrs;
    let colon_token = &input.colon_token;
    let supertraits = &input.supertraits;
    let trait_name = trait_ident.to_string();
    if !input.generics.params.is_empty() {
        panic!("the service trait `{trait_name}` cannot be generic!");
    }

    let mut registrations = vec![];

    let krate = get_crate_name();

    let input_items = &input.items;
    for item in input_items {
        if let TraitItem::Fn(method) = item
            && method.sig.inputs.len() == 4
            && method.sig.asyncness.is_none()
            && method.sig.generics.params.is_empty()
            && method.sig.receiver().is_some()
            && let FnArg::Typed(req_type) = &method.sig.inputs[2]
            && let Type::Reference(req_ref) = req_type.ty.as_ref()
        {
            let method_ident = &method.sig.ident;
            if *method_ident == "krpc_export" {
                panic!("the function cannot be named `krpc_export`!");
            }
            let method_name = to_upper_camel_case(&method_ident.to_string());

            let req_type = &req_ref.elem;
            let output = &method.sig.output;
            registrations.push(quote! {
                {
                    fn adapter<T: #trait_ident>(
                        this: &T,
                        ctx: &#krate::Context<'_>,
                        req: #req_type,
                        out: &mut #krate::OutputJsonStream<'_>,
                    ) #output {
                        this.#method_ident(ctx, &req, out)
                    }
                    base.register_method(#method_name, adapter::<Self>);
                }
            });
        } else {
            panic!(
                "the function should be in the form `fn func(&self, ctx: &Context, req: &Req, out: &mut OutputJsonStream) -> R`."
            );
        }
    }

    quote! {
        #(#attrs)*
        #visibility trait #trait_ident #colon_token #supertraits {
            const NAME: &'static str = #trait_name;

            #(#input_items)*

            fn krpc_export(
                self: ::std::sync::Arc<Self>,
                builder: &mut #krate::EndPointBuilder,
            )
            where
                Self: Sized + Send + Sync + 'static,
            {
                let mut base = #krate::ServiceBase::new(<Self as #trait_ident>::NAME, self);
                #(#registrations)*
                base.export(builder);
            }
        }
    }
    .into()
}

/// `snake_case` to `UpperCamelCase`; names already in camel case are kept.
fn to_upper_camel_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect()
}

/// Gets the path used to refer to the krpc crate from the expanded code.
///
/// Handles renamed dependencies; inside the krpc package itself (its
/// integration tests and doctests) the library is still `::krpc`.
pub(crate) fn get_crate_name() -> proc_macro2::TokenStream {
    match proc_macro_crate::crate_name("krpc") {
        Ok(proc_macro_crate::FoundCrate::Name(name)) => {
            let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
            quote! { ::#ident }
        }
        _ => quote! { ::krpc },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_upper_camel_case() {
        assert_eq!(to_upper_camel_case("list"), "List");
        assert_eq!(to_upper_camel_case("list_files"), "ListFiles");
        assert_eq!(to_upper_camel_case("get_v2_info"), "GetV2Info");
        assert_eq!(to_upper_camel_case("Describe"), "Describe");
        assert_eq!(to_upper_camel_case("_private__name_"), "PrivateName");
    }
}
