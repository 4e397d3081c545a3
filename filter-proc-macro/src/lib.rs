use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote, quote_spanned};
use syn::{spanned::Spanned, Data, DeriveInput, FnArg, Ident, ItemFn, Pat, PatType, Type};

/// Derives positional `Args` for a struct with named fields.
///
/// Each field, in declaration order, takes the next argument with
/// `TryFromValue::try_from_option`, so a field of type `Value` or `Option<T>`
/// may be omitted by the caller.  Leftover arguments are an error.
#[proc_macro_derive(Args)]
pub fn derive_args(input: TokenStream) -> TokenStream {
    let ast = syn::parse_macro_input!(input as DeriveInput);

    derive_args_impl(&ast).into()
}

fn derive_args_impl(ast: &DeriveInput) -> TokenStream2 {
    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let Data::Struct(s) = &ast.data else {
        return quote! {
            compile_error!("#[derive(Args)] on a non-struct is not supported.");
        };
    };

    let Some(field) = &s
        .fields
        .iter()
        .map(|x| x.ident.as_ref())
        .collect::<Option<Vec<_>>>()
    else {
        return quote! {
            compile_error!("#[derive(Args)] is not supported on tuple structs.");
        };
    };

    let ty = s.fields.iter().map(|x| &x.ty);

    quote! {
        impl #impl_generics ::sitefilters_filter_types::Args for #name #ty_generics #where_clause {
            #[allow(unused_mut)]
            fn try_deserialize(
                args: ::std::vec::Vec<::sitefilters_filter_types::IValue>
            ) -> ::sitefilters_filter_types::Result<Self> {
                let mut args = args.into_iter();
                #(
                    let #field = ::sitefilters_filter_types::WrapExt::wrap(
                        <#ty as ::sitefilters_filter_types::TryFromValue<::sitefilters_filter_types::Item>>
                            ::try_from_option(args.next()),
                        concat!("in argument `", stringify!(#field), "`"),
                    )?;
                )*

                let extra = args.count();
                if extra > 0 {
                    return Err(::sitefilters_filter_types::Error::argument(
                        format!("found {extra} unexpected argument(s)")
                    ));
                }

                Ok(Self { #(#field),* })
            }
        }
    }
}

/// Turns a function into a filter.
///
/// The function takes the piped value first, then its arguments in the order
/// a template passes them.  A last parameter named `ctx` receives the
/// `&mut dyn ContextView`.  The annotated `fn name(...)` becomes
/// `fn name() -> impl Filter`.
///
/// ```ignore
/// #[filter_fn]
/// pub fn push(value: IValue, element: IValue) -> Result<IValue> { ... }
/// ```
#[proc_macro_attribute]
pub fn filter_fn(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = syn::parse_macro_input!(item as ItemFn);

    match filter_fn_impl(func) {
        Ok(tokens) => tokens,
        Err(e) => e.to_compile_error(),
    }
    .into()
}

struct Param<'a> {
    ident: &'a Ident,
    ty: &'a Type,
}

fn param(arg: &FnArg) -> syn::Result<Param<'_>> {
    let FnArg::Typed(PatType { pat, ty, .. }) = arg else {
        return Err(syn::Error::new(arg.span(), "filters cannot take `self`"));
    };

    let Pat::Ident(pat) = &**pat else {
        return Err(syn::Error::new(
            pat.span(),
            "filter parameters must be plain identifiers",
        ));
    };

    Ok(Param {
        ident: &pat.ident,
        ty,
    })
}

fn filter_fn_impl(mut func: ItemFn) -> syn::Result<TokenStream2> {
    if !func.sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            func.sig.generics.span(),
            "#[filter_fn] does not support generic filters",
        ));
    }

    let attrs = std::mem::take(&mut func.attrs);
    let vis = std::mem::replace(&mut func.vis, syn::Visibility::Inherited);
    let name = std::mem::replace(&mut func.sig.ident, format_ident!("inner"));

    let params = func
        .sig
        .inputs
        .iter()
        .map(param)
        .collect::<syn::Result<Vec<_>>>()?;

    let Some((value, rest)) = params.split_first() else {
        return Err(syn::Error::new(
            func.sig.span(),
            "a filter must take the piped value as its first parameter",
        ));
    };

    let (args, takes_ctx) = match rest.split_last() {
        Some((last, args)) if last.ident == "ctx" => (args, true),
        _ => (rest, false),
    };

    let value_ty = value.ty;
    let arg_ident = args.iter().map(|p| p.ident).collect::<Vec<_>>();
    let arg_ty = args.iter().map(|p| p.ty);

    let call = if takes_ctx {
        quote! { inner(value, #(args.#arg_ident,)* ctx) }
    } else {
        quote_spanned! {func.sig.span()=> inner(value, #(args.#arg_ident),*) }
    };

    Ok(quote! {
        #(#attrs)*
        #[must_use]
        #vis fn #name() -> impl ::sitefilters_filter_types::Filter {
            #[derive(::sitefilters_filter_types::Args)]
            struct FilterArgs {
                #(#arg_ident: #arg_ty,)*
            }

            struct FilterImpl;

            #[allow(clippy::unnecessary_wraps, clippy::needless_pass_by_value)]
            #func

            impl ::sitefilters_filter_types::Filter for FilterImpl {
                type Value = #value_ty;
                type Args = FilterArgs;

                #[inline]
                #[allow(unused_variables)]
                fn apply(
                    value: Self::Value,
                    args: Self::Args,
                    ctx: &mut dyn ::sitefilters_filter_types::ContextView,
                ) -> ::sitefilters_filter_types::Result<::sitefilters_filter_types::IValue> {
                    #call
                }
            }

            FilterImpl
        }
    })
}
