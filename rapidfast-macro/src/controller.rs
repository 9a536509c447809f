use crate::injectable::{injectable_impls, strip_inject};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse::Parse, parse::ParseStream, parse_macro_input, punctuated::Punctuated, Attribute, FnArg,
    ImplItem, ImplItemFn, ItemImpl, ItemStruct, LitStr, Path, Token,
};

const VERBS: [&str; 7] = ["get", "post", "put", "delete", "patch", "options", "all"];
const PARAMS: [&str; 3] = ["req", "res", "next"];

struct ControllerArgs {
    prefix: String,
}

impl Parse for ControllerArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.is_empty() {
            return Ok(ControllerArgs { prefix: String::new() });
        }
        if input.peek(LitStr) {
            let lit: LitStr = input.parse()?;
            return Ok(ControllerArgs { prefix: lit.value() });
        }

        let mut prefix = None;
        while !input.is_empty() {
            let name: syn::Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            if name == "prefix" || name == "path" {
                let lit: LitStr = input.parse()?;
                prefix = Some(lit.value());
            } else {
                return Err(syn::Error::new_spanned(name, "expected `prefix` or `path`"));
            }
            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }
        Ok(ControllerArgs { prefix: prefix.unwrap_or_default() })
    }
}

pub fn controller_attribute(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as ControllerArgs);
    let input = parse_macro_input!(item as ItemStruct);
    match generate_controller_impl(&args, input) {
        Ok(expanded) => expanded.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn generate_controller_impl(args: &ControllerArgs, mut input: ItemStruct) -> syn::Result<TokenStream2> {
    let prefix = &args.prefix;
    let middlewares = take_middlewares(&mut input.attrs)?;
    let decorations = quote! {
        ::rapidfast::decorators::controller::<Self>(registry, #prefix);
        ::rapidfast::decorators::injectable::<Self>(registry);
        #middlewares
        <Self as ::rapidfast::Controller>::decorate_methods(registry);
    };
    let impls = injectable_impls(&input.ident, &input.fields, decorations)?;
    strip_inject(&mut input.fields);

    Ok(quote! {
        #input
        #impls
    })
}

/// Removes `#[use_middlewares(..)]` attributes and returns the
/// `use_middlewares` calls they stand for.
fn take_middlewares(attrs: &mut Vec<Attribute>) -> syn::Result<TokenStream2> {
    take_member_middlewares(attrs, quote! { None })
}

fn take_member_middlewares(attrs: &mut Vec<Attribute>, member: TokenStream2) -> syn::Result<TokenStream2> {
    let mut classes = Vec::new();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("use_middlewares")) {
        let paths = attr.parse_args_with(Punctuated::<Path, Token![,]>::parse_terminated)?;
        classes.extend(paths);
    }
    attrs.retain(|attr| !attr.path().is_ident("use_middlewares"));
    if classes.is_empty() {
        return Ok(TokenStream2::new());
    }
    Ok(quote! {
        ::rapidfast::decorators::use_middlewares::<Self>(
            registry,
            #member,
            vec![#(::rapidfast::decorators::MiddlewareClass::of::<#classes>()),*],
        );
    })
}

enum Binding {
    Req,
    Res,
    Next,
}

struct RouteInfo {
    verb: syn::Ident,
    path: String,
    fn_name: syn::Ident,
    is_async: bool,
    arity: usize,
    bindings: Vec<(usize, Binding)>,
    middlewares: TokenStream2,
}

pub fn routes_attribute(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemImpl);
    match generate_routes_impl(input) {
        Ok(expanded) => expanded.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn generate_routes_impl(mut input: ItemImpl) -> syn::Result<TokenStream2> {
    let mut names = Vec::new();
    let mut routes = Vec::new();

    for item in input.items.iter_mut() {
        if let ImplItem::Fn(method) = item {
            names.push(method.sig.ident.to_string());
            if let Some(route) = extract_route_info(method)? {
                routes.push(route);
            }
        }
    }

    let decorations = routes.iter().map(|route| {
        let name = route.fn_name.to_string();
        let verb = format_ident!("{}", capitalize(&route.verb.to_string()));
        let path = &route.path;
        let bindings = route.bindings.iter().map(|(index, binding)| {
            let decorator = match binding {
                Binding::Req => quote!(req),
                Binding::Res => quote!(res),
                Binding::Next => quote!(next),
            };
            quote! { ::rapidfast::decorators::#decorator::<Self>(registry, #name, #index); }
        });
        let middlewares = &route.middlewares;
        quote! {
            ::rapidfast::decorators::route::<Self>(registry, #name, ::rapidfast::http::HttpMethod::#verb, #path);
            #(#bindings)*
            #middlewares
        }
    });

    let arms = routes.iter().map(|route| {
        let name = route.fn_name.to_string();
        let fn_name = &route.fn_name;
        let args: Vec<_> = (0..route.arity).map(|i| format_ident!("__arg{}", i)).collect();
        let takes = args.iter().enumerate().map(|(index, arg)| {
            quote! {
                let #arg = match args.take(#index) {
                    Ok(value) => value,
                    Err(e) => return ::rapidfast::router::Invocation::Ready(::rapidfast::http::Outcome::Failed(e)),
                };
            }
        });
        let call = if route.is_async {
            quote! {
                ::rapidfast::router::Invocation::Deferred(
                    ::rapidfast::http::Responder::into_outcome(self.#fn_name(#(#args),*).await)
                )
            }
        } else {
            quote! {
                ::rapidfast::router::Invocation::Ready(
                    ::rapidfast::http::Responder::into_outcome(self.#fn_name(#(#args),*))
                )
            }
        };
        quote! {
            #name => ::std::boxed::Box::pin(async move {
                #(#takes)*
                #call
            }),
        }
    });

    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        #input

        impl #impl_generics ::rapidfast::Controller for #self_ty #where_clause {
            fn methods() -> &'static [&'static str] {
                &[#(#names),*]
            }

            fn decorate_methods(registry: &::rapidfast::MetadataRegistry) {
                #(#decorations)*
            }

            #[allow(unused_mut, unused_variables)]
            fn invoke(
                self: ::std::sync::Arc<Self>,
                method: &str,
                mut args: ::rapidfast::http::Arguments,
            ) -> ::std::option::Option<::rapidfast::router::MethodFuture> {
                let future: ::rapidfast::router::MethodFuture = match method {
                    #(#arms)*
                    _ => return ::std::option::Option::None,
                };
                ::std::option::Option::Some(future)
            }
        }
    })
}

/// Reads and strips the route attributes of `method`. Methods without a verb
/// attribute are plain helpers and yield `None`.
fn extract_route_info(method: &mut ImplItemFn) -> syn::Result<Option<RouteInfo>> {
    let mut verb = None;
    let mut path = String::new();
    for attr in method.attrs.iter().filter(|attr| is_http_method_attr(attr)) {
        if verb.is_some() {
            return Err(syn::Error::new_spanned(attr, "a method can only carry one HTTP verb attribute"));
        }
        verb = attr.path().get_ident().cloned();
        if let syn::Meta::List(_) = &attr.meta {
            path = attr.parse_args::<LitStr>()?.value();
        }
    }
    method.attrs.retain(|attr| !is_http_method_attr(attr));

    let name = method.sig.ident.to_string();
    let middlewares = take_member_middlewares(&mut method.attrs, quote! { Some(#name) })?;

    let mut bindings = Vec::new();
    let mut arity = 0;
    for input in method.sig.inputs.iter_mut() {
        let FnArg::Typed(pat_type) = input else {
            continue;
        };
        for attr in pat_type.attrs.iter().filter(|attr| is_param_attr(attr)) {
            let binding = if attr.path().is_ident("req") {
                Binding::Req
            } else if attr.path().is_ident("res") {
                Binding::Res
            } else {
                Binding::Next
            };
            bindings.push((arity, binding));
        }
        pat_type.attrs.retain(|attr| !is_param_attr(attr));
        arity += 1;
    }

    let Some(verb) = verb else {
        if !middlewares.is_empty() || !bindings.is_empty() {
            return Err(syn::Error::new_spanned(
                &method.sig.ident,
                "parameter and middleware attributes need an HTTP verb attribute on the method",
            ));
        }
        return Ok(None);
    };

    Ok(Some(RouteInfo {
        verb,
        path,
        fn_name: method.sig.ident.clone(),
        is_async: method.sig.asyncness.is_some(),
        arity,
        bindings,
        middlewares,
    }))
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn is_http_method_attr(attr: &Attribute) -> bool {
    attr.path()
        .get_ident()
        .is_some_and(|ident| VERBS.contains(&ident.to_string().as_str()))
}

fn is_param_attr(attr: &Attribute) -> bool {
    attr.path()
        .get_ident()
        .is_some_and(|ident| PARAMS.contains(&ident.to_string().as_str()))
}
