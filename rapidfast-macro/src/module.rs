use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse::Parse, parse::ParseStream, parse_macro_input, Attribute, ItemStruct, Path, Token, Type,
};

struct ModuleItem {
    attrs: Vec<Attribute>,
    path: Path,
}

impl Parse for ModuleItem {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        let path = input.parse()?;
        Ok(ModuleItem { attrs, path })
    }
}

/// Represents a trait binding: (dyn Trait => Impl)
struct BindingItem {
    attrs: Vec<Attribute>,
    trait_type: Type,
    impl_type: Path,
}

impl Parse for BindingItem {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        let content;
        syn::parenthesized!(content in input);

        let trait_type: Type = content.parse()?;
        content.parse::<Token![=>]>()?;
        let impl_type: Path = content.parse()?;

        Ok(BindingItem {
            attrs,
            trait_type,
            impl_type,
        })
    }
}

#[derive(Default)]
struct ModuleArgs {
    imports: Vec<ModuleItem>,
    controllers: Vec<ModuleItem>,
    providers: Vec<ModuleItem>,
    middlewares: Vec<ModuleItem>,
    bindings: Vec<BindingItem>,
}

impl Parse for ModuleArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = ModuleArgs::default();

        while !input.is_empty() {
            let name: syn::Ident = input.parse()?;
            input.parse::<Token![=]>()?;

            // Parse array: [Item1, Item2, ...]
            let content;
            syn::bracketed!(content in input);

            let list = match name.to_string().as_str() {
                "imports" => &mut args.imports,
                "controllers" => &mut args.controllers,
                "providers" => &mut args.providers,
                "middlewares" => &mut args.middlewares,
                "bindings" => {
                    let items = content.parse_terminated(BindingItem::parse, Token![,])?;
                    args.bindings.extend(items);
                    if input.peek(Token![,]) {
                        input.parse::<Token![,]>()?;
                    }
                    continue;
                }
                _ => {
                    return Err(syn::Error::new_spanned(
                        name,
                        "expected `imports`, `controllers`, `providers`, `middlewares` or `bindings`",
                    ))
                }
            };
            list.extend(content.parse_terminated(ModuleItem::parse, Token![,])?);

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(args)
    }
}

pub fn module_attribute(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as ModuleArgs);
    let input = parse_macro_input!(item as ItemStruct);
    let expanded = generate_module_impl(&args, &input);

    TokenStream::from(expanded)
}

fn class_pushes(field: &str, class: TokenStream2, items: &[ModuleItem]) -> Vec<TokenStream2> {
    let field = syn::Ident::new(field, proc_macro2::Span::call_site());
    items
        .iter()
        .map(|item| {
            let path = &item.path;
            let attrs = &item.attrs;
            quote! {
                #(#attrs)*
                options.#field.push(::rapidfast::decorators::#class::of::<#path>());
            }
        })
        .collect()
}

fn generate_module_impl(args: &ModuleArgs, input: &ItemStruct) -> TokenStream2 {
    let module_name = &input.ident;

    let controllers = class_pushes("controllers", quote!(ControllerClass), &args.controllers);
    let providers = class_pushes("providers", quote!(ProviderClass), &args.providers);
    let imports = class_pushes("imports", quote!(ModuleClass), &args.imports);
    let middlewares = class_pushes("middlewares", quote!(MiddlewareClass), &args.middlewares);

    let bindings = args.bindings.iter().map(|binding| {
        let attrs = &binding.attrs;
        let trait_type = &binding.trait_type;
        let impl_type = &binding.impl_type;
        quote! {
            #(#attrs)*
            options.bindings.push(::rapidfast::decorators::Binding::of::<#trait_type, #impl_type>(
                |implementation| implementation as ::std::sync::Arc<#trait_type>,
            ));
        }
    });

    quote! {
        #input

        impl ::rapidfast::Decorated for #module_name {
            fn decorate(registry: &::rapidfast::MetadataRegistry) {
                #[allow(unused_mut)]
                let mut options = ::rapidfast::decorators::ModuleOptions::default();
                #(#controllers)*
                #(#providers)*
                #(#imports)*
                #(#middlewares)*
                #(#bindings)*
                ::rapidfast::decorators::module::<Self>(registry, options);
            }
        }

        impl ::rapidfast::Module for #module_name {}
    }
}
