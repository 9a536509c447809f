use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Fields, GenericArgument, Ident, LitStr,
    PathArguments, Type,
};

pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return syn::Error::new_spanned(&input.ident, "#[derive(Injectable)] can only be applied to structs")
                .to_compile_error()
                .into()
        }
    };

    let name = &input.ident;
    let marker = quote! { ::rapidfast::decorators::injectable::<Self>(registry); };
    match injectable_impls(name, fields, marker) {
        Ok(expanded) => expanded.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

/// `Injectable` and `Decorated` impls for `name`. `decorations` runs inside
/// the generated `decorate`.
pub fn injectable_impls(name: &Ident, fields: &Fields, decorations: TokenStream2) -> syn::Result<TokenStream2> {
    let construct = construct(name, fields)?;
    Ok(quote! {
        impl ::rapidfast::Injectable for #name {
            fn inject(injector: &::rapidfast::Injector) -> ::rapidfast::Result<Self> {
                #construct
            }
        }

        impl ::rapidfast::Decorated for #name {
            fn decorate(registry: &::rapidfast::MetadataRegistry) {
                #decorations
            }
        }
    })
}

fn construct(name: &Ident, fields: &Fields) -> syn::Result<TokenStream2> {
    Ok(match fields {
        Fields::Unit => quote! { Ok(Self) },
        Fields::Named(named) => {
            let values = named
                .named
                .iter()
                .enumerate()
                .map(|(index, field)| {
                    let ident = field.ident.as_ref().map(Ident::to_string).unwrap_or_default();
                    let value = resolve_field(name, index, &ident, &field.attrs, &field.ty)?;
                    let field_name = &field.ident;
                    Ok(quote! { #field_name: #value })
                })
                .collect::<syn::Result<Vec<_>>>()?;
            quote! { Ok(Self { #(#values),* }) }
        }
        Fields::Unnamed(unnamed) => {
            let values = unnamed
                .unnamed
                .iter()
                .enumerate()
                .map(|(index, field)| {
                    let ident = format_ident!("_{}", index).to_string();
                    resolve_field(name, index, &ident, &field.attrs, &field.ty)
                })
                .collect::<syn::Result<Vec<_>>>()?;
            quote! { Ok(Self(#(#values),*)) }
        }
    })
}

fn resolve_field(class: &Ident, index: usize, field: &str, attrs: &[Attribute], ty: &Type) -> syn::Result<TokenStream2> {
    if let Some(token) = inject_token(attrs)? {
        return Ok(quote! { injector.get_token::<#ty>(#token)? });
    }
    Ok(match arc_inner(ty) {
        Some(Type::TraitObject(object)) => quote! { injector.get_bound::<#object>()? },
        Some(inner) => quote! { injector.get::<#inner>()? },
        None => quote! {
            injector.unresolvable::<#ty>(stringify!(#class), #index, #field)?
        },
    })
}

/// The token of an `#[inject("token")]` attribute, if present.
fn inject_token(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    attrs
        .iter()
        .find(|attr| attr.path().is_ident("inject"))
        .map(|attr| attr.parse_args::<LitStr>())
        .transpose()
}

/// Removes `#[inject]` helper attributes, for attribute macros that re-emit the struct.
pub fn strip_inject(fields: &mut Fields) {
    for field in fields.iter_mut() {
        field.attrs.retain(|attr| !attr.path().is_ident("inject"));
    }
}

/// Extract the inner type from `Arc<T>` or `Arc<dyn Trait>`
fn arc_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Arc" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}
