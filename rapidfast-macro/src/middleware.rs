use crate::injectable::{injectable_impls, strip_inject};
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemStruct};

pub fn middleware_attribute(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut input = parse_macro_input!(item as ItemStruct);
    let decorations = quote! {
        ::rapidfast::decorators::middleware::<Self>(registry);
    };
    let impls = match injectable_impls(&input.ident, &input.fields, decorations) {
        Ok(impls) => impls,
        Err(e) => return e.to_compile_error().into(),
    };
    strip_inject(&mut input.fields);

    TokenStream::from(quote! {
        #input
        #impls
    })
}
