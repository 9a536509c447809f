use proc_macro::TokenStream;

/// Verb, middleware and parameter attributes are consumed by `#[routes]`
/// and `#[controller]`. Outside of those they leave the item untouched.
pub fn passthrough(_attr: TokenStream, item: TokenStream) -> TokenStream {
    item
}
