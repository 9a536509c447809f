use crate::decorators::Decorated;
use crate::di::Injector;
use crate::error::Result;

/// Trait for types the injector can construct.
///
/// This trait is typically implemented automatically via `#[derive(Injectable)]`,
/// `#[controller]` or `#[middleware]`. Field resolution:
///
/// - `#[inject("token")] field: T` reads a value provided under `token`
/// - `Arc<dyn Trait>` resolves the provider bound to `Trait`
/// - `Arc<T>` resolves the singleton `T`, registering it on first use
///
/// # Example
/// ```rust,ignore
/// use rapidfast::prelude::*;
///
/// #[derive(Injectable)]
/// pub struct UserService {
///     repository: Arc<dyn UserRepository>,
///     #[inject("api_key")]
///     api_key: String,
/// }
/// ```
pub trait Injectable: Decorated + Sized + Send + Sync + 'static {
    /// Create an instance by resolving dependencies from the injector
    ///
    /// # Errors
    /// Returns an error if any dependency cannot be resolved.
    fn inject(injector: &Injector) -> Result<Self>;
}
