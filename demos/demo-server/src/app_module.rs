use crate::modules::health::HealthController;
use crate::modules::user::{ModelUserRepository, UserModule, UserRepository};
use rapidfast::prelude::*;

/// Root application module
#[module(
    imports = [UserModule],
    controllers = [HealthController],
    middlewares = [RequestLogger],
    bindings = [(dyn UserRepository => ModelUserRepository)],
)]
pub struct AppModule;
