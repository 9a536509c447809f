use rapidfast::prelude::*;

pub mod controller;
pub mod guard;
pub mod repository;
pub mod service;

pub use controller::UserController;
pub use repository::{ModelUserRepository, UserRepository};
pub use service::UserService;

#[module(
    controllers = [UserController],
    providers = [ModelUserRepository, UserService]
)]
pub struct UserModule;
