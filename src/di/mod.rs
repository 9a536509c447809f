mod injectable;
mod injector;

pub use injectable::Injectable;
pub use injector::Injector;
