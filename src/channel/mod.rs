#[allow(clippy::module_inception)]
mod channel;
pub use channel::*;
mod manager;
pub use manager::*;
