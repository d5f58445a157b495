//! Process lifecycle: probe workers, result persistence, log rotation,
//! configuration reloads and the ordered graceful exit.

mod scheduler;
pub use scheduler::*;
mod persist;
pub use persist::*;
mod rotate;
pub use rotate::*;
mod restart;
pub use restart::*;
mod lifecycle;
pub use lifecycle::*;
