pub mod channel;
pub mod cmd;
pub mod conf;
pub mod daemon;
pub mod global;
pub mod logging;
pub mod metric;
pub mod notify;
pub mod probe;
pub mod report;
pub mod web;

pub use global::*;
pub use notify::Notifier;
pub use probe::{ProbeResult, Prober, Status};
