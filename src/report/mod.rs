//! Plain-text renderings of probe results, shared by the notifiers and the
//! web endpoint.

mod common;
pub use common::*;
mod result;
pub use result::*;
