mod result;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
pub use result::*;
mod status;
pub use status::*;
mod status_counter;
pub use status_counter::*;
mod notification_strategy;
pub use notification_strategy::*;
mod metrics;
pub use metrics::*;
mod base;
pub use base::*;
#[cfg(test)]
pub(crate) use base::testing;
mod http;
pub use http::*;
mod tcp;
pub use tcp::*;
mod store;
pub use store::*;

use crate::ProbeSettings;

/// A configured, schedulable health-check target.
#[async_trait]
pub trait Prober: Send + Sync {
    fn kind(&self) -> &str;
    fn name(&self) -> &str;
    fn channels(&self) -> &[String];
    fn timeout(&self) -> Duration;
    fn interval(&self) -> Duration;
    /// The live result; take a snapshot to read it.
    fn result(&self) -> &SharedResult;
    /// Merges the global settings; fails when the target itself is misconfigured.
    fn config(&mut self, setting: &ProbeSettings) -> Result<()>;
    /// Runs one check, bounded by `timeout()`, and returns the updated result.
    async fn probe(&self) -> ProbeResult;
}
